use axum::{
    extract::{ConnectInfo, Request},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct RateLimiter {
    // client key -> (request_count, window_start)
    clients: Arc<Mutex<HashMap<String, (u32, Instant)>>>,
    max_requests: u32,
    window_duration: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_seconds: u64) -> Self {
        Self {
            clients: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window_duration: Duration::from_secs(window_seconds),
        }
    }

    pub fn check_rate_limit(&self, client_ip: &str) -> bool {
        self.check_at(client_ip, Instant::now())
    }

    fn check_at(&self, client_ip: &str, now: Instant) -> bool {
        let mut clients = self.clients.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        match clients.get_mut(client_ip) {
            Some((count, window_start)) => {
                if now.duration_since(*window_start) > self.window_duration {
                    *count = 1;
                    *window_start = now;
                    true
                } else if *count >= self.max_requests {
                    false
                } else {
                    *count += 1;
                    true
                }
            }
            None => {
                clients.insert(client_ip.to_string(), (1, now));
                true
            }
        }
    }

    pub fn cleanup_expired(&self) {
        let mut clients = self.clients.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();

        clients.retain(|_, (_, window_start)| now.duration_since(*window_start) <= self.window_duration);
    }
}

/// Socket address when the server was started with connect info, else the
/// first `x-forwarded-for` hop.
fn client_key(connect_info: Option<&ConnectInfo<SocketAddr>>, headers: &HeaderMap) -> String {
    if let Some(ConnectInfo(addr)) = connect_info {
        return addr.ip().to_string();
    }
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

fn too_many_requests(message: &str) -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({
            "success": false,
            "message": message,
            "retry_after": 60
        })),
    )
        .into_response()
}

pub async fn rate_limit_middleware(request: Request, next: Next) -> Response {
    // 100 requests per minute per client
    static RATE_LIMITER: OnceLock<RateLimiter> = OnceLock::new();
    let rate_limiter = RATE_LIMITER.get_or_init(|| RateLimiter::new(100, 60));

    let client_ip = client_key(request.extensions().get::<ConnectInfo<SocketAddr>>(), request.headers());

    if !rate_limiter.check_rate_limit(&client_ip) {
        tracing::warn!("Rate limit exceeded for IP: {}", client_ip);
        return too_many_requests("Rate limit exceeded. Please try again later.");
    }

    // Occasionally clean up expired entries
    if rand::random::<u8>() < 10 {
        rate_limiter.cleanup_expired();
    }

    next.run(request).await
}

// Tighter limit for credential endpoints
pub async fn strict_rate_limit_middleware(request: Request, next: Next) -> Response {
    // 10 requests per minute per client
    static STRICT_RATE_LIMITER: OnceLock<RateLimiter> = OnceLock::new();
    let rate_limiter = STRICT_RATE_LIMITER.get_or_init(|| RateLimiter::new(10, 60));

    let client_ip = client_key(request.extensions().get::<ConnectInfo<SocketAddr>>(), request.headers());

    if !rate_limiter.check_rate_limit(&client_ip) {
        tracing::warn!("Strict rate limit exceeded for IP: {}", client_ip);
        return too_many_requests("Rate limit exceeded for sensitive operations. Please try again later.");
    }

    if rand::random::<u8>() < 10 {
        rate_limiter.cleanup_expired();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_beyond_the_limit_are_rejected() {
        let limiter = RateLimiter::new(2, 60);
        let now = Instant::now();
        assert!(limiter.check_at("1.2.3.4", now));
        assert!(limiter.check_at("1.2.3.4", now));
        assert!(!limiter.check_at("1.2.3.4", now));
        assert!(limiter.check_at("5.6.7.8", now));
    }

    #[test]
    fn window_resets_after_expiry() {
        let limiter = RateLimiter::new(1, 1);
        let start = Instant::now();
        assert!(limiter.check_at("ip", start));
        assert!(!limiter.check_at("ip", start));
        assert!(limiter.check_at("ip", start + Duration::from_secs(2)));
    }

    #[test]
    fn client_key_prefers_socket_address() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "9.9.9.9, 10.0.0.1".parse().unwrap());
        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        assert_eq!(client_key(Some(&ConnectInfo(addr)), &headers), "127.0.0.1");
        assert_eq!(client_key(None, &headers), "9.9.9.9");
        assert_eq!(client_key(None, &HeaderMap::new()), "unknown");
    }
}
