// src/services/web_import.rs
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::{Client, Method, Url};
use scraper::{Html, Node, Selector};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "iframe", "svg"];

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("upstream returned status {0}")]
    Status(u16),
    #[error("response is not valid JSON: {0}")]
    NotJson(String),
}

/// Accepts absolute http(s) URLs with a host.
pub fn validate_http_url(raw: &str) -> Result<Url, ImportError> {
    let url = Url::parse(raw.trim()).map_err(|_| ImportError::InvalidUrl(raw.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(ImportError::InvalidUrl(raw.to_string())),
    }
}

pub fn host_of(url: &Url) -> String {
    url.host_str().unwrap_or("unknown").to_string()
}

pub fn parse_method(raw: Option<&str>) -> Result<Method, ImportError> {
    match raw.map(|m| m.trim().to_ascii_uppercase()).as_deref() {
        None | Some("") | Some("GET") => Ok(Method::GET),
        Some("POST") => Ok(Method::POST),
        Some("PUT") => Ok(Method::PUT),
        Some("PATCH") => Ok(Method::PATCH),
        Some("DELETE") => Ok(Method::DELETE),
        Some(other) => Err(ImportError::UnsupportedMethod(other.to_string())),
    }
}

fn build_headers(headers: &HashMap<String, String>) -> Result<HeaderMap, ImportError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ImportError::InvalidHeader(name.clone()))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| ImportError::InvalidHeader(name.to_string()))?;
        map.insert(name, value);
    }
    Ok(map)
}

pub async fn fetch_html(client: &Client, url: &Url) -> Result<String, ImportError> {
    let response = client
        .get(url.clone())
        .timeout(FETCH_TIMEOUT)
        .header(ACCEPT, "text/html,application/xhtml+xml")
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(ImportError::Status(response.status().as_u16()));
    }
    Ok(response.text().await?)
}

pub async fn fetch_json(
    client: &Client,
    url: &Url,
    method: Method,
    headers: &HashMap<String, String>,
) -> Result<serde_json::Value, ImportError> {
    let response = client
        .request(method, url.clone())
        .timeout(FETCH_TIMEOUT)
        .header(ACCEPT, "application/json")
        .headers(build_headers(headers)?)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(ImportError::Status(response.status().as_u16()));
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| ImportError::NotJson(e.to_string()))
}

/// Visible text of the document body with non-content elements removed and
/// all whitespace runs collapsed to single spaces.
pub fn extract_visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let Ok(body_selector) = Selector::parse("body") else {
        return String::new();
    };

    let mut pieces: Vec<&str> = Vec::new();
    for body in document.select(&body_selector) {
        for node in body.descendants() {
            let Node::Text(text) = node.value() else {
                continue;
            };
            let hidden = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .map(|el| SKIPPED_ELEMENTS.contains(&el.name()))
                    .unwrap_or(false)
            });
            if !hidden {
                pieces.push(&**text);
            }
        }
    }

    pieces
        .iter()
        .flat_map(|piece| piece.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scripts_and_styles() {
        let html = r#"<html><head><title>T</title><style>body{color:red}</style></head>
            <body><h1>Hello</h1><script>alert('x')</script>
            <p>World   and
            more</p><noscript>enable js</noscript><svg><text>icon</text></svg></body></html>"#;
        assert_eq!(extract_visible_text(html), "Hello World and more");
    }

    #[test]
    fn head_content_is_ignored() {
        let html = "<html><head><title>Only title</title></head><body></body></html>";
        assert_eq!(extract_visible_text(html), "");
    }

    #[test]
    fn urls_must_be_http() {
        assert!(validate_http_url("https://example.com/a").is_ok());
        assert!(validate_http_url("ftp://example.com").is_err());
        assert!(validate_http_url("not a url").is_err());
        assert_eq!(host_of(&validate_http_url("http://docs.rs/x").unwrap()), "docs.rs");
    }

    #[test]
    fn methods_default_to_get() {
        assert_eq!(parse_method(None).unwrap(), Method::GET);
        assert_eq!(parse_method(Some("post")).unwrap(), Method::POST);
        assert!(matches!(parse_method(Some("TRACE")), Err(ImportError::UnsupportedMethod(_))));
    }

    #[tokio::test]
    async fn fetch_json_sends_custom_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/items")
            .match_header("x-api-key", "secret")
            .with_status(200)
            .with_body(r#"{"items":[1,2]}"#)
            .create_async()
            .await;

        let url = validate_http_url(&format!("{}/items", server.url())).unwrap();
        let headers = HashMap::from([("x-api-key".to_string(), "secret".to_string())]);
        let value = fetch_json(&Client::new(), &url, Method::POST, &headers).await.unwrap();

        assert_eq!(value["items"][1], 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_json_bodies_are_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/plain")
            .with_status(200)
            .with_body("hello")
            .create_async()
            .await;

        let url = validate_http_url(&format!("{}/plain", server.url())).unwrap();
        let err = fetch_json(&Client::new(), &url, Method::GET, &HashMap::new()).await.unwrap_err();
        assert!(matches!(err, ImportError::NotJson(_)));
    }

    #[tokio::test]
    async fn html_fetch_reports_upstream_status() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/missing").with_status(404).create_async().await;

        let url = validate_http_url(&format!("{}/missing", server.url())).unwrap();
        let err = fetch_html(&Client::new(), &url).await.unwrap_err();
        assert!(matches!(err, ImportError::Status(404)));
    }
}
