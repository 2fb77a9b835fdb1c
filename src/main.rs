use aichatbase::config::Config;
use aichatbase::services::storage::R2Store;
use aichatbase::services::{LlmClient, ObjectStore};
use aichatbase::{build_router, db, AppState};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_logging()?;

    let config = Config::from_env()?;

    let db_pool = db::create_pool(&config).await?;

    let llm_client = match &config.openai {
        Some(openai) => {
            tracing::info!(base_url = %openai.base_url, "Initializing LLM client...");
            Some(LlmClient::new(openai.api_key.clone(), openai.base_url.clone()))
        }
        None => {
            tracing::warn!("OPENAI_API_KEY not found. Chat completions will be unavailable.");
            None
        }
    };

    let storage: Option<Arc<dyn ObjectStore>> = match &config.storage {
        Some(storage_config) => {
            tracing::info!(bucket = %storage_config.bucket, "Initializing object storage...");
            Some(Arc::new(R2Store::connect(storage_config).await))
        }
        None => {
            tracing::warn!("R2 credentials not found. Document uploads and imports will be unavailable.");
            tracing::info!("To enable storage, set: R2_ACCOUNT_ID, R2_ACCESS_KEY_ID, R2_SECRET_ACCESS_KEY, R2_BUCKET");
            None
        }
    };

    let http_client = reqwest::Client::builder()
        .user_agent(concat!("aichatbase/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let bind_addr = config.bind_addr.clone();
    let shared_state = Arc::new(AppState {
        db_pool,
        config,
        llm_client,
        storage,
        http_client,
    });

    let app = build_router(shared_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    // ConnectInfo feeds the per-IP rate limiters
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "debug,aichatbase=trace,sqlx=info,reqwest=info,hyper=info,tower=info".to_string()
        } else {
            "info,aichatbase=info,sqlx=warn,reqwest=warn,hyper=warn,tower=warn".to_string()
        }
    });

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log_level))?;

    let fmt_layer = if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        // JSON logging for log aggregation
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("AIChatBase API starting up...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Build mode: {}",
        if cfg!(debug_assertions) { "development" } else { "production" }
    );
    tracing::info!("Log level: {}", log_level);

    Ok(())
}
