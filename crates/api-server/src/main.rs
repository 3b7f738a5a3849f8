use std::net::SocketAddr;
use std::sync::Arc;

use shared::config::ApiConfig;
use shared::llm::{GeminiEmbedder, GeminiGateway, GeminiGatewayConfig};
use shared::push::FcmSender;
use shared::repos::Store;
use shared::whatsapp::HttpTranscriber;
use tracing::{error, info, warn};

mod http;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "api_server=debug,shared=debug,axum=info".to_string()),
        )
        .init();

    let config = match ApiConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("failed to read api config: {err}");
            std::process::exit(1);
        }
    };

    let store = match Store::connect(&config.database_url, config.database_max_connections).await {
        Ok(store) => store,
        Err(err) => {
            error!("failed to connect to postgres: {err}");
            std::process::exit(1);
        }
    };

    let gateway = match GeminiGatewayConfig::from_env().and_then(GeminiGateway::new) {
        Ok(gateway) => Arc::new(gateway),
        Err(err) => {
            error!("failed to build llm gateway: {err}");
            std::process::exit(1);
        }
    };

    let embedder = match GeminiEmbedder::new(config.gemini_api_key.clone()) {
        Ok(embedder) => Some(Arc::new(embedder)),
        Err(err) => {
            warn!("embedding client unavailable, consulta runs non-semantic: {err}");
            None
        }
    };

    let push = match FcmSender::from_service_account_file(&config.fcm_service_account_path) {
        Ok(sender) => Some(Arc::new(sender)),
        Err(err) => {
            warn!("push sender unavailable, notifications disabled: {err}");
            None
        }
    };

    let transcriber = Arc::new(HttpTranscriber::new(
        config
            .stt_base_url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
        config.stt_api_key.clone(),
    ));

    let bind_addr = config.bind_addr.clone();
    let state = http::AppState {
        store,
        config,
        gateway,
        embedder: embedder.map(|e| e as Arc<dyn shared::llm::Embedder>),
        push,
        transcriber,
        http_client: reqwest::Client::new(),
    };

    let app = http::build_router(state);

    let addr: SocketAddr = bind_addr
        .parse()
        .unwrap_or_else(|_| "0.0.0.0:8000".parse().expect("valid default bind addr"));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("bind should succeed");

    info!(
        "api server listening on {}",
        listener.local_addr().unwrap_or(addr)
    );
    axum::serve(listener, app).await.expect("server should run");
}
