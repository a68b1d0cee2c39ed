//! Cloud Assistant HTTP Server
//!
//! Axum server exposing the agent session:
//!
//! - `POST /assistant` `{prompt, stream}` → `{response}` or server-sent events
//! - `GET /health` → `{"status": "healthy"}`

mod handlers;
mod state;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use assistant_core::LlmProvider;
use assistant_runtime::Settings;

use crate::handlers::{assistant_handler, health_check};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load()?;
    let mut session = settings.build_session()?;

    // Verify Ollama connection
    let provider = session.provider().clone();
    match provider.health_check().await {
        Ok(true) => {
            tracing::info!("✓ Connected to Ollama at {}", settings.ollama.base_url());
            if let Ok(models) = provider.list_models().await {
                for model in models {
                    tracing::info!("  Model: {}", model.id);
                }
            }
        }
        Ok(false) | Err(_) => {
            tracing::warn!("⚠ Ollama not available - requests will fail");
            tracing::warn!("  Make sure Ollama is running: ollama serve");
        }
    }

    // Tools and capability sessions are loaded before the first request
    match session.setup().await {
        Ok(()) => {
            tracing::info!("Loaded {} tools:", session.tool_count());
            for name in session.tool_names() {
                tracing::info!("  • {}", name);
            }
        }
        Err(e) => {
            tracing::error!("Agent setup failed, will retry on first request: {}", e);
        }
    }

    let state = AppState::new(session);
    let app = router(state.clone())
        .layer(cors_layer(&settings.cors_origins))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 cloud assistant running on http://{}", settings.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health     - Health check");
    tracing::info!("  POST /assistant  - Ask the assistant (set \"stream\": true for SSE)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let report = state.session.lock().await.cleanup().await;
    tracing::info!(closed = report.closed.len(), failed = report.failures.len(), "Shut down");

    Ok(())
}

/// Routes without the outer layers
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/assistant", post(assistant_handler))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    layer.allow_origin(origins)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested, closing capability sessions");
}
