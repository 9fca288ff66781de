//! Server wiring: capabilities, shared state, router, and listener.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use subtide_core::config::SubtideConfig;
use subtide_core::extraction::{ExtractionEngine, FfmpegStreamExtractor, StreamExtractor};
use subtide_core::metadata::{HttpMetadataLink, InMemoryMetadataLink, LinkError, MetadataLink};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::handlers::{health, submit_extraction};

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ExtractionEngine>,
    pub config: SubtideConfig,
    /// Client used for completion callback delivery
    pub http: reqwest::Client,
}

/// Builds the application router over `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/extract", post(submit_extraction))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Wires up production capabilities and serves the shell until shutdown.
///
/// # Errors
/// - `SubtideError::Link` - Metadata link or callback client construction
///   failed
/// - `SubtideError::Io` - Listener could not bind or serve
pub async fn run_server(config: SubtideConfig) -> subtide_core::Result<()> {
    let link: Arc<dyn MetadataLink> = match &config.server.metadata_url {
        Some(url) => Arc::new(HttpMetadataLink::new(url, config.server.callback_timeout)?),
        None => {
            info!("No metadata store configured; subtitle links stay in memory");
            Arc::new(InMemoryMetadataLink::new())
        }
    };

    let extractor = Arc::new(FfmpegStreamExtractor::new(
        config.extraction.tool_path.clone(),
        config.extraction.stream_timeout,
    ));
    if !extractor.is_available() {
        warn!(
            "Extraction tool {} is not runnable; stream extractions will fail",
            config.extraction.tool_path.display()
        );
    }

    let engine = Arc::new(ExtractionEngine::new(
        config.extraction.clone(),
        extractor,
        link,
    ));

    let http = reqwest::Client::builder()
        .timeout(config.server.callback_timeout)
        .build()
        .map_err(LinkError::from)?;

    let address = format!("{}:{}", config.server.bind_address, config.server.port);
    let state = AppState {
        engine,
        config,
        http,
    };

    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("Subtide listening on {address}");
    axum::serve(listener, router(state)).await?;

    Ok(())
}
