//! HTTP handlers for the extraction shell.

use std::path::PathBuf;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use serde_json::json;
use subtide_core::cid::ContentId;
use subtide_core::config::RunOptions;
use subtide_core::extraction::{ExtractionRequest, RunReport};
use subtide_core::metadata::MediaMetadata;
use tracing::{info, warn};

use crate::server::AppState;

/// Body of a `POST /extract` request.
#[derive(Debug, Deserialize)]
pub struct ExtractPayload {
    /// CID of the source video
    pub video_cid: String,
    /// Path or URL of the source file
    pub locator: String,
    /// Metadata bag supplied by the upstream system
    #[serde(default)]
    pub metadata: MediaMetadata,
    /// Artifact directory override
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Run option overrides; configuration defaults apply when absent
    #[serde(default)]
    pub options: Option<RunOptions>,
    /// Where the completion report is POSTed when the run finishes
    #[serde(default)]
    pub callback_url: Option<String>,
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Accepts one extraction run and executes it in the background.
///
/// Replies `202 Accepted` immediately; the outcome travels through the
/// callback URL (or only the logs when none was given).
pub async fn submit_extraction(
    State(state): State<AppState>,
    Json(payload): Json<ExtractPayload>,
) -> (StatusCode, Json<serde_json::Value>) {
    if payload.video_cid.is_empty() || payload.locator.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "video_cid and locator are required" })),
        );
    }

    let request = ExtractionRequest {
        video_cid: ContentId::new(payload.video_cid),
        locator: payload.locator,
        metadata: payload.metadata,
        output_dir: payload
            .output_dir
            .unwrap_or_else(|| state.config.extraction.output_dir.clone()),
        options: payload
            .options
            .unwrap_or_else(|| state.config.extraction.run_options()),
    };

    info!("Accepted extraction request for {}", request.video_cid);

    let engine = state.engine.clone();
    let client = state.http.clone();
    let callback_url = payload.callback_url;

    tokio::spawn(async move {
        let report = engine.run(&request).await;
        match callback_url {
            Some(url) => deliver_report(&client, &url, &report).await,
            None => info!(
                "Run for {} finished with {:?} (no callback configured)",
                request.video_cid, report.status
            ),
        }
    });

    (StatusCode::ACCEPTED, Json(json!({ "accepted": true })))
}

/// Delivers the completion report to the caller's callback URL: one POST
/// per run, best-effort.
async fn deliver_report(client: &reqwest::Client, url: &str, report: &RunReport) {
    match client.post(url).json(report).send().await {
        Ok(response) if response.status().is_success() => {
            info!("Delivered completion report to {url}");
        }
        Ok(response) => warn!(
            "Callback {url} answered {}; report dropped",
            response.status()
        ),
        Err(e) => warn!("Failed to deliver completion report to {url}: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use subtide_core::config::SubtideConfig;
    use subtide_core::extraction::{ExtractionEngine, SimulationStreamExtractor};
    use subtide_core::metadata::InMemoryMetadataLink;
    use tower::ServiceExt;

    use super::*;
    use crate::server::router;

    fn test_state() -> AppState {
        let config = SubtideConfig::for_testing();
        let engine = Arc::new(ExtractionEngine::new(
            config.extraction.clone(),
            Arc::new(SimulationStreamExtractor::new()),
            Arc::new(InMemoryMetadataLink::new()),
        ));
        AppState {
            engine,
            config,
            http: reqwest::Client::new(),
        }
    }

    #[tokio::test]
    async fn test_health_answers_ok() {
        let app = router(test_state());

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_extract_rejects_missing_fields() {
        let app = router(test_state());

        let request = Request::post("/extract")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"video_cid": "", "locator": ""}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_extract_accepts_work() {
        let app = router(test_state());
        let workdir = tempfile::tempdir().unwrap();

        let body = json!({
            "video_cid": "bvideocid",
            "locator": "/media/absent.mkv",
            "output_dir": workdir.path(),
            "metadata": { "media_type": "video" }
        });
        let request = Request::post("/extract")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[test]
    fn test_payload_defaults() {
        let payload: ExtractPayload =
            serde_json::from_str(r#"{"video_cid": "bcid", "locator": "/m.mkv"}"#).unwrap();

        assert!(payload.options.is_none());
        assert!(payload.callback_url.is_none());
        assert_eq!(payload.metadata, MediaMetadata::new());
    }
}
