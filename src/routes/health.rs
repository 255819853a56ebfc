use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::state::AppState;

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "OK",
        "timestamp": Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Reports how the service is wired and whether the record store answers.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<Value> {
    let pipeline = &state.pipeline;
    let info = pipeline.info();
    let settings = pipeline.settings();
    let record_store = pipeline.record_store_reachable().await;

    Json(json!({
        "status": if record_store { "ok" } else { "degraded" },
        "recordStore": record_store,
        "classifierConfigured": info.classifier_configured,
        "blobBackends": info.blob_backends,
        "notifier": info.notifier,
        "limits": {
            "requiredImages": settings.required_images,
            "minAcceptedForReward": settings.min_accepted_for_reward,
            "maxFileSize": settings.max_file_size,
            "minImageWidth": settings.min_image_width,
            "acceptanceThreshold": settings.acceptance_threshold,
            "allowedMimeTypes": settings.allowed_mime_types,
            "reviewTextLength": [settings.review_text_min, settings.review_text_max],
        },
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
