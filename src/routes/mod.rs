mod api;
mod health;

pub use api::validate_submission;
pub use health::{health, status};

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::PipelineSettings;
use crate::state::AppState;

const FORM_FIELDS_ALLOWANCE: usize = 1024 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    let settings = state.pipeline.settings();
    // Oversized images still have to reach the pipeline to be reported per image.
    let body_limit = body_limit(settings);

    Router::new()
        .route("/api/ugc/validate", post(validate_submission))
        .route("/api/health", get(health))
        .route("/api/ugc/status", get(status))
        .nest_service("/uploads", ServeDir::new(&state.config.upload_folder))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn body_limit(settings: &PipelineSettings) -> usize {
    settings
        .max_file_size
        .saturating_mul(settings.required_images.saturating_add(1))
        .saturating_add(FORM_FIELDS_ALLOWANCE)
}
