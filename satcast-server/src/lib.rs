//! Satcast HTTP server
//!
//! Routes:
//! - `GET /health`
//! - `GET /actions`
//! - `POST /execute/{action}`
//! - `POST /execute-all`
//! - `GET /images/*` for the locally stored post images

pub mod handlers;
pub mod state;

use std::path::Path;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{services::ServeDir, trace::TraceLayer};

pub use state::AppState;

pub fn router(state: AppState, images_dir: &Path) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/actions", get(handlers::list_actions))
        .route("/execute/{action}", post(handlers::execute_action))
        .route("/execute-all", post(handlers::execute_all))
        .nest_service("/images", ServeDir::new(images_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
