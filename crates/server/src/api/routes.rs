use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{handlers, media, middleware::metrics_middleware};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let max_upload = state.config().server.max_upload_bytes;

    let api_routes = Router::new()
        // Service
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Media
        .route("/info", post(media::info))
        .route("/probe", get(media::probe))
        .route("/convert", post(media::convert))
        .route("/screenshot", post(media::screenshot))
        .route("/remove-letterbox", post(media::remove_letterbox))
        .layer(DefaultBodyLimit::max(max_upload))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
