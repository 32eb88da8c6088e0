pub mod copy;
pub mod media;
pub mod protocol;
pub mod router;
pub mod session;
pub mod state;
pub mod ws;

use std::path::Path;

use axum::{routing::get, Router};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::server::state::AppState;

pub fn build_router(state: AppState, assets: &Path) -> Router {
    Router::new()
        // WebSocket endpoints — the route, not message content, decides the role
        .route("/desktop", get(ws::ws_desktop))
        .route("/remote", get(ws::ws_remote))
        // Streams the currently loaded folder by sanitized filename
        .route("/music/{filename}", get(media::serve_track))
        .fallback_service(ServeDir::new(assets))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
