//! Streams tracks from the currently loaded folder by sanitized filename.
//!
//! The serving root is an indirection consulted per request (rebound by every
//! `loadFolder`), not a mutated route table. The sanitized name is resolved
//! back to the on-disk name through the live snapshot; Range handling comes
//! from `ServeFile`.

use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tower::util::ServiceExt;
use tower_http::services::ServeFile;

use crate::server::state::AppState;

pub async fn serve_track(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    request: Request,
) -> Response {
    // resolve before any await so the read locks never cross a suspension
    let target = {
        let root = state
            .serving_root
            .read()
            .expect("serving root lock poisoned")
            .clone();
        let snapshot = state.snapshot.read().expect("snapshot lock poisoned");
        let track = snapshot
            .as_ref()
            .and_then(|s| s.tracks.iter().find(|t| t.filename == filename));
        match (root, track) {
            (Some(root), Some(track)) => root.join(&track.original_name),
            _ => return StatusCode::NOT_FOUND.into_response(),
        }
    };

    match ServeFile::new(target).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}
