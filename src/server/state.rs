use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;

use crate::library::model::LibrarySnapshot;
use crate::server::router::ServerEvent;
use crate::server::session::ClientId;

/// Shared state injected into HTTP handlers via axum::extract::State.
///
/// The snapshot and serving-root cells are written only by the dispatcher
/// task; handlers take brief read locks with no await in between.
#[derive(Clone)]
pub struct AppState {
    pub snapshot: Arc<RwLock<Option<LibrarySnapshot>>>,
    pub serving_root: Arc<RwLock<Option<PathBuf>>>,
    pub events: mpsc::UnboundedSender<ServerEvent>,
    next_id: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(
        snapshot: Arc<RwLock<Option<LibrarySnapshot>>>,
        serving_root: Arc<RwLock<Option<PathBuf>>>,
        events: mpsc::UnboundedSender<ServerEvent>,
    ) -> Self {
        AppState {
            snapshot,
            serving_root,
            events,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn next_client_id(&self) -> ClientId {
        ClientId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}
