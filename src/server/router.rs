//! The dispatch engine.
//!
//! One task owns all mutable server state and consumes a single event queue,
//! so inbound messages across every connection are handled strictly one at a
//! time in arrival order — no handler needs locking. The live snapshot and
//! the serving root live in shared cells because the HTTP layer reads them
//! per request, but this task is their only writer.
//!
//! A background reload is the one operation split across scheduling turns:
//! the announce happens in the turn that received `reloadLibrary`, the scan
//! runs on the blocking pool, and the swap happens in the turn that receives
//! the completion event. Commands arriving in between keep operating on the
//! previous snapshot; a generation number guards the swap so a stale reload
//! result can never clobber a newer load.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use tokio::sync::mpsc;

use crate::library::cache::LibraryCache;
use crate::library::model::{LibrarySnapshot, Rating};
use crate::library::scanner::ScanError;
use crate::library::tags;
use crate::prefs::PrefsStore;
use crate::server::copy;
use crate::server::protocol::{Inbound, Outbound};
use crate::server::session::{ClientHandle, ClientId, Registry};

#[derive(Debug)]
pub enum ServerEvent {
    Connected(ClientHandle),
    Disconnected(ClientId),
    Inbound { from: ClientId, raw: String },
    ReloadFinished {
        generation: u64,
        result: Result<LibrarySnapshot, ScanError>,
        elapsed_secs: f64,
    },
}

pub struct ServerState {
    registry: Registry,
    /// Live snapshot cell, shared with the HTTP layer (read-only there).
    snapshot: Arc<RwLock<Option<LibrarySnapshot>>>,
    /// Folder the `/music` route currently serves from; rebound on loadFolder.
    serving_root: Arc<RwLock<Option<PathBuf>>>,
    /// The now-playing pointer: sanitized filename of the active track.
    now_playing: Option<String>,
    current_folder: Option<PathBuf>,
    prefs: PrefsStore,
    cache: Arc<LibraryCache>,
    /// Loops back reload completions into the event queue.
    events_tx: mpsc::UnboundedSender<ServerEvent>,
    /// Last issued load generation (foreground and background share it).
    load_generation: u64,
    /// Generation of the load currently reflected in the snapshot cell.
    applied_generation: u64,
}

impl ServerState {
    pub fn new(
        snapshot: Arc<RwLock<Option<LibrarySnapshot>>>,
        serving_root: Arc<RwLock<Option<PathBuf>>>,
        prefs: PrefsStore,
        cache: Arc<LibraryCache>,
        events_tx: mpsc::UnboundedSender<ServerEvent>,
    ) -> Self {
        ServerState {
            registry: Registry::new(),
            snapshot,
            serving_root,
            now_playing: None,
            current_folder: None,
            prefs,
            cache,
            events_tx,
            load_generation: 0,
            applied_generation: 0,
        }
    }

    pub fn now_playing(&self) -> Option<&str> {
        self.now_playing.as_deref()
    }

    pub async fn handle_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Connected(handle) => self.on_connected(handle),
            ServerEvent::Disconnected(id) => self.registry.unregister(id),
            ServerEvent::Inbound { from, raw } => self.on_inbound(from, raw).await,
            ServerEvent::ReloadFinished {
                generation,
                result,
                elapsed_secs,
            } => self.on_reload_finished(generation, result, elapsed_secs),
        }
    }

    fn on_connected(&mut self, handle: ClientHandle) {
        tracing::info!("{:?} client connected ({:?})", handle.role, handle.id);
        let fresh = handle.clone();
        if let Some(evicted) = self.registry.register(handle) {
            tracing::info!(
                "Desktop {:?} superseded by {:?}",
                evicted.id,
                fresh.id
            );
            evicted.send(Outbound::DesktopSuperseded.to_json());
        }
        // handshake: push persisted prefs to the new connection only
        let prefs = self.prefs.load();
        if let Some(folder) = prefs.last_folder.as_deref() {
            fresh.send(Outbound::LastFolder { folder }.to_json());
        }
        if let Some(folder) = prefs.destination_path.as_deref() {
            fresh.send(Outbound::DestinationPath { folder }.to_json());
        }
    }

    async fn on_inbound(&mut self, from: ClientId, raw: String) {
        let Some(message) = Inbound::parse(&raw) else {
            tracing::debug!("Ignoring unrecognized message from {:?}", from);
            return;
        };
        tracing::debug!("Dispatching {:?} from {:?}", message, from);

        if message.is_transport_control() {
            // pure forward, original bytes, desktop only
            match self.registry.desktop() {
                Some(desktop) => {
                    desktop.send(raw);
                }
                None => tracing::debug!("No desktop client registered, dropping control"),
            }
            return;
        }

        match message {
            Inbound::LoadFolder { folder } => self.load_folder(from, folder),
            Inbound::ReloadLibrary => self.reload_library(),
            Inbound::Rate { rating } => self.rate_current_track(rating),
            Inbound::UpdateNowPlaying { track } => {
                self.update_now_playing(track);
                self.registry.broadcast_remotes(&raw);
            }
            Inbound::UpdateProgress => self.registry.broadcast_remotes(&raw),
            Inbound::CopyFiles {
                destination_path,
                files,
            } => self.copy_files(from, destination_path, files),
            // transport controls handled above
            _ => {}
        }
    }

    fn next_generation(&mut self) -> u64 {
        self.load_generation += 1;
        self.load_generation
    }

    /// Foreground load: runs in this dispatch turn. The cache fast path makes
    /// this cheap for every normal folder-load; `reloadLibrary` is the
    /// explicit rescan path.
    fn load_folder(&mut self, from: ClientId, folder: String) {
        let folder_path = PathBuf::from(&folder);
        let generation = self.next_generation();
        let snapshot = match self.cache.load(&folder_path, true) {
            Ok(s) => s,
            Err(e) => {
                // fatal for this load only; the previous snapshot stays active
                tracing::warn!("Failed to load folder {}: {}", folder, e);
                return;
            }
        };

        self.applied_generation = generation;
        self.current_folder = Some(folder_path.clone());
        *self.serving_root.write().expect("serving root lock poisoned") = Some(folder_path);
        if let Err(e) = self.prefs.set_last_folder(&folder) {
            tracing::warn!("Cannot persist lastFolder: {}", e);
        }

        let reply = Outbound::PlaylistLoaded {
            playlist: &snapshot.tracks,
            genres: &snapshot.genres,
        }
        .to_json();
        *self.snapshot.write().expect("snapshot lock poisoned") = Some(snapshot);

        if let Some(sender) = self.registry.find(from) {
            sender.send(reply);
        }
    }

    /// Background reload: announce, scan off the dispatcher, swap on the
    /// completion event.
    fn reload_library(&mut self) {
        let Some(folder) = self.current_folder.clone() else {
            tracing::warn!("reloadLibrary with no folder loaded");
            return;
        };
        let generation = self.next_generation();
        self.registry
            .broadcast_all(&Outbound::ReloadingLibrary.to_json());

        let cache = Arc::clone(&self.cache);
        let events = self.events_tx.clone();
        tokio::task::spawn_blocking(move || {
            let start = Instant::now();
            let result = cache.load(&folder, false);
            let _ = events.send(ServerEvent::ReloadFinished {
                generation,
                result,
                elapsed_secs: start.elapsed().as_secs_f64(),
            });
        });
    }

    fn on_reload_finished(
        &mut self,
        generation: u64,
        result: Result<LibrarySnapshot, ScanError>,
        elapsed_secs: f64,
    ) {
        let snapshot = match result {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("Background reload failed: {}", e);
                return;
            }
        };
        if generation <= self.applied_generation {
            tracing::info!(
                "Discarding stale reload result (generation {} <= {})",
                generation,
                self.applied_generation
            );
            return;
        }
        self.applied_generation = generation;
        let update = Outbound::LibraryUpdated {
            playlist: &snapshot.tracks,
            genres: &snapshot.genres,
            elapsed_secs,
        }
        .to_json();
        // single assignment — readers see either the old or the new snapshot
        *self.snapshot.write().expect("snapshot lock poisoned") = Some(snapshot);
        self.registry.broadcast_all(&update);
        tracing::info!("Library reloaded in {:.1}s", elapsed_secs);
    }

    /// Set the now-playing pointer by filename lookup against the live
    /// snapshot. An absent or unknown filename clears it.
    fn update_now_playing(&mut self, track: Option<String>) {
        self.now_playing = track.filter(|filename| {
            self.snapshot
                .read()
                .expect("snapshot lock poisoned")
                .as_ref()
                .is_some_and(|s| s.track_index(filename).is_some())
        });
    }

    /// The rating pipeline: resolve the global pointer, write the tag, patch
    /// the live track in place, re-read for a confirmed rating, persist the
    /// snapshot, broadcast. Any failure before the patch leaves everything
    /// untouched and broadcasts nothing.
    fn rate_current_track(&mut self, rating: u8) {
        if rating > 5 {
            tracing::warn!("Ignoring out-of-range rating {}", rating);
            return;
        }
        let Some(filename) = self.now_playing.clone() else {
            tracing::info!("No track playing to rate");
            return;
        };
        let Some(folder) = self.current_folder.clone() else {
            tracing::warn!("Rate with no folder loaded");
            return;
        };

        // the pointer resolves against whatever snapshot is live right now
        let original_name = {
            let snapshot = self.snapshot.read().expect("snapshot lock poisoned");
            let Some(track) = snapshot
                .as_ref()
                .and_then(|s| s.tracks.iter().find(|t| t.filename == filename))
            else {
                tracing::warn!("Now-playing track {:?} not in playlist", filename);
                return;
            };
            track.original_name.clone()
        };
        let file_path = folder.join(&original_name);

        tracing::info!("Rating {:?} with {} stars", filename, rating);
        if let Err(e) = tags::write_rating(&file_path, rating) {
            tracing::warn!("Failed to save rating for {}: {}", file_path.display(), e);
            return;
        }

        // confirm by re-reading the tag rather than trusting the write
        let confirmed = match tags::read_rating(&file_path) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Cannot confirm rating for {}: {}", file_path.display(), e);
                Rating::Unrated
            }
        };

        let updated = {
            let mut snapshot = self.snapshot.write().expect("snapshot lock poisoned");
            let Some(snapshot) = snapshot.as_mut() else {
                return;
            };
            let Some(index) = snapshot.track_index(&filename) else {
                return;
            };
            snapshot.tracks[index].rating = Rating::Stars(rating);
            (snapshot.clone(), index)
        };
        let (snapshot, index) = updated;
        self.cache.persist(&snapshot);

        self.registry.broadcast_all(
            &Outbound::PlaylistUpdated {
                playlist: &snapshot.tracks,
                updated_rating: confirmed,
                updated_track_index: index,
            }
            .to_json(),
        );
    }

    /// Resolve the requested filenames through the live snapshot and hand the
    /// batch to a spawned copy job that streams events to the requester only.
    fn copy_files(&mut self, from: ClientId, destination_path: String, files: Vec<String>) {
        if destination_path.trim().is_empty() {
            tracing::warn!("copyFiles with empty destination path, ignoring");
            return;
        }
        let Some(requester) = self.registry.find(from).cloned() else {
            return;
        };
        let Some(folder) = self.current_folder.clone() else {
            tracing::warn!("copyFiles with no folder loaded");
            return;
        };

        let sources: Vec<PathBuf> = {
            let snapshot = self.snapshot.read().expect("snapshot lock poisoned");
            files
                .iter()
                .map(|name| {
                    let on_disk = snapshot
                        .as_ref()
                        .and_then(|s| s.tracks.iter().find(|t| &t.filename == name))
                        .map(|t| t.original_name.clone())
                        // unknown names fall through to a per-file copy failure
                        .unwrap_or_else(|| name.clone());
                    folder.join(on_disk)
                })
                .collect()
        };

        tracing::info!(
            "Copying {} files to {} for {:?}",
            sources.len(),
            destination_path,
            from
        );
        if let Err(e) = self.prefs.set_destination_path(&destination_path) {
            tracing::warn!("Cannot persist destinationPath: {}", e);
        }
        tokio::spawn(copy::run_copy_job(
            PathBuf::from(destination_path),
            sources,
            requester,
        ));
    }
}

/// Drive the dispatcher until every event sender is dropped.
pub async fn run(mut state: ServerState, mut events_rx: mpsc::UnboundedReceiver<ServerEvent>) {
    while let Some(event) = events_rx.recv().await {
        state.handle_event(event).await;
    }
}
