//! Dispatch engine tests: role-based fan-out, desktop supersession, the
//! rating pipeline, and background reload sequencing — driven by feeding
//! events straight into the server state, the same way the run loop does.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use id3::TagLike;
use tempfile::{tempdir, TempDir};
use tokio::sync::mpsc;

use tunelink::library::cache::LibraryCache;
use tunelink::library::model::Rating;
use tunelink::prefs::PrefsStore;
use tunelink::server::router::{ServerEvent, ServerState};
use tunelink::server::session::{ClientHandle, ClientId, Role};

struct TestClient {
    handle: ClientHandle,
    rx: mpsc::UnboundedReceiver<String>,
}

impl TestClient {
    fn new(id: u64, role: Role) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        TestClient {
            handle: ClientHandle::new(ClientId(id), role, tx),
            rx,
        }
    }

    fn recv_json(&mut self) -> serde_json::Value {
        let raw = self.rx.try_recv().expect("expected a queued message");
        serde_json::from_str(&raw).expect("message is JSON")
    }

    /// Like `recv_json`, but waits — for messages produced by a spawned job
    /// rather than inside the dispatch turn.
    async fn next_json(&mut self) -> serde_json::Value {
        let raw = self.rx.recv().await.expect("expected a message");
        serde_json::from_str(&raw).expect("message is JSON")
    }

    fn assert_silent(&mut self) {
        assert!(
            self.rx.try_recv().is_err(),
            "expected no queued messages for this client"
        );
    }
}

struct Harness {
    state: ServerState,
    events_rx: mpsc::UnboundedReceiver<ServerEvent>,
    _dir: TempDir,
    music: PathBuf,
}

fn write_mp3(dir: &Path, name: &str) {
    std::fs::write(dir.join(name), [0u8; 64]).unwrap();
}

fn setup() -> Harness {
    let dir = tempdir().unwrap();
    let music = dir.path().join("music");
    std::fs::create_dir(&music).unwrap();
    write_mp3(&music, "a.mp3");
    write_mp3(&music, "b.mp3");

    let prefs = PrefsStore::new(dir.path().join("prefs.json"));
    let cache = Arc::new(LibraryCache::new(dir.path().join("cache.json")));
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let state = ServerState::new(
        Arc::new(RwLock::new(None)),
        Arc::new(RwLock::new(None)),
        prefs,
        cache,
        events_tx,
    );
    Harness {
        state,
        events_rx,
        _dir: dir,
        music,
    }
}

impl Harness {
    async fn connect(&mut self, client: &TestClient) {
        self.state
            .handle_event(ServerEvent::Connected(client.handle.clone()))
            .await;
    }

    async fn send(&mut self, client: &TestClient, raw: &str) {
        self.state
            .handle_event(ServerEvent::Inbound {
                from: client.handle.id,
                raw: raw.to_string(),
            })
            .await;
    }

    async fn load_music_folder(&mut self, client: &TestClient) {
        let raw = format!(
            r#"{{"action":"loadFolder","folder":"{}"}}"#,
            self.music.display()
        );
        self.send(client, &raw).await;
    }
}

#[tokio::test]
async fn transport_controls_forward_to_desktop_only() {
    let mut h = setup();
    let mut desktop = TestClient::new(1, Role::Desktop);
    let mut remote = TestClient::new(2, Role::Remote);
    h.connect(&desktop).await;
    h.connect(&remote).await;

    h.send(&remote, r#"{"action":"play"}"#).await;
    h.send(&remote, r#"{"action":"nextTrack"}"#).await;

    // forwarded verbatim, original bytes
    assert_eq!(desktop.rx.try_recv().unwrap(), r#"{"action":"play"}"#);
    assert_eq!(desktop.rx.try_recv().unwrap(), r#"{"action":"nextTrack"}"#);
    remote.assert_silent();
}

#[tokio::test]
async fn transport_controls_without_desktop_are_dropped() {
    let mut h = setup();
    let mut remote = TestClient::new(1, Role::Remote);
    h.connect(&remote).await;
    h.send(&remote, r#"{"action":"pause"}"#).await;
    remote.assert_silent();
}

#[tokio::test]
async fn second_desktop_supersedes_first() {
    let mut h = setup();
    let mut first = TestClient::new(1, Role::Desktop);
    let mut second = TestClient::new(2, Role::Desktop);
    let mut remote = TestClient::new(3, Role::Remote);
    h.connect(&first).await;
    h.connect(&remote).await;
    h.connect(&second).await;

    // the superseded desktop is told it lost authority
    assert_eq!(first.recv_json()["action"], "desktopSuperseded");

    h.send(&remote, r#"{"action":"play"}"#).await;
    assert_eq!(second.rx.try_recv().unwrap(), r#"{"action":"play"}"#);
    first.assert_silent();

    // the stale desktop disconnecting must not unseat the new one
    h.state
        .handle_event(ServerEvent::Disconnected(first.handle.id))
        .await;
    h.send(&remote, r#"{"action":"stop"}"#).await;
    assert_eq!(second.rx.try_recv().unwrap(), r#"{"action":"stop"}"#);
}

#[tokio::test]
async fn load_folder_replies_to_sender_only_and_persists_last_folder() {
    let mut h = setup();
    let mut desktop = TestClient::new(1, Role::Desktop);
    let mut remote = TestClient::new(2, Role::Remote);
    h.connect(&desktop).await;
    h.connect(&remote).await;

    h.load_music_folder(&remote).await;
    let reply = remote.recv_json();
    assert_eq!(reply["action"], "playlistLoaded");
    assert_eq!(reply["playlist"].as_array().unwrap().len(), 2);
    assert_eq!(reply["playlist"][0]["filename"], "a.mp3");
    assert_eq!(reply["playlist"][0]["rating"], "Unrated");
    desktop.assert_silent();

    // a later connection gets the folder in its handshake
    let mut late = TestClient::new(3, Role::Remote);
    h.connect(&late).await;
    let handshake = late.recv_json();
    assert_eq!(handshake["action"], "lastFolder");
    assert_eq!(handshake["folder"], h.music.display().to_string());
}

#[tokio::test]
async fn unknown_or_malformed_messages_are_ignored() {
    let mut h = setup();
    let mut remote = TestClient::new(1, Role::Remote);
    h.connect(&remote).await;
    h.send(&remote, r#"{"action":"selfDestruct"}"#).await;
    h.send(&remote, "not even json").await;
    remote.assert_silent();
}

#[tokio::test]
async fn update_now_playing_forwards_to_remotes_and_sets_pointer() {
    let mut h = setup();
    let mut desktop = TestClient::new(1, Role::Desktop);
    let mut remote = TestClient::new(2, Role::Remote);
    h.connect(&desktop).await;
    h.connect(&remote).await;
    h.load_music_folder(&desktop).await;
    desktop.recv_json(); // playlistLoaded

    let raw = r#"{"action":"updateNowPlaying","track":"b.mp3"}"#;
    h.send(&desktop, raw).await;
    assert_eq!(remote.rx.try_recv().unwrap(), raw);
    desktop.assert_silent();
    assert_eq!(h.state.now_playing(), Some("b.mp3"));

    // an absent track clears the pointer
    h.send(&desktop, r#"{"action":"updateNowPlaying"}"#).await;
    assert_eq!(h.state.now_playing(), None);
    remote.rx.try_recv().unwrap(); // forwarded regardless
}

#[tokio::test]
async fn unknown_now_playing_track_clears_pointer() {
    let mut h = setup();
    let desktop = TestClient::new(1, Role::Desktop);
    h.connect(&desktop).await;
    h.load_music_folder(&desktop).await;

    h.send(&desktop, r#"{"action":"updateNowPlaying","track":"b.mp3"}"#)
        .await;
    assert_eq!(h.state.now_playing(), Some("b.mp3"));
    h.send(&desktop, r#"{"action":"updateNowPlaying","track":"ghost.mp3"}"#)
        .await;
    assert_eq!(h.state.now_playing(), None);
}

#[tokio::test]
async fn update_progress_fans_out_to_remotes_only() {
    let mut h = setup();
    let mut desktop = TestClient::new(1, Role::Desktop);
    let mut remote_a = TestClient::new(2, Role::Remote);
    let mut remote_b = TestClient::new(3, Role::Remote);
    h.connect(&desktop).await;
    h.connect(&remote_a).await;
    h.connect(&remote_b).await;

    let raw = r#"{"action":"updateProgress","currentTime":12.5,"duration":180}"#;
    h.send(&desktop, raw).await;
    assert_eq!(remote_a.rx.try_recv().unwrap(), raw);
    assert_eq!(remote_b.rx.try_recv().unwrap(), raw);
    desktop.assert_silent();
}

#[tokio::test]
async fn rate_pipeline_writes_tag_patches_playlist_and_broadcasts() {
    let mut h = setup();
    let mut desktop = TestClient::new(1, Role::Desktop);
    let mut remote = TestClient::new(2, Role::Remote);
    h.connect(&desktop).await;
    h.connect(&remote).await;
    h.load_music_folder(&desktop).await;
    desktop.recv_json(); // playlistLoaded

    h.send(&desktop, r#"{"action":"updateNowPlaying","track":"b.mp3"}"#)
        .await;
    remote.rx.try_recv().unwrap(); // forwarded updateNowPlaying

    // the rate command may come from any connection — here, the remote
    h.send(&remote, r#"{"action":"rate","rating":5}"#).await;

    for client in [&mut desktop, &mut remote] {
        let update = client.recv_json();
        assert_eq!(update["action"], "playlistUpdated");
        assert_eq!(update["updatedRating"], 5);
        assert_eq!(update["updatedTrackIndex"], 1);
        assert_eq!(update["playlist"][1]["rating"], 5);
    }

    // the tag on disk really carries 5 stars
    let tag = id3::Tag::read_from_path(h.music.join("b.mp3")).unwrap();
    let popm = tag
        .frames()
        .find_map(|f| match f.content() {
            id3::frame::Content::Popularimeter(popm) => Some(popm),
            _ => None,
        })
        .unwrap();
    assert_eq!(popm.rating, 255);

    // and a cached reload still reflects it
    let cache = LibraryCache::new(h._dir.path().join("cache.json"));
    let snapshot = cache.load(&h.music, true).unwrap();
    assert_eq!(snapshot.tracks[1].rating, Rating::Stars(5));
}

#[tokio::test]
async fn rate_without_now_playing_does_nothing() {
    let mut h = setup();
    let mut desktop = TestClient::new(1, Role::Desktop);
    h.connect(&desktop).await;
    h.load_music_folder(&desktop).await;
    desktop.recv_json(); // playlistLoaded

    h.send(&desktop, r#"{"action":"rate","rating":3}"#).await;
    desktop.assert_silent();
}

#[tokio::test]
async fn copy_files_streams_to_requester_and_persists_destination() {
    let mut h = setup();
    let mut desktop = TestClient::new(1, Role::Desktop);
    let mut remote = TestClient::new(2, Role::Remote);
    h.connect(&desktop).await;
    h.connect(&remote).await;
    h.load_music_folder(&desktop).await;
    desktop.recv_json(); // playlistLoaded

    let dest = h._dir.path().join("dest");
    let raw = format!(
        r#"{{"action":"copyFiles","destinationPath":"{}","files":["a.mp3","b.mp3"]}}"#,
        dest.display()
    );
    h.send(&remote, &raw).await;

    // progress and the terminal event reach the requester only
    let first = remote.next_json().await;
    assert_eq!(first["action"], "copyProgress");
    assert_eq!(first["progress"], 50);
    assert_eq!(remote.next_json().await["progress"], 100);
    let terminal = remote.next_json().await;
    assert_eq!(terminal["action"], "copyComplete");
    assert_eq!(terminal["copied"], 2);
    desktop.assert_silent();
    assert!(dest.join("a.mp3").exists());
    assert!(dest.join("b.mp3").exists());

    // the destination lands in a later connection's handshake
    let mut late = TestClient::new(3, Role::Remote);
    h.connect(&late).await;
    assert_eq!(late.recv_json()["action"], "lastFolder");
    let handshake = late.recv_json();
    assert_eq!(handshake["action"], "destinationPath");
    assert_eq!(handshake["folder"], dest.display().to_string());
}

#[tokio::test]
async fn copy_files_with_empty_destination_is_ignored() {
    let mut h = setup();
    let mut remote = TestClient::new(1, Role::Remote);
    h.connect(&remote).await;
    h.load_music_folder(&remote).await;
    remote.recv_json(); // playlistLoaded

    h.send(
        &remote,
        r#"{"action":"copyFiles","destinationPath":"  ","files":["a.mp3"]}"#,
    )
    .await;

    // no job is spawned: give any stray task a chance to run, then check
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
    remote.assert_silent();

    // and nothing was persisted for the handshake
    let mut late = TestClient::new(2, Role::Remote);
    h.connect(&late).await;
    assert_eq!(late.recv_json()["action"], "lastFolder");
    late.assert_silent();
}

#[tokio::test]
async fn reload_announces_swaps_and_does_not_drop_queued_commands() {
    let mut h = setup();
    let mut desktop = TestClient::new(1, Role::Desktop);
    let mut remote = TestClient::new(2, Role::Remote);
    h.connect(&desktop).await;
    h.connect(&remote).await;
    h.load_music_folder(&desktop).await;
    desktop.recv_json(); // playlistLoaded
    h.send(&desktop, r#"{"action":"updateNowPlaying","track":"a.mp3"}"#)
        .await;
    remote.rx.try_recv().unwrap();

    // a new file appears, then a reload is requested
    write_mp3(&h.music, "c.mp3");
    h.send(&remote, r#"{"action":"reloadLibrary"}"#).await;
    assert_eq!(desktop.recv_json()["action"], "reloadingLibrary");
    assert_eq!(remote.recv_json()["action"], "reloadingLibrary");

    // a rate arriving while the scan runs is processed against the previous
    // snapshot, not dropped
    h.send(&remote, r#"{"action":"rate","rating":2}"#).await;
    assert_eq!(desktop.recv_json()["action"], "playlistUpdated");
    assert_eq!(remote.recv_json()["action"], "playlistUpdated");

    // the scan completion comes back through the event queue
    let finished = h.events_rx.recv().await.expect("reload completion event");
    h.state.handle_event(finished).await;

    for client in [&mut desktop, &mut remote] {
        let update = client.recv_json();
        assert_eq!(update["action"], "libraryUpdated");
        assert_eq!(update["playlist"].as_array().unwrap().len(), 3);
    }
}

#[tokio::test]
async fn stale_reload_result_cannot_clobber_newer_load() {
    let mut h = setup();
    let mut desktop = TestClient::new(1, Role::Desktop);
    h.connect(&desktop).await;
    h.load_music_folder(&desktop).await;
    desktop.recv_json(); // playlistLoaded

    h.send(&desktop, r#"{"action":"reloadLibrary"}"#).await;
    desktop.recv_json(); // reloadingLibrary

    // a foreground load lands before the reload completes
    h.load_music_folder(&desktop).await;
    desktop.recv_json(); // playlistLoaded

    let finished = h.events_rx.recv().await.expect("reload completion event");
    h.state.handle_event(finished).await;

    // the stale result is discarded: no libraryUpdated reaches anyone
    desktop.assert_silent();
}
