//! Wire protocol: UTF-8 JSON objects with a mandatory `action` discriminator.
//!
//! Inbound messages that fail to parse — malformed JSON or an unrecognized
//! action — are silently ignored; the server never sends an error response.
//! Transport-control and now-playing messages are forwarded as the original
//! bytes, so payload fields this server does not model survive the hop.

use serde::{Deserialize, Serialize};

use crate::library::model::{Rating, Track};

#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Inbound {
    LoadFolder {
        folder: String,
    },
    ReloadLibrary,
    Rate {
        rating: u8,
    },
    Play,
    Pause,
    Stop,
    Skip,
    PreviousTrack,
    NextTrack,
    UpdateNowPlaying {
        #[serde(default)]
        track: Option<String>,
    },
    UpdateProgress,
    CopyFiles {
        #[serde(default)]
        destination_path: String,
        #[serde(default)]
        files: Vec<String>,
    },
}

impl Inbound {
    pub fn parse(raw: &str) -> Option<Inbound> {
        serde_json::from_str(raw).ok()
    }

    /// True for the six pure-forward actions that target the desktop client.
    pub fn is_transport_control(&self) -> bool {
        matches!(
            self,
            Inbound::Play
                | Inbound::Pause
                | Inbound::Stop
                | Inbound::Skip
                | Inbound::PreviousTrack
                | Inbound::NextTrack
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Outbound<'a> {
    PlaylistLoaded {
        playlist: &'a [Track],
        genres: &'a [String],
    },
    ReloadingLibrary,
    LibraryUpdated {
        playlist: &'a [Track],
        genres: &'a [String],
        elapsed_secs: f64,
    },
    PlaylistUpdated {
        playlist: &'a [Track],
        updated_rating: Rating,
        updated_track_index: usize,
    },
    LastFolder {
        folder: &'a str,
    },
    DestinationPath {
        folder: &'a str,
    },
    /// Sent to a desktop connection that a newer desktop registration replaced.
    DesktopSuperseded,
    CopyProgress {
        progress: u32,
    },
    CopyComplete {
        copied: usize,
    },
}

impl Outbound<'_> {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("outbound message serializes")
    }
}
