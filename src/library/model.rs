use std::collections::BTreeSet;
use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A 0–5 star rating, or the explicit "never rated" sentinel.
///
/// Wire and cache encoding matches the remote clients: stars are a plain JSON
/// number, `Unrated` is the JSON string `"Unrated"`. A rating of 0 stars is a
/// real rating and is never collapsed into `Unrated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rating {
    Unrated,
    Stars(u8),
}

impl Serialize for Rating {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Rating::Stars(n) => serializer.serialize_u8(*n),
            Rating::Unrated => serializer.serialize_str("Unrated"),
        }
    }
}

struct RatingVisitor;

impl Visitor<'_> for RatingVisitor {
    type Value = Rating;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an integer 0-5 or the string \"Unrated\"")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Rating, E> {
        if v <= 5 {
            Ok(Rating::Stars(v as u8))
        } else {
            Err(E::invalid_value(de::Unexpected::Unsigned(v), &self))
        }
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Rating, E> {
        u64::try_from(v)
            .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
            .and_then(|v| self.visit_u64(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Rating, E> {
        if v == "Unrated" {
            Ok(Rating::Unrated)
        } else {
            Err(E::invalid_value(de::Unexpected::Str(v), &self))
        }
    }
}

impl<'de> Deserialize<'de> for Rating {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Rating, D::Error> {
        deserializer.deserialize_any(RatingVisitor)
    }
}

/// One audio file in a loaded library folder.
///
/// Identity is `filename` (the sanitized name, unique within a folder).
/// `rating` is the only field ever mutated in place; everything else is fixed
/// until the next load replaces the whole track list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Sanitized filename — the identity clients address the track by.
    pub filename: String,
    /// On-disk filename, needed to resolve the real file under the folder.
    pub original_name: String,
    /// URL path the clients stream from, e.g. `/music/song.mp3`.
    pub path: String,
    pub rating: Rating,
    /// Never empty — files without a genre tag get `["Unknown"]`.
    pub genres: Vec<String>,
}

/// One loaded library state: the folder it came from, its ordered track list,
/// and the union of all track genres. At most one snapshot is active at a
/// time, and at most one is persisted to the cache file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibrarySnapshot {
    pub folder: String,
    pub tracks: Vec<Track>,
    /// Sorted ascending; always exactly the union of all `tracks[..].genres`.
    pub genres: Vec<String>,
}

impl LibrarySnapshot {
    /// Build a snapshot from a track list, deriving the genre union.
    pub fn from_tracks(folder: String, tracks: Vec<Track>) -> Self {
        let genres: BTreeSet<String> = tracks
            .iter()
            .flat_map(|t| t.genres.iter().cloned())
            .collect();
        LibrarySnapshot {
            folder,
            tracks,
            genres: genres.into_iter().collect(),
        }
    }

    pub fn track_index(&self, filename: &str) -> Option<usize> {
        self.tracks.iter().position(|t| t.filename == filename)
    }
}
