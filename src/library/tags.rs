//! ID3 tag accessor: POPM star ratings and TCON genres.
//!
//! Ratings live in a POPM (popularimeter) frame on the standard 0–255 scale;
//! 51 raw units per star maps it onto 0–5 (5 × 51 = 255). An absent frame
//! means `Unrated` — distinct from a frame carrying 0.

use std::path::Path;

use id3::frame::{Content, Popularimeter};
use id3::{Frame, Tag, TagLike, Version};

use crate::library::model::Rating;

/// Raw POPM units per star.
pub const RATING_STEP: u8 = 51;

/// Identifier written into the POPM email field, as ID3v2.3 requires one.
const POPM_USER: &str = "tunelink@local";

#[derive(Debug, thiserror::Error)]
pub enum TagError {
    #[error("failed to read tags: {0}")]
    Read(#[source] id3::Error),
    #[error("failed to write tags: {0}")]
    Write(#[source] id3::Error),
}

pub fn decode_rating(raw: u8) -> Rating {
    Rating::Stars(raw / RATING_STEP)
}

pub fn encode_rating(stars: u8) -> u8 {
    stars * RATING_STEP
}

/// Read the tag at `path`. A file with no ID3 tag at all is not an error —
/// it reads as an empty tag (no rating, no genre).
fn read_or_empty(path: &Path) -> Result<Tag, TagError> {
    match Tag::read_from_path(path) {
        Ok(tag) => Ok(tag),
        Err(e) if matches!(e.kind, id3::ErrorKind::NoTag) => Ok(Tag::new()),
        Err(e) => Err(TagError::Read(e)),
    }
}

fn popularimeter(tag: &Tag) -> Option<&Popularimeter> {
    tag.frames().find_map(|frame| match frame.content() {
        Content::Popularimeter(popm) => Some(popm),
        _ => None,
    })
}

/// Split a raw TCON value into the genre list. Comma-separated, trimmed;
/// absent or effectively empty becomes `["Unknown"]`.
pub fn split_genres(raw: Option<&str>) -> Vec<String> {
    let genres: Vec<String> = raw
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string)
        .collect();
    if genres.is_empty() {
        vec!["Unknown".to_string()]
    } else {
        genres
    }
}

/// Read the decoded rating and genre list for one file in a single tag read.
pub fn read_track_tags(path: &Path) -> Result<(Rating, Vec<String>), TagError> {
    let tag = read_or_empty(path)?;
    let rating = popularimeter(&tag)
        .map(|p| decode_rating(p.rating))
        .unwrap_or(Rating::Unrated);
    Ok((rating, split_genres(tag.genre())))
}

/// Re-read just the rating, used to confirm a write actually round-trips.
pub fn read_rating(path: &Path) -> Result<Rating, TagError> {
    let tag = read_or_empty(path)?;
    Ok(popularimeter(&tag)
        .map(|p| decode_rating(p.rating))
        .unwrap_or(Rating::Unrated))
}

/// Write `stars` (0–5) into the POPM frame, bumping the play counter.
/// The counter defaults to 1 when no frame exists yet.
pub fn write_rating(path: &Path, stars: u8) -> Result<(), TagError> {
    let mut tag = read_or_empty(path)?;
    let counter = popularimeter(&tag).map(|p| p.counter + 1).unwrap_or(1);
    tag.remove("POPM");
    tag.add_frame(Frame::with_content(
        "POPM",
        Content::Popularimeter(Popularimeter {
            user: POPM_USER.to_string(),
            rating: encode_rating(stars),
            counter,
        }),
    ));
    tag.write_to_path(path, Version::Id3v24)
        .map_err(TagError::Write)
}
