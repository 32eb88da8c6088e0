//! tunelink — local music-library server that keeps a desktop player and any
//! number of phone/browser remotes in sync over WebSockets, with ratings
//! written through to ID3 tags and a JSON snapshot cache per library folder.

pub mod cli;
pub mod config;
pub mod library;
pub mod prefs;
pub mod server;
