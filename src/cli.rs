use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "tunelink",
    about = "Local music-library server — desktop playback, phone remotes, synced ratings",
    long_about = None,
    version,
)]
pub struct Args {
    /// HTTP/WebSocket port to listen on [default: 3000]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to TOML config file (overrides default search: ./tunelink.toml, ~/.config/tunelink/config.toml)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory of static front-end files [default: public]
    #[arg(long, value_name = "DIR")]
    pub assets: Option<PathBuf>,

    /// Session preferences file (last folder, copy destination) [default: ~/.config/tunelink/prefs.json]
    #[arg(long, value_name = "FILE")]
    pub prefs: Option<PathBuf>,

    /// Library snapshot cache file [default: ~/.config/tunelink/library-cache.json]
    #[arg(long, value_name = "FILE")]
    pub cache: Option<PathBuf>,

    /// Bind to localhost only (127.0.0.1) instead of all interfaces
    #[arg(long)]
    pub localhost: bool,
}
