use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_PORT: u16 = 3000;

/// Default location for a persisted state file (prefs, library cache):
/// `~/.config/tunelink/<name>`, falling back to the working directory.
fn default_state_file(name: &str) -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("tunelink").join(name))
        .unwrap_or_else(|| PathBuf::from(name))
}

#[derive(Deserialize, Default, Debug)]
pub struct FileConfig {
    pub port: Option<u16>,
    pub localhost: Option<bool>,
    pub assets: Option<PathBuf>,
    pub prefs: Option<PathBuf>,
    pub cache: Option<PathBuf>,
}

#[derive(Debug)]
pub struct Config {
    pub port: u16,
    pub localhost: bool,
    /// Directory of static front-end files served at the root.
    pub assets: PathBuf,
    /// Persisted session preferences (lastFolder, destinationPath).
    pub prefs: PathBuf,
    /// Library snapshot cache file.
    pub cache: PathBuf,
}

impl Config {
    pub fn resolve(file: Option<FileConfig>, args: &crate::cli::Args) -> Self {
        let file = file.unwrap_or_default();
        Config {
            port: args.port.or(file.port).unwrap_or(DEFAULT_PORT),
            localhost: args.localhost || file.localhost.unwrap_or(false),
            assets: args
                .assets
                .clone()
                .or(file.assets)
                .unwrap_or_else(|| PathBuf::from("public")),
            prefs: args
                .prefs
                .clone()
                .or(file.prefs)
                .unwrap_or_else(|| default_state_file("prefs.json")),
            cache: args
                .cache
                .clone()
                .or(file.cache)
                .unwrap_or_else(|| default_state_file("library-cache.json")),
        }
    }
}

pub fn find_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_owned());
    }
    let cwd_config = PathBuf::from("tunelink.toml");
    if cwd_config.exists() {
        return Some(cwd_config);
    }
    if let Some(config_dir) = dirs::config_dir() {
        let xdg_config = config_dir.join("tunelink").join("config.toml");
        if xdg_config.exists() {
            return Some(xdg_config);
        }
    }
    None
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

pub fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: FileConfig = toml::from_str(&content)?;
    Ok(config)
}
