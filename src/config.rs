use crate::error::{Result, SyncError};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// FTP endpoint settings.
#[derive(Debug, Clone, Deserialize)]
pub struct FtpSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

/// Local and remote sync roots.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncDirectories {
    pub remote: String,
    pub local: PathBuf,
}

/// Process-wide configuration, loaded once at startup and immutable after.
///
/// File format (JSON):
/// ```json
/// {
///   "ftp": { "host": "...", "port": 21, "user": "...", "password": "..." },
///   "directories": { "remote": "/site/htdocs", "local": "/home/me/site" },
///   "ignore": ["*.log", "build/", ".git/"]
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub ftp: FtpSettings,
    pub directories: SyncDirectories,
    #[serde(default)]
    pub ignore: Vec<String>,
}

impl Config {
    /// Load and validate the configuration file.
    ///
    /// A missing file, unreadable file, or malformed JSON is fatal; the
    /// process must not start watching with a partial configuration.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| SyncError::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut config: Config =
            serde_json::from_str(&raw).map_err(|e| SyncError::ConfigParse {
                path: path.to_path_buf(),
                source: e,
            })?;

        // Drop blank ignore entries so a trailing comma in the config
        // doesn't produce a match-everything rule.
        config.ignore = config
            .ignore
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        Ok(config)
    }
}
