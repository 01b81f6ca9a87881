use std::path::PathBuf;
use thiserror::Error;

use crate::transport::ToolOutput;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration file not found: {}\nCreate it with your FTP settings (see README for the required format).", .path.display())]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Error parsing configuration file {}: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("FTP connection test failed (exit code {:?})", .output.code)]
    Connectivity { output: ToolOutput },

    #[error("'lftp' command not found. Please install 'lftp' and ensure it's in PATH.")]
    ToolMissing,

    #[error("{operation} failed for {} (exit code {:?})", .path.display(), .output.code)]
    Transfer {
        path: PathBuf,
        operation: &'static str,
        output: ToolOutput,
    },

    #[error("{operation} timed out after {seconds}s for {}", .path.display())]
    TransferTimeout {
        path: PathBuf,
        operation: &'static str,
        seconds: u64,
    },

    #[error("Cannot render diff for binary file: {}", .path.display())]
    DiffRender { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;
