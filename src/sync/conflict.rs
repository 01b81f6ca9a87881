//! Content-based conflict detection and diff rendering.

use crate::error::{Result, SyncError};
use crate::transport::Transport;
use chrono::{DateTime, Local};
use similar::TextDiff;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A divergence between the local and remote copies of one file.
///
/// Constructed only when the remote object exists and its content differs
/// byte-for-byte from the local content.
#[derive(Debug, Clone)]
pub struct Conflict {
    pub relative_path: PathBuf,
    pub local_content: Vec<u8>,
    pub remote_content: Vec<u8>,
    pub local_modified: Option<SystemTime>,
    pub remote_modified: Option<SystemTime>,
}

impl Conflict {
    pub fn file_name(&self) -> String {
        self.relative_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Outcome of comparing a local file with its remote counterpart.
#[derive(Debug)]
pub enum Detection {
    /// No remote object; a plain upload.
    RemoteMissing,
    /// Remote content is byte-identical; nothing to transfer.
    Identical,
    /// Contents diverge.
    Conflict(Box<Conflict>),
}

/// Compare the local file against the remote copy.
///
/// One remote existence check, then one content fetch when the object is
/// present. Pure with respect to local state: running it twice over
/// unchanged content yields the same outcome.
pub async fn detect<T: Transport + ?Sized>(
    transport: &T,
    local_abs: &Path,
    rel_path: &Path,
    remote_dir: &str,
    file_name: &str,
) -> Result<Detection> {
    if !transport.exists(remote_dir, file_name).await? {
        return Ok(Detection::RemoteMissing);
    }

    let remote_content = transport.fetch(remote_dir, file_name).await?;
    let local_content = tokio::fs::read(local_abs).await?;

    if local_content == remote_content {
        return Ok(Detection::Identical);
    }

    let local_modified = tokio::fs::metadata(local_abs)
        .await
        .ok()
        .and_then(|m| m.modified().ok());

    Ok(Detection::Conflict(Box::new(Conflict {
        relative_path: rel_path.to_path_buf(),
        local_content,
        remote_content,
        local_modified,
        // lftp's listing does not give us a reliable mtime for the remote
        // side, so it stays unknown.
        remote_modified: None,
    })))
}

/// Render a unified diff of remote vs. local content.
///
/// Fails with `DiffRender` when either side is not valid UTF-8 text; the
/// caller degrades to a "diff unavailable" line, and the conflict is still
/// resolved normally.
pub fn render_diff(conflict: &Conflict) -> Result<String> {
    let remote = text_content(&conflict.remote_content).ok_or_else(|| SyncError::DiffRender {
        path: conflict.relative_path.clone(),
    })?;
    let local = text_content(&conflict.local_content).ok_or_else(|| SyncError::DiffRender {
        path: conflict.relative_path.clone(),
    })?;

    let name = conflict.file_name();
    let diff = TextDiff::from_lines(remote, local);

    Ok(diff
        .unified_diff()
        .header(&format!("Remote: {}", name), &format!("Local: {}", name))
        .to_string())
}

/// Treat content as text only if it is valid UTF-8 with no NUL bytes.
fn text_content(bytes: &[u8]) -> Option<&str> {
    if bytes.contains(&0) {
        return None;
    }
    std::str::from_utf8(bytes).ok()
}

/// Format a modification time for the conflict banner.
pub fn format_mtime(mtime: Option<SystemTime>) -> String {
    match mtime {
        Some(t) => DateTime::<Local>::from(t)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => "unknown".to_string(),
    }
}

/// Derive the sibling name used by "download a copy":
/// `notes.txt` becomes `notes_remote.txt`, `Makefile` becomes
/// `Makefile_remote`. An existing file of the derived name is overwritten
/// deterministically.
pub fn remote_copy_name(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}_remote.{}", stem, ext),
        _ => format!("{}_remote", file_name),
    }
}
