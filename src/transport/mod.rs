pub mod lftp;

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Captured output of one external-tool invocation.
///
/// Kept verbatim so failures can be surfaced to the user exactly as the
/// tool printed them.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Transfer abstraction over the external FTP tool.
///
/// The engine only ever talks to this trait; the concrete mechanism (lftp
/// today) can be swapped for a native protocol client without touching the
/// sync logic. Remote locations are addressed as a directory plus a file
/// name, matching how the tool's scripts `cd` then operate.
#[async_trait]
pub trait Transport: Send + Sync {
    /// One startup probe against the remote endpoint.
    async fn test_connection(&self) -> Result<()>;

    /// Whether `file_name` exists in `remote_dir`.
    async fn exists(&self, remote_dir: &str, file_name: &str) -> Result<bool>;

    /// Fetch the remote file's content.
    async fn fetch(&self, remote_dir: &str, file_name: &str) -> Result<Vec<u8>>;

    /// Upload a local file to `remote_dir/file_name`.
    async fn put(&self, local_path: &Path, remote_dir: &str, file_name: &str) -> Result<()>;

    /// Create `remote_dir` if missing. Idempotent; already-present is not
    /// an error.
    async fn ensure_dir(&self, remote_dir: &str) -> Result<()>;
}
