//! FTP transfers via the system `lftp` binary.
//!
//! Every operation is one `lftp -e "<script>"` invocation with captured
//! output and a bounded timeout. Exit code 0 is success; anything else is a
//! failure carrying the tool's stdout/stderr for the user.

use super::{ToolOutput, Transport};
use crate::config::FtpSettings;
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

/// Upper bound on any single lftp invocation.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection probe timeout, passed to lftp's own `net:timeout`.
const PROBE_TIMEOUT_SECS: u64 = 15;

pub struct LftpTransport {
    settings: FtpSettings,
    remote_root: String,
}

impl LftpTransport {
    pub fn new(settings: FtpSettings, remote_root: String) -> Self {
        Self {
            settings,
            remote_root,
        }
    }

    /// Run one lftp script and capture its output.
    async fn run_script(
        &self,
        script: String,
        path: &Path,
        operation: &'static str,
        timeout: Duration,
    ) -> Result<ToolOutput> {
        let mut command = Command::new("lftp");
        command
            .arg("-u")
            .arg(format!("{},{}", self.settings.user, self.settings.password))
            .arg("-p")
            .arg(self.settings.port.to_string())
            .arg(&self.settings.host)
            .arg("-e")
            .arg(&script)
            .kill_on_drop(true);

        let output = match tokio::time::timeout(timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == ErrorKind::NotFound => return Err(SyncError::ToolMissing),
            Ok(Err(e)) => return Err(SyncError::Io(e)),
            Err(_) => {
                return Err(SyncError::TransferTimeout {
                    path: path.to_path_buf(),
                    operation,
                    seconds: timeout.as_secs(),
                })
            }
        };

        tracing::trace!("lftp {} exit={:?}", operation, output.status.code());

        Ok(ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[async_trait]
impl Transport for LftpTransport {
    async fn test_connection(&self) -> Result<()> {
        let script = format!(
            "set net:max-retries 2; set net:timeout {}; ls {}; bye",
            PROBE_TIMEOUT_SECS, self.remote_root
        );

        let output = self
            .run_script(
                script,
                Path::new(&self.remote_root),
                "connection test",
                Duration::from_secs(PROBE_TIMEOUT_SECS + 5),
            )
            .await?;

        if output.success() {
            Ok(())
        } else {
            Err(SyncError::Connectivity { output })
        }
    }

    async fn exists(&self, remote_dir: &str, file_name: &str) -> Result<bool> {
        let script = format!("cd {}; ls; bye", remote_dir);
        let path = PathBuf::from(remote_dir).join(file_name);

        let output = self
            .run_script(script, &path, "listing", COMMAND_TIMEOUT)
            .await?;

        // A failed cd usually means the directory itself is missing, which
        // for our purposes means the file is missing too.
        if !output.success() {
            tracing::debug!(
                "Remote listing of {} failed (exit {:?}); treating {} as absent",
                remote_dir,
                output.code,
                file_name
            );
            return Ok(false);
        }

        // Long-format listings put the name in the last column.
        Ok(output
            .stdout
            .lines()
            .filter_map(|line| line.split_whitespace().last())
            .any(|name| name == file_name))
    }

    async fn fetch(&self, remote_dir: &str, file_name: &str) -> Result<Vec<u8>> {
        let remote_path = PathBuf::from(remote_dir).join(file_name);

        // Stage into the system temp dir, well away from the watched tree,
        // so the download doesn't echo back through the event monitor.
        let staging = tempfile::Builder::new()
            .prefix("ftpwatch-fetch-")
            .tempfile()?;
        let staging_path = staging.path().to_path_buf();

        let script = format!(
            "set xfer:clobber on; cd {}; get {} -o {}; bye",
            remote_dir,
            file_name,
            staging_path.display()
        );

        let output = self
            .run_script(script, &remote_path, "download", COMMAND_TIMEOUT)
            .await?;

        if !output.success() {
            return Err(SyncError::Transfer {
                path: remote_path,
                operation: "download",
                output,
            });
        }

        let content = tokio::fs::read(&staging_path).await?;
        Ok(content)
        // `staging` drops here and unlinks the temp file.
    }

    async fn put(&self, local_path: &Path, remote_dir: &str, file_name: &str) -> Result<()> {
        let script = format!(
            "cd {}; put {} -o {}; bye",
            remote_dir,
            local_path.display(),
            file_name
        );

        let output = self
            .run_script(script, local_path, "upload", COMMAND_TIMEOUT)
            .await?;

        if output.success() {
            Ok(())
        } else {
            Err(SyncError::Transfer {
                path: local_path.to_path_buf(),
                operation: "upload",
                output,
            })
        }
    }

    async fn ensure_dir(&self, remote_dir: &str) -> Result<()> {
        let script = format!("mkdir -p {}; bye", remote_dir);

        let output = self
            .run_script(
                script,
                Path::new(remote_dir),
                "create directory",
                COMMAND_TIMEOUT,
            )
            .await?;

        // Some servers report an error for an already-existing directory;
        // that is fine here. Real permission problems will surface on the
        // upload that follows.
        if !output.success() {
            tracing::debug!(
                "mkdir -p {} exited {:?}: {}",
                remote_dir,
                output.code,
                output.stderr.trim()
            );
        }
        Ok(())
    }
}
