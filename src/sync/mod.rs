pub mod conflict;
pub mod prompt;
pub mod session;
pub mod watch;

use crate::error::{Result, SyncError};
use crate::filter::IgnoreRules;
use crate::transport::Transport;
use colored::Colorize;
use conflict::Detection;
use prompt::{Choice, ConflictPrompt};
use session::SessionOverrides;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// What a single debounced fire ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Local file uploaded to the remote.
    Uploaded,
    /// Remote content written over the local file (choice 2).
    LocalOverwritten,
    /// Remote copy saved alongside, then local uploaded (choice 4).
    CopiedThenUploaded,
    /// Contents already identical; nothing transferred.
    SkippedIdentical,
    /// User chose to handle the conflict manually.
    SkippedByUser,
    /// Path is ignored or no longer a regular file.
    Ignored,
}

/// Top-level sync control: one debounced fire in, one resolved outcome out.
///
/// All conflict resolution and transfer dispatch for a path runs to
/// completion inside `handle_change` before the next fire for that path is
/// processed; the watch loop calls this sequentially, which also serializes
/// interactive prompts.
pub struct SyncEngine<T: Transport, P: ConflictPrompt> {
    transport: T,
    prompt: P,
    ignore: IgnoreRules,
    local_root: PathBuf,
    remote_root: String,
    check_conflicts: bool,
    session: SessionOverrides,
    /// Remote directories already confirmed to exist this run.
    ensured_dirs: HashSet<String>,
}

impl<T: Transport, P: ConflictPrompt> SyncEngine<T, P> {
    pub fn new(
        transport: T,
        prompt: P,
        ignore: IgnoreRules,
        local_root: PathBuf,
        remote_root: String,
        check_conflicts: bool,
    ) -> Self {
        let remote_root = remote_root.trim_end_matches('/').to_string();
        // The startup probe listed the remote root, so it needs no mkdir.
        let ensured_dirs = HashSet::from([remote_root.clone()]);

        Self {
            transport,
            prompt,
            ignore,
            local_root,
            remote_root,
            check_conflicts,
            session: SessionOverrides::new(),
            ensured_dirs,
        }
    }

    pub fn ignore_rules(&self) -> &IgnoreRules {
        &self.ignore
    }

    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    /// Remote directory holding `rel_path`'s file.
    fn remote_dir_for(&self, rel_path: &Path) -> String {
        match rel_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                let unified = parent.to_string_lossy().replace('\\', "/");
                format!("{}/{}", self.remote_root, unified)
            }
            None => self.remote_root.clone(),
        }
    }

    async fn upload(&mut self, abs: &Path, remote_dir: &str, file_name: &str) -> Result<()> {
        if !self.ensured_dirs.contains(remote_dir) {
            self.transport.ensure_dir(remote_dir).await?;
            self.ensured_dirs.insert(remote_dir.to_string());
        }
        self.transport.put(abs, remote_dir, file_name).await?;
        println!(
            "{} Uploaded: {} → {}/{}",
            "✓".green(),
            abs.display(),
            remote_dir,
            file_name
        );
        Ok(())
    }

    /// Process one debounced change for `rel_path`.
    pub async fn handle_change(&mut self, rel_path: &Path) -> Result<SyncOutcome> {
        let abs = self.local_root.join(rel_path);

        // Re-check ignore status: a path can start matching a rule after
        // the event was queued (generated build artifacts, for instance).
        if self.ignore.matches(rel_path, &abs) {
            tracing::debug!("Skipping ignored path: {}", rel_path.display());
            return Ok(SyncOutcome::Ignored);
        }

        // The file may have vanished between the event and the fire.
        if !abs.is_file() {
            tracing::debug!("Path no longer a regular file: {}", abs.display());
            return Ok(SyncOutcome::Ignored);
        }

        let file_name = match rel_path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => return Ok(SyncOutcome::Ignored),
        };
        let remote_dir = self.remote_dir_for(rel_path);

        tracing::info!(
            "Processing: {} → {}/{}",
            rel_path.display(),
            remote_dir,
            file_name
        );

        if self.check_conflicts {
            // Session memory is consulted before any remote inspection: an
            // overridden path never costs the round trip again this run.
            if self.session.get(rel_path).is_some() {
                println!(
                    "Auto-overriding {} (session choice)",
                    rel_path.display()
                );
            } else {
                match conflict::detect(&self.transport, &abs, rel_path, &remote_dir, &file_name)
                    .await?
                {
                    Detection::RemoteMissing => {
                        tracing::debug!("No remote file found, proceeding with upload");
                    }
                    Detection::Identical => {
                        println!(
                            "Files are identical, no conflict. Skipping upload for: {}",
                            file_name
                        );
                        return Ok(SyncOutcome::SkippedIdentical);
                    }
                    Detection::Conflict(found) => {
                        return self.resolve(*found, &abs, &remote_dir, &file_name).await;
                    }
                }
            }
        }

        self.upload(&abs, &remote_dir, &file_name).await?;
        Ok(SyncOutcome::Uploaded)
    }

    /// Run the resolution menu for a detected conflict and execute the
    /// chosen action.
    async fn resolve(
        &mut self,
        found: conflict::Conflict,
        abs: &Path,
        remote_dir: &str,
        file_name: &str,
    ) -> Result<SyncOutcome> {
        // Binary content degrades to no diff; the conflict itself still
        // goes through resolution.
        let diff = match conflict::render_diff(&found) {
            Ok(rendered) => Some(rendered),
            Err(SyncError::DiffRender { path }) => {
                tracing::debug!("Diff unavailable for {}", path.display());
                None
            }
            Err(e) => return Err(e),
        };

        let rel_path = found.relative_path.clone();
        let choice = self.prompt.present(&found, diff.as_deref())?;

        match choice {
            Choice::OverrideRemote => {
                self.upload(abs, remote_dir, file_name).await?;
                self.session.remember_force_upload(&rel_path);
                println!(
                    "Will always override {} for this session",
                    rel_path.display()
                );
                Ok(SyncOutcome::Uploaded)
            }
            Choice::OverrideLocal => {
                tokio::fs::write(abs, &found.remote_content).await?;
                println!(
                    "{} Local file updated with remote content: {}",
                    "✓".green(),
                    file_name
                );
                Ok(SyncOutcome::LocalOverwritten)
            }
            Choice::Skip => {
                println!("Skipping {} - handle manually", file_name);
                Ok(SyncOutcome::SkippedByUser)
            }
            Choice::DownloadCopy => {
                let copy_name = conflict::remote_copy_name(file_name);
                let copy_path = abs
                    .parent()
                    .map(|dir| dir.join(&copy_name))
                    .unwrap_or_else(|| PathBuf::from(&copy_name));

                // An existing copy of the derived name is overwritten; the
                // remote side is authoritative for this snapshot.
                tokio::fs::write(&copy_path, &found.remote_content).await?;
                println!("Remote copy saved as: {}", copy_name);

                self.upload(abs, remote_dir, file_name).await?;
                Ok(SyncOutcome::CopiedThenUploaded)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::prompt::testing::ScriptedPrompt;
    use crate::transport::ToolOutput;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Exists(String, String),
        Fetch(String, String),
        Put(String, String),
        EnsureDir(String),
    }

    /// Transport double: scripted remote content, recorded calls.
    #[derive(Clone, Default)]
    struct MockTransport {
        remote_content: Arc<Mutex<Option<Vec<u8>>>>,
        calls: Arc<Mutex<Vec<Call>>>,
        fail_put: bool,
    }

    impl MockTransport {
        fn with_remote(content: &[u8]) -> Self {
            Self {
                remote_content: Arc::new(Mutex::new(Some(content.to_vec()))),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
            self.calls().iter().filter(|c| pred(c)).count()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn test_connection(&self) -> crate::error::Result<()> {
            Ok(())
        }

        async fn exists(&self, remote_dir: &str, file_name: &str) -> crate::error::Result<bool> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Exists(remote_dir.to_string(), file_name.to_string()));
            Ok(self.remote_content.lock().unwrap().is_some())
        }

        async fn fetch(&self, remote_dir: &str, file_name: &str) -> crate::error::Result<Vec<u8>> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Fetch(remote_dir.to_string(), file_name.to_string()));
            Ok(self.remote_content.lock().unwrap().clone().unwrap())
        }

        async fn put(
            &self,
            local_path: &Path,
            remote_dir: &str,
            file_name: &str,
        ) -> crate::error::Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Put(remote_dir.to_string(), file_name.to_string()));
            if self.fail_put {
                return Err(SyncError::Transfer {
                    path: local_path.to_path_buf(),
                    operation: "upload",
                    output: ToolOutput {
                        code: Some(1),
                        stdout: String::new(),
                        stderr: "put: Access failed".to_string(),
                    },
                });
            }
            Ok(())
        }

        async fn ensure_dir(&self, remote_dir: &str) -> crate::error::Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::EnsureDir(remote_dir.to_string()));
            Ok(())
        }
    }

    fn engine_for(
        root: &TempDir,
        transport: MockTransport,
        choices: Vec<Choice>,
        check_conflicts: bool,
        ignore: &[&str],
    ) -> SyncEngine<MockTransport, ScriptedPrompt> {
        let patterns: Vec<String> = ignore.iter().map(|s| s.to_string()).collect();
        SyncEngine::new(
            transport,
            ScriptedPrompt::new(choices),
            IgnoreRules::new(&patterns),
            root.path().to_path_buf(),
            "/remote".to_string(),
            check_conflicts,
        )
    }

    #[tokio::test]
    async fn test_plain_upload_without_conflict_checking() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("a.txt"), "hello").unwrap();

        let transport = MockTransport::default();
        let mut engine = engine_for(&root, transport.clone(), vec![], false, &[]);

        let outcome = engine.handle_change(Path::new("a.txt")).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Uploaded);

        // No remote inspection happens when checking is off.
        assert_eq!(
            transport.calls(),
            vec![Call::Put("/remote".to_string(), "a.txt".to_string())]
        );
    }

    #[tokio::test]
    async fn test_remote_missing_uploads() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("a.txt"), "hello").unwrap();

        let transport = MockTransport::default(); // no remote content
        let mut engine = engine_for(&root, transport.clone(), vec![], true, &[]);

        let outcome = engine.handle_change(Path::new("a.txt")).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Uploaded);
        assert_eq!(transport.count(|c| matches!(c, Call::Exists(..))), 1);
        assert_eq!(transport.count(|c| matches!(c, Call::Fetch(..))), 0);
        assert_eq!(transport.count(|c| matches!(c, Call::Put(..))), 1);
    }

    #[tokio::test]
    async fn test_identical_content_skips_upload() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("a.txt"), "same").unwrap();

        let transport = MockTransport::with_remote(b"same");
        let mut engine = engine_for(&root, transport.clone(), vec![], true, &[]);

        // Detector is idempotent: unchanged content stays conflict-free.
        for _ in 0..2 {
            let outcome = engine.handle_change(Path::new("a.txt")).await.unwrap();
            assert_eq!(outcome, SyncOutcome::SkippedIdentical);
        }
        assert_eq!(transport.count(|c| matches!(c, Call::Put(..))), 0);
    }

    #[tokio::test]
    async fn test_override_remote_remembers_for_session() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("a.txt"), "hello").unwrap();

        let transport = MockTransport::with_remote(b"world");
        let mut engine = engine_for(
            &root,
            transport.clone(),
            vec![Choice::OverrideRemote],
            true,
            &[],
        );

        let outcome = engine.handle_change(Path::new("a.txt")).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Uploaded);
        assert_eq!(engine.prompt.presented.len(), 1);

        // A later edit uploads silently: no detector, no prompt.
        let outcome = engine.handle_change(Path::new("a.txt")).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Uploaded);
        assert_eq!(engine.prompt.presented.len(), 1);
        assert_eq!(transport.count(|c| matches!(c, Call::Exists(..))), 1);
        assert_eq!(transport.count(|c| matches!(c, Call::Put(..))), 2);
    }

    #[tokio::test]
    async fn test_skip_leaves_both_sides_and_reprompts_later() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("a.txt"), "hello").unwrap();

        let transport = MockTransport::with_remote(b"world");
        let mut engine = engine_for(
            &root,
            transport.clone(),
            vec![Choice::Skip, Choice::Skip],
            true,
            &[],
        );

        let outcome = engine.handle_change(Path::new("a.txt")).await.unwrap();
        assert_eq!(outcome, SyncOutcome::SkippedByUser);
        assert_eq!(transport.count(|c| matches!(c, Call::Put(..))), 0);
        assert_eq!(fs::read_to_string(root.path().join("a.txt")).unwrap(), "hello");

        // No override was recorded, so the same edit prompts again.
        let outcome = engine.handle_change(Path::new("a.txt")).await.unwrap();
        assert_eq!(outcome, SyncOutcome::SkippedByUser);
        assert_eq!(engine.prompt.presented.len(), 2);
    }

    #[tokio::test]
    async fn test_override_local_writes_remote_content() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("a.txt"), "hello").unwrap();

        let transport = MockTransport::with_remote(b"world");
        let mut engine = engine_for(
            &root,
            transport.clone(),
            vec![Choice::OverrideLocal],
            true,
            &[],
        );

        let outcome = engine.handle_change(Path::new("a.txt")).await.unwrap();
        assert_eq!(outcome, SyncOutcome::LocalOverwritten);
        assert_eq!(fs::read_to_string(root.path().join("a.txt")).unwrap(), "world");
        assert_eq!(transport.count(|c| matches!(c, Call::Put(..))), 0);
    }

    #[tokio::test]
    async fn test_download_copy_saves_sibling_then_uploads() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("a.txt"), "hello").unwrap();
        // A stale copy from an earlier conflict is overwritten.
        fs::write(root.path().join("a_remote.txt"), "stale").unwrap();

        let transport = MockTransport::with_remote(b"world");
        let mut engine = engine_for(
            &root,
            transport.clone(),
            vec![Choice::DownloadCopy, Choice::Skip],
            true,
            &[],
        );

        let outcome = engine.handle_change(Path::new("a.txt")).await.unwrap();
        assert_eq!(outcome, SyncOutcome::CopiedThenUploaded);
        assert_eq!(
            fs::read_to_string(root.path().join("a_remote.txt")).unwrap(),
            "world"
        );
        // Local untouched, and uploaded.
        assert_eq!(fs::read_to_string(root.path().join("a.txt")).unwrap(), "hello");
        assert_eq!(transport.count(|c| matches!(c, Call::Put(..))), 1);

        // Unlike choice 1, no session override is recorded: the still
        // diverged file prompts again on its next change.
        engine.handle_change(Path::new("a.txt")).await.unwrap();
        assert_eq!(engine.prompt.presented.len(), 2);
    }

    #[tokio::test]
    async fn test_binary_conflict_still_prompts() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("blob.bin"), [0u8, 159, 146, 150]).unwrap();

        let transport = MockTransport::with_remote(&[0u8, 1, 2, 3]);
        let mut engine = engine_for(&root, transport.clone(), vec![Choice::Skip], true, &[]);

        // Diff rendering fails for binary content, resolution still runs.
        let outcome = engine.handle_change(Path::new("blob.bin")).await.unwrap();
        assert_eq!(outcome, SyncOutcome::SkippedByUser);
        assert_eq!(engine.prompt.presented.len(), 1);
    }

    #[tokio::test]
    async fn test_ignored_path_touches_no_transport() {
        let root = TempDir::new().unwrap();
        fs::create_dir(root.path().join("build")).unwrap();
        fs::write(root.path().join("build/out.js"), "artifact").unwrap();

        let transport = MockTransport::default();
        let mut engine = engine_for(&root, transport.clone(), vec![], true, &["build/"]);

        let outcome = engine.handle_change(Path::new("build/out.js")).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Ignored);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_vanished_file_is_skipped() {
        let root = TempDir::new().unwrap();

        let transport = MockTransport::default();
        let mut engine = engine_for(&root, transport.clone(), vec![], false, &[]);

        let outcome = engine.handle_change(Path::new("gone.txt")).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Ignored);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_ensure_dir_once_per_remote_subdirectory() {
        let root = TempDir::new().unwrap();
        fs::create_dir(root.path().join("css")).unwrap();
        fs::write(root.path().join("css/site.css"), "a{}").unwrap();
        fs::write(root.path().join("css/print.css"), "b{}").unwrap();
        fs::write(root.path().join("index.html"), "<html>").unwrap();

        let transport = MockTransport::default();
        let mut engine = engine_for(&root, transport.clone(), vec![], false, &[]);

        engine.handle_change(Path::new("css/site.css")).await.unwrap();
        engine.handle_change(Path::new("css/print.css")).await.unwrap();
        engine.handle_change(Path::new("index.html")).await.unwrap();

        // One mkdir for css/, none for the root (the startup probe covers it).
        assert_eq!(
            transport.count(|c| matches!(c, Call::EnsureDir(..))),
            1
        );
        assert_eq!(
            transport.count(
                |c| matches!(c, Call::EnsureDir(dir) if dir == "/remote/css")
            ),
            1
        );
    }

    #[tokio::test]
    async fn test_transfer_failure_is_reported_not_fatal() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("a.txt"), "hello").unwrap();

        let transport = MockTransport {
            fail_put: true,
            ..MockTransport::default()
        };
        let mut engine = engine_for(&root, transport.clone(), vec![], false, &[]);

        let err = engine.handle_change(Path::new("a.txt")).await.unwrap_err();
        assert!(matches!(err, SyncError::Transfer { .. }));
        assert!(err.to_string().contains("a.txt"));

        // The engine stays usable for the next fire.
        fs::write(root.path().join("b.txt"), "more").unwrap();
        let transport_ok = MockTransport::default();
        let mut engine = engine_for(&root, transport_ok.clone(), vec![], false, &[]);
        assert_eq!(
            engine.handle_change(Path::new("b.txt")).await.unwrap(),
            SyncOutcome::Uploaded
        );
    }

    #[tokio::test]
    async fn test_remote_dir_for_nested_path() {
        let root = TempDir::new().unwrap();
        let engine = engine_for(&root, MockTransport::default(), vec![], false, &[]);

        assert_eq!(engine.remote_dir_for(Path::new("a.txt")), "/remote");
        assert_eq!(
            engine.remote_dir_for(Path::new("css/site.css")),
            "/remote/css"
        );
        assert_eq!(
            engine.remote_dir_for(Path::new("a/b/c.txt")),
            "/remote/a/b"
        );
    }
}
