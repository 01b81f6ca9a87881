use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A remembered resolution for the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Override {
    /// Always upload the local copy without asking again.
    ForceUpload,
}

/// Per-run memory of conflict resolutions, keyed by path relative to the
/// local root. Created empty at startup and discarded on exit; nothing is
/// persisted across restarts.
///
/// Only the "override remote, remember" choice is recorded. A path present
/// here short-circuits conflict detection entirely, saving the remote
/// round trip.
#[derive(Debug, Default)]
pub struct SessionOverrides {
    overrides: HashMap<PathBuf, Override>,
}

impl SessionOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, rel_path: &Path) -> Option<Override> {
        self.overrides.get(rel_path).copied()
    }

    pub fn remember_force_upload(&mut self, rel_path: &Path) {
        self.overrides
            .insert(rel_path.to_path_buf(), Override::ForceUpload);
    }
}
