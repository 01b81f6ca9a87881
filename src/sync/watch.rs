//! Watch mode: filesystem events in, debounced sync fires out.
//!
//! `notify` delivers raw events on its own thread; they are bridged into a
//! bounded tokio channel, ignore-filtered, then coalesced per path by a
//! quiet-window debouncer before the engine sees them.

use super::prompt::ConflictPrompt;
use super::SyncEngine;
use crate::error::Result;
use crate::transport::Transport;
use colored::Colorize;
use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Kind of filesystem change, reduced to what sync cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Created,
    Modified,
    /// Destination side of a rename.
    Moved,
    Deleted,
}

/// One qualifying filesystem change.
#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub kind: WatchEventKind,
}

impl WatchEvent {
    /// Map a raw notify event to zero or more watch events.
    ///
    /// Renames contribute only their destination path; the source side is
    /// a deletion, and deletions are never propagated.
    fn from_notify(event: notify::Event) -> Vec<WatchEvent> {
        let kind = match event.kind {
            EventKind::Create(_) => WatchEventKind::Created,
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => WatchEventKind::Deleted,
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                // paths = [from, to]; only the destination syncs.
                return event
                    .paths
                    .into_iter()
                    .nth(1)
                    .map(|path| WatchEvent {
                        path,
                        kind: WatchEventKind::Moved,
                    })
                    .into_iter()
                    .collect();
            }
            EventKind::Modify(ModifyKind::Name(_)) => WatchEventKind::Moved,
            EventKind::Modify(_) => WatchEventKind::Modified,
            EventKind::Remove(_) => WatchEventKind::Deleted,
            EventKind::Access(_) | EventKind::Other | EventKind::Any => return Vec::new(),
        };

        event
            .paths
            .into_iter()
            .map(|path| WatchEvent { path, kind })
            .collect()
    }

    /// Whether this event should trigger a sync attempt.
    fn triggers_sync(&self) -> bool {
        matches!(
            self.kind,
            WatchEventKind::Created | WatchEventKind::Modified | WatchEventKind::Moved
        )
    }
}

/// Per-path quiet-window coalescing.
///
/// Every recorded event (re)arms the path's deadline; a path fires once
/// its deadline passes with no further events. Paths are independent:
/// there is no cross-path ordering.
pub struct Debouncer {
    window: Duration,
    pending: HashMap<PathBuf, Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    pub fn record(&mut self, path: PathBuf, now: Instant) {
        self.pending.insert(path, now + self.window);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }

    /// Remove and return every path whose quiet window has elapsed.
    pub fn take_due(&mut self, now: Instant) -> Vec<PathBuf> {
        let due: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(path, _)| path.clone())
            .collect();
        for path in &due {
            self.pending.remove(path);
        }
        due
    }
}

/// Continuous sync loop: subscribe, debounce, dispatch, until Ctrl-C.
pub struct WatchMode<T: Transport, P: ConflictPrompt> {
    engine: SyncEngine<T, P>,
    debounce: Duration,
}

impl<T: Transport, P: ConflictPrompt> WatchMode<T, P> {
    pub fn new(engine: SyncEngine<T, P>, debounce: Duration) -> Self {
        Self { engine, debounce }
    }

    pub async fn run(mut self) -> Result<()> {
        let (tx, mut rx) = mpsc::channel::<WatchEvent>(256);

        let mut watcher: RecommendedWatcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| {
                if let Ok(event) = res {
                    for watch_event in WatchEvent::from_notify(event) {
                        // A full channel drops the event; the debouncer
                        // would have coalesced it anyway under load.
                        let _ = tx.try_send(watch_event);
                    }
                }
            },
        )?;
        watcher.watch(self.engine.local_root(), RecursiveMode::Recursive)?;

        let mut debouncer = Debouncer::new(self.debounce);

        loop {
            let deadline = debouncer.next_deadline();

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupt received, stopping watcher");
                    break;
                }

                maybe_event = rx.recv() => {
                    match maybe_event {
                        Some(event) => self.enqueue(&mut debouncer, event),
                        None => break,
                    }
                }

                _ = sleep_until_or_forever(deadline) => {
                    for rel_path in debouncer.take_due(Instant::now()) {
                        self.dispatch(&rel_path).await;
                    }
                }
            }
        }

        // Dropping the watcher stops the subscription; anything already
        // dispatched has run to completion above.
        drop(watcher);
        Ok(())
    }

    /// Filter one raw event and arm its debounce timer.
    fn enqueue(&self, debouncer: &mut Debouncer, event: WatchEvent) {
        if !event.triggers_sync() {
            return;
        }

        // Directories sync implicitly through the files beneath them.
        if event.path.is_dir() {
            return;
        }

        let rel_path = match event.path.strip_prefix(self.engine.local_root()) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => return,
        };

        // Ignored paths are dropped before they ever reach a timer.
        if self.engine.ignore_rules().matches(&rel_path, &event.path) {
            tracing::debug!("Skipping ignored path: {}", rel_path.display());
            return;
        }

        tracing::trace!("{:?}: {}", event.kind, rel_path.display());
        debouncer.record(rel_path, Instant::now());
    }

    /// Run one debounced fire; per-path failures are reported and do not
    /// stop the loop.
    async fn dispatch(&mut self, rel_path: &std::path::Path) {
        if let Err(e) = self.engine.handle_change(rel_path).await {
            eprintln!("{} {}", "✗".red(), e);
            if let crate::error::SyncError::Transfer { output, .. } = &e {
                if !output.stderr.trim().is_empty() {
                    eprintln!("{}", output.stderr.trim());
                }
            }
        }
    }
}

async fn sleep_until_or_forever(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
