//! Interactive conflict resolution menu.
//!
//! The engine talks to the `ConflictPrompt` trait so tests can inject a
//! scripted chooser; `StdinPrompt` is the real console implementation.

use super::conflict::{format_mtime, Conflict};
use crate::error::Result;
use colored::Colorize;
use std::io::{self, BufRead, Write};

/// The user's pick from the resolution menu. Ordering is stable: options
/// are numbered 1-4 and never reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    /// 1: upload local, remember for the rest of the session.
    OverrideRemote,
    /// 2: download remote, overwrite the local file.
    OverrideLocal,
    /// 3: leave both sides untouched.
    Skip,
    /// 4: save remote as a `_remote` sibling, then upload local.
    DownloadCopy,
}

/// Capability interface for presenting a conflict and obtaining a choice.
pub trait ConflictPrompt: Send {
    fn present(&mut self, conflict: &Conflict, diff: Option<&str>) -> Result<Choice>;
}

/// Console prompt: banner, diff (when renderable), numbered menu, re-ask
/// on invalid input.
pub struct StdinPrompt;

impl StdinPrompt {
    fn read_choice(&self, name: &str) -> Result<Choice> {
        let stdin = io::stdin();
        loop {
            println!("\nChoose action for {}:", name.bold());
            println!("1. Override remote file (upload local) - remember for session");
            println!("2. Override local file (download remote)");
            println!("3. Cancel and handle manually");
            println!("4. Download a copy (save remote as *_remote.*)");
            print!("Enter choice (1/2/3/4): ");
            io::stdout().flush()?;

            let mut line = String::new();
            stdin.lock().read_line(&mut line)?;

            match line.trim() {
                "1" => return Ok(Choice::OverrideRemote),
                "2" => return Ok(Choice::OverrideLocal),
                "3" => return Ok(Choice::Skip),
                "4" => return Ok(Choice::DownloadCopy),
                other => {
                    println!(
                        "{}",
                        format!("Invalid choice '{}'. Please enter 1, 2, 3, or 4.", other)
                            .yellow()
                    );
                }
            }
        }
    }
}

impl ConflictPrompt for StdinPrompt {
    fn present(&mut self, conflict: &Conflict, diff: Option<&str>) -> Result<Choice> {
        let name = conflict.file_name();

        println!(
            "\n{} {}",
            "Conflict detected:".red().bold(),
            conflict.relative_path.display()
        );
        println!(
            "  local modified:  {}",
            format_mtime(conflict.local_modified)
        );
        println!(
            "  remote modified: {}",
            format_mtime(conflict.remote_modified)
        );

        match diff {
            Some(diff) if diff.is_empty() => {
                println!("Files are identical in content.");
            }
            Some(diff) => {
                println!("\n=== Differences for {} ===", name);
                print!("{}", diff);
                println!("{}", "=".repeat(50));
            }
            None => {
                println!("{}", "(binary content; diff unavailable)".bright_black());
            }
        }

        self.read_choice(&name)
    }
}
