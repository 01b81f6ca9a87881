use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ftpwatch")]
#[command(about = "Watch a local directory and mirror changes to an FTP server", long_about = None)]
#[command(version)]
#[command(after_help = "EXAMPLES:
    # Auto-upload every local change
    ftpwatch

    # Ask before overwriting remote files that have diverged
    ftpwatch --check-conflicts

    # Use a config file somewhere else
    ftpwatch --config ~/sites/blog/sync_config.json

The config file is JSON:
    {
      \"ftp\": {\"host\": \"ftp.example.com\", \"port\": 21, \"user\": \"me\", \"password\": \"...\"},
      \"directories\": {\"remote\": \"/htdocs\", \"local\": \"/home/me/site\"},
      \"ignore\": [\"*.log\", \"build/\", \".git/\"]
    }")]
pub struct Cli {
    /// Enable conflict resolution mode. When enabled, checks if remote
    /// files exist and shows differences before uploading.
    #[arg(short = 'c', long)]
    pub check_conflicts: bool,

    /// Path to the JSON configuration file
    #[arg(long, default_value = "sync_config.json")]
    pub config: PathBuf,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (only show errors)
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            return tracing::Level::ERROR;
        }

        match self.verbose {
            0 => tracing::Level::INFO,
            1 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}
