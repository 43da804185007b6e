//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Live message feed.
///
/// Publishes chat lines on a topic and follows a topic on a live terminal
/// dashboard with running statistics.
#[derive(Debug, Parser)]
#[command(name = "feed", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Follow a topic on the live dashboard.
    Subscribe {
        /// Topic to follow (prompted for when omitted).
        #[arg(short, long)]
        topic: Option<String>,

        /// Publisher endpoint, e.g. tcp://localhost:5555.
        #[arg(short, long)]
        address: Option<String>,

        /// Directory for the topic log file.
        #[arg(long)]
        log_dir: Option<PathBuf>,

        /// Print messages as plain lines instead of drawing the dashboard.
        #[arg(long)]
        headless: bool,

        /// Print the session summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Publish lines read from stdin to a topic.
    Publish {
        /// Sender name shown with every message (prompted for when omitted).
        #[arg(short, long)]
        name: Option<String>,

        /// Topic to publish to (prompted for when omitted).
        #[arg(short, long)]
        topic: Option<String>,

        /// Endpoint to bind, e.g. tcp://*:5555.
        #[arg(short, long)]
        bind: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_subscribe_flags() {
        let cli = Cli::try_parse_from(["feed", "-v", "subscribe", "--topic", "news", "--headless"]).unwrap();
        assert!(cli.verbose);
        let Some(Commands::Subscribe {
            topic,
            headless,
            json,
            ..
        }) = cli.command
        else {
            panic!("expected subscribe");
        };
        assert_eq!(topic.as_deref(), Some("news"));
        assert!(headless);
        assert!(!json);
    }
}
