//! Subscribe command: follow one topic on a live dashboard.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use feed_bus::{BusClient, TcpSubscriber};
use feed_core::{StatsSnapshot, Topic};

use crate::Config;
use crate::commands::util;
use crate::dashboard::{PlainDashboard, TerminalDashboard};
use crate::log_writer::LogWriter;
use crate::session::{FeedSession, run_subscriber};
use crate::signal::{InterruptFlag, install_ctrl_c};

const TOPIC_PROMPT: &str = "Enter exact channel to subscribe to (e.g. news): ";

/// Command-line overrides for a subscriber session.
#[derive(Debug, Default)]
pub struct SubscribeOptions {
    pub topic: Option<String>,
    pub address: Option<String>,
    pub log_dir: Option<PathBuf>,
    pub headless: bool,
    pub json: bool,
}

pub fn run(config: &Config, options: SubscribeOptions) -> Result<()> {
    let mut stdout = io::stdout();
    let topic = util::resolve_topic(
        options.topic,
        &mut io::stdin().lock(),
        &mut stdout,
        TOPIC_PROMPT,
    )?;
    let settings = config.session_settings()?;
    let address = options.address.as_deref().unwrap_or(&config.address);
    let log_dir = options.log_dir.as_deref().unwrap_or(&config.log_dir);

    let mut client = TcpSubscriber::connect(address)
        .with_context(|| format!("failed to set up subscriber for {address}"))?;
    client
        .subscribe(topic.as_str())
        .context("failed to subscribe")?;
    let log = LogWriter::open(log_dir, &topic)?;
    tracing::info!(%topic, address, log = %log.path().display(), "subscribed");

    let session = FeedSession::new(topic.clone(), log, settings);
    let interrupt = InterruptFlag::new();
    install_ctrl_c(&interrupt)?;

    let snapshot = if options.headless {
        writeln!(stdout, "Subscribed to '{topic}'. Listening for messages...")?;
        stdout.flush()?;
        let mut dashboard = PlainDashboard::new(io::stdout());
        run_subscriber(client, session, &mut dashboard, &interrupt)?
    } else {
        let mut dashboard = TerminalDashboard::enter()?;
        run_subscriber(client, session, &mut dashboard, &interrupt)?
    };

    if options.json {
        write_summary_json(&mut stdout, &topic, &snapshot)
    } else {
        write_summary(&mut stdout, &topic, &snapshot)
    }
}

/// Final statistics as printed on shutdown.
#[derive(Debug, Serialize)]
struct Summary<'a> {
    topic: &'a str,
    #[serde(flatten)]
    snapshot: &'a StatsSnapshot,
}

pub fn write_summary<W: Write>(
    writer: &mut W,
    topic: &Topic,
    snapshot: &StatsSnapshot,
) -> Result<()> {
    writeln!(writer, "Session summary for '{topic}'")?;
    writeln!(writer, "Total messages: {}", snapshot.total_messages)?;
    writeln!(writer, "Runtime: {:.1}s", snapshot.runtime_seconds)?;
    writeln!(writer, "Rate: {:.2} msg/min", snapshot.messages_per_minute)?;
    writeln!(writer, "Active users: {}", snapshot.active_users)?;

    if snapshot.top_users.is_empty() {
        return Ok(());
    }

    writeln!(writer, "Top users:")?;
    for entry in &snapshot.top_users {
        writeln!(writer, "- {}: {}", entry.user, entry.messages)?;
    }
    Ok(())
}

pub fn write_summary_json<W: Write>(
    writer: &mut W,
    topic: &Topic,
    snapshot: &StatsSnapshot,
) -> Result<()> {
    let summary = Summary {
        topic: topic.as_str(),
        snapshot,
    };
    serde_json::to_writer_pretty(&mut *writer, &summary).context("failed to serialize summary")?;
    writeln!(writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use feed_core::UserCount;
    use insta::assert_snapshot;

    use super::*;

    fn snapshot() -> StatsSnapshot {
        StatsSnapshot {
            total_messages: 3,
            runtime_seconds: 42.3,
            messages_per_minute: 3.0,
            active_users: 2,
            top_users: vec![
                UserCount {
                    user: "bob".to_string(),
                    messages: 2,
                },
                UserCount {
                    user: "carol".to_string(),
                    messages: 1,
                },
            ],
        }
    }

    #[test]
    fn summary_lists_totals_and_top_users() {
        let topic = Topic::new("news").unwrap();
        let mut output = Vec::new();
        write_summary(&mut output, &topic, &snapshot()).unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Session summary for 'news'
        Total messages: 3
        Runtime: 42.3s
        Rate: 3.00 msg/min
        Active users: 2
        Top users:
        - bob: 2
        - carol: 1
        ");
    }

    #[test]
    fn summary_without_messages_omits_top_users() {
        let topic = Topic::new("news").unwrap();
        let empty = StatsSnapshot {
            total_messages: 0,
            runtime_seconds: 1.0,
            messages_per_minute: 0.0,
            active_users: 0,
            top_users: Vec::new(),
        };
        let mut output = Vec::new();
        write_summary(&mut output, &topic, &empty).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(!output.contains("Top users"));
        assert!(output.contains("Total messages: 0"));
    }

    #[test]
    fn json_summary_flattens_snapshot() {
        let topic = Topic::new("news").unwrap();
        let mut output = Vec::new();
        write_summary_json(&mut output, &topic, &snapshot()).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(value["topic"], "news");
        assert_eq!(value["total_messages"], 3);
        assert_eq!(value["active_users"], 2);
        assert_eq!(value["top_users"][0]["user"], "bob");
        assert_eq!(value["top_users"][1]["messages"], 1);
    }
}
