//! Publish command: send typed lines to a topic.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local};

use feed_bus::TcpPublisher;
use feed_core::{Topic, format_line, format_payload};

use crate::Config;
use crate::commands::util;

const NAME_PROMPT: &str = "Enter your name: ";
const TOPIC_PROMPT: &str = "Enter channel to publish to (e.g. news, tech): ";
const LINE_PROMPT: &str = "You: ";

/// Command-line overrides for a publisher.
#[derive(Debug, Default)]
pub struct PublishOptions {
    pub name: Option<String>,
    pub topic: Option<String>,
    pub bind: Option<String>,
}

pub fn run(config: &Config, options: PublishOptions) -> Result<()> {
    let mut input = io::stdin().lock();
    let mut stdout = io::stdout();

    let name = util::resolve_value(options.name, &mut input, &mut stdout, NAME_PROMPT)?;
    let name = name.trim();
    if name.is_empty() {
        bail!("name cannot be empty");
    }
    let topic = util::resolve_topic(options.topic, &mut input, &mut stdout, TOPIC_PROMPT)?;
    let bind = options.bind.as_deref().unwrap_or(&config.bind_address);

    let mut publisher =
        TcpPublisher::bind(bind).with_context(|| format!("failed to bind publisher on {bind}"))?;
    writeln!(
        stdout,
        "Publisher started on channel '{topic}' ({}). End input with Ctrl-D to exit.",
        publisher.local_addr()
    )?;

    let sent = publish_lines(&publisher, &topic, name, &mut input, &mut stdout)?;
    publisher.close();
    tracing::info!(%topic, sent, "publisher finished");
    Ok(())
}

/// Builds the payload for one typed line sent at `at`.
pub fn compose(topic: &Topic, name: &str, body: &str, at: &DateTime<Local>) -> String {
    let stamp = at.format("%H:%M:%S").to_string();
    format_payload(topic, &format_line(&stamp, name, body))
}

/// Publishes every input line until end of input. Returns the number sent.
pub fn publish_lines<R: BufRead, W: Write>(
    publisher: &TcpPublisher,
    topic: &Topic,
    name: &str,
    input: &mut R,
    output: &mut W,
) -> Result<u64> {
    let mut sent = 0;
    loop {
        write!(output, "{LINE_PROMPT}")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line).context("failed to read input")? == 0 {
            writeln!(output)?;
            return Ok(sent);
        }

        let payload = compose(topic, name, line.trim(), &Local::now());
        let receivers = publisher.publish(&payload)?;
        tracing::debug!(receivers, "message published");
        sent += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::time::{Duration, Instant};

    use chrono::TimeZone;
    use feed_bus::{BusClient, TcpSubscriber};

    use super::*;

    #[test]
    fn test_compose_matches_wire_format() {
        let topic = Topic::new("news").unwrap();
        let at = Local.with_ymd_and_hms(2025, 3, 1, 14, 3, 10).unwrap();
        assert_eq!(
            compose(&topic, "alice", "hello world", &at),
            "news [14:03:10] alice: hello world"
        );
    }

    #[test]
    fn test_publish_lines_counts_until_end_of_input() {
        let publisher = TcpPublisher::bind("tcp://127.0.0.1:0").unwrap();
        let topic = Topic::new("news").unwrap();
        let mut input = Cursor::new("first\n  second  \n");
        let mut output = Vec::new();

        let sent = publish_lines(&publisher, &topic, "bob", &mut input, &mut output).unwrap();

        assert_eq!(sent, 2);
        assert_eq!(String::from_utf8(output).unwrap(), "You: You: You: \n");
    }

    #[test]
    fn test_published_lines_reach_subscriber() {
        let publisher = TcpPublisher::bind("tcp://127.0.0.1:0").unwrap();
        let address = format!("tcp://{}", publisher.local_addr());
        let mut subscriber = TcpSubscriber::connect(&address).unwrap();
        subscriber.subscribe("news").unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while publisher.subscriber_count() == 0 && Instant::now() < deadline {
            let _ = subscriber.poll_ready(Duration::from_millis(10));
        }

        let topic = Topic::new("news").unwrap();
        let mut input = Cursor::new("  hi there \n");
        publish_lines(&publisher, &topic, "bob", &mut input, &mut Vec::new()).unwrap();

        let mut received = None;
        while received.is_none() && Instant::now() < deadline {
            if subscriber.poll_ready(Duration::from_millis(50)).unwrap_or(false) {
                received = subscriber.try_receive().unwrap();
            }
        }

        let received = received.unwrap();
        assert!(received.starts_with("news ["), "got {received:?}");
        assert!(received.ends_with("] bob: hi there"), "got {received:?}");
    }
}
