//! Append-only message log.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

use feed_core::Topic;

/// Returns the line written at the start of every session.
pub fn session_marker(started: &DateTime<Local>) -> String {
    format!(
        "--- Session started at {} ---",
        started.format("%Y-%m-%d %H:%M:%S")
    )
}

/// Writes one line per received message to `<dir>/<topic>_log.txt`.
///
/// Every line is flushed as it is written, so the file is complete up to the
/// last received message even if the process is killed.
#[derive(Debug)]
pub struct LogWriter {
    path: PathBuf,
    file: BufWriter<File>,
}

impl LogWriter {
    /// Opens (or creates) the log for `topic` and marks the session start.
    pub fn open(dir: &Path, topic: &Topic) -> Result<Self> {
        Self::open_at(dir, topic, &Local::now())
    }

    pub fn open_at(dir: &Path, topic: &Topic, started: &DateTime<Local>) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;
        let path = dir.join(topic.log_file_name());
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;

        let mut writer = Self {
            path,
            file: BufWriter::new(file),
        };
        writer
            .append(&session_marker(started))
            .with_context(|| format!("failed to write to {}", writer.path.display()))?;
        Ok(writer)
    }

    /// Appends one message line and flushes it.
    pub fn append(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.file, "{line}")?;
        self.file.flush()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes and closes the file.
    pub fn close(mut self) -> io::Result<()> {
        self.file.flush()?;
        self.file.get_ref().sync_data()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn started() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_session_marker_format() {
        assert_eq!(
            session_marker(&started()),
            "--- Session started at 2025-03-01 09:30:00 ---"
        );
    }

    #[test]
    fn test_log_path_uses_topic() {
        let temp = tempfile::tempdir().unwrap();
        let topic = Topic::new("news").unwrap();
        let log = LogWriter::open_at(temp.path(), &topic, &started()).unwrap();
        assert_eq!(log.path(), temp.path().join("news_log.txt"));
    }

    #[test]
    fn test_lines_visible_before_close() {
        let temp = tempfile::tempdir().unwrap();
        let topic = Topic::new("news").unwrap();
        let mut log = LogWriter::open_at(temp.path(), &topic, &started()).unwrap();
        log.append("[10:00:00] bob: hi").unwrap();

        let content = fs::read_to_string(log.path()).unwrap();
        assert_eq!(
            content,
            "--- Session started at 2025-03-01 09:30:00 ---\n[10:00:00] bob: hi\n"
        );
        log.close().unwrap();
    }

    #[test]
    fn test_sessions_append_to_same_file() {
        let temp = tempfile::tempdir().unwrap();
        let topic = Topic::new("tech").unwrap();

        let mut first = LogWriter::open_at(temp.path(), &topic, &started()).unwrap();
        first.append("[10:00:00] a: one").unwrap();
        first.close().unwrap();

        let mut second = LogWriter::open_at(temp.path(), &topic, &started()).unwrap();
        second.append("[11:00:00] b: two").unwrap();
        second.close().unwrap();

        let content = fs::read_to_string(temp.path().join("tech_log.txt")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines,
            vec![
                "--- Session started at 2025-03-01 09:30:00 ---",
                "[10:00:00] a: one",
                "--- Session started at 2025-03-01 09:30:00 ---",
                "[11:00:00] b: two",
            ]
        );
    }

    #[test]
    fn test_creates_missing_directory() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("logs").join("nested");
        let topic = Topic::new("news").unwrap();
        let log = LogWriter::open(&dir, &topic).unwrap();
        assert!(log.path().exists());
    }
}
