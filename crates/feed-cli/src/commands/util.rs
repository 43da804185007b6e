//! Shared utilities for CLI commands.

use std::io::{BufRead, Write};

use anyhow::{Context, Result, bail};

use feed_core::Topic;

/// Prints `prompt` and reads one line, without its line ending.
///
/// End of input is an error: the value was required and never given.
pub fn prompt_line<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    prompt: &str,
) -> Result<String> {
    write!(output, "{prompt}")?;
    output.flush()?;

    let mut line = String::new();
    let read = input.read_line(&mut line).context("failed to read input")?;
    if read == 0 {
        bail!("no input given for prompt {:?}", prompt.trim_end());
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Uses `given` when present, otherwise asks for a value.
pub fn resolve_value<R: BufRead, W: Write>(
    given: Option<String>,
    input: &mut R,
    output: &mut W,
    prompt: &str,
) -> Result<String> {
    match given {
        Some(value) => Ok(value),
        None => prompt_line(input, output, prompt),
    }
}

/// Resolves and validates a topic, prompting when none was given.
pub fn resolve_topic<R: BufRead, W: Write>(
    given: Option<String>,
    input: &mut R,
    output: &mut W,
    prompt: &str,
) -> Result<Topic> {
    let raw = resolve_value(given, input, output, prompt)?;
    Topic::new(raw).context("invalid topic")
}
