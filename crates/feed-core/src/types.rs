//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// The provided value contained whitespace.
    #[error("{field} cannot contain whitespace, got {value:?}")]
    ContainsWhitespace { field: &'static str, value: String },
}

/// A channel name on the message bus.
///
/// Topics are the first space-separated token of every payload, so a topic
/// may not be empty and may not contain whitespace. Surrounding whitespace
/// (as typed at a prompt) is trimmed before validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Topic(String);

impl Topic {
    /// Creates a new topic after validation.
    pub fn new(topic: impl Into<String>) -> Result<Self, ValidationError> {
        let topic = topic.into();
        let trimmed = topic.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Empty { field: "topic" });
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(ValidationError::ContainsWhitespace {
                field: "topic",
                value: trimmed.to_string(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the topic as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The prefix a payload must start with to belong to this topic.
    pub fn filter_prefix(&self) -> String {
        format!("{} ", self.0)
    }

    /// File name of the persistent log for this topic.
    pub fn log_file_name(&self) -> String {
        format!("{}_log.txt", self.0)
    }
}

impl TryFrom<String> for Topic {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_rejects_empty() {
        assert_eq!(
            Topic::new(""),
            Err(ValidationError::Empty { field: "topic" })
        );
        assert_eq!(
            Topic::new("   "),
            Err(ValidationError::Empty { field: "topic" })
        );
    }

    #[test]
    fn test_topic_trims_prompt_input() {
        let topic = Topic::new("  news\n").unwrap();
        assert_eq!(topic.as_str(), "news");
    }

    #[test]
    fn test_topic_rejects_inner_whitespace() {
        let err = Topic::new("tech news").unwrap_err();
        assert!(matches!(err, ValidationError::ContainsWhitespace { .. }));
        assert_eq!(
            err.to_string(),
            "topic cannot contain whitespace, got \"tech news\""
        );
    }

    #[test]
    fn test_topic_derived_names() {
        let topic = Topic::new("news").unwrap();
        assert_eq!(topic.filter_prefix(), "news ");
        assert_eq!(topic.log_file_name(), "news_log.txt");
    }

    #[test]
    fn test_topic_deserialize_validates() {
        let ok: Topic = serde_json::from_str(r#""tech""#).unwrap();
        assert_eq!(ok.as_str(), "tech");

        let err: Result<Topic, _> = serde_json::from_str(r#""""#);
        assert!(err.is_err());
    }
}
