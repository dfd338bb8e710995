//! Append-only moderation comment log

use crate::errors::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest comment accepted, in characters
pub const MAX_COMMENT_CHARS: u64 = 5000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationComment {
    pub author_id: Uuid,
    pub author_name: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Chronological feedback on a paper. Entries are never edited or removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModerationLog {
    entries: Vec<ModerationComment>,
}

impl ModerationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a comment stamped with `at`. Blank text is rejected.
    pub fn append(
        &mut self,
        author_id: Uuid,
        author_name: &str,
        text: &str,
        at: DateTime<Utc>,
    ) -> Result<&ModerationComment> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::validation("comment", "Comment must not be empty"));
        }
        if text.chars().count() as u64 > MAX_COMMENT_CHARS {
            return Err(AppError::validation(
                "comment",
                format!("Comment exceeds {} characters", MAX_COMMENT_CHARS),
            ));
        }

        // Keep timestamps non-decreasing even if the clock steps back
        let timestamp = match self.entries.last() {
            Some(last) if last.timestamp > at => last.timestamp,
            _ => at,
        };

        self.entries.push(ModerationComment {
            author_id,
            author_name: author_name.to_string(),
            text: text.to_string(),
            timestamp,
        });
        Ok(&self.entries[self.entries.len() - 1])
    }

    pub fn entries(&self) -> &[ModerationComment] {
        &self.entries
    }

    /// Most recent feedback
    pub fn latest(&self) -> Option<&ModerationComment> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
