//! Paper record and its client-facing snapshot

use crate::errors::{AppError, Result};
use crate::workflow::{ModerationLog, PaperStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaperType {
    Exam,
    Assessment,
}

impl PaperType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaperType::Exam => "exam",
            PaperType::Assessment => "assessment",
        }
    }
}

impl fmt::Display for PaperType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaperType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "exam" => Ok(PaperType::Exam),
            "assessment" => Ok(PaperType::Assessment),
            other => Err(AppError::validation(
                "paper_type",
                format!("Unknown paper type '{}'", other),
            )),
        }
    }
}

/// Descriptive fields supplied at creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperMetadata {
    pub course_code: String,
    pub course_name: String,
    pub department: Option<String>,
    pub year: String,
    pub semester: String,
    pub paper_type: PaperType,
}

impl PaperMetadata {
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("course_code", &self.course_code),
            ("course_name", &self.course_name),
            ("year", &self.year),
            ("semester", &self.semester),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::MissingField {
                    field: field.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Partial metadata update; `None` keeps the current value
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MetadataPatch {
    pub course_code: Option<String>,
    pub course_name: Option<String>,
    pub department: Option<String>,
    pub year: Option<String>,
    pub semester: Option<String>,
    pub paper_type: Option<PaperType>,
}

impl MetadataPatch {
    pub fn is_empty(&self) -> bool {
        self == &MetadataPatch::default()
    }

    /// Apply non-blank values onto `metadata`
    pub fn apply(&self, metadata: &mut PaperMetadata) {
        fn set(target: &mut String, value: &Option<String>) {
            if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                *target = v.to_string();
            }
        }
        set(&mut metadata.course_code, &self.course_code);
        set(&mut metadata.course_name, &self.course_name);
        set(&mut metadata.year, &self.year);
        set(&mut metadata.semester, &self.semester);
        if let Some(d) = self.department.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            metadata.department = Some(d.to_string());
        }
        if let Some(t) = self.paper_type {
            metadata.paper_type = t;
        }
    }
}

/// The stored PDF bound to a paper
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Relative blob key, never a host path
    pub reference: String,
    pub file_name: String,
    pub size_bytes: u64,
    pub sha256: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paper {
    pub id: Uuid,
    pub status: PaperStatus,
    pub lecturer_id: Uuid,
    pub lecturer_name: String,
    pub examiner_id: Option<Uuid>,
    pub examiner_name: Option<String>,
    #[serde(flatten)]
    pub metadata: PaperMetadata,
    pub attachment: Attachment,
    pub moderation_comments: ModerationLog,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Paper {
    /// Refresh `updated_at` without ever moving it backwards
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.updated_at {
            self.updated_at = now;
        }
    }
}

/// What clients and the change stream see: the paper plus a servable URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperSnapshot {
    #[serde(flatten)]
    pub paper: Paper,
    pub attachment_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> PaperMetadata {
        PaperMetadata {
            course_code: "CS101".into(),
            course_name: "Programming I".into(),
            department: Some("Computing".into()),
            year: "1".into(),
            semester: "2".into(),
            paper_type: PaperType::Exam,
        }
    }

    #[test]
    fn test_metadata_requires_fields() {
        let mut m = metadata();
        assert!(m.validate().is_ok());
        m.course_code = "  ".into();
        assert!(matches!(
            m.validate(),
            Err(AppError::MissingField { field }) if field == "course_code"
        ));
    }

    #[test]
    fn test_patch_ignores_blank_values() {
        let mut m = metadata();
        let patch = MetadataPatch {
            course_name: Some("".into()),
            semester: Some("1".into()),
            paper_type: Some(PaperType::Assessment),
            ..Default::default()
        };
        patch.apply(&mut m);
        assert_eq!(m.course_name, "Programming I");
        assert_eq!(m.semester, "1");
        assert_eq!(m.paper_type, PaperType::Assessment);
        assert!(MetadataPatch::default().is_empty());
    }

    #[test]
    fn test_paper_type_parse() {
        assert_eq!("assessment".parse::<PaperType>().unwrap(), PaperType::Assessment);
        assert!("quiz".parse::<PaperType>().is_err());
    }
}
