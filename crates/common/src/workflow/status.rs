//! Paper status values

use crate::errors::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every status a paper can hold. Stored and serialized in snake_case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaperStatus {
    Draft,
    PendingModeration,
    RevisionRequired,
    PendingApproval,
    Approved,
    /// Reserved: listed by the archive read paths, produced by no action
    Rejected,
    Printed,
}

impl PaperStatus {
    pub const ALL: [PaperStatus; 7] = [
        PaperStatus::Draft,
        PaperStatus::PendingModeration,
        PaperStatus::RevisionRequired,
        PaperStatus::PendingApproval,
        PaperStatus::Approved,
        PaperStatus::Rejected,
        PaperStatus::Printed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaperStatus::Draft => "draft",
            PaperStatus::PendingModeration => "pending_moderation",
            PaperStatus::RevisionRequired => "revision_required",
            PaperStatus::PendingApproval => "pending_approval",
            PaperStatus::Approved => "approved",
            PaperStatus::Rejected => "rejected",
            PaperStatus::Printed => "printed",
        }
    }

    /// No outgoing edge exists from this status
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaperStatus::Printed | PaperStatus::Rejected)
    }
}

impl fmt::Display for PaperStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaperStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaperStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| AppError::Validation {
                message: format!("Unknown paper status '{}'", s),
                field: Some("status".to_string()),
            })
    }
}
