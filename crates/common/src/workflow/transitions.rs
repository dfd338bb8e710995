//! Paper state machine
//!
//! Every valid edge is declared exactly once in [`TRANSITIONS`]. Role
//! guards, state guards and side effects are all read from that table,
//! so adding an action means adding a row, not another `if status == ..`.

use crate::auth::Role;
use crate::workflow::PaperStatus;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inbound actions on a paper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Submit,
    RequestRevision,
    ExaminerApprove,
    HodApprove,
    MarkPrinted,
    Revise,
    Update,
    Delete,
}

impl Action {
    /// Stable label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Submit => "submit",
            Action::RequestRevision => "request_revision",
            Action::ExaminerApprove => "examiner_approve",
            Action::HodApprove => "hod_approve",
            Action::MarkPrinted => "mark_printed",
            Action::Revise => "revise",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Submit => "submit",
            Action::RequestRevision => "request revision on",
            Action::ExaminerApprove | Action::HodApprove => "approve",
            Action::MarkPrinted => "mark as printed",
            Action::Revise => "revise",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// Where a transition leaves the paper
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Status(PaperStatus),
    /// Status is unchanged unless the attachment was replaced
    KeepUnlessReplaced(PaperStatus),
    Removed,
}

/// Side effects a transition performs besides the status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    AppendComment,
    RecordExaminer,
    ReplaceAttachment,
    MaybeReplaceAttachment,
    PurgeAttachment,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Transition {
    pub action: Action,
    pub from: &'static [PaperStatus],
    pub to: Target,
    pub role: Role,
    /// Lecturer actions additionally require `paper.lecturer_id == principal.user_id`
    pub owner_only: bool,
    pub effects: &'static [Effect],
}

impl Transition {
    pub fn allows_from(&self, status: PaperStatus) -> bool {
        self.from.contains(&status)
    }

    pub fn has_effect(&self, effect: Effect) -> bool {
        self.effects.contains(&effect)
    }

    /// Resulting status, or `None` when the paper is removed
    pub fn target(&self, current: PaperStatus, attachment_replaced: bool) -> Option<PaperStatus> {
        match self.to {
            Target::Status(status) => Some(status),
            Target::KeepUnlessReplaced(status) if attachment_replaced => Some(status),
            Target::KeepUnlessReplaced(_) => Some(current),
            Target::Removed => None,
        }
    }
}

const PRE_MODERATION: &[PaperStatus] = &[PaperStatus::Draft, PaperStatus::RevisionRequired];

pub static TRANSITIONS: [Transition; 8] = [
    Transition {
        action: Action::Submit,
        from: PRE_MODERATION,
        to: Target::Status(PaperStatus::PendingModeration),
        role: Role::Lecturer,
        owner_only: true,
        effects: &[],
    },
    Transition {
        action: Action::RequestRevision,
        from: &[PaperStatus::PendingModeration],
        to: Target::Status(PaperStatus::RevisionRequired),
        role: Role::Examiner,
        owner_only: false,
        effects: &[Effect::AppendComment, Effect::RecordExaminer],
    },
    Transition {
        action: Action::ExaminerApprove,
        from: &[PaperStatus::PendingModeration],
        to: Target::Status(PaperStatus::PendingApproval),
        role: Role::Examiner,
        owner_only: false,
        effects: &[Effect::RecordExaminer],
    },
    Transition {
        action: Action::HodApprove,
        from: &[PaperStatus::PendingApproval],
        to: Target::Status(PaperStatus::Approved),
        role: Role::Hod,
        owner_only: false,
        effects: &[],
    },
    Transition {
        action: Action::MarkPrinted,
        from: &[PaperStatus::Approved],
        to: Target::Status(PaperStatus::Printed),
        role: Role::Hod,
        owner_only: false,
        effects: &[],
    },
    Transition {
        action: Action::Revise,
        from: PRE_MODERATION,
        to: Target::Status(PaperStatus::PendingModeration),
        role: Role::Lecturer,
        owner_only: true,
        effects: &[Effect::ReplaceAttachment],
    },
    Transition {
        action: Action::Update,
        from: &[PaperStatus::Draft],
        to: Target::KeepUnlessReplaced(PaperStatus::PendingModeration),
        role: Role::Lecturer,
        owner_only: true,
        effects: &[Effect::MaybeReplaceAttachment],
    },
    Transition {
        action: Action::Delete,
        from: PRE_MODERATION,
        to: Target::Removed,
        role: Role::Lecturer,
        owner_only: true,
        effects: &[Effect::PurgeAttachment],
    },
];

/// Lookups over the transition table
pub struct PaperStateMachine;

impl PaperStateMachine {
    /// Status every paper starts in
    pub const INITIAL: PaperStatus = PaperStatus::Draft;

    /// Role allowed to create papers; creation has no source state
    pub const CREATE_ROLE: Role = Role::Lecturer;

    pub fn transition(action: Action) -> Option<&'static Transition> {
        TRANSITIONS.iter().find(|t| t.action == action)
    }
}
