//! Authorization gate
//!
//! Checked before any mutation. Order: role, then ownership (lecturer
//! actions) or course assignment (examiner actions), then the state guard.

use crate::auth::{Principal, Role};
use crate::errors::{AppError, Result};
use crate::workflow::{Action, Paper, PaperStateMachine, PaperStatus, Transition};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    WrongRole { required: Role },
    NotOwner,
    NotAssigned { course_code: String },
    InvalidState { current: PaperStatus },
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::WrongRole { .. } => "wrong-role",
            DenyReason::NotOwner => "not-owner",
            DenyReason::NotAssigned { .. } => "not-assigned",
            DenyReason::InvalidState { .. } => "invalid-state",
        }
    }

    pub fn into_error(self, action: Action, role: Role) -> AppError {
        match self {
            DenyReason::WrongRole { .. } => AppError::WrongRole { action, role },
            DenyReason::NotOwner => AppError::NotOwner { action },
            DenyReason::NotAssigned { course_code } => AppError::NotAssigned { course_code },
            DenyReason::InvalidState { current } => AppError::InvalidTransition {
                action,
                status: current,
            },
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Decision {
    Allow(&'static Transition),
    Deny(DenyReason),
}

pub struct AuthorizationGate;

impl AuthorizationGate {
    pub fn authorize(principal: &Principal, action: Action, paper: &Paper) -> Decision {
        let Some(transition) = PaperStateMachine::transition(action) else {
            // Create has no edge and is never gated against an existing paper
            return Decision::Deny(DenyReason::InvalidState {
                current: paper.status,
            });
        };

        if principal.role != transition.role {
            return Decision::Deny(DenyReason::WrongRole {
                required: transition.role,
            });
        }
        if transition.owner_only && paper.lecturer_id != principal.user_id {
            return Decision::Deny(DenyReason::NotOwner);
        }
        if transition.role == Role::Examiner
            && !principal.is_assigned_to(&paper.metadata.course_code)
        {
            return Decision::Deny(DenyReason::NotAssigned {
                course_code: paper.metadata.course_code.clone(),
            });
        }
        if !transition.allows_from(paper.status) {
            return Decision::Deny(DenyReason::InvalidState {
                current: paper.status,
            });
        }

        Decision::Allow(transition)
    }

    /// Same as [`Self::authorize`], with denials logged and turned into errors
    pub fn enforce(principal: &Principal, action: Action, paper: &Paper) -> Result<&'static Transition> {
        match Self::authorize(principal, action, paper) {
            Decision::Allow(transition) => Ok(transition),
            Decision::Deny(reason) => {
                warn!(
                    paper_id = %paper.id,
                    action = action.as_str(),
                    role = %principal.role,
                    status = %paper.status,
                    reason = reason.as_str(),
                    "Paper action denied"
                );
                Err(reason.into_error(action, principal.role))
            }
        }
    }

    pub fn authorize_create(principal: &Principal) -> Result<()> {
        if principal.role == PaperStateMachine::CREATE_ROLE {
            Ok(())
        } else {
            Err(AppError::WrongRole {
                action: Action::Create,
                role: principal.role,
            })
        }
    }
}
