//! Role-scoped read paths
//!
//! Scoping is applied before any caller filter and cannot be switched off:
//! lecturers see their own papers, examiners the papers of their assigned
//! courses, HODs everything.

use crate::auth::{Principal, Role};
use crate::db::{PaperSelector, PaperStore, SortOrder};
use crate::errors::{AppError, Result};
use crate::workflow::{Paper, PaperStatus};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Optional caller-supplied narrowing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaperFilter {
    pub status: Option<PaperStatus>,
    pub department: Option<String>,
    pub course_code: Option<String>,
}

#[derive(Clone)]
pub struct PaperQueryService {
    store: Arc<dyn PaperStore>,
}

impl PaperQueryService {
    pub fn new(store: Arc<dyn PaperStore>) -> Self {
        Self { store }
    }

    /// Selector restricted to what `principal` may see
    pub fn scope(principal: &Principal) -> PaperSelector {
        let mut selector = PaperSelector::default();
        match principal.role {
            Role::Lecturer => selector.lecturer_id = Some(principal.user_id),
            Role::Examiner => {
                selector.course_codes = Some(principal.assigned_course_codes.clone())
            }
            Role::Hod => {}
        }
        selector
    }

    /// Per-paper access check, consistent with [`Self::scope`]. Approved
    /// papers are visible to every role through the repository.
    pub fn can_view(principal: &Principal, paper: &Paper) -> bool {
        if paper.status == PaperStatus::Approved {
            return true;
        }
        match principal.role {
            Role::Lecturer => paper.lecturer_id == principal.user_id,
            Role::Examiner => principal.is_assigned_to(&paper.metadata.course_code),
            Role::Hod => true,
        }
    }

    pub async fn get(&self, principal: &Principal, id: Uuid) -> Result<Paper> {
        let paper = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::PaperNotFound { id: id.to_string() })?;

        if !Self::can_view(principal, &paper) {
            return Err(AppError::Forbidden {
                message: "Not permitted to view this paper".to_string(),
            });
        }
        Ok(paper)
    }

    pub async fn list(&self, principal: &Principal, filter: &PaperFilter) -> Result<Vec<Paper>> {
        let mut selector = Self::scope(principal);
        selector.statuses = filter.status.map(|s| vec![s]);
        selector.department = filter.department.clone();
        selector.course_code = filter.course_code.clone();
        self.store.find(&selector).await
    }

    /// Papers waiting on this examiner's moderation
    pub async fn awaiting_moderation(&self, principal: &Principal) -> Result<Vec<Paper>> {
        require_role(principal, Role::Examiner, "list papers awaiting moderation")?;
        let mut selector = Self::scope(principal);
        selector.statuses = Some(vec![PaperStatus::PendingModeration]);
        self.store.find(&selector).await
    }

    /// HOD queue: papers to approve and approved papers to print
    pub async fn pending_approvals(&self, principal: &Principal) -> Result<Vec<Paper>> {
        require_role(principal, Role::Hod, "list pending approvals")?;
        let mut selector = Self::scope(principal);
        selector.statuses = Some(vec![PaperStatus::PendingApproval, PaperStatus::Approved]);
        self.store.find(&selector).await
    }

    /// Papers whose moderation concluded
    pub async fn moderated_archive(&self, principal: &Principal) -> Result<Vec<Paper>> {
        let mut selector = Self::scope(principal);
        selector.statuses = Some(vec![PaperStatus::Approved, PaperStatus::Rejected]);
        self.store.find(&selector).await
    }

    /// Approved papers across the institution, newest approval first
    pub async fn approved_repository(&self, department: Option<String>) -> Result<Vec<Paper>> {
        let selector = PaperSelector {
            statuses: Some(vec![PaperStatus::Approved]),
            department,
            order: SortOrder::UpdatedDesc,
            ..Default::default()
        };
        self.store.find(&selector).await
    }
}

fn require_role(principal: &Principal, role: Role, what: &str) -> Result<()> {
    if principal.role == role {
        Ok(())
    } else {
        Err(AppError::Forbidden {
            message: format!("Role '{}' may not {}", principal.role, what),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_by_role() {
        let lecturer = Principal::new(Uuid::new_v4(), Role::Lecturer, "L");
        let examiner = Principal::new(Uuid::new_v4(), Role::Examiner, "E").with_courses(["CS101"]);
        let hod = Principal::new(Uuid::new_v4(), Role::Hod, "H");

        assert_eq!(PaperQueryService::scope(&lecturer).lecturer_id, Some(lecturer.user_id));
        assert_eq!(
            PaperQueryService::scope(&examiner).course_codes,
            Some(vec!["CS101".to_string()])
        );
        let hod_scope = PaperQueryService::scope(&hod);
        assert!(hod_scope.lecturer_id.is_none() && hod_scope.course_codes.is_none());
    }
}
