//! Paper workflow orchestrator
//!
//! Runs every mutating action through gate, effects, commit and notify.

use crate::auth::Principal;
use crate::db::PaperStore;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::workflow::{
    Action, AttachmentManager, AttachmentSwap, AuthorizationGate, ChangeNotifier, Effect,
    MetadataPatch, ModerationLog, Paper, PaperEvent, PaperFilter, PaperMetadata,
    PaperQueryService, PaperSnapshot, PaperStateMachine, PaperStatus, Upload,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};
use uuid::Uuid;

/// Command for creating a paper
#[derive(Debug, Clone)]
pub struct CreatePaper {
    pub metadata: PaperMetadata,
    pub attachment: Upload,
}

/// Command for the draft-only metadata/attachment update
#[derive(Debug, Clone, Default)]
pub struct UpdatePaper {
    pub patch: MetadataPatch,
    pub attachment: Option<Upload>,
}

/// Inputs an action may consume, depending on its effects
#[derive(Default)]
struct ActionInput {
    comment: Option<String>,
    upload: Option<Upload>,
    patch: Option<MetadataPatch>,
}

#[derive(Clone)]
pub struct PaperWorkflow {
    store: Arc<dyn PaperStore>,
    attachments: Arc<AttachmentManager>,
    notifier: ChangeNotifier,
    queries: PaperQueryService,
}

impl PaperWorkflow {
    pub fn new(
        store: Arc<dyn PaperStore>,
        attachments: Arc<AttachmentManager>,
        notifier: ChangeNotifier,
    ) -> Self {
        Self {
            queries: PaperQueryService::new(store.clone()),
            store,
            attachments,
            notifier,
        }
    }

    pub fn queries(&self) -> &PaperQueryService {
        &self.queries
    }

    pub fn attachments(&self) -> &AttachmentManager {
        &self.attachments
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Create a draft owned by the calling lecturer
    #[instrument(skip(self, principal, command), fields(actor = %principal.user_id))]
    pub async fn create(&self, principal: &Principal, command: CreatePaper) -> Result<PaperSnapshot> {
        let start = Instant::now();
        let result = self.create_inner(principal, command).await;
        record(Action::Create, &result, start);
        result
    }

    async fn create_inner(&self, principal: &Principal, command: CreatePaper) -> Result<PaperSnapshot> {
        AuthorizationGate::authorize_create(principal)?;
        command.metadata.validate()?;

        let attachment = self.attachments.store(command.attachment).await?;
        let now = Utc::now();
        let paper = Paper {
            id: Uuid::new_v4(),
            status: PaperStateMachine::INITIAL,
            lecturer_id: principal.user_id,
            lecturer_name: principal.full_name.clone(),
            examiner_id: None,
            examiner_name: None,
            metadata: command.metadata,
            attachment,
            moderation_comments: ModerationLog::new(),
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.store.insert(&paper).await {
            self.attachments.release(&paper.attachment).await;
            return Err(e);
        }

        metrics::record_paper_created();
        info!(
            paper_id = %paper.id,
            course_code = %paper.metadata.course_code,
            to = %paper.status,
            "Paper created"
        );

        let snapshot = self.attachments.snapshot(paper);
        self.notifier.publish(PaperEvent::Updated(snapshot.clone()));
        Ok(snapshot)
    }

    pub async fn submit(&self, principal: &Principal, id: Uuid) -> Result<PaperSnapshot> {
        self.transition(principal, id, Action::Submit, ActionInput::default())
            .await
    }

    pub async fn request_revision(
        &self,
        principal: &Principal,
        id: Uuid,
        comment: impl Into<String>,
    ) -> Result<PaperSnapshot> {
        let input = ActionInput {
            comment: Some(comment.into()),
            ..Default::default()
        };
        self.transition(principal, id, Action::RequestRevision, input)
            .await
    }

    pub async fn examiner_approve(&self, principal: &Principal, id: Uuid) -> Result<PaperSnapshot> {
        self.transition(principal, id, Action::ExaminerApprove, ActionInput::default())
            .await
    }

    pub async fn hod_approve(&self, principal: &Principal, id: Uuid) -> Result<PaperSnapshot> {
        self.transition(principal, id, Action::HodApprove, ActionInput::default())
            .await
    }

    pub async fn mark_printed(&self, principal: &Principal, id: Uuid) -> Result<PaperSnapshot> {
        self.transition(principal, id, Action::MarkPrinted, ActionInput::default())
            .await
    }

    /// Replace the attachment and resubmit for moderation
    pub async fn revise(&self, principal: &Principal, id: Uuid, upload: Upload) -> Result<PaperSnapshot> {
        let input = ActionInput {
            upload: Some(upload),
            ..Default::default()
        };
        self.transition(principal, id, Action::Revise, input).await
    }

    /// Edit a draft. Replacing the attachment also submits it.
    pub async fn update(&self, principal: &Principal, id: Uuid, command: UpdatePaper) -> Result<PaperSnapshot> {
        let input = ActionInput {
            comment: None,
            upload: command.attachment,
            patch: Some(command.patch),
        };
        self.transition(principal, id, Action::Update, input).await
    }

    /// Remove a pre-moderation paper and purge its attachment
    #[instrument(skip(self, principal), fields(actor = %principal.user_id))]
    pub async fn delete(&self, principal: &Principal, id: Uuid) -> Result<()> {
        let start = Instant::now();
        let result = self.delete_inner(principal, id).await;
        record(Action::Delete, &result, start);
        result
    }

    async fn delete_inner(&self, principal: &Principal, id: Uuid) -> Result<()> {
        let paper = self.load(id).await?;
        let transition = AuthorizationGate::enforce(principal, Action::Delete, &paper)?;

        if !self.store.delete(id, paper.status).await? {
            return Err(self.conflict(Action::Delete, id).await);
        }
        if transition.has_effect(Effect::PurgeAttachment) {
            self.attachments.release(&paper.attachment).await;
        }

        info!(paper_id = %id, from = %paper.status, "Paper deleted");
        self.notifier.publish(PaperEvent::Deleted { id });
        Ok(())
    }

    pub async fn get(&self, principal: &Principal, id: Uuid) -> Result<PaperSnapshot> {
        let paper = self.queries.get(principal, id).await?;
        Ok(self.attachments.snapshot(paper))
    }

    pub async fn list(&self, principal: &Principal, filter: &PaperFilter) -> Result<Vec<PaperSnapshot>> {
        let papers = self.queries.list(principal, filter).await?;
        Ok(self.snapshots(papers))
    }

    pub fn snapshots(&self, papers: Vec<Paper>) -> Vec<PaperSnapshot> {
        papers
            .into_iter()
            .map(|p| self.attachments.snapshot(p))
            .collect()
    }

    #[instrument(skip(self, principal, input), fields(actor = %principal.user_id, action = action.as_str()))]
    async fn transition(
        &self,
        principal: &Principal,
        id: Uuid,
        action: Action,
        input: ActionInput,
    ) -> Result<PaperSnapshot> {
        let start = Instant::now();
        let result = self.apply(principal, id, action, input).await;
        record(action, &result, start);
        result
    }

    async fn apply(
        &self,
        principal: &Principal,
        id: Uuid,
        action: Action,
        input: ActionInput,
    ) -> Result<PaperSnapshot> {
        let mut paper = self.load(id).await?;
        let transition = AuthorizationGate::enforce(principal, action, &paper)?;
        let from = paper.status;
        let now = Utc::now();

        // Cheap validation first so a rejected request never writes a blob
        if let Some(ref patch) = input.patch {
            if patch.is_empty() && input.upload.is_none() {
                return Err(AppError::Validation {
                    message: "Nothing to update".to_string(),
                    field: None,
                });
            }
            patch.apply(&mut paper.metadata);
            paper.metadata.validate()?;
        }
        if transition.has_effect(Effect::AppendComment) {
            let comment = input.comment.as_deref().unwrap_or_default();
            paper
                .moderation_comments
                .append(principal.user_id, &principal.full_name, comment, now)?;
        }
        if transition.has_effect(Effect::RecordExaminer) {
            paper.examiner_id = Some(principal.user_id);
            paper.examiner_name = Some(principal.full_name.clone());
        }

        let swap = match input.upload {
            Some(upload)
                if transition.has_effect(Effect::ReplaceAttachment)
                    || transition.has_effect(Effect::MaybeReplaceAttachment) =>
            {
                Some(self.attachments.set_attachment(&mut paper, upload).await?)
            }
            None if transition.has_effect(Effect::ReplaceAttachment) => {
                return Err(AppError::MissingField {
                    field: "pdf".to_string(),
                });
            }
            _ => None,
        };

        // Status-only targets; `Removed` is handled by `delete`
        if let Some(to) = transition.target(from, swap.is_some()) {
            paper.status = to;
        }
        paper.touch(now);

        self.commit(paper, from, action, swap).await
    }

    /// Persist against the status the guard was checked on
    async fn commit(
        &self,
        paper: Paper,
        expected: PaperStatus,
        action: Action,
        swap: Option<AttachmentSwap>,
    ) -> Result<PaperSnapshot> {
        let committed = match self.store.replace(&paper, expected).await {
            Ok(committed) => committed,
            Err(e) => {
                if let Some(swap) = swap {
                    self.attachments.abort(swap).await;
                }
                return Err(e);
            }
        };

        if !committed {
            if let Some(swap) = swap {
                self.attachments.abort(swap).await;
            }
            return Err(self.conflict(action, paper.id).await);
        }

        if let Some(swap) = swap {
            self.attachments.commit(swap).await;
        }

        info!(
            paper_id = %paper.id,
            action = action.as_str(),
            from = %expected,
            to = %paper.status,
            "Paper transitioned"
        );

        let snapshot = self.attachments.snapshot(paper);
        self.notifier.publish(PaperEvent::Updated(snapshot.clone()));
        Ok(snapshot)
    }

    async fn load(&self, id: Uuid) -> Result<Paper> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::PaperNotFound { id: id.to_string() })
    }

    /// The paper changed between read and commit: report what it is now
    async fn conflict(&self, action: Action, id: Uuid) -> AppError {
        match self.store.find_by_id(id).await {
            Ok(Some(current)) => AppError::InvalidTransition {
                action,
                status: current.status,
            },
            Ok(None) => AppError::PaperNotFound { id: id.to_string() },
            Err(e) => e,
        }
    }
}

fn record<T>(action: Action, result: &Result<T>, start: Instant) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) if e.is_authorization() => "denied",
        Err(e) if e.is_client_error() => "invalid",
        Err(_) => "error",
    };
    metrics::record_transition(action.as_str(), outcome, start.elapsed());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::config::StorageConfig;
    use crate::db::InMemoryPaperStore;
    use crate::storage::{BlobStore, MemoryBlobStore};
    use crate::workflow::PaperType;

    fn workflow() -> (PaperWorkflow, Arc<MemoryBlobStore>) {
        let blobs = Arc::new(MemoryBlobStore::new());
        let attachments = AttachmentManager::new(blobs.clone(), &StorageConfig::default(), 1 << 20);
        let workflow = PaperWorkflow::new(
            Arc::new(InMemoryPaperStore::new()),
            Arc::new(attachments),
            ChangeNotifier::new(16),
        );
        (workflow, blobs)
    }

    fn create_command() -> CreatePaper {
        CreatePaper {
            metadata: PaperMetadata {
                course_code: "CS101".into(),
                course_name: "Programming I".into(),
                department: Some("Computing".into()),
                year: "1".into(),
                semester: "2".into(),
                paper_type: PaperType::Exam,
            },
            attachment: Upload::pdf("exam.pdf", b"%PDF-1.7 A".to_vec()),
        }
    }

    #[tokio::test]
    async fn test_update_without_attachment_keeps_draft() {
        let (workflow, _) = workflow();
        let lecturer = Principal::new(Uuid::new_v4(), Role::Lecturer, "Ada");
        let created = workflow.create(&lecturer, create_command()).await.unwrap();

        let updated = workflow
            .update(
                &lecturer,
                created.paper.id,
                UpdatePaper {
                    patch: MetadataPatch {
                        course_name: Some("Programming Fundamentals".into()),
                        ..Default::default()
                    },
                    attachment: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.paper.status, PaperStatus::Draft);
        assert_eq!(updated.paper.metadata.course_name, "Programming Fundamentals");
        assert_eq!(updated.paper.attachment, created.paper.attachment);
    }

    #[tokio::test]
    async fn test_update_with_attachment_submits() {
        let (workflow, blobs) = workflow();
        let lecturer = Principal::new(Uuid::new_v4(), Role::Lecturer, "Ada");
        let created = workflow.create(&lecturer, create_command()).await.unwrap();

        let updated = workflow
            .update(
                &lecturer,
                created.paper.id,
                UpdatePaper {
                    patch: MetadataPatch::default(),
                    attachment: Some(Upload::pdf("v2.pdf", b"%PDF-1.7 B".to_vec())),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.paper.status, PaperStatus::PendingModeration);
        assert!(!blobs.exists(&created.paper.attachment.reference).await.unwrap());
        assert!(blobs.exists(&updated.paper.attachment.reference).await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_update_rejected() {
        let (workflow, _) = workflow();
        let lecturer = Principal::new(Uuid::new_v4(), Role::Lecturer, "Ada");
        let created = workflow.create(&lecturer, create_command()).await.unwrap();

        let err = workflow
            .update(&lecturer, created.paper.id, UpdatePaper::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_blank_revision_comment_leaves_paper_untouched() {
        let (workflow, _) = workflow();
        let lecturer = Principal::new(Uuid::new_v4(), Role::Lecturer, "Ada");
        let examiner = Principal::new(Uuid::new_v4(), Role::Examiner, "Eve").with_courses(["CS101"]);
        let created = workflow.create(&lecturer, create_command()).await.unwrap();
        workflow.submit(&lecturer, created.paper.id).await.unwrap();

        let err = workflow
            .request_revision(&examiner, created.paper.id, "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let stored = workflow.get(&lecturer, created.paper.id).await.unwrap();
        assert_eq!(stored.paper.status, PaperStatus::PendingModeration);
        assert!(stored.paper.moderation_comments.is_empty());
        assert!(stored.paper.examiner_id.is_none());
    }

    #[tokio::test]
    async fn test_revise_rejects_non_pdf_without_storing() {
        let (workflow, blobs) = workflow();
        let lecturer = Principal::new(Uuid::new_v4(), Role::Lecturer, "Ada");
        let created = workflow.create(&lecturer, create_command()).await.unwrap();

        let err = workflow
            .revise(&lecturer, created.paper.id, Upload::pdf("x.pdf", b"not a pdf".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert_eq!(blobs.len().await, 1);
    }

    #[tokio::test]
    async fn test_create_requires_lecturer() {
        let (workflow, blobs) = workflow();
        let hod = Principal::new(Uuid::new_v4(), Role::Hod, "Hal");
        let err = workflow.create(&hod, create_command()).await.unwrap_err();
        assert!(matches!(err, AppError::WrongRole { .. }));
        assert!(blobs.is_empty().await);
    }
}
