//! Exam paper workflow
//!
//! A paper moves `draft -> pending_moderation -> pending_approval ->
//! approved -> printed`, with a `revision_required` loop back to the
//! lecturer. Every inbound action goes through the same pipeline:
//!
//! 1. [`AuthorizationGate`] checks role, ownership or assignment, then state
//! 2. effects from the [`TRANSITIONS`] table run (comment, examiner, attachment)
//! 3. the paper is committed with a compare-and-set on its previous status
//! 4. [`ChangeNotifier`] broadcasts the new snapshot

mod attachments;
mod gate;
mod moderation;
mod notifier;
mod paper;
mod query;
mod service;
mod status;
mod transitions;

pub use attachments::{sanitize_file_name, AttachmentManager, AttachmentSwap, Upload};
pub use gate::{AuthorizationGate, Decision, DenyReason};
pub use moderation::{ModerationComment, ModerationLog, MAX_COMMENT_CHARS};
pub use notifier::{ChangeNotifier, PaperEvent, Subscription};
pub use paper::{Attachment, MetadataPatch, Paper, PaperMetadata, PaperSnapshot, PaperType};
pub use query::{PaperFilter, PaperQueryService};
pub use service::{CreatePaper, PaperWorkflow, UpdatePaper};
pub use status::PaperStatus;
pub use transitions::{Action, Effect, PaperStateMachine, Target, Transition, TRANSITIONS};
