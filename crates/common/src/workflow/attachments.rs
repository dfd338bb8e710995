//! Attachment manager
//!
//! Binds uploaded PDFs to papers. The ordering contract is:
//! new blob durably written -> paper committed -> superseded blob deleted.
//! A failed write leaves the paper and its old blob untouched; a failed
//! cleanup of the old blob only leaves an orphan, which is logged.

use crate::config::StorageConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::storage::BlobStore;
use crate::workflow::{Attachment, Paper, PaperSnapshot};
use chrono::Utc;
use regex_lite::Regex;
use sha2::{Digest, Sha256};
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};
use uuid::Uuid;

const KEY_PREFIX: &str = "papers";
const PDF_MAGIC: &[u8] = b"%PDF-";
const MAX_NAME_CHARS: usize = 80;

/// An uploaded file as received at the request boundary
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn pdf(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: Some("application/pdf".to_string()),
            bytes: bytes.into(),
        }
    }
}

/// Replace file names with something safe to embed in a blob key
pub fn sanitize_file_name(name: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let unsafe_chars = UNSAFE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]+").unwrap());

    // Browsers on some platforms send the full client path
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned = unsafe_chars.replace_all(base, "_");
    let cleaned: String = cleaned
        .trim_start_matches('.')
        .chars()
        .take(MAX_NAME_CHARS)
        .collect();

    if cleaned.is_empty() {
        "paper.pdf".to_string()
    } else {
        cleaned
    }
}

/// A staged replacement: the new blob is stored, the old one still exists.
#[derive(Debug)]
#[must_use = "a swap must be committed or aborted"]
pub struct AttachmentSwap {
    pub new: Attachment,
    pub previous: Attachment,
}

pub struct AttachmentManager {
    store: Arc<dyn BlobStore>,
    public_prefix: String,
    max_bytes: usize,
    require_pdf: bool,
}

impl AttachmentManager {
    pub fn new(store: Arc<dyn BlobStore>, config: &StorageConfig, max_bytes: usize) -> Self {
        Self {
            store,
            public_prefix: config.public_prefix.trim_end_matches('/').to_string(),
            max_bytes,
            require_pdf: config.require_pdf,
        }
    }

    pub fn validate(&self, upload: &Upload) -> Result<()> {
        if upload.bytes.is_empty() {
            return Err(AppError::validation("pdf", "Attachment is empty"));
        }
        if upload.bytes.len() > self.max_bytes {
            return Err(AppError::PayloadTooLarge {
                size: upload.bytes.len(),
                limit: self.max_bytes,
            });
        }
        if self.require_pdf && !upload.bytes.starts_with(PDF_MAGIC) {
            return Err(AppError::validation("pdf", "Attachment must be a PDF document"));
        }
        Ok(())
    }

    /// Validate and durably store a new blob
    pub async fn store(&self, upload: Upload) -> Result<Attachment> {
        self.validate(&upload)?;

        let file_name = sanitize_file_name(&upload.file_name);
        let reference = format!("{}/{}-{}", KEY_PREFIX, Uuid::new_v4(), file_name);
        let sha256 = hex::encode(Sha256::digest(&upload.bytes));

        self.store.write(&reference, &upload.bytes).await?;
        debug!(reference = %reference, size = upload.bytes.len(), "Attachment stored");

        Ok(Attachment {
            reference,
            file_name,
            size_bytes: upload.bytes.len() as u64,
            sha256,
            uploaded_at: Utc::now(),
        })
    }

    /// Store `upload` and point `paper` at it. The superseded blob is kept
    /// until the caller commits the swap after persisting the paper.
    pub async fn set_attachment(&self, paper: &mut Paper, upload: Upload) -> Result<AttachmentSwap> {
        let new = self.store(upload).await?;
        let previous = std::mem::replace(&mut paper.attachment, new.clone());
        Ok(AttachmentSwap { new, previous })
    }

    /// Paper persisted: delete the superseded blob
    pub async fn commit(&self, swap: AttachmentSwap) {
        if swap.previous.reference != swap.new.reference {
            self.release(&swap.previous).await;
        }
    }

    /// Paper not persisted: delete the blob that was staged for it
    pub async fn abort(&self, swap: AttachmentSwap) {
        self.release(&swap.new).await;
    }

    /// Best-effort delete; a failure leaves a logged orphan
    pub async fn release(&self, attachment: &Attachment) {
        if let Err(e) = self.store.delete(&attachment.reference).await {
            warn!(
                reference = %attachment.reference,
                error = %e,
                "Failed to delete attachment blob, leaving orphan"
            );
            metrics::record_orphaned_blob();
        }
    }

    pub async fn read(&self, reference: &str) -> Result<Vec<u8>> {
        self.store.read(reference).await
    }

    pub async fn exists(&self, reference: &str) -> Result<bool> {
        self.store.exists(reference).await
    }

    pub fn public_prefix(&self) -> &str {
        &self.public_prefix
    }

    /// Servable, location-independent URL path for a reference
    pub fn public_url(&self, reference: &str) -> String {
        format!("{}/{}", self.public_prefix, reference)
    }

    pub fn snapshot(&self, paper: Paper) -> PaperSnapshot {
        let attachment_url = self.public_url(&paper.attachment.reference);
        PaperSnapshot {
            paper,
            attachment_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBlobStore;

    fn manager(store: Arc<MemoryBlobStore>) -> AttachmentManager {
        AttachmentManager::new(store, &StorageConfig::default(), 1024)
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("Final Exam (v2).pdf"), "Final_Exam_v2_.pdf");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\exam.pdf"), "exam.pdf");
        assert_eq!(sanitize_file_name("/etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("..."), "paper.pdf");
    }

    #[tokio::test]
    async fn test_store_produces_relative_reference() {
        let store = Arc::new(MemoryBlobStore::new());
        let manager = manager(store.clone());

        let attachment = manager
            .store(Upload::pdf("exam.pdf", b"%PDF-1.7 A".to_vec()))
            .await
            .unwrap();

        assert!(attachment.reference.starts_with("papers/"));
        assert!(attachment.reference.ends_with("-exam.pdf"));
        assert_eq!(attachment.size_bytes, 10);
        assert_eq!(attachment.sha256.len(), 64);
        assert_eq!(
            manager.public_url(&attachment.reference),
            format!("/uploads/{}", attachment.reference)
        );
        assert_eq!(store.read(&attachment.reference).await.unwrap(), b"%PDF-1.7 A");
    }

    #[tokio::test]
    async fn test_rejects_invalid_uploads() {
        let manager = manager(Arc::new(MemoryBlobStore::new()));

        let empty = manager.store(Upload::pdf("a.pdf", Vec::new())).await;
        assert!(matches!(empty, Err(AppError::Validation { .. })));

        let not_pdf = manager.store(Upload::pdf("a.pdf", b"hello".to_vec())).await;
        assert!(matches!(not_pdf, Err(AppError::Validation { .. })));

        let huge = manager.store(Upload::pdf("a.pdf", {
            let mut v = PDF_MAGIC.to_vec();
            v.resize(2048, b'x');
            v
        }))
        .await;
        assert!(matches!(huge, Err(AppError::PayloadTooLarge { .. })));
    }

    #[tokio::test]
    async fn test_abort_removes_staged_blob() {
        let store = Arc::new(MemoryBlobStore::new());
        let manager = manager(store.clone());
        let first = manager
            .store(Upload::pdf("a.pdf", b"%PDF-A".to_vec()))
            .await
            .unwrap();
        let second = manager
            .store(Upload::pdf("b.pdf", b"%PDF-B".to_vec()))
            .await
            .unwrap();

        manager
            .abort(AttachmentSwap {
                new: second.clone(),
                previous: first.clone(),
            })
            .await;

        assert!(store.exists(&first.reference).await.unwrap());
        assert!(!store.exists(&second.reference).await.unwrap());
    }
}
