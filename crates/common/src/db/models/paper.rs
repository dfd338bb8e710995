//! Paper entity

use crate::errors::AppError;
use crate::workflow::{Attachment, ModerationLog, Paper, PaperMetadata};
use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "papers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    pub lecturer_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub lecturer_name: String,

    pub examiner_id: Option<Uuid>,

    #[sea_orm(column_type = "Text", nullable)]
    pub examiner_name: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub course_code: String,

    #[sea_orm(column_type = "Text")]
    pub course_name: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub department: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub year: String,

    #[sea_orm(column_type = "Text")]
    pub semester: String,

    #[sea_orm(column_type = "Text")]
    pub paper_type: String,

    /// Current attachment descriptor as JSONB
    #[sea_orm(column_type = "JsonBinary")]
    pub attachment: Json,

    /// Append-only moderation log as a JSONB array
    #[sea_orm(column_type = "JsonBinary")]
    pub moderation_comments: Json,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Paper {
    type Error = AppError;

    fn try_from(row: Model) -> crate::errors::Result<Self> {
        let attachment: Attachment = serde_json::from_value(row.attachment)?;
        let moderation_comments: ModerationLog = serde_json::from_value(row.moderation_comments)?;

        Ok(Paper {
            id: row.id,
            status: row.status.parse().map_err(|_| AppError::Internal {
                message: format!("Paper {} has unknown status '{}'", row.id, row.status),
            })?,
            lecturer_id: row.lecturer_id,
            lecturer_name: row.lecturer_name,
            examiner_id: row.examiner_id,
            examiner_name: row.examiner_name,
            metadata: PaperMetadata {
                course_code: row.course_code,
                course_name: row.course_name,
                department: row.department,
                year: row.year,
                semester: row.semester,
                paper_type: row.paper_type.parse()?,
            },
            attachment,
            moderation_comments,
            created_at: row.created_at.with_timezone(&Utc),
            updated_at: row.updated_at.with_timezone(&Utc),
        })
    }
}

impl ActiveModel {
    pub fn from_paper(paper: &Paper) -> crate::errors::Result<Self> {
        Ok(ActiveModel {
            id: Set(paper.id),
            status: Set(paper.status.as_str().to_string()),
            lecturer_id: Set(paper.lecturer_id),
            lecturer_name: Set(paper.lecturer_name.clone()),
            examiner_id: Set(paper.examiner_id),
            examiner_name: Set(paper.examiner_name.clone()),
            course_code: Set(paper.metadata.course_code.clone()),
            course_name: Set(paper.metadata.course_name.clone()),
            department: Set(paper.metadata.department.clone()),
            year: Set(paper.metadata.year.clone()),
            semester: Set(paper.metadata.semester.clone()),
            paper_type: Set(paper.metadata.paper_type.as_str().to_string()),
            attachment: Set(serde_json::to_value(&paper.attachment)?),
            moderation_comments: Set(serde_json::to_value(&paper.moderation_comments)?),
            created_at: Set(paper.created_at.into()),
            updated_at: Set(paper.updated_at.into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{PaperStatus, PaperType};

    fn row(status: &str) -> Model {
        let now = Utc::now();
        let attachment = Attachment {
            reference: "papers/1-exam.pdf".into(),
            file_name: "exam.pdf".into(),
            size_bytes: 8,
            sha256: "ab".into(),
            uploaded_at: now,
        };
        Model {
            id: Uuid::new_v4(),
            status: status.into(),
            lecturer_id: Uuid::new_v4(),
            lecturer_name: "Ada Lovelace".into(),
            examiner_id: None,
            examiner_name: None,
            course_code: "CS101".into(),
            course_name: "Programming I".into(),
            department: Some("Computing".into()),
            year: "1".into(),
            semester: "2".into(),
            paper_type: "exam".into(),
            attachment: serde_json::to_value(&attachment).unwrap(),
            moderation_comments: serde_json::json!([]),
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    #[test]
    fn test_row_converts_to_paper_and_back() {
        let paper = Paper::try_from(row("pending_moderation")).unwrap();
        assert_eq!(paper.status, PaperStatus::PendingModeration);
        assert_eq!(paper.metadata.paper_type, PaperType::Exam);
        assert_eq!(paper.attachment.reference, "papers/1-exam.pdf");
        assert!(paper.moderation_comments.is_empty());

        let active = ActiveModel::from_paper(&paper).unwrap();
        assert_eq!(active.status.clone().unwrap(), "pending_moderation");
        assert_eq!(active.course_code.clone().unwrap(), "CS101");
        assert_eq!(active.id.clone().unwrap(), paper.id);
    }

    #[test]
    fn test_unknown_status_rejected() {
        let err = Paper::try_from(row("archived")).unwrap_err();
        assert!(matches!(err, AppError::Internal { .. }));
    }
}
