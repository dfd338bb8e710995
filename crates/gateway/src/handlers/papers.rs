//! Paper workflow handlers
//!
//! Multipart bodies carry the PDF under the `pdf` field plus metadata as
//! text fields; both snake_case and camelCase field names are accepted.

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::AppState;
use examflow_common::{
    auth::Principal,
    errors::{AppError, Result},
    workflow::{
        CreatePaper, MetadataPatch, PaperFilter, PaperMetadata, PaperSnapshot, PaperType,
        UpdatePaper, Upload, MAX_COMMENT_CHARS,
    },
};

const PDF_FIELD: &str = "pdf";

/// Metadata text fields of a paper form
#[derive(Debug, Default, Deserialize, Validate)]
pub struct PaperForm {
    #[serde(default, alias = "courseCode")]
    #[validate(length(max = 32))]
    pub course_code: Option<String>,

    #[serde(default, alias = "courseName")]
    #[validate(length(max = 200))]
    pub course_name: Option<String>,

    #[serde(default)]
    #[validate(length(max = 120))]
    pub department: Option<String>,

    #[serde(default)]
    #[validate(length(max = 16))]
    pub year: Option<String>,

    #[serde(default)]
    #[validate(length(max = 16))]
    pub semester: Option<String>,

    #[serde(default, alias = "paperType")]
    pub paper_type: Option<String>,
}

impl PaperForm {
    fn paper_type(&self) -> Result<Option<PaperType>> {
        self.paper_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| t.to_ascii_lowercase().parse())
            .transpose()
    }

    /// All required fields present
    fn into_metadata(self) -> Result<PaperMetadata> {
        let paper_type = self.paper_type()?.ok_or_else(|| AppError::MissingField {
            field: "paper_type".to_string(),
        })?;
        let required = |value: Option<String>, field: &str| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| AppError::MissingField {
                    field: field.to_string(),
                })
        };

        Ok(PaperMetadata {
            course_code: required(self.course_code, "course_code")?,
            course_name: required(self.course_name, "course_name")?,
            department: self
                .department
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            year: required(self.year, "year")?,
            semester: required(self.semester, "semester")?,
            paper_type,
        })
    }

    fn into_patch(self) -> Result<MetadataPatch> {
        Ok(MetadataPatch {
            paper_type: self.paper_type()?,
            course_code: self.course_code,
            course_name: self.course_name,
            department: self.department,
            year: self.year,
            semester: self.semester,
        })
    }
}

/// Request body for an examiner requesting revision
#[derive(Debug, Deserialize, Validate)]
pub struct RevisionRequest {
    #[validate(length(min = 1, max = MAX_COMMENT_CHARS))]
    pub comment: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApprovedQuery {
    pub department: Option<String>,
}

/// Create a draft paper from a multipart upload
pub async fn create_paper(
    State(state): State<AppState>,
    principal: Principal,
    multipart: Multipart,
) -> Result<(StatusCode, Json<PaperSnapshot>)> {
    let (form, pdf) = read_form(multipart, state.config.server.max_upload_bytes).await?;
    let attachment = pdf.ok_or_else(|| AppError::MissingField {
        field: PDF_FIELD.to_string(),
    })?;

    let snapshot = state
        .workflow
        .create(
            &principal,
            CreatePaper {
                metadata: form.into_metadata()?,
                attachment,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// Role-scoped listing with optional filters
pub async fn list_papers(
    State(state): State<AppState>,
    principal: Principal,
    ApiQuery(filter): ApiQuery<PaperFilter>,
) -> Result<Json<Vec<PaperSnapshot>>> {
    Ok(Json(state.workflow.list(&principal, &filter).await?))
}

pub async fn pending_review(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Vec<PaperSnapshot>>> {
    let papers = state.workflow.queries().awaiting_moderation(&principal).await?;
    Ok(Json(state.workflow.snapshots(papers)))
}

pub async fn pending_approvals(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Vec<PaperSnapshot>>> {
    let papers = state.workflow.queries().pending_approvals(&principal).await?;
    Ok(Json(state.workflow.snapshots(papers)))
}

pub async fn moderated(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Vec<PaperSnapshot>>> {
    let papers = state.workflow.queries().moderated_archive(&principal).await?;
    Ok(Json(state.workflow.snapshots(papers)))
}

/// Approved papers across departments; any authenticated role
pub async fn approved(
    State(state): State<AppState>,
    _principal: Principal,
    ApiQuery(query): ApiQuery<ApprovedQuery>,
) -> Result<Json<Vec<PaperSnapshot>>> {
    let department = query.department.filter(|d| !d.trim().is_empty());
    let papers = state.workflow.queries().approved_repository(department).await?;
    Ok(Json(state.workflow.snapshots(papers)))
}

pub async fn get_paper(
    State(state): State<AppState>,
    principal: Principal,
    ApiPath(paper_id): ApiPath<Uuid>,
) -> Result<Json<PaperSnapshot>> {
    Ok(Json(state.workflow.get(&principal, paper_id).await?))
}

/// Draft-only metadata edit with an optional replacement PDF
pub async fn update_paper(
    State(state): State<AppState>,
    principal: Principal,
    ApiPath(paper_id): ApiPath<Uuid>,
    multipart: Multipart,
) -> Result<Json<PaperSnapshot>> {
    let (form, attachment) = read_form(multipart, state.config.server.max_upload_bytes).await?;
    let command = UpdatePaper {
        patch: form.into_patch()?,
        attachment,
    };
    Ok(Json(state.workflow.update(&principal, paper_id, command).await?))
}

pub async fn delete_paper(
    State(state): State<AppState>,
    principal: Principal,
    ApiPath(paper_id): ApiPath<Uuid>,
) -> Result<StatusCode> {
    state.workflow.delete(&principal, paper_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn submit(
    State(state): State<AppState>,
    principal: Principal,
    ApiPath(paper_id): ApiPath<Uuid>,
) -> Result<Json<PaperSnapshot>> {
    Ok(Json(state.workflow.submit(&principal, paper_id).await?))
}

/// Upload a revised PDF and send the paper back to moderation
pub async fn revise(
    State(state): State<AppState>,
    principal: Principal,
    ApiPath(paper_id): ApiPath<Uuid>,
    multipart: Multipart,
) -> Result<Json<PaperSnapshot>> {
    let (_, pdf) = read_form(multipart, state.config.server.max_upload_bytes).await?;
    let upload = pdf.ok_or_else(|| AppError::MissingField {
        field: PDF_FIELD.to_string(),
    })?;
    Ok(Json(state.workflow.revise(&principal, paper_id, upload).await?))
}

pub async fn request_revision(
    State(state): State<AppState>,
    principal: Principal,
    ApiPath(paper_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<RevisionRequest>,
) -> Result<Json<PaperSnapshot>> {
    request.validate()?;
    Ok(Json(
        state
            .workflow
            .request_revision(&principal, paper_id, request.comment)
            .await?,
    ))
}

pub async fn examiner_approve(
    State(state): State<AppState>,
    principal: Principal,
    ApiPath(paper_id): ApiPath<Uuid>,
) -> Result<Json<PaperSnapshot>> {
    Ok(Json(state.workflow.examiner_approve(&principal, paper_id).await?))
}

pub async fn hod_approve(
    State(state): State<AppState>,
    principal: Principal,
    ApiPath(paper_id): ApiPath<Uuid>,
) -> Result<Json<PaperSnapshot>> {
    Ok(Json(state.workflow.hod_approve(&principal, paper_id).await?))
}

pub async fn mark_printed(
    State(state): State<AppState>,
    principal: Principal,
    ApiPath(paper_id): ApiPath<Uuid>,
) -> Result<Json<PaperSnapshot>> {
    Ok(Json(state.workflow.mark_printed(&principal, paper_id).await?))
}

/// Drain a multipart body into validated text fields and the optional PDF
async fn read_form(mut multipart: Multipart, limit: usize) -> Result<(PaperForm, Option<Upload>)> {
    let mut fields = serde_json::Map::new();
    let mut pdf = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == PDF_FIELD {
            let file_name = field.file_name().unwrap_or("paper.pdf").to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
            pdf = Some(Upload {
                file_name,
                content_type,
                bytes: bytes.to_vec(),
            });
        } else {
            let value = field.text().await.map_err(|e| multipart_error(e, limit))?;
            fields.insert(name, serde_json::Value::String(value));
        }
    }

    let form: PaperForm = serde_json::from_value(serde_json::Value::Object(fields))?;
    form.validate()?;
    Ok((form, pdf))
}

fn multipart_error(err: MultipartError, limit: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        // The body is cut off at the limit, so the real size is unknown
        AppError::PayloadTooLarge {
            size: limit + 1,
            limit,
        }
    } else {
        AppError::validation(PDF_FIELD, err.body_text())
    }
}
