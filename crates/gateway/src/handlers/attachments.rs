//! Read-only serving of stored attachments under the public prefix

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use examflow_common::{errors::Result, storage::validate_key};

use crate::AppState;

pub async fn download(State(state): State<AppState>, Path(key): Path<String>) -> Result<Response> {
    let attachments = state.workflow.attachments();
    if validate_key(&key).is_err() || !attachments.exists(&key).await? {
        return Ok(StatusCode::NOT_FOUND.into_response());
    }

    let bytes = attachments.read(&key).await?;
    let content_type = if key.ends_with(".pdf") {
        "application/pdf"
    } else {
        "application/octet-stream"
    };
    let file_name = key.rsplit('/').next().unwrap_or(&key);

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    )
        .into_response())
}
