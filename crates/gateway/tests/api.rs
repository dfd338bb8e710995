//! Router tests driven in-process with `tower::ServiceExt::oneshot`

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use examflow_common::{
    auth::{Principal, Role},
    config::AppConfig,
    db::InMemoryPaperStore,
    errors::AppError,
    storage::MemoryBlobStore,
    workflow::PaperEvent,
};
use examflow_gateway::{create_router, handlers::events::to_sse, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

const BOUNDARY: &str = "examflow-test-boundary";
const PDF_A: &[u8] = b"%PDF-1.7 first draft";
const PDF_B: &[u8] = b"%PDF-1.7 revised draft";

struct TestApp {
    router: Router,
    state: AppState,
    lecturer: String,
    examiner: String,
    hod: String,
}

fn app() -> TestApp {
    let mut config = AppConfig::default();
    config.auth.jwt_secret = Some("test-secret".to_string());
    config.rate_limit.enabled = false;
    config.observability.metrics_port = 0;

    let state = AppState::new(
        config,
        Arc::new(InMemoryPaperStore::new()),
        Arc::new(MemoryBlobStore::new()),
    )
    .unwrap();

    let token = |p: Principal| state.jwt.generate_token(&p).unwrap();
    TestApp {
        router: create_router(state.clone()),
        lecturer: token(Principal::new(Uuid::new_v4(), Role::Lecturer, "Ada Lovelace")),
        examiner: token(
            Principal::new(Uuid::new_v4(), Role::Examiner, "Edsger Dijkstra").with_courses(["CS101"]),
        ),
        hod: token(Principal::new(Uuid::new_v4(), Role::Hod, "Grace Hopper")),
        state,
    }
}

fn multipart_body(fields: &[(&str, &str)], pdf: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, bytes)) = pdf {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"pdf\"; filename=\"{file_name}\"\r\nContent-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn multipart_request(method: Method, uri: &str, token: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

const METADATA: &[(&str, &str)] = &[
    ("courseCode", "CS101"),
    ("courseName", "Programming I"),
    ("department", "Computing"),
    ("year", "1"),
    ("semester", "2"),
    ("paperType", "Exam"),
];

async fn create(app: &TestApp) -> Value {
    let body = multipart_body(METADATA, Some(("final exam.pdf", PDF_A)));
    let (status, json) = send(
        &app.router,
        multipart_request(Method::POST, "/api/papers", &app.lecturer, body),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    json
}

fn id_of(paper: &Value) -> String {
    paper["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = app();
    let (status, body) = send(&app.router, request(Method::GET, "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app.router, request(Method::GET, "/ready", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["database"]["status"], "up");
}

#[tokio::test]
async fn test_requests_without_token_are_unauthorized() {
    let app = app();
    let (status, body) = send(&app.router, request(Method::GET, "/api/papers", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = send(
        &app.router,
        request(Method::GET, "/api/papers", Some("not-a-jwt"), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_returns_snapshot_with_servable_url() {
    let app = app();
    let paper = create(&app).await;

    assert_eq!(paper["status"], "draft");
    assert_eq!(paper["course_code"], "CS101");
    assert_eq!(paper["paper_type"], "exam");
    assert_eq!(paper["lecturer_name"], "Ada Lovelace");
    assert!(paper["examiner_id"].is_null());

    let url = paper["attachment_url"].as_str().unwrap();
    assert!(url.starts_with("/uploads/papers/"));
    assert!(url.ends_with("-final_exam.pdf"));

    let response = app
        .router
        .clone()
        .oneshot(request(Method::GET, url, None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], PDF_A);
}

#[tokio::test]
async fn test_create_without_pdf_is_rejected() {
    let app = app();
    let body = multipart_body(METADATA, None);
    let (status, json) = send(
        &app.router,
        multipart_request(Method::POST, "/api/papers", &app.lecturer, body),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "MISSING_FIELD");
    assert_eq!(json["error"]["field"], "pdf");
}

#[tokio::test]
async fn test_workflow_over_http() {
    let app = app();
    let paper = create(&app).await;
    let id = id_of(&paper);
    let old_url = paper["attachment_url"].as_str().unwrap().to_string();

    let (status, json) = send(
        &app.router,
        request(Method::PATCH, &format!("/api/papers/{id}/submit"), Some(&app.lecturer), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "pending_moderation");

    let (status, json) = send(
        &app.router,
        request(
            Method::PATCH,
            &format!("/api/papers/{id}/revision"),
            Some(&app.examiner),
            Some(json!({ "comment": "fix table 2" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "revision_required");
    assert_eq!(json["moderation_comments"][0]["text"], "fix table 2");
    assert_eq!(json["moderation_comments"][0]["author_name"], "Edsger Dijkstra");

    let body = multipart_body(&[], Some(("v2.pdf", PDF_B)));
    let (status, json) = send(
        &app.router,
        multipart_request(Method::PATCH, &format!("/api/papers/{id}/revise"), &app.lecturer, body),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "pending_moderation");
    assert_ne!(json["attachment_url"].as_str().unwrap(), old_url);

    let (status, _) = send(&app.router, request(Method::GET, &old_url, None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = send(
        &app.router,
        request(
            Method::PATCH,
            &format!("/api/papers/{id}/approve/examiner"),
            Some(&app.examiner),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "pending_approval");
    assert_eq!(json["examiner_name"], "Edsger Dijkstra");

    let (status, queue) = send(
        &app.router,
        request(Method::GET, "/api/papers/pending-approvals", Some(&app.hod), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(queue.as_array().unwrap().len(), 1);

    let (status, json) = send(
        &app.router,
        request(Method::PATCH, &format!("/api/papers/{id}/approve"), Some(&app.hod), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "approved");

    let (status, json) = send(
        &app.router,
        request(Method::PATCH, &format!("/api/papers/{id}/print"), Some(&app.hod), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "printed");

    let (status, json) = send(
        &app.router,
        request(Method::PATCH, &format!("/api/papers/{id}/print"), Some(&app.hod), None),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "INVALID_TRANSITION");
    assert_eq!(json["error"]["current_status"], "printed");
}

#[tokio::test]
async fn test_examiner_submit_is_forbidden() {
    let app = app();
    let id = id_of(&create(&app).await);

    let (status, json) = send(
        &app.router,
        request(Method::PATCH, &format!("/api/papers/{id}/submit"), Some(&app.examiner), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"]["code"], "WRONG_ROLE");
}

#[tokio::test]
async fn test_blank_revision_comment_is_rejected() {
    let app = app();
    let id = id_of(&create(&app).await);
    send(
        &app.router,
        request(Method::PATCH, &format!("/api/papers/{id}/submit"), Some(&app.lecturer), None),
    )
    .await;

    let (status, json) = send(
        &app.router,
        request(
            Method::PATCH,
            &format!("/api/papers/{id}/revision"),
            Some(&app.examiner),
            Some(json!({ "comment": "" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_update_and_delete_draft() {
    let app = app();
    let id = id_of(&create(&app).await);

    let body = multipart_body(&[("course_name", "Programming Fundamentals")], None);
    let (status, json) = send(
        &app.router,
        multipart_request(Method::PUT, &format!("/api/papers/{id}"), &app.lecturer, body),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "draft");
    assert_eq!(json["course_name"], "Programming Fundamentals");

    let (status, _) = send(
        &app.router,
        request(Method::DELETE, &format!("/api/papers/{id}"), Some(&app.lecturer), None),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, json) = send(
        &app.router,
        request(Method::GET, &format!("/api/papers/{id}"), Some(&app.lecturer), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "PAPER_NOT_FOUND");
}

#[tokio::test]
async fn test_lists_are_role_scoped() {
    let app = app();
    let id = id_of(&create(&app).await);
    let outsider = app
        .state
        .jwt
        .generate_token(&Principal::new(Uuid::new_v4(), Role::Lecturer, "Yusuf"))
        .unwrap();

    let (_, mine) = send(&app.router, request(Method::GET, "/api/papers", Some(&app.lecturer), None)).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);

    let (_, theirs) = send(&app.router, request(Method::GET, "/api/papers", Some(&outsider), None)).await;
    assert!(theirs.as_array().unwrap().is_empty());

    let (status, _) = send(
        &app.router,
        request(Method::GET, &format!("/api/papers/{id}"), Some(&outsider), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, filtered) = send(
        &app.router,
        request(Method::GET, "/api/papers?status=approved", Some(&app.hod), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(filtered.as_array().unwrap().is_empty());

    let (status, _) = send(
        &app.router,
        request(Method::GET, "/api/papers/pending-review", Some(&app.lecturer), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_change_stream_filters_by_visibility() {
    let app = app();
    let mut events = app.state.workflow.notifier().subscribe();
    let paper = create(&app).await;
    let id: Uuid = id_of(&paper).parse().unwrap();

    let event = events.recv().await.unwrap();
    assert_eq!(event.name(), PaperEvent::UPDATED);
    assert_eq!(event.paper_id(), id);

    let owner = app.state.jwt.authenticate(&app.lecturer).unwrap();
    let stranger = Principal::new(Uuid::new_v4(), Role::Lecturer, "Yusuf");
    assert!(to_sse(&owner, &event).is_some());
    assert!(to_sse(&stranger, &event).is_none());

    let deleted = PaperEvent::Deleted { id };
    assert!(to_sse(&stranger, &deleted).is_some());
}

#[tokio::test]
async fn test_unknown_attachment_is_not_found() {
    let app = app();
    let (status, _) = send(
        &app.router,
        request(Method::GET, "/uploads/papers/missing.pdf", None, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_requests_use_error_envelope() {
    let app = app();
    let id = id_of(&create(&app).await);
    send(
        &app.router,
        request(Method::PATCH, &format!("/api/papers/{id}/submit"), Some(&app.lecturer), None),
    )
    .await;

    let (status, json) = send(
        &app.router,
        request(
            Method::PATCH,
            &format!("/api/papers/{id}/revision"),
            Some(&app.examiner),
            Some(json!({})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");

    let (_, paper) = send(
        &app.router,
        request(Method::GET, &format!("/api/papers/{id}"), Some(&app.lecturer), None),
    )
    .await;
    assert_eq!(paper["status"], "pending_moderation");
    assert_eq!(paper["moderation_comments"], json!([]));

    let (status, json) = send(
        &app.router,
        request(Method::GET, "/api/papers?status=bogus", Some(&app.hod), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");

    let (status, json) = send(
        &app.router,
        request(Method::GET, "/api/papers/not-a-uuid", Some(&app.hod), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(json["error"]["field"], "id");
}

#[test]
fn test_public_prefix_must_be_a_path() {
    let mut config = AppConfig::default();
    config.auth.jwt_secret = Some("test-secret".to_string());
    config.storage.public_prefix = "https://cdn.example.com/papers".to_string();

    let err = AppState::new(
        config,
        Arc::new(InMemoryPaperStore::new()),
        Arc::new(MemoryBlobStore::new()),
    )
    .err();
    assert!(matches!(err, Some(AppError::Configuration { .. })));
}
