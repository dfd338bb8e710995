//! ExamFlow API Gateway
//!
//! HTTP surface of the paper workflow: authentication, rate limiting,
//! request routing, the change stream and attachment downloads.

pub mod extract;
pub mod handlers;
pub mod middleware;

use axum::{
    extract::{DefaultBodyLimit, FromRef},
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
    Router,
};
use examflow_common::{
    auth::JwtManager,
    config::AppConfig,
    db::PaperStore,
    errors::{AppError, Result},
    storage::BlobStore,
    workflow::{AttachmentManager, ChangeNotifier, PaperWorkflow},
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Room for multipart boundaries and metadata fields on top of the file
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: Arc<JwtManager>,
    pub store: Arc<dyn PaperStore>,
    pub workflow: PaperWorkflow,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn PaperStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Result<Self> {
        let secret = config
            .auth
            .jwt_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Configuration {
                message: "auth.jwt_secret must be set".to_string(),
            })?;
        let jwt = Arc::new(JwtManager::new(secret, config.auth.jwt_expiration_secs));
        config.storage.validate()?;

        let attachments = AttachmentManager::new(
            blobs,
            &config.storage,
            config.server.max_upload_bytes,
        );
        let notifier = ChangeNotifier::new(config.notifier.channel_capacity);
        let workflow = PaperWorkflow::new(store.clone(), Arc::new(attachments), notifier);

        Ok(Self {
            config: Arc::new(config),
            jwt,
            store,
            workflow,
        })
    }
}

impl FromRef<AppState> for Arc<JwtManager> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    use handlers::{attachments, events, health, papers};

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let body_limit = state.config.server.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    let paper_routes = Router::new()
        .route("/api/papers", post(papers::create_paper).get(papers::list_papers))
        .route("/api/papers/pending-review", get(papers::pending_review))
        .route("/api/papers/pending-approvals", get(papers::pending_approvals))
        .route("/api/papers/moderated", get(papers::moderated))
        .route("/api/papers/approved", get(papers::approved))
        .route(
            "/api/papers/{id}",
            get(papers::get_paper)
                .put(papers::update_paper)
                .delete(papers::delete_paper),
        )
        .route("/api/papers/{id}/submit", patch(papers::submit))
        .route("/api/papers/{id}/revise", patch(papers::revise))
        .route("/api/papers/{id}/revision", patch(papers::request_revision))
        .route("/api/papers/{id}/approve/examiner", patch(papers::examiner_approve))
        .route("/api/papers/{id}/approve", patch(papers::hod_approve))
        .route("/api/papers/{id}/print", patch(papers::mark_printed))
        .route(
            &format!("{}/{{*key}}", state.workflow.attachments().public_prefix()),
            get(attachments::download),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            state.config.request_timeout(),
        ));

    // The change stream is long-lived and must not hit the request timeout
    let stream_routes = Router::new().route("/api/events", get(events::stream));

    let mut app = Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .merge(paper_routes)
        .merge(stream_routes)
        .route_layer(from_fn(middleware::metrics::track_requests));

    if state.config.rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(
            state.config.rate_limit.requests_per_second,
            state.config.rate_limit.burst,
        );
        app = app.layer(from_fn_with_state(
            limiter,
            middleware::rate_limit::rate_limit_middleware,
        ));
    }

    // Compose the app
    app.layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}
