//! Server-Sent Events change stream
//!
//! Each connection subscribes to the notifier and receives `paperUpdated`
//! snapshots of papers its principal may view, plus every `paperDeleted`.
//! Nothing is replayed: a client that reconnects must re-fetch.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use examflow_common::{
    auth::Principal,
    workflow::{PaperEvent, PaperQueryService, Subscription},
};
use futures::stream::{self, Stream};
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, warn};

use crate::AppState;

pub async fn stream(
    State(state): State<AppState>,
    principal: Principal,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.workflow.notifier().subscribe();
    let keep_alive = Duration::from_secs(state.config.notifier.keep_alive_secs.max(1));
    debug!(user_id = %principal.user_id, role = %principal.role, "Change stream opened");

    let events = stream::unfold((subscription, principal), next_event);
    Sse::new(events).keep_alive(KeepAlive::new().interval(keep_alive))
}

async fn next_event(
    (mut subscription, principal): (Subscription, Principal),
) -> Option<(Result<Event, Infallible>, (Subscription, Principal))> {
    loop {
        let event = subscription.recv().await?;
        if let Some(sse) = to_sse(&principal, &event) {
            return Some((Ok(sse), (subscription, principal)));
        }
    }
}

/// `None` when the principal may not see the event or it cannot be encoded
pub fn to_sse(principal: &Principal, event: &PaperEvent) -> Option<Event> {
    if let PaperEvent::Updated(snapshot) = event {
        if !PaperQueryService::can_view(principal, &snapshot.paper) {
            return None;
        }
    }

    Event::default()
        .event(event.name())
        .id(event.paper_id().to_string())
        .json_data(event)
        .inspect_err(|e| warn!(paper_id = %event.paper_id(), error = %e, "Failed to encode paper event"))
        .ok()
}
