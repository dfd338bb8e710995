//! Change notifier
//!
//! Process-wide publish/subscribe hub. Every committed change is published
//! once; connected subscribers get it, later subscribers never see it and
//! must re-fetch state. Publishing never fails the caller.

use crate::metrics;
use crate::workflow::PaperSnapshot;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

/// Events fanned out to connected clients
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PaperEvent {
    Updated(PaperSnapshot),
    Deleted { id: Uuid },
}

impl PaperEvent {
    pub const UPDATED: &'static str = "paperUpdated";
    pub const DELETED: &'static str = "paperDeleted";

    /// Event name on the wire
    pub fn name(&self) -> &'static str {
        match self {
            PaperEvent::Updated(_) => Self::UPDATED,
            PaperEvent::Deleted { .. } => Self::DELETED,
        }
    }

    pub fn paper_id(&self) -> Uuid {
        match self {
            PaperEvent::Updated(snapshot) => snapshot.paper.id,
            PaperEvent::Deleted { id } => *id,
        }
    }
}

#[derive(Clone)]
pub struct ChangeNotifier {
    sender: broadcast::Sender<PaperEvent>,
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Fire-and-forget fan-out to every current subscriber
    pub fn publish(&self, event: PaperEvent) {
        let name = event.name();
        let paper_id = event.paper_id();
        metrics::record_notification(name);

        match self.sender.send(event) {
            Ok(receivers) => debug!(event = name, %paper_id, receivers, "Change published"),
            Err(_) => debug!(event = name, %paper_id, "Change published with no subscribers"),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// One connected client's view of the event stream
pub struct Subscription {
    receiver: broadcast::Receiver<PaperEvent>,
}

impl Subscription {
    /// Next event, or `None` once the notifier is gone. A subscriber that
    /// fell behind skips what it missed and keeps going.
    pub async fn recv(&mut self) -> Option<PaperEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Subscriber lagged, dropping missed paper events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
