//! Side effects that follow a committed transition.
//!
//! Services commit first and only then hand their events to [`EventDispatcher`]. Delivery is
//! fire-and-forget: a failed publish is logged and never turns a committed transition into an
//! error.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::applications::domain::ApplicationId;
use super::directory::UserId;
use super::milestones::domain::MilestoneId;

/// Notification templates understood by the chat/notification collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ApplicationAssigned,
    ApplicationUnassigned,
    ApplicationRecommended,
    MilestoneChangesRequested,
    MilestoneReleased,
    MilestoneDisputed,
}

impl EventKind {
    pub const fn template(self) -> &'static str {
        match self {
            EventKind::ApplicationAssigned => "application_assigned",
            EventKind::ApplicationUnassigned => "application_unassigned",
            EventKind::ApplicationRecommended => "application_recommended",
            EventKind::MilestoneChangesRequested => "milestone_changes_requested",
            EventKind::MilestoneReleased => "milestone_released",
            EventKind::MilestoneDisputed => "milestone_disputed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum EventSubject {
    Application(ApplicationId),
    Milestone(MilestoneId),
}

/// One message for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub kind: EventKind,
    pub recipient: UserId,
    pub subject: EventSubject,
    pub details: BTreeMap<String, String>,
}

impl WorkflowEvent {
    pub fn new(kind: EventKind, recipient: UserId, subject: EventSubject) -> Self {
        Self {
            kind,
            recipient,
            subject,
            details: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<String>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

/// Outbound hook to the notification/chat collaborator.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: WorkflowEvent) -> Result<(), PublishError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
    #[error("recipient {0:?} cannot be reached")]
    UnknownRecipient(UserId),
}

/// Delivers events after a commit without letting delivery failures escape.
pub struct EventDispatcher<E> {
    publisher: Arc<E>,
}

impl<E> Clone for EventDispatcher<E> {
    fn clone(&self) -> Self {
        Self {
            publisher: Arc::clone(&self.publisher),
        }
    }
}

impl<E> EventDispatcher<E>
where
    E: EventPublisher,
{
    pub fn new(publisher: Arc<E>) -> Self {
        Self { publisher }
    }

    /// Publish each event, returning how many were delivered.
    pub fn dispatch(&self, events: Vec<WorkflowEvent>) -> usize {
        let mut delivered = 0;
        for event in events {
            let kind = event.kind.template();
            let recipient = event.recipient.0.clone();
            match self.publisher.publish(event) {
                Ok(()) => {
                    delivered += 1;
                    debug!(kind, %recipient, "workflow event delivered");
                }
                Err(err) => warn!(kind, %recipient, error = %err, "workflow event dropped"),
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FlakyPublisher {
        delivered: Mutex<Vec<WorkflowEvent>>,
    }

    impl EventPublisher for FlakyPublisher {
        fn publish(&self, event: WorkflowEvent) -> Result<(), PublishError> {
            if event.recipient.0 == "offline" {
                return Err(PublishError::UnknownRecipient(event.recipient));
            }
            self.delivered.lock().expect("publisher mutex").push(event);
            Ok(())
        }
    }

    #[test]
    fn failed_delivery_does_not_stop_the_batch() {
        let publisher = Arc::new(FlakyPublisher::default());
        let dispatcher = EventDispatcher::new(publisher.clone());
        let subject = EventSubject::Application(ApplicationId("app-1".to_string()));

        let delivered = dispatcher.dispatch(vec![
            WorkflowEvent::new(
                EventKind::ApplicationAssigned,
                UserId("offline".to_string()),
                subject.clone(),
            ),
            WorkflowEvent::new(
                EventKind::ApplicationAssigned,
                UserId("stu-2".to_string()),
                subject,
            )
            .with_detail("project_id", "prj-1"),
        ]);

        assert_eq!(delivered, 1);
        let events = publisher.delivered.lock().expect("publisher mutex");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].details.get("project_id").map(String::as_str), Some("prj-1"));
    }
}
