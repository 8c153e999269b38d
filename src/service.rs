//! The seam between the offline machinery and the remote event service.
//!
//! The real implementation is [`RestEventService`](crate::client::RestEventService); tests
//! swap in an in-memory one, the same way a mocked source replaces a real server elsewhere.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::{Event, EventDraft, EventId};
use crate::filter::{EventFilter, EventPage};

/// What can go wrong when talking to the service.
///
/// The distinction matters to the replay logic: a [`NotFound`](ServiceError::NotFound) on a
/// queued delete means the work is already done, while anything else halts the replay.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("unexpected HTTP status code {0}")]
    UnexpectedStatus(reqwest::StatusCode),
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl ServiceError {
    pub fn is_not_found(&self) -> bool {
        match self {
            ServiceError::NotFound(_) => true,
            _ => false,
        }
    }
}

/// A remote source of events.
///
/// Every operation suspends on the network; callers that must not block on connectivity
/// go through the [`SyncCoordinator`](crate::coordinator::SyncCoordinator) instead of
/// using a service directly.
#[async_trait]
pub trait EventService: Send + Sync {
    /// Probe the service. `Ok` means reachable and healthy; any error means unavailable.
    async fn health_check(&self) -> Result<(), ServiceError>;

    /// One page of events matching `filter`, in the `{data, metadata}` envelope
    async fn list_events(
        &self,
        page: usize,
        limit: usize,
        filter: &EventFilter,
    ) -> Result<EventPage, ServiceError>;

    /// Create an event; the result carries the server-assigned identifier
    async fn create_event(&self, draft: &EventDraft) -> Result<Event, ServiceError>;

    /// Replace the event with this identifier
    async fn update_event(&self, id: &EventId, draft: &EventDraft)
        -> Result<Event, ServiceError>;

    /// Delete the event with this identifier
    async fn delete_event(&self, id: &EventId) -> Result<(), ServiceError>;
}

/// A message pushed over the server's broadcast channel.
///
/// Consumers maintaining a filtered view should append the payload only when it passes
/// [`EventFilter::matches`](crate::filter::EventFilter::matches).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BroadcastMessage {
    #[serde(rename = "NEW_ENTITY")]
    NewEntity { data: Event },
}
