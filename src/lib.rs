//! This crate provides an offline-first way to work with a calendar of sporting events.
//!
//! It provides an HTTP client for the event service in the [`client`] module, that can be
//! used as a stand-alone module.
//!
//! Because the service may be slow or unreachable, and an app should keep showing (and
//! accepting changes to) the calendar regardless, this crate also provides a local copy of
//! the event collection in the [`mirror`] module, and a persisted log of writes made while
//! disconnected in the [`queue`] module.
//!
//! These pieces are tied together by a [`SyncCoordinator`]: it serves reads from the
//! network or the mirror depending on what the [`ConnectivityMonitor`] reports, applies
//! writes optimistically, and has the queue replayed in order once the service is back.

pub mod config;

mod event;
pub use event::{Event, EventDraft, EventId, SyncStatus};

pub mod filter;
pub use filter::{EventFilter, EventPage, PageMetadata, SortKey};

pub mod service;
pub use service::{BroadcastMessage, EventService, ServiceError};

pub mod client;
pub use client::RestEventService;

pub mod mirror;
pub use mirror::MirrorStore;

pub mod queue;
pub use queue::{OperationId, OperationQueue, PendingAction, QueuedOperation};

pub mod connectivity;
pub use connectivity::{ConnectivityMonitor, ConnectivityStatus};

pub mod coordinator;
pub use coordinator::{DeleteOutcome, SyncCoordinator, WriteOutcome};

/// A coordinator over the real REST service, the usual production arrangement
pub type RestSyncCoordinator = SyncCoordinator<RestEventService>;

#[cfg(any(test, feature = "local_store_mocks_remote_service"))]
pub mod mock_behaviour;
#[cfg(any(test, feature = "local_store_mocks_remote_service"))]
pub mod in_memory_service;
#[cfg(any(test, feature = "local_store_mocks_remote_service"))]
pub mod generator;
