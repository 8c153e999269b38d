//! This module is the single entry point the application uses to read and write events.
//!
//! It hides the online/offline branching: reads fall back to the local mirror, writes are
//! applied to the mirror optimistically and queued whenever the service cannot take them.

use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;

use crate::connectivity::ConnectivityMonitor;
use crate::event::{Event, EventDraft, EventId, SyncStatus};
use crate::filter::{paginate, sort_events, EventFilter, EventPage};
use crate::mirror::MirrorStore;
use crate::queue::{OperationId, OperationQueue, PendingAction};
use crate::service::EventService;

/// The outcome of a create or update: either the server acknowledged it, or it is being
/// held locally until the service can take it
#[derive(Clone, Debug)]
pub enum WriteOutcome {
    /// The server accepted the write; the record is durable
    Confirmed(Event),
    /// The write is queued; the record is local-only until the queue replays
    Queued {
        event: Event,
        operation: OperationId,
    },
}

impl WriteOutcome {
    /// The written record, durable or not
    pub fn event(&self) -> &Event {
        match self {
            WriteOutcome::Confirmed(event) => event,
            WriteOutcome::Queued { event, .. } => event,
        }
    }

    pub fn is_queued(&self) -> bool {
        match self {
            WriteOutcome::Queued { .. } => true,
            _ => false,
        }
    }
}

/// The outcome of a delete. Once requested, a delete is never undone locally: a queued
/// outcome still means the record is gone from the mirror.
#[derive(Clone, Debug)]
pub enum DeleteOutcome {
    Confirmed(EventId),
    Queued {
        id: EventId,
        operation: OperationId,
    },
}

impl DeleteOutcome {
    pub fn is_queued(&self) -> bool {
        match self {
            DeleteOutcome::Queued { .. } => true,
            _ => false,
        }
    }
}

/// Combines the service, the local mirror, the operation queue and the connectivity
/// monitor into one offline-first view of the event collection.
///
/// Write operations do not validate drafts: run [`EventDraft::validate`] first, the way
/// the UI form does, so queued writes cannot be rejected later for shape reasons.
pub struct SyncCoordinator<S: EventService> {
    service: Arc<S>,
    mirror: Arc<MirrorStore>,
    queue: Arc<OperationQueue<S>>,
    monitor: Arc<ConnectivityMonitor<S>>,
}

impl<S: EventService> SyncCoordinator<S> {
    /// Assemble a coordinator from its explicitly constructed parts
    pub fn new(
        service: Arc<S>,
        mirror: Arc<MirrorStore>,
        queue: Arc<OperationQueue<S>>,
        monitor: Arc<ConnectivityMonitor<S>>,
    ) -> Self {
        Self { service, mirror, queue, monitor }
    }

    /// Convenience constructor wiring a mirror (`events.json`) and a queue
    /// (`offline_queue.json`) stored under `folder`, plus a monitor, around `service`
    pub fn with_storage(service: S, folder: &Path) -> Result<Self, Box<dyn Error>> {
        std::fs::create_dir_all(folder)?;
        let service = Arc::new(service);
        let mirror = Arc::new(MirrorStore::open(&folder.join("events.json")));
        let queue = Arc::new(OperationQueue::open(
            service.clone(),
            mirror.clone(),
            &folder.join("offline_queue.json"),
        ));
        let monitor = Arc::new(ConnectivityMonitor::new(service.clone(), queue.clone()));
        Ok(Self::new(service, mirror, queue, monitor))
    }

    pub fn mirror(&self) -> &Arc<MirrorStore> { &self.mirror }
    pub fn queue(&self) -> &Arc<OperationQueue<S>> { &self.queue }
    pub fn monitor(&self) -> &Arc<ConnectivityMonitor<S>> { &self.monitor }

    /// One page of events. Served by the network when possible (merging the result into
    /// the mirror), by the mirror otherwise; both paths return the same shape, so callers
    /// never see the difference.
    pub async fn get_events(&self, page: usize, limit: usize, filter: &EventFilter) -> EventPage {
        if self.monitor.status().is_available() == false {
            log::debug!("Offline: serving events from the local mirror");
            return self.offline_page(page, limit, filter);
        }

        match self.service.list_events(page, limit, filter).await {
            Ok(result) => {
                self.mirror.merge(&result.data);
                result
            }
            Err(err) => {
                log::warn!("Unable to fetch events ({}), falling back to the local mirror", err);
                self.offline_page(page, limit, filter)
            }
        }
    }

    /// Create an event. The record is visible locally immediately, under a temporary
    /// identifier until the server assigns one.
    pub async fn create_event(&self, draft: EventDraft) -> WriteOutcome {
        let temp_id = self.next_temp_id();
        let mut optimistic = Event::new(temp_id.clone(), draft.clone());
        optimistic.set_sync_status(SyncStatus::AwaitingSync);
        self.mirror.upsert_local(optimistic.clone());

        if self.monitor.status().is_available() == false {
            let operation = self.queue.add_operation(PendingAction::Create { temp_id, draft });
            return WriteOutcome::Queued { event: optimistic, operation };
        }

        match self.service.create_event(&draft).await {
            Ok(confirmed) => {
                self.mirror.confirm_create(&temp_id, confirmed.clone());
                WriteOutcome::Confirmed(confirmed)
            }
            Err(err) => {
                log::warn!("Unable to create event on the server ({}), queueing it", err);
                let operation = self.queue.add_operation(PendingAction::Create { temp_id, draft });
                WriteOutcome::Queued { event: optimistic, operation }
            }
        }
    }

    /// Overwrite an event. The mirror reflects the new content immediately.
    pub async fn update_event(&self, id: &EventId, draft: EventDraft) -> WriteOutcome {
        let mut optimistic = Event::new(id.clone(), draft.clone());
        optimistic.set_sync_status(SyncStatus::AwaitingSync);
        self.mirror.upsert_local(optimistic.clone());

        if self.monitor.status().is_available() == false {
            let operation =
                self.queue.add_operation(PendingAction::Update { id: id.clone(), draft });
            return WriteOutcome::Queued { event: optimistic, operation };
        }

        match self.service.update_event(id, &draft).await {
            Ok(confirmed) => {
                self.mirror.upsert_local(confirmed.clone());
                WriteOutcome::Confirmed(confirmed)
            }
            Err(err) => {
                log::warn!("Unable to update event {} on the server ({}), queueing it", id, err);
                let operation =
                    self.queue.add_operation(PendingAction::Update { id: id.clone(), draft });
                WriteOutcome::Queued { event: optimistic, operation }
            }
        }
    }

    /// Delete an event. The record leaves the mirror immediately and is never re-inserted,
    /// even if the network call fails: the delete is then queued for replay instead.
    pub async fn delete_event(&self, id: &EventId) -> DeleteOutcome {
        self.mirror.remove_local(id);

        if self.monitor.status().is_available() == false {
            let operation = self.queue.add_operation(PendingAction::Delete { id: id.clone() });
            return DeleteOutcome::Queued { id: id.clone(), operation };
        }

        match self.service.delete_event(id).await {
            Ok(()) => DeleteOutcome::Confirmed(id.clone()),
            Err(err) if err.is_not_found() => {
                // Already gone server-side: nothing left to do
                log::debug!("Event {} was already deleted on the server", id);
                DeleteOutcome::Confirmed(id.clone())
            }
            Err(err) => {
                log::warn!("Unable to delete event {} on the server ({}), queueing it", id, err);
                let operation = self.queue.add_operation(PendingAction::Delete { id: id.clone() });
                DeleteOutcome::Queued { id: id.clone(), operation }
            }
        }
    }

    /// Compute a listing from the mirror with the semantics of the remote endpoint
    fn offline_page(&self, page: usize, limit: usize, filter: &EventFilter) -> EventPage {
        let mut events: Vec<Event> = self
            .mirror
            .read_all()
            .into_iter()
            .filter(|event| filter.matches(event))
            .collect();
        if let Some(key) = &filter.sort_by {
            sort_events(&mut events, key);
        }
        paginate(events, page, limit)
    }

    /// Mint a `temp-<timestamp>` identifier not already present in the mirror (two rapid
    /// creates can land on the same millisecond)
    fn next_temp_id(&self) -> EventId {
        let mut millis = Utc::now().timestamp_millis();
        loop {
            let candidate = EventId::temp_from_millis(millis);
            if self.mirror.contains(&candidate) == false {
                return candidate;
            }
            millis += 1;
        }
    }
}
