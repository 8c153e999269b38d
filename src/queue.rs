//! The ordered log of writes made while the server was unreachable.
//!
//! Operations are replayed strictly head-to-tail once connectivity returns. A failure
//! other than "this delete's target is already gone" halts the replay, so a resource's
//! writes are never reordered; the failed operation keeps its error for diagnostics and
//! everything behind it stays queued until the next trigger.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{EventDraft, EventId, SyncStatus};
use crate::mirror::MirrorStore;
use crate::service::{EventService, ServiceError};

/// A random identifier attached to each queued operation, for tracing and de-duplication
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationId(String);

impl OperationId {
    fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_hyphenated().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The write a queued operation will replay against the service
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "UPPERCASE")]
pub enum PendingAction {
    /// A create, remembering the temporary identifier it must reconcile once the server
    /// assigns a real one
    Create { temp_id: EventId, draft: EventDraft },
    Update { id: EventId, draft: EventDraft },
    Delete { id: EventId },
}

impl PendingAction {
    fn describe(&self) -> String {
        match self {
            PendingAction::Create { temp_id, .. } => format!("create ({})", temp_id),
            PendingAction::Update { id, .. } => format!("update ({})", id),
            PendingAction::Delete { id } => format!("delete ({})", id),
        }
    }

    fn is_delete(&self) -> bool {
        match self {
            PendingAction::Delete { .. } => true,
            _ => false,
        }
    }
}

/// One entry of the offline queue
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueuedOperation {
    op_id: OperationId,
    queued_at: DateTime<Utc>,
    #[serde(flatten)]
    action: PendingAction,
    /// The error that halted the last replay attempt, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_error: Option<String>,
}

impl QueuedOperation {
    pub fn op_id(&self) -> &OperationId { &self.op_id }
    pub fn queued_at(&self) -> &DateTime<Utc> { &self.queued_at }
    pub fn action(&self) -> &PendingAction { &self.action }
    pub fn last_error(&self) -> Option<&str> { self.last_error.as_deref() }
}

/// A persisted FIFO of writes awaiting delivery to the service
pub struct OperationQueue<S: EventService> {
    service: Arc<S>,
    mirror: Arc<MirrorStore>,
    backing_file: PathBuf,
    operations: Mutex<Vec<QueuedOperation>>,
    /// The at-most-one-replay guard: a trigger that arrives mid-replay is discarded
    replaying: AtomicBool,
}

impl<S: EventService> OperationQueue<S> {
    /// An empty queue that will persist to `path`
    pub fn new(service: Arc<S>, mirror: Arc<MirrorStore>, path: &Path) -> Self {
        Self {
            service,
            mirror,
            backing_file: PathBuf::from(path),
            operations: Mutex::new(Vec::new()),
            replaying: AtomicBool::new(false),
        }
    }

    /// Load a queue from its backing file, treating a missing or corrupt file as empty
    pub fn open(service: Arc<S>, mirror: Arc<MirrorStore>, path: &Path) -> Self {
        let operations = match std::fs::File::open(path) {
            Err(err) => {
                log::info!("No usable queue file {:?} ({}), starting empty", path, err);
                Vec::new()
            }
            Ok(file) => match serde_json::from_reader(file) {
                Err(err) => {
                    log::warn!("Corrupt queue file {:?} ({}), starting empty", path, err);
                    Vec::new()
                }
                Ok(operations) => operations,
            },
        };

        Self {
            service,
            mirror,
            backing_file: PathBuf::from(path),
            operations: Mutex::new(operations),
            replaying: AtomicBool::new(false),
        }
    }

    /// Append a write to the tail and persist. Never fails.
    pub fn add_operation(&self, action: PendingAction) -> OperationId {
        let operation = QueuedOperation {
            op_id: OperationId::random(),
            queued_at: Utc::now(),
            action,
            last_error: None,
        };
        let op_id = operation.op_id.clone();
        log::debug!("Queueing {} as {}", operation.action.describe(), op_id);

        let mut operations = self.operations.lock().unwrap();
        operations.push(operation);
        self.persist(&operations);
        op_id
    }

    /// A snapshot of the pending operations, head first
    pub fn pending(&self) -> Vec<QueuedOperation> {
        self.operations.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.operations.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replay the queue head-to-tail against the service.
    ///
    /// If a replay is already in progress this returns immediately: triggers are safe to
    /// fire from several places at once (reconnect, startup, explicit retry). On success an
    /// operation is removed and the next one runs. A not-found answer to a delete means the
    /// resource is already gone and counts as success. Any other failure is recorded on the
    /// failed operation and stops the run, leaving it and everything behind it queued.
    pub async fn process_queue(&self) {
        if self.replaying.swap(true, Ordering::SeqCst) {
            log::debug!("A replay is already running, discarding this trigger");
            return;
        }

        loop {
            let operation = match self.operations.lock().unwrap().first() {
                None => break,
                Some(op) => op.clone(),
            };

            match self.execute(&operation).await {
                Ok(()) => {
                    log::info!("Replayed {}", operation.action.describe());
                    let mut operations = self.operations.lock().unwrap();
                    operations.remove(0);
                    self.persist(&operations);
                }
                Err(err) => {
                    if operation.action.is_delete() && err.is_not_found() {
                        log::info!(
                            "Target of {} already gone from the server, dropping the operation",
                            operation.action.describe()
                        );
                        let mut operations = self.operations.lock().unwrap();
                        operations.remove(0);
                        self.persist(&operations);
                        continue;
                    }

                    log::warn!(
                        "Replay halted on {} ({}): {}",
                        operation.action.describe(),
                        operation.op_id,
                        err
                    );
                    let mut operations = self.operations.lock().unwrap();
                    if let Some(head) = operations.first_mut() {
                        head.last_error = Some(err.to_string());
                    }
                    self.persist(&operations);
                    break;
                }
            }
        }

        self.replaying.store(false, Ordering::SeqCst);
    }

    /// Run one operation's network call and reconcile the mirror with the outcome
    async fn execute(&self, operation: &QueuedOperation) -> Result<(), ServiceError> {
        match &operation.action {
            PendingAction::Create { temp_id, draft } => {
                let confirmed = self.service.create_event(draft).await?;
                self.mirror.confirm_create(temp_id, confirmed);
            }
            PendingAction::Update { id, draft } => {
                let mut updated = self.service.update_event(id, draft).await?;
                updated.set_sync_status(SyncStatus::Synced);
                self.mirror.upsert_local(updated);
            }
            PendingAction::Delete { id } => {
                self.service.delete_event(id).await?;
                self.mirror.remove_local(id);
            }
        }
        Ok(())
    }

    /// Store the current operations to the backing file
    fn persist(&self, operations: &[QueuedOperation]) {
        let path = &self.backing_file;
        let file = match std::fs::File::create(path) {
            Err(err) => {
                log::warn!("Unable to save file {:?}: {}", path, err);
                return;
            }
            Ok(f) => f,
        };

        if let Err(err) = serde_json::to_writer(file, operations) {
            log::warn!("Unable to serialize: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::in_memory_service::InMemoryEventService;
    use crate::mock_behaviour::MockBehaviour;
    use chrono::{NaiveDate, NaiveTime};

    fn draft(title: &str) -> EventDraft {
        EventDraft {
            title: title.to_string(),
            group: "Rugby".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 10, 5).unwrap(),
            start_time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            description: "d".to_string(),
        }
    }

    struct Fixture {
        service: Arc<InMemoryEventService>,
        mirror: Arc<MirrorStore>,
        queue: Arc<OperationQueue<InMemoryEventService>>,
        _dir: tempfile::TempDir,
    }

    fn fixture(behaviour: MockBehaviour) -> Fixture {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempfile::tempdir().unwrap();
        let service = Arc::new(InMemoryEventService::with_mock_behaviour(Arc::new(
            Mutex::new(behaviour),
        )));
        let mirror = Arc::new(MirrorStore::new(&dir.path().join("events.json")));
        let queue = Arc::new(OperationQueue::new(
            service.clone(),
            mirror.clone(),
            &dir.path().join("offline_queue.json"),
        ));
        Fixture { service, mirror, queue, _dir: dir }
    }

    fn queue_create(fx: &Fixture, millis: i64, title: &str) -> EventId {
        let temp_id = EventId::temp_from_millis(millis);
        let mut optimistic = Event::new(temp_id.clone(), draft(title));
        optimistic.set_sync_status(SyncStatus::AwaitingSync);
        fx.mirror.upsert_local(optimistic);
        fx.queue.add_operation(PendingAction::Create {
            temp_id: temp_id.clone(),
            draft: draft(title),
        });
        temp_id
    }

    #[tokio::test]
    async fn replays_in_submission_order_and_rekeys_creates() {
        let fx = fixture(MockBehaviour::new());
        let temp_a = queue_create(&fx, 1, "event A");
        let temp_b = queue_create(&fx, 2, "event B");

        fx.queue.process_queue().await;

        assert!(fx.queue.is_empty());
        let server_events = fx.service.events();
        assert_eq!(server_events.len(), 2);
        assert_eq!(server_events[0].title(), "event A");
        assert_eq!(server_events[1].title(), "event B");

        let mirrored = fx.mirror.read_all();
        assert_eq!(mirrored.len(), 2);
        assert!(mirrored.iter().all(|e| e.is_queued() == false));
        assert!(fx.mirror.contains(&temp_a) == false);
        assert!(fx.mirror.contains(&temp_b) == false);
    }

    #[tokio::test]
    async fn tolerates_deleting_what_is_already_gone() {
        let fx = fixture(MockBehaviour::new());
        // Not on the server at all: the replayed DELETE will get a not-found
        fx.queue.add_operation(PendingAction::Delete { id: EventId::Server(999) });
        queue_create(&fx, 1, "after the delete");

        fx.queue.process_queue().await;

        // The 404 did not halt the replay: the create behind it went through
        assert!(fx.queue.is_empty());
        assert_eq!(fx.service.events().len(), 1);
    }

    #[tokio::test]
    async fn any_other_failure_halts_the_replay_in_order() {
        let behaviour = MockBehaviour {
            create_event_behaviour: (0, 1),
            ..MockBehaviour::default()
        };
        let fx = fixture(behaviour);
        queue_create(&fx, 1, "will fail once");
        queue_create(&fx, 2, "stuck behind it");

        fx.queue.process_queue().await;

        // Nothing was skipped or reordered, and the head remembers its error
        let pending = fx.queue.pending();
        assert_eq!(pending.len(), 2);
        assert!(pending[0].last_error().is_some());
        assert!(pending[1].last_error().is_none());
        assert!(fx.service.events().is_empty());

        // The next trigger picks up where it failed
        fx.queue.process_queue().await;
        assert!(fx.queue.is_empty());
        assert_eq!(fx.service.events().len(), 2);
    }

    #[tokio::test]
    async fn concurrent_triggers_replay_only_once() {
        let fx = fixture(MockBehaviour::new());
        queue_create(&fx, 1, "only once");
        queue_create(&fx, 2, "me too");

        let first = fx.queue.clone();
        let second = fx.queue.clone();
        tokio::join!(first.process_queue(), second.process_queue());

        // Had both triggers replayed, the creates would have been duplicated
        assert_eq!(fx.service.events().len(), 2);
        assert!(fx.queue.is_empty());
    }

    #[tokio::test]
    async fn survives_a_round_trip_through_the_backing_file() {
        let fx = fixture(MockBehaviour::new());
        queue_create(&fx, 1, "persisted");
        let path = fx._dir.path().join("offline_queue.json");

        let reloaded = OperationQueue::open(fx.service.clone(), fx.mirror.clone(), &path);
        assert_eq!(reloaded.len(), 1);
        match reloaded.pending()[0].action() {
            PendingAction::Create { temp_id, draft } => {
                assert_eq!(temp_id, &EventId::temp_from_millis(1));
                assert_eq!(draft.title, "persisted");
            }
            other => panic!("Expected a queued create, got {:?}", other),
        }

        reloaded.process_queue().await;
        assert!(reloaded.is_empty());
        assert_eq!(fx.service.events().len(), 1);
    }
}
