//! Shared scaffolding for the offline/online scenarios: a coordinator wired to an
//! in-memory server whose failures can be scripted per test
#![cfg(feature = "integration_tests")]

use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveTime};
use tempfile::TempDir;

use corkboard::connectivity::ConnectivityMonitor;
use corkboard::in_memory_service::InMemoryEventService;
use corkboard::mock_behaviour::MockBehaviour;
use corkboard::mirror::MirrorStore;
use corkboard::queue::OperationQueue;
use corkboard::{EventDraft, SyncCoordinator};

pub struct TestSetup {
    pub coordinator: SyncCoordinator<InMemoryEventService>,
    pub service: Arc<InMemoryEventService>,
    pub behaviour: Arc<Mutex<MockBehaviour>>,
    /// Keeps the backing files alive for the duration of the test
    pub storage: TempDir,
}

/// Build a coordinator around a scripted in-memory server.
///
/// The monitor starts the way a freshly launched app does: the device is online but no
/// probe has run yet, so the server counts as unavailable until a test probes it.
pub fn populate_test_setup(behaviour: MockBehaviour) -> TestSetup {
    let storage = tempfile::tempdir().unwrap();
    let behaviour = Arc::new(Mutex::new(behaviour));
    let service = Arc::new(InMemoryEventService::with_mock_behaviour(behaviour.clone()));
    let mirror = Arc::new(MirrorStore::new(&storage.path().join("events.json")));
    let queue = Arc::new(OperationQueue::new(
        service.clone(),
        mirror.clone(),
        &storage.path().join("offline_queue.json"),
    ));
    let monitor = Arc::new(ConnectivityMonitor::new(service.clone(), queue.clone()));
    let coordinator = SyncCoordinator::new(service.clone(), mirror, queue, monitor);

    TestSetup { coordinator, service, behaviour, storage }
}

/// Reopen the persisted mirror and queue of an existing setup, as a restarted app would
pub fn reopen(setup: &TestSetup) -> SyncCoordinator<InMemoryEventService> {
    let mirror = Arc::new(MirrorStore::open(&setup.storage.path().join("events.json")));
    let queue = Arc::new(OperationQueue::open(
        setup.service.clone(),
        mirror.clone(),
        &setup.storage.path().join("offline_queue.json"),
    ));
    let monitor = Arc::new(ConnectivityMonitor::new(setup.service.clone(), queue.clone()));
    SyncCoordinator::new(setup.service.clone(), mirror, queue, monitor)
}

pub fn draft(title: &str, group: &str, start: (u32, u32), end: (u32, u32)) -> EventDraft {
    EventDraft {
        title: title.to_string(),
        group: group.to_string(),
        date: NaiveDate::from_ymd_opt(2025, 4, 12).unwrap(),
        start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
        description: format!("The annual {} event", group.to_lowercase()),
    }
}
