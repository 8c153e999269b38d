//! Scenarios that walk the whole offline/online cycle: optimistic writes while
//! disconnected, reconnection, ordered replay, and reconciliation of the local mirror
#![cfg(feature = "integration_tests")]

mod scenarii;

use corkboard::mock_behaviour::MockBehaviour;
use corkboard::{EventFilter, EventId, SortKey};

/// Start offline, create two events, reconnect: the replay must run in submission order,
/// re-key both records with the server's identifiers and clear their queued markers.
#[tokio::test]
async fn test_create_offline_then_reconnect() {
    let _ = env_logger::builder().is_test(true).try_init();
    let setup = scenarii::populate_test_setup(MockBehaviour::new());
    let coordinator = &setup.coordinator;

    let a = coordinator
        .create_event(scenarii::draft("Event A", "Cricket", (10, 0), (12, 0)))
        .await;
    let b = coordinator
        .create_event(scenarii::draft("Event B", "Marathon", (6, 30), (11, 0)))
        .await;
    assert!(a.is_queued() && b.is_queued());
    assert!(a.event().id().is_temp() && b.event().id().is_temp());
    assert_eq!(coordinator.queue().len(), 2);

    // The reconnect probe notices the server and replays the queue before notifying
    let mut status_feed = coordinator.monitor().subscribe();
    coordinator.monitor().check_server().await;
    assert!(status_feed.has_changed().unwrap());
    assert!(status_feed.borrow_and_update().is_available());

    assert!(coordinator.queue().is_empty());
    let on_server = setup.service.events();
    assert_eq!(on_server.len(), 2);
    assert_eq!(on_server[0].title(), "Event A");
    assert_eq!(on_server[0].id(), &EventId::Server(1));
    assert_eq!(on_server[1].title(), "Event B");
    assert_eq!(on_server[1].id(), &EventId::Server(2));

    let mirrored = coordinator.mirror().read_all();
    assert_eq!(mirrored.len(), 2);
    assert!(mirrored.iter().all(|e| e.is_queued() == false));
    assert!(mirrored.iter().all(|e| e.id().is_temp() == false));
}

/// A server that accepts writes again after an outage: online writes degrade to queued
/// ones while it is down, and an explicit retry delivers them.
#[tokio::test]
async fn test_flaky_server_recovery() {
    let _ = env_logger::builder().is_test(true).try_init();
    // The probe succeeds, then every operation fails twice before recovering
    let behaviour = MockBehaviour {
        create_event_behaviour: (0, 2),
        ..MockBehaviour::default()
    };
    let setup = scenarii::populate_test_setup(behaviour);
    let coordinator = &setup.coordinator;
    coordinator.monitor().check_server().await;

    let outcome = coordinator
        .create_event(scenarii::draft("Stubborn", "Boxing", (20, 0), (22, 0)))
        .await;
    assert!(outcome.is_queued());
    assert_eq!(coordinator.queue().len(), 1);

    // First retry still fails and the error is kept for diagnostics
    coordinator.queue().process_queue().await;
    let pending = coordinator.queue().pending();
    assert_eq!(pending.len(), 1);
    assert!(pending[0].last_error().is_some());

    // Second retry goes through
    coordinator.queue().process_queue().await;
    assert!(coordinator.queue().is_empty());
    assert_eq!(setup.service.events().len(), 1);
}

/// Mixed queue replay: a delete whose target is already gone is skipped as done, without
/// disturbing the operations behind it.
#[tokio::test]
async fn test_tolerated_delete_in_a_mixed_queue() {
    let _ = env_logger::builder().is_test(true).try_init();
    let setup = scenarii::populate_test_setup(MockBehaviour::new());
    let coordinator = &setup.coordinator;

    // Seed one event and let the client learn about it
    setup.service.seed(vec![scenarii::draft("Doomed", "Golf", (9, 0), (10, 0))]);
    coordinator.monitor().check_server().await;
    coordinator.get_events(1, 10, &EventFilter::default()).await;

    // While the device is away, we queue a delete and an unrelated create...
    coordinator.monitor().set_device_online(false).await;
    coordinator.delete_event(&EventId::Server(1)).await;
    coordinator
        .create_event(scenarii::draft("Survivor", "Golf", (11, 0), (12, 0)))
        .await;
    assert_eq!(coordinator.queue().len(), 2);

    // ...and another client deletes the same event server-side
    {
        use corkboard::EventService;
        setup.service.delete_event(&EventId::Server(1)).await.unwrap();
    }

    // Back online, an explicit retry replays: the delete's 404 is treated as done
    coordinator.monitor().set_device_online(true).await;
    coordinator.queue().process_queue().await;

    assert!(coordinator.queue().is_empty());
    let on_server = setup.service.events();
    assert_eq!(on_server.len(), 1);
    assert_eq!(on_server[0].title(), "Survivor");
}

/// Listings keep the same envelope whether they come from the server or the mirror
#[tokio::test]
async fn test_listing_shape_is_identical_on_and_offline() {
    let _ = env_logger::builder().is_test(true).try_init();
    let setup = scenarii::populate_test_setup(MockBehaviour::new());
    let coordinator = &setup.coordinator;

    let drafts: Vec<_> = (0..23)
        .map(|i| scenarii::draft(&format!("Event {:02}", i), "Athletics", (6 + (i % 12), 0), (19, 0)))
        .collect();
    setup.service.seed(drafts);
    coordinator.monitor().check_server().await;

    let filter = EventFilter { sort_by: Some(SortKey::StartTime), ..Default::default() };

    // Walk all pages online so the mirror sees every event
    let mut online_pages = Vec::new();
    for page in 1..=3 {
        online_pages.push(coordinator.get_events(page, 10, &filter).await);
    }
    assert_eq!(online_pages[2].metadata.total_pages, 3);
    assert_eq!(online_pages[2].metadata.has_next_page, false);
    assert_eq!(online_pages[2].metadata.has_previous_page, true);

    // Then compare with what the mirror serves when the device drops offline
    coordinator.monitor().set_device_online(false).await;
    for page in 1..=3 {
        let offline = coordinator.get_events(page, 10, &filter).await;
        assert_eq!(offline.metadata, online_pages[(page - 1) as usize].metadata);
        assert_eq!(offline.data.len(), online_pages[(page - 1) as usize].data.len());
    }
}

/// A restart must find the queue and the mirror where they were left
#[tokio::test]
async fn test_queue_survives_a_restart() {
    let _ = env_logger::builder().is_test(true).try_init();
    let setup = scenarii::populate_test_setup(MockBehaviour::new());

    setup
        .coordinator
        .create_event(scenarii::draft("Persisted", "Rugby", (14, 0), (16, 0)))
        .await;
    assert_eq!(setup.coordinator.queue().len(), 1);

    let restarted = scenarii::reopen(&setup);
    assert_eq!(restarted.queue().len(), 1);
    assert_eq!(restarted.mirror().read_all().len(), 1);

    // Startup trigger: probing replays what the previous run left behind
    restarted.monitor().check_server().await;
    assert!(restarted.queue().is_empty());
    assert_eq!(setup.service.events().len(), 1);
    assert!(restarted.mirror().read_all()[0].id().is_temp() == false);
}
