//! Connectivity tracking: device-level state reported by the embedder, plus an active
//! health probe against the service.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;

use crate::queue::OperationQueue;
use crate::service::EventService;

/// How often [`ConnectivityMonitor::run`] probes the service
pub const PROBE_INTERVAL: Duration = Duration::from_secs(15);

/// A snapshot of the two connectivity facts the client cares about
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConnectivityStatus {
    /// Whether the device reports having a network at all (the embedder's equivalent of
    /// a browser's online/offline events)
    pub is_online: bool,
    /// Whether the last health probe reached the service
    pub is_server_available: bool,
}

impl ConnectivityStatus {
    /// Both online and reachable: network calls are worth attempting
    pub fn is_available(&self) -> bool {
        self.is_online && self.is_server_available
    }
}

/// See [`ConnectivityMonitor::subscribe`]
pub type StatusReceiver = watch::Receiver<ConnectivityStatus>;

/// Tracks the [`ConnectivityStatus`] and notifies subscribers on every probe.
///
/// When a probe observes the service coming back while the device is online, the monitor
/// replays the operation queue exactly once before notifying, so subscribers observing
/// "available" can rely on the queued writes being on their way already.
pub struct ConnectivityMonitor<S: EventService> {
    service: Arc<S>,
    queue: Arc<OperationQueue<S>>,
    state: Mutex<ConnectivityStatus>,
    notifier: watch::Sender<ConnectivityStatus>,
}

impl<S: EventService> ConnectivityMonitor<S> {
    /// Create a monitor. The device is assumed online until
    /// [`set_device_online`](Self::set_device_online) says otherwise; the server is
    /// unknown-hence-unavailable until the first probe.
    pub fn new(service: Arc<S>, queue: Arc<OperationQueue<S>>) -> Self {
        let initial = ConnectivityStatus {
            is_online: true,
            is_server_available: false,
        };
        let (notifier, _) = watch::channel(initial);

        Self {
            service,
            queue,
            state: Mutex::new(initial),
            notifier,
        }
    }

    /// The current snapshot. Never blocks on the network.
    pub fn status(&self) -> ConnectivityStatus {
        *self.state.lock().unwrap()
    }

    /// Subscribe to status notifications. Dropping the receiver unsubscribes.
    /// No ordering is guaranteed between subscribers.
    pub fn subscribe(&self) -> StatusReceiver {
        self.notifier.subscribe()
    }

    /// Record a device-level connectivity transition reported by the embedder.
    /// Going online immediately verifies the server.
    pub async fn set_device_online(&self, online: bool) {
        let status = {
            let mut state = self.state.lock().unwrap();
            state.is_online = online;
            *state
        };
        // send_replace, so subscribers arriving later still see the latest value
        self.notifier.send_replace(status);

        if online {
            self.check_server().await;
        }
    }

    /// Probe the service once and act on the outcome.
    ///
    /// A probe failure of any kind just means "unavailable"; it is never surfaced to
    /// subscribers. Subscribers are notified after every probe, whether or not the
    /// status changed, so they must be idempotent.
    pub async fn check_server(&self) {
        let previously_available = self.state.lock().unwrap().is_server_available;

        let now_available = match self.service.health_check().await {
            Ok(()) => true,
            Err(err) => {
                log::debug!("Health probe failed: {}", err);
                false
            }
        };

        let status = {
            let mut state = self.state.lock().unwrap();
            state.is_server_available = now_available;
            *state
        };

        if status.is_online && now_available && previously_available == false {
            log::info!("Server became available, replaying the pending queue");
            self.queue.process_queue().await;
        }

        self.notifier.send_replace(status);
    }

    /// Probe the service forever, every [`PROBE_INTERVAL`]. Spawn this on the runtime;
    /// the first probe fires immediately.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(PROBE_INTERVAL);
        loop {
            ticker.tick().await;
            self.check_server().await;
        }
    }
}
