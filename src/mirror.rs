//! This module provides a local, file-backed copy of the event collection.
//!
//! The mirror is what the application reads when the server is unreachable, and the place
//! optimistic writes land before (or regardless of) their network outcome. Entries are kept
//! in insertion order so offline pagination stays stable between calls.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::event::{Event, EventId, SyncStatus};

/// A local store mirroring the server's event collection
#[derive(Debug)]
pub struct MirrorStore {
    backing_file: PathBuf,
    events: Mutex<Vec<Event>>,
}

impl MirrorStore {
    /// An empty mirror that will persist to `path`
    pub fn new(path: &Path) -> Self {
        Self {
            backing_file: PathBuf::from(path),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Load a mirror from its backing file.
    ///
    /// A missing or unreadable file is not an error: offline reads must always succeed,
    /// so this falls back to an empty collection (with a log line).
    pub fn open(path: &Path) -> Self {
        let events = match std::fs::File::open(path) {
            Err(err) => {
                log::info!("No usable mirror file {:?} ({}), starting empty", path, err);
                Vec::new()
            }
            Ok(file) => match serde_json::from_reader(file) {
                Err(err) => {
                    log::warn!("Corrupt mirror file {:?} ({}), starting empty", path, err);
                    Vec::new()
                }
                Ok(events) => events,
            },
        };

        Self {
            backing_file: PathBuf::from(path),
            events: Mutex::new(events),
        }
    }

    /// A snapshot of the full cached collection, possibly empty. Never fails.
    pub fn read_all(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn find(&self, id: &EventId) -> Option<Event> {
        self.events.lock().unwrap().iter().find(|e| e.id() == id).cloned()
    }

    pub fn contains(&self, id: &EventId) -> bool {
        self.events.lock().unwrap().iter().any(|e| e.id() == id)
    }

    /// Fold a batch of server events into the mirror.
    ///
    /// Unknown identifiers are inserted; known ones are overwritten with the server
    /// version, except entries still awaiting sync, which always win over server data.
    /// Identifiers stay unique.
    pub fn merge(&self, server_events: &[Event]) {
        let mut events = self.events.lock().unwrap();
        for incoming in server_events {
            match events.iter_mut().find(|e| e.id() == incoming.id()) {
                Some(existing) => {
                    if existing.is_queued() == false {
                        *existing = incoming.clone();
                    }
                }
                None => events.push(incoming.clone()),
            }
        }
        self.save_to_file(&events);
    }

    /// Insert-or-replace a single event by identifier
    pub fn upsert_local(&self, event: Event) {
        let mut events = self.events.lock().unwrap();
        match events.iter_mut().find(|e| e.id() == event.id()) {
            Some(existing) => *existing = event,
            None => events.push(event),
        }
        self.save_to_file(&events);
    }

    /// Remove a single event by identifier. Removing an absent identifier is a no-op.
    pub fn remove_local(&self, id: &EventId) {
        let mut events = self.events.lock().unwrap();
        events.retain(|e| e.id() != id);
        self.save_to_file(&events);
    }

    /// Replace the entry keyed by a temporary identifier with its server-acknowledged
    /// version, in place. Used when a queued create is finally accepted.
    pub fn confirm_create(&self, temp_id: &EventId, confirmed: Event) {
        let mut confirmed = confirmed;
        confirmed.set_sync_status(SyncStatus::Synced);

        let mut events = self.events.lock().unwrap();
        match events.iter().position(|e| e.id() == temp_id) {
            None => {
                // The optimistic entry was removed in the meantime (e.g. deleted locally)
                log::debug!("No local entry {} to reconcile, inserting {}", temp_id, confirmed.id());
                if events.iter().any(|e| e.id() == confirmed.id()) == false {
                    events.push(confirmed);
                }
            }
            Some(position) => {
                if events.iter().any(|e| e.id() == confirmed.id()) {
                    // A merge already brought in the server copy; drop the temporary one
                    events.remove(position);
                } else {
                    events[position] = confirmed;
                }
            }
        }
        self.save_to_file(&events);
    }

    /// Store the current collection to the backing file
    fn save_to_file(&self, events: &[Event]) {
        let path = &self.backing_file;
        let file = match std::fs::File::create(path) {
            Err(err) => {
                log::warn!("Unable to save file {:?}: {}", path, err);
                return;
            }
            Ok(f) => f,
        };

        if let Err(err) = serde_json::to_writer(file, events) {
            log::warn!("Unable to serialize: {}", err);
        }
    }
}
