//! An [`EventService`] held entirely in memory, standing in for the real server.
//!
//! It reproduces the remote endpoint's semantics (validation, 404s, the
//! `{data, metadata}` listing envelope) so the offline machinery can be exercised
//! against a faithful collaborator, and can be tweaked with a
//! [`MockBehaviour`](crate::mock_behaviour::MockBehaviour) to fail on demand.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::event::{Event, EventDraft, EventId};
use crate::filter::{paginate, sort_events, EventFilter, EventPage};
use crate::mock_behaviour::MockBehaviour;
use crate::service::{EventService, ServiceError};

struct ServerState {
    events: Vec<Event>,
    next_id: u64,
}

/// An in-memory stand-in for the remote event service
pub struct InMemoryEventService {
    state: Mutex<ServerState>,
    mock_behaviour: Option<Arc<Mutex<MockBehaviour>>>,
}

impl InMemoryEventService {
    /// A service that always succeeds
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ServerState { events: Vec::new(), next_id: 1 }),
            mock_behaviour: None,
        }
    }

    /// A service whose failures are scripted by `mock_behaviour`
    pub fn with_mock_behaviour(mock_behaviour: Arc<Mutex<MockBehaviour>>) -> Self {
        Self {
            state: Mutex::new(ServerState { events: Vec::new(), next_id: 1 }),
            mock_behaviour: Some(mock_behaviour),
        }
    }

    /// Add events directly to the server, bypassing the network-facing operations
    pub fn seed(&self, drafts: Vec<EventDraft>) -> Vec<Event> {
        let mut state = self.state.lock().unwrap();
        let mut created = Vec::new();
        for draft in drafts {
            let id = state.next_id;
            state.next_id += 1;
            let event = Event::new(EventId::Server(id), draft);
            state.events.push(event.clone());
            created.push(event);
        }
        created
    }

    /// The server's current collection, in insertion order
    pub fn events(&self) -> Vec<Event> {
        self.state.lock().unwrap().events.clone()
    }

    fn allowed(
        &self,
        check: impl FnOnce(&mut MockBehaviour) -> Result<(), ServiceError>,
    ) -> Result<(), ServiceError> {
        match &self.mock_behaviour {
            None => Ok(()),
            Some(behaviour) => check(&mut behaviour.lock().unwrap()),
        }
    }
}

#[async_trait]
impl EventService for InMemoryEventService {
    async fn health_check(&self) -> Result<(), ServiceError> {
        self.allowed(|b| b.can_health_check())
    }

    async fn list_events(
        &self,
        page: usize,
        limit: usize,
        filter: &EventFilter,
    ) -> Result<EventPage, ServiceError> {
        self.allowed(|b| b.can_list_events())?;

        let mut matching: Vec<Event> = self
            .state
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|event| filter.matches(event))
            .cloned()
            .collect();
        if let Some(key) = &filter.sort_by {
            sort_events(&mut matching, key);
        }
        Ok(paginate(matching, page, limit))
    }

    async fn create_event(&self, draft: &EventDraft) -> Result<Event, ServiceError> {
        self.allowed(|b| b.can_create_event())?;
        draft.validate()?;

        let mut state = self.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;
        let event = Event::new(EventId::Server(id), draft.clone());
        state.events.push(event.clone());
        Ok(event)
    }

    async fn update_event(
        &self,
        id: &EventId,
        draft: &EventDraft,
    ) -> Result<Event, ServiceError> {
        self.allowed(|b| b.can_update_event())?;
        draft.validate()?;

        let mut state = self.state.lock().unwrap();
        match state.events.iter_mut().find(|e| e.id() == id) {
            None => Err(ServiceError::NotFound("Event not found".to_string())),
            Some(existing) => {
                *existing = Event::new(id.clone(), draft.clone());
                Ok(existing.clone())
            }
        }
    }

    async fn delete_event(&self, id: &EventId) -> Result<(), ServiceError> {
        self.allowed(|b| b.can_delete_event())?;

        let mut state = self.state.lock().unwrap();
        match state.events.iter().position(|e| e.id() == id) {
            None => Err(ServiceError::NotFound("Event not found".to_string())),
            Some(position) => {
                state.events.remove(position);
                Ok(())
            }
        }
    }
}
