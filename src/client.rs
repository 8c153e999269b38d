//! This module provides the HTTP client for the remote event service

use std::error::Error;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CACHE_CONTROL;
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use crate::config;
use crate::event::{Event, EventDraft, EventId};
use crate::filter::{EventFilter, EventPage};
use crate::service::{EventService, ServiceError};

/// How long a health probe may take before it counts as "server unavailable"
const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// The `{message}` body the service sends along 400 and 404 responses
#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// An [`EventService`] backed by the REST endpoint (`…/entities`)
pub struct RestEventService {
    base_url: Url,
    http: reqwest::Client,
}

impl RestEventService {
    /// Create a client for the service rooted at `base_url` (e.g. `http://localhost:5000/entities`).
    /// This does not contact the server.
    pub fn new<S: AsRef<str>>(base_url: S) -> Result<Self, Box<dyn Error>> {
        let base_url = Url::parse(base_url.as_ref())?;
        if base_url.cannot_be_a_base() {
            return Err(format!("{} cannot be used as a base URL", base_url).into());
        }

        let user_agent = config::USER_AGENT.lock().unwrap().clone();
        let http = reqwest::Client::builder().user_agent(user_agent).build()?;

        Ok(Self { base_url, http })
    }

    fn item_url(&self, id: &EventId) -> Url {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .expect("the base URL is vetted at construction time")
            .push(&id.to_string());
        url
    }

    fn health_url(&self) -> Url {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .expect("the base URL is vetted at construction time")
            .push("health-check");
        url
    }

    /// Extract the server's error message, falling back to the bare status line
    async fn error_message(response: reqwest::Response) -> String {
        let status = response.status();
        match response.json::<ErrorBody>().await {
            Ok(body) => body.message,
            Err(_) => format!("HTTP {}", status),
        }
    }
}

#[async_trait]
impl EventService for RestEventService {
    async fn health_check(&self) -> Result<(), ServiceError> {
        let response = self
            .http
            .get(self.health_url())
            .header(CACHE_CONTROL, "no-cache")
            .timeout(HEALTH_PROBE_TIMEOUT)
            .send()
            .await?;

        if response.status().is_success() == false {
            return Err(ServiceError::UnexpectedStatus(response.status()));
        }
        Ok(())
    }

    async fn list_events(
        &self,
        page: usize,
        limit: usize,
        filter: &EventFilter,
    ) -> Result<EventPage, ServiceError> {
        let mut url = self.base_url.clone();
        filter.append_query_pairs(&mut url);
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("limit", &limit.to_string());

        log::debug!("Fetching events from {}", url);
        let response = self.http.get(url).send().await?;
        if response.status().is_success() == false {
            return Err(ServiceError::UnexpectedStatus(response.status()));
        }
        Ok(response.json::<EventPage>().await?)
    }

    async fn create_event(&self, draft: &EventDraft) -> Result<Event, ServiceError> {
        let response = self
            .http
            .post(self.base_url.clone())
            .json(draft)
            .send()
            .await?;

        match response.status() {
            StatusCode::BAD_REQUEST => {
                Err(ServiceError::Validation(Self::error_message(response).await))
            }
            status if status.is_success() => Ok(response.json::<Event>().await?),
            status => Err(ServiceError::UnexpectedStatus(status)),
        }
    }

    async fn update_event(
        &self,
        id: &EventId,
        draft: &EventDraft,
    ) -> Result<Event, ServiceError> {
        let response = self
            .http
            .put(self.item_url(id))
            .json(draft)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                Err(ServiceError::NotFound(Self::error_message(response).await))
            }
            StatusCode::BAD_REQUEST => {
                Err(ServiceError::Validation(Self::error_message(response).await))
            }
            status if status.is_success() => Ok(response.json::<Event>().await?),
            status => Err(ServiceError::UnexpectedStatus(status)),
        }
    }

    async fn delete_event(&self, id: &EventId) -> Result<(), ServiceError> {
        let response = self.http.delete(self.item_url(id)).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                Err(ServiceError::NotFound(Self::error_message(response).await))
            }
            status if status.is_success() => Ok(()),
            status => Err(ServiceError::UnexpectedStatus(status)),
        }
    }
}
