//! Sporting events and their identifiers

use std::fmt::{Display, Formatter};

use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::service::ServiceError;

/// The identifier of an [`Event`].
///
/// The server assigns integer identifiers. Events created while the server is unreachable
/// carry a temporary identifier of the form `temp-<timestamp>` until the queued create is
/// acknowledged, at which point the entry is re-keyed in place.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventId {
    /// A server-assigned identifier
    Server(u64),
    /// A client-minted identifier, not acknowledged by the server yet
    Temp(String),
}

impl EventId {
    /// Build a temporary identifier from a millisecond timestamp
    pub fn temp_from_millis(millis: i64) -> Self {
        EventId::Temp(format!("temp-{}", millis))
    }

    pub fn is_temp(&self) -> bool {
        match self {
            EventId::Temp(_) => true,
            _ => false,
        }
    }
}

impl Display for EventId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            EventId::Server(n) => write!(f, "{}", n),
            EventId::Temp(s) => write!(f, "{}", s),
        }
    }
}

/// On the wire, an identifier is either a bare JSON number (server-assigned) or a string
/// (temporary). These impls keep that shape.
impl Serialize for EventId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            EventId::Server(n) => serializer.serialize_u64(*n),
            EventId::Temp(s) => serializer.serialize_str(s),
        }
    }
}
impl<'de> Deserialize<'de> for EventId {
    fn deserialize<D>(deserializer: D) -> Result<EventId, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct IdVisitor;
        impl<'de> serde::de::Visitor<'de> for IdVisitor {
            type Value = EventId;

            fn expecting(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "an integer or a temporary identifier string")
            }
            fn visit_u64<E: serde::de::Error>(self, value: u64) -> Result<EventId, E> {
                Ok(EventId::Server(value))
            }
            fn visit_i64<E: serde::de::Error>(self, value: i64) -> Result<EventId, E> {
                if value < 0 {
                    return Err(E::custom("identifiers cannot be negative"));
                }
                Ok(EventId::Server(value as u64))
            }
            fn visit_str<E: serde::de::Error>(self, value: &str) -> Result<EventId, E> {
                Ok(EventId::Temp(value.to_string()))
            }
        }
        deserializer.deserialize_any(IdVisitor)
    }
}

/// Describes whether this event has been acknowledged by the server, or is still waiting
/// for a queued write to be replayed
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SyncStatus {
    /// The server knows about this record in its current form
    Synced,
    /// A local write to this record has not reached the server yet
    AwaitingSync,
}

impl SyncStatus {
    pub fn is_synced(&self) -> bool {
        match self {
            SyncStatus::Synced => true,
            _ => false,
        }
    }
}

impl Default for SyncStatus {
    fn default() -> Self {
        SyncStatus::Synced
    }
}

/// The body of a create or update request: every field of an [`Event`] except its identifier
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventDraft {
    pub title: String,
    pub group: String,
    pub date: NaiveDate,
    #[serde(with = "wall_clock")]
    pub start_time: NaiveTime,
    #[serde(with = "wall_clock")]
    pub end_time: NaiveTime,
    pub description: String,
}

impl EventDraft {
    /// Check the constraints the server will enforce with a 400: every text field present,
    /// and the start time strictly before the end time.
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.title.trim().is_empty()
            || self.group.trim().is_empty()
            || self.description.trim().is_empty()
        {
            return Err(ServiceError::Validation(
                "All fields are required".to_string(),
            ));
        }
        if self.start_time >= self.end_time {
            return Err(ServiceError::Validation(
                "Start time must be before end time".to_string(),
            ));
        }
        Ok(())
    }
}

/// A calendar entry for a sporting event.
///
/// Start and end times are same-day wall-clock times, start strictly before end.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "ID")]
    id: EventId,
    title: String,
    group: String,
    date: NaiveDate,
    #[serde(with = "wall_clock")]
    start_time: NaiveTime,
    #[serde(with = "wall_clock")]
    end_time: NaiveTime,
    description: String,

    /// Absent in server payloads, so it defaults to `Synced` when deserializing them.
    /// Persisted locally so queued entries survive a restart.
    #[serde(default, skip_serializing_if = "SyncStatus::is_synced")]
    sync_status: SyncStatus,
}

impl Event {
    pub fn new(id: EventId, draft: EventDraft) -> Self {
        Self {
            id,
            title: draft.title,
            group: draft.group,
            date: draft.date,
            start_time: draft.start_time,
            end_time: draft.end_time,
            description: draft.description,
            sync_status: SyncStatus::Synced,
        }
    }

    pub fn id(&self) -> &EventId { &self.id }
    pub fn title(&self) -> &str { &self.title }
    pub fn group(&self) -> &str { &self.group }
    pub fn date(&self) -> NaiveDate { self.date }
    pub fn start_time(&self) -> NaiveTime { self.start_time }
    pub fn end_time(&self) -> NaiveTime { self.end_time }
    pub fn description(&self) -> &str { &self.description }
    pub fn sync_status(&self) -> &SyncStatus { &self.sync_status }

    pub fn is_queued(&self) -> bool {
        self.sync_status.is_synced() == false
    }

    pub fn set_sync_status(&mut self, new_status: SyncStatus) {
        self.sync_status = new_status;
    }

    /// The start time expressed as minutes since midnight (the `start_time` sort key)
    pub fn start_minutes(&self) -> u32 {
        self.start_time.num_seconds_from_midnight() / 60
    }

    /// The request body that would re-create this event
    pub fn to_draft(&self) -> EventDraft {
        EventDraft {
            title: self.title.clone(),
            group: self.group.clone(),
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            description: self.description.clone(),
        }
    }
}

/// (De)serializes `NaiveTime` as the `HH:MM` strings the service speaks
pub(crate) mod wall_clock {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&text, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&text, "%H:%M:%S"))
            .map_err(serde::de::Error::custom)
    }
}
