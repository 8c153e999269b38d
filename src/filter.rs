//! Filtering, sorting and paginating event collections.
//!
//! These are the exact semantics of the remote service's listing endpoint. The
//! [`SyncCoordinator`](crate::coordinator::SyncCoordinator) applies them to the local mirror
//! when the service is unreachable, so offline results keep the online shape.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::event::Event;
use chrono::Datelike;

/// The sort orders the listing endpoint understands
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SortKey {
    /// Lexicographic on the title
    Title,
    /// Chronological on the calendar date
    Date,
    /// Ascending minutes-since-midnight of the start time
    StartTime,
}

impl SortKey {
    /// The `sortBy` query-parameter value for this key
    pub fn as_query_value(&self) -> &'static str {
        match self {
            SortKey::Title => "title",
            SortKey::Date => "date",
            SortKey::StartTime => "start_time",
        }
    }

    /// Parse a `sortBy` value. Unrecognized keys mean "no reordering", hence `None`.
    pub fn parse(value: &str) -> Option<SortKey> {
        match value {
            "title" => Some(SortKey::Title),
            "date" => Some(SortKey::Date),
            "start_time" => Some(SortKey::StartTime),
            _ => None,
        }
    }
}

/// The filters a listing can carry.
///
/// `month` and `year` select on the calendar-date components; when both are present the
/// server expects them combined into a single `date=YYYY-MM` parameter, a year alone is
/// `date=YYYY`, and a month alone is a standalone `month` parameter matched across years.
#[derive(Clone, Debug, Default)]
pub struct EventFilter {
    /// Case-insensitive substring match on the title
    pub title: Option<String>,
    /// Case-insensitive match on the group label
    pub group: Option<String>,
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub sort_by: Option<SortKey>,
}

impl EventFilter {
    /// Whether an event passes this filter.
    ///
    /// This is also the check to apply to pushed `NEW_ENTITY` broadcast payloads before
    /// appending them to a filtered view.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(title) = &self.title {
            if event.title().to_lowercase().contains(&title.to_lowercase()) == false {
                return false;
            }
        }
        if let Some(group) = &self.group {
            if event.group().to_lowercase() != group.to_lowercase() {
                return false;
            }
        }
        if let Some(month) = self.month {
            if event.date().month() != month {
                return false;
            }
        }
        if let Some(year) = self.year {
            if event.date().year() != year {
                return false;
            }
        }
        true
    }

    /// Append this filter to a listing URL as query parameters
    pub fn append_query_pairs(&self, url: &mut Url) {
        let mut pairs = url.query_pairs_mut();
        if let Some(title) = &self.title {
            pairs.append_pair("title", title);
        }
        if let Some(group) = &self.group {
            pairs.append_pair("group", group);
        }
        match (self.year, self.month) {
            (Some(year), Some(month)) => {
                pairs.append_pair("date", &format!("{:04}-{:02}", year, month));
            }
            (Some(year), None) => {
                pairs.append_pair("date", &format!("{:04}", year));
            }
            (None, Some(month)) => {
                pairs.append_pair("month", &month.to_string());
            }
            (None, None) => {}
        }
        if let Some(sort_by) = &self.sort_by {
            pairs.append_pair("sortBy", sort_by.as_query_value());
        }
    }
}

/// Sort events in place. The sort is stable: ties keep their current order.
pub fn sort_events(events: &mut Vec<Event>, key: &SortKey) {
    match key {
        SortKey::Title => events.sort_by(|a, b| a.title().cmp(b.title())),
        SortKey::Date => events.sort_by(|a, b| a.date().cmp(&b.date())),
        SortKey::StartTime => events.sort_by(|a, b| a.start_minutes().cmp(&b.start_minutes())),
    }
}

/// The pagination envelope of a listing result
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub limit: usize,
}

/// One page of events, as returned by the listing endpoint
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventPage {
    pub data: Vec<Event>,
    pub metadata: PageMetadata,
}

/// Slice an already-filtered, already-sorted collection into a 1-indexed page
pub fn paginate(events: Vec<Event>, page: usize, limit: usize) -> EventPage {
    // The service treats a missing page as 1 and a missing limit as 10
    let page = if page == 0 { 1 } else { page };
    let limit = if limit == 0 { 10 } else { limit };

    let total_items = events.len();
    let total_pages = (total_items + limit - 1) / limit;
    let offset = (page - 1) * limit;

    let data: Vec<Event> = events.into_iter().skip(offset).take(limit).collect();

    EventPage {
        data,
        metadata: PageMetadata {
            current_page: page,
            total_pages,
            total_items,
            has_next_page: page < total_pages,
            has_previous_page: page > 1,
            limit,
        },
    }
}
