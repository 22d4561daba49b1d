//! Calendar API types and data structures.

use serde::{Deserialize, Serialize};

/// `start`/`end`/`originalStartTime` object of the Calendar API.
///
/// Timed events carry `dateTime` (RFC 3339, optional `timeZone`); all-day
/// events carry `date` (`YYYY-MM-DD`). Values are kept as the API sent them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventDateTime {
    pub fn date_time(value: impl Into<String>) -> Self {
        Self {
            date_time: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn date(value: impl Into<String>) -> Self {
        Self {
            date: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn with_time_zone(mut self, time_zone: Option<String>) -> Self {
        self.time_zone = time_zone;
        self
    }

    /// `dateTime` if present, otherwise `date`.
    pub fn display_value(&self) -> Option<&str> {
        self.date_time.as_deref().or(self.date.as_deref())
    }
}

/// Google Calendar API event response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEvent {
    #[serde(default)]
    pub id: String,
    pub summary: Option<String>,
    pub start: Option<EventDateTime>,
    pub end: Option<EventDateTime>,
    pub status: Option<String>,
    pub recurring_event_id: Option<String>,
    pub original_start_time: Option<EventDateTime>,
}

/// Identity of one occurrence of a recurring series.
#[derive(Debug, Clone, Copy)]
pub struct RecurringInstance<'a> {
    pub recurring_event_id: &'a str,
    pub original_start_time: &'a EventDateTime,
}

impl ApiEvent {
    /// Present only for expanded occurrences of a recurring series, which
    /// carry both `recurringEventId` and `originalStartTime`.
    pub fn recurring_instance(&self) -> Option<RecurringInstance<'_>> {
        match (&self.recurring_event_id, &self.original_start_time) {
            (Some(recurring_event_id), Some(original_start_time)) => Some(RecurringInstance {
                recurring_event_id,
                original_start_time,
            }),
            _ => None,
        }
    }

    pub fn summary_text(&self) -> &str {
        self.summary.as_deref().unwrap_or_default()
    }
}

/// API response for event list.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventListResponse {
    #[serde(default)]
    pub items: Vec<ApiEvent>,
    pub next_page_token: Option<String>,
}

/// Resource inserted to cancel one occurrence of a recurring event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceCancellation {
    pub recurring_event_id: String,
    pub original_start_time: EventDateTime,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<EventDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<EventDateTime>,
}

impl InstanceCancellation {
    /// Build the cancellation for an occurrence.
    ///
    /// Timed occurrences copy `originalStartTime.dateTime` (and its time
    /// zone); `start`/`end` are only sent when the occurrence's end is timed
    /// too. All-day occurrences do the same with `date`. When the original
    /// start has neither, `originalStartTime` is sent empty.
    pub fn for_instance(instance: RecurringInstance<'_>, end: Option<&EventDateTime>) -> Self {
        let original = instance.original_start_time;
        let mut original_start_time = EventDateTime::default();
        let mut start = None;
        let mut end_time = None;

        if let Some(date_time) = &original.date_time {
            original_start_time.date_time = Some(date_time.clone());
            original_start_time.time_zone = original.time_zone.clone();

            if let Some(end_date_time) = end.and_then(|e| e.date_time.as_ref()) {
                start = Some(EventDateTime::date_time(date_time.clone()));
                end_time = Some(
                    EventDateTime::date_time(end_date_time.clone())
                        .with_time_zone(end.and_then(|e| e.time_zone.clone())),
                );
            }
        } else if let Some(date) = &original.date {
            original_start_time.date = Some(date.clone());

            if let Some(end_date) = end.and_then(|e| e.date.as_ref()) {
                start = Some(EventDateTime::date(date.clone()));
                end_time = Some(EventDateTime::date(end_date.clone()));
            }
        }

        Self {
            recurring_event_id: instance.recurring_event_id.to_string(),
            original_start_time,
            status: "cancelled".to_string(),
            start,
            end: end_time,
        }
    }
}
