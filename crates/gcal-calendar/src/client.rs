//! Google Calendar API client.

use serde::Serialize;
use tracing::instrument;

use crate::error::CalendarError;
use crate::retry::{with_retry, RetryConfig};
use crate::types::{ApiEvent, EventListResponse};

const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Parameters for an events.list call. Bounds are RFC 3339 strings passed
/// through unchanged.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub time_min: String,
    pub time_max: String,
    /// Free-text search (`q`)
    pub text: Option<String>,
    /// `orderBy=startTime`
    pub order_by_start_time: bool,
}

impl EventQuery {
    pub fn between(time_min: impl Into<String>, time_max: impl Into<String>) -> Self {
        Self {
            time_min: time_min.into(),
            time_max: time_max.into(),
            ..Self::default()
        }
    }

    pub fn matching(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn ordered_by_start(mut self) -> Self {
        self.order_by_start_time = true;
        self
    }
}

pub struct CalendarClient {
    client: reqwest::Client,
    access_token: String,
    base_url: String,
    retry: RetryConfig,
}

impl CalendarClient {
    pub fn new(access_token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token: access_token.to_string(),
            base_url: CALENDAR_API_BASE.to_string(),
            retry: RetryConfig::default(),
        }
    }

    #[cfg(test)]
    pub fn new_with_base_url(access_token: &str, base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token: access_token.to_string(),
            base_url: base_url.to_string(),
            retry: RetryConfig::none(),
        }
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(calendar_id),
        )
    }

    /// Fetch one page of events. Recurring series are always expanded into
    /// single instances.
    #[instrument(skip(self), level = "debug")]
    pub async fn list_events_page(
        &self,
        calendar_id: &str,
        query: &EventQuery,
        page_token: Option<&str>,
    ) -> Result<EventListResponse, CalendarError> {
        let mut url = format!(
            "{}?timeMin={}&timeMax={}&singleEvents=true",
            self.events_url(calendar_id),
            urlencoding::encode(&query.time_min),
            urlencoding::encode(&query.time_max),
        );

        if let Some(text) = &query.text {
            url.push_str(&format!("&q={}", urlencoding::encode(text)));
        }
        if query.order_by_start_time {
            url.push_str("&orderBy=startTime");
        }
        if let Some(pt) = page_token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(pt)));
        }

        let response = with_retry(&self.retry, || {
            self.client.get(&url).bearer_auth(&self.access_token).send()
        })
        .await?;

        self.handle_response(response).await
    }

    /// List all events matching the query, following `nextPageToken`.
    #[instrument(skip(self), level = "info")]
    pub async fn list_events(
        &self,
        calendar_id: &str,
        query: &EventQuery,
    ) -> Result<Vec<ApiEvent>, CalendarError> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .list_events_page(calendar_id, query, page_token.as_deref())
                .await?;
            items.extend(page.items);

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        tracing::debug!("Listed {} events", items.len());
        Ok(items)
    }

    /// Insert an event resource.
    #[instrument(skip(self, body), level = "info")]
    pub async fn insert_event<B: Serialize>(
        &self,
        calendar_id: &str,
        body: &B,
    ) -> Result<ApiEvent, CalendarError> {
        let url = self.events_url(calendar_id);

        let response = with_retry(&self.retry, || {
            self.client
                .post(&url)
                .bearer_auth(&self.access_token)
                .json(body)
                .send()
        })
        .await?;

        self.handle_response(response).await
    }

    /// Delete an event without notifying attendees.
    #[instrument(skip(self), level = "info")]
    pub async fn delete_event(
        &self,
        calendar_id: &str,
        event_id: &str,
    ) -> Result<(), CalendarError> {
        let url = format!(
            "{}/{}?sendUpdates=none",
            self.events_url(calendar_id),
            urlencoding::encode(event_id),
        );

        let response = with_retry(&self.retry, || {
            self.client.delete(&url).bearer_auth(&self.access_token).send()
        })
        .await?;

        // Delete returns 204 No Content on success
        if response.status().is_success() {
            Ok(())
        } else if response.status().as_u16() == 410 {
            Err(CalendarError::Gone(event_id.to_string()))
        } else {
            self.handle_response::<serde_json::Value>(response).await.map(|_| ())
        }
    }

    /// Helper to handle API responses and errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, CalendarError> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| CalendarError::ApiError(format!("JSON parse error: {}", e)))
        } else if status.as_u16() == 401 {
            Err(CalendarError::TokenExpired)
        } else if status.as_u16() == 403 {
            Err(CalendarError::AuthRequired)
        } else if status.as_u16() == 404 {
            let text = response.text().await.unwrap_or_default();
            Err(CalendarError::EventNotFound(text))
        } else if status.as_u16() == 409 {
            Err(CalendarError::Conflict)
        } else if status.as_u16() == 410 {
            let text = response.text().await.unwrap_or_default();
            Err(CalendarError::Gone(text))
        } else if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            Err(CalendarError::RateLimited(retry_after))
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(CalendarError::ApiError(format!("{}: {}", status, text)))
        }
    }
}
