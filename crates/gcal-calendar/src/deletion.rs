//! Delete or cancel the events listed in a text file.
//!
//! Each line is `<timeMin> - <timeMax> - <summary>`. Events returned for the
//! window and search text are acted on only when their summary matches
//! exactly; an occurrence of a recurring series is cancelled on its own,
//! anything else is deleted outright.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use std::path::Path;

use crate::client::{CalendarClient, EventQuery};
use crate::error::CalendarError;
use crate::schedule::start_of_day;
use crate::types::{ApiEvent, InstanceCancellation};

/// Separator between the fields of a line.
pub const FIELD_SEPARATOR: &str = " - ";

/// A valid line of the delete file.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteRequest {
    pub line_number: usize,
    pub time_min: String,
    pub time_max: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    Request(DeleteRequest),
    /// Blank line or `#` comment
    Comment,
    Invalid {
        line_number: usize,
        content: String,
        reason: String,
    },
}

/// Parse one line of the delete file (`line_number` is 1-based).
pub fn parse_delete_line(line_number: usize, raw: &str, tz: Tz) -> ParsedLine {
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') {
        return ParsedLine::Comment;
    }

    let invalid = |reason: String| ParsedLine::Invalid {
        line_number,
        content: line.to_string(),
        reason,
    };

    let parts: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
    if parts.len() < 3 {
        return invalid(format!(
            "expected '<start>{sep}<end>{sep}<summary>'",
            sep = FIELD_SEPARATOR
        ));
    }

    let time_min = match normalize_bound(parts[0].trim(), tz) {
        Some(bound) => bound,
        None => return invalid(format!("unrecognised start time '{}'", parts[0].trim())),
    };
    let time_max = match normalize_bound(parts[1].trim(), tz) {
        Some(bound) => bound,
        None => return invalid(format!("unrecognised end time '{}'", parts[1].trim())),
    };

    let summary = parts[2..].join(FIELD_SEPARATOR).trim().to_string();
    if summary.is_empty() {
        return invalid("empty event summary".to_string());
    }

    ParsedLine::Request(DeleteRequest {
        line_number,
        time_min,
        time_max,
        summary,
    })
}

/// Parse the whole delete file.
pub fn parse_delete_file(contents: &str, tz: Tz) -> Vec<ParsedLine> {
    contents
        .lines()
        .enumerate()
        .map(|(index, line)| parse_delete_line(index + 1, line, tz))
        .collect()
}

/// RFC 3339 bounds pass through untouched; a bare `YYYY-MM-DD` becomes the
/// start of that day in `tz`.
fn normalize_bound(raw: &str, tz: Tz) -> Option<String> {
    if DateTime::parse_from_rfc3339(raw).is_ok() {
        return Some(raw.to_string());
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    start_of_day(date, tz).ok().map(|start| start.to_rfc3339())
}

/// Why an event returned by the search was left alone.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    SummaryMismatch { found: Option<String> },
}

/// What to do with one event returned by the search.
#[derive(Debug, Clone, PartialEq)]
pub enum EventAction {
    CancelInstance(InstanceCancellation),
    Delete { event_id: String },
    Skip(SkipReason),
}

/// Decide the action for `item` given the requested summary.
pub fn plan_action(item: &ApiEvent, summary: &str) -> EventAction {
    if item.summary.as_deref() != Some(summary) {
        return EventAction::Skip(SkipReason::SummaryMismatch {
            found: item.summary.clone(),
        });
    }

    match item.recurring_instance() {
        Some(instance) => EventAction::CancelInstance(InstanceCancellation::for_instance(
            instance,
            item.end.as_ref(),
        )),
        None => EventAction::Delete {
            event_id: item.id.clone(),
        },
    }
}

/// Totals for one run over a delete file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionReport {
    pub requests: usize,
    pub invalid_lines: usize,
    pub events_found: usize,
    pub deleted: usize,
    pub cancelled: usize,
    pub already_gone: usize,
    pub mismatched: usize,
    pub failed: usize,
}

impl DeletionReport {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

impl std::fmt::Display for DeletionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} requests ({} invalid lines), {} events found: {} deleted, {} cancelled, \
             {} already gone, {} not matching, {} failed",
            self.requests,
            self.invalid_lines,
            self.events_found,
            self.deleted,
            self.cancelled,
            self.already_gone,
            self.mismatched,
            self.failed
        )
    }
}

pub struct EventDeleter<'a> {
    client: &'a CalendarClient,
    calendar_id: &'a str,
    dry_run: bool,
}

impl<'a> EventDeleter<'a> {
    pub fn new(client: &'a CalendarClient, calendar_id: &'a str) -> Self {
        Self {
            client,
            calendar_id,
            dry_run: false,
        }
    }

    /// Log planned actions without changing the calendar.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Read the file at `path` and process every line.
    pub async fn run_file(&self, path: &Path, tz: Tz) -> Result<DeletionReport> {
        tracing::info!("Reading events from file: {}", path.display());
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read delete file {}", path.display()))?;

        self.run(&parse_delete_file(&contents, tz)).await
    }

    /// Process parsed lines in order.
    ///
    /// A failing request is counted and the next line is processed;
    /// authentication failures abort the run.
    pub async fn run(&self, lines: &[ParsedLine]) -> Result<DeletionReport> {
        let mut report = DeletionReport::default();

        for line in lines {
            match line {
                ParsedLine::Comment => {}
                ParsedLine::Invalid {
                    line_number,
                    content,
                    reason,
                } => {
                    report.invalid_lines += 1;
                    tracing::warn!(
                        "Skipping invalid line {}: {} ({})",
                        line_number,
                        content,
                        reason
                    );
                }
                ParsedLine::Request(request) => {
                    report.requests += 1;
                    if let Err(e) = self.process(request, &mut report).await {
                        if e.should_refresh_token() {
                            return Err(e).context("Calendar API rejected the credentials");
                        }
                        report.failed += 1;
                        tracing::error!(
                            "Line {} ({}) failed: {}",
                            request.line_number,
                            request.summary,
                            e
                        );
                    }
                }
            }
        }

        tracing::info!("Deletion finished: {}", report);
        Ok(report)
    }

    /// Search for the request's events and act on each match.
    ///
    /// A failed insert or delete is counted per item and the remaining items
    /// are still processed; only credential errors are returned.
    async fn process(
        &self,
        request: &DeleteRequest,
        report: &mut DeletionReport,
    ) -> Result<(), CalendarError> {
        tracing::info!(
            "Processing line {}: timeMin={}, timeMax={}, summary={}",
            request.line_number,
            request.time_min,
            request.time_max,
            request.summary
        );

        let query = EventQuery::between(&request.time_min, &request.time_max)
            .matching(&request.summary);
        let items = self.client.list_events(self.calendar_id, &query).await?;
        report.events_found += items.len();
        tracing::info!("Found {} candidate events", items.len());

        for item in &items {
            tracing::debug!("Event found: {:?} with ID: {}", item.summary, item.id);

            let action = plan_action(item, &request.summary);
            if let Err(e) = self.apply(request, action, report).await {
                if e.should_refresh_token() {
                    return Err(e);
                }
                report.failed += 1;
                tracing::error!(
                    "Line {}: event {} ({}) failed: {}",
                    request.line_number,
                    item.id,
                    request.summary,
                    e
                );
            }
        }

        Ok(())
    }

    async fn apply(
        &self,
        request: &DeleteRequest,
        action: EventAction,
        report: &mut DeletionReport,
    ) -> Result<(), CalendarError> {
        match action {
            EventAction::Skip(SkipReason::SummaryMismatch { found }) => {
                report.mismatched += 1;
                tracing::info!(
                    "Event summary does not match: {:?} != {:?}",
                    found.unwrap_or_default(),
                    request.summary
                );
            }
            EventAction::CancelInstance(cancellation) => {
                tracing::info!(
                    "Cancelling single instance of recurring event: {} \
                     (recurringEventId={}, originalStartTime={:?})",
                    request.summary,
                    cancellation.recurring_event_id,
                    cancellation.original_start_time
                );
                if !self.dry_run {
                    self.client.insert_event(self.calendar_id, &cancellation).await?;
                }
                report.cancelled += 1;
            }
            EventAction::Delete { event_id } => {
                tracing::info!(
                    "Deleting event: {} ({}) from {} to {}",
                    request.summary,
                    event_id,
                    request.time_min,
                    request.time_max
                );
                if self.dry_run {
                    report.deleted += 1;
                    return Ok(());
                }
                match self.client.delete_event(self.calendar_id, &event_id).await {
                    Ok(()) => report.deleted += 1,
                    Err(CalendarError::Gone(_)) => {
                        tracing::info!("Event {} was already deleted", event_id);
                        report.already_gone += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        Ok(())
    }
}
