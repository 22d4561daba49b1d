//! Export one day's events, hour by hour up to "now", to a flat text file.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::client::{CalendarClient, EventQuery};
use crate::deletion::FIELD_SEPARATOR;
use crate::error::CalendarError;
use crate::types::ApiEvent;

/// One hourly query window.
#[derive(Debug, Clone, PartialEq)]
pub struct HourWindow {
    /// Hours since local midnight
    pub hour: i64,
    pub time_min: DateTime<Utc>,
    /// Inclusive: one second before the next window starts
    pub time_max: DateTime<Utc>,
}

/// Granularity used to find the end of a DST gap.
const GAP_STEP_MINUTES: i64 = 15;

/// Local midnight of `date` in `tz`.
///
/// Zones that switch to DST at 00:00 skip midnight; the day then starts at
/// the first local time that exists.
pub fn start_of_day(date: NaiveDate, tz: Tz) -> Result<DateTime<Tz>, CalendarError> {
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| CalendarError::InvalidDate(date.to_string()))?;

    (0..24 * 60 / GAP_STEP_MINUTES)
        .map(|step| midnight + Duration::minutes(step * GAP_STEP_MINUTES))
        .find_map(|local| tz.from_local_datetime(&local).earliest())
        .ok_or_else(|| {
            CalendarError::InvalidDate(format!("{} has no local start of day in {}", date, tz))
        })
}

/// Today's date as seen in `tz`.
pub fn today_in(tz: Tz, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// Hourly windows of `date` whose start is not after `now`.
///
/// Windows advance in absolute hours from local midnight until the next
/// local midnight, so DST days yield 23 or 25 windows.
pub fn hour_windows(
    date: NaiveDate,
    tz: Tz,
    now: DateTime<Utc>,
) -> Result<Vec<HourWindow>, CalendarError> {
    let day_start = start_of_day(date, tz)?.with_timezone(&Utc);
    let next_day = date
        .succ_opt()
        .ok_or_else(|| CalendarError::InvalidDate(date.to_string()))?;
    let day_end = start_of_day(next_day, tz)?.with_timezone(&Utc);

    let mut windows = Vec::new();
    let mut hour = 0;
    loop {
        let time_min = day_start + Duration::hours(hour);
        if time_min >= day_end || time_min > now {
            break;
        }
        windows.push(HourWindow {
            hour,
            time_min,
            time_max: time_min + Duration::hours(1) - Duration::seconds(1),
        });
        hour += 1;
    }

    Ok(windows)
}

pub fn schedule_header(date: NaiveDate) -> String {
    format!("# Schedule for {}", date.format("%Y-%m-%d"))
}

/// `<start> - <end> - <summary>` with the raw `dateTime`/`date` values.
pub fn format_schedule_line(event: &ApiEvent) -> String {
    let start = event
        .start
        .as_ref()
        .and_then(|t| t.display_value())
        .unwrap_or_default();
    let end = event
        .end
        .as_ref()
        .and_then(|t| t.display_value())
        .unwrap_or_default();

    [start, end, event.summary_text()].join(FIELD_SEPARATOR)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleReport {
    pub windows: usize,
    pub events_written: usize,
    pub duplicates_skipped: usize,
}

impl std::fmt::Display for ScheduleReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} events written from {} hourly windows ({} repeats skipped)",
            self.events_written, self.windows, self.duplicates_skipped
        )
    }
}

pub struct ScheduleExporter<'a> {
    client: &'a CalendarClient,
    calendar_id: &'a str,
    tz: Tz,
}

impl<'a> ScheduleExporter<'a> {
    pub fn new(client: &'a CalendarClient, calendar_id: &'a str, tz: Tz) -> Self {
        Self {
            client,
            calendar_id,
            tz,
        }
    }

    /// Write the schedule for `date` to `output`.
    ///
    /// The header is written before any API call and each hour is flushed as
    /// it completes, so a failure leaves the hours fetched so far on disk.
    pub async fn export(
        &self,
        date: NaiveDate,
        now: DateTime<Utc>,
        output: &Path,
    ) -> Result<ScheduleReport> {
        let windows = hour_windows(date, self.tz, now)?;

        let mut file = File::create(output)
            .with_context(|| format!("Failed to create schedule file {}", output.display()))?;
        writeln!(file, "{}", schedule_header(date))?;
        file.flush()?;

        let mut report = ScheduleReport {
            windows: windows.len(),
            ..ScheduleReport::default()
        };
        let mut seen: HashSet<String> = HashSet::new();

        for window in &windows {
            let query =
                EventQuery::between(window.time_min.to_rfc3339(), window.time_max.to_rfc3339())
                    .ordered_by_start();

            let events = self
                .client
                .list_events(self.calendar_id, &query)
                .await
                .with_context(|| format!("Failed to fetch events for hour {}", window.hour))?;

            tracing::debug!("Hour {}: {} events", window.hour, events.len());

            for event in &events {
                if !event.id.is_empty() && !seen.insert(event.id.clone()) {
                    report.duplicates_skipped += 1;
                    continue;
                }
                writeln!(file, "{}", format_schedule_line(event))?;
                report.events_written += 1;
            }
            file.flush()?;
        }

        tracing::info!("Schedule for {} saved to {}: {}", date, output.display(), report);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use chrono_tz::America::Chicago;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_past_day_has_all_hours() {
        let later = utc("2024-06-01T00:00:00Z");
        let windows = hour_windows(date("2024-05-01"), Chicago, later).unwrap();
        assert_eq!(windows.len(), 24);

        assert_eq!(windows[0].time_min.to_rfc3339(), "2024-05-01T05:00:00+00:00");
        assert_eq!(windows[0].time_max.to_rfc3339(), "2024-05-01T05:59:59+00:00");
        assert_eq!(windows[23].time_max.to_rfc3339(), "2024-05-02T04:59:59+00:00");
    }

    #[test]
    fn test_today_stops_at_current_hour() {
        // 14:30 local (CDT)
        let now = utc("2024-05-01T19:30:00Z");
        let windows = hour_windows(date("2024-05-01"), Chicago, now).unwrap();
        assert_eq!(windows.len(), 15);
        assert_eq!(windows.last().unwrap().hour, 14);
    }

    #[test]
    fn test_future_day_has_no_windows() {
        let now = utc("2024-05-01T19:30:00Z");
        let windows = hour_windows(date("2024-05-02"), Chicago, now).unwrap();
        assert!(windows.is_empty());
    }

    #[test]
    fn test_dst_days() {
        let later = utc("2025-01-01T00:00:00Z");
        assert_eq!(hour_windows(date("2024-03-10"), Chicago, later).unwrap().len(), 23);
        assert_eq!(hour_windows(date("2024-11-03"), Chicago, later).unwrap().len(), 25);
    }

    #[test]
    fn test_day_starting_in_dst_gap() {
        // Santiago jumps from 00:00 to 01:00 on this day
        let tz = chrono_tz::America::Santiago;
        let start = start_of_day(date("2024-09-08"), tz).unwrap();
        assert_eq!(start.to_rfc3339(), "2024-09-08T01:00:00-03:00");

        let windows = hour_windows(date("2024-09-08"), tz, utc("2025-01-01T00:00:00Z")).unwrap();
        assert_eq!(windows.len(), 23);
        assert_eq!(windows[0].time_min.to_rfc3339(), "2024-09-08T04:00:00+00:00");
    }

    #[test]
    fn test_today_in_zone() {
        // already the 2nd in UTC, still the 1st in Chicago
        assert_eq!(today_in(Chicago, utc("2024-05-02T03:00:00Z")), date("2024-05-01"));
    }

    #[test]
    fn test_format_schedule_line() {
        let timed: ApiEvent = serde_json::from_value(json!({
            "id": "a",
            "summary": "Planning - Q3",
            "start": {"dateTime": "2024-05-01T09:00:00-05:00"},
            "end": {"dateTime": "2024-05-01T10:00:00-05:00"}
        }))
        .unwrap();
        assert_eq!(
            format_schedule_line(&timed),
            "2024-05-01T09:00:00-05:00 - 2024-05-01T10:00:00-05:00 - Planning - Q3"
        );

        let all_day: ApiEvent = serde_json::from_value(json!({
            "id": "b",
            "summary": "Holiday",
            "start": {"date": "2024-05-01"},
            "end": {"date": "2024-05-02"}
        }))
        .unwrap();
        assert_eq!(format_schedule_line(&all_day), "2024-05-01 - 2024-05-02 - Holiday");
    }

    #[tokio::test]
    async fn test_export_writes_header_and_unique_events() {
        let server = MockServer::start().await;

        let planning = json!({
            "id": "planning",
            "summary": "Planning",
            "start": {"dateTime": "2024-05-01T00:00:00-05:00"},
            "end": {"dateTime": "2024-05-01T02:00:00-05:00"}
        });
        let holiday = json!({
            "id": "holiday",
            "summary": "Holiday",
            "start": {"date": "2024-05-01"},
            "end": {"date": "2024-05-02"}
        });

        Mock::given(method("GET"))
            .and(path("/calendars/primary/events"))
            .and(query_param("timeMin", "2024-05-01T05:00:00+00:00"))
            .and(query_param("timeMax", "2024-05-01T05:59:59+00:00"))
            .and(query_param("orderBy", "startTime"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "items": [planning.clone()] })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/calendars/primary/events"))
            .and(query_param("timeMin", "2024-05-01T06:00:00+00:00"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "items": [planning.clone(), holiday] })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/calendars/primary/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("daily_schedule.txt");
        let client = CalendarClient::new_with_base_url("token", &server.uri());

        // 02:30 local -> hours 0, 1 and 2
        let report = ScheduleExporter::new(&client, "primary", Chicago)
            .export(date("2024-05-01"), utc("2024-05-01T07:30:00Z"), &output)
            .await
            .unwrap();

        assert_eq!(
            report,
            ScheduleReport {
                windows: 3,
                events_written: 2,
                duplicates_skipped: 1,
            }
        );
        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "# Schedule for 2024-05-01\n\
             2024-05-01T00:00:00-05:00 - 2024-05-01T02:00:00-05:00 - Planning\n\
             2024-05-01 - 2024-05-02 - Holiday\n"
        );
    }

    #[tokio::test]
    async fn test_failed_export_keeps_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("daily_schedule.txt");
        std::fs::write(&output, "stale contents\n").unwrap();
        let client = CalendarClient::new_with_base_url("token", &server.uri());

        let result = ScheduleExporter::new(&client, "primary", Chicago)
            .export(date("2024-05-01"), utc("2024-05-01T07:30:00Z"), &output)
            .await;

        assert!(result.is_err());
        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "# Schedule for 2024-05-01\n"
        );
    }
}
