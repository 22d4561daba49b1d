//! Google Calendar operations for gcal-automate.
//!
//! Provides the Calendar API client, file-driven deletion/cancellation of
//! events and the hourly daily-schedule export.

pub mod client;
pub mod deletion;
pub mod error;
pub mod retry;
pub mod schedule;
pub mod types;

pub use client::{CalendarClient, EventQuery};
pub use deletion::{DeletionReport, EventAction, EventDeleter, ParsedLine};
pub use error::CalendarError;
pub use retry::RetryConfig;
pub use schedule::{ScheduleExporter, ScheduleReport};
pub use types::{ApiEvent, EventDateTime, InstanceCancellation};
