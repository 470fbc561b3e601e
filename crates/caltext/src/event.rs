//! Event records: the interchange unit shared by every codec.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::datetime::parse_timezone;
use crate::error::{CaltextError, Result};
use crate::recurrence::RecurrenceRule;

/// Participation status of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    None,
    Confirmed,
    Tentative,
    Canceled,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::None => "none",
            EventStatus::Confirmed => "confirmed",
            EventStatus::Tentative => "tentative",
            EventStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = CaltextError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" => Ok(EventStatus::None),
            "confirmed" => Ok(EventStatus::Confirmed),
            "tentative" => Ok(EventStatus::Tentative),
            "canceled" | "cancelled" => Ok(EventStatus::Canceled),
            _ => Err(CaltextError::MalformedTable(format!("unknown status '{s}'"))),
        }
    }
}

/// A reminder attached to an event.
///
/// `relative_offset` is measured from the event start; negative values fire
/// before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Alert {
    pub relative_offset: TimeDelta,
}

impl Alert {
    /// An alert firing `lead` before the event starts.
    pub fn before(lead: TimeDelta) -> Self {
        Self {
            relative_offset: -lead.abs(),
        }
    }
}

/// One calendar event as read from or written to a file.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    /// Store identifier; empty for events that have never been saved.
    pub id: String,
    pub title: String,
    pub start: DateTime<FixedOffset>,
    /// Exclusive end. For all-day events this is the day after the last day.
    pub end: DateTime<FixedOffset>,
    pub all_day: bool,
    pub calendar: Option<String>,
    pub calendar_id: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub url: Option<String>,
    /// IANA zone name; `None` means floating.
    pub time_zone: Option<String>,
    pub status: EventStatus,
    pub alerts: Vec<Alert>,
    pub recurrence_rules: Vec<RecurrenceRule>,
    pub created: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl EventRecord {
    /// A new record with the default end for `start` (see [`default_end`]).
    pub fn new(title: impl Into<String>, start: DateTime<FixedOffset>, all_day: bool) -> Self {
        Self {
            id: String::new(),
            title: title.into(),
            start,
            end: default_end(start, all_day),
            all_day,
            calendar: None,
            calendar_id: None,
            location: None,
            notes: None,
            url: None,
            time_zone: None,
            status: EventStatus::None,
            alerts: Vec::new(),
            recurrence_rules: Vec::new(),
            created: None,
            last_modified: None,
        }
    }

    /// Keep the wall-clock start and end but place them in the named zone.
    ///
    /// "09:00 +05:30" re-anchored to `America/New_York` becomes "09:00 -05:00".
    ///
    /// # Errors
    ///
    /// Returns [`CaltextError::InvalidTimezone`] for an unknown zone name, or
    /// [`CaltextError::InvalidTime`] if a wall-clock time does not exist there.
    pub fn with_time_zone(mut self, name: &str) -> Result<Self> {
        let tz = parse_timezone(name)?;
        let reanchor = |dt: DateTime<FixedOffset>| {
            dt.naive_local()
                .and_local_timezone(tz)
                .earliest()
                .map(|local| local.fixed_offset())
                .ok_or_else(|| {
                    CaltextError::InvalidTime(format!("{} does not exist in {tz}", dt.naive_local()))
                })
        };
        self.start = reanchor(self.start)?;
        self.end = reanchor(self.end)?;
        self.time_zone = Some(tz.name().to_string());
        Ok(self)
    }

    /// Check the record is fit to hand to a calendar store.
    ///
    /// # Errors
    ///
    /// Returns [`CaltextError::MalformedDocument`] when the title is blank or
    /// the end precedes the start.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(CaltextError::MalformedDocument(
                "event title is empty".to_string(),
            ));
        }
        if self.end < self.start {
            return Err(CaltextError::MalformedDocument(format!(
                "'{}' ends ({}) before it starts ({})",
                self.title,
                self.end.to_rfc3339(),
                self.start.to_rfc3339()
            )));
        }
        Ok(())
    }

    /// Whether the event repeats.
    pub fn is_recurring(&self) -> bool {
        !self.recurrence_rules.is_empty()
    }
}

/// End used when none is given: one day after an all-day start, one hour
/// after a timed one.
pub fn default_end(start: DateTime<FixedOffset>, all_day: bool) -> DateTime<FixedOffset> {
    let span = if all_day {
        TimeDelta::days(1)
    } else {
        TimeDelta::hours(1)
    };
    start.checked_add_signed(span).unwrap_or(start)
}
