//! Recurrence rules: the `RRULE` value codec, builders and previews.
//!
//! [`RecurrenceRule`] models the subset of RFC 5545 recurrence the calendar
//! tool round-trips: frequency, interval, `BYDAY` (with optional ordinal),
//! `BYMONTHDAY`, and a single end condition (`UNTIL` or `COUNT`).
//!
//! - [`parse_rrule`] decodes an `RRULE` value string.
//! - The [`Display`](std::fmt::Display) impl encodes one, in the fixed key
//!   order `FREQ`, `INTERVAL`, `BYDAY`, `BYMONTHDAY`, `UNTIL`/`COUNT`.
//! - [`RecurrenceRule::occurrences`] expands a rule with the `rrule` crate.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc, Weekday};

use crate::datetime::parse_weekday;
use crate::error::{CaltextError, Result};

// ── Types ───────────────────────────────────────────────────────────────────

/// How often a rule repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    /// The `FREQ` token for this frequency.
    pub fn as_rrule(&self) -> &'static str {
        match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        }
    }

    fn unit(&self) -> &'static str {
        match self {
            Frequency::Daily => "day",
            Frequency::Weekly => "week",
            Frequency::Monthly => "month",
            Frequency::Yearly => "year",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_rrule())
    }
}

impl FromStr for Frequency {
    type Err = CaltextError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DAILY" => Ok(Frequency::Daily),
            "WEEKLY" => Ok(Frequency::Weekly),
            "MONTHLY" => Ok(Frequency::Monthly),
            "YEARLY" => Ok(Frequency::Yearly),
            _ => Err(CaltextError::InvalidRule(format!("unknown FREQ '{s}'"))),
        }
    }
}

/// A `BYDAY` entry: a weekday, optionally restricted to its nth occurrence
/// within the period (`week_number` 0 means every occurrence, -1 the last).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DayOfWeek {
    pub weekday: Weekday,
    pub week_number: i32,
}

impl DayOfWeek {
    /// Every occurrence of `weekday`.
    pub fn every(weekday: Weekday) -> Self {
        Self {
            weekday,
            week_number: 0,
        }
    }

    /// Only the nth occurrence of `weekday` (`-1` for the last one).
    pub fn nth(week_number: i32, weekday: Weekday) -> Self {
        Self {
            weekday,
            week_number,
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.week_number != 0 {
            write!(f, "{}", self.week_number)?;
        }
        f.write_str(weekday_code(self.weekday))
    }
}

/// The terminating condition of a rule. A rule carries at most one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecurrenceEnd {
    Until(DateTime<Utc>),
    Count(u32),
}

/// A structured `RRULE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    /// Always at least 1.
    pub interval: u32,
    pub days_of_week: Vec<DayOfWeek>,
    pub days_of_month: Vec<i32>,
    pub end: Option<RecurrenceEnd>,
}

// ── Builders ────────────────────────────────────────────────────────────────

impl RecurrenceRule {
    /// A rule repeating every `interval` periods of `frequency`.
    ///
    /// An interval of 0 is treated as 1.
    pub fn new(frequency: Frequency, interval: u32) -> Self {
        Self {
            frequency,
            interval: interval.max(1),
            days_of_week: Vec::new(),
            days_of_month: Vec::new(),
            end: None,
        }
    }

    pub fn daily(interval: u32) -> Self {
        Self::new(Frequency::Daily, interval)
    }

    pub fn weekly(interval: u32) -> Self {
        Self::new(Frequency::Weekly, interval)
    }

    pub fn monthly(interval: u32) -> Self {
        Self::new(Frequency::Monthly, interval)
    }

    pub fn yearly(interval: u32) -> Self {
        Self::new(Frequency::Yearly, interval)
    }

    /// Restrict the rule to the given weekdays (every occurrence of each).
    pub fn on_days(mut self, days: &[Weekday]) -> Self {
        self.days_of_week = days.iter().copied().map(DayOfWeek::every).collect();
        self
    }

    /// End the rule at `until`, replacing any previous end condition.
    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.end = Some(RecurrenceEnd::Until(until));
        self
    }

    /// End the rule after `count` occurrences, replacing any previous end
    /// condition. A count of 0 leaves the rule open-ended.
    pub fn count(mut self, count: u32) -> Self {
        if count > 0 {
            self.end = Some(RecurrenceEnd::Count(count));
        }
        self
    }

    /// Plain-English summary: "Every day", "Every 2 weeks until 2026-03-01",
    /// "Every month for 5 occurrences".
    pub fn describe(&self) -> String {
        let mut out = if self.interval == 1 {
            format!("Every {}", self.frequency.unit())
        } else {
            format!("Every {} {}s", self.interval, self.frequency.unit())
        };

        match self.end {
            Some(RecurrenceEnd::Until(until)) => {
                out.push_str(&format!(" until {}", until.format("%Y-%m-%d")));
            }
            Some(RecurrenceEnd::Count(count)) => {
                out.push_str(&format!(" for {count} occurrences"));
            }
            None => {}
        }
        out
    }

    /// Expand the rule from `start` into at most `limit` UTC instants.
    ///
    /// # Errors
    ///
    /// Returns [`CaltextError::InvalidRule`] if the rule is not expandable
    /// (for example `BYMONTHDAY` on a weekly rule, or a `BYDAY` ordinal out
    /// of range).
    pub fn occurrences(&self, start: DateTime<Utc>, limit: u16) -> Result<Vec<DateTime<Utc>>> {
        let text = format!("DTSTART:{}\nRRULE:{}", start.format("%Y%m%dT%H%M%SZ"), self);
        let set = text
            .parse::<rrule::RRuleSet>()
            .map_err(|e| CaltextError::InvalidRule(e.to_string()))?;

        let dates: Vec<DateTime<Utc>> = set
            .all(limit)
            .dates
            .into_iter()
            .map(|dt| dt.with_timezone(&Utc))
            .collect();
        tracing::debug!(rule = %self, count = dates.len(), "expanded recurrence");
        Ok(dates)
    }
}

// ── Encode ──────────────────────────────────────────────────────────────────

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FREQ={}", self.frequency)?;

        if self.interval > 1 {
            write!(f, ";INTERVAL={}", self.interval)?;
        }

        if !self.days_of_week.is_empty() {
            let days: Vec<String> = self.days_of_week.iter().map(ToString::to_string).collect();
            write!(f, ";BYDAY={}", days.join(","))?;
        }

        if !self.days_of_month.is_empty() {
            let days: Vec<String> = self.days_of_month.iter().map(ToString::to_string).collect();
            write!(f, ";BYMONTHDAY={}", days.join(","))?;
        }

        match self.end {
            Some(RecurrenceEnd::Until(until)) => {
                write!(f, ";UNTIL={}", until.format("%Y%m%dT%H%M%SZ"))
            }
            Some(RecurrenceEnd::Count(count)) => write!(f, ";COUNT={count}"),
            None => Ok(()),
        }
    }
}

// ── Decode ──────────────────────────────────────────────────────────────────

/// Decode an `RRULE` value such as `FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,FR`.
///
/// A leading `RRULE:` is tolerated. Keys are case-insensitive and unknown
/// keys are ignored. When both `UNTIL` and `COUNT` appear, whichever comes
/// last wins.
///
/// # Errors
///
/// Returns [`CaltextError::InvalidRule`] when `FREQ` is missing or unknown,
/// or when `INTERVAL`, `BYDAY`, `BYMONTHDAY`, `UNTIL` or `COUNT` is malformed.
///
/// # Examples
///
/// ```
/// use caltext::recurrence::{parse_rrule, Frequency};
///
/// let rule = parse_rrule("FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,FR").unwrap();
/// assert_eq!(rule.frequency, Frequency::Weekly);
/// assert_eq!(rule.interval, 2);
/// assert_eq!(rule.to_string(), "FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,FR");
/// ```
pub fn parse_rrule(value: &str) -> Result<RecurrenceRule> {
    let upper = value.trim().to_ascii_uppercase();
    let body = upper.strip_prefix("RRULE:").unwrap_or(&upper);

    let mut frequency = None;
    let mut rule = RecurrenceRule::new(Frequency::Daily, 1);

    for part in body.split(';') {
        let Some((key, val)) = part.split_once('=') else {
            continue;
        };
        let val = val.trim();
        match key.trim() {
            "FREQ" => frequency = Some(val.parse::<Frequency>()?),
            "INTERVAL" => {
                let n: i64 = val
                    .parse()
                    .map_err(|_| CaltextError::InvalidRule(format!("invalid INTERVAL '{val}'")))?;
                rule.interval = u32::try_from(n).unwrap_or(u32::MAX).max(1);
            }
            "BYDAY" => {
                rule.days_of_week = val
                    .split(',')
                    .map(parse_byday)
                    .collect::<Result<Vec<_>>>()?;
            }
            "BYMONTHDAY" => {
                rule.days_of_month = val
                    .split(',')
                    .map(|d| {
                        d.trim().parse::<i32>().map_err(|_| {
                            CaltextError::InvalidRule(format!("invalid BYMONTHDAY '{d}'"))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
            }
            "UNTIL" => rule.end = Some(RecurrenceEnd::Until(parse_until(val)?)),
            "COUNT" => {
                let count = val
                    .parse::<u32>()
                    .ok()
                    .filter(|&n| n > 0)
                    .ok_or_else(|| CaltextError::InvalidRule(format!("invalid COUNT '{val}'")))?;
                rule.end = Some(RecurrenceEnd::Count(count));
            }
            _ => {}
        }
    }

    rule.frequency =
        frequency.ok_or_else(|| CaltextError::InvalidRule(format!("missing FREQ in '{value}'")))?;
    Ok(rule)
}

impl FromStr for RecurrenceRule {
    type Err = CaltextError;

    fn from_str(s: &str) -> Result<Self> {
        parse_rrule(s)
    }
}

/// Parse a `BYDAY` token: `MO`, `2TU`, `-1FR`, `+3WE`.
fn parse_byday(token: &str) -> Result<DayOfWeek> {
    let token = token.trim();
    let invalid = || CaltextError::InvalidRule(format!("invalid BYDAY '{token}'"));

    if token.len() < 2 || !token.is_char_boundary(token.len() - 2) {
        return Err(invalid());
    }
    let (prefix, code) = token.split_at(token.len() - 2);
    let weekday = weekday_from_code(code).ok_or_else(invalid)?;
    let week_number = if prefix.is_empty() {
        0
    } else {
        prefix.parse::<i32>().map_err(|_| invalid())?
    };

    Ok(DayOfWeek {
        weekday,
        week_number,
    })
}

/// Parse an `UNTIL` value: `YYYYMMDD` (midnight UTC) or `YYYYMMDDTHHMMSS[Z]`.
fn parse_until(val: &str) -> Result<DateTime<Utc>> {
    let invalid = || CaltextError::InvalidRule(format!("invalid UNTIL '{val}'"));

    if val.len() == 8 {
        return NaiveDate::parse_from_str(val, "%Y%m%d")
            .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
            .map_err(|_| invalid());
    }

    let stamp = val.strip_suffix('Z').unwrap_or(val);
    NaiveDateTime::parse_from_str(stamp, "%Y%m%dT%H%M%S")
        .map(|dt| dt.and_utc())
        .map_err(|_| invalid())
}

fn weekday_code(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Sun => "SU",
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
    }
}

fn weekday_from_code(code: &str) -> Option<Weekday> {
    match code {
        "SU" => Some(Weekday::Sun),
        "MO" => Some(Weekday::Mon),
        "TU" => Some(Weekday::Tue),
        "WE" => Some(Weekday::Wed),
        "TH" => Some(Weekday::Thu),
        "FR" => Some(Weekday::Fri),
        "SA" => Some(Weekday::Sat),
        _ => None,
    }
}

// ── User-facing helpers ─────────────────────────────────────────────────────

/// Parse a repeat keyword: `daily`, `weekly`, `monthly`, `yearly`.
pub fn parse_frequency(s: &str) -> Result<Frequency> {
    match s.trim().to_lowercase().as_str() {
        "daily" => Ok(Frequency::Daily),
        "weekly" => Ok(Frequency::Weekly),
        "monthly" => Ok(Frequency::Monthly),
        "yearly" => Ok(Frequency::Yearly),
        _ => Err(CaltextError::InvalidRule(format!(
            "invalid repeat value '{s}' (use daily, weekly, monthly, yearly)"
        ))),
    }
}

/// Parse a comma-separated weekday list such as `mon,wed,fri`.
///
/// An empty string yields an empty list.
pub fn parse_weekday_list(s: &str) -> Result<Vec<Weekday>> {
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    s.split(',')
        .map(|part| {
            let part = part.trim().to_lowercase();
            parse_weekday(&part).ok_or_else(|| {
                CaltextError::InvalidRule(format!(
                    "unknown day '{part}' (use mon,tue,wed,thu,fri,sat,sun)"
                ))
            })
        })
        .collect()
}

// ── Tests ───────────────────────────────────────────────────────────────────
