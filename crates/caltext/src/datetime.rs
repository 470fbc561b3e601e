//! Free-form date/time resolution for calendar input.
//!
//! Turns the strings users type into flags and prompts ("tomorrow 2pm",
//! "eow", "next friday at 3:30pm", "2026-03-15 14:00") into absolute instants.
//! Every function takes the reference "now" explicitly, so resolution never
//! reads the system clock and stays reproducible under test.
//!
//! # Resolution order
//!
//! Strategies are tried from the most structured grammar to the fuzziest one,
//! and the first match wins:
//!
//! 1. Fixed formats (RFC 3339, ISO, US and English dates)
//! 2. Keywords: `today`, `tomorrow`, `yesterday`, `now`
//! 3. Period ends: `eod`, `eow`, `this week`, `next week`, `next month`
//! 4. `in <N> <unit>`
//! 5. `<N> <unit> ago`
//! 6. `next <weekday>[ at <time>]`
//! 7. `<today|tomorrow|yesterday>[ at] <time>`
//! 8. `<weekday>[ at] <time>`
//! 9. `<month> <day>[ <time>]`
//! 10. `<weekday>`
//! 11. `<time>`
//! 12. `<date> <time>`
//!
//! Location-agnostic results are placed in the timezone of the reference
//! instant. RFC 3339 input carries its own offset and keeps it.

use chrono::{
    DateTime, Datelike, Days, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, NaiveTime,
    TimeDelta, TimeZone, Utc, Weekday,
};
use chrono_tz::Tz;

use crate::error::{CaltextError, Result};

/// A reference point in time, carrying the zone relative input resolves in.
pub type Instant = DateTime<Tz>;

/// Datetime formats tried verbatim, in order, before any fuzzy grammar.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %I:%M%p",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M%p",
    "%b %d, %Y %I:%M%p",
    "%b %d, %Y %H:%M",
];

/// Date-only formats; these resolve to midnight.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%b %d, %Y", "%d %b %Y"];

const ACCEPTED_EXAMPLES: &str = "Try: 'today', 'tomorrow 2pm', 'this week', 'eow', \
     'next friday', 'in 3 hours', or '2026-03-15 14:00'";

// ── Options ─────────────────────────────────────────────────────────────────

/// Default wall-clock time for `eod` and `eow`.
pub const DEFAULT_END_OF_DAY: NaiveTime = match NaiveTime::from_hms_opt(17, 0, 0) {
    Some(time) => time,
    None => panic!("17:00:00 is a valid time"),
};

/// Tunables for the period-end keywords.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Wall-clock time used by `eod` and `eow`.
    pub end_of_day: NaiveTime,
    /// Last day of the business week, targeted by `eow`.
    pub work_week_end: Weekday,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            end_of_day: DEFAULT_END_OF_DAY,
            work_week_end: Weekday::Fri,
        }
    }
}

// ── parse_datetime ──────────────────────────────────────────────────────────

/// Resolve a free-form date/time string relative to `now`.
///
/// Uses the default [`ParseOptions`] (end of day at 17:00, work week ending
/// on Friday).
///
/// # Errors
///
/// Returns [`CaltextError::DateParse`] if no grammar matches, or
/// [`CaltextError::InvalidTime`] if the input is a clock time with an
/// out-of-range hour or minute.
///
/// # Examples
///
/// ```
/// use caltext::datetime::parse_datetime;
/// use chrono::TimeZone;
///
/// let now = chrono_tz::Asia::Kolkata
///     .with_ymd_and_hms(2026, 2, 11, 10, 30, 0)
///     .unwrap();
/// let eow = parse_datetime("eow", &now).unwrap();
/// assert_eq!(eow.to_rfc3339(), "2026-02-13T17:00:00+05:30");
/// ```
pub fn parse_datetime(input: &str, now: &Instant) -> Result<DateTime<FixedOffset>> {
    parse_datetime_with_options(input, now, &ParseOptions::default())
}

/// Resolve a free-form date/time string relative to `now` with options.
///
/// See the module documentation for the grammar and the order in which the
/// strategies are tried.
///
/// # Errors
///
/// Same as [`parse_datetime`].
pub fn parse_datetime_with_options(
    input: &str,
    now: &Instant,
    options: &ParseOptions,
) -> Result<DateTime<FixedOffset>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CaltextError::DateParse("empty date string".to_string()));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt);
    }

    let tz = now.timezone();
    if let Some(dt) = try_fixed_formats(input, &tz) {
        return Ok(dt.fixed_offset());
    }

    let normalized = normalize_expression(input);

    try_keyword(&normalized, now)
        .or_else(|| try_period_end(&normalized, now, options))
        .or_else(|| try_relative_offset(&normalized, now))
        .or_else(|| try_past_offset(&normalized, now))
        .or_else(|| try_next_weekday(&normalized, now))
        .or_else(|| try_anchor_with_time(&normalized, now))
        .or_else(|| try_weekday_with_time(&normalized, now))
        .or_else(|| try_month_day(&normalized, now))
        .or_else(|| try_standalone_weekday(&normalized, now))
        .or_else(|| try_time_only(&normalized, now))
        .or_else(|| try_date_and_time(&normalized, &tz))
        .map(|dt| dt.fixed_offset())
        .ok_or_else(|| unrecognized(input, &normalized))
}

/// Resolve a free-form date/time string against a UTC anchor in a named zone.
///
/// # Errors
///
/// Returns [`CaltextError::InvalidTimezone`] if `timezone` is not an IANA
/// name, otherwise the errors of [`parse_datetime`].
pub fn parse_datetime_in(
    anchor: DateTime<Utc>,
    input: &str,
    timezone: &str,
) -> Result<DateTime<FixedOffset>> {
    let tz = parse_timezone(timezone)?;
    parse_datetime(input, &anchor.with_timezone(&tz))
}

/// Parse an IANA timezone name into `Tz`.
pub fn parse_timezone(s: &str) -> Result<Tz> {
    s.trim()
        .parse::<Tz>()
        .map_err(|_| CaltextError::InvalidTimezone(format!("'{s}'")))
}

/// Parse a clock time: `5pm`, `5 pm`, `3:30pm`, `9:30`, `17:00`.
///
/// Hours are 1-12 with a meridiem and 0-23 without one; minutes are 0-59.
///
/// # Errors
///
/// [`CaltextError::InvalidTime`] when the text has the shape of a clock time
/// but a component is out of range, [`CaltextError::DateParse`] otherwise.
pub fn parse_clock_time(s: &str) -> Result<NaiveTime> {
    let s = s.trim().to_lowercase();
    let not_a_time = || CaltextError::DateParse(format!("unable to parse time: '{s}'"));
    let out_of_range = || CaltextError::InvalidTime(format!("'{s}'"));

    let (body, meridiem) = if let Some(b) = s.strip_suffix("am") {
        (b.trim_end(), Some(false))
    } else if let Some(b) = s.strip_suffix("pm") {
        (b.trim_end(), Some(true))
    } else {
        (s.as_str(), None)
    };

    let (hour_str, minute_str) = match body.split_once(':') {
        Some((h, m)) => (h, Some(m)),
        None => (body, None),
    };

    // A bare number is not a time; "17" alone could be a day or a count.
    if !is_digits(hour_str, 1, 2) || (meridiem.is_none() && minute_str.is_none()) {
        return Err(not_a_time());
    }
    if minute_str.is_some_and(|m| !is_digits(m, 2, 2)) {
        return Err(not_a_time());
    }

    let hour: u32 = hour_str.parse().map_err(|_| not_a_time())?;
    let minute: u32 = match minute_str {
        Some(m) => m.parse().map_err(|_| not_a_time())?,
        None => 0,
    };
    if minute > 59 {
        return Err(out_of_range());
    }

    let hour24 = match meridiem {
        Some(is_pm) => {
            if !(1..=12).contains(&hour) {
                return Err(out_of_range());
            }
            match (hour, is_pm) {
                (12, false) => 0,
                (12, true) => 12,
                (h, true) => h + 12,
                (h, false) => h,
            }
        }
        None => {
            if hour > 23 {
                return Err(out_of_range());
            }
            hour
        }
    };

    NaiveTime::from_hms_opt(hour24, minute, 0).ok_or_else(out_of_range)
}

// ── Strategies ──────────────────────────────────────────────────────────────

/// Lowercase and collapse runs of whitespace into single spaces.
fn normalize_expression(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Try the fixed format lists.
fn try_fixed_formats(s: &str, tz: &Tz) -> Option<Instant> {
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
        .and_then(|naive| localize(tz, naive))
}

/// Try "now", "today", "tomorrow", "yesterday".
fn try_keyword(s: &str, now: &Instant) -> Option<Instant> {
    let tz = now.timezone();
    let today = now.date_naive();
    match s {
        "now" => Some(*now),
        "today" => at_time(today, NaiveTime::MIN, &tz),
        "tomorrow" => at_time(today.succ_opt()?, NaiveTime::MIN, &tz),
        "yesterday" => at_time(today.pred_opt()?, NaiveTime::MIN, &tz),
        _ => None,
    }
}

/// Try period ends: "eod", "eow", "this week", "next week", "next month".
///
/// `eow` is the business week (Friday end of day, today if already Friday);
/// `this week` is the calendar week (Sunday 23:59, today if already Sunday).
fn try_period_end(s: &str, now: &Instant, options: &ParseOptions) -> Option<Instant> {
    let tz = now.timezone();
    let today = now.date_naive();
    match s {
        "eod" | "end of day" => at_time(today, options.end_of_day, &tz),
        "eow" | "end of week" => {
            let ahead = days_until(now.weekday(), options.work_week_end);
            at_time(today.checked_add_days(ahead)?, options.end_of_day, &tz)
        }
        "this week" => {
            let ahead = days_until(now.weekday(), Weekday::Sun);
            let end = NaiveTime::from_hms_opt(23, 59, 0)?;
            at_time(today.checked_add_days(ahead)?, end, &tz)
        }
        "next week" => at_time(next_weekday_date(today, Weekday::Mon)?, NaiveTime::MIN, &tz),
        "next month" => at_time(first_of_next_month(today)?, NaiveTime::MIN, &tz),
        _ => None,
    }
}

/// Try "in N <unit>".
fn try_relative_offset(s: &str, now: &Instant) -> Option<Instant> {
    let rest = s.strip_prefix("in ")?;
    let (amount, unit) = parse_amount_and_unit(rest)?;
    shift(now, amount, unit)
}

/// Try "N <unit> ago".
fn try_past_offset(s: &str, now: &Instant) -> Option<Instant> {
    let rest = s.strip_suffix(" ago")?;
    let (amount, unit) = parse_amount_and_unit(rest)?;
    shift(now, -amount, unit)
}

/// Try "next <weekday>", "next <weekday> at <time>", "next <weekday> <time>".
///
/// Always strictly after today: naming today's weekday rolls a full week.
fn try_next_weekday(s: &str, now: &Instant) -> Option<Instant> {
    let rest = s.strip_prefix("next ")?;
    let (day_name, time_part) = match rest.split_once(' ') {
        Some((day, time)) => (day, Some(time)),
        None => (rest, None),
    };

    let weekday = parse_weekday(day_name)?;
    let date = next_weekday_date(now.date_naive(), weekday)?;
    let time = match time_part {
        Some(t) => parse_clock_time(strip_at(t)).ok()?,
        None => NaiveTime::MIN,
    };
    at_time(date, time, &now.timezone())
}

/// Try "today at 5pm", "tomorrow 3:30pm", "yesterday at 17:00".
fn try_anchor_with_time(s: &str, now: &Instant) -> Option<Instant> {
    let (day, time) = s.split_once(" at ").or_else(|| s.split_once(' '))?;
    let today = now.date_naive();
    let date = match day {
        "today" => today,
        "tomorrow" => today.succ_opt()?,
        "yesterday" => today.pred_opt()?,
        _ => return None,
    };
    let time = parse_clock_time(time).ok()?;
    at_time(date, time, &now.timezone())
}

/// Try "friday 2pm", "monday at 10:00".
///
/// Today counts when the resulting instant is not already in the past.
fn try_weekday_with_time(s: &str, now: &Instant) -> Option<Instant> {
    let (day, rest) = s.split_once(' ')?;
    let weekday = parse_weekday(day)?;
    let time = parse_clock_time(strip_at(rest)).ok()?;

    let tz = now.timezone();
    let date = now
        .date_naive()
        .checked_add_days(days_until(now.weekday(), weekday))?;
    let candidate = at_time(date, time, &tz)?;
    if candidate >= *now {
        Some(candidate)
    } else {
        at_time(date.checked_add_days(Days::new(7))?, time, &tz)
    }
}

/// Try "mar 15", "march 15 2pm", "dec 31 at 11:59pm" in the reference year.
fn try_month_day(s: &str, now: &Instant) -> Option<Instant> {
    let mut parts = s.splitn(3, ' ');
    let month = parse_month(parts.next()?)?;
    let day_str = parts.next()?;
    if !is_digits(day_str, 1, 2) {
        return None;
    }
    let date = NaiveDate::from_ymd_opt(now.year(), month, day_str.parse().ok()?)?;
    let time = match parts.next() {
        Some(t) => parse_clock_time(strip_at(t)).ok()?,
        None => NaiveTime::MIN,
    };
    at_time(date, time, &now.timezone())
}

/// Try a bare weekday: the next occurrence at midnight, never today.
fn try_standalone_weekday(s: &str, now: &Instant) -> Option<Instant> {
    let weekday = parse_weekday(s)?;
    let date = next_weekday_date(now.date_naive(), weekday)?;
    at_time(date, NaiveTime::MIN, &now.timezone())
}

/// Try a bare clock time: today at that time.
fn try_time_only(s: &str, now: &Instant) -> Option<Instant> {
    let time = parse_clock_time(s).ok()?;
    at_time(now.date_naive(), time, &now.timezone())
}

/// Try "<fixed-format date> <time>", e.g. "2026-03-15 5pm".
fn try_date_and_time(s: &str, tz: &Tz) -> Option<Instant> {
    let (date_part, time_part) = s.split_once(' ')?;
    if time_part.contains(' ') {
        return None;
    }
    let base = try_fixed_formats(date_part, tz)?;
    let time = parse_clock_time(time_part).ok()?;
    at_time(base.date_naive(), time, tz)
}

fn unrecognized(input: &str, normalized: &str) -> CaltextError {
    match parse_clock_time(normalized) {
        Err(err @ CaltextError::InvalidTime(_)) => err,
        _ => CaltextError::DateParse(format!("'{input}'. {ACCEPTED_EXAMPLES}")),
    }
}

// ── Offsets ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OffsetUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

fn parse_offset_unit(s: &str) -> Option<OffsetUnit> {
    match s {
        "minute" | "minutes" | "min" | "mins" => Some(OffsetUnit::Minute),
        "hour" | "hours" | "hr" | "hrs" => Some(OffsetUnit::Hour),
        "day" | "days" => Some(OffsetUnit::Day),
        "week" | "weeks" => Some(OffsetUnit::Week),
        "month" | "months" => Some(OffsetUnit::Month),
        _ => None,
    }
}

/// Parse "N unit" (exactly two tokens, N all digits).
fn parse_amount_and_unit(s: &str) -> Option<(i64, OffsetUnit)> {
    let (amount, unit) = s.split_once(' ')?;
    if !is_digits(amount, 1, usize::MAX) {
        return None;
    }
    Some((amount.parse().ok()?, parse_offset_unit(unit)?))
}

/// Move `now` by a signed amount. Minutes and hours are elapsed time; days,
/// weeks and months move the calendar date and keep the wall-clock time.
fn shift(now: &Instant, amount: i64, unit: OffsetUnit) -> Option<Instant> {
    match unit {
        OffsetUnit::Minute => now.checked_add_signed(TimeDelta::try_minutes(amount)?),
        OffsetUnit::Hour => now.checked_add_signed(TimeDelta::try_hours(amount)?),
        OffsetUnit::Day => add_calendar(now, 0, amount),
        OffsetUnit::Week => add_calendar(now, 0, amount.checked_mul(7)?),
        OffsetUnit::Month => add_calendar(now, amount, 0),
    }
}

/// Add whole months and days to the wall-clock date.
///
/// Day-of-month overflow rolls into the following month, so Jan 31 plus one
/// month lands on Mar 3 (or Mar 2 in a leap year).
fn add_calendar(now: &Instant, months: i64, days: i64) -> Option<Instant> {
    let date = now.date_naive();
    let total = i64::from(date.year())
        .checked_mul(12)?
        .checked_add(i64::from(date.month0()))?
        .checked_add(months)?;
    let year = i32::try_from(total.div_euclid(12)).ok()?;
    let month = u32::try_from(total.rem_euclid(12)).ok()? + 1;
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let target = first.checked_add_signed(TimeDelta::try_days(i64::from(date.day0()).checked_add(days)?)?)?;
    localize(&now.timezone(), target.and_time(now.time()))
}

// ── Calendar helpers ────────────────────────────────────────────────────────

/// Days from `from` forward to `to`, 0 if they are the same weekday.
fn days_until(from: Weekday, to: Weekday) -> Days {
    Days::new(u64::from(
        (to.num_days_from_sunday() + 7 - from.num_days_from_sunday()) % 7,
    ))
}

/// The next date falling on `weekday`, strictly after `today`.
fn next_weekday_date(today: NaiveDate, weekday: Weekday) -> Option<NaiveDate> {
    let ahead = days_until(today.weekday(), weekday);
    let ahead = if ahead == Days::new(0) {
        Days::new(7)
    } else {
        ahead
    };
    today.checked_add_days(ahead)
}

fn first_of_next_month(date: NaiveDate) -> Option<NaiveDate> {
    let (y, m) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(y, m, 1)
}

fn at_time(date: NaiveDate, time: NaiveTime, tz: &Tz) -> Option<Instant> {
    localize(tz, date.and_time(time))
}

/// Place a wall-clock datetime in `tz`. Ambiguous times take the earlier
/// instant; times inside a DST gap move forward by an hour.
pub(crate) fn localize(tz: &Tz, naive: NaiveDateTime) -> Option<Instant> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => tz
            .from_local_datetime(&(naive + TimeDelta::try_hours(1)?))
            .earliest(),
    }
}

// ── Name tables ─────────────────────────────────────────────────────────────

/// Parse a lowercase weekday name, full or abbreviated.
pub(crate) fn parse_weekday(s: &str) -> Option<Weekday> {
    match s {
        "sunday" | "sun" => Some(Weekday::Sun),
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" | "tues" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" | "thurs" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        _ => None,
    }
}

/// Parse a lowercase month name to its number (1-12).
fn parse_month(s: &str) -> Option<u32> {
    match s {
        "january" | "jan" => Some(1),
        "february" | "feb" => Some(2),
        "march" | "mar" => Some(3),
        "april" | "apr" => Some(4),
        "may" => Some(5),
        "june" | "jun" => Some(6),
        "july" | "jul" => Some(7),
        "august" | "aug" => Some(8),
        "september" | "sep" | "sept" => Some(9),
        "october" | "oct" => Some(10),
        "november" | "nov" => Some(11),
        "december" | "dec" => Some(12),
        _ => None,
    }
}

fn strip_at(s: &str) -> &str {
    s.strip_prefix("at ").unwrap_or(s)
}

fn is_digits(s: &str, min: usize, max: usize) -> bool {
    (min..=max).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit())
}

// ── Display helpers ─────────────────────────────────────────────────────────

/// Human-readable length of an event: "All Day", "3 days", "1h 30m", "45m".
pub fn format_duration<T: TimeZone>(start: &DateTime<T>, end: &DateTime<T>, all_day: bool) -> String {
    let span = end.clone().signed_duration_since(start.clone());

    if all_day {
        let days = (span.num_seconds() + 43_200) / 86_400;
        if days <= 1 {
            return "All Day".to_string();
        }
        return format!("{days} days");
    }

    if span < TimeDelta::minutes(1) {
        return "0m".to_string();
    }
    let hours = span.num_hours();
    let minutes = span.num_minutes() % 60;
    match (hours, minutes) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}

/// Compact time range for table rows: "09:00 - 10:00", "Jan 02 - Jan 05".
pub fn format_time_range<T: TimeZone>(start: &DateTime<T>, end: &DateTime<T>, all_day: bool) -> String
where
    T::Offset: std::fmt::Display,
{
    let same_day = start.date_naive() == end.date_naive();

    if all_day {
        let span = end.clone().signed_duration_since(start.clone());
        if same_day || span <= TimeDelta::days(1) {
            return "All Day".to_string();
        }
        return format!("{} - {}", start.format("%b %d"), end.format("%b %d"));
    }

    if same_day {
        format!("{} - {}", start.format("%H:%M"), end.format("%H:%M"))
    } else {
        format!("{} - {}", start.format("%b %d %H:%M"), end.format("%b %d %H:%M"))
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Asia::Kolkata;
    use proptest::prelude::*;

    fn ist(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> Instant {
        Kolkata.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn anchor() -> Instant {
        // Wednesday, February 11, 2026, 10:30 IST
        ist(2026, 2, 11, 10, 30)
    }

    fn parse(input: &str) -> DateTime<FixedOffset> {
        parse_datetime(input, &anchor()).unwrap()
    }

    // ── keyword tests ───────────────────────────────────────────────────

    #[test]
    fn test_parse_keywords() {
        assert_eq!(parse("today"), ist(2026, 2, 11, 0, 0));
        assert_eq!(parse("tomorrow"), ist(2026, 2, 12, 0, 0));
        assert_eq!(parse("yesterday"), ist(2026, 2, 10, 0, 0));
        assert_eq!(parse("now"), anchor());
    }

    #[test]
    fn test_parse_end_of_day() {
        assert_eq!(parse("eod"), ist(2026, 2, 11, 17, 0));
        assert_eq!(parse("end of day"), ist(2026, 2, 11, 17, 0));
        assert_eq!(ParseOptions::default().end_of_day, NaiveTime::from_hms_opt(17, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_next_week_is_coming_monday() {
        assert_eq!(parse("next week"), ist(2026, 2, 16, 0, 0));
    }

    #[test]
    fn test_parse_next_month_is_first_of_month() {
        assert_eq!(parse("next month"), ist(2026, 3, 1, 0, 0));
        let december = ist(2026, 12, 20, 9, 0);
        assert_eq!(
            parse_datetime("next month", &december).unwrap(),
            ist(2027, 1, 1, 0, 0)
        );
    }

    #[test]
    fn test_parse_eow_targets_business_friday() {
        let cases = [
            (ist(2026, 2, 11, 10, 0), ist(2026, 2, 13, 17, 0)), // Wed
            (ist(2026, 2, 13, 10, 0), ist(2026, 2, 13, 17, 0)), // Fri itself
            (ist(2026, 2, 14, 10, 0), ist(2026, 2, 20, 17, 0)), // Sat
            (ist(2026, 2, 15, 10, 0), ist(2026, 2, 20, 17, 0)), // Sun
        ];
        for (now, want) in cases {
            assert_eq!(parse_datetime("eow", &now).unwrap(), want, "now = {now}");
            assert_eq!(parse_datetime("end of week", &now).unwrap(), want);
        }
    }

    #[test]
    fn test_parse_this_week_targets_calendar_sunday() {
        let cases = [
            (ist(2026, 2, 11, 10, 0), ist(2026, 2, 15, 23, 59)), // Wed
            (ist(2026, 2, 9, 10, 0), ist(2026, 2, 15, 23, 59)),  // Mon
            (ist(2026, 2, 14, 10, 0), ist(2026, 2, 15, 23, 59)), // Sat
            (ist(2026, 2, 15, 10, 0), ist(2026, 2, 15, 23, 59)), // Sun itself
        ];
        for (now, want) in cases {
            assert_eq!(parse_datetime("this week", &now).unwrap(), want, "now = {now}");
        }
    }

    #[test]
    fn test_parse_custom_end_of_day() {
        let options = ParseOptions {
            end_of_day: NaiveTime::from_hms_opt(18, 30, 0).unwrap(),
            work_week_end: Weekday::Thu,
        };
        let eod = parse_datetime_with_options("eod", &anchor(), &options).unwrap();
        assert_eq!(eod, ist(2026, 2, 11, 18, 30));
        let eow = parse_datetime_with_options("eow", &anchor(), &options).unwrap();
        assert_eq!(eow, ist(2026, 2, 12, 18, 30));
    }

    // ── offset tests ────────────────────────────────────────────────────

    #[test]
    fn test_parse_in_offsets() {
        let now = anchor();
        assert_eq!(parse("in 3 hours"), now + TimeDelta::hours(3));
        assert_eq!(parse("in 1 hr"), now + TimeDelta::hours(1));
        assert_eq!(parse("in 30 mins"), now + TimeDelta::minutes(30));
        assert_eq!(parse("in 5 days"), ist(2026, 2, 16, 10, 30));
        assert_eq!(parse("in 2 weeks"), ist(2026, 2, 25, 10, 30));
        assert_eq!(parse("in 3 months"), ist(2026, 5, 11, 10, 30));
    }

    #[test]
    fn test_parse_ago_offsets() {
        let now = anchor();
        assert_eq!(parse("2 hours ago"), now - TimeDelta::hours(2));
        assert_eq!(parse("30 minutes ago"), now - TimeDelta::minutes(30));
        assert_eq!(parse("5 days ago"), ist(2026, 2, 6, 10, 30));
        assert_eq!(parse("2 weeks ago"), ist(2026, 1, 28, 10, 30));
        assert_eq!(parse("1 month ago"), ist(2026, 1, 11, 10, 30));
    }

    #[test]
    fn test_parse_huge_offsets_fail_cleanly() {
        let now = anchor();
        let max = i64::MAX;
        for input in [
            format!("in {max} days"),
            format!("in {max} weeks"),
            format!("in {max} months"),
            format!("in {max} hours"),
            format!("{max} days ago"),
            format!("{max} months ago"),
        ] {
            assert!(parse_datetime(&input, &now).is_err(), "input {input:?}");
        }
    }

    #[test]
    fn test_parse_month_offset_overflows_short_month() {
        let jan31 = ist(2026, 1, 31, 9, 0);
        assert_eq!(
            parse_datetime("in 1 month", &jan31).unwrap(),
            ist(2026, 3, 3, 9, 0)
        );
    }

    #[test]
    fn test_parse_day_offset_keeps_wall_clock_across_dst() {
        // March 8 2026: US spring forward
        let tz: Tz = "America/New_York".parse().unwrap();
        let now = tz.with_ymd_and_hms(2026, 3, 7, 22, 0, 0).unwrap();
        let result = parse_datetime("in 1 day", &now).unwrap();
        assert_eq!(result.to_rfc3339(), "2026-03-08T22:00:00-04:00");
    }

    // ── weekday tests ───────────────────────────────────────────────────

    #[test]
    fn test_parse_next_weekday() {
        assert_eq!(parse("next monday"), ist(2026, 2, 16, 0, 0));
        assert_eq!(parse("next friday"), ist(2026, 2, 13, 0, 0));
        assert_eq!(parse("next sat"), ist(2026, 2, 14, 0, 0));
        // Same weekday rolls a full week
        assert_eq!(parse("next wednesday"), ist(2026, 2, 18, 0, 0));
    }

    #[test]
    fn test_parse_next_weekday_with_time() {
        assert_eq!(parse("next monday at 2pm"), ist(2026, 2, 16, 14, 0));
        assert_eq!(parse("next friday at 3:30pm"), ist(2026, 2, 13, 15, 30));
        assert_eq!(parse("next monday 10am"), ist(2026, 2, 16, 10, 0));
    }

    #[test]
    fn test_parse_next_weekday_with_bad_time_fails() {
        assert!(parse_datetime("next monday at 25:00", &anchor()).is_err());
    }

    #[test]
    fn test_parse_anchor_with_time() {
        assert_eq!(parse("today at 5pm"), ist(2026, 2, 11, 17, 0));
        assert_eq!(parse("tomorrow at 3:30pm"), ist(2026, 2, 12, 15, 30));
        assert_eq!(parse("today at 17:00"), ist(2026, 2, 11, 17, 0));
        assert_eq!(parse("tomorrow 9am"), ist(2026, 2, 12, 9, 0));
        assert_eq!(parse("yesterday 3pm"), ist(2026, 2, 10, 15, 0));
    }

    #[test]
    fn test_parse_weekday_with_time() {
        assert_eq!(parse("friday 2pm"), ist(2026, 2, 13, 14, 0));
        assert_eq!(parse("monday 10:00"), ist(2026, 2, 16, 10, 0));
        assert_eq!(parse("sunday at 8am"), ist(2026, 2, 15, 8, 0));
    }

    #[test]
    fn test_parse_weekday_with_time_today_counts_when_ahead() {
        assert_eq!(parse("wednesday 2pm"), ist(2026, 2, 11, 14, 0));
        assert_eq!(parse("wednesday 9am"), ist(2026, 2, 18, 9, 0));
    }

    #[test]
    fn test_parse_standalone_weekday_never_today() {
        assert_eq!(parse("friday"), ist(2026, 2, 13, 0, 0));
        assert_eq!(parse("sun"), ist(2026, 2, 15, 0, 0));
        assert_eq!(parse("wednesday"), ist(2026, 2, 18, 0, 0));
    }

    // ── month-day and time tests ────────────────────────────────────────

    #[test]
    fn test_parse_month_day() {
        assert_eq!(parse("mar 15"), ist(2026, 3, 15, 0, 0));
        assert_eq!(parse("march 15"), ist(2026, 3, 15, 0, 0));
        assert_eq!(parse("jan 1"), ist(2026, 1, 1, 0, 0));
        assert_eq!(parse("mar 15 2pm"), ist(2026, 3, 15, 14, 0));
        assert_eq!(parse("december 31 11:59pm"), ist(2026, 12, 31, 23, 59));
    }

    #[test]
    fn test_parse_month_day_rejects_impossible_date() {
        assert!(parse_datetime("feb 30", &anchor()).is_err());
    }

    #[test]
    fn test_parse_time_only() {
        assert_eq!(parse("5pm"), ist(2026, 2, 11, 17, 0));
        assert_eq!(parse("3:30pm"), ist(2026, 2, 11, 15, 30));
        assert_eq!(parse("12am"), ist(2026, 2, 11, 0, 0));
        assert_eq!(parse("12pm"), ist(2026, 2, 11, 12, 0));
        assert_eq!(parse("9:30"), ist(2026, 2, 11, 9, 30));
        assert_eq!(parse("23:59"), ist(2026, 2, 11, 23, 59));
        assert_eq!(parse("5 PM"), ist(2026, 2, 11, 17, 0));
    }

    #[test]
    fn test_parse_clock_time_ranges() {
        assert!(matches!(parse_clock_time("13pm"), Err(CaltextError::InvalidTime(_))));
        assert!(matches!(parse_clock_time("0am"), Err(CaltextError::InvalidTime(_))));
        assert!(matches!(parse_clock_time("24:00"), Err(CaltextError::InvalidTime(_))));
        assert!(matches!(parse_clock_time("9:60"), Err(CaltextError::InvalidTime(_))));
        assert!(matches!(parse_clock_time("17"), Err(CaltextError::DateParse(_))));
        assert!(matches!(parse_clock_time("noonish"), Err(CaltextError::DateParse(_))));
    }

    // ── fixed format tests ──────────────────────────────────────────────

    #[test]
    fn test_parse_fixed_formats() {
        assert_eq!(parse("2026-03-15"), ist(2026, 3, 15, 0, 0));
        assert_eq!(parse("2026-03-15 14:30"), ist(2026, 3, 15, 14, 30));
        assert_eq!(parse("2026-03-15T14:30"), ist(2026, 3, 15, 14, 30));
        assert_eq!(parse("2026-03-15T14:30:00"), ist(2026, 3, 15, 14, 30));
        assert_eq!(parse("03/15/2026"), ist(2026, 3, 15, 0, 0));
        assert_eq!(parse("Jan 15, 2026"), ist(2026, 1, 15, 0, 0));
        assert_eq!(parse("January 15, 2026"), ist(2026, 1, 15, 0, 0));
        assert_eq!(parse("2026-03-15 2:30PM"), ist(2026, 3, 15, 14, 30));
        assert_eq!(parse("15 Mar 2026"), ist(2026, 3, 15, 0, 0));
    }

    #[test]
    fn test_parse_rfc3339_keeps_its_offset() {
        let result = parse("2026-03-15T14:30:00Z");
        assert_eq!(result.with_timezone(&Utc), Utc.with_ymd_and_hms(2026, 3, 15, 14, 30, 0).unwrap());
        assert_eq!(result.to_rfc3339(), "2026-03-15T14:30:00+00:00");

        let result = parse("2026-03-15T09:00:00-05:00");
        assert_eq!(result.offset().local_minus_utc(), -5 * 3600);
        assert_eq!(result.to_rfc3339(), "2026-03-15T09:00:00-05:00");
    }

    #[test]
    fn test_parse_relative_input_takes_reference_offset() {
        assert_eq!(parse("tomorrow").offset().local_minus_utc(), 5 * 3600 + 1800);
        assert_eq!(parse("2026-03-15 14:30").to_rfc3339(), "2026-03-15T14:30:00+05:30");
    }

    #[test]
    fn test_parse_date_token_with_time_token() {
        assert_eq!(parse("2026-03-15 5pm"), ist(2026, 3, 15, 17, 0));
        assert_eq!(parse("03/15/2026 9am"), ist(2026, 3, 15, 9, 0));
    }

    #[test]
    fn test_parse_case_and_whitespace_insensitive() {
        assert_eq!(parse("  TOMORROW   At 3PM "), ist(2026, 2, 12, 15, 0));
        assert_eq!(parse("Next Friday"), ist(2026, 2, 13, 0, 0));
    }

    // ── timezone tests ──────────────────────────────────────────────────

    #[test]
    fn test_parse_in_named_zone() {
        let anchor = Utc.with_ymd_and_hms(2026, 2, 11, 23, 30, 0).unwrap();
        // 23:30 UTC is already Feb 12 in Tokyo
        let result = parse_datetime_in(anchor, "today", "Asia/Tokyo").unwrap();
        assert_eq!(result.to_rfc3339(), "2026-02-12T00:00:00+09:00");
    }

    #[test]
    fn test_parse_in_invalid_zone() {
        let anchor = Utc.with_ymd_and_hms(2026, 2, 11, 0, 0, 0).unwrap();
        let err = parse_datetime_in(anchor, "today", "Mars/Olympus").unwrap_err();
        assert!(matches!(err, CaltextError::InvalidTimezone(_)));
    }

    #[test]
    fn test_parse_half_hour_zone_keeps_offset() {
        let result = parse("tomorrow 9am");
        assert_eq!(result.to_rfc3339(), "2026-02-12T09:00:00+05:30");
    }

    // ── error tests ─────────────────────────────────────────────────────

    #[test]
    fn test_parse_invalid_inputs() {
        for input in ["", "   ", "not-a-date", "gibberish foo bar", "in many days", "next invalid"] {
            assert!(parse_datetime(input, &anchor()).is_err(), "input {input:?}");
        }
    }

    #[test]
    fn test_parse_out_of_range_time_reports_time_error() {
        for input in ["25:00", "99:99", "13pm"] {
            let err = parse_datetime(input, &anchor()).unwrap_err();
            assert!(matches!(err, CaltextError::InvalidTime(_)), "input {input:?}: {err}");
        }
    }

    #[test]
    fn test_parse_error_lists_examples() {
        let err = parse_datetime("whenever", &anchor()).unwrap_err().to_string();
        assert!(err.contains("'whenever'"), "got: {err}");
        assert!(err.contains("tomorrow 2pm"), "got: {err}");
        assert!(err.starts_with("Could not parse date: "), "got: {err}");
    }

    // ── display helper tests ────────────────────────────────────────────

    #[test]
    fn test_format_duration() {
        let start = ist(2026, 2, 11, 9, 0);
        assert_eq!(format_duration(&start, &ist(2026, 2, 11, 10, 30), false), "1h 30m");
        assert_eq!(format_duration(&start, &ist(2026, 2, 11, 11, 0), false), "2h");
        assert_eq!(format_duration(&start, &ist(2026, 2, 11, 9, 45), false), "45m");
        assert_eq!(format_duration(&start, &start, false), "0m");

        let day = ist(2026, 2, 11, 0, 0);
        assert_eq!(format_duration(&day, &ist(2026, 2, 12, 0, 0), true), "All Day");
        assert_eq!(format_duration(&day, &ist(2026, 2, 14, 0, 0), true), "3 days");
    }

    #[test]
    fn test_format_time_range() {
        let start = ist(2026, 2, 11, 9, 0);
        assert_eq!(format_time_range(&start, &ist(2026, 2, 11, 10, 0), false), "09:00 - 10:00");
        assert_eq!(
            format_time_range(&start, &ist(2026, 2, 12, 10, 0), false),
            "Feb 11 09:00 - Feb 12 10:00"
        );

        let day = ist(2026, 2, 11, 0, 0);
        assert_eq!(format_time_range(&day, &ist(2026, 2, 12, 0, 0), true), "All Day");
        assert_eq!(format_time_range(&day, &ist(2026, 2, 14, 0, 0), true), "Feb 11 - Feb 14");
    }

    // ── properties ──────────────────────────────────────────────────────

    proptest! {
        #[test]
        fn prop_in_n_hours_is_elapsed_time(n in 1i64..10_000) {
            let now = anchor();
            let result = parse_datetime(&format!("in {n} hours"), &now).unwrap();
            prop_assert_eq!(result, now + TimeDelta::hours(n));
        }

        #[test]
        fn prop_in_n_days_moves_calendar_date(n in 1u64..3_000) {
            let now = anchor();
            let result = parse_datetime(&format!("in {n} days"), &now).unwrap();
            prop_assert_eq!(result.date_naive(), now.date_naive() + Days::new(n));
            prop_assert_eq!(result.time(), now.time());
        }

        #[test]
        fn prop_ago_mirrors_in(n in 1i64..1_000) {
            let now = anchor();
            let later = parse_datetime(&format!("in {n} minutes"), &now).unwrap();
            let earlier = parse_datetime(&format!("{n} minutes ago"), &now).unwrap();
            prop_assert_eq!(later.signed_duration_since(now), now.signed_duration_since(earlier));
        }
    }
}
