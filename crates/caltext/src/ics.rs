//! iCalendar (RFC 5545 subset) import and export of event records.
//!
//! # Encoding
//!
//! [`encode_ics`] writes one `VCALENDAR` with a `VEVENT` per record. All-day
//! events use `VALUE=DATE` dates; timed events are written in UTC. Alerts
//! become `VALARM` blocks with a `-PT<minutes>M` trigger. Lines are not
//! folded on output.
//!
//! # Decoding
//!
//! [`decode_ics`] unfolds continuation lines, then walks them with a small
//! state machine (`Outside`, `InEvent`, `InAlarm`). Only the properties the
//! calendar tool round-trips are read; everything else is skipped. The first
//! malformed event aborts the whole document.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use uuid::Uuid;

use crate::datetime::localize;
use crate::duration::{format_trigger, parse_trigger};
use crate::error::{CaltextError, Result};
use crate::event::{default_end, Alert, EventRecord, EventStatus};
use crate::recurrence::{parse_rrule, RecurrenceRule};

const UTC_STAMP: &str = "%Y%m%dT%H%M%SZ";

// ── Options ─────────────────────────────────────────────────────────────────

/// Knobs for the iCalendar codec.
#[derive(Debug, Clone)]
pub struct IcsOptions {
    /// Zone used for date-only values and floating times without a `TZID`.
    pub floating_zone: Tz,
    /// `PRODID` written on export.
    pub product_id: String,
}

impl Default for IcsOptions {
    fn default() -> Self {
        Self {
            floating_zone: chrono_tz::UTC,
            product_id: "-//ical CLI//EN".to_string(),
        }
    }
}

// ── Text escaping ───────────────────────────────────────────────────────────

/// Escape a TEXT value: backslash, semicolon, comma and newline.
#[must_use]
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

/// Reverse [`escape_text`]. `\N` is read as a newline too; unknown escapes
/// are kept verbatim.
#[must_use]
pub fn unescape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(';') => out.push(';'),
            Some(',') => out.push(','),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Join folded lines into logical lines, each tagged with the 1-based
/// physical line it started on.
///
/// A line starting with a space or tab continues the previous one; exactly
/// that one whitespace character is removed. Blank lines are dropped.
#[must_use]
pub fn unfold_lines(input: &str) -> Vec<(usize, String)> {
    let mut lines: Vec<(usize, String)> = Vec::new();

    for (i, line) in input.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        if let Some(continuation) = line.strip_prefix([' ', '\t']) {
            if let Some((_, prev)) = lines.last_mut() {
                prev.push_str(continuation);
            }
            continue;
        }
        lines.push((i + 1, line.to_string()));
    }

    lines
}

// ── Encode ──────────────────────────────────────────────────────────────────

/// Encode records as an iCalendar document with the default options.
pub fn encode_ics(events: &[EventRecord]) -> String {
    encode_ics_with_options(events, &IcsOptions::default())
}

/// Encode records as an iCalendar document.
pub fn encode_ics_with_options(events: &[EventRecord], options: &IcsOptions) -> String {
    let mut lines: Vec<String> = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        format!("PRODID:{}", options.product_id),
        "CALSCALE:GREGORIAN".to_string(),
    ];

    for event in events {
        encode_event(event, &mut lines);
    }

    lines.push("END:VCALENDAR".to_string());
    tracing::debug!(events = events.len(), "encoded ics");

    let mut out = lines.join("\r\n");
    out.push_str("\r\n");
    out
}

fn encode_event(event: &EventRecord, lines: &mut Vec<String>) {
    lines.push("BEGIN:VEVENT".to_string());
    lines.push(format!("UID:{}", event_uid(event)));

    if event.all_day {
        lines.push(format!("DTSTART;VALUE=DATE:{}", event.start.date_naive().format("%Y%m%d")));
        lines.push(format!("DTEND;VALUE=DATE:{}", event.end.date_naive().format("%Y%m%d")));
    } else {
        lines.push(format!("DTSTART:{}", event.start.with_timezone(&Utc).format(UTC_STAMP)));
        lines.push(format!("DTEND:{}", event.end.with_timezone(&Utc).format(UTC_STAMP)));
    }

    lines.push(format!("SUMMARY:{}", escape_text(&event.title)));
    if let Some(location) = non_empty(&event.location) {
        lines.push(format!("LOCATION:{}", escape_text(location)));
    }
    if let Some(notes) = non_empty(&event.notes) {
        lines.push(format!("DESCRIPTION:{}", escape_text(notes)));
    }
    if let Some(url) = non_empty(&event.url) {
        lines.push(format!("URL:{url}"));
    }
    if let Some(status) = status_to_ics(event.status) {
        lines.push(format!("STATUS:{status}"));
    }

    for rule in &event.recurrence_rules {
        lines.push(format!("RRULE:{rule}"));
    }

    for alert in &event.alerts {
        lines.push("BEGIN:VALARM".to_string());
        lines.push("ACTION:DISPLAY".to_string());
        lines.push(format!("DESCRIPTION:{}", escape_text(&event.title)));
        lines.push(format!("TRIGGER:{}", format_trigger(&alert.relative_offset)));
        lines.push("END:VALARM".to_string());
    }

    if let Some(created) = event.created {
        lines.push(format!("CREATED:{}", created.format(UTC_STAMP)));
    }
    if let Some(modified) = event.last_modified {
        lines.push(format!("LAST-MODIFIED:{}", modified.format(UTC_STAMP)));
    }

    lines.push("END:VEVENT".to_string());
}

/// The record id, or a name-based UUID of title and start when it has none.
fn event_uid(event: &EventRecord) -> String {
    if !event.id.is_empty() {
        return event.id.clone();
    }
    let name = format!("{}\n{}", event.title, event.start.to_rfc3339());
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn status_to_ics(status: EventStatus) -> Option<&'static str> {
    match status {
        EventStatus::None => None,
        EventStatus::Confirmed => Some("CONFIRMED"),
        EventStatus::Tentative => Some("TENTATIVE"),
        EventStatus::Canceled => Some("CANCELLED"),
    }
}

// ── Decode ──────────────────────────────────────────────────────────────────

/// Decode an iCalendar document with the default options.
///
/// # Errors
///
/// See [`decode_ics_with_options`].
pub fn decode_ics(input: &str) -> Result<Vec<EventRecord>> {
    decode_ics_with_options(input, &IcsOptions::default())
}

/// Decode every `VEVENT` in an iCalendar document, in document order.
///
/// # Errors
///
/// Returns [`CaltextError::MalformedDocument`] when an event lacks `SUMMARY`
/// or `DTSTART` or carries an unparsable date, and passes through
/// [`CaltextError::InvalidRule`] and [`CaltextError::InvalidDuration`] from
/// `RRULE` and `TRIGGER` values. Any error discards the whole document.
pub fn decode_ics_with_options(input: &str, options: &IcsOptions) -> Result<Vec<EventRecord>> {
    let mut events = Vec::new();
    let mut state = State::Outside;

    for (line_no, line) in unfold_lines(input) {
        state = match (state, marker(&line)) {
            (State::Outside, Some(Marker::BeginEvent)) => State::InEvent(PendingEvent::new(line_no)),
            (State::Outside, _) => State::Outside,

            (State::InEvent(_), Some(Marker::BeginEvent))
            | (State::InAlarm(_), Some(Marker::BeginEvent)) => {
                tracing::trace!(line = line_no, "VEVENT restarted before END:VEVENT");
                State::InEvent(PendingEvent::new(line_no))
            }
            (State::InEvent(pending), Some(Marker::EndEvent))
            | (State::InAlarm(pending), Some(Marker::EndEvent)) => {
                events.push(pending.finish()?);
                State::Outside
            }
            (State::InEvent(pending), Some(Marker::BeginAlarm)) => State::InAlarm(pending),
            (State::InAlarm(pending), Some(Marker::EndAlarm)) => State::InEvent(pending),

            (State::InEvent(mut pending), _) => {
                pending.capture(line_no, &line, options)?;
                State::InEvent(pending)
            }
            (State::InAlarm(mut pending), _) => {
                pending.capture_alarm(line_no, &line)?;
                State::InAlarm(pending)
            }
        };
    }

    if let State::InEvent(pending) | State::InAlarm(pending) = state {
        tracing::warn!(line = pending.begin_line, "dropping VEVENT without END:VEVENT");
    }

    tracing::debug!(events = events.len(), "decoded ics");
    Ok(events)
}

enum State {
    Outside,
    InEvent(PendingEvent),
    InAlarm(PendingEvent),
}

enum Marker {
    BeginEvent,
    EndEvent,
    BeginAlarm,
    EndAlarm,
}

fn marker(line: &str) -> Option<Marker> {
    let line = line.trim_end();
    let is = |m: &str| line.eq_ignore_ascii_case(m);
    if is("BEGIN:VEVENT") {
        Some(Marker::BeginEvent)
    } else if is("END:VEVENT") {
        Some(Marker::EndEvent)
    } else if is("BEGIN:VALARM") {
        Some(Marker::BeginAlarm)
    } else if is("END:VALARM") {
        Some(Marker::EndAlarm)
    } else {
        None
    }
}

/// A content line split into its name, parameters and value.
struct Property<'a> {
    name: String,
    params: Vec<(String, &'a str)>,
    value: &'a str,
}

impl<'a> Property<'a> {
    fn parse(line: &'a str) -> Option<Self> {
        let (key, value) = line.split_once(':')?;
        let mut segments = key.split(';');
        let name = segments.next()?.trim().to_ascii_uppercase();
        let params = segments
            .filter_map(|p| p.split_once('='))
            .map(|(k, v)| (k.trim().to_ascii_uppercase(), v.trim().trim_matches('"')))
            .collect();
        Some(Self {
            name,
            params,
            value,
        })
    }

    fn param(&self, name: &str) -> Option<&'a str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| *v)
    }
}

/// A `DTSTART`/`DTEND` value.
struct IcsTime {
    at: DateTime<FixedOffset>,
    date_only: bool,
    zone: Option<Tz>,
}

/// Fields collected between `BEGIN:VEVENT` and `END:VEVENT`.
#[derive(Default)]
struct PendingEvent {
    begin_line: usize,
    uid: Option<String>,
    summary: Option<String>,
    location: Option<String>,
    description: Option<String>,
    url: Option<String>,
    status: EventStatus,
    dtstart: Option<IcsTime>,
    dtend: Option<IcsTime>,
    rules: Vec<RecurrenceRule>,
    alerts: Vec<Alert>,
    created: Option<DateTime<Utc>>,
    last_modified: Option<DateTime<Utc>>,
}

impl PendingEvent {
    fn new(begin_line: usize) -> Self {
        Self {
            begin_line,
            ..Self::default()
        }
    }

    fn capture(&mut self, line_no: usize, line: &str, options: &IcsOptions) -> Result<()> {
        let Some(prop) = Property::parse(line) else {
            return Ok(());
        };
        tracing::trace!(line = line_no, property = %prop.name, "vevent property");

        match prop.name.as_str() {
            "UID" => self.uid = Some(prop.value.to_string()),
            "SUMMARY" => self.summary = Some(unescape_text(prop.value)),
            "LOCATION" => self.location = Some(unescape_text(prop.value)),
            "DESCRIPTION" => self.description = Some(unescape_text(prop.value)),
            "URL" => self.url = Some(prop.value.to_string()),
            "STATUS" => self.status = status_from_ics(prop.value),
            "RRULE" => self.rules.push(parse_rrule(prop.value)?),
            "DTSTART" => self.dtstart = Some(parse_ics_time(line_no, &prop, options)?),
            "DTEND" => self.dtend = Some(parse_ics_time(line_no, &prop, options)?),
            "CREATED" => self.created = parse_utc_stamp(prop.value),
            "LAST-MODIFIED" => self.last_modified = parse_utc_stamp(prop.value),
            _ => {}
        }
        Ok(())
    }

    fn capture_alarm(&mut self, line_no: usize, line: &str) -> Result<()> {
        if let Some(prop) = Property::parse(line) {
            if prop.name == "TRIGGER" {
                tracing::trace!(line = line_no, trigger = prop.value, "valarm trigger");
                self.alerts.push(Alert {
                    relative_offset: parse_trigger(prop.value)?,
                });
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<EventRecord> {
        let title = self
            .summary
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                CaltextError::MalformedDocument(format!(
                    "VEVENT at line {} missing SUMMARY",
                    self.begin_line
                ))
            })?;
        let start = self.dtstart.ok_or_else(|| {
            CaltextError::MalformedDocument(format!(
                "VEVENT '{title}' at line {} missing DTSTART",
                self.begin_line
            ))
        })?;

        let all_day = start.date_only;
        let end = self
            .dtend
            .map(|t| t.at)
            .unwrap_or_else(|| default_end(start.at, all_day));
        let time_zone = start.zone.map(|tz| tz.name().to_string());

        Ok(EventRecord {
            id: self.uid.unwrap_or_default(),
            title,
            start: start.at,
            end,
            all_day,
            calendar: None,
            calendar_id: None,
            location: self.location,
            notes: self.description,
            url: self.url,
            time_zone,
            status: self.status,
            alerts: self.alerts,
            recurrence_rules: self.rules,
            created: self.created,
            last_modified: self.last_modified,
        })
    }
}

/// Parse a `DTSTART`/`DTEND` property.
///
/// `VALUE=DATE` (or a bare 8-digit value) is a date; a trailing `Z` is UTC;
/// anything else is wall-clock time in the `TZID` zone when it names a known
/// zone, or in the floating zone.
fn parse_ics_time(line_no: usize, prop: &Property<'_>, options: &IcsOptions) -> Result<IcsTime> {
    let value = prop.value.trim();
    let invalid = || {
        CaltextError::MalformedDocument(format!("line {line_no}: invalid {} '{value}'", prop.name))
    };

    let zone = prop.param("TZID").and_then(|id| id.parse::<Tz>().ok());
    let tz = zone.unwrap_or(options.floating_zone);
    let date_only = prop
        .param("VALUE")
        .is_some_and(|v| v.eq_ignore_ascii_case("DATE"))
        || value.len() == 8;

    let at = if date_only {
        let date = NaiveDate::parse_from_str(value, "%Y%m%d").map_err(|_| invalid())?;
        localize(&tz, date.and_time(NaiveTime::MIN))
            .ok_or_else(invalid)?
            .fixed_offset()
    } else if let Some(stamp) = value.strip_suffix('Z') {
        NaiveDateTime::parse_from_str(stamp, "%Y%m%dT%H%M%S")
            .map_err(|_| invalid())?
            .and_utc()
            .fixed_offset()
    } else {
        let naive = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").map_err(|_| invalid())?;
        localize(&tz, naive).ok_or_else(invalid)?.fixed_offset()
    };

    Ok(IcsTime {
        at,
        date_only,
        zone,
    })
}

fn parse_utc_stamp(value: &str) -> Option<DateTime<Utc>> {
    let stamp = value.trim().strip_suffix('Z')?;
    NaiveDateTime::parse_from_str(stamp, "%Y%m%dT%H%M%S")
        .ok()
        .map(|dt| dt.and_utc())
}

fn status_from_ics(value: &str) -> EventStatus {
    match value.trim().to_ascii_uppercase().as_str() {
        "CONFIRMED" => EventStatus::Confirmed,
        "TENTATIVE" => EventStatus::Tentative,
        "CANCELLED" => EventStatus::Canceled,
        _ => EventStatus::None,
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
