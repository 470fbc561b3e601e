//! CSV and JSON interchange of event records.
//!
//! Both formats share one flat field set: id, title, start, end, all-day,
//! calendar, location, notes, url, status, recurring, timezone. Timestamps
//! are RFC 3339. Recurrence rules and alerts are not carried; the
//! `Recurring` column is informational and ignored on import.
//!
//! Import is row-oriented. With [`RowPolicy::Abort`] the first bad row fails
//! the whole call; with [`RowPolicy::Skip`] bad rows are collected next to
//! the good records.

use chrono::{DateTime, FixedOffset, SecondsFormat};
use csv::StringRecord;
use serde::{Deserialize, Serialize};

use crate::error::{CaltextError, Result};
use crate::event::{EventRecord, EventStatus};

/// Header row written on export and expected on import.
pub const CSV_HEADER: [&str; 12] = [
    "ID", "Title", "Start", "End", "AllDay", "Calendar", "Location", "Notes", "URL", "Status",
    "Recurring", "Timezone",
];

/// What to do with a row that fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowPolicy {
    /// Fail the whole import on the first bad row.
    #[default]
    Abort,
    /// Keep going and report bad rows alongside the good records.
    Skip,
}

/// Outcome of a row-oriented import.
#[derive(Debug, Default)]
pub struct TabularImport {
    pub records: Vec<EventRecord>,
    /// Bad rows as `(row, error)`.
    pub errors: Vec<(usize, CaltextError)>,
}

impl TabularImport {
    fn accept(&mut self, row: usize, outcome: Result<EventRecord>, policy: RowPolicy) -> Result<()> {
        match (outcome, policy) {
            (Ok(record), _) => self.records.push(record),
            (Err(err), RowPolicy::Abort) => return Err(err),
            (Err(err), RowPolicy::Skip) => {
                tracing::warn!(row, error = %err, "skipping row");
                self.errors.push((row, err));
            }
        }
        Ok(())
    }
}

// ── CSV ─────────────────────────────────────────────────────────────────────

/// Write records as CSV with the [`CSV_HEADER`] columns.
///
/// # Errors
///
/// Returns [`CaltextError::MalformedTable`] if the writer fails.
pub fn encode_csv(events: &[EventRecord]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(CSV_HEADER).map_err(table_error)?;

    for e in events {
        let start = format_timestamp(&e.start);
        let end = format_timestamp(&e.end);
        writer
            .write_record([
                e.id.as_str(),
                e.title.as_str(),
                start.as_str(),
                end.as_str(),
                bool_str(e.all_day),
                e.calendar.as_deref().unwrap_or_default(),
                e.location.as_deref().unwrap_or_default(),
                e.notes.as_deref().unwrap_or_default(),
                e.url.as_deref().unwrap_or_default(),
                e.status.as_str(),
                bool_str(e.is_recurring()),
                e.time_zone.as_deref().unwrap_or_default(),
            ])
            .map_err(table_error)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| CaltextError::MalformedTable(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| CaltextError::MalformedTable(e.to_string()))
}

/// Read CSV records, failing on the first bad row.
///
/// # Errors
///
/// Returns [`CaltextError::MalformedTable`] for unreadable CSV or a file
/// with no data rows, and [`CaltextError::MalformedRow`] for the first row
/// with a blank title or a missing or invalid start or end.
pub fn decode_csv(input: &str) -> Result<Vec<EventRecord>> {
    decode_csv_with_policy(input, RowPolicy::Abort).map(|import| import.records)
}

/// Read CSV records under the given [`RowPolicy`].
///
/// Columns are located by header name, so their order does not matter and
/// unknown columns are ignored. Rows are numbered by their line in the file;
/// the header is line 1.
///
/// # Errors
///
/// As [`decode_csv`]; under [`RowPolicy::Skip`] row errors are returned in
/// [`TabularImport::errors`] instead.
pub fn decode_csv_with_policy(input: &str, policy: RowPolicy) -> Result<TabularImport> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(input.as_bytes());
    let headers = reader.headers().map_err(table_error)?.clone();

    let mut import = TabularImport::default();
    let mut rows = 0usize;
    for result in reader.records() {
        let record = result.map_err(table_error)?;
        rows += 1;
        let row = record
            .position()
            .and_then(|p| usize::try_from(p.line()).ok())
            .unwrap_or(rows + 1);
        import.accept(row, csv_row_to_event(&record, &headers, row), policy)?;
    }

    if rows == 0 {
        return Err(CaltextError::MalformedTable(
            "CSV has no data rows".to_string(),
        ));
    }
    tracing::debug!(records = import.records.len(), skipped = import.errors.len(), "decoded csv");
    Ok(import)
}

fn csv_row_to_event(record: &StringRecord, headers: &StringRecord, row: usize) -> Result<EventRecord> {
    let col = |name: &str| column(record, headers, name);

    let start = col("Start");
    let end = col("End");
    if start.is_empty() || end.is_empty() {
        return Err(row_error(row, "missing Start or End"));
    }

    let fields = RowFields {
        id: col("ID"),
        title: col("Title"),
        start: parse_timestamp(start).ok_or_else(|| row_error(row, &format!("invalid Start '{start}'")))?,
        end: parse_timestamp(end).ok_or_else(|| row_error(row, &format!("invalid End '{end}'")))?,
        all_day: parse_bool(col("AllDay")),
        calendar: col("Calendar"),
        calendar_id: "",
        location: col("Location"),
        notes: col("Notes"),
        url: col("URL"),
        status: col("Status").parse().unwrap_or_default(),
        time_zone: col("Timezone"),
    };
    fields.into_record(row)
}

/// The named column of `record`, or `""` when the header lacks it.
fn column<'r>(record: &'r StringRecord, headers: &StringRecord, name: &str) -> &'r str {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .and_then(|i| record.get(i))
        .unwrap_or_default()
}

// ── JSON ────────────────────────────────────────────────────────────────────

/// JSON shape of one event.
#[derive(Debug, Serialize, Deserialize)]
struct EventExport {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    start_date: String,
    #[serde(default)]
    end_date: String,
    #[serde(default)]
    all_day: bool,
    #[serde(default)]
    calendar: String,
    #[serde(default)]
    calendar_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    location: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    notes: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    url: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    recurring: bool,
    #[serde(default, rename = "timezone", skip_serializing_if = "String::is_empty")]
    time_zone: String,
}

impl From<&EventRecord> for EventExport {
    fn from(e: &EventRecord) -> Self {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        Self {
            id: e.id.clone(),
            title: e.title.clone(),
            start_date: format_timestamp(&e.start),
            end_date: format_timestamp(&e.end),
            all_day: e.all_day,
            calendar: text(&e.calendar),
            calendar_id: text(&e.calendar_id),
            location: text(&e.location),
            notes: text(&e.notes),
            url: text(&e.url),
            status: e.status.as_str().to_string(),
            recurring: e.is_recurring(),
            time_zone: text(&e.time_zone),
        }
    }
}

/// Write records as a pretty-printed JSON array with a trailing newline.
///
/// # Errors
///
/// Returns [`CaltextError::MalformedTable`] if serialization fails.
pub fn encode_json(events: &[EventRecord]) -> Result<String> {
    let export: Vec<EventExport> = events.iter().map(EventExport::from).collect();
    let mut out = serde_json::to_string_pretty(&export).map_err(|e| CaltextError::MalformedTable(e.to_string()))?;
    out.push('\n');
    Ok(out)
}

/// Read a JSON array of events, failing on the first bad element.
///
/// # Errors
///
/// Returns [`CaltextError::MalformedTable`] when the text is not a JSON
/// array, and [`CaltextError::MalformedRow`] (1-based element index) for an
/// element that is not an event object, has a missing or invalid date, a
/// blank title, or an end before its start.
pub fn decode_json(input: &str) -> Result<Vec<EventRecord>> {
    decode_json_with_policy(input, RowPolicy::Abort).map(|import| import.records)
}

/// Read a JSON array of events under the given [`RowPolicy`].
///
/// # Errors
///
/// As [`decode_json`]; under [`RowPolicy::Skip`] element errors are returned
/// in [`TabularImport::errors`] instead.
pub fn decode_json_with_policy(input: &str, policy: RowPolicy) -> Result<TabularImport> {
    let elements: Vec<serde_json::Value> =
        serde_json::from_str(input).map_err(|e| CaltextError::MalformedTable(format!("invalid JSON: {e}")))?;

    let mut import = TabularImport::default();
    for (i, value) in elements.into_iter().enumerate() {
        let row = i + 1;
        import.accept(row, json_record(value, row), policy)?;
    }
    tracing::debug!(records = import.records.len(), skipped = import.errors.len(), "decoded json");
    Ok(import)
}

/// Turn one array element into a record. Every failure is a row error.
fn json_record(value: serde_json::Value, row: usize) -> Result<EventRecord> {
    let e = EventExport::deserialize(value).map_err(|err| row_error(row, &format!("invalid event: {err}")))?;
    if e.start_date.trim().is_empty() || e.end_date.trim().is_empty() {
        return Err(row_error(row, "missing start_date or end_date"));
    }
    let start = parse_timestamp(&e.start_date)
        .ok_or_else(|| row_error(row, &format!("invalid start_date '{}'", e.start_date)))?;
    let end = parse_timestamp(&e.end_date)
        .ok_or_else(|| row_error(row, &format!("invalid end_date '{}'", e.end_date)))?;

    RowFields {
        id: &e.id,
        title: &e.title,
        start,
        end,
        all_day: e.all_day,
        calendar: &e.calendar,
        calendar_id: &e.calendar_id,
        location: &e.location,
        notes: &e.notes,
        url: &e.url,
        status: e.status.parse().unwrap_or_default(),
        time_zone: &e.time_zone,
    }
    .into_record(row)
}

// ── Shared row handling ─────────────────────────────────────────────────────

/// Flat fields of one row, before validation.
struct RowFields<'a> {
    id: &'a str,
    title: &'a str,
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
    all_day: bool,
    calendar: &'a str,
    calendar_id: &'a str,
    location: &'a str,
    notes: &'a str,
    url: &'a str,
    status: EventStatus,
    time_zone: &'a str,
}

impl RowFields<'_> {
    fn into_record(self, row: usize) -> Result<EventRecord> {
        if self.title.trim().is_empty() {
            return Err(row_error(row, "missing Title"));
        }

        let mut record = EventRecord::new(self.title, self.start, self.all_day);
        record.id = self.id.to_string();
        record.end = self.end;
        record.calendar = optional(self.calendar);
        record.calendar_id = optional(self.calendar_id);
        record.location = optional(self.location);
        record.notes = optional(self.notes);
        record.url = optional(self.url);
        record.status = self.status;
        record.time_zone = optional(self.time_zone);

        record.validate().map_err(|e| row_error(row, &e.to_string()))?;
        Ok(record)
    }
}

fn optional(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

fn row_error(row: usize, reason: &str) -> CaltextError {
    CaltextError::MalformedRow {
        row,
        reason: reason.to_string(),
    }
}

fn table_error(err: csv::Error) -> CaltextError {
    CaltextError::MalformedTable(err.to_string())
}

fn format_timestamp(dt: &DateTime<FixedOffset>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s.trim()).ok()
}

fn bool_str(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

/// Loose boolean: `true`, `t`, `1`, `yes` in any case; anything else is false.
fn parse_bool(s: &str) -> bool {
    matches!(s.trim().to_lowercase().as_str(), "true" | "t" | "1" | "yes")
}

// ── Tests ───────────────────────────────────────────────────────────────────
