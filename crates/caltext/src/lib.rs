//! # caltext
//!
//! Textual formats for calendar tools.
//!
//! caltext turns the text a calendar command line deals with into typed
//! values and back: free-form dates typed by users, alert lead times,
//! recurrence rules, and whole events exchanged as iCalendar, CSV or JSON.
//! Every operation is a pure function of its inputs; "now" is always passed
//! in explicitly.
//!
//! ## Modules
//!
//! - [`datetime`]: free-form date/time strings ("eow", "next friday at 3pm") → instants
//! - [`duration`]: alert shorthand (`15m`) and iCalendar `TRIGGER` durations
//! - [`recurrence`]: `RRULE` codec, rule builders, descriptions and occurrence previews
//! - [`event`]: the event record shared by all codecs
//! - [`ics`]: iCalendar import/export
//! - [`tabular`]: CSV and JSON import/export
//! - [`error`]: Error types

pub mod datetime;
pub mod duration;
pub mod error;
pub mod event;
pub mod ics;
pub mod recurrence;
pub mod tabular;

pub use datetime::{
    format_duration, format_time_range, parse_clock_time, parse_datetime, parse_datetime_in,
    parse_datetime_with_options, parse_timezone, Instant, ParseOptions,
};
pub use duration::{format_trigger, parse_alert, parse_alert_duration, parse_trigger};
pub use error::CaltextError;
pub use event::{default_end, Alert, EventRecord, EventStatus};
pub use ics::{
    decode_ics, decode_ics_with_options, encode_ics, encode_ics_with_options, escape_text,
    unescape_text, unfold_lines, IcsOptions,
};
pub use recurrence::{
    parse_frequency, parse_rrule, parse_weekday_list, DayOfWeek, Frequency, RecurrenceEnd,
    RecurrenceRule,
};
pub use tabular::{
    decode_csv, decode_csv_with_policy, decode_json, decode_json_with_policy, encode_csv,
    encode_json, RowPolicy, TabularImport, CSV_HEADER,
};
