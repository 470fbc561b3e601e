use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use caltext::{
    decode_csv_with_policy, decode_ics, decode_json_with_policy, encode_csv, encode_ics,
    encode_json, format_trigger, parse_alert, parse_datetime_in, parse_rrule, parse_trigger,
    EventRecord, RowPolicy,
};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "caltext", version, about = "Calendar text formats: dates, rules, triggers and event files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a free-form date such as "next friday at 3pm" to RFC 3339
    ParseDate {
        /// Text to resolve
        input: String,
        /// IANA zone the text is interpreted in
        #[arg(long, default_value = "UTC")]
        tz: String,
        /// Reference instant (RFC 3339); defaults to the current time
        #[arg(long)]
        now: Option<String>,
    },
    /// Convert events between iCalendar, CSV and JSON
    Convert {
        /// Input file (reads stdin if omitted)
        input: Option<PathBuf>,
        /// Input format; inferred from the file extension when omitted
        #[arg(long)]
        from: Option<Format>,
        /// Output format
        #[arg(long)]
        to: Format,
        /// Output file (writes stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Skip malformed CSV/JSON rows instead of failing
        #[arg(long)]
        skip_bad_rows: bool,
    },
    /// Describe an RRULE value and optionally list its first occurrences
    DescribeRule {
        /// RRULE value, with or without the "RRULE:" prefix
        rule: String,
        /// First occurrence (RFC 3339); required to list occurrences
        #[arg(long)]
        start: Option<String>,
        /// Number of occurrences to list
        #[arg(long, default_value_t = 5)]
        count: u16,
    },
    /// Normalize an alert lead time ("15m") or TRIGGER value ("-PT1H") to minutes
    Trigger {
        /// Alert shorthand or TRIGGER value
        #[arg(allow_hyphen_values = true)]
        value: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Ics,
    Csv,
    Json,
}

impl Format {
    fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "ics" | "ical" => Some(Format::Ics),
            "csv" => Some(Format::Csv),
            "json" => Some(Format::Json),
            _ => None,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::ParseDate { input, tz, now } => {
            let anchor = match now {
                Some(now) => parse_instant(&now, "--now")?,
                None => Utc::now(),
            };
            let resolved = parse_datetime_in(anchor, &input, &tz)?;
            println!("{}", resolved.to_rfc3339());
        }
        Commands::Convert {
            input,
            from,
            to,
            output,
            skip_bad_rows,
        } => {
            let from = match (from, input.as_deref()) {
                (Some(format), _) => format,
                (None, Some(path)) => Format::from_path(path).with_context(|| {
                    format!("cannot infer input format of {}; pass --from", path.display())
                })?,
                (None, None) => bail!("--from is required when reading stdin"),
            };
            let text = read_input(input.as_deref())?;
            let policy = if skip_bad_rows {
                RowPolicy::Skip
            } else {
                RowPolicy::Abort
            };
            let events = decode(&text, from, policy)?;
            let encoded = match to {
                Format::Ics => encode_ics(&events),
                Format::Csv => encode_csv(&events)?,
                Format::Json => encode_json(&events)?,
            };
            write_output(output.as_deref(), &encoded)?;
        }
        Commands::DescribeRule { rule, start, count } => {
            let rule = parse_rrule(&rule)?;
            println!("{}", rule.describe());
            if let Some(start) = start {
                let start = parse_instant(&start, "--start")?;
                for occurrence in rule.occurrences(start, count)? {
                    println!("{}", occurrence.to_rfc3339());
                }
            }
        }
        Commands::Trigger { value } => {
            let offset = if looks_like_trigger(&value) {
                parse_trigger(&value)?
            } else {
                parse_alert(&value)?.relative_offset
            };
            println!("{} minutes ({})", offset.num_minutes(), format_trigger(&offset));
        }
    }

    Ok(())
}

/// `RUST_LOG` when it is set and valid, `warn` otherwise.
fn log_filter(spec: Option<&str>) -> EnvFilter {
    spec.and_then(|spec| EnvFilter::try_new(spec).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"))
}

fn decode(text: &str, format: Format, policy: RowPolicy) -> Result<Vec<EventRecord>> {
    let import = match format {
        Format::Ics => return Ok(decode_ics(text)?),
        Format::Csv => decode_csv_with_policy(text, policy)?,
        Format::Json => decode_json_with_policy(text, policy)?,
    };
    for (row, err) in &import.errors {
        eprintln!("skipped row {row}: {err}");
    }
    Ok(import.records)
}

fn looks_like_trigger(value: &str) -> bool {
    let value = value.trim();
    let body = value.strip_prefix(['-', '+']).unwrap_or(value);
    body.starts_with(['P', 'p'])
}

fn parse_instant(s: &str, flag: &str) -> Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("{flag} must be an RFC 3339 timestamp, got '{s}'"))?;
    Ok(parsed.with_timezone(&Utc))
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            Ok(buf)
        }
    }
}

fn write_output(path: Option<&Path>, text: &str) -> Result<()> {
    match path {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(text.as_bytes())
                .context("failed to write stdout")?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter_defaults_to_warn() {
        assert_eq!(log_filter(None).max_level_hint(), Some(tracing::Level::WARN.into()));
        assert_eq!(
            log_filter(Some("caltext=loudest")).max_level_hint(),
            Some(tracing::Level::WARN.into())
        );
    }

    #[test]
    fn test_log_filter_honours_global_level() {
        assert_eq!(
            log_filter(Some("debug")).max_level_hint(),
            Some(tracing::Level::DEBUG.into())
        );
        assert_eq!(
            log_filter(Some("caltext=trace")).max_level_hint(),
            Some(tracing::Level::TRACE.into())
        );
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(Format::from_path(Path::new("a/b.ICS")), Some(Format::Ics));
        assert_eq!(Format::from_path(Path::new("rows.csv")), Some(Format::Csv));
        assert_eq!(Format::from_path(Path::new("notes.txt")), None);
    }
}
