//! Alert lead times and iCalendar `TRIGGER` durations.
//!
//! Two small grammars live here:
//!
//! - **Alert shorthand** as typed on the command line: `15m`, `1h`, `2days`.
//!   The result is unsigned; callers turn it into "before the event" with
//!   [`parse_alert`] or [`Alert::before`].
//! - **Trigger durations** as found in `VALARM` blocks:
//!   `[-|+]P(<n>W | <n>D[T...] | T[<n>H][<n>M][<n>S])`.

use chrono::TimeDelta;

use crate::error::{CaltextError, Result};
use crate::event::Alert;

// ── Alert shorthand ─────────────────────────────────────────────────────────

/// Parse an alert lead time such as `15m`, `90min`, `1h`, `2hours`, `1d`.
///
/// Case-insensitive and trimmed. The number and unit must be adjacent.
///
/// # Errors
///
/// Returns [`CaltextError::InvalidDuration`] for empty input, a missing or
/// unknown unit, or an amount that does not fit in a duration.
///
/// # Examples
///
/// ```
/// use caltext::duration::parse_alert_duration;
/// use chrono::TimeDelta;
///
/// assert_eq!(parse_alert_duration("15m").unwrap(), TimeDelta::minutes(15));
/// assert!(parse_alert_duration("2 hours").is_err());
/// ```
pub fn parse_alert_duration(s: &str) -> Result<TimeDelta> {
    let s = s.trim().to_lowercase();
    if s.is_empty() {
        return Err(CaltextError::InvalidDuration(
            "empty alert duration".to_string(),
        ));
    }

    let invalid = || CaltextError::InvalidDuration(format!("'{s}' (use e.g. 15m, 1h, 1d)"));

    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(invalid)?;
    let (digits, unit) = s.split_at(split);
    if digits.is_empty() {
        return Err(invalid());
    }
    let n: i64 = digits.parse().map_err(|_| invalid())?;

    let delta = match unit {
        "m" | "min" | "mins" | "minute" | "minutes" => TimeDelta::try_minutes(n),
        "h" | "hour" | "hours" => TimeDelta::try_hours(n),
        "d" | "day" | "days" => TimeDelta::try_days(n),
        _ => None,
    };
    delta.ok_or_else(invalid)
}

/// Parse alert shorthand into an [`Alert`] that fires before the event.
pub fn parse_alert(s: &str) -> Result<Alert> {
    parse_alert_duration(s).map(Alert::before)
}

// ── Trigger durations ───────────────────────────────────────────────────────

/// Parse a `TRIGGER` duration value into a signed duration.
///
/// Accepts `-PT15M`, `-PT1H30M`, `-P1D`, `-P1DT2H`, `-P1W`, `PT0M`, `+PT5M`.
/// The week form stands alone; otherwise an optional day component may be
/// followed by `T` and at least one of hours, minutes and seconds, in that
/// order.
///
/// # Errors
///
/// Returns [`CaltextError::InvalidDuration`] when the `P` marker is missing,
/// a component has no digits, components are out of order, or `T` has no
/// component after it.
pub fn parse_trigger(value: &str) -> Result<TimeDelta> {
    let upper = value.trim().to_ascii_uppercase();
    let invalid = |why: &str| CaltextError::InvalidDuration(format!("'{value}': {why}"));

    let (negative, rest) = if let Some(r) = upper.strip_prefix('-') {
        (true, r)
    } else if let Some(r) = upper.strip_prefix('+') {
        (false, r)
    } else {
        (false, upper.as_str())
    };

    let body = rest.strip_prefix('P').ok_or_else(|| invalid("missing P"))?;

    let total = if let Some(weeks) = body.strip_suffix('W') {
        parse_component(weeks)
            .and_then(TimeDelta::try_weeks)
            .ok_or_else(|| invalid("bad week count"))?
    } else {
        let (date_part, time_part) = match body.split_once('T') {
            Some((date, time)) => (date, Some(time)),
            None => (body, None),
        };

        let mut total = TimeDelta::zero();
        if !date_part.is_empty() {
            total = date_part
                .strip_suffix('D')
                .and_then(parse_component)
                .and_then(TimeDelta::try_days)
                .ok_or_else(|| invalid("bad day count"))?;
        }

        match time_part {
            Some("") => return Err(invalid("T without a time component")),
            Some(time) => {
                let clock = parse_time_components(time).ok_or_else(|| invalid("bad time part"))?;
                total = total.checked_add(&clock).ok_or_else(|| invalid("out of range"))?;
            }
            None if date_part.is_empty() => return Err(invalid("no duration components")),
            None => {}
        }
        total
    };

    Ok(if negative { -total } else { total })
}

/// Render an alert offset as a `TRIGGER` value: `-PT<minutes>M`.
pub fn format_trigger(offset: &TimeDelta) -> String {
    format!("-PT{}M", offset.num_minutes().abs())
}

/// Parse a bare non-negative integer component.
fn parse_component(s: &str) -> Option<i64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Parse the part after `T`: `1H30M`, `45M`, `30S`, `2H15M10S`.
fn parse_time_components(s: &str) -> Option<TimeDelta> {
    let mut total = TimeDelta::zero();
    let mut digits = String::new();
    // 0 = nothing yet, 1 = hours seen, 2 = minutes seen, 3 = seconds seen
    let mut last_rank = 0;

    for c in s.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let (rank, part) = match c {
            'H' => (1, TimeDelta::try_hours(digits.parse().ok()?)?),
            'M' => (2, TimeDelta::try_minutes(digits.parse().ok()?)?),
            'S' => (3, TimeDelta::try_seconds(digits.parse().ok()?)?),
            _ => return None,
        };
        if rank <= last_rank {
            return None;
        }
        last_rank = rank;
        total = total.checked_add(&part)?;
        digits.clear();
    }

    if !digits.is_empty() || last_rank == 0 {
        return None;
    }
    Some(total)
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── alert shorthand ─────────────────────────────────────────────────

    #[test]
    fn test_alert_minutes() {
        assert_eq!(parse_alert_duration("15m").unwrap(), TimeDelta::minutes(15));
        assert_eq!(parse_alert_duration("30min").unwrap(), TimeDelta::minutes(30));
        assert_eq!(parse_alert_duration("5mins").unwrap(), TimeDelta::minutes(5));
        assert_eq!(parse_alert_duration("1minute").unwrap(), TimeDelta::minutes(1));
        assert_eq!(parse_alert_duration("10minutes").unwrap(), TimeDelta::minutes(10));
    }

    #[test]
    fn test_alert_hours_and_days() {
        assert_eq!(parse_alert_duration("1h").unwrap(), TimeDelta::hours(1));
        assert_eq!(parse_alert_duration("2hours").unwrap(), TimeDelta::hours(2));
        assert_eq!(parse_alert_duration("1d").unwrap(), TimeDelta::days(1));
        assert_eq!(parse_alert_duration("3days").unwrap(), TimeDelta::days(3));
    }

    #[test]
    fn test_alert_case_and_whitespace() {
        assert_eq!(parse_alert_duration("  15M ").unwrap(), TimeDelta::minutes(15));
        assert_eq!(parse_alert_duration("1H").unwrap(), TimeDelta::hours(1));
    }

    #[test]
    fn test_alert_invalid() {
        for input in ["", "abc", "15", "m", "15x", "1 h", "-5m", "1.5h", "2weeks"] {
            let err = parse_alert_duration(input).unwrap_err();
            assert!(matches!(err, CaltextError::InvalidDuration(_)), "input {input:?}");
        }
    }

    #[test]
    fn test_parse_alert_is_before_event() {
        let alert = parse_alert("15m").unwrap();
        assert_eq!(alert.relative_offset, TimeDelta::minutes(-15));
    }

    // ── trigger grammar ─────────────────────────────────────────────────

    #[test]
    fn test_trigger_common_forms() {
        assert_eq!(parse_trigger("-PT15M").unwrap(), TimeDelta::minutes(-15));
        assert_eq!(parse_trigger("-PT1H").unwrap(), TimeDelta::hours(-1));
        assert_eq!(parse_trigger("-PT1H30M").unwrap(), TimeDelta::minutes(-90));
        assert_eq!(parse_trigger("-P1D").unwrap(), TimeDelta::days(-1));
        assert_eq!(parse_trigger("-P1DT2H").unwrap(), TimeDelta::hours(-26));
        assert_eq!(parse_trigger("-P1W").unwrap(), TimeDelta::days(-7));
    }

    #[test]
    fn test_trigger_zero_and_seconds() {
        assert_eq!(parse_trigger("-PT0M").unwrap(), TimeDelta::zero());
        assert_eq!(parse_trigger("-PT30S").unwrap(), TimeDelta::seconds(-30));
        assert_eq!(
            parse_trigger("PT2H15M10S").unwrap(),
            TimeDelta::seconds(2 * 3600 + 15 * 60 + 10)
        );
    }

    #[test]
    fn test_trigger_positive_forms() {
        assert_eq!(parse_trigger("PT5M").unwrap(), TimeDelta::minutes(5));
        assert_eq!(parse_trigger("+PT5M").unwrap(), TimeDelta::minutes(5));
        assert_eq!(parse_trigger("P1DT2H30M").unwrap(), TimeDelta::minutes(26 * 60 + 30));
    }

    #[test]
    fn test_trigger_invalid() {
        for input in [
            "", "PT", "P", "-15M", "-PTM", "-PT15", "-PXM", "-P1WT1H", "-PT30M1H", "-P1H",
            "-PDT1H", "-PT1H1H",
        ] {
            let err = parse_trigger(input).unwrap_err();
            assert!(matches!(err, CaltextError::InvalidDuration(_)), "input {input:?}");
        }
    }

    #[test]
    fn test_format_trigger() {
        assert_eq!(format_trigger(&TimeDelta::minutes(-15)), "-PT15M");
        assert_eq!(format_trigger(&TimeDelta::hours(-26)), "-PT1560M");
        assert_eq!(format_trigger(&TimeDelta::zero()), "-PT0M");
    }

    #[test]
    fn test_format_then_parse_trigger() {
        let offset = TimeDelta::minutes(-45);
        assert_eq!(parse_trigger(&format_trigger(&offset)).unwrap(), offset);
    }
}
