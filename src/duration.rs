use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static DURATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*([+-]?)\s*(?:(\d+(?:\.\d+)?)\s*h)?\s*(?:(\d+(?:\.\d+)?)\s*m)?\s*(?:(\d+(?:\.\d+)?)\s*s)?\s*$",
    )
    .expect("duration pattern must compile")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    #[error("invalid duration format {input:?}: expected forms like +5h, -30m, 1h20m, 90s")]
    InvalidDurationFormat { input: String },
}

/// Renders a signed number of seconds as `1h 5m`, `4m 10s` or `7s`.
pub fn humanize_seconds(seconds: i64) -> String {
    let magnitude = seconds.unsigned_abs();
    let hours = magnitude / 3600;
    let minutes = (magnitude % 3600) / 60;
    let secs = magnitude % 60;

    let body = if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    };

    if seconds < 0 { format!("-{body}") } else { body }
}

/// Parses `+2h15m`, `-30m`, `1.5h`, `1h 20m 10s` and similar into signed seconds.
///
/// Components must appear in h, m, s order and at least one must be present.
/// Fractional totals are rounded half away from zero.
pub fn parse_duration_delta(text: &str) -> Result<i64, DurationError> {
    let invalid = || DurationError::InvalidDurationFormat {
        input: text.to_string(),
    };

    let captures = DURATION_PATTERN.captures(text).ok_or_else(invalid)?;
    let negative = captures.get(1).is_some_and(|sign| sign.as_str() == "-");

    let mut total = 0.0_f64;
    let mut matched_any = false;
    for (group, unit_seconds) in [(2, 3600.0), (3, 60.0), (4, 1.0)] {
        if let Some(component) = captures.get(group) {
            let value: f64 = component.as_str().parse().map_err(|_| invalid())?;
            total += value * unit_seconds;
            matched_any = true;
        }
    }

    if !matched_any {
        return Err(invalid());
    }

    let rounded = total.round();
    if !rounded.is_finite() || rounded >= i64::MAX as f64 {
        return Err(invalid());
    }
    let rounded = rounded as i64;
    Ok(if negative { -rounded } else { rounded })
}

/// Parses a daily goal. The sign is ignored, so `+2h` and `-2h` both mean two hours.
pub fn parse_goal(text: &str) -> Result<u64, DurationError> {
    parse_duration_delta(text).map(i64::unsigned_abs)
}

#[cfg(test)]
mod tests {
    use super::{humanize_seconds, parse_duration_delta, parse_goal, DurationError};

    #[test]
    fn humanizes_by_largest_unit() {
        assert_eq!(humanize_seconds(3661), "1h 1m");
        assert_eq!(humanize_seconds(125), "2m 5s");
        assert_eq!(humanize_seconds(59), "59s");
        assert_eq!(humanize_seconds(0), "0s");
    }

    #[test]
    fn humanizes_negative_values_with_leading_minus() {
        assert_eq!(humanize_seconds(-45), "-45s");
        assert_eq!(humanize_seconds(-5400), "-1h 30m");
    }

    #[test]
    fn parses_signed_compound_durations() {
        assert_eq!(parse_duration_delta("+2h15m"), Ok(8100));
        assert_eq!(parse_duration_delta("-30m"), Ok(-1800));
        assert_eq!(parse_duration_delta("90m"), Ok(5400));
        assert_eq!(parse_duration_delta("360s"), Ok(360));
        assert_eq!(parse_duration_delta(" 1h 20m 10s "), Ok(4810));
        assert_eq!(parse_duration_delta("- 1.5H"), Ok(-5400));
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(parse_duration_delta("0.5s"), Ok(1));
        assert_eq!(parse_duration_delta("-0.5s"), Ok(-1));
        assert_eq!(parse_duration_delta("2.5s"), Ok(3));
    }

    #[test]
    fn rejects_garbage_and_empty_input() {
        for input in ["garbage", "", "+", "5", "10m 1h", "1x"] {
            assert_eq!(
                parse_duration_delta(input),
                Err(DurationError::InvalidDurationFormat {
                    input: input.to_string()
                }),
                "input {input:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_totals_beyond_i64() {
        for input in ["99999999999999999999999h", "-99999999999999999999999h"] {
            assert!(
                matches!(parse_duration_delta(input), Err(DurationError::InvalidDurationFormat { .. })),
                "input {input:?} should be rejected"
            );
        }
        assert_eq!(parse_duration_delta("1000000h"), Ok(3_600_000_000));
    }

    #[test]
    fn goal_ignores_sign() {
        assert_eq!(parse_goal("+2h"), Ok(7200));
        assert_eq!(parse_goal("-45m"), Ok(2700));
        assert!(parse_goal("soon").is_err());
    }
}
