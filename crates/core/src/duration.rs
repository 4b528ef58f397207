//! Compact duration strings (`1d2h30m15s`, `500ms`) used throughout the config.

use std::time::Duration;

/// Parse a human-readable duration string into a [`Duration`].
///
/// Supports components: `Xd` (days), `Xh` (hours), `Xm` (minutes),
/// `Xs` (seconds), `Xms` (milliseconds). Components can be combined:
/// "2h30m", "1d12h", "90s", "1m500ms". A bare number is read as seconds.
/// Returns `None` if the string is empty or unparseable.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let mut total_ms: u64 = 0;
    let mut num_buf = String::new();
    let mut unit_buf = String::new();
    let mut found_unit = false;

    let mut flush = |num_buf: &mut String, unit_buf: &mut String| -> Option<()> {
        let n: u64 = num_buf.parse().ok()?;
        let factor = match unit_buf.as_str() {
            "d" => 86_400_000,
            "h" => 3_600_000,
            "m" => 60_000,
            "s" => 1_000,
            "ms" => 1,
            _ => return None,
        };
        total_ms = total_ms.checked_add(n.checked_mul(factor)?)?;
        num_buf.clear();
        unit_buf.clear();
        Some(())
    };

    for ch in s.chars() {
        if ch.is_ascii_digit() {
            if !unit_buf.is_empty() {
                flush(&mut num_buf, &mut unit_buf)?;
            }
            num_buf.push(ch);
        } else if ch.is_ascii_alphabetic() {
            if num_buf.is_empty() {
                return None;
            }
            unit_buf.push(ch);
            found_unit = true;
        } else {
            return None;
        }
    }

    if !unit_buf.is_empty() {
        flush(&mut num_buf, &mut unit_buf)?;
    } else if !num_buf.is_empty() {
        // Ambiguous: "30m15" -- trailing digits after a unit.
        if found_unit {
            return None;
        }
        let n: u64 = num_buf.parse().ok()?;
        total_ms = n.checked_mul(1_000)?;
    }

    Some(Duration::from_millis(total_ms))
}

/// Render a [`Duration`] in the same compact syntax [`parse_duration`] reads.
pub fn format_duration(d: Duration) -> String {
    let mut ms = d.as_millis();
    if ms == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    for (unit, factor) in [("d", 86_400_000u128), ("h", 3_600_000), ("m", 60_000), ("s", 1_000), ("ms", 1)] {
        let n = ms / factor;
        if n > 0 {
            out.push_str(&format!("{n}{unit}"));
            ms %= factor;
        }
    }
    out
}

/// Serde adapter for `Duration` fields written as compact duration strings.
pub mod serde_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_duration(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid duration '{raw}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minutes() {
        assert_eq!(parse_duration("30m"), Some(Duration::from_secs(30 * 60)));
    }

    #[test]
    fn parse_combined() {
        assert_eq!(
            parse_duration("5h25m"),
            Some(Duration::from_secs(5 * 3_600 + 25 * 60))
        );
        assert_eq!(
            parse_duration("1d2h30m15s"),
            Some(Duration::from_secs(86_400 + 7_200 + 1_800 + 15))
        );
    }

    #[test]
    fn parse_milliseconds() {
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("1m500ms"), Some(Duration::from_millis(60_500)));
    }

    #[test]
    fn parse_zero_is_valid() {
        assert_eq!(parse_duration("0s"), Some(Duration::ZERO));
        assert_eq!(parse_duration("0"), Some(Duration::ZERO));
    }

    #[test]
    fn parse_bare_number_as_seconds() {
        assert_eq!(parse_duration("120"), Some(Duration::from_secs(120)));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("  "), None);
        assert_eq!(parse_duration("abc"), None);
        assert_eq!(parse_duration("30m15"), None);
        assert_eq!(parse_duration("5x"), None);
        assert_eq!(parse_duration("-5m"), None);
        assert_eq!(parse_duration("1.5h"), None);
    }

    #[test]
    fn format_matches_parse() {
        assert_eq!(format_duration(Duration::from_secs(5 * 3_600 + 25 * 60)), "5h25m");
        assert_eq!(format_duration(Duration::from_millis(60_500)), "1m500ms");
        assert_eq!(format_duration(Duration::ZERO), "0s");
        assert_eq!(format_duration(Duration::from_secs(86_400)), "1d");
    }
}
