//! Human readable durations ("500ms", "10s", "10m") for config files.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

/// Parses a duration string made of a number and an optional unit
/// (`ms`, `s`, `m`, `h`, `d`). A bare number is seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let num_end = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(s.len());
    if num_end == 0 {
        return Err(format!("duration '{}' must start with a number", s));
    }

    let value: f64 = s[..num_end]
        .parse()
        .map_err(|_| format!("invalid duration number in '{}'", s))?;
    let multiplier = match &s[num_end..] {
        "ms" => 0.001,
        "s" | "" => 1.0,
        "m" => 60.0,
        "h" => 3600.0,
        "d" => 86400.0,
        unit => return Err(format!("unknown duration unit: {}", unit)),
    };

    Ok(Duration::from_secs_f64(value * multiplier))
}

/// Formats a duration the way [`parse_duration`] reads it back.
pub fn format_duration(duration: &Duration) -> String {
    let millis = duration.as_millis();
    if millis % 1000 != 0 {
        format!("{}ms", millis)
    } else {
        format!("{}s", duration.as_secs())
    }
}

/// `#[serde(with = "common::duration::serde_str")]` adapter.
pub mod serde_str {
    use super::*;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_duration(duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
