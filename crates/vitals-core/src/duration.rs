//! Interval parsing for configuration values.

use std::time::Duration;

/// Parse a duration string like `"10s"`, `"500ms"`, `"5m"`, `"1h"`.
/// A bare number is taken as seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let parse = |n: &str| {
        n.trim()
            .parse::<u64>()
            .map_err(|_| format!("invalid duration: {s:?}"))
    };

    if let Some(ms) = s.strip_suffix("ms") {
        parse(ms).map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        parse(secs).map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        scaled(parse(mins)?, 60, s)
    } else if let Some(hours) = s.strip_suffix('h') {
        scaled(parse(hours)?, 3600, s)
    } else {
        parse(s).map(Duration::from_secs)
    }
}

fn scaled(n: u64, unit_secs: u64, s: &str) -> Result<Duration, String> {
    n.checked_mul(unit_secs)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration out of range: {s:?}"))
}
