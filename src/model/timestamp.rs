//! Canonical wire timestamp format (§6.5): `YYYY-MM-DDTHH:MM:SS`.

use chrono::{NaiveDateTime, Utc};

const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Formats `now` (UTC) in the canonical wire format.
#[must_use]
pub fn now_string() -> String {
    Utc::now().format(FORMAT).to_string()
}

/// Parses a wire timestamp. Returns `None` on malformed input rather than
/// erroring — callers treat an unparsable `visited` as "never visited".
#[must_use]
pub fn parse(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, FORMAT).ok()
}

/// Formats a `NaiveDateTime` in the canonical wire format.
#[must_use]
pub fn format(dt: &NaiveDateTime) -> String {
    dt.format(FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_canonical_format() {
        let s = "2024-01-01T00:00:00";
        let dt = parse(s).expect("parses");
        assert_eq!(format(&dt), s);
    }

    #[test]
    fn rejects_malformed_timestamp() {
        assert!(parse("not-a-timestamp").is_none());
        assert!(parse("2024-01-01 00:00:00").is_none());
    }
}
