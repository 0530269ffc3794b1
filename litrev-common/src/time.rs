//! Timestamp utilities
//!
//! Timestamps are stored as RFC 3339 TEXT columns.

use chrono::{DateTime, Utc};

use crate::{Error, Result};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current timestamp in stored form
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// Parse a stored RFC 3339 timestamp
pub fn parse_rfc3339(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::InvalidInput(format!("Invalid timestamp '{}': {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01 00:00:00 UTC
    }

    #[test]
    fn test_round_trip_through_text() {
        let stored = now_rfc3339();
        let parsed = parse_rfc3339(&stored).unwrap();
        assert_eq!(parsed.to_rfc3339(), stored);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_rfc3339("yesterday").is_err());
    }
}
