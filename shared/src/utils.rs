// Time helpers shared by data providers.
use chrono::DateTime;

use crate::series::SeriesError;

/// Parses either an integer Unix second or an RFC 3339 timestamp.
pub fn parse_time(raw: &str) -> Result<i64, SeriesError> {
    let trimmed = raw.trim();
    if let Ok(secs) = trimmed.parse::<i64>() {
        return Ok(secs);
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.timestamp())
        .map_err(|_| SeriesError::InvalidTime(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_accepts_unix_and_rfc3339() {
        assert_eq!(parse_time("1700000000").unwrap(), 1_700_000_000);
        assert_eq!(parse_time(" -3600 ").unwrap(), -3600);
        assert_eq!(parse_time("1970-01-01T01:00:00Z").unwrap(), 3600);
        assert_eq!(parse_time("2024-01-01T00:00:00+01:00").unwrap(), 1_704_063_600);
    }

    #[test]
    fn test_parse_time_rejects_garbage() {
        assert_eq!(parse_time("yesterday"), Err(SeriesError::InvalidTime("yesterday".into())));
    }
}
