//! Day-granular timestamp arithmetic for caller-supplied windows.

use chrono::{DateTime, Duration, Utc};

use crate::error::FitbotError;

/// Largest window, in days, accepted in either direction.
pub const MAX_DAYS: i64 = 36_500;

pub fn checked_days(field: &str, days: i64) -> Result<Duration, FitbotError> {
    if days.unsigned_abs() > MAX_DAYS as u64 {
        return Err(FitbotError::InvalidInput(format!(
            "{field} must be within ±{MAX_DAYS} days, got {days}"
        )));
    }
    Duration::try_days(days)
        .ok_or_else(|| FitbotError::InvalidInput(format!("{field} out of range: {days}")))
}

/// `at + days`, or an error instead of a timestamp overflow.
pub fn days_after(at: DateTime<Utc>, field: &str, days: i64) -> Result<DateTime<Utc>, FitbotError> {
    at.checked_add_signed(checked_days(field, days)?)
        .ok_or_else(|| FitbotError::InvalidInput(format!("{field} out of range: {days}")))
}

/// `at - days`, or an error instead of a timestamp overflow.
pub fn days_before(at: DateTime<Utc>, field: &str, days: i64) -> Result<DateTime<Utc>, FitbotError> {
    at.checked_sub_signed(checked_days(field, days)?)
        .ok_or_else(|| FitbotError::InvalidInput(format!("{field} out of range: {days}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_days_after_and_before() {
        let now = Utc::now();
        assert_eq!(days_after(now, "ttl_days", 7).unwrap(), now + Duration::days(7));
        assert_eq!(days_after(now, "ttl_days", -1).unwrap(), now - Duration::days(1));
        assert_eq!(days_before(now, "answer_cache_days", 30).unwrap(), now - Duration::days(30));
    }

    #[test]
    fn test_huge_windows_rejected() {
        let now = Utc::now();
        for days in [MAX_DAYS + 1, 1_000_000_000, i64::MAX, i64::MIN] {
            let err = days_after(now, "ttl_days", days).unwrap_err();
            assert!(matches!(err, FitbotError::InvalidInput(_)), "{days}");
            assert!(err.to_string().contains("ttl_days"));
            assert!(days_before(now, "scrape_cache_days", days).is_err(), "{days}");
        }
        assert!(days_after(now, "ttl_days", MAX_DAYS).is_ok());
    }
}
