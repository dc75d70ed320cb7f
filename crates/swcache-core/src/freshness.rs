//! Entry freshness policy

use chrono::{DateTime, TimeDelta, Utc};
use std::fmt;
use std::time::Duration;
use swcache_storage::StoredResponse;

/// Outcome of checking a stored entry against the staleness threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Younger than the threshold; may be served
    Fresh { age: TimeDelta },
    /// At or past the threshold
    Stale { age: TimeDelta },
    /// No usable `date` header, so the age is unknown
    Undated,
}

impl Freshness {
    /// Classify `entry` by the age of its `date` header at `now`.
    ///
    /// A date in the future yields a negative age, which counts as fresh.
    pub fn evaluate(entry: &StoredResponse, now: DateTime<Utc>, max_age: Duration) -> Self {
        let Some(date) = entry.date() else {
            return Freshness::Undated;
        };

        let age = now - date;
        let max_age = TimeDelta::from_std(max_age).unwrap_or(TimeDelta::MAX);

        if age < max_age {
            Freshness::Fresh { age }
        } else {
            Freshness::Stale { age }
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, Freshness::Fresh { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Freshness::Fresh { .. } => "fresh",
            Freshness::Stale { .. } => "stale",
            Freshness::Undated => "undated",
        }
    }
}

impl fmt::Display for Freshness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Freshness::Fresh { age } | Freshness::Stale { age } => {
                write!(f, "{} (age {}s)", self.as_str(), age.num_seconds())
            }
            Freshness::Undated => f.write_str(self.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::TimeZone;

    fn stored_at(date: Option<&str>) -> StoredResponse {
        StoredResponse {
            url: "http://localhost:5173/src/main.js".to_string(),
            status: 200,
            headers: date
                .map(|d| vec![("date".to_string(), d.to_string())])
                .unwrap_or_default(),
            body: Bytes::new(),
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap()
    }

    const T0_HTTP: &str = "Sun, 06 Nov 1994 08:49:37 GMT";

    #[test]
    fn test_six_second_threshold() {
        let entry = stored_at(Some(T0_HTTP));
        let max_age = Duration::from_secs(6);

        let at_five = Freshness::evaluate(&entry, t0() + TimeDelta::seconds(5), max_age);
        assert_eq!(at_five, Freshness::Fresh { age: TimeDelta::seconds(5) });

        let at_seven = Freshness::evaluate(&entry, t0() + TimeDelta::seconds(7), max_age);
        assert_eq!(at_seven, Freshness::Stale { age: TimeDelta::seconds(7) });
    }

    #[test]
    fn test_age_equal_to_threshold_is_stale() {
        let entry = stored_at(Some(T0_HTTP));
        let result = Freshness::evaluate(&entry, t0() + TimeDelta::seconds(6), Duration::from_secs(6));
        assert!(!result.is_fresh());
    }

    #[test]
    fn test_missing_date_is_undated() {
        let result = Freshness::evaluate(&stored_at(None), t0(), Duration::from_secs(86400));
        assert_eq!(result, Freshness::Undated);
        assert!(!result.is_fresh());
    }

    #[test]
    fn test_garbage_date_is_undated() {
        let result = Freshness::evaluate(&stored_at(Some("not a date")), t0(), Duration::from_secs(86400));
        assert_eq!(result, Freshness::Undated);
    }

    #[test]
    fn test_future_date_is_fresh() {
        let entry = stored_at(Some(T0_HTTP));
        let result = Freshness::evaluate(&entry, t0() - TimeDelta::seconds(30), Duration::from_secs(6));
        assert!(result.is_fresh());
    }

    #[test]
    fn test_display() {
        let entry = stored_at(Some(T0_HTTP));
        let result = Freshness::evaluate(&entry, t0() + TimeDelta::seconds(7), Duration::from_secs(6));
        assert_eq!(result.to_string(), "stale (age 7s)");
        assert_eq!(Freshness::Undated.to_string(), "undated");
    }
}
