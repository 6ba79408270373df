use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tide snapshot older than one hour is refetched.
pub const TIDE_MAX_AGE_MS: i64 = 3_600_000;

const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// Format a calendar date the way the backend's `nowdate` parameter expects it
pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}

/// The tide table (`mulddae`) for one calendar day.
///
/// The payload is kept as the backend sent it (`lunar_date`, `seohae`,
/// `other`, `moon_phase`); the client only cares about when it was fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TideSnapshot {
    pub payload: Value,
    pub date_key: String,
    pub fetched_at_ms: i64,
}

impl TideSnapshot {
    pub fn new(payload: Value, fetched_at: DateTime<Local>) -> Self {
        Self {
            payload,
            date_key: date_key(fetched_at.date_naive()),
            fetched_at_ms: fetched_at.timestamp_millis(),
        }
    }

    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms - self.fetched_at_ms
    }

    /// Fresh means fetched for `today` and less than an hour ago.
    pub fn is_fresh_at(&self, today: &str, now_ms: i64) -> bool {
        self.date_key == today && self.age_ms(now_ms) < TIDE_MAX_AGE_MS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn test_date_key_format() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).expect("valid date");
        assert_eq!(date_key(date), "2024-03-07");
    }

    #[test]
    fn test_new_snapshot_is_fresh() {
        let now = Local::now();
        let snapshot = TideSnapshot::new(json!({"seohae": "7물"}), now);
        assert!(snapshot.is_fresh_at(&date_key(now.date_naive()), now.timestamp_millis()));
    }

    #[test]
    fn test_snapshot_expires_after_one_hour() {
        let now = Local::now();
        let snapshot = TideSnapshot::new(json!({}), now);
        let today = date_key(now.date_naive());
        let now_ms = now.timestamp_millis();

        assert!(snapshot.is_fresh_at(&today, now_ms + TIDE_MAX_AGE_MS - 1));
        assert!(!snapshot.is_fresh_at(&today, now_ms + TIDE_MAX_AGE_MS));
    }

    #[test]
    fn test_snapshot_from_another_day_is_stale() {
        let now = Local::now();
        let snapshot = TideSnapshot::new(json!({}), now);
        let tomorrow = date_key((now + Duration::days(1)).date_naive());
        assert!(!snapshot.is_fresh_at(&tomorrow, now.timestamp_millis()));
    }
}
