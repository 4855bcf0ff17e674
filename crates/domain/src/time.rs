//! Wall-clock timestamps for timed actions and state snapshots.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// UTC timestamp used for `started_at`, `changed_at`, etc.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// `start + duration`, or `None` when the sum is not representable.
#[must_use]
pub fn offset(start: Timestamp, duration: Duration) -> Option<Timestamp> {
    let delta = chrono::Duration::from_std(duration).ok()?;
    start.checked_add_signed(delta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_return_current_utc_time() {
        let before = Utc::now();
        let ts = now();
        let after = Utc::now();
        assert!(ts >= before);
        assert!(ts <= after);
    }

    #[test]
    fn should_offset_by_duration() {
        let start = now();
        let end = offset(start, Duration::from_millis(2_000)).unwrap();
        assert_eq!((end - start).num_milliseconds(), 2_000);
    }

    #[test]
    fn should_return_none_when_offset_overflows() {
        assert!(offset(now(), Duration::MAX).is_none());
    }
}
