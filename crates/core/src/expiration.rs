//! Lock TTL calculation.

use chrono::{DateTime, Utc};

/// Compute the lock TTL in whole seconds.
///
/// For a scheduled job the lock has to outlive the wait until the job is due,
/// so the remaining gap is added to the window. A schedule time in the past
/// contributes nothing. The result is never below one second, since stores
/// reject zero expiries.
pub fn lock_ttl_secs(window_secs: u64, scheduled_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> u64 {
    let gap = scheduled_at
        .map(|at| (at - now).num_seconds().max(0) as u64)
        .unwrap_or(0);

    window_secs.saturating_add(gap).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    #[test]
    fn unscheduled_job_uses_window() {
        assert_eq!(lock_ttl_secs(60, None, Utc::now()), 60);
    }

    #[test]
    fn scheduled_job_covers_the_gap() {
        let now = Utc::now();
        let at = now + Duration::seconds(3600);
        assert_eq!(lock_ttl_secs(60, Some(at), now), 3660);
    }

    #[test]
    fn past_schedule_falls_back_to_window() {
        let now = Utc::now();
        let at = now - Duration::seconds(10);
        assert_eq!(lock_ttl_secs(60, Some(at), now), 60);
    }

    #[test]
    fn sub_second_gap_truncates() {
        let now = Utc::now();
        let at = now + Duration::milliseconds(900);
        assert_eq!(lock_ttl_secs(60, Some(at), now), 60);
    }

    #[test]
    fn zero_window_is_raised_to_one_second() {
        assert_eq!(lock_ttl_secs(0, None, Utc::now()), 1);
    }

    proptest! {
        /// Property: the TTL never drops below the window, whatever the schedule.
        #[test]
        fn ttl_is_at_least_window(window in 1u64..100_000, offset in -100_000i64..100_000) {
            let now = Utc::now();
            let ttl = lock_ttl_secs(window, Some(now + Duration::seconds(offset)), now);
            prop_assert!(ttl >= window);
            prop_assert_eq!(ttl, window + offset.max(0) as u64);
        }
    }
}
