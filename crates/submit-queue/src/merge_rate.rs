//! Exponentially weighted merges-per-day estimate
//!
//! After a gap of `d` since the previous merge the rate moves towards the
//! instantaneous rate `1day / d` by `alpha = 1 - exp(-sqrt(d / T))`: short
//! gaps move it a little, gaps much longer than `T` replace it.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

fn day_secs() -> f64 {
    Duration::days(1).num_milliseconds() as f64 / 1000.0
}

fn secs(d: Duration) -> f64 {
    d.num_milliseconds() as f64 / 1000.0
}

/// Rate after a merge that happened `since_last` after the previous one
pub fn update_merge_rate(rate: f64, since_last: Duration, time_constant: Duration) -> f64 {
    let elapsed = secs(since_last);
    if elapsed <= 0.0 {
        return rate;
    }

    let alpha = 1.0 - (-(elapsed / secs(time_constant)).sqrt()).exp();
    let instantaneous = day_secs() / elapsed;
    rate + alpha * (instantaneous - rate)
}

/// Rate as seen `since_last` after the previous merge, without recording one
///
/// While the gap is shorter than the interval the rate itself predicts, the
/// rate stands. Past that, the gap is treated as if a merge happened now,
/// which can only lower the estimate.
pub fn merge_rate_with_tail(rate: f64, since_last: Duration, time_constant: Duration) -> f64 {
    if rate <= 0.0 {
        return rate;
    }

    let expected_gap = day_secs() / rate;
    if secs(since_last) < expected_gap {
        return rate;
    }

    update_merge_rate(rate, since_last, time_constant)
}

/// Running merge-rate state
#[derive(Debug, Clone, Serialize)]
pub struct MergeRate {
    /// Merges per day
    rate: f64,
    last_merge: DateTime<Utc>,
    #[serde(skip)]
    time_constant: Duration,
}

impl MergeRate {
    /// Start with no merges, counting the first gap from `start`
    pub fn new(start: DateTime<Utc>, time_constant: Duration) -> Self {
        Self {
            rate: 0.0,
            last_merge: start,
            time_constant,
        }
    }

    pub fn record_merge(&mut self, at: DateTime<Utc>) {
        self.rate = update_merge_rate(self.rate, at - self.last_merge, self.time_constant);
        self.last_merge = at;
    }

    /// Rate at `now`, decayed by the time since the last merge
    pub fn rate_at(&self, now: DateTime<Utc>) -> f64 {
        merge_rate_with_tail(self.rate, now - self.last_merge, self.time_constant)
    }

    pub fn last_merge(&self) -> DateTime<Utc> {
        self.last_merge
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t() -> Duration {
        Duration::minutes(200)
    }

    #[test]
    fn test_update_merge_rate() {
        struct Case {
            rate: f64,
            since: Duration,
            min: f64,
            max: f64,
        }

        let cases = [
            Case { rate: 0.0, since: Duration::hours(1), min: 10.0, max: 10.2 },
            Case { rate: 24.0, since: Duration::hours(1), min: 24.0, max: 24.0 },
            Case { rate: 24.0, since: Duration::minutes(30), min: 31.6, max: 31.8 },
            Case { rate: 24.0, since: Duration::hours(2), min: 17.4, max: 17.6 },
            Case { rate: 24.0, since: Duration::hours(3), min: 14.1, max: 14.3 },
            Case { rate: 24.0, since: Duration::hours(24), min: 2.0, max: 3.0 },
            Case { rate: 24.0, since: Duration::hours(1024), min: 0.0, max: 1.0 },
            Case { rate: 24.0, since: Duration::zero(), min: 24.0, max: 24.0 },
        ];

        for case in cases {
            let got = update_merge_rate(case.rate, case.since, t());
            assert!(
                got >= case.min && got <= case.max,
                "rate {} after {:?}: got {}, want [{}, {}]",
                case.rate,
                case.since,
                got,
                case.min,
                case.max
            );
        }
    }

    #[test]
    fn test_merge_rate_with_tail() {
        // Within the expected gap the rate stands
        assert_eq!(merge_rate_with_tail(24.0, Duration::minutes(30), t()), 24.0);
        assert_eq!(merge_rate_with_tail(24.0, Duration::zero(), t()), 24.0);
        assert_eq!(merge_rate_with_tail(0.0, Duration::hours(5), t()), 0.0);

        let four_hours = merge_rate_with_tail(24.0, Duration::hours(4), t());
        assert!(four_hours > 11.9 && four_hours < 12.1, "got {}", four_hours);

        let long = merge_rate_with_tail(24.0, Duration::hours(1024), t());
        assert!(long > 0.0 && long < 1.0, "got {}", long);
    }

    #[test]
    fn test_tail_is_non_increasing_and_decays_to_zero() {
        let mut previous = f64::MAX;
        for hours in [0, 1, 2, 4, 8, 16, 32, 64, 128, 256, 512, 1024, 4096] {
            let rate = merge_rate_with_tail(24.0, Duration::hours(hours), t());
            assert!(rate <= previous, "rate increased at {}h: {} > {}", hours, rate, previous);
            assert!(rate <= 24.0);
            previous = rate;
        }
        assert!(previous < 0.01);
    }

    #[test]
    fn test_merge_rate_state() {
        let start = Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).unwrap();
        let mut rate = MergeRate::new(start, t());
        assert_eq!(rate.rate_at(start + Duration::hours(10)), 0.0);

        let mut now = start;
        for _ in 0..48 {
            now += Duration::hours(1);
            rate.record_merge(now);
        }
        assert_eq!(rate.last_merge(), now);
        let steady = rate.rate_at(now);
        assert!(steady > 23.9 && steady < 24.1, "got {}", steady);

        // Decays once merges stop
        assert!(rate.rate_at(now + Duration::hours(12)) < steady);
    }
}
