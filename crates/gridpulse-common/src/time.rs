//! ---
//! gp_section: "01-core-functionality"
//! gp_subsection: "module"
//! gp_type: "source"
//! gp_scope: "code"
//! gp_description: "Shared primitives and utilities for the telemetry core."
//! gp_version: "v0.0.0-prealpha"
//! gp_owner: "tbd"
//! ---
use chrono::{DateTime, TimeZone, Utc};

/// Tick resolution used for all timestamp arithmetic: 100 ns per tick.
pub const TICKS_PER_SECOND: i64 = 10_000_000;

const NANOS_PER_TICK: i64 = 100;

/// Convert a second count into ticks, rounding to the nearest tick.
pub fn seconds_to_ticks(seconds: f64) -> i64 {
    let ticks = seconds * TICKS_PER_SECOND as f64;
    if ticks >= i64::MAX as f64 {
        i64::MAX
    } else if ticks <= i64::MIN as f64 {
        i64::MIN
    } else {
        ticks.round() as i64
    }
}

/// Convert ticks into fractional seconds.
pub fn ticks_to_seconds(ticks: i64) -> f64 {
    ticks as f64 / TICKS_PER_SECOND as f64
}

/// Convert a UTC timestamp into ticks since the Unix epoch.
pub fn ticks_from_datetime(timestamp: DateTime<Utc>) -> i64 {
    let seconds = timestamp.timestamp();
    let sub_ticks = i64::from(timestamp.timestamp_subsec_nanos()) / NANOS_PER_TICK;
    seconds
        .saturating_mul(TICKS_PER_SECOND)
        .saturating_add(sub_ticks)
}

/// Convert ticks since the Unix epoch back into a UTC timestamp.
pub fn datetime_from_ticks(ticks: i64) -> Option<DateTime<Utc>> {
    let seconds = ticks.div_euclid(TICKS_PER_SECOND);
    let sub_nanos = (ticks.rem_euclid(TICKS_PER_SECOND) * NANOS_PER_TICK) as u32;
    Utc.timestamp_opt(seconds, sub_nanos).single()
}

/// Current wall-clock time in ticks since the Unix epoch.
pub fn now_ticks() -> i64 {
    ticks_from_datetime(Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_round_trip_through_ticks() {
        assert_eq!(seconds_to_ticks(1.0), TICKS_PER_SECOND);
        assert_eq!(seconds_to_ticks(0.5), TICKS_PER_SECOND / 2);
        let seconds = ticks_to_seconds(seconds_to_ticks(12.25));
        assert!((seconds - 12.25).abs() < 1e-9);
    }

    #[test]
    fn datetime_round_trip_preserves_tick_resolution() {
        let now = Utc::now();
        let ticks = ticks_from_datetime(now);
        let back = datetime_from_ticks(ticks).expect("valid timestamp");
        let delta = (ticks_from_datetime(back) - ticks).abs();
        assert_eq!(delta, 0);
    }

    #[test]
    fn negative_ticks_map_before_epoch() {
        let before = datetime_from_ticks(-TICKS_PER_SECOND).expect("valid timestamp");
        assert_eq!(before.timestamp(), -1);
    }
}
