//! Conversion between hardware sample ticks and nanoseconds
//!
//! The integer part of the rate is handled with integer arithmetic so that
//! large tick counts keep full precision; only the fractional remainder goes
//! through floating point.

use std::time::Duration;

const NS_PER_SEC: i64 = 1_000_000_000;

/// Convert a tick count to nanoseconds at `rate` samples per second.
pub fn ticks_to_ns(ticks: i64, rate: f64) -> i64 {
    let rate_int = rate as i64;
    if rate_int <= 0 {
        return (ticks as f64 * NS_PER_SEC as f64 / rate).round() as i64;
    }
    let full = ticks / rate_int;
    let err = ticks - full * rate_int;
    let part = full as f64 * (rate - rate_int as f64);
    let frac = ((err as f64 - part) * NS_PER_SEC as f64) / rate;
    full * NS_PER_SEC + frac.round() as i64
}

/// Convert nanoseconds to a tick count at `rate` samples per second.
pub fn ns_to_ticks(time_ns: i64, rate: f64) -> i64 {
    let rate_int = rate as i64;
    let full = time_ns / NS_PER_SEC;
    let err = time_ns - full * NS_PER_SEC;
    let part = full as f64 * (rate - rate_int as f64);
    let frac = part + (err as f64 * rate) / NS_PER_SEC as f64;
    full * rate_int + frac.round() as i64
}

/// Smallest receive timeout that still covers two buffers at `rate`.
pub fn min_rx_timeout(buffer_size: usize, rate: f64) -> Duration {
    if rate <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_millis(((2 * 1000 * buffer_size) as f64 / rate) as u64)
}
