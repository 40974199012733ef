//! Test helper utilities shared by the stream integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use bladerf_stream::sim::SimDevice;
use num_complex::Complex;

/// Sample rate used by most tests; one tick is exactly one microsecond
pub const RATE: f64 = 1e6;

/// Timeout for calls that are expected to succeed immediately
pub const TIMEOUT: Duration = Duration::from_millis(100);

/// Create a shared simulated device running at [`RATE`]
pub fn sim() -> Arc<SimDevice> {
    Arc::new(SimDevice::new(RATE))
}

/// Zeroed float buffer of `len` samples
pub fn cf32(len: usize) -> Vec<Complex<f32>> {
    vec![Complex::new(0.0, 0.0); len]
}

/// Zeroed integer buffer of `len` samples
pub fn cs16(len: usize) -> Vec<Complex<i16>> {
    vec![Complex::new(0, 0); len]
}

/// Constant-valued float buffer
pub fn cf32_const(len: usize, re: f32, im: f32) -> Vec<Complex<f32>> {
    vec![Complex::new(re, im); len]
}

/// Integer ramp `(k, -k)` starting at `offset`
pub fn cs16_ramp(len: usize, offset: i16) -> Vec<Complex<i16>> {
    (0..len)
        .map(|k| {
            let v = offset.wrapping_add(k as i16);
            Complex::new(v, v.wrapping_neg())
        })
        .collect()
}
