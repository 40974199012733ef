//! Conversion between native sample words and application buffers
//!
//! Native buffers interleave channels per complex sample. With two channels a
//! 16-bit frame is four words `[ch0.re, ch0.im, ch1.re, ch1.im]`, which are
//! split into one application buffer per channel on receive and merged back on
//! transmit. 8-bit wire formats pack each complex component pair into a
//! single word.
//!
//! None of these functions allocate; they only touch the slices they are
//! given.

use num_complex::Complex;

use crate::format::{SampleFormat, StreamSample};

#[inline]
fn unpack_sc8(word: i16) -> (i16, i16) {
    let [re, im] = word.to_ne_bytes();
    (re as i8 as i16, im as i8 as i16)
}

#[inline]
fn pack_sc8(re: i16, im: i16) -> i16 {
    let re = re.clamp(i8::MIN as i16, i8::MAX as i16) as i8;
    let im = im.clamp(i8::MIN as i16, i8::MAX as i16) as i8;
    i16::from_ne_bytes([re as u8, im as u8])
}

/// Number of native words holding `num_samples` complex samples
pub fn native_len(format: SampleFormat, num_samples: usize) -> usize {
    if format.is_8bit() {
        num_samples
    } else {
        num_samples * 2
    }
}

/// Convert `num_elems` samples per channel from `native` into `outputs`.
///
/// `outputs.len()` is the channel count. Every output must hold at least
/// `num_elems` samples.
pub fn native_to_app<T: StreamSample>(
    native: &[i16],
    format: SampleFormat,
    outputs: &mut [&mut [Complex<T>]],
    num_elems: usize,
) {
    let nchan = outputs.len();
    if nchan == 0 {
        return;
    }
    let scale = format.full_scale();

    if format.is_8bit() {
        for (i, frame) in native.chunks_exact(nchan).take(num_elems).enumerate() {
            for (out, &word) in outputs.iter_mut().zip(frame) {
                let (re, im) = unpack_sc8(word);
                out[i] = Complex::new(T::from_native(re, scale), T::from_native(im, scale));
            }
        }
    } else {
        for (i, frame) in native.chunks_exact(2 * nchan).take(num_elems).enumerate() {
            for (out, pair) in outputs.iter_mut().zip(frame.chunks_exact(2)) {
                out[i] = Complex::new(
                    T::from_native(pair[0], scale),
                    T::from_native(pair[1], scale),
                );
            }
        }
    }
}

/// Convert `num_elems` samples per channel from `inputs` into `native`.
///
/// Float components are scaled and truncated toward zero.
pub fn app_to_native<T: StreamSample>(
    inputs: &[&[Complex<T>]],
    format: SampleFormat,
    native: &mut [i16],
    num_elems: usize,
) {
    let nchan = inputs.len();
    if nchan == 0 {
        return;
    }
    let scale = format.full_scale();

    if format.is_8bit() {
        for (i, frame) in native.chunks_exact_mut(nchan).take(num_elems).enumerate() {
            for (word, input) in frame.iter_mut().zip(inputs) {
                let s = input[i];
                *word = pack_sc8(s.re.to_native(scale), s.im.to_native(scale));
            }
        }
    } else {
        for (i, frame) in native.chunks_exact_mut(2 * nchan).take(num_elems).enumerate() {
            for (pair, input) in frame.chunks_exact_mut(2).zip(inputs) {
                let s = input[i];
                pair[0] = s.re.to_native(scale);
                pair[1] = s.im.to_native(scale);
            }
        }
    }
}
