//! Mixing primitives used by the summing path.
//!
//! Both [`sum_into`] and [`mix_into`] adapt channel counts with the same rules:
//!
//! | source → dest | behavior |
//! |---------------|----------|
//! | N → N         | per-channel add/copy |
//! | 1 → N         | the mono channel is broadcast to every destination channel |
//! | N → 1         | all channels summed, scaled by 1/√2 |
//! | M → N (other) | the first `min(M, N)` channels map one-to-one, the rest stay silent |
//!
//! Buffers are expected in planar layout. When frame counts differ only the
//! common prefix is touched.

use core::f32::consts::FRAC_1_SQRT_2;

use crate::buffer::Buffer;

/// Adds `src` into `dest` (`dest += src`) with channel adaptation.
pub fn sum_into(dest: &mut Buffer, src: &Buffer) {
    let frames = dest.frames().min(src.frames());
    let (dc, sc) = (dest.channels(), src.channels());

    if sc == dc {
        for ch in 0..dc {
            add(&mut dest.channel_mut(ch)[..frames], &src.channel(ch)[..frames]);
        }
    } else if sc == 1 {
        let mono = &src.channel(0)[..frames];
        for ch in 0..dc {
            add(&mut dest.channel_mut(ch)[..frames], mono);
        }
    } else if dc == 1 {
        let out = &mut dest.channel_mut(0)[..frames];
        for ch in 0..sc {
            add_scaled(out, &src.channel(ch)[..frames], FRAC_1_SQRT_2);
        }
    } else {
        for ch in 0..dc.min(sc) {
            add(&mut dest.channel_mut(ch)[..frames], &src.channel(ch)[..frames]);
        }
    }
}

/// Overwrites `dest` with `src` (`dest := src`) with channel adaptation.
///
/// Destination channels with no source counterpart are zeroed.
pub fn mix_into(dest: &mut Buffer, src: &Buffer) {
    let frames = dest.frames().min(src.frames());
    let (dc, sc) = (dest.channels(), src.channels());

    if sc == dc {
        for ch in 0..dc {
            dest.channel_mut(ch)[..frames].copy_from_slice(&src.channel(ch)[..frames]);
        }
    } else if sc == 1 {
        let mono = &src.channel(0)[..frames];
        for ch in 0..dc {
            dest.channel_mut(ch)[..frames].copy_from_slice(mono);
        }
    } else if dc == 1 {
        let out = &mut dest.channel_mut(0)[..frames];
        out.fill(0.0);
        for ch in 0..sc {
            add_scaled(out, &src.channel(ch)[..frames], FRAC_1_SQRT_2);
        }
    } else {
        let common = dc.min(sc);
        for ch in 0..common {
            dest.channel_mut(ch)[..frames].copy_from_slice(&src.channel(ch)[..frames]);
        }
        for ch in common..dc {
            dest.channel_mut(ch).fill(0.0);
        }
    }
}

/// `dest[i] += src[i]`.
#[inline]
pub fn add(dest: &mut [f32], src: &[f32]) {
    for (d, s) in dest.iter_mut().zip(src) {
        *d += *s;
    }
}

/// `dest[i] += src[i] * gain`.
#[inline]
pub fn add_scaled(dest: &mut [f32], src: &[f32], gain: f32) {
    for (d, s) in dest.iter_mut().zip(src) {
        *d += *s * gain;
    }
}

/// `dest[i] *= gain`.
#[inline]
pub fn scale(dest: &mut [f32], gain: f32) {
    for d in dest.iter_mut() {
        *d *= gain;
    }
}

/// `dest[i] *= gains[i]`.
#[inline]
pub fn multiply(dest: &mut [f32], gains: &[f32]) {
    for (d, g) in dest.iter_mut().zip(gains) {
        *d *= *g;
    }
}

/// Fills `dest` with `value`.
#[inline]
pub fn fill(dest: &mut [f32], value: f32) {
    dest.fill(value);
}

/// Root-mean-square level of a signal. Returns 0 for an empty slice.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|&s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo(l: f32, r: f32, frames: usize) -> Buffer {
        Buffer::from_channels(&[vec![l; frames], vec![r; frames]])
    }

    #[test]
    fn sum_equal_channels_adds() {
        let mut dest = stereo(1.0, 2.0, 4);
        sum_into(&mut dest, &stereo(0.5, 0.25, 4));
        assert!(dest.channel(0).iter().all(|&s| s == 1.5));
        assert!(dest.channel(1).iter().all(|&s| s == 2.25));
    }

    #[test]
    fn sum_mono_broadcasts() {
        let mut dest = Buffer::new(4, 3);
        let mono = Buffer::from_channels(&[vec![0.5; 4]]);
        sum_into(&mut dest, &mono);
        sum_into(&mut dest, &mono);
        for ch in 0..3 {
            assert!(dest.channel(ch).iter().all(|&s| s == 1.0));
        }
    }

    #[test]
    fn sum_to_mono_scales_by_inverse_sqrt2() {
        let mut dest = Buffer::new(4, 1);
        sum_into(&mut dest, &stereo(1.0, 1.0, 4));
        let expected = 2.0 * FRAC_1_SQRT_2;
        assert!(dest.channel(0).iter().all(|&s| (s - expected).abs() < 1e-6));
    }

    #[test]
    fn mix_overwrites_and_silences_extra_channels() {
        let mut dest = Buffer::new(4, 4);
        dest.data_mut().fill(7.0);
        mix_into(&mut dest, &stereo(1.0, -1.0, 4));
        assert!(dest.channel(0).iter().all(|&s| s == 1.0));
        assert!(dest.channel(1).iter().all(|&s| s == -1.0));
        assert!(dest.channel(2).iter().all(|&s| s == 0.0));
        assert!(dest.channel(3).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn mix_to_mono_replaces_previous_content() {
        let mut dest = Buffer::from_channels(&[vec![3.0; 4]]);
        mix_into(&mut dest, &stereo(1.0, 0.0, 4));
        assert!(dest.channel(0).iter().all(|&s| (s - FRAC_1_SQRT_2).abs() < 1e-6));
    }

    #[test]
    fn mismatched_frames_touch_common_prefix() {
        let mut dest = Buffer::new(8, 1);
        sum_into(&mut dest, &Buffer::from_channels(&[vec![1.0; 4]]));
        assert_eq!(&dest.channel(0)[..4], &[1.0; 4]);
        assert_eq!(&dest.channel(0)[4..], &[0.0; 4]);
    }

    #[test]
    fn rms_of_constant_and_empty() {
        assert_eq!(rms(&[]), 0.0);
        assert!((rms(&[0.5; 16]) - 0.5).abs() < 1e-6);
        assert!((rms(&[1.0, -1.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn slice_helpers() {
        let mut d = [1.0, 2.0];
        scale(&mut d, 2.0);
        assert_eq!(d, [2.0, 4.0]);
        multiply(&mut d, &[0.5, 0.25]);
        assert_eq!(d, [1.0, 1.0]);
        add_scaled(&mut d, &[2.0, 4.0], 0.5);
        assert_eq!(d, [2.0, 3.0]);
        fill(&mut d, 0.0);
        assert_eq!(d, [0.0, 0.0]);
    }
}
