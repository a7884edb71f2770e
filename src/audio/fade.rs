//! # Fade Shaping
//!
//! Attenuates the edges of a sample buffer with a raised-cosine (Hann) ramp
//! so that concatenated fragments meet without audible clicks.
//!
//! The ramp is built from a symmetric `2F`-point Hann window: the first half
//! fades in (0 → 1) over the leading `F` samples, the second half fades out
//! (1 → 0) over the trailing `F` samples. The interior of the buffer passes
//! through untouched.

use std::f32::consts::PI;

/// Apply symmetric fade-in/fade-out envelopes to a copy of `samples`.
///
/// ## Parameters:
/// - **samples**: interleaved 16-bit PCM samples
/// - **fade_len**: ramp length `F` in samples (0 disables shaping)
///
/// ## Short-buffer behavior:
/// The effective ramp length is `min(F, len / 2)`, so the two fade regions
/// never overlap and never index outside the buffer. Buffers of length 0 or 1
/// come back unchanged.
///
/// Gains are applied in f32 and the products clamped to the i16 range before
/// the cast back, so shaping can never wrap around. The input is not mutated.
pub fn shape(samples: &[i16], fade_len: usize) -> Vec<i16> {
    let mut shaped = samples.to_vec();
    let eff = fade_len.min(samples.len() / 2);
    if eff == 0 {
        return shaped;
    }

    // Symmetric Hann window over 2*eff points; first half ramps up,
    // second half ramps down.
    let denom = (2 * eff - 1).max(1) as f32;
    let hann = |k: usize| 0.5 * (1.0 - (2.0 * PI * k as f32 / denom).cos());

    for k in 0..eff {
        shaped[k] = apply_gain(samples[k], hann(k));
    }

    let tail = samples.len() - eff;
    for k in 0..eff {
        shaped[tail + k] = apply_gain(samples[tail + k], hann(eff + k));
    }

    shaped
}

fn apply_gain(sample: i16, gain: f32) -> i16 {
    (sample as f32 * gain).clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    const FADE_LEN: usize = 50;

    #[test]
    fn test_silence_stays_silent() {
        let silent = vec![0i16; 1000];
        assert_eq!(shape(&silent, FADE_LEN), silent);
    }

    #[test]
    fn test_edges_attenuated_interior_untouched() {
        let buf = vec![10_000i16; 1000];
        let shaped = shape(&buf, FADE_LEN);
        assert_eq!(shaped.len(), buf.len());

        // First sample of the ramp is fully attenuated, and every faded
        // sample is strictly quieter than the input.
        assert_eq!(shaped[0], 0);
        for k in 0..FADE_LEN {
            assert!(shaped[k].abs() < buf[k].abs(), "fade-in sample {} not attenuated", k);
            let tail = buf.len() - FADE_LEN + k;
            assert!(shaped[tail].abs() < buf[tail].abs(), "fade-out sample {} not attenuated", tail);
        }

        // Interior passes through unchanged.
        for k in FADE_LEN..buf.len() - FADE_LEN {
            assert_eq!(shaped[k], buf[k]);
        }

        // Fade-out ends at zero.
        assert_eq!(*shaped.last().unwrap(), 0);
    }

    #[test]
    fn test_fade_is_monotonic_ramp() {
        let buf = vec![i16::MAX; 400];
        let shaped = shape(&buf, FADE_LEN);
        for k in 1..FADE_LEN {
            assert!(shaped[k] >= shaped[k - 1], "fade-in not non-decreasing at {}", k);
        }
        let tail = buf.len() - FADE_LEN;
        for k in 1..FADE_LEN {
            assert!(
                shaped[tail + k] <= shaped[tail + k - 1],
                "fade-out not non-increasing at {}",
                k
            );
        }
    }

    #[test]
    fn test_short_buffer_clamps_without_panicking() {
        // Shorter than 2*F: ramps clamp to len/2 and never overlap.
        let buf = vec![10_000i16; 30];
        let shaped = shape(&buf, FADE_LEN);
        assert_eq!(shaped.len(), 30);
        assert_eq!(shaped[0], 0);
        assert_eq!(*shaped.last().unwrap(), 0);

        // Deterministic: shaping twice gives the same result.
        assert_eq!(shape(&buf, FADE_LEN), shaped);
    }

    #[test]
    fn test_degenerate_lengths() {
        assert_eq!(shape(&[], FADE_LEN), Vec::<i16>::new());
        assert_eq!(shape(&[1234], FADE_LEN), vec![1234]);
    }

    #[test]
    fn test_zero_fade_len_is_identity() {
        let buf = vec![-5_000i16; 100];
        assert_eq!(shape(&buf, 0), buf);
    }

    #[test]
    fn test_extremes_do_not_wrap() {
        let buf = vec![i16::MIN; 200];
        let shaped = shape(&buf, FADE_LEN);
        // Attenuating i16::MIN must clamp toward zero, never wrap positive.
        for (k, &sample) in shaped.iter().enumerate() {
            assert!(sample <= 0, "sample {} wrapped to {}", k, sample);
        }
    }
}
