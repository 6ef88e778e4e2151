//! Exact-integer 3:1 resampling between the pipeline's 16 kHz and the
//! denoiser's native 48 kHz (spec §9 "sample-rate impedance").
//!
//! Deliberately not a general-purpose resampler: the ratio is always
//! exactly 3, so linear interpolation up and a 3-tap mean down are both
//! exact and cheap. A polyphase resampler would add latency this pipeline
//! does not need.

/// Upsamples 16 kHz int16 samples to 48 kHz by 3x linear interpolation.
/// Output length is always `input.len() * 3`.
pub fn upsample_3x(input: &[i16]) -> Vec<i16> {
    let mut out = Vec::with_capacity(input.len() * 3);
    for i in 0..input.len() {
        let current = input[i] as f32;
        let next = if i + 1 < input.len() { input[i + 1] as f32 } else { current };
        let step = (next - current) / 3.0;
        out.push(current.round() as i16);
        out.push((current + step).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16);
        out.push((current + 2.0 * step).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16);
    }
    out
}

/// Downsamples 48 kHz int16 samples to 16 kHz by averaging each group of 3.
/// `input.len()` must be a multiple of 3.
pub fn downsample_3x_mean(input: &[i16]) -> Vec<i16> {
    debug_assert_eq!(input.len() % 3, 0, "downsample_3x_mean requires a multiple of 3 samples");
    input
        .chunks_exact(3)
        .map(|triplet| {
            let sum: i32 = triplet.iter().map(|&s| s as i32).sum();
            (sum as f32 / 3.0).round() as i16
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsample_then_downsample_reproduces_constant_frame() {
        // I6: round-trip of a constant-value frame is the identity within rounding.
        let frame = vec![1234i16; 160];
        let up = upsample_3x(&frame);
        assert_eq!(up.len(), 480);
        let down = downsample_3x_mean(&up);
        assert_eq!(down.len(), 160);
        for (&original, &recovered) in frame.iter().zip(down.iter()) {
            assert!((original - recovered).abs() <= 1, "{original} vs {recovered}");
        }
    }

    #[test]
    fn upsample_preserves_endpoints() {
        let frame = vec![100i16, 200, 300];
        let up = upsample_3x(&frame);
        assert_eq!(up[0], 100);
        assert_eq!(up[3], 200);
        assert_eq!(up[6], 300);
    }

    #[test]
    fn downsample_averages_groups_of_three() {
        let input = vec![0i16, 3, 6, 9, 12, 15];
        let out = downsample_3x_mean(&input);
        assert_eq!(out, vec![3, 12]);
    }
}
