//! Narrowband <-> wideband transcoding.
//!
//! G.711 u-law companding follows ITU-T Recommendation G.711. Resampling
//! between 8 kHz and 16 kHz is a fixed 1:2 ratio: upsampling inserts
//! linearly interpolated midpoints, downsampling averages adjacent sample
//! pairs.
//!
//! Both conversions are pure functions with no retained state and are safe
//! to call concurrently from any number of sessions. Each conversion is
//! applied exactly once per relay direction; the encoding tag on
//! [`AudioFrame`] is what prevents a frame from being converted twice.

use super::{AudioEncoding, AudioError, AudioFrame};

/// u-law bias added before segment search (ITU-T G.711).
const ULAW_BIAS: i16 = 33;

/// Largest biased magnitude representable in u-law.
const ULAW_CLIP: i16 = 0x1FFF;

/// Compress one 16-bit linear PCM sample to 8-bit u-law.
fn ulaw_compress(sample: i16) -> u8 {
    // Biased magnitude on 14 MSBs, clipped to the coding range
    let magnitude = if sample < 0 {
        (((!sample) as u16) >> 2) as i16 + ULAW_BIAS
    } else {
        (sample >> 2) + ULAW_BIAS
    };
    let magnitude = magnitude.min(ULAW_CLIP);

    // Segment number: position of the leading bit above the mantissa
    let mut segment = 1;
    let mut rest = magnitude >> 6;
    while rest != 0 {
        segment += 1;
        rest >>= 1;
    }

    let high_nibble = 0x0008 - segment;
    let low_nibble = 0x000F - ((magnitude >> segment) & 0x000F);
    let mut code = (high_nibble << 4) | low_nibble;
    if sample >= 0 {
        code |= 0x0080;
    }
    code as u8
}

/// Expand one 8-bit u-law sample to 16-bit linear PCM.
fn ulaw_expand(code: u8) -> i16 {
    let sign: i16 = if code < 0x80 { -1 } else { 1 };
    let inverted = (!code) as i16;
    let exponent = (inverted >> 4) & 0x0007;
    let mantissa = inverted & 0x000F;
    let step = 4 << (exponent + 1);

    sign * ((0x0080 << exponent) + step * mantissa + step / 2 - 4 * ULAW_BIAS)
}

/// 8 kHz -> 16 kHz by linear interpolation between consecutive samples.
fn upsample_2x(samples: &[i16]) -> Vec<i16> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for (i, &current) in samples.iter().enumerate() {
        let next = samples.get(i + 1).copied().unwrap_or(current);
        out.push(current);
        out.push(((current as i32 + next as i32) / 2) as i16);
    }
    out
}

/// 16 kHz -> 8 kHz by averaging adjacent sample pairs.
fn downsample_2x(samples: &[i16]) -> Vec<i16> {
    samples
        .chunks(2)
        .map(|pair| {
            let sum: i32 = pair.iter().map(|&s| s as i32).sum();
            (sum / pair.len() as i32) as i16
        })
        .collect()
}

/// Convert a telephony narrowband frame to the speech endpoint's wideband
/// PCM format.
///
/// Fails with [`AudioError::EncodingMismatch`] if the frame is not
/// narrowband and [`AudioError::Decode`] if the payload is empty.
pub fn to_wideband(frame: &AudioFrame) -> Result<AudioFrame, AudioError> {
    if frame.encoding != AudioEncoding::TelephonyNarrowband {
        return Err(AudioError::EncodingMismatch {
            expected: AudioEncoding::TelephonyNarrowband,
            found: frame.encoding,
        });
    }
    if frame.payload.is_empty() {
        return Err(AudioError::Decode("empty audio payload".to_string()));
    }

    let narrow: Vec<i16> = frame.payload.iter().map(|&b| ulaw_expand(b)).collect();
    let wide = upsample_2x(&narrow);

    let mut payload = Vec::with_capacity(wide.len() * 2);
    for sample in wide {
        payload.extend_from_slice(&sample.to_le_bytes());
    }

    Ok(AudioFrame::wideband(payload, frame.sequence))
}

/// Convert a wideband PCM frame to the telephony narrowband format.
///
/// Fails with [`AudioError::EncodingMismatch`] if the frame is not wideband
/// and [`AudioError::Decode`] if the payload is empty or truncated
/// mid-sample.
pub fn to_narrowband(frame: &AudioFrame) -> Result<AudioFrame, AudioError> {
    if frame.encoding != AudioEncoding::Pcm16Wideband {
        return Err(AudioError::EncodingMismatch {
            expected: AudioEncoding::Pcm16Wideband,
            found: frame.encoding,
        });
    }
    if frame.payload.is_empty() {
        return Err(AudioError::Decode("empty audio payload".to_string()));
    }
    if frame.payload.len() % 2 != 0 {
        return Err(AudioError::Decode(format!(
            "truncated PCM16 payload: {} bytes",
            frame.payload.len()
        )));
    }

    let wide: Vec<i16> = frame
        .payload
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    let narrow = downsample_2x(&wide);
    let payload: Vec<u8> = narrow.iter().map(|&s| ulaw_compress(s)).collect();

    Ok(AudioFrame::narrowband(payload, frame.sequence))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One 20ms telephony frame of a voice-band tone, amplitude `amp`.
    fn tone_pcm(freq_hz: f64, sample_rate: u32, amp: f64, samples: usize) -> Vec<i16> {
        (0..samples)
            .map(|n| {
                let t = n as f64 / sample_rate as f64;
                (amp * (2.0 * std::f64::consts::PI * freq_hz * t).sin()) as i16
            })
            .collect()
    }

    fn ulaw_frame(pcm: &[i16]) -> AudioFrame {
        let payload: Vec<u8> = pcm.iter().map(|&s| ulaw_compress(s)).collect();
        AudioFrame::narrowband(payload, 0)
    }

    #[test]
    fn test_ulaw_companding_is_near_identity() {
        for &sample in &[0i16, 1, -1, 100, -100, 1000, -1000, 10_000, -10_000, 30_000] {
            let decoded = ulaw_expand(ulaw_compress(sample));
            let err = (decoded as i32 - sample as i32).abs();
            // u-law quantization error grows with magnitude; ~3% is the
            // worst case across the top segment
            let bound = (sample as i32).abs() / 16 + 8;
            assert!(
                err <= bound,
                "sample {sample}: decoded {decoded}, error {err} > {bound}"
            );
        }
    }

    #[test]
    fn test_ulaw_extremes_do_not_overflow() {
        let _ = ulaw_expand(ulaw_compress(i16::MAX));
        let _ = ulaw_expand(ulaw_compress(i16::MIN));
        assert_eq!(ulaw_expand(ulaw_compress(0)), 0);
    }

    #[test]
    fn test_round_trip_is_perceptually_close() {
        // 250 Hz tone, 20ms at 8kHz
        let pcm = tone_pcm(250.0, 8_000, 10_000.0, 160);
        let narrow = ulaw_frame(&pcm);

        let round_tripped = to_narrowband(&to_wideband(&narrow).unwrap()).unwrap();
        assert_eq!(round_tripped.payload.len(), narrow.payload.len());

        let original: Vec<i16> = narrow.payload.iter().map(|&b| ulaw_expand(b)).collect();
        let recovered: Vec<i16> = round_tripped
            .payload
            .iter()
            .map(|&b| ulaw_expand(b))
            .collect();

        let max_err = original
            .iter()
            .zip(&recovered)
            .map(|(&a, &b)| (a as i32 - b as i32).abs())
            .max()
            .unwrap();
        // Quantization plus interpolation loss only, no gross distortion
        assert!(max_err < 1_500, "round-trip error {max_err} too large");
    }

    #[test]
    fn test_double_conversion_is_rejected_by_encoding_tag() {
        let narrow = ulaw_frame(&tone_pcm(250.0, 8_000, 10_000.0, 160));
        let wide = to_wideband(&narrow).unwrap();

        // Converting an already-wideband frame again must fail loudly
        let err = to_wideband(&wide).unwrap_err();
        assert_eq!(
            err,
            AudioError::EncodingMismatch {
                expected: AudioEncoding::TelephonyNarrowband,
                found: AudioEncoding::Pcm16Wideband,
            }
        );

        let err = to_narrowband(&narrow).unwrap_err();
        assert!(matches!(err, AudioError::EncodingMismatch { .. }));
    }

    #[test]
    fn test_double_conversion_is_distinguishable() {
        // The defect class: an already-converted payload relabelled and fed
        // through the expander a second time.
        let narrow = ulaw_frame(&tone_pcm(250.0, 8_000, 10_000.0, 160));
        let single = to_wideband(&narrow).unwrap();
        let double = to_wideband(&AudioFrame::narrowband(single.payload.clone(), 0)).unwrap();

        // Sample count no longer matches the source cadence
        assert_ne!(single.payload.len(), double.payload.len());

        // And the signal itself is corrupted far beyond quantization loss
        let decode = |payload: &bytes::Bytes| -> Vec<i16> {
            payload
                .chunks_exact(2)
                .map(|p| i16::from_le_bytes([p[0], p[1]]))
                .collect()
        };
        let single_pcm = decode(&single.payload);
        let double_pcm = decode(&double.payload);
        let mean_diff = single_pcm
            .iter()
            .zip(&double_pcm)
            .map(|(&a, &b)| (a as i64 - b as i64).abs())
            .sum::<i64>()
            / single_pcm.len() as i64;
        assert!(
            mean_diff > 3_000,
            "double conversion too close to single: mean diff {mean_diff}"
        );
    }

    #[test]
    fn test_truncated_payload_fails_decode() {
        let frame = AudioFrame::wideband(vec![0u8, 1, 2], 0);
        assert!(matches!(
            to_narrowband(&frame).unwrap_err(),
            AudioError::Decode(_)
        ));
    }

    #[test]
    fn test_empty_payload_fails_decode() {
        let frame = AudioFrame::narrowband(Vec::new(), 0);
        assert!(matches!(
            to_wideband(&frame).unwrap_err(),
            AudioError::Decode(_)
        ));

        let frame = AudioFrame::wideband(Vec::new(), 0);
        assert!(matches!(
            to_narrowband(&frame).unwrap_err(),
            AudioError::Decode(_)
        ));
    }

    #[test]
    fn test_sample_counts_scale_by_two() {
        let narrow = AudioFrame::narrowband(vec![0xFFu8; 160], 7);
        let wide = to_wideband(&narrow).unwrap();
        assert_eq!(wide.sample_count(), 320);
        assert_eq!(wide.sequence, 7);

        let back = to_narrowband(&wide).unwrap();
        assert_eq!(back.sample_count(), 160);
        assert_eq!(back.sequence, 7);
    }
}
