//! Test-frame generator.
//!
//! Produces a Hann-windowed tone burst on channel A and the same burst
//! shifted by `delay` samples on channel B, quantized to the wire's `i8`
//! range. A positive delay means channel B hears the source later.

use anyhow::{ensure, Result};
use std::f32::consts::PI;
use tdoa_core::frame_adapter::encode_frame;

/// Burst length in samples.
const BURST_LEN: usize = 24;
/// Tone period in samples within the burst.
const TONE_PERIOD: f32 = 8.0;

/// Returns `(channel_a, channel_b)` for a single frame.
pub fn burst_pair(samples: usize, delay: isize, amplitude: f32) -> Result<(Vec<f32>, Vec<f32>)> {
    ensure!(samples > 0, "samples per channel must be non-zero");
    ensure!(
        delay.unsigned_abs() < samples,
        "delay of {} samples does not fit in {} samples",
        delay,
        samples
    );
    let amplitude = amplitude.clamp(0.0, 127.0);

    let start = (samples / 2).saturating_sub(BURST_LEN / 2);
    let mut a = vec![0.0f32; samples];
    for k in 0..BURST_LEN {
        if let Some(slot) = a.get_mut(start + k) {
            let window = 0.5 * (1.0 - (2.0 * PI * k as f32 / (BURST_LEN - 1) as f32).cos());
            *slot = (amplitude * window * (2.0 * PI * k as f32 / TONE_PERIOD).sin()).round();
        }
    }

    let mut b = vec![0.0f32; samples];
    for (i, slot) in b.iter_mut().enumerate() {
        let src = i as isize - delay;
        if src >= 0 && (src as usize) < samples {
            *slot = a[src as usize];
        }
    }
    Ok((a, b))
}

/// Wire bytes for `frames` identical frames.
pub fn frames(samples: usize, delay: isize, amplitude: f32, frames: usize) -> Result<Vec<u8>> {
    let (a, b) = burst_pair(samples, delay, amplitude)?;
    let frame = encode_frame(&a, &b)?;
    Ok(frame.repeat(frames))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tdoa_core::{CorrelationEngine, CorrelationMode, PeakLocator, SampleBuffer};

    fn measured_lag(samples: usize, delay: isize) -> isize {
        let (a, b) = burst_pair(samples, delay, 100.0).unwrap();
        let a = SampleBuffer::new(a, samples).unwrap();
        let b = SampleBuffer::new(b, samples).unwrap();
        let mut engine = CorrelationEngine::new(samples, CorrelationMode::CrossCorrelation).unwrap();
        let result = engine.compute(&a, &b).unwrap();
        let peak = PeakLocator::new(result.as_slice()).unwrap().max_index();
        result.lag_at(peak)
    }

    #[test]
    fn test_delay_is_recovered() {
        for delay in [-30isize, -5, 0, 1, 12, 60] {
            assert_eq!(measured_lag(250, delay), delay, "delay {}", delay);
        }
    }

    #[test]
    fn test_samples_fit_wire_range() {
        let (a, b) = burst_pair(100, 3, 500.0).unwrap();
        assert!(a.iter().chain(&b).all(|v| (-127.0..=127.0).contains(v)));
        assert!(a.iter().any(|&v| v != 0.0));
    }

    #[test]
    fn test_frames_repeat() {
        let bytes = frames(10, 2, 50.0, 3).unwrap();
        assert_eq!(bytes.len(), 3 * 22);
        assert_eq!(&bytes[0..2], &[0xFF, 0xFF]);
        assert_eq!(&bytes[22..24], &[0xFF, 0xFF]);
    }

    #[test]
    fn test_rejects_oversized_delay() {
        assert!(burst_pair(10, 10, 50.0).is_err());
        assert!(burst_pair(10, -10, 50.0).is_err());
        assert!(burst_pair(0, 0, 50.0).is_err());
    }
}
