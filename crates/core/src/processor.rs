use crate::angle::{AngleEstimate, Geometry};
use crate::buffer::CorrelationResult;
use crate::constants::{LABEL_CHANNEL_A, LABEL_CHANNEL_B, LABEL_CORRELATION};
use crate::correlation::{BackendKind, CorrelationEngine, CorrelationMode};
use crate::frame_adapter::{ByteSource, DecodeStatus, Frame, FrameDecoder};
use crate::peak::{Peak, PeakLocator, PeakSearch};
use crate::report;
use anyhow::Result;
use log::{debug, warn};
use std::io::{self, Write};
use std::time::{Duration, Instant};

/// Per-session pipeline settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineSettings {
    pub samples_per_channel: usize,
    pub mode: CorrelationMode,
    pub backend: BackendKind,
    pub peak_search: PeakSearch,
}

/// Everything one cycle produced. Owned by the caller until it is written.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub frame: Frame,
    pub correlation: CorrelationResult,
    pub peak: Peak,
    pub estimate: AngleEstimate,
    /// Wall time spent in correlation only.
    pub elapsed: Duration,
}

impl CycleReport {
    /// Writes diagnostics followed by the three data blocks.
    pub fn write_to<W: Write + ?Sized>(&self, out: &mut W, emit_blocks: bool) -> io::Result<()> {
        // + 0.0 folds negative zero so broadside prints as 0.0
        report::write_line(
            out,
            &format!("Time Delay: {:.2} us", self.estimate.time_delay_us() + 0.0),
        )?;
        report::write_line(
            out,
            &format!("Source Angle: {:.1} degrees", self.estimate.angle_deg + 0.0),
        )?;
        report::write_line(out, &format!("Time = {}", self.elapsed.as_micros()))?;
        report::write_line(out, &self.correlation.len().to_string())?;

        if emit_blocks {
            report::write_block(out, LABEL_CHANNEL_A, self.frame.channel_a.as_slice())?;
            report::write_block(out, LABEL_CHANNEL_B, self.frame.channel_b.as_slice())?;
            report::write_block(out, LABEL_CORRELATION, self.correlation.as_slice())?;
        }
        Ok(())
    }
}

/// Decode → correlate → locate peak → estimate bearing, one frame per call.
#[derive(Debug)]
pub struct BearingProcessor {
    decoder: FrameDecoder,
    engine: CorrelationEngine,
    geometry: Geometry,
    peak_search: PeakSearch,
}

impl BearingProcessor {
    pub fn new(settings: PipelineSettings, geometry: Geometry) -> Result<Self> {
        geometry.validate()?;
        Ok(Self {
            decoder: FrameDecoder::new(settings.samples_per_channel)?,
            engine: CorrelationEngine::with_kind(
                settings.samples_per_channel,
                settings.mode,
                settings.backend,
            )?,
            geometry,
            peak_search: settings.peak_search,
        })
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn samples_per_channel(&self) -> usize {
        self.decoder.samples_per_channel()
    }

    pub fn frame_len(&self) -> usize {
        self.decoder.frame_len()
    }

    pub fn frames_decoded(&self) -> u64 {
        self.decoder.frames_decoded()
    }

    pub fn bytes_discarded(&self) -> u64 {
        self.decoder.bytes_discarded()
    }

    /// Runs at most one cycle. Returns `None` when `source` does not yet
    /// hold a complete frame; misaligned bytes ahead of a frame are skipped.
    pub fn poll<S: ByteSource + ?Sized>(&mut self, source: &mut S) -> Result<Option<CycleReport>> {
        loop {
            match self.decoder.try_decode(source)? {
                DecodeStatus::Frame(frame) => return self.process_frame(frame).map(Some),
                DecodeStatus::Resync => continue,
                DecodeStatus::NeedMore => return Ok(None),
            }
        }
    }

    /// Runs the numeric part of a cycle on an already decoded frame.
    pub fn process_frame(&mut self, frame: Frame) -> Result<CycleReport> {
        let start = Instant::now();
        let correlation = self.engine.compute(&frame.channel_a, &frame.channel_b)?;
        let elapsed = start.elapsed();

        let peak = PeakLocator::new(correlation.as_slice())?.find(self.peak_search);
        let estimate = self.geometry.estimate(peak.index, correlation.input_len())?;

        if estimate.saturated {
            warn!(
                "Delay of {} samples exceeds the sensor baseline (arg {:.3}), bearing clamped to {:.0}°",
                estimate.lag_samples, estimate.raw_arg, estimate.angle_deg
            );
        }
        debug!(
            "Frame {}: peak {} at index {} (lag {}), bearing {:.1}° in {:?}",
            self.decoder.frames_decoded(),
            peak.value,
            peak.index,
            estimate.lag_samples,
            estimate.angle_deg,
            elapsed
        );

        Ok(CycleReport {
            frame,
            correlation,
            peak,
            estimate,
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_adapter::{encode_frame, ByteQueue};

    fn settings(n: usize) -> PipelineSettings {
        PipelineSettings {
            samples_per_channel: n,
            mode: CorrelationMode::CrossCorrelation,
            backend: BackendKind::Direct,
            peak_search: PeakSearch::Signed,
        }
    }

    fn geometry() -> Geometry {
        Geometry::new(250_000.0, 343.0, 0.05).unwrap()
    }

    fn pulse(n: usize, at: usize) -> Vec<f32> {
        let mut v = vec![0.0; n];
        for (k, amp) in [20.0, 60.0, 100.0, 60.0, 20.0].iter().enumerate() {
            if let Some(slot) = v.get_mut(at + k) {
                *slot = *amp;
            }
        }
        v
    }

    #[test]
    fn test_poll_without_frame_returns_none() {
        let mut processor = BearingProcessor::new(settings(16), geometry()).unwrap();
        let mut q = ByteQueue::for_frames(16);
        q.push(&[0xFF, 0xFF, 1, 2, 3]);
        assert!(processor.poll(&mut q).unwrap().is_none());
        assert_eq!(processor.frames_decoded(), 0);
        assert_eq!(processor.samples_per_channel(), 16);
        assert_eq!(processor.geometry().sensor_spacing_m, 0.05);
    }

    #[test]
    fn test_channel_b_delayed_gives_positive_lag() {
        let n = 64;
        let a = pulse(n, 20);
        let b = pulse(n, 23);
        let mut q = ByteQueue::for_frames(n);
        q.push(&encode_frame(&a, &b).unwrap());

        let mut processor = BearingProcessor::new(settings(n), geometry()).unwrap();
        let report = processor.poll(&mut q).unwrap().expect("frame should decode");
        assert_eq!(report.correlation.len(), 2 * n - 1);
        assert_eq!(report.peak.index, n - 1 + 3);
        assert_eq!(report.estimate.lag_samples, 3);
        assert!(report.estimate.angle_deg < 0.0);
        assert!(!report.estimate.saturated);
    }

    #[test]
    fn test_skips_garbage_before_frame() {
        let n = 8;
        let mut bytes = vec![0x00, 0x42, 0x17];
        bytes.extend(encode_frame(&pulse(n, 1), &pulse(n, 1)).unwrap());
        let mut q = ByteQueue::for_frames(n);
        q.push(&bytes);

        let mut processor = BearingProcessor::new(settings(n), geometry()).unwrap();
        let report = processor.poll(&mut q).unwrap().expect("frame after garbage");
        assert_eq!(report.estimate.lag_samples, 0);
        assert_eq!(processor.bytes_discarded(), 3);
    }

    #[test]
    fn test_report_layout() {
        let n = 4;
        let mut q = ByteQueue::for_frames(n);
        q.push(&encode_frame(&[1.0, 0.0, 0.0, 0.0], &[1.0, 0.0, 0.0, 0.0]).unwrap());
        let mut processor = BearingProcessor::new(settings(n), geometry()).unwrap();
        let report = processor.poll(&mut q).unwrap().unwrap();

        let mut out = Vec::new();
        report.write_to(&mut out, true).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.split("\r\n").collect();

        assert_eq!(lines[0], "Time Delay: 0.00 us");
        assert_eq!(lines[1], "Source Angle: 0.0 degrees");
        assert!(lines[2].starts_with("Time = "));
        assert_eq!(lines[3], "7");
        assert_eq!(lines[4], "SIG1_DATA_START");
        assert_eq!(lines[5], "1.0000,0.0000,0.0000,0.0000");
        assert_eq!(lines[6], "SIG1_DATA_END");
        assert_eq!(lines[7], "SIG2_DATA_START");
        assert_eq!(lines[9], "SIG2_DATA_END");
        assert_eq!(lines[10], "CORR_DATA_START");
        assert_eq!(
            lines[11],
            "0.0000,0.0000,0.0000,1.0000,0.0000,0.0000,0.0000"
        );
        assert_eq!(lines[12], "CORR_DATA_END");
        assert_eq!(lines[13], "");
    }

    #[test]
    fn test_report_without_blocks() {
        let n = 4;
        let mut q = ByteQueue::for_frames(n);
        q.push(&encode_frame(&[1.0; 4], &[1.0; 4]).unwrap());
        let mut processor = BearingProcessor::new(settings(n), geometry()).unwrap();
        let report = processor.poll(&mut q).unwrap().unwrap();

        let mut out = Vec::new();
        report.write_to(&mut out, false).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("_START"));
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn test_absolute_search_finds_anticorrelation() {
        let n = 32;
        let a = pulse(n, 10);
        let b: Vec<f32> = pulse(n, 12).iter().map(|v| -v).collect();
        let mut q = ByteQueue::for_frames(n);
        q.push(&encode_frame(&a, &b).unwrap());

        let mut s = settings(n);
        s.peak_search = PeakSearch::Absolute;
        let mut processor = BearingProcessor::new(s, geometry()).unwrap();
        let report = processor.poll(&mut q).unwrap().unwrap();
        assert_eq!(report.estimate.lag_samples, 2);
        assert!(report.peak.value > 0.0);
    }

    #[test]
    fn test_fft_backend_agrees_on_peak() {
        let n = 128;
        let a = pulse(n, 40);
        let b = pulse(n, 33);
        let frame_bytes = encode_frame(&a, &b).unwrap();

        let mut direct = BearingProcessor::new(settings(n), geometry()).unwrap();
        let mut fft_settings = settings(n);
        fft_settings.backend = BackendKind::Fft;
        let mut fft = BearingProcessor::new(fft_settings, geometry()).unwrap();

        let mut q1 = ByteQueue::for_frames(n);
        q1.push(&frame_bytes);
        let mut q2 = ByteQueue::for_frames(n);
        q2.push(&frame_bytes);

        let r1 = direct.poll(&mut q1).unwrap().unwrap();
        let r2 = fft.poll(&mut q2).unwrap().unwrap();
        assert_eq!(r1.estimate.lag_samples, -7);
        assert_eq!(r1.peak.index, r2.peak.index);
    }

    #[test]
    fn test_rejects_invalid_geometry() {
        let bad = Geometry {
            sample_rate_hz: 0.0,
            speed_of_sound: 343.0,
            sensor_spacing_m: 0.05,
        };
        assert!(BearingProcessor::new(settings(8), bad).is_err());
    }
}
