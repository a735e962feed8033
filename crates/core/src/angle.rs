//! Lag-to-bearing conversion under a far-field planar-wavefront model.
//!
//! A lag of `k` samples is a path difference of `k / Fs * c` metres across a
//! baseline of `d` metres; the bearing is `-asin(path / d)`. A positive lag
//! (channel A leads) maps to a negative bearing.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// Process-wide sensor geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub sample_rate_hz: f64,
    pub speed_of_sound: f64,
    pub sensor_spacing_m: f64,
}

/// Result of converting one peak index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleEstimate {
    pub lag_samples: isize,
    pub time_delay_s: f64,
    /// Path difference over spacing before clamping. Values outside
    /// `[-1, 1]` are geometrically impossible.
    pub raw_arg: f64,
    /// True when `raw_arg` was clamped.
    pub saturated: bool,
    pub angle_deg: f64,
}

impl AngleEstimate {
    pub fn time_delay_us(&self) -> f64 {
        self.time_delay_s * 1_000_000.0
    }
}

impl Geometry {
    pub fn new(sample_rate_hz: f64, speed_of_sound: f64, sensor_spacing_m: f64) -> Result<Self> {
        let geometry = Self {
            sample_rate_hz,
            speed_of_sound,
            sensor_spacing_m,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.sample_rate_hz.is_finite() && self.sample_rate_hz > 0.0,
            "sample rate must be positive, got {}",
            self.sample_rate_hz
        );
        ensure!(
            self.speed_of_sound.is_finite() && self.speed_of_sound > 0.0,
            "propagation speed must be positive, got {}",
            self.speed_of_sound
        );
        ensure!(
            self.sensor_spacing_m.is_finite() && self.sensor_spacing_m > 0.0,
            "sensor spacing must be positive, got {}",
            self.sensor_spacing_m
        );
        Ok(())
    }

    /// Largest lag (in samples) that still maps to a physical bearing.
    pub fn max_physical_lag(&self) -> f64 {
        self.sensor_spacing_m * self.sample_rate_hz / self.speed_of_sound
    }

    /// Converts the peak index of a `2N-1` correlation sequence into a bearing.
    pub fn estimate(&self, peak_index: usize, input_len: usize) -> Result<AngleEstimate> {
        ensure!(input_len > 0, "input length must be non-zero");
        ensure!(
            peak_index < 2 * input_len - 1,
            "peak index {} outside a correlation of {} values",
            peak_index,
            2 * input_len - 1
        );

        let lag_samples = peak_index as isize - (input_len as isize - 1);
        Ok(self.estimate_lag(lag_samples))
    }

    pub fn estimate_lag(&self, lag_samples: isize) -> AngleEstimate {
        let time_delay_s = lag_samples as f64 / self.sample_rate_hz;
        let raw_arg = (time_delay_s * self.speed_of_sound) / self.sensor_spacing_m;
        let saturated = raw_arg.abs() > 1.0;

        // asin(±1) is exactly ±90°; skip the radian round-trip for it
        let angle_deg = if raw_arg.abs() >= 1.0 {
            -90.0 * raw_arg.signum()
        } else {
            -raw_arg.asin().to_degrees()
        };

        AngleEstimate {
            lag_samples,
            time_delay_s,
            raw_arg,
            saturated,
            angle_deg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> Geometry {
        Geometry::new(250_000.0, 343.0, 0.05).unwrap()
    }

    #[test]
    fn test_zero_lag_is_broadside() {
        let est = geometry().estimate(249, 250).unwrap();
        assert_eq!(est.lag_samples, 0);
        assert_eq!(est.time_delay_s, 0.0);
        assert!(!est.saturated);
        assert_eq!(est.angle_deg, 0.0);
    }

    #[test]
    fn test_saturated_negative_lag() {
        let est = geometry().estimate(124, 250).unwrap();
        assert_eq!(est.lag_samples, -125);
        assert!((est.time_delay_s + 0.0005).abs() < 1e-12);
        assert!((est.raw_arg + 3.43).abs() < 1e-9, "raw_arg = {}", est.raw_arg);
        assert!(est.saturated);
        assert_eq!(est.angle_deg, 90.0);
    }

    #[test]
    fn test_saturated_positive_lag() {
        let est = geometry().estimate_lag(200);
        assert!(est.saturated);
        assert!(est.raw_arg > 1.0);
        assert_eq!(est.angle_deg, -90.0);
    }

    #[test]
    fn test_clamp_sign_follows_argument() {
        let g = geometry();
        let max_lag = g.max_physical_lag();
        for lag in -249isize..=249 {
            let est = g.estimate_lag(lag);
            if (lag as f64).abs() > max_lag {
                assert!(est.saturated, "lag {} should saturate", lag);
                assert_eq!(est.angle_deg, -90.0 * (lag as f64).signum());
            } else {
                assert!(!est.saturated, "lag {} should not saturate", lag);
                assert!(est.angle_deg.abs() <= 90.0);
            }
        }
    }

    #[test]
    fn test_in_range_lag() {
        // 10 samples at 250kHz = 40us; 40us * 343 / 0.05 = 0.2744
        let est = geometry().estimate_lag(10);
        assert!(!est.saturated);
        assert!((est.raw_arg - 0.2744).abs() < 1e-9);
        let expected = -(0.2744f64).asin().to_degrees();
        assert!((est.angle_deg - expected).abs() < 1e-9);
        assert!(est.angle_deg < 0.0, "A leading must give a negative bearing");
        assert!((est.time_delay_us() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_bearing_is_antisymmetric() {
        let g = geometry();
        for lag in 1..30 {
            let pos = g.estimate_lag(lag);
            let neg = g.estimate_lag(-lag);
            assert!((pos.angle_deg + neg.angle_deg).abs() < 1e-9);
        }
    }

    #[test]
    fn test_peak_index_out_of_range() {
        assert!(geometry().estimate(499, 250).is_err());
        assert!(geometry().estimate(0, 0).is_err());
        assert!(geometry().estimate(498, 250).is_ok());
    }

    #[test]
    fn test_rejects_invalid_geometry() {
        assert!(Geometry::new(0.0, 343.0, 0.05).is_err());
        assert!(Geometry::new(250_000.0, -1.0, 0.05).is_err());
        assert!(Geometry::new(250_000.0, 343.0, 0.0).is_err());
        assert!(Geometry::new(f64::NAN, 343.0, 0.05).is_err());
    }
}
