//! Owned per-cycle sample containers.
//!
//! A `SampleBuffer` holds one channel of one frame, a `CorrelationResult` the
//! `2N-1` lags computed from a pair of them. Both are created by the cycle
//! that uses them and dropped at its end.

use crate::constants::result_len;
use anyhow::{ensure, Result};

/// One channel's samples for a single processing cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    samples: Vec<f32>,
}

impl SampleBuffer {
    /// Wraps `samples`, requiring exactly `expected_len` of them.
    pub fn new(samples: Vec<f32>, expected_len: usize) -> Result<Self> {
        ensure!(expected_len > 0, "sample buffer length must be non-zero");
        ensure!(
            samples.len() == expected_len,
            "sample buffer holds {} samples, expected {}",
            samples.len(),
            expected_len
        );
        Ok(Self { samples })
    }

    /// Converts raw wire bytes into samples. Each byte is a two's complement
    /// `i8`, sign-extended without scaling.
    pub fn from_wire(bytes: &[u8]) -> Result<Self> {
        let samples = bytes.iter().map(|&b| b as i8 as f32).collect::<Vec<_>>();
        let len = samples.len();
        Self::new(samples, len)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Never true for a constructed buffer.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.samples
    }

    /// Sum of squared samples, accumulated in index order.
    pub fn energy(&self) -> f32 {
        let mut sum = 0.0f32;
        for &s in &self.samples {
            sum += s * s;
        }
        sum
    }
}

/// Correlation (or convolution) output for one buffer pair.
///
/// Index `i` corresponds to lag `i - (N - 1)`; index `N - 1` is zero lag.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationResult {
    values: Vec<f32>,
    input_len: usize,
}

impl CorrelationResult {
    pub(crate) fn zeroed(input_len: usize) -> Self {
        Self {
            values: vec![0.0; result_len(input_len)],
            input_len,
        }
    }

    /// Builds a result from precomputed values. `values.len()` must be `2N - 1`.
    pub fn from_values(values: Vec<f32>, input_len: usize) -> Result<Self> {
        ensure!(input_len > 0, "input length must be non-zero");
        ensure!(
            values.len() == result_len(input_len),
            "correlation result holds {} values, expected {} for N = {}",
            values.len(),
            result_len(input_len),
            input_len
        );
        Ok(Self { values, input_len })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Samples per input channel (`N`).
    pub fn input_len(&self) -> usize {
        self.input_len
    }

    pub fn zero_lag_index(&self) -> usize {
        self.input_len - 1
    }

    /// Lag in samples represented by `index`.
    pub fn lag_at(&self, index: usize) -> isize {
        index as isize - self.zero_lag_index() as isize
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.values
    }
}
