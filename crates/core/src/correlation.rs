//! Cross-correlation and convolution of two equal-length sample buffers.
//!
//! The engine owns a backend. [`DirectBackend`] is the O(N²) reference: one
//! running `f32` sum per output index, accumulated in increasing `j` order.
//! [`FftBackend`] computes the same sequence through zero-padded FFTs and
//! matches the reference within floating-point tolerance.

use crate::buffer::{CorrelationResult, SampleBuffer};
use crate::constants::result_len;
use anyhow::{ensure, Result};
use rustfft::{num_complex::Complex64, Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationMode {
    /// Slide and multiply, no flip: `r[i] = Σ a[j] * b[j + lag]`.
    #[default]
    CrossCorrelation,
    /// Standard linear convolution: `r[i] = Σ a[j] * b[i - j]`.
    Convolution,
}

impl fmt::Display for CorrelationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CrossCorrelation => write!(f, "cross-correlation"),
            Self::Convolution => write!(f, "convolution"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Direct,
    Fft,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Fft => write!(f, "fft"),
        }
    }
}

/// Computes a full `2N-1` sequence into `out`.
///
/// The engine passes `a.len() == b.len() == n` and `out.len() == 2n - 1`.
/// Backends planned for one `n` report it through [`planned_len`] and
/// reject any other length.
///
/// [`planned_len`]: CorrelationBackend::planned_len
pub trait CorrelationBackend: Send {
    fn compute(&mut self, a: &[f32], b: &[f32], mode: CorrelationMode, out: &mut [f32])
        -> Result<()>;

    /// Input length the backend was sized for, if it is fixed.
    fn planned_len(&self) -> Option<usize> {
        None
    }
}

/// Reference O(N²) implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectBackend;

impl CorrelationBackend for DirectBackend {
    fn compute(
        &mut self,
        a: &[f32],
        b: &[f32],
        mode: CorrelationMode,
        out: &mut [f32],
    ) -> Result<()> {
        ensure!(a.len() == b.len(), "input lengths differ: {} vs {}", a.len(), b.len());
        ensure!(
            out.len() == result_len(a.len()),
            "output holds {} values, {} needed",
            out.len(),
            result_len(a.len())
        );
        let n = a.len() as isize;
        for (i, slot) in out.iter_mut().enumerate() {
            let i = i as isize;
            let mut sum = 0.0f32;
            match mode {
                CorrelationMode::CrossCorrelation => {
                    let lag = i - (n - 1);
                    for j in 0..n {
                        let k = j + lag;
                        if k >= 0 && k < n {
                            sum += a[j as usize] * b[k as usize];
                        }
                    }
                }
                CorrelationMode::Convolution => {
                    for j in 0..n {
                        let k = i - j;
                        if k >= 0 && k < n {
                            sum += a[j as usize] * b[k as usize];
                        }
                    }
                }
            }
            *slot = sum;
        }
        Ok(())
    }
}

/// Zero-padded FFT implementation, planned once for a fixed `N`.
pub struct FftBackend {
    input_len: usize,
    size: usize,
    fft_forward: Arc<dyn Fft<f64>>,
    fft_inverse: Arc<dyn Fft<f64>>,
    spectrum_a: Vec<Complex64>,
    spectrum_b: Vec<Complex64>,
    scratch: Vec<Complex64>,
}

impl fmt::Debug for FftBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftBackend")
            .field("input_len", &self.input_len)
            .field("size", &self.size)
            .finish()
    }
}

impl FftBackend {
    /// Plans transforms large enough for two inputs of `input_len` samples
    /// without circular wraparound.
    pub fn new(input_len: usize) -> Self {
        let size = result_len(input_len).max(1).next_power_of_two();
        let mut planner = FftPlanner::new();
        let fft_forward = planner.plan_fft_forward(size);
        let fft_inverse = planner.plan_fft_inverse(size);
        let scratch_len = fft_forward
            .get_inplace_scratch_len()
            .max(fft_inverse.get_inplace_scratch_len());

        Self {
            input_len,
            size,
            fft_forward,
            fft_inverse,
            spectrum_a: vec![Complex64::new(0.0, 0.0); size],
            spectrum_b: vec![Complex64::new(0.0, 0.0); size],
            scratch: vec![Complex64::new(0.0, 0.0); scratch_len],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn load(dst: &mut [Complex64], src: &[f32]) {
        dst.fill(Complex64::new(0.0, 0.0));
        for (d, &s) in dst.iter_mut().zip(src) {
            *d = Complex64::new(s as f64, 0.0);
        }
    }
}

impl CorrelationBackend for FftBackend {
    fn compute(
        &mut self,
        a: &[f32],
        b: &[f32],
        mode: CorrelationMode,
        out: &mut [f32],
    ) -> Result<()> {
        let n = self.input_len;
        ensure!(
            a.len() == n && b.len() == n,
            "FFT planned for {} samples, got {} and {}",
            n,
            a.len(),
            b.len()
        );
        ensure!(
            out.len() == result_len(n),
            "output holds {} values, {} needed",
            out.len(),
            result_len(n)
        );

        Self::load(&mut self.spectrum_a, a);
        Self::load(&mut self.spectrum_b, b);
        self.fft_forward
            .process_with_scratch(&mut self.spectrum_a, &mut self.scratch);
        self.fft_forward
            .process_with_scratch(&mut self.spectrum_b, &mut self.scratch);

        // conj(A)·B yields Σ a[j] b[j + k] at index k (mod size)
        for (x, y) in self.spectrum_a.iter_mut().zip(&self.spectrum_b) {
            *x = match mode {
                CorrelationMode::CrossCorrelation => x.conj() * y,
                CorrelationMode::Convolution => *x * y,
            };
        }
        self.fft_inverse
            .process_with_scratch(&mut self.spectrum_a, &mut self.scratch);

        let scale = 1.0 / self.size as f64;
        for (i, slot) in out.iter_mut().enumerate() {
            let idx = match mode {
                CorrelationMode::CrossCorrelation => {
                    (i + self.size - (n - 1)) % self.size
                }
                CorrelationMode::Convolution => i,
            };
            *slot = (self.spectrum_a[idx].re * scale) as f32;
        }
        Ok(())
    }

    fn planned_len(&self) -> Option<usize> {
        Some(self.input_len)
    }
}

/// Correlates buffer pairs of a fixed length `N` in a fixed mode.
pub struct CorrelationEngine {
    input_len: usize,
    mode: CorrelationMode,
    backend: Box<dyn CorrelationBackend>,
}

impl fmt::Debug for CorrelationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrelationEngine")
            .field("input_len", &self.input_len)
            .field("mode", &self.mode)
            .finish()
    }
}

impl CorrelationEngine {
    /// Creates an engine using the reference backend.
    pub fn new(input_len: usize, mode: CorrelationMode) -> Result<Self> {
        Self::with_backend(input_len, mode, Box::new(DirectBackend))
    }

    pub fn with_kind(input_len: usize, mode: CorrelationMode, kind: BackendKind) -> Result<Self> {
        let backend: Box<dyn CorrelationBackend> = match kind {
            BackendKind::Direct => Box::new(DirectBackend),
            BackendKind::Fft => Box::new(FftBackend::new(input_len)),
        };
        Self::with_backend(input_len, mode, backend)
    }

    pub fn with_backend(
        input_len: usize,
        mode: CorrelationMode,
        backend: Box<dyn CorrelationBackend>,
    ) -> Result<Self> {
        ensure!(input_len > 0, "correlation input length must be non-zero");
        if let Some(planned) = backend.planned_len() {
            ensure!(
                planned == input_len,
                "backend planned for {} samples, engine configured for {}",
                planned,
                input_len
            );
        }
        Ok(Self {
            input_len,
            mode,
            backend,
        })
    }

    pub fn input_len(&self) -> usize {
        self.input_len
    }

    pub fn mode(&self) -> CorrelationMode {
        self.mode
    }

    /// Computes the full `2N-1` sequence for `a` and `b`.
    ///
    /// Both buffers must hold exactly `N` samples.
    pub fn compute(&mut self, a: &SampleBuffer, b: &SampleBuffer) -> Result<CorrelationResult> {
        ensure!(
            a.len() == self.input_len,
            "channel A holds {} samples, engine expects {}",
            a.len(),
            self.input_len
        );
        ensure!(
            b.len() == self.input_len,
            "channel B holds {} samples, engine expects {}",
            b.len(),
            self.input_len
        );

        let mut result = CorrelationResult::zeroed(self.input_len);
        self.backend
            .compute(a.as_slice(), b.as_slice(), self.mode, result.as_mut_slice())?;
        Ok(result)
    }
}
