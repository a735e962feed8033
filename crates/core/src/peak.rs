//! Peak search over a correlation sequence.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which extremum the pipeline treats as the correlation peak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeakSearch {
    /// Largest signed value.
    #[default]
    Signed,
    /// Largest magnitude.
    Absolute,
}

impl fmt::Display for PeakSearch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signed => write!(f, "signed"),
            Self::Absolute => write!(f, "absolute"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub index: usize,
    pub value: f32,
}

/// Read-only maximum queries over a non-empty sequence.
///
/// All queries use strict `>` so ties resolve to the lowest index.
#[derive(Debug, Clone, Copy)]
pub struct PeakLocator<'a> {
    values: &'a [f32],
}

impl<'a> PeakLocator<'a> {
    pub fn new(values: &'a [f32]) -> Result<Self> {
        ensure!(!values.is_empty(), "peak search over an empty sequence");
        Ok(Self { values })
    }

    /// Largest signed value and its index. The first element seeds the search.
    pub fn max_signed(&self) -> Peak {
        let mut best = Peak {
            index: 0,
            value: self.values[0],
        };
        for (i, &v) in self.values.iter().enumerate().skip(1) {
            if v > best.value {
                best = Peak { index: i, value: v };
            }
        }
        best
    }

    /// Largest magnitude and its index. The search starts from magnitude 0 at
    /// index 0, so an all-zero sequence reports `(0, 0.0)`.
    pub fn max_abs(&self) -> Peak {
        let mut best = Peak {
            index: 0,
            value: 0.0,
        };
        for (i, &v) in self.values.iter().enumerate() {
            if v.abs() > best.value {
                best = Peak {
                    index: i,
                    value: v.abs(),
                };
            }
        }
        best
    }

    pub fn max_value(&self) -> f32 {
        self.max_signed().value
    }

    pub fn max_index(&self) -> usize {
        self.max_signed().index
    }

    pub fn max_abs_value(&self) -> f32 {
        self.max_abs().value
    }

    pub fn max_abs_index(&self) -> usize {
        self.max_abs().index
    }

    pub fn find(&self, search: PeakSearch) -> Peak {
        match search {
            PeakSearch::Signed => self.max_signed(),
            PeakSearch::Absolute => self.max_abs(),
        }
    }
}
