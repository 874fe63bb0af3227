//! Bloom filter sizing from expected item count and target false-positive rate.

use std::f64::consts::LN_2;

/// Rate used when the configured one is not strictly between 0 and 1.
pub const DEFAULT_FALSE_POSITIVE_RATE: f64 = 0.01;

/// Bit count `m` and hash count `k` for a given capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizingParams {
    pub bits: usize,
    pub hashes: u32,
}

impl SizingParams {
    /// `m = round(-n·ln(p) / ln(2)²)`, `k = round(m/n · ln 2)`, both at least 1.
    ///
    /// `expected_items == 0` is treated as 1; an out-of-range rate falls back to
    /// [`DEFAULT_FALSE_POSITIVE_RATE`].
    pub fn for_capacity(expected_items: usize, false_positive_rate: f64) -> Self {
        let n = expected_items.max(1) as f64;
        let p = effective_rate(false_positive_rate);
        let bits = (-n * p.ln() / (LN_2 * LN_2)).round().max(1.0);
        let hashes = (bits / n * LN_2).round().max(1.0);
        Self {
            bits: bits as usize,
            hashes: hashes as u32,
        }
    }

    /// Bits rounded up to whole 64-bit words.
    pub fn words(&self) -> usize {
        (self.bits + 63) / 64
    }
}

pub(crate) fn effective_rate(rate: f64) -> f64 {
    if rate > 0.0 && rate < 1.0 {
        rate
    } else {
        DEFAULT_FALSE_POSITIVE_RATE
    }
}
