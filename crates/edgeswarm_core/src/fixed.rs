//! Fixed-point arithmetic shared by the fixed-point physics mode and the
//! deployment runtime.
//!
//! Values are stored in `i32` with `frac_bits` fractional bits. Products are
//! accumulated in `i64` at double scale and rounded once to nearest when
//! narrowed back. Every conversion saturates instead of wrapping.

use serde::{Deserialize, Serialize};

pub const MIN_FRAC_BITS: u8 = 1;
pub const MAX_FRAC_BITS: u8 = 24;

/// Tanh is tabulated on `[-TANH_RANGE, TANH_RANGE]`.
pub const TANH_RANGE: i64 = 8;
/// Table segments per unit of input.
pub const TANH_SEGMENTS_PER_UNIT: i64 = 128;
const TANH_SEGMENTS: usize = (2 * TANH_RANGE * TANH_SEGMENTS_PER_UNIT) as usize;

/// Upper bound on the table's deviation from tanh that does not shrink with
/// the fractional bits: chord error of the interpolation plus the saturated tail.
pub const TANH_TABLE_ERROR: f64 = 1e-5;

/// A signed Q-format with `frac_bits` fractional bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QFormat {
    frac_bits: u8,
}

impl QFormat {
    pub fn new(frac_bits: u8) -> anyhow::Result<Self> {
        anyhow::ensure!(
            (MIN_FRAC_BITS..=MAX_FRAC_BITS).contains(&frac_bits),
            "fractional bits must be in [{MIN_FRAC_BITS}, {MAX_FRAC_BITS}], got {frac_bits}"
        );
        Ok(Self { frac_bits })
    }

    #[must_use]
    pub fn frac_bits(self) -> u8 {
        self.frac_bits
    }

    /// Raw representation of 1.0.
    #[must_use]
    pub fn one(self) -> i32 {
        1i32 << self.frac_bits
    }

    /// Value of one least-significant bit, `2^-frac_bits`.
    #[must_use]
    pub fn resolution(self) -> f64 {
        (-(self.frac_bits as f64)).exp2()
    }

    /// Largest representable real.
    #[must_use]
    pub fn max_value(self) -> f64 {
        i32::MAX as f64 * self.resolution()
    }

    /// Nearest representable value; NaN maps to zero, out-of-range saturates.
    #[must_use]
    pub fn to_fixed(self, value: f64) -> i32 {
        if value.is_nan() {
            return 0;
        }
        let scaled = (value * (1u64 << self.frac_bits) as f64).round();
        // `as` saturates float-to-int conversions.
        scaled as i32
    }

    /// True when `value` lies outside the representable range.
    #[must_use]
    pub fn saturates(self, value: f64) -> bool {
        let scaled = (value * (1u64 << self.frac_bits) as f64).round();
        !(i32::MIN as f64..=i32::MAX as f64).contains(&scaled)
    }

    #[must_use]
    pub fn to_float(self, raw: i32) -> f64 {
        raw as f64 * self.resolution()
    }

    /// Narrows a double-scale accumulator to this format, rounding to nearest.
    #[must_use]
    pub fn narrow(self, acc: i64) -> i32 {
        let shift = self.frac_bits as u32;
        let half = 1i64 << (shift - 1);
        let rounded = acc.saturating_add(half) >> shift;
        rounded.clamp(i32::MIN as i64, i32::MAX as i64) as i32
    }

    /// Widens a value to the double-scale accumulator domain.
    #[must_use]
    pub fn widen(self, raw: i32) -> i64 {
        (raw as i64) << self.frac_bits
    }

    /// Rounded, saturating product.
    #[must_use]
    pub fn mul(self, a: i32, b: i32) -> i32 {
        self.narrow(a as i64 * b as i64)
    }

    /// Multiply-accumulate into a double-scale accumulator.
    #[must_use]
    pub fn mac(self, acc: i64, a: i32, b: i32) -> i64 {
        acc.saturating_add(a as i64 * b as i64)
    }

    #[must_use]
    pub fn add(self, a: i32, b: i32) -> i32 {
        a.saturating_add(b)
    }
}

/// Piecewise-linear tanh over a fixed-point input.
///
/// Built once; evaluation only indexes and interpolates.
#[derive(Debug, Clone, PartialEq)]
pub struct TanhTable {
    format: QFormat,
    knots: Vec<i32>,
}

impl TanhTable {
    #[must_use]
    pub fn new(format: QFormat) -> Self {
        let step = 1.0 / TANH_SEGMENTS_PER_UNIT as f64;
        let knots = (0..=TANH_SEGMENTS)
            .map(|i| format.to_fixed((-(TANH_RANGE as f64) + i as f64 * step).tanh()))
            .collect();
        Self { format, knots }
    }

    #[must_use]
    pub fn format(&self) -> QFormat {
        self.format
    }

    #[must_use]
    pub fn eval(&self, x: i32) -> i32 {
        let fb = self.format.frac_bits as u32;
        let one = self.format.one();
        let offset = (x as i64) + (TANH_RANGE << fb);
        if offset <= 0 {
            return -one;
        }
        let position = offset * TANH_SEGMENTS_PER_UNIT;
        let index = (position >> fb) as usize;
        if index >= TANH_SEGMENTS {
            return one;
        }
        let frac = position & ((1i64 << fb) - 1);
        let lo = self.knots[index] as i64;
        let hi = self.knots[index + 1] as i64;
        (lo + (((hi - lo) * frac) >> fb)) as i32
    }
}
