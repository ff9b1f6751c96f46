//! 18-decimal fixed-point arithmetic on `U256`.
//!
//! Every price and amount in the pipeline is normalized to this scale before
//! any comparison or arithmetic, and all divisions truncate toward zero so
//! repeated evaluation of the same inputs is bit-identical.

use ethers::types::{I256, U256, U512};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Working precision: 18 fractional digits.
pub const PRECISION: u32 = 18;

/// 10^18 as a raw word.
const ONE_RAW: U256 = U256([1_000_000_000_000_000_000, 0, 0, 0]);

/// Non-negative fixed-point value scaled by 10^18.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Decimal(U256);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid decimal literal: {0}")]
pub struct ParseDecimalError(pub String);

impl Decimal {
    pub const ZERO: Decimal = Decimal(U256::zero());
    pub const ONE: Decimal = Decimal(ONE_RAW);
    pub const MAX: Decimal = Decimal(U256::MAX);

    /// Wrap a value that is already scaled by 10^18.
    pub fn from_raw(raw: U256) -> Self {
        Decimal(raw)
    }

    pub fn from_whole(n: u64) -> Self {
        Decimal(U256::from(n) * ONE_RAW)
    }

    pub fn raw(self) -> U256 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Rescale `value` from a foreign `decimals` precision to the working
    /// precision. Returns `None` if scaling up does not fit in 256 bits;
    /// scaling down truncates toward zero.
    pub fn normalize(value: U256, decimals: u8) -> Option<Self> {
        let decimals = decimals as u32;
        if decimals == PRECISION {
            Some(Decimal(value))
        } else if decimals < PRECISION {
            value
                .checked_mul(U256::exp10((PRECISION - decimals) as usize))
                .map(Decimal)
        } else {
            let shift = decimals - PRECISION;
            // 10^78 exceeds U256, so any wider gap truncates everything
            // representable down to zero.
            if shift > 77 {
                return Some(Decimal::ZERO);
            }
            Some(Decimal(value / U256::exp10(shift as usize)))
        }
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Decimal)
    }

    pub fn saturating_add(self, rhs: Self) -> Self {
        Decimal(self.0.saturating_add(rhs.0))
    }

    pub fn saturating_sub(self, rhs: Self) -> Self {
        Decimal(self.0.saturating_sub(rhs.0))
    }

    /// Fixed-point multiply, truncating toward zero.
    pub fn checked_mul(self, rhs: Self) -> Option<Self> {
        let wide = self.0.full_mul(rhs.0) / U512::from(ONE_RAW);
        u512_to_u256(wide).map(Decimal)
    }

    /// Fixed-point divide, truncating toward zero. `None` on a zero divisor
    /// or when the quotient does not fit.
    pub fn checked_div(self, rhs: Self) -> Option<Self> {
        if rhs.0.is_zero() {
            return None;
        }
        let wide = self.0.full_mul(ONE_RAW) / U512::from(rhs.0);
        u512_to_u256(wide).map(Decimal)
    }

    /// `self * mul / div` with a 512-bit intermediate, truncating toward
    /// zero. The 10^18 scales of `mul` and `div` cancel.
    pub fn mul_div(self, mul: Self, div: Self) -> Option<Self> {
        if div.0.is_zero() {
            return None;
        }
        let wide = self.0.full_mul(mul.0) / U512::from(div.0);
        u512_to_u256(wide).map(Decimal)
    }

    /// `1 - self`, floored at zero. Used for fee-netting factors.
    pub fn complement(self) -> Self {
        Decimal(ONE_RAW.saturating_sub(self.0))
    }

    pub fn half(self) -> Self {
        Decimal(self.0 >> 1)
    }

    /// Lossy conversion for log output only; never used in money math.
    pub fn to_f64_lossy(self) -> f64 {
        self.0.to_string().parse::<f64>().unwrap_or(0.0) / 1e18
    }
}

fn u512_to_u256(value: U512) -> Option<U256> {
    let words = value.0;
    if words[4..].iter().any(|w| *w != 0) {
        return None;
    }
    Some(U256([words[0], words[1], words[2], words[3]]))
}

/// Render a signed 18-decimal raw value (e.g. a profit) as a decimal string.
pub fn format_signed(value: I256) -> String {
    let magnitude = Decimal(value.unsigned_abs());
    if value.is_negative() {
        format!("-{magnitude}")
    } else {
        magnitude.to_string()
    }
}

impl FromStr for Decimal {
    type Err = ParseDecimalError;

    /// Parse a plain decimal literal such as `"0.5"` or `"2000"`.
    /// Fractional digits beyond the working precision are truncated.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(ParseDecimalError(s.to_string()));
        }
        let int = if int_part.is_empty() {
            U256::zero()
        } else {
            U256::from_dec_str(int_part).map_err(|_| ParseDecimalError(s.to_string()))?
        };
        let frac_digits: String = frac_part.chars().take(PRECISION as usize).collect();
        let frac = if frac_digits.is_empty() {
            U256::zero()
        } else {
            let padded = format!("{frac_digits:0<width$}", width = PRECISION as usize);
            U256::from_dec_str(&padded).map_err(|_| ParseDecimalError(s.to_string()))?
        };
        int.checked_mul(ONE_RAW)
            .and_then(|scaled| scaled.checked_add(frac))
            .map(Decimal)
            .ok_or_else(|| ParseDecimalError(s.to_string()))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let int = self.0 / ONE_RAW;
        let frac = self.0 % ONE_RAW;
        if frac.is_zero() {
            return write!(f, "{int}");
        }
        let digits = format!("{:0>width$}", frac.to_string(), width = PRECISION as usize);
        write!(f, "{}.{}", int, digits.trim_end_matches('0'))
    }
}
