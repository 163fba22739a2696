//! Exact decimal values for `Decimal(P, S)` columns.
//!
//! ClickHouse stores a decimal as a signed integer mantissa of 4, 8, 16 or
//! 32 bytes. `Decimal256` mantissas do not fit any primitive, so the value is
//! kept as a `BigInt` plus a scale and never goes through floating point.

use std::fmt;
use std::str::FromStr;

use num_bigint::{BigInt, Sign};
use num_traits::{Signed, Zero};

use super::TypeError;

/// Arbitrary-precision decimal: `mantissa * 10^-scale`.
///
/// Equality is structural, so `1.5` and `1.50` differ. Use [`Decimal::rescale`]
/// to compare values of different scales.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Decimal {
    mantissa: BigInt,
    scale: u32,
}

fn pow10(exp: u32) -> BigInt {
    BigInt::from(10u8).pow(exp)
}

impl Decimal {
    pub fn new(mantissa: impl Into<BigInt>, scale: u32) -> Self {
        Self {
            mantissa: mantissa.into(),
            scale,
        }
    }

    pub fn mantissa(&self) -> &BigInt {
        &self.mantissa
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn into_parts(self) -> (BigInt, u32) {
        (self.mantissa, self.scale)
    }

    pub fn is_negative(&self) -> bool {
        self.mantissa.is_negative()
    }

    /// Same value at another scale, rounding half away from zero when digits
    /// are dropped.
    pub fn rescale(&self, scale: u32) -> Decimal {
        if scale >= self.scale {
            return Decimal::new(&self.mantissa * pow10(scale - self.scale), scale);
        }
        let divisor = pow10(self.scale - scale);
        let mut quotient = &self.mantissa / &divisor;
        let remainder = &self.mantissa % &divisor;
        if remainder.abs() * 2 >= divisor {
            quotient += self.mantissa.signum();
        }
        Decimal::new(quotient, scale)
    }

    /// Lossy conversion for display and arithmetic outside the database.
    pub fn to_f64(&self) -> f64 {
        self.to_string().parse().unwrap_or(f64::NAN)
    }
}

impl From<i64> for Decimal {
    fn from(v: i64) -> Self {
        Decimal::new(v, 0)
    }
}

impl From<u64> for Decimal {
    fn from(v: u64) -> Self {
        Decimal::new(v, 0)
    }
}

impl From<i128> for Decimal {
    fn from(v: i128) -> Self {
        Decimal::new(v, 0)
    }
}

impl From<BigInt> for Decimal {
    fn from(v: BigInt) -> Self {
        Decimal::new(v, 0)
    }
}

impl FromStr for Decimal {
    type Err = TypeError;

    /// Accepts `-12.345`, `+7`, `.5` and exponent forms such as `1.5e-3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TypeError::InvalidData(format!("Invalid decimal: '{}'", s));
        let text = s.trim();

        let (number, exponent) = match text.find(['e', 'E']) {
            Some(i) => (
                &text[..i],
                text[i + 1..].parse::<i64>().map_err(|_| invalid())?,
            ),
            None => (text, 0),
        };
        let (negative, number) = match number.as_bytes().first() {
            Some(b'-') => (true, &number[1..]),
            Some(b'+') => (false, &number[1..]),
            _ => (false, number),
        };
        let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
        let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
        if int_part.len() + frac_part.len() == 0 || !all_digits(int_part) || !all_digits(frac_part)
        {
            return Err(invalid());
        }

        let digits = format!("{}{}", int_part, frac_part);
        let magnitude = num_bigint::BigUint::parse_bytes(digits.as_bytes(), 10).ok_or_else(invalid)?;
        let sign = if negative { Sign::Minus } else { Sign::Plus };
        let mantissa = BigInt::from_biguint(sign, magnitude);

        let scale = frac_part.len() as i64 - exponent;
        if scale >= 0 {
            let scale = u32::try_from(scale).map_err(|_| invalid())?;
            Ok(Decimal::new(mantissa, scale))
        } else {
            let shift = u32::try_from(-scale).map_err(|_| invalid())?;
            Ok(Decimal::new(mantissa * pow10(shift), 0))
        }
    }
}

impl fmt::Display for Decimal {
    /// Plain notation, never scientific. Trailing zeros up to `scale` are kept.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mantissa.is_negative() && !self.mantissa.is_zero() {
            f.write_str("-")?;
        }
        let digits = self.mantissa.magnitude().to_string();
        let scale = self.scale as usize;
        if scale == 0 {
            return f.write_str(&digits);
        }
        if digits.len() > scale {
            let (int, frac) = digits.split_at(digits.len() - scale);
            write!(f, "{}.{}", int, frac)
        } else {
            write!(f, "0.{:0>width$}", digits, width = scale)
        }
    }
}

#[cfg(feature = "rust_decimal")]
mod rust_decimal_compat {
    use super::*;

    impl From<rust_decimal::Decimal> for Decimal {
        fn from(d: rust_decimal::Decimal) -> Self {
            Decimal::new(d.mantissa(), d.scale())
        }
    }

    impl TryFrom<&Decimal> for rust_decimal::Decimal {
        type Error = TypeError;

        fn try_from(d: &Decimal) -> Result<Self, Self::Error> {
            let mantissa = i128::try_from(d.mantissa()).map_err(|_| {
                TypeError::InvalidData(format!("{} exceeds rust_decimal range", d))
            })?;
            rust_decimal::Decimal::try_from_i128_with_scale(mantissa, d.scale())
                .map_err(|e| TypeError::InvalidData(e.to_string()))
        }
    }
}
