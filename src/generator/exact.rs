//! Unbounded decimal totals for the summing aggregates.

use bytes::{Buf, BufMut, BytesMut};
use num_bigint::BigInt;
use num_traits::Zero;

use super::codec;
use crate::error::GeneratorError;
use crate::value::Val;

/// Largest scale a total can reach: squares of the smallest subnormal
/// double need 648 fractional digits.
const MAX_SCALE: u32 = 1024;

const NAN: u8 = 1;
const POS_INF: u8 = 2;
const NEG_INF: u8 = 4;

/// A running total held exactly as `digits * 10^-scale`.
///
/// Addition never rounds, so the total is the same whatever order values
/// arrive in or partials are merged in. Infinities and NaN are kept as flags
/// beside the finite part.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ExactSum {
    digits: BigInt,
    scale: u32,
    non_finite: u8,
}

impl ExactSum {
    pub(crate) fn from_val(val: &Val) -> Option<ExactSum> {
        let digits = match val {
            Val::Integer(n) => BigInt::from(*n),
            Val::Long(n) | Val::Date(n) => BigInt::from(*n),
            Val::Boolean(b) => BigInt::from(u8::from(*b)),
            _ => return val.as_double().map(ExactSum::from_f64),
        };
        Some(ExactSum {
            digits,
            ..ExactSum::default()
        })
    }

    /// The shortest decimal that reads back as `d`, held exactly.
    pub(crate) fn from_f64(d: f64) -> ExactSum {
        if !d.is_finite() {
            let non_finite = if d.is_nan() {
                NAN
            } else if d > 0.0 {
                POS_INF
            } else {
                NEG_INF
            };
            return ExactSum {
                non_finite,
                ..ExactSum::default()
            };
        }

        let text = format!("{d:e}");
        let (mantissa, exponent) = text.split_once('e').unwrap_or((text.as_str(), "0"));
        let exponent: i64 = exponent.parse().unwrap_or(0);
        let fraction_len = mantissa.split_once('.').map_or(0, |(_, f)| f.len() as i64);
        let digits: BigInt = mantissa.replace('.', "").parse().unwrap_or_default();

        let power = exponent - fraction_len;
        if power >= 0 {
            ExactSum {
                digits: digits * pow10(power as u32),
                ..ExactSum::default()
            }
        } else {
            ExactSum {
                digits,
                scale: (-power) as u32,
                non_finite: 0,
            }
        }
    }

    pub(crate) fn add(&mut self, other: &ExactSum) {
        self.non_finite |= other.non_finite;
        if other.scale > self.scale {
            self.digits *= pow10(other.scale - self.scale);
            self.scale = other.scale;
        }
        if other.scale == self.scale {
            self.digits += &other.digits;
        } else {
            self.digits += &other.digits * pow10(self.scale - other.scale);
        }
    }

    pub(crate) fn square(&self) -> ExactSum {
        let non_finite = match self.non_finite {
            0 => 0,
            f if f & NAN != 0 => NAN,
            _ => POS_INF,
        };
        ExactSum {
            digits: &self.digits * &self.digits,
            scale: self.scale * 2,
            non_finite,
        }
    }

    pub(crate) fn scaled(&self, factor: u64) -> ExactSum {
        ExactSum {
            digits: &self.digits * BigInt::from(factor),
            scale: self.scale,
            non_finite: self.non_finite,
        }
    }

    pub(crate) fn sub(&self, other: &ExactSum) -> ExactSum {
        let mut flipped = other.non_finite & NAN;
        if other.non_finite & POS_INF != 0 {
            flipped |= NEG_INF;
        }
        if other.non_finite & NEG_INF != 0 {
            flipped |= POS_INF;
        }
        let negated = ExactSum {
            digits: -&other.digits,
            scale: other.scale,
            non_finite: flipped,
        };
        let mut out = self.clone();
        out.add(&negated);
        out
    }

    /// The nearest double to the exact total.
    pub(crate) fn to_f64(&self) -> f64 {
        match self.non_finite {
            0 => {}
            f if f & NAN != 0 || f == POS_INF | NEG_INF => return f64::NAN,
            POS_INF => return f64::INFINITY,
            _ => return f64::NEG_INFINITY,
        }
        if self.digits.is_zero() {
            return 0.0;
        }
        format!("{}e-{}", self.digits, self.scale).parse().unwrap_or(f64::NAN)
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u8(self.non_finite);
        buf.put_u32(self.scale);
        codec::write_bytes(buf, &self.digits.to_signed_bytes_be());
    }

    pub(crate) fn read<B: Buf>(buf: &mut B) -> Result<ExactSum, GeneratorError> {
        let non_finite = codec::read_u8(buf)?;
        let scale = codec::read_u32(buf)?;
        if non_finite > NAN | POS_INF | NEG_INF {
            return Err(GeneratorError::InvalidState("unknown non-finite flags"));
        }
        if scale > MAX_SCALE {
            return Err(GeneratorError::InvalidState("decimal scale out of range"));
        }
        let digits = BigInt::from_signed_bytes_be(&codec::read_bytes(buf)?);
        Ok(ExactSum {
            digits,
            scale,
            non_finite,
        })
    }
}

fn pow10(exponent: u32) -> BigInt {
    BigInt::from(10u32).pow(exponent)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total(values: &[f64]) -> f64 {
        let mut sum = ExactSum::default();
        for v in values {
            sum.add(&ExactSum::from_f64(*v));
        }
        sum.to_f64()
    }

    #[test]
    fn test_decimal_digits_are_kept() {
        assert_eq!(total(&[0.1, 0.2]), 0.3);
        assert_eq!(total(&[1e20, 0.123456789012345, -1e20]), 0.123456789012345);
        assert_eq!(total(&[1e20, -1e20, 0.123456789012345]), 0.123456789012345);
    }

    #[test]
    fn test_extremes() {
        assert_eq!(total(&[f64::MAX, -f64::MAX, 5e-324]), 5e-324);
        assert_eq!(total(&[f64::INFINITY, 1.0]), f64::INFINITY);
        assert!(total(&[f64::INFINITY, f64::NEG_INFINITY]).is_nan());
        assert!(total(&[f64::NAN, 1.0]).is_nan());
    }

    #[test]
    fn test_squares() {
        let x = ExactSum::from_f64(-0.5);
        assert_eq!(x.square().to_f64(), 0.25);
        assert_eq!(ExactSum::from_f64(3.0).scaled(4).sub(&x).to_f64(), 12.5);
    }

    #[test]
    fn test_round_trip() {
        let mut buf = BytesMut::new();
        let sum = ExactSum::from_f64(-123.456);
        sum.write(&mut buf);
        let read = ExactSum::read(&mut buf.freeze()).unwrap();
        assert_eq!(read, sum);
    }

    #[test]
    fn test_scale_out_of_range() {
        let mut buf = BytesMut::new();
        buf.put_u8(0);
        buf.put_u32(u32::MAX);
        buf.put_u32(0);
        assert!(matches!(
            ExactSum::read(&mut buf.freeze()),
            Err(GeneratorError::InvalidState(_))
        ));
    }
}
