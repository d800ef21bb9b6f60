//! Running state for the single-argument aggregates.

use std::collections::HashSet;

use bytes::{Buf, BufMut, BytesMut};

use super::codec;
use super::exact::ExactSum;
use crate::error::GeneratorError;
use crate::value::Val;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateKind {
    Sum,
    Average,
    Min,
    Max,
    Variance,
    StDev,
    CountUnique,
}

impl AggregateKind {
    pub fn name(self) -> &'static str {
        match self {
            AggregateKind::Sum => "sum",
            AggregateKind::Average => "average",
            AggregateKind::Min => "min",
            AggregateKind::Max => "max",
            AggregateKind::Variance => "variance",
            AggregateKind::StDev => "stDev",
            AggregateKind::CountUnique => "countUnique",
        }
    }
}

#[derive(Debug, Clone)]
enum Accumulator {
    /// Sum and average
    Total { n: u64, sum: ExactSum },
    Extreme(Option<f64>),
    /// Variance and standard deviation
    Moments {
        n: u64,
        sum: ExactSum,
        squares: ExactSum,
    },
    Unique(HashSet<Val>),
}

/// Accumulated state of one aggregate.
///
/// Nulls are skipped. An error value, or a value that has no numeric form,
/// poisons the state; when several errors are seen the lexically smallest
/// message wins so the outcome does not depend on arrival or merge order.
#[derive(Debug, Clone)]
pub struct AggregateState {
    kind: AggregateKind,
    acc: Accumulator,
    error: Option<String>,
}

impl AggregateState {
    pub fn new(kind: AggregateKind) -> Self {
        let acc = match kind {
            AggregateKind::Sum | AggregateKind::Average => Accumulator::Total {
                n: 0,
                sum: ExactSum::default(),
            },
            AggregateKind::Min | AggregateKind::Max => Accumulator::Extreme(None),
            AggregateKind::Variance | AggregateKind::StDev => Accumulator::Moments {
                n: 0,
                sum: ExactSum::default(),
                squares: ExactSum::default(),
            },
            AggregateKind::CountUnique => Accumulator::Unique(HashSet::new()),
        };
        AggregateState {
            kind,
            acc,
            error: None,
        }
    }

    pub fn kind(&self) -> AggregateKind {
        self.kind
    }

    fn record_error(&mut self, message: &str) {
        match &self.error {
            Some(existing) if existing.as_str() <= message => {}
            _ => self.error = Some(message.to_string()),
        }
    }

    pub fn add(&mut self, val: &Val) {
        match val {
            Val::Null => return,
            Val::Err(message) => {
                self.record_error(message);
                return;
            }
            _ => {}
        }

        if let Accumulator::Unique(seen) = &mut self.acc {
            seen.insert(val.clone());
            return;
        }

        let Some(num) = ExactSum::from_val(val) else {
            let text = val.as_string().unwrap_or_default();
            self.record_error(&format!("Unable to use '{text}' in {}", self.kind.name()));
            return;
        };

        let is_min = self.kind == AggregateKind::Min;
        match &mut self.acc {
            Accumulator::Total { n, sum } => {
                *n += 1;
                sum.add(&num);
            }
            Accumulator::Extreme(current) => {
                let d = num.to_f64();
                *current = Some(match *current {
                    None => d,
                    Some(c) if is_min => c.min(d),
                    Some(c) => c.max(d),
                });
            }
            Accumulator::Moments { n, sum, squares } => {
                *n += 1;
                squares.add(&num.square());
                sum.add(&num);
            }
            Accumulator::Unique(_) => {}
        }
    }

    pub fn merge(&mut self, other: &AggregateState) -> Result<(), GeneratorError> {
        if self.kind != other.kind {
            return Err(GeneratorError::ShapeMismatch {
                expected: self.kind.name(),
                found: other.kind.name(),
            });
        }
        if let Some(message) = &other.error {
            self.record_error(message);
        }

        let is_min = self.kind == AggregateKind::Min;
        match (&mut self.acc, &other.acc) {
            (Accumulator::Total { n, sum }, Accumulator::Total { n: on, sum: os }) => {
                *n += on;
                sum.add(os);
            }
            (Accumulator::Extreme(current), Accumulator::Extreme(o)) => {
                *current = match (*current, *o) {
                    (None, x) | (x, None) => x,
                    (Some(a), Some(b)) if is_min => Some(a.min(b)),
                    (Some(a), Some(b)) => Some(a.max(b)),
                };
            }
            (
                Accumulator::Moments { n, sum, squares },
                Accumulator::Moments {
                    n: on,
                    sum: os,
                    squares: oq,
                },
            ) => {
                *n += on;
                sum.add(os);
                squares.add(oq);
            }
            (Accumulator::Unique(seen), Accumulator::Unique(o)) => {
                seen.extend(o.iter().cloned());
            }
            _ => {
                return Err(GeneratorError::ShapeMismatch {
                    expected: self.kind.name(),
                    found: other.kind.name(),
                });
            }
        }
        Ok(())
    }

    pub fn eval(&self) -> Val {
        if let Some(message) = &self.error {
            return Val::err(message.clone());
        }
        match &self.acc {
            Accumulator::Total { n: 0, .. } | Accumulator::Moments { n: 0, .. } => Val::Null,
            Accumulator::Total { n, sum } => match self.kind {
                AggregateKind::Average => Val::Double(sum.to_f64() / *n as f64),
                _ => Val::Double(sum.to_f64()),
            },
            Accumulator::Extreme(current) => current.map(Val::Double).unwrap_or(Val::Null),
            Accumulator::Moments { n, sum, squares } => {
                let variance = variance(*n, sum, squares);
                if self.kind == AggregateKind::StDev {
                    Val::Double(variance.sqrt())
                } else {
                    Val::Double(variance)
                }
            }
            Accumulator::Unique(seen) => Val::Integer(i32::try_from(seen.len()).unwrap_or(i32::MAX)),
        }
    }

    pub fn write(&self, buf: &mut BytesMut) {
        codec::write_optional_str(buf, self.error.as_deref());
        match &self.acc {
            Accumulator::Total { n, sum } => {
                buf.put_u64(*n);
                sum.write(buf);
            }
            Accumulator::Extreme(current) => match current {
                None => buf.put_u8(0),
                Some(d) => {
                    buf.put_u8(1);
                    buf.put_f64(*d);
                }
            },
            Accumulator::Moments { n, sum, squares } => {
                buf.put_u64(*n);
                sum.write(buf);
                squares.write(buf);
            }
            Accumulator::Unique(seen) => {
                buf.put_u32(seen.len() as u32);
                for v in seen {
                    codec::write_val(buf, v);
                }
            }
        }
    }

    pub fn read<B: Buf>(&mut self, buf: &mut B) -> Result<(), GeneratorError> {
        self.error = codec::read_optional_str(buf)?;
        self.acc = match &self.acc {
            Accumulator::Total { .. } => Accumulator::Total {
                n: codec::read_u64(buf)?,
                sum: ExactSum::read(buf)?,
            },
            Accumulator::Extreme(_) => match codec::read_u8(buf)? {
                0 => Accumulator::Extreme(None),
                _ => Accumulator::Extreme(Some(codec::read_f64(buf)?)),
            },
            Accumulator::Moments { .. } => Accumulator::Moments {
                n: codec::read_u64(buf)?,
                sum: ExactSum::read(buf)?,
                squares: ExactSum::read(buf)?,
            },
            Accumulator::Unique(_) => {
                let len = codec::read_u32(buf)? as usize;
                let mut seen = HashSet::with_capacity(len.min(1024));
                for _ in 0..len {
                    seen.insert(codec::read_val(buf)?);
                }
                Accumulator::Unique(seen)
            }
        };
        Ok(())
    }
}

/// Population variance `(n * sum(x^2) - sum(x)^2) / n^2`, with the
/// numerator computed exactly.
fn variance(n: u64, sum: &ExactSum, squares: &ExactSum) -> f64 {
    let numerator = squares.scaled(n).sub(&sum.square()).to_f64();
    let n = n as f64;
    numerator / (n * n)
}
