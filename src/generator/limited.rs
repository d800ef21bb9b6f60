use std::collections::HashSet;

use bytes::{Buf, BufMut, BytesMut};

use super::codec;
use crate::compare::auto_compare;
use crate::error::GeneratorError;
use crate::value::Val;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitedKind {
    /// Unique values, output in sorted order
    Distinct,
    /// Values in arrival order
    Joining,
}

impl LimitedKind {
    pub fn name(self) -> &'static str {
        match self {
            LimitedKind::Distinct => "distinct",
            LimitedKind::Joining => "joining",
        }
    }

    pub fn default_delimiter(self) -> &'static str {
        match self {
            LimitedKind::Distinct => ", ",
            LimitedKind::Joining => "",
        }
    }
}

/// Values retained by `distinct` and `joining`, up to a fixed limit.
#[derive(Debug, Clone)]
pub struct LimitedState {
    kind: LimitedKind,
    delimiter: String,
    limit: usize,
    values: Vec<Val>,
    /// Members of `values`, for `distinct`
    seen: HashSet<Val>,
}

impl LimitedState {
    pub fn new(kind: LimitedKind, delimiter: impl Into<String>, limit: usize) -> Self {
        LimitedState {
            kind,
            delimiter: delimiter.into(),
            limit,
            values: Vec::new(),
            seen: HashSet::new(),
        }
    }

    pub fn kind(&self) -> LimitedKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Record `val` unless the limit is reached. Nulls and errors are
    /// skipped.
    pub fn add(&mut self, val: Val) {
        if !val.is_value() || self.values.len() >= self.limit {
            return;
        }
        if self.kind == LimitedKind::Distinct && !self.seen.insert(val.clone()) {
            return;
        }
        self.values.push(val);
    }

    pub fn merge(&mut self, other: &LimitedState) -> Result<(), GeneratorError> {
        if self.kind != other.kind {
            return Err(GeneratorError::ShapeMismatch {
                expected: self.kind.name(),
                found: other.kind.name(),
            });
        }
        for v in &other.values {
            self.add(v.clone());
        }
        Ok(())
    }

    pub fn eval(&self) -> Val {
        if self.values.is_empty() {
            return Val::Null;
        }
        let mut values: Vec<&Val> = self.values.iter().collect();
        if self.kind == LimitedKind::Distinct {
            values.sort_by(|a, b| auto_compare(a, b).then_with(|| a.as_string().cmp(&b.as_string())));
        }
        let joined = values
            .iter()
            .filter_map(|v| v.as_string())
            .collect::<Vec<_>>()
            .join(&self.delimiter);
        Val::String(joined)
    }

    pub fn write(&self, buf: &mut BytesMut) {
        buf.put_u32(self.values.len() as u32);
        for v in &self.values {
            codec::write_val(buf, v);
        }
    }

    pub fn read<B: Buf>(&mut self, buf: &mut B) -> Result<(), GeneratorError> {
        let len = codec::read_u32(buf)? as usize;
        self.values.clear();
        self.seen.clear();
        for _ in 0..len {
            let v = codec::read_val(buf)?;
            self.add(v);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_limit() {
        let mut state = LimitedState::new(LimitedKind::Distinct, ",", 3);
        for s in ["e", "a", "a", "d", "c", "b"] {
            state.add(Val::string(s));
        }
        assert_eq!(state.eval(), Val::string("a,d,e"));
    }

    #[test]
    fn test_distinct_state_survives_read() {
        let mut state = LimitedState::new(LimitedKind::Distinct, ",", 3);
        state.add(Val::string("a"));
        state.add(Val::string("b"));
        let mut buf = BytesMut::new();
        state.write(&mut buf);

        let mut read = LimitedState::new(LimitedKind::Distinct, ",", 3);
        read.read(&mut buf.freeze()).unwrap();
        read.add(Val::string("a"));
        read.add(Val::string("c"));
        read.add(Val::string("d"));
        assert_eq!(read.eval(), Val::string("a,b,c"));
    }

    #[test]
    fn test_joining_keeps_order() {
        let mut state = LimitedState::new(LimitedKind::Joining, "", 10);
        for n in [3, 1, 2] {
            state.add(Val::Integer(n));
        }
        state.add(Val::Null);
        assert_eq!(state.eval(), Val::string("312"));
    }
}
