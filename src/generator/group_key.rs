use std::fmt;
use std::sync::Arc;

use bytes::{Buf, BufMut, BytesMut};

use super::codec;
use crate::error::GeneratorError;
use crate::value::Val;

/// Deepest key chain accepted when reading.
const MAX_DEPTH: u32 = 256;

/// Identifies the aggregation bucket a row belongs to.
///
/// Nested groupings chain keys through `parent`; a key at depth `n` has a
/// parent at depth `n - 1`. Two keys are equal when their depth, parent
/// chain and values all match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    depth: u32,
    parent: Option<Arc<GroupKey>>,
    values: Vec<Val>,
}

impl GroupKey {
    /// A top level key
    pub fn new(values: Vec<Val>) -> Self {
        GroupKey {
            depth: 0,
            parent: None,
            values,
        }
    }

    pub fn child(parent: Arc<GroupKey>, values: Vec<Val>) -> Self {
        GroupKey {
            depth: parent.depth + 1,
            parent: Some(parent),
            values,
        }
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn parent(&self) -> Option<&Arc<GroupKey>> {
        self.parent.as_ref()
    }

    pub fn values(&self) -> &[Val] {
        &self.values
    }

    /// This key followed by its ancestors, root last.
    fn chain(&self) -> Vec<&GroupKey> {
        let mut chain = vec![self];
        let mut key = self;
        while let Some(parent) = &key.parent {
            chain.push(parent);
            key = parent;
        }
        chain
    }

    /// One presence byte per level (leaf first, `0` at the root) followed
    /// by each level's depth and values, root first.
    pub fn write(&self, buf: &mut BytesMut) {
        let chain = self.chain();
        for key in &chain {
            buf.put_u8(u8::from(key.parent.is_some()));
        }
        for key in chain.iter().rev() {
            buf.put_u32(key.depth);
            buf.put_u32(key.values.len() as u32);
            for v in &key.values {
                codec::write_val(buf, v);
            }
        }
    }

    pub fn read<B: Buf>(buf: &mut B) -> Result<Self, GeneratorError> {
        let mut levels: u32 = 1;
        while codec::read_u8(buf)? != 0 {
            levels += 1;
            if levels > MAX_DEPTH {
                return Err(GeneratorError::InvalidState("group key nesting too deep"));
            }
        }

        let mut parent: Option<Arc<GroupKey>> = None;
        for expected in 0..levels {
            let depth = codec::read_u32(buf)?;
            if depth != expected {
                return Err(GeneratorError::InvalidState("group key depth does not match its parent"));
            }
            let len = codec::read_u32(buf)? as usize;
            let mut values = Vec::with_capacity(len.min(64));
            for _ in 0..len {
                values.push(codec::read_val(buf)?);
            }
            parent = Some(Arc::new(GroupKey {
                depth,
                parent,
                values,
            }));
        }

        parent
            .map(Arc::unwrap_or_clone)
            .ok_or(GeneratorError::UnexpectedEof)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(parent) = &self.parent {
            write!(f, "{parent}/")?;
        }
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, "|")?;
            }
            write!(f, "{}", v.as_string().unwrap_or_default())?;
        }
        Ok(())
    }
}
