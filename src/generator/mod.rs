//! # Generators
//!
//! A [`Generator`] is the runtime counterpart of a bound expression: one
//! tree per group (or per row when nothing aggregates), fed rows through
//! [`Generator::set`] and read through [`Generator::eval`].
//!
//! Partial results computed on different partitions combine with
//! [`Generator::merge`], and cross process boundaries with
//! [`Generator::write`] and [`Generator::read`]. Only accumulated state is
//! written; the shape of the tree comes from the expression on both sides.
//!
//! ```
//! use dashexpr::{FieldIndex, Parser, Val};
//!
//! let mut fields = FieldIndex::new();
//! let expression = Parser::default().parse("sum(${n})", &mut fields).unwrap();
//!
//! let mut left = expression.create_generator();
//! let mut right = expression.create_generator();
//! left.set(&[Val::Integer(1)]);
//! right.set(&[Val::Integer(2)]);
//! left.merge(&right).unwrap();
//! assert_eq!(left.eval(), Val::Double(3.0));
//! ```

pub mod aggregate;
pub mod child_data;
pub mod codec;
mod exact;
pub mod group_key;
pub mod limited;
pub mod selector;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use bytes::{Buf, BufMut, BytesMut};

use crate::ast::{Function, NodeId, Param};
use crate::error::GeneratorError;
use crate::functions::{self, FunctionKind};
use crate::value::Val;

pub use aggregate::{AggregateKind, AggregateState};
pub use child_data::{ChildData, ChildDataSupplier, ChildGenerators};
pub use group_key::GroupKey;
pub use limited::{LimitedKind, LimitedState};
pub use selector::SelectorKind;

use child_data::LazyChildData;
use selector::Selection;

/// Key under which the host supplies the current user's name.
pub const CURRENT_USER_KEY: &str = "currentUser()";

/// Runtime state for one node of an expression tree.
#[derive(Debug, Clone)]
pub enum Generator {
    /// A literal, folded call or static mapped value
    Static(Val),
    /// Value of a row column
    Field { position: usize, current: Option<Val> },
    Count(i64),
    CountGroups(HashSet<GroupKey>),
    /// Drawn once when the generator is created
    Random(f64),
    /// A non-aggregating call over its children
    Scalar {
        function: Arc<Function>,
        children: Vec<Generator>,
    },
    Aggregate {
        child: Box<Generator>,
        state: AggregateState,
    },
    Selector {
        selection: Selection,
        child: Box<Generator>,
    },
    Limited {
        child: Box<Generator>,
        state: LimitedState,
    },
}

impl Generator {
    pub(crate) fn create(param: &Param, mapped: &BTreeMap<String, String>) -> Generator {
        match param {
            Param::Val(v) => Generator::Static(v.clone()),
            Param::Function(function) => Generator::for_function(function, mapped),
        }
    }

    fn for_function(function: &Arc<Function>, mapped: &BTreeMap<String, String>) -> Generator {
        if let Some(v) = function.folded() {
            return Generator::Static(v.clone());
        }

        let bound = function.bound();
        let child = || {
            let generator = match function.params().first() {
                Some(param) => Generator::create(param, mapped),
                None => Generator::Static(Val::Null),
            };
            Box::new(generator)
        };

        match function.kind() {
            FunctionKind::Field => match bound.field {
                Some(position) => Generator::Field {
                    position,
                    current: None,
                },
                None => Generator::Static(Val::Null),
            },
            FunctionKind::Count => Generator::Count(0),
            FunctionKind::CountGroups => Generator::CountGroups(HashSet::new()),
            FunctionKind::Random => Generator::Random(rand::random::<f64>()),
            FunctionKind::Param => {
                let value = bound.mapped_key.as_ref().and_then(|key| mapped.get(key));
                Generator::Static(value.map(Val::string).unwrap_or(Val::Null))
            }
            FunctionKind::Params => Generator::Static(Val::String(format_params(mapped))),
            FunctionKind::CurrentUser => {
                let value = mapped.get(CURRENT_USER_KEY);
                Generator::Static(value.map(Val::string).unwrap_or(Val::Null))
            }
            FunctionKind::Aggregate(kind) if function.is_aggregate() => Generator::Aggregate {
                child: child(),
                state: AggregateState::new(kind),
            },
            FunctionKind::Selector(kind) => Generator::Selector {
                selection: Selection {
                    kind,
                    node: function.node(),
                    delimiter: bound.delimiter.clone().unwrap_or_default(),
                    limit: bound.limit.unwrap_or(usize::MAX),
                    position: bound.position.unwrap_or(1),
                },
                child: child(),
            },
            FunctionKind::Limited(kind) => Generator::Limited {
                child: child(),
                state: LimitedState::new(
                    kind,
                    bound
                        .delimiter
                        .clone()
                        .unwrap_or_else(|| kind.default_delimiter().to_string()),
                    bound.limit.unwrap_or(usize::MAX),
                ),
            },
            _ => Generator::Scalar {
                function: Arc::clone(function),
                children: function
                    .params()
                    .iter()
                    .map(|p| Generator::create(p, mapped))
                    .collect(),
            },
        }
    }

    fn shape(&self) -> &'static str {
        match self {
            Generator::Static(_) => "static",
            Generator::Field { .. } => "field",
            Generator::Count(_) => "count",
            Generator::CountGroups(_) => "countGroups",
            Generator::Random(_) => "random",
            Generator::Scalar { .. } => "function",
            Generator::Aggregate { .. } => "aggregate",
            Generator::Selector { .. } => "selector",
            Generator::Limited { .. } => "limited",
        }
    }

    /// Feed one row. Positions missing from `row` read as null.
    pub fn set(&mut self, row: &[Val]) {
        match self {
            Generator::Static(_) | Generator::Random(_) | Generator::CountGroups(_) => {}
            Generator::Field { position, current } => {
                *current = Some(row.get(*position).cloned().unwrap_or(Val::Null));
            }
            Generator::Count(n) => *n += 1,
            Generator::Scalar { children, .. } => {
                for child in children {
                    child.set(row);
                }
            }
            Generator::Aggregate { child, state } => {
                child.set(row);
                state.add(&child.eval());
            }
            Generator::Selector { child, .. } => child.set(row),
            Generator::Limited { child, state } => {
                child.set(row);
                state.add(child.eval());
            }
        }
    }

    /// Record a child group of the group this generator accumulates.
    pub fn add_child_key(&mut self, key: &GroupKey) {
        match self {
            Generator::CountGroups(keys) => {
                keys.insert(key.clone());
            }
            Generator::Scalar { children, .. } => {
                for child in children {
                    child.add_child_key(key);
                }
            }
            Generator::Aggregate { child, .. }
            | Generator::Selector { child, .. }
            | Generator::Limited { child, .. } => child.add_child_key(key),
            _ => {}
        }
    }

    pub fn eval(&self) -> Val {
        self.eval_inner(&LazyChildData::new(None))
    }

    /// Evaluate with access to the child groups of the current group.
    ///
    /// `supplier` is only called if a node needs child data, and at most
    /// once per call.
    pub fn eval_with<'a>(&self, supplier: &ChildDataSupplier<'a>) -> Val {
        self.eval_inner(&LazyChildData::new(Some(supplier)))
    }

    /// Evaluate picking selector values from `children`, the generator
    /// trees of the child groups in order.
    pub fn select(&self, children: &[Generator]) -> Val {
        self.eval_with(&|| child_generators(children))
    }

    fn eval_inner(&self, data: &LazyChildData<'_, '_>) -> Val {
        match self {
            Generator::Static(v) => v.clone(),
            Generator::Field { current, .. } => current.clone().unwrap_or(Val::Null),
            Generator::Count(n) => Val::Long(*n),
            Generator::CountGroups(keys) => {
                if keys.is_empty()
                    && let Some(data) = data.get()
                {
                    return Val::Long(data.count());
                }
                Val::Long(keys.len() as i64)
            }
            Generator::Random(d) => Val::Double(*d),
            Generator::Scalar { function, children } => {
                let args: Vec<Val> = children.iter().map(|c| c.eval_inner(data)).collect();
                functions::apply(function, &args)
            }
            Generator::Aggregate { state, .. } => state.eval(),
            Generator::Selector { selection, child } => match data.get() {
                Some(data) => selection.select(data),
                None => child.eval_inner(data),
            },
            Generator::Limited { state, .. } => state.eval(),
        }
    }

    /// Fold the state of `other`, a generator created from the same
    /// expression, into this one.
    pub fn merge(&mut self, other: &Generator) -> Result<(), GeneratorError> {
        let (expected, found) = (self.shape(), other.shape());
        match (&mut *self, other) {
            (Generator::Static(_), Generator::Static(_)) | (Generator::Random(_), Generator::Random(_)) => {}
            (Generator::Field { current, .. }, Generator::Field { current: theirs, .. }) => {
                if theirs.is_some() {
                    current.clone_from(theirs);
                }
            }
            (Generator::Count(n), Generator::Count(theirs)) => *n += theirs,
            (Generator::CountGroups(keys), Generator::CountGroups(theirs)) => {
                keys.extend(theirs.iter().cloned());
            }
            (Generator::Scalar { children, .. }, Generator::Scalar { children: theirs, .. }) => {
                if children.len() != theirs.len() {
                    return Err(GeneratorError::ShapeMismatch {
                        expected: "function",
                        found: "function with different arity",
                    });
                }
                for (child, their) in children.iter_mut().zip(theirs) {
                    child.merge(their)?;
                }
            }
            (
                Generator::Aggregate { child, state },
                Generator::Aggregate {
                    child: their_child,
                    state: theirs,
                },
            ) => {
                child.merge(their_child)?;
                state.merge(theirs)?;
            }
            (Generator::Selector { child, .. }, Generator::Selector { child: theirs, .. }) => {
                child.merge(theirs)?;
            }
            (
                Generator::Limited { child, state },
                Generator::Limited {
                    child: their_child,
                    state: theirs,
                },
            ) => {
                child.merge(their_child)?;
                state.merge(theirs)?;
            }
            _ => return Err(GeneratorError::ShapeMismatch { expected, found }),
        }
        Ok(())
    }

    /// Serialize accumulated state, children first.
    pub fn write(&self, buf: &mut BytesMut) {
        match self {
            Generator::Static(_) => {}
            Generator::Field { current, .. } => codec::write_optional_val(buf, current.as_ref()),
            Generator::Count(n) => buf.put_i64(*n),
            Generator::CountGroups(keys) => {
                buf.put_u32(keys.len() as u32);
                for key in keys {
                    key.write(buf);
                }
            }
            Generator::Random(d) => buf.put_f64(*d),
            Generator::Scalar { children, .. } => {
                for child in children {
                    child.write(buf);
                }
            }
            Generator::Aggregate { child, state } => {
                child.write(buf);
                state.write(buf);
            }
            Generator::Selector { child, .. } => child.write(buf),
            Generator::Limited { child, state } => {
                child.write(buf);
                state.write(buf);
            }
        }
    }

    /// Replace accumulated state with state written by [`Generator::write`]
    /// on a generator of the same expression.
    pub fn read<B: Buf>(&mut self, buf: &mut B) -> Result<(), GeneratorError> {
        match self {
            Generator::Static(_) => {}
            Generator::Field { current, .. } => *current = codec::read_optional_val(buf)?,
            Generator::Count(n) => *n = codec::read_i64(buf)?,
            Generator::CountGroups(keys) => {
                let len = codec::read_u32(buf)? as usize;
                keys.clear();
                for _ in 0..len {
                    keys.insert(GroupKey::read(buf)?);
                }
            }
            Generator::Random(d) => *d = codec::read_f64(buf)?,
            Generator::Scalar { children, .. } => {
                for child in children {
                    child.read(buf)?;
                }
            }
            Generator::Aggregate { child, state } => {
                child.read(buf)?;
                state.read(buf)?;
            }
            Generator::Selector { child, .. } => child.read(buf)?,
            Generator::Limited { child, state } => {
                child.read(buf)?;
                state.read(buf)?;
            }
        }
        Ok(())
    }

    /// Find the selector with the given node id.
    pub fn find_node(&self, node: NodeId) -> Option<&Generator> {
        match self {
            Generator::Selector { selection, .. } if selection.node == node => Some(self),
            Generator::Scalar { children, .. } => children.iter().find_map(|c| c.find_node(node)),
            Generator::Aggregate { child, .. }
            | Generator::Selector { child, .. }
            | Generator::Limited { child, .. } => child.find_node(node),
            _ => None,
        }
    }
}

fn child_generators(children: &[Generator]) -> Option<Box<dyn ChildData + '_>> {
    Some(Box::new(ChildGenerators::new(children)))
}

fn format_params(mapped: &BTreeMap<String, String>) -> String {
    mapped
        .iter()
        .filter(|(key, _)| key.as_str() != CURRENT_USER_KEY)
        .map(|(key, value)| format!("{key}=\"{value}\""))
        .collect::<Vec<_>>()
        .join(" ")
}
