use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::cache::Caches;
use crate::functions::{FunctionDef, FunctionKind};
use crate::generator::Generator;
use crate::value::Val;

/// Pre-order position of a function node within its expression.
///
/// Node ids are stable for a given formula, so a generator tree built for a
/// child row can be searched for the node matching a selector in the parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// An argument: either a literal value or a nested call.
#[derive(Debug, Clone)]
pub enum Param {
    Val(Val),
    Function(Arc<Function>),
}

impl Param {
    /// The value of a literal or a folded call
    pub fn constant(&self) -> Option<&Val> {
        match self {
            Param::Val(v) => Some(v),
            Param::Function(f) => f.folded(),
        }
    }

    pub fn has_aggregate(&self) -> bool {
        match self {
            Param::Val(_) => false,
            Param::Function(f) => f.has_aggregate(),
        }
    }

    pub fn requires_child_data(&self) -> bool {
        match self {
            Param::Val(_) => false,
            Param::Function(f) => f.requires_child_data(),
        }
    }
}

/// Static arguments resolved while binding.
#[derive(Debug, Clone, Default)]
pub(crate) struct Bound {
    pub field: Option<usize>,
    pub decimal_places: Option<u32>,
    pub delimiter: Option<String>,
    pub limit: Option<usize>,
    pub position: Option<usize>,
    pub mapped_key: Option<String>,
}

/// A bound call in the expression tree.
#[derive(Clone)]
pub struct Function {
    pub(crate) name: String,
    pub(crate) def: &'static FunctionDef,
    pub(crate) params: Vec<Param>,
    pub(crate) node: NodeId,
    pub(crate) bound: Bound,
    pub(crate) folded: Option<Val>,
    pub(crate) has_aggregate: bool,
    pub(crate) requires_child_data: bool,
    pub(crate) caches: Arc<Caches>,
}

impl Function {
    /// Name as written in the formula
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FunctionKind {
        self.def.kind
    }

    pub fn def(&self) -> &'static FunctionDef {
        self.def
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Result computed at bind time when every argument was constant
    pub fn folded(&self) -> Option<&Val> {
        self.folded.as_ref()
    }

    pub fn is_aggregate(&self) -> bool {
        self.def.kind.is_aggregate(self.params.len())
    }

    pub fn has_aggregate(&self) -> bool {
        self.has_aggregate
    }

    pub fn requires_child_data(&self) -> bool {
        self.requires_child_data
    }

    pub(crate) fn bound(&self) -> &Bound {
        &self.bound
    }

    pub(crate) fn caches(&self) -> &Caches {
        &self.caches
    }

    fn is_operator(&self) -> bool {
        matches!(
            self.name.as_str(),
            "+" | "-" | "*" | "/" | "%" | "^" | "=" | "!=" | ">" | ">=" | "<" | "<="
        )
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        if self.def.kind == FunctionKind::Field && !out.contains(&self.name.as_str()) {
            out.push(&self.name);
        }
        for param in &self.params {
            if let Param::Function(f) = param {
                f.collect_fields(out);
            }
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("kind", &self.def.kind)
            .field("node", &self.node)
            .field("params", &self.params)
            .field("folded", &self.folded)
            .finish()
    }
}

fn write_literal(f: &mut fmt::Formatter<'_>, val: &Val) -> fmt::Result {
    match val {
        Val::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
        Val::Null => write!(f, "null()"),
        Val::Boolean(b) => write!(f, "{b}()"),
        Val::Err(_) => write!(f, "err()"),
        other => write!(f, "{}", other.as_string().unwrap_or_default()),
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Val(v) => write_literal(f, v),
            Param::Function(func) => write!(f, "{func}"),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.def.kind {
            FunctionKind::Field => return write!(f, "${{{}}}", self.name),
            FunctionKind::Bracket => {
                write!(f, "(")?;
                for p in &self.params {
                    write!(f, "{p}")?;
                }
                return write!(f, ")");
            }
            _ => {}
        }

        if self.is_operator() {
            if self.params.len() == 1 {
                return write!(f, "{}{}", self.name, self.params[0]);
            }
            for (i, p) in self.params.iter().enumerate() {
                if i > 0 {
                    write!(f, "{}", self.name)?;
                }
                write!(f, "{p}")?;
            }
            return Ok(());
        }

        write!(f, "{}(", self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, ")")
    }
}

/// Stable mapping from field name to row position.
///
/// Built once per execution and shared by every expression parsed against
/// it, so all rows can be plain `&[Val]` slices.
#[derive(Debug, Clone, Default)]
pub struct FieldIndex {
    names: Vec<String>,
    positions: HashMap<String, usize>,
}

impl FieldIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Position of `name`, appending it if unseen
    pub fn create(&mut self, name: &str) -> usize {
        if let Some(pos) = self.positions.get(name) {
            return *pos;
        }
        let pos = self.names.len();
        self.names.push(name.to_string());
        self.positions.insert(name.to_string(), pos);
        pos
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A parsed and bound formula.
///
/// # Examples
///
/// ```
/// use dashexpr::{FieldIndex, Parser, Val};
///
/// let mut fields = FieldIndex::new();
/// let expression = Parser::default().parse("${price} * 2", &mut fields).unwrap();
///
/// let mut generator = expression.create_generator();
/// generator.set(&[Val::Double(21.0)]);
/// assert_eq!(generator.eval(), Val::Double(42.0));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Expression {
    root: Option<Param>,
    mapped: BTreeMap<String, String>,
}

impl Expression {
    pub(crate) fn new(root: Option<Param>) -> Self {
        Expression {
            root,
            mapped: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> Option<&Param> {
        self.root.as_ref()
    }

    /// Build a fresh generator tree for one group or one row.
    pub fn create_generator(&self) -> Generator {
        match &self.root {
            None => Generator::Static(Val::Null),
            Some(param) => Generator::create(param, &self.mapped),
        }
    }

    pub fn has_aggregate(&self) -> bool {
        self.root.as_ref().is_some_and(Param::has_aggregate)
    }

    pub fn requires_child_data(&self) -> bool {
        self.root.as_ref().is_some_and(Param::requires_child_data)
    }

    /// Supply the values read by `param()`, `params()` and `currentUser()`.
    /// Generators created afterwards see these values.
    pub fn set_static_mapped_values(&mut self, values: &HashMap<String, String>) {
        self.mapped = values.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    }

    /// Field names referenced by the formula, in order of first appearance
    pub fn referenced_fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        if let Some(Param::Function(f)) = &self.root {
            f.collect_fields(&mut out);
        }
        out
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.root {
            None => Ok(()),
            Some(p) => write!(f, "{p}"),
        }
    }
}
