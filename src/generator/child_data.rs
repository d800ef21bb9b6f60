//! Access to the ungrouped child rows behind a grouped value.

use std::cell::OnceCell;

use super::Generator;
use crate::ast::NodeId;
use crate::compare::auto_compare;
use crate::value::Val;

/// The child groups of the group being evaluated.
///
/// `node` names the selector asking, so one implementation can serve every
/// selector in a tree. Positions are 1-based.
pub trait ChildData {
    fn first(&self, node: NodeId) -> Val;
    fn last(&self, node: NodeId) -> Val;
    fn nth(&self, node: NodeId, position: usize) -> Val;
    fn top(&self, node: NodeId, delimiter: &str, limit: usize) -> Val;
    fn bottom(&self, node: NodeId, delimiter: &str, limit: usize) -> Val;
    fn count(&self) -> i64;
}

/// Produces the child data for the current group on demand.
pub type ChildDataSupplier<'a> = dyn Fn() -> Option<Box<dyn ChildData + 'a>> + 'a;

/// Calls a supplier at most once.
pub(crate) struct LazyChildData<'s, 'a> {
    supplier: Option<&'s ChildDataSupplier<'a>>,
    cell: OnceCell<Option<Box<dyn ChildData + 'a>>>,
}

impl<'s, 'a> LazyChildData<'s, 'a> {
    pub(crate) fn new(supplier: Option<&'s ChildDataSupplier<'a>>) -> Self {
        LazyChildData {
            supplier,
            cell: OnceCell::new(),
        }
    }

    pub(crate) fn get(&self) -> Option<&(dyn ChildData + 'a)> {
        let supplier = self.supplier?;
        self.cell.get_or_init(supplier).as_deref()
    }
}

/// [`ChildData`] over the generator trees of materialized child groups.
///
/// Each child is a root generator of the same expression; a selector's node
/// id is used to find its counterpart in every child.
pub struct ChildGenerators<'c> {
    children: Vec<&'c Generator>,
}

impl<'c> ChildGenerators<'c> {
    /// Children in the order given
    pub fn new(children: &'c [Generator]) -> Self {
        ChildGenerators {
            children: children.iter().collect(),
        }
    }

    /// Children ordered by the value of their root generator
    pub fn sorted(children: &'c [Generator]) -> Self {
        let mut keyed: Vec<(Val, &Generator)> = children.iter().map(|g| (g.eval(), g)).collect();
        keyed.sort_by(|a, b| auto_compare(&a.0, &b.0));
        ChildGenerators {
            children: keyed.into_iter().map(|(_, g)| g).collect(),
        }
    }

    fn value(&self, child: &Generator, node: NodeId) -> Val {
        child.find_node(node).map(Generator::eval).unwrap_or(Val::Null)
    }

    fn join<'g>(&self, node: NodeId, children: impl Iterator<Item = &'g Generator>, delimiter: &str) -> Val {
        let parts: Vec<String> = children
            .filter_map(|child| self.value(child, node).as_string())
            .collect();
        Val::String(parts.join(delimiter))
    }
}

impl ChildData for ChildGenerators<'_> {
    fn first(&self, node: NodeId) -> Val {
        self.nth(node, 1)
    }

    fn last(&self, node: NodeId) -> Val {
        match self.children.last() {
            Some(child) => self.value(child, node),
            None => Val::Null,
        }
    }

    fn nth(&self, node: NodeId, position: usize) -> Val {
        match position.checked_sub(1).and_then(|i| self.children.get(i)) {
            Some(child) => self.value(child, node),
            None => Val::Null,
        }
    }

    fn top(&self, node: NodeId, delimiter: &str, limit: usize) -> Val {
        self.join(node, self.children.iter().copied().take(limit), delimiter)
    }

    fn bottom(&self, node: NodeId, delimiter: &str, limit: usize) -> Val {
        let skip = self.children.len().saturating_sub(limit);
        self.join(node, self.children.iter().copied().skip(skip), delimiter)
    }

    fn count(&self) -> i64 {
        self.children.len() as i64
    }
}
