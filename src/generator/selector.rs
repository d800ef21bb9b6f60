use super::child_data::ChildData;
use crate::ast::NodeId;
use crate::value::Val;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorKind {
    Any,
    First,
    Last,
    Nth,
    Top,
    Bottom,
}

/// Static arguments of a selector call.
#[derive(Debug, Clone)]
pub struct Selection {
    pub kind: SelectorKind,
    pub node: NodeId,
    pub delimiter: String,
    pub limit: usize,
    pub position: usize,
}

impl Selection {
    pub(crate) fn select(&self, data: &dyn ChildData) -> Val {
        match self.kind {
            SelectorKind::Any | SelectorKind::First => data.first(self.node),
            SelectorKind::Last => data.last(self.node),
            SelectorKind::Nth => data.nth(self.node, self.position),
            SelectorKind::Top => data.top(self.node, &self.delimiter, self.limit),
            SelectorKind::Bottom => data.bottom(self.node, &self.delimiter, self.limit),
        }
    }
}
