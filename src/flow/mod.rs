//! Syntax walkers the classifier and the disposal checker are built on.
//!
//! Walkers are pooled (see [`crate::pool`]) and keep nothing but their
//! result buffers between uses. Cycle detection state ([`Visited`]) and
//! argument substitution state ([`CallFrames`]) belong to one query and are
//! passed down the recursion explicitly.

pub mod assignments;
pub mod implementations;
pub mod invocations;
pub mod member_path;
pub mod return_values;

use std::collections::HashSet;

use crate::semantic::{SemanticModel, SymbolId, SymbolKind};
use crate::syntax::{NodeId, NodeKind};

pub use assignments::{collect_assignments, Assignment, AssignmentKind, AssignmentWalker, Scope};
pub use implementations::find_implementations;
pub use invocations::{IdentifierWalker, InvocationWalker};
pub use member_path::{find_root_member, is_root_member, peel, try_find_member};
pub use return_values::{collect_return_values, ReturnValueWalker, Search};

/// Nodes and `(symbol, call-site)` pairs already entered by one query.
#[derive(Debug, Default)]
pub struct Visited {
    nodes: HashSet<NodeId>,
    calls: HashSet<(SymbolId, Option<NodeId>)>,
}

impl Visited {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when `node` was entered before.
    pub fn enter_node(&mut self, node: NodeId) -> bool {
        self.nodes.insert(node)
    }

    /// Returns `false` when `symbol` was entered before from the same site.
    pub fn enter(&mut self, symbol: SymbolId, site: Option<NodeId>) -> bool {
        self.calls.insert((symbol, site))
    }

    pub fn leave(&mut self, symbol: SymbolId, site: Option<NodeId>) {
        self.calls.remove(&(symbol, site));
    }
}

/// Where the parameters of an entered callable get their values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallSite {
    /// Invocation, object creation or constructor initializer.
    Call(NodeId),
    /// Property setter entered from `P = rhs`.
    Setter { value: SymbolId, rhs: NodeId },
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    callable: SymbolId,
    site: CallSite,
}

/// Stack of callables entered through a known call site.
#[derive(Debug, Default, Clone)]
pub struct CallFrames {
    frames: Vec<Frame>,
}

impl CallFrames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, callable: SymbolId, site: CallSite) {
        self.frames.push(Frame { callable, site });
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Drop frames above `len`, returning them so they can be restored.
    pub fn split_off(&mut self, len: usize) -> CallFrames {
        CallFrames {
            frames: self.frames.split_off(len.min(self.frames.len())),
        }
    }

    pub fn restore(&mut self, mut upper: CallFrames) {
        self.frames.append(&mut upper.frames);
    }

    /// Innermost frame that supplies `parameter`, with the expression it
    /// receives there.
    pub fn argument(&self, model: &dyn SemanticModel, parameter: SymbolId) -> Option<(usize, NodeId)> {
        let info = model.symbol_info(parameter);
        if info.kind != SymbolKind::Parameter {
            return None;
        }
        let owner = info.container?;
        self.frames
            .iter()
            .enumerate()
            .rev()
            .find(|(_, frame)| match frame.site {
                CallSite::Setter { value, .. } => value == parameter,
                CallSite::Call(_) => frame.callable == owner,
            })
            .and_then(|(index, frame)| {
                let expr = match frame.site {
                    CallSite::Setter { rhs, .. } => Some(rhs),
                    CallSite::Call(call) => invocations::argument_for_parameter(model, call, parameter)
                        .or_else(|| {
                            corresponding_parameter(model, call, parameter)
                                .and_then(|p| invocations::argument_for_parameter(model, call, p))
                        })
                        .or_else(|| invocations::default_value(model, parameter)),
                };
                expr.map(|expr| (index, expr))
            })
    }

    /// Replace parameter references with the call-site expressions that
    /// feed them, innermost frame first.
    pub fn substitute(&self, model: &dyn SemanticModel, node: NodeId) -> NodeId {
        let mut current = node;
        let mut limit = self.frames.len();
        loop {
            let peeled = peel(model, current);
            if !matches!(model.kind(peeled), NodeKind::Identifier { .. }) {
                return current;
            }
            let Some(parameter) = model.symbol(peeled) else {
                return current;
            };
            let visible = CallFrames {
                frames: self.frames[..limit].to_vec(),
            };
            match visible.argument(model, parameter) {
                Some((index, expr)) => {
                    current = expr;
                    limit = index;
                }
                None => return current,
            }
        }
    }
}

/// Parameter of the member `call` binds to at the position `parameter`
/// has in an implementation of that member.
fn corresponding_parameter(model: &dyn SemanticModel, call: NodeId, parameter: SymbolId) -> Option<SymbolId> {
    let invoked = model.symbol(call)?;
    let owner = model.symbol_info(parameter).container?;
    if owner == invoked {
        return None;
    }
    let index = model.symbol_info(owner).params.iter().position(|p| *p == parameter)?;
    model.symbol_info(invoked).params.get(index).copied()
}

/// Whether members of `a` and `b` can see each other through `this`.
pub(crate) fn compatible_types(model: &dyn SemanticModel, a: SymbolId, b: SymbolId) -> bool {
    a == b || model.is_subtype(a, b) || model.is_subtype(b, a)
}

/// Declaration of the member, accessor, local function or lambda that
/// contains `node`.
pub(crate) fn enclosing_callable(model: &dyn SemanticModel, node: NodeId) -> Option<NodeId> {
    model.enclosing(node, &|kind| {
        kind.is_callable() || matches!(kind, NodeKind::Property { .. })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visited_pairs_are_site_sensitive() {
        let mut visited = Visited::new();
        let site = NodeId { tree: 0, index: 3 };
        assert!(visited.enter(SymbolId(1), Some(site)));
        assert!(!visited.enter(SymbolId(1), Some(site)));
        assert!(visited.enter(SymbolId(1), None));
        visited.leave(SymbolId(1), Some(site));
        assert!(visited.enter(SymbolId(1), Some(site)));
    }

    #[test]
    fn split_and_restore_keep_order() {
        let mut frames = CallFrames::new();
        let call = |i| CallSite::Call(NodeId { tree: 0, index: i });
        frames.push(SymbolId(1), call(1));
        frames.push(SymbolId(2), call(2));
        frames.push(SymbolId(3), call(3));
        let upper = frames.split_off(1);
        assert_eq!(frames.len(), 1);
        assert_eq!(upper.len(), 2);
        frames.restore(upper);
        assert_eq!(frames.len(), 3);
    }
}
