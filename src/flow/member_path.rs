//! Member paths: `_field`, `this.Field`, `_a.B?.C`.
//!
//! Pure functions of the syntax tree. A path is rooted when its innermost
//! segment is a plain identifier or a member access on `this`/`base`.

use crate::semantic::SemanticModel;
use crate::syntax::{NodeId, NodeKind};

/// Strip parentheses and casts.
pub fn peel(model: &dyn SemanticModel, expr: NodeId) -> NodeId {
    let mut current = expr;
    loop {
        match model.kind(current) {
            NodeKind::Parenthesized { expr }
            | NodeKind::Cast { expr, .. }
            | NodeKind::As { expr, .. } => current = *expr,
            _ => return current,
        }
    }
}

/// Root of the member path `expr` is part of.
///
/// `this.a.b` gives `this.a`, `a?.b.c` gives `a`. Returns `None` when the
/// chain passes through anything that is not a member access, such as an
/// invocation.
pub fn find_root_member(model: &dyn SemanticModel, expr: NodeId) -> Option<NodeId> {
    let expr = peel(model, expr);
    match model.kind(expr) {
        NodeKind::Identifier { .. } => Some(expr),
        NodeKind::MemberAccess { expr: inner, .. } => {
            if is_this_or_base(model, *inner) {
                Some(expr)
            } else {
                find_root_member(model, *inner)
            }
        }
        NodeKind::ConditionalAccess { expr: inner, .. } | NodeKind::ElementAccess { expr: inner, .. } => {
            find_root_member(model, *inner)
        }
        NodeKind::MemberBinding { .. } | NodeKind::ElementBinding { .. } => {
            binding_receiver(model, expr).and_then(|receiver| find_root_member(model, receiver))
        }
        _ => None,
    }
}

/// Whether `expr` is itself a root: an identifier or `this.x`/`base.x`.
pub fn is_root_member(model: &dyn SemanticModel, expr: NodeId) -> bool {
    let expr = peel(model, expr);
    match model.kind(expr) {
        NodeKind::Identifier { .. } => true,
        NodeKind::MemberAccess { expr: inner, .. } => is_this_or_base(model, *inner),
        _ => false,
    }
}

/// The member segment `expr` ends in, when the whole chain is a rooted
/// member path. A `?.` chain is followed through its when-not-null branch.
pub fn try_find_member(model: &dyn SemanticModel, expr: NodeId) -> Option<NodeId> {
    let expr = peel(model, expr);
    match model.kind(expr) {
        NodeKind::Identifier { .. } => Some(expr),
        NodeKind::MemberAccess { expr: inner, .. } => {
            try_find_member_core(model, *inner).then_some(expr)
        }
        NodeKind::MemberBinding { .. } => binding_receiver(model, expr)
            .filter(|receiver| try_find_member_core(model, *receiver))
            .map(|_| expr),
        NodeKind::ConditionalAccess { when_not_null, .. } => try_find_member(model, *when_not_null),
        _ => None,
    }
}

/// Whether every segment from `expr` inward is a member access ending at
/// `this`, `base` or an identifier.
fn try_find_member_core(model: &dyn SemanticModel, expr: NodeId) -> bool {
    let expr = peel(model, expr);
    match model.kind(expr) {
        NodeKind::This | NodeKind::Base | NodeKind::Identifier { .. } => true,
        NodeKind::MemberAccess { expr: inner, .. } => try_find_member_core(model, *inner),
        NodeKind::MemberBinding { .. } => {
            binding_receiver(model, expr).is_some_and(|receiver| try_find_member_core(model, receiver))
        }
        NodeKind::ConditionalAccess { when_not_null, .. } => try_find_member_core(model, *when_not_null),
        _ => false,
    }
}

/// Expression a `?.x` or `?[i]` binding is applied to.
pub fn binding_receiver(model: &dyn SemanticModel, binding: NodeId) -> Option<NodeId> {
    let span = model.node(binding).span;
    model.tree(binding.tree).ancestors(binding).find_map(|ancestor| {
        match model.kind(ancestor) {
            NodeKind::ConditionalAccess {
                expr,
                when_not_null,
            } if model.node(*when_not_null).span.contains(span) => Some(*expr),
            _ => None,
        }
    })
}

pub fn is_this_or_base(model: &dyn SemanticModel, expr: NodeId) -> bool {
    matches!(model.kind(peel(model, expr)), NodeKind::This | NodeKind::Base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::Compilation;

    fn compile(body: &str) -> Compilation {
        let source = format!(
            "class C {{ C _next; object _o; C Make() => this; void M() {{ {} }} }}",
            body
        );
        Compilation::from_sources(vec![("m.cs", source)]).unwrap()
    }

    /// The expression of the first expression statement.
    fn statement(model: &Compilation) -> NodeId {
        let tree = &model.trees()[0];
        tree.node_ids()
            .find_map(|id| match &tree.node(id).kind {
                NodeKind::ExpressionStatement { expr } => Some(*expr),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn identifier_is_its_own_root() {
        let model = compile("_next;");
        let expr = statement(&model);
        assert_eq!(find_root_member(&model, expr), Some(expr));
        assert!(is_root_member(&model, expr));
    }

    #[test]
    fn this_access_is_a_root() {
        let model = compile("this._next._next;");
        let expr = statement(&model);
        let root = find_root_member(&model, expr).unwrap();
        assert_eq!(model.text(root), "this._next");
        assert!(!is_root_member(&model, expr));
        assert!(is_root_member(&model, root));
    }

    #[test]
    fn casts_and_conditional_access_are_peeled() {
        let model = compile("((C)_o)?._next;");
        let expr = statement(&model);
        let root = find_root_member(&model, expr).unwrap();
        assert_eq!(model.text(root), "_o");

        let member = try_find_member(&model, expr).unwrap();
        assert!(matches!(model.kind(member), NodeKind::MemberBinding { name, .. } if name == "_next"));
    }

    #[test]
    fn invocation_breaks_the_path() {
        let model = compile("Make()._next;");
        let expr = statement(&model);
        assert_eq!(find_root_member(&model, expr), None);
        assert_eq!(try_find_member(&model, expr), None);
    }
}
