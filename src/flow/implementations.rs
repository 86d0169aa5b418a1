//! Implementations of interface members and overrides of virtual members.

use crate::context::AnalysisContext;
use crate::errors::Result;
use crate::semantic::{SemanticModel, SymbolId};
use crate::syntax::{NodeKind, TypeKind};

/// Whether calls to `member` can dispatch to code in another type.
pub fn is_overridable(model: &dyn SemanticModel, member: SymbolId) -> bool {
    let info = model.symbol_info(member);
    if !info.is_member() || info.is_static() {
        return false;
    }
    let in_interface = model
        .containing_type(member)
        .is_some_and(|ty| model.symbol_info(ty).type_kind == Some(TypeKind::Interface));
    in_interface || info.modifiers.is_abstract || info.modifiers.is_virtual || info.modifiers.is_override
}

/// Members with source that implement or override `member`, in tree order.
///
/// Matching is by name, kind and parameter count on every type declaration
/// deriving from the member's containing type.
pub fn find_implementations(ctx: &AnalysisContext<'_>, member: SymbolId) -> Result<Vec<SymbolId>> {
    let model = ctx.model;
    let info = model.symbol_info(member);
    let Some(owner) = model.containing_type(member) else {
        return Ok(Vec::new());
    };

    let mut found = Vec::new();
    for tree in model.trees() {
        for id in tree.node_ids() {
            ctx.check()?;
            if !matches!(tree.node(id).kind, NodeKind::TypeDecl { .. }) {
                continue;
            }
            let Some(ty) = model.declared_symbol(id) else {
                continue;
            };
            if ty == owner || !model.is_subtype(ty, owner) {
                continue;
            }
            for candidate in &model.symbol_info(ty).members {
                let other = model.symbol_info(*candidate);
                if other.kind == info.kind
                    && other.name == info.name
                    && other.params.len() == info.params.len()
                    && !other.is_external()
                    && !other.modifiers.is_abstract
                    && !found.contains(candidate)
                {
                    found.push(*candidate);
                }
            }
        }
    }
    log::trace!("{} has {} implementations", model.full_name(member), found.len());
    Ok(found)
}
