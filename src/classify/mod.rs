//! Value-source classification.
//!
//! [`classify_creation`] answers whether a value may be a resource created
//! for its holder, [`classify_all`] lists every origin reachable from it,
//! and [`classify_provenance`] combines both with the structural
//! "can outside code supply this" check.

pub mod creation;
pub mod known;
pub mod origin;
pub mod provenance;
pub mod sources;

pub use creation::{classify_creation, Target};
pub use known::KnownApis;
pub use origin::{Creation, OriginKind, ValueOrigin};
pub use provenance::{classify_provenance, externally_supplied, Provenance, ProvenanceRule};
pub use sources::{classify, classify_all};

use crate::context::AnalysisContext;
use crate::errors::Result;
use crate::flow::implementations::find_implementations;
use crate::flow::member_path::is_this_or_base;
use crate::flow::return_values::has_body;
use crate::semantic::{SemanticModel, Symbol, SymbolId, SymbolKind};
use crate::syntax::{NodeId, NodeKind};

/// Property whose getter runs code.
pub(crate) fn is_computed(info: &Symbol) -> bool {
    info.kind == SymbolKind::Property && !info.is_auto && info.getter.is_some()
}

/// Whether a member read goes through the current instance.
pub(crate) fn reads_this(model: &dyn SemanticModel, expr: NodeId) -> bool {
    match model.kind(expr) {
        NodeKind::Identifier { .. } => true,
        NodeKind::MemberAccess { expr, .. } => is_this_or_base(model, *expr),
        _ => false,
    }
}

/// Declaration of `member` whose code produces its value.
fn body_of(model: &dyn SemanticModel, member: SymbolId) -> Option<NodeId> {
    let info = model.symbol_info(member);
    info.declarations.iter().copied().find(|decl| match model.kind(*decl) {
        NodeKind::Property { .. } => info.getter.is_some_and(|getter| {
            !matches!(
                model.kind(getter),
                NodeKind::Accessor {
                    body: None,
                    expression_body: None,
                    ..
                }
            )
        }),
        _ => has_body(model, *decl),
    })
}

/// Bodies a call to `member` may run: its own, or those of its
/// implementations when it has none.
pub(crate) fn bodies(ctx: &AnalysisContext<'_>, member: SymbolId) -> Result<Vec<(SymbolId, NodeId)>> {
    let model = ctx.model;
    if let Some(decl) = body_of(model, member) {
        return Ok(vec![(member, decl)]);
    }
    let found = find_implementations(ctx, member)?
        .into_iter()
        .filter_map(|implementation| body_of(model, implementation).map(|decl| (implementation, decl)))
        .collect();
    Ok(found)
}

/// Parameter of `implementation` at the position `parameter` has in the
/// member it implements.
pub(crate) fn parameter_at(model: &dyn SemanticModel, implementation: SymbolId, parameter: SymbolId) -> Option<SymbolId> {
    let owner = model.symbol_info(parameter).container?;
    if owner == implementation {
        return Some(parameter);
    }
    let index = model.symbol_info(owner).params.iter().position(|p| *p == parameter)?;
    model.symbol_info(implementation).params.get(index).copied()
}
