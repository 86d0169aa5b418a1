//! Does a type's `Dispose` reach a member?
//!
//! The body of the dispose method is searched for a call whose receiver
//! is rooted at the member (directly or through a computed property that
//! returns it) and for any reference to the member by name. Calls to other
//! dispose overloads, `base.Dispose()` and, when configured, helper methods
//! on the same instance are followed one indirection at a time.

use crate::classify::is_computed;
use crate::context::AnalysisContext;
use crate::errors::Result;
use crate::flow::implementations::{find_implementations, is_overridable};
use crate::flow::invocations::{is_call_on_this, receiver, IdentifierWalker, InvocationWalker};
use crate::flow::member_path::find_root_member;
use crate::flow::return_values::{has_body, return_expressions};
use crate::flow::{compatible_types, Visited};
use crate::semantic::{SemanticModel, SymbolId, SymbolKind};
use crate::syntax::NodeId;

const DISPOSE_NAMES: &[&str] = &["Dispose", "DisposeAsync"];

pub fn is_member_disposed(ctx: &AnalysisContext<'_>, member: SymbolId, dispose_method: SymbolId) -> Result<bool> {
    let mut visited = Visited::new();
    let helpers = usize::from(ctx.config.follow_dispose_helpers);
    let disposed = disposes_in(ctx, member, dispose_method, helpers, &mut visited)?;
    log::debug!(
        "{} {} disposed by {}",
        ctx.model.full_name(member),
        if disposed { "is" } else { "is not" },
        ctx.model.full_name(dispose_method)
    );
    Ok(disposed)
}

/// Dispose method a type declares or inherits with source: the
/// parameterless `Dispose`, else `DisposeAsync`.
pub fn find_dispose_method(ctx: &AnalysisContext<'_>, ty: SymbolId) -> Option<SymbolId> {
    let model = ctx.model;
    DISPOSE_NAMES.iter().find_map(|name| {
        model.members_named(ty, name).into_iter().find(|m| {
            let info = model.symbol_info(*m);
            info.kind == SymbolKind::Method && info.params.is_empty() && !info.is_external()
        })
    })
}

fn disposes_in(
    ctx: &AnalysisContext<'_>,
    member: SymbolId,
    method: SymbolId,
    helpers: usize,
    visited: &mut Visited,
) -> Result<bool> {
    ctx.check()?;
    let model = ctx.model;
    if !visited.enter(method, None) {
        return Ok(false);
    }
    let name = model.symbol_info(member).name.clone();
    let bodies: Vec<NodeId> = model
        .symbol_info(method)
        .declarations
        .iter()
        .copied()
        .filter(|decl| has_body(model, *decl))
        .collect();

    for body in bodies {
        let identifiers = IdentifierWalker::borrow(ctx, body, Some(&name))?;
        if identifiers.identifiers().iter().any(|id| model.symbol(*id) == Some(member)) {
            return Ok(true);
        }
        drop(identifiers);

        let invocations = InvocationWalker::borrow(ctx, body)?;
        for call in invocations.invocations() {
            ctx.check()?;
            if receiver(model, *call).is_some_and(|r| receiver_is_member(model, r, member)) {
                return Ok(true);
            }
            let Some(callee) = model.symbol(*call) else {
                continue;
            };
            if model.symbol_info(callee).is_external() || !is_call_on_this(model, *call) {
                continue;
            }
            let next = if is_dispose_overload(model, callee) {
                Some(helpers)
            } else if helpers > 0 && same_instance(model, member, callee) {
                Some(helpers - 1)
            } else {
                None
            };
            let Some(next) = next else {
                continue;
            };
            for target in dispatch_targets(ctx, member, callee)? {
                if disposes_in(ctx, member, target, next, visited)? {
                    return Ok(true);
                }
            }
        }
    }
    Ok(false)
}

/// Whether `receiver` is the member, or a computed property whose single
/// return value is.
fn receiver_is_member(model: &dyn SemanticModel, receiver: NodeId, member: SymbolId) -> bool {
    let Some(root) = find_root_member(model, receiver) else {
        return false;
    };
    let Some(symbol) = model.symbol(root) else {
        return false;
    };
    if symbol == member {
        return true;
    }
    let info = model.symbol_info(symbol);
    if !is_computed(info) {
        return false;
    }
    info.declarations.first().is_some_and(|decl| {
        let returned = return_expressions(model, *decl);
        returned.len() == 1
            && find_root_member(model, returned[0]).and_then(|inner| model.symbol(inner)) == Some(member)
    })
}

/// `Dispose()`, `Dispose(bool)` and `DisposeAsync()` variants.
fn is_dispose_overload(model: &dyn SemanticModel, method: SymbolId) -> bool {
    let info = model.symbol_info(method);
    DISPOSE_NAMES.contains(&info.name.as_str()) && info.params.len() <= 1
}

fn same_instance(model: &dyn SemanticModel, member: SymbolId, method: SymbolId) -> bool {
    match (model.containing_type(member), model.containing_type(method)) {
        (Some(a), Some(b)) => compatible_types(model, a, b),
        _ => false,
    }
}

/// The callee plus overrides that live in the member's type hierarchy.
fn dispatch_targets(ctx: &AnalysisContext<'_>, member: SymbolId, callee: SymbolId) -> Result<Vec<SymbolId>> {
    let model = ctx.model;
    let mut targets = vec![callee];
    if is_overridable(model, callee) {
        for implementation in find_implementations(ctx, callee)? {
            if same_instance(model, member, implementation) {
                targets.push(implementation);
            }
        }
    }
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::semantic::Compilation;

    fn disposed_with(source: &str, ty: &str, member: &str, config: &AnalysisConfig) -> bool {
        let model = Compilation::from_sources(vec![("d.cs", source)]).unwrap();
        let ctx = AnalysisContext::new(&model, config);
        let ty = model.find_type(ty).unwrap();
        let member = model.members_named(ty, member)[0];
        let dispose = find_dispose_method(&ctx, ty).unwrap();
        is_member_disposed(&ctx, member, dispose).unwrap()
    }

    fn disposed(source: &str, ty: &str, member: &str) -> bool {
        disposed_with(source, ty, member, &AnalysisConfig::default())
    }

    #[test]
    fn conditional_dispose_call_counts() {
        let source = "using System; using System.IO;
            class C : IDisposable { Stream _stream = File.OpenRead(\"a\"); public void Dispose() { _stream?.Dispose(); } }";
        assert!(disposed(source, "C", "_stream"));
        let empty = "using System; using System.IO;
            class C : IDisposable { Stream _stream = File.OpenRead(\"a\"); public void Dispose() { } }";
        assert!(!disposed(empty, "C", "_stream"));
    }

    #[test]
    fn dispose_bool_pattern_is_followed() {
        let source = "using System; using System.IO;
            class C : IDisposable {
                Stream _s = new MemoryStream();
                public void Dispose() { Dispose(true); GC.SuppressFinalize(this); }
                protected virtual void Dispose(bool disposing) { if (disposing) { _s.Dispose(); } }
            }";
        assert!(disposed(source, "C", "_s"));
    }

    #[test]
    fn base_dispose_is_followed() {
        let source = "using System; using System.IO;
            class Base : IDisposable { protected Stream _s = new MemoryStream(); public virtual void Dispose() { _s.Dispose(); } }
            class Derived : Base { public override void Dispose() { base.Dispose(); } }";
        let model = Compilation::from_sources(vec![("d.cs", source)]).unwrap();
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&model, &config);
        let derived = model.find_type("Derived").unwrap();
        let field = model.members_named(derived, "_s")[0];
        let dispose = find_dispose_method(&ctx, derived).unwrap();
        assert_eq!(model.full_name(dispose), "Derived.Dispose");
        assert!(is_member_disposed(&ctx, field, dispose).unwrap());
    }

    #[test]
    fn property_wrapper_is_unwrapped() {
        let source = "using System; using System.IO;
            class C : IDisposable { Stream _s = new MemoryStream(); Stream S => _s; public void Dispose() { S.Dispose(); } }";
        assert!(disposed(source, "C", "_s"));
    }

    #[test]
    fn helpers_depend_on_configuration() {
        let source = "using System; using System.IO;
            class C : IDisposable { Stream _s = new MemoryStream(); public void Dispose() { Cleanup(); } void Cleanup() { _s.Dispose(); } }";
        assert!(disposed(source, "C", "_s"));
        let strict = AnalysisConfig {
            follow_dispose_helpers: false,
            ..AnalysisConfig::default()
        };
        assert!(!disposed_with(source, "C", "_s", &strict));
    }
}
