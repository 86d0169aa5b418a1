//! Invocation and identifier walkers plus argument/parameter mapping.

use once_cell::sync::Lazy;

use super::member_path::{binding_receiver, is_this_or_base, peel};
use crate::context::AnalysisContext;
use crate::errors::Result;
use crate::pool::{Pool, Poolable, Pooled};
use crate::semantic::{SemanticModel, SymbolId};
use crate::syntax::{NodeId, NodeKind};

static INVOCATIONS: Lazy<Pool<InvocationWalker>> = Lazy::new(Pool::new);
static IDENTIFIERS: Lazy<Pool<IdentifierWalker>> = Lazy::new(Pool::new);

/// Every invocation under a node, in source order.
#[derive(Debug, Default)]
pub struct InvocationWalker {
    invocations: Vec<NodeId>,
}

impl Poolable for InvocationWalker {
    fn clear(&mut self) {
        self.invocations.clear();
    }
}

impl InvocationWalker {
    pub fn borrow(ctx: &AnalysisContext<'_>, node: NodeId) -> Result<Pooled<'static, InvocationWalker>> {
        let mut walker = INVOCATIONS.borrow();
        for id in ctx.model.tree(node.tree).descendants(node) {
            ctx.check()?;
            if matches!(ctx.model.kind(id), NodeKind::Invocation { .. }) {
                walker.invocations.push(id);
            }
        }
        Ok(walker)
    }

    pub fn invocations(&self) -> &[NodeId] {
        &self.invocations
    }
}

/// Every identifier under a node, optionally filtered by name.
#[derive(Debug, Default)]
pub struct IdentifierWalker {
    identifiers: Vec<NodeId>,
}

impl Poolable for IdentifierWalker {
    fn clear(&mut self) {
        self.identifiers.clear();
    }
}

impl IdentifierWalker {
    pub fn borrow(
        ctx: &AnalysisContext<'_>,
        node: NodeId,
        name: Option<&str>,
    ) -> Result<Pooled<'static, IdentifierWalker>> {
        let mut walker = IDENTIFIERS.borrow();
        for id in ctx.model.tree(node.tree).descendants(node) {
            ctx.check()?;
            let found = match ctx.model.kind(id) {
                NodeKind::Identifier { name: n, .. } | NodeKind::MemberBinding { name: n, .. } => {
                    name.map_or(true, |name| name == n)
                }
                NodeKind::MemberAccess { name: n, .. } => name.is_some_and(|name| name == n),
                _ => false,
            };
            if found {
                walker.identifiers.push(id);
            }
        }
        Ok(walker)
    }

    pub fn identifiers(&self) -> &[NodeId] {
        &self.identifiers
    }
}

/// Explicit receiver of an invocation: `a` in `a.M()` and `a?.M()`.
/// `None` for calls on the implicit `this`.
pub fn receiver(model: &dyn SemanticModel, invocation: NodeId) -> Option<NodeId> {
    let NodeKind::Invocation { expr, .. } = model.kind(invocation) else {
        return None;
    };
    match model.kind(*expr) {
        NodeKind::MemberAccess { expr, .. } => Some(*expr),
        NodeKind::MemberBinding { .. } => binding_receiver(model, *expr),
        _ => None,
    }
}

/// Whether a call goes to the current instance: `M()`, `this.M()`,
/// `base.M()`.
pub fn is_call_on_this(model: &dyn SemanticModel, invocation: NodeId) -> bool {
    let NodeKind::Invocation { expr, .. } = model.kind(invocation) else {
        return false;
    };
    match model.kind(*expr) {
        NodeKind::Identifier { .. } => true,
        NodeKind::MemberAccess { expr, .. } => is_this_or_base(model, *expr),
        _ => false,
    }
}

/// Argument nodes of an invocation, object creation or constructor
/// initializer.
pub fn arguments(model: &dyn SemanticModel, call: NodeId) -> &[NodeId] {
    match model.kind(call) {
        NodeKind::Invocation { args, .. }
        | NodeKind::ObjectCreation { args, .. }
        | NodeKind::ConstructorInitializer { args, .. } => args,
        _ => &[],
    }
}

/// Whether `call` passes its receiver as the `this` parameter of an
/// extension method.
fn is_extension_call(model: &dyn SemanticModel, call: NodeId, callable: SymbolId) -> bool {
    model.symbol_info(callable).is_extension && receiver(model, call).is_some()
}

/// Parameter of `callable` that `argument` (an `Argument` node of `call`)
/// binds to.
pub fn parameter_for_argument(model: &dyn SemanticModel, call: NodeId, argument: NodeId) -> Option<SymbolId> {
    let callable = model.symbol(call)?;
    let args = arguments(model, call);
    let index = args.iter().position(|a| *a == argument)?;
    let params = &model.symbol_info(callable).params;
    if let NodeKind::Argument { name: Some(name), .. } = model.kind(argument) {
        return params
            .iter()
            .copied()
            .find(|p| model.symbol_info(*p).name == *name);
    }
    let offset = usize::from(is_extension_call(model, call, callable));
    params.get(index + offset).copied().or_else(|| {
        params.last().copied().filter(|p| {
            model.symbol_info(*p).param_modifier == crate::syntax::ParameterModifier::Params
        })
    })
}

/// Expression `call` passes for `parameter`, including the receiver of an
/// extension call.
pub fn argument_for_parameter(model: &dyn SemanticModel, call: NodeId, parameter: SymbolId) -> Option<NodeId> {
    let callable = model.symbol(call)?;
    if is_extension_call(model, call, callable)
        && model.symbol_info(callable).params.first() == Some(&parameter)
    {
        return receiver(model, call);
    }
    arguments(model, call).iter().find_map(|arg| {
        if parameter_for_argument(model, call, *arg) != Some(parameter) {
            return None;
        }
        match model.kind(*arg) {
            NodeKind::Argument { expr, .. } => Some(*expr),
            _ => Some(*arg),
        }
    })
}

/// Default value expression of an optional parameter with source.
pub fn default_value(model: &dyn SemanticModel, parameter: SymbolId) -> Option<NodeId> {
    model
        .symbol_info(parameter)
        .declarations
        .iter()
        .find_map(|decl| match model.kind(*decl) {
            NodeKind::Parameter { default, .. } => *default,
            _ => None,
        })
}

/// Call an `Argument` node belongs to.
pub fn enclosing_call(model: &dyn SemanticModel, argument: NodeId) -> Option<NodeId> {
    let parent = model.parent(argument)?;
    matches!(
        model.kind(parent),
        NodeKind::Invocation { .. } | NodeKind::ObjectCreation { .. } | NodeKind::ConstructorInitializer { .. }
    )
    .then_some(parent)
}

/// Name the invocation calls, read from syntax.
pub fn invoked_name(model: &dyn SemanticModel, invocation: NodeId) -> Option<&str> {
    let NodeKind::Invocation { expr, .. } = model.kind(invocation) else {
        return None;
    };
    match model.kind(peel(model, *expr)) {
        NodeKind::Identifier { name, .. }
        | NodeKind::MemberAccess { name, .. }
        | NodeKind::MemberBinding { name, .. } => Some(name),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::semantic::Compilation;

    const SOURCE: &str = "
        using System.IO;
        using System.Linq;
        using System.Collections.Generic;
        class C {
            Stream _s;
            void Use(Stream s, bool leaveOpen = false) { }
            void M(List<Stream> list) {
                Use(leaveOpen: true, s: _s);
                this.Use(_s);
                list.First();
                _s?.Flush();
            }
        }";

    fn invocations(model: &Compilation) -> Vec<NodeId> {
        let tree = &model.trees()[0];
        tree.node_ids()
            .filter(|id| matches!(tree.node(*id).kind, NodeKind::Invocation { .. }))
            .collect()
    }

    #[test]
    fn walker_collects_invocations_in_order() {
        let model = Compilation::from_sources(vec![("i.cs", SOURCE)]).unwrap();
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&model, &config);
        let root = model.trees()[0].root();
        let walker = InvocationWalker::borrow(&ctx, root).unwrap();
        let names: Vec<_> = walker
            .invocations()
            .iter()
            .filter_map(|i| invoked_name(&model, *i))
            .collect();
        assert_eq!(names, vec!["Use", "Use", "First", "Flush"]);
    }

    #[test]
    fn named_arguments_map_to_parameters() {
        let model = Compilation::from_sources(vec![("i.cs", SOURCE)]).unwrap();
        let calls = invocations(&model);
        let method = model.symbol(calls[0]).unwrap();
        let params = model.symbol_info(method).params.clone();
        let arg = argument_for_parameter(&model, calls[0], params[0]).unwrap();
        assert_eq!(model.text(arg), "_s");
        let flag = argument_for_parameter(&model, calls[0], params[1]).unwrap();
        assert_eq!(model.text(flag), "true");

        // omitted optional argument falls back to the default
        assert!(argument_for_parameter(&model, calls[1], params[1]).is_none());
        let default = default_value(&model, params[1]).unwrap();
        assert_eq!(model.text(default), "false");
    }

    #[test]
    fn extension_receiver_is_the_first_argument() {
        let model = Compilation::from_sources(vec![("i.cs", SOURCE)]).unwrap();
        let calls = invocations(&model);
        let first = model.symbol(calls[2]).unwrap();
        let this_param = model.symbol_info(first).params[0];
        let receiver = argument_for_parameter(&model, calls[2], this_param).unwrap();
        assert_eq!(model.text(receiver), "list");
    }

    #[test]
    fn receivers_and_calls_on_this() {
        let model = Compilation::from_sources(vec![("i.cs", SOURCE)]).unwrap();
        let calls = invocations(&model);
        assert!(is_call_on_this(&model, calls[0]));
        assert!(is_call_on_this(&model, calls[1]));
        assert!(!is_call_on_this(&model, calls[2]));
        let flushed = receiver(&model, calls[3]).unwrap();
        assert_eq!(model.text(flushed), "_s");
    }
}
