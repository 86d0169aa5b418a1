//! Expressions a callable can return.

use once_cell::sync::Lazy;

use super::assignments::{collect_assignments, Scope};
use super::invocations::arguments;
use super::member_path::peel;
use super::{enclosing_callable, CallFrames, CallSite, Visited};
use crate::context::AnalysisContext;
use crate::errors::Result;
use crate::pool::{Pool, Poolable, Pooled};
use crate::semantic::{SemanticModel, SymbolId, SymbolKind};
use crate::syntax::{AccessorKind, NodeId, NodeKind};

static WALKERS: Lazy<Pool<ReturnValueWalker>> = Lazy::new(Pool::new);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Search {
    /// Only the callable's own `return`s.
    TopLevel,
    /// Also inline the bodies of called methods and property getters.
    Recursive,
}

#[derive(Debug, Default)]
pub struct ReturnValueWalker {
    values: Vec<NodeId>,
}

impl Poolable for ReturnValueWalker {
    fn clear(&mut self) {
        self.values.clear();
    }
}

impl ReturnValueWalker {
    /// Walk `callable`: a member, accessor, local function or lambda
    /// declaration, or any node treated as a body.
    pub fn borrow(
        ctx: &AnalysisContext<'_>,
        callable: NodeId,
        search: Search,
    ) -> Result<Pooled<'static, ReturnValueWalker>> {
        let mut walker = WALKERS.borrow();
        let mut visited = Visited::new();
        let mut frames = CallFrames::new();
        visited.enter_node(callable);
        walker.run(ctx, callable, search, &mut visited, &mut frames)?;
        Ok(walker)
    }

    pub fn values(&self) -> &[NodeId] {
        &self.values
    }

    fn run(
        &mut self,
        ctx: &AnalysisContext<'_>,
        callable: NodeId,
        search: Search,
        visited: &mut Visited,
        frames: &mut CallFrames,
    ) -> Result<()> {
        for value in return_expressions(ctx.model, callable) {
            ctx.check()?;
            self.add(ctx, value, search, visited, frames)?;
        }
        Ok(())
    }

    fn add(
        &mut self,
        ctx: &AnalysisContext<'_>,
        value: NodeId,
        search: Search,
        visited: &mut Visited,
        frames: &mut CallFrames,
    ) -> Result<()> {
        ctx.check()?;
        let model = ctx.model;
        let value = frames.substitute(model, value);
        let expr = peel(model, value);

        if let NodeKind::Await { expr: awaited } = model.kind(expr) {
            match unwrap_await(model, *awaited) {
                Awaited::Value(inner) => return self.add(ctx, inner, search, visited, frames),
                Awaited::Lambda(lambda) => {
                    for inner in return_expressions(model, lambda) {
                        self.add(ctx, inner, search, visited, frames)?;
                    }
                    return Ok(());
                }
                Awaited::Call(call) => {
                    if search == Search::Recursive && self.inline(ctx, call, search, visited, frames)? {
                        return Ok(());
                    }
                    self.push(value);
                    return Ok(());
                }
            }
        }

        if search == Search::Recursive && self.inline(ctx, expr, search, visited, frames)? {
            return Ok(());
        }

        if let Some(symbol) = model.symbol(expr) {
            let info = model.symbol_info(symbol);
            if matches!(info.kind, SymbolKind::Local | SymbolKind::Parameter)
                && matches!(model.kind(expr), NodeKind::Identifier { .. })
                && visited.enter_node(expr)
            {
                if let Some(scope) = enclosing_callable(model, expr) {
                    let assigned = collect_assignments(ctx, symbol, Scope::Before { scope, location: expr })?;
                    if !assigned.is_empty() {
                        for assignment in assigned {
                            self.add(ctx, assignment.value, search, visited, frames)?;
                        }
                        return Ok(());
                    }
                }
            }
        }
        self.push(value);
        Ok(())
    }

    /// Replace a call or getter read by the callee's own return values.
    fn inline(
        &mut self,
        ctx: &AnalysisContext<'_>,
        expr: NodeId,
        search: Search,
        visited: &mut Visited,
        frames: &mut CallFrames,
    ) -> Result<bool> {
        let model = ctx.model;
        let Some(callee) = model.symbol(expr) else {
            return Ok(false);
        };
        let Some(body) = inlinable_body(model, expr, callee) else {
            return Ok(false);
        };
        if !visited.enter(callee, Some(expr)) {
            log::debug!("recursion through {} stopped", model.full_name(callee));
            return Ok(true);
        }
        log::trace!("inlining return values of {}", model.full_name(callee));
        let site = if arguments(model, expr).is_empty() && !matches!(model.kind(expr), NodeKind::Invocation { .. }) {
            None
        } else {
            Some(CallSite::Call(expr))
        };
        if let Some(site) = site {
            frames.push(callee, site);
        }
        let result = self.run(ctx, body, search, visited, frames);
        if site.is_some() {
            frames.pop();
        }
        result?;
        Ok(true)
    }

    fn push(&mut self, value: NodeId) {
        if !self.values.contains(&value) {
            self.values.push(value);
        }
    }
}

/// Collect the return values of `callable`.
pub fn collect_return_values(ctx: &AnalysisContext<'_>, callable: NodeId, search: Search) -> Result<Vec<NodeId>> {
    let walker = ReturnValueWalker::borrow(ctx, callable, search)?;
    Ok(walker.values().to_vec())
}

/// Declaration whose returns produce the value of `expr`, when `expr`
/// calls a method or reads a computed property with source.
fn inlinable_body(model: &dyn SemanticModel, expr: NodeId, callee: SymbolId) -> Option<NodeId> {
    let info = model.symbol_info(callee);
    match info.kind {
        SymbolKind::Method | SymbolKind::LocalFunction => {
            if !matches!(model.kind(expr), NodeKind::Invocation { .. }) {
                return None;
            }
            info.declarations.iter().copied().find(|decl| has_body(model, *decl))
        }
        SymbolKind::Property if !info.is_auto => {
            if !matches!(
                model.kind(expr),
                NodeKind::Identifier { .. } | NodeKind::MemberAccess { .. } | NodeKind::MemberBinding { .. }
            ) {
                return None;
            }
            info.getter.and(info.declarations.first().copied())
        }
        _ => None,
    }
}

pub(crate) fn has_body(model: &dyn SemanticModel, decl: NodeId) -> bool {
    matches!(
        model.kind(decl),
        NodeKind::Method { body: Some(_), .. }
            | NodeKind::Method { expression_body: Some(_), .. }
            | NodeKind::LocalFunction { body: Some(_), .. }
            | NodeKind::LocalFunction { expression_body: Some(_), .. }
    )
}

/// Expressions returned directly by `callable`, skipping nested lambdas
/// and local functions.
pub fn return_expressions(model: &dyn SemanticModel, callable: NodeId) -> Vec<NodeId> {
    match model.kind(callable) {
        NodeKind::Property {
            expression_body: Some(body),
            ..
        } => vec![*body],
        NodeKind::Property { accessors, .. } => accessors
            .iter()
            .find(|a| matches!(model.kind(**a), NodeKind::Accessor { kind: AccessorKind::Get, .. }))
            .map(|getter| return_expressions(model, *getter))
            .unwrap_or_default(),
        NodeKind::Method {
            body,
            expression_body,
            ..
        }
        | NodeKind::LocalFunction {
            body,
            expression_body,
            ..
        }
        | NodeKind::Accessor {
            body,
            expression_body,
            ..
        } => match (expression_body, body) {
            (Some(expr), _) => vec![*expr],
            (None, Some(body)) => returns_in(model, *body),
            (None, None) => Vec::new(),
        },
        NodeKind::Lambda { body, .. } => {
            if matches!(model.kind(*body), NodeKind::Block { .. }) {
                returns_in(model, *body)
            } else {
                vec![*body]
            }
        }
        _ => returns_in(model, callable),
    }
}

fn returns_in(model: &dyn SemanticModel, body: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack = vec![body];
    while let Some(id) = stack.pop() {
        let kind = model.kind(id);
        if id != body && (kind.is_callable() || matches!(kind, NodeKind::LocalFunction { .. })) {
            continue;
        }
        if let NodeKind::Return { expr: Some(expr) } = kind {
            out.push(*expr);
            continue;
        }
        stack.extend(kind.children().into_iter().rev());
    }
    out
}

/// What an awaited expression produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Awaited {
    /// `Task.FromResult(x)` produces `x`.
    Value(NodeId),
    /// `Task.Run(() => x)` produces the lambda's return values.
    Lambda(NodeId),
    /// Any other awaitable; `ConfigureAwait` already peeled.
    Call(NodeId),
}

pub fn unwrap_await(model: &dyn SemanticModel, awaited: NodeId) -> Awaited {
    let mut current = peel(model, awaited);
    loop {
        let NodeKind::Invocation { expr, args } = model.kind(current) else {
            return Awaited::Call(current);
        };
        let method = model.symbol(current).map(|m| model.full_name(m));
        let first_arg = args.first().map(|arg| match model.kind(*arg) {
            NodeKind::Argument { expr, .. } => peel(model, *expr),
            _ => *arg,
        });
        match method.as_deref() {
            Some("System.Threading.Tasks.Task.ConfigureAwait" | "System.Threading.Tasks.ValueTask.ConfigureAwait") => {
                match model.kind(*expr) {
                    NodeKind::MemberAccess { expr: inner, .. } => current = peel(model, *inner),
                    _ => return Awaited::Call(current),
                }
            }
            Some("System.Threading.Tasks.Task.FromResult" | "System.Threading.Tasks.ValueTask.FromResult") => {
                return first_arg.map_or(Awaited::Call(current), Awaited::Value);
            }
            Some("System.Threading.Tasks.Task.Run") => {
                return match first_arg {
                    Some(lambda) if matches!(model.kind(lambda), NodeKind::Lambda { .. }) => Awaited::Lambda(lambda),
                    _ => Awaited::Call(current),
                };
            }
            _ => return Awaited::Call(current),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::semantic::Compilation;
    use indoc::indoc;

    fn method(model: &Compilation, name: &str) -> NodeId {
        let tree = &model.trees()[0];
        tree.node_ids()
            .find(|id| matches!(&tree.node(*id).kind, NodeKind::Method { name: n, .. } if n == name))
            .unwrap()
    }

    fn texts(model: &Compilation, values: &[NodeId]) -> Vec<String> {
        values.iter().map(|v| model.text(*v).to_string()).collect()
    }

    #[test]
    fn collects_returns_but_not_nested_lambdas() {
        let model = Compilation::from_sources(vec![(
            "r.cs",
            indoc! {"
                using System;
                using System.IO;
                class C {
                    Stream M(bool b) {
                        Func<Stream> f = () => { return Stream.Null; };
                        if (b) { return new MemoryStream(); }
                        return null;
                    }
                }
            "},
        )])
        .unwrap();
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&model, &config);
        let values = collect_return_values(&ctx, method(&model, "M"), Search::TopLevel).unwrap();
        assert_eq!(texts(&model, &values), vec!["new MemoryStream()", "null"]);
    }

    #[test]
    fn recursive_search_inlines_callees_with_arguments() {
        let model = Compilation::from_sources(vec![(
            "r.cs",
            indoc! {"
                using System.IO;
                class C {
                    Stream Wrap(Stream inner) => inner;
                    Stream Open() {
                        var s = new MemoryStream();
                        return s;
                    }
                    Stream M() => Wrap(Open());
                }
            "},
        )])
        .unwrap();
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&model, &config);
        let top = collect_return_values(&ctx, method(&model, "M"), Search::TopLevel).unwrap();
        assert_eq!(texts(&model, &top), vec!["Wrap(Open())"]);

        let deep = collect_return_values(&ctx, method(&model, "M"), Search::Recursive).unwrap();
        assert_eq!(texts(&model, &deep), vec!["new MemoryStream()"]);
    }

    #[test]
    fn awaits_are_unwrapped() {
        let model = Compilation::from_sources(vec![(
            "r.cs",
            indoc! {"
                using System.IO;
                using System.Threading.Tasks;
                class C {
                    async Task<Stream> A() => await Task.FromResult<Stream>(new MemoryStream());
                    async Task<Stream> B() => await Task.Run(() => Stream.Null).ConfigureAwait(false);
                }
            "},
        )])
        .unwrap();
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&model, &config);
        let a = collect_return_values(&ctx, method(&model, "A"), Search::TopLevel).unwrap();
        assert_eq!(texts(&model, &a), vec!["new MemoryStream()"]);
        let b = collect_return_values(&ctx, method(&model, "B"), Search::TopLevel).unwrap();
        assert_eq!(texts(&model, &b), vec!["Stream.Null"]);
    }

    #[test]
    fn self_recursive_getter_terminates() {
        let model = Compilation::from_sources(vec![(
            "r.cs",
            "using System.IO; class C { Stream P => P; Stream M() => P; }",
        )])
        .unwrap();
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&model, &config);
        let values = collect_return_values(&ctx, method(&model, "M"), Search::Recursive).unwrap();
        assert!(values.is_empty());
    }
}
