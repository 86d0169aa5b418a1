//! Every origin a value can come from.
//!
//! A depth-first expansion records one [`ValueOrigin`] per syntax node.
//! Intermediate origins (member reads, calls into source, `ref`/`out`
//! writes) are expanded further; conditional and coalescing branches,
//! locals and parameters with a known call site are transparent. When an
//! expansion reaches a node that is still being expanded, the index of
//! that entry is noted, and after the walk those entries become
//! [`OriginKind::Recursion`].

use super::creation::Target;
use super::origin::{OriginKind, ValueOrigin};
use super::provenance::externally_settable;
use super::{bodies, is_computed, parameter_at, reads_this};
use crate::context::{AnalysisContext, Capability};
use crate::errors::Result;
use crate::flow::assignments::{collect_assignments, Assignment, AssignmentKind, Scope};
use crate::flow::invocations::parameter_for_argument;
use crate::flow::member_path::peel;
use crate::flow::return_values::{collect_return_values, return_expressions, unwrap_await, Awaited, Search};
use crate::flow::{enclosing_callable, CallFrames, CallSite, Visited};
use crate::semantic::{Ownership, SemanticModel, SymbolId, SymbolKind, TypeRef};
use crate::syntax::{BinaryOp, NodeId, NodeKind};

/// How an intermediate origin is expanded.
#[derive(Debug, Clone, Copy)]
enum Expansion {
    None,
    /// Assignments of a field or property of this instance.
    Member(SymbolId),
    /// Return values of a method or computed property, called from `site`.
    Returns(SymbolId, Option<NodeId>),
    /// Value stored by a call through a `ref`/`out` argument.
    WrittenBy(Assignment),
}

/// All origins of `target`, in discovery order.
pub fn classify_all(ctx: &AnalysisContext<'_>, target: Target) -> Result<Vec<ValueOrigin>> {
    let mut collector = SourceCollector::new(ctx);
    match target {
        Target::Expression(expr) => collector.visit(expr)?,
        Target::Symbol(symbol) => collector.symbol(symbol)?,
    }
    Ok(collector.finish())
}

/// First terminal origin of `target`.
pub fn classify(ctx: &AnalysisContext<'_>, target: Target) -> Result<Option<ValueOrigin>> {
    Ok(classify_all(ctx, target)?
        .into_iter()
        .find(|origin| origin.kind.is_terminal()))
}

struct SourceCollector<'c, 'a> {
    ctx: &'c AnalysisContext<'a>,
    frames: CallFrames,
    origins: Vec<ValueOrigin>,
    /// Nodes whose expansion is in progress.
    path: Vec<NodeId>,
    /// Entries a cycle closed back into.
    cycles: Vec<usize>,
    /// Callees whose `ref`/`out` writes are being expanded, by call.
    writers: Visited,
}

impl<'c, 'a> SourceCollector<'c, 'a> {
    fn new(ctx: &'c AnalysisContext<'a>) -> Self {
        Self {
            ctx,
            frames: CallFrames::new(),
            origins: Vec::new(),
            path: Vec::new(),
            cycles: Vec::new(),
            writers: Visited::new(),
        }
    }

    fn finish(mut self) -> Vec<ValueOrigin> {
        for index in self.cycles {
            self.origins[index].kind = OriginKind::Recursion;
        }
        log::debug!("collected {} origins", self.origins.len());
        self.origins
    }

    fn symbol(&mut self, symbol: SymbolId) -> Result<()> {
        let model = self.ctx.model;
        let info = model.symbol_info(symbol);
        let Some(decl) = info.declarations.first().copied() else {
            return Ok(());
        };
        match info.kind {
            SymbolKind::Method | SymbolKind::LocalFunction => self.expand(Expansion::Returns(symbol, None)),
            SymbolKind::Property if is_computed(info) => self.expand(Expansion::Returns(symbol, None)),
            SymbolKind::Field | SymbolKind::Property => self.expand(Expansion::Member(symbol)),
            SymbolKind::Local => match enclosing_callable(model, decl) {
                Some(scope) => self.assignments(symbol, Scope::Node(scope)),
                None => Ok(()),
            },
            SymbolKind::Parameter => {
                let kind = parameter_kind(model, symbol);
                self.record(decl, kind, Expansion::None)
            }
            SymbolKind::Constructor | SymbolKind::Type => Ok(()),
        }
    }

    fn visit(&mut self, expr: NodeId) -> Result<()> {
        self.ctx.check()?;
        let model = self.ctx.model;
        let expr = peel(model, expr);
        if !self.unseen(expr)? {
            return Ok(());
        }
        log::trace!("origins of `{}`", model.text(expr));

        match model.kind(expr) {
            NodeKind::Literal { .. } | NodeKind::Default { .. } | NodeKind::TypeOf { .. } | NodeKind::NameOf { .. } => {
                self.record(expr, OriginKind::Constant, Expansion::None)
            }
            NodeKind::ObjectCreation { .. } | NodeKind::ArrayCreation { .. } | NodeKind::Initializer { .. } => {
                self.record(expr, OriginKind::Created, Expansion::None)
            }
            NodeKind::Binary {
                op: BinaryOp::Coalesce,
                left,
                right,
            } => {
                self.visit(*left)?;
                self.visit(*right)
            }
            NodeKind::Conditional {
                when_true,
                when_false,
                ..
            } => {
                self.visit(*when_true)?;
                self.visit(*when_false)
            }
            NodeKind::SwitchExpression { arms, .. } => {
                for arm in arms {
                    self.visit(*arm)?;
                }
                Ok(())
            }
            NodeKind::Assignment { right, .. } => self.visit(*right),
            NodeKind::ConditionalAccess { when_not_null, .. } => self.visit(*when_not_null),
            NodeKind::ThrowExpression { .. } => Ok(()),
            NodeKind::Await { expr: awaited } => self.awaited(expr, *awaited),
            NodeKind::Identifier { .. }
            | NodeKind::MemberAccess { .. }
            | NodeKind::MemberBinding { .. }
            | NodeKind::ElementAccess { .. }
            | NodeKind::ElementBinding { .. }
            | NodeKind::Invocation { .. } => match model.symbol(expr) {
                Some(symbol) => self.reference(expr, symbol),
                None => self.record(expr, OriginKind::Unknown, Expansion::None),
            },
            _ => self.record(expr, OriginKind::Unknown, Expansion::None),
        }
    }

    fn awaited(&mut self, await_expr: NodeId, awaited: NodeId) -> Result<()> {
        let model = self.ctx.model;
        match unwrap_await(model, awaited) {
            Awaited::Value(value) => self.visit(value),
            Awaited::Lambda(lambda) => {
                for value in return_expressions(model, lambda) {
                    self.visit(value)?;
                }
                Ok(())
            }
            Awaited::Call(call) => match model.symbol(call) {
                Some(callee) if model.symbol_info(callee).is_external() => {
                    let kind = self.external_kind(callee, model.type_of(await_expr).as_ref());
                    self.record(call, kind, Expansion::None)
                }
                _ => self.visit(call),
            },
        }
    }

    fn reference(&mut self, expr: NodeId, symbol: SymbolId) -> Result<()> {
        let model = self.ctx.model;
        let info = model.symbol_info(symbol);
        if info.is_external() {
            let ty = model.type_of(expr).or_else(|| info.ty.clone());
            let kind = self.external_kind(symbol, ty.as_ref());
            return self.record(expr, kind, Expansion::None);
        }
        match self.ctx.known().ownership(model, symbol) {
            Ownership::Created => return self.record(expr, OriginKind::Created, Expansion::None),
            Ownership::NotOwned => return self.record(expr, OriginKind::Cached, Expansion::None),
            Ownership::Unspecified => {}
        }
        match info.kind {
            SymbolKind::Method | SymbolKind::LocalFunction => {
                if matches!(model.kind(expr), NodeKind::Invocation { .. }) {
                    self.record(expr, OriginKind::Calculated, Expansion::Returns(symbol, Some(expr)))
                } else {
                    self.record(expr, OriginKind::Unknown, Expansion::None)
                }
            }
            SymbolKind::Property if is_computed(info) => {
                self.record(expr, OriginKind::Calculated, Expansion::Returns(symbol, Some(expr)))
            }
            SymbolKind::Field | SymbolKind::Property => {
                if info.is_static() || !reads_this(model, expr) {
                    self.record(expr, OriginKind::Cached, Expansion::None)
                } else if externally_settable(model, symbol) {
                    self.record(expr, OriginKind::PotentiallyInjected, Expansion::Member(symbol))
                } else {
                    self.record(expr, OriginKind::Member, Expansion::Member(symbol))
                }
            }
            SymbolKind::Local => self.local(expr, symbol),
            SymbolKind::Parameter => self.parameter(expr, symbol),
            SymbolKind::Type | SymbolKind::Constructor => self.record(expr, OriginKind::Unknown, Expansion::None),
        }
    }

    fn external_kind(&self, symbol: SymbolId, ty: Option<&TypeRef>) -> OriginKind {
        let model = self.ctx.model;
        let info = model.symbol_info(symbol);
        match self.ctx.known().ownership(model, symbol) {
            Ownership::Created => return OriginKind::Created,
            Ownership::NotOwned => return OriginKind::Cached,
            Ownership::Unspecified => {}
        }
        if info.is_static() || info.kind == SymbolKind::Field {
            return OriginKind::Cached;
        }
        match self.ctx.capability(ty) {
            Capability::Tracked => OriginKind::PotentiallyCreated,
            Capability::Possible | Capability::Never => OriginKind::External,
        }
    }

    fn local(&mut self, expr: NodeId, local: SymbolId) -> Result<()> {
        let model = self.ctx.model;
        let scope = model
            .symbol_info(local)
            .declarations
            .first()
            .and_then(|decl| enclosing_callable(model, *decl));
        match scope {
            Some(scope) if model.node(scope).span.contains(model.node(expr).span) && scope.tree == expr.tree => {
                let before = self.origins.len();
                self.path.push(expr);
                let result = self.assignments(local, Scope::Before { scope, location: expr });
                self.path.pop();
                result?;
                if self.origins.len() == before {
                    // nothing assigned yet
                    self.record(expr, OriginKind::Unknown, Expansion::None)?;
                }
                Ok(())
            }
            _ => self.record(expr, OriginKind::Unknown, Expansion::None),
        }
    }

    fn parameter(&mut self, expr: NodeId, parameter: SymbolId) -> Result<()> {
        let model = self.ctx.model;
        match self.frames.argument(model, parameter) {
            Some((index, argument)) => {
                let upper = self.frames.split_off(index);
                self.path.push(expr);
                let result = self.visit(argument);
                self.path.pop();
                self.frames.restore(upper);
                result
            }
            None => {
                let kind = parameter_kind(model, parameter);
                self.record(expr, kind, Expansion::None)
            }
        }
    }

    /// Whether `node` still needs an origin. A node seen before is skipped,
    /// closing a cycle when it is still being expanded; past the depth
    /// limit it is recorded as `Unknown`.
    fn unseen(&mut self, node: NodeId) -> Result<bool> {
        if let Some(index) = self.origins.iter().position(|o| o.node == node) {
            if self.path.contains(&node) {
                log::debug!("cycle closed at `{}`", self.ctx.model.text(node));
                self.cycles.push(index);
            }
            return Ok(false);
        }
        if self.path.len() >= self.ctx.config.max_depth {
            log::debug!("depth limit {} reached, giving up", self.ctx.config.max_depth);
            self.record(node, OriginKind::Unknown, Expansion::None)?;
            return Ok(false);
        }
        Ok(true)
    }

    /// `ref`/`out` argument of a call that may write the target.
    fn written_at(&mut self, assignment: Assignment, kind: OriginKind) -> Result<()> {
        if !self.unseen(assignment.site)? {
            return Ok(());
        }
        self.record(assignment.site, kind, Expansion::WrittenBy(assignment))
    }

    /// Append an origin and expand it.
    fn record(&mut self, node: NodeId, kind: OriginKind, expansion: Expansion) -> Result<()> {
        self.origins.push(ValueOrigin::new(node, kind));
        if matches!(expansion, Expansion::None) {
            return Ok(());
        }
        self.path.push(node);
        let result = self.expand(expansion);
        self.path.pop();
        result
    }

    fn expand(&mut self, expansion: Expansion) -> Result<()> {
        match expansion {
            Expansion::None => Ok(()),
            Expansion::Member(member) => {
                let outer = self.frames.split_off(0);
                let result = self.assignments(member, Scope::Type);
                self.frames.restore(outer);
                result
            }
            Expansion::Returns(member, site) => {
                for (callee, decl) in bodies(self.ctx, member)? {
                    let values = collect_return_values(self.ctx, decl, Search::TopLevel)?;
                    if let Some(call) = site {
                        self.frames.push(callee, CallSite::Call(call));
                    }
                    let result = values.iter().try_for_each(|value| self.visit(*value));
                    if site.is_some() {
                        self.frames.pop();
                    }
                    result?;
                }
                Ok(())
            }
            Expansion::WrittenBy(assignment) => self.written_by(assignment),
        }
    }

    fn assignments(&mut self, target: SymbolId, scope: Scope) -> Result<()> {
        for assignment in collect_assignments(self.ctx, target, scope)? {
            match assignment.kind {
                AssignmentKind::Declaration
                | AssignmentKind::Assign
                | AssignmentKind::Coalesce
                | AssignmentKind::Pattern => self.visit(assignment.value)?,
                AssignmentKind::Ref => self.written_at(assignment, OriginKind::Ref)?,
                AssignmentKind::Out => self.written_at(assignment, OriginKind::Out)?,
                AssignmentKind::ForEach => self.record(assignment.value, OriginKind::Cached, Expansion::None)?,
                AssignmentKind::Compound | AssignmentKind::Increment => {
                    self.record(assignment.site, OriginKind::Unknown, Expansion::None)?
                }
            }
        }
        Ok(())
    }

    fn written_by(&mut self, assignment: Assignment) -> Result<()> {
        let model = self.ctx.model;
        let call = assignment.value;
        let Some(callee) = model.symbol(call) else {
            return self.record(call, OriginKind::Unknown, Expansion::None);
        };
        if model.symbol_info(callee).is_external() {
            let ty = model.symbol_info(assignment.target).ty.clone();
            let kind = self.external_kind(callee, ty.as_ref());
            return self.record(call, kind, Expansion::None);
        }
        let Some(parameter) = parameter_for_argument(model, call, assignment.site) else {
            return self.record(call, OriginKind::Unknown, Expansion::None);
        };
        if !self.writers.enter(callee, Some(call)) {
            return Ok(());
        }
        let result = bodies(self.ctx, callee).and_then(|found| {
            for (implementation, decl) in found {
                let Some(parameter) = parameter_at(model, implementation, parameter) else {
                    continue;
                };
                self.frames.push(implementation, CallSite::Call(call));
                let result = self.assignments(parameter, Scope::Node(decl));
                self.frames.pop();
                result?;
            }
            Ok(())
        });
        self.writers.leave(callee, Some(call));
        result
    }
}

/// Origin of a parameter with no known call site.
fn parameter_kind(model: &dyn SemanticModel, parameter: SymbolId) -> OriginKind {
    let owner = model.symbol_info(parameter).container;
    match owner.map(|owner| model.symbol_info(owner).kind) {
        Some(SymbolKind::Constructor) => OriginKind::Injected,
        Some(SymbolKind::Property) => OriginKind::PotentiallyInjected,
        _ => OriginKind::Argument,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::semantic::Compilation;
    use pretty_assertions::assert_eq;

    fn compile(members: &str) -> Compilation {
        let source = format!(
            "using System.IO; using System.Collections.Generic; class C {{ {} }}",
            members
        );
        Compilation::from_sources(vec![("s.cs", source)]).unwrap()
    }

    fn origins(members: &str, name: &str) -> Vec<(String, OriginKind)> {
        let model = compile(members);
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&model, &config);
        let ty = model.find_type("C").unwrap();
        let symbol = model.members_named(ty, name)[0];
        classify_all(&ctx, Target::Symbol(symbol))
            .unwrap()
            .into_iter()
            .map(|o| (model.text(o.node).to_string(), o.kind))
            .collect()
    }

    #[test]
    fn constructor_parameter_is_injected() {
        let found = origins("private readonly Stream _s; C(Stream s) { _s = s; }", "_s");
        assert_eq!(found, vec![("s".to_string(), OriginKind::Injected)]);
    }

    #[test]
    fn branches_and_creations() {
        let found = origins(
            "Stream _s; static Stream Shared; C(bool b) { _s = b ? new MemoryStream() : Shared; _s = null; }",
            "_s",
        );
        assert_eq!(
            found,
            vec![
                ("new MemoryStream()".to_string(), OriginKind::Created),
                ("Shared".to_string(), OriginKind::Cached),
                ("null".to_string(), OriginKind::Constant),
            ]
        );
    }

    #[test]
    fn calls_are_expanded_with_arguments() {
        let found = origins(
            "Stream _s; C() { _s = Make(\"a\"); } Stream Make(string path) => File.OpenRead(path);",
            "_s",
        );
        assert_eq!(
            found,
            vec![
                ("Make(\"a\")".to_string(), OriginKind::Calculated),
                ("File.OpenRead(path)".to_string(), OriginKind::Created),
            ]
        );
    }

    #[test]
    fn method_parameter_without_caller_is_an_argument() {
        let found = origins("Stream _s; void Set(Stream value) { _s = value; }", "_s");
        assert_eq!(found, vec![("value".to_string(), OriginKind::Argument)]);
    }

    #[test]
    fn self_returning_property_is_recursion() {
        let found = origins("Stream P => P;", "P");
        assert_eq!(found, vec![("P".to_string(), OriginKind::Recursion)]);
    }

    #[test]
    fn out_arguments_record_the_write() {
        let found = origins(
            "Stream _s; Dictionary<string, Stream> _map = new Dictionary<string, Stream>(); void Load() { _map.TryGetValue(\"k\", out _s); }",
            "_s",
        );
        assert_eq!(found[0].1, OriginKind::Out);
        assert_eq!(found[1], ("_map.TryGetValue(\"k\", out _s)".to_string(), OriginKind::Cached));
    }

    #[test]
    fn self_recursive_out_parameter_closes_a_cycle() {
        let found = origins(
            "Stream _s; bool b; C() { Open(out _s); } void Open(out Stream s) { if (b) { s = null; return; } Open(out s); }",
            "_s",
        );
        let kinds: Vec<_> = found.iter().map(|(_, kind)| *kind).collect();
        assert_eq!(kinds, vec![OriginKind::Out, OriginKind::Constant, OriginKind::Recursion]);
        assert_eq!(found[1].0, "null");
    }

    #[test]
    fn constructor_helper_argument_is_followed() {
        let found = origins(
            "Stream _s; C() { Init(new MemoryStream()); } private void Init(Stream s) { _s = s; }",
            "_s",
        );
        assert_eq!(found, vec![("new MemoryStream()".to_string(), OriginKind::Created)]);
    }

    #[test]
    fn first_terminal_origin() {
        let model = compile("Stream _s; C() { _s = Make(); } Stream Make() => new MemoryStream();");
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&model, &config);
        let ty = model.find_type("C").unwrap();
        let field = model.members_named(ty, "_s")[0];
        let origin = classify(&ctx, Target::Symbol(field)).unwrap().unwrap();
        assert_eq!(origin.kind, OriginKind::Created);
        assert_eq!(model.text(origin.node), "new MemoryStream()");
    }
}
