//! Could a value be a resource created for whoever holds it?
//!
//! Expressions are decided by shape: creations, literals and branches are
//! answered directly, everything that refers to a symbol is followed into
//! return values, assignment sites or call-site arguments. Each branch that
//! cannot be decided degrades to `Unknown` or `No`; nothing here fails
//! except cancellation.

use std::collections::HashMap;

use super::origin::Creation;
use super::{bodies, is_computed, parameter_at, reads_this};
use crate::context::{AnalysisContext, Capability};
use crate::errors::Result;
use crate::flow::assignments::{collect_assignments, Assignment, AssignmentKind, Scope};
use crate::flow::invocations::parameter_for_argument;
use crate::flow::member_path::peel;
use crate::flow::return_values::{collect_return_values, return_expressions, unwrap_await, Awaited, Search};
use crate::flow::{enclosing_callable, CallFrames, CallSite};
use crate::semantic::{Ownership, SymbolId, SymbolKind, TypeRef};
use crate::syntax::{BinaryOp, NodeId, NodeKind};

/// What a query classifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Expression(NodeId),
    /// A field, property, local, parameter or method.
    Symbol(SymbolId),
}

pub fn classify_creation(ctx: &AnalysisContext<'_>, target: Target) -> Result<Creation> {
    let mut classifier = CreationClassifier::new(ctx);
    let creation = match target {
        Target::Expression(expr) => classifier.expression(expr)?,
        Target::Symbol(symbol) => classifier.symbol(symbol)?,
    };
    log::debug!(
        "creation of {:?}: {:?} ({} entries classified)",
        target,
        creation,
        classifier.classified
    );
    Ok(creation)
}

/// A member or callable entered from a call site. Member assignments and
/// the query root use `None`; `out`/`ref` writes are keyed by the written
/// parameter.
type Entry = (SymbolId, Option<NodeId>);

struct CreationClassifier<'c, 'a> {
    ctx: &'c AnalysisContext<'a>,
    /// Entries being classified, outermost first.
    stack: Vec<Entry>,
    /// Finished entries whose answer holds wherever they are reached from.
    memo: HashMap<Entry, Creation>,
    /// Entries whose bodies were walked, memo hits excluded.
    classified: usize,
    frames: CallFrames,
    depth: usize,
    /// Lowest call frame a parameter was resolved through since the
    /// innermost entry began.
    frame_floor: usize,
    /// Lowest stack position a cycle cut or the depth limit fell back to
    /// since the innermost entry began.
    cut_floor: usize,
}

impl<'c, 'a> CreationClassifier<'c, 'a> {
    fn new(ctx: &'c AnalysisContext<'a>) -> Self {
        Self {
            ctx,
            stack: Vec::new(),
            memo: HashMap::new(),
            classified: 0,
            frames: CallFrames::new(),
            depth: 0,
            frame_floor: usize::MAX,
            cut_floor: usize::MAX,
        }
    }

    fn symbol(&mut self, symbol: SymbolId) -> Result<Creation> {
        let model = self.ctx.model;
        let info = model.symbol_info(symbol);
        if let Some(known) = self.known(symbol) {
            return Ok(known);
        }
        if info.is_external() {
            return Ok(self.external(symbol, info.ty.as_ref()));
        }
        match info.kind {
            SymbolKind::Method | SymbolKind::LocalFunction => self.returns(symbol, None),
            SymbolKind::Property if is_computed(info) => self.returns(symbol, None),
            SymbolKind::Field | SymbolKind::Property => self.assigned(symbol),
            SymbolKind::Local => self.local(symbol, None),
            SymbolKind::Parameter | SymbolKind::Constructor | SymbolKind::Type => Ok(Creation::No),
        }
    }

    fn expression(&mut self, expr: NodeId) -> Result<Creation> {
        self.ctx.check()?;
        if self.depth >= self.ctx.config.max_depth {
            log::debug!("depth limit {} reached, giving up", self.ctx.config.max_depth);
            self.cut_floor = 0;
            return Ok(Creation::Unknown);
        }
        self.depth += 1;
        let result = self.classify(expr);
        self.depth -= 1;
        result
    }

    fn classify(&mut self, expr: NodeId) -> Result<Creation> {
        let model = self.ctx.model;
        let expr = peel(model, expr);
        log::trace!("creation of `{}`", model.text(expr));
        match model.kind(expr) {
            NodeKind::Literal { .. }
            | NodeKind::Default { .. }
            | NodeKind::TypeOf { .. }
            | NodeKind::NameOf { .. }
            | NodeKind::This
            | NodeKind::Base
            | NodeKind::Lambda { .. }
            | NodeKind::ThrowExpression { .. }
            | NodeKind::Is { .. }
            | NodeKind::Prefix { .. }
            | NodeKind::Postfix { .. }
            | NodeKind::Tuple { .. } => Ok(Creation::No),
            NodeKind::Binary {
                op: BinaryOp::Coalesce,
                left,
                right,
            } => {
                let left = self.expression(*left)?;
                if matches!(left, Creation::Yes | Creation::Unknown) {
                    return Ok(left);
                }
                Ok(left.coalesce(self.expression(*right)?))
            }
            NodeKind::Binary { .. } => Ok(Creation::No),
            NodeKind::Conditional {
                when_true,
                when_false,
                ..
            } => self.branches(&[*when_true, *when_false]),
            NodeKind::SwitchExpression { arms, .. } => self.branches(arms),
            NodeKind::ObjectCreation { .. } | NodeKind::ArrayCreation { .. } | NodeKind::Initializer { .. } => {
                if self.ctx.is_tracked(model.type_of(expr).as_ref()) {
                    Ok(Creation::Yes)
                } else {
                    Ok(Creation::No)
                }
            }
            NodeKind::Assignment { right, .. } => self.expression(*right),
            NodeKind::ConditionalAccess { when_not_null, .. } => self.expression(*when_not_null),
            NodeKind::Await { expr: awaited } => self.awaited(expr, *awaited),
            NodeKind::Identifier { .. }
            | NodeKind::MemberAccess { .. }
            | NodeKind::MemberBinding { .. }
            | NodeKind::ElementAccess { .. }
            | NodeKind::ElementBinding { .. }
            | NodeKind::Invocation { .. } => match model.symbol(expr) {
                Some(symbol) => self.reference(expr, symbol),
                None => {
                    log::trace!("`{}` is unresolved", model.text(expr));
                    Ok(Creation::Unknown)
                }
            },
            _ => Ok(Creation::Unknown),
        }
    }

    /// Join of alternatives, stopping at the first `Yes`.
    fn branches(&mut self, branches: &[NodeId]) -> Result<Creation> {
        let mut result = Creation::No;
        for branch in branches {
            result = result.join(self.expression(*branch)?);
            if result == Creation::Yes {
                break;
            }
        }
        Ok(result)
    }

    /// Classify `entry` once per query.
    ///
    /// An entry already in progress is a cycle and contributes `No`. A
    /// finished answer is reused unless it depended on call frames below
    /// `frames_base`, on an entry that was still in progress, or on the
    /// depth limit.
    fn entered(
        &mut self,
        entry: Entry,
        frames_base: usize,
        compute: impl FnOnce(&mut Self) -> Result<Creation>,
    ) -> Result<Creation> {
        if let Some(known) = self.memo.get(&entry) {
            return Ok(*known);
        }
        if let Some(position) = self.stack.iter().position(|e| *e == entry) {
            log::debug!("cycle through {} cut", self.ctx.model.full_name(entry.0));
            self.cut_floor = self.cut_floor.min(position);
            return Ok(Creation::No);
        }
        let position = self.stack.len();
        self.classified += 1;
        self.stack.push(entry);
        let outer_frames = std::mem::replace(&mut self.frame_floor, usize::MAX);
        let outer_cuts = std::mem::replace(&mut self.cut_floor, usize::MAX);
        let result = compute(self);
        self.stack.pop();
        let result = result?;
        if self.frame_floor >= frames_base && self.cut_floor >= position {
            self.memo.insert(entry, result);
        }
        self.frame_floor = self.frame_floor.min(outer_frames);
        self.cut_floor = self.cut_floor.min(outer_cuts);
        Ok(result)
    }

    fn awaited(&mut self, await_expr: NodeId, awaited: NodeId) -> Result<Creation> {
        let model = self.ctx.model;
        match unwrap_await(model, awaited) {
            Awaited::Value(value) => self.expression(value),
            Awaited::Lambda(lambda) => self.branches(&return_expressions(model, lambda)),
            Awaited::Call(call) => match model.symbol(call) {
                // the awaited result type decides, not the task type
                Some(callee) if model.symbol_info(callee).is_external() => match self.known(callee) {
                    Some(known) => Ok(known),
                    None => Ok(self.external(callee, model.type_of(await_expr).as_ref())),
                },
                _ => self.expression(call),
            },
        }
    }

    fn reference(&mut self, expr: NodeId, symbol: SymbolId) -> Result<Creation> {
        let model = self.ctx.model;
        let info = model.symbol_info(symbol);
        if let Some(known) = self.known(symbol) {
            return Ok(known);
        }
        if info.is_external() {
            let ty = model.type_of(expr).or_else(|| info.ty.clone());
            return Ok(self.external(symbol, ty.as_ref()));
        }
        match info.kind {
            SymbolKind::Method | SymbolKind::LocalFunction => {
                if matches!(model.kind(expr), NodeKind::Invocation { .. }) {
                    self.returns(symbol, Some(expr))
                } else {
                    Ok(Creation::No)
                }
            }
            SymbolKind::Property if is_computed(info) => self.returns(symbol, Some(expr)),
            SymbolKind::Field | SymbolKind::Property => {
                // statics and other instances' members are owned elsewhere
                if !info.is_static() && reads_this(model, expr) {
                    self.assigned(symbol)
                } else {
                    Ok(Creation::No)
                }
            }
            SymbolKind::Local => self.local(symbol, Some(expr)),
            SymbolKind::Parameter => self.parameter(symbol),
            SymbolKind::Type | SymbolKind::Constructor => Ok(Creation::No),
        }
    }

    fn known(&self, symbol: SymbolId) -> Option<Creation> {
        match self.ctx.known().ownership(self.ctx.model, symbol) {
            Ownership::Created => Some(Creation::Yes),
            Ownership::NotOwned => Some(Creation::No),
            Ownership::Unspecified => None,
        }
    }

    /// External code: only the value type can be judged.
    fn external(&self, symbol: SymbolId, ty: Option<&TypeRef>) -> Creation {
        match self.ctx.model.symbol_info(symbol).kind {
            SymbolKind::Method | SymbolKind::Property => match self.ctx.capability(ty) {
                Capability::Tracked => Creation::Maybe,
                Capability::Possible => Creation::Unknown,
                Capability::Never => Creation::No,
            },
            _ => Creation::No,
        }
    }

    /// Return values of a method or computed property, called from `site`.
    fn returns(&mut self, member: SymbolId, site: Option<NodeId>) -> Result<Creation> {
        let base = self.frames.len();
        self.entered((member, site), base, |this| {
            let model = this.ctx.model;
            let found = bodies(this.ctx, member)?;
            if found.is_empty() {
                return Ok(this.external(member, model.symbol_info(member).ty.as_ref()));
            }
            let mut result = Creation::No;
            for (callee, decl) in found {
                let values = collect_return_values(this.ctx, decl, Search::TopLevel)?;
                if let Some(call) = site {
                    this.frames.push(callee, CallSite::Call(call));
                }
                let creation = this.branches(&values);
                if site.is_some() {
                    this.frames.pop();
                }
                result = result.join(creation?);
                if result == Creation::Yes {
                    break;
                }
            }
            Ok(result)
        })
    }

    /// Every value assigned to a field or auto-property of this instance.
    fn assigned(&mut self, member: SymbolId) -> Result<Creation> {
        // assignment values were already substituted by the walker, so the
        // answer never depends on the caller's frames
        let outer = self.frames.split_off(0);
        let outer_floor = self.frame_floor;
        let result = self.entered((member, None), 0, |this| this.assignments(member, Scope::Type));
        self.frame_floor = outer_floor;
        self.frames.restore(outer);
        result
    }

    fn local(&mut self, local: SymbolId, location: Option<NodeId>) -> Result<Creation> {
        let model = self.ctx.model;
        let Some(scope) = model
            .symbol_info(local)
            .declarations
            .first()
            .and_then(|decl| enclosing_callable(model, *decl))
        else {
            return Ok(Creation::Unknown);
        };
        let scope = match location {
            Some(location)
                if location.tree == scope.tree && model.node(scope).span.contains(model.node(location).span) =>
            {
                Scope::Before { scope, location }
            }
            _ => Scope::Node(scope),
        };
        self.assignments(local, scope)
    }

    fn parameter(&mut self, parameter: SymbolId) -> Result<Creation> {
        let Some((index, argument)) = self.frames.argument(self.ctx.model, parameter) else {
            // supplied by an unknown caller
            return Ok(Creation::No);
        };
        self.frame_floor = self.frame_floor.min(index);
        let upper = self.frames.split_off(index);
        let result = self.expression(argument);
        self.frames.restore(upper);
        result
    }

    fn assignments(&mut self, target: SymbolId, scope: Scope) -> Result<Creation> {
        let assignments = collect_assignments(self.ctx, target, scope)?;
        let mut result = Creation::No;
        for assignment in assignments {
            let creation = match assignment.kind {
                AssignmentKind::Declaration
                | AssignmentKind::Assign
                | AssignmentKind::Coalesce
                | AssignmentKind::Pattern => self.expression(assignment.value)?,
                AssignmentKind::Ref | AssignmentKind::Out => self.written_by_call(assignment)?,
                AssignmentKind::Compound | AssignmentKind::Increment | AssignmentKind::ForEach => Creation::No,
            };
            result = result.join(creation);
            if result == Creation::Yes {
                break;
            }
        }
        Ok(result)
    }

    /// Value a call stores through a `ref` or `out` argument.
    fn written_by_call(&mut self, assignment: Assignment) -> Result<Creation> {
        let model = self.ctx.model;
        let call = assignment.value;
        let Some(callee) = model.symbol(call) else {
            return Ok(Creation::Unknown);
        };
        if let Some(known) = self.known(callee) {
            return Ok(known);
        }
        let Some(parameter) = parameter_for_argument(model, call, assignment.site) else {
            return Ok(Creation::Unknown);
        };
        if model.symbol_info(callee).is_external() {
            let ty = model.symbol_info(assignment.target).ty.clone();
            return Ok(self.external(callee, ty.as_ref()));
        }
        let base = self.frames.len();
        self.entered((parameter, Some(call)), base, |this| {
            let mut result = Creation::No;
            for (implementation, decl) in bodies(this.ctx, callee)? {
                let Some(parameter) = parameter_at(model, implementation, parameter) else {
                    continue;
                };
                this.frames.push(implementation, CallSite::Call(call));
                let creation = this.assignments(parameter, Scope::Node(decl));
                this.frames.pop();
                result = result.join(creation?);
                if result == Creation::Yes {
                    break;
                }
            }
            Ok(result)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::semantic::{Compilation, SemanticModel};

    fn compile(members: &str) -> Compilation {
        let source = format!(
            "using System; using System.IO; using System.Collections.Generic; using System.Threading.Tasks;
             class C : IDisposable {{ {} public void Dispose() {{ }} }}",
            members
        );
        Compilation::from_sources(vec![("c.cs", source)]).unwrap()
    }

    fn member(model: &Compilation, name: &str) -> SymbolId {
        let ty = model.find_type("C").unwrap();
        model.members_named(ty, name)[0]
    }

    fn creation_of(members: &str, name: &str) -> Creation {
        let model = compile(members);
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&model, &config);
        classify_creation(&ctx, Target::Symbol(member(&model, name))).unwrap()
    }

    #[test]
    fn new_disposable_is_created() {
        assert_eq!(creation_of("Stream _s = new MemoryStream();", "_s"), Creation::Yes);
        assert_eq!(creation_of("object _o = new object();", "_o"), Creation::No);
        assert_eq!(creation_of("string _t = \"x\";", "_t"), Creation::No);
    }

    #[test]
    fn factories_and_non_owning_accessors() {
        assert_eq!(
            creation_of("Stream _s; C(string p) { _s = File.OpenRead(p); }", "_s"),
            Creation::Yes
        );
        assert_eq!(
            creation_of(
                "Stream _s; Dictionary<string, Stream> _map; C() { _s = _map[\"k\"]; }",
                "_s"
            ),
            Creation::No
        );
        assert_eq!(creation_of("Stream _s = Stream.Null;", "_s"), Creation::No);
    }

    #[test]
    fn parameters_without_call_site_are_not_created() {
        assert_eq!(creation_of("readonly Stream _s; C(Stream s) { _s = s; }", "_s"), Creation::No);
    }

    #[test]
    fn helper_arguments_are_substituted() {
        let members = "Stream _s; C() { _s = Wrap(new MemoryStream()); } Stream Wrap(Stream inner) => inner;";
        assert_eq!(creation_of(members, "_s"), Creation::Yes);
        let members = "Stream _s; C(Stream given) { _s = Wrap(given); } Stream Wrap(Stream inner) => inner;";
        assert_eq!(creation_of(members, "_s"), Creation::No);
    }

    #[test]
    fn computed_property_follows_its_getter() {
        let members = "Stream _inner = new MemoryStream(); Stream Inner => _inner;";
        assert_eq!(creation_of(members, "Inner"), Creation::Yes);
    }

    #[test]
    fn self_returning_property_terminates() {
        assert_eq!(creation_of("Stream P => P;", "P"), Creation::No);
        assert_eq!(creation_of("Stream A() => B(); Stream B() => A();", "A"), Creation::No);
    }

    #[test]
    fn awaited_task_results_are_unwrapped() {
        let members = "Stream _s; async Task Init() { _s = await Task.FromResult(new MemoryStream()); }";
        assert_eq!(creation_of(members, "_s"), Creation::Yes);
    }

    #[test]
    fn out_arguments_follow_the_callee() {
        let members =
            "Stream _s; C() { Open(out _s); } void Open(out Stream s) { s = new MemoryStream(); }";
        assert_eq!(creation_of(members, "_s"), Creation::Yes);
    }

    #[test]
    fn alternatives_join_with_yes_winning() {
        let members = "bool b; Stream _s; C() { _s = b ? Unresolved() : new MemoryStream(); }";
        assert_eq!(creation_of(members, "_s"), Creation::Yes);
        let members = "Stream _s; C() { _s = Unresolved(); _s = new MemoryStream(); }";
        assert_eq!(creation_of(members, "_s"), Creation::Yes);
        let members = "int k; Stream _s; C() { _s = k switch { 0 => Unresolved(), _ => new MemoryStream() }; }";
        assert_eq!(creation_of(members, "_s"), Creation::Yes);
    }

    #[test]
    fn coalesce_keeps_an_undecided_left_side() {
        let members = "Stream _s; C() { _s = Unresolved() ?? new MemoryStream(); }";
        assert_eq!(creation_of(members, "_s"), Creation::Unknown);
        let members = "Stream _other; Stream _s; C() { _s = _other ?? new MemoryStream(); }";
        assert_eq!(creation_of(members, "_s"), Creation::Yes);
    }

    #[test]
    fn self_recursive_out_parameter_terminates() {
        let members = "Stream _s; bool b; C() { Open(out _s); }
            void Open(out Stream s) { if (b) { s = null; return; } Open(out s); }";
        assert_eq!(creation_of(members, "_s"), Creation::No);
    }

    #[test]
    fn constructor_helper_arguments_are_substituted() {
        let members = "Stream _s; C() { Init(new MemoryStream()); } private void Init(Stream s) { _s = s; }";
        assert_eq!(creation_of(members, "_s"), Creation::Yes);
    }

    #[test]
    fn shared_callees_are_classified_once() {
        let mut members = String::from("bool b; Stream _s; C() { _s = M0(); }");
        for i in 0..30 {
            members.push_str(&format!(" Stream M{}() => b ? M{}() : M{}();", i, i + 1, i + 1));
        }
        members.push_str(" Stream M30() => Stream.Null;");
        let model = compile(&members);
        let config = AnalysisConfig {
            max_depth: 200,
            ..AnalysisConfig::default()
        };
        let ctx = AnalysisContext::new(&model, &config);
        let mut classifier = CreationClassifier::new(&ctx);
        let creation = classifier.symbol(member(&model, "_s")).unwrap();
        assert_eq!(creation, Creation::No);
        // one entry per call site plus the field itself
        assert_eq!(classifier.classified, 2 * 30 + 2);
    }

    #[test]
    fn interface_calls_merge_implementations() {
        let source = "
            using System.IO;
            interface ISource { Stream Get(); }
            class Fresh : ISource { public Stream Get() => new MemoryStream(); }
            class User { ISource _source; Stream _s; void Init() { _s = _source.Get(); } }";
        let model = Compilation::from_sources(vec![("i.cs", source)]).unwrap();
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&model, &config);
        let user = model.find_type("User").unwrap();
        let field = model.members_named(user, "_s")[0];
        assert_eq!(classify_creation(&ctx, Target::Symbol(field)).unwrap(), Creation::Yes);
    }

    #[test]
    fn depth_limit_gives_unknown() {
        let model = compile("Stream _s; C() { _s = A(); } Stream A() => B(); Stream B() => new MemoryStream();");
        let config = AnalysisConfig {
            max_depth: 2,
            ..AnalysisConfig::default()
        };
        let ctx = AnalysisContext::new(&model, &config);
        let creation = classify_creation(&ctx, Target::Symbol(member(&model, "_s"))).unwrap();
        assert_eq!(creation, Creation::Unknown);
    }

    #[test]
    fn cancelled_query_unwinds() {
        let model = compile("Stream _s = new MemoryStream();");
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&model, &config);
        ctx.cancel.cancel();
        let err = classify_creation(&ctx, Target::Symbol(member(&model, "_s"))).unwrap_err();
        assert!(err.is_cancelled());
    }
}
