//! Assignment sites of a field, property, parameter or local.
//!
//! The walker visits a syntactic scope and records every construct that
//! writes the target: declarator and property initializers, `=`, compound
//! and `??=` assignments, `++`/`--`, `ref`/`out` arguments and pattern
//! designations. For members it also follows calls on `this` into helper
//! methods, setters of other properties and constructor chains, each at most
//! once per query, substituting call-site arguments for parameters. Private
//! helpers only ever called on `this` are walked from their call sites
//! instead of on their own.

use once_cell::sync::Lazy;
use serde::Serialize;

use super::invocations::{enclosing_call, is_call_on_this};
use super::member_path::{is_this_or_base, peel};
use super::{compatible_types, CallFrames, CallSite, Visited};
use crate::context::AnalysisContext;
use crate::errors::Result;
use crate::pool::{Pool, Poolable, Pooled};
use crate::semantic::{SemanticModel, SymbolId, SymbolKind};
use crate::syntax::{
    Accessibility, ArgumentModifier, AssignOp, ConstructorInitializerKind, InitializerKind, NodeId, NodeKind, Span,
    TypeKind, UnaryOp,
};

static WALKERS: Lazy<Pool<AssignmentWalker>> = Lazy::new(Pool::new);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentKind {
    /// Variable declarator, field or property initializer.
    Declaration,
    Assign,
    /// `??=`: keeps the old value when it is not null.
    Coalesce,
    /// `+=` and friends.
    Compound,
    Increment,
    Ref,
    Out,
    /// `x is T t`, `case T t:`.
    Pattern,
    ForEach,
}

/// One write of `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub target: SymbolId,
    /// The assignment, declarator, argument or designation node.
    pub site: NodeId,
    /// Expression whose value ends up in the target. For `ref`/`out`
    /// arguments this is the call, for `++` the operator node itself.
    pub value: NodeId,
    pub kind: AssignmentKind,
}

/// Region of code searched for assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Every declaration of the target's containing type.
    Type,
    /// A subtree such as a method or constructor declaration.
    Node(NodeId),
    /// Sites inside `scope` that end before `location` starts.
    Before { scope: NodeId, location: NodeId },
}

#[derive(Debug, Default)]
pub struct AssignmentWalker {
    assignments: Vec<Assignment>,
}

impl Poolable for AssignmentWalker {
    fn clear(&mut self) {
        self.assignments.clear();
    }
}

/// Target and search limits shared by one walk.
struct Query {
    target: SymbolId,
    is_member: bool,
    is_static: bool,
    target_type: Option<SymbolId>,
    /// Sites must end before this offset in this tree.
    before: Option<(u32, usize)>,
    /// Trees regions already covered by the scope itself.
    roots: Vec<(u32, Span)>,
    /// Helper declarations walked only from their call sites.
    inlined: Vec<NodeId>,
}

impl AssignmentWalker {
    pub fn borrow(
        ctx: &AnalysisContext<'_>,
        target: SymbolId,
        scope: Scope,
    ) -> Result<Pooled<'static, AssignmentWalker>> {
        let mut walker = WALKERS.borrow();
        walker.run(ctx, target, scope)?;
        Ok(walker)
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    fn run(&mut self, ctx: &AnalysisContext<'_>, target: SymbolId, scope: Scope) -> Result<()> {
        let model = ctx.model;
        let info = model.symbol_info(target);
        let target_type = model.containing_type(target);
        let (roots, before) = match scope {
            Scope::Type => {
                let roots = match target_type {
                    Some(ty) => model.symbol_info(ty).declarations.clone(),
                    None => info.declarations.clone(),
                };
                (roots, None)
            }
            Scope::Node(node) => (vec![node], None),
            Scope::Before { scope, location } => {
                let start = model.node(location).span.start;
                (vec![scope], Some((location.tree, start)))
            }
        };
        let inlined = match (scope, target_type) {
            (Scope::Type, Some(ty)) if info.is_member() => inlined_helpers(model, ty),
            _ => Vec::new(),
        };
        let query = Query {
            target,
            is_member: info.is_member(),
            is_static: info.is_static(),
            target_type,
            before,
            roots: roots.iter().map(|r| (r.tree, model.node(*r).span)).collect(),
            inlined,
        };
        log::trace!("collecting assignments of {} in {} roots", model.full_name(target), roots.len());

        let mut visited = Visited::new();
        let mut frames = CallFrames::new();
        for root in roots {
            visited.enter_node(root);
            self.walk(ctx, &query, root, &mut visited, &mut frames)?;
        }
        Ok(())
    }

    fn walk(
        &mut self,
        ctx: &AnalysisContext<'_>,
        query: &Query,
        root: NodeId,
        visited: &mut Visited,
        frames: &mut CallFrames,
    ) -> Result<()> {
        let model = ctx.model;
        let mut skipped: Option<Span> = None;
        for id in model.tree(root.tree).descendants(root) {
            ctx.check()?;
            let span = model.node(id).span;
            if let Some(helper) = skipped {
                if helper.contains(span) {
                    continue;
                }
                skipped = None;
            }
            if id != root && query.inlined.contains(&id) {
                skipped = Some(span);
                continue;
            }
            match model.kind(id) {
                NodeKind::VariableDeclarator {
                    initializer: Some(init),
                    ..
                }
                | NodeKind::Property {
                    initializer: Some(init),
                    ..
                } if model.declared_symbol(id) == Some(query.target) => {
                    self.record(ctx, query, frames, id, *init, AssignmentKind::Declaration);
                }
                NodeKind::Assignment { op, left, right } => {
                    if self.refers(model, query, *left) {
                        let (value, kind) = match op {
                            AssignOp::Assign => (*right, AssignmentKind::Assign),
                            AssignOp::Coalesce => (*right, AssignmentKind::Coalesce),
                            _ => (id, AssignmentKind::Compound),
                        };
                        self.record(ctx, query, frames, id, value, kind);
                    } else if query.is_member && *op == AssignOp::Assign {
                        self.enter_setter(ctx, query, *left, *right, visited, frames)?;
                    }
                }
                NodeKind::Prefix {
                    op: UnaryOp::Increment | UnaryOp::Decrement,
                    operand,
                }
                | NodeKind::Postfix {
                    op: UnaryOp::Increment | UnaryOp::Decrement,
                    operand,
                } if self.refers(model, query, *operand) => {
                    self.record(ctx, query, frames, id, id, AssignmentKind::Increment);
                }
                NodeKind::Argument {
                    modifier: modifier @ (ArgumentModifier::Ref | ArgumentModifier::Out),
                    expr,
                    ..
                } if self.refers(model, query, *expr) => {
                    let call = enclosing_call(model, id).unwrap_or(id);
                    let kind = if *modifier == ArgumentModifier::Ref {
                        AssignmentKind::Ref
                    } else {
                        AssignmentKind::Out
                    };
                    self.record(ctx, query, frames, id, call, kind);
                }
                NodeKind::DeclarationExpression { .. } if model.declared_symbol(id) == Some(query.target) => {
                    let argument = model.parent(id).unwrap_or(id);
                    let call = enclosing_call(model, argument).unwrap_or(id);
                    self.record(ctx, query, frames, argument, call, AssignmentKind::Out);
                }
                NodeKind::Is { expr, .. } if model.declared_symbol(id) == Some(query.target) => {
                    self.record(ctx, query, frames, id, *expr, AssignmentKind::Pattern);
                }
                NodeKind::CaseLabel { .. } if model.declared_symbol(id) == Some(query.target) => {
                    if let Some(switch) = switch_expression(model, id) {
                        self.record(ctx, query, frames, id, switch, AssignmentKind::Pattern);
                    }
                }
                NodeKind::ForEach { collection, .. } if model.declared_symbol(id) == Some(query.target) => {
                    self.record(ctx, query, frames, id, *collection, AssignmentKind::ForEach);
                }
                NodeKind::Constructor { initializer, .. } if query.is_member => {
                    self.member_initializers(ctx, query, id, frames);
                    if initializer.is_none() {
                        self.enter_implicit_base(ctx, query, id, visited, frames)?;
                    }
                }
                NodeKind::ConstructorInitializer { .. } if query.is_member => {
                    if let Some(ctor) = model.symbol(id) {
                        self.enter_callable(ctx, query, ctor, CallSite::Call(id), visited, frames)?;
                    }
                }
                NodeKind::Invocation { .. } if query.is_member && is_call_on_this(model, id) => {
                    if let Some(callee) = model.symbol(id) {
                        self.enter_callable(ctx, query, callee, CallSite::Call(id), visited, frames)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Whether `expr` writes the target. Instance members only count when
    /// written through `this`.
    fn refers(&self, model: &dyn SemanticModel, query: &Query, expr: NodeId) -> bool {
        let expr = peel(model, expr);
        if model.symbol(expr) != Some(query.target) {
            return false;
        }
        if !query.is_member || query.is_static {
            return true;
        }
        match model.kind(expr) {
            NodeKind::Identifier { .. } => !in_object_initializer(model, expr),
            NodeKind::MemberAccess { expr: receiver, .. } => is_this_or_base(model, *receiver),
            _ => false,
        }
    }

    fn record(
        &mut self,
        ctx: &AnalysisContext<'_>,
        query: &Query,
        frames: &CallFrames,
        site: NodeId,
        value: NodeId,
        kind: AssignmentKind,
    ) {
        let model = ctx.model;
        if let Some((tree, start)) = query.before {
            if site.tree != tree || model.node(site).span.end > start {
                return;
            }
        }
        let value = frames.substitute(model, value);
        if self.assignments.iter().any(|a| a.site == site && a.value == value) {
            return;
        }
        self.assignments.push(Assignment {
            target: query.target,
            site,
            value,
            kind,
        });
    }

    /// Field and property initializers run before a constructor body.
    fn member_initializers(&mut self, ctx: &AnalysisContext<'_>, query: &Query, ctor: NodeId, frames: &CallFrames) {
        let model = ctx.model;
        let Some(ctor_type) = model.declared_symbol(ctor).and_then(|c| model.containing_type(c)) else {
            return;
        };
        if query.target_type.map_or(true, |t| !model.is_subtype(ctor_type, t)) {
            return;
        }
        let declarations = model.symbol_info(query.target).declarations.clone();
        for decl in declarations {
            match model.kind(decl) {
                NodeKind::VariableDeclarator {
                    initializer: Some(init),
                    ..
                }
                | NodeKind::Property {
                    initializer: Some(init),
                    ..
                } => self.record(ctx, query, frames, decl, *init, AssignmentKind::Declaration),
                _ => {}
            }
        }
    }

    /// A constructor without `: this(...)`/`: base(...)` runs the base
    /// type's parameterless constructor.
    fn enter_implicit_base(
        &mut self,
        ctx: &AnalysisContext<'_>,
        query: &Query,
        ctor: NodeId,
        visited: &mut Visited,
        frames: &mut CallFrames,
    ) -> Result<()> {
        let model = ctx.model;
        let Some(ty) = model.declared_symbol(ctor).and_then(|c| model.containing_type(c)) else {
            return Ok(());
        };
        let base = model.symbol_info(ty).bases.iter().find_map(|b| {
            b.symbol()
                .filter(|s| model.symbol_info(*s).type_kind != Some(TypeKind::Interface))
        });
        let Some(base) = base else {
            return Ok(());
        };
        let implicit = model.symbol_info(base).members.iter().copied().find(|m| {
            let info = model.symbol_info(*m);
            info.kind == SymbolKind::Constructor && info.params.is_empty() && !info.is_static()
        });
        if let Some(base_ctor) = implicit {
            self.enter_callable(ctx, query, base_ctor, CallSite::Call(ctor), visited, frames)?;
        }
        Ok(())
    }

    fn enter_setter(
        &mut self,
        ctx: &AnalysisContext<'_>,
        query: &Query,
        left: NodeId,
        right: NodeId,
        visited: &mut Visited,
        frames: &mut CallFrames,
    ) -> Result<()> {
        let model = ctx.model;
        let left = peel(model, left);
        let through_this = match model.kind(left) {
            NodeKind::Identifier { .. } => !in_object_initializer(model, left),
            NodeKind::MemberAccess { expr, .. } => is_this_or_base(model, *expr),
            _ => false,
        };
        if !through_this {
            return Ok(());
        }
        let Some(property) = model.symbol(left) else {
            return Ok(());
        };
        let info = model.symbol_info(property);
        if info.kind != SymbolKind::Property || info.is_auto {
            return Ok(());
        }
        let (Some(setter), Some(value)) = (info.setter, info.value_param) else {
            return Ok(());
        };
        if !self.compatible(model, query, property) || !visited.enter_node(setter) {
            return Ok(());
        }
        log::trace!("following setter of {}", model.full_name(property));
        frames.push(property, CallSite::Setter { value, rhs: right });
        let result = self.walk(ctx, query, setter, visited, frames);
        frames.pop();
        result
    }

    fn enter_callable(
        &mut self,
        ctx: &AnalysisContext<'_>,
        query: &Query,
        callable: SymbolId,
        site: CallSite,
        visited: &mut Visited,
        frames: &mut CallFrames,
    ) -> Result<()> {
        let model = ctx.model;
        let info = model.symbol_info(callable);
        if !matches!(info.kind, SymbolKind::Method | SymbolKind::Constructor) {
            return Ok(());
        }
        if !self.compatible(model, query, callable) {
            return Ok(());
        }
        let declarations = info.declarations.clone();
        for decl in declarations {
            let enter = if query.inlined.contains(&decl) {
                let call = match site {
                    CallSite::Call(call) => Some(call),
                    CallSite::Setter { rhs, .. } => Some(rhs),
                };
                visited.enter(callable, call)
            } else {
                !self.covered(model, query, decl) && visited.enter_node(decl)
            };
            if !enter {
                continue;
            }
            log::trace!("following {} for assignments", model.full_name(callable));
            frames.push(callable, site);
            let result = self.walk(ctx, query, decl, visited, frames);
            frames.pop();
            result?;
        }
        Ok(())
    }

    fn compatible(&self, model: &dyn SemanticModel, query: &Query, member: SymbolId) -> bool {
        match (query.target_type, model.containing_type(member)) {
            (Some(target), Some(owner)) => compatible_types(model, target, owner),
            _ => false,
        }
    }

    /// Declarations inside the searched scope are walked anyway.
    fn covered(&self, model: &dyn SemanticModel, query: &Query, decl: NodeId) -> bool {
        let span = model.node(decl).span;
        query
            .roots
            .iter()
            .any(|(tree, root)| *tree == decl.tree && root.contains(span))
    }
}

/// Private methods of `ty` that are called, and only ever on `this`.
fn inlined_helpers(model: &dyn SemanticModel, ty: SymbolId) -> Vec<NodeId> {
    let helpers: Vec<SymbolId> = model
        .symbol_info(ty)
        .members
        .iter()
        .copied()
        .filter(|m| {
            let info = model.symbol_info(*m);
            info.kind == SymbolKind::Method && info.accessibility == Accessibility::Private && !info.is_external()
        })
        .collect();
    if helpers.is_empty() {
        return Vec::new();
    }
    let mut calls: Vec<(SymbolId, bool)> = Vec::new();
    for tree in model.trees() {
        for id in tree.node_ids() {
            if !matches!(tree.node(id).kind, NodeKind::Invocation { .. }) {
                continue;
            }
            if let Some(callee) = model.symbol(id).filter(|c| helpers.contains(c)) {
                calls.push((callee, is_call_on_this(model, id)));
            }
        }
    }
    helpers
        .into_iter()
        .filter(|h| {
            let mut own = calls.iter().filter(|(callee, _)| callee == h).peekable();
            own.peek().is_some() && own.all(|(_, on_this)| *on_this)
        })
        .flat_map(|h| model.symbol_info(h).declarations.clone())
        .collect()
}

/// Collect the assignment sites of `target` within `scope`.
pub fn collect_assignments(ctx: &AnalysisContext<'_>, target: SymbolId, scope: Scope) -> Result<Vec<Assignment>> {
    let walker = AssignmentWalker::borrow(ctx, target, scope)?;
    Ok(walker.assignments().to_vec())
}

/// `S = x` inside `new T { S = x }` writes the new object, not `this`.
fn in_object_initializer(model: &dyn SemanticModel, expr: NodeId) -> bool {
    let Some(assignment) = model.parent(expr) else {
        return false;
    };
    match model.kind(assignment) {
        NodeKind::Assignment { left, .. } if *left == expr => model.parent(assignment).is_some_and(|p| {
            matches!(
                model.kind(p),
                NodeKind::Initializer {
                    kind: InitializerKind::Object,
                    ..
                }
            )
        }),
        _ => false,
    }
}

/// Governing expression of the switch a case label belongs to.
fn switch_expression(model: &dyn SemanticModel, label: NodeId) -> Option<NodeId> {
    let section = model.parent(label)?;
    let switch = model.parent(section)?;
    match model.kind(switch) {
        NodeKind::Switch { expr, .. } => Some(*expr),
        _ => None,
    }
}

/// `: base(...)` initializer of a constructor, if any.
pub fn base_initializer(model: &dyn SemanticModel, ctor: NodeId) -> Option<NodeId> {
    match model.kind(ctor) {
        NodeKind::Constructor {
            initializer: Some(init),
            ..
        } => match model.kind(*init) {
            NodeKind::ConstructorInitializer {
                kind: ConstructorInitializerKind::Base,
                ..
            } => Some(*init),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::semantic::Compilation;
    use indoc::indoc;

    fn compile(source: &str) -> Compilation {
        Compilation::from_sources(vec![("a.cs", source)]).unwrap()
    }

    fn symbol_named(model: &Compilation, name: &str) -> SymbolId {
        model
            .table()
            .iter()
            .find(|s| s.name == name && !s.declarations.is_empty())
            .map(|s| s.id)
            .unwrap()
    }

    fn values(model: &Compilation, assignments: &[Assignment]) -> Vec<String> {
        assignments.iter().map(|a| model.text(a.value).to_string()).collect()
    }

    #[test]
    fn collects_field_sites_across_the_type() {
        let model = compile(indoc! {"
            using System.IO;
            class C {
                private Stream _s = Stream.Null;
                C() { _s = new MemoryStream(); }
                void Reset() { this._s = null; }
                void Other(C c) { c._s = null; }
            }
        "});
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&model, &config);
        let field = symbol_named(&model, "_s");
        let found = collect_assignments(&ctx, field, Scope::Type).unwrap();
        assert_eq!(values(&model, &found), vec!["Stream.Null", "new MemoryStream()", "null"]);
        assert_eq!(found[0].kind, AssignmentKind::Declaration);
    }

    #[test]
    fn locals_respect_textual_order() {
        let model = compile(indoc! {"
            class C {
                int M() => 1;
                int N() => 2;
                int Use() {
                    var x = M();
                    x = N();
                    return x;
                }
            }
        "});
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&model, &config);
        let local = symbol_named(&model, "x");
        let tree = &model.trees()[0];
        let method = tree
            .node_ids()
            .find(|id| matches!(&tree.node(*id).kind, NodeKind::Method { name, .. } if name == "Use"))
            .unwrap();
        let read = tree
            .node_ids()
            .find(|id| matches!(&tree.node(*id).kind, NodeKind::Return { .. }))
            .unwrap();
        let first = tree
            .node_ids()
            .find(|id| matches!(&tree.node(*id).kind, NodeKind::LocalDeclaration { .. }))
            .unwrap();

        let before_read = collect_assignments(&ctx, local, Scope::Before { scope: method, location: read }).unwrap();
        assert_eq!(values(&model, &before_read), vec!["M()", "N()"]);

        let before_first =
            collect_assignments(&ctx, local, Scope::Before { scope: method, location: first }).unwrap();
        assert!(before_first.is_empty());
    }

    #[test]
    fn follows_helpers_and_substitutes_arguments() {
        let model = compile(indoc! {"
            using System.IO;
            class C {
                private Stream _s;
                public C() { Init(new MemoryStream()); }
                private void Init(Stream s) { _s = s; }
            }
        "});
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&model, &config);
        let field = symbol_named(&model, "_s");
        let tree = &model.trees()[0];
        let ctor = tree
            .node_ids()
            .find(|id| matches!(tree.node(*id).kind, NodeKind::Constructor { .. }))
            .unwrap();
        let found = collect_assignments(&ctx, field, Scope::Node(ctor)).unwrap();
        assert_eq!(values(&model, &found), vec!["new MemoryStream()"]);
    }

    #[test]
    fn private_helpers_are_walked_from_their_call_sites() {
        let model = compile(indoc! {"
            using System.IO;
            class C {
                private Stream _s;
                public C() { Init(new MemoryStream()); }
                public C(int n) { Init(Stream.Null); }
                private void Init(Stream s) { _s = s; }
                public void Set(Stream t) { Assign(t); }
                public void Assign(Stream u) { _s = u; }
            }
        "});
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&model, &config);
        let field = symbol_named(&model, "_s");
        let found = collect_assignments(&ctx, field, Scope::Type).unwrap();
        // public methods may be called from outside, so `Assign` is walked on its own
        assert_eq!(values(&model, &found), vec!["new MemoryStream()", "Stream.Null", "u"]);
    }

    #[test]
    fn setter_value_is_replaced_by_assigned_expression() {
        let model = compile(indoc! {"
            using System.IO;
            class C {
                private Stream _s;
                public Stream S { get { return _s; } set { _s = value; } }
                public C() { S = new MemoryStream(); }
            }
        "});
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&model, &config);
        let field = symbol_named(&model, "_s");
        let tree = &model.trees()[0];
        let ctor = tree
            .node_ids()
            .find(|id| matches!(tree.node(*id).kind, NodeKind::Constructor { .. }))
            .unwrap();
        let found = collect_assignments(&ctx, field, Scope::Node(ctor)).unwrap();
        assert_eq!(values(&model, &found), vec!["new MemoryStream()"]);
    }

    #[test]
    fn constructor_chain_and_out_arguments() {
        let model = compile(indoc! {"
            using System.IO;
            using System.Collections.Generic;
            class C {
                private Stream _s;
                public C() : this(new MemoryStream()) { }
                public C(Stream s) { _s = s; }
                void Lookup(Dictionary<int, Stream> map) { map.TryGetValue(1, out _s); }
            }
        "});
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&model, &config);
        let field = symbol_named(&model, "_s");
        let tree = &model.trees()[0];
        let ctor = tree
            .node_ids()
            .find(|id| matches!(tree.node(*id).kind, NodeKind::Constructor { initializer: Some(_), .. }))
            .unwrap();
        let chained = collect_assignments(&ctx, field, Scope::Node(ctor)).unwrap();
        assert_eq!(values(&model, &chained), vec!["new MemoryStream()"]);

        let all = collect_assignments(&ctx, field, Scope::Type).unwrap();
        let out = all.iter().find(|a| a.kind == AssignmentKind::Out).unwrap();
        assert!(model.text(out.value).starts_with("map.TryGetValue"));
    }

    #[test]
    fn object_initializer_writes_another_instance() {
        let model = compile(indoc! {"
            using System.IO;
            class Holder {
                public Stream S { get; set; }
                public static Holder Make(Stream s) => new Holder { S = s };
            }
        "});
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&model, &config);
        let property = symbol_named(&model, "S");
        let found = collect_assignments(&ctx, property, Scope::Type).unwrap();
        assert!(found.is_empty());
    }
}
