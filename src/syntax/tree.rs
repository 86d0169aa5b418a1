//! Arena-backed syntax trees.
//!
//! Every node of a file lives in one `Vec<Node>` owned by its
//! [`SyntaxTree`]; nodes refer to each other through the `Copy` handle
//! [`NodeId`], which is also the node's identity for visited-set checks.
//! Children are stored inside the closed [`NodeKind`] enum and every node
//! records its parent, so walks in both directions are plain index lookups.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId {
    pub tree: u32,
    pub index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// True when this span ends before `other` starts.
    pub fn precedes(&self, other: Span) -> bool {
        self.end <= other.start
    }
}

/// A type as written in source: `Dictionary<string, Stream>[]?`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TypeSyntax {
    pub name: String,
    pub args: Vec<TypeSyntax>,
    pub rank: usize,
    pub nullable: bool,
}

impl TypeSyntax {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Last segment of a qualified name, without any `global::` prefix.
    pub fn simple_name(&self) -> &str {
        let name = self.name.rsplit("::").next().unwrap_or(&self.name);
        name.rsplit('.').next().unwrap_or(name)
    }

    pub fn is_var(&self) -> bool {
        self.name == "var" && self.args.is_empty() && self.rank == 0
    }
}

impl fmt::Display for TypeSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.args.is_empty() {
            write!(f, "<")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", arg)?;
            }
            write!(f, ">")?;
        }
        for _ in 0..self.rank {
            write!(f, "[]")?;
        }
        if self.nullable {
            write!(f, "?")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Accessibility {
    Private,
    PrivateProtected,
    Protected,
    Internal,
    ProtectedInternal,
    Public,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub public: bool,
    pub private: bool,
    pub protected: bool,
    pub internal: bool,
    pub is_static: bool,
    pub readonly: bool,
    pub is_const: bool,
    pub is_virtual: bool,
    pub is_override: bool,
    pub is_abstract: bool,
    pub sealed: bool,
    pub is_async: bool,
    pub partial: bool,
    pub is_event: bool,
}

impl Modifiers {
    /// Declared accessibility, or `default` when no access modifier is written.
    pub fn accessibility(&self, default: Accessibility) -> Accessibility {
        match (self.public, self.private, self.protected, self.internal) {
            (true, _, _, _) => Accessibility::Public,
            (_, true, true, _) => Accessibility::PrivateProtected,
            (_, true, _, _) => Accessibility::Private,
            (_, _, true, true) => Accessibility::ProtectedInternal,
            (_, _, true, _) => Accessibility::Protected,
            (_, _, _, true) => Accessibility::Internal,
            _ => default,
        }
    }

    pub fn has_accessibility(&self) -> bool {
        self.public || self.private || self.protected || self.internal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Struct,
    Interface,
    Record,
    Enum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessorKind {
    Get,
    Set,
    Init,
    Add,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterModifier {
    #[default]
    None,
    Ref,
    Out,
    In,
    Params,
    This,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArgumentModifier {
    #[default]
    None,
    Ref,
    Out,
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructorInitializerKind {
    This,
    Base,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitializerKind {
    Object,
    Collection,
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Null,
    Bool,
    Number,
    String,
    Char,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpKind {
    Break,
    Continue,
    YieldBreak,
    Goto,
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Coalesce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Coalesce,
    LogicalOr,
    LogicalAnd,
    BitOr,
    BitXor,
    BitAnd,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Shl,
    Shr,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
    BitNot,
    Increment,
    Decrement,
    Index,
    AddressOf,
    Deref,
}

/// Closed set of syntax shapes the frontend produces.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    CompilationUnit {
        members: Vec<NodeId>,
    },
    Namespace {
        name: String,
        members: Vec<NodeId>,
    },
    TypeDecl {
        kind: TypeKind,
        modifiers: Modifiers,
        name: String,
        type_params: Vec<String>,
        bases: Vec<TypeSyntax>,
        members: Vec<NodeId>,
    },
    Field {
        modifiers: Modifiers,
        ty: TypeSyntax,
        declarators: Vec<NodeId>,
    },
    VariableDeclarator {
        name: String,
        initializer: Option<NodeId>,
    },
    Property {
        modifiers: Modifiers,
        ty: TypeSyntax,
        name: String,
        params: Vec<NodeId>,
        accessors: Vec<NodeId>,
        expression_body: Option<NodeId>,
        initializer: Option<NodeId>,
    },
    Accessor {
        kind: AccessorKind,
        modifiers: Modifiers,
        body: Option<NodeId>,
        expression_body: Option<NodeId>,
    },
    Method {
        modifiers: Modifiers,
        return_type: TypeSyntax,
        name: String,
        type_params: Vec<String>,
        params: Vec<NodeId>,
        body: Option<NodeId>,
        expression_body: Option<NodeId>,
    },
    Constructor {
        modifiers: Modifiers,
        name: String,
        params: Vec<NodeId>,
        initializer: Option<NodeId>,
        body: Option<NodeId>,
        expression_body: Option<NodeId>,
    },
    ConstructorInitializer {
        kind: ConstructorInitializerKind,
        args: Vec<NodeId>,
    },
    Parameter {
        modifier: ParameterModifier,
        ty: Option<TypeSyntax>,
        name: String,
        default: Option<NodeId>,
    },
    LocalFunction {
        modifiers: Modifiers,
        return_type: TypeSyntax,
        name: String,
        type_params: Vec<String>,
        params: Vec<NodeId>,
        body: Option<NodeId>,
        expression_body: Option<NodeId>,
    },

    // statements
    Block {
        statements: Vec<NodeId>,
    },
    LocalDeclaration {
        is_using: bool,
        is_const: bool,
        ty: Option<TypeSyntax>,
        declarators: Vec<NodeId>,
    },
    ExpressionStatement {
        expr: NodeId,
    },
    Return {
        expr: Option<NodeId>,
    },
    YieldReturn {
        expr: NodeId,
    },
    If {
        condition: NodeId,
        then_branch: NodeId,
        else_branch: Option<NodeId>,
    },
    While {
        condition: NodeId,
        body: NodeId,
        is_do: bool,
    },
    For {
        initializers: Vec<NodeId>,
        condition: Option<NodeId>,
        incrementors: Vec<NodeId>,
        body: NodeId,
    },
    ForEach {
        ty: Option<TypeSyntax>,
        name: String,
        collection: NodeId,
        body: NodeId,
    },
    Using {
        declaration: Option<NodeId>,
        expr: Option<NodeId>,
        body: NodeId,
    },
    Try {
        block: NodeId,
        catches: Vec<NodeId>,
        finally: Option<NodeId>,
    },
    Catch {
        ty: Option<TypeSyntax>,
        name: Option<String>,
        filter: Option<NodeId>,
        body: NodeId,
    },
    Throw {
        expr: Option<NodeId>,
    },
    Lock {
        expr: NodeId,
        body: NodeId,
    },
    Switch {
        expr: NodeId,
        sections: Vec<NodeId>,
    },
    SwitchSection {
        labels: Vec<NodeId>,
        statements: Vec<NodeId>,
    },
    CaseLabel {
        value: Option<NodeId>,
        ty: Option<TypeSyntax>,
        designation: Option<String>,
    },
    Jump {
        kind: JumpKind,
    },

    // expressions
    Literal {
        kind: LiteralKind,
        text: String,
    },
    Identifier {
        name: String,
        type_args: Vec<TypeSyntax>,
    },
    This,
    Base,
    PredefinedType {
        ty: TypeSyntax,
    },
    MemberAccess {
        expr: NodeId,
        name: String,
        type_args: Vec<TypeSyntax>,
    },
    /// `expr?.when_not_null`; the binding chain starts with a
    /// `MemberBinding` or `ElementBinding` node.
    ConditionalAccess {
        expr: NodeId,
        when_not_null: NodeId,
    },
    MemberBinding {
        name: String,
        type_args: Vec<TypeSyntax>,
    },
    ElementBinding {
        args: Vec<NodeId>,
    },
    Invocation {
        expr: NodeId,
        args: Vec<NodeId>,
    },
    Argument {
        name: Option<String>,
        modifier: ArgumentModifier,
        expr: NodeId,
    },
    ElementAccess {
        expr: NodeId,
        args: Vec<NodeId>,
    },
    /// `ty` is `None` for target-typed `new()` and anonymous objects.
    ObjectCreation {
        ty: Option<TypeSyntax>,
        args: Vec<NodeId>,
        initializer: Option<NodeId>,
    },
    ArrayCreation {
        ty: Option<TypeSyntax>,
        sizes: Vec<NodeId>,
        initializer: Option<NodeId>,
    },
    Initializer {
        kind: InitializerKind,
        exprs: Vec<NodeId>,
    },
    Assignment {
        op: AssignOp,
        left: NodeId,
        right: NodeId,
    },
    Binary {
        op: BinaryOp,
        left: NodeId,
        right: NodeId,
    },
    Conditional {
        condition: NodeId,
        when_true: NodeId,
        when_false: NodeId,
    },
    SwitchExpression {
        governing: NodeId,
        arms: Vec<NodeId>,
    },
    Prefix {
        op: UnaryOp,
        operand: NodeId,
    },
    Postfix {
        op: UnaryOp,
        operand: NodeId,
    },
    Cast {
        ty: TypeSyntax,
        expr: NodeId,
    },
    As {
        expr: NodeId,
        ty: TypeSyntax,
    },
    Is {
        expr: NodeId,
        negated: bool,
        ty: Option<TypeSyntax>,
        designation: Option<String>,
        value: Option<NodeId>,
    },
    Parenthesized {
        expr: NodeId,
    },
    Tuple {
        elements: Vec<NodeId>,
    },
    Await {
        expr: NodeId,
    },
    Lambda {
        is_async: bool,
        params: Vec<NodeId>,
        body: NodeId,
    },
    TypeOf {
        ty: TypeSyntax,
    },
    Default {
        ty: Option<TypeSyntax>,
    },
    NameOf {
        expr: NodeId,
    },
    /// `out var x` / `out Stream x`; `ty` is `None` for `var`.
    DeclarationExpression {
        ty: Option<TypeSyntax>,
        name: String,
    },
    ThrowExpression {
        expr: NodeId,
    },
    /// Expression the analysis does not model: queries, `with`, partial
    /// ranges, pointer syntax.
    Opaque,
}

fn push_opt(out: &mut Vec<NodeId>, id: &Option<NodeId>) {
    if let Some(id) = id {
        out.push(*id);
    }
}

impl NodeKind {
    /// Direct children in source order.
    pub fn children(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        match self {
            NodeKind::CompilationUnit { members }
            | NodeKind::Namespace { members, .. }
            | NodeKind::TypeDecl { members, .. } => out.extend(members),
            NodeKind::Field { declarators, .. }
            | NodeKind::LocalDeclaration { declarators, .. } => out.extend(declarators),
            NodeKind::VariableDeclarator { initializer, .. } => push_opt(&mut out, initializer),
            NodeKind::Property {
                params,
                accessors,
                expression_body,
                initializer,
                ..
            } => {
                out.extend(params);
                out.extend(accessors);
                push_opt(&mut out, expression_body);
                push_opt(&mut out, initializer);
            }
            NodeKind::Accessor {
                body,
                expression_body,
                ..
            } => {
                push_opt(&mut out, body);
                push_opt(&mut out, expression_body);
            }
            NodeKind::Method {
                params,
                body,
                expression_body,
                ..
            }
            | NodeKind::LocalFunction {
                params,
                body,
                expression_body,
                ..
            } => {
                out.extend(params);
                push_opt(&mut out, body);
                push_opt(&mut out, expression_body);
            }
            NodeKind::Constructor {
                params,
                initializer,
                body,
                expression_body,
                ..
            } => {
                out.extend(params);
                push_opt(&mut out, initializer);
                push_opt(&mut out, body);
                push_opt(&mut out, expression_body);
            }
            NodeKind::ConstructorInitializer { args, .. } => out.extend(args),
            NodeKind::Parameter { default, .. } => push_opt(&mut out, default),
            NodeKind::Block { statements } => out.extend(statements),
            NodeKind::ExpressionStatement { expr }
            | NodeKind::YieldReturn { expr }
            | NodeKind::Argument { expr, .. }
            | NodeKind::Parenthesized { expr }
            | NodeKind::Await { expr }
            | NodeKind::NameOf { expr }
            | NodeKind::ThrowExpression { expr }
            | NodeKind::Cast { expr, .. }
            | NodeKind::As { expr, .. } => out.push(*expr),
            NodeKind::Return { expr } | NodeKind::Throw { expr } => push_opt(&mut out, expr),
            NodeKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                out.push(*condition);
                out.push(*then_branch);
                push_opt(&mut out, else_branch);
            }
            NodeKind::While {
                condition,
                body,
                is_do,
            } => {
                if *is_do {
                    out.extend([*body, *condition]);
                } else {
                    out.extend([*condition, *body]);
                }
            }
            NodeKind::For {
                initializers,
                condition,
                incrementors,
                body,
            } => {
                out.extend(initializers);
                push_opt(&mut out, condition);
                out.extend(incrementors);
                out.push(*body);
            }
            NodeKind::ForEach {
                collection, body, ..
            } => out.extend([*collection, *body]),
            NodeKind::Using {
                declaration,
                expr,
                body,
            } => {
                push_opt(&mut out, declaration);
                push_opt(&mut out, expr);
                out.push(*body);
            }
            NodeKind::Try {
                block,
                catches,
                finally,
            } => {
                out.push(*block);
                out.extend(catches);
                push_opt(&mut out, finally);
            }
            NodeKind::Catch { filter, body, .. } => {
                push_opt(&mut out, filter);
                out.push(*body);
            }
            NodeKind::Lock { expr, body } => out.extend([*expr, *body]),
            NodeKind::Switch { expr, sections } => {
                out.push(*expr);
                out.extend(sections);
            }
            NodeKind::SwitchSection { labels, statements } => {
                out.extend(labels);
                out.extend(statements);
            }
            NodeKind::CaseLabel { value, .. } => push_opt(&mut out, value),
            NodeKind::MemberAccess { expr, .. } => out.push(*expr),
            NodeKind::ConditionalAccess {
                expr,
                when_not_null,
            } => out.extend([*expr, *when_not_null]),
            NodeKind::ElementBinding { args } => out.extend(args),
            NodeKind::Invocation { expr, args } | NodeKind::ElementAccess { expr, args } => {
                out.push(*expr);
                out.extend(args);
            }
            NodeKind::ObjectCreation {
                args, initializer, ..
            } => {
                out.extend(args);
                push_opt(&mut out, initializer);
            }
            NodeKind::ArrayCreation {
                sizes, initializer, ..
            } => {
                out.extend(sizes);
                push_opt(&mut out, initializer);
            }
            NodeKind::Initializer { exprs, .. } => out.extend(exprs),
            NodeKind::Assignment { left, right, .. } | NodeKind::Binary { left, right, .. } => {
                out.extend([*left, *right])
            }
            NodeKind::Conditional {
                condition,
                when_true,
                when_false,
            } => out.extend([*condition, *when_true, *when_false]),
            NodeKind::SwitchExpression { governing, arms } => {
                out.push(*governing);
                out.extend(arms);
            }
            NodeKind::Prefix { operand, .. } | NodeKind::Postfix { operand, .. } => {
                out.push(*operand)
            }
            NodeKind::Is { expr, value, .. } => {
                out.push(*expr);
                push_opt(&mut out, value);
            }
            NodeKind::Tuple { elements } => out.extend(elements),
            NodeKind::Lambda { params, body, .. } => {
                out.extend(params);
                out.push(*body);
            }
            NodeKind::Jump { .. }
            | NodeKind::Literal { .. }
            | NodeKind::Identifier { .. }
            | NodeKind::This
            | NodeKind::Base
            | NodeKind::PredefinedType { .. }
            | NodeKind::MemberBinding { .. }
            | NodeKind::TypeOf { .. }
            | NodeKind::Default { .. }
            | NodeKind::DeclarationExpression { .. }
            | NodeKind::Opaque => {}
        }
        out
    }

    /// Members, accessors, local functions and lambdas own their own
    /// return flow.
    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            NodeKind::Method { .. }
                | NodeKind::Constructor { .. }
                | NodeKind::Accessor { .. }
                | NodeKind::LocalFunction { .. }
                | NodeKind::Lambda { .. }
        )
    }

    /// Name introduced by a declaration node.
    pub fn declared_name(&self) -> Option<&str> {
        match self {
            NodeKind::TypeDecl { name, .. }
            | NodeKind::VariableDeclarator { name, .. }
            | NodeKind::Property { name, .. }
            | NodeKind::Method { name, .. }
            | NodeKind::Constructor { name, .. }
            | NodeKind::Parameter { name, .. }
            | NodeKind::LocalFunction { name, .. }
            | NodeKind::ForEach { name, .. }
            | NodeKind::DeclarationExpression { name, .. } => Some(name),
            NodeKind::Catch { name, .. } => name.as_deref(),
            NodeKind::Is { designation, .. } | NodeKind::CaseLabel { designation, .. } => {
                designation.as_deref()
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    pub parent: Option<NodeId>,
}

/// One parsed file.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    id: u32,
    path: PathBuf,
    source: String,
    nodes: Vec<Node>,
    root: NodeId,
    line_starts: Vec<usize>,
}

impl SyntaxTree {
    pub(crate) fn new(id: u32, path: PathBuf, source: String, nodes: Vec<Node>, root: NodeId) -> Self {
        let line_starts = line_starts(&source);
        Self {
            id,
            path,
            source,
            nodes,
            root,
            line_starts,
        }
    }

    /// Placeholder for a file that could not be read or parsed.
    pub fn empty(id: u32, path: PathBuf) -> Self {
        let root = Node {
            kind: NodeKind::CompilationUnit {
                members: Vec::new(),
            },
            span: Span::new(0, 0),
            parent: None,
        };
        Self::new(id, path, String::new(), vec![root], NodeId { tree: id, index: 0 })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        debug_assert_eq!(id.tree, self.id);
        &self.nodes[id.index as usize]
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len() as u32).map(move |index| NodeId {
            tree: self.id,
            index,
        })
    }

    pub fn text(&self, id: NodeId) -> &str {
        let span = self.node(id).span;
        &self.source[span.start..span.end]
    }

    /// 1-based line and column of a byte offset.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        (line + 1, offset - self.line_starts[line] + 1)
    }

    /// Pre-order walk of `id` and everything below it.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            let children = self.node(next).kind.children();
            stack.extend(children.into_iter().rev());
        }
        out
    }

    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.node(id).parent, move |p| self.node(*p).parent)
    }
}

fn line_starts(source: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(source.match_indices('\n').map(|(i, _)| i + 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_name_strips_qualifiers() {
        assert_eq!(TypeSyntax::named("System.IO.Stream").simple_name(), "Stream");
        assert_eq!(TypeSyntax::named("global::System.IO.Stream").simple_name(), "Stream");
        assert_eq!(TypeSyntax::named("Stream").simple_name(), "Stream");
    }

    #[test]
    fn type_syntax_display_round_trips_shape() {
        let ty = TypeSyntax {
            name: "Dictionary".into(),
            args: vec![TypeSyntax::named("string"), TypeSyntax::named("Stream")],
            rank: 1,
            nullable: true,
        };
        assert_eq!(ty.to_string(), "Dictionary<string, Stream>[]?");
    }

    #[test]
    fn accessibility_defaults_when_unspecified() {
        let mods = Modifiers::default();
        assert_eq!(mods.accessibility(Accessibility::Private), Accessibility::Private);
        let mods = Modifiers {
            protected: true,
            internal: true,
            ..Modifiers::default()
        };
        assert_eq!(
            mods.accessibility(Accessibility::Private),
            Accessibility::ProtectedInternal
        );
    }

    #[test]
    fn line_col_is_one_based() {
        let tree = SyntaxTree::new(
            0,
            PathBuf::from("a.cs"),
            "ab\ncd".into(),
            Vec::new(),
            NodeId { tree: 0, index: 0 },
        );
        assert_eq!(tree.line_col(0), (1, 1));
        assert_eq!(tree.line_col(4), (2, 2));
    }
}
