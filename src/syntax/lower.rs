//! Lowering of the tree-sitter C# concrete syntax tree into the arena.
//!
//! Grammar node kinds are mapped onto the closed [`NodeKind`] set. Trivia
//! (comments, preprocessor lines, attributes) is dropped and expressions the
//! analysis does not model become [`NodeKind::Opaque`]. The grammar nests
//! `a?.b.c()` as `((a?.b).c)()`; chains are re-associated so everything
//! after `?.` hangs below one [`NodeKind::ConditionalAccess`].
//!
//! Nodes are allocated bottom-up, so a parent is always pushed after its
//! children and patches their `parent` links as it is allocated.

use tree_sitter::Node as Cst;

use super::tree::*;

pub(super) fn lower(tree: u32, source: &str, root: Cst<'_>) -> (Vec<Node>, NodeId) {
    let mut lowering = Lowering {
        tree,
        source,
        nodes: Vec::new(),
    };
    let root = lowering.compilation_unit(root);
    (lowering.nodes, root)
}

struct Lowering<'s> {
    tree: u32,
    source: &'s str,
    nodes: Vec<Node>,
}

/// A receiver chain under construction: receivers guarded by `?.`,
/// outermost first, and the value built on the innermost binding.
struct Chain {
    guards: Vec<NodeId>,
    value: NodeId,
}

impl Chain {
    fn plain(value: NodeId) -> Self {
        Self {
            guards: Vec::new(),
            value,
        }
    }
}

/// What a pattern tests and binds.
#[derive(Default)]
struct Pattern {
    negated: bool,
    ty: Option<TypeSyntax>,
    designation: Option<String>,
    value: Option<NodeId>,
}

fn is_trivia(node: &Cst<'_>) -> bool {
    let kind = node.kind();
    kind == "comment" || kind == "attribute_list" || kind.starts_with("preproc")
}

fn span(node: Cst<'_>) -> Span {
    Span::new(node.start_byte(), node.end_byte())
}

fn named(node: Cst<'_>) -> Vec<Cst<'_>> {
    let mut cursor = node.walk();
    let children = node
        .named_children(&mut cursor)
        .filter(|c| !is_trivia(c))
        .collect();
    children
}

fn tokens(node: Cst<'_>) -> Vec<Cst<'_>> {
    let mut cursor = node.walk();
    let children = node.children(&mut cursor).filter(|c| !is_trivia(c)).collect();
    children
}

fn field<'t>(node: Cst<'t>, name: &str) -> Option<Cst<'t>> {
    node.child_by_field_name(name)
}

fn fields<'t>(node: Cst<'t>, name: &str) -> Vec<Cst<'t>> {
    let mut cursor = node.walk();
    let children = node
        .children_by_field_name(name, &mut cursor)
        .filter(|c| c.is_named() && !is_trivia(c))
        .collect();
    children
}

fn child_of_kind<'t>(node: Cst<'t>, kinds: &[&str]) -> Option<Cst<'t>> {
    named(node).into_iter().find(|c| kinds.contains(&c.kind()))
}

fn has_token(node: Cst<'_>, token: &str) -> bool {
    tokens(node).iter().any(|c| !c.is_named() && c.kind() == token)
}

/// Named child following the first `=` token.
fn after_equals(node: Cst<'_>) -> Option<Cst<'_>> {
    let children = tokens(node);
    let equals = children.iter().position(|c| !c.is_named() && c.kind() == "=")?;
    children[equals + 1..].iter().copied().find(|c| c.is_named())
}

/// Return type of a method, operator or local function.
fn return_type(node: Cst<'_>) -> Option<Cst<'_>> {
    field(node, "returns").or_else(|| field(node, "type"))
}

fn is_type_like(kind: &str) -> bool {
    matches!(
        kind,
        "identifier"
            | "generic_name"
            | "qualified_name"
            | "alias_qualified_name"
            | "predefined_type"
            | "member_access_expression"
            | "nullable_type"
            | "array_type"
    )
}

fn binary_op(op: &str) -> Option<BinaryOp> {
    let op = match op {
        "??" => BinaryOp::Coalesce,
        "||" => BinaryOp::LogicalOr,
        "&&" => BinaryOp::LogicalAnd,
        "|" => BinaryOp::BitOr,
        "^" => BinaryOp::BitXor,
        "&" => BinaryOp::BitAnd,
        "==" => BinaryOp::Eq,
        "!=" => BinaryOp::Ne,
        "<" => BinaryOp::Lt,
        ">" => BinaryOp::Gt,
        "<=" => BinaryOp::Le,
        ">=" => BinaryOp::Ge,
        "<<" => BinaryOp::Shl,
        ">>" | ">>>" => BinaryOp::Shr,
        "+" => BinaryOp::Add,
        "-" => BinaryOp::Sub,
        "*" => BinaryOp::Mul,
        "/" => BinaryOp::Div,
        "%" => BinaryOp::Rem,
        _ => return None,
    };
    Some(op)
}

fn assign_op(op: &str) -> AssignOp {
    match op {
        "+=" => AssignOp::Add,
        "-=" => AssignOp::Sub,
        "*=" => AssignOp::Mul,
        "/=" => AssignOp::Div,
        "%=" => AssignOp::Rem,
        "&=" => AssignOp::And,
        "|=" => AssignOp::Or,
        "^=" => AssignOp::Xor,
        "<<=" => AssignOp::Shl,
        ">>=" | ">>>=" => AssignOp::Shr,
        "??=" => AssignOp::Coalesce,
        _ => AssignOp::Assign,
    }
}

fn unary_op(op: &str) -> Option<UnaryOp> {
    let op = match op {
        "+" => UnaryOp::Plus,
        "-" => UnaryOp::Minus,
        "!" => UnaryOp::Not,
        "~" => UnaryOp::BitNot,
        "++" => UnaryOp::Increment,
        "--" => UnaryOp::Decrement,
        "^" => UnaryOp::Index,
        "&" => UnaryOp::AddressOf,
        "*" => UnaryOp::Deref,
        _ => return None,
    };
    Some(op)
}

impl<'s> Lowering<'s> {
    fn text(&self, node: Cst<'_>) -> &'s str {
        self.slice(node.start_byte(), node.end_byte())
    }

    fn slice(&self, start: usize, end: usize) -> &'s str {
        self.source.get(start..end).unwrap_or("")
    }

    /// Identifier text without the verbatim `@`.
    fn ident(&self, node: Cst<'_>) -> String {
        self.text(node).trim_start_matches('@').to_string()
    }

    /// Operator text between two operands.
    fn between(&self, left: Cst<'_>, right: Cst<'_>) -> &'s str {
        self.slice(left.end_byte(), right.start_byte()).trim()
    }

    fn alloc(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let id = NodeId {
            tree: self.tree,
            index: self.nodes.len() as u32,
        };
        for child in kind.children() {
            self.nodes[child.index as usize].parent = Some(id);
        }
        self.nodes.push(Node {
            kind,
            span,
            parent: None,
        });
        id
    }

    fn opaque(&mut self, node: Cst<'_>) -> NodeId {
        self.alloc(NodeKind::Opaque, span(node))
    }

    fn span_of(&self, id: NodeId) -> Span {
        self.nodes[id.index as usize].span
    }

    fn modifiers(&self, node: Cst<'_>) -> Modifiers {
        let mut m = Modifiers::default();
        for child in tokens(node) {
            if child.kind() != "modifier" {
                continue;
            }
            match self.text(child) {
                "public" => m.public = true,
                "private" => m.private = true,
                "protected" => m.protected = true,
                "internal" => m.internal = true,
                "static" => m.is_static = true,
                "readonly" => m.readonly = true,
                "const" => m.is_const = true,
                "virtual" => m.is_virtual = true,
                "override" => m.is_override = true,
                "abstract" => m.is_abstract = true,
                "sealed" => m.sealed = true,
                "async" => m.is_async = true,
                "partial" => m.partial = true,
                _ => {}
            }
        }
        m
    }

    // ---- types ----

    fn ty(&self, node: Cst<'_>) -> TypeSyntax {
        match node.kind() {
            "identifier" | "predefined_type" | "implicit_type" => TypeSyntax::named(self.ident(node)),
            "generic_name" => {
                let (name, args) = self.simple_name(node);
                TypeSyntax {
                    name,
                    args,
                    ..TypeSyntax::default()
                }
            }
            "qualified_name" | "member_access_expression" => {
                let children = named(node);
                let left = field(node, "qualifier")
                    .or_else(|| field(node, "expression"))
                    .or_else(|| children.first().copied());
                let right = field(node, "name").or_else(|| children.last().copied());
                let (Some(left), Some(right)) = (left, right) else {
                    return TypeSyntax::named(self.text(node));
                };
                let left = self.ty(left);
                let mut ty = self.ty(right);
                if ty.args.is_empty() {
                    ty.args = left.args;
                }
                ty.name = format!("{}.{}", left.name, ty.name);
                ty
            }
            "alias_qualified_name" => {
                let alias = field(node, "alias").map(|a| self.text(a));
                match field(node, "name") {
                    Some(name) if alias == Some("global") => self.ty(name),
                    Some(name) => {
                        let mut ty = self.ty(name);
                        ty.name = format!("{}.{}", alias.unwrap_or_default(), ty.name);
                        ty
                    }
                    None => TypeSyntax::named(self.text(node)),
                }
            }
            "nullable_type" => {
                let mut ty = self.inner_type(node);
                ty.nullable = true;
                ty
            }
            "array_type" => {
                let mut ty = self.inner_type(node);
                let ranks = named(node)
                    .iter()
                    .filter(|c| c.kind() == "array_rank_specifier")
                    .count();
                ty.rank += ranks.max(1);
                ty
            }
            "pointer_type" | "ref_type" | "scoped_type" => self.inner_type(node),
            "tuple_type" => TypeSyntax {
                name: "ValueTuple".into(),
                args: named(node)
                    .into_iter()
                    .map(|element| match field(element, "type") {
                        Some(ty) => self.ty(ty),
                        None => self.ty(element),
                    })
                    .collect(),
                ..TypeSyntax::default()
            },
            _ => TypeSyntax::named(self.text(node).split_whitespace().collect::<String>()),
        }
    }

    /// Element type of an array, nullable or pointer type.
    fn inner_type(&self, node: Cst<'_>) -> TypeSyntax {
        let inner = field(node, "type").or_else(|| {
            named(node)
                .into_iter()
                .find(|c| c.kind() != "array_rank_specifier")
        });
        match inner {
            Some(inner) => self.ty(inner),
            None => TypeSyntax::named(self.text(node)),
        }
    }

    fn type_args(&self, list: Cst<'_>) -> Vec<TypeSyntax> {
        let args: Vec<TypeSyntax> = named(list).into_iter().map(|arg| self.ty(arg)).collect();
        if args.is_empty() {
            // unbound generic such as `typeof(Dictionary<,>)`
            let commas = tokens(list).iter().filter(|c| c.kind() == ",").count();
            return vec![TypeSyntax::default(); commas + 1];
        }
        args
    }

    /// Name and type arguments of an identifier or generic name.
    fn simple_name(&self, node: Cst<'_>) -> (String, Vec<TypeSyntax>) {
        if node.kind() != "generic_name" {
            return (self.ident(node), Vec::new());
        }
        let name = field(node, "name")
            .or_else(|| child_of_kind(node, &["identifier"]))
            .map(|n| self.ident(n))
            .unwrap_or_default();
        let args = child_of_kind(node, &["type_argument_list"])
            .map(|list| self.type_args(list))
            .unwrap_or_default();
        (name, args)
    }

    fn type_params(&self, node: Cst<'_>) -> Vec<String> {
        let Some(list) = field(node, "type_parameters").or_else(|| child_of_kind(node, &["type_parameter_list"]))
        else {
            return Vec::new();
        };
        named(list)
            .into_iter()
            .map(|param| {
                let name = field(param, "name").or_else(|| child_of_kind(param, &["identifier"]));
                self.ident(name.unwrap_or(param))
            })
            .collect()
    }

    // ---- declarations ----

    fn compilation_unit(&mut self, root: Cst<'_>) -> NodeId {
        let members = self.namespace_members(named(root));
        self.alloc(
            NodeKind::CompilationUnit { members },
            Span::new(0, self.source.len()),
        )
    }

    fn namespace_members(&mut self, children: Vec<Cst<'_>>) -> Vec<NodeId> {
        let mut members = Vec::new();
        let mut rest = children.into_iter();
        while let Some(child) = rest.next() {
            match child.kind() {
                "namespace_declaration" => {
                    let name = self.namespace_name(child);
                    let inner = field(child, "body")
                        .or_else(|| child_of_kind(child, &["declaration_list"]))
                        .map(named)
                        .unwrap_or_default();
                    let inner = self.namespace_members(inner);
                    members.push(self.alloc(
                        NodeKind::Namespace {
                            name,
                            members: inner,
                        },
                        span(child),
                    ));
                }
                "file_scoped_namespace_declaration" => {
                    // everything after `namespace N;` belongs to it
                    let name = self.namespace_name(child);
                    let mut inner = named(child);
                    inner.extend(rest.by_ref());
                    let inner = self.namespace_members(inner);
                    members.push(self.alloc(
                        NodeKind::Namespace {
                            name,
                            members: inner,
                        },
                        Span::new(child.start_byte(), self.source.len()),
                    ));
                    break;
                }
                _ => members.extend(self.member(child)),
            }
        }
        members
    }

    fn namespace_name(&self, node: Cst<'_>) -> String {
        field(node, "name")
            .map(|name| self.text(name).split_whitespace().collect())
            .unwrap_or_default()
    }

    fn member(&mut self, node: Cst<'_>) -> Option<NodeId> {
        let id = match node.kind() {
            "class_declaration"
            | "struct_declaration"
            | "interface_declaration"
            | "record_declaration"
            | "record_struct_declaration"
            | "enum_declaration" => self.type_decl(node),
            "field_declaration" => self.field(node, false),
            "event_field_declaration" => self.field(node, true),
            "property_declaration" => self.property(node, None, false),
            "indexer_declaration" => self.property(node, Some("this[]"), false),
            "event_declaration" => self.property(node, None, true),
            "method_declaration" => self.method(node, None),
            "destructor_declaration" => self.method(node, Some("Finalize".into())),
            "operator_declaration" => {
                let op = field(node, "operator").map(|op| self.text(op)).unwrap_or_default();
                self.method(node, Some(format!("op_{}", op)))
            }
            "conversion_operator_declaration" => {
                let which = if has_token(node, "explicit") { "explicit" } else { "implicit" };
                self.method(node, Some(format!("op_{}", which)))
            }
            "constructor_declaration" => self.constructor(node),
            _ => return None,
        };
        Some(id)
    }

    fn type_decl(&mut self, node: Cst<'_>) -> NodeId {
        let kind = match node.kind() {
            "class_declaration" => TypeKind::Class,
            "struct_declaration" => TypeKind::Struct,
            "interface_declaration" => TypeKind::Interface,
            "enum_declaration" => TypeKind::Enum,
            _ => TypeKind::Record,
        };
        let name = field(node, "name").map(|n| self.ident(n)).unwrap_or_default();
        let type_params = self.type_params(node);
        let bases = child_of_kind(node, &["base_list"])
            .map(|list| {
                named(list)
                    .into_iter()
                    .filter(|base| base.kind() != "argument_list")
                    .map(|base| match base.kind() {
                        "primary_constructor_base_type" => self.inner_type(base),
                        _ => self.ty(base),
                    })
                    .collect()
            })
            .unwrap_or_default();
        let body = field(node, "body")
            .or_else(|| child_of_kind(node, &["declaration_list", "enum_member_declaration_list"]));
        let members = match body {
            Some(body) if kind == TypeKind::Enum => self.enum_members(body, &name),
            Some(body) => named(body)
                .into_iter()
                .filter_map(|member| self.member(member))
                .collect(),
            None => Vec::new(),
        };
        let modifiers = self.modifiers(node);
        self.alloc(
            NodeKind::TypeDecl {
                kind,
                modifiers,
                name,
                type_params,
                bases,
                members,
            },
            span(node),
        )
    }

    fn enum_members(&mut self, body: Cst<'_>, enum_name: &str) -> Vec<NodeId> {
        let mut members = Vec::new();
        for member in named(body) {
            if member.kind() != "enum_member_declaration" {
                continue;
            }
            let name = field(member, "name")
                .or_else(|| child_of_kind(member, &["identifier"]))
                .map(|n| self.ident(n))
                .unwrap_or_default();
            let initializer = field(member, "value")
                .or_else(|| after_equals(member))
                .map(|value| self.expr(value));
            let declarator = self.alloc(NodeKind::VariableDeclarator { name, initializer }, span(member));
            let modifiers = Modifiers {
                public: true,
                is_static: true,
                is_const: true,
                ..Modifiers::default()
            };
            members.push(self.alloc(
                NodeKind::Field {
                    modifiers,
                    ty: TypeSyntax::named(enum_name),
                    declarators: vec![declarator],
                },
                span(member),
            ));
        }
        members
    }

    fn field(&mut self, node: Cst<'_>, is_event: bool) -> NodeId {
        let mut modifiers = self.modifiers(node);
        modifiers.is_event = is_event;
        let Some(declaration) = child_of_kind(node, &["variable_declaration"]) else {
            return self.opaque(node);
        };
        let (ty, declarators) = self.variable_declaration(declaration);
        self.alloc(
            NodeKind::Field {
                modifiers,
                ty,
                declarators,
            },
            span(node),
        )
    }

    fn variable_declaration(&mut self, node: Cst<'_>) -> (TypeSyntax, Vec<NodeId>) {
        let ty = field(node, "type")
            .or_else(|| named(node).first().copied())
            .map(|ty| self.ty(ty))
            .unwrap_or_else(|| TypeSyntax::named("var"));
        let declarators = named(node)
            .into_iter()
            .filter(|c| c.kind() == "variable_declarator")
            .map(|declarator| self.declarator(declarator))
            .collect();
        (ty, declarators)
    }

    fn declarator(&mut self, node: Cst<'_>) -> NodeId {
        let name = field(node, "name")
            .or_else(|| child_of_kind(node, &["identifier"]))
            .map(|n| self.ident(n))
            .unwrap_or_else(|| "_".into());
        let value = match child_of_kind(node, &["equals_value_clause"]) {
            Some(clause) => named(clause).first().copied(),
            None => after_equals(node),
        };
        let initializer = value.map(|value| self.variable_value(value));
        self.alloc(NodeKind::VariableDeclarator { name, initializer }, span(node))
    }

    /// Declarator and property initializers: a bare `{ ... }` is an array.
    fn variable_value(&mut self, node: Cst<'_>) -> NodeId {
        if node.kind() == "initializer_expression" {
            self.initializer(node, InitializerKind::Array)
        } else {
            self.expr(node)
        }
    }

    fn property(&mut self, node: Cst<'_>, name: Option<&str>, is_event: bool) -> NodeId {
        let mut modifiers = self.modifiers(node);
        modifiers.is_event = is_event;
        let ty = field(node, "type")
            .map(|ty| self.ty(ty))
            .unwrap_or_default();
        let name = match name {
            Some(name) => name.to_string(),
            None => field(node, "name").map(|n| self.ident(n)).unwrap_or_default(),
        };
        let params = child_of_kind(node, &["bracketed_parameter_list"])
            .map(|list| self.params(list))
            .unwrap_or_default();
        let accessors = field(node, "accessors")
            .or_else(|| child_of_kind(node, &["accessor_list"]))
            .map(|list| {
                named(list)
                    .into_iter()
                    .filter(|c| c.kind() == "accessor_declaration")
                    .map(|accessor| self.accessor(accessor))
                    .collect()
            })
            .unwrap_or_default();
        let expression_body = child_of_kind(node, &["arrow_expression_clause"]).map(|arrow| self.arrow(arrow));
        let initializer = after_equals(node).map(|value| self.variable_value(value));
        self.alloc(
            NodeKind::Property {
                modifiers,
                ty,
                name,
                params,
                accessors,
                expression_body,
                initializer,
            },
            span(node),
        )
    }

    fn accessor(&mut self, node: Cst<'_>) -> NodeId {
        let keyword = field(node, "name")
            .map(|n| n.kind())
            .into_iter()
            .chain(tokens(node).into_iter().map(|c| c.kind()))
            .find(|k| matches!(*k, "get" | "set" | "init" | "add" | "remove"));
        let kind = match keyword {
            Some("set") => AccessorKind::Set,
            Some("init") => AccessorKind::Init,
            Some("add") => AccessorKind::Add,
            Some("remove") => AccessorKind::Remove,
            _ => AccessorKind::Get,
        };
        let modifiers = self.modifiers(node);
        let (body, expression_body) = self.callable_body(node);
        self.alloc(
            NodeKind::Accessor {
                kind,
                modifiers,
                body,
                expression_body,
            },
            span(node),
        )
    }

    fn arrow(&mut self, node: Cst<'_>) -> NodeId {
        match named(node).first() {
            Some(expr) => self.expr(*expr),
            None => self.opaque(node),
        }
    }

    fn callable_body(&mut self, node: Cst<'_>) -> (Option<NodeId>, Option<NodeId>) {
        if let Some(block) = child_of_kind(node, &["block"]) {
            return (Some(self.block(block)), None);
        }
        let arrow = child_of_kind(node, &["arrow_expression_clause"]).map(|arrow| self.arrow(arrow));
        (None, arrow)
    }

    fn method(&mut self, node: Cst<'_>, name: Option<String>) -> NodeId {
        let modifiers = self.modifiers(node);
        let return_type = return_type(node)
            .map(|ty| self.ty(ty))
            .unwrap_or_else(|| TypeSyntax::named("void"));
        let name = match name {
            Some(name) => name,
            None => field(node, "name").map(|n| self.ident(n)).unwrap_or_default(),
        };
        let type_params = self.type_params(node);
        let params = self.own_params(node);
        let (body, expression_body) = self.callable_body(node);
        self.alloc(
            NodeKind::Method {
                modifiers,
                return_type,
                name,
                type_params,
                params,
                body,
                expression_body,
            },
            span(node),
        )
    }

    fn constructor(&mut self, node: Cst<'_>) -> NodeId {
        let modifiers = self.modifiers(node);
        let name = field(node, "name").map(|n| self.ident(n)).unwrap_or_default();
        let params = self.own_params(node);
        let initializer = child_of_kind(node, &["constructor_initializer"]).map(|init| {
            let kind = if has_token(init, "base") {
                ConstructorInitializerKind::Base
            } else {
                ConstructorInitializerKind::This
            };
            let args = self.arguments(child_of_kind(init, &["argument_list"]));
            self.alloc(NodeKind::ConstructorInitializer { kind, args }, span(init))
        });
        let (body, expression_body) = self.callable_body(node);
        self.alloc(
            NodeKind::Constructor {
                modifiers,
                name,
                params,
                initializer,
                body,
                expression_body,
            },
            span(node),
        )
    }

    fn own_params(&mut self, node: Cst<'_>) -> Vec<NodeId> {
        field(node, "parameters")
            .or_else(|| child_of_kind(node, &["parameter_list"]))
            .map(|list| self.params(list))
            .unwrap_or_default()
    }

    fn params(&mut self, list: Cst<'_>) -> Vec<NodeId> {
        named(list)
            .into_iter()
            .filter(|c| matches!(c.kind(), "parameter" | "parameter_array"))
            .map(|param| self.parameter(param))
            .collect()
    }

    fn parameter(&mut self, node: Cst<'_>) -> NodeId {
        let mut modifier = if node.kind() == "parameter_array" {
            ParameterModifier::Params
        } else {
            ParameterModifier::None
        };
        for child in tokens(node) {
            let word = if !child.is_named() {
                child.kind()
            } else if matches!(child.kind(), "modifier" | "parameter_modifier") {
                self.text(child)
            } else {
                continue;
            };
            modifier = match word {
                "ref" => ParameterModifier::Ref,
                "out" => ParameterModifier::Out,
                "in" => ParameterModifier::In,
                "params" => ParameterModifier::Params,
                "this" => ParameterModifier::This,
                _ => modifier,
            };
        }
        let ty = field(node, "type").map(|ty| self.ty(ty));
        let name = field(node, "name")
            .or_else(|| named(node).into_iter().filter(|c| c.kind() == "identifier").last())
            .map(|n| self.ident(n))
            .unwrap_or_default();
        let default = after_equals(node).map(|value| self.expr(value));
        self.alloc(
            NodeKind::Parameter {
                modifier,
                ty,
                name,
                default,
            },
            span(node),
        )
    }

    // ---- statements ----

    fn block(&mut self, node: Cst<'_>) -> NodeId {
        let statements = named(node)
            .into_iter()
            .map(|statement| self.statement(statement))
            .collect();
        self.alloc(NodeKind::Block { statements }, span(node))
    }

    fn jump(&mut self, kind: JumpKind, node: Cst<'_>) -> NodeId {
        self.alloc(NodeKind::Jump { kind }, span(node))
    }

    fn first_expr(&mut self, node: Cst<'_>) -> Option<NodeId> {
        named(node).first().map(|expr| self.expr(*expr))
    }

    fn statement(&mut self, node: Cst<'_>) -> NodeId {
        match node.kind() {
            "block" => self.block(node),
            "local_declaration_statement" => {
                let Some(declaration) = child_of_kind(node, &["variable_declaration"]) else {
                    return self.opaque(node);
                };
                let is_using = has_token(node, "using");
                let is_const = self.modifiers(node).is_const || has_token(node, "const");
                self.local_declaration(declaration, is_using, is_const, span(node))
            }
            "local_function_statement" => {
                let modifiers = self.modifiers(node);
                let return_type = return_type(node)
                    .map(|ty| self.ty(ty))
                    .unwrap_or_else(|| TypeSyntax::named("void"));
                let name = field(node, "name").map(|n| self.ident(n)).unwrap_or_default();
                let type_params = self.type_params(node);
                let params = self.own_params(node);
                let (body, expression_body) = self.callable_body(node);
                self.alloc(
                    NodeKind::LocalFunction {
                        modifiers,
                        return_type,
                        name,
                        type_params,
                        params,
                        body,
                        expression_body,
                    },
                    span(node),
                )
            }
            "expression_statement" => match self.first_expr(node) {
                Some(expr) => self.alloc(NodeKind::ExpressionStatement { expr }, span(node)),
                None => self.jump(JumpKind::Empty, node),
            },
            "return_statement" => {
                let expr = self.first_expr(node);
                self.alloc(NodeKind::Return { expr }, span(node))
            }
            "throw_statement" => {
                let expr = self.first_expr(node);
                self.alloc(NodeKind::Throw { expr }, span(node))
            }
            "yield_statement" => {
                if has_token(node, "break") {
                    return self.jump(JumpKind::YieldBreak, node);
                }
                match self.first_expr(node) {
                    Some(expr) => self.alloc(NodeKind::YieldReturn { expr }, span(node)),
                    None => self.jump(JumpKind::YieldBreak, node),
                }
            }
            "if_statement" => {
                let condition = self.required_expr(node, "condition", 0);
                let then_branch = self.required_statement(node, "consequence", 1);
                let else_branch = field(node, "alternative").map(|s| self.statement(s));
                self.alloc(
                    NodeKind::If {
                        condition,
                        then_branch,
                        else_branch,
                    },
                    span(node),
                )
            }
            "while_statement" => {
                let condition = self.required_expr(node, "condition", 0);
                let body = self.required_statement(node, "body", 1);
                self.alloc(
                    NodeKind::While {
                        condition,
                        body,
                        is_do: false,
                    },
                    span(node),
                )
            }
            "do_statement" => {
                let body = self.required_statement(node, "body", 0);
                let condition = self.required_expr(node, "condition", 1);
                self.alloc(
                    NodeKind::While {
                        condition,
                        body,
                        is_do: true,
                    },
                    span(node),
                )
            }
            "for_statement" => self.for_statement(node),
            "foreach_statement" | "for_each_statement" => self.foreach_statement(node),
            "using_statement" => self.using_statement(node),
            "try_statement" => self.try_statement(node),
            "lock_statement" => {
                let expr = self.required_expr(node, "expression", 0);
                let body = self.required_statement(node, "body", 1);
                self.alloc(NodeKind::Lock { expr, body }, span(node))
            }
            "switch_statement" => self.switch_statement(node),
            "break_statement" => self.jump(JumpKind::Break, node),
            "continue_statement" => self.jump(JumpKind::Continue, node),
            "goto_statement" => self.jump(JumpKind::Goto, node),
            "checked_statement" | "unsafe_statement" | "fixed_statement" | "labeled_statement" => {
                match named(node).last() {
                    Some(inner) => self.statement(*inner),
                    None => self.jump(JumpKind::Empty, node),
                }
            }
            _ => self.jump(JumpKind::Empty, node),
        }
    }

    /// Expression in `name`, falling back to the `index`th named child.
    fn required_expr(&mut self, node: Cst<'_>, name: &str, index: usize) -> NodeId {
        match field(node, name).or_else(|| named(node).get(index).copied()) {
            Some(expr) => self.expr(expr),
            None => self.opaque(node),
        }
    }

    fn required_statement(&mut self, node: Cst<'_>, name: &str, index: usize) -> NodeId {
        match field(node, name).or_else(|| named(node).get(index).copied()) {
            Some(statement) => self.statement(statement),
            None => self.jump(JumpKind::Empty, node),
        }
    }

    fn local_declaration(&mut self, declaration: Cst<'_>, is_using: bool, is_const: bool, at: Span) -> NodeId {
        let (ty, declarators) = self.variable_declaration(declaration);
        let ty = if ty.is_var() { None } else { Some(ty) };
        self.alloc(
            NodeKind::LocalDeclaration {
                is_using,
                is_const,
                ty,
                declarators,
            },
            at,
        )
    }

    fn for_statement(&mut self, node: Cst<'_>) -> NodeId {
        let mut initializers = Vec::new();
        for init in fields(node, "initializer") {
            let id = if init.kind() == "variable_declaration" {
                self.local_declaration(init, false, false, span(init))
            } else {
                self.expr(init)
            };
            initializers.push(id);
        }
        let condition = field(node, "condition").map(|c| self.expr(c));
        let incrementors = fields(node, "update")
            .into_iter()
            .map(|update| self.expr(update))
            .collect();
        let body = match field(node, "body").or_else(|| named(node).last().copied()) {
            Some(body) => self.statement(body),
            None => self.jump(JumpKind::Empty, node),
        };
        self.alloc(
            NodeKind::For {
                initializers,
                condition,
                incrementors,
                body,
            },
            span(node),
        )
    }

    fn foreach_statement(&mut self, node: Cst<'_>) -> NodeId {
        let ty = field(node, "type").map(|ty| self.ty(ty)).filter(|ty| !ty.is_var());
        let name = match field(node, "left") {
            Some(left) if left.kind() == "identifier" => self.ident(left),
            // deconstruction: the element is not tracked as one local
            _ => "_".to_string(),
        };
        let collection = self.required_expr(node, "right", 1);
        let body = match field(node, "body").or_else(|| named(node).last().copied()) {
            Some(body) => self.statement(body),
            None => self.jump(JumpKind::Empty, node),
        };
        self.alloc(
            NodeKind::ForEach {
                ty,
                name,
                collection,
                body,
            },
            span(node),
        )
    }

    fn using_statement(&mut self, node: Cst<'_>) -> NodeId {
        let body_node = field(node, "body").or_else(|| named(node).last().copied());
        let declaration_node = child_of_kind(node, &["variable_declaration"]);
        let declaration =
            declaration_node.map(|decl| self.local_declaration(decl, true, false, span(decl)));
        let expr = match declaration_node {
            Some(_) => None,
            None => named(node)
                .into_iter()
                .find(|c| Some(*c) != body_node)
                .map(|expr| self.expr(expr)),
        };
        let body = match body_node {
            Some(body) => self.statement(body),
            None => self.jump(JumpKind::Empty, node),
        };
        self.alloc(
            NodeKind::Using {
                declaration,
                expr,
                body,
            },
            span(node),
        )
    }

    fn try_statement(&mut self, node: Cst<'_>) -> NodeId {
        let block = match field(node, "body").or_else(|| child_of_kind(node, &["block"])) {
            Some(block) => self.block(block),
            None => self.jump(JumpKind::Empty, node),
        };
        let mut catches = Vec::new();
        let mut finally = None;
        for child in named(node) {
            match child.kind() {
                "catch_clause" => catches.push(self.catch_clause(child)),
                "finally_clause" => {
                    finally = child_of_kind(child, &["block"]).map(|b| self.block(b));
                }
                _ => {}
            }
        }
        self.alloc(
            NodeKind::Try {
                block,
                catches,
                finally,
            },
            span(node),
        )
    }

    fn catch_clause(&mut self, node: Cst<'_>) -> NodeId {
        let declaration = child_of_kind(node, &["catch_declaration"]);
        let ty = declaration
            .and_then(|d| field(d, "type").or_else(|| named(d).first().copied()))
            .map(|ty| self.ty(ty));
        let name = declaration.and_then(|d| field(d, "name")).map(|n| self.ident(n));
        let filter = child_of_kind(node, &["catch_filter_clause"]).and_then(|f| self.first_expr(f));
        let body = match field(node, "body").or_else(|| child_of_kind(node, &["block"])) {
            Some(body) => self.block(body),
            None => self.jump(JumpKind::Empty, node),
        };
        self.alloc(
            NodeKind::Catch {
                ty,
                name,
                filter,
                body,
            },
            span(node),
        )
    }

    fn switch_statement(&mut self, node: Cst<'_>) -> NodeId {
        let body = field(node, "body").or_else(|| child_of_kind(node, &["switch_body"]));
        let governing = field(node, "value")
            .or_else(|| named(node).into_iter().find(|c| Some(*c) != body));
        let expr = match governing {
            Some(expr) => self.expr(expr),
            None => self.opaque(node),
        };
        let sections = body
            .map(|body| {
                named(body)
                    .into_iter()
                    .filter(|c| c.kind() == "switch_section")
                    .map(|section| self.switch_section(section))
                    .collect()
            })
            .unwrap_or_default();
        self.alloc(NodeKind::Switch { expr, sections }, span(node))
    }

    fn switch_section(&mut self, node: Cst<'_>) -> NodeId {
        let children = tokens(node);
        let mut labels = Vec::new();
        let mut statements = Vec::new();
        let mut i = 0;
        while i < children.len() {
            let child = children[i];
            match child.kind() {
                "case_switch_label" | "case_pattern_switch_label" | "default_switch_label" => {
                    let content = named(child);
                    labels.push(self.case_label(&content, span(child)));
                }
                "case" | "default" if !child.is_named() => {
                    let mut content = Vec::new();
                    let mut end = child.end_byte();
                    i += 1;
                    while i < children.len() {
                        let next = children[i];
                        if !next.is_named() && next.kind() == ":" {
                            end = next.end_byte();
                            break;
                        }
                        if next.is_named() {
                            content.push(next);
                        }
                        i += 1;
                    }
                    labels.push(self.case_label(&content, Span::new(child.start_byte(), end)));
                }
                _ if child.is_named() => statements.push(self.statement(child)),
                _ => {}
            }
            i += 1;
        }
        self.alloc(NodeKind::SwitchSection { labels, statements }, span(node))
    }

    /// `case 1:`, `case Stream s when ...:` or `default:` (no content).
    fn case_label(&mut self, content: &[Cst<'_>], at: Span) -> NodeId {
        let pattern = match content.iter().find(|c| c.kind() != "when_clause") {
            Some(pattern) => self.pattern(*pattern),
            None => Pattern::default(),
        };
        self.alloc(
            NodeKind::CaseLabel {
                value: pattern.value,
                ty: pattern.ty,
                designation: pattern.designation,
            },
            at,
        )
    }

    fn designation(&self, node: Option<Cst<'_>>) -> Option<String> {
        let node = node?;
        match node.kind() {
            "identifier" => Some(self.ident(node)).filter(|name| name != "_"),
            "single_variable_designation" => self.designation(named(node).first().copied()),
            _ => None,
        }
    }

    /// The first alternative of a pattern; combinators only refine the test.
    fn pattern(&mut self, node: Cst<'_>) -> Pattern {
        match node.kind() {
            "constant_pattern" | "parenthesized_pattern" => match named(node).first() {
                Some(inner) => self.pattern(*inner),
                None => Pattern::default(),
            },
            "negated_pattern" => {
                let mut pattern = match named(node).first() {
                    Some(inner) => self.pattern(*inner),
                    None => Pattern::default(),
                };
                pattern.negated = !pattern.negated;
                pattern
            }
            "and_pattern" | "or_pattern" | "binary_pattern" => {
                match field(node, "left").or_else(|| named(node).first().copied()) {
                    Some(left) => self.pattern(left),
                    None => Pattern::default(),
                }
            }
            "declaration_pattern" => {
                let ty = field(node, "type").or_else(|| named(node).first().copied());
                let name = field(node, "name").or_else(|| named(node).get(1).copied());
                Pattern {
                    ty: ty.map(|ty| self.ty(ty)),
                    designation: self.designation(name),
                    ..Pattern::default()
                }
            }
            "recursive_pattern" => {
                let ty = field(node, "type");
                let name = named(node)
                    .into_iter()
                    .filter(|c| Some(*c) != ty)
                    .find(|c| matches!(c.kind(), "identifier" | "single_variable_designation"));
                Pattern {
                    ty: ty.map(|ty| self.ty(ty)),
                    designation: self.designation(name),
                    ..Pattern::default()
                }
            }
            "var_pattern" => Pattern {
                designation: self.designation(named(node).first().copied()),
                ..Pattern::default()
            },
            "type_pattern" => {
                let ty = field(node, "type").or_else(|| named(node).first().copied());
                Pattern {
                    ty: ty.map(|ty| self.ty(ty)),
                    ..Pattern::default()
                }
            }
            "relational_pattern" => Pattern {
                value: named(node).last().map(|value| self.expr(*value)),
                ..Pattern::default()
            },
            "discard" | "list_pattern" | "property_pattern_clause" | "positional_pattern_clause" => {
                Pattern::default()
            }
            kind if is_type_like(kind) => Pattern {
                ty: Some(self.ty(node)),
                ..Pattern::default()
            },
            _ => Pattern {
                value: Some(self.expr(node)),
                ..Pattern::default()
            },
        }
    }

    // ---- expressions ----

    fn expr(&mut self, node: Cst<'_>) -> NodeId {
        match node.kind() {
            "member_access_expression"
            | "invocation_expression"
            | "element_access_expression"
            | "conditional_access_expression"
            | "member_binding_expression"
            | "element_binding_expression" => {
                let chain = self.chain(node);
                self.finish(chain, node.end_byte())
            }
            "postfix_unary_expression" => self.postfix(node),
            "identifier" | "discard" => {
                let name = self.ident(node);
                self.alloc(
                    NodeKind::Identifier {
                        name,
                        type_args: Vec::new(),
                    },
                    span(node),
                )
            }
            "generic_name" => {
                let (name, type_args) = self.simple_name(node);
                self.alloc(NodeKind::Identifier { name, type_args }, span(node))
            }
            "qualified_name" => {
                let qualifier = field(node, "qualifier").or_else(|| named(node).first().copied());
                let name = field(node, "name").or_else(|| named(node).last().copied());
                match (qualifier, name) {
                    (Some(qualifier), Some(name)) if qualifier != name => {
                        let expr = self.expr(qualifier);
                        let (name, type_args) = self.simple_name(name);
                        self.alloc(
                            NodeKind::MemberAccess {
                                expr,
                                name,
                                type_args,
                            },
                            span(node),
                        )
                    }
                    _ => self.opaque(node),
                }
            }
            "alias_qualified_name" => match field(node, "name") {
                Some(name) => self.expr(name),
                None => self.opaque(node),
            },
            "predefined_type" => {
                let ty = TypeSyntax::named(self.text(node));
                self.alloc(NodeKind::PredefinedType { ty }, span(node))
            }
            "this_expression" | "this" => self.alloc(NodeKind::This, span(node)),
            "base_expression" | "base" => self.alloc(NodeKind::Base, span(node)),
            "null_literal" => self.literal(LiteralKind::Null, node),
            "boolean_literal" => self.literal(LiteralKind::Bool, node),
            "integer_literal" | "real_literal" => self.literal(LiteralKind::Number, node),
            "character_literal" => self.literal(LiteralKind::Char, node),
            "string_literal"
            | "verbatim_string_literal"
            | "raw_string_literal"
            | "interpolated_string_expression"
            | "interpolated_verbatim_string_text" => self.literal(LiteralKind::String, node),
            "parenthesized_expression" | "checked_expression" => match self.first_expr(node) {
                Some(expr) => self.alloc(NodeKind::Parenthesized { expr }, span(node)),
                None => self.opaque(node),
            },
            "ref_expression" => match named(node).last() {
                Some(inner) => self.expr(*inner),
                None => self.opaque(node),
            },
            "tuple_expression" => {
                let elements = named(node)
                    .into_iter()
                    .map(|element| self.argument_value(element))
                    .collect();
                self.alloc(NodeKind::Tuple { elements }, span(node))
            }
            "assignment_expression" => self.assignment(node),
            "binary_expression" | "as_expression" | "is_expression" => self.binary(node),
            "is_pattern_expression" => {
                let expr = self.required_expr(node, "expression", 0);
                let pattern = match field(node, "pattern").or_else(|| named(node).get(1).copied()) {
                    Some(pattern) => self.pattern(pattern),
                    None => Pattern::default(),
                };
                self.is(expr, pattern, node)
            }
            "conditional_expression" => {
                let condition = self.required_expr(node, "condition", 0);
                let when_true = self.required_expr(node, "consequence", 1);
                let when_false = self.required_expr(node, "alternative", 2);
                self.alloc(
                    NodeKind::Conditional {
                        condition,
                        when_true,
                        when_false,
                    },
                    span(node),
                )
            }
            "prefix_unary_expression" => {
                let Some(operand) = named(node).last().copied() else {
                    return self.opaque(node);
                };
                let op = self.slice(node.start_byte(), operand.start_byte()).trim();
                let operand_id = self.expr(operand);
                match unary_op(op) {
                    Some(op) => self.alloc(
                        NodeKind::Prefix {
                            op,
                            operand: operand_id,
                        },
                        span(node),
                    ),
                    None => operand_id,
                }
            }
            "cast_expression" => {
                let ty = field(node, "type")
                    .or_else(|| named(node).first().copied())
                    .map(|ty| self.ty(ty))
                    .unwrap_or_default();
                let expr = self.required_expr(node, "value", 1);
                self.alloc(NodeKind::Cast { ty, expr }, span(node))
            }
            "await_expression" => match self.first_expr(node) {
                Some(expr) => self.alloc(NodeKind::Await { expr }, span(node)),
                None => self.opaque(node),
            },
            "throw_expression" => match self.first_expr(node) {
                Some(expr) => self.alloc(NodeKind::ThrowExpression { expr }, span(node)),
                None => self.opaque(node),
            },
            "lambda_expression" | "anonymous_method_expression" => self.lambda(node),
            "typeof_expression" => {
                let ty = named(node).first().map(|ty| self.ty(*ty)).unwrap_or_default();
                self.alloc(NodeKind::TypeOf { ty }, span(node))
            }
            "default_expression" => {
                let ty = named(node).first().map(|ty| self.ty(*ty));
                self.alloc(NodeKind::Default { ty }, span(node))
            }
            "sizeof_expression" => self.alloc(
                NodeKind::Literal {
                    kind: LiteralKind::Number,
                    text: "sizeof".into(),
                },
                span(node),
            ),
            "switch_expression" => {
                let children = named(node);
                let governing = match children.first() {
                    Some(expr) if expr.kind() != "switch_expression_arm" => self.expr(*expr),
                    _ => self.opaque(node),
                };
                // patterns are dropped; only the arm results carry values
                let arms = children
                    .into_iter()
                    .filter(|c| c.kind() == "switch_expression_arm")
                    .filter_map(|arm| named(arm).last().copied())
                    .map(|result| self.expr(result))
                    .collect();
                self.alloc(NodeKind::SwitchExpression { governing, arms }, span(node))
            }
            "object_creation_expression" => {
                let ty = field(node, "type").map(|ty| self.ty(ty));
                let args = self.arguments(field(node, "arguments").or_else(|| child_of_kind(node, &["argument_list"])));
                let initializer = field(node, "initializer")
                    .or_else(|| child_of_kind(node, &["initializer_expression"]))
                    .map(|init| self.initializer(init, InitializerKind::Collection));
                self.alloc(
                    NodeKind::ObjectCreation {
                        ty,
                        args,
                        initializer,
                    },
                    span(node),
                )
            }
            "implicit_object_creation_expression" => {
                let args = self.arguments(child_of_kind(node, &["argument_list"]));
                let initializer = child_of_kind(node, &["initializer_expression"])
                    .map(|init| self.initializer(init, InitializerKind::Object));
                self.alloc(
                    NodeKind::ObjectCreation {
                        ty: None,
                        args,
                        initializer,
                    },
                    span(node),
                )
            }
            "anonymous_object_creation_expression" => self.anonymous_object(node),
            "array_creation_expression" | "stackalloc_array_creation_expression" | "stackalloc_expression" => {
                self.array_creation(node)
            }
            "implicit_array_creation_expression"
            | "implicit_stackalloc_array_creation_expression"
            | "implicit_stackalloc_expression" => {
                let initializer = child_of_kind(node, &["initializer_expression"])
                    .map(|init| self.initializer(init, InitializerKind::Array));
                self.alloc(
                    NodeKind::ArrayCreation {
                        ty: None,
                        sizes: Vec::new(),
                        initializer,
                    },
                    span(node),
                )
            }
            "initializer_expression" => self.initializer(node, InitializerKind::Collection),
            "collection_expression" => {
                let exprs = named(node)
                    .into_iter()
                    .map(|element| match element.kind() {
                        "spread_element" => match named(element).first() {
                            Some(inner) => self.expr(*inner),
                            None => self.opaque(element),
                        },
                        _ => self.expr(element),
                    })
                    .collect();
                self.alloc(
                    NodeKind::Initializer {
                        kind: InitializerKind::Collection,
                        exprs,
                    },
                    span(node),
                )
            }
            "declaration_expression" => {
                let ty = field(node, "type")
                    .map(|ty| self.ty(ty))
                    .filter(|ty| !ty.is_var());
                let name = match field(node, "name") {
                    Some(name) if name.kind() == "identifier" => self.ident(name),
                    _ => "_".to_string(),
                };
                self.alloc(NodeKind::DeclarationExpression { ty, name }, span(node))
            }
            "range_expression" => {
                let operands = named(node);
                if operands.len() != 2 {
                    return self.opaque(node);
                }
                let left = self.expr(operands[0]);
                let right = self.expr(operands[1]);
                self.alloc(
                    NodeKind::Binary {
                        op: BinaryOp::Range,
                        left,
                        right,
                    },
                    span(node),
                )
            }
            _ => self.opaque(node),
        }
    }

    fn literal(&mut self, kind: LiteralKind, node: Cst<'_>) -> NodeId {
        let text = self.text(node).to_string();
        self.alloc(NodeKind::Literal { kind, text }, span(node))
    }

    fn postfix(&mut self, node: Cst<'_>) -> NodeId {
        let Some(operand) = named(node).first().copied() else {
            return self.opaque(node);
        };
        match self.slice(operand.end_byte(), node.end_byte()).trim() {
            "++" | "--" => {
                let op = if self.text(node).ends_with("++") {
                    UnaryOp::Increment
                } else {
                    UnaryOp::Decrement
                };
                let operand = self.expr(operand);
                self.alloc(NodeKind::Postfix { op, operand }, span(node))
            }
            // null-forgiving operator has no runtime effect
            _ => {
                let chain = self.chain(node);
                self.finish(chain, node.end_byte())
            }
        }
    }

    /// Member accesses, calls and element accesses, with every `?.` guard
    /// collected for [`Self::finish`].
    fn chain(&mut self, node: Cst<'_>) -> Chain {
        match node.kind() {
            "conditional_access_expression" => {
                let children = named(node);
                let condition = field(node, "condition").or_else(|| children.first().copied());
                let binding = children.last().copied().filter(|b| Some(*b) != condition);
                let mut chain = match condition {
                    Some(condition) => self.chain(condition),
                    None => Chain::plain(self.opaque(node)),
                };
                chain.guards.push(chain.value);
                chain.value = match binding {
                    Some(binding) => {
                        let inner = self.chain(binding);
                        self.finish(inner, binding.end_byte())
                    }
                    None => self.opaque(node),
                };
                chain
            }
            "member_binding_expression" => {
                let name = field(node, "name").or_else(|| named(node).last().copied());
                let value = match name {
                    Some(name) => {
                        let (text, type_args) = self.simple_name(name);
                        self.alloc(
                            NodeKind::MemberBinding {
                                name: text,
                                type_args,
                            },
                            span(name),
                        )
                    }
                    None => self.opaque(node),
                };
                Chain::plain(value)
            }
            "element_binding_expression" => {
                let args = self.arguments(child_of_kind(node, &["bracketed_argument_list"]));
                Chain::plain(self.alloc(NodeKind::ElementBinding { args }, span(node)))
            }
            "member_access_expression" => {
                let mut chain = self.receiver(node, "expression");
                let (name, type_args) = match field(node, "name").or_else(|| named(node).last().copied()) {
                    Some(name) => self.simple_name(name),
                    None => (String::new(), Vec::new()),
                };
                let start = self.span_of(chain.value).start;
                chain.value = self.alloc(
                    NodeKind::MemberAccess {
                        expr: chain.value,
                        name,
                        type_args,
                    },
                    Span::new(start, node.end_byte()),
                );
                chain
            }
            "invocation_expression" => {
                let arguments = field(node, "arguments").or_else(|| child_of_kind(node, &["argument_list"]));
                if let Some(function) = field(node, "function") {
                    if function.kind() == "identifier" && self.text(function) == "nameof" {
                        let args = arguments.map(named).unwrap_or_default();
                        if let [arg] = args.as_slice() {
                            let expr = self.argument_value(*arg);
                            return Chain::plain(self.alloc(NodeKind::NameOf { expr }, span(node)));
                        }
                    }
                }
                let mut chain = self.receiver(node, "function");
                let args = self.arguments(arguments);
                let start = self.span_of(chain.value).start;
                chain.value = self.alloc(
                    NodeKind::Invocation {
                        expr: chain.value,
                        args,
                    },
                    Span::new(start, node.end_byte()),
                );
                chain
            }
            "element_access_expression" => {
                let mut chain = self.receiver(node, "expression");
                let subscript = field(node, "subscript").or_else(|| child_of_kind(node, &["bracketed_argument_list"]));
                let args = self.arguments(subscript);
                let start = self.span_of(chain.value).start;
                chain.value = self.alloc(
                    NodeKind::ElementAccess {
                        expr: chain.value,
                        args,
                    },
                    Span::new(start, node.end_byte()),
                );
                chain
            }
            "postfix_unary_expression" if self.text(node).ends_with('!') => match named(node).first() {
                Some(operand) => self.chain(*operand),
                None => Chain::plain(self.opaque(node)),
            },
            _ => Chain::plain(self.expr(node)),
        }
    }

    fn receiver(&mut self, node: Cst<'_>, name: &str) -> Chain {
        match field(node, name).or_else(|| named(node).first().copied()) {
            Some(receiver) => self.chain(receiver),
            None => Chain::plain(self.opaque(node)),
        }
    }

    /// Wrap the chain built so far in its `?.` guards, innermost first.
    fn finish(&mut self, chain: Chain, end: usize) -> NodeId {
        let mut value = chain.value;
        for guard in chain.guards.into_iter().rev() {
            let start = self.span_of(guard).start;
            value = self.alloc(
                NodeKind::ConditionalAccess {
                    expr: guard,
                    when_not_null: value,
                },
                Span::new(start, end),
            );
        }
        value
    }

    fn arguments(&mut self, list: Option<Cst<'_>>) -> Vec<NodeId> {
        let Some(list) = list else {
            return Vec::new();
        };
        named(list)
            .into_iter()
            .filter(|c| c.kind() == "argument")
            .map(|arg| self.argument(arg))
            .collect()
    }

    fn argument(&mut self, node: Cst<'_>) -> NodeId {
        let label = field(node, "name").or_else(|| child_of_kind(node, &["name_colon"]));
        let name = label.map(|label| match label.kind() {
            "name_colon" => named(label)
                .first()
                .map(|n| self.ident(*n))
                .unwrap_or_default(),
            _ => self.ident(label),
        });
        let modifier = tokens(node)
            .into_iter()
            .filter(|c| !c.is_named())
            .find_map(|c| match c.kind() {
                "ref" => Some(ArgumentModifier::Ref),
                "out" => Some(ArgumentModifier::Out),
                "in" => Some(ArgumentModifier::In),
                _ => None,
            })
            .unwrap_or_default();
        let value = named(node).into_iter().filter(|c| Some(*c) != label).last();
        let expr = match value {
            Some(value) => self.expr(value),
            None => self.opaque(node),
        };
        self.alloc(
            NodeKind::Argument {
                name,
                modifier,
                expr,
            },
            span(node),
        )
    }

    /// Value of a tuple element or `nameof` argument.
    fn argument_value(&mut self, node: Cst<'_>) -> NodeId {
        if node.kind() != "argument" {
            return self.expr(node);
        }
        let label = field(node, "name").or_else(|| child_of_kind(node, &["name_colon"]));
        match named(node).into_iter().filter(|c| Some(*c) != label).last() {
            Some(value) => self.expr(value),
            None => self.opaque(node),
        }
    }

    fn assignment(&mut self, node: Cst<'_>) -> NodeId {
        let children = named(node);
        let (Some(left), Some(right)) = (
            field(node, "left").or_else(|| children.first().copied()),
            field(node, "right").or_else(|| children.last().copied()),
        ) else {
            return self.opaque(node);
        };
        let op = assign_op(self.between(left, right));
        let left = match left.kind() {
            // `[k] = v` inside an object initializer
            "collection_expression" | "implicit_element_access" | "element_binding_expression" => {
                let args = named(left)
                    .into_iter()
                    .flat_map(|c| if c.kind() == "bracketed_argument_list" { named(c) } else { vec![c] })
                    .map(|arg| {
                        if arg.kind() == "argument" {
                            self.argument(arg)
                        } else {
                            let expr = self.expr(arg);
                            self.alloc(
                                NodeKind::Argument {
                                    name: None,
                                    modifier: ArgumentModifier::None,
                                    expr,
                                },
                                span(arg),
                            )
                        }
                    })
                    .collect();
                self.alloc(NodeKind::ElementBinding { args }, span(left))
            }
            _ => self.expr(left),
        };
        let right = self.expr(right);
        self.alloc(NodeKind::Assignment { op, left, right }, span(node))
    }

    fn binary(&mut self, node: Cst<'_>) -> NodeId {
        let children = named(node);
        let (Some(left), Some(right)) = (
            field(node, "left").or_else(|| children.first().copied()),
            field(node, "right").or_else(|| children.last().copied()),
        ) else {
            return self.opaque(node);
        };
        match self.between(left, right) {
            "as" => {
                let expr = self.expr(left);
                let ty = self.ty(right);
                self.alloc(NodeKind::As { expr, ty }, span(node))
            }
            "is" => {
                let expr = self.expr(left);
                let pattern = self.pattern(right);
                self.is(expr, pattern, node)
            }
            op => match binary_op(op) {
                Some(op) => {
                    let left = self.expr(left);
                    let right = self.expr(right);
                    self.alloc(NodeKind::Binary { op, left, right }, span(node))
                }
                None => self.opaque(node),
            },
        }
    }

    fn is(&mut self, expr: NodeId, pattern: Pattern, node: Cst<'_>) -> NodeId {
        self.alloc(
            NodeKind::Is {
                expr,
                negated: pattern.negated,
                ty: pattern.ty,
                designation: pattern.designation,
                value: pattern.value,
            },
            span(node),
        )
    }

    fn lambda(&mut self, node: Cst<'_>) -> NodeId {
        let is_async = tokens(node).iter().any(|c| {
            (c.kind() == "modifier" && self.text(*c) == "async") || (!c.is_named() && c.kind() == "async")
        });
        let params = match field(node, "parameters").or_else(|| child_of_kind(node, &["parameter_list"])) {
            Some(list) if list.kind() == "parameter_list" => self.params(list),
            Some(single) => {
                let name = self.ident(single);
                vec![self.alloc(
                    NodeKind::Parameter {
                        modifier: ParameterModifier::None,
                        ty: None,
                        name,
                        default: None,
                    },
                    span(single),
                )]
            }
            None => Vec::new(),
        };
        let body = match field(node, "body").or_else(|| child_of_kind(node, &["block"])) {
            Some(body) if body.kind() == "block" => self.block(body),
            Some(body) => self.expr(body),
            None => self.opaque(node),
        };
        self.alloc(
            NodeKind::Lambda {
                is_async,
                params,
                body,
            },
            span(node),
        )
    }

    /// `{ A = x, [k] = v, { k, v }, item }`.
    fn initializer(&mut self, node: Cst<'_>, hint: InitializerKind) -> NodeId {
        let mut exprs = Vec::new();
        let mut has_members = false;
        for element in named(node) {
            let id = match element.kind() {
                "initializer_expression" => self.initializer(element, InitializerKind::Collection),
                "assignment_expression" => {
                    has_members = true;
                    self.assignment(element)
                }
                _ => self.expr(element),
            };
            exprs.push(id);
        }
        let kind = match hint {
            InitializerKind::Array => InitializerKind::Array,
            _ if has_members => InitializerKind::Object,
            _ => InitializerKind::Collection,
        };
        self.alloc(NodeKind::Initializer { kind, exprs }, span(node))
    }

    /// `new { A = 1, b.C }`: members become assignments of an object
    /// initializer.
    fn anonymous_object(&mut self, node: Cst<'_>) -> NodeId {
        let exprs = self.anonymous_members(&tokens(node));
        let children = tokens(node);
        let open = children
            .iter()
            .find(|c| c.kind() == "{")
            .map_or(node.start_byte(), |c| c.start_byte());
        let initializer = self.alloc(
            NodeKind::Initializer {
                kind: InitializerKind::Object,
                exprs,
            },
            Span::new(open, node.end_byte()),
        );
        self.alloc(
            NodeKind::ObjectCreation {
                ty: None,
                args: Vec::new(),
                initializer: Some(initializer),
            },
            span(node),
        )
    }

    fn anonymous_members(&mut self, children: &[Cst<'_>]) -> Vec<NodeId> {
        let mut exprs = Vec::new();
        let mut pending: Option<Cst<'_>> = None;
        for (i, child) in children.iter().enumerate() {
            if !child.is_named() {
                continue;
            }
            if child.kind() == "anonymous_object_member_declarator" {
                exprs.extend(self.anonymous_members(&tokens(*child)));
                continue;
            }
            let names_member = children
                .get(i + 1)
                .is_some_and(|next| !next.is_named() && next.kind() == "=");
            if names_member {
                pending = Some(*child);
                continue;
            }
            let right = self.expr(*child);
            let id = match pending.take() {
                Some(name) => {
                    let left = self.alloc(
                        NodeKind::Identifier {
                            name: self.ident(name),
                            type_args: Vec::new(),
                        },
                        span(name),
                    );
                    self.alloc(
                        NodeKind::Assignment {
                            op: AssignOp::Assign,
                            left,
                            right,
                        },
                        Span::new(name.start_byte(), child.end_byte()),
                    )
                }
                None => right,
            };
            exprs.push(id);
        }
        exprs
    }

    fn array_creation(&mut self, node: Cst<'_>) -> NodeId {
        let array_type = field(node, "type").or_else(|| child_of_kind(node, &["array_type"]));
        let mut ranks = Vec::new();
        let mut element = array_type;
        while let Some(current) = element.filter(|e| e.kind() == "array_type") {
            ranks.extend(
                named(current)
                    .into_iter()
                    .filter(|c| c.kind() == "array_rank_specifier"),
            );
            element = field(current, "type").or_else(|| {
                named(current)
                    .into_iter()
                    .find(|c| c.kind() != "array_rank_specifier")
            });
        }
        ranks.sort_by_key(|rank| rank.start_byte());
        let ty = element.map(|e| self.ty(e));
        let sizes = match ranks.first() {
            Some(rank) => named(*rank).into_iter().map(|size| self.expr(size)).collect(),
            None => Vec::new(),
        };
        let initializer = child_of_kind(node, &["initializer_expression"])
            .map(|init| self.initializer(init, InitializerKind::Array));
        self.alloc(
            NodeKind::ArrayCreation {
                ty,
                sizes,
                initializer,
            },
            span(node),
        )
    }
}
