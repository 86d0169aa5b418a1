//! Body binding.
//!
//! Walks member bodies with a scope stack, declares locals, and records for
//! each expression the symbol it refers to and its type. Overload
//! resolution is by argument count only; method type arguments are inferred
//! by matching argument types against parameter types through the base
//! list. Anything the binder cannot resolve is simply left unbound.

use std::collections::HashMap;

use super::declarations::declare_parameters;
use super::symbols::{Generics, SymbolTable};
use super::{Symbol, SymbolId, SymbolKind, TypeRef};
use crate::syntax::{
    AccessorKind, ArgumentModifier, AssignOp, BinaryOp, ConstructorInitializerKind,
    InitializerKind, LiteralKind, NodeId, NodeKind, ParameterModifier, SyntaxTree, TypeKind,
    TypeSyntax, UnaryOp,
};

/// Per-callable binding state saved across nested callables.
struct Frame {
    owner: Option<SymbolId>,
    return_type: Option<TypeRef>,
    method_params: Vec<String>,
    scope_depth: usize,
}

pub(super) struct Binder<'a> {
    table: &'a mut SymbolTable,
    tree: &'a SyntaxTree,
    declared: &'a mut HashMap<NodeId, SymbolId>,
    bound: &'a mut HashMap<NodeId, SymbolId>,
    types: &'a mut HashMap<NodeId, TypeRef>,
    current_type: Option<SymbolId>,
    type_params: Vec<String>,
    method_params: Vec<String>,
    /// Member or local function that owns declared locals.
    owner: Option<SymbolId>,
    return_type: Option<TypeRef>,
    scopes: Vec<HashMap<String, SymbolId>>,
    /// Receiver types of the enclosing `?.` chains.
    receivers: Vec<Option<TypeRef>>,
}

impl<'a> Binder<'a> {
    pub fn new(
        table: &'a mut SymbolTable,
        tree: &'a SyntaxTree,
        declared: &'a mut HashMap<NodeId, SymbolId>,
        bound: &'a mut HashMap<NodeId, SymbolId>,
        types: &'a mut HashMap<NodeId, TypeRef>,
    ) -> Self {
        Binder {
            table,
            tree,
            declared,
            bound,
            types,
            current_type: None,
            type_params: Vec::new(),
            method_params: Vec::new(),
            owner: None,
            return_type: None,
            scopes: Vec::new(),
            receivers: Vec::new(),
        }
    }

    pub fn bind_tree(&mut self) {
        let root = self.tree.root();
        self.bind_declarations(root);
    }

    fn kind(&self, id: NodeId) -> &'a NodeKind {
        let tree: &'a SyntaxTree = self.tree;
        &tree.node(id).kind
    }

    fn generics(&self) -> Generics<'_> {
        Generics {
            type_params: &self.type_params,
            method_params: &self.method_params,
        }
    }

    fn resolve(&self, ty: &TypeSyntax) -> Option<TypeRef> {
        self.table.resolve(ty, self.generics())
    }

    fn well_known(&self, full_name: &str) -> Option<TypeRef> {
        self.table.well_known(full_name, 0).map(TypeRef::named)
    }

    // ---- scopes ----

    fn enter(&mut self, owner: SymbolId, return_type: Option<TypeRef>, method_params: Vec<String>) -> Frame {
        let frame = Frame {
            owner: self.owner.replace(owner),
            return_type: std::mem::replace(&mut self.return_type, return_type),
            method_params: std::mem::replace(&mut self.method_params, method_params),
            scope_depth: self.scopes.len(),
        };
        self.scopes.push(HashMap::new());
        frame
    }

    fn leave(&mut self, frame: Frame) {
        self.scopes.truncate(frame.scope_depth);
        self.owner = frame.owner;
        self.return_type = frame.return_type;
        self.method_params = frame.method_params;
    }

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn insert_name(&mut self, name: &str, symbol: SymbolId) {
        if name == "_" {
            return;
        }
        if self.scopes.is_empty() {
            self.scopes.push(HashMap::new());
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), symbol);
        }
    }

    fn scope_params(&mut self, params: &[SymbolId]) {
        for param in params {
            let name = self.table.get(*param).name.clone();
            self.insert_name(&name, *param);
        }
    }

    fn lookup_local(&self, name: &str) -> Option<SymbolId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    fn add_local(&mut self, decl: NodeId, name: &str, ty: Option<TypeRef>, is_const: bool) -> SymbolId {
        let owner = self.owner;
        let id = self.table.add(SymbolKind::Local, name, |s| {
            s.container = owner;
            s.ty = ty;
            s.modifiers.is_const = is_const;
            s.declarations = vec![decl];
        });
        self.declared.insert(decl, id);
        self.insert_name(name, id);
        id
    }

    // ---- declarations ----

    fn bind_declarations(&mut self, node: NodeId) {
        match self.kind(node) {
            NodeKind::CompilationUnit { members } | NodeKind::Namespace { members, .. } => {
                for member in members {
                    self.bind_declarations(*member);
                }
            }
            NodeKind::TypeDecl { members, .. } => {
                let Some(ty) = self.declared.get(&node).copied() else {
                    return;
                };
                let saved_type = self.current_type.replace(ty);
                let saved_params = std::mem::replace(
                    &mut self.type_params,
                    self.table.get(ty).type_params.clone(),
                );
                for member in members {
                    self.bind_member(*member);
                }
                self.current_type = saved_type;
                self.type_params = saved_params;
            }
            _ => {}
        }
    }

    fn bind_member(&mut self, node: NodeId) {
        match self.kind(node) {
            NodeKind::TypeDecl { .. } => self.bind_declarations(node),
            NodeKind::Field { declarators, .. } => {
                for declarator in declarators {
                    let Some(field) = self.declared.get(declarator).copied() else {
                        continue;
                    };
                    if let NodeKind::VariableDeclarator {
                        initializer: Some(init),
                        ..
                    } = self.kind(*declarator)
                    {
                        let ty = self.table.get(field).ty.clone();
                        let frame = self.enter(field, None, Vec::new());
                        self.bind_expr(*init, ty.as_ref());
                        self.leave(frame);
                    }
                }
            }
            NodeKind::Property {
                accessors,
                expression_body,
                initializer,
                ..
            } => {
                let Some(prop) = self.declared.get(&node).copied() else {
                    return;
                };
                let info = self.table.get(prop);
                let ty = info.ty.clone();
                let params = info.params.clone();
                let value_param = info.value_param;
                let frame = self.enter(prop, ty.clone(), Vec::new());
                self.scope_params(&params);
                if let Some(body) = expression_body {
                    self.bind_expr(*body, ty.as_ref());
                }
                for accessor in accessors {
                    let NodeKind::Accessor {
                        kind,
                        body,
                        expression_body,
                        ..
                    } = self.kind(*accessor)
                    else {
                        continue;
                    };
                    self.push_scope();
                    let is_getter = *kind == AccessorKind::Get;
                    if !is_getter {
                        if let Some(value) = value_param {
                            self.insert_name("value", value);
                        }
                    }
                    self.return_type = if is_getter { ty.clone() } else { None };
                    self.bind_callable_body(*body, *expression_body);
                    self.pop_scope();
                }
                if let Some(init) = initializer {
                    self.bind_expr(*init, ty.as_ref());
                }
                self.leave(frame);
            }
            NodeKind::Method {
                modifiers,
                type_params,
                body,
                expression_body,
                ..
            } => {
                let Some(method) = self.declared.get(&node).copied() else {
                    return;
                };
                let info = self.table.get(method);
                let params = info.params.clone();
                let ret = info.ty.clone();
                let ret = if modifiers.is_async {
                    ret.and_then(|t| self.awaited(&t))
                } else {
                    ret
                };
                let frame = self.enter(method, ret, type_params.clone());
                self.scope_params(&params);
                self.bind_callable_body(*body, *expression_body);
                self.leave(frame);
            }
            NodeKind::Constructor {
                initializer,
                body,
                expression_body,
                ..
            } => {
                let Some(ctor) = self.declared.get(&node).copied() else {
                    return;
                };
                let params = self.table.get(ctor).params.clone();
                let frame = self.enter(ctor, None, Vec::new());
                self.scope_params(&params);
                if let Some(init) = initializer {
                    self.bind_constructor_initializer(*init);
                }
                self.bind_callable_body(*body, *expression_body);
                self.leave(frame);
            }
            _ => {}
        }
    }

    fn bind_callable_body(&mut self, body: Option<NodeId>, expression_body: Option<NodeId>) {
        if let Some(body) = body {
            self.bind_stmt(body);
        }
        if let Some(expr) = expression_body {
            let expected = self.return_type.clone();
            self.bind_expr(expr, expected.as_ref());
        }
    }

    fn bind_constructor_initializer(&mut self, init: NodeId) {
        let NodeKind::ConstructorInitializer { kind, args } = self.kind(init) else {
            return;
        };
        self.bind_args(args);
        let target = match kind {
            ConstructorInitializerKind::This => self.current_type,
            ConstructorInitializerKind::Base => self.base_type().and_then(|t| t.symbol()),
        };
        if let Some(ctor) = target.and_then(|t| self.constructor_for(t, args.len())) {
            self.bound.insert(init, ctor);
        }
    }

    fn constructor_for(&self, ty: SymbolId, arity: usize) -> Option<SymbolId> {
        let ctors: Vec<SymbolId> = self
            .table
            .get(ty)
            .members
            .iter()
            .copied()
            .filter(|m| {
                let info = self.table.get(*m);
                info.kind == SymbolKind::Constructor && !info.modifiers.is_static
            })
            .collect();
        self.pick_overload(&ctors, arity)
    }

    // ---- statements ----

    fn bind_stmt(&mut self, id: NodeId) {
        match self.kind(id) {
            NodeKind::Block { statements } => {
                self.push_scope();
                for statement in statements {
                    if matches!(self.kind(*statement), NodeKind::LocalFunction { .. }) {
                        self.declare_local_function(*statement);
                    }
                }
                for statement in statements {
                    self.bind_stmt(*statement);
                }
                self.pop_scope();
            }
            NodeKind::LocalDeclaration {
                is_const,
                ty,
                declarators,
                ..
            } => {
                let declared_ty = ty.as_ref().and_then(|t| self.resolve(t));
                for declarator in declarators {
                    let NodeKind::VariableDeclarator { name, initializer } = self.kind(*declarator)
                    else {
                        continue;
                    };
                    let init_ty = initializer.and_then(|init| self.bind_expr(init, declared_ty.as_ref()));
                    let local_ty = declared_ty.clone().or(init_ty);
                    self.add_local(*declarator, name, local_ty, *is_const);
                }
            }
            NodeKind::ExpressionStatement { expr } | NodeKind::Lock { expr, .. } => {
                self.bind_expr(*expr, None);
                if let NodeKind::Lock { body, .. } = self.kind(id) {
                    self.bind_stmt(*body);
                }
            }
            NodeKind::Return { expr } => {
                if let Some(expr) = expr {
                    let expected = self.return_type.clone();
                    self.bind_expr(*expr, expected.as_ref());
                }
            }
            NodeKind::YieldReturn { expr } => {
                let expected = self
                    .return_type
                    .as_ref()
                    .and_then(|t| self.table.element_type(t));
                self.bind_expr(*expr, expected.as_ref());
            }
            NodeKind::Throw { expr } => {
                if let Some(expr) = expr {
                    self.bind_expr(*expr, None);
                }
            }
            NodeKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.bind_expr(*condition, None);
                self.bind_nested(*then_branch);
                if let Some(other) = else_branch {
                    self.bind_nested(*other);
                }
            }
            NodeKind::While { condition, body, .. } => {
                self.bind_expr(*condition, None);
                self.bind_nested(*body);
            }
            NodeKind::For {
                initializers,
                condition,
                incrementors,
                body,
            } => {
                self.push_scope();
                for init in initializers {
                    if matches!(self.kind(*init), NodeKind::LocalDeclaration { .. }) {
                        self.bind_stmt(*init);
                    } else {
                        self.bind_expr(*init, None);
                    }
                }
                if let Some(condition) = condition {
                    self.bind_expr(*condition, None);
                }
                for step in incrementors {
                    self.bind_expr(*step, None);
                }
                self.bind_nested(*body);
                self.pop_scope();
            }
            NodeKind::ForEach {
                ty,
                name,
                collection,
                body,
            } => {
                let collection_ty = self.bind_expr(*collection, None);
                let element = ty
                    .as_ref()
                    .and_then(|t| self.resolve(t))
                    .or_else(|| collection_ty.and_then(|t| self.table.element_type(&t)));
                self.push_scope();
                self.add_local(id, name, element, false);
                self.bind_nested(*body);
                self.pop_scope();
            }
            NodeKind::Using {
                declaration,
                expr,
                body,
            } => {
                self.push_scope();
                if let Some(declaration) = declaration {
                    self.bind_stmt(*declaration);
                }
                if let Some(expr) = expr {
                    self.bind_expr(*expr, None);
                }
                self.bind_nested(*body);
                self.pop_scope();
            }
            NodeKind::Try {
                block,
                catches,
                finally,
            } => {
                self.bind_stmt(*block);
                for catch in catches {
                    self.bind_stmt(*catch);
                }
                if let Some(finally) = finally {
                    self.bind_stmt(*finally);
                }
            }
            NodeKind::Catch {
                ty,
                name,
                filter,
                body,
            } => {
                self.push_scope();
                if let Some(name) = name {
                    let caught = ty.as_ref().and_then(|t| self.resolve(t));
                    self.add_local(id, name, caught, false);
                }
                if let Some(filter) = filter {
                    self.bind_expr(*filter, None);
                }
                self.bind_stmt(*body);
                self.pop_scope();
            }
            NodeKind::Switch { expr, sections } => {
                self.bind_expr(*expr, None);
                for section in sections {
                    self.bind_stmt(*section);
                }
            }
            NodeKind::SwitchSection { labels, statements } => {
                self.push_scope();
                for label in labels {
                    if let NodeKind::CaseLabel {
                        value,
                        ty,
                        designation,
                    } = self.kind(*label)
                    {
                        if let Some(value) = value {
                            self.bind_expr(*value, None);
                        }
                        if let Some(name) = designation {
                            let case_ty = ty.as_ref().and_then(|t| self.resolve(t));
                            self.add_local(*label, name, case_ty, false);
                        }
                    }
                }
                for statement in statements {
                    self.bind_stmt(*statement);
                }
                self.pop_scope();
            }
            NodeKind::LocalFunction {
                modifiers,
                type_params,
                body,
                expression_body,
                ..
            } => {
                if !self.declared.contains_key(&id) {
                    self.declare_local_function(id);
                }
                let Some(function) = self.declared.get(&id).copied() else {
                    return;
                };
                let info = self.table.get(function);
                let params = info.params.clone();
                let ret = info.ty.clone();
                let ret = if modifiers.is_async {
                    ret.and_then(|t| self.awaited(&t))
                } else {
                    ret
                };
                let frame = self.enter(function, ret, type_params.clone());
                self.scope_params(&params);
                self.bind_callable_body(*body, *expression_body);
                self.leave(frame);
            }
            NodeKind::Jump { .. } => {}
            _ => {
                self.bind_expr(id, None);
            }
        }
    }

    /// Embedded statement of `if`/loops; gets its own scope when it is not
    /// a block.
    fn bind_nested(&mut self, id: NodeId) {
        self.push_scope();
        self.bind_stmt(id);
        self.pop_scope();
    }

    fn declare_local_function(&mut self, id: NodeId) {
        let NodeKind::LocalFunction {
            modifiers,
            return_type,
            name,
            type_params,
            params,
            ..
        } = self.kind(id)
        else {
            return;
        };
        let generics = Generics {
            type_params: &self.type_params,
            method_params: type_params,
        };
        let ret = self.table.resolve(return_type, generics);
        let owner = self.owner;
        let function = self.table.add(SymbolKind::LocalFunction, name, |s| {
            s.container = owner;
            s.ty = ret;
            s.modifiers = *modifiers;
            s.type_params = type_params.clone();
            s.declarations = vec![id];
        });
        let generics = Generics {
            type_params: &self.type_params,
            method_params: type_params,
        };
        let symbols = declare_parameters(self.table, self.declared, self.tree, function, params, generics);
        self.table.get_mut(function).params = symbols;
        self.declared.insert(id, function);
        self.insert_name(name, function);
    }

    // ---- expressions ----

    fn bind_expr(&mut self, id: NodeId, expected: Option<&TypeRef>) -> Option<TypeRef> {
        let ty = self.expr_type(id, expected);
        if let Some(ty) = &ty {
            self.types.insert(id, ty.clone());
        }
        ty
    }

    fn expr_type(&mut self, id: NodeId, expected: Option<&TypeRef>) -> Option<TypeRef> {
        match self.kind(id) {
            NodeKind::Literal { kind, text } => self.literal_type(*kind, text),
            NodeKind::Identifier { name, type_args } => self.bind_identifier(id, name, type_args.len()),
            NodeKind::This => self.this_type(),
            NodeKind::Base => self.base_type(),
            NodeKind::PredefinedType { ty } => {
                let resolved = self.resolve(ty);
                if let Some(symbol) = resolved.as_ref().and_then(TypeRef::symbol) {
                    self.bound.insert(id, symbol);
                }
                resolved
            }
            NodeKind::MemberAccess { expr, name, .. } => {
                let receiver = self.bind_expr(*expr, None).filter(|t| t.symbol().is_some());
                match receiver {
                    Some(receiver) => self.bind_member_on(id, Some(&receiver), name),
                    None => self.type_by_text(id),
                }
            }
            NodeKind::ConditionalAccess {
                expr,
                when_not_null,
            } => {
                let receiver = self.bind_expr(*expr, None);
                self.receivers.push(receiver);
                let ty = self.bind_expr(*when_not_null, expected);
                self.receivers.pop();
                ty
            }
            NodeKind::MemberBinding { name, .. } => {
                let receiver = self.receivers.last().cloned().flatten();
                self.bind_member_on(id, receiver.as_ref(), name)
            }
            NodeKind::ElementBinding { args } => {
                self.bind_args(args);
                let receiver = self.receivers.last().cloned().flatten();
                self.bind_indexer(id, receiver.as_ref())
            }
            NodeKind::Invocation { expr, args } => self.bind_invocation(id, *expr, args),
            NodeKind::Argument { expr, .. } => self.bind_expr(*expr, expected),
            NodeKind::ElementAccess { expr, args } => {
                let receiver = self.bind_expr(*expr, None);
                self.bind_args(args);
                self.bind_indexer(id, receiver.as_ref())
            }
            NodeKind::ObjectCreation {
                ty,
                args,
                initializer,
            } => {
                let created = match ty {
                    Some(ty) => self.resolve(ty),
                    None => expected.cloned(),
                };
                self.bind_args(args);
                if let Some(ctor) = created
                    .as_ref()
                    .and_then(TypeRef::symbol)
                    .and_then(|t| self.constructor_for(t, args.len()))
                {
                    self.bound.insert(id, ctor);
                }
                if let Some(init) = initializer {
                    self.bind_object_initializer(*init, created.as_ref());
                }
                created
            }
            NodeKind::ArrayCreation {
                ty,
                sizes,
                initializer,
            } => {
                for size in sizes {
                    self.bind_expr(*size, None);
                }
                let array = match (ty.as_ref().and_then(|t| self.resolve(t)), self.table.array()) {
                    (Some(element), Some(array)) => Some(TypeRef::Named {
                        symbol: array,
                        args: vec![element],
                    }),
                    _ => expected.cloned(),
                };
                if let Some(init) = initializer {
                    self.bind_expr(*init, array.as_ref());
                }
                array
            }
            NodeKind::Initializer { exprs, .. } => {
                let element = expected.and_then(|t| self.table.element_type(t));
                for expr in exprs {
                    self.bind_expr(*expr, element.as_ref());
                }
                expected.cloned()
            }
            NodeKind::Assignment { op, left, right } => {
                let left_ty = self.bind_expr(*left, None);
                let right_ty = self.bind_expr(*right, left_ty.as_ref());
                match op {
                    AssignOp::Assign | AssignOp::Coalesce => left_ty.or(right_ty),
                    _ => left_ty,
                }
            }
            NodeKind::Binary { op, left, right } => {
                let coalesce = *op == BinaryOp::Coalesce;
                let left_ty = self.bind_expr(*left, if coalesce { expected } else { None });
                let right_expected = if coalesce {
                    left_ty.as_ref().or(expected)
                } else {
                    None
                };
                let right_ty = self.bind_expr(*right, right_expected);
                self.binary_type(*op, left_ty, right_ty)
            }
            NodeKind::Conditional {
                condition,
                when_true,
                when_false,
            } => {
                self.bind_expr(*condition, None);
                let true_ty = self.bind_expr(*when_true, expected);
                let false_ty = self.bind_expr(*when_false, expected.or(true_ty.as_ref()));
                true_ty.or(false_ty)
            }
            NodeKind::SwitchExpression { governing, arms } => {
                self.bind_expr(*governing, None);
                let mut result = None;
                for arm in arms {
                    let ty = self.bind_expr(*arm, expected);
                    if result.is_none() {
                        result = ty;
                    }
                }
                result.or_else(|| expected.cloned())
            }
            NodeKind::Prefix { op, operand } => {
                let ty = self.bind_expr(*operand, None);
                if *op == UnaryOp::Not {
                    self.well_known("System.Boolean")
                } else {
                    ty
                }
            }
            NodeKind::Postfix { operand, .. } => self.bind_expr(*operand, expected),
            NodeKind::Cast { ty, expr } | NodeKind::As { expr, ty } => {
                self.bind_expr(*expr, None);
                self.resolve(ty)
            }
            NodeKind::Is {
                expr,
                ty,
                designation,
                value,
                ..
            } => {
                let operand = self.bind_expr(*expr, None);
                if let Some(value) = value {
                    self.bind_expr(*value, None);
                }
                if let Some(name) = designation {
                    let local_ty = ty.as_ref().and_then(|t| self.resolve(t)).or(operand);
                    self.add_local(id, name, local_ty, false);
                }
                self.well_known("System.Boolean")
            }
            NodeKind::Parenthesized { expr } => self.bind_expr(*expr, expected),
            NodeKind::Tuple { elements } => {
                for element in elements {
                    self.bind_expr(*element, None);
                }
                self.well_known("System.ValueTuple")
            }
            NodeKind::Await { expr } => {
                let awaitable = self.bind_expr(*expr, None);
                awaitable.and_then(|t| self.awaited(&t))
            }
            NodeKind::Lambda { params, body, .. } => {
                self.bind_lambda(params, *body);
                None
            }
            NodeKind::TypeOf { .. } => self.well_known("System.Type"),
            NodeKind::Default { ty } => match ty {
                Some(ty) => self.resolve(ty),
                None => expected.cloned(),
            },
            NodeKind::NameOf { .. } => self.well_known("System.String"),
            NodeKind::DeclarationExpression { ty, name } => {
                let declared_ty = ty.as_ref().and_then(|t| self.resolve(t));
                self.add_local(id, name, declared_ty.clone(), false);
                declared_ty
            }
            NodeKind::ThrowExpression { expr } => {
                self.bind_expr(*expr, None);
                None
            }
            _ => None,
        }
    }

    fn literal_type(&self, kind: LiteralKind, text: &str) -> Option<TypeRef> {
        match kind {
            LiteralKind::Null => None,
            LiteralKind::Bool => self.well_known("System.Boolean"),
            LiteralKind::String => self.well_known("System.String"),
            LiteralKind::Char => self.well_known("System.Char"),
            LiteralKind::Number => {
                let hex = text.starts_with("0x") || text.starts_with("0X");
                let real = !hex
                    && (text.contains('.')
                        || text.ends_with(['f', 'F', 'd', 'D', 'm', 'M']));
                if real {
                    self.well_known("System.Double")
                } else {
                    self.well_known("System.Int32")
                }
            }
        }
    }

    fn binary_type(&self, op: BinaryOp, left: Option<TypeRef>, right: Option<TypeRef>) -> Option<TypeRef> {
        match op {
            BinaryOp::Coalesce => left.or(right),
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Gt
            | BinaryOp::Le
            | BinaryOp::Ge
            | BinaryOp::LogicalAnd
            | BinaryOp::LogicalOr => self.well_known("System.Boolean"),
            BinaryOp::Add => {
                let string = self.well_known("System.String");
                if string.is_some() && (left == string || right == string) {
                    string
                } else {
                    left.or(right)
                }
            }
            _ => left.or(right),
        }
    }

    /// `Task<T>` and `ValueTask<T>` unwrap to `T`, plain tasks to nothing.
    fn awaited(&self, ty: &TypeRef) -> Option<TypeRef> {
        let symbol = ty.symbol()?;
        let generic = ["System.Threading.Tasks.Task", "System.Threading.Tasks.ValueTask"];
        if generic
            .iter()
            .any(|name| self.table.well_known(name, 1) == Some(symbol))
        {
            return ty.args().first().cloned();
        }
        if generic
            .iter()
            .any(|name| self.table.well_known(name, 0) == Some(symbol))
        {
            return None;
        }
        Some(ty.clone())
    }

    fn this_type(&self) -> Option<TypeRef> {
        let ty = self.current_type?;
        let arity = self.table.get(ty).type_params.len();
        Some(TypeRef::Named {
            symbol: ty,
            args: (0..arity).map(TypeRef::Parameter).collect(),
        })
    }

    fn base_type(&self) -> Option<TypeRef> {
        let ty = self.current_type?;
        self.table
            .get(ty)
            .bases
            .iter()
            .find(|base| {
                base.symbol().is_some_and(|b| {
                    self.table.get(b).type_kind != Some(TypeKind::Interface)
                })
            })
            .cloned()
            .or_else(|| self.table.object().map(TypeRef::named))
    }

    /// Dotted expression text naming a type, `System.IO.File`.
    fn type_by_text(&mut self, id: NodeId) -> Option<TypeRef> {
        if !matches!(
            self.kind(id),
            NodeKind::Identifier { .. } | NodeKind::MemberAccess { .. }
        ) {
            return None;
        }
        let text: String = self
            .tree
            .text(id)
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let ty = self.table.well_known(&text, 0)?;
        self.bound.insert(id, ty);
        Some(TypeRef::named(ty))
    }

    fn bind_identifier(&mut self, id: NodeId, name: &str, arity: usize) -> Option<TypeRef> {
        if let Some(local) = self.lookup_local(name) {
            self.bound.insert(id, local);
            return self.table.get(local).ty.clone();
        }
        if let Some(member) = self.lookup_member(name, |s| s.kind != SymbolKind::Constructor) {
            self.bound.insert(id, member);
            if self.table.get(member).kind == SymbolKind::Type {
                return Some(TypeRef::named(member));
            }
            let receiver = self.this_type();
            return self.member_type(receiver.as_ref(), member, &[]);
        }
        let ty = self.table.lookup_type(name, arity)?;
        self.bound.insert(id, ty);
        Some(TypeRef::named(ty))
    }

    /// Members visible by simple name: the current type, its bases, then
    /// enclosing types.
    fn lookup_member(&self, name: &str, pred: impl Fn(&Symbol) -> bool) -> Option<SymbolId> {
        self.member_candidates(name, pred).into_iter().next()
    }

    fn member_candidates(&self, name: &str, pred: impl Fn(&Symbol) -> bool) -> Vec<SymbolId> {
        let mut current = self.current_type;
        while let Some(ty) = current {
            let found: Vec<SymbolId> = self
                .table
                .members_named(ty, name)
                .into_iter()
                .filter(|m| pred(self.table.get(*m)))
                .collect();
            if !found.is_empty() {
                return found;
            }
            current = self
                .table
                .get(ty)
                .container
                .filter(|c| self.table.get(*c).kind == SymbolKind::Type);
        }
        Vec::new()
    }

    fn bind_member_on(&mut self, id: NodeId, receiver: Option<&TypeRef>, name: &str) -> Option<TypeRef> {
        let symbol = receiver.and_then(TypeRef::symbol)?;
        let member = self
            .table
            .members_named(symbol, name)
            .into_iter()
            .find(|m| self.table.get(*m).kind != SymbolKind::Constructor)?;
        self.bound.insert(id, member);
        if self.table.get(member).kind == SymbolKind::Type {
            return Some(TypeRef::named(member));
        }
        self.member_type(receiver, member, &[])
    }

    fn bind_indexer(&mut self, id: NodeId, receiver: Option<&TypeRef>) -> Option<TypeRef> {
        let symbol = receiver.and_then(TypeRef::symbol)?;
        let indexer = self.table.members_named(symbol, "this[]").into_iter().next()?;
        self.bound.insert(id, indexer);
        self.member_type(receiver, indexer, &[])
    }

    /// Type of `member` seen through `receiver`, with the receiver's and the
    /// method's type arguments substituted.
    fn member_type(&self, receiver: Option<&TypeRef>, member: SymbolId, method_args: &[TypeRef]) -> Option<TypeRef> {
        let ty = self.table.get(member).ty.clone()?;
        Some(self.instantiate(&ty, receiver, member, method_args))
    }

    fn instantiate(&self, ty: &TypeRef, receiver: Option<&TypeRef>, member: SymbolId, method_args: &[TypeRef]) -> TypeRef {
        let container = self.table.get(member).container;
        let type_args = match (receiver, container) {
            (Some(receiver), Some(container)) => self
                .table
                .as_base(receiver, container)
                .map(|view| view.args().to_vec())
                .unwrap_or_default(),
            _ => Vec::new(),
        };
        let keep_type_params = type_args.is_empty() && receiver.is_none();
        if keep_type_params && method_args.is_empty() {
            return ty.clone();
        }
        ty.substitute(&type_args, method_args)
    }

    fn bind_args(&mut self, args: &[NodeId]) -> Vec<Option<TypeRef>> {
        args.iter().map(|arg| self.bind_expr(*arg, None)).collect()
    }

    fn accepts(&self, callable: SymbolId, arity: usize) -> bool {
        let params: Vec<&Symbol> = self
            .table
            .get(callable)
            .params
            .iter()
            .map(|p| self.table.get(*p))
            .collect();
        Symbol::accepts_arity(&params, arity)
    }

    fn pick_overload(&self, candidates: &[SymbolId], arity: usize) -> Option<SymbolId> {
        candidates
            .iter()
            .copied()
            .find(|c| self.accepts(*c, arity))
            .or_else(|| (candidates.len() == 1).then(|| candidates[0]))
    }

    fn bind_invocation(&mut self, id: NodeId, callee: NodeId, args: &[NodeId]) -> Option<TypeRef> {
        let arg_types = self.bind_args(args);
        let is_method = |s: &Symbol| s.kind == SymbolKind::Method;

        let (name, type_args, receiver, candidates) = match self.kind(callee) {
            NodeKind::Identifier { name, type_args } => {
                if let Some(local) = self.lookup_local(name) {
                    self.bound.insert(callee, local);
                    let info = self.table.get(local);
                    let ty = info.ty.clone();
                    if info.kind == SymbolKind::LocalFunction {
                        self.bound.insert(id, local);
                        let receiver = None;
                        return self.finish_call(id, local, args, &arg_types, type_args, receiver, false);
                    }
                    if let Some(t) = &ty {
                        self.types.insert(callee, t.clone());
                    }
                    return self.bind_delegate_call(id, ty.as_ref());
                }
                let methods = self.member_candidates(name, is_method);
                if methods.is_empty() {
                    if let Some(member) = self.lookup_member(name, |s| s.kind != SymbolKind::Constructor) {
                        self.bound.insert(callee, member);
                        let receiver = self.this_type();
                        let ty = self.member_type(receiver.as_ref(), member, &[]);
                        return self.bind_delegate_call(id, ty.as_ref());
                    }
                }
                (name.as_str(), type_args, self.this_type(), methods)
            }
            NodeKind::MemberAccess {
                expr,
                name,
                type_args,
            } => {
                let receiver = self
                    .bind_expr(*expr, None)
                    .filter(|t| t.symbol().is_some())
                    .or_else(|| self.type_by_text(*expr));
                let methods = self.methods_on(receiver.as_ref(), name);
                (name.as_str(), type_args, receiver, methods)
            }
            NodeKind::MemberBinding { name, type_args } => {
                let receiver = self.receivers.last().cloned().flatten();
                let methods = self.methods_on(receiver.as_ref(), name);
                (name.as_str(), type_args, receiver, methods)
            }
            _ => {
                let ty = self.bind_expr(callee, None);
                return self.bind_delegate_call(id, ty.as_ref());
            }
        };

        if let Some(method) = self.pick_overload(&candidates, args.len()) {
            self.bound.insert(id, method);
            self.bound.insert(callee, method);
            return self.finish_call(id, method, args, &arg_types, type_args, receiver, false);
        }

        // extension method call on an explicit receiver
        let receiver = receiver.filter(|_| !matches!(self.kind(callee), NodeKind::Identifier { .. }))?;
        let extensions = self.extension_candidates(name, &receiver);
        let method = self.pick_overload(&extensions, args.len() + 1)?;
        self.bound.insert(id, method);
        self.bound.insert(callee, method);
        self.finish_call(id, method, args, &arg_types, type_args, Some(receiver), true)
    }

    fn methods_on(&self, receiver: Option<&TypeRef>, name: &str) -> Vec<SymbolId> {
        let Some(symbol) = receiver.and_then(TypeRef::symbol) else {
            return Vec::new();
        };
        self.table
            .members_named(symbol, name)
            .into_iter()
            .filter(|m| self.table.get(*m).kind == SymbolKind::Method)
            .collect()
    }

    fn extension_candidates(&self, name: &str, receiver: &TypeRef) -> Vec<SymbolId> {
        let mut found: Vec<SymbolId> = self
            .table
            .iter()
            .filter(|s| s.is_extension && s.kind == SymbolKind::Method && s.name == name)
            .filter(|s| {
                let first = s.params.first().and_then(|p| self.table.get(*p).ty.as_ref());
                match first {
                    Some(TypeRef::Named { symbol, .. }) => {
                        self.table.as_base(receiver, *symbol).is_some()
                    }
                    Some(_) => true,
                    None => false,
                }
            })
            .map(|s| s.id)
            .collect();
        // source extensions win over catalog ones
        found.sort_by_key(|id| self.table.get(*id).is_external());
        found
    }

    fn bind_delegate_call(&mut self, id: NodeId, delegate: Option<&TypeRef>) -> Option<TypeRef> {
        let symbol = delegate.and_then(TypeRef::symbol)?;
        let invoke = self.table.members_named(symbol, "Invoke").into_iter().next()?;
        self.bound.insert(id, invoke);
        self.member_type(delegate, invoke, &[])
    }

    /// Infer method type arguments, type `out var` locals and compute the
    /// call's result type.
    #[allow(clippy::too_many_arguments)]
    fn finish_call(
        &mut self,
        id: NodeId,
        method: SymbolId,
        args: &[NodeId],
        arg_types: &[Option<TypeRef>],
        type_args: &[TypeSyntax],
        receiver: Option<TypeRef>,
        extension_call: bool,
    ) -> Option<TypeRef> {
        let info = self.table.get(method);
        let params = info.params.clone();
        let arity = info.type_params.len();
        let offset = usize::from(extension_call);

        let method_args: Vec<TypeRef> = if !type_args.is_empty() {
            type_args
                .iter()
                .map(|t| self.resolve(t).unwrap_or(TypeRef::Unresolved))
                .collect()
        } else if arity == 0 {
            Vec::new()
        } else {
            let mut inferred = vec![None; arity];
            if extension_call {
                if let (Some(first), Some(receiver)) = (params.first(), receiver.as_ref()) {
                    if let Some(param_ty) = &self.table.get(*first).ty {
                        self.unify(param_ty, receiver, &mut inferred);
                    }
                }
            }
            for (i, arg) in args.iter().enumerate() {
                let Some(param_ty) = params.get(i + offset).and_then(|p| self.table.get(*p).ty.as_ref()) else {
                    continue;
                };
                match arg_types.get(i).cloned().flatten() {
                    Some(arg_ty) => self.unify(param_ty, &arg_ty, &mut inferred),
                    None => {
                        // `() => x` against `Func<.., TResult>`
                        if let (Some(result), Some(last)) = (self.lambda_result(*arg), param_ty.args().last()) {
                            self.unify(last, &result, &mut inferred);
                        }
                    }
                }
            }
            inferred
                .into_iter()
                .map(|t| t.unwrap_or(TypeRef::Unresolved))
                .collect()
        };

        // the receiver of an extension call is an argument, not the
        // instance the method's container is seen through
        let instance = if extension_call { None } else { receiver.as_ref() };
        self.type_out_locals(method, args, offset, instance, &method_args);
        let ret = self.member_type(instance, method, &method_args);
        log::trace!(
            "bound call {} to {}",
            self.tree.text(id).lines().next().unwrap_or_default(),
            self.table.get(method).name
        );
        ret
    }

    fn lambda_result(&self, arg: NodeId) -> Option<TypeRef> {
        let expr = match self.kind(arg) {
            NodeKind::Argument { expr, .. } => *expr,
            _ => arg,
        };
        match self.kind(expr) {
            NodeKind::Lambda { body, .. } if !matches!(self.kind(*body), NodeKind::Block { .. }) => {
                self.types.get(body).cloned()
            }
            _ => None,
        }
    }

    fn unify(&self, param: &TypeRef, arg: &TypeRef, inferred: &mut [Option<TypeRef>]) {
        match param {
            TypeRef::MethodParameter(i) => {
                if let Some(slot) = inferred.get_mut(*i) {
                    if slot.is_none() && arg.is_resolved() {
                        *slot = Some(arg.clone());
                    }
                }
            }
            TypeRef::Named { symbol, args } if !args.is_empty() => {
                if let Some(view) = self.table.as_base(arg, *symbol) {
                    for (p, a) in args.iter().zip(view.args()) {
                        self.unify(p, a, inferred);
                    }
                }
            }
            _ => {}
        }
    }

    /// `out var x` takes the type of the parameter it is passed to.
    fn type_out_locals(
        &mut self,
        method: SymbolId,
        args: &[NodeId],
        offset: usize,
        receiver: Option<&TypeRef>,
        method_args: &[TypeRef],
    ) {
        for (i, arg) in args.iter().enumerate() {
            let NodeKind::Argument {
                name,
                modifier: ArgumentModifier::Out,
                expr,
            } = self.kind(*arg)
            else {
                continue;
            };
            if !matches!(self.kind(*expr), NodeKind::DeclarationExpression { ty: None, .. }) {
                continue;
            }
            let Some(local) = self.declared.get(expr).copied() else {
                continue;
            };
            let Some(param) = parameter_for(self.table, method, i + offset, name.as_deref()) else {
                continue;
            };
            let Some(param_ty) = self.table.get(param).ty.clone() else {
                continue;
            };
            let ty = self.instantiate(&param_ty, receiver, method, method_args);
            self.types.insert(*expr, ty.clone());
            self.types.insert(*arg, ty.clone());
            self.table.get_mut(local).ty = Some(ty);
        }
    }

    fn bind_object_initializer(&mut self, init: NodeId, created: Option<&TypeRef>) {
        let NodeKind::Initializer { kind, exprs } = self.kind(init) else {
            self.bind_expr(init, created);
            return;
        };
        if *kind != InitializerKind::Object {
            self.bind_expr(init, created);
            return;
        }
        for expr in exprs {
            let NodeKind::Assignment { left, right, .. } = self.kind(*expr) else {
                self.bind_expr(*expr, None);
                continue;
            };
            let member_ty = match self.kind(*left) {
                NodeKind::Identifier { name, .. } => self.bind_member_on(*left, created, name),
                NodeKind::ElementBinding { args } => {
                    self.bind_args(args);
                    self.bind_indexer(*left, created)
                }
                _ => self.bind_expr(*left, None),
            };
            if let Some(ty) = &member_ty {
                self.types.insert(*left, ty.clone());
            }
            if matches!(self.kind(*right), NodeKind::Initializer { .. }) {
                self.bind_object_initializer(*right, member_ty.as_ref());
            } else {
                self.bind_expr(*right, member_ty.as_ref());
            }
        }
    }

    fn bind_lambda(&mut self, params: &[NodeId], body: NodeId) {
        let Some(owner) = self.owner.or(self.current_type) else {
            return;
        };
        self.push_scope();
        let generics = Generics {
            type_params: &self.type_params,
            method_params: &self.method_params,
        };
        let symbols = declare_parameters(self.table, self.declared, self.tree, owner, params, generics);
        self.scope_params(&symbols);
        let saved = self.return_type.take();
        if matches!(self.kind(body), NodeKind::Block { .. }) {
            self.bind_stmt(body);
        } else {
            self.bind_expr(body, None);
        }
        self.return_type = saved;
        self.pop_scope();
    }
}

/// Parameter an argument binds to: by name when named, else by position,
/// with trailing arguments collected by a `params` array.
pub(crate) fn parameter_for(
    table: &SymbolTable,
    callable: SymbolId,
    index: usize,
    name: Option<&str>,
) -> Option<SymbolId> {
    let params = &table.get(callable).params;
    if let Some(name) = name {
        return params.iter().copied().find(|p| table.get(*p).name == name);
    }
    params.get(index).copied().or_else(|| {
        params
            .last()
            .copied()
            .filter(|p| table.get(*p).param_modifier == ParameterModifier::Params)
    })
}

#[cfg(test)]
mod tests {
    use crate::semantic::{Compilation, SemanticModel, SymbolKind, TypeRef};
    use crate::syntax::{NodeId, NodeKind};

    fn compile(source: &str) -> Compilation {
        Compilation::from_sources(vec![("t.cs", source)]).unwrap()
    }

    fn find(model: &Compilation, pred: impl Fn(&NodeKind, &str) -> bool) -> NodeId {
        let tree = &model.trees()[0];
        tree.node_ids()
            .find(|id| pred(&tree.node(*id).kind, tree.text(*id)))
            .unwrap()
    }

    fn type_name(model: &Compilation, ty: Option<TypeRef>) -> String {
        let symbol = ty.and_then(|t| t.symbol()).unwrap();
        model.full_name(symbol)
    }

    #[test]
    fn binds_fields_locals_and_parameters() {
        let model = compile(
            "using System.IO;
             class C {
                 private Stream _s;
                 void M(Stream p) { var x = p; _s = x; }
             }",
        );
        let assignment = find(&model, |k, _| matches!(k, NodeKind::Assignment { .. }));
        let NodeKind::Assignment { left, right, .. } = model.kind(assignment) else {
            unreachable!()
        };
        let field = model.symbol(*left).unwrap();
        assert_eq!(model.symbol_info(field).kind, SymbolKind::Field);
        let local = model.symbol(*right).unwrap();
        assert_eq!(model.symbol_info(local).kind, SymbolKind::Local);
        assert_eq!(type_name(&model, model.type_of(*right)), "System.IO.Stream");
    }

    #[test]
    fn binds_static_factory_and_infers_await() {
        let model = compile(
            "using System.IO; using System.Net.Http; using System.Threading.Tasks;
             class C {
                 async Task<Stream> M(HttpClient client) {
                     var file = File.OpenRead(\"a\");
                     var response = await client.GetAsync(\"u\").ConfigureAwait(false);
                     return file;
                 }
             }",
        );
        let open = find(&model, |k, t| matches!(k, NodeKind::Invocation { .. }) && t.starts_with("File.OpenRead"));
        let method = model.symbol(open).unwrap();
        assert_eq!(model.full_name(method), "System.IO.File.OpenRead");
        assert_eq!(type_name(&model, model.type_of(open)), "System.IO.FileStream");

        let awaited = find(&model, |k, _| matches!(k, NodeKind::Await { .. }));
        assert_eq!(
            type_name(&model, model.type_of(awaited)),
            "System.Net.Http.HttpResponseMessage"
        );
    }

    #[test]
    fn resolves_generic_indexers_and_extensions() {
        let model = compile(
            "using System.IO; using System.Linq; using System.Collections.Generic;
             class C {
                 Dictionary<int, Stream> _map;
                 List<Stream> _list;
                 void M() { var a = _map[1]; var b = _list.First(); }
             }",
        );
        let index = find(&model, |k, _| matches!(k, NodeKind::ElementAccess { .. }));
        assert_eq!(type_name(&model, model.type_of(index)), "System.IO.Stream");
        let indexer = model.symbol(index).unwrap();
        assert_eq!(model.symbol_info(indexer).name, "this[]");

        let first = find(&model, |k, _| matches!(k, NodeKind::Invocation { .. }));
        assert_eq!(model.full_name(model.symbol(first).unwrap()), "System.Linq.Enumerable.First");
        assert_eq!(type_name(&model, model.type_of(first)), "System.IO.Stream");
    }

    #[test]
    fn target_typed_new_and_out_var() {
        let model = compile(
            "using System.IO; using System.Collections.Generic;
             class C {
                 MemoryStream _m = new();
                 void M(Dictionary<string, Stream> map) {
                     if (map.TryGetValue(\"k\", out var found)) { }
                 }
             }",
        );
        let creation = find(&model, |k, _| matches!(k, NodeKind::ObjectCreation { .. }));
        assert_eq!(type_name(&model, model.type_of(creation)), "System.IO.MemoryStream");
        let ctor = model.symbol(creation).unwrap();
        assert_eq!(model.symbol_info(ctor).kind, SymbolKind::Constructor);

        let decl = find(&model, |k, _| matches!(k, NodeKind::DeclarationExpression { .. }));
        let local = model.declared_symbol(decl).unwrap();
        let ty = model.symbol_info(local).ty.clone();
        assert_eq!(type_name(&model, ty), "System.IO.Stream");
    }

    #[test]
    fn setter_value_and_object_initializer_members() {
        let model = compile(
            "using System.IO;
             class Holder { public Stream S { get; set; } }
             class C {
                 Stream _s;
                 Stream P { get => _s; set { _s = value; } }
                 Holder Make(Stream s) => new Holder { S = s };
             }",
        );
        let value = find(&model, |k, _| matches!(k, NodeKind::Identifier { name, .. } if name == "value"));
        let symbol = model.symbol(value).unwrap();
        assert_eq!(model.symbol_info(symbol).kind, SymbolKind::Parameter);
        assert_eq!(model.symbol_info(symbol).name, "value");

        let left = find(&model, |k, t| matches!(k, NodeKind::Identifier { .. }) && t == "S");
        let member = model.symbol(left).unwrap();
        assert_eq!(model.full_name(member), "Holder.S");
    }

    #[test]
    fn conditional_access_binds_member_on_receiver() {
        let model = compile(
            "using System.IO;
             class C { Stream _s; void M() { _s?.Dispose(); } }",
        );
        let binding = find(&model, |k, _| matches!(k, NodeKind::MemberBinding { .. }));
        let method = model.symbol(binding).unwrap();
        assert_eq!(model.full_name(method), "System.IO.Stream.Dispose");
    }

    #[test]
    fn local_functions_are_visible_before_declaration() {
        let model = compile(
            "class C { int M() { return Local(); int Local() => 1; } }",
        );
        let call = find(&model, |k, _| matches!(k, NodeKind::Invocation { .. }));
        let function = model.symbol(call).unwrap();
        assert_eq!(model.symbol_info(function).kind, SymbolKind::LocalFunction);
    }
}
