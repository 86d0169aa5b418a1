//! Semantic facade over parsed syntax trees.
//!
//! Analyses consume the compilation only through [`SemanticModel`]: the
//! symbol bound to an expression, the symbol a declaration introduces, the
//! type of an expression, and enumeration of all trees. [`Compilation`] is
//! the concrete implementation built from source files by the binder.

pub mod binder;
pub mod catalog;
pub mod compilation;
pub mod declarations;
pub mod symbols;

use serde::Serialize;

use crate::syntax::{
    Accessibility, Modifiers, Node, NodeId, NodeKind, ParameterModifier, SyntaxTree, TypeKind,
};

pub use compilation::Compilation;
pub use symbols::SymbolTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SymbolId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Type,
    Field,
    Property,
    Method,
    Constructor,
    Parameter,
    Local,
    LocalFunction,
}

/// Built-in knowledge about whether a member hands its caller ownership of
/// the value it returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Ownership {
    #[default]
    Unspecified,
    /// Always returns a new instance the caller must dispose.
    Created,
    /// Returns an instance owned elsewhere (cache, collection, parent).
    NotOwned,
}

/// A resolved type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Named { symbol: SymbolId, args: Vec<TypeRef> },
    /// Type parameter of the containing type, by position.
    Parameter(usize),
    /// Type parameter of the containing method, by position.
    MethodParameter(usize),
    Unresolved,
}

impl TypeRef {
    pub fn named(symbol: SymbolId) -> Self {
        TypeRef::Named {
            symbol,
            args: Vec::new(),
        }
    }

    pub fn symbol(&self) -> Option<SymbolId> {
        match self {
            TypeRef::Named { symbol, .. } => Some(*symbol),
            _ => None,
        }
    }

    pub fn args(&self) -> &[TypeRef] {
        match self {
            TypeRef::Named { args, .. } => args,
            _ => &[],
        }
    }

    pub fn is_resolved(&self) -> bool {
        match self {
            TypeRef::Named { args, .. } => args.iter().all(TypeRef::is_resolved),
            TypeRef::Parameter(_) | TypeRef::MethodParameter(_) => true,
            TypeRef::Unresolved => false,
        }
    }

    /// Replace type parameters with the given arguments.
    pub fn substitute(&self, type_args: &[TypeRef], method_args: &[TypeRef]) -> TypeRef {
        match self {
            TypeRef::Parameter(i) => type_args.get(*i).cloned().unwrap_or(TypeRef::Unresolved),
            TypeRef::MethodParameter(i) => {
                method_args.get(*i).cloned().unwrap_or(TypeRef::Unresolved)
            }
            TypeRef::Named { symbol, args } => TypeRef::Named {
                symbol: *symbol,
                args: args
                    .iter()
                    .map(|a| a.substitute(type_args, method_args))
                    .collect(),
            },
            TypeRef::Unresolved => TypeRef::Unresolved,
        }
    }
}

/// A declared program entity.
///
/// External symbols come from the built-in catalog and have no
/// declarations.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub id: SymbolId,
    pub kind: SymbolKind,
    pub name: String,
    /// Namespace of a type symbol, empty for the global namespace.
    pub namespace: String,
    /// Containing type for members, containing callable for parameters and
    /// locals.
    pub container: Option<SymbolId>,
    /// Value type: field, property, parameter and local type, method return
    /// type.
    pub ty: Option<TypeRef>,
    pub accessibility: Accessibility,
    pub modifiers: Modifiers,
    pub declarations: Vec<NodeId>,
    pub params: Vec<SymbolId>,
    pub type_params: Vec<String>,
    pub param_modifier: ParameterModifier,
    pub has_default: bool,
    pub is_extension: bool,
    pub ownership: Ownership,
    pub type_kind: Option<TypeKind>,
    pub bases: Vec<TypeRef>,
    pub members: Vec<SymbolId>,
    pub getter: Option<NodeId>,
    pub setter: Option<NodeId>,
    pub has_getter: bool,
    pub has_setter: bool,
    /// Auto-property: accessors without bodies.
    pub is_auto: bool,
    /// Implicit `value` parameter of a property setter.
    pub value_param: Option<SymbolId>,
}

impl Symbol {
    pub fn new(id: SymbolId, kind: SymbolKind, name: impl Into<String>) -> Self {
        Symbol {
            id,
            kind,
            name: name.into(),
            namespace: String::new(),
            container: None,
            ty: None,
            accessibility: Accessibility::Public,
            modifiers: Modifiers::default(),
            declarations: Vec::new(),
            params: Vec::new(),
            type_params: Vec::new(),
            param_modifier: ParameterModifier::None,
            has_default: false,
            is_extension: false,
            ownership: Ownership::Unspecified,
            type_kind: None,
            bases: Vec::new(),
            members: Vec::new(),
            getter: None,
            setter: None,
            has_getter: false,
            has_setter: false,
            is_auto: false,
            value_param: None,
        }
    }

    pub fn is_static(&self) -> bool {
        self.modifiers.is_static || self.modifiers.is_const
    }

    /// Declared outside the analysed sources.
    pub fn is_external(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn is_member(&self) -> bool {
        matches!(
            self.kind,
            SymbolKind::Field | SymbolKind::Property | SymbolKind::Method | SymbolKind::Constructor
        )
    }

    /// Whether a call with `arity` arguments can bind to `params`.
    pub fn accepts_arity(params: &[&Symbol], arity: usize) -> bool {
        let required = params
            .iter()
            .filter(|p| !p.has_default && p.param_modifier != ParameterModifier::Params)
            .count();
        let variadic = params
            .last()
            .is_some_and(|p| p.param_modifier == ParameterModifier::Params);
        arity >= required && (arity <= params.len() || variadic)
    }
}

/// Read-only query service the analyses run against.
pub trait SemanticModel: Send + Sync {
    fn trees(&self) -> &[SyntaxTree];

    fn symbol_info(&self, id: SymbolId) -> &Symbol;

    /// Symbol an expression refers to or an invocation calls.
    fn symbol(&self, node: NodeId) -> Option<SymbolId>;

    /// Symbol introduced by a declaration node.
    fn declared_symbol(&self, node: NodeId) -> Option<SymbolId>;

    fn type_of(&self, node: NodeId) -> Option<TypeRef>;

    /// Type by simple or namespace-qualified name.
    fn find_type(&self, name: &str) -> Option<SymbolId>;

    /// The type itself followed by every base type and interface.
    fn supertypes(&self, ty: SymbolId) -> Vec<SymbolId>;

    fn tree(&self, id: u32) -> &SyntaxTree {
        &self.trees()[id as usize]
    }

    fn node(&self, id: NodeId) -> &Node {
        self.tree(id.tree).node(id)
    }

    fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    fn text(&self, id: NodeId) -> &str {
        self.tree(id.tree).text(id)
    }

    fn is_subtype(&self, ty: SymbolId, target: SymbolId) -> bool {
        self.supertypes(ty).contains(&target)
    }

    /// Members named `name` on `ty` and its supertypes, most derived first.
    fn members_named(&self, ty: SymbolId, name: &str) -> Vec<SymbolId> {
        self.supertypes(ty)
            .into_iter()
            .flat_map(|t| self.symbol_info(t).members.clone())
            .filter(|m| self.symbol_info(*m).name == name)
            .collect()
    }

    /// Containing type of a member, parameter or local.
    fn containing_type(&self, symbol: SymbolId) -> Option<SymbolId> {
        let mut current = self.symbol_info(symbol).container;
        while let Some(id) = current {
            let info = self.symbol_info(id);
            if info.kind == SymbolKind::Type {
                return Some(id);
            }
            current = info.container;
        }
        None
    }

    /// `Namespace.Type.Member`, the form configuration entries use.
    fn full_name(&self, symbol: SymbolId) -> String {
        let info = self.symbol_info(symbol);
        match info.kind {
            SymbolKind::Type => {
                let outer = info
                    .container
                    .map(|c| self.full_name(c))
                    .unwrap_or_else(|| info.namespace.clone());
                if outer.is_empty() {
                    info.name.clone()
                } else {
                    format!("{}.{}", outer, info.name)
                }
            }
            _ => match info.container {
                Some(container) => format!("{}.{}", self.full_name(container), info.name),
                None => info.name.clone(),
            },
        }
    }

    /// Innermost declaration of `kind` that contains `node`.
    fn enclosing(&self, node: NodeId, pred: &dyn Fn(&NodeKind) -> bool) -> Option<NodeId> {
        self.tree(node.tree)
            .ancestors(node)
            .find(|a| pred(&self.node(*a).kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitute_replaces_both_parameter_kinds() {
        let list = SymbolId(7);
        let ty = TypeRef::Named {
            symbol: list,
            args: vec![TypeRef::Parameter(0), TypeRef::MethodParameter(0)],
        };
        let a = TypeRef::named(SymbolId(1));
        let b = TypeRef::named(SymbolId(2));
        assert_eq!(
            ty.substitute(&[a.clone()], &[b.clone()]),
            TypeRef::Named {
                symbol: list,
                args: vec![a, b]
            }
        );
    }

    #[test]
    fn missing_argument_becomes_unresolved() {
        let ty = TypeRef::Parameter(2);
        let out = ty.substitute(&[], &[]);
        assert_eq!(out, TypeRef::Unresolved);
        assert!(!out.is_resolved());
    }

    #[test]
    fn arity_accounts_for_defaults_and_params_arrays() {
        let required = Symbol::new(SymbolId(0), SymbolKind::Parameter, "a");
        let mut optional = Symbol::new(SymbolId(1), SymbolKind::Parameter, "b");
        optional.has_default = true;
        assert!(Symbol::accepts_arity(&[&required, &optional], 1));
        assert!(Symbol::accepts_arity(&[&required, &optional], 2));
        assert!(!Symbol::accepts_arity(&[&required, &optional], 0));
        assert!(!Symbol::accepts_arity(&[&required, &optional], 3));

        let mut rest = Symbol::new(SymbolId(3), SymbolKind::Parameter, "rest");
        rest.param_modifier = ParameterModifier::Params;
        assert!(Symbol::accepts_arity(&[&required, &rest], 5));
    }
}
