//! Declaration pass.
//!
//! Types from every tree are registered first, then members, so member
//! signatures can name types declared later or in other files. Partial
//! declarations contribute to one symbol.

use std::collections::HashMap;

use super::symbols::{Generics, SymbolTable};
use super::{SymbolId, SymbolKind, TypeRef};
use crate::syntax::{Accessibility, AccessorKind, NodeId, NodeKind, ParameterModifier, SyntaxTree};

pub(super) struct Declarations<'a> {
    pub table: &'a mut SymbolTable,
    pub declared: &'a mut HashMap<NodeId, SymbolId>,
}

impl Declarations<'_> {
    /// Register every type declared in `tree`; returns each declaration
    /// node with its symbol.
    pub fn declare_types(&mut self, tree: &SyntaxTree) -> Vec<(NodeId, SymbolId)> {
        let mut out = Vec::new();
        self.walk_types(tree, tree.root(), "", None, &mut out);
        out
    }

    fn walk_types(
        &mut self,
        tree: &SyntaxTree,
        node: NodeId,
        namespace: &str,
        outer: Option<SymbolId>,
        out: &mut Vec<(NodeId, SymbolId)>,
    ) {
        match &tree.node(node).kind {
            NodeKind::CompilationUnit { members } => {
                for member in members {
                    self.walk_types(tree, *member, namespace, None, out);
                }
            }
            NodeKind::Namespace { name, members } => {
                let inner = if namespace.is_empty() {
                    name.clone()
                } else {
                    format!("{}.{}", namespace, name)
                };
                for member in members {
                    self.walk_types(tree, *member, &inner, None, out);
                }
            }
            NodeKind::TypeDecl {
                kind,
                modifiers,
                name,
                type_params,
                members,
                ..
            } => {
                let id = self
                    .table
                    .add_type(namespace, outer, name, type_params.clone(), *kind);
                let default = if outer.is_some() {
                    Accessibility::Private
                } else {
                    Accessibility::Internal
                };
                let symbol = self.table.get_mut(id);
                symbol.declarations.push(node);
                if modifiers.has_accessibility() || symbol.declarations.len() == 1 {
                    symbol.accessibility = modifiers.accessibility(default);
                }
                symbol.modifiers.is_static |= modifiers.is_static;
                symbol.modifiers.is_abstract |= modifiers.is_abstract;
                symbol.modifiers.sealed |= modifiers.sealed;
                symbol.modifiers.partial |= modifiers.partial;
                self.declared.insert(node, id);
                out.push((node, id));
                for member in members {
                    self.walk_types(tree, *member, namespace, Some(id), out);
                }
            }
            _ => {}
        }
    }

    /// Resolve the base list and declare fields, properties, methods and
    /// constructors of one type declaration.
    pub fn declare_members(&mut self, tree: &SyntaxTree, node: NodeId, ty: SymbolId) {
        let NodeKind::TypeDecl {
            kind,
            bases,
            members,
            ..
        } = &tree.node(node).kind
        else {
            return;
        };
        let type_params = self.table.get(ty).type_params.clone();
        let generics = Generics {
            type_params: &type_params,
            method_params: &[],
        };
        let resolved: Vec<TypeRef> = bases
            .iter()
            .filter_map(|base| self.table.resolve(base, generics))
            .filter(TypeRef::is_resolved)
            .collect();
        let symbol = self.table.get_mut(ty);
        for base in resolved {
            if !symbol.bases.contains(&base) {
                symbol.bases.push(base);
            }
        }

        let in_interface = *kind == crate::syntax::TypeKind::Interface;
        for member in members {
            self.declare_member(tree, *member, ty, &type_params, in_interface);
        }
    }

    fn declare_member(
        &mut self,
        tree: &SyntaxTree,
        node: NodeId,
        owner: SymbolId,
        type_params: &[String],
        in_interface: bool,
    ) {
        let default = if in_interface {
            Accessibility::Public
        } else {
            Accessibility::Private
        };
        let generics = Generics {
            type_params,
            method_params: &[],
        };
        let added = match &tree.node(node).kind {
            NodeKind::Field {
                modifiers,
                ty,
                declarators,
            } => {
                let field_ty = self.table.resolve(ty, generics);
                for declarator in declarators {
                    let Some(name) = tree.node(*declarator).kind.declared_name() else {
                        continue;
                    };
                    let id = self.table.add(SymbolKind::Field, name, |s| {
                        s.container = Some(owner);
                        s.ty = field_ty.clone();
                        s.accessibility = modifiers.accessibility(default);
                        s.modifiers = *modifiers;
                        s.declarations = vec![*declarator];
                    });
                    self.declared.insert(*declarator, id);
                    self.table.get_mut(owner).members.push(id);
                }
                None
            }
            NodeKind::Property {
                modifiers,
                ty,
                name,
                params,
                accessors,
                expression_body,
                ..
            } => {
                let prop_ty = self.table.resolve(ty, generics);
                let accessor = |wanted: &[AccessorKind]| {
                    accessors.iter().copied().find(|a| {
                        matches!(&tree.node(*a).kind, NodeKind::Accessor { kind, .. } if wanted.contains(kind))
                    })
                };
                let getter = accessor(&[AccessorKind::Get]).or(*expression_body);
                let setter = accessor(&[AccessorKind::Set, AccessorKind::Init]);
                let bodiless = accessors.iter().all(|a| {
                    matches!(
                        &tree.node(*a).kind,
                        NodeKind::Accessor { body: None, expression_body: None, .. }
                    )
                });
                let is_auto = !accessors.is_empty()
                    && expression_body.is_none()
                    && bodiless
                    && !in_interface
                    && !modifiers.is_abstract;
                let id = self.table.add(SymbolKind::Property, name, |s| {
                    s.container = Some(owner);
                    s.ty = prop_ty.clone();
                    s.accessibility = modifiers.accessibility(default);
                    s.modifiers = *modifiers;
                    s.modifiers.is_abstract |= in_interface && bodiless;
                    s.declarations = vec![node];
                    s.getter = getter;
                    s.setter = setter;
                    s.has_getter = getter.is_some();
                    s.has_setter = setter.is_some();
                    s.is_auto = is_auto;
                });
                let params = declare_parameters(self.table, self.declared, tree, id, params, generics);
                let value_param = setter.map(|setter| {
                    self.table.add(SymbolKind::Parameter, "value", |s| {
                        s.container = Some(id);
                        s.ty = prop_ty;
                        s.declarations = vec![setter];
                    })
                });
                let symbol = self.table.get_mut(id);
                symbol.params = params;
                symbol.value_param = value_param;
                Some(id)
            }
            NodeKind::Method {
                modifiers,
                return_type,
                name,
                type_params: method_params,
                params,
                body,
                expression_body,
            } => {
                let generics = Generics {
                    type_params,
                    method_params,
                };
                let ret = self.table.resolve(return_type, generics);
                let abstract_member = body.is_none() && expression_body.is_none();
                let id = self.table.add(SymbolKind::Method, name, |s| {
                    s.container = Some(owner);
                    s.ty = ret;
                    s.accessibility = modifiers.accessibility(default);
                    s.modifiers = *modifiers;
                    s.modifiers.is_abstract |= in_interface && abstract_member;
                    s.type_params = method_params.clone();
                    s.declarations = vec![node];
                });
                let params = declare_parameters(self.table, self.declared, tree, id, params, generics);
                let is_extension = params
                    .first()
                    .is_some_and(|p| self.table.get(*p).param_modifier == ParameterModifier::This);
                let symbol = self.table.get_mut(id);
                symbol.params = params;
                symbol.is_extension = is_extension;
                Some(id)
            }
            NodeKind::Constructor {
                modifiers, params, ..
            } => {
                let id = self.table.add(SymbolKind::Constructor, ".ctor", |s| {
                    s.container = Some(owner);
                    s.accessibility = modifiers.accessibility(default);
                    s.modifiers = *modifiers;
                    s.declarations = vec![node];
                });
                let params = declare_parameters(self.table, self.declared, tree, id, params, generics);
                self.table.get_mut(id).params = params;
                Some(id)
            }
            _ => None,
        };
        if let Some(id) = added {
            self.declared.insert(node, id);
            self.table.get_mut(owner).members.push(id);
        }
    }
}

/// Declare the parameters of a member, local function or lambda.
pub(super) fn declare_parameters(
    table: &mut SymbolTable,
    declared: &mut HashMap<NodeId, SymbolId>,
    tree: &SyntaxTree,
    owner: SymbolId,
    params: &[NodeId],
    generics: Generics<'_>,
) -> Vec<SymbolId> {
    params
        .iter()
        .filter_map(|param| {
            let NodeKind::Parameter {
                modifier,
                ty,
                name,
                default,
            } = &tree.node(*param).kind
            else {
                return None;
            };
            let resolved = ty.as_ref().and_then(|ty| table.resolve(ty, generics));
            let id = table.add(SymbolKind::Parameter, name, |s| {
                s.container = Some(owner);
                s.ty = resolved;
                s.param_modifier = *modifier;
                s.has_default = default.is_some();
                s.declarations = vec![*param];
            });
            declared.insert(*param, id);
            Some(id)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse;

    fn declare(source: &str) -> (SymbolTable, HashMap<NodeId, SymbolId>, SyntaxTree) {
        let tree = parse(0, "d.cs", source).unwrap();
        let mut table = SymbolTable::new();
        super::super::catalog::install(&mut table);
        let mut declared = HashMap::new();
        let mut pass = Declarations {
            table: &mut table,
            declared: &mut declared,
        };
        let types = pass.declare_types(&tree);
        for (node, ty) in types {
            pass.declare_members(&tree, node, ty);
        }
        (table, declared, tree)
    }

    #[test]
    fn declares_members_with_resolved_types() {
        let (table, _, _) = declare(
            "namespace App { using System.IO; public class Holder : System.IDisposable {
                private readonly Stream _stream;
                public Stream Current { get; private set; }
                internal Stream Open(string path) => null;
                public void Dispose() { }
            } }",
        );
        let holder = table.lookup_type("App.Holder", 0).unwrap();
        let symbol = table.get(holder);
        assert_eq!(symbol.accessibility, Accessibility::Public);
        assert_eq!(symbol.members.len(), 4);
        let stream = table.lookup_type("Stream", 0).unwrap();

        let field = table.members_named(holder, "_stream")[0];
        assert_eq!(table.get(field).ty, Some(TypeRef::named(stream)));
        assert_eq!(table.get(field).accessibility, Accessibility::Private);
        assert!(table.get(field).modifiers.readonly);

        let current = table.get(table.members_named(holder, "Current")[0]);
        assert!(current.is_auto);
        assert!(current.has_setter);
        assert!(current.value_param.is_some());

        let open = table.get(table.members_named(holder, "Open")[0]);
        assert_eq!(open.accessibility, Accessibility::Internal);
        assert_eq!(open.params.len(), 1);

        let disposable = table.lookup_type("System.IDisposable", 0).unwrap();
        assert!(table.supertypes(holder).contains(&disposable));
    }

    #[test]
    fn partial_declarations_merge() {
        let (table, declared, _) = declare(
            "partial class P { int a; } partial class P : System.IDisposable { public void Dispose() { } }",
        );
        let p = table.lookup_type("P", 0).unwrap();
        assert_eq!(table.get(p).declarations.len(), 2);
        assert_eq!(table.get(p).members.len(), 2);
        assert_eq!(declared.values().filter(|id| **id == p).count(), 2);
    }

    #[test]
    fn interface_members_are_public_and_abstract() {
        let (table, _, _) = declare("interface IHolder { System.IO.Stream Stream { get; } void Close(); }");
        let ty = table.lookup_type("IHolder", 0).unwrap();
        let stream = table.get(table.members_named(ty, "Stream")[0]);
        assert_eq!(stream.accessibility, Accessibility::Public);
        assert!(!stream.is_auto);
        assert!(stream.modifiers.is_abstract);
    }

    #[test]
    fn extension_methods_are_flagged() {
        let (table, _, _) =
            declare("static class Ext { public static int Twice(this int x) => x * 2; }");
        let ext = table.lookup_type("Ext", 0).unwrap();
        let twice = table.get(table.members_named(ext, "Twice")[0]);
        assert!(twice.is_extension);
    }
}
