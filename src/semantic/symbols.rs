//! Symbol storage and the type-level queries shared by the catalog, the
//! declaration pass and the binder.

use std::collections::{HashMap, HashSet, VecDeque};

use super::{Symbol, SymbolId, SymbolKind, TypeRef};
use crate::syntax::{TypeKind, TypeSyntax};

/// Keyword aliases for framework types.
fn alias(name: &str) -> Option<&'static str> {
    let full = match name {
        "bool" => "System.Boolean",
        "byte" => "System.Byte",
        "sbyte" => "System.SByte",
        "char" => "System.Char",
        "decimal" => "System.Decimal",
        "double" => "System.Double",
        "float" => "System.Single",
        "int" => "System.Int32",
        "uint" => "System.UInt32",
        "long" => "System.Int64",
        "ulong" => "System.UInt64",
        "short" => "System.Int16",
        "ushort" => "System.UInt16",
        "object" | "dynamic" => "System.Object",
        "string" => "System.String",
        "nint" => "System.IntPtr",
        "nuint" => "System.UIntPtr",
        _ => return None,
    };
    Some(full)
}

fn type_key(full_name: &str, arity: usize) -> String {
    if arity == 0 {
        full_name.to_string()
    } else {
        format!("{}`{}", full_name, arity)
    }
}

/// Type parameters visible where a type is written.
#[derive(Debug, Clone, Copy, Default)]
pub struct Generics<'a> {
    pub type_params: &'a [String],
    pub method_params: &'a [String],
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    by_simple_name: HashMap<String, Vec<SymbolId>>,
    by_full_name: HashMap<String, SymbolId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.0 as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    /// Allocate a symbol; `init` fills in everything but the id.
    pub fn add(&mut self, kind: SymbolKind, name: &str, init: impl FnOnce(&mut Symbol)) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        let mut symbol = Symbol::new(id, kind, name);
        init(&mut symbol);
        self.symbols.push(symbol);
        id
    }

    /// Register a type under its simple and qualified names. Returns the
    /// existing symbol when a partial declaration of the same type was
    /// already registered.
    pub fn add_type(
        &mut self,
        namespace: &str,
        outer: Option<SymbolId>,
        name: &str,
        type_params: Vec<String>,
        kind: TypeKind,
    ) -> SymbolId {
        let qualifier = match outer {
            Some(outer) => self.qualified_name(outer),
            None => namespace.to_string(),
        };
        let full = if qualifier.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", qualifier, name)
        };
        let key = type_key(&full, type_params.len());
        if let Some(existing) = self.by_full_name.get(&key) {
            return *existing;
        }
        let id = self.add(SymbolKind::Type, name, |s| {
            s.namespace = namespace.to_string();
            s.container = outer;
            s.type_params = type_params;
            s.type_kind = Some(kind);
        });
        self.by_full_name.insert(key, id);
        self.by_simple_name
            .entry(name.to_string())
            .or_default()
            .push(id);
        if let Some(outer) = outer {
            self.get_mut(outer).members.push(id);
        }
        id
    }

    pub fn qualified_name(&self, ty: SymbolId) -> String {
        let symbol = self.get(ty);
        let qualifier = match symbol.container {
            Some(outer) if self.get(outer).kind == SymbolKind::Type => self.qualified_name(outer),
            _ => symbol.namespace.clone(),
        };
        if qualifier.is_empty() {
            symbol.name.clone()
        } else {
            format!("{}.{}", qualifier, symbol.name)
        }
    }

    /// Look a type up by simple or qualified name and generic arity.
    pub fn lookup_type(&self, name: &str, arity: usize) -> Option<SymbolId> {
        let name = alias(name).unwrap_or(name);
        let name = name.strip_prefix("global::").unwrap_or(name);
        if name.contains('.') {
            if let Some(id) = self.by_full_name.get(&type_key(name, arity)) {
                return Some(*id);
            }
        }
        let simple = name.rsplit('.').next().unwrap_or(name);
        let candidates = self.by_simple_name.get(simple)?;
        let matching = |id: &&SymbolId| self.get(**id).type_params.len() == arity;
        // source declarations shadow catalog types of the same name
        candidates
            .iter()
            .filter(matching)
            .find(|id| !self.get(**id).is_external())
            .or_else(|| candidates.iter().find(matching))
            .or_else(|| candidates.first())
            .copied()
    }

    pub fn array(&self) -> Option<SymbolId> {
        self.by_full_name.get("System.Array`1").copied()
    }

    pub fn object(&self) -> Option<SymbolId> {
        self.by_full_name.get("System.Object").copied()
    }

    pub fn well_known(&self, full_name: &str, arity: usize) -> Option<SymbolId> {
        self.by_full_name.get(&type_key(full_name, arity)).copied()
    }

    /// Resolve a written type. `None` for `void` and `var`.
    pub fn resolve(&self, syntax: &TypeSyntax, generics: Generics<'_>) -> Option<TypeRef> {
        if syntax.name.is_empty() || syntax.name == "void" || syntax.is_var() {
            return None;
        }
        let mut ty = self.resolve_element(syntax, generics);
        for _ in 0..syntax.rank {
            ty = match self.array() {
                Some(array) => TypeRef::Named {
                    symbol: array,
                    args: vec![ty],
                },
                None => TypeRef::Unresolved,
            };
        }
        Some(ty)
    }

    fn resolve_element(&self, syntax: &TypeSyntax, generics: Generics<'_>) -> TypeRef {
        if syntax.args.is_empty() {
            if let Some(i) = generics.method_params.iter().position(|p| *p == syntax.name) {
                return TypeRef::MethodParameter(i);
            }
            if let Some(i) = generics.type_params.iter().position(|p| *p == syntax.name) {
                return TypeRef::Parameter(i);
            }
        }
        let Some(symbol) = self.lookup_type(&syntax.name, syntax.args.len()) else {
            return TypeRef::Unresolved;
        };
        let args = syntax
            .args
            .iter()
            .map(|arg| {
                self.resolve(arg, generics)
                    .unwrap_or(TypeRef::Unresolved)
            })
            .collect();
        TypeRef::Named { symbol, args }
    }

    /// The type followed by all of its base types and interfaces,
    /// breadth-first. `object` is always last.
    pub fn supertypes(&self, ty: SymbolId) -> Vec<SymbolId> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([ty]);
        while let Some(next) = queue.pop_front() {
            if !seen.insert(next) {
                continue;
            }
            out.push(next);
            for base in &self.get(next).bases {
                if let Some(symbol) = base.symbol() {
                    queue.push_back(symbol);
                }
            }
        }
        if let Some(object) = self.object() {
            out.retain(|t| *t != object);
            out.push(object);
        }
        out
    }

    /// View `ty` as an instantiation of `target`, substituting type
    /// arguments through the base list: `List<Stream>` as `IEnumerable<T>`
    /// is `IEnumerable<Stream>`.
    pub fn as_base(&self, ty: &TypeRef, target: SymbolId) -> Option<TypeRef> {
        self.as_base_at(ty, target, 0)
    }

    fn as_base_at(&self, ty: &TypeRef, target: SymbolId, depth: usize) -> Option<TypeRef> {
        if depth > 32 {
            return None;
        }
        let TypeRef::Named { symbol, args } = ty else {
            return None;
        };
        if *symbol == target {
            return Some(ty.clone());
        }
        self.get(*symbol).bases.iter().find_map(|base| {
            let base = base.substitute(args, &[]);
            self.as_base_at(&base, target, depth + 1)
        })
    }

    /// Members named `name` on `ty` and its supertypes, most derived first.
    pub fn members_named(&self, ty: SymbolId, name: &str) -> Vec<SymbolId> {
        self.supertypes(ty)
            .into_iter()
            .flat_map(|t| self.get(t).members.iter().copied())
            .filter(|m| self.get(*m).name == name)
            .collect()
    }

    /// Element type of an enumerable: arrays and anything implementing
    /// `IEnumerable<T>`.
    pub fn element_type(&self, ty: &TypeRef) -> Option<TypeRef> {
        let enumerable = self.well_known("System.Collections.Generic.IEnumerable", 1)?;
        let array = self.array();
        if ty.symbol().is_some() && ty.symbol() == array {
            return ty.args().first().cloned();
        }
        self.as_base(ty, enumerable)?.args().first().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::TypeRef;

    fn table() -> (SymbolTable, SymbolId, SymbolId) {
        let mut table = SymbolTable::new();
        let object = table.add_type("System", None, "Object", vec![], TypeKind::Class);
        let enumerable = table.add_type(
            "System.Collections.Generic",
            None,
            "IEnumerable",
            vec!["T".into()],
            TypeKind::Interface,
        );
        let list = table.add_type(
            "System.Collections.Generic",
            None,
            "List",
            vec!["T".into()],
            TypeKind::Class,
        );
        table.get_mut(list).bases = vec![TypeRef::Named {
            symbol: enumerable,
            args: vec![TypeRef::Parameter(0)],
        }];
        (table, object, list)
    }

    #[test]
    fn resolves_aliases_generics_and_arrays() {
        let (mut table, object, list) = table();
        let int = table.add_type("System", None, "Int32", vec![], TypeKind::Struct);
        table.add_type("System", None, "Array", vec!["T".into()], TypeKind::Class);

        let syntax = TypeSyntax {
            name: "List".into(),
            args: vec![TypeSyntax::named("int")],
            rank: 1,
            nullable: false,
        };
        let ty = table.resolve(&syntax, Generics::default()).unwrap();
        let array = table.array().unwrap();
        assert_eq!(
            ty,
            TypeRef::Named {
                symbol: array,
                args: vec![TypeRef::Named {
                    symbol: list,
                    args: vec![TypeRef::named(int)]
                }]
            }
        );
        assert_eq!(
            table.resolve(&TypeSyntax::named("object"), Generics::default()),
            Some(TypeRef::named(object))
        );
        assert_eq!(table.resolve(&TypeSyntax::named("var"), Generics::default()), None);
    }

    #[test]
    fn type_parameters_resolve_by_position() {
        let (table, _, _) = table();
        let params = vec!["TKey".to_string(), "TValue".to_string()];
        let generics = Generics {
            type_params: &params,
            method_params: &[],
        };
        assert_eq!(
            table.resolve(&TypeSyntax::named("TValue"), generics),
            Some(TypeRef::Parameter(1))
        );
    }

    #[test]
    fn element_type_goes_through_base_list() {
        let (table, object, list) = table();
        let ty = TypeRef::Named {
            symbol: list,
            args: vec![TypeRef::named(object)],
        };
        assert_eq!(table.element_type(&ty), Some(TypeRef::named(object)));
    }

    #[test]
    fn partial_types_share_one_symbol() {
        let (mut table, _, _) = table();
        let a = table.add_type("App", None, "Holder", vec![], TypeKind::Class);
        let b = table.add_type("App", None, "Holder", vec![], TypeKind::Class);
        assert_eq!(a, b);
        assert_eq!(table.lookup_type("App.Holder", 0), Some(a));
        assert_eq!(table.lookup_type("Holder", 0), Some(a));
    }

    #[test]
    fn object_is_last_supertype() {
        let (table, object, list) = table();
        let supers = table.supertypes(list);
        assert_eq!(supers.first(), Some(&list));
        assert_eq!(supers.last(), Some(&object));
        assert_eq!(supers.len(), 3);
    }
}
