//! Tree-sitter parser integration for C#.
//!
//! Sources are parsed with the `tree-sitter-c-sharp` grammar and lowered
//! into the arena [`SyntaxTree`]. A file with any error or missing node is
//! rejected with the location of the first one.

use std::path::{Path, PathBuf};

use tree_sitter::{Language, Node as Cst, Parser};

use super::lower::lower;
use super::tree::SyntaxTree;
use crate::errors::{Error, Result};

fn language() -> Language {
    tree_sitter_c_sharp::LANGUAGE.into()
}

/// Parse one C# file into tree number `tree`.
pub fn parse(tree: u32, path: impl Into<PathBuf>, source: impl Into<String>) -> Result<SyntaxTree> {
    let path = path.into();
    let source = source.into();

    let mut parser = Parser::new();
    parser
        .set_language(&language())
        .map_err(|e| Error::parse(&path, 1, 1, format!("failed to load the C# grammar: {}", e)))?;
    let cst = parser
        .parse(&source, None)
        .ok_or_else(|| Error::parse(&path, 1, 1, "parser produced no tree"))?;

    let root = cst.root_node();
    if let Some(error) = first_error(root) {
        return Err(describe_error(&path, &source, error));
    }

    let (nodes, root) = lower(tree, &source, root);
    log::trace!("parsed {} into {} nodes", path.display(), nodes.len());
    Ok(SyntaxTree::new(tree, path, source, nodes, root))
}

/// First error or missing node in source order.
fn first_error(node: Cst<'_>) -> Option<Cst<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Cst<'_>> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

fn describe_error(path: &Path, source: &str, node: Cst<'_>) -> Error {
    let position = node.start_position();
    let message = if node.is_missing() {
        format!("expected `{}`", node.kind())
    } else {
        let text = source.get(node.start_byte()..node.end_byte()).unwrap_or("");
        let snippet: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let snippet: String = snippet.chars().take(40).collect();
        format!("unexpected `{}`", snippet)
    };
    Error::parse(path, position.row + 1, position.column + 1, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::tree::*;
    use indoc::indoc;

    fn parse_src(source: &str) -> SyntaxTree {
        parse(0, "test.cs", source).unwrap()
    }

    fn kinds<'t>(tree: &'t SyntaxTree) -> Vec<&'t NodeKind> {
        tree.descendants(tree.root())
            .into_iter()
            .map(|id| &tree.node(id).kind)
            .collect()
    }

    fn find<'t>(tree: &'t SyntaxTree, pred: impl Fn(&NodeKind) -> bool) -> Vec<NodeId> {
        tree.descendants(tree.root())
            .into_iter()
            .filter(|id| pred(&tree.node(*id).kind))
            .collect()
    }

    #[test]
    fn parses_class_with_members() {
        let tree = parse_src(indoc! {r#"
            using System;
            using System.IO;

            namespace Demo
            {
                public sealed class Holder : IDisposable
                {
                    private readonly Stream _stream = new MemoryStream();
                    public Stream Stream => _stream;
                    public int Count { get; private set; }

                    public Holder(string path) : this()
                    {
                        _stream = File.OpenRead(path);
                    }

                    public void Dispose()
                    {
                        _stream?.Dispose();
                    }
                }
            }
        "#});
        let types = find(&tree, |k| matches!(k, NodeKind::TypeDecl { .. }));
        assert_eq!(types.len(), 1);
        let NodeKind::TypeDecl {
            name,
            bases,
            members,
            modifiers,
            ..
        } = &tree.node(types[0]).kind
        else {
            unreachable!()
        };
        assert_eq!(name, "Holder");
        assert_eq!(bases[0].name, "IDisposable");
        assert!(modifiers.public && modifiers.sealed);
        assert_eq!(members.len(), 5);
        assert_eq!(
            find(&tree, |k| matches!(k, NodeKind::ConditionalAccess { .. })).len(),
            1
        );
        assert_eq!(
            find(&tree, |k| matches!(k, NodeKind::ConstructorInitializer { .. })).len(),
            1
        );
    }

    #[test]
    fn distinguishes_declarations_from_expressions() {
        let tree = parse_src(indoc! {r#"
            class C
            {
                void M()
                {
                    var x = Create();
                    List<int> items = new List<int> { 1, 2 };
                    x = Other<int>(a < b, c > d);
                    Foo(out var y, ref x);
                    int Local(int v) => v * 2;
                }
            }
        "#});
        let locals = find(&tree, |k| matches!(k, NodeKind::LocalDeclaration { .. }));
        assert_eq!(locals.len(), 2);
        assert!(matches!(
            tree.node(locals[0]).kind,
            NodeKind::LocalDeclaration { ty: None, .. }
        ));
        assert_eq!(
            find(&tree, |k| matches!(k, NodeKind::LocalFunction { .. })).len(),
            1
        );
        assert_eq!(
            find(&tree, |k| matches!(k, NodeKind::DeclarationExpression { ty: None, .. })).len(),
            1
        );
        let generic_calls = find(&tree, |k| {
            matches!(k, NodeKind::Identifier { name, type_args } if name == "Other" && type_args.len() == 1)
        });
        assert_eq!(generic_calls.len(), 1);
        let comparisons = find(&tree, |k| {
            matches!(k, NodeKind::Binary { op: BinaryOp::Lt | BinaryOp::Gt, .. })
        });
        assert_eq!(comparisons.len(), 2);
    }

    #[test]
    fn parses_casts_lambdas_and_coalesce() {
        let tree = parse_src(indoc! {r#"
            class C
            {
                object M(object o)
                {
                    var s = (Stream)o ?? new MemoryStream();
                    Func<int, int> f = x => x + 1;
                    Func<int, int, int> g = (a, b) => { return a + b; };
                    _cache ??= Task.Run(() => Load()).ConfigureAwait(false);
                    return o as IDisposable;
                }
            }
        "#});
        assert_eq!(find(&tree, |k| matches!(k, NodeKind::Cast { .. })).len(), 1);
        assert_eq!(find(&tree, |k| matches!(k, NodeKind::Lambda { .. })).len(), 3);
        assert_eq!(find(&tree, |k| matches!(k, NodeKind::As { .. })).len(), 1);
        assert_eq!(
            find(&tree, |k| matches!(k, NodeKind::Binary { op: BinaryOp::Coalesce, .. })).len(),
            1
        );
        assert_eq!(
            find(&tree, |k| matches!(k, NodeKind::Assignment { op: AssignOp::Coalesce, .. })).len(),
            1
        );
    }

    #[test]
    fn conditional_access_chain_shape() {
        let tree = parse_src("class C { void M() { a?.b.c(); } }");
        let access = find(&tree, |k| matches!(k, NodeKind::ConditionalAccess { .. }));
        assert_eq!(access.len(), 1);
        let NodeKind::ConditionalAccess { expr, when_not_null } = &tree.node(access[0]).kind else {
            unreachable!()
        };
        assert_eq!(tree.text(*expr), "a");
        assert_eq!(tree.text(*when_not_null), "b.c()");
        assert!(matches!(tree.node(*when_not_null).kind, NodeKind::Invocation { .. }));
    }

    #[test]
    fn nested_conditional_access_nests_to_the_right() {
        let tree = parse_src("class C { void M() { a?.b?.c.d(); } }");
        let access = find(&tree, |k| matches!(k, NodeKind::ConditionalAccess { .. }));
        assert_eq!(access.len(), 2);
        let NodeKind::ConditionalAccess { expr, when_not_null } = &tree.node(access[0]).kind else {
            unreachable!()
        };
        assert_eq!(tree.text(*expr), "a");
        let NodeKind::ConditionalAccess { expr, when_not_null } = &tree.node(*when_not_null).kind else {
            panic!("inner access expected");
        };
        assert!(matches!(&tree.node(*expr).kind, NodeKind::MemberBinding { name, .. } if name == "b"));
        assert_eq!(tree.text(*when_not_null), "c.d()");
    }

    #[test]
    fn null_forgiving_operator_is_transparent() {
        let tree = parse_src("class C { void M() { x!.Dispose(); } }");
        let access = find(&tree, |k| {
            matches!(k, NodeKind::MemberAccess { name, .. } if name == "Dispose")
        });
        let NodeKind::MemberAccess { expr, .. } = &tree.node(access[0]).kind else {
            unreachable!()
        };
        assert!(matches!(&tree.node(*expr).kind, NodeKind::Identifier { name, .. } if name == "x"));
    }

    #[test]
    fn file_scoped_namespace_owns_following_types() {
        let tree = parse_src(indoc! {r#"
            namespace Demo.IO;

            class A { }
            class B { }
        "#});
        let namespaces = find(&tree, |k| matches!(k, NodeKind::Namespace { .. }));
        assert_eq!(namespaces.len(), 1);
        let NodeKind::Namespace { name, members } = &tree.node(namespaces[0]).kind else {
            unreachable!()
        };
        assert_eq!(name, "Demo.IO");
        assert_eq!(members.len(), 2);
    }

    #[test]
    fn comments_and_attributes_are_dropped() {
        let tree = parse_src(indoc! {r#"
            // leading
            [Serializable]
            class C
            {
                /* field */ [NonSerialized] private Stream _s; // trailing
            }
        "#});
        let fields = find(&tree, |k| matches!(k, NodeKind::Field { .. }));
        assert_eq!(fields.len(), 1);
        let NodeKind::Field { ty, modifiers, .. } = &tree.node(fields[0]).kind else {
            unreachable!()
        };
        assert_eq!(ty.name, "Stream");
        assert!(modifiers.private);
    }

    #[test]
    fn parent_links_point_upwards() {
        let tree = parse_src("class C { int x = 1 + 2; void M() { a?.b.c(); } }");
        for id in tree.descendants(tree.root()) {
            for child in tree.node(id).kind.children() {
                assert_eq!(tree.node(child).parent, Some(id));
            }
        }
        assert_eq!(tree.node(tree.root()).parent, None);
    }

    #[test]
    fn parses_statement_forms() {
        let tree = parse_src(indoc! {r#"
            class C
            {
                async Task M(IEnumerable<int> xs)
                {
                    using (var s = Open()) { }
                    using var t = Open();
                    foreach (var x in xs) { if (x is int i && i > 0) continue; }
                    for (int i = 0; i < 10; i++) { }
                    try { await Task.Delay(1); } catch (Exception e) when (e != null) { throw; } finally { }
                    switch (x) { case 1: break; case string s: break; default: break; }
                    lock (_gate) { }
                    do { } while (false);
                    var y = x switch { 1 => "a", _ => "b" };
                }
            }
        "#});
        let all = kinds(&tree);
        assert!(all.iter().any(|k| matches!(k, NodeKind::Using { .. })));
        assert!(all
            .iter()
            .any(|k| matches!(k, NodeKind::LocalDeclaration { is_using: true, .. })));
        assert!(all.iter().any(|k| matches!(k, NodeKind::ForEach { .. })));
        assert!(all.iter().any(|k| matches!(k, NodeKind::For { .. })));
        assert!(all.iter().any(|k| matches!(k, NodeKind::Catch { filter: Some(_), .. })));
        assert!(all.iter().any(|k| matches!(k, NodeKind::Switch { .. })));
        assert!(all.iter().any(|k| matches!(k, NodeKind::Await { .. })));
        assert!(all
            .iter()
            .any(|k| matches!(k, NodeKind::SwitchExpression { arms, .. } if arms.len() == 2)));
        assert!(all
            .iter()
            .any(|k| matches!(k, NodeKind::Is { designation: Some(d), .. } if d == "i")));
        assert!(all
            .iter()
            .any(|k| matches!(k, NodeKind::CaseLabel { designation: Some(d), .. } if d == "s")));
    }

    #[test]
    fn object_initializer_members_are_assignments() {
        let tree = parse_src("class C { object M() => new Foo { Bar = new Baz(), [1] = x }; }");
        let init = find(&tree, |k| matches!(k, NodeKind::Initializer { .. }));
        let NodeKind::Initializer { kind, exprs } = &tree.node(init[0]).kind else {
            unreachable!()
        };
        assert_eq!(*kind, InitializerKind::Object);
        assert_eq!(exprs.len(), 2);
        assert!(exprs
            .iter()
            .all(|e| matches!(tree.node(*e).kind, NodeKind::Assignment { .. })));
    }

    #[test]
    fn enum_members_become_constant_fields() {
        let tree = parse_src("enum Mode { Read, Write = 2 }");
        let fields = find(&tree, |k| matches!(k, NodeKind::Field { .. }));
        assert_eq!(fields.len(), 2);
        let NodeKind::Field { ty, modifiers, .. } = &tree.node(fields[1]).kind else {
            unreachable!()
        };
        assert_eq!(ty.name, "Mode");
        assert!(modifiers.is_const && modifiers.is_static);
    }

    #[test]
    fn reports_syntax_errors_with_location() {
        let err = parse(0, "bad.cs", "class C {\n  void M() { x = ; }\n}").unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Parse error in bad.cs:2:"), "{}", message);
    }
}
