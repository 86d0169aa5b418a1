use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use walkdir::{DirEntry, WalkDir};

use super::binder::Binder;
use super::catalog;
use super::declarations::Declarations;
use super::symbols::SymbolTable;
use super::{SemanticModel, Symbol, SymbolId, TypeRef};
use crate::errors::{Error, Result};
use crate::syntax::{parse, NodeId, SyntaxTree};

/// A source file that could not be read or parsed.
#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Parsed and bound sources: the concrete [`SemanticModel`].
#[derive(Debug)]
pub struct Compilation {
    trees: Vec<SyntaxTree>,
    table: SymbolTable,
    declared: HashMap<NodeId, SymbolId>,
    bound: HashMap<NodeId, SymbolId>,
    types: HashMap<NodeId, TypeRef>,
    skipped: Vec<SkippedFile>,
}

impl Compilation {
    /// Compile in-memory sources. Any parse error fails the whole
    /// compilation.
    pub fn from_sources<P, S>(sources: impl IntoIterator<Item = (P, S)>) -> Result<Self>
    where
        P: Into<PathBuf>,
        S: Into<String>,
    {
        let sources: Vec<(PathBuf, String)> = sources
            .into_iter()
            .map(|(path, text)| (path.into(), text.into()))
            .collect();
        let trees = sources
            .into_par_iter()
            .enumerate()
            .map(|(i, (path, text))| parse(i as u32, path, text))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_trees(trees, Vec::new()))
    }

    /// Discover and compile every `.cs` file under `paths`.
    ///
    /// Files that fail to read or parse are logged and skipped; they still
    /// occupy a tree slot so tree ids stay dense.
    pub fn from_paths(paths: &[PathBuf]) -> Result<Self> {
        let files = discover(paths)?;
        log::debug!("compiling {} source files", files.len());

        let results: Vec<(SyntaxTree, Option<SkippedFile>)> = files
            .into_par_iter()
            .enumerate()
            .map(|(i, path)| {
                let id = i as u32;
                let parsed = std::fs::read_to_string(&path)
                    .map_err(|e| Error::file_system("Failed to read source file", &path, e))
                    .and_then(|text| parse(id, path.clone(), text));
                match parsed {
                    Ok(tree) => (tree, None),
                    Err(err) => {
                        log::warn!("Skipping {}: {}", path.display(), err);
                        let skipped = SkippedFile {
                            path: path.clone(),
                            reason: err.to_string(),
                        };
                        (SyntaxTree::empty(id, path), Some(skipped))
                    }
                }
            })
            .collect();

        let (trees, skipped): (Vec<_>, Vec<_>) = results.into_iter().unzip();
        Ok(Self::from_trees(trees, skipped.into_iter().flatten().collect()))
    }

    fn from_trees(trees: Vec<SyntaxTree>, skipped: Vec<SkippedFile>) -> Self {
        let mut table = SymbolTable::new();
        catalog::install(&mut table);
        let mut declared = HashMap::new();
        let mut bound = HashMap::new();
        let mut types = HashMap::new();

        let mut pass = Declarations {
            table: &mut table,
            declared: &mut declared,
        };
        let declared_types: Vec<Vec<_>> = trees.iter().map(|tree| pass.declare_types(tree)).collect();
        for (tree, type_nodes) in trees.iter().zip(declared_types) {
            for (node, ty) in type_nodes {
                pass.declare_members(tree, node, ty);
            }
        }

        for tree in &trees {
            Binder::new(&mut table, tree, &mut declared, &mut bound, &mut types).bind_tree();
        }
        log::debug!(
            "bound {} trees: {} symbols, {} references",
            trees.len(),
            table.len(),
            bound.len()
        );

        Compilation {
            trees,
            table,
            declared,
            bound,
            types,
            skipped,
        }
    }

    pub fn table(&self) -> &SymbolTable {
        &self.table
    }

    pub fn skipped(&self) -> &[SkippedFile] {
        &self.skipped
    }
}

fn is_build_output(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && matches!(
            entry.file_name().to_str(),
            Some("bin" | "obj" | ".git" | ".vs")
        )
}

fn discover(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for root in paths {
        if !root.exists() {
            return Err(Error::file_system(
                "Path does not exist",
                root,
                std::io::Error::from(std::io::ErrorKind::NotFound),
            ));
        }
        for entry in WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| !is_build_output(e))
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    log::warn!("Failed to walk {}: {}", root.display(), err);
                    continue;
                }
            };
            if entry.file_type().is_file() && has_cs_extension(entry.path()) {
                files.push(entry.into_path());
            }
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn has_cs_extension(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("cs")
}

impl SemanticModel for Compilation {
    fn trees(&self) -> &[SyntaxTree] {
        &self.trees
    }

    fn symbol_info(&self, id: SymbolId) -> &Symbol {
        self.table.get(id)
    }

    fn symbol(&self, node: NodeId) -> Option<SymbolId> {
        self.bound.get(&node).copied()
    }

    fn declared_symbol(&self, node: NodeId) -> Option<SymbolId> {
        self.declared.get(&node).copied()
    }

    fn type_of(&self, node: NodeId) -> Option<TypeRef> {
        self.types.get(&node).filter(|t| t.is_resolved()).cloned()
    }

    fn find_type(&self, name: &str) -> Option<SymbolId> {
        match name.split_once('`') {
            Some((base, arity)) => self.table.lookup_type(base, arity.parse().ok()?),
            None => self.table.lookup_type(name, 0),
        }
    }

    fn supertypes(&self, ty: SymbolId) -> Vec<SymbolId> {
        self.table.supertypes(ty)
    }
}
