// Shared helpers for valuetrace integration tests
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use valuetrace::{AnalysisConfig, AnalysisContext, Compilation, SemanticModel, SymbolId};

/// Compile a single in-memory source file, panicking on parse errors.
pub fn compile(source: &str) -> Compilation {
    Compilation::from_sources(vec![("test.cs", source)]).expect("source should parse")
}

pub fn context<'a>(model: &'a Compilation, config: &'a AnalysisConfig) -> AnalysisContext<'a> {
    AnalysisContext::new(model, config)
}

/// First member called `name` on type `ty`.
pub fn member(model: &Compilation, ty: &str, name: &str) -> SymbolId {
    let ty = model.find_type(ty).unwrap_or_else(|| panic!("type {ty} not found"));
    model
        .members_named(ty, name)
        .first()
        .copied()
        .unwrap_or_else(|| panic!("member {name} not found"))
}

/// Write `content` to `dir/name`, creating parent directories.
pub fn create_test_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}
