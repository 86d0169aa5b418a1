//! C# syntax frontend: tree-sitter parsing lowered into an arena tree.

mod lower;
pub mod parser;
pub mod tree;

pub use parser::parse;
pub use tree::*;
