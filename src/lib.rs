// Export modules for library usage
pub mod cancellation;
pub mod classify;
pub mod cli;
pub mod config;
pub mod context;
pub mod disposal;
pub mod errors;
pub mod flow;
pub mod pool;
pub mod report;
pub mod semantic;
pub mod syntax;

// Re-export commonly used types
pub use crate::cancellation::CancellationToken;
pub use crate::classify::{
    classify, classify_all, classify_creation, classify_provenance, Creation, OriginKind,
    Provenance, ProvenanceRule, Target, ValueOrigin,
};
pub use crate::config::{load_config, load_config_from, AnalysisConfig};
pub use crate::context::{AnalysisContext, Capability};
pub use crate::disposal::{find_dispose_method, is_member_disposed};
pub use crate::errors::{Error, Result, ResultExt};
pub use crate::flow::implementations::find_implementations;
pub use crate::report::{build_report, Finding, MemberReport, Report};
pub use crate::semantic::{Compilation, SemanticModel, SymbolId};
pub use crate::syntax::NodeId;
