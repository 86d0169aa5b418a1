//! Shared error types for the crate
//!
//! Analysis never fails on malformed or unresolvable input: those cases
//! degrade to a conservative classification. The only error a traversal
//! returns is [`Error::Cancelled`]; the remaining variants come from the
//! frontend (reading and parsing files) and from configuration loading.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for valuetrace operations
#[derive(Debug, Error)]
pub enum Error {
    /// File system related errors
    #[error("File system error: {message}")]
    FileSystem {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Syntax errors reported by the parser
    #[error("Parse error in {file}:{line}:{column}: {message}")]
    Parse {
        file: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },

    /// Analysis errors
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The caller abandoned the query through its cancellation token
    #[error("Analysis cancelled")]
    Cancelled,

    /// Generic errors with context
    #[error("{context}: {message}")]
    WithContext { context: String, message: String },

    /// IO errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a file system error with path context
    pub fn file_system(
        message: impl Into<String>,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::FileSystem {
            message: message.into(),
            path: Some(path.into()),
            source: Some(source),
        }
    }

    /// Create a parse error with location
    pub fn parse(
        file: impl Into<PathBuf>,
        line: usize,
        column: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::Parse {
            file: file.into(),
            line,
            column,
            message: message.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        match self {
            // cancellation must stay recognisable after wrapping
            Self::Cancelled => Self::Cancelled,
            other => Self::WithContext {
                context: context.into(),
                message: other.to_string(),
            },
        }
    }
}

/// Result type alias using our error type
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_displays_location() {
        let err = Error::parse("src/Foo.cs", 3, 14, "expected ';'");
        assert_eq!(err.to_string(), "Parse error in src/Foo.cs:3:14: expected ';'");
    }

    #[test]
    fn context_wraps_message() {
        let result: Result<()> = Err(Error::Analysis("no model".into()));
        let err = result.context("classifying field").unwrap_err();
        assert_eq!(err.to_string(), "classifying field: Analysis error: no model");
    }

    #[test]
    fn context_keeps_cancellation() {
        let result: Result<()> = Err(Error::Cancelled);
        assert!(result.context("walking").unwrap_err().is_cancelled());
    }
}
