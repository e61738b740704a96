//! Error types for sasswatch
//!
//! Uses `thiserror` for library errors. Compile failures are not errors in
//! this sense: they are recoverable per-entry events carried by
//! [`crate::compiler::CompileError`] and never abort the watch loop.

use thiserror::Error;

/// Result type alias for sasswatch operations
pub type SasswatchResult<T> = Result<T, SasswatchError>;

/// Exit code for command-line usage errors
pub const USAGE_EXIT_CODE: i32 = 64;

/// Main error type for sasswatch operations
#[derive(Error, Debug)]
pub enum SasswatchError {
    /// Invalid command-line usage; printed to stdout, exits 64
    #[error("{message}")]
    Usage { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The filesystem watcher itself failed; fatal, no recovery path
    #[error("watcher error: {0}")]
    Watch(String),
}

impl SasswatchError {
    /// Build a usage error from a fixed message
    pub fn usage(message: impl Into<String>) -> Self {
        SasswatchError::Usage {
            message: message.into(),
        }
    }
}
