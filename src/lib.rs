//! sasswatch - watch-mode incremental compiler for Sass stylesheets
//!
//! Watches a set of input files and directories, recompiles only the
//! entries affected by a change, and keeps the generated CSS files
//! synchronized with compile success or failure.

pub mod classifier;
pub mod compiler;
pub mod engine;
pub mod entries;
pub mod error;
pub mod event;
pub mod graph;
pub mod paths;
pub mod resolver;
pub mod watcher;
pub mod writer;

// Re-exports for convenience
pub use classifier::{classify, FileEvent, RawEvent, RawEventKind};
pub use compiler::{CompileError, CompileOutcome, Compiler, SassCompiler};
pub use engine::Engine;
pub use entries::{Entry, EntryMapping, EntryTable};
pub use error::{SasswatchError, SasswatchResult, USAGE_EXIT_CODE};
pub use event::WatchEvent;
pub use graph::{FileRecord, ImportGraph};
pub use resolver::{resolve, Resolution};
pub use watcher::watch;
