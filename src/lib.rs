//! rbuild - a declarative project build evaluator
//!
//! A project file declares properties, items with metadata, and targets made
//! of tasks. rbuild evaluates the description in passes, partitions item
//! lists into batches by metadata, and builds targets in dependency order,
//! skipping those whose outputs are up to date.

// Public modules
pub mod batching;
pub mod cli;
pub mod condition;
pub mod config;
pub mod error;
pub mod events;
pub mod expression;
pub mod project;
pub mod runner;
pub mod tasks;

// Re-export commonly used types
pub use error::{BuildError, Result, RbuildError};
pub use project::Project;
pub use runner::{BuildSummary, Session};

/// Current version of rbuild
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
