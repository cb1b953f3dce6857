//! Project description loading and validation
//!
//! This module is the input boundary: it reads rbuild.yml files, flattens
//! imports into one document-ordered element list and validates structure.

pub mod parse;
pub mod schema;
pub mod types;

// Re-export main types
pub use parse::*;
pub use schema::*;
pub use types::*;
