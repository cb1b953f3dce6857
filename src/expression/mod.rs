//! The reference mini-language
//!
//! Raw attribute text is parsed into fragments ([`parser`]), then evaluated
//! against an [`EvalContext`](crate::project::context::EvalContext) either as
//! a string or as an item list ([`eval`]).

pub mod coerce;
pub mod escape;
pub mod eval;
pub mod functions;
pub mod parser;
pub mod reference;

pub use eval::{expand_items, expand_string};
pub use parser::Expression;
pub use reference::{Fragment, ItemReference, MetadataReference, ParseOptions};
