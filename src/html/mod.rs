//! HTML entry-document rewriting.
//!
//! - [`dom`]: arena document tree and serializer
//! - [`parser`]: lenient HTML parser
//! - [`writer`]: the [`writer::HtmlWriter`] stage and its insertion cursor

pub mod dom;
pub mod parser;
pub mod writer;
