//! Data model for the semaflow semantic-analysis framework.
//!
//! This crate holds the vocabulary types the reactor engine
//! (`semaflow-reactor`) computes over:
//!
//! - [`Attribute`]: the (node, name) identity pair keying every computed
//!   value, with [`NodeKey`] as the bound on opaque node handles.
//! - [`AttrValue`]: the heterogeneous value type -- a dynamic payload
//!   ([`AnalysisValue`]) or a semantic error.
//! - [`SemanticError`]: errors-as-values with cause chains and locations.
//! - [`ReactorError`]: fatal contract violations.
//!
//! Everything here is plain data; the evaluation semantics live in the
//! reactor crate.

pub mod attribute;
pub mod error;
pub mod value;

pub use attribute::{Attribute, NodeKey};
pub use error::{ReactorError, SemanticError};
pub use value::{AnalysisValue, AttrValue};
