//! pathql value model.
//!
//! This crate defines the values produced by the pathql evaluator.
//!
//! # Modules
//!
//! - [`value`] - Runtime values and the [`Multiset`] result type
//! - [`object`] - Object references with shape and link data
//! - [`render`] - Shape stripping and JSON output
//!
//! Every expression evaluates to a [`Multiset`]; object references compare
//! by identifier alone.

pub mod object;
pub mod render;
pub mod value;

// Re-export commonly used types at crate root
pub use object::Obj;
pub use render::{render, strip_shapes};
pub use value::{Multiset, ObjectId, Value};

pub use uuid::Uuid;
