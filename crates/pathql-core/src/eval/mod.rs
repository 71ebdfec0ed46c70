//! Multiset evaluator.
//!
//! Every expression evaluates to a multiset. Subqueries infer the input
//! paths they range over, enumerate tuples of bound values and evaluate
//! their body once per tuple.

mod executor;
mod navigate;
mod statement;
mod tuples;

pub use executor::{EvalContext, Evaluator, InputTuple};
