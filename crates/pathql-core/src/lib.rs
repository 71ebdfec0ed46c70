//! pathql Core - Scope inference and multiset evaluation.
//!
//! This crate evaluates pathql query trees against an in-memory graph store.
//! Queries never name their iteration variables: the evaluator finds the
//! paths a query mentions ([`scope`]), binds their longest shared prefixes
//! once per row ([`infer`]) and evaluates the query over every combination
//! of bound values ([`eval`]).
//!
//! ```no_run
//! use pathql_core::{fixtures, Evaluator};
//! use pathql_lang::builder::*;
//!
//! let store = fixtures::sample_store()?;
//! let query = select(shape(name("Person"), vec![element("name")]))
//!     .filter(binop("=", partial(vec![ptr("name")]), str_lit("Phil Emarg")))
//!     .build();
//! let result = Evaluator::new(&store).run(&query)?;
//! println!("{}", result);
//! # Ok::<(), pathql_core::Error>(())
//! ```

pub mod basis;
pub mod config;
pub mod error;
pub mod eval;
pub mod fixtures;
pub mod infer;
pub mod path;
pub mod scope;
pub mod store;

pub use basis::{CallEnv, OpKind, Operator, ParamKind, Registry};
pub use config::EvalBudget;
pub use error::{Error, ErrorKind};
pub use eval::{EvalContext, Evaluator, InputTuple};
pub use path::{Path, PathElement};
pub use scope::{analyze, find_references, Analysis, Reference};
pub use store::{Record, Store, VIRTUAL_OBJECT};
