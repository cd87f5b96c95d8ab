//! ASL native evaluation backend
//!
//! Concrete values, the synchronous effect, bitvector slicing, scope
//! instrumentation and primitive subprograms, plugged into a generic
//! interpreter through the [`backend::Backend`] trait.

pub mod ast;
pub mod backend;
pub mod config;
pub mod driver;
pub mod error;
pub mod instrumentation;
pub mod interp;
pub mod native;

pub use backend::{Backend, Scope};
pub use config::{RunConfig, Strictness};
pub use driver::{RunOutcome, run, run_with_config};
pub use error::{InterpResult, RuntimeError};
