//! Generic interpreter
//!
//! Runs an ASL program against any [`crate::backend::Backend`].

mod env;
mod eval;
mod static_env;

pub use env::Env;
pub use eval::Interpreter;
pub use static_env::StaticEnv;
