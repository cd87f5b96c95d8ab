//! Abstract Syntax Tree definitions
//!
//! The front end is not part of this crate: programs arrive already parsed,
//! either built directly or deserialized with serde.

mod expr;
mod stmt;
mod types;

pub use expr::*;
pub use stmt::*;
pub use types::*;

use serde::{Deserialize, Serialize};

/// A program is a sequence of top-level declarations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    pub decls: Vec<Decl>,
}

impl Program {
    pub fn new(decls: Vec<Decl>) -> Self {
        Program { decls }
    }

    /// Iterate over subprogram declarations
    pub fn functions(&self) -> impl Iterator<Item = &FuncDecl> {
        self.decls.iter().filter_map(|decl| match decl {
            Decl::Func(func) => Some(func),
            Decl::Global(_) => None,
        })
    }
}

/// Top-level declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Decl {
    Func(FuncDecl),
    Global(GlobalDecl),
}

/// Global storage element
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalDecl {
    pub name: String,
    pub ty: Option<Type>,
    pub init: Option<Expr>,
}

/// Whether a subprogram returns a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubprogramKind {
    /// Returns exactly one value
    Function,
    /// Returns nothing
    Procedure,
}

/// Subprogram body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SubprogramBody {
    /// Interpreted statements
    Stmts(Stmt),
    /// Implemented natively by the backend; carries the primitive's name
    Primitive(String),
}

/// Function or procedure declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuncDecl {
    pub name: String,
    /// Type parameters, e.g. the `N` of `bits(N)` arguments
    pub parameters: Vec<String>,
    pub args: Vec<(String, Type)>,
    pub return_type: Option<Type>,
    pub body: SubprogramBody,
    pub kind: SubprogramKind,
}

impl FuncDecl {
    /// A function with interpreted body
    pub fn function(name: &str, args: Vec<(String, Type)>, return_type: Type, body: Stmt) -> Self {
        FuncDecl {
            name: name.to_string(),
            parameters: Vec::new(),
            args,
            return_type: Some(return_type),
            body: SubprogramBody::Stmts(body),
            kind: SubprogramKind::Function,
        }
    }

    /// A procedure with interpreted body
    pub fn procedure(name: &str, args: Vec<(String, Type)>, body: Stmt) -> Self {
        FuncDecl {
            name: name.to_string(),
            parameters: Vec::new(),
            args,
            return_type: None,
            body: SubprogramBody::Stmts(body),
            kind: SubprogramKind::Procedure,
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self.body, SubprogramBody::Primitive(_))
    }
}
