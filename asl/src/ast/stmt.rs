//! Statement AST nodes

use super::{Expr, Slice, Type};
use serde::{Deserialize, Serialize};

/// Assignable location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LExpr {
    /// `-` (value is evaluated and dropped)
    Discard,
    /// Variable
    Var(String),
    /// Bit slice of a location: `x[7:4]`
    Slice(Box<LExpr>, Vec<Slice>),
    /// Record or exception field: `x.f`
    Field(Box<LExpr>, String),
    /// Tuple element: `x.item0`
    Item(Box<LExpr>, usize),
}

impl LExpr {
    pub fn var(name: &str) -> Self {
        LExpr::Var(name.to_string())
    }
}

/// Statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Stmt {
    /// No-op
    Pass,
    /// Sequence of statements sharing one block scope
    Seq(Vec<Stmt>),
    /// Local declaration: `var x: ty = init;`
    Decl {
        name: String,
        ty: Option<Type>,
        init: Option<Expr>,
    },
    /// Assignment to an existing location
    Assign(LExpr, Expr),
    /// Procedure call (result discarded)
    Call { func: String, args: Vec<Expr> },
    /// Return from the enclosing subprogram
    Return(Option<Expr>),
    /// Conditional
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Box<Stmt>,
    },
    /// Counted loop; both bounds inclusive
    For {
        index: String,
        start: Expr,
        end: Expr,
        downto: bool,
        body: Box<Stmt>,
    },
    /// Pre-tested loop
    While { cond: Expr, body: Box<Stmt> },
    /// Assertion; failure is fatal
    Assert(Expr),
    /// Raise an exception value; `None` rethrows the exception being handled
    Throw(Option<Expr>),
    /// Exception handler
    Try {
        body: Box<Stmt>,
        catchers: Vec<Catcher>,
        otherwise: Option<Box<Stmt>>,
    },
}

impl Stmt {
    pub fn decl(name: &str, init: Expr) -> Self {
        Stmt::Decl {
            name: name.to_string(),
            ty: None,
            init: Some(init),
        }
    }

    pub fn assign(name: &str, value: Expr) -> Self {
        Stmt::Assign(LExpr::var(name), value)
    }

    pub fn ret(value: Expr) -> Self {
        Stmt::Return(Some(value))
    }

    pub fn call(func: &str, args: Vec<Expr>) -> Self {
        Stmt::Call {
            func: func.to_string(),
            args,
        }
    }
}

/// `catch name: Exception => body`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catcher {
    /// Optional binding for the caught exception
    pub binding: Option<String>,
    /// Exception name matched by this handler
    pub exception: String,
    pub body: Stmt,
}
