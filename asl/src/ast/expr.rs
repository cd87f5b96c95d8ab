//! Expression AST nodes

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

/// Literal constant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Literal {
    /// Integer literal
    Int(BigInt),
    /// Boolean literal
    Bool(bool),
    /// Bitvector literal, most significant bit first: `'1010'`
    Bits(String),
    /// String literal
    String(String),
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Int(n) => write!(f, "{n}"),
            Literal::Bool(true) => write!(f, "TRUE"),
            Literal::Bool(false) => write!(f, "FALSE"),
            Literal::Bits(bits) => write!(f, "'{bits}'"),
            Literal::String(s) => write!(f, "{s:?}"),
        }
    }
}

/// Expression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    /// Literal constant
    Literal(Literal),

    /// Variable reference
    Var(String),

    /// Binary operation
    Binop {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Unary operation
    Unop { op: UnOp, expr: Box<Expr> },

    /// Function call (returns exactly one value)
    Call { func: String, args: Vec<Expr> },

    /// Bit slice: `expr[slices]`
    Slice { expr: Box<Expr>, slices: Vec<Slice> },

    /// Bitvector concatenation: `[e1, e2, ...]`, first element most significant
    Concat(Vec<Expr>),

    /// Conditional: `if cond then yes else no`
    Cond {
        cond: Box<Expr>,
        yes: Box<Expr>,
        no: Box<Expr>,
    },

    /// Tuple construction
    Tuple(Vec<Expr>),

    /// Tuple projection
    GetItem { expr: Box<Expr>, index: usize },

    /// Record construction: `{ f1 = e1, f2 = e2 }`
    Record(Vec<(String, Expr)>),

    /// Field access: `expr.field`
    GetField { expr: Box<Expr>, field: String },

    /// Exception construction: `Name { f1 = e1 }`
    Exception {
        name: String,
        fields: Vec<(String, Expr)>,
    },
}

impl Expr {
    pub fn int(n: impl Into<BigInt>) -> Self {
        Expr::Literal(Literal::Int(n.into()))
    }

    pub fn bool(b: bool) -> Self {
        Expr::Literal(Literal::Bool(b))
    }

    pub fn bits(bits: &str) -> Self {
        Expr::Literal(Literal::Bits(bits.to_string()))
    }

    pub fn string(s: &str) -> Self {
        Expr::Literal(Literal::String(s.to_string()))
    }

    pub fn var(name: &str) -> Self {
        Expr::Var(name.to_string())
    }

    pub fn binop(op: BinOp, left: Expr, right: Expr) -> Self {
        Expr::Binop {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn call(func: &str, args: Vec<Expr>) -> Self {
        Expr::Call {
            func: func.to_string(),
            args,
        }
    }

    pub fn slice(expr: Expr, slices: Vec<Slice>) -> Self {
        Expr::Slice {
            expr: Box::new(expr),
            slices,
        }
    }
}

/// Slice descriptor inside `[...]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Slice {
    /// Single bit: `[i]`
    Single(Expr),
    /// Inclusive range, high bit first: `[hi:lo]`
    Range(Expr, Expr),
    /// Start and length: `[start +: len]`
    Length(Expr, Expr),
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    /// Exact integer division
    Div,
    /// Division rounding towards negative infinity
    DivRm,
    Mod,
    Pow,
    Shl,
    Shr,

    // Comparison
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,

    // Logical
    And,
    Or,
    Impl,
    Equiv,

    // Bitwise on bitvectors
    BitAnd,
    BitOr,
    BitXor,
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "DIV",
            BinOp::DivRm => "DIVRM",
            BinOp::Mod => "MOD",
            BinOp::Pow => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::Impl => "-->",
            BinOp::Equiv => "<->",
            BinOp::BitAnd => "AND",
            BinOp::BitOr => "OR",
            BinOp::BitXor => "XOR",
        };
        write!(f, "{s}")
    }
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    /// Integer negation (-)
    Neg,
    /// Logical not (!)
    Not,
    /// Bitwise not on bitvectors (NOT)
    BitNot,
}

impl std::fmt::Display for UnOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnOp::Neg => write!(f, "-"),
            UnOp::Not => write!(f, "!"),
            UnOp::BitNot => write!(f, "NOT"),
        }
    }
}
