//! Primitive function library
//!
//! Built-ins whose bodies are Rust functions. Each one is also exposed as an
//! ordinary declaration (see [`declarations`]) so programs can call it like
//! any other subprogram; the interpreter then routes the call back here
//! through [`crate::backend::Backend::call_primitive`].

use super::value::Value;
use crate::ast::{Decl, FuncDecl, SubprogramBody, SubprogramKind, Type};
use crate::error::{InterpResult, RuntimeError, TypeDesc};
use num_bigint::BigInt;
use num_traits::{One, ToPrimitive};
use std::io::{self, Write};

/// Native body: argument values in, result values out
pub type PrimitiveFn = fn(&[Value]) -> InterpResult<Vec<Value>>;

/// Declared type of a primitive argument or result
#[derive(Debug, Clone, Copy)]
pub enum ArgType {
    Integer,
    String,
    /// `bits(P)` for a type parameter `P`
    BitsOf(&'static str),
}

impl ArgType {
    fn to_type(self) -> Type {
        match self {
            ArgType::Integer => Type::Integer,
            ArgType::String => Type::String,
            ArgType::BitsOf(param) => Type::bits_of(param),
        }
    }
}

/// A natively implemented subprogram
#[derive(Debug, Clone, Copy)]
pub struct PrimitiveDef {
    pub name: &'static str,
    pub parameters: &'static [&'static str],
    pub args: &'static [(&'static str, ArgType)],
    /// `None` for procedures
    pub returns: Option<ArgType>,
    pub body: PrimitiveFn,
}

impl PrimitiveDef {
    pub fn kind(&self) -> SubprogramKind {
        if self.returns.is_some() {
            SubprogramKind::Function
        } else {
            SubprogramKind::Procedure
        }
    }

    /// Declaration whose body is tagged as primitive
    pub fn declaration(&self) -> FuncDecl {
        FuncDecl {
            name: self.name.to_string(),
            parameters: self.parameters.iter().map(|p| p.to_string()).collect(),
            args: self
                .args
                .iter()
                .map(|(name, ty)| (name.to_string(), ty.to_type()))
                .collect(),
            return_type: self.returns.map(ArgType::to_type),
            body: SubprogramBody::Primitive(self.name.to_string()),
            kind: self.kind(),
        }
    }
}

/// Most arguments `print` accepts
pub const PRINT_MAX_ARGS: usize = 4;

const PRIMITIVES: &[PrimitiveDef] = &[
    PrimitiveDef {
        name: "UInt",
        parameters: &["N"],
        args: &[("x", ArgType::BitsOf("N"))],
        returns: Some(ArgType::Integer),
        body: prim_uint,
    },
    PrimitiveDef {
        name: "SInt",
        parameters: &["N"],
        args: &[("x", ArgType::BitsOf("N"))],
        returns: Some(ArgType::Integer),
        body: prim_sint,
    },
    PrimitiveDef {
        name: "DecStr",
        parameters: &[],
        args: &[("x", ArgType::Integer)],
        returns: Some(ArgType::String),
        body: prim_dec_str,
    },
    PrimitiveDef {
        name: "HexStr",
        parameters: &[],
        args: &[("x", ArgType::Integer)],
        returns: Some(ArgType::String),
        body: prim_hex_str,
    },
    PrimitiveDef {
        name: "AsciiStr",
        parameters: &[],
        args: &[("x", ArgType::Integer)],
        returns: Some(ArgType::String),
        body: prim_ascii_str,
    },
    PrimitiveDef {
        name: "Log2",
        parameters: &[],
        args: &[("x", ArgType::Integer)],
        returns: Some(ArgType::Integer),
        body: prim_log2,
    },
    PrimitiveDef {
        name: "print",
        parameters: &[],
        args: &[
            ("s1", ArgType::String),
            ("s2", ArgType::String),
            ("s3", ArgType::String),
            ("s4", ArgType::String),
        ],
        returns: None,
        body: prim_print,
    },
];

/// Every primitive
pub fn all() -> &'static [PrimitiveDef] {
    PRIMITIVES
}

/// Find a primitive by name
pub fn lookup(name: &str) -> Option<&'static PrimitiveDef> {
    PRIMITIVES.iter().find(|p| p.name == name)
}

/// Declarations to prepend to an untyped program
pub fn declarations() -> Vec<Decl> {
    PRIMITIVES.iter().map(|p| Decl::Func(p.declaration())).collect()
}

fn check_arity(name: &str, args: &[Value], expected: usize) -> InterpResult<()> {
    if args.len() != expected {
        return Err(RuntimeError::bad_arity(name, expected, args.len()));
    }
    Ok(())
}

/// UInt(x: bits(N)) -> integer
fn prim_uint(args: &[Value]) -> InterpResult<Vec<Value>> {
    check_arity("UInt", args, 1)?;
    let bits = args[0].as_bits()?;
    Ok(vec![Value::Int(bits.to_unsigned())])
}

/// SInt(x: bits(N)) -> integer
fn prim_sint(args: &[Value]) -> InterpResult<Vec<Value>> {
    check_arity("SInt", args, 1)?;
    let bits = args[0].as_bits()?;
    Ok(vec![Value::Int(bits.to_signed())])
}

/// DecStr(x: integer) -> string
fn prim_dec_str(args: &[Value]) -> InterpResult<Vec<Value>> {
    check_arity("DecStr", args, 1)?;
    let n = args[0].as_int()?;
    Ok(vec![Value::Str(n.to_string())])
}

/// HexStr(x: integer) -> string
/// Lowercase digits, no prefix, no padding; negatives get a leading `-`.
fn prim_hex_str(args: &[Value]) -> InterpResult<Vec<Value>> {
    check_arity("HexStr", args, 1)?;
    let n = args[0].as_int()?;
    Ok(vec![Value::Str(format!("{n:x}"))])
}

/// AsciiStr(x: integer {0..127}) -> string
fn prim_ascii_str(args: &[Value]) -> InterpResult<Vec<Value>> {
    check_arity("AsciiStr", args, 1)?;
    let code = args[0]
        .as_int()?
        .to_u8()
        .filter(u8::is_ascii)
        .ok_or_else(|| RuntimeError::type_mismatch(&args[0], vec![TypeDesc::int_range(0, 127)]))?;
    Ok(vec![Value::Str(char::from(code).to_string())])
}

/// Log2(x: integer {1..}) -> integer, rounded down
fn prim_log2(args: &[Value]) -> InterpResult<Vec<Value>> {
    check_arity("Log2", args, 1)?;
    let n = args[0].as_int()?;
    if *n < BigInt::one() {
        return Err(RuntimeError::type_mismatch(n, vec![TypeDesc::int_from(1)]));
    }
    Ok(vec![Value::int(n.bits() - 1)])
}

/// print(s1, ..., sk) for k <= 4
fn prim_print(args: &[Value]) -> InterpResult<Vec<Value>> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    print_to(&mut out, args)?;
    Ok(Vec::new())
}

/// Write the space-joined strings and a newline to `out`, then flush
pub fn print_to(out: &mut impl Write, args: &[Value]) -> InterpResult<()> {
    if args.len() > PRINT_MAX_ARGS {
        return Err(RuntimeError::bad_arity("print", PRINT_MAX_ARGS, args.len()));
    }
    let parts = args
        .iter()
        .map(Value::as_str)
        .collect::<InterpResult<Vec<_>>>()?;
    writeln!(out, "{}", parts.join(" "))?;
    out.flush()?;
    Ok(())
}
