//! Runtime errors
//!
//! Every error raised while executing a program is fatal: nothing in this
//! crate catches a [`RuntimeError`], it travels back to whoever called the
//! driver.

use num_bigint::BigInt;
use std::fmt;
use thiserror::Error;

/// Result type alias
pub type InterpResult<T> = std::result::Result<T, RuntimeError>;

/// Descriptor of an acceptable runtime shape, carried by type mismatches
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDesc {
    Integer,
    /// Integer constrained to an inclusive range; either bound may be open
    IntegerRange {
        lo: Option<BigInt>,
        hi: Option<BigInt>,
    },
    Boolean,
    /// Bitvector, optionally of a known width
    Bits(Option<usize>),
    String,
    Tuple,
    Record,
    Exception,
}

impl TypeDesc {
    pub fn int_range(lo: impl Into<BigInt>, hi: impl Into<BigInt>) -> Self {
        TypeDesc::IntegerRange {
            lo: Some(lo.into()),
            hi: Some(hi.into()),
        }
    }

    pub fn int_from(lo: impl Into<BigInt>) -> Self {
        TypeDesc::IntegerRange {
            lo: Some(lo.into()),
            hi: None,
        }
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDesc::Integer => write!(f, "integer"),
            TypeDesc::IntegerRange { lo, hi } => {
                write!(f, "integer {{")?;
                if let Some(lo) = lo {
                    write!(f, "{lo}")?;
                }
                write!(f, "..")?;
                if let Some(hi) = hi {
                    write!(f, "{hi}")?;
                }
                write!(f, "}}")
            }
            TypeDesc::Boolean => write!(f, "boolean"),
            TypeDesc::Bits(Some(width)) => write!(f, "bits({width})"),
            TypeDesc::Bits(None) => write!(f, "bits(-)"),
            TypeDesc::String => write!(f, "string"),
            TypeDesc::Tuple => write!(f, "tuple"),
            TypeDesc::Record => write!(f, "record"),
            TypeDesc::Exception => write!(f, "exception"),
        }
    }
}

fn one_of(expected: &[TypeDesc]) -> String {
    expected
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Runtime error
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    /// Wrong runtime shape for an operation
    #[error("type mismatch: {value} is not of type {}", one_of(.expected))]
    TypeMismatch {
        /// Printed form of the offending value
        value: String,
        expected: Vec<TypeDesc>,
    },

    /// Wrong number of arguments to a subprogram
    #[error("bad arity: {name} expects {expected} argument(s), got {actual}")]
    BadArity {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("undefined identifier: {0}")]
    UndefinedIdentifier(String),

    #[error("no field {field} in {value}")]
    BadField { field: String, value: String },

    #[error("index {index} out of bounds in {value}")]
    BadIndex { index: usize, value: String },

    #[error("duplicate field {0}")]
    DuplicateField(String),

    #[error("slice [{start} +: {length}] out of range for bits({width})")]
    BadSlice {
        start: BigInt,
        length: BigInt,
        width: usize,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("{dividend} DIV {divisor} is not exact")]
    NonExactDivision { dividend: BigInt, divisor: BigInt },

    #[error("assertion failed")]
    AssertionFailed,

    #[error("uncaught exception: {0}")]
    UncaughtException(String),

    #[error("static check failed: {0}")]
    StaticCheck(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl RuntimeError {
    pub fn type_mismatch(value: impl fmt::Display, expected: Vec<TypeDesc>) -> Self {
        RuntimeError::TypeMismatch {
            value: value.to_string(),
            expected,
        }
    }

    pub fn bad_arity(name: &str, expected: usize, actual: usize) -> Self {
        RuntimeError::BadArity {
            name: name.to_string(),
            expected,
            actual,
        }
    }

    pub fn undefined_identifier(name: &str) -> Self {
        RuntimeError::UndefinedIdentifier(name.to_string())
    }

    pub fn bad_field(field: &str, value: impl fmt::Display) -> Self {
        RuntimeError::BadField {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    pub fn static_check(message: impl Into<String>) -> Self {
        RuntimeError::StaticCheck(message.into())
    }

    /// Short machine-friendly name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            RuntimeError::TypeMismatch { .. } => "type-mismatch",
            RuntimeError::BadArity { .. } => "bad-arity",
            RuntimeError::UndefinedIdentifier(_) => "undefined-identifier",
            RuntimeError::BadField { .. } => "bad-field",
            RuntimeError::BadIndex { .. } => "bad-index",
            RuntimeError::DuplicateField(_) => "duplicate-field",
            RuntimeError::BadSlice { .. } => "bad-slice",
            RuntimeError::DivisionByZero => "division-by-zero",
            RuntimeError::NonExactDivision { .. } => "non-exact-division",
            RuntimeError::AssertionFailed => "assertion-failed",
            RuntimeError::UncaughtException(_) => "uncaught-exception",
            RuntimeError::StaticCheck(_) => "static-check",
            RuntimeError::Io(_) => "io",
        }
    }
}

impl From<std::io::Error> for RuntimeError {
    fn from(e: std::io::Error) -> Self {
        RuntimeError::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mismatch_message() {
        let err = RuntimeError::type_mismatch("TRUE", vec![TypeDesc::Bits(None), TypeDesc::Integer]);
        assert_eq!(err.kind(), "type-mismatch");
        insta::assert_snapshot!(err, @"type mismatch: TRUE is not of type bits(-) or integer");
    }

    #[test]
    fn test_bad_arity_message() {
        let err = RuntimeError::bad_arity("UInt", 1, 2);
        insta::assert_snapshot!(err, @"bad arity: UInt expects 1 argument(s), got 2");
    }

    #[test]
    fn test_type_desc_display() {
        assert_eq!(TypeDesc::int_range(0, 127).to_string(), "integer {0..127}");
        assert_eq!(TypeDesc::int_from(1).to_string(), "integer {1..}");
        assert_eq!(TypeDesc::Bits(Some(8)).to_string(), "bits(8)");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::other("pipe closed");
        let err: RuntimeError = io.into();
        assert_eq!(err.kind(), "io");
        assert!(err.to_string().contains("pipe closed"));
    }
}
