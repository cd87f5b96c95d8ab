//! Type AST nodes

use super::Expr;
use serde::{Deserialize, Serialize};

/// Type annotation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Type {
    /// Unconstrained arbitrary-precision integer
    Integer,
    /// Boolean
    Boolean,
    /// Bitvector whose width is given by an expression (possibly a type parameter)
    Bits(Box<Expr>),
    /// String
    String,
    /// Tuple of types
    Tuple(Vec<Type>),
    /// Record with ordered fields
    Record(Vec<(String, Type)>),
    /// Exception with ordered fields
    Exception(Vec<(String, Type)>),
    /// Named type (resolved by the external type-checker)
    Named(String),
}

impl Type {
    /// `bits(N)` where `N` is a type parameter
    pub fn bits_of(param: &str) -> Self {
        Type::Bits(Box::new(Expr::Var(param.to_string())))
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Integer => write!(f, "integer"),
            Type::Boolean => write!(f, "boolean"),
            Type::Bits(width) => match width.as_ref() {
                Expr::Var(name) => write!(f, "bits({name})"),
                Expr::Literal(lit) => write!(f, "bits({lit})"),
                _ => write!(f, "bits(-)"),
            },
            Type::String => write!(f, "string"),
            Type::Tuple(tys) => {
                write!(f, "(")?;
                for (i, ty) in tys.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{ty}")?;
                }
                write!(f, ")")
            }
            Type::Record(fields) | Type::Exception(fields) => {
                let kw = if matches!(self, Type::Record(_)) { "record" } else { "exception" };
                write!(f, "{kw} {{ ")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {ty}")?;
                }
                write!(f, " }}")
            }
            Type::Named(name) => write!(f, "{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_display() {
        assert_eq!(Type::Integer.to_string(), "integer");
        assert_eq!(Type::bits_of("N").to_string(), "bits(N)");
        assert_eq!(
            Type::Tuple(vec![Type::Boolean, Type::String]).to_string(),
            "(boolean, string)"
        );
        assert_eq!(
            Type::Record(vec![("a".to_string(), Type::Integer)]).to_string(),
            "record { a: integer }"
        );
    }
}
