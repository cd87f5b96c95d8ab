//! Runtime values for the native backend

use super::bitvector::{inferred_width, Bitvector};
use crate::error::{InterpResult, RuntimeError, TypeDesc};
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use std::fmt;

/// Runtime value
#[derive(Debug, Clone)]
pub enum Value {
    /// Arbitrary-precision integer
    Int(BigInt),
    /// Boolean
    Bool(bool),
    /// Bitvector with explicit width
    Bits(Bitvector),
    /// String
    Str(String),
    /// Tuple
    Tuple(Vec<Value>),
    /// Record: ordered (field, value) pairs, names unique
    Record(Vec<(String, Value)>),
    /// Exception: (name, fields)
    Exception(String, Vec<(String, Value)>),
}

fn check_unique(fields: &[(String, Value)]) -> InterpResult<()> {
    for (i, (name, _)) in fields.iter().enumerate() {
        if fields[..i].iter().any(|(other, _)| other == name) {
            return Err(RuntimeError::DuplicateField(name.clone()));
        }
    }
    Ok(())
}

fn replace_field(
    fields: &[(String, Value)],
    field: &str,
    item: Value,
) -> Option<Vec<(String, Value)>> {
    let pos = fields.iter().position(|(name, _)| name == field)?;
    let mut fields = fields.to_vec();
    fields[pos].1 = item;
    Some(fields)
}

impl Value {
    pub fn int(n: impl Into<BigInt>) -> Self {
        Value::Int(n.into())
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    /// Record with unique field names
    pub fn record(fields: Vec<(String, Value)>) -> InterpResult<Self> {
        check_unique(&fields)?;
        Ok(Value::Record(fields))
    }

    /// Exception with unique field names
    pub fn exception(name: &str, fields: Vec<(String, Value)>) -> InterpResult<Self> {
        check_unique(&fields)?;
        Ok(Value::Exception(name.to_string(), fields))
    }

    /// Descriptor of this value's shape
    pub fn type_desc(&self) -> TypeDesc {
        match self {
            Value::Int(_) => TypeDesc::Integer,
            Value::Bool(_) => TypeDesc::Boolean,
            Value::Bits(b) => TypeDesc::Bits(Some(b.width())),
            Value::Str(_) => TypeDesc::String,
            Value::Tuple(_) => TypeDesc::Tuple,
            Value::Record(_) => TypeDesc::Record,
            Value::Exception(_, _) => TypeDesc::Exception,
        }
    }

    fn mismatch(&self, expected: TypeDesc) -> RuntimeError {
        RuntimeError::type_mismatch(self, vec![expected])
    }

    pub fn as_int(&self) -> InterpResult<&BigInt> {
        match self {
            Value::Int(n) => Ok(n),
            _ => Err(self.mismatch(TypeDesc::Integer)),
        }
    }

    pub fn as_bool(&self) -> InterpResult<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            _ => Err(self.mismatch(TypeDesc::Boolean)),
        }
    }

    pub fn as_str(&self) -> InterpResult<&str> {
        match self {
            Value::Str(s) => Ok(s),
            _ => Err(self.mismatch(TypeDesc::String)),
        }
    }

    /// Strict bitvector view; integers are not widened
    pub fn as_bits(&self) -> InterpResult<&Bitvector> {
        match self {
            Value::Bits(b) => Ok(b),
            _ => Err(self.mismatch(TypeDesc::Bits(None))),
        }
    }

    /// Non-negative integer usable as a position or width
    pub fn as_usize(&self) -> InterpResult<usize> {
        self.as_int()?
            .to_usize()
            .ok_or_else(|| self.mismatch(TypeDesc::int_from(0)))
    }

    /// Bitvector view, widening integers with [`inferred_width`]
    pub fn to_bitvector(&self, hint: usize) -> InterpResult<Bitvector> {
        match self {
            Value::Bits(b) => Ok(b.clone()),
            Value::Int(n) => Ok(Bitvector::from_int(inferred_width(n, hint), n)),
            _ => Err(RuntimeError::type_mismatch(
                self,
                vec![TypeDesc::Bits(None), TypeDesc::Integer],
            )),
        }
    }

    /// Bitvector of exactly `width` bits; integers that do not fit are rejected
    pub fn to_bitvector_exact(&self, width: usize) -> InterpResult<Bitvector> {
        let bits = self.to_bitvector(width)?;
        if bits.width() == width {
            Ok(bits)
        } else {
            Err(self.mismatch(TypeDesc::Bits(Some(width))))
        }
    }

    pub fn get_index(&self, index: usize) -> InterpResult<Value> {
        match self {
            Value::Tuple(items) => items.get(index).cloned().ok_or_else(|| RuntimeError::BadIndex {
                index,
                value: self.to_string(),
            }),
            _ => Err(self.mismatch(TypeDesc::Tuple)),
        }
    }

    pub fn set_index(&self, index: usize, item: Value) -> InterpResult<Value> {
        match self {
            Value::Tuple(items) if index < items.len() => {
                let mut items = items.clone();
                items[index] = item;
                Ok(Value::Tuple(items))
            }
            Value::Tuple(_) => Err(RuntimeError::BadIndex {
                index,
                value: self.to_string(),
            }),
            _ => Err(self.mismatch(TypeDesc::Tuple)),
        }
    }

    pub fn get_field(&self, field: &str) -> InterpResult<Value> {
        let fields = match self {
            Value::Record(fields) | Value::Exception(_, fields) => fields,
            _ => {
                return Err(RuntimeError::type_mismatch(
                    self,
                    vec![TypeDesc::Record, TypeDesc::Exception],
                ));
            }
        };
        fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| RuntimeError::bad_field(field, self))
    }

    pub fn set_field(&self, field: &str, item: Value) -> InterpResult<Value> {
        match self {
            Value::Record(fields) => replace_field(fields, field, item)
                .map(Value::Record)
                .ok_or_else(|| RuntimeError::bad_field(field, self)),
            Value::Exception(name, fields) => replace_field(fields, field, item)
                .map(|fields| Value::Exception(name.clone(), fields))
                .ok_or_else(|| RuntimeError::bad_field(field, self)),
            _ => Err(RuntimeError::type_mismatch(
                self,
                vec![TypeDesc::Record, TypeDesc::Exception],
            )),
        }
    }
}

fn fmt_fields(f: &mut fmt::Formatter<'_>, fields: &[(String, Value)]) -> fmt::Result {
    write!(f, "{{ ")?;
    for (i, (name, v)) in fields.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{name} = {v}")?;
    }
    write!(f, " }}")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Bool(true) => write!(f, "TRUE"),
            Value::Bool(false) => write!(f, "FALSE"),
            Value::Bits(b) => write!(f, "{b}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Tuple(items) => {
                write!(f, "(")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, ")")
            }
            Value::Record(fields) => fmt_fields(f, fields),
            Value::Exception(name, fields) => {
                write!(f, "{name} ")?;
                fmt_fields(f, fields)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> Value {
        Value::record(vec![
            ("x".to_string(), Value::int(1)),
            ("y".to_string(), Value::Bool(true)),
        ])
        .unwrap()
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::int(42).to_string(), "42");
        assert_eq!(Value::Bool(false).to_string(), "FALSE");
        assert_eq!(Value::string("hi").to_string(), "\"hi\"");
        assert_eq!(
            Value::Tuple(vec![Value::int(1), Value::Bool(true)]).to_string(),
            "(1, TRUE)"
        );
        assert_eq!(point().to_string(), "{ x = 1, y = TRUE }");
    }

    #[test]
    fn test_record_rejects_duplicate_fields() {
        let err = Value::record(vec![
            ("x".to_string(), Value::int(1)),
            ("x".to_string(), Value::int(2)),
        ])
        .unwrap_err();
        assert!(matches!(err, RuntimeError::DuplicateField(name) if name == "x"));
    }

    #[test]
    fn test_set_field_is_non_destructive() {
        let p = point();
        let q = p.set_field("x", Value::int(9)).unwrap();
        assert_eq!(p.get_field("x").unwrap().to_string(), "1");
        assert_eq!(q.get_field("x").unwrap().to_string(), "9");
        assert_eq!(q.to_string(), "{ x = 9, y = TRUE }");
    }

    #[test]
    fn test_missing_field() {
        let err = point().get_field("z").unwrap_err();
        assert_eq!(err.kind(), "bad-field");
    }

    #[test]
    fn test_exception_fields() {
        let e = Value::exception("Undef", vec![("code".to_string(), Value::int(3))]).unwrap();
        let e2 = e.set_field("code", Value::int(4)).unwrap();
        assert_eq!(e2.to_string(), "Undef { code = 4 }");
    }

    #[test]
    fn test_tuple_index() {
        let t = Value::Tuple(vec![Value::int(1), Value::int(2)]);
        let t2 = t.set_index(1, Value::int(5)).unwrap();
        assert_eq!(t.to_string(), "(1, 2)");
        assert_eq!(t2.to_string(), "(1, 5)");
        assert_eq!(t.get_index(2).unwrap_err().kind(), "bad-index");
        assert_eq!(Value::int(0).get_index(0).unwrap_err().kind(), "type-mismatch");
    }

    #[test]
    fn test_integer_widening() {
        assert_eq!(Value::int(5).to_bitvector(0).unwrap().to_string(), "'101'");
        assert_eq!(Value::int(5).to_bitvector(6).unwrap().to_string(), "'000101'");
        assert_eq!(Value::int(0).to_bitvector(0).unwrap().width(), 1);
        assert!(Value::Bool(true).to_bitvector(0).is_err());
    }

    #[test]
    fn test_exact_widening_rejects_overflow() {
        assert!(Value::int(3).to_bitvector_exact(2).is_ok());
        let err = Value::int(4).to_bitvector_exact(2).unwrap_err();
        insta::assert_snapshot!(err, @"type mismatch: 4 is not of type bits(2)");
    }
}
