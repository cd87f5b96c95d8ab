//! Operator semantics on native values

use super::value::Value;
use crate::ast::{BinOp, UnOp};
use crate::error::{InterpResult, RuntimeError, TypeDesc};
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

/// Shapes accepted on the left of `op`
fn operand_shapes(op: BinOp) -> Vec<TypeDesc> {
    match op {
        BinOp::Add | BinOp::Sub => vec![TypeDesc::Integer, TypeDesc::Bits(None)],
        BinOp::Mul
        | BinOp::Div
        | BinOp::DivRm
        | BinOp::Mod
        | BinOp::Pow
        | BinOp::Shl
        | BinOp::Shr
        | BinOp::Lt
        | BinOp::Gt
        | BinOp::Le
        | BinOp::Ge => vec![TypeDesc::Integer],
        BinOp::Eq | BinOp::Ne => vec![
            TypeDesc::Integer,
            TypeDesc::Boolean,
            TypeDesc::Bits(None),
            TypeDesc::String,
        ],
        BinOp::And | BinOp::Or | BinOp::Impl | BinOp::Equiv => vec![TypeDesc::Boolean],
        BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor => vec![TypeDesc::Bits(None)],
    }
}

fn same_shape(a: &TypeDesc, b: &TypeDesc) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

/// Blame the left operand if its shape is wrong for `op`, the right one otherwise
fn operand_mismatch(op: BinOp, left: &Value, right: &Value) -> RuntimeError {
    let shapes = operand_shapes(op);
    let left_desc = left.type_desc();
    if shapes.iter().any(|s| same_shape(s, &left_desc)) {
        RuntimeError::type_mismatch(right, vec![left_desc])
    } else {
        RuntimeError::type_mismatch(left, shapes)
    }
}

fn non_zero(n: &BigInt) -> InterpResult<&BigInt> {
    if n.is_zero() {
        Err(RuntimeError::DivisionByZero)
    } else {
        Ok(n)
    }
}

/// Division rounding towards negative infinity
fn div_floor(a: &BigInt, b: &BigInt) -> BigInt {
    let q = a / b;
    let r = a - &q * b;
    if !r.is_zero() && (r.is_negative() != b.is_negative()) {
        q - 1
    } else {
        q
    }
}

fn shift_amount(v: &Value) -> InterpResult<usize> {
    v.as_int()?
        .to_usize()
        .ok_or_else(|| RuntimeError::type_mismatch(v, vec![TypeDesc::int_from(0)]))
}

pub fn binop(op: BinOp, left: &Value, right: &Value) -> InterpResult<Value> {
    use Value::{Bits, Bool, Int, Str};

    let v = match (op, left, right) {
        // Integer arithmetic
        (BinOp::Add, Int(a), Int(b)) => Int(a + b),
        (BinOp::Sub, Int(a), Int(b)) => Int(a - b),
        (BinOp::Mul, Int(a), Int(b)) => Int(a * b),
        (BinOp::Div, Int(a), Int(b)) => {
            let b = non_zero(b)?;
            if !(a % b).is_zero() {
                return Err(RuntimeError::NonExactDivision {
                    dividend: a.clone(),
                    divisor: b.clone(),
                });
            }
            Int(a / b)
        }
        (BinOp::DivRm, Int(a), Int(b)) => Int(div_floor(a, non_zero(b)?)),
        (BinOp::Mod, Int(a), Int(b)) => {
            let b = non_zero(b)?;
            Int(a - div_floor(a, b) * b)
        }
        (BinOp::Pow, Int(a), Int(_)) => {
            let exp = right
                .as_int()?
                .to_u32()
                .ok_or_else(|| RuntimeError::type_mismatch(right, vec![TypeDesc::int_from(0)]))?;
            Int(a.pow(exp))
        }
        (BinOp::Shl, Int(a), Int(_)) => Int(a << shift_amount(right)?),
        (BinOp::Shr, Int(a), Int(_)) => Int(a >> shift_amount(right)?),

        // Integer comparison
        (BinOp::Lt, Int(a), Int(b)) => Bool(a < b),
        (BinOp::Le, Int(a), Int(b)) => Bool(a <= b),
        (BinOp::Gt, Int(a), Int(b)) => Bool(a > b),
        (BinOp::Ge, Int(a), Int(b)) => Bool(a >= b),

        // Equality on scalar shapes
        (BinOp::Eq | BinOp::Ne, _, _) => {
            let equal = match (left, right) {
                (Int(a), Int(b)) => a == b,
                (Bool(a), Bool(b)) => a == b,
                (Str(a), Str(b)) => a == b,
                (Bits(a), Bits(b)) if a.width() == b.width() => a == b,
                _ => return Err(operand_mismatch(op, left, right)),
            };
            Bool(equal == (op == BinOp::Eq))
        }

        // Boolean connectives
        (BinOp::And, Bool(a), Bool(b)) => Bool(*a && *b),
        (BinOp::Or, Bool(a), Bool(b)) => Bool(*a || *b),
        (BinOp::Impl, Bool(a), Bool(b)) => Bool(!*a || *b),
        (BinOp::Equiv, Bool(a), Bool(b)) => Bool(a == b),

        // Bitvectors of equal width
        (BinOp::BitAnd, Bits(a), Bits(b)) if a.width() == b.width() => Bits(a.and(b)),
        (BinOp::BitOr, Bits(a), Bits(b)) if a.width() == b.width() => Bits(a.or(b)),
        (BinOp::BitXor, Bits(a), Bits(b)) if a.width() == b.width() => Bits(a.xor(b)),
        (BinOp::Add, Bits(a), Bits(b)) if a.width() == b.width() => Bits(a.add_int(&b.to_unsigned())),
        (BinOp::Sub, Bits(a), Bits(b)) if a.width() == b.width() => Bits(a.add_int(&-b.to_unsigned())),
        (BinOp::Add, Bits(a), Int(n)) => Bits(a.add_int(n)),
        (BinOp::Sub, Bits(a), Int(n)) => Bits(a.add_int(&-n)),

        _ => return Err(operand_mismatch(op, left, right)),
    };
    Ok(v)
}

pub fn unop(op: UnOp, v: &Value) -> InterpResult<Value> {
    match (op, v) {
        (UnOp::Neg, Value::Int(n)) => Ok(Value::Int(-n)),
        (UnOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnOp::BitNot, Value::Bits(b)) => Ok(Value::Bits(b.not())),
        (UnOp::Neg, _) => Err(RuntimeError::type_mismatch(v, vec![TypeDesc::Integer])),
        (UnOp::Not, _) => Err(RuntimeError::type_mismatch(v, vec![TypeDesc::Boolean])),
        (UnOp::BitNot, _) => Err(RuntimeError::type_mismatch(v, vec![TypeDesc::Bits(None)])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::bitvector::Bitvector;

    fn int(n: i64) -> Value {
        Value::int(n)
    }

    fn bits(s: &str) -> Value {
        Value::Bits(Bitvector::from_bit_string(s).unwrap())
    }

    fn eval(op: BinOp, a: Value, b: Value) -> String {
        binop(op, &a, &b).unwrap().to_string()
    }

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(eval(BinOp::Add, int(2), int(3)), "5");
        assert_eq!(eval(BinOp::Sub, int(2), int(3)), "-1");
        assert_eq!(eval(BinOp::Mul, int(-4), int(3)), "-12");
        assert_eq!(eval(BinOp::Pow, int(2), int(100)), "1267650600228229401496703205376");
        assert_eq!(eval(BinOp::Shl, int(1), int(4)), "16");
        assert_eq!(eval(BinOp::Shr, int(-7), int(1)), "-4");
    }

    #[test]
    fn test_division_family() {
        assert_eq!(eval(BinOp::Div, int(12), int(4)), "3");
        assert_eq!(eval(BinOp::DivRm, int(-7), int(2)), "-4");
        assert_eq!(eval(BinOp::Mod, int(-7), int(2)), "1");
        assert_eq!(eval(BinOp::Mod, int(7), int(-2)), "-1");
        assert!(matches!(
            binop(BinOp::Div, &int(7), &int(2)),
            Err(RuntimeError::NonExactDivision { .. })
        ));
        assert!(matches!(
            binop(BinOp::Mod, &int(7), &int(0)),
            Err(RuntimeError::DivisionByZero)
        ));
    }

    #[test]
    fn test_comparisons_and_logic() {
        assert_eq!(eval(BinOp::Lt, int(1), int(2)), "TRUE");
        assert_eq!(eval(BinOp::Eq, bits("01"), bits("01")), "TRUE");
        assert_eq!(eval(BinOp::Ne, Value::string("a"), Value::string("b")), "TRUE");
        assert_eq!(eval(BinOp::Impl, Value::Bool(false), Value::Bool(false)), "TRUE");
        assert_eq!(eval(BinOp::Equiv, Value::Bool(true), Value::Bool(false)), "FALSE");
    }

    #[test]
    fn test_bitvector_ops() {
        assert_eq!(eval(BinOp::BitXor, bits("1100"), bits("1010")), "'0110'");
        assert_eq!(eval(BinOp::Add, bits("1111"), int(2)), "'0001'");
        assert_eq!(eval(BinOp::Sub, bits("0000"), bits("0001")), "'1111'");
        assert_eq!(unop(UnOp::BitNot, &bits("10")).unwrap().to_string(), "'01'");
    }

    #[test]
    fn test_width_mismatch_blames_right_operand() {
        let err = binop(BinOp::BitAnd, &bits("10"), &bits("101")).unwrap_err();
        insta::assert_snapshot!(err, @"type mismatch: '101' is not of type bits(2)");
    }

    #[test]
    fn test_wrong_left_operand() {
        let err = binop(BinOp::And, &int(1), &Value::Bool(true)).unwrap_err();
        insta::assert_snapshot!(err, @"type mismatch: 1 is not of type boolean");
    }

    #[test]
    fn test_unop_mismatch() {
        assert_eq!(unop(UnOp::Neg, &int(3)).unwrap().to_string(), "-3");
        assert_eq!(unop(UnOp::Not, &int(3)).unwrap_err().kind(), "type-mismatch");
    }
}
