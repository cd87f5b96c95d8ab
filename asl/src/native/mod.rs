//! Native (eager) backend
//!
//! Values are concrete, effects are [`Immediate`]: every operation runs as
//! soon as it is issued.

pub mod bitvector;
pub mod effect;
pub mod ops;
pub mod primitives;
pub mod value;

pub use bitvector::Bitvector;
pub use effect::Immediate;
pub use value::Value;

use crate::ast::{BinOp, Literal, UnOp};
use crate::backend::{Backend, Scope};
use crate::config::RunConfig;
use crate::error::{InterpResult, RuntimeError, TypeDesc};
use crate::instrumentation::{Instrumentation, TraceEvent};
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use std::cell::Cell;
use std::ops::ControlFlow;

/// Eager backend over [`Value`]
pub struct NativeBackend {
    trace: Box<dyn Instrumentation>,
    /// Diagnostics raised through [`Backend::warn`]
    warnings: Cell<u32>,
}

impl NativeBackend {
    /// Backend with a fresh instrumentation buffer chosen by `config`
    pub fn new(config: &RunConfig) -> Self {
        Self::with_instrumentation(config.instrumentation_buffer())
    }

    /// Backend recording into a caller-supplied buffer
    pub fn with_instrumentation(mut trace: Box<dyn Instrumentation>) -> Self {
        trace.reset();
        NativeBackend {
            trace,
            warnings: Cell::new(0),
        }
    }

    /// Events recorded so far
    pub fn trace(&self) -> Vec<TraceEvent> {
        self.trace.contents()
    }

    pub fn warnings(&self) -> u32 {
        self.warnings.get()
    }
}

/// Resolve `(start, length)` value pairs to machine positions
fn positions(slices: &[(Value, Value)]) -> InterpResult<Vec<(usize, usize)>> {
    slices
        .iter()
        .map(|(start, length)| {
            let s = start.as_int()?;
            let l = length.as_int()?;
            match (s.to_usize(), l.to_usize()) {
                (Some(start), Some(length)) if start.checked_add(length).is_some() => {
                    Ok((start, length))
                }
                _ => Err(RuntimeError::BadSlice {
                    start: s.clone(),
                    length: l.clone(),
                    width: 0,
                }),
            }
        })
        .collect()
}

/// Highest referenced bit + 1, the positional width hint for integer sources.
/// [`positions`] already rejected pairs whose end overflows.
fn width_hint(positions: &[(usize, usize)]) -> usize {
    positions
        .iter()
        .map(|&(s, l)| s.saturating_add(l))
        .max()
        .unwrap_or(0)
}

/// Sum of the slice lengths
fn total_length(positions: &[(usize, usize)]) -> InterpResult<usize> {
    positions.iter().try_fold(0usize, |total, &(start, length)| {
        total
            .checked_add(length)
            .ok_or_else(|| bad_slice(start, length, 0))
    })
}

fn bad_slice(start: usize, length: usize, width: usize) -> RuntimeError {
    RuntimeError::BadSlice {
        start: BigInt::from(start),
        length: BigInt::from(length),
        width,
    }
}

impl Backend for NativeBackend {
    type Value = Value;
    type Effect<T> = Immediate<T>;

    fn ret<T>(v: T) -> Self::Effect<T> {
        Immediate::ready(v)
    }

    fn lift<T>(r: InterpResult<T>) -> Self::Effect<T> {
        Immediate::from(r)
    }

    fn bind<A, R>(m: Self::Effect<A>, k: impl FnOnce(A) -> Self::Effect<R>) -> Self::Effect<R> {
        m.and_then(k)
    }

    fn prod<A, C>(a: Self::Effect<A>, c: Self::Effect<C>) -> Self::Effect<(A, C)> {
        match (a.into_result(), c.into_result()) {
            (Ok(a), Ok(c)) => Immediate::ready((a, c)),
            (Err(e), _) | (_, Err(e)) => Immediate::failed(e),
        }
    }

    fn choice<T>(
        cond: Self::Effect<Value>,
        yes: Self::Effect<T>,
        no: Self::Effect<T>,
    ) -> Self::Effect<T> {
        cond.and_then(|v| match v.as_bool() {
            Ok(true) => yes,
            Ok(false) => no,
            Err(e) => Immediate::failed(e),
        })
    }

    fn ternary<C: ?Sized, T>(
        cond: &Value,
        ctx: &mut C,
        yes: impl FnOnce(&mut C) -> Self::Effect<T>,
        no: impl FnOnce(&mut C) -> Self::Effect<T>,
    ) -> Self::Effect<T> {
        match cond.as_bool() {
            Ok(true) => yes(ctx),
            Ok(false) => no(ctx),
            Err(e) => Immediate::failed(e),
        }
    }

    fn delay<A: Clone, R>(
        m: Self::Effect<A>,
        k: impl FnOnce(A, Self::Effect<A>) -> Self::Effect<R>,
    ) -> Self::Effect<R> {
        m.and_then(|v| {
            let lazy = Immediate::ready(v.clone());
            k(v, lazy)
        })
    }

    fn repeat<C: ?Sized, S, R>(
        ctx: &mut C,
        init: S,
        mut step: impl FnMut(&mut C, S) -> Self::Effect<ControlFlow<R, S>>,
    ) -> Self::Effect<R> {
        let mut state = init;
        loop {
            match step(ctx, state).into_result() {
                Ok(ControlFlow::Continue(next)) => state = next,
                Ok(ControlFlow::Break(r)) => return Immediate::ready(r),
                Err(e) => return Immediate::failed(e),
            }
        }
    }

    fn v_of_int(n: i64) -> Value {
        Value::int(n)
    }

    fn v_of_literal(lit: &Literal) -> InterpResult<Value> {
        match lit {
            Literal::Int(n) => Ok(Value::Int(n.clone())),
            Literal::Bool(b) => Ok(Value::Bool(*b)),
            Literal::Bits(s) => Bitvector::from_bit_string(s)
                .map(Value::Bits)
                .ok_or_else(|| RuntimeError::type_mismatch(lit, vec![TypeDesc::Bits(None)])),
            Literal::String(s) => Ok(Value::Str(s.clone())),
        }
    }

    fn v_to_int(v: &Value) -> Option<i64> {
        match v {
            Value::Int(n) => n.to_i64(),
            _ => None,
        }
    }

    fn v_to_bool(v: &Value) -> InterpResult<bool> {
        v.as_bool()
    }

    fn create_tuple(items: Vec<Value>) -> Value {
        Value::Tuple(items)
    }

    fn get_index(index: usize, v: &Value) -> InterpResult<Value> {
        v.get_index(index)
    }

    fn set_index(index: usize, item: Value, v: &Value) -> InterpResult<Value> {
        v.set_index(index, item)
    }

    fn create_record(fields: Vec<(String, Value)>) -> InterpResult<Value> {
        Value::record(fields)
    }

    fn create_exception(name: &str, fields: Vec<(String, Value)>) -> InterpResult<Value> {
        Value::exception(name, fields)
    }

    fn exception_name(v: &Value) -> InterpResult<String> {
        match v {
            Value::Exception(name, _) => Ok(name.clone()),
            _ => Err(RuntimeError::type_mismatch(v, vec![TypeDesc::Exception])),
        }
    }

    fn get_field(field: &str, v: &Value) -> InterpResult<Value> {
        v.get_field(field)
    }

    fn set_field(field: &str, item: Value, v: &Value) -> InterpResult<Value> {
        v.set_field(field, item)
    }

    fn zeros(width: &Value) -> InterpResult<Value> {
        Ok(Value::Bits(Bitvector::zeros(width.as_usize()?)))
    }

    fn binop(op: BinOp, left: &Value, right: &Value) -> InterpResult<Value> {
        ops::binop(op, left, right)
    }

    fn unop(op: UnOp, v: &Value) -> InterpResult<Value> {
        ops::unop(op, v)
    }

    fn read_from_bitvector(slices: &[(Value, Value)], source: &Value) -> InterpResult<Value> {
        let positions = positions(slices)?;
        // Integers are as wide as the highest referenced bit
        let parts: Vec<Bitvector> = match source {
            Value::Int(n) => positions
                .iter()
                .map(|&(start, length)| Bitvector::extract_int(n, start, length))
                .collect(),
            _ => {
                let source = source.to_bitvector(0)?;
                positions
                    .iter()
                    .map(|&(start, length)| {
                        source
                            .extract(start, length)
                            .ok_or_else(|| bad_slice(start, length, source.width()))
                    })
                    .collect::<InterpResult<Vec<_>>>()?
            }
        };
        Ok(Value::Bits(Bitvector::concat(&parts)))
    }

    fn write_to_bitvector(
        slices: &[(Value, Value)],
        bits: &Value,
        dest: &Value,
    ) -> InterpResult<Value> {
        let positions = positions(slices)?;
        let total = total_length(&positions)?;
        let bits = bits.to_bitvector_exact(total)?;
        let mut out = dest.to_bitvector(width_hint(&positions))?;
        // Slices are listed most significant first, so consume `bits` from the top.
        let mut consumed = 0;
        for &(start, length) in &positions {
            let chunk = bits
                .extract(total - consumed - length, length)
                .ok_or_else(|| bad_slice(start, length, out.width()))?;
            out = out
                .write(start, &chunk)
                .ok_or_else(|| bad_slice(start, length, out.width()))?;
            consumed += length;
        }
        Ok(Value::Bits(out))
    }

    fn concat_bitvectors(values: &[Value]) -> InterpResult<Value> {
        let parts = values
            .iter()
            .map(|v| v.to_bitvector(0))
            .collect::<InterpResult<Vec<_>>>()?;
        Ok(Value::Bits(Bitvector::concat(&parts)))
    }

    fn call_primitive(&mut self, name: &str, args: Vec<Value>) -> Self::Effect<Vec<Value>> {
        tracing::trace!(primitive = name, argc = args.len(), "primitive call");
        match primitives::lookup(name) {
            Some(def) => Immediate::from((def.body)(&args)),
            None => Immediate::failed(RuntimeError::undefined_identifier(name)),
        }
    }

    fn on_write_identifier(&mut self, id: &str, scope: &Scope, _v: &Value) {
        self.trace.record(TraceEvent::Write {
            identifier: id.to_string(),
            scope: scope.clone(),
        });
    }

    fn on_read_identifier(&mut self, id: &str, scope: &Scope, _v: &Value) {
        self.trace.record(TraceEvent::Read {
            identifier: id.to_string(),
            scope: scope.clone(),
        });
    }

    fn warn(&self, message: &str) {
        self.warnings.set(self.warnings.get() + 1);
        tracing::warn!(backend = "native", "{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Strictness;
    use crate::instrumentation::TraceSet;

    type N = NativeBackend;

    fn bits(s: &str) -> Value {
        Value::Bits(Bitvector::from_bit_string(s).unwrap())
    }

    fn pos(start: i64, length: i64) -> (Value, Value) {
        (Value::int(start), Value::int(length))
    }

    /// `[hi:lo]` as a `(start, length)` pair
    fn range(hi: i64, lo: i64) -> (Value, Value) {
        pos(lo, hi - lo + 1)
    }

    #[test]
    fn test_read_slices_in_descriptor_order() {
        let src = bits("11001010");
        let out = N::read_from_bitvector(&[range(7, 4)], &src).unwrap();
        assert_eq!(out.to_string(), "'1100'");
        let swapped = N::read_from_bitvector(&[range(3, 0), range(7, 4)], &src).unwrap();
        assert_eq!(swapped.to_string(), "'10101100'");
    }

    #[test]
    fn test_read_from_integer_widens_to_highest_position() {
        let out = N::read_from_bitvector(&[range(7, 0)], &Value::int(-1)).unwrap();
        assert_eq!(out.to_string(), "'11111111'");
        let out = N::read_from_bitvector(&[pos(0, 1)], &Value::int(6)).unwrap();
        assert_eq!(out.to_string(), "'0'");
    }

    #[test]
    fn test_read_out_of_range() {
        let err = N::read_from_bitvector(&[range(8, 0)], &bits("1010")).unwrap_err();
        insta::assert_snapshot!(err, @"slice [0 +: 9] out of range for bits(4)");
        let err = N::read_from_bitvector(&[pos(-1, 2)], &bits("1010")).unwrap_err();
        assert_eq!(err.kind(), "bad-slice");
    }

    #[test]
    fn test_slice_end_past_usize_is_bad_slice() {
        let at_max = (Value::Int(BigInt::from(usize::MAX)), Value::int(1));
        for source in [Value::int(5), bits("1010")] {
            let err = N::read_from_bitvector(&[at_max.clone()], &source).unwrap_err();
            assert_eq!(err.kind(), "bad-slice");
        }
        let err = N::write_to_bitvector(&[at_max], &bits("1"), &bits("1010")).unwrap_err();
        assert_eq!(err.kind(), "bad-slice");
    }

    #[test]
    fn test_write_lengths_summing_past_usize_is_bad_slice() {
        let slices = [
            (Value::int(0), Value::Int(BigInt::from(usize::MAX))),
            pos(0, 1),
        ];
        let err = N::write_to_bitvector(&slices, &bits("1"), &Value::int(0)).unwrap_err();
        assert_eq!(err.kind(), "bad-slice");
    }

    #[test]
    fn test_read_far_bit_of_integer() {
        let far = (Value::Int(BigInt::from(1u64 << 36)), Value::int(1));
        let out = N::read_from_bitvector(&[far.clone()], &Value::int(5)).unwrap();
        assert_eq!(out.to_string(), "'0'");
        let out = N::read_from_bitvector(&[far], &Value::int(-5)).unwrap();
        assert_eq!(out.to_string(), "'1'");
    }

    #[test]
    fn test_write_then_read_back() {
        let dest = bits("00000000");
        let slices = [range(6, 5), range(1, 0)];
        let written = N::write_to_bitvector(&slices, &bits("1101"), &dest).unwrap();
        assert_eq!(written.to_string(), "'01100001'");
        let back = N::read_from_bitvector(&slices, &written).unwrap();
        assert_eq!(back.to_string(), "'1101'");
    }

    #[test]
    fn test_write_leaves_other_bits_alone() {
        let dest = bits("10110110");
        let written = N::write_to_bitvector(&[range(4, 2)], &bits("000"), &dest).unwrap();
        let before = dest.as_bits().unwrap().clone();
        let after = written.as_bits().unwrap().clone();
        assert_eq!(after.width(), 8);
        for i in (0..2).chain(5..8) {
            assert_eq!(before.bit(i), after.bit(i), "bit {i} changed");
        }
    }

    #[test]
    fn test_write_integer_bits_must_fit() {
        let dest = bits("0000");
        let ok = N::write_to_bitvector(&[range(1, 0)], &Value::int(3), &dest).unwrap();
        assert_eq!(ok.to_string(), "'0011'");
        let err = N::write_to_bitvector(&[range(1, 0)], &Value::int(4), &dest).unwrap_err();
        assert_eq!(err.kind(), "type-mismatch");
    }

    #[test]
    fn test_concat_width_and_round_trip() {
        let a = bits("101");
        let b = bits("0011");
        let c = N::concat_bitvectors(&[a.clone(), b]).unwrap();
        assert_eq!(c.as_bits().unwrap().width(), 7);
        // `a` sits in the most significant bits of the result
        let back = N::read_from_bitvector(&[range(6, 4)], &c).unwrap();
        assert_eq!(back.to_string(), a.to_string());
        let low = N::read_from_bitvector(&[range(2, 0)], &a).unwrap();
        assert_eq!(low.to_string(), a.to_string());
    }

    #[test]
    fn test_concat_widens_integers() {
        let c = N::concat_bitvectors(&[bits("1"), Value::int(2)]).unwrap();
        assert_eq!(c.to_string(), "'110'");
        assert!(N::concat_bitvectors(&[Value::Bool(true)]).is_err());
    }

    #[test]
    fn test_effect_combinators() {
        let pair = N::prod(N::ret(1), N::ret("x")).into_result().unwrap();
        assert_eq!(pair, (1, "x"));

        let picked = N::choice(N::ret(Value::Bool(false)), N::ret(1), N::ret(2));
        assert_eq!(picked.into_result().unwrap(), 2);
        let bad = N::choice(N::ret(Value::int(0)), N::ret(1), N::ret(2));
        assert_eq!(bad.into_result().unwrap_err().kind(), "type-mismatch");

        let mut runs = Vec::new();
        let out = N::ternary(
            &Value::Bool(true),
            &mut runs,
            |runs| {
                runs.push("then");
                N::ret(10)
            },
            |runs| {
                runs.push("else");
                N::ret(20)
            },
        );
        assert_eq!(out.into_result().unwrap(), 10);
        assert_eq!(runs, vec!["then"]);

        let delayed = N::delay(N::ret(5), |strict, lazy| {
            N::bind(lazy, move |v| N::ret(strict + v))
        });
        assert_eq!(delayed.into_result().unwrap(), 10);
    }

    #[test]
    fn test_repeat_runs_iterations_in_place() {
        let mut steps = 0u64;
        let out = N::repeat(&mut steps, 0u64, |steps, i| {
            *steps += 1;
            N::ret(if i == 5_000_000 {
                ControlFlow::Break(i)
            } else {
                ControlFlow::Continue(i + 1)
            })
        });
        assert_eq!(out.into_result().unwrap(), 5_000_000);
        assert_eq!(steps, 5_000_001);
    }

    #[test]
    fn test_repeat_stops_on_failure() {
        let mut steps = 0;
        let out: Immediate<()> = N::repeat(&mut steps, (), |steps, ()| {
            *steps += 1;
            if *steps == 3 {
                N::lift(Err(RuntimeError::DivisionByZero))
            } else {
                N::ret(ControlFlow::Continue(()))
            }
        });
        assert_eq!(out.into_result().unwrap_err().kind(), "division-by-zero");
        assert_eq!(steps, 3);
    }

    #[test]
    fn test_warn_is_counted() {
        let backend = N::new(&RunConfig::default());
        assert_eq!(backend.warnings(), 0);
        backend.warn("unexpected path");
        assert_eq!(backend.warnings(), 1);
    }

    #[test]
    fn test_failed_effect_skips_continuation() {
        let failed: Immediate<i32> = N::lift(Err(RuntimeError::DivisionByZero));
        let out = N::bind(failed, |_| -> Immediate<i32> { panic!("continuation ran") });
        assert_eq!(out.into_result().unwrap_err().kind(), "division-by-zero");
    }

    #[test]
    fn test_hooks_record_only_when_instrumented() {
        let scope = Scope::Global { init: false };
        let mut quiet = N::new(&RunConfig::new(Strictness::Silence, false));
        quiet.on_write_identifier("x", &scope, &Value::int(1));
        assert!(quiet.trace().is_empty());

        let mut loud = N::with_instrumentation(Box::new(TraceSet::new()));
        let v = Value::int(1);
        loud.on_write_identifier("x", &scope, &v);
        loud.on_read_identifier("x", &scope, &v);
        loud.on_read_identifier("x", &scope, &v);
        assert_eq!(loud.trace().len(), 2);
        assert_eq!(v.to_string(), "1");
    }

    #[test]
    fn test_call_primitive() {
        let mut backend = N::new(&RunConfig::default());
        let out = backend
            .call_primitive("UInt", vec![bits("101")])
            .into_result()
            .unwrap();
        assert_eq!(out[0].to_string(), "5");
        let err = backend.call_primitive("Nope", vec![]).into_result().unwrap_err();
        assert_eq!(err.kind(), "undefined-identifier");
    }

    #[test]
    fn test_literals() {
        let lit = Literal::Bits("10x".to_string());
        assert_eq!(N::v_of_literal(&lit).unwrap_err().kind(), "type-mismatch");
        assert_eq!(N::v_to_int(&Value::int(-3)), Some(-3));
        assert_eq!(N::v_to_int(&Value::Bool(true)), None);
    }
}
