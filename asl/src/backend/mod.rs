//! Backend capability interface
//!
//! The generic interpreter in [`crate::interp`] only ever talks to a
//! [`Backend`]. A backend decides what a runtime value is and how evaluation
//! steps are sequenced; the native backend in [`crate::native`] evaluates
//! eagerly, a symbolic backend could instead build terms and defer work.

use crate::ast::{BinOp, Literal, UnOp};
use crate::error::InterpResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::ControlFlow;

/// Where an identifier binding lives.
///
/// Local scopes carry an instance number so that two activations of the same
/// subprogram (recursion, re-entrancy) never alias each other's variables.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// Global storage; `init` is set while global initialisers run
    Global { init: bool },
    /// Activation of a subprogram
    Local { subprogram: String, instance: u32 },
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global { init: true } => write!(f, "global(init)"),
            Scope::Global { init: false } => write!(f, "global"),
            Scope::Local { subprogram, instance } => write!(f, "{subprogram}#{instance}"),
        }
    }
}

/// Everything the generic interpreter needs from a backend.
///
/// Effect combinators are associated functions so that continuations may
/// freely borrow the interpreter that owns the backend.
pub trait Backend {
    /// Runtime value
    type Value: Clone + fmt::Debug + fmt::Display;

    /// Computation producing a `T`
    type Effect<T>;

    // ---- Effects ----

    /// Lift a pure value into the effect
    fn ret<T>(v: T) -> Self::Effect<T>;

    /// Lift a fallible result; errors abort the computation
    fn lift<T>(r: InterpResult<T>) -> Self::Effect<T>;

    /// Sequence `m` then feed its value to `k`
    fn bind<A, R>(m: Self::Effect<A>, k: impl FnOnce(A) -> Self::Effect<R>) -> Self::Effect<R>;

    /// Combine two effects into a pair-valued effect
    fn prod<A, C>(a: Self::Effect<A>, c: Self::Effect<C>) -> Self::Effect<(A, C)>;

    /// Select one of two already-built branches on a boolean effect
    fn choice<T>(
        cond: Self::Effect<Self::Value>,
        yes: Self::Effect<T>,
        no: Self::Effect<T>,
    ) -> Self::Effect<T>;

    /// Run exactly one of two branch thunks on a resolved boolean.
    ///
    /// The selected thunk receives `ctx`, so both thunks can work on the same
    /// mutable state without capturing it.
    fn ternary<C: ?Sized, T>(
        cond: &Self::Value,
        ctx: &mut C,
        yes: impl FnOnce(&mut C) -> Self::Effect<T>,
        no: impl FnOnce(&mut C) -> Self::Effect<T>,
    ) -> Self::Effect<T>;

    /// Hand `k` the pending value both strictly and as a lazy effect
    fn delay<A: Clone, R>(
        m: Self::Effect<A>,
        k: impl FnOnce(A, Self::Effect<A>) -> Self::Effect<R>,
    ) -> Self::Effect<R>;

    /// Run `step` from `init` until it breaks. Each step sees the state the
    /// previous one continued with; iterations do not nest.
    fn repeat<C: ?Sized, S, R>(
        ctx: &mut C,
        init: S,
        step: impl FnMut(&mut C, S) -> Self::Effect<ControlFlow<R, S>>,
    ) -> Self::Effect<R>;

    // ---- Values ----

    fn v_of_int(n: i64) -> Self::Value;

    fn v_of_literal(lit: &Literal) -> InterpResult<Self::Value>;

    /// Concrete machine integer, if the value denotes one
    fn v_to_int(v: &Self::Value) -> Option<i64>;

    /// Concrete boolean, type mismatch otherwise
    fn v_to_bool(v: &Self::Value) -> InterpResult<bool>;

    fn create_tuple(items: Vec<Self::Value>) -> Self::Value;

    fn get_index(index: usize, v: &Self::Value) -> InterpResult<Self::Value>;

    fn set_index(index: usize, item: Self::Value, v: &Self::Value) -> InterpResult<Self::Value>;

    fn create_record(fields: Vec<(String, Self::Value)>) -> InterpResult<Self::Value>;

    fn create_exception(name: &str, fields: Vec<(String, Self::Value)>) -> InterpResult<Self::Value>;

    /// Name of an exception value, type mismatch otherwise
    fn exception_name(v: &Self::Value) -> InterpResult<String>;

    fn get_field(field: &str, v: &Self::Value) -> InterpResult<Self::Value>;

    fn set_field(field: &str, item: Self::Value, v: &Self::Value) -> InterpResult<Self::Value>;

    /// Default value of a bitvector of the given width (all zeros)
    fn zeros(width: &Self::Value) -> InterpResult<Self::Value>;

    fn binop(op: BinOp, left: &Self::Value, right: &Self::Value) -> InterpResult<Self::Value>;

    fn unop(op: UnOp, v: &Self::Value) -> InterpResult<Self::Value>;

    // ---- Bitvectors ----

    /// Extract `(start, length)` slices, first slice most significant
    fn read_from_bitvector(
        positions: &[(Self::Value, Self::Value)],
        source: &Self::Value,
    ) -> InterpResult<Self::Value>;

    /// Overwrite `(start, length)` slices of `dest` with `bits`
    fn write_to_bitvector(
        positions: &[(Self::Value, Self::Value)],
        bits: &Self::Value,
        dest: &Self::Value,
    ) -> InterpResult<Self::Value>;

    /// Concatenate, first element most significant
    fn concat_bitvectors(values: &[Self::Value]) -> InterpResult<Self::Value>;

    // ---- Primitives ----

    /// Call a natively implemented subprogram by name
    fn call_primitive(&mut self, name: &str, args: Vec<Self::Value>) -> Self::Effect<Vec<Self::Value>>;

    // ---- Hooks ----

    fn on_write_identifier(&mut self, id: &str, scope: &Scope, v: &Self::Value);

    fn on_read_identifier(&mut self, id: &str, scope: &Scope, v: &Self::Value);

    /// Diagnostic for paths a correct run should never take
    fn warn(&self, message: &str);
}
