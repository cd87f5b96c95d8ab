//! The synchronous effect
//!
//! [`Immediate`] is the identity effect plus fatal-error propagation: every
//! computation has already run by the time it is wrapped.

use crate::error::{InterpResult, RuntimeError};

/// Result of a computation that ran to completion
#[must_use]
#[derive(Debug)]
pub struct Immediate<T>(InterpResult<T>);

impl<T> Immediate<T> {
    pub fn ready(v: T) -> Self {
        Immediate(Ok(v))
    }

    pub fn failed(e: RuntimeError) -> Self {
        Immediate(Err(e))
    }

    /// Leave the effect
    pub fn into_result(self) -> InterpResult<T> {
        self.0
    }

    /// Apply `k` to the value, skipping it on failure
    pub fn and_then<R>(self, k: impl FnOnce(T) -> Immediate<R>) -> Immediate<R> {
        match self.0 {
            Ok(v) => k(v),
            Err(e) => Immediate(Err(e)),
        }
    }
}

impl<T> From<InterpResult<T>> for Immediate<T> {
    fn from(r: InterpResult<T>) -> Self {
        Immediate(r)
    }
}
