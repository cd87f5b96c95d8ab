//! Program driver
//!
//! Runs a program on the native backend and turns the value returned by
//! `main()` into a process exit code.

use crate::ast::Program;
use crate::config::{RunConfig, Strictness};
use crate::error::{InterpResult, RuntimeError, TypeDesc};
use crate::instrumentation::TraceEvent;
use crate::interp::{Interpreter, StaticEnv};
use crate::native::{NativeBackend, Value, primitives};
use num_traits::ToPrimitive;
use serde::Serialize;

/// Result of a completed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub exit_code: i32,
    /// Distinct identifier accesses; empty unless instrumentation was on
    pub trace: Vec<TraceEvent>,
    /// Backend diagnostics raised during the run; 0 for a well-formed run
    /// without an unrolling bound
    pub warnings: u32,
}

/// Run `program`.
///
/// With a static environment the program is taken as already checked and
/// runs against it; primitives must be declared there. Without one, the
/// primitive declarations are prepended and a static environment is built
/// from the program under `strictness`.
pub fn run(
    strictness: Strictness,
    instrument: bool,
    static_env: Option<&StaticEnv>,
    program: &Program,
) -> InterpResult<RunOutcome> {
    run_with_config(&RunConfig::new(strictness, instrument), static_env, program)
}

/// [`run`] with every configuration knob exposed
pub fn run_with_config(
    config: &RunConfig,
    static_env: Option<&StaticEnv>,
    program: &Program,
) -> InterpResult<RunOutcome> {
    tracing::info!(
        strictness = ?config.strictness,
        instrument = config.instrument,
        typed = static_env.is_some(),
        "running program"
    );
    let backend = NativeBackend::new(config);
    let (value, backend) = match static_env {
        Some(env) => execute(backend, config, env, program)?,
        None => {
            let program = with_primitives(program);
            let env = StaticEnv::build(&program, config.strictness)?;
            execute(backend, config, &env, &program)?
        }
    };

    let exit_code = exit_code(&value)?;
    let trace = backend.trace();
    let warnings = backend.warnings();
    tracing::info!(exit_code, events = trace.len(), warnings, "program finished");
    Ok(RunOutcome {
        exit_code,
        trace,
        warnings,
    })
}

fn execute(
    backend: NativeBackend,
    config: &RunConfig,
    env: &StaticEnv,
    program: &Program,
) -> InterpResult<(Value, NativeBackend)> {
    let mut interp = Interpreter::new(backend, env).with_unroll(config.unroll);
    let value = interp.run(program).into_result()?;
    Ok((value, interp.into_backend()))
}

/// `program` preceded by the primitive declarations
pub fn with_primitives(program: &Program) -> Program {
    let mut decls = primitives::declarations();
    decls.extend(program.decls.iter().cloned());
    Program::new(decls)
}

/// The terminal value must be an integer that fits a machine exit status
fn exit_code(value: &Value) -> InterpResult<i32> {
    value.as_int()?.to_i32().ok_or_else(|| {
        RuntimeError::type_mismatch(value, vec![TypeDesc::int_range(i32::MIN, i32::MAX)])
    })
}
