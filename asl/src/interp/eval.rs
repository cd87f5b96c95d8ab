//! Reference interpreter
//!
//! Walks the AST against any [`Backend`]. Every value operation, every
//! sequencing step and every variable access goes through the backend, so the
//! same walker drives the native backend and any other implementation of the
//! trait.
//!
//! ASL exceptions are ordinary control flow here: expressions produce a
//! `Step`, statements a `Flow`, and both carry an exception value outwards
//! until a `try` handles it. Only fatal errors travel in the effect itself.

use super::env::Env;
use super::static_env::StaticEnv;
use crate::ast::{
    BinOp, Catcher, Decl, Expr, FuncDecl, GlobalDecl, LExpr, Literal, Program, Slice, Stmt,
    SubprogramBody, Type,
};
use crate::backend::Backend;
use crate::error::{InterpResult, RuntimeError};
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::rc::Rc;

/// Stack growth parameters for deep recursion
const STACK_RED_ZONE: usize = 128 * 1024; // 128KB remaining triggers growth
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024; // Grow by 4MB each time

type Eff<B, T> = <B as Backend>::Effect<T>;

/// Outcome of evaluating an expression
#[derive(Debug, Clone)]
enum Step<T, V> {
    Normal(T),
    /// An exception is propagating
    Throwing(V),
}

/// How control leaves a statement
#[derive(Debug, Clone)]
enum Flow<V> {
    Next,
    Return(Option<V>),
    Throwing(V),
}

/// Expressions that cannot call a subprogram, hence cannot throw or print
fn is_pure(expr: &Expr) -> bool {
    match expr {
        Expr::Literal(_) | Expr::Var(_) => true,
        Expr::Call { .. } => false,
        Expr::Binop { left, right, .. } => is_pure(left) && is_pure(right),
        Expr::Unop { expr, .. } | Expr::GetItem { expr, .. } | Expr::GetField { expr, .. } => {
            is_pure(expr)
        }
        Expr::Slice { expr, slices } => is_pure(expr) && slices.iter().all(slice_is_pure),
        Expr::Concat(items) | Expr::Tuple(items) => items.iter().all(is_pure),
        Expr::Cond { cond, yes, no } => is_pure(cond) && is_pure(yes) && is_pure(no),
        Expr::Record(fields) | Expr::Exception { fields, .. } => {
            fields.iter().all(|(_, e)| is_pure(e))
        }
    }
}

fn slice_is_pure(slice: &Slice) -> bool {
    match slice {
        Slice::Single(e) => is_pure(e),
        Slice::Range(a, b) | Slice::Length(a, b) => is_pure(a) && is_pure(b),
    }
}

/// The interpreter
pub struct Interpreter<B: Backend> {
    backend: B,
    env: Env<B::Value>,
    /// Callable subprograms, primitives included
    subprograms: HashMap<String, Rc<FuncDecl>>,
    /// Exceptions whose handlers are running, innermost last
    handling: Vec<B::Value>,
    /// Loop iterations before `Backend::warn` fires; 0 disables the check
    unroll: u32,
}

impl<B: Backend> Interpreter<B> {
    /// Interpreter resolving calls against `static_env`
    pub fn new(backend: B, static_env: &StaticEnv) -> Self {
        Interpreter {
            backend,
            env: Env::new(),
            subprograms: static_env
                .subprograms()
                .map(|decl| (decl.name.clone(), Rc::new(decl.clone())))
                .collect(),
            handling: Vec::new(),
            unroll: 0,
        }
    }

    pub fn with_unroll(mut self, unroll: u32) -> Self {
        self.unroll = unroll;
        self
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Initialise global storage in declaration order, then evaluate `main()`.
    ///
    /// Subprograms of `program` take precedence over same-named entries of the
    /// static environment.
    pub fn run(&mut self, program: &Program) -> Eff<B, B::Value> {
        for func in program.functions() {
            self.subprograms.insert(func.name.clone(), Rc::new(func.clone()));
        }
        let globals: Vec<&GlobalDecl> = program
            .decls
            .iter()
            .filter_map(|decl| match decl {
                Decl::Global(global) => Some(global),
                Decl::Func(_) => None,
            })
            .collect();
        tracing::debug!(
            globals = globals.len(),
            subprograms = self.subprograms.len(),
            "loading program"
        );

        self.env.set_initialising(true);
        let init = self.init_globals(&globals);
        B::bind(init, |step| {
            self.env.set_initialising(false);
            match step {
                Step::Throwing(exc) => Self::uncaught(&exc),
                Step::Normal(()) => B::bind(self.call("main", Vec::new()), |step| match step {
                    Step::Normal(mut results) => match (results.pop(), results.is_empty()) {
                        (Some(v), true) => B::ret(v),
                        _ => B::lift(Err(RuntimeError::static_check(
                            "main must return exactly one value",
                        ))),
                    },
                    Step::Throwing(exc) => Self::uncaught(&exc),
                }),
            }
        })
    }

    fn uncaught<T>(exc: &B::Value) -> Eff<B, T> {
        B::lift(Err(RuntimeError::UncaughtException(exc.to_string())))
    }

    fn init_globals(&mut self, globals: &[&GlobalDecl]) -> Eff<B, Step<(), B::Value>> {
        let Some((global, rest)) = globals.split_first() else {
            return Self::normal(());
        };
        let value = match (&global.init, &global.ty) {
            (Some(init), _) => self.eval_expr(init),
            (None, Some(ty)) => self.base_value(ty),
            (None, None) => {
                return Self::fallible(Err(RuntimeError::static_check(format!(
                    "global {} needs a type or an initialiser",
                    global.name
                ))));
            }
        };
        Self::then(value, |v| {
            let scope = self.env.declare_global(global.name.clone(), v.clone());
            self.backend.on_write_identifier(&global.name, &scope, &v);
            self.init_globals(rest)
        })
    }

    // ---- Step plumbing ----

    fn normal<T>(v: T) -> Eff<B, Step<T, B::Value>> {
        B::ret(Step::Normal(v))
    }

    fn fallible<T>(r: InterpResult<T>) -> Eff<B, Step<T, B::Value>> {
        B::bind(B::lift(r), |v| B::ret(Step::Normal(v)))
    }

    /// Continue with the value of `m`; a thrown exception skips `k`
    fn then<T, R>(
        m: Eff<B, Step<T, B::Value>>,
        k: impl FnOnce(T) -> Eff<B, Step<R, B::Value>>,
    ) -> Eff<B, Step<R, B::Value>> {
        B::bind(m, |step| match step {
            Step::Normal(v) => k(v),
            Step::Throwing(exc) => B::ret(Step::Throwing(exc)),
        })
    }

    fn then_flow<T>(
        m: Eff<B, Step<T, B::Value>>,
        k: impl FnOnce(T) -> Eff<B, Flow<B::Value>>,
    ) -> Eff<B, Flow<B::Value>> {
        B::bind(m, |step| match step {
            Step::Normal(v) => k(v),
            Step::Throwing(exc) => B::ret(Flow::Throwing(exc)),
        })
    }

    /// Pair two independent outcomes; the first exception wins
    fn both<T, U>(
        a: Eff<B, Step<T, B::Value>>,
        c: Eff<B, Step<U, B::Value>>,
    ) -> Eff<B, Step<(T, U), B::Value>> {
        B::bind(B::prod(a, c), |pair| {
            B::ret(match pair {
                (Step::Normal(a), Step::Normal(c)) => Step::Normal((a, c)),
                (Step::Throwing(exc), _) | (_, Step::Throwing(exc)) => Step::Throwing(exc),
            })
        })
    }

    // ---- Variables ----

    fn read_var(&mut self, name: &str) -> InterpResult<B::Value> {
        let (v, scope) = self
            .env
            .lookup(name)
            .ok_or_else(|| RuntimeError::undefined_identifier(name))?;
        self.backend.on_read_identifier(name, &scope, &v);
        Ok(v)
    }

    fn write_var(&mut self, name: &str, v: B::Value) -> InterpResult<()> {
        let scope = self
            .env
            .assign(name, v.clone())
            .ok_or_else(|| RuntimeError::undefined_identifier(name))?;
        self.backend.on_write_identifier(name, &scope, &v);
        Ok(())
    }

    fn declare_local(&mut self, name: &str, v: B::Value) {
        let scope = self.env.current_scope();
        self.backend.on_write_identifier(name, &scope, &v);
        self.env.declare(name.to_string(), v);
    }

    // ---- Expressions ----

    /// Evaluate an expression with automatic stack growth for deep recursion
    fn eval_expr(&mut self, expr: &Expr) -> Eff<B, Step<B::Value, B::Value>> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.eval_expr_inner(expr))
    }

    fn eval_expr_inner(&mut self, expr: &Expr) -> Eff<B, Step<B::Value, B::Value>> {
        match expr {
            Expr::Literal(lit) => Self::fallible(B::v_of_literal(lit)),
            Expr::Var(name) => Self::fallible(self.read_var(name)),
            Expr::Binop { op, left, right } => {
                let op = *op;
                if matches!(op, BinOp::And | BinOp::Or | BinOp::Impl) {
                    self.eval_short_circuit(op, left, right)
                } else {
                    Self::then(self.eval_pair(left, right), move |(l, r)| {
                        Self::fallible(B::binop(op, &l, &r))
                    })
                }
            }
            Expr::Unop { op, expr } => {
                let op = *op;
                Self::then(self.eval_expr(expr), move |v| Self::fallible(B::unop(op, &v)))
            }
            Expr::Call { func, args } => Self::then(self.eval_exprs(args), |args| {
                Self::then(self.call(func, args), |mut results| {
                    match (results.pop(), results.is_empty()) {
                        (Some(v), true) => Self::normal(v),
                        _ => Self::fallible(Err(RuntimeError::static_check(format!(
                            "{func} does not return exactly one value"
                        )))),
                    }
                })
            }),
            Expr::Slice { expr, slices } => Self::then(self.eval_expr(expr), |v| {
                Self::then(self.eval_slices(slices), |positions| {
                    Self::fallible(B::read_from_bitvector(&positions, &v))
                })
            }),
            Expr::Concat(items) => Self::then(self.eval_exprs(items), |values| {
                Self::fallible(B::concat_bitvectors(&values))
            }),
            Expr::Cond { cond, yes, no } => Self::then(self.eval_expr(cond), |c| {
                B::ternary(&c, self, |this| this.eval_expr(yes), |this| this.eval_expr(no))
            }),
            Expr::Tuple(items) => {
                Self::then(self.eval_exprs(items), |values| Self::normal(B::create_tuple(values)))
            }
            Expr::GetItem { expr, index } => {
                let index = *index;
                Self::then(self.eval_expr(expr), move |v| Self::fallible(B::get_index(index, &v)))
            }
            Expr::Record(fields) => Self::then(self.eval_fields(fields), |fields| {
                Self::fallible(B::create_record(fields))
            }),
            Expr::GetField { expr, field } => {
                Self::then(self.eval_expr(expr), |v| Self::fallible(B::get_field(field, &v)))
            }
            Expr::Exception { name, fields } => Self::then(self.eval_fields(fields), |fields| {
                Self::fallible(B::create_exception(name, fields))
            }),
        }
    }

    /// `&&`, `||` and `-->` evaluate their right operand only when needed
    fn eval_short_circuit(
        &mut self,
        op: BinOp,
        left: &Expr,
        right: &Expr,
    ) -> Eff<B, Step<B::Value, B::Value>> {
        Self::then(self.eval_expr(left), |l| {
            let full = |this: &mut Self| {
                Self::then(this.eval_expr(right), |r| Self::fallible(B::binop(op, &l, &r)))
            };
            // Once `l` decides the result, `l op l` is that result.
            let short = |_: &mut Self| Self::fallible(B::binop(op, &l, &l));
            if op == BinOp::Or {
                B::ternary(&l, self, short, full)
            } else {
                B::ternary(&l, self, full, short)
            }
        })
    }

    /// Two operands; independent ones are combined with `prod`, others run in order
    fn eval_pair(
        &mut self,
        first: &Expr,
        second: &Expr,
    ) -> Eff<B, Step<(B::Value, B::Value), B::Value>> {
        if is_pure(first) && is_pure(second) {
            let a = self.eval_expr(first);
            let c = self.eval_expr(second);
            Self::both(a, c)
        } else {
            Self::then(self.eval_expr(first), |a| {
                Self::then(self.eval_expr(second), |c| Self::normal((a, c)))
            })
        }
    }

    fn eval_exprs(&mut self, exprs: &[Expr]) -> Eff<B, Step<Vec<B::Value>, B::Value>> {
        let Some((first, rest)) = exprs.split_first() else {
            return Self::normal(Vec::new());
        };
        if exprs.iter().all(is_pure) {
            let head = self.eval_expr(first);
            let tail = self.eval_exprs(rest);
            Self::then(Self::both(head, tail), |(v, mut values)| {
                values.insert(0, v);
                Self::normal(values)
            })
        } else {
            Self::then(self.eval_expr(first), |v| {
                Self::then(self.eval_exprs(rest), |mut values| {
                    values.insert(0, v);
                    Self::normal(values)
                })
            })
        }
    }

    fn eval_fields(
        &mut self,
        fields: &[(String, Expr)],
    ) -> Eff<B, Step<Vec<(String, B::Value)>, B::Value>> {
        let Some(((name, first), rest)) = fields.split_first() else {
            return Self::normal(Vec::new());
        };
        Self::then(self.eval_expr(first), |v| {
            Self::then(self.eval_fields(rest), |mut values| {
                values.insert(0, (name.clone(), v));
                Self::normal(values)
            })
        })
    }

    /// Slice descriptors as `(start, length)` pairs
    fn eval_slices(
        &mut self,
        slices: &[Slice],
    ) -> Eff<B, Step<Vec<(B::Value, B::Value)>, B::Value>> {
        let Some((first, rest)) = slices.split_first() else {
            return Self::normal(Vec::new());
        };
        Self::then(self.eval_slice(first), |position| {
            Self::then(self.eval_slices(rest), |mut positions| {
                positions.insert(0, position);
                Self::normal(positions)
            })
        })
    }

    fn eval_slice(&mut self, slice: &Slice) -> Eff<B, Step<(B::Value, B::Value), B::Value>> {
        match slice {
            Slice::Single(index) => {
                Self::then(self.eval_expr(index), |i| Self::normal((i, B::v_of_int(1))))
            }
            Slice::Length(start, length) => self.eval_pair(start, length),
            Slice::Range(hi, lo) => Self::then(self.eval_pair(hi, lo), |(hi, lo)| {
                let length = B::binop(BinOp::Sub, &hi, &lo)
                    .and_then(|d| B::binop(BinOp::Add, &d, &B::v_of_int(1)));
                Self::fallible(length.map(|length| (lo, length)))
            }),
        }
    }

    /// Default value of a declared type
    fn base_value(&mut self, ty: &Type) -> Eff<B, Step<B::Value, B::Value>> {
        match ty {
            Type::Integer => Self::normal(B::v_of_int(0)),
            Type::Boolean => Self::fallible(B::v_of_literal(&Literal::Bool(false))),
            Type::String => Self::fallible(B::v_of_literal(&Literal::String(String::new()))),
            Type::Bits(width) => {
                Self::then(self.eval_expr(width), |w| Self::fallible(B::zeros(&w)))
            }
            Type::Tuple(items) => Self::then(self.base_values(items), |values| {
                Self::normal(B::create_tuple(values))
            }),
            Type::Record(fields) => Self::then(self.base_fields(fields), |fields| {
                Self::fallible(B::create_record(fields))
            }),
            Type::Exception(_) | Type::Named(_) => Self::fallible(Err(
                RuntimeError::static_check(format!("no default value for type {ty}")),
            )),
        }
    }

    fn base_values(&mut self, types: &[Type]) -> Eff<B, Step<Vec<B::Value>, B::Value>> {
        let Some((first, rest)) = types.split_first() else {
            return Self::normal(Vec::new());
        };
        Self::then(self.base_value(first), |v| {
            Self::then(self.base_values(rest), |mut values| {
                values.insert(0, v);
                Self::normal(values)
            })
        })
    }

    fn base_fields(
        &mut self,
        fields: &[(String, Type)],
    ) -> Eff<B, Step<Vec<(String, B::Value)>, B::Value>> {
        let Some(((name, first), rest)) = fields.split_first() else {
            return Self::normal(Vec::new());
        };
        Self::then(self.base_value(first), |v| {
            Self::then(self.base_fields(rest), |mut values| {
                values.insert(0, (name.clone(), v));
                Self::normal(values)
            })
        })
    }

    // ---- Assignable locations ----

    fn read_lexpr(&mut self, lhs: &LExpr) -> Eff<B, Step<B::Value, B::Value>> {
        match lhs {
            LExpr::Discard => Self::fallible(Err(RuntimeError::static_check(
                "cannot read from a discarded location",
            ))),
            LExpr::Var(name) => Self::fallible(self.read_var(name)),
            LExpr::Field(inner, field) => {
                Self::then(self.read_lexpr(inner), |v| Self::fallible(B::get_field(field, &v)))
            }
            LExpr::Item(inner, index) => {
                let index = *index;
                Self::then(self.read_lexpr(inner), move |v| Self::fallible(B::get_index(index, &v)))
            }
            LExpr::Slice(inner, slices) => Self::then(self.eval_slices(slices), |positions| {
                Self::then(self.read_lexpr(inner), |v| {
                    Self::fallible(B::read_from_bitvector(&positions, &v))
                })
            }),
        }
    }

    /// Store `v` into `lhs`, rebuilding enclosing containers on the way out
    fn assign(&mut self, lhs: &LExpr, v: B::Value) -> Eff<B, Step<(), B::Value>> {
        match lhs {
            LExpr::Discard => Self::normal(()),
            LExpr::Var(name) => Self::fallible(self.write_var(name, v)),
            LExpr::Field(inner, field) => Self::then(self.read_lexpr(inner), |container| {
                Self::then(Self::fallible(B::set_field(field, v, &container)), |updated| {
                    self.assign(inner, updated)
                })
            }),
            LExpr::Item(inner, index) => {
                let index = *index;
                Self::then(self.read_lexpr(inner), |container| {
                    Self::then(Self::fallible(B::set_index(index, v, &container)), |updated| {
                        self.assign(inner, updated)
                    })
                })
            }
            LExpr::Slice(inner, slices) => Self::then(self.eval_slices(slices), |positions| {
                Self::then(self.read_lexpr(inner), |container| {
                    let updated = B::write_to_bitvector(&positions, &v, &container);
                    Self::then(Self::fallible(updated), |updated| self.assign(inner, updated))
                })
            }),
        }
    }

    // ---- Statements ----

    /// Execute a statement with automatic stack growth for deep recursion
    fn exec(&mut self, stmt: &Stmt) -> Eff<B, Flow<B::Value>> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.exec_inner(stmt))
    }

    fn exec_inner(&mut self, stmt: &Stmt) -> Eff<B, Flow<B::Value>> {
        match stmt {
            Stmt::Pass => B::ret(Flow::Next),
            Stmt::Seq(stmts) => self.scoped(|this| this.exec_seq(stmts)),
            Stmt::Decl { name, ty, init } => self.exec_decl(name, ty.as_ref(), init.as_ref()),
            Stmt::Assign(lhs, rhs) => Self::then_flow(self.eval_expr(rhs), |v| {
                Self::then_flow(self.assign(lhs, v), |()| B::ret(Flow::Next))
            }),
            Stmt::Call { func, args } => Self::then_flow(self.eval_exprs(args), |args| {
                Self::then_flow(self.call(func, args), |_| B::ret(Flow::Next))
            }),
            Stmt::Return(None) => B::ret(Flow::Return(None)),
            Stmt::Return(Some(e)) => {
                Self::then_flow(self.eval_expr(e), |v| B::ret(Flow::Return(Some(v))))
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => Self::then_flow(self.eval_expr(cond), |c| {
                B::ternary(
                    &c,
                    self,
                    |this| this.scoped(|this| this.exec(then_branch)),
                    |this| this.scoped(|this| this.exec(else_branch)),
                )
            }),
            Stmt::For {
                index,
                start,
                end,
                downto,
                body,
            } => Self::then_flow(self.eval_pair(start, end), |(from, to)| {
                self.exec_for(index, from, &to, *downto, body)
            }),
            Stmt::While { cond, body } => self.exec_while(cond, body),
            Stmt::Assert(cond) => B::bind(self.eval_expr(cond), |step| match step {
                Step::Normal(v) => B::choice(
                    B::ret(v),
                    B::ret(Flow::Next),
                    B::lift(Err(RuntimeError::AssertionFailed)),
                ),
                Step::Throwing(exc) => B::ret(Flow::Throwing(exc)),
            }),
            Stmt::Throw(Some(e)) => Self::then_flow(self.eval_expr(e), |exc| {
                B::bind(B::lift(B::exception_name(&exc)), |_| B::ret(Flow::Throwing(exc)))
            }),
            Stmt::Throw(None) => match self.handling.last() {
                Some(exc) => B::ret(Flow::Throwing(exc.clone())),
                None => B::lift(Err(RuntimeError::static_check(
                    "implicit rethrow outside of an exception handler",
                ))),
            },
            Stmt::Try {
                body,
                catchers,
                otherwise,
            } => B::bind(self.exec(body), |flow| match flow {
                Flow::Throwing(exc) => self.handle(exc, catchers, otherwise.as_deref()),
                other => B::ret(other),
            }),
        }
    }

    /// Run `f` inside a fresh block scope
    fn scoped(&mut self, f: impl FnOnce(&mut Self) -> Eff<B, Flow<B::Value>>) -> Eff<B, Flow<B::Value>> {
        self.env.push_block();
        let flow = f(self);
        B::bind(flow, |flow| {
            self.env.pop_block();
            B::ret(flow)
        })
    }

    fn exec_seq(&mut self, stmts: &[Stmt]) -> Eff<B, Flow<B::Value>> {
        let Some((first, rest)) = stmts.split_first() else {
            return B::ret(Flow::Next);
        };
        B::bind(self.exec(first), |flow| match flow {
            Flow::Next => self.exec_seq(rest),
            other => B::ret(other),
        })
    }

    fn exec_decl(&mut self, name: &str, ty: Option<&Type>, init: Option<&Expr>) -> Eff<B, Flow<B::Value>> {
        let value = match (init, ty) {
            (Some(init), _) => self.eval_expr(init),
            (None, Some(ty)) => self.base_value(ty),
            (None, None) => {
                return B::lift(Err(RuntimeError::static_check(format!(
                    "declaration of {name} needs a type or an initialiser"
                ))));
            }
        };
        // The write hook sees the value as soon as it is known; the binding
        // itself waits for the lazy view.
        B::delay(value, |strict, lazy| match strict {
            Step::Normal(v) => {
                let scope = self.env.current_scope();
                self.backend.on_write_identifier(name, &scope, &v);
                Self::then_flow(lazy, |v| {
                    self.env.declare(name.to_string(), v);
                    B::ret(Flow::Next)
                })
            }
            Step::Throwing(exc) => B::ret(Flow::Throwing(exc)),
        })
    }

    fn check_unroll(&self, iterations: u32) {
        if self.unroll > 0 && iterations == self.unroll {
            self.backend
                .warn(&format!("loop exceeded the unrolling bound of {} iterations", self.unroll));
        }
    }

    /// Iterations run through [`Backend::repeat`]; the state is the index
    /// value and the count of finished iterations
    fn exec_for(
        &mut self,
        index: &str,
        start: B::Value,
        end: &B::Value,
        downto: bool,
        body: &Stmt,
    ) -> Eff<B, Flow<B::Value>> {
        let (test, step) = if downto {
            (BinOp::Ge, BinOp::Sub)
        } else {
            (BinOp::Le, BinOp::Add)
        };
        B::repeat(self, (start, 0u32), |this, (i, done)| {
            let more = match B::binop(test, &i, end) {
                Ok(more) => more,
                Err(e) => return B::lift(Err(e)),
            };
            B::ternary(
                &more,
                this,
                |this| {
                    this.check_unroll(done);
                    let iteration = this.scoped(|this| {
                        this.declare_local(index, i.clone());
                        this.exec(body)
                    });
                    B::bind(iteration, |flow| match flow {
                        Flow::Next => match B::binop(step, &i, &B::v_of_int(1)) {
                            Ok(next) => {
                                B::ret(ControlFlow::Continue((next, done.saturating_add(1))))
                            }
                            Err(e) => B::lift(Err(e)),
                        },
                        other => B::ret(ControlFlow::Break(other)),
                    })
                },
                |_| B::ret(ControlFlow::Break(Flow::Next)),
            )
        })
    }

    fn exec_while(&mut self, cond: &Expr, body: &Stmt) -> Eff<B, Flow<B::Value>> {
        B::repeat(self, 0u32, |this, done| {
            B::bind(this.eval_expr(cond), |step| match step {
                Step::Throwing(exc) => B::ret(ControlFlow::Break(Flow::Throwing(exc))),
                Step::Normal(c) => B::ternary(
                    &c,
                    this,
                    |this| {
                        this.check_unroll(done);
                        let iteration = this.scoped(|this| this.exec(body));
                        B::bind(iteration, |flow| {
                            B::ret(match flow {
                                Flow::Next => ControlFlow::Continue(done.saturating_add(1)),
                                other => ControlFlow::Break(other),
                            })
                        })
                    },
                    |_| B::ret(ControlFlow::Break(Flow::Next)),
                ),
            })
        })
    }

    /// Run the first catcher naming the exception, else `otherwise`, else rethrow
    fn handle(
        &mut self,
        exc: B::Value,
        catchers: &[Catcher],
        otherwise: Option<&Stmt>,
    ) -> Eff<B, Flow<B::Value>> {
        let name = match B::exception_name(&exc) {
            Ok(name) => name,
            Err(e) => return B::lift(Err(e)),
        };
        let handler = catchers
            .iter()
            .find(|catcher| catcher.exception == name)
            .map(|catcher| (catcher.binding.as_deref(), &catcher.body))
            .or_else(|| otherwise.map(|body| (None, body)));
        let Some((binding, body)) = handler else {
            return B::ret(Flow::Throwing(exc));
        };
        tracing::debug!(exception = %name, "exception caught");

        self.handling.push(exc.clone());
        let flow = self.scoped(|this| {
            if let Some(binding) = binding {
                this.declare_local(binding, exc);
            }
            this.exec(body)
        });
        B::bind(flow, |flow| {
            self.handling.pop();
            B::ret(flow)
        })
    }

    // ---- Calls ----

    fn call(&mut self, name: &str, args: Vec<B::Value>) -> Eff<B, Step<Vec<B::Value>, B::Value>> {
        let Some(decl) = self.subprograms.get(name).cloned() else {
            return Self::fallible(Err(RuntimeError::undefined_identifier(name)));
        };
        let body = match &decl.body {
            // Primitives check their own arity
            SubprogramBody::Primitive(primitive) => {
                return B::bind(self.backend.call_primitive(primitive, args), Self::normal);
            }
            SubprogramBody::Stmts(body) => body,
        };
        if decl.args.len() != args.len() {
            return Self::fallible(Err(RuntimeError::bad_arity(
                name,
                decl.args.len(),
                args.len(),
            )));
        }

        let scope = self.env.push_frame(name);
        tracing::trace!(subprogram = name, %scope, depth = self.env.depth(), "call");
        for ((arg, _), v) in decl.args.iter().zip(args) {
            self.backend.on_write_identifier(arg, &scope, &v);
            self.env.declare(arg.clone(), v);
        }
        let flow = self.exec(body);
        B::bind(flow, |flow| {
            self.env.pop_frame();
            match flow {
                Flow::Next | Flow::Return(None) => Self::normal(Vec::new()),
                Flow::Return(Some(v)) => Self::normal(vec![v]),
                Flow::Throwing(exc) => B::ret(Step::Throwing(exc)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RunConfig, Strictness};
    use crate::native::{NativeBackend, Value};

    fn run(decls: Vec<Decl>) -> InterpResult<Value> {
        let program = Program::new(decls);
        let env = StaticEnv::build(&program, Strictness::Silence)?;
        let backend = NativeBackend::new(&RunConfig::new(Strictness::Silence, false));
        Interpreter::new(backend, &env).run(&program).into_result()
    }

    fn main_returning(body: Vec<Stmt>) -> Decl {
        Decl::Func(FuncDecl::function("main", vec![], Type::Integer, Stmt::Seq(body)))
    }

    #[test]
    fn test_is_pure() {
        let pure = Expr::binop(BinOp::Add, Expr::var("x"), Expr::int(1));
        let impure = Expr::binop(BinOp::Add, Expr::var("x"), Expr::call("f", vec![]));
        assert!(is_pure(&pure));
        assert!(!is_pure(&impure));
    }

    #[test]
    fn test_arithmetic() {
        let v = run(vec![main_returning(vec![Stmt::ret(Expr::binop(
            BinOp::Mul,
            Expr::int(6),
            Expr::int(7),
        ))])])
        .unwrap();
        assert_eq!(v.to_string(), "42");
    }

    #[test]
    fn test_short_circuit_skips_right_operand() {
        // The right operand would be an undefined identifier if evaluated.
        let cond = Expr::binop(BinOp::And, Expr::bool(false), Expr::var("undefined"));
        let v = run(vec![main_returning(vec![Stmt::ret(Expr::Cond {
            cond: Box::new(cond),
            yes: Box::new(Expr::int(1)),
            no: Box::new(Expr::int(2)),
        })])])
        .unwrap();
        assert_eq!(v.to_string(), "2");

        let implies = Expr::binop(BinOp::Impl, Expr::bool(false), Expr::var("undefined"));
        let v = run(vec![main_returning(vec![Stmt::ret(Expr::Cond {
            cond: Box::new(implies),
            yes: Box::new(Expr::int(1)),
            no: Box::new(Expr::int(2)),
        })])])
        .unwrap();
        assert_eq!(v.to_string(), "1");
    }

    #[test]
    fn test_for_loop_sums() {
        let v = run(vec![main_returning(vec![
            Stmt::decl("acc", Expr::int(0)),
            Stmt::For {
                index: "i".to_string(),
                start: Expr::int(1),
                end: Expr::int(10),
                downto: false,
                body: Box::new(Stmt::assign(
                    "acc",
                    Expr::binop(BinOp::Add, Expr::var("acc"), Expr::var("i")),
                )),
            },
            Stmt::ret(Expr::var("acc")),
        ])])
        .unwrap();
        assert_eq!(v.to_string(), "55");
    }

    #[test]
    fn test_while_with_early_return() {
        let v = run(vec![main_returning(vec![
            Stmt::decl("n", Expr::int(0)),
            Stmt::While {
                cond: Expr::bool(true),
                body: Box::new(Stmt::Seq(vec![
                    Stmt::assign("n", Expr::binop(BinOp::Add, Expr::var("n"), Expr::int(1))),
                    Stmt::If {
                        cond: Expr::binop(BinOp::Eq, Expr::var("n"), Expr::int(5)),
                        then_branch: Box::new(Stmt::ret(Expr::var("n"))),
                        else_branch: Box::new(Stmt::Pass),
                    },
                ])),
            },
            Stmt::ret(Expr::int(-1)),
        ])])
        .unwrap();
        assert_eq!(v.to_string(), "5");
    }

    #[test]
    fn test_block_locals_do_not_escape() {
        let err = run(vec![main_returning(vec![
            Stmt::If {
                cond: Expr::bool(true),
                then_branch: Box::new(Stmt::decl("inner", Expr::int(1))),
                else_branch: Box::new(Stmt::Pass),
            },
            Stmt::ret(Expr::var("inner")),
        ])])
        .unwrap_err();
        assert!(matches!(err, RuntimeError::UndefinedIdentifier(name) if name == "inner"));
    }

    #[test]
    fn test_assert_failure_is_fatal() {
        let err = run(vec![main_returning(vec![
            Stmt::Assert(Expr::binop(BinOp::Eq, Expr::int(1), Expr::int(2))),
            Stmt::ret(Expr::int(0)),
        ])])
        .unwrap_err();
        assert!(matches!(err, RuntimeError::AssertionFailed));
    }

    #[test]
    fn test_assert_requires_boolean() {
        let err = run(vec![main_returning(vec![
            Stmt::Assert(Expr::int(1)),
            Stmt::ret(Expr::int(0)),
        ])])
        .unwrap_err();
        assert_eq!(err.kind(), "type-mismatch");
    }

    #[test]
    fn test_typed_declaration_defaults() {
        let v = run(vec![main_returning(vec![
            Stmt::Decl {
                name: "b".to_string(),
                ty: Some(Type::Bits(Box::new(Expr::int(4)))),
                init: None,
            },
            Stmt::Decl {
                name: "r".to_string(),
                ty: Some(Type::Record(vec![
                    ("flag".to_string(), Type::Boolean),
                    ("name".to_string(), Type::String),
                ])),
                init: None,
            },
            Stmt::Assert(Expr::binop(
                BinOp::Eq,
                Expr::var("b"),
                Expr::bits("0000"),
            )),
            Stmt::Assert(Expr::Unop {
                op: crate::ast::UnOp::Not,
                expr: Box::new(Expr::GetField {
                    expr: Box::new(Expr::var("r")),
                    field: "flag".to_string(),
                }),
            }),
            Stmt::ret(Expr::int(0)),
        ])])
        .unwrap();
        assert_eq!(v.to_string(), "0");
    }

    #[test]
    fn test_nested_field_assignment() {
        let v = run(vec![main_returning(vec![
            Stmt::decl(
                "r",
                Expr::Record(vec![(
                    "inner".to_string(),
                    Expr::Tuple(vec![Expr::int(1), Expr::int(2)]),
                )]),
            ),
            Stmt::Assign(
                LExpr::Item(
                    Box::new(LExpr::Field(Box::new(LExpr::var("r")), "inner".to_string())),
                    1,
                ),
                Expr::int(40),
            ),
            Stmt::ret(Expr::GetItem {
                expr: Box::new(Expr::GetField {
                    expr: Box::new(Expr::var("r")),
                    field: "inner".to_string(),
                }),
                index: 1,
            }),
        ])])
        .unwrap();
        assert_eq!(v.to_string(), "40");
    }

    #[test]
    fn test_unroll_bound_does_not_stop_the_loop() {
        let program = Program::new(vec![main_returning(vec![
            Stmt::decl("n", Expr::int(0)),
            Stmt::While {
                cond: Expr::binop(BinOp::Lt, Expr::var("n"), Expr::int(10)),
                body: Box::new(Stmt::assign(
                    "n",
                    Expr::binop(BinOp::Add, Expr::var("n"), Expr::int(1)),
                )),
            },
            Stmt::ret(Expr::var("n")),
        ])]);
        let env = StaticEnv::build(&program, Strictness::Silence).unwrap();
        let backend = NativeBackend::new(&RunConfig::new(Strictness::Silence, false));
        let mut interp = Interpreter::new(backend, &env).with_unroll(3);
        let v = interp.run(&program).into_result().unwrap();
        assert_eq!(v.to_string(), "10");
        assert_eq!(interp.into_backend().warnings(), 1);
    }
}
