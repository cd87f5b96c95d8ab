//! Static environment
//!
//! The subprogram table a program runs against, plus the light checks made
//! while building it. Full ASL type-checking happens upstream; what is
//! checked here is only what the interpreter would otherwise trip over at run
//! time.

use crate::ast::{
    Decl, Expr, FuncDecl, LExpr, Program, Slice, Stmt, SubprogramBody, SubprogramKind, Type,
};
use crate::config::Strictness;
use crate::error::{InterpResult, RuntimeError};
use std::collections::{HashMap, HashSet};

/// Subprograms visible to a run
#[derive(Debug, Clone, Default)]
pub struct StaticEnv {
    subprograms: HashMap<String, FuncDecl>,
    strictness: Strictness,
}

/// A call found while walking the program
#[derive(Debug)]
struct CallSite<'a> {
    caller: &'a str,
    callee: &'a str,
    argc: usize,
    /// Called for its value rather than as a statement
    in_expr: bool,
}

impl StaticEnv {
    /// Collect the subprograms of `program`, checking it as `strictness` asks
    pub fn build(program: &Program, strictness: Strictness) -> InterpResult<Self> {
        let mut env = StaticEnv {
            subprograms: HashMap::new(),
            strictness,
        };
        let mut findings = Vec::new();

        for func in program.functions() {
            if env.subprograms.insert(func.name.clone(), func.clone()).is_some() {
                findings.push(format!("subprogram {} is declared more than once", func.name));
            }
        }
        let mut globals = HashSet::new();
        for decl in &program.decls {
            if let Decl::Global(global) = decl {
                if !globals.insert(global.name.as_str()) {
                    findings.push(format!("global {} is declared more than once", global.name));
                }
            }
        }
        if !env.subprograms.contains_key("main") {
            findings.push("no main subprogram".to_string());
        }
        for site in call_sites(program) {
            if let Some(finding) = env.check_call(&site) {
                findings.push(finding);
            }
        }

        env.report(findings)?;
        tracing::debug!(
            subprograms = env.subprograms.len(),
            strictness = ?strictness,
            "static environment built"
        );
        Ok(env)
    }

    pub fn subprograms(&self) -> impl Iterator<Item = &FuncDecl> {
        self.subprograms.values()
    }

    fn check_call(&self, site: &CallSite<'_>) -> Option<String> {
        let Some(decl) = self.subprograms.get(site.callee) else {
            return Some(format!(
                "{} calls undeclared subprogram {}",
                site.caller, site.callee
            ));
        };
        if site.in_expr && decl.kind == SubprogramKind::Procedure {
            return Some(format!(
                "{} uses procedure {} as a value",
                site.caller, site.callee
            ));
        }
        // Primitives check their own arity
        if !decl.is_primitive() && decl.args.len() != site.argc {
            return Some(format!(
                "{} calls {} with {} argument(s), expected {}",
                site.caller,
                site.callee,
                site.argc,
                decl.args.len()
            ));
        }
        None
    }

    fn report(&self, findings: Vec<String>) -> InterpResult<()> {
        match self.strictness {
            Strictness::Silence => Ok(()),
            Strictness::Warn => {
                for finding in &findings {
                    tracing::warn!(%finding, "static check");
                }
                Ok(())
            }
            Strictness::TypeCheck => match findings.into_iter().next() {
                Some(finding) => Err(RuntimeError::static_check(finding)),
                None => Ok(()),
            },
        }
    }
}

fn call_sites(program: &Program) -> Vec<CallSite<'_>> {
    let mut sites = Vec::new();
    for decl in &program.decls {
        match decl {
            Decl::Func(func) => {
                if let SubprogramBody::Stmts(body) = &func.body {
                    stmt_calls(&func.name, body, &mut sites);
                }
                for (_, ty) in &func.args {
                    type_calls(&func.name, ty, &mut sites);
                }
            }
            Decl::Global(global) => {
                if let Some(init) = &global.init {
                    expr_calls(&global.name, init, &mut sites);
                }
                if let Some(ty) = &global.ty {
                    type_calls(&global.name, ty, &mut sites);
                }
            }
        }
    }
    sites
}

fn stmt_calls<'a>(caller: &'a str, stmt: &'a Stmt, sites: &mut Vec<CallSite<'a>>) {
    match stmt {
        Stmt::Pass | Stmt::Return(None) | Stmt::Throw(None) => {}
        Stmt::Seq(stmts) => {
            for s in stmts {
                stmt_calls(caller, s, sites);
            }
        }
        Stmt::Decl { ty, init, .. } => {
            if let Some(ty) = ty {
                type_calls(caller, ty, sites);
            }
            if let Some(init) = init {
                expr_calls(caller, init, sites);
            }
        }
        Stmt::Assign(lhs, rhs) => {
            lexpr_calls(caller, lhs, sites);
            expr_calls(caller, rhs, sites);
        }
        Stmt::Call { func, args } => {
            sites.push(CallSite {
                caller,
                callee: func,
                argc: args.len(),
                in_expr: false,
            });
            for arg in args {
                expr_calls(caller, arg, sites);
            }
        }
        Stmt::Return(Some(e)) | Stmt::Assert(e) | Stmt::Throw(Some(e)) => {
            expr_calls(caller, e, sites);
        }
        Stmt::If {
            cond,
            then_branch,
            else_branch,
        } => {
            expr_calls(caller, cond, sites);
            stmt_calls(caller, then_branch, sites);
            stmt_calls(caller, else_branch, sites);
        }
        Stmt::For {
            start, end, body, ..
        } => {
            expr_calls(caller, start, sites);
            expr_calls(caller, end, sites);
            stmt_calls(caller, body, sites);
        }
        Stmt::While { cond, body } => {
            expr_calls(caller, cond, sites);
            stmt_calls(caller, body, sites);
        }
        Stmt::Try {
            body,
            catchers,
            otherwise,
        } => {
            stmt_calls(caller, body, sites);
            for catcher in catchers {
                stmt_calls(caller, &catcher.body, sites);
            }
            if let Some(otherwise) = otherwise {
                stmt_calls(caller, otherwise, sites);
            }
        }
    }
}

fn expr_calls<'a>(caller: &'a str, expr: &'a Expr, sites: &mut Vec<CallSite<'a>>) {
    match expr {
        Expr::Literal(_) | Expr::Var(_) => {}
        Expr::Call { func, args } => {
            sites.push(CallSite {
                caller,
                callee: func,
                argc: args.len(),
                in_expr: true,
            });
            for arg in args {
                expr_calls(caller, arg, sites);
            }
        }
        Expr::Binop { left, right, .. } => {
            expr_calls(caller, left, sites);
            expr_calls(caller, right, sites);
        }
        Expr::Unop { expr, .. } | Expr::GetItem { expr, .. } | Expr::GetField { expr, .. } => {
            expr_calls(caller, expr, sites);
        }
        Expr::Slice { expr, slices } => {
            expr_calls(caller, expr, sites);
            slice_calls(caller, slices, sites);
        }
        Expr::Concat(items) | Expr::Tuple(items) => {
            for item in items {
                expr_calls(caller, item, sites);
            }
        }
        Expr::Cond { cond, yes, no } => {
            expr_calls(caller, cond, sites);
            expr_calls(caller, yes, sites);
            expr_calls(caller, no, sites);
        }
        Expr::Record(fields) | Expr::Exception { fields, .. } => {
            for (_, e) in fields {
                expr_calls(caller, e, sites);
            }
        }
    }
}

fn slice_calls<'a>(caller: &'a str, slices: &'a [Slice], sites: &mut Vec<CallSite<'a>>) {
    for slice in slices {
        match slice {
            Slice::Single(e) => expr_calls(caller, e, sites),
            Slice::Range(a, b) | Slice::Length(a, b) => {
                expr_calls(caller, a, sites);
                expr_calls(caller, b, sites);
            }
        }
    }
}

fn lexpr_calls<'a>(caller: &'a str, lhs: &'a LExpr, sites: &mut Vec<CallSite<'a>>) {
    match lhs {
        LExpr::Discard | LExpr::Var(_) => {}
        LExpr::Field(inner, _) | LExpr::Item(inner, _) => lexpr_calls(caller, inner, sites),
        LExpr::Slice(inner, slices) => {
            lexpr_calls(caller, inner, sites);
            slice_calls(caller, slices, sites);
        }
    }
}

fn type_calls<'a>(caller: &'a str, ty: &'a Type, sites: &mut Vec<CallSite<'a>>) {
    match ty {
        Type::Integer | Type::Boolean | Type::String | Type::Named(_) => {}
        Type::Bits(width) => expr_calls(caller, width, sites),
        Type::Tuple(items) => {
            for item in items {
                type_calls(caller, item, sites);
            }
        }
        Type::Record(fields) | Type::Exception(fields) => {
            for (_, field) in fields {
                type_calls(caller, field, sites);
            }
        }
    }
}
