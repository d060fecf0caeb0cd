//! Side-effect and call-graph analysis
//!
//! Computes per-function call edges, recursion, body staticness and the state
//! variables a function (transitively) writes and reads, then the
//! modified/read variable sets of every statement.

use std::collections::BTreeSet;

use tracing::debug;

use crate::ast::{Ast, ExprId, ExprKind, FunctionId, StmtId, StmtKind, VarId};

pub fn run(ast: &mut Ast) {
    let fids: Vec<FunctionId> = ast.function_ids().collect();

    for &f in &fids {
        let body = ast.function(f).body;
        let mut calls = Vec::new();
        let mut has_loop = false;
        ast.walk_stmt(body, &mut |s| {
            if matches!(ast.stmt(s).kind, StmtKind::While { .. } | StmtKind::DoWhile { .. } | StmtKind::For { .. }) {
                has_loop = true;
            }
        });
        for e in ast.exprs_in_stmt(body) {
            if let ExprKind::Call { func, .. } = ast.expr(e).kind {
                if !calls.contains(&func) {
                    calls.push(func);
                }
            }
        }
        let (modified, read) = direct_state_access(ast, body);
        let facts = &mut ast.function_mut(f).facts;
        facts.called_functions = calls;
        facts.has_static_body = !has_loop;
        facts.modified_state = modified;
        facts.read_state = read;
    }

    // Propagate state accesses along call edges until nothing changes
    let mut changed = true;
    while changed {
        changed = false;
        for &f in &fids {
            let mut modified = ast.function(f).facts.modified_state.clone();
            let mut read = ast.function(f).facts.read_state.clone();
            for callee in &ast.function(f).facts.called_functions {
                modified.extend(ast.function(*callee).facts.modified_state.iter().copied());
                read.extend(ast.function(*callee).facts.read_state.iter().copied());
            }
            let facts = &mut ast.function_mut(f).facts;
            if modified.len() != facts.modified_state.len() || read.len() != facts.read_state.len() {
                facts.modified_state = modified;
                facts.read_state = read;
                changed = true;
            }
        }
    }

    for &f in &fids {
        let recursive = transitive_callees(ast, f).contains(&f);
        let facts = &mut ast.function_mut(f).facts;
        facts.is_recursive = recursive;
        facts.has_static_body = facts.has_static_body && !recursive;
        facts.has_side_effects = !facts.modified_state.is_empty();
    }

    for s in 0..ast.stmts.len() {
        let id = StmtId(s as u32);
        let (modified, read) = stmt_accesses(ast, id);
        let stmt = ast.stmt_mut(id);
        stmt.modified = modified;
        stmt.read = read;
    }
    debug!(functions = fids.len(), "computed side effects");
}

/// All functions reachable from `f` through at least one call
pub fn transitive_callees(ast: &Ast, f: FunctionId) -> BTreeSet<FunctionId> {
    let mut seen = BTreeSet::new();
    let mut stack = ast.function(f).facts.called_functions.clone();
    while let Some(g) = stack.pop() {
        if seen.insert(g) {
            stack.extend(ast.function(g).facts.called_functions.iter().copied());
        }
    }
    seen
}

fn direct_state_access(ast: &Ast, body: StmtId) -> (BTreeSet<VarId>, BTreeSet<VarId>) {
    let mut modified = BTreeSet::new();
    let mut read = BTreeSet::new();
    for e in ast.exprs_in_stmt(body) {
        if let ExprKind::Ident(v) = ast.expr(e).kind {
            if ast.is_state_var(v) {
                if ast.is_lvalue(e) {
                    modified.insert(v);
                } else {
                    read.insert(v);
                }
            }
        }
    }
    (modified, read)
}

fn stmt_accesses(ast: &Ast, stmt: StmtId) -> (BTreeSet<VarId>, BTreeSet<VarId>) {
    let mut modified = BTreeSet::new();
    let mut read = BTreeSet::new();
    ast.walk_stmt(stmt, &mut |s| {
        if let StmtKind::VarDecl { var, .. } = ast.stmt(s).kind {
            modified.insert(var);
        }
    });
    for e in ast.exprs_in_stmt(stmt) {
        match ast.expr(e).kind {
            ExprKind::Ident(v) if ast.is_lvalue(e) => {
                modified.insert(v);
            }
            ExprKind::Ident(v) => {
                read.insert(v);
            }
            ExprKind::Call { func, .. } => {
                modified.extend(ast.function(func).facts.modified_state.iter().copied());
                read.extend(ast.function(func).facts.read_state.iter().copied());
            }
            _ => {}
        }
    }
    (modified, read)
}

/// Whether evaluating the expression may change contract state
pub fn expr_has_side_effects(ast: &Ast, expr: ExprId) -> bool {
    let mut found = false;
    ast.walk_expr(expr, &mut |e| {
        if let ExprKind::Call { func, .. } = ast.expr(e).kind {
            found |= ast.function(func).facts.has_side_effects;
        }
    });
    found
}

/// Whether executing the statement may change contract state
pub fn stmt_has_side_effects(ast: &Ast, stmt: StmtId) -> bool {
    ast.stmt(stmt).modified.iter().any(|v| ast.is_state_var(*v))
        || ast.exprs_in_stmt(stmt).into_iter().any(|e| expr_has_side_effects(ast, e))
}

/// Whether executing the statement assigns any variable or may change
/// contract state
pub fn stmt_writes(ast: &Ast, stmt: StmtId) -> bool {
    !ast.stmt(stmt).modified.is_empty() || stmt_has_side_effects(ast, stmt)
}
