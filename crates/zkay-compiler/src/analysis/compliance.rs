//! Circuit compliance and hybrid function detection
//!
//! Decides which expressions are computed inside the circuit, which functions
//! may be inlined into a circuit, and which functions need a proof. Rejects
//! programs whose private parts have no circuit encoding.

use tracing::debug;

use super::side_effects::transitive_callees;
use crate::ast::types::{Label, Privacy};
use crate::ast::{Ast, ExprId, ExprKind, FunctionId, StmtId, StmtKind};
use crate::error::{CompilerError, Result};

pub fn run(ast: &mut Ast) -> Result<()> {
    let fids: Vec<FunctionId> = ast.function_ids().collect();

    compute_can_be_private(ast, &fids);
    for &f in &fids {
        let body = ast.function(f).body;
        PrivateSetter { ast: &mut *ast }.stmt(body)?;
    }
    for &f in &fids {
        check_loops(ast, f, false)?;
    }
    compute_requires_verification(ast, &fids);
    for &f in &fids {
        check_loops(ast, f, true)?;
        let func = ast.function(f);
        if func.facts.requires_verification && func.facts.is_recursive {
            return Err(CompilerError::compliance(
                format!("Recursive function '{}' requires verification", func.name),
                ast.context_at(func.span, Some(f), None),
            ));
        }
    }

    let verifying = fids.iter().filter(|f| ast.function(**f).facts.requires_verification).count();
    debug!(functions = fids.len(), verifying, "circuit compliance checked");
    Ok(())
}

fn compute_can_be_private(ast: &mut Ast, fids: &[FunctionId]) {
    for &f in fids {
        let own = body_is_circuit_expressible(ast, f);
        ast.function_mut(f).facts.can_be_private = own;
    }
    let mut changed = true;
    while changed {
        changed = false;
        for &f in fids {
            let facts = &ast.function(f).facts;
            if facts.can_be_private
                && facts.called_functions.iter().any(|g| !ast.function(*g).facts.can_be_private)
            {
                ast.function_mut(f).facts.can_be_private = false;
                changed = true;
            }
        }
    }
}

/// Whether the function, on its own, can be inlined into a circuit
fn body_is_circuit_expressible(ast: &Ast, f: FunctionId) -> bool {
    let func = ast.function(f);
    if !func.facts.has_static_body || func.facts.has_side_effects || func.facts.is_recursive {
        return false;
    }
    let primitive = |p: &Privacy, ty: &crate::ast::types::TypeName| {
        ty.can_be_private() && matches!(p, Privacy::All | Privacy::Me)
    };
    if !func.params.iter().all(|p| primitive(&ast.var(*p).ty.privacy, &ast.var(*p).ty.ty)) {
        return false;
    }
    if !func.returns.iter().all(|r| primitive(&r.privacy, &r.ty)) {
        return false;
    }

    let mut ok = true;
    ast.walk_stmt(func.body, &mut |s| {
        ok &= match &ast.stmt(s).kind {
            StmtKind::Block(_) | StmtKind::If { .. } | StmtKind::Expr(_) => true,
            StmtKind::VarDecl { var, .. } => ast.var(*var).ty.ty.can_be_private(),
            StmtKind::Assign { lhs, .. } => assigns_locals_only(ast, *lhs),
            StmtKind::Return(_) => is_final_return(ast, func.body, s),
            _ => false,
        };
    });
    for e in ast.exprs_in_stmt(func.body) {
        if let ExprKind::Builtin { op, .. } = &ast.expr(e).kind {
            ok &= op.circuit_expressible();
        }
    }
    ok
}

fn assigns_locals_only(ast: &Ast, lhs: ExprId) -> bool {
    match &ast.expr(lhs).kind {
        ExprKind::Ident(v) => !ast.is_state_var(*v),
        ExprKind::Tuple(elems) => elems.iter().all(|e| assigns_locals_only(ast, *e)),
        _ => false,
    }
}

/// A return is only expressible as the last top-level statement of the body
fn is_final_return(ast: &Ast, body: StmtId, ret: StmtId) -> bool {
    matches!(&ast.stmt(body).kind, StmtKind::Block(stmts) if stmts.last() == Some(&ret))
}

fn compute_requires_verification(ast: &mut Ast, fids: &[FunctionId]) {
    let direct: Vec<bool> = fids
        .iter()
        .map(|f| {
            ast.exprs_in_stmt(ast.function(*f).body)
                .into_iter()
                .any(|e| ast.expr(e).evaluate_privately)
        })
        .collect();
    for (i, &f) in fids.iter().enumerate() {
        let indirect = transitive_callees(ast, f).into_iter().any(|g| direct[g.index()]);
        let requires = direct[i] || indirect;
        let func = ast.function(f);
        let private_param = func.params.iter().any(|p| ast.var(*p).ty.is_private());
        let when_external = func.can_be_external() && (requires || private_param);
        let facts = &mut ast.function_mut(f).facts;
        facts.requires_verification = requires;
        facts.requires_verification_when_external = when_external;
    }
}

/// Loops are executed publicly; they may not contain private computation
fn check_loops(ast: &Ast, f: FunctionId, verified_calls: bool) -> Result<()> {
    let mut result = Ok(());
    ast.walk_stmt(ast.function(f).body, &mut |s| {
        if result.is_err()
            || !matches!(ast.stmt(s).kind, StmtKind::While { .. } | StmtKind::DoWhile { .. } | StmtKind::For { .. })
        {
            return;
        }
        for e in ast.exprs_in_stmt(s) {
            let expr = ast.expr(e);
            let private = expr.evaluate_privately
                || expr.ty.as_ref().is_some_and(|t| t.is_private())
                || matches!(expr.kind, ExprKind::Reclassify { .. });
            if !verified_calls && private {
                result = Err(CompilerError::compliance(
                    "Loop body cannot contain private expressions",
                    ast.expr_context(e),
                ));
                return;
            }
            if let ExprKind::Call { func, .. } = expr.kind {
                if verified_calls && ast.function(func).facts.requires_verification {
                    result = Err(CompilerError::compliance(
                        format!(
                            "Calls to function '{}' which requires verification are not allowed inside loops",
                            ast.function(func).name
                        ),
                        ast.expr_context(e),
                    ));
                    return;
                }
            }
        }
    });
    result
}

/// Marks expressions evaluated inside the circuit
struct PrivateSetter<'a> {
    ast: &'a mut Ast,
}

impl PrivateSetter<'_> {
    fn stmt(&mut self, s: StmtId) -> Result<()> {
        let kind = self.ast.stmt(s).kind.clone();
        if let StmtKind::If { cond, .. } = kind {
            if self.ast.expr(cond).ty.as_ref().is_some_and(|t| t.is_private()) {
                return self.private_if(s);
            }
        }
        for e in kind.exprs() {
            self.expr(e, false)?;
        }
        for child in kind.stmts() {
            self.stmt(child)?;
        }
        Ok(())
    }

    fn private_if(&mut self, s: StmtId) -> Result<()> {
        let ast = &*self.ast;
        let mut forbidden = None;
        ast.walk_stmt(s, &mut |x| {
            let what = match ast.stmt(x).kind {
                StmtKind::While { .. } | StmtKind::DoWhile { .. } | StmtKind::For { .. } => Some("Loops"),
                StmtKind::Return(_) => Some("Return statements"),
                StmtKind::Require(_) => Some("Require statements"),
                StmtKind::Break | StmtKind::Continue => Some("Break and continue"),
                _ => None,
            };
            if forbidden.is_none() {
                forbidden = what.map(|w| (x, w));
            }
        });
        if let Some((x, what)) = forbidden {
            return Err(CompilerError::compliance(
                format!("{} are not allowed inside an if statement with a private condition", what),
                ast.stmt_context(x),
            ));
        }

        let before = ast.stmt(s).before.clone().unwrap_or_default();
        for v in &ast.stmt(s).modified {
            if !ast.declared_outside(*v, s) {
                continue;
            }
            let var = ast.var(*v);
            if !var.ty.ty.can_be_private() {
                return Err(CompilerError::compliance(
                    format!(
                        "If statement with a private condition must not modify non-primitive variable '{}'",
                        var.name
                    ),
                    ast.stmt_context(s),
                ));
            }
            let owned_by_me = var.ty.privacy.label().is_some_and(|l| before.same_partition(&l, &Label::Me));
            if !owned_by_me {
                return Err(CompilerError::compliance(
                    format!(
                        "If statement with a private condition must not modify variable '{}' which is not owned by @me",
                        var.name
                    ),
                    ast.stmt_context(s),
                ));
            }
        }

        let exprs = ast.exprs_in_stmt(s);
        for e in &exprs {
            if let ExprKind::Reclassify { privacy, implicit: false, .. } = &ast.expr(*e).kind {
                let to_me = privacy.label().is_some_and(|l| before.same_partition(&l, &Label::Me));
                if !to_me {
                    return Err(CompilerError::compliance(
                        "Revealing information to other parties is not allowed inside private if statements",
                        ast.expr_context(*e),
                    ));
                }
            }
        }

        let mut roots = Vec::new();
        ast.walk_stmt(s, &mut |x| roots.extend(ast.stmt(x).kind.exprs()));
        for e in roots {
            self.expr(e, true)?;
        }
        Ok(())
    }

    fn expr(&mut self, e: ExprId, in_circuit: bool) -> Result<()> {
        let kind = self.ast.expr(e).kind.clone();
        let private = in_circuit
            || match &kind {
                ExprKind::Builtin { private, .. } => *private,
                ExprKind::Cast { expr, implicit: false, .. } => {
                    self.ast.expr(*expr).ty.as_ref().is_some_and(|t| t.is_private())
                }
                _ => false,
            };
        if private {
            self.ast.expr_mut(e).evaluate_privately = true;
        }
        match kind {
            ExprKind::Reclassify { expr, .. } => self.expr(expr, true),
            // A location read inside the circuit is an input; its index is computed publicly
            ExprKind::Index { base, index } => {
                self.expr(base, false)?;
                self.expr(index, false)
            }
            ExprKind::Call { func, args } => {
                if private {
                    self.check_inlinable(e, func)?;
                }
                for a in args {
                    self.expr(a, private)?;
                }
                Ok(())
            }
            other => {
                for child in other.children() {
                    self.expr(child, private)?;
                }
                Ok(())
            }
        }
    }

    fn check_inlinable(&self, e: ExprId, func: FunctionId) -> Result<()> {
        let callee = self.ast.function(func);
        let msg = if callee.facts.is_recursive {
            "Recursive function calls are not supported in private expressions"
        } else if callee.facts.has_side_effects {
            "Calls inside private expressions must not have side effects"
        } else if !callee.facts.can_be_private {
            "Function cannot be evaluated inside a private expression"
        } else {
            return Ok(());
        };
        Err(CompilerError::compliance(format!("{} ('{}')", msg, callee.name), self.ast.expr_context(e)))
    }
}
