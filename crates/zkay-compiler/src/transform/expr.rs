//! Lowering of expressions to public code

use crate::ast::types::{BuiltinOp, Privacy};
use crate::ast::{ExprId, ExprKind, StmtId};
use crate::circuit::helper::{CircuitHelper, InputSource};
use crate::error::{CompilerError, Result};
use crate::transform::public::{PubExpr, PubStmt, PubType};

impl CircuitHelper<'_> {
    /// Public counterpart of `e`
    ///
    /// Private sub-expressions are replaced by reads of circuit outputs; the
    /// statements that fill the circuit inputs are collected in `pre`.
    pub fn public_expr(&mut self, e: ExprId) -> Result<PubExpr> {
        let ast = self.ast;
        let expr = ast.expr(e);
        match &expr.kind {
            ExprKind::Bool(b) => Ok(PubExpr::Bool(*b)),
            ExprKind::Number(n) => Ok(PubExpr::Number(n.clone())),
            ExprKind::Me => Ok(PubExpr::MsgSender),
            ExprKind::Ident(v) => Ok(PubExpr::ident(&ast.var(*v).name)),
            ExprKind::Index { base, index } => {
                let base = self.public_expr(*base)?;
                let index = self.public_expr(*index)?;
                Ok(PubExpr::index(base, index))
            }
            ExprKind::Tuple(elems) => {
                Ok(PubExpr::Tuple(elems.iter().map(|x| self.public_expr(*x)).collect::<Result<Vec<_>>>()?))
            }
            ExprKind::Reclassify { expr: inner, privacy, .. } => self.evaluate_expr_in_circuit(*inner, privacy),
            ExprKind::Cast { ty, expr: inner, implicit } => {
                if expr.evaluate_privately {
                    let privacy = self.own_privacy(e)?;
                    return self.evaluate_expr_in_circuit(e, &privacy);
                }
                let inner = self.public_expr(*inner)?;
                if *implicit {
                    Ok(inner)
                } else {
                    Ok(PubExpr::cast(PubType::from_type_name(ty, self.config), inner))
                }
            }
            ExprKind::Builtin { op, args, .. } => {
                if expr.evaluate_privately {
                    let privacy = self.own_privacy(e)?;
                    return self.evaluate_expr_in_circuit(e, &privacy);
                }
                if op.is_shortcircuiting() && args.iter().skip(1).any(|a| self.contains_private_expr(*a)) {
                    return self.guarded_builtin(*op, args);
                }
                let args = args.iter().map(|a| self.public_expr(*a)).collect::<Result<Vec<_>>>()?;
                Ok(PubExpr::op(*op, args))
            }
            ExprKind::Call { func, args } => {
                let callee = ast.function(*func);
                let args = args.iter().map(|a| self.public_expr(*a)).collect::<Result<Vec<_>>>()?;
                let name = if callee.facts.requires_verification_when_external {
                    self.config.internal_name(&callee.name)
                } else {
                    callee.name.clone()
                };
                let site = if callee.facts.requires_verification {
                    let site = self.calls.len();
                    self.call_function(*func);
                    Some(site)
                } else {
                    None
                };
                Ok(PubExpr::Call { name, args, site })
            }
        }
    }

    fn own_privacy(&self, e: ExprId) -> Result<Privacy> {
        self.ast
            .expr_type(e)
            .map(|t| t.privacy.clone())
            .ok_or_else(|| CompilerError::internal("untyped private expression"))
    }

    /// Short-circuit operator whose lazily evaluated operands move values
    /// across the circuit boundary
    ///
    /// The guard is moved into the circuit first. Constraints of a lazy
    /// operand only hold when that operand is actually evaluated, and the
    /// public statements preparing its inputs run under the same condition.
    fn guarded_builtin(&mut self, op: BuiltinOp, args: &[ExprId]) -> Result<PubExpr> {
        let ast = self.ast;
        let guard = self.add_to_circuit_inputs(InputSource::Expr(args[0]))?;
        let guard_pub = if ast.expr_type(args[0]).is_some_and(|t| t.is_literal()) {
            self.public_expr(args[0])?
        } else {
            self.data_member(&guard)
        };

        let mut lowered = vec![guard_pub.clone()];
        for (i, arg) in args.iter().enumerate().skip(1) {
            // `a || b` evaluates b when a is false; the else-operand of `c ? x : y` likewise
            let is_true = !(op == BuiltinOp::Or || (op == BuiltinOp::Ite && i == 2));
            let outer = std::mem::take(&mut self.pre);
            let value = self.guarded(&guard, is_true, |h| h.public_expr(*arg));
            let inner = std::mem::replace(&mut self.pre, outer);
            let value = value?;
            if !inner.is_empty() {
                let cond = if is_true {
                    guard_pub.clone()
                } else {
                    PubExpr::op(BuiltinOp::Not, vec![guard_pub.clone()])
                };
                self.pre.push(PubStmt::If { cond, then: inner, otherwise: None });
            }
            lowered.push(value);
        }
        Ok(PubExpr::op(op, lowered))
    }

    /// Whether lowering `e` touches the circuit
    pub(crate) fn contains_private_expr(&self, e: ExprId) -> bool {
        let ast = self.ast;
        let mut found = false;
        ast.walk_expr(e, &mut |x| {
            let expr = ast.expr(x);
            found |= expr.evaluate_privately
                || matches!(expr.kind, ExprKind::Reclassify { .. })
                || matches!(expr.kind, ExprKind::Call { func, .. } if ast.function(func).facts.requires_verification);
        });
        found
    }

    pub(crate) fn stmt_contains_private_expr(&self, s: StmtId) -> bool {
        self.ast.exprs_in_stmt(s).into_iter().any(|e| self.contains_private_expr(e))
    }
}
