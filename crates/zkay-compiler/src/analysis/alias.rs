//! Alias analysis over privacy labels
//!
//! Threads a [`PartitionState`] through every function body and records the
//! state before and after each statement. Equality tests (`require(a == b)`,
//! guarded branches) merge partitions; assignments move the target into the
//! partition of the assigned label; anything with side effects forgets all
//! aliasing except between immutable labels. A loop whose body writes any
//! variable forgets on entry.

use tracing::debug;

use super::partition::PartitionState;
use super::side_effects::{expr_has_side_effects, stmt_writes};
use crate::ast::types::{BuiltinOp, Label};
use crate::ast::{Ast, ExprId, ExprKind, FunctionId, StmtId, StmtKind};

pub type AliasState = PartitionState<Label>;

pub fn run(ast: &mut Ast) {
    let fids: Vec<FunctionId> = ast.function_ids().collect();
    for f in fids {
        let func = ast.function(f);
        let mut s = AliasState::new();
        s.insert(Label::Me);
        s.insert(Label::All);
        for v in &ast.contract(func.contract).state_vars {
            s.insert(Label::Var(*v));
        }
        for p in &func.params {
            s.insert(Label::Var(*p));
        }
        let body = func.body;
        AliasAnalyzer { ast: &mut *ast }.stmt(body, s);
    }
    debug!("alias analysis complete");
}

/// Labels whose value cannot change during execution
pub fn is_immutable(ast: &Ast, label: &Label) -> bool {
    match label {
        Label::Me | Label::All => true,
        Label::Var(v) => ast.var(*v).is_final || ast.var(*v).is_constant,
    }
}

struct AliasAnalyzer<'a> {
    ast: &'a mut Ast,
}

impl AliasAnalyzer<'_> {
    fn separate_all(&self, s: &mut AliasState) {
        let ast = &*self.ast;
        s.separate_all(|l| is_immutable(ast, l));
    }

    fn stmt(&mut self, id: StmtId, before: AliasState) -> AliasState {
        self.ast.stmt_mut(id).before = Some(before.clone());
        let after = self.transfer(id, before);
        self.ast.stmt_mut(id).after = Some(after.clone());
        after
    }

    fn transfer(&mut self, id: StmtId, before: AliasState) -> AliasState {
        let kind = self.ast.stmt(id).kind.clone();
        match kind {
            StmtKind::Block(stmts) => {
                let mut cur = before;
                for s in stmts {
                    cur = self.stmt(s, cur);
                }
                for v in self.ast.declared_in(id) {
                    cur.remove(&Label::Var(v));
                }
                cur
            }
            StmtKind::If { cond, then, otherwise } => {
                let mut base = before;
                if expr_has_side_effects(self.ast, cond) {
                    self.separate_all(&mut base);
                }
                let mut then_before = base.clone();
                self.guard(cond, true, &mut then_before);
                let then_after = self.stmt(then, then_before);
                let mut else_before = base;
                self.guard(cond, false, &mut else_before);
                let else_after = match otherwise {
                    Some(e) => self.stmt(e, else_before),
                    None => else_before,
                };
                then_after.join(&else_after)
            }
            StmtKind::While { cond, body } => {
                let mut base = before;
                if stmt_writes(self.ast, id) {
                    self.separate_all(&mut base);
                }
                let mut body_before = base.clone();
                self.guard(cond, true, &mut body_before);
                let body_after = self.stmt(body, body_before);
                base.join(&body_after)
            }
            StmtKind::DoWhile { body, .. } => {
                let mut base = before;
                if stmt_writes(self.ast, id) {
                    self.separate_all(&mut base);
                }
                let body_after = self.stmt(body, base.clone());
                base.join(&body_after)
            }
            StmtKind::For { init, cond, update, body } => {
                let mut base = match init {
                    Some(i) => self.stmt(i, before),
                    None => before,
                };
                if stmt_writes(self.ast, id) {
                    self.separate_all(&mut base);
                }
                let mut body_before = base.clone();
                if let Some(c) = cond {
                    self.guard(c, true, &mut body_before);
                }
                let mut last = self.stmt(body, body_before);
                if let Some(u) = update {
                    last = self.stmt(u, last);
                }
                let mut after = base.join(&last);
                for v in self.ast.declared_in(id) {
                    after.remove(&Label::Var(v));
                }
                after
            }
            StmtKind::VarDecl { var, init } => {
                let mut after = before;
                if let Some(e) = init {
                    if expr_has_side_effects(self.ast, e) {
                        self.separate_all(&mut after);
                    }
                }
                after.insert(Label::Var(var));
                if let Some(label) = init.and_then(|e| self.ast.privacy_label(e)) {
                    after.move_to(&Label::Var(var), &label);
                }
                after
            }
            StmtKind::Assign { lhs, rhs } => {
                let mut after = before;
                if expr_has_side_effects(self.ast, lhs) || expr_has_side_effects(self.ast, rhs) {
                    self.separate_all(&mut after);
                }
                self.assign(lhs, Some(rhs), &mut after);
                after
            }
            StmtKind::Expr(e) => {
                let mut after = before;
                if expr_has_side_effects(self.ast, e) {
                    self.separate_all(&mut after);
                }
                after
            }
            StmtKind::Require(cond) => {
                let mut after = before;
                if expr_has_side_effects(self.ast, cond) {
                    self.separate_all(&mut after);
                }
                self.guard(cond, true, &mut after);
                after
            }
            StmtKind::Return(_) | StmtKind::Break | StmtKind::Continue => before,
        }
    }

    fn assign(&self, lhs: ExprId, rhs: Option<ExprId>, s: &mut AliasState) {
        match &self.ast.expr(lhs).kind {
            ExprKind::Ident(v) => {
                let target = Label::Var(*v);
                match rhs.and_then(|r| self.ast.privacy_label(r)) {
                    Some(label) if label != target => s.move_to(&target, &label),
                    Some(_) => {}
                    None => s.move_to_separate(&target),
                }
            }
            ExprKind::Tuple(targets) => {
                let values = rhs.and_then(|r| match &self.ast.expr(r).kind {
                    ExprKind::Tuple(vals) if vals.len() == targets.len() => Some(vals.clone()),
                    _ => None,
                });
                for (i, t) in targets.iter().enumerate() {
                    self.assign(*t, values.as_ref().map(|v| v[i]), s);
                }
            }
            _ => {}
        }
    }

    /// Records what holds when `cond` evaluates to `is_true`
    fn guard(&self, cond: ExprId, is_true: bool, s: &mut AliasState) {
        let ExprKind::Builtin { op, args, .. } = &self.ast.expr(cond).kind else {
            return;
        };
        match (op, is_true) {
            (BuiltinOp::Parenthesis, _) => self.guard(args[0], is_true, s),
            (BuiltinOp::Not, _) => self.guard(args[0], !is_true, s),
            (BuiltinOp::And, true) | (BuiltinOp::Or, false) => {
                self.guard(args[0], is_true, s);
                self.guard(args[1], is_true, s);
            }
            (BuiltinOp::Eq, true) | (BuiltinOp::Ne, false) => {
                if let (Some(a), Some(b)) = (self.ast.privacy_label(args[0]), self.ast.privacy_label(args[1])) {
                    if s.has(&a) && s.has(&b) {
                        s.merge(&a, &b);
                    }
                }
            }
            _ => {}
        }
    }
}
