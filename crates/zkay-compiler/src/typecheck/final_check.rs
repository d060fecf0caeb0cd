//! Single-assignment rules for `final` variables
//!
//! A `final` state variable is assigned exactly once: either by its
//! initializer or by a straight-line assignment in the constructor. Both
//! branches of a conditional must agree on whether they assign it, and loop
//! bodies may not assign it at all. `final` locals and parameters are never
//! reassigned after their declaration.

use std::collections::BTreeMap;

use crate::ast::{Ast, ExprId, ExprKind, FunctionId, StmtId, StmtKind, VarId, VarKind};
use crate::error::{CompilerError, Result};

type Assigned = BTreeMap<VarId, bool>;

pub fn run(ast: &Ast) -> Result<()> {
    for c in ast.contract_ids() {
        let contract = ast.contract(c);
        let mut assigned: Assigned = contract
            .state_vars
            .iter()
            .filter(|v| ast.var(**v).is_final && !ast.var(**v).is_constant)
            .map(|v| (*v, ast.var(*v).initializer.is_some()))
            .collect();

        for f in &contract.functions {
            let func = ast.function(*f);
            let mut checker = FinalChecker { ast, function: *f, in_loop: false };
            if func.is_constructor() {
                checker.stmt(func.body, &mut assigned)?;
            } else {
                checker.stmt(func.body, &mut assigned.clone())?;
            }
        }

        if let Some((v, _)) = assigned.iter().find(|(_, done)| !**done) {
            return Err(CompilerError::type_error(
                format!("Final variable '{}' is never initialized", ast.var_name(*v)),
                ast.var_context(*v),
            ));
        }
    }
    Ok(())
}

struct FinalChecker<'a> {
    ast: &'a Ast,
    function: FunctionId,
    in_loop: bool,
}

impl FinalChecker<'_> {
    fn stmt(&mut self, s: StmtId, assigned: &mut Assigned) -> Result<()> {
        let ast = self.ast;
        if ast.function(self.function).is_constructor() {
            self.reads(s, assigned)?;
        }
        match &ast.stmt(s).kind {
            StmtKind::Block(stmts) => {
                for x in stmts {
                    self.stmt(*x, assigned)?;
                }
            }
            StmtKind::If { then, otherwise, .. } => {
                let mut in_then = assigned.clone();
                self.stmt(*then, &mut in_then)?;
                let mut in_else = assigned.clone();
                if let Some(o) = otherwise {
                    self.stmt(*o, &mut in_else)?;
                }
                if let Some(v) = in_then.keys().find(|v| in_then.get(*v) != in_else.get(*v)) {
                    return Err(CompilerError::type_error(
                        format!(
                            "Final variable '{}' must be assigned in both branches or in neither",
                            ast.var_name(*v)
                        ),
                        ast.stmt_context(s),
                    ));
                }
                *assigned = in_then;
            }
            StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => {
                self.loop_body(*body, assigned)?;
            }
            StmtKind::For { init, update, body, .. } => {
                if let Some(i) = init {
                    self.stmt(*i, assigned)?;
                }
                self.loop_body(*body, assigned)?;
                if let Some(u) = update {
                    self.loop_body(*u, assigned)?;
                }
            }
            StmtKind::Assign { lhs, .. } => self.target(*lhs, assigned)?,
            _ => {}
        }
        Ok(())
    }

    /// Rejects reads of final state variables that are not yet initialized
    fn reads(&self, s: StmtId, assigned: &Assigned) -> Result<()> {
        for root in self.ast.stmt(s).kind.exprs() {
            let mut found = None;
            self.ast.walk_expr(root, &mut |e| {
                if let ExprKind::Ident(v) = self.ast.expr(e).kind {
                    if assigned.get(&v) == Some(&false) && !self.ast.is_lvalue(e) && found.is_none() {
                        found = Some((e, v));
                    }
                }
            });
            if let Some((e, v)) = found {
                return Err(CompilerError::type_error(
                    format!("Final variable '{}' is read before it is initialized", self.ast.var_name(v)),
                    self.ast.expr_context(e),
                ));
            }
        }
        Ok(())
    }

    fn loop_body(&mut self, body: StmtId, assigned: &mut Assigned) -> Result<()> {
        let outer = self.in_loop;
        self.in_loop = true;
        let result = self.stmt(body, assigned);
        self.in_loop = outer;
        result
    }

    fn target(&self, lhs: ExprId, assigned: &mut Assigned) -> Result<()> {
        match &self.ast.expr(lhs).kind {
            ExprKind::Tuple(elems) => elems.iter().try_for_each(|e| self.target(*e, assigned)),
            ExprKind::Ident(v) => self.write(lhs, *v, assigned),
            _ => Ok(()),
        }
    }

    fn write(&self, lhs: ExprId, v: VarId, assigned: &mut Assigned) -> Result<()> {
        let var = self.ast.var(v);
        if !var.is_final {
            return Ok(());
        }
        let err = |msg: String| Err(CompilerError::type_error(msg, self.ast.expr_context(lhs)));
        if var.kind != VarKind::State {
            return err(format!("Modifying final variable '{}'", var.name));
        }
        if !self.ast.function(self.function).is_constructor() {
            return err(format!("Modifying final variable '{}' outside the constructor", var.name));
        }
        if self.in_loop || assigned.get(&v).copied().unwrap_or(false) {
            return err(format!("Final variable '{}' is assigned more than once", var.name));
        }
        assigned.insert(v, true);
        Ok(())
    }
}
