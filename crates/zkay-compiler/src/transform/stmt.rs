//! Lowering of statements to public code

use crate::ast::{ExprId, StmtId, StmtKind};
use crate::circuit::helper::{CircuitHelper, InputSource};
use crate::error::{CompilerError, Result};
use crate::render::source_stmt;
use crate::transform::public::{DataLocation, PubExpr, PubStmt, PubType};

impl CircuitHelper<'_> {
    /// Public body of the helper's function
    pub fn function_body(&mut self) -> Result<Vec<PubStmt>> {
        let body = self.ast.function(self.function).body;
        self.branch(body)
    }

    /// Lowers one statement, preceded by the statements preparing its circuit inputs
    fn public_stmt(&mut self, s: StmtId) -> Result<Vec<PubStmt>> {
        let outer = std::mem::take(&mut self.pre);
        let lowered = self.lower_stmt(s);
        let pre = std::mem::replace(&mut self.pre, outer);
        let lowered = lowered?;
        if pre.is_empty() {
            return Ok(lowered);
        }
        let mut out = Vec::with_capacity(pre.len() + lowered.len() + 1);
        out.push(PubStmt::Comment(format!("Preparing circuit inputs for: {}", source_stmt(self.ast, s))));
        out.extend(pre);
        out.extend(lowered);
        Ok(out)
    }

    /// Statements of a branch or loop body, without a redundant block
    fn branch(&mut self, s: StmtId) -> Result<Vec<PubStmt>> {
        let ast = self.ast;
        match &ast.stmt(s).kind {
            StmtKind::Block(stmts) => {
                let mut out = Vec::new();
                for x in stmts {
                    out.extend(self.public_stmt(*x)?);
                }
                Ok(out)
            }
            _ => self.public_stmt(s),
        }
    }

    fn lower_stmt(&mut self, s: StmtId) -> Result<Vec<PubStmt>> {
        let ast = self.ast;
        match &ast.stmt(s).kind {
            StmtKind::Block(_) => Ok(vec![PubStmt::Block(self.branch(s)?)]),
            StmtKind::If { cond, then, otherwise } => {
                if ast.expr_type(*cond).is_some_and(|t| t.is_private()) {
                    return Ok(self.evaluate_stmt_in_circuit(s)?.into_iter().collect());
                }
                let private_branches = self.stmt_contains_private_expr(*then)
                    || otherwise.is_some_and(|o| self.stmt_contains_private_expr(o));
                if !private_branches {
                    let cond = self.public_expr(*cond)?;
                    let then = self.branch(*then)?;
                    let otherwise = otherwise.map(|o| self.branch(o)).transpose()?;
                    return Ok(vec![PubStmt::If { cond, then, otherwise }]);
                }
                // Constraints inside the branches only hold on the branch actually taken
                let guard = self.add_to_circuit_inputs(InputSource::Expr(*cond))?;
                let cond_pub = if ast.expr_type(*cond).is_some_and(|t| t.is_literal()) {
                    self.public_expr(*cond)?
                } else {
                    self.data_member(&guard)
                };
                let then = self.guarded(&guard, true, |h| h.branch(*then))?;
                let otherwise = match otherwise {
                    Some(o) => Some(self.guarded(&guard, false, |h| h.branch(*o))?),
                    None => None,
                };
                Ok(vec![PubStmt::If { cond: cond_pub, then, otherwise }])
            }
            StmtKind::While { cond, body } => {
                let cond = self.public_expr(*cond)?;
                let body = self.branch(*body)?;
                Ok(vec![PubStmt::While { cond, body }])
            }
            StmtKind::DoWhile { body, cond } => {
                let body = self.branch(*body)?;
                let cond = self.public_expr(*cond)?;
                Ok(vec![PubStmt::DoWhile { body, cond }])
            }
            StmtKind::For { init, cond, update, body } => {
                let mut out = match init {
                    Some(i) => self.public_stmt(*i)?,
                    None => Vec::new(),
                };
                let init = out.pop().map(Box::new);
                let cond = cond.map(|c| self.public_expr(c)).transpose()?;
                let update = match update {
                    Some(u) => {
                        let mut stmts = self.public_stmt(*u)?;
                        if stmts.len() != 1 {
                            return Err(CompilerError::internal("for-loop update lowered to several statements"));
                        }
                        stmts.pop().map(Box::new)
                    }
                    None => None,
                };
                let body = self.branch(*body)?;
                out.push(PubStmt::For { init, cond, update, body });
                Ok(out)
            }
            StmtKind::VarDecl { var, init } => {
                let decl = ast.var(*var);
                let ty = PubType::from_annotated(&decl.ty, self.config);
                let location = ty.is_reference().then_some(DataLocation::Memory);
                let init = init.map(|e| self.public_expr(e)).transpose()?;
                Ok(vec![PubStmt::VarDecl { ty, name: decl.name.clone(), location, init }])
            }
            StmtKind::Assign { lhs, rhs } => {
                let lhs = self.public_expr(*lhs)?;
                let rhs = self.public_expr(*rhs)?;
                Ok(vec![PubStmt::assign(lhs, rhs)])
            }
            StmtKind::Expr(e) => Ok(vec![PubStmt::Expr(self.public_expr(*e)?)]),
            StmtKind::Require(e) => Ok(vec![PubStmt::Require(self.public_expr(*e)?)]),
            StmtKind::Return(value) => self.lower_return(s, *value),
            StmtKind::Break => Ok(vec![PubStmt::Break]),
            StmtKind::Continue => Ok(vec![PubStmt::Continue]),
        }
    }

    /// In a function with a proof the return value is stored in return
    /// variables, so the wrapper can serialize the circuit inputs first
    fn lower_return(&mut self, s: StmtId, value: Option<ExprId>) -> Result<Vec<PubStmt>> {
        let ast = self.ast;
        let func = ast.function(self.function);
        if !func.facts.requires_verification {
            let value = value.map(|e| self.public_expr(e)).transpose()?;
            return Ok(vec![PubStmt::Return(value)]);
        }
        let is_last = matches!(&ast.stmt(func.body).kind, StmtKind::Block(stmts) if stmts.last() == Some(&s));
        if !is_last {
            return Err(CompilerError::unsupported(
                "Return statement must be the last statement of a function which requires verification",
                ast.stmt_context(s),
            ));
        }
        let Some(e) = value else {
            return Ok(Vec::new());
        };
        let value = self.public_expr(e)?;
        let lhs = if func.returns.len() == 1 {
            PubExpr::ident(self.config.return_var(0))
        } else {
            PubExpr::Tuple((0..func.returns.len()).map(|i| PubExpr::ident(self.config.return_var(i))).collect())
        };
        Ok(vec![PubStmt::assign(lhs, value)])
    }
}
