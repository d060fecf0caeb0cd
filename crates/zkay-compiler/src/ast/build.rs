//! Name resolution: syntax tree to arena
//!
//! Identifiers are resolved against lexical scopes (block, then function
//! parameters, then contract state variables); calls are resolved by name and
//! arity among the contract's functions.

use std::collections::BTreeMap;

use tracing::debug;

use super::types::{AnnotatedType, Privacy, TypeName};
use super::{
    Ast, Contract, ContractId, ExprId, ExprKind, Function, FunctionFacts, FunctionId, FunctionKind,
    Parent, Span, Stmt, StmtId, StmtKind, VarId, VarKind, Variable,
};
use crate::error::{CompilerError, ErrorContext, Result};
use crate::syntax::{
    ContractDef, DataType, Expression, ExpressionKind, Owner, SourceUnit, Statement, StatementKind,
    TypeSpec,
};

/// Resolves every name in `unit` and returns the arena
pub fn build(unit: &SourceUnit) -> Result<Ast> {
    let mut builder = Builder::default();
    for contract in &unit.contracts {
        builder.contract(contract)?;
    }
    debug!(
        contracts = builder.ast.contracts.len(),
        functions = builder.ast.functions.len(),
        "resolved names"
    );
    Ok(builder.ast)
}

#[derive(Default)]
struct Builder {
    ast: Ast,
    scopes: Vec<BTreeMap<String, VarId>>,
    functions_by_name: BTreeMap<String, Vec<(FunctionId, usize)>>,
    contract: Option<ContractId>,
    function: Option<FunctionId>,
    stmt: Option<StmtId>,
}

impl Builder {
    fn ctx(&self, span: Span) -> ErrorContext {
        self.ast.context_at(span, self.function, self.contract)
    }

    fn current_contract(&self) -> Result<ContractId> {
        self.contract.ok_or_else(|| CompilerError::internal("name resolution outside of a contract"))
    }

    fn current_function(&self) -> Result<FunctionId> {
        self.function.ok_or_else(|| CompilerError::internal("statement outside of a function"))
    }

    fn contract(&mut self, def: &ContractDef) -> Result<()> {
        let cid = ContractId(self.ast.contracts.len() as u32);
        self.ast.contracts.push(Contract {
            name: def.name.clone(),
            state_vars: Vec::new(),
            functions: Vec::new(),
            span: def.span,
        });
        self.contract = Some(cid);
        self.function = None;
        self.functions_by_name.clear();
        self.scopes = vec![BTreeMap::new()];

        // Declare first so that labels and initializers may refer to any state variable
        let mut state_vars = Vec::new();
        for sv in &def.state_vars {
            let id = self.declare(&sv.name, sv.span, |cid| Variable {
                name: sv.name.clone(),
                kind: VarKind::State,
                ty: AnnotatedType::all(TypeName::Bool),
                is_final: sv.is_final,
                is_constant: sv.is_constant,
                initializer: None,
                contract: cid,
                function: None,
                decl_stmt: None,
                span: sv.span,
            })?;
            state_vars.push(id);
        }
        self.ast.contracts[cid.index()].state_vars = state_vars.clone();

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for f in &def.functions {
            *counts.entry(f.name.as_str()).or_default() += 1;
        }
        let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
        let mut fids = Vec::new();
        for f in &def.functions {
            let fid = FunctionId(self.ast.functions.len() as u32);
            let nth = seen.entry(f.name.as_str()).or_default();
            let unambiguous_name =
                if counts[f.name.as_str()] > 1 { format!("{}_{}", f.name, nth) } else { f.name.clone() };
            *nth += 1;
            self.ast.functions.push(Function {
                name: f.name.clone(),
                unambiguous_name,
                contract: cid,
                kind: f.kind,
                visibility: f.visibility,
                mutability: f.mutability,
                params: Vec::new(),
                returns: Vec::new(),
                body: StmtId(u32::MAX),
                span: f.span,
                facts: FunctionFacts { has_static_body: true, ..FunctionFacts::default() },
            });
            if f.kind == FunctionKind::Function {
                self.functions_by_name.entry(f.name.clone()).or_default().push((fid, f.params.len()));
            }
            fids.push(fid);
        }
        self.ast.contracts[cid.index()].functions = fids.clone();

        for (sv, id) in def.state_vars.iter().zip(&state_vars) {
            let ty = self.annotated_type(&sv.ty, None, sv.span)?;
            self.ast.vars[id.index()].ty = ty;
            if let Some(init) = &sv.init {
                let e = self.expr(init)?;
                self.ast.exprs[e.index()].parent = Some(Parent::Var(*id));
                self.ast.vars[id.index()].initializer = Some(e);
            }
        }

        for (f, fid) in def.functions.iter().zip(fids) {
            self.function = Some(fid);
            self.scopes.push(BTreeMap::new());
            let mut params = Vec::new();
            for p in &f.params {
                let ty = self.annotated_type(&p.ty, None, p.span)?;
                let id = self.declare(&p.name, p.span, |cid| Variable {
                    name: p.name.clone(),
                    kind: VarKind::Param,
                    ty,
                    is_final: p.is_final,
                    is_constant: false,
                    initializer: None,
                    contract: cid,
                    function: Some(fid),
                    decl_stmt: None,
                    span: p.span,
                })?;
                params.push(id);
            }
            let returns = f
                .returns
                .iter()
                .map(|r| self.annotated_type(r, None, f.span))
                .collect::<Result<Vec<_>>>()?;
            {
                let func = self.ast.function_mut(fid);
                func.params = params;
                func.returns = returns;
            }
            let body = Statement { kind: StatementKind::Block(f.body.clone()), span: f.span };
            let body = self.stmt(&body, None)?;
            self.ast.function_mut(fid).body = body;
            self.scopes.pop();
        }
        self.function = None;
        Ok(())
    }

    fn declare(
        &mut self,
        name: &str,
        span: Span,
        make: impl FnOnce(ContractId) -> Variable,
    ) -> Result<VarId> {
        let cid = self.current_contract()?;
        let ctx = self.ctx(span);
        let scope = self.scopes.last_mut().ok_or_else(|| CompilerError::internal("no open scope"))?;
        if scope.contains_key(name) {
            return Err(CompilerError::name_resolution(
                format!("Identifier '{}' already declared in this scope", name),
                ctx,
            ));
        }
        let id = VarId(self.ast.vars.len() as u32);
        scope.insert(name.to_string(), id);
        self.ast.vars.push(make(cid));
        Ok(id)
    }

    fn lookup(&self, name: &str) -> Option<VarId> {
        self.scopes.iter().rev().find_map(|s| s.get(name).copied())
    }

    fn privacy(&self, owner: &Owner, key_label: Option<&str>, span: Span) -> Result<Privacy> {
        match owner {
            Owner::All => Ok(Privacy::All),
            Owner::Me => Ok(Privacy::Me),
            Owner::Name(n) if Some(n.as_str()) == key_label => Ok(Privacy::KeyLabel(n.clone())),
            Owner::Name(n) => self.lookup(n).map(Privacy::Var).ok_or_else(|| {
                CompilerError::name_resolution(format!("Undefined privacy label '{}'", n), self.ctx(span))
            }),
        }
    }

    fn annotated_type(&self, spec: &TypeSpec, key_label: Option<&str>, span: Span) -> Result<AnnotatedType> {
        Ok(AnnotatedType::new(self.type_name(&spec.ty, span)?, self.privacy(&spec.privacy, key_label, span)?))
    }

    fn type_name(&self, ty: &DataType, span: Span) -> Result<TypeName> {
        Ok(match ty {
            DataType::Bool => TypeName::Bool,
            DataType::Uint(bits) | DataType::Int(bits) if *bits == 0 || *bits > 256 || bits % 8 != 0 => {
                return Err(CompilerError::name_resolution(
                    format!("Invalid integer width {}", bits),
                    self.ctx(span),
                ))
            }
            DataType::Uint(bits) => TypeName::Uint(*bits),
            DataType::Int(bits) => TypeName::Int(*bits),
            DataType::Address => TypeName::Address,
            DataType::AddressPayable => TypeName::AddressPayable,
            DataType::Mapping { key, key_label, value } => TypeName::Mapping {
                key: Box::new(self.type_name(key, span)?),
                key_label: key_label.clone(),
                value: Box::new(self.annotated_type(value, key_label.as_deref(), span)?),
            },
            DataType::Array { elem, len } => TypeName::Array {
                elem: Box::new(self.annotated_type(elem, None, span)?),
                len: *len,
            },
        })
    }

    fn reserve_stmt(&mut self, span: Span, parent: Option<StmtId>) -> Result<StmtId> {
        let function = self.current_function()?;
        let id = StmtId(self.ast.stmts.len() as u32);
        self.ast.stmts.push(Stmt {
            kind: StmtKind::Break,
            span,
            parent,
            function,
            before: None,
            after: None,
            modified: Default::default(),
            read: Default::default(),
        });
        Ok(id)
    }

    fn stmt(&mut self, s: &Statement, parent: Option<StmtId>) -> Result<StmtId> {
        let id = self.reserve_stmt(s.span, parent)?;
        let outer = self.stmt.replace(id);
        let kind = self.stmt_kind(&s.kind, id, s.span);
        self.stmt = outer;
        let kind = kind?;
        for e in kind.exprs() {
            self.ast.exprs[e.index()].parent = Some(Parent::Stmt(id));
        }
        self.ast.stmts[id.index()].kind = kind;
        Ok(id)
    }

    fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.scopes.push(BTreeMap::new());
        let r = f(self);
        self.scopes.pop();
        r
    }

    fn stmt_kind(&mut self, kind: &StatementKind, id: StmtId, span: Span) -> Result<StmtKind> {
        Ok(match kind {
            StatementKind::Block(stmts) => self.scoped(|b| {
                stmts.iter().map(|s| b.stmt(s, Some(id))).collect::<Result<Vec<_>>>().map(StmtKind::Block)
            })?,
            StatementKind::If { cond, then, otherwise } => StmtKind::If {
                cond: self.expr(cond)?,
                then: self.stmt(then, Some(id))?,
                otherwise: otherwise.as_ref().map(|s| self.stmt(s, Some(id))).transpose()?,
            },
            StatementKind::While { cond, body } => {
                StmtKind::While { cond: self.expr(cond)?, body: self.stmt(body, Some(id))? }
            }
            StatementKind::DoWhile { body, cond } => {
                StmtKind::DoWhile { body: self.stmt(body, Some(id))?, cond: self.expr(cond)? }
            }
            StatementKind::For { init, cond, update, body } => self.scoped(|b| {
                let init = init.as_ref().map(|s| b.stmt(s, Some(id))).transpose()?;
                let cond = cond.as_ref().map(|c| b.expr(c)).transpose()?;
                let update = update.as_ref().map(|s| b.stmt(s, Some(id))).transpose()?;
                let body = b.stmt(body, Some(id))?;
                Ok(StmtKind::For { init, cond, update, body })
            })?,
            StatementKind::VarDecl { name, ty, is_final, init } => {
                let init = init.as_ref().map(|e| self.expr(e)).transpose()?;
                let ty = self.annotated_type(ty, None, span)?;
                let function = self.function;
                let var = self.declare(name, span, |cid| Variable {
                    name: name.clone(),
                    kind: VarKind::Local,
                    ty,
                    is_final: *is_final,
                    is_constant: false,
                    initializer: init,
                    contract: cid,
                    function,
                    decl_stmt: Some(id),
                    span,
                })?;
                StmtKind::VarDecl { var, init }
            }
            StatementKind::Assign { lhs, op: None, rhs } => {
                StmtKind::Assign { lhs: self.expr(lhs)?, rhs: self.expr(rhs)? }
            }
            StatementKind::Assign { lhs, op: Some(op), rhs } => {
                let target = self.expr(lhs)?;
                let current = self.expr(lhs)?;
                let value = self.expr(rhs)?;
                let rhs = self.push(ExprKind::Builtin { op: *op, args: vec![current, value], private: false }, span);
                StmtKind::Assign { lhs: target, rhs }
            }
            StatementKind::Expr(e) => StmtKind::Expr(self.expr(e)?),
            StatementKind::Require(e) => StmtKind::Require(self.expr(e)?),
            StatementKind::Return(e) => StmtKind::Return(e.as_ref().map(|e| self.expr(e)).transpose()?),
            StatementKind::Break => StmtKind::Break,
            StatementKind::Continue => StmtKind::Continue,
        })
    }

    fn push(&mut self, kind: ExprKind, span: Span) -> ExprId {
        let id = self.ast.push_expr(kind, span);
        self.ast.exprs[id.index()].stmt = self.stmt;
        id
    }

    fn expr(&mut self, e: &Expression) -> Result<ExprId> {
        let kind = match &e.kind {
            ExpressionKind::Bool(b) => ExprKind::Bool(*b),
            ExpressionKind::Number(n) => ExprKind::Number(n.clone()),
            ExpressionKind::Me => ExprKind::Me,
            ExpressionKind::Ident(name) => match self.lookup(name) {
                Some(v) => ExprKind::Ident(v),
                None => {
                    return Err(CompilerError::name_resolution(
                        format!("Undefined identifier '{}'", name),
                        self.ctx(e.span),
                    ))
                }
            },
            ExpressionKind::Builtin { op, args } => {
                if args.len() != op.arity() {
                    return Err(CompilerError::name_resolution(
                        format!("Operator '{}' takes {} arguments, got {}", op, op.arity(), args.len()),
                        self.ctx(e.span),
                    ));
                }
                let args = args.iter().map(|a| self.expr(a)).collect::<Result<Vec<_>>>()?;
                ExprKind::Builtin { op: *op, args, private: false }
            }
            ExpressionKind::Call { func, args } => {
                let candidates: Vec<FunctionId> = self
                    .functions_by_name
                    .get(func)
                    .map(|fs| fs.iter().filter(|(_, arity)| *arity == args.len()).map(|(f, _)| *f).collect())
                    .unwrap_or_default();
                let func = match candidates.as_slice() {
                    [f] => *f,
                    [] => {
                        return Err(CompilerError::name_resolution(
                            format!("Undefined function '{}' with {} arguments", func, args.len()),
                            self.ctx(e.span),
                        ))
                    }
                    _ => {
                        return Err(CompilerError::name_resolution(
                            format!("Ambiguous call to overloaded function '{}'", func),
                            self.ctx(e.span),
                        ))
                    }
                };
                let args = args.iter().map(|a| self.expr(a)).collect::<Result<Vec<_>>>()?;
                ExprKind::Call { func, args }
            }
            ExpressionKind::Index { base, index } => {
                ExprKind::Index { base: self.expr(base)?, index: self.expr(index)? }
            }
            ExpressionKind::Reveal { expr, to } => ExprKind::Reclassify {
                expr: self.expr(expr)?,
                privacy: self.privacy(to, None, e.span)?,
                implicit: false,
            },
            ExpressionKind::Cast { ty, expr } => {
                ExprKind::Cast { ty: self.type_name(ty, e.span)?, expr: self.expr(expr)?, implicit: false }
            }
            ExpressionKind::Tuple(elems) => {
                ExprKind::Tuple(elems.iter().map(|x| self.expr(x)).collect::<Result<Vec<_>>>()?)
            }
        };
        Ok(self.push(kind, e.span))
    }
}
