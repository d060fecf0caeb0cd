//! Per-function circuit builder
//!
//! A [`CircuitHelper`] owns the circuit of one function while its body is
//! transformed. Values cross the public/circuit boundary through two
//! operations:
//!
//! - moving a value *in* ([`CircuitHelper::add_to_circuit_inputs`]) allocates
//!   a public input; a private value additionally gets a secret plaintext slot
//!   and a constraint proving correct decryption.
//! - moving a value *out* ([`CircuitHelper::evaluate_expr_in_circuit`])
//!   computes it inside the circuit and publishes it, either in plain with an
//!   equality constraint or encrypted for its new owner.
//!
//! Source variables written inside the circuit are tracked with a
//! [`Remapper`], which turns the sequence of writes into SSA form.

use tracing::trace;
use zkay_runtime::CompilerConfig;

use super::ir::{CircuitExpr, CircuitStatement, HybridArgType, HybridArgumentIdf};
use super::names::NameFactory;
use super::remap::{RemapKey, Remapper};
use super::{circuit_name, Circuit};
use crate::ast::types::{Label, Privacy, TypeName};
use crate::ast::{Ast, ExprId, ExprKind, FunctionId, StmtId, StmtKind, VarId};
use crate::error::{CompilerError, Result};
use crate::render::{source_expr, source_stmt};
use crate::transform::calls::{CallIo, TransIo};
use crate::transform::public::{PubExpr, PubStmt};

/// Value to move into the circuit
#[derive(Debug, Clone, Copy)]
pub enum InputSource {
    Expr(ExprId),
    /// Current public value of a variable
    Var(VarId),
}

/// Value to publish from the circuit
#[derive(Debug, Clone)]
pub enum OutputSource {
    Expr(ExprId),
    /// An already computed circuit value
    Circuit(HybridArgumentIdf),
}

pub struct CircuitHelper<'a> {
    pub(crate) ast: &'a Ast,
    pub(crate) config: &'a CompilerConfig,
    pub(crate) function: FunctionId,
    phi: Vec<CircuitStatement>,
    secret: NameFactory,
    tmp: NameFactory,
    inputs: NameFactory,
    outputs: NameFactory,
    /// Owners whose key can be requested once per transaction
    static_owners: Vec<Label>,
    global_keys: Vec<Label>,
    /// Callees which require verification, one entry per call site
    pub(crate) calls: Vec<FunctionId>,
    remapper: Remapper<RemapKey, HybridArgumentIdf>,
    /// Public statements to run before the statement being transformed
    pub(crate) pre: Vec<PubStmt>,
    inline_stack: Vec<FunctionId>,
}

impl<'a> CircuitHelper<'a> {
    pub fn new(ast: &'a Ast, config: &'a CompilerConfig, function: FunctionId, static_owners: Vec<Label>) -> Self {
        Self {
            ast,
            config,
            function,
            phi: Vec::new(),
            secret: NameFactory::new("secret", HybridArgType::PrivCircuitVal, config),
            tmp: NameFactory::new("tmp", HybridArgType::TmpCircuitVal, config),
            inputs: NameFactory::new(config.zk_in_name.clone(), HybridArgType::PubCircuitArg, config),
            outputs: NameFactory::new(config.zk_out_name.clone(), HybridArgType::PubCircuitArg, config),
            static_owners,
            global_keys: Vec::new(),
            calls: Vec::new(),
            remapper: Remapper::new(),
            pre: Vec::new(),
            inline_stack: Vec::new(),
        }
    }

    pub fn phi(&self) -> &[CircuitStatement] {
        &self.phi
    }

    pub fn in_size(&self) -> usize {
        self.inputs.size()
    }

    pub fn out_size(&self) -> usize {
        self.outputs.size()
    }

    pub fn priv_in_size(&self) -> usize {
        self.secret.size()
    }

    pub fn inputs(&self) -> &NameFactory {
        &self.inputs
    }

    pub fn outputs(&self) -> &NameFactory {
        &self.outputs
    }

    pub fn global_keys(&self) -> &[Label] {
        &self.global_keys
    }

    pub(crate) fn set_global_keys(&mut self, keys: Vec<Label>) {
        self.global_keys = keys;
    }

    /// Own buffer sizes and call sites, the input of transitive sizing
    pub fn call_io(&self) -> CallIo {
        CallIo {
            in_size: self.in_size(),
            out_size: self.out_size(),
            priv_size: self.priv_in_size(),
            calls: self.calls.clone(),
            keys: self.global_keys.clone(),
        }
    }

    pub fn label_name(&self, label: Label) -> String {
        match label {
            Label::Me => "me".to_string(),
            Label::All => "all".to_string(),
            Label::Var(v) => self.ast.var_name(v),
        }
    }

    pub fn global_key_name(&self, label: Label) -> String {
        format!("glob_key_{}", self.label_name(label))
    }

    pub(crate) fn zk_data(&self) -> PubExpr {
        PubExpr::ident(&self.config.zk_data_var_name)
    }

    /// `zk__data.<name>`
    pub(crate) fn data_member(&self, idf: &HybridArgumentIdf) -> PubExpr {
        PubExpr::member(self.zk_data(), &idf.name)
    }

    fn data_type(&self, e: ExprId) -> Result<TypeName> {
        self.ast
            .expr_type(e)
            .map(|t| t.ty.to_abstract())
            .ok_or_else(|| CompilerError::internal("untyped expression reached the circuit"))
    }

    // ------------------------------------------------------------------
    // Scopes
    // ------------------------------------------------------------------

    /// Groups the circuit statements emitted by `f` under `name`
    pub(crate) fn indent_block<T>(
        &mut self,
        name: impl Into<String>,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let start = self.phi.len();
        let result = f(self);
        let statements = self.phi.split_off(start);
        if !statements.is_empty() {
            self.phi.push(CircuitStatement::IndentBlock { name: name.into(), statements });
        }
        result
    }

    /// Gates the constraints emitted by `f` on `cond == is_true`
    pub(crate) fn guarded<T>(
        &mut self,
        cond: &HybridArgumentIdf,
        is_true: bool,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.phi.push(CircuitStatement::EnterGuard { cond: cond.name.clone(), is_true });
        let result = f(self);
        self.phi.push(CircuitStatement::LeaveGuard);
        result
    }

    // ------------------------------------------------------------------
    // Keys and encryption
    // ------------------------------------------------------------------

    /// The static owner provably equal to `label` at `stmt`, or `label` itself
    fn canonical_label(&self, stmt: Option<StmtId>, label: Label) -> Label {
        if self.static_owners.contains(&label) {
            return label;
        }
        let state = stmt.and_then(|s| self.ast.stmt(s).before.as_ref());
        match state.and_then(|st| self.static_owners.iter().find(|o| st.same_partition(o, &label))) {
            Some(owner) => *owner,
            None => label,
        }
    }

    /// Circuit variable holding the public key of `label`
    ///
    /// Keys of static owners are global: one input slot per proof, shared by
    /// every encryption. Any other owner gets its own slot, filled by a key
    /// lookup in the public contract.
    pub fn require_public_key(&mut self, stmt: Option<StmtId>, label: Label) -> Result<HybridArgumentIdf> {
        let label = self.canonical_label(stmt, label);
        if self.static_owners.contains(&label) {
            if !self.global_keys.contains(&label) {
                self.global_keys.push(label);
            }
            return Ok(HybridArgumentIdf::new(self.global_key_name(label), TypeName::Key, HybridArgType::PubCircuitArg));
        }
        let Label::Var(v) = label else {
            return Err(CompilerError::internal("public key of @all requested"));
        };
        let var = self.ast.var(v);
        let Some(s) = stmt else {
            return Err(CompilerError::internal(format!(
                "public key of '{}' requested outside of a statement",
                var.name
            )));
        };
        if !self.ast.is_state_var(v) && !self.inline_stack.is_empty() {
            return Err(CompilerError::unsupported(
                format!("Encryption for owner '{}' inside an inlined function", var.name),
                self.ast.stmt_context(s),
            ));
        }
        let name = format!("{}_{}", self.inputs.new_name(&TypeName::Key), var.name);
        let idf = self.inputs.add_idf(name, TypeName::Key);
        let pki = PubExpr::ident(self.config.contract_instance_name(&self.config.pki_contract_name));
        let lookup = PubExpr::method(pki, "getPk", vec![PubExpr::ident(&var.name)]);
        self.pre.push(PubStmt::assign(self.data_member(&idf), lookup));
        Ok(idf)
    }

    /// Emits the constraint linking `plain` and `cipher` under the key of `label`
    fn ensure_encryption(
        &mut self,
        stmt: Option<StmtId>,
        plain: &HybridArgumentIdf,
        label: Label,
        cipher: &HybridArgumentIdf,
        is_param: bool,
        is_dec: bool,
    ) -> Result<()> {
        let rnd_base = if is_param { &plain.name } else { &cipher.name };
        let rnd = self.secret.add_idf(format!("{}_R", rnd_base), TypeName::Randomness);
        let pk = self.require_public_key(stmt, label)?;
        self.phi.push(CircuitStatement::EncConstraint {
            plain: plain.clone(),
            rnd,
            pk,
            cipher: cipher.clone(),
            is_dec,
        });
        Ok(())
    }

    /// Proves that the private parameter `p` is a correct encryption under the sender's key
    pub(crate) fn ensure_parameter_encryption(&mut self, p: VarId) -> Result<HybridArgumentIdf> {
        let var = self.ast.var(p);
        let plain = self.secret.add_idf(var.name.clone(), var.ty.ty.to_abstract());
        let name = format!("{}_{}", self.inputs.new_name(&TypeName::Cipher), var.name);
        let cipher = self.inputs.add_idf(name, TypeName::Cipher);
        self.ensure_encryption(None, &plain, Label::Me, &cipher, true, false)?;
        Ok(cipher)
    }

    /// Allocates an input slot for every global key
    pub(crate) fn allocate_global_keys(&mut self) -> Vec<(Label, HybridArgumentIdf)> {
        let keys = self.global_keys.clone();
        keys.into_iter()
            .map(|label| {
                let name = self.global_key_name(label);
                (label, self.inputs.add_idf(name, TypeName::Key))
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Moving values in and out
    // ------------------------------------------------------------------

    /// Makes a public value available inside the circuit
    ///
    /// Returns the circuit variable holding the plaintext.
    pub fn add_to_circuit_inputs(&mut self, src: InputSource) -> Result<HybridArgumentIdf> {
        let ast = self.ast;
        let (ty, text, public) = match src {
            InputSource::Expr(e) => {
                let ty = ast.expr_type(e).cloned().ok_or_else(|| CompilerError::internal("untyped circuit input"))?;
                if ty.is_literal() {
                    return self.evaluate_private_expression(e, "");
                }
                if !self.inline_stack.is_empty() && self.reads_locals(e) {
                    return Err(CompilerError::unsupported(
                        "Reading a location which depends on an inlined function's variables",
                        ast.expr_context(e),
                    ));
                }
                let public = self.public_expr(e)?;
                (ty, source_expr(ast, e), public)
            }
            InputSource::Var(v) => {
                let var = ast.var(v);
                (var.ty.clone(), var.name.clone(), PubExpr::ident(&var.name))
            }
        };

        let data_ty = ty.ty.to_abstract();
        let (input, value) = if ty.is_private() {
            let plain = self.secret.get_new_idf(data_ty, None);
            let input = self.inputs.get_new_idf(TypeName::Cipher, Some(plain.expr()));
            self.ensure_encryption(None, &plain, Label::Me, &input, false, true)?;
            self.phi.push(CircuitStatement::Comment {
                text: format!("{} (dec: {}) = {}", input.name, plain.name, text),
            });
            (input, plain)
        } else {
            let input = self.inputs.get_new_idf(data_ty, None);
            self.phi.push(CircuitStatement::Comment { text: format!("{} = {}", input.name, text) });
            (input.clone(), input)
        };
        self.pre.push(PubStmt::assign(self.data_member(&input), public));
        Ok(value)
    }

    fn reads_locals(&self, e: ExprId) -> bool {
        let mut found = false;
        self.ast.walk_expr(e, &mut |x| {
            if let ExprKind::Ident(v) = self.ast.expr(x).kind {
                found |= !self.ast.is_state_var(v);
            }
        });
        found
    }

    /// Computes a private expression into a fresh temporary
    pub fn evaluate_private_expression(&mut self, e: ExprId, suffix: &str) -> Result<HybridArgumentIdf> {
        let value = self.circuit_expr(e)?;
        let ty = self.data_type(e)?;
        let name = format!("{}{}", self.tmp.new_name(&ty), suffix);
        let idf = self.tmp.add_idf(name, ty);
        self.tmp.set_priv_expr(&idf.name, value.clone());
        self.phi.push(CircuitStatement::TempVarDecl { lhs: idf.clone(), expr: value.clone() });
        Ok(idf.with_priv_expr(Some(value)))
    }

    fn new_temporary(&mut self, hint: &str, value: CircuitExpr, ty: TypeName) -> HybridArgumentIdf {
        let name = format!("{}_{}", self.tmp.new_name(&ty), hint);
        let idf = self.tmp.add_idf(name, ty);
        self.phi.push(CircuitStatement::Assignment { lhs: idf.clone(), expr: value });
        idf
    }

    /// New SSA version of `key`
    fn introduce_temporary(&mut self, key: RemapKey, hint: &str, value: CircuitExpr, ty: TypeName) {
        let idf = self.new_temporary(hint, value, ty);
        self.remapper.remap(key, idf);
    }

    /// Publishes a circuit value, in plain for `@all` and encrypted otherwise
    fn output_for(
        &mut self,
        src: OutputSource,
        privacy: &Privacy,
        stmt: Option<StmtId>,
        ty: TypeName,
        text: &str,
    ) -> Result<PubExpr> {
        let ast = self.ast;
        let label = privacy.label().ok_or_else(|| CompilerError::internal("unresolved key label in circuit output"))?;
        let out = self.indent_block(text, |h| {
            let plain = match src {
                OutputSource::Expr(e) => {
                    let x = ast.expr(e);
                    if x.evaluate_privately || x.ty.as_ref().is_some_and(|t| t.is_private()) {
                        h.evaluate_private_expression(e, "")?
                    } else {
                        h.add_to_circuit_inputs(InputSource::Expr(e))?
                    }
                }
                OutputSource::Circuit(idf) => idf,
            };
            if label == Label::All {
                let out = h.outputs.get_new_idf(ty, plain.corresponding_priv_expr.clone());
                h.phi.push(CircuitStatement::EqConstraint { tgt: plain, val: out.clone() });
                Ok(out)
            } else {
                let owner = h.canonical_label(stmt, label);
                let enc = CircuitExpr::Encrypt { expr: Box::new(plain.expr()), owner: h.label_name(owner) };
                let out = h.outputs.get_new_idf(TypeName::Cipher, Some(enc));
                h.ensure_encryption(stmt, &plain, owner, &out, false, false)?;
                Ok(out)
            }
        })?;
        self.phi.push(CircuitStatement::Comment { text: format!("{} = {}", out.name, text) });
        Ok(self.data_member(&out))
    }

    /// Evaluates `e` inside the circuit and returns the public expression for
    /// its value, re-owned to `privacy`
    pub fn evaluate_expr_in_circuit(&mut self, e: ExprId, privacy: &Privacy) -> Result<PubExpr> {
        if !self.remapper.is_empty() {
            return Err(CompilerError::unsupported(
                "Private expression nested inside a location read by the circuit",
                self.ast.expr_context(e),
            ));
        }
        let stmt = self.ast.expr(e).stmt;
        let ty = self.data_type(e)?;
        let text = source_expr(self.ast, e);
        trace!(expr = %text, "moving expression out of the circuit");
        self.output_for(OutputSource::Expr(e), privacy, stmt, ty, &text)
    }

    // ------------------------------------------------------------------
    // Circuit expressions
    // ------------------------------------------------------------------

    fn move_in(&mut self, e: ExprId) -> Result<CircuitExpr> {
        Ok(self.add_to_circuit_inputs(InputSource::Expr(e))?.expr())
    }

    fn circuit_expr(&mut self, e: ExprId) -> Result<CircuitExpr> {
        let ast = self.ast;
        let expr = ast.expr(e);
        if self.config.opt_eval_constexpr_in_circuit {
            match expr.ty.as_ref().map(|t| &t.ty) {
                Some(TypeName::NumberLiteral(v)) => return Ok(CircuitExpr::Number(v.clone())),
                Some(TypeName::BoolLiteral(b)) => return Ok(CircuitExpr::Bool(*b)),
                _ => {}
            }
        }
        match &expr.kind {
            ExprKind::Bool(b) => Ok(CircuitExpr::Bool(*b)),
            ExprKind::Number(n) => Ok(CircuitExpr::Number(n.clone())),
            ExprKind::Ident(v) => match self.remapper.get_current(&RemapKey::Var(*v)) {
                Some(idf) => Ok(idf.expr()),
                None => self.move_in(e),
            },
            ExprKind::Me | ExprKind::Index { .. } => self.move_in(e),
            ExprKind::Reclassify { expr: inner, .. } => {
                if ast.expr(*inner).evaluate_privately {
                    self.circuit_expr(*inner)
                } else {
                    self.move_in(*inner)
                }
            }
            ExprKind::Cast { ty, expr: inner, .. } => {
                Ok(CircuitExpr::Cast { ty: ty.clone(), expr: Box::new(self.circuit_expr(*inner)?) })
            }
            ExprKind::Builtin { op, args, .. } => {
                let args = args.iter().map(|a| self.circuit_expr(*a)).collect::<Result<Vec<_>>>()?;
                Ok(CircuitExpr::Op { op: *op, args })
            }
            ExprKind::Call { func, args } => {
                let mut values = self.inline_call(e, *func, args)?;
                if values.len() != 1 {
                    return Err(CompilerError::unsupported(
                        "Calls inside private expressions must return exactly one value",
                        ast.expr_context(e),
                    ));
                }
                Ok(values.remove(0))
            }
            ExprKind::Tuple(_) => {
                Err(CompilerError::unsupported("Tuples inside private expressions", ast.expr_context(e)))
            }
        }
    }

    /// Inlines the body of `func` and returns its return values
    fn inline_call(&mut self, e: ExprId, func: FunctionId, args: &[ExprId]) -> Result<Vec<CircuitExpr>> {
        let ast = self.ast;
        if self.inline_stack.contains(&func) {
            return Err(CompilerError::internal(format!(
                "recursive inlining of '{}'",
                ast.function(func).name
            )));
        }
        let saved = self.remapper.get_state();
        let result = self.indent_block(format!("INLINED {}", source_expr(ast, e)), |h| {
            let values = args.iter().map(|a| h.circuit_expr(*a)).collect::<Result<Vec<_>>>()?;
            h.inline_stack.push(func);
            let result = h.inline_body(func, values);
            h.inline_stack.pop();
            result
        });
        self.remapper.rollback(saved, |k| matches!(k, RemapKey::Var(v) if ast.is_state_var(*v)));
        result
    }

    fn inline_body(&mut self, func: FunctionId, values: Vec<CircuitExpr>) -> Result<Vec<CircuitExpr>> {
        let ast = self.ast;
        let callee = ast.function(func);
        for (p, value) in callee.params.iter().zip(values) {
            let var = ast.var(*p);
            self.introduce_temporary(RemapKey::Var(*p), &var.name, value, var.ty.ty.to_abstract());
        }
        self.circuit_stmt(callee.body)?;
        (0..callee.returns.len())
            .map(|i| {
                self.remapper.get_current(&RemapKey::Return(func, i)).map(|idf| idf.expr()).ok_or_else(|| {
                    CompilerError::internal(format!("inlined function '{}' left return value {} unbound", callee.name, i))
                })
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Circuit statements
    // ------------------------------------------------------------------

    fn circuit_stmt(&mut self, s: StmtId) -> Result<()> {
        let ast = self.ast;
        match &ast.stmt(s).kind {
            StmtKind::Block(stmts) => {
                for x in stmts {
                    self.circuit_stmt(*x)?;
                }
                self.remapper.drop_keys(ast.declared_in(s).into_iter().map(RemapKey::Var));
                Ok(())
            }
            StmtKind::If { .. } => self.add_if_statement_to_circuit(s),
            StmtKind::VarDecl { var, init } => {
                let decl = ast.var(*var);
                let ty = decl.ty.ty.to_abstract();
                let value = match init {
                    Some(e) => self.circuit_expr(*e)?,
                    None if ty.is_bool() => CircuitExpr::Bool(false),
                    None => CircuitExpr::Number(0.into()),
                };
                self.introduce_temporary(RemapKey::Var(*var), &decl.name, value, ty);
                Ok(())
            }
            StmtKind::Assign { lhs, rhs } => self.circuit_assign(*lhs, *rhs),
            StmtKind::Expr(e) => self.circuit_expr(*e).map(|_| ()),
            StmtKind::Return(Some(e)) => self.circuit_return(s, *e),
            StmtKind::Return(None) => Ok(()),
            _ => Err(CompilerError::unsupported(
                "Statement cannot be evaluated inside the circuit",
                ast.stmt_context(s),
            )),
        }
    }

    fn circuit_assign(&mut self, lhs: ExprId, rhs: ExprId) -> Result<()> {
        let ast = self.ast;
        match &ast.expr(lhs).kind {
            ExprKind::Ident(v) => {
                let value = self.circuit_expr(rhs)?;
                let var = ast.var(*v);
                self.introduce_temporary(RemapKey::Var(*v), &var.name, value, var.ty.ty.to_abstract());
                Ok(())
            }
            ExprKind::Tuple(targets) => {
                // All values are computed before any target is rebound
                let values = match &ast.expr(rhs).kind {
                    ExprKind::Tuple(elems) => elems.iter().map(|x| self.circuit_expr(*x)).collect::<Result<Vec<_>>>()?,
                    ExprKind::Call { func, args } => self.inline_call(rhs, *func, args)?,
                    _ => {
                        return Err(CompilerError::unsupported(
                            "Tuple assignment from this expression inside the circuit",
                            ast.expr_context(rhs),
                        ))
                    }
                };
                if values.len() != targets.len() {
                    return Err(CompilerError::internal("tuple assignment arity mismatch"));
                }
                for (t, value) in targets.iter().zip(values) {
                    let ExprKind::Ident(v) = ast.expr(*t).kind else {
                        return Err(CompilerError::unsupported(
                            "Assignment to a non-variable location inside the circuit",
                            ast.expr_context(*t),
                        ));
                    };
                    let var = ast.var(v);
                    self.introduce_temporary(RemapKey::Var(v), &var.name, value, var.ty.ty.to_abstract());
                }
                Ok(())
            }
            _ => Err(CompilerError::unsupported(
                "Assignment to a non-variable location inside the circuit",
                ast.expr_context(lhs),
            )),
        }
    }

    fn circuit_return(&mut self, s: StmtId, e: ExprId) -> Result<()> {
        let ast = self.ast;
        let Some(&func) = self.inline_stack.last() else {
            return Err(CompilerError::internal("return statement evaluated outside of an inlined function"));
        };
        let returns = &ast.function(func).returns;
        let values = match &ast.expr(e).kind {
            ExprKind::Tuple(elems) if returns.len() > 1 => elems.clone(),
            _ => vec![e],
        };
        for (i, v) in values.into_iter().enumerate() {
            let key = RemapKey::Return(func, i);
            if self.remapper.is_remapped(&key) {
                return Err(CompilerError::internal(format!(
                    "duplicate return binding in '{}' ({})",
                    ast.function(func).name,
                    ast.stmt_context(s)
                )));
            }
            let value = self.circuit_expr(v)?;
            let ty = returns.get(i).map(|r| r.ty.to_abstract()).unwrap_or(TypeName::uint());
            let hint = self.config.return_var(i);
            self.introduce_temporary(key, &hint, value, ty);
        }
        Ok(())
    }

    fn add_if_statement_to_circuit(&mut self, s: StmtId) -> Result<()> {
        let ast = self.ast;
        let StmtKind::If { cond, then, otherwise } = ast.stmt(s).kind else {
            return Err(CompilerError::internal("expected an if statement"));
        };
        self.indent_block(format!("if ({})", source_expr(ast, cond)), |h| {
            let guard = h.evaluate_private_expression(cond, "")?;
            let saved = h.remapper.get_state();

            h.phi.push(CircuitStatement::Comment { text: format!("if ({})", guard.name) });
            h.guarded(&guard, true, |h| h.circuit_stmt(then))?;
            let then_state = h.remapper.get_state();
            h.remapper.set_state(saved);

            if let Some(o) = otherwise {
                h.phi.push(CircuitStatement::Comment { text: format!("else ({})", guard.name) });
                h.guarded(&guard, false, |h| h.circuit_stmt(o))?;
            }

            h.phi.push(CircuitStatement::Comment { text: format!("join ({})", guard.name) });
            h.join_branches(&guard, then_state)
        })
    }

    /// Merges the bindings of both branches with `guard ? then : else`
    fn join_branches(
        &mut self,
        guard: &HybridArgumentIdf,
        then_state: super::remap::RemapState<RemapKey, HybridArgumentIdf>,
    ) -> Result<()> {
        let ast = self.ast;
        let mut remapper = std::mem::take(&mut self.remapper);
        let result = remapper.join_branch(then_state, |key, then_val, else_val| {
            let RemapKey::Var(v) = *key else {
                return Err(CompilerError::internal("return value bound inside a private branch"));
            };
            let var = ast.var(v);
            let then_val = match then_val {
                Some(idf) => idf.expr(),
                None => self.add_to_circuit_inputs(InputSource::Var(v))?.expr(),
            };
            let else_val = match else_val {
                Some(idf) => idf.expr(),
                None => self.add_to_circuit_inputs(InputSource::Var(v))?.expr(),
            };
            let value = CircuitExpr::ite(guard.expr(), then_val, else_val);
            Ok(self.new_temporary(&var.name, value, var.ty.ty.to_abstract()))
        });
        self.remapper = remapper;
        result
    }

    /// Evaluates a whole statement inside the circuit
    ///
    /// Returns the public assignment of the variables the statement writes.
    pub fn evaluate_stmt_in_circuit(&mut self, s: StmtId) -> Result<Option<PubStmt>> {
        let ast = self.ast;
        if !self.remapper.is_empty() {
            return Err(CompilerError::internal("circuit statement evaluated with live bindings"));
        }
        let stmt = ast.stmt(s);
        let result = self.indent_block(source_stmt(ast, s), |h| {
            for v in &stmt.read {
                let var = ast.var(*v);
                if ast.declared_outside(*v, s) && var.ty.ty.is_primitive() {
                    let value = h.add_to_circuit_inputs(InputSource::Var(*v))?;
                    h.introduce_temporary(RemapKey::Var(*v), &var.name, value.expr(), var.ty.ty.to_abstract());
                }
            }
            h.circuit_stmt(s)?;

            let mut targets = Vec::new();
            let mut values = Vec::new();
            for v in &stmt.modified {
                if !ast.declared_outside(*v, s) {
                    continue;
                }
                let var = ast.var(*v);
                let current = h.remapper.get_current(&RemapKey::Var(*v)).cloned().ok_or_else(|| {
                    CompilerError::internal(format!("no circuit value for modified variable '{}'", var.name))
                })?;
                let value = h.output_for(
                    OutputSource::Circuit(current.clone()),
                    &var.ty.privacy,
                    Some(s),
                    var.ty.ty.to_abstract(),
                    &current.name,
                )?;
                targets.push(PubExpr::ident(&var.name));
                values.push(value);
            }
            Ok((targets, values))
        });
        self.remapper = Remapper::new();
        let (mut targets, mut values) = result?;
        Ok(match targets.len() {
            0 => None,
            1 => Some(PubStmt::assign(targets.remove(0), values.remove(0))),
            _ => Some(PubStmt::assign(PubExpr::Tuple(targets), PubExpr::Tuple(values))),
        })
    }

    /// Includes the circuit of a called function which requires verification
    pub fn call_function(&mut self, f: FunctionId) {
        self.calls.push(f);
        self.phi.push(CircuitStatement::Call { function: circuit_name(self.ast, self.config, f) });
    }

    /// Freezes the helper into a [`Circuit`]
    pub fn into_circuit(self, contract: &str, function: String, verifier: Option<String>, trans: &TransIo) -> Circuit {
        let ast = self.ast;
        let config = self.config;
        let in_total = self.in_size() + trans.in_size;
        let out_total = self.out_size() + trans.out_size;
        let key_names = trans.keys.iter().map(|k| self.global_key_name(*k)).collect();
        Circuit {
            contract: contract.to_string(),
            function,
            verifier,
            secret: self.secret.layout(),
            inputs: self.inputs.layout(),
            outputs: self.outputs.layout(),
            priv_in_size: self.secret.size(),
            in_size: self.inputs.size(),
            out_size: self.outputs.size(),
            trans_priv_size: trans.priv_size,
            trans_in_size: trans.in_size,
            trans_out_size: trans.out_size,
            global_keys: key_names,
            calls: self.calls.iter().map(|f| circuit_name(ast, config, *f)).collect(),
            uses_hash: config.should_use_hash(in_total + out_total),
            phi: self.phi,
        }
    }
}
