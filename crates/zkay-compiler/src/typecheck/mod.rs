//! Privacy type checker
//!
//! Assigns every expression an [`AnnotatedType`] bottom-up and enforces the
//! ownership rules. Where a value flows into a location of a wider type or a
//! private owner, the checker splices an implicit cast or an implicit
//! reclassification (make-private) node into the tree. Running the checker
//! again over its own output changes nothing.

pub mod final_check;

use tracing::{debug, warn};

use crate::analysis::alias::AliasState;
use crate::ast::literal;
use crate::ast::types::{
    AnnotatedType, BuiltinOp, Combined, InstanceOf, LiteralValue, OperandKind, Privacy, TypeName,
};
use crate::ast::{Ast, ContractId, ExprId, ExprKind, FunctionId, StmtId, StmtKind, VarId};
use crate::error::{CompilerError, ErrorContext, Result};

/// Type checks the whole AST, annotating and rewriting expressions in place
pub fn run(ast: &mut Ast) -> Result<()> {
    let contracts: Vec<ContractId> = ast.contract_ids().collect();
    let mut checker = TypeChecker { ast };
    for c in contracts {
        checker.contract(c)?;
    }
    debug!("type check complete");
    Ok(())
}

struct TypeChecker<'a> {
    ast: &'a mut Ast,
}

impl TypeChecker<'_> {
    fn ty(&self, e: ExprId) -> Result<AnnotatedType> {
        self.ast
            .expr(e)
            .ty
            .clone()
            .ok_or_else(|| CompilerError::internal("expression used before it was type checked"))
    }

    fn set_ty(&mut self, e: ExprId, ty: AnnotatedType) {
        self.ast.expr_mut(e).ty = Some(ty);
    }

    fn analysis(&self, e: ExprId) -> Option<&AliasState> {
        self.ast.expr(e).stmt.and_then(|s| self.ast.stmt(s).before.as_ref())
    }

    fn err(&self, e: ExprId, msg: impl Into<String>) -> CompilerError {
        CompilerError::type_error(msg, self.ast.expr_context(e))
    }

    fn mismatch(&self, e: ExprId, expected: &AnnotatedType, actual: &AnnotatedType) -> CompilerError {
        CompilerError::type_mismatch(
            self.ast.describe_type(expected),
            self.ast.describe_type(actual),
            self.ast.expr_context(e),
        )
    }

    fn same_label(&self, e: ExprId, a: &Privacy, b: &Privacy) -> bool {
        if a == b {
            return true;
        }
        match (a.label(), b.label(), self.analysis(e)) {
            (Some(x), Some(y), Some(s)) => s.same_partition(&x, &y),
            _ => false,
        }
    }

    /// Whether the value of `e` can be read by the transacting party
    fn is_accessible(&self, e: ExprId, ty: &AnnotatedType) -> bool {
        !ty.is_private() || self.same_label(e, &ty.privacy, &Privacy::Me)
    }

    fn instance_of(&self, e: ExprId, actual: &AnnotatedType, expected: &AnnotatedType) -> InstanceOf {
        if let (TypeName::Tuple(a), TypeName::Tuple(b)) = (&actual.ty, &expected.ty) {
            if a.len() != b.len() {
                return InstanceOf::Mismatch;
            }
            let all_match = a.iter().zip(b).all(|(x, y)| self.instance_of(e, x, y) == InstanceOf::Match);
            return if all_match { InstanceOf::Match } else { InstanceOf::Mismatch };
        }
        if !actual.ty.implicitly_convertible_to(&expected.ty) {
            return InstanceOf::Mismatch;
        }
        if self.same_label(e, &actual.privacy, &expected.privacy) {
            InstanceOf::Match
        } else if actual.privacy.is_all() {
            InstanceOf::RequiresUpgrade
        } else {
            InstanceOf::Mismatch
        }
    }

    /// Converts `e` so that it can be used where `expected` is required
    fn rhs(&mut self, e: ExprId, expected: &AnnotatedType) -> Result<ExprId> {
        if let (ExprKind::Tuple(elems), TypeName::Tuple(types)) = (self.ast.expr(e).kind.clone(), &expected.ty) {
            if elems.len() != types.len() {
                return Err(self.mismatch(e, expected, &self.ty(e)?));
            }
            let mut converted = Vec::new();
            for (x, t) in elems.iter().zip(types) {
                converted.push(self.rhs(*x, t)?);
            }
            let types = converted.iter().map(|x| self.ty(*x)).collect::<Result<Vec<_>>>()?;
            self.set_ty(e, AnnotatedType::all(TypeName::Tuple(types)));
            return Ok(e);
        }

        let actual = self.ty(e)?;
        match self.instance_of(e, &actual, expected) {
            InstanceOf::Mismatch => Err(self.mismatch(e, expected, &actual)),
            instance => {
                let mut out = e;
                if actual.ty != expected.ty && !matches!(expected.ty, TypeName::Tuple(_)) {
                    out = self.implicitly_converted(out, &expected.ty)?;
                }
                if instance == InstanceOf::RequiresUpgrade {
                    out = self.make_private(out, expected.privacy.clone());
                }
                Ok(out)
            }
        }
    }

    fn implicitly_converted(&mut self, e: ExprId, to: &TypeName) -> Result<ExprId> {
        let ty = self.ty(e)?;
        if let ExprKind::Reclassify { expr, .. } = self.ast.expr(e).kind.clone() {
            if ty.is_private() {
                let inner = self.implicitly_converted(expr, to)?;
                let inner_ty = self.ty(inner)?;
                self.set_ty(e, AnnotatedType::new(inner_ty.ty, ty.privacy));
                return Ok(e);
            }
        }
        if !ty.ty.is_primitive() || !to.is_primitive() {
            return Err(self.err(e, format!("Cannot convert {} to {}", self.ast.describe_type(&ty), to)));
        }
        let to = to.clone();
        let cast = self.ast.wrap_expr(e, |inner| ExprKind::Cast { ty: to.clone(), expr: inner, implicit: true });
        self.set_ty(cast, AnnotatedType::new(to, ty.privacy));
        Ok(cast)
    }

    fn make_private(&mut self, e: ExprId, privacy: Privacy) -> ExprId {
        let ty = self.ast.expr(e).ty.clone().map(|t| t.ty).unwrap_or(TypeName::uint());
        let p = privacy.clone();
        let r = self.ast.wrap_expr(e, |inner| ExprKind::Reclassify { expr: inner, privacy: p, implicit: true });
        self.set_ty(r, AnnotatedType::new(ty, privacy));
        r
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    fn contract(&mut self, c: ContractId) -> Result<()> {
        let contract = self.ast.contract(c).clone();
        for v in &contract.state_vars {
            let ty = self.ast.var(*v).ty.clone();
            self.check_declared(&ty, self.ast.var_context(*v))?;
            if let Some(init) = self.ast.var(*v).initializer {
                self.expr(init)?;
                let init = self.rhs(init, &ty)?;
                self.ast.vars[v.index()].initializer = Some(init);
                let mut private = false;
                self.ast.walk_expr(init, &mut |x| {
                    private |= self.ast.expr(x).ty.as_ref().is_some_and(|t| t.is_private())
                        || matches!(self.ast.expr(x).kind, ExprKind::Reclassify { .. });
                });
                if private {
                    return Err(CompilerError::type_error(
                        "Private assignments to state variables must be in the constructor",
                        self.ast.var_context(*v),
                    ));
                }
            }
        }
        for f in &contract.functions {
            self.function(*f)?;
        }
        Ok(())
    }

    fn function(&mut self, f: FunctionId) -> Result<()> {
        let func = self.ast.function(f).clone();
        let ctx = self.ast.context_at(func.span, Some(f), None);
        for p in &func.params {
            let ty = self.ast.var(*p).ty.clone();
            if !matches!(ty.privacy, Privacy::All | Privacy::Me) {
                return Err(CompilerError::type_error(
                    "Only me/all accepted as privacy type of function parameters",
                    self.ast.var_context(*p),
                ));
            }
            self.check_declared(&ty, self.ast.var_context(*p))?;
        }
        for r in &func.returns {
            if func.can_be_external() && !matches!(r.privacy, Privacy::All | Privacy::Me) {
                return Err(CompilerError::type_error(
                    "Only me/all accepted as privacy type of return values for public functions",
                    ctx.clone(),
                ));
            }
            self.check_declared(r, ctx.clone())?;
        }
        self.stmt(func.body)
    }

    /// Validates a declared annotated type
    fn check_declared(&self, ty: &AnnotatedType, ctx: ErrorContext) -> Result<()> {
        match &ty.privacy {
            Privacy::Var(v) if !self.is_resolvable_label(*v) => {
                return Err(CompilerError::type_error(
                    format!(
                        "Privacy annotation '{}' must be a final or constant address",
                        self.ast.var_name(*v)
                    ),
                    ctx,
                ));
            }
            _ => {}
        }
        if ty.is_private() && !ty.ty.can_be_private() {
            let msg = if ty.ty == TypeName::Int(256) {
                "Private int256 is not supported".to_string()
            } else {
                format!("Only primitive types can be private, got {}", self.ast.describe_type(ty))
            };
            return Err(CompilerError::type_error(msg, ctx));
        }
        match &ty.ty {
            TypeName::Mapping { key, value, .. } => {
                if !key.is_primitive() {
                    return Err(CompilerError::type_error("Mapping keys must be primitive", ctx));
                }
                self.check_declared(value, ctx)
            }
            TypeName::Array { elem, .. } => self.check_declared(elem, ctx),
            _ => Ok(()),
        }
    }

    fn is_resolvable_label(&self, v: VarId) -> bool {
        let var = self.ast.var(v);
        (var.is_final || var.is_constant) && var.ty.ty.is_address() && var.ty.privacy.is_all()
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn stmt(&mut self, s: StmtId) -> Result<()> {
        let kind = self.ast.stmt(s).kind.clone();
        match kind {
            StmtKind::Block(stmts) => {
                for x in stmts {
                    self.stmt(x)?;
                }
            }
            StmtKind::If { cond, then, otherwise } => {
                self.expr(cond)?;
                let t = self.ty(cond)?;
                if !t.ty.is_bool() {
                    return Err(self.mismatch(cond, &AnnotatedType::new(TypeName::Bool, t.privacy.clone()), &t));
                }
                if t.is_private() && !self.is_accessible(cond, &t) {
                    return Err(self.mismatch(cond, &AnnotatedType::me(TypeName::Bool), &t));
                }
                self.stmt(then)?;
                if let Some(o) = otherwise {
                    self.stmt(o)?;
                }
            }
            StmtKind::While { cond, body } | StmtKind::DoWhile { body, cond } => {
                self.loop_condition(cond)?;
                self.stmt(body)?;
            }
            StmtKind::For { init, cond, update, body } => {
                if let Some(i) = init {
                    self.stmt(i)?;
                }
                if let Some(c) = cond {
                    self.loop_condition(c)?;
                }
                self.stmt(body)?;
                if let Some(u) = update {
                    self.stmt(u)?;
                }
            }
            StmtKind::VarDecl { var, init } => {
                let ty = self.ast.var(var).ty.clone();
                self.check_declared(&ty, self.ast.var_context(var))?;
                if let Some(e) = init {
                    self.expr(e)?;
                    let e = self.rhs(e, &ty)?;
                    self.ast.vars[var.index()].initializer = Some(e);
                }
            }
            StmtKind::Assign { lhs, rhs } => {
                self.expr(lhs)?;
                self.check_location(lhs)?;
                self.expr(rhs)?;
                let expected = self.ty(lhs)?;
                self.rhs(rhs, &expected)?;
            }
            StmtKind::Expr(e) => self.expr(e)?,
            StmtKind::Require(e) => {
                self.expr(e)?;
                let t = self.ty(e)?;
                let expected = AnnotatedType::all(TypeName::Bool);
                if self.instance_of(e, &t, &expected) != InstanceOf::Match {
                    return Err(self.mismatch(e, &expected, &t));
                }
            }
            StmtKind::Return(value) => {
                let func = self.ast.function(self.ast.stmt(s).function);
                let expected = match func.returns.as_slice() {
                    [] => None,
                    [single] => Some(single.clone()),
                    many => Some(AnnotatedType::all(TypeName::Tuple(many.to_vec()))),
                };
                match (value, expected) {
                    (None, None) => {}
                    (Some(e), Some(t)) => {
                        self.expr(e)?;
                        self.rhs(e, &t)?;
                    }
                    (Some(e), None) => return Err(self.err(e, "Function does not return a value")),
                    (None, Some(_)) => {
                        return Err(CompilerError::type_error(
                            "Missing return value",
                            self.ast.stmt_context(s),
                        ))
                    }
                }
            }
            StmtKind::Break | StmtKind::Continue => {}
        }
        Ok(())
    }

    fn loop_condition(&mut self, cond: ExprId) -> Result<()> {
        self.expr(cond)?;
        let t = self.ty(cond)?;
        let expected = AnnotatedType::all(TypeName::Bool);
        if self.instance_of(cond, &t, &expected) != InstanceOf::Match {
            return Err(self.mismatch(cond, &expected, &t));
        }
        Ok(())
    }

    fn check_location(&self, lhs: ExprId) -> Result<()> {
        match &self.ast.expr(lhs).kind {
            ExprKind::Ident(v) => self.check_writable(lhs, *v),
            ExprKind::Index { base, .. } => self.check_location(*base),
            ExprKind::Tuple(elems) => elems.iter().try_for_each(|e| self.check_location(*e)),
            _ => Err(self.err(lhs, "Assignment target is not a location")),
        }
    }

    fn check_writable(&self, lhs: ExprId, v: VarId) -> Result<()> {
        let var = self.ast.var(v);
        if var.is_constant {
            return Err(self.err(lhs, format!("Modifying constant variable '{}'", var.name)));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn expr(&mut self, e: ExprId) -> Result<()> {
        for child in self.ast.expr(e).kind.children() {
            self.expr(child)?;
        }
        let kind = self.ast.expr(e).kind.clone();
        let ty = match kind {
            ExprKind::Bool(b) => AnnotatedType::all(TypeName::BoolLiteral(b)),
            ExprKind::Number(n) => {
                if !literal::fits_machine_word(&n) {
                    return Err(self.err(e, format!("Literal {} does not fit into 256 bits", n)));
                }
                AnnotatedType::all(TypeName::NumberLiteral(n))
            }
            ExprKind::Me => AnnotatedType::all(TypeName::Address),
            ExprKind::Ident(v) => self.ast.var(v).ty.clone(),
            ExprKind::Tuple(elems) => AnnotatedType::all(TypeName::Tuple(
                elems.iter().map(|x| self.ty(*x)).collect::<Result<Vec<_>>>()?,
            )),
            ExprKind::Index { base, index } => self.index(e, base, index)?,
            ExprKind::Call { func, args } => self.call(func, args)?,
            ExprKind::Reclassify { expr, privacy, implicit } => self.reclassify(e, expr, privacy, implicit)?,
            ExprKind::Cast { ty, expr, implicit } => self.cast(e, ty, expr, implicit)?,
            ExprKind::Builtin { op, args, .. } => self.builtin(e, op, args)?,
        };
        self.set_ty(e, ty);
        Ok(())
    }

    fn index(&mut self, e: ExprId, base: ExprId, index: ExprId) -> Result<AnnotatedType> {
        let base_ty = self.ty(base)?;
        match base_ty.ty {
            TypeName::Mapping { key, key_label, value } => {
                let index = self.rhs(index, &AnnotatedType::all(*key))?;
                let mut value = *value;
                if key_label.is_some() {
                    let Some(label) = self.ast.privacy_label(index) else {
                        return Err(self.err(
                            index,
                            "Index of a mapping with a key label must be a label (me or an identifier)",
                        ));
                    };
                    if matches!(value.privacy, Privacy::KeyLabel(_)) {
                        value.privacy = label.into();
                    }
                }
                Ok(value)
            }
            TypeName::Array { elem, .. } => {
                let t = self.ty(index)?;
                if !t.ty.is_numeric() || t.is_private() {
                    return Err(self.mismatch(index, &AnnotatedType::all(TypeName::uint()), &t));
                }
                Ok(*elem)
            }
            _ => Err(self.err(e, format!("Cannot index a value of type {}", self.ast.describe_type(&base_ty)))),
        }
    }

    fn call(&mut self, func: FunctionId, args: Vec<ExprId>) -> Result<AnnotatedType> {
        let f = self.ast.function(func).clone();
        for (arg, param) in args.iter().zip(&f.params) {
            let expected = self.ast.var(*param).ty.clone();
            self.rhs(*arg, &expected)?;
        }
        Ok(match f.returns.as_slice() {
            [single] => single.clone(),
            many => AnnotatedType::all(TypeName::Tuple(many.to_vec())),
        })
    }

    fn reclassify(&mut self, e: ExprId, inner: ExprId, privacy: Privacy, implicit: bool) -> Result<AnnotatedType> {
        let t = self.ty(inner)?;
        if implicit {
            return Ok(AnnotatedType::new(t.ty, privacy));
        }
        if let Privacy::Var(v) = privacy {
            if !self.is_resolvable_label(v) {
                return Err(self.err(
                    e,
                    format!("Second argument of reveal must be a resolvable label, got '{}'", self.ast.var_name(v)),
                ));
            }
        }
        if !t.ty.can_be_private() && !t.ty.is_literal() {
            return Err(self.err(e, format!("Cannot reveal a value of type {}", self.ast.describe_type(&t))));
        }
        if !self.is_accessible(inner, &t) {
            return Err(self.err(
                e,
                "First argument of reveal must be accessible, i.e. @all or provably equal to @me",
            ));
        }
        let target = AnnotatedType::new(t.ty.clone(), privacy.clone());
        if self.instance_of(e, &t, &target) == InstanceOf::Match {
            return Err(self.err(e, "Redundant reveal"));
        }
        Ok(AnnotatedType::new(t.ty.to_abstract(), privacy))
    }

    fn cast(&mut self, e: ExprId, ty: TypeName, inner: ExprId, implicit: bool) -> Result<AnnotatedType> {
        let t = self.ty(inner)?;
        if !ty.is_primitive() || !t.ty.is_primitive() {
            return Err(self.err(e, format!("Invalid cast from {} to {}", self.ast.describe_type(&t), ty)));
        }
        if let TypeName::NumberLiteral(v) = &t.ty {
            if !implicit && ty.is_numeric() && !ty.can_represent(v) {
                return Err(self.err(e, format!("Literal {} does not fit into {}", v, ty)));
            }
        }
        if implicit || !t.is_private() {
            return Ok(AnnotatedType::new(ty, t.privacy));
        }
        if !self.is_accessible(inner, &t) {
            return Err(self.err(e, "Cast of a private value requires it to be owned by me"));
        }
        Ok(AnnotatedType::me(ty))
    }

    fn builtin(&mut self, e: ExprId, op: BuiltinOp, args: Vec<ExprId>) -> Result<AnnotatedType> {
        let types = args.iter().map(|a| self.ty(*a)).collect::<Result<Vec<_>>>()?;
        if op == BuiltinOp::Parenthesis {
            return Ok(types[0].clone());
        }

        let public_ite = op == BuiltinOp::Ite && !types[0].is_private();
        if !public_ite && args.iter().zip(&types).any(|(a, t)| !self.is_accessible(*a, t)) {
            return Err(self.err(
                e,
                "Operation requires all arguments to be accessible, i.e. @all or provably equal to @me",
            ));
        }

        if op == BuiltinOp::Ite {
            return self.ite(e, &args, &types);
        }

        // Operand data types
        for (a, t) in args.iter().zip(&types) {
            let ok = match op.operand_kind() {
                OperandKind::Number => t.ty.is_numeric(),
                OperandKind::Bool => t.ty.is_bool(),
                OperandKind::Any => t.ty.is_primitive(),
            };
            if !ok {
                let expected = match op.operand_kind() {
                    OperandKind::Bool => TypeName::Bool,
                    _ => TypeName::uint(),
                };
                return Err(self.mismatch(*a, &AnnotatedType::new(expected, t.privacy.clone()), t));
            }
        }

        if types.iter().all(|t| t.ty.is_literal()) {
            return self.fold(e, op, &types);
        }

        // Common operand type
        let operand_ty = if op.is_shiftop() || types.len() == 1 {
            types[0].ty.to_abstract()
        } else {
            match types[0].ty.combined_type(&types[1].ty) {
                Some(Combined::Type(t)) => t.to_abstract(),
                Some(Combined::Literal) => types[0].ty.to_abstract(),
                None => return Err(self.mismatch(args[1], &AnnotatedType::all(types[0].ty.clone()), &types[1])),
            }
        };
        let result_ty = if op.returns_bool() { TypeName::Bool } else { operand_ty.clone() };

        let private = types.iter().any(|t| t.is_private());
        if !private {
            for (i, a) in args.iter().enumerate() {
                if op.is_shiftop() && i == 1 {
                    continue;
                }
                let t = types[i].clone();
                if t.ty != operand_ty {
                    self.rhs(*a, &AnnotatedType::new(operand_ty.clone(), t.privacy))?;
                }
            }
            return Ok(AnnotatedType::all(result_ty));
        }

        if !op.circuit_expressible() {
            return Err(CompilerError::compliance(
                format!("Operation '{}' is not supported for private values", op),
                self.ast.expr_context(e),
            ));
        }
        if (op.is_bitop() || op.is_shiftop()) && operand_ty.elem_bitwidth() == 256 {
            return Err(CompilerError::compliance(
                format!("Private bitwise operation '{}' is not supported for 256-bit values", op),
                self.ast.expr_context(e),
            ));
        }
        if op.is_shiftop() && !matches!(&types[1].ty, TypeName::NumberLiteral(v) if !literal::is_negative(v)) {
            return Err(CompilerError::compliance(
                "Private shift requires a non-negative literal shift amount",
                self.ast.expr_context(e),
            ));
        }
        if (op.is_arithmetic() || op.is_comparison()) && operand_ty.elem_bitwidth() == 256 {
            let ctx = self.ast.expr_context(e);
            warn!(
                line = ctx.line,
                column = ctx.column,
                "private arithmetic on 256-bit values may overflow the field"
            );
        }

        if let ExprKind::Builtin { private, .. } = &mut self.ast.expr_mut(e).kind {
            *private = true;
        }
        for (i, a) in args.iter().enumerate() {
            if op.is_shiftop() && i == 1 {
                continue;
            }
            self.rhs(*a, &AnnotatedType::me(operand_ty.clone()))?;
        }
        Ok(AnnotatedType::me(result_ty))
    }

    fn ite(&mut self, e: ExprId, args: &[ExprId], types: &[AnnotatedType]) -> Result<AnnotatedType> {
        if !types[0].ty.is_bool() {
            return Err(self.mismatch(args[0], &AnnotatedType::new(TypeName::Bool, types[0].privacy.clone()), &types[0]));
        }
        if types.iter().all(|t| t.ty.is_literal()) {
            return self.fold(e, BuiltinOp::Ite, types);
        }
        let data_ty = match types[1].ty.combined_type(&types[2].ty) {
            Some(Combined::Type(t)) => t.to_abstract(),
            Some(Combined::Literal) => types[1].ty.to_abstract(),
            None => return Err(self.mismatch(args[2], &AnnotatedType::all(types[1].ty.clone()), &types[2])),
        };

        if types[0].is_private() {
            if let ExprKind::Builtin { private, .. } = &mut self.ast.expr_mut(e).kind {
                *private = true;
            }
            self.rhs(args[0], &AnnotatedType::me(TypeName::Bool))?;
            self.rhs(args[1], &AnnotatedType::me(data_ty.clone()))?;
            self.rhs(args[2], &AnnotatedType::me(data_ty.clone()))?;
            return Ok(AnnotatedType::me(data_ty));
        }

        // Public condition: the result owner is the common owner of both branches
        let privacy = if self.same_label(e, &types[1].privacy, &types[2].privacy) {
            types[1].privacy.clone()
        } else if types[1].privacy.is_all() {
            types[2].privacy.clone()
        } else if types[2].privacy.is_all() {
            types[1].privacy.clone()
        } else {
            return Err(self.mismatch(args[2], &AnnotatedType::new(data_ty, types[1].privacy.clone()), &types[2]));
        };
        let expected = AnnotatedType::new(data_ty, privacy);
        self.rhs(args[1], &expected)?;
        self.rhs(args[2], &expected)?;
        Ok(expected)
    }

    fn fold(&self, e: ExprId, op: BuiltinOp, types: &[AnnotatedType]) -> Result<AnnotatedType> {
        let values: Vec<LiteralValue> = types
            .iter()
            .map(|t| match &t.ty {
                TypeName::NumberLiteral(v) => LiteralValue::Number(v.clone()),
                TypeName::BoolLiteral(b) => LiteralValue::Bool(*b),
                _ => LiteralValue::Bool(false),
            })
            .collect();
        match op.fold(&values) {
            Some(LiteralValue::Number(v)) => Ok(AnnotatedType::all(TypeName::NumberLiteral(v))),
            Some(LiteralValue::Bool(b)) => Ok(AnnotatedType::all(TypeName::BoolLiteral(b))),
            None => Err(self.err(
                e,
                format!("Constant expression with operator '{}' is undefined or does not fit into 256 bits", op),
            )),
        }
    }
}
