//! Resolved program representation
//!
//! The AST is an arena: every contract, function, variable, statement and
//! expression lives in a vector of [`Ast`] and is addressed by a typed index.
//! Nodes store their parent index, so passes can look up the enclosing
//! statement or function, and the type checker can splice wrapper nodes
//! (implicit casts, reclassifications) into the tree by patching one slot in
//! the parent.

pub mod build;
pub mod literal;
pub mod types;

use std::collections::BTreeSet;

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::analysis::partition::PartitionState;
use crate::error::ErrorContext;
pub use crate::syntax::Span;
use types::{AnnotatedType, BuiltinOp, Label, Privacy, TypeName};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

define_id!(ContractId);
define_id!(FunctionId);
define_id!(
    /// Any declared name: state variable, parameter or local
    VarId
);
define_id!(StmtId);
define_id!(ExprId);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionKind {
    #[default]
    Function,
    Constructor,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    External,
    Internal,
    Private,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mutability {
    #[default]
    NonPayable,
    Payable,
    View,
    Pure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parent {
    Expr(ExprId),
    Stmt(StmtId),
    Var(VarId),
}

#[derive(Debug, Clone)]
pub struct Contract {
    pub name: String,
    pub state_vars: Vec<VarId>,
    pub functions: Vec<FunctionId>,
    pub span: Span,
}

/// Facts computed by the analysis passes
#[derive(Debug, Clone, Default)]
pub struct FunctionFacts {
    /// Direct callees in order of first occurrence
    pub called_functions: Vec<FunctionId>,
    pub is_recursive: bool,
    pub has_static_body: bool,
    pub has_side_effects: bool,
    pub modified_state: BTreeSet<VarId>,
    pub read_state: BTreeSet<VarId>,
    pub can_be_private: bool,
    pub requires_verification: bool,
    pub requires_verification_when_external: bool,
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    /// Name unique among the contract's functions (overloads are suffixed)
    pub unambiguous_name: String,
    pub contract: ContractId,
    pub kind: FunctionKind,
    pub visibility: Visibility,
    pub mutability: Mutability,
    pub params: Vec<VarId>,
    pub returns: Vec<AnnotatedType>,
    pub body: StmtId,
    pub span: Span,
    pub facts: FunctionFacts,
}

impl Function {
    pub fn is_constructor(&self) -> bool {
        self.kind == FunctionKind::Constructor
    }

    pub fn can_be_external(&self) -> bool {
        matches!(self.visibility, Visibility::Public | Visibility::External) || self.is_constructor()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    State,
    Param,
    Local,
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub kind: VarKind,
    pub ty: AnnotatedType,
    pub is_final: bool,
    pub is_constant: bool,
    pub initializer: Option<ExprId>,
    pub contract: ContractId,
    pub function: Option<FunctionId>,
    /// Declaring statement of a local
    pub decl_stmt: Option<StmtId>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Block(Vec<StmtId>),
    If { cond: ExprId, then: StmtId, otherwise: Option<StmtId> },
    While { cond: ExprId, body: StmtId },
    DoWhile { body: StmtId, cond: ExprId },
    For { init: Option<StmtId>, cond: Option<ExprId>, update: Option<StmtId>, body: StmtId },
    VarDecl { var: VarId, init: Option<ExprId> },
    Assign { lhs: ExprId, rhs: ExprId },
    Expr(ExprId),
    Require(ExprId),
    Return(Option<ExprId>),
    Break,
    Continue,
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
    pub parent: Option<StmtId>,
    pub function: FunctionId,
    pub before: Option<PartitionState<Label>>,
    pub after: Option<PartitionState<Label>>,
    pub modified: BTreeSet<VarId>,
    pub read: BTreeSet<VarId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Bool(bool),
    Number(BigInt),
    Me,
    Ident(VarId),
    /// `private` is set by the type checker when the operation runs inside the circuit
    Builtin { op: BuiltinOp, args: Vec<ExprId>, private: bool },
    Call { func: FunctionId, args: Vec<ExprId> },
    Index { base: ExprId, index: ExprId },
    /// `reveal(expr, privacy)`; `implicit` marks reclassifications inserted by the type checker
    Reclassify { expr: ExprId, privacy: Privacy, implicit: bool },
    Cast { ty: TypeName, expr: ExprId, implicit: bool },
    Tuple(Vec<ExprId>),
}

impl ExprKind {
    pub fn children(&self) -> Vec<ExprId> {
        match self {
            ExprKind::Bool(_) | ExprKind::Number(_) | ExprKind::Me | ExprKind::Ident(_) => Vec::new(),
            ExprKind::Builtin { args, .. } | ExprKind::Call { args, .. } => args.clone(),
            ExprKind::Tuple(elems) => elems.clone(),
            ExprKind::Index { base, index } => vec![*base, *index],
            ExprKind::Reclassify { expr, .. } | ExprKind::Cast { expr, .. } => vec![*expr],
        }
    }

    fn children_mut(&mut self) -> Vec<&mut ExprId> {
        match self {
            ExprKind::Bool(_) | ExprKind::Number(_) | ExprKind::Me | ExprKind::Ident(_) => Vec::new(),
            ExprKind::Builtin { args, .. } | ExprKind::Call { args, .. } => args.iter_mut().collect(),
            ExprKind::Tuple(elems) => elems.iter_mut().collect(),
            ExprKind::Index { base, index } => vec![base, index],
            ExprKind::Reclassify { expr, .. } | ExprKind::Cast { expr, .. } => vec![expr],
        }
    }
}

impl StmtKind {
    /// Expressions directly owned by the statement
    pub fn exprs(&self) -> Vec<ExprId> {
        match self {
            StmtKind::If { cond, .. } | StmtKind::While { cond, .. } | StmtKind::DoWhile { cond, .. } => {
                vec![*cond]
            }
            StmtKind::For { cond, .. } => cond.iter().copied().collect(),
            StmtKind::VarDecl { init, .. } => init.iter().copied().collect(),
            StmtKind::Assign { lhs, rhs } => vec![*lhs, *rhs],
            StmtKind::Expr(e) | StmtKind::Require(e) => vec![*e],
            StmtKind::Return(e) => e.iter().copied().collect(),
            StmtKind::Block(_) | StmtKind::Break | StmtKind::Continue => Vec::new(),
        }
    }

    fn exprs_mut(&mut self) -> Vec<&mut ExprId> {
        match self {
            StmtKind::If { cond, .. } | StmtKind::While { cond, .. } | StmtKind::DoWhile { cond, .. } => {
                vec![cond]
            }
            StmtKind::For { cond, .. } => cond.iter_mut().collect(),
            StmtKind::VarDecl { init, .. } => init.iter_mut().collect(),
            StmtKind::Assign { lhs, rhs } => vec![lhs, rhs],
            StmtKind::Expr(e) | StmtKind::Require(e) => vec![e],
            StmtKind::Return(e) => e.iter_mut().collect(),
            StmtKind::Block(_) | StmtKind::Break | StmtKind::Continue => Vec::new(),
        }
    }

    /// Nested statements in execution order
    pub fn stmts(&self) -> Vec<StmtId> {
        match self {
            StmtKind::Block(stmts) => stmts.clone(),
            StmtKind::If { then, otherwise, .. } => std::iter::once(*then).chain(*otherwise).collect(),
            StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => vec![*body],
            StmtKind::For { init, update, body, .. } => {
                init.iter().copied().chain(std::iter::once(*body)).chain(update.iter().copied()).collect()
            }
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    pub parent: Option<Parent>,
    /// Enclosing statement; `None` for state variable initializers
    pub stmt: Option<StmtId>,
    pub ty: Option<AnnotatedType>,
    /// Set when the expression is computed inside the circuit
    pub evaluate_privately: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Ast {
    pub contracts: Vec<Contract>,
    pub functions: Vec<Function>,
    pub vars: Vec<Variable>,
    pub stmts: Vec<Stmt>,
    pub exprs: Vec<Expr>,
}

impl Ast {
    pub fn contract(&self, id: ContractId) -> &Contract {
        &self.contracts[id.index()]
    }

    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.index()]
    }

    pub fn function_mut(&mut self, id: FunctionId) -> &mut Function {
        &mut self.functions[id.index()]
    }

    pub fn var(&self, id: VarId) -> &Variable {
        &self.vars[id.index()]
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.index()]
    }

    pub fn stmt_mut(&mut self, id: StmtId) -> &mut Stmt {
        &mut self.stmts[id.index()]
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    pub fn expr_mut(&mut self, id: ExprId) -> &mut Expr {
        &mut self.exprs[id.index()]
    }

    pub fn contract_ids(&self) -> impl Iterator<Item = ContractId> {
        (0..self.contracts.len() as u32).map(ContractId)
    }

    pub fn function_ids(&self) -> impl Iterator<Item = FunctionId> {
        (0..self.functions.len() as u32).map(FunctionId)
    }

    pub fn function_by_name(&self, contract: ContractId, name: &str) -> Option<FunctionId> {
        self.contract(contract).functions.iter().copied().find(|f| self.function(*f).name == name)
    }

    pub fn expr_type(&self, id: ExprId) -> Option<&AnnotatedType> {
        self.expr(id).ty.as_ref()
    }

    pub fn is_state_var(&self, id: VarId) -> bool {
        self.var(id).kind == VarKind::State
    }

    pub(crate) fn push_expr(&mut self, kind: ExprKind, span: Span) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        for child in kind.children() {
            self.exprs[child.index()].parent = Some(Parent::Expr(id));
        }
        self.exprs.push(Expr { kind, span, parent: None, stmt: None, ty: None, evaluate_privately: false });
        id
    }

    /// Inserts a new node between `inner` and its parent
    ///
    /// `make` receives `inner`'s id and returns the kind of the wrapper node.
    pub fn wrap_expr(&mut self, inner: ExprId, make: impl FnOnce(ExprId) -> ExprKind) -> ExprId {
        let (parent, stmt, span) = {
            let e = self.expr(inner);
            (e.parent, e.stmt, e.span)
        };
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(Expr {
            kind: make(inner),
            span,
            parent,
            stmt,
            ty: None,
            evaluate_privately: false,
        });
        self.replace_child(parent, inner, id);
        self.exprs[inner.index()].parent = Some(Parent::Expr(id));
        id
    }

    fn replace_child(&mut self, parent: Option<Parent>, old: ExprId, new: ExprId) {
        match parent {
            Some(Parent::Expr(p)) => {
                for slot in self.exprs[p.index()].kind.children_mut() {
                    if *slot == old {
                        *slot = new;
                    }
                }
            }
            Some(Parent::Stmt(s)) => {
                for slot in self.stmts[s.index()].kind.exprs_mut() {
                    if *slot == old {
                        *slot = new;
                    }
                }
            }
            Some(Parent::Var(v)) => {
                if self.vars[v.index()].initializer == Some(old) {
                    self.vars[v.index()].initializer = Some(new);
                }
            }
            None => {}
        }
    }

    /// Pre-order walk over an expression subtree
    pub fn walk_expr(&self, root: ExprId, visit: &mut dyn FnMut(ExprId)) {
        visit(root);
        for child in self.expr(root).kind.children() {
            self.walk_expr(child, visit);
        }
    }

    /// Pre-order walk over every statement of a subtree
    pub fn walk_stmt(&self, root: StmtId, visit: &mut dyn FnMut(StmtId)) {
        visit(root);
        for child in self.stmt(root).kind.stmts() {
            self.walk_stmt(child, visit);
        }
    }

    /// Every expression inside a statement subtree, including nested statements
    pub fn exprs_in_stmt(&self, root: StmtId) -> Vec<ExprId> {
        let mut out = Vec::new();
        self.walk_stmt(root, &mut |s| {
            for e in self.stmt(s).kind.exprs() {
                self.walk_expr(e, &mut |x| out.push(x));
            }
        });
        out
    }

    pub fn stmt_is_within(&self, stmt: StmtId, ancestor: StmtId) -> bool {
        let mut cur = Some(stmt);
        while let Some(s) = cur {
            if s == ancestor {
                return true;
            }
            cur = self.stmt(s).parent;
        }
        false
    }

    /// Whether `var` is visible at `stmt` without being declared inside it
    pub fn declared_outside(&self, var: VarId, stmt: StmtId) -> bool {
        match self.var(var).decl_stmt {
            Some(decl) => !self.stmt_is_within(decl, stmt),
            None => true,
        }
    }

    /// Locals declared directly in a block or for-loop header
    pub fn declared_in(&self, stmt: StmtId) -> Vec<VarId> {
        let direct: Vec<StmtId> = match &self.stmt(stmt).kind {
            StmtKind::Block(stmts) => stmts.clone(),
            StmtKind::For { init, .. } => init.iter().copied().collect(),
            _ => Vec::new(),
        };
        direct
            .into_iter()
            .filter_map(|s| match self.stmt(s).kind {
                StmtKind::VarDecl { var, .. } => Some(var),
                _ => None,
            })
            .collect()
    }

    /// The label an expression denotes when used as an owner, if any
    pub fn privacy_label(&self, expr: ExprId) -> Option<Label> {
        match &self.expr(expr).kind {
            ExprKind::Me => Some(Label::Me),
            ExprKind::Ident(v) => Some(Label::Var(*v)),
            _ => None,
        }
    }

    /// Whether the expression is (part of) an assignment target
    pub fn is_lvalue(&self, expr: ExprId) -> bool {
        match self.expr(expr).parent {
            Some(Parent::Stmt(s)) => matches!(self.stmt(s).kind, StmtKind::Assign { lhs, .. } if lhs == expr),
            Some(Parent::Expr(p)) => match self.expr(p).kind {
                ExprKind::Tuple(_) => self.is_lvalue(p),
                ExprKind::Index { base, .. } if base == expr => self.is_lvalue(p),
                _ => false,
            },
            _ => false,
        }
    }

    pub fn var_name(&self, id: VarId) -> String {
        self.var(id).name.clone()
    }

    pub fn describe_type(&self, ty: &AnnotatedType) -> String {
        ty.describe(&|v| self.var_name(v))
    }

    pub fn describe_privacy(&self, privacy: &Privacy) -> String {
        match privacy {
            Privacy::All => "all".to_string(),
            Privacy::Me => "me".to_string(),
            Privacy::Var(v) => self.var_name(*v),
            Privacy::KeyLabel(l) => l.clone(),
        }
    }

    pub fn describe_label(&self, label: Label) -> String {
        self.describe_privacy(&label.into())
    }

    pub fn context_at(&self, span: Span, function: Option<FunctionId>, contract: Option<ContractId>) -> ErrorContext {
        let contract = contract.or_else(|| function.map(|f| self.function(f).contract));
        ErrorContext {
            line: span.line,
            column: span.column,
            function: function.map(|f| self.function(f).name.clone()),
            contract: contract.map(|c| self.contract(c).name.clone()),
        }
    }

    pub fn stmt_context(&self, stmt: StmtId) -> ErrorContext {
        let s = self.stmt(stmt);
        self.context_at(s.span, Some(s.function), None)
    }

    pub fn expr_context(&self, expr: ExprId) -> ErrorContext {
        let e = self.expr(expr);
        if let Some(stmt) = e.stmt {
            return self.context_at(e.span, Some(self.stmt(stmt).function), None);
        }
        let mut cur = e.parent;
        while let Some(p) = cur {
            match p {
                Parent::Expr(pe) => cur = self.expr(pe).parent,
                Parent::Var(v) => {
                    let var = self.var(v);
                    return self.context_at(e.span, var.function, Some(var.contract));
                }
                Parent::Stmt(s) => return self.context_at(e.span, Some(self.stmt(s).function), None),
            }
        }
        self.context_at(e.span, None, None)
    }

    pub fn var_context(&self, var: VarId) -> ErrorContext {
        let v = self.var(var);
        self.context_at(v.span, v.function, Some(v.contract))
    }
}
