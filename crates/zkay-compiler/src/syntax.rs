//! Parsed input tree
//!
//! The grammar-driven parser lives outside this crate; it hands over a
//! `SourceUnit` serialized as JSON. Tests and embedders build the same tree
//! through the constructor helpers below.

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::ast::literal::decimal;
use crate::ast::types::BuiltinOp;
use crate::ast::{FunctionKind, Mutability, Visibility};
use crate::error::Result;

/// 1-based source position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceUnit {
    pub contracts: Vec<ContractDef>,
}

impl SourceUnit {
    pub fn single(contract: ContractDef) -> Self {
        Self { contracts: vec![contract] }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractDef {
    pub name: String,
    #[serde(default)]
    pub state_vars: Vec<StateVarDef>,
    #[serde(default)]
    pub functions: Vec<FunctionDef>,
    #[serde(default)]
    pub span: Span,
}

impl ContractDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), state_vars: Vec::new(), functions: Vec::new(), span: Span::default() }
    }

    pub fn state_var(mut self, var: StateVarDef) -> Self {
        self.state_vars.push(var);
        self
    }

    pub fn function(mut self, function: FunctionDef) -> Self {
        self.functions.push(function);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateVarDef {
    pub name: String,
    pub ty: TypeSpec,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub is_constant: bool,
    #[serde(default)]
    pub init: Option<Expression>,
    #[serde(default)]
    pub span: Span,
}

impl StateVarDef {
    pub fn new(name: impl Into<String>, ty: TypeSpec) -> Self {
        Self { name: name.into(), ty, is_final: false, is_constant: false, init: None, span: Span::default() }
    }

    pub fn final_(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn constant(mut self) -> Self {
        self.is_constant = true;
        self
    }

    pub fn init(mut self, expr: Expression) -> Self {
        self.init = Some(expr);
        self
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.span = Span::new(line, column);
        self
    }
}

/// Declared type with its owner annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeSpec {
    pub ty: DataType,
    #[serde(default)]
    pub privacy: Owner,
}

impl TypeSpec {
    pub fn new(ty: DataType, privacy: Owner) -> Self {
        Self { ty, privacy }
    }

    pub fn public(ty: DataType) -> Self {
        Self::new(ty, Owner::All)
    }

    pub fn me(ty: DataType) -> Self {
        Self::new(ty, Owner::Me)
    }

    pub fn owned_by(ty: DataType, owner: impl Into<String>) -> Self {
        Self::new(ty, Owner::Name(owner.into()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Bool,
    Uint(u16),
    Int(u16),
    Address,
    AddressPayable,
    Mapping {
        key: Box<DataType>,
        #[serde(default)]
        key_label: Option<String>,
        value: Box<TypeSpec>,
    },
    Array {
        elem: Box<TypeSpec>,
        #[serde(default)]
        len: Option<usize>,
    },
}

impl DataType {
    pub fn uint() -> Self {
        DataType::Uint(256)
    }

    pub fn mapping(key: DataType, value: TypeSpec) -> Self {
        DataType::Mapping { key: Box::new(key), key_label: None, value: Box::new(value) }
    }

    /// `mapping(key!label => value)`
    pub fn labeled_mapping(key: DataType, label: impl Into<String>, value: TypeSpec) -> Self {
        DataType::Mapping { key: Box::new(key), key_label: Some(label.into()), value: Box::new(value) }
    }
}

/// Privacy annotation as written: `@all`, `@me` or `@<name>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Owner {
    #[default]
    All,
    Me,
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    #[serde(default)]
    pub kind: FunctionKind,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub mutability: Mutability,
    #[serde(default)]
    pub params: Vec<ParamDef>,
    #[serde(default)]
    pub returns: Vec<TypeSpec>,
    #[serde(default)]
    pub body: Vec<Statement>,
    #[serde(default)]
    pub span: Span,
}

impl FunctionDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FunctionKind::Function,
            visibility: Visibility::Public,
            mutability: Mutability::NonPayable,
            params: Vec::new(),
            returns: Vec::new(),
            body: Vec::new(),
            span: Span::default(),
        }
    }

    pub fn constructor() -> Self {
        let mut f = Self::new("constructor");
        f.kind = FunctionKind::Constructor;
        f
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn mutability(mut self, mutability: Mutability) -> Self {
        self.mutability = mutability;
        self
    }

    pub fn param(mut self, name: impl Into<String>, ty: TypeSpec) -> Self {
        self.params.push(ParamDef { name: name.into(), ty, is_final: false, span: Span::default() });
        self
    }

    pub fn returns(mut self, ty: TypeSpec) -> Self {
        self.returns.push(ty);
        self
    }

    pub fn body(mut self, stmts: Vec<Statement>) -> Self {
        self.body = stmts;
        self
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.span = Span::new(line, column);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: String,
    pub ty: TypeSpec,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub kind: StatementKind,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Block(Vec<Statement>),
    If {
        cond: Expression,
        then: Box<Statement>,
        #[serde(default)]
        otherwise: Option<Box<Statement>>,
    },
    While {
        cond: Expression,
        body: Box<Statement>,
    },
    DoWhile {
        body: Box<Statement>,
        cond: Expression,
    },
    For {
        #[serde(default)]
        init: Option<Box<Statement>>,
        #[serde(default)]
        cond: Option<Expression>,
        #[serde(default)]
        update: Option<Box<Statement>>,
        body: Box<Statement>,
    },
    VarDecl {
        name: String,
        ty: TypeSpec,
        #[serde(default)]
        is_final: bool,
        #[serde(default)]
        init: Option<Expression>,
    },
    /// `lhs = rhs`, or `lhs op= rhs` when `op` is set
    Assign {
        lhs: Expression,
        #[serde(default)]
        op: Option<BuiltinOp>,
        rhs: Expression,
    },
    Expr(Expression),
    Require(Expression),
    Return(Option<Expression>),
    Break,
    Continue,
}

impl Statement {
    fn from_kind(kind: StatementKind) -> Self {
        Self { kind, span: Span::default() }
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.span = Span::new(line, column);
        self
    }

    pub fn block(stmts: Vec<Statement>) -> Self {
        Self::from_kind(StatementKind::Block(stmts))
    }

    pub fn if_then(cond: Expression, then: Vec<Statement>) -> Self {
        Self::from_kind(StatementKind::If { cond, then: Box::new(Self::block(then)), otherwise: None })
    }

    pub fn if_else(cond: Expression, then: Vec<Statement>, otherwise: Vec<Statement>) -> Self {
        Self::from_kind(StatementKind::If {
            cond,
            then: Box::new(Self::block(then)),
            otherwise: Some(Box::new(Self::block(otherwise))),
        })
    }

    pub fn while_loop(cond: Expression, body: Vec<Statement>) -> Self {
        Self::from_kind(StatementKind::While { cond, body: Box::new(Self::block(body)) })
    }

    pub fn do_while(body: Vec<Statement>, cond: Expression) -> Self {
        Self::from_kind(StatementKind::DoWhile { body: Box::new(Self::block(body)), cond })
    }

    pub fn for_loop(
        init: Option<Statement>,
        cond: Option<Expression>,
        update: Option<Statement>,
        body: Vec<Statement>,
    ) -> Self {
        Self::from_kind(StatementKind::For {
            init: init.map(Box::new),
            cond,
            update: update.map(Box::new),
            body: Box::new(Self::block(body)),
        })
    }

    pub fn decl(name: impl Into<String>, ty: TypeSpec, init: Option<Expression>) -> Self {
        Self::from_kind(StatementKind::VarDecl { name: name.into(), ty, is_final: false, init })
    }

    pub fn final_decl(name: impl Into<String>, ty: TypeSpec, init: Expression) -> Self {
        Self::from_kind(StatementKind::VarDecl { name: name.into(), ty, is_final: true, init: Some(init) })
    }

    pub fn assign(lhs: Expression, rhs: Expression) -> Self {
        Self::from_kind(StatementKind::Assign { lhs, op: None, rhs })
    }

    pub fn assign_op(lhs: Expression, op: BuiltinOp, rhs: Expression) -> Self {
        Self::from_kind(StatementKind::Assign { lhs, op: Some(op), rhs })
    }

    pub fn expr(expr: Expression) -> Self {
        Self::from_kind(StatementKind::Expr(expr))
    }

    pub fn require(cond: Expression) -> Self {
        Self::from_kind(StatementKind::Require(cond))
    }

    pub fn ret(value: Expression) -> Self {
        Self::from_kind(StatementKind::Return(Some(value)))
    }

    pub fn ret_void() -> Self {
        Self::from_kind(StatementKind::Return(None))
    }

    pub fn brk() -> Self {
        Self::from_kind(StatementKind::Break)
    }

    pub fn cont() -> Self {
        Self::from_kind(StatementKind::Continue)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    pub kind: ExpressionKind,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpressionKind {
    Bool(bool),
    /// A JSON integer, or a decimal string for values beyond 64 bits
    Number(#[serde(with = "decimal")] BigInt),
    Me,
    Ident(String),
    Builtin { op: BuiltinOp, args: Vec<Expression> },
    Call { func: String, args: Vec<Expression> },
    Index { base: Box<Expression>, index: Box<Expression> },
    Reveal { expr: Box<Expression>, to: Owner },
    Cast { ty: DataType, expr: Box<Expression> },
    Tuple(Vec<Expression>),
}

impl Expression {
    fn from_kind(kind: ExpressionKind) -> Self {
        Self { kind, span: Span::default() }
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.span = Span::new(line, column);
        self
    }

    pub fn num(value: impl Into<BigInt>) -> Self {
        Self::from_kind(ExpressionKind::Number(value.into()))
    }

    pub fn bool(value: bool) -> Self {
        Self::from_kind(ExpressionKind::Bool(value))
    }

    pub fn me() -> Self {
        Self::from_kind(ExpressionKind::Me)
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Self::from_kind(ExpressionKind::Ident(name.into()))
    }

    pub fn unop(op: BuiltinOp, arg: Expression) -> Self {
        Self::from_kind(ExpressionKind::Builtin { op, args: vec![arg] })
    }

    pub fn binop(op: BuiltinOp, lhs: Expression, rhs: Expression) -> Self {
        Self::from_kind(ExpressionKind::Builtin { op, args: vec![lhs, rhs] })
    }

    pub fn ite(cond: Expression, then: Expression, otherwise: Expression) -> Self {
        Self::from_kind(ExpressionKind::Builtin { op: BuiltinOp::Ite, args: vec![cond, then, otherwise] })
    }

    pub fn call(func: impl Into<String>, args: Vec<Expression>) -> Self {
        Self::from_kind(ExpressionKind::Call { func: func.into(), args })
    }

    pub fn index(base: Expression, index: Expression) -> Self {
        Self::from_kind(ExpressionKind::Index { base: Box::new(base), index: Box::new(index) })
    }

    pub fn reveal(expr: Expression, to: Owner) -> Self {
        Self::from_kind(ExpressionKind::Reveal { expr: Box::new(expr), to })
    }

    pub fn cast(ty: DataType, expr: Expression) -> Self {
        Self::from_kind(ExpressionKind::Cast { ty, expr: Box::new(expr) })
    }

    pub fn tuple(elems: Vec<Expression>) -> Self {
        Self::from_kind(ExpressionKind::Tuple(elems))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_input() {
        let json = r#"{
            "contracts": [{
                "name": "C",
                "state_vars": [{"name": "x", "ty": {"ty": {"uint": 256}, "privacy": "me"}}],
                "functions": [{
                    "name": "set",
                    "params": [{"name": "v", "ty": {"ty": {"uint": 256}, "privacy": "me"}}],
                    "body": [{"kind": {"assign": {"lhs": {"kind": {"ident": "x"}}, "rhs": {"kind": {"ident": "v"}}}},
                              "span": {"line": 3, "column": 9}}]
                }]
            }]
        }"#;
        let unit = SourceUnit::from_json(json).unwrap();
        let f = &unit.contracts[0].functions[0];
        assert_eq!(f.visibility, Visibility::Public);
        assert_eq!(f.params[0].ty.privacy, Owner::Me);
        assert_eq!(f.body[0].span, Span::new(3, 9));
    }

    #[test]
    fn test_builtin_op_symbols_in_json() {
        let expr: Expression =
            serde_json::from_str(r#"{"kind": {"builtin": {"op": "+", "args": [{"kind": {"number": 1}}, {"kind": {"number": 2}}]}}}"#)
                .unwrap();
        assert_eq!(expr, Expression::binop(BuiltinOp::Add, Expression::num(1), Expression::num(2)));
    }

    #[test]
    fn test_large_number_as_string() {
        let expr: Expression =
            serde_json::from_str(r#"{"kind": {"number": "340282366920938463463374607431768211456"}}"#).unwrap();
        assert_eq!(expr, Expression::num(BigInt::from(1) << 128usize));
    }
}
