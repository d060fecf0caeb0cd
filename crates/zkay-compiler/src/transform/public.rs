//! Privacy-free contract representation
//!
//! The transformer lowers every contract into these types. They carry no
//! owner annotations: private values are plain `uint[]` ciphertext buffers.

use num_bigint::BigInt;
use zkay_runtime::CompilerConfig;

use crate::ast::types::{AnnotatedType, BuiltinOp, TypeName};
use crate::ast::{Mutability, Visibility};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PubType {
    Bool,
    Uint(u16),
    Int(u16),
    Address,
    AddressPayable,
    /// Ciphertext buffer of the given length
    Cipher(usize),
    /// Public key buffer of the given length
    Key(usize),
    Proof(usize),
    /// `uint[]` or `uint[n]`
    UintArray(Option<usize>),
    Mapping { key: Box<PubType>, value: Box<PubType> },
    Array { elem: Box<PubType>, len: Option<usize> },
    Tuple(Vec<PubType>),
    Struct(String),
    Contract(String),
}

impl PubType {
    /// Strips the owner of a declared type
    pub fn from_annotated(ty: &AnnotatedType, config: &CompilerConfig) -> Self {
        if ty.is_private() {
            PubType::Cipher(config.crypto_params().cipher_len())
        } else {
            Self::from_type_name(&ty.ty, config)
        }
    }

    pub fn from_type_name(ty: &TypeName, config: &CompilerConfig) -> Self {
        match ty.to_abstract() {
            TypeName::Bool | TypeName::BoolLiteral(_) => PubType::Bool,
            TypeName::Uint(b) => PubType::Uint(b),
            TypeName::Int(b) => PubType::Int(b),
            TypeName::NumberLiteral(_) => PubType::Uint(256),
            TypeName::Address => PubType::Address,
            TypeName::AddressPayable => PubType::AddressPayable,
            TypeName::Mapping { key, value, .. } => PubType::Mapping {
                key: Box::new(Self::from_type_name(&key, config)),
                value: Box::new(Self::from_annotated(&value, config)),
            },
            TypeName::Array { elem, len } => {
                PubType::Array { elem: Box::new(Self::from_annotated(&elem, config)), len }
            }
            TypeName::Tuple(elems) => {
                PubType::Tuple(elems.iter().map(|t| Self::from_annotated(t, config)).collect())
            }
            TypeName::Cipher => PubType::Cipher(config.crypto_params().cipher_len()),
            TypeName::Key => PubType::Key(config.crypto_params().key_len()),
            TypeName::Randomness => PubType::UintArray(Some(config.crypto_params().randomness_len())),
            TypeName::Proof => PubType::Proof(config.proving_scheme.proof_len()),
        }
    }

    /// Types which live in memory or calldata rather than on the stack
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            PubType::Cipher(_)
                | PubType::Key(_)
                | PubType::Proof(_)
                | PubType::UintArray(_)
                | PubType::Array { .. }
                | PubType::Struct(_)
        )
    }

    /// Number of uint256 elements of a fixed-size buffer type
    pub fn buffer_len(&self) -> Option<usize> {
        match self {
            PubType::Cipher(n) | PubType::Key(n) | PubType::Proof(n) => Some(*n),
            PubType::UintArray(n) => *n,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PubExpr {
    Bool(bool),
    Number(BigInt),
    Ident(String),
    MsgSender,
    Member { base: Box<PubExpr>, member: String },
    Index { base: Box<PubExpr>, index: Box<PubExpr> },
    Op { op: BuiltinOp, args: Vec<PubExpr> },
    Cast { ty: PubType, expr: Box<PubExpr> },
    /// Call of a contract function
    ///
    /// `site` numbers calls of functions which require verification until
    /// their circuit buffer arguments have been appended.
    Call { name: String, args: Vec<PubExpr>, site: Option<usize> },
    MethodCall { target: Box<PubExpr>, method: String, args: Vec<PubExpr> },
    /// `new uint[](len)`
    NewArray { len: Box<PubExpr> },
    Tuple(Vec<PubExpr>),
}

impl PubExpr {
    pub fn num(value: usize) -> Self {
        PubExpr::Number(BigInt::from(value))
    }

    pub fn ident(name: impl Into<String>) -> Self {
        PubExpr::Ident(name.into())
    }

    pub fn member(base: PubExpr, member: impl Into<String>) -> Self {
        PubExpr::Member { base: Box::new(base), member: member.into() }
    }

    pub fn index(base: PubExpr, index: PubExpr) -> Self {
        PubExpr::Index { base: Box::new(base), index: Box::new(index) }
    }

    pub fn op(op: BuiltinOp, args: Vec<PubExpr>) -> Self {
        PubExpr::Op { op, args }
    }

    pub fn cast(ty: PubType, expr: PubExpr) -> Self {
        PubExpr::Cast { ty, expr: Box::new(expr) }
    }

    pub fn method(target: PubExpr, method: impl Into<String>, args: Vec<PubExpr>) -> Self {
        PubExpr::MethodCall { target: Box::new(target), method: method.into(), args }
    }

    /// `base + offset`, or just `base` for a zero offset
    pub fn offset(base: PubExpr, offset: usize) -> Self {
        if offset == 0 {
            base
        } else {
            PubExpr::op(BuiltinOp::Add, vec![base, PubExpr::num(offset)])
        }
    }

    /// Pre-order traversal with mutable access
    pub fn walk_mut(&mut self, visit: &mut dyn FnMut(&mut PubExpr)) {
        visit(self);
        match self {
            PubExpr::Bool(_) | PubExpr::Number(_) | PubExpr::Ident(_) | PubExpr::MsgSender => {}
            PubExpr::Member { base, .. } => base.walk_mut(visit),
            PubExpr::Index { base, index } => {
                base.walk_mut(visit);
                index.walk_mut(visit);
            }
            PubExpr::Cast { expr, .. } => expr.walk_mut(visit),
            PubExpr::NewArray { len } => len.walk_mut(visit),
            PubExpr::MethodCall { target, args, .. } => {
                target.walk_mut(visit);
                args.iter_mut().for_each(|a| a.walk_mut(visit));
            }
            PubExpr::Op { args, .. } | PubExpr::Call { args, .. } | PubExpr::Tuple(args) => {
                args.iter_mut().for_each(|a| a.walk_mut(visit));
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataLocation {
    Memory,
    Calldata,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PubStmt {
    Comment(String),
    Block(Vec<PubStmt>),
    If { cond: PubExpr, then: Vec<PubStmt>, otherwise: Option<Vec<PubStmt>> },
    While { cond: PubExpr, body: Vec<PubStmt> },
    DoWhile { body: Vec<PubStmt>, cond: PubExpr },
    For { init: Option<Box<PubStmt>>, cond: Option<PubExpr>, update: Option<Box<PubStmt>>, body: Vec<PubStmt> },
    VarDecl { ty: PubType, name: String, location: Option<DataLocation>, init: Option<PubExpr> },
    Assign { lhs: PubExpr, rhs: PubExpr },
    Expr(PubExpr),
    Require(PubExpr),
    Return(Option<PubExpr>),
    Break,
    Continue,
}

impl PubStmt {
    pub fn assign(lhs: PubExpr, rhs: PubExpr) -> Self {
        PubStmt::Assign { lhs, rhs }
    }

    /// Visits every expression of the statement and of nested statements
    pub fn exprs_mut(&mut self, visit: &mut dyn FnMut(&mut PubExpr)) {
        fn nested(stmts: &mut [PubStmt], visit: &mut dyn FnMut(&mut PubExpr)) {
            for s in stmts {
                s.exprs_mut(visit);
            }
        }
        match self {
            PubStmt::Comment(_) | PubStmt::Break | PubStmt::Continue | PubStmt::Return(None) => {}
            PubStmt::Block(stmts) => nested(stmts, visit),
            PubStmt::If { cond, then, otherwise } => {
                cond.walk_mut(visit);
                nested(then, visit);
                if let Some(o) = otherwise {
                    nested(o, visit);
                }
            }
            PubStmt::While { cond, body } | PubStmt::DoWhile { body, cond } => {
                cond.walk_mut(visit);
                nested(body, visit);
            }
            PubStmt::For { init, cond, update, body } => {
                if let Some(i) = init {
                    i.exprs_mut(visit);
                }
                if let Some(c) = cond {
                    c.walk_mut(visit);
                }
                if let Some(u) = update {
                    u.exprs_mut(visit);
                }
                nested(body, visit);
            }
            PubStmt::VarDecl { init, .. } => {
                if let Some(i) = init {
                    i.walk_mut(visit);
                }
            }
            PubStmt::Assign { lhs, rhs } => {
                lhs.walk_mut(visit);
                rhs.walk_mut(visit);
            }
            PubStmt::Expr(e) | PubStmt::Require(e) | PubStmt::Return(Some(e)) => e.walk_mut(visit),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PubParam {
    pub ty: PubType,
    pub name: String,
    pub location: Option<DataLocation>,
}

impl PubParam {
    pub fn new(ty: PubType, name: impl Into<String>, location: Option<DataLocation>) -> Self {
        Self { ty, name: name.into(), location }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PubFunction {
    pub name: String,
    pub is_constructor: bool,
    pub visibility: Visibility,
    pub mutability: Mutability,
    pub params: Vec<PubParam>,
    pub returns: Vec<PubType>,
    pub body: Vec<PubStmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PubStateVar {
    pub ty: PubType,
    pub name: String,
    pub constant: bool,
    pub init: Option<PubExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PubStruct {
    pub name: String,
    pub fields: Vec<(PubType, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublicContract {
    pub name: String,
    pub imports: Vec<String>,
    /// PKI and verifier contract instances
    pub external_contracts: Vec<PubStateVar>,
    pub state_vars: Vec<PubStateVar>,
    pub structs: Vec<PubStruct>,
    pub functions: Vec<PubFunction>,
}

impl PublicContract {
    pub fn function(&self, name: &str) -> Option<&PubFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn constructor(&self) -> Option<&PubFunction> {
        self.functions.iter().find(|f| f.is_constructor)
    }
}
