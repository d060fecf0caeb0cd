//! Type model: data types, privacy labels and builtin operators
//!
//! Every expression and declaration carries an [`AnnotatedType`], the pair of a
//! [`TypeName`] (what the value is) and a [`Privacy`] label (who may see it).

use std::fmt;

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use zkay_runtime::CompilerConfig;

use super::literal::{self, decimal};
use super::VarId;

/// Owner of a value
///
/// `Var` refers to a `final` or `constant` address variable. `KeyLabel` only
/// occurs inside mapping value types (`mapping(address!x => uint@x)`) and is
/// substituted by the index expression when the mapping is accessed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Privacy {
    All,
    Me,
    Var(VarId),
    KeyLabel(String),
}

impl Privacy {
    pub fn is_all(&self) -> bool {
        matches!(self, Privacy::All)
    }

    pub fn is_private(&self) -> bool {
        !self.is_all()
    }

    /// The statically resolvable label, if any
    pub fn label(&self) -> Option<Label> {
        match self {
            Privacy::All => Some(Label::All),
            Privacy::Me => Some(Label::Me),
            Privacy::Var(v) => Some(Label::Var(*v)),
            Privacy::KeyLabel(_) => None,
        }
    }
}

/// Element of a partition state: a privacy label that analysis can reason about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Label {
    Me,
    All,
    Var(VarId),
}

impl From<Label> for Privacy {
    fn from(label: Label) -> Self {
        match label {
            Label::Me => Privacy::Me,
            Label::All => Privacy::All,
            Label::Var(v) => Privacy::Var(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeName {
    Bool,
    Uint(u16),
    Int(u16),
    Address,
    AddressPayable,
    NumberLiteral(#[serde(with = "decimal")] BigInt),
    BoolLiteral(bool),
    Mapping {
        key: Box<TypeName>,
        key_label: Option<String>,
        value: Box<AnnotatedType>,
    },
    Array {
        elem: Box<AnnotatedType>,
        len: Option<usize>,
    },
    Tuple(Vec<AnnotatedType>),
    Cipher,
    Key,
    Randomness,
    Proof,
}

/// Result of [`TypeName::combined_type`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Combined {
    /// Both operands are literals; the operation can be folded
    Literal,
    Type(TypeName),
}

impl TypeName {
    pub fn uint() -> Self {
        TypeName::Uint(256)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, TypeName::Uint(_) | TypeName::Int(_) | TypeName::NumberLiteral(_))
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, TypeName::Bool | TypeName::BoolLiteral(_))
    }

    pub fn is_address(&self) -> bool {
        matches!(self, TypeName::Address | TypeName::AddressPayable)
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, TypeName::NumberLiteral(_) | TypeName::BoolLiteral(_))
    }

    pub fn is_primitive(&self) -> bool {
        self.is_numeric() || self.is_bool() || self.is_address()
    }

    pub fn is_signed(&self) -> bool {
        match self {
            TypeName::Int(_) => true,
            TypeName::NumberLiteral(v) => literal::is_negative(v),
            _ => false,
        }
    }

    /// Bit width of the value's representation
    pub fn elem_bitwidth(&self) -> u16 {
        match self {
            TypeName::Uint(b) | TypeName::Int(b) => *b,
            TypeName::Bool | TypeName::BoolLiteral(_) => 1,
            TypeName::Address | TypeName::AddressPayable => 160,
            TypeName::NumberLiteral(v) => literal::bitwidth(v),
            _ => 256,
        }
    }

    /// Types that may carry an owner other than `all`
    pub fn can_be_private(&self) -> bool {
        match self {
            TypeName::Int(256) => false,
            TypeName::Bool | TypeName::Uint(_) | TypeName::Int(_) => true,
            TypeName::Address | TypeName::AddressPayable => true,
            _ => false,
        }
    }

    /// Concrete type for a literal, identity otherwise
    pub fn to_abstract(&self) -> TypeName {
        match self {
            TypeName::NumberLiteral(v) if literal::is_negative(v) => TypeName::Int(literal::bitwidth(v)),
            TypeName::NumberLiteral(v) => TypeName::Uint(literal::bitwidth(v)),
            TypeName::BoolLiteral(_) => TypeName::Bool,
            other => other.clone(),
        }
    }

    pub fn can_represent(&self, value: &BigInt) -> bool {
        match self {
            TypeName::Uint(bits) => literal::fits_unsigned(value, *bits),
            TypeName::Int(bits) => literal::fits_signed(value, *bits),
            _ => false,
        }
    }

    pub fn implicitly_convertible_to(&self, expected: &TypeName) -> bool {
        match (self, expected) {
            (TypeName::NumberLiteral(_), TypeName::NumberLiteral(_)) => true,
            (TypeName::NumberLiteral(v), target) => target.can_represent(v),
            (TypeName::BoolLiteral(_), TypeName::Bool | TypeName::BoolLiteral(_)) => true,
            (TypeName::Uint(a), TypeName::Uint(b)) => a <= b,
            (TypeName::Int(a), TypeName::Int(b)) => a <= b,
            (TypeName::Uint(a), TypeName::Int(b)) => a < b,
            (TypeName::AddressPayable, TypeName::Address) => true,
            (a, b) => a == b,
        }
    }

    /// Common type two operands are converted to, if any
    pub fn combined_type(&self, other: &TypeName) -> Option<Combined> {
        if self.is_literal() && other.is_literal() {
            return Some(Combined::Literal);
        }
        if self.implicitly_convertible_to(other) {
            Some(Combined::Type(other.clone()))
        } else if other.implicitly_convertible_to(self) {
            Some(Combined::Type(self.clone()))
        } else {
            None
        }
    }

    /// Number of uint256 words the value occupies in circuit buffers
    pub fn size_in_uints(&self, config: &CompilerConfig) -> usize {
        let params = config.crypto_params();
        match self {
            TypeName::Cipher => params.cipher_len(),
            TypeName::Key => params.key_len(),
            TypeName::Randomness => params.randomness_len(),
            TypeName::Proof => config.proving_scheme.proof_len(),
            TypeName::Tuple(elems) => elems.iter().map(|t| t.ty.size_in_uints(config)).sum(),
            _ => 1,
        }
    }

    /// Renders the type, naming label variables through `name_of`
    pub fn describe(&self, name_of: &dyn Fn(VarId) -> String) -> String {
        match self {
            TypeName::Bool => "bool".to_string(),
            TypeName::Uint(b) => format!("uint{}", b),
            TypeName::Int(b) => format!("int{}", b),
            TypeName::Address => "address".to_string(),
            TypeName::AddressPayable => "address payable".to_string(),
            TypeName::NumberLiteral(v) => format!("literal {}", v),
            TypeName::BoolLiteral(b) => format!("literal {}", b),
            TypeName::Mapping { key, key_label, value } => {
                let label = key_label.as_ref().map(|l| format!("!{}", l)).unwrap_or_default();
                format!("mapping({}{} => {})", key.describe(name_of), label, value.describe(name_of))
            }
            TypeName::Array { elem, len } => match len {
                Some(n) => format!("{}[{}]", elem.describe(name_of), n),
                None => format!("{}[]", elem.describe(name_of)),
            },
            TypeName::Tuple(elems) => {
                let parts: Vec<String> = elems.iter().map(|e| e.describe(name_of)).collect();
                format!("({})", parts.join(", "))
            }
            TypeName::Cipher => "cipher".to_string(),
            TypeName::Key => "key".to_string(),
            TypeName::Randomness => "randomness".to_string(),
            TypeName::Proof => "proof".to_string(),
        }
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe(&|v| format!("${}", v.0)))
    }
}

/// A data type paired with its owner
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnnotatedType {
    pub ty: TypeName,
    pub privacy: Privacy,
}

impl AnnotatedType {
    pub fn new(ty: TypeName, privacy: Privacy) -> Self {
        Self { ty, privacy }
    }

    pub fn all(ty: TypeName) -> Self {
        Self { ty, privacy: Privacy::All }
    }

    pub fn me(ty: TypeName) -> Self {
        Self { ty, privacy: Privacy::Me }
    }

    pub fn is_private(&self) -> bool {
        self.privacy.is_private()
    }

    pub fn is_literal(&self) -> bool {
        self.ty.is_literal()
    }

    pub fn describe(&self, name_of: &dyn Fn(VarId) -> String) -> String {
        let owner = match &self.privacy {
            Privacy::All => return self.ty.describe(name_of),
            Privacy::Me => "me".to_string(),
            Privacy::Var(v) => name_of(*v),
            Privacy::KeyLabel(l) => l.clone(),
        };
        format!("{}@{}", self.ty.describe(name_of), owner)
    }
}

/// Outcome of checking a value against an expected annotated type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceOf {
    Match,
    Mismatch,
    /// A public value used where a private one is expected
    RequiresUpgrade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuiltinOp {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
    #[serde(rename = "%")]
    Mod,
    #[serde(rename = "**")]
    Pow,
    #[serde(rename = "sign-")]
    Neg,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "&&")]
    And,
    #[serde(rename = "||")]
    Or,
    #[serde(rename = "!")]
    Not,
    #[serde(rename = "&")]
    BitAnd,
    #[serde(rename = "|")]
    BitOr,
    #[serde(rename = "^")]
    BitXor,
    #[serde(rename = "~")]
    BitNot,
    #[serde(rename = "<<")]
    Shl,
    #[serde(rename = ">>")]
    Shr,
    #[serde(rename = "ite")]
    Ite,
    #[serde(rename = "parenthesis")]
    Parenthesis,
}

/// Operand kind an operator expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    Number,
    Bool,
    Any,
}

/// Value of a folded constant expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiteralValue {
    Number(BigInt),
    Bool(bool),
}

impl BuiltinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BuiltinOp::Add => "+",
            BuiltinOp::Sub | BuiltinOp::Neg => "-",
            BuiltinOp::Mul => "*",
            BuiltinOp::Div => "/",
            BuiltinOp::Mod => "%",
            BuiltinOp::Pow => "**",
            BuiltinOp::Lt => "<",
            BuiltinOp::Gt => ">",
            BuiltinOp::Le => "<=",
            BuiltinOp::Ge => ">=",
            BuiltinOp::Eq => "==",
            BuiltinOp::Ne => "!=",
            BuiltinOp::And => "&&",
            BuiltinOp::Or => "||",
            BuiltinOp::Not => "!",
            BuiltinOp::BitAnd => "&",
            BuiltinOp::BitOr => "|",
            BuiltinOp::BitXor => "^",
            BuiltinOp::BitNot => "~",
            BuiltinOp::Shl => "<<",
            BuiltinOp::Shr => ">>",
            BuiltinOp::Ite => "?:",
            BuiltinOp::Parenthesis => "()",
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            BuiltinOp::Neg | BuiltinOp::Not | BuiltinOp::BitNot | BuiltinOp::Parenthesis => 1,
            BuiltinOp::Ite => 3,
            _ => 2,
        }
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BuiltinOp::Add
                | BuiltinOp::Sub
                | BuiltinOp::Mul
                | BuiltinOp::Div
                | BuiltinOp::Mod
                | BuiltinOp::Pow
                | BuiltinOp::Neg
        )
    }

    pub fn is_comparison(&self) -> bool {
        matches!(self, BuiltinOp::Lt | BuiltinOp::Gt | BuiltinOp::Le | BuiltinOp::Ge)
    }

    pub fn is_eq(&self) -> bool {
        matches!(self, BuiltinOp::Eq | BuiltinOp::Ne)
    }

    pub fn is_bool_op(&self) -> bool {
        matches!(self, BuiltinOp::And | BuiltinOp::Or | BuiltinOp::Not)
    }

    pub fn is_bitop(&self) -> bool {
        matches!(self, BuiltinOp::BitAnd | BuiltinOp::BitOr | BuiltinOp::BitXor | BuiltinOp::BitNot)
    }

    pub fn is_shiftop(&self) -> bool {
        matches!(self, BuiltinOp::Shl | BuiltinOp::Shr)
    }

    /// Operators whose later operands are only evaluated conditionally
    pub fn is_shortcircuiting(&self) -> bool {
        matches!(self, BuiltinOp::And | BuiltinOp::Or | BuiltinOp::Ite)
    }

    pub fn operand_kind(&self) -> OperandKind {
        if self.is_arithmetic() || self.is_comparison() || self.is_bitop() || self.is_shiftop() {
            OperandKind::Number
        } else if self.is_bool_op() {
            OperandKind::Bool
        } else {
            OperandKind::Any
        }
    }

    pub fn returns_bool(&self) -> bool {
        self.is_comparison() || self.is_eq() || self.is_bool_op()
    }

    /// Whether the operator has an encoding as arithmetic constraints
    pub fn circuit_expressible(&self) -> bool {
        !matches!(self, BuiltinOp::Div | BuiltinOp::Mod | BuiltinOp::Pow)
    }

    /// Evaluates the operator over literal operands
    ///
    /// Numbers are exact. Returns `None` when the result is undefined
    /// (division by zero, negative exponent or shift) or wider than 256 bits.
    pub fn fold(&self, args: &[LiteralValue]) -> Option<LiteralValue> {
        use LiteralValue::{Bool, Number};
        let v = match (self, args) {
            (BuiltinOp::Parenthesis, [a]) => a.clone(),
            (BuiltinOp::Neg, [Number(a)]) => Number(-a),
            (BuiltinOp::BitNot, [Number(a)]) => Number(!a),
            (BuiltinOp::Not, [Bool(a)]) => Bool(!a),
            (BuiltinOp::Ite, [Bool(c), a, b]) => {
                if *c {
                    a.clone()
                } else {
                    b.clone()
                }
            }
            (BuiltinOp::And, [Bool(a), Bool(b)]) => Bool(*a && *b),
            (BuiltinOp::Or, [Bool(a), Bool(b)]) => Bool(*a || *b),
            (BuiltinOp::Eq, [a, b]) => Bool(a == b),
            (BuiltinOp::Ne, [a, b]) => Bool(a != b),
            (op, [Number(a), Number(b)]) => match op {
                BuiltinOp::Add => Number(a + b),
                BuiltinOp::Sub => Number(a - b),
                BuiltinOp::Mul => Number(a * b),
                BuiltinOp::Div if !literal::is_zero(b) => Number(a / b),
                BuiltinOp::Mod if !literal::is_zero(b) => Number(a % b),
                BuiltinOp::Pow => Number(a.pow(pow_exponent(a, b)?)),
                BuiltinOp::Lt => Bool(a < b),
                BuiltinOp::Gt => Bool(a > b),
                BuiltinOp::Le => Bool(a <= b),
                BuiltinOp::Ge => Bool(a >= b),
                BuiltinOp::BitAnd => Number(a & b),
                BuiltinOp::BitOr => Number(a | b),
                BuiltinOp::BitXor => Number(a ^ b),
                BuiltinOp::Shl => Number(a << shl_amount(a, b)?),
                BuiltinOp::Shr => {
                    if literal::is_negative(b) {
                        return None;
                    }
                    // shifting further than the widest operand yields 0 or -1
                    let shift = u32::try_from(b).unwrap_or(u32::MAX).min(2 * literal::MAX_LITERAL_BITS as u32);
                    Number(a >> shift as usize)
                }
                _ => return None,
            },
            _ => return None,
        };
        if let Number(n) = &v {
            if !literal::fits_machine_word(n) {
                return None;
            }
        }
        Some(v)
    }
}

/// Exponent for `a ** b` giving the same result, small enough to evaluate
fn pow_exponent(a: &BigInt, b: &BigInt) -> Option<u32> {
    if literal::is_negative(b) {
        return None;
    }
    if a.bits() <= 1 {
        // 0, 1 and -1 only depend on whether b is zero and on its parity
        return Some(if literal::is_zero(b) {
            0
        } else if literal::is_zero(&(b % 2u32)) {
            2
        } else {
            1
        });
    }
    u32::try_from(b).ok().filter(|e| u64::from(*e) <= literal::MAX_LITERAL_BITS)
}

/// Shift amount for `a << b`, if the result can stay within 256 bits
fn shl_amount(a: &BigInt, b: &BigInt) -> Option<usize> {
    if literal::is_negative(b) {
        return None;
    }
    if literal::is_zero(a) {
        return Some(0);
    }
    u32::try_from(b).ok().filter(|e| u64::from(*e) <= literal::MAX_LITERAL_BITS).map(|e| e as usize)
}

impl fmt::Display for BuiltinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
