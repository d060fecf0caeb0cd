//! Abstract circuit representation
//!
//! A circuit is an ordered list of [`CircuitStatement`]s (`phi`) over named
//! circuit variables. The order of `phi` is the evaluation and constraint
//! order; backends translate it statement by statement.

use std::fmt;

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::ast::literal::decimal;
use crate::ast::types::{BuiltinOp, TypeName};

/// Role of a value crossing the public/circuit boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HybridArgType {
    /// Secret witness (decrypted plaintext, randomness)
    PrivCircuitVal,
    /// Public circuit input or output, serialized into `in`/`out`
    PubCircuitArg,
    /// Intermediate value computed inside the circuit
    TmpCircuitVal,
}

/// Handle of a circuit variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HybridArgumentIdf {
    pub name: String,
    pub ty: TypeName,
    pub arg_type: HybridArgType,
    /// The private computation this value was derived from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corresponding_priv_expr: Option<CircuitExpr>,
}

impl HybridArgumentIdf {
    pub fn new(name: impl Into<String>, ty: TypeName, arg_type: HybridArgType) -> Self {
        Self { name: name.into(), ty, arg_type, corresponding_priv_expr: None }
    }

    pub fn with_priv_expr(mut self, expr: Option<CircuitExpr>) -> Self {
        self.corresponding_priv_expr = expr;
        self
    }

    pub fn expr(&self) -> CircuitExpr {
        CircuitExpr::idf(self.name.clone())
    }
}

/// Expression over circuit variables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitExpr {
    Idf(String),
    Number(#[serde(with = "decimal")] BigInt),
    Bool(bool),
    Op { op: BuiltinOp, args: Vec<CircuitExpr> },
    Cast { ty: TypeName, expr: Box<CircuitExpr> },
    /// Encryption of `expr` under the public key of `owner`
    Encrypt { expr: Box<CircuitExpr>, owner: String },
}

impl CircuitExpr {
    pub fn idf(name: impl Into<String>) -> Self {
        CircuitExpr::Idf(name.into())
    }

    pub fn ite(cond: CircuitExpr, then: CircuitExpr, otherwise: CircuitExpr) -> Self {
        CircuitExpr::Op { op: BuiltinOp::Ite, args: vec![cond, then, otherwise] }
    }
}

impl fmt::Display for CircuitExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitExpr::Idf(name) => f.write_str(name),
            CircuitExpr::Number(value) => write!(f, "{}", value),
            CircuitExpr::Bool(value) => write!(f, "{}", value),
            CircuitExpr::Op { op, args } => match (op, args.as_slice()) {
                (BuiltinOp::Parenthesis, [a]) => write!(f, "({})", a),
                (BuiltinOp::Ite, [c, a, b]) => write!(f, "{} ? {} : {}", c, a, b),
                (_, [a]) => write!(f, "{}{}", op.symbol(), a),
                (_, [a, b]) => write!(f, "{} {} {}", a, op.symbol(), b),
                _ => write!(f, "{}(..)", op.symbol()),
            },
            CircuitExpr::Cast { ty, expr } => write!(f, "{}({})", ty, expr),
            CircuitExpr::Encrypt { expr, owner } => write!(f, "enc({}, {})", expr, owner),
        }
    }
}

/// One element of `phi`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CircuitStatement {
    Comment { text: String },
    /// Statements emitted while processing one source construct
    IndentBlock { name: String, statements: Vec<CircuitStatement> },
    /// Temporary holding the value of a private expression
    TempVarDecl { lhs: HybridArgumentIdf, expr: CircuitExpr },
    /// New SSA version of a source variable, parameter or return value
    Assignment { lhs: HybridArgumentIdf, expr: CircuitExpr },
    /// Public output `val` equals the computed plaintext `tgt`
    EqConstraint { tgt: HybridArgumentIdf, val: HybridArgumentIdf },
    /// `cipher` is the encryption of `plain` with randomness `rnd` under `pk`
    ///
    /// With `is_dec` set, the constraint proves a correct decryption of an
    /// input ciphertext instead.
    EncConstraint {
        plain: HybridArgumentIdf,
        rnd: HybridArgumentIdf,
        pk: HybridArgumentIdf,
        cipher: HybridArgumentIdf,
        is_dec: bool,
    },
    /// Constraints until the matching `LeaveGuard` only hold if `cond == is_true`
    EnterGuard { cond: String, is_true: bool },
    LeaveGuard,
    /// Includes the circuit of a called function which requires verification
    Call { function: String },
}

impl CircuitStatement {
    /// Visits the statement and, for indent blocks, every nested statement
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a CircuitStatement)) {
        visit(self);
        if let CircuitStatement::IndentBlock { statements, .. } = self {
            for s in statements {
                s.walk(visit);
            }
        }
    }
}

/// Flattens nested indent blocks
pub fn flatten(phi: &[CircuitStatement]) -> Vec<&CircuitStatement> {
    let mut out = Vec::new();
    for s in phi {
        s.walk(&mut |x| {
            if !matches!(x, CircuitStatement::IndentBlock { .. }) {
                out.push(x);
            }
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_ite() {
        let e = CircuitExpr::ite(CircuitExpr::idf("c"), CircuitExpr::idf("a"), CircuitExpr::Number(1.into()));
        assert_eq!(e.to_string(), "c ? a : 1");
    }

    #[test]
    fn test_flatten_nested_blocks() {
        let phi = vec![
            CircuitStatement::Comment { text: "a".to_string() },
            CircuitStatement::IndentBlock {
                name: "blk".to_string(),
                statements: vec![
                    CircuitStatement::LeaveGuard,
                    CircuitStatement::IndentBlock { name: "inner".to_string(), statements: vec![CircuitStatement::LeaveGuard] },
                ],
            },
        ];
        assert_eq!(flatten(&phi).len(), 3);
    }

    #[test]
    fn test_statement_json_tag() {
        let s = CircuitStatement::EnterGuard { cond: "tmp0_plain".to_string(), is_true: false };
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"kind\":\"enter_guard\""));
    }
}
