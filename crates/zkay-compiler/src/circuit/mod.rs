//! Circuit intermediate representation and its builder
//!
//! For every function which needs a proof the transformer drives one
//! [`helper::CircuitHelper`]. The finished helper is frozen into a
//! [`Circuit`]: the ordered statement list `phi` plus the layout of the
//! secret, public input and public output buffers.

pub mod helper;
pub mod ir;
pub mod names;
pub mod remap;

use serde::{Deserialize, Serialize};
use zkay_runtime::CompilerConfig;

use crate::ast::{Ast, FunctionId};
use ir::CircuitStatement;
use names::Slot;

/// A finished circuit, ready for a proving backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circuit {
    pub contract: String,
    /// Name of the public function the circuit belongs to
    pub function: String,
    /// Verifier contract checking proofs of this circuit, if it is proven on its own
    pub verifier: Option<String>,
    pub phi: Vec<CircuitStatement>,
    pub secret: Vec<Slot>,
    pub inputs: Vec<Slot>,
    pub outputs: Vec<Slot>,
    pub priv_in_size: usize,
    pub in_size: usize,
    pub out_size: usize,
    /// Sizes contributed by the circuits of called functions
    pub trans_priv_size: usize,
    pub trans_in_size: usize,
    pub trans_out_size: usize,
    /// Owners whose public key is read once per proof
    pub global_keys: Vec<String>,
    /// Circuits included through calls, in call order
    pub calls: Vec<String>,
    /// Whether the public arguments are passed to the verifier as a single hash
    pub uses_hash: bool,
}

impl Circuit {
    pub fn in_size_trans(&self) -> usize {
        self.in_size + self.trans_in_size
    }

    pub fn out_size_trans(&self) -> usize {
        self.out_size + self.trans_out_size
    }

    pub fn priv_in_size_trans(&self) -> usize {
        self.priv_in_size + self.trans_priv_size
    }

    pub fn requires_verification(&self) -> bool {
        self.verifier.is_some()
    }
}

/// Name of the circuit and of the public function implementing `f`'s body
///
/// Functions with an external wrapper keep their body in an internal function
/// with a prefixed name.
pub fn circuit_name(ast: &Ast, config: &CompilerConfig, f: FunctionId) -> String {
    let func = ast.function(f);
    if func.facts.requires_verification_when_external {
        config.internal_name(&func.unambiguous_name)
    } else {
        func.unambiguous_name.clone()
    }
}
