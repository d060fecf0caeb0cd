//! zkay Compiler
//!
//! Compiles privacy-annotated contracts into a public contract operating on
//! ciphertexts plus one zero-knowledge circuit per function with private
//! computation.
//!
//! The pipeline:
//!
//! 1. [`ast::build`] resolves names and builds the AST arena
//! 2. [`analysis::side_effects`] computes the call graph and read/write sets
//! 3. [`analysis::alias`] tracks which owners are provably equal
//! 4. [`typecheck::final_check`] and [`typecheck`] enforce the ownership rules
//! 5. [`analysis::compliance`] decides what runs inside the circuit
//! 6. [`transform`] builds the public contracts and the circuits

pub mod analysis;
pub mod ast;
pub mod circuit;
pub mod error;
pub mod render;
pub mod syntax;
pub mod transform;
pub mod typecheck;

pub use analysis::partition::PartitionState;
pub use circuit::Circuit;
pub use error::{CompilerError, ErrorContext, Result};
pub use syntax::SourceUnit;
pub use transform::public::PublicContract;

// Re-export runtime types for convenience
pub use zkay_runtime::{CompilerConfig, CryptoBackend, Manifest, ProvingScheme};

use tracing::info;

use ast::Ast;

/// Result of compiling one source unit
#[derive(Debug, Clone)]
pub struct Compilation {
    pub contracts: Vec<PublicContract>,
    pub circuits: Vec<Circuit>,
}

impl Compilation {
    /// Verifier contracts the public contracts import, in declaration order
    pub fn verifier_names(&self) -> Vec<String> {
        self.circuits.iter().filter_map(|c| c.verifier.clone()).collect()
    }

    /// Solidity source of all public contracts
    pub fn render(&self) -> String {
        self.contracts.iter().map(render::render_contract).collect::<Vec<_>>().join("\n")
    }

    pub fn circuit(&self, function: &str) -> Option<&Circuit> {
        self.circuits.iter().find(|c| c.function == function)
    }
}

/// Runs name resolution and all analyses, returning the annotated AST
pub fn check(unit: &SourceUnit) -> Result<Ast> {
    let mut ast = ast::build::build(unit)?;
    analysis::side_effects::run(&mut ast);
    analysis::alias::run(&mut ast);
    typecheck::final_check::run(&ast)?;
    typecheck::run(&mut ast)?;
    analysis::compliance::run(&mut ast)?;
    Ok(ast)
}

/// Compiles a source unit into public contracts and circuits
pub fn compile(unit: &SourceUnit, config: &CompilerConfig) -> Result<Compilation> {
    config.validate()?;
    let ast = check(unit)?;
    let transformed = transform::transform(&ast, config)?;
    info!(
        contracts = transformed.contracts.len(),
        circuits = transformed.circuits.len(),
        "compilation finished"
    );
    Ok(Compilation { contracts: transformed.contracts, circuits: transformed.circuits })
}
