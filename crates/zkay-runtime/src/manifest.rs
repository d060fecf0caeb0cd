//! Compilation manifest
//!
//! The manifest is written next to the compiled output and records everything
//! needed to reproduce a compatible compilation when reconnecting to an
//! already deployed contract.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ZkayError};
use crate::types::{CompilerConfig, CryptoBackend, ProvingScheme};

pub const MANIFEST_FILENAME: &str = "manifest.json";

/// Version of the compiler that produced a manifest
pub const COMPILER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "zkay-version")]
    pub zkay_version: String,
    #[serde(rename = "proving-scheme")]
    pub proving_scheme: ProvingScheme,
    #[serde(rename = "crypto-backend")]
    pub crypto_backend: CryptoBackend,
    #[serde(rename = "zkay-options")]
    pub options: CompilerConfig,
    #[serde(rename = "contract-file")]
    pub contract_file: String,
    #[serde(rename = "pki-lib")]
    pub pki_lib: String,
    #[serde(rename = "verifier-names")]
    pub verifier_names: Vec<String>,
}

impl Manifest {
    pub fn new(
        config: &CompilerConfig,
        contract_file: impl Into<String>,
        verifier_names: Vec<String>,
    ) -> Self {
        Self {
            zkay_version: COMPILER_VERSION.to_string(),
            proving_scheme: config.proving_scheme,
            crypto_backend: config.crypto_backend,
            options: config.clone(),
            contract_file: contract_file.into(),
            pki_lib: format!("{}.sol", config.pki_contract_name),
            verifier_names,
        }
    }

    /// Writes the manifest as `manifest.json` into `dir`
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(MANIFEST_FILENAME);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)?;
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let manifest: Manifest = serde_json::from_str(&content)?;
        if manifest.options.crypto_backend != manifest.crypto_backend
            || manifest.options.proving_scheme != manifest.proving_scheme
        {
            return Err(ZkayError::InvalidManifest(
                "top-level backend settings disagree with the recorded options".to_string(),
            ));
        }
        Ok(manifest)
    }

    /// Checks whether a compilation with `config` reproduces this manifest's contract
    pub fn check_compatible(&self, config: &CompilerConfig) -> Result<()> {
        if self.zkay_version != COMPILER_VERSION {
            return Err(ZkayError::incompatible(format!(
                "contract was compiled with version {}, this is version {}",
                self.zkay_version, COMPILER_VERSION
            )));
        }
        if self.crypto_backend != config.crypto_backend {
            return Err(ZkayError::incompatible(format!(
                "crypto backend '{}' does not match '{}'",
                config.crypto_backend, self.crypto_backend
            )));
        }
        if self.proving_scheme != config.proving_scheme {
            return Err(ZkayError::incompatible(format!(
                "proving scheme '{}' does not match '{}'",
                config.proving_scheme, self.proving_scheme
            )));
        }
        if &self.options != config {
            return Err(ZkayError::incompatible("compiler options differ from the manifest"));
        }
        Ok(())
    }
}
