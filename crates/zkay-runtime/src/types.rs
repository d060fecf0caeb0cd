//! Compilation configuration
//!
//! This module defines the immutable configuration value threaded through every
//! compiler pass: the crypto backend (and the buffer sizes it implies), the
//! proving scheme, circuit optimization switches and the identifiers used for
//! generated code.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ZkayError};

/// Encryption scheme used for private values
///
/// The compiler never performs encryption itself; it only needs to know how
/// many 256-bit words keys, ciphertexts and randomness occupy.
///
/// # Examples
///
/// ```
/// use zkay_runtime::CryptoBackend;
///
/// let backend: CryptoBackend = "elgamal".parse().unwrap();
/// assert_eq!(backend.params().cipher_len(), 4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CryptoBackend {
    #[serde(rename = "dummy")]
    Dummy,
    #[serde(rename = "dummy-hom")]
    DummyHom,
    #[serde(rename = "rsa-oaep")]
    RsaOaep,
    #[serde(rename = "rsa-pkcs1.5")]
    RsaPkcs15,
    #[serde(rename = "ecdh-aes")]
    EcdhAes,
    #[serde(rename = "ecdh-chaskey")]
    EcdhChaskey,
    #[serde(rename = "paillier")]
    Paillier,
    #[serde(rename = "elgamal")]
    Elgamal,
}

impl CryptoBackend {
    pub const ALL: [CryptoBackend; 8] = [
        CryptoBackend::Dummy,
        CryptoBackend::DummyHom,
        CryptoBackend::RsaOaep,
        CryptoBackend::RsaPkcs15,
        CryptoBackend::EcdhAes,
        CryptoBackend::EcdhChaskey,
        CryptoBackend::Paillier,
        CryptoBackend::Elgamal,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CryptoBackend::Dummy => "dummy",
            CryptoBackend::DummyHom => "dummy-hom",
            CryptoBackend::RsaOaep => "rsa-oaep",
            CryptoBackend::RsaPkcs15 => "rsa-pkcs1.5",
            CryptoBackend::EcdhAes => "ecdh-aes",
            CryptoBackend::EcdhChaskey => "ecdh-chaskey",
            CryptoBackend::Paillier => "paillier",
            CryptoBackend::Elgamal => "elgamal",
        }
    }

    pub fn params(&self) -> CryptoParams {
        let (key_bits, payload, chunk, symmetric, rnd_bytes, rnd_chunk) = match self {
            CryptoBackend::Dummy => (248, 31, 31, false, 31, 31),
            CryptoBackend::DummyHom => (248, 32, 32, false, 32, 32),
            CryptoBackend::RsaOaep => (2048, 256, 29, false, 32, 16),
            CryptoBackend::RsaPkcs15 => (2048, 256, 29, false, 221, 28),
            CryptoBackend::EcdhAes => (253, 48, 24, true, 0, 0),
            CryptoBackend::EcdhChaskey => (253, 48, 24, true, 0, 0),
            CryptoBackend::Paillier => (320, 80, 15, false, 40, 15),
            CryptoBackend::Elgamal => (506, 128, 32, false, 32, 32),
        };
        CryptoParams {
            key_bits,
            cipher_payload_bytes: payload,
            cipher_chunk_size: chunk,
            symmetric,
            rnd_bytes,
            rnd_chunk_size: rnd_chunk,
        }
    }
}

impl fmt::Display for CryptoBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CryptoBackend {
    type Err = ZkayError;

    fn from_str(s: &str) -> Result<Self> {
        CryptoBackend::ALL
            .iter()
            .copied()
            .find(|b| b.name() == s)
            .ok_or_else(|| ZkayError::UnknownBackend(s.to_string()))
    }
}

/// Size parameters of a crypto backend, expressed in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoParams {
    pub key_bits: usize,
    pub cipher_payload_bytes: usize,
    pub cipher_chunk_size: usize,
    pub symmetric: bool,
    pub rnd_bytes: usize,
    pub rnd_chunk_size: usize,
}

fn div_ceil(a: usize, b: usize) -> usize {
    if b == 0 {
        0
    } else {
        (a + b - 1) / b
    }
}

impl CryptoParams {
    pub fn key_bytes(&self) -> usize {
        div_ceil(self.key_bits, 8)
    }

    /// Number of uint256 words of a public key
    pub fn key_len(&self) -> usize {
        if self.symmetric {
            1
        } else {
            div_ceil(self.key_bytes(), self.cipher_chunk_size)
        }
    }

    pub fn cipher_payload_len(&self) -> usize {
        div_ceil(self.cipher_payload_bytes, self.cipher_chunk_size)
    }

    /// Number of uint256 words of a ciphertext
    ///
    /// Symmetric schemes append the sender's public key to every ciphertext.
    pub fn cipher_len(&self) -> usize {
        if self.symmetric {
            self.cipher_payload_len() + 1
        } else {
            self.cipher_payload_len()
        }
    }

    pub fn randomness_len(&self) -> usize {
        if self.symmetric {
            0
        } else {
            div_ceil(self.rnd_bytes, self.rnd_chunk_size)
        }
    }
}

/// zk-SNARK proving scheme targeted by the generated circuits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvingScheme {
    Groth16,
    Gm17,
}

impl ProvingScheme {
    pub fn name(&self) -> &'static str {
        match self {
            ProvingScheme::Groth16 => "groth16",
            ProvingScheme::Gm17 => "gm17",
        }
    }

    /// Number of uint256 words of a serialized proof
    pub fn proof_len(&self) -> usize {
        8
    }
}

impl fmt::Display for ProvingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProvingScheme {
    type Err = ZkayError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "groth16" => Ok(ProvingScheme::Groth16),
            "gm17" => Ok(ProvingScheme::Gm17),
            other => Err(ZkayError::invalid_config(format!("unknown proving scheme '{}'", other))),
        }
    }
}

/// Per-compilation options
///
/// A `CompilerConfig` is created once and passed by reference to every pass.
///
/// # Examples
///
/// ```
/// use zkay_runtime::{CompilerConfig, CryptoBackend};
///
/// let config = CompilerConfig::default().with_crypto_backend(CryptoBackend::Paillier);
/// assert_eq!(config.crypto_backend, CryptoBackend::Paillier);
/// assert!(config.should_use_hash(71));
/// assert!(!config.should_use_hash(70));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub crypto_backend: CryptoBackend,
    pub proving_scheme: ProvingScheme,
    /// Hash the public circuit arguments when there are more than this many
    pub opt_hash_threshold: usize,
    /// Replace literal-typed expressions inside circuits by constants
    pub opt_eval_constexpr_in_circuit: bool,
    pub zk_in_name: String,
    pub zk_out_name: String,
    pub zk_data_var_name: String,
    pub proof_param_name: String,
    pub return_var_name: String,
    pub internal_prefix: String,
    pub pki_contract_name: String,
    pub verification_function_name: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            crypto_backend: CryptoBackend::Dummy,
            proving_scheme: ProvingScheme::Groth16,
            opt_hash_threshold: 70,
            opt_eval_constexpr_in_circuit: true,
            zk_in_name: "zk__in".to_string(),
            zk_out_name: "zk__out".to_string(),
            zk_data_var_name: "zk__data".to_string(),
            proof_param_name: "zk__proof".to_string(),
            return_var_name: "zk__ret".to_string(),
            internal_prefix: "_zk__".to_string(),
            pki_contract_name: "PublicKeyInfrastructure".to_string(),
            verification_function_name: "check_verify".to_string(),
        }
    }
}

impl CompilerConfig {
    pub fn with_crypto_backend(mut self, backend: CryptoBackend) -> Self {
        self.crypto_backend = backend;
        self
    }

    pub fn with_hash_threshold(mut self, threshold: usize) -> Self {
        self.opt_hash_threshold = threshold;
        self
    }

    pub fn crypto_params(&self) -> CryptoParams {
        self.crypto_backend.params()
    }

    pub fn should_use_hash(&self, pub_arg_count: usize) -> bool {
        pub_arg_count > self.opt_hash_threshold
    }

    pub fn internal_name(&self, fname: &str) -> String {
        format!("{}{}", self.internal_prefix, fname)
    }

    pub fn verifier_contract_name(&self, contract: &str, fname: &str) -> String {
        format!("zk__Verify_{}_{}", contract, fname)
    }

    pub fn contract_instance_name(&self, contract: &str) -> String {
        format!("{}_inst", contract)
    }

    pub fn zk_data_struct_name(&self, fname: &str) -> String {
        format!("{}_{}", fname, self.zk_data_var_name)
    }

    pub fn in_start_name(&self) -> String {
        format!("{}_start_idx", self.zk_in_name)
    }

    pub fn out_start_name(&self) -> String {
        format!("{}_start_idx", self.zk_out_name)
    }

    pub fn return_var(&self, idx: usize) -> String {
        format!("{}_{}", self.return_var_name, idx)
    }

    /// Checks that generated identifiers are usable and pairwise distinct
    pub fn validate(&self) -> Result<()> {
        let names = [
            &self.zk_in_name,
            &self.zk_out_name,
            &self.zk_data_var_name,
            &self.proof_param_name,
            &self.return_var_name,
            &self.internal_prefix,
            &self.pki_contract_name,
            &self.verification_function_name,
        ];
        for (i, name) in names.iter().enumerate() {
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(ZkayError::invalid_config(format!(
                    "'{}' is not a valid identifier",
                    name
                )));
            }
            if names[..i].contains(name) {
                return Err(ZkayError::invalid_config(format!(
                    "identifier '{}' is used for two different purposes",
                    name
                )));
            }
        }
        Ok(())
    }
}
