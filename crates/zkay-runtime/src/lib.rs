//! zkay Runtime
//!
//! Shared configuration, manifest and error types for the zkay compiler.
//! These are the values that cross crate boundaries: the compiler threads a
//! `CompilerConfig` through every pass, and the CLI persists a `Manifest`
//! next to each compiled contract.

pub mod error;
pub mod manifest;
pub mod types;

pub use error::{Result, ZkayError};
pub use manifest::{Manifest, COMPILER_VERSION, MANIFEST_FILENAME};
pub use types::{CompilerConfig, CryptoBackend, CryptoParams, ProvingScheme};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_uses_dummy_backend() {
        let config = CompilerConfig::default();
        assert_eq!(config.crypto_backend, CryptoBackend::Dummy);
        assert_eq!(config.opt_hash_threshold, 70);
        assert!(config.opt_eval_constexpr_in_circuit);
    }

    #[test]
    fn test_config_debug_trait() {
        let config = CompilerConfig::default();
        let debug_str = format!("{:?}", config);
        assert!(debug_str.contains("CompilerConfig"));
    }

    #[test]
    fn test_config_equality() {
        let config1 = CompilerConfig::default();
        let config2 = CompilerConfig::default();
        let config3 = CompilerConfig::default().with_hash_threshold(0);

        assert_eq!(config1, config2);
        assert_ne!(config1, config3);
    }

    #[test]
    fn test_generated_names() {
        let config = CompilerConfig::default();
        assert_eq!(config.internal_name("f"), "_zk__f");
        assert_eq!(config.verifier_contract_name("Token", "transfer"), "zk__Verify_Token_transfer");
        assert_eq!(config.contract_instance_name("PublicKeyInfrastructure"), "PublicKeyInfrastructure_inst");
        assert_eq!(config.zk_data_struct_name("f"), "f_zk__data");
        assert_eq!(config.return_var(1), "zk__ret_1");
    }
}
