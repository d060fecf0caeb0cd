//! Integration tests for configuration types in zkay-runtime

use zkay_runtime::{CompilerConfig, CryptoBackend, ProvingScheme, ZkayError};

// ============================================================================
// CRYPTO PARAMETER TESTS
// ============================================================================

#[test]
fn test_dummy_backend_lengths() {
    let params = CryptoBackend::Dummy.params();
    assert_eq!(params.key_len(), 1);
    assert_eq!(params.cipher_len(), 1);
    assert_eq!(params.randomness_len(), 1);
}

#[test]
fn test_rsa_backend_lengths() {
    let oaep = CryptoBackend::RsaOaep.params();
    assert_eq!(oaep.key_len(), 9);
    assert_eq!(oaep.cipher_len(), 9);
    assert_eq!(oaep.randomness_len(), 2);

    let pkcs = CryptoBackend::RsaPkcs15.params();
    assert_eq!(pkcs.cipher_len(), 9);
    assert_eq!(pkcs.randomness_len(), 8);
}

#[test]
fn test_symmetric_backend_appends_sender_key() {
    for backend in [CryptoBackend::EcdhAes, CryptoBackend::EcdhChaskey] {
        let params = backend.params();
        assert!(params.symmetric);
        assert_eq!(params.key_len(), 1);
        assert_eq!(params.cipher_payload_len(), 2);
        assert_eq!(params.cipher_len(), 3);
        assert_eq!(params.randomness_len(), 0);
    }
}

#[test]
fn test_homomorphic_backend_lengths() {
    let paillier = CryptoBackend::Paillier.params();
    assert_eq!(paillier.key_len(), 3);
    assert_eq!(paillier.cipher_len(), 6);
    assert_eq!(paillier.randomness_len(), 3);

    let elgamal = CryptoBackend::Elgamal.params();
    assert_eq!(elgamal.key_len(), 2);
    assert_eq!(elgamal.cipher_len(), 4);
    assert_eq!(elgamal.randomness_len(), 1);
}

#[test]
fn test_backend_name_round_trip() {
    for backend in CryptoBackend::ALL {
        let parsed: CryptoBackend = backend.name().parse().unwrap();
        assert_eq!(parsed, backend);
        assert_eq!(backend.to_string(), backend.name());
    }
}

#[test]
fn test_unknown_backend_is_rejected() {
    let result = "rot13".parse::<CryptoBackend>();
    assert!(matches!(result, Err(ZkayError::UnknownBackend(name)) if name == "rot13"));
}

#[test]
fn test_backend_serializes_with_kebab_names() {
    let json = serde_json::to_string(&CryptoBackend::RsaPkcs15).unwrap();
    assert_eq!(json, "\"rsa-pkcs1.5\"");
    let back: CryptoBackend = serde_json::from_str("\"ecdh-chaskey\"").unwrap();
    assert_eq!(back, CryptoBackend::EcdhChaskey);
}

// ============================================================================
// PROVING SCHEME TESTS
// ============================================================================

#[test]
fn test_proving_scheme_parsing() {
    assert_eq!("groth16".parse::<ProvingScheme>().unwrap(), ProvingScheme::Groth16);
    assert_eq!("gm17".parse::<ProvingScheme>().unwrap(), ProvingScheme::Gm17);
    assert!("plonk".parse::<ProvingScheme>().is_err());
}

#[test]
fn test_proof_is_eight_words() {
    assert_eq!(ProvingScheme::Groth16.proof_len(), 8);
    assert_eq!(ProvingScheme::Gm17.proof_len(), 8);
}

// ============================================================================
// COMPILER CONFIG TESTS
// ============================================================================

#[test]
fn test_hash_threshold_is_exclusive() {
    let config = CompilerConfig::default().with_hash_threshold(2);
    assert!(!config.should_use_hash(0));
    assert!(!config.should_use_hash(2));
    assert!(config.should_use_hash(3));
}

#[test]
fn test_config_serialization() {
    let config = CompilerConfig::default().with_crypto_backend(CryptoBackend::Elgamal);
    let json = serde_json::to_string(&config).expect("Failed to serialize config");
    let back: CompilerConfig = serde_json::from_str(&json).expect("Failed to deserialize config");
    assert_eq!(back, config);
}

#[test]
fn test_partial_config_uses_defaults() {
    let config: CompilerConfig =
        serde_json::from_str(r#"{"crypto_backend": "paillier", "opt_hash_threshold": 3}"#).unwrap();
    assert_eq!(config.crypto_backend, CryptoBackend::Paillier);
    assert_eq!(config.opt_hash_threshold, 3);
    assert_eq!(config.zk_in_name, "zk__in");
}

#[test]
fn test_validate_accepts_default() {
    assert!(CompilerConfig::default().validate().is_ok());
}

#[test]
fn test_validate_rejects_bad_identifiers() {
    let config = CompilerConfig { zk_in_name: "zk in".to_string(), ..CompilerConfig::default() };
    assert!(matches!(config.validate(), Err(ZkayError::InvalidConfig(_))));

    let config = CompilerConfig { zk_out_name: "zk__in".to_string(), ..CompilerConfig::default() };
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("two different purposes"));
}
