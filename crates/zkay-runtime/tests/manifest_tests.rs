//! Tests for manifest persistence and compatibility checks

use std::fs;

use tempfile::tempdir;
use zkay_runtime::{
    CompilerConfig, CryptoBackend, Manifest, ZkayError, COMPILER_VERSION, MANIFEST_FILENAME,
};

fn sample_manifest(config: &CompilerConfig) -> Manifest {
    Manifest::new(config, "contract.sol", vec!["zk__Verify_Token_transfer".to_string()])
}

#[test]
fn test_manifest_records_config() {
    let config = CompilerConfig::default().with_crypto_backend(CryptoBackend::Paillier);
    let manifest = sample_manifest(&config);

    assert_eq!(manifest.zkay_version, COMPILER_VERSION);
    assert_eq!(manifest.crypto_backend, CryptoBackend::Paillier);
    assert_eq!(manifest.pki_lib, "PublicKeyInfrastructure.sol");
    assert_eq!(manifest.options, config);
}

#[test]
fn test_manifest_uses_hyphenated_keys() {
    let manifest = sample_manifest(&CompilerConfig::default());
    let json = serde_json::to_value(&manifest).unwrap();

    for key in [
        "zkay-version",
        "proving-scheme",
        "crypto-backend",
        "zkay-options",
        "contract-file",
        "pki-lib",
        "verifier-names",
    ] {
        assert!(json.get(key).is_some(), "missing key {}", key);
    }
}

#[test]
fn test_manifest_save_and_load() {
    let dir = tempdir().unwrap();
    let config = CompilerConfig::default();
    let manifest = sample_manifest(&config);

    let path = manifest.save(dir.path()).expect("Failed to save manifest");
    assert_eq!(path.file_name().unwrap(), MANIFEST_FILENAME);

    let loaded = Manifest::load(&path).expect("Failed to load manifest");
    assert_eq!(loaded, manifest);
    assert!(loaded.check_compatible(&config).is_ok());
}

#[test]
fn test_manifest_load_missing_file() {
    let dir = tempdir().unwrap();
    let result = Manifest::load(&dir.path().join("nope.json"));
    assert!(matches!(result, Err(ZkayError::IoError(_))));
}

#[test]
fn test_manifest_load_garbage() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(MANIFEST_FILENAME);
    fs::write(&path, "{ not json").unwrap();
    assert!(matches!(Manifest::load(&path), Err(ZkayError::SerializationError(_))));
}

#[test]
fn test_manifest_load_inconsistent_backend() {
    let dir = tempdir().unwrap();
    let mut manifest = sample_manifest(&CompilerConfig::default());
    manifest.crypto_backend = CryptoBackend::Elgamal;
    let path = manifest.save(dir.path()).unwrap();

    assert!(matches!(Manifest::load(&path), Err(ZkayError::InvalidManifest(_))));
}

// ============================================================================
// COMPATIBILITY TESTS
// ============================================================================

#[test]
fn test_incompatible_backend() {
    let manifest = sample_manifest(&CompilerConfig::default());
    let other = CompilerConfig::default().with_crypto_backend(CryptoBackend::Elgamal);

    let err = manifest.check_compatible(&other).unwrap_err();
    assert!(matches!(err, ZkayError::IncompatibleManifest(_)));
    assert!(err.to_string().contains("elgamal"));
}

#[test]
fn test_incompatible_version() {
    let mut manifest = sample_manifest(&CompilerConfig::default());
    manifest.zkay_version = "0.0.0-old".to_string();

    let err = manifest.check_compatible(&CompilerConfig::default()).unwrap_err();
    assert!(err.to_string().contains("0.0.0-old"));
}

#[test]
fn test_incompatible_options() {
    let manifest = sample_manifest(&CompilerConfig::default());
    let other = CompilerConfig::default().with_hash_threshold(1);

    assert!(manifest.check_compatible(&other).is_err());
}
