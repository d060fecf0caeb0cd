//! Tests for runtime error types

use zkay_runtime::ZkayError;

#[test]
fn test_error_messages() {
    assert_eq!(
        ZkayError::invalid_config("bad").to_string(),
        "Invalid configuration: bad"
    );
    assert_eq!(ZkayError::incompatible("v1").to_string(), "Incompatible manifest: v1");
    assert_eq!(ZkayError::other("plain").to_string(), "plain");
}

#[test]
fn test_io_error_conversion() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
    let err: ZkayError = io.into();
    assert!(matches!(err, ZkayError::IoError(_)));
    assert!(err.to_string().starts_with("I/O error"));
}

#[test]
fn test_serialization_error_conversion() {
    let json_err = serde_json::from_str::<u32>("x").unwrap_err();
    let err: ZkayError = json_err.into();
    assert!(err.to_string().starts_with("Serialization error"));
}
