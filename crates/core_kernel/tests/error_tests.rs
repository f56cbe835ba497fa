//! Tests for core_kernel error types

use core_kernel::error::CoreError;
use core_kernel::{PageId, UserId};

#[test]
fn test_core_error_validation() {
    let error = CoreError::validation("Invalid input");

    match error {
        CoreError::Validation(msg) => assert_eq!(msg, "Invalid input"),
        _ => panic!("Expected Validation error"),
    }
}

#[test]
fn test_core_error_invalid_identifier() {
    let error = CoreError::invalid_identifier("page", "not-a-uuid");

    let display = error.to_string();
    assert!(display.contains("page"));
    assert!(display.contains("not-a-uuid"));
}

#[test]
fn test_core_error_configuration() {
    let error = CoreError::configuration("Missing config");

    match error {
        CoreError::Configuration(msg) => assert_eq!(msg, "Missing config"),
        _ => panic!("Expected Configuration error"),
    }
}

#[test]
fn test_identifier_parse_failure_maps_to_core_error() {
    let raw = "PAG-123";
    let error = raw
        .parse::<PageId>()
        .map_err(|_| CoreError::invalid_identifier("page", raw))
        .unwrap_err();

    assert!(matches!(error, CoreError::InvalidIdentifier { kind: "page", .. }));
}

#[test]
fn test_identifier_serializes_as_bare_uuid() {
    let id = UserId::new();
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{}\"", id.as_uuid()));
}
