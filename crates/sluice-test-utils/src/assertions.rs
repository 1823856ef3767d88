//! Custom assertion helpers for integration tests.

use sluice_core::address::ResourceAddress;
use sluice_core::identity::Identity;
use sluice_core::operation::{FailedOperation, FailureKind, OperationResult};
use sluice_core::policy::{AccessPolicy, Role};

use crate::client::{CallKind, ClientCall};

/// Asserts that a result is a validation failure with a single problem.
///
/// # Panics
///
/// Panics if the result succeeded, failed with another kind, or carries a
/// different problem.
pub fn assert_validation_failure<T: std::fmt::Debug>(
    result: &OperationResult<T>,
    description: &str,
) {
    let failure = expect_failure(result, FailureKind::Validation);
    assert_eq!(
        failure.descriptions(),
        vec![description],
        "Unexpected validation problems"
    );
}

/// Asserts that a result failed with `kind` and returns the failure.
///
/// # Panics
///
/// Panics if the result succeeded or failed with another kind.
pub fn expect_failure<T: std::fmt::Debug>(
    result: &OperationResult<T>,
    kind: FailureKind,
) -> &FailedOperation {
    match result {
        Ok(value) => panic!("Expected {kind:?} failure, but operation succeeded with {value:?}"),
        Err(failure) => {
            assert_eq!(
                failure.kind, kind,
                "Expected {kind:?} failure, got {failure:?}"
            );
            failure
        }
    }
}

/// Asserts that a policy binds `identity` to `role`.
///
/// # Panics
///
/// Panics if the binding is missing.
pub fn assert_binding(policy: &AccessPolicy, role: &str, identity: &Identity) {
    assert!(
        policy.has_binding(&Role::new(role), identity),
        "Expected {identity} to hold {role}, policy was {policy:?}"
    );
}

/// Asserts that a policy has no binding for `role`.
///
/// # Panics
///
/// Panics if the role is bound.
pub fn assert_role_absent(policy: &AccessPolicy, role: &str) {
    assert!(
        policy.members(&Role::new(role)).is_none(),
        "Expected no binding for {role}, policy was {policy:?}"
    );
}

/// Asserts that the recorded call kinds match `expected` exactly.
///
/// # Panics
///
/// Panics if the sequences differ.
pub fn assert_call_sequence(calls: &[ClientCall], expected: &[CallKind]) {
    let actual: Vec<CallKind> = calls.iter().map(ClientCall::kind).collect();
    assert_eq!(actual, expected, "Unexpected client call sequence");
}

/// Asserts that no mutating call touched the warehouse.
///
/// # Panics
///
/// Panics if any create, update, delete or policy write was recorded.
pub fn assert_no_writes(calls: &[ClientCall]) {
    let writes: Vec<&ClientCall> = calls
        .iter()
        .filter(|call| {
            matches!(
                call.kind(),
                CallKind::CreateDataset
                    | CallKind::CreateTable
                    | CallKind::UpdateTable
                    | CallKind::DeleteTable
                    | CallKind::SetIamPolicy
            )
        })
        .collect();
    assert!(writes.is_empty(), "Expected no writes, got {writes:?}");
}

/// Asserts that `address` was never deleted.
///
/// # Panics
///
/// Panics if a delete of `address` was recorded.
pub fn assert_not_deleted(calls: &[ClientCall], address: &ResourceAddress) {
    let deleted = calls.iter().any(
        |call| matches!(call, ClientCall::DeleteTable { address: a } if a == address),
    );
    assert!(!deleted, "Expected {address} not to be deleted");
}
