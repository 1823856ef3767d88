//! Structured outcomes of provisioning operations.
//!
//! Every fallible step returns an [`OperationResult`]. Failures are values,
//! never panics: a [`FailedOperation`] carries a user-facing message and an
//! ordered list of [`Problem`]s, each with optional cause and remediations.
//!
//! # Example
//!
//! ```rust
//! use sluice_core::operation::{FailedOperation, FailureKind};
//!
//! let failure = FailedOperation::validation("The specified BigQuery project does not exist: p");
//! assert_eq!(failure.kind, FailureKind::Validation);
//! assert_eq!(failure.problems.len(), 1);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// User message attached to every validation failure.
pub const VALIDATION_ERROR_MESSAGE: &str = "One or more validation errors occurred";

/// User message attached to unexpected cloud-call failures.
pub const UNEXPECTED_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Result of a provisioning step.
pub type OperationResult<T> = std::result::Result<T, FailedOperation>;

/// Category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A precondition was not met (missing project/table, incompatible schema).
    Validation,
    /// A cloud call failed unexpectedly (auth, network, quota).
    Operation,
    /// A subject could not be mapped to an identity.
    IdentityResolution,
    /// The request itself was malformed or unsupported.
    InvalidRequest,
}

/// Suggested remediation for a problem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Remediation {
    /// Retry the operation, then escalate to the platform team.
    RetryThenContactPlatformTeam,
}

impl fmt::Display for Remediation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RetryThenContactPlatformTeam => f.write_str(
                "Retry the operation; if the problem persists, contact the platform team",
            ),
        }
    }
}

/// One problem reported by a failed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    /// Human-readable description.
    pub description: String,
    /// Underlying cause, if one was observed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    /// Suggested remediations.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub solutions: BTreeSet<Remediation>,
}

impl Problem {
    /// Creates a problem with only a description.
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            cause: None,
            solutions: BTreeSet::new(),
        }
    }

    /// Attaches an underlying cause.
    #[must_use]
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Adds a remediation.
    #[must_use]
    pub fn with_solution(mut self, solution: Remediation) -> Self {
        self.solutions.insert(solution);
        self
    }
}

/// A failed operation: user-facing message plus ordered problems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct FailedOperation {
    /// Failure category.
    pub kind: FailureKind,
    /// Message suitable for end users.
    pub message: String,
    /// Problems in the order they were detected.
    pub problems: Vec<Problem>,
}

impl FailedOperation {
    /// Creates a failure from its parts.
    #[must_use]
    pub fn new(kind: FailureKind, message: impl Into<String>, problems: Vec<Problem>) -> Self {
        Self {
            kind,
            message: message.into(),
            problems,
        }
    }

    /// A precondition failure with a single problem and no remediation.
    #[must_use]
    pub fn validation(description: impl Into<String>) -> Self {
        Self::new(
            FailureKind::Validation,
            VALIDATION_ERROR_MESSAGE,
            vec![Problem::new(description)],
        )
    }

    /// An unexpected cloud-call failure.
    ///
    /// `description` states what was attempted and why it failed; `cause` is
    /// the raw error text from the client.
    #[must_use]
    pub fn operation(description: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::new(
            FailureKind::Operation,
            UNEXPECTED_ERROR_MESSAGE,
            vec![
                Problem::new(description)
                    .with_cause(cause)
                    .with_solution(Remediation::RetryThenContactPlatformTeam),
            ],
        )
    }

    /// A subject that could not be resolved.
    #[must_use]
    pub fn identity_resolution(message: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(
            FailureKind::IdentityResolution,
            message,
            vec![Problem::new(description)],
        )
    }

    /// A malformed or unsupported request.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>, problems: Vec<Problem>) -> Self {
        Self::new(FailureKind::InvalidRequest, message, problems)
    }

    /// Returns the problem descriptions in order.
    #[must_use]
    pub fn descriptions(&self) -> Vec<&str> {
        self.problems.iter().map(|p| p.description.as_str()).collect()
    }
}
