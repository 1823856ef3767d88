//! Resolution of platform subjects into cloud identities.
//!
//! Subjects resolve independently: one malformed subject fails on its own
//! without affecting its siblings. Callers that need every subject resolved
//! use [`resolve_all`], which keeps the first failure in subject order.

use std::collections::{BTreeMap, BTreeSet};

use sluice_core::identity::{Identity, Subject};
use sluice_core::operation::{FailedOperation, OperationResult};

/// User message for malformed user subjects.
pub const INVALID_USER_MESSAGE: &str = "Received an invalid user";

/// User message for subjects that are neither users nor groups.
pub const UNKNOWN_IDENTITY_MESSAGE: &str = "Received an unknown identity";

/// Maps platform subjects to cloud identities.
pub trait IdentityResolver: Send + Sync {
    /// Resolves every subject independently.
    fn resolve(&self, subjects: &BTreeSet<Subject>) -> BTreeMap<Subject, OperationResult<Identity>>;
}

/// Resolves users from their encoded address and groups by appending a mail domain.
///
/// - `user:<local>_<domain>` becomes `user:<local>@<domain>`, splitting at the
///   last underscore.
/// - `group:<name>` becomes `group:<name><mail domain>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryIdentityResolver {
    group_mail_domain: String,
}

impl DirectoryIdentityResolver {
    /// Creates a resolver appending `group_mail_domain` (e.g. `@acme.com`) to group names.
    #[must_use]
    pub fn new(group_mail_domain: impl Into<String>) -> Self {
        Self {
            group_mail_domain: group_mail_domain.into(),
        }
    }

    fn resolve_one(&self, subject: &Subject) -> OperationResult<Identity> {
        let raw = subject.as_str();
        if let Some(encoded) = raw.strip_prefix(Subject::USER_PREFIX) {
            let Some((local, domain)) = encoded.rsplit_once('_') else {
                let description =
                    format!("The subject {raw} is not the expected format for a user");
                tracing::error!(subject = raw, "{description}");
                return Err(FailedOperation::identity_resolution(
                    INVALID_USER_MESSAGE,
                    description,
                ));
            };
            Ok(Identity::user(format!("{local}@{domain}")))
        } else if let Some(group) = raw.strip_prefix(Subject::GROUP_PREFIX) {
            Ok(Identity::group(format!("{group}{}", self.group_mail_domain)))
        } else {
            let description =
                format!("The subject {raw} is neither a platform user nor a group");
            tracing::error!(subject = raw, "{description}");
            Err(FailedOperation::identity_resolution(
                UNKNOWN_IDENTITY_MESSAGE,
                description,
            ))
        }
    }
}

impl IdentityResolver for DirectoryIdentityResolver {
    fn resolve(&self, subjects: &BTreeSet<Subject>) -> BTreeMap<Subject, OperationResult<Identity>> {
        subjects
            .iter()
            .map(|subject| (subject.clone(), self.resolve_one(subject)))
            .collect()
    }
}

/// Resolves every subject, failing with the first failure in subject order.
///
/// # Errors
///
/// Returns the failure of the first subject that did not resolve.
pub fn resolve_all(
    resolver: &dyn IdentityResolver,
    subjects: &BTreeSet<Subject>,
) -> OperationResult<BTreeSet<Identity>> {
    resolver.resolve(subjects).into_values().collect()
}
