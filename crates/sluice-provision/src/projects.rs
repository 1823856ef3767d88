//! Project existence lookup.

use std::fmt;
use std::sync::Arc;

use sluice_core::client::{ClientError, ProjectRegistry};
use sluice_core::operation::{
    FailedOperation, FailureKind, OperationResult, Problem, Remediation,
};

use crate::metrics::record_cloud_call_failure;

/// User message for unexpected registry failures.
pub const PROJECT_CHECK_ERROR_MESSAGE: &str =
    "An unexpected error occurred while checking project existence";

/// Answers whether a project exists.
#[derive(Clone)]
pub struct ProjectLookup {
    registry: Arc<dyn ProjectRegistry>,
}

impl fmt::Debug for ProjectLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectLookup")
            .field("registry", &"<ProjectRegistry>")
            .finish()
    }
}

impl ProjectLookup {
    /// Creates a lookup over the given registry.
    #[must_use]
    pub fn new(registry: Arc<dyn ProjectRegistry>) -> Self {
        Self { registry }
    }

    /// Returns whether `project_id` exists.
    ///
    /// The registry answers permission-denied for projects that are missing
    /// or invisible to the caller; both that and not-found mean `false`.
    ///
    /// # Errors
    ///
    /// Returns an operation failure for any other registry error.
    pub async fn project_exists(&self, project_id: &str) -> OperationResult<bool> {
        tracing::info!(project = project_id, "checking if project exists");
        match self.registry.get_project(project_id).await {
            Ok(_) => Ok(true),
            Err(ClientError::PermissionDenied { .. } | ClientError::NotFound { .. }) => {
                tracing::warn!(project = project_id, "project does not exist");
                Ok(false)
            }
            Err(e) => {
                let description =
                    format!("Failed to check project existence for {project_id}: {e}");
                tracing::error!(project = project_id, error = %e, "{description}");
                record_cloud_call_failure("projects.get");
                Err(FailedOperation::new(
                    FailureKind::Operation,
                    PROJECT_CHECK_ERROR_MESSAGE,
                    vec![
                        Problem::new(description)
                            .with_cause(e.to_string())
                            .with_solution(Remediation::RetryThenContactPlatformTeam),
                    ],
                ))
            }
        }
    }
}
