//! Read-only precondition checks run before provisioning.
//!
//! Each validator stops at the first failed precondition. Failures from the
//! underlying lookups are forwarded as-is; unmet preconditions are reported
//! as validation failures with a single problem.

use sluice_core::descriptor::{TableDescriptor, ViewDescriptor};
use sluice_core::operation::{FailedOperation, OperationResult};
use sluice_core::schema::SchemaSnapshot;

use crate::projects::ProjectLookup;
use crate::resource_manager::ResourceManager;
use crate::schema_compat::{table_compatible, view_compatible};

/// Validates output views.
#[derive(Debug, Clone)]
pub struct ViewValidator {
    resources: ResourceManager,
}

impl ViewValidator {
    /// Creates a view validator.
    #[must_use]
    pub const fn new(resources: ResourceManager) -> Self {
        Self { resources }
    }

    /// Checks that the source table exists and carries every declared view column.
    ///
    /// # Errors
    ///
    /// Returns a validation failure for an unmet precondition, or the
    /// operation failure of the table lookup.
    pub async fn validate(&self, view: &ViewDescriptor) -> OperationResult<()> {
        let source = view.source_address();
        let Some(table) = self.resources.get_table(&source).await? else {
            return Err(rejected(format!(
                "The specified source table {source} doesn't exist"
            )));
        };

        if view.schema.is_empty() {
            return Ok(());
        }

        let empty = SchemaSnapshot::default();
        let live = table.schema().unwrap_or(&empty);
        if view_compatible(live, &view.schema) {
            Ok(())
        } else {
            Err(rejected(format!(
                "View schema of component {} is not compatible with schema of the source table {source}",
                view.id
            )))
        }
    }
}

/// Validates storage tables.
#[derive(Debug, Clone)]
pub struct TableValidator {
    resources: ResourceManager,
    projects: ProjectLookup,
}

impl TableValidator {
    /// Creates a table validator.
    #[must_use]
    pub const fn new(resources: ResourceManager, projects: ProjectLookup) -> Self {
        Self {
            resources,
            projects,
        }
    }

    /// Checks that the project exists and, if the table already exists, that
    /// it has no columns beyond the declared ones.
    ///
    /// # Errors
    ///
    /// Returns a validation failure for an unmet precondition, or the
    /// operation failure of the project or table lookup.
    pub async fn validate(&self, table: &TableDescriptor) -> OperationResult<()> {
        if !self.projects.project_exists(&table.project).await? {
            return Err(rejected(format!(
                "The specified BigQuery project does not exist: {}",
                table.project
            )));
        }

        let address = table.address();
        let Some(existing) = self.resources.get_table(&address).await? else {
            return Ok(());
        };

        let empty = SchemaSnapshot::default();
        let live = existing.schema().unwrap_or(&empty);
        if table_compatible(live, &table.schema) {
            Ok(())
        } else {
            Err(rejected(format!(
                "Detected schema mismatch: provided schema is not compatible with existing table: {address}"
            )))
        }
    }
}

fn rejected(description: String) -> FailedOperation {
    tracing::warn!(problem = %description, "validation failed");
    FailedOperation::validation(description)
}
