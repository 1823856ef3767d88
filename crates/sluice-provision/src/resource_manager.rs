//! Dataset, table and view lifecycle over a [`ResourceClient`].
//!
//! Every method logs its intent, performs one or more client calls in a
//! fixed order and turns client errors into [`FailedOperation`]s carrying the
//! cause and a retry-then-escalate remediation. Absence of a resource on
//! read is a normal outcome, not an error.
//!
//! ## Idempotency
//!
//! Creation is read-then-create; table updates replace the whole schema.
//! There is no client-side locking: two callers that both observe a
//! resource as absent will race, and the loser's conflict surfaces as an
//! operation failure.

use std::fmt;
use std::sync::Arc;

use sluice_core::address::{DatasetAddress, ResourceAddress};
use sluice_core::client::{ClientError, Dataset, ResourceClient, TableDefinition, TableResource};
use sluice_core::descriptor::ViewDescriptor;
use sluice_core::operation::{FailedOperation, OperationResult};
use sluice_core::schema::{ColumnSpec, SchemaError, SchemaSnapshot};

use crate::metrics::record_cloud_call_failure;

/// Request to create or update a view over a source table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewRequest {
    /// Address of the view.
    pub address: ResourceAddress,
    /// Address of the table the view projects.
    pub source: ResourceAddress,
    /// Declared view columns; empty selects every source column.
    pub columns: Vec<ColumnSpec>,
    /// View description.
    pub description: Option<String>,
}

impl ViewRequest {
    /// Returns the projection query of this view.
    #[must_use]
    pub fn query(&self) -> String {
        projection_query(&self.source, &self.columns)
    }
}

impl From<&ViewDescriptor> for ViewRequest {
    fn from(view: &ViewDescriptor) -> Self {
        Self {
            address: view.address(),
            source: view.source_address(),
            columns: view.schema.clone(),
            description: view.description.clone(),
        }
    }
}

/// Builds `SELECT <columns> FROM <source>`, or `SELECT *` when no columns are declared.
#[must_use]
pub fn projection_query(source: &ResourceAddress, columns: &[ColumnSpec]) -> String {
    let projection = if columns.is_empty() {
        "*".to_string()
    } else {
        columns
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!("SELECT {projection} FROM {}", source.sql_identifier())
}

/// Manages datasets, tables and views.
#[derive(Clone)]
pub struct ResourceManager {
    client: Arc<dyn ResourceClient>,
}

impl fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceManager")
            .field("client", &"<ResourceClient>")
            .finish()
    }
}

impl ResourceManager {
    /// Creates a manager over the given client.
    #[must_use]
    pub fn new(client: Arc<dyn ResourceClient>) -> Self {
        Self { client }
    }

    /// Reads a table or view. `Ok(None)` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an operation failure if the read itself fails.
    pub async fn get_table(
        &self,
        address: &ResourceAddress,
    ) -> OperationResult<Option<TableResource>> {
        tracing::info!(resource = %address, "checking existence of table");
        let table = self
            .client
            .get_table(address)
            .await
            .map_err(|e| call_failed("tables.get", "check for existence of table", address, &e))?;
        tracing::info!(resource = %address, exists = table.is_some(), "table existence checked");
        Ok(table)
    }

    /// Returns the dataset, creating it if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an operation failure if the read or the create fails,
    /// including a conflict from a concurrent creator.
    pub async fn create_dataset_if_absent(
        &self,
        address: &DatasetAddress,
    ) -> OperationResult<Dataset> {
        tracing::info!(dataset = %address, "ensuring dataset exists");
        let existing = self
            .client
            .get_dataset(address)
            .await
            .map_err(|e| call_failed("datasets.get", "create dataset", address, &e))?;
        if let Some(dataset) = existing {
            return Ok(dataset);
        }

        tracing::info!(dataset = %address, "creating dataset");
        self.client
            .create_dataset(address)
            .await
            .map_err(|e| call_failed("datasets.insert", "create dataset", address, &e))
    }

    /// Creates the table with the declared schema, or replaces the schema of
    /// an existing table with it.
    ///
    /// The replace is a full overwrite: columns present live but not
    /// declared are dropped from the definition.
    ///
    /// # Errors
    ///
    /// Returns an operation failure if a column type is unknown (before any
    /// write) or if a client call fails.
    pub async fn create_or_update_table(
        &self,
        address: &ResourceAddress,
        columns: &[ColumnSpec],
    ) -> OperationResult<TableResource> {
        const ACTION: &str = "create or update table";

        let schema = SchemaSnapshot::from_columns(columns)
            .map_err(|e| schema_rejected(ACTION, address, &e))?;
        let existing = self
            .client
            .get_table(address)
            .await
            .map_err(|e| call_failed("tables.get", ACTION, address, &e))?;

        match existing {
            None => {
                tracing::info!(resource = %address, columns = columns.len(), "creating table");
                self.client
                    .create_table(TableResource::table(address.clone(), schema))
                    .await
                    .map_err(|e| call_failed("tables.insert", ACTION, address, &e))
            }
            Some(mut table) => {
                tracing::info!(resource = %address, columns = columns.len(), "updating table");
                table.definition = TableDefinition::Table { schema };
                self.client
                    .update_table(table)
                    .await
                    .map_err(|e| call_failed("tables.patch", ACTION, address, &e))
            }
        }
    }

    /// Creates the view if absent, then re-applies its full definition.
    ///
    /// The warehouse rejects per-column schema metadata on view creation, so
    /// the view is first created with only its query and description, and
    /// the schema is applied by an unconditional update. Exactly one
    /// create-or-skip and one update are issued. The update always carries a
    /// schema, empty when no columns are declared, so column metadata from an
    /// earlier declaration does not survive under a `SELECT *` query.
    ///
    /// # Errors
    ///
    /// Returns an operation failure if a column type is unknown (before any
    /// write) or if a client call fails.
    pub async fn create_or_update_view(
        &self,
        request: &ViewRequest,
    ) -> OperationResult<TableResource> {
        const ACTION: &str = "create view";

        let address = &request.address;
        let schema = SchemaSnapshot::from_columns(&request.columns)
            .map_err(|e| schema_rejected(ACTION, address, &e))?;
        let query = request.query();
        tracing::info!(resource = %address, source = %request.source, "creating or updating view");

        let existing = self
            .client
            .get_table(address)
            .await
            .map_err(|e| call_failed("tables.get", ACTION, address, &e))?;
        if existing.is_none() {
            let view = TableResource::view(address.clone(), query.clone(), None)
                .with_description(request.description.clone());
            self.client
                .create_table(view)
                .await
                .map_err(|e| call_failed("tables.insert", ACTION, address, &e))?;
        }

        let definition = TableResource::view(address.clone(), query, Some(schema))
            .with_description(request.description.clone());
        self.client
            .update_table(definition)
            .await
            .map_err(|e| call_failed("tables.patch", ACTION, address, &e))
    }

    /// Deletes a table or view.
    ///
    /// Returns whether something was deleted; a missing resource is not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns an operation failure if the delete call fails.
    pub async fn delete_table(&self, address: &ResourceAddress) -> OperationResult<bool> {
        tracing::info!(resource = %address, "deleting table");
        let deleted = self
            .client
            .delete_table(address)
            .await
            .map_err(|e| call_failed("tables.delete", "delete table", address, &e))?;
        if !deleted {
            tracing::info!(resource = %address, "table was already absent");
        }
        Ok(deleted)
    }
}

pub(crate) fn call_failed(
    call: &str,
    action: &str,
    target: &dyn fmt::Display,
    error: &ClientError,
) -> FailedOperation {
    let description = format!("Failed to {action} '{target}': {error}");
    tracing::error!(call, resource = %target, error = %error, "{description}");
    record_cloud_call_failure(call);
    FailedOperation::operation(description, error.to_string())
}

fn schema_rejected(action: &str, target: &ResourceAddress, error: &SchemaError) -> FailedOperation {
    let description = format!("Failed to {action} '{target}': {error}");
    tracing::error!(resource = %target, error = %error, "{description}");
    FailedOperation::operation(description, error.to_string())
}
