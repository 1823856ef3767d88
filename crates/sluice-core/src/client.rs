//! Contracts for the warehouse and project-registry clients.
//!
//! The provisioner never talks to a cloud SDK directly. It is handed an
//! already-authenticated [`ResourceClient`] and [`ProjectRegistry`] at
//! construction, and treats their retry, auth and timeout behaviour as
//! fixed. Implementations:
//!
//! - [`MemoryResourceClient`](crate::memory::MemoryResourceClient): in-process state for tests
//! - `BigQueryRestClient` in `sluice-provision` (feature `gcp`): BigQuery and
//!   Resource Manager REST APIs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::{DatasetAddress, ResourceAddress};
use crate::policy::AccessPolicy;
use crate::schema::SchemaSnapshot;

/// Result type for client calls.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Errors returned by client calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The addressed resource does not exist.
    #[error("not found: {message}")]
    NotFound {
        /// Description of what was missing.
        message: String,
    },

    /// The caller lacks permission (or the resource is hidden from it).
    #[error("permission denied: {message}")]
    PermissionDenied {
        /// Backend message.
        message: String,
    },

    /// The resource already exists or was concurrently modified.
    #[error("conflict: {message}")]
    Conflict {
        /// Backend message.
        message: String,
    },

    /// Any other non-success answer from the API.
    #[error("api error ({status}): {message}")]
    Api {
        /// HTTP-style status code.
        status: u16,
        /// Backend message.
        message: String,
    },

    /// The request never produced an answer.
    #[error("transport error: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The client itself misbehaved.
    #[error("internal client error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

impl ClientError {
    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates a transport error with a source cause.
    #[must_use]
    pub fn transport_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns true for [`ClientError::NotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// A live dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    /// Dataset address.
    pub address: DatasetAddress,
    /// Backend location, if reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Creation time, if reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Dataset {
    /// Creates a dataset value with only an address.
    #[must_use]
    pub const fn new(address: DatasetAddress) -> Self {
        Self {
            address,
            location: None,
            created_at: None,
        }
    }
}

/// Definition of a table-like resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TableDefinition {
    /// A physical table.
    Table {
        /// Table schema.
        schema: SchemaSnapshot,
    },
    /// A saved query.
    View {
        /// Projection query.
        query: String,
        /// Schema with per-column metadata; `None` when the backend derives it.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        schema: Option<SchemaSnapshot>,
        /// Whether the query uses legacy SQL.
        #[serde(default)]
        use_legacy_sql: bool,
    },
}

impl TableDefinition {
    /// Returns the schema carried by this definition, if any.
    #[must_use]
    pub const fn schema(&self) -> Option<&SchemaSnapshot> {
        match self {
            Self::Table { schema } => Some(schema),
            Self::View { schema, .. } => schema.as_ref(),
        }
    }
}

/// A live table or view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableResource {
    /// Resource address.
    pub address: ResourceAddress,
    /// Table or view definition.
    pub definition: TableDefinition,
    /// Resource description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Last modification time, if reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl TableResource {
    /// Creates a physical table value.
    #[must_use]
    pub const fn table(address: ResourceAddress, schema: SchemaSnapshot) -> Self {
        Self {
            address,
            definition: TableDefinition::Table { schema },
            description: None,
            last_modified: None,
        }
    }

    /// Creates a view value.
    #[must_use]
    pub const fn view(address: ResourceAddress, query: String, schema: Option<SchemaSnapshot>) -> Self {
        Self {
            address,
            definition: TableDefinition::View {
                query,
                schema,
                use_legacy_sql: false,
            },
            description: None,
            last_modified: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Returns the live schema, if the definition carries one.
    #[must_use]
    pub const fn schema(&self) -> Option<&SchemaSnapshot> {
        self.definition.schema()
    }
}

/// A project known to the project registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Project ID.
    pub project_id: String,
    /// Display name, if set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Warehouse API: dataset, table/view and IAM policy operations.
///
/// Implementations must be already authenticated and are assumed to apply
/// their own retry policy.
#[async_trait]
pub trait ResourceClient: Send + Sync + 'static {
    /// Reads a dataset. Returns `None` if it does not exist.
    async fn get_dataset(&self, address: &DatasetAddress) -> ClientResult<Option<Dataset>>;

    /// Creates a dataset.
    ///
    /// Returns [`ClientError::Conflict`] if it already exists.
    async fn create_dataset(&self, address: &DatasetAddress) -> ClientResult<Dataset>;

    /// Reads a table or view. Returns `None` if it does not exist.
    async fn get_table(&self, address: &ResourceAddress) -> ClientResult<Option<TableResource>>;

    /// Creates a table or view.
    ///
    /// Returns [`ClientError::Conflict`] if it already exists and
    /// [`ClientError::NotFound`] if its dataset does not.
    async fn create_table(&self, table: TableResource) -> ClientResult<TableResource>;

    /// Replaces the definition and description of an existing table or view,
    /// leaving every other property of the live resource untouched.
    ///
    /// Returns [`ClientError::NotFound`] if it does not exist.
    async fn update_table(&self, table: TableResource) -> ClientResult<TableResource>;

    /// Deletes a table or view. Returns false if there was nothing to delete.
    async fn delete_table(&self, address: &ResourceAddress) -> ClientResult<bool>;

    /// Reads the IAM policy of a table or view.
    ///
    /// Returns [`ClientError::NotFound`] if the resource does not exist.
    async fn get_iam_policy(&self, address: &ResourceAddress) -> ClientResult<AccessPolicy>;

    /// Replaces the IAM policy of a table or view.
    async fn set_iam_policy(
        &self,
        address: &ResourceAddress,
        policy: AccessPolicy,
    ) -> ClientResult<AccessPolicy>;
}

/// Project-registry API.
#[async_trait]
pub trait ProjectRegistry: Send + Sync + 'static {
    /// Reads a project.
    ///
    /// Returns [`ClientError::PermissionDenied`] or [`ClientError::NotFound`]
    /// when the project is missing or invisible to the caller.
    async fn get_project(&self, project_id: &str) -> ClientResult<Project>;
}
