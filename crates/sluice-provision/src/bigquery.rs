//! BigQuery and Resource Manager REST client.
//!
//! This module provides [`BigQueryRestClient`], an implementation of
//! [`ResourceClient`] against the BigQuery v2 REST API and of
//! [`ProjectRegistry`] against Cloud Resource Manager v3.
//!
//! ## Status Mapping
//!
//! - `404` maps to [`ClientError::NotFound`] (and to `None`/`false` for
//!   `get_*` and `delete_table`)
//! - `403` maps to [`ClientError::PermissionDenied`]
//! - `409` maps to [`ClientError::Conflict`]
//! - any other non-success status maps to [`ClientError::Api`]
//!
//! Updates go through `tables.patch`, so properties the model does not carry
//! (labels, expiration, partitioning) are left untouched.
//!
//! ## Usage
//!
//! The HTTP client is only compiled when the `gcp` feature is enabled:
//!
//! ```toml
//! [dependencies]
//! sluice-provision = { version = "0.1", features = ["gcp"] }
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use sluice_provision::bigquery::{BigQueryClientConfig, BigQueryRestClient};
//!
//! let client = Arc::new(BigQueryRestClient::new(BigQueryClientConfig::default()).await?);
//! let provisioner = Provisioner::new(client.clone(), client, ProvisionerConfig::from_env()?)?;
//! ```
//!
//! [`ResourceClient`]: sluice_core::client::ResourceClient
//! [`ProjectRegistry`]: sluice_core::client::ProjectRegistry

// Wire conversions are only reachable through the HTTP client.
#![cfg_attr(not(feature = "gcp"), allow(dead_code))]

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sluice_core::address::{DatasetAddress, ResourceAddress};
use sluice_core::client::{ClientError, ClientResult, Dataset, TableDefinition, TableResource};
use sluice_core::identity::Identity;
use sluice_core::policy::{AccessPolicy, Role};
use sluice_core::schema::{ColumnMode, SchemaSnapshot, StandardSqlType, TableField};

/// Default BigQuery REST endpoint.
pub const DEFAULT_BIGQUERY_ENDPOINT: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// Default Resource Manager REST endpoint.
pub const DEFAULT_RESOURCE_MANAGER_ENDPOINT: &str = "https://cloudresourcemanager.googleapis.com/v3";

/// Configuration for the REST client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BigQueryClientConfig {
    /// BigQuery API base URL.
    #[serde(default = "default_bigquery_endpoint")]
    pub bigquery_endpoint: String,
    /// Resource Manager API base URL.
    #[serde(default = "default_resource_manager_endpoint")]
    pub resource_manager_endpoint: String,
    /// Per-request timeout (default: 30 seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,
}

fn default_bigquery_endpoint() -> String {
    DEFAULT_BIGQUERY_ENDPOINT.to_string()
}

fn default_resource_manager_endpoint() -> String {
    DEFAULT_RESOURCE_MANAGER_ENDPOINT.to_string()
}

const fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for BigQueryClientConfig {
    fn default() -> Self {
        Self {
            bigquery_endpoint: default_bigquery_endpoint(),
            resource_manager_endpoint: default_resource_manager_endpoint(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl BigQueryClientConfig {
    /// Overrides both endpoints, e.g. to target an emulator.
    #[must_use]
    pub fn with_endpoints(
        mut self,
        bigquery: impl Into<String>,
        resource_manager: impl Into<String>,
    ) -> Self {
        self.bigquery_endpoint = bigquery.into();
        self.resource_manager_endpoint = resource_manager.into();
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatasetReference {
    project_id: String,
    dataset_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableReference {
    project_id: String,
    dataset_id: String,
    table_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatasetBody {
    dataset_reference: DatasetReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    #[serde(default, skip_serializing)]
    creation_time: Option<String>,
}

/// Integer fields are 64-bit and encoded as JSON strings.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldBody {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_length: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    precision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scale: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SchemaBody {
    #[serde(default)]
    fields: Vec<FieldBody>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ViewBody {
    query: String,
    #[serde(default)]
    use_legacy_sql: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableBody {
    table_reference: TableReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    schema: Option<SchemaBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    view: Option<ViewBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing)]
    last_modified_time: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct BindingBody {
    role: String,
    #[serde(default)]
    members: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PolicyBody {
    #[serde(default)]
    bindings: Vec<BindingBody>,
}

#[derive(Debug, Serialize)]
struct SetIamPolicyRequest {
    policy: PolicyBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectBody {
    project_id: String,
    #[serde(default)]
    display_name: Option<String>,
}

/// Google API error response.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

// ============================================================================
// Conversions
// ============================================================================

fn parse_millis(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|v| v.parse::<i64>().ok())
        .and_then(DateTime::from_timestamp_millis)
}

fn parse_u32(field: &str, name: &str, value: Option<&str>) -> ClientResult<Option<u32>> {
    value
        .map(|v| {
            v.parse::<u32>().map_err(|_| ClientError::Internal {
                message: format!("field '{name}' has a non-numeric {field}: {v}"),
            })
        })
        .transpose()
}

/// Accepts both legacy and standard-SQL type names as returned by `tables.get`.
fn parse_field_type(name: &str, raw: &str) -> ClientResult<StandardSqlType> {
    let canonical = match raw {
        "INTEGER" => "INT64",
        "FLOAT" => "FLOAT64",
        "BOOLEAN" => "BOOL",
        "RECORD" => "STRUCT",
        other => other,
    };
    canonical.parse().map_err(|_| ClientError::Internal {
        message: format!("field '{name}' has an unsupported type {raw}"),
    })
}

fn parse_mode(name: &str, raw: Option<&str>) -> ClientResult<Option<ColumnMode>> {
    match raw {
        None => Ok(None),
        Some("NULLABLE") => Ok(Some(ColumnMode::Nullable)),
        Some("REQUIRED") => Ok(Some(ColumnMode::Required)),
        Some("REPEATED") => Ok(Some(ColumnMode::Repeated)),
        Some(other) => Err(ClientError::Internal {
            message: format!("field '{name}' has an unsupported mode {other}"),
        }),
    }
}

impl FieldBody {
    fn from_field(field: &TableField) -> Self {
        Self {
            name: field.name.clone(),
            field_type: field.field_type.as_str().to_string(),
            mode: field.mode.map(|m| m.as_str().to_string()),
            description: field.description.clone(),
            max_length: field.max_length.map(|v| v.to_string()),
            precision: field.precision.map(|v| v.to_string()),
            scale: field.scale.map(|v| v.to_string()),
        }
    }

    fn into_field(self) -> ClientResult<TableField> {
        Ok(TableField {
            field_type: parse_field_type(&self.name, &self.field_type)?,
            mode: parse_mode(&self.name, self.mode.as_deref())?,
            max_length: parse_u32("maxLength", &self.name, self.max_length.as_deref())?,
            precision: parse_u32("precision", &self.name, self.precision.as_deref())?,
            scale: parse_u32("scale", &self.name, self.scale.as_deref())?,
            description: self.description,
            name: self.name,
        })
    }
}

impl SchemaBody {
    fn from_snapshot(schema: &SchemaSnapshot) -> Self {
        Self {
            fields: schema.fields.iter().map(FieldBody::from_field).collect(),
        }
    }

    fn into_snapshot(self) -> ClientResult<SchemaSnapshot> {
        self.fields
            .into_iter()
            .map(FieldBody::into_field)
            .collect::<ClientResult<Vec<_>>>()
            .map(SchemaSnapshot::new)
    }
}

impl DatasetBody {
    fn from_address(address: &DatasetAddress) -> Self {
        Self {
            dataset_reference: DatasetReference {
                project_id: address.project.clone(),
                dataset_id: address.dataset.clone(),
            },
            location: None,
            creation_time: None,
        }
    }

    fn into_dataset(self) -> Dataset {
        Dataset {
            created_at: parse_millis(self.creation_time.as_deref()),
            address: DatasetAddress::new(
                self.dataset_reference.project_id,
                self.dataset_reference.dataset_id,
            ),
            location: self.location,
        }
    }
}

impl TableBody {
    fn from_resource(table: &TableResource) -> Self {
        let (schema, view) = match &table.definition {
            TableDefinition::Table { schema } => (Some(SchemaBody::from_snapshot(schema)), None),
            TableDefinition::View {
                query,
                schema,
                use_legacy_sql,
            } => (
                schema.as_ref().map(SchemaBody::from_snapshot),
                Some(ViewBody {
                    query: query.clone(),
                    use_legacy_sql: *use_legacy_sql,
                }),
            ),
        };
        Self {
            table_reference: TableReference {
                project_id: table.address.project.clone(),
                dataset_id: table.address.dataset.clone(),
                table_id: table.address.name.clone(),
            },
            schema,
            view,
            description: table.description.clone(),
            last_modified_time: None,
        }
    }

    fn into_resource(self) -> ClientResult<TableResource> {
        let schema = self.schema.map(SchemaBody::into_snapshot).transpose()?;
        let definition = match self.view {
            Some(view) => TableDefinition::View {
                query: view.query,
                schema,
                use_legacy_sql: view.use_legacy_sql,
            },
            None => TableDefinition::Table {
                schema: schema.unwrap_or_default(),
            },
        };
        Ok(TableResource {
            address: ResourceAddress::new(
                self.table_reference.project_id,
                self.table_reference.dataset_id,
                self.table_reference.table_id,
            ),
            definition,
            description: self.description,
            last_modified: parse_millis(self.last_modified_time.as_deref()),
        })
    }
}

impl PolicyBody {
    fn from_policy(policy: &AccessPolicy) -> Self {
        Self {
            bindings: policy
                .bindings()
                .iter()
                .map(|(role, members)| BindingBody {
                    role: role.as_str().to_string(),
                    members: members.iter().map(Identity::member).collect(),
                })
                .collect(),
        }
    }

    fn into_policy(self) -> AccessPolicy {
        let mut bindings: BTreeMap<Role, BTreeSet<Identity>> = BTreeMap::new();
        for binding in self.bindings {
            bindings
                .entry(Role::new(binding.role))
                .or_default()
                .extend(binding.members.iter().map(|m| Identity::from_member(m)));
        }
        AccessPolicy::from_bindings(bindings)
    }
}

/// Maps a non-success status and body to a client error.
fn status_error(status: u16, body: &str) -> ClientError {
    let message = serde_json::from_str::<ErrorResponse>(body).map_or_else(
        |_| body.to_string(),
        |r| match r.error.status {
            Some(s) => format!("{} ({s})", r.error.message),
            None => r.error.message,
        },
    );
    match status {
        404 => ClientError::NotFound { message },
        403 => ClientError::PermissionDenied { message },
        409 => ClientError::Conflict { message },
        _ => ClientError::Api { status, message },
    }
}

// ============================================================================
// GCP Feature-Gated Implementation
// ============================================================================

#[cfg(feature = "gcp")]
mod gcp_impl {
    use std::sync::Arc;

    use async_trait::async_trait;
    use gcp_auth::TokenProvider;
    use reqwest::{Method, Url};
    use serde::Serialize;
    use serde::de::DeserializeOwned;

    use sluice_core::address::{DatasetAddress, ResourceAddress};
    use sluice_core::client::{
        ClientError, ClientResult, Dataset, Project, ProjectRegistry, ResourceClient,
        TableResource,
    };
    use sluice_core::error::{Error, Result};
    use sluice_core::policy::AccessPolicy;

    use super::{
        BigQueryClientConfig, DatasetBody, PolicyBody, ProjectBody, SetIamPolicyRequest,
        TableBody, status_error,
    };

    const SCOPES: &[&str] = &["https://www.googleapis.com/auth/cloud-platform"];

    /// REST client for BigQuery and Resource Manager.
    pub struct BigQueryRestClient {
        config: BigQueryClientConfig,
        token_provider: Arc<dyn TokenProvider>,
        client: reqwest::Client,
    }

    impl std::fmt::Debug for BigQueryRestClient {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("BigQueryRestClient")
                .field("config", &self.config)
                .field("token_provider", &"<TokenProvider>")
                .field("client", &self.client)
                .finish()
        }
    }

    impl BigQueryRestClient {
        /// Creates a client using application default credentials.
        ///
        /// # Errors
        ///
        /// Returns an error if the endpoints are invalid or GCP authentication
        /// cannot be initialized.
        pub async fn new(config: BigQueryClientConfig) -> Result<Self> {
            let token_provider = gcp_auth::provider()
                .await
                .map_err(|e| Error::configuration(format!("Failed to initialize GCP auth: {e}")))?;
            Self::with_token_provider(config, token_provider)
        }

        /// Creates a client with an explicit token provider.
        ///
        /// # Errors
        ///
        /// Returns an error if the endpoints are invalid or the HTTP client
        /// cannot be built.
        pub fn with_token_provider(
            config: BigQueryClientConfig,
            token_provider: Arc<dyn TokenProvider>,
        ) -> Result<Self> {
            for endpoint in [&config.bigquery_endpoint, &config.resource_manager_endpoint] {
                Url::parse(endpoint).map_err(|e| {
                    Error::configuration(format!("invalid endpoint '{endpoint}': {e}"))
                })?;
            }
            let client = reqwest::Client::builder()
                .timeout(config.request_timeout)
                .build()
                .map_err(|e| Error::configuration(format!("Failed to create HTTP client: {e}")))?;

            Ok(Self {
                config,
                token_provider,
                client,
            })
        }

        fn url(base: &str, segments: &[&str]) -> ClientResult<Url> {
            let mut url = Url::parse(base).map_err(|e| ClientError::Internal {
                message: format!("invalid endpoint '{base}': {e}"),
            })?;
            url.path_segments_mut()
                .map_err(|()| ClientError::Internal {
                    message: format!("endpoint '{base}' cannot carry a path"),
                })?
                .pop_if_empty()
                .extend(segments);
            Ok(url)
        }

        fn dataset_url(&self, address: &DatasetAddress) -> ClientResult<Url> {
            Self::url(
                &self.config.bigquery_endpoint,
                &["projects", &address.project, "datasets", &address.dataset],
            )
        }

        fn tables_url(&self, project: &str, dataset: &str) -> ClientResult<Url> {
            Self::url(
                &self.config.bigquery_endpoint,
                &["projects", project, "datasets", dataset, "tables"],
            )
        }

        fn table_url(&self, address: &ResourceAddress, suffix: &str) -> ClientResult<Url> {
            Self::table_url_on(&self.config.bigquery_endpoint, address, suffix)
        }

        fn table_url_on(base: &str, address: &ResourceAddress, suffix: &str) -> ClientResult<Url> {
            let table = format!("{}{suffix}", address.name);
            Self::url(
                base,
                &[
                    "projects",
                    &address.project,
                    "datasets",
                    &address.dataset,
                    "tables",
                    &table,
                ],
            )
        }

        /// `tables.patch`: properties absent from the body (labels,
        /// expiration, partitioning) keep their live values.
        fn table_patch(base: &str, table: &TableResource) -> ClientResult<(Method, Url, TableBody)> {
            let url = Self::table_url_on(base, &table.address, "")?;
            Ok((Method::PATCH, url, TableBody::from_resource(table)))
        }

        async fn access_token(&self) -> ClientResult<String> {
            let token = self
                .token_provider
                .token(SCOPES)
                .await
                .map_err(|e| ClientError::transport_with_source("Failed to get GCP access token", e))?;
            Ok(token.as_str().to_string())
        }

        /// Sends a request. `Ok(None)` on 404.
        async fn send<B, R>(&self, method: Method, url: Url, body: Option<&B>) -> ClientResult<Option<R>>
        where
            B: Serialize + ?Sized + Sync,
            R: DeserializeOwned + Send,
        {
            let token = self.access_token().await?;
            tracing::debug!(method = %method, url = %url, "sending request");
            let mut request = self.client.request(method, url).bearer_auth(token);
            if let Some(body) = body {
                request = request.json(body);
            }
            let response = request
                .send()
                .await
                .map_err(|e| ClientError::transport_with_source("request failed", e))?;

            let status = response.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if !status.is_success() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown error".to_string());
                return Err(status_error(status.as_u16(), &body));
            }

            let text = response
                .text()
                .await
                .map_err(|e| ClientError::transport_with_source("failed to read response", e))?;
            let text = if text.trim().is_empty() { "null" } else { text.as_str() };
            serde_json::from_str(text)
                .map(Some)
                .map_err(|e| ClientError::Internal {
                    message: format!("unexpected response body: {e}"),
                })
        }

        /// Sends a request whose 404 is an error.
        async fn send_expecting<B, R>(&self, method: Method, url: Url, body: Option<&B>, what: &str) -> ClientResult<R>
        where
            B: Serialize + ?Sized + Sync,
            R: DeserializeOwned + Send,
        {
            self.send(method, url, body)
                .await?
                .ok_or_else(|| ClientError::not_found(what.to_string()))
        }
    }

    #[async_trait]
    impl ResourceClient for BigQueryRestClient {
        async fn get_dataset(&self, address: &DatasetAddress) -> ClientResult<Option<Dataset>> {
            let url = self.dataset_url(address)?;
            let body: Option<DatasetBody> = self.send::<(), _>(Method::GET, url, None).await?;
            Ok(body.map(DatasetBody::into_dataset))
        }

        async fn create_dataset(&self, address: &DatasetAddress) -> ClientResult<Dataset> {
            let url = Self::url(
                &self.config.bigquery_endpoint,
                &["projects", &address.project, "datasets"],
            )?;
            let request = DatasetBody::from_address(address);
            let body: DatasetBody = self
                .send_expecting(Method::POST, url, Some(&request), &format!("Project {}", address.project))
                .await?;
            Ok(body.into_dataset())
        }

        async fn get_table(&self, address: &ResourceAddress) -> ClientResult<Option<TableResource>> {
            let url = self.table_url(address, "")?;
            let body: Option<TableBody> = self.send::<(), _>(Method::GET, url, None).await?;
            body.map(TableBody::into_resource).transpose()
        }

        async fn create_table(&self, table: TableResource) -> ClientResult<TableResource> {
            let url = self.tables_url(&table.address.project, &table.address.dataset)?;
            let request = TableBody::from_resource(&table);
            let what = format!("Dataset {}", table.address.dataset_address());
            let body: TableBody = self
                .send_expecting(Method::POST, url, Some(&request), &what)
                .await?;
            body.into_resource()
        }

        async fn update_table(&self, table: TableResource) -> ClientResult<TableResource> {
            let (method, url, request) =
                Self::table_patch(&self.config.bigquery_endpoint, &table)?;
            let what = format!("Table {}", table.address);
            let body: TableBody = self
                .send_expecting(method, url, Some(&request), &what)
                .await?;
            body.into_resource()
        }

        async fn delete_table(&self, address: &ResourceAddress) -> ClientResult<bool> {
            let url = self.table_url(address, "")?;
            let deleted: Option<serde_json::Value> =
                self.send::<(), _>(Method::DELETE, url, None).await?;
            Ok(deleted.is_some())
        }

        async fn get_iam_policy(&self, address: &ResourceAddress) -> ClientResult<AccessPolicy> {
            let url = self.table_url(address, ":getIamPolicy")?;
            let empty = serde_json::json!({});
            let body: PolicyBody = self
                .send_expecting(Method::POST, url, Some(&empty), &format!("Table {address}"))
                .await?;
            Ok(body.into_policy())
        }

        async fn set_iam_policy(
            &self,
            address: &ResourceAddress,
            policy: AccessPolicy,
        ) -> ClientResult<AccessPolicy> {
            let url = self.table_url(address, ":setIamPolicy")?;
            let request = SetIamPolicyRequest {
                policy: PolicyBody::from_policy(&policy),
            };
            let body: PolicyBody = self
                .send_expecting(Method::POST, url, Some(&request), &format!("Table {address}"))
                .await?;
            Ok(body.into_policy())
        }
    }

    #[async_trait]
    impl ProjectRegistry for BigQueryRestClient {
        async fn get_project(&self, project_id: &str) -> ClientResult<Project> {
            let url = Self::url(
                &self.config.resource_manager_endpoint,
                &["projects", project_id],
            )?;
            let body: ProjectBody = self
                .send_expecting::<(), _>(Method::GET, url, None, &format!("Project {project_id}"))
                .await?;
            Ok(Project {
                project_id: body.project_id,
                display_name: body.display_name,
            })
        }
    }
}

#[cfg(feature = "gcp")]
pub use gcp_impl::BigQueryRestClient;
