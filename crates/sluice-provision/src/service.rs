//! The provisioner facade consumed by the request layer.
//!
//! One entry point per external operation. Each call runs inside a
//! [`provision_span`] and records its outcome and duration as metrics.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;

use sluice_core::client::{ProjectRegistry, ResourceClient};
use sluice_core::config::ProvisionerConfig;
use sluice_core::descriptor::{Component, Ownership};
use sluice_core::error::Result;
use sluice_core::identity::Subject;
use sluice_core::observability::provision_span;
use sluice_core::operation::{FailedOperation, OperationResult, Problem};
use sluice_core::outcome::ProvisionResult;
use sluice_core::policy::Role;

use crate::access::AccessControlManager;
use crate::identity::{DirectoryIdentityResolver, IdentityResolver};
use crate::metrics::record_operation;
use crate::projects::ProjectLookup;
use crate::provision::{PipelineContext, TableProvisioner, ViewProvisioner};
use crate::resource_manager::ResourceManager;
use crate::validation::{TableValidator, ViewValidator};

/// Validates, provisions and tears down warehouse components.
///
/// Holds no mutable state beyond its injected clients; concurrent calls on
/// distinct resources are safe, while calls on the same resource are not
/// coordinated.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use sluice_core::prelude::*;
/// use sluice_provision::Provisioner;
///
/// # async fn run() -> sluice_core::Result<()> {
/// let client = Arc::new(MemoryResourceClient::new());
/// let provisioner = Provisioner::new(
///     client.clone(),
///     client,
///     ProvisionerConfig::new("@acme.com"),
/// )?;
/// # let _ = provisioner;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Provisioner {
    table_validator: TableValidator,
    view_validator: ViewValidator,
    tables: TableProvisioner,
    views: ViewProvisioner,
}

impl fmt::Debug for Provisioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provisioner")
            .field("tables", &self.tables)
            .field("views", &self.views)
            .finish_non_exhaustive()
    }
}

impl Provisioner {
    /// Creates a provisioner resolving subjects with the configured group mail domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(
        client: Arc<dyn ResourceClient>,
        registry: Arc<dyn ProjectRegistry>,
        config: ProvisionerConfig,
    ) -> Result<Self> {
        let resolver = Arc::new(DirectoryIdentityResolver::new(
            config.group_mail_domain.clone(),
        ));
        Self::with_resolver(client, registry, resolver, config)
    }

    /// Creates a provisioner with a custom identity resolver.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_resolver(
        client: Arc<dyn ResourceClient>,
        registry: Arc<dyn ProjectRegistry>,
        resolver: Arc<dyn IdentityResolver>,
        config: ProvisionerConfig,
    ) -> Result<Self> {
        config.validate()?;

        let resources = ResourceManager::new(Arc::clone(&client));
        let access = AccessControlManager::new(client);
        let projects = ProjectLookup::new(registry);
        let ctx = PipelineContext::new(
            resources.clone(),
            access,
            resolver,
            config.console_base_url.clone(),
        );

        Ok(Self {
            table_validator: TableValidator::new(resources.clone(), projects),
            view_validator: ViewValidator::new(resources),
            tables: TableProvisioner::new(ctx.clone()),
            views: ViewProvisioner::new(ctx, Role::new(config.view_read_role)),
        })
    }

    /// Checks the preconditions of a component without mutating anything.
    ///
    /// # Errors
    ///
    /// Returns an invalid-request failure for a malformed descriptor, or the
    /// first failed precondition.
    pub async fn validate(&self, component: &Component) -> OperationResult<()> {
        Self::instrumented("validate", component, async {
            component.validate_shape()?;
            match component {
                Component::StorageTable(table) => self.table_validator.validate(table).await,
                Component::OutputView(view) => self.view_validator.validate(view).await,
            }
        })
        .await
    }

    /// Creates or updates a component and grants access to its owners.
    ///
    /// # Errors
    ///
    /// Returns the failure of the first stage that failed.
    pub async fn provision(
        &self,
        component: &Component,
        owners: &Ownership,
    ) -> OperationResult<ProvisionResult> {
        Self::instrumented("provision", component, async {
            component.validate_shape()?;
            match component {
                Component::StorageTable(table) => self.tables.provision(table, owners).await,
                Component::OutputView(view) => self.views.provision(view, owners).await,
            }
        })
        .await
    }

    /// Revokes access to a component and, if `remove_data` is set, deletes it.
    ///
    /// # Errors
    ///
    /// Returns the failure of the revoke or the delete.
    pub async fn unprovision(
        &self,
        component: &Component,
        remove_data: bool,
    ) -> OperationResult<ProvisionResult> {
        Self::instrumented("unprovision", component, async {
            component.validate_shape()?;
            match component {
                Component::StorageTable(table) => {
                    self.tables.unprovision(table, remove_data).await
                }
                Component::OutputView(view) => self.views.unprovision(view, remove_data).await,
            }
        })
        .await
    }

    /// Replaces the readers of an output view.
    ///
    /// # Errors
    ///
    /// Returns an invalid-request failure for storage tables, otherwise the
    /// failure of the revoke, the resolution or the grant.
    pub async fn update_access(
        &self,
        component: &Component,
        subjects: &BTreeSet<Subject>,
    ) -> OperationResult<ProvisionResult> {
        Self::instrumented("update_access", component, async {
            component.validate_shape()?;
            match component {
                Component::OutputView(view) => self.views.update_access(view, subjects).await,
                Component::StorageTable(table) => Err(FailedOperation::invalid_request(
                    "access update is only supported for views",
                    vec![Problem::new(format!(
                        "Component {} is a storage table; access to storage tables follows its owner roles",
                        table.id
                    ))],
                )),
            }
        })
        .await
    }

    async fn instrumented<T, F>(
        operation: &'static str,
        component: &Component,
        fut: F,
    ) -> OperationResult<T>
    where
        F: Future<Output = OperationResult<T>>,
    {
        let kind = component.kind().as_str();
        let span = provision_span(operation, kind, &component.address());
        let started = Instant::now();

        let result = async {
            tracing::info!(component = component.id(), "operation started");
            let result = fut.await;
            match &result {
                Ok(_) => tracing::info!("operation succeeded"),
                Err(failure) => tracing::warn!(
                    failure_kind = ?failure.kind,
                    problems = ?failure.descriptions(),
                    "{}",
                    failure.message
                ),
            }
            result
        }
        .instrument(span)
        .await;

        let outcome = if result.is_ok() { "success" } else { "failure" };
        record_operation(operation, kind, outcome, started.elapsed().as_secs_f64());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::descriptor::{TableDescriptor, ViewDescriptor};
    use sluice_core::memory::MemoryResourceClient;
    use sluice_core::operation::FailureKind;
    use sluice_core::schema::ColumnSpec;

    fn provisioner(client: &MemoryResourceClient) -> Provisioner {
        let shared = Arc::new(client.clone());
        Provisioner::new(shared.clone(), shared, ProvisionerConfig::new("@acme.com")).unwrap()
    }

    fn table() -> Component {
        Component::StorageTable(TableDescriptor {
            id: "storage".into(),
            project: "acme".into(),
            dataset: "sales".into(),
            table_name: "orders".into(),
            owner_roles: vec!["roles/bigquery.dataEditor".into()],
            schema: vec![ColumnSpec::new("id", "INT64")],
        })
    }

    fn view() -> Component {
        Component::OutputView(ViewDescriptor {
            id: "output".into(),
            project: "acme".into(),
            dataset: "sales".into(),
            table_name: "orders".into(),
            view_name: "orders_v".into(),
            description: None,
            schema: vec![ColumnSpec::new("id", "INT64")],
        })
    }

    fn owners() -> Ownership {
        Ownership {
            data_product_owner: Subject::new("user:jane_acme.com"),
            dev_group: Subject::new("group:dev"),
        }
    }

    #[test]
    fn rejects_invalid_config() {
        let client = Arc::new(MemoryResourceClient::new());
        let err = Provisioner::new(client.clone(), client, ProvisionerConfig::new("acme.com"))
            .unwrap_err();
        assert!(err.to_string().contains("SLUICE_GROUP_MAIL_DOMAIN"));
    }

    #[tokio::test]
    async fn table_then_view_round_trip() {
        let client = MemoryResourceClient::new();
        client.add_project("acme").unwrap();
        let provisioner = provisioner(&client);

        provisioner.validate(&table()).await.unwrap();
        provisioner.provision(&table(), &owners()).await.unwrap();
        provisioner.validate(&view()).await.unwrap();
        let result = provisioner.provision(&view(), &owners()).await.unwrap();
        assert!(result.get("url").unwrap().href.is_some());
    }

    #[tokio::test]
    async fn malformed_descriptor_is_invalid_request() {
        let client = MemoryResourceClient::new();
        let mut component = table();
        if let Component::StorageTable(t) = &mut component {
            t.dataset = String::new();
        }
        let failure = provisioner(&client).validate(&component).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::InvalidRequest);
    }

    #[tokio::test]
    async fn update_access_rejects_tables() {
        let client = MemoryResourceClient::new();
        let failure = provisioner(&client)
            .update_access(&table(), &BTreeSet::new())
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::InvalidRequest);
        assert_eq!(failure.message, "access update is only supported for views");
    }
}
