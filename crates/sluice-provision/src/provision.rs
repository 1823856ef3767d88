//! Provisioning pipelines for storage tables and output views.
//!
//! Stages run in a fixed order and the first failure aborts the rest. No
//! completed stage is rolled back: a failed grant leaves the table or view
//! in place, and re-running validation is how a caller observes partial
//! completion.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use sluice_core::address::ResourceAddress;
use sluice_core::descriptor::{Ownership, TableDescriptor, ViewDescriptor};
use sluice_core::identity::Subject;
use sluice_core::operation::OperationResult;
use sluice_core::outcome::{InfoField, ProvisionResult};
use sluice_core::policy::Role;

use crate::access::AccessControlManager;
use crate::identity::{IdentityResolver, resolve_all};
use crate::resource_manager::{ResourceManager, ViewRequest};

/// Value shown for console links.
pub const CONSOLE_LINK_TEXT: &str = "Open in BigQuery";

/// Builds the console link of a table or view.
#[must_use]
pub fn console_url(base: &str, address: &ResourceAddress) -> String {
    format!(
        "{base}?project={p}&ws=!1m5!1m4!4m3!1s{p}!2s{d}!3s{n}",
        p = address.project,
        d = address.dataset,
        n = address.name
    )
}

/// Collaborators shared by both pipelines.
#[derive(Clone)]
pub struct PipelineContext {
    resources: ResourceManager,
    access: AccessControlManager,
    resolver: Arc<dyn IdentityResolver>,
    console_base_url: String,
}

impl fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineContext")
            .field("resources", &self.resources)
            .field("access", &self.access)
            .field("resolver", &"<IdentityResolver>")
            .field("console_base_url", &self.console_base_url)
            .finish()
    }
}

impl PipelineContext {
    /// Creates a pipeline context.
    #[must_use]
    pub fn new(
        resources: ResourceManager,
        access: AccessControlManager,
        resolver: Arc<dyn IdentityResolver>,
        console_base_url: impl Into<String>,
    ) -> Self {
        Self {
            resources,
            access,
            resolver,
            console_base_url: console_base_url.into(),
        }
    }

    fn describe(&self, address: &ResourceAddress, name_key: &str, name_label: &str) -> ProvisionResult {
        ProvisionResult::empty()
            .with("project", InfoField::string("Project", &address.project))
            .with("dataset", InfoField::string("Dataset", &address.dataset))
            .with(name_key, InfoField::string(name_label, &address.name))
            .with(
                "url",
                InfoField::link(
                    "Url",
                    CONSOLE_LINK_TEXT,
                    console_url(&self.console_base_url, address),
                ),
            )
    }
}

/// Provisions storage tables.
#[derive(Debug, Clone)]
pub struct TableProvisioner {
    ctx: PipelineContext,
}

impl TableProvisioner {
    /// Creates a table pipeline.
    #[must_use]
    pub const fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    /// Ensures the dataset, creates or replaces the table, then grants the
    /// declared owner roles to the resolved owners.
    ///
    /// # Errors
    ///
    /// Returns the failure of the first stage that failed.
    pub async fn provision(
        &self,
        table: &TableDescriptor,
        owners: &Ownership,
    ) -> OperationResult<ProvisionResult> {
        let address = table.address();
        self.ctx
            .resources
            .create_dataset_if_absent(&address.dataset_address())
            .await?;
        let live = self
            .ctx
            .resources
            .create_or_update_table(&address, &table.schema)
            .await?;
        let identities = resolve_all(self.ctx.resolver.as_ref(), &owners.subjects())?;
        self.ctx
            .access
            .grant(&table.roles(), &identities, &live.address)
            .await?;
        tracing::info!(resource = %live.address, "table provisioned");
        Ok(self.ctx.describe(&live.address, "table", "Table"))
    }

    /// Revokes the owner roles, then deletes the table if `remove_data` is set.
    ///
    /// # Errors
    ///
    /// Returns the failure of the revoke or the delete.
    pub async fn unprovision(
        &self,
        table: &TableDescriptor,
        remove_data: bool,
    ) -> OperationResult<ProvisionResult> {
        let address = table.address();
        self.ctx.access.revoke(&table.roles(), &address).await?;
        if remove_data {
            self.ctx.resources.delete_table(&address).await?;
        }
        tracing::info!(resource = %address, remove_data, "table unprovisioned");
        Ok(ProvisionResult::empty())
    }
}

/// Provisions output views.
#[derive(Debug, Clone)]
pub struct ViewProvisioner {
    ctx: PipelineContext,
    read_role: Role,
}

impl ViewProvisioner {
    /// Creates a view pipeline granting `read_role` to readers.
    #[must_use]
    pub const fn new(ctx: PipelineContext, read_role: Role) -> Self {
        Self { ctx, read_role }
    }

    /// Creates or updates the view, then grants the read role to the resolved owners.
    ///
    /// # Errors
    ///
    /// Returns the failure of the first stage that failed.
    pub async fn provision(
        &self,
        view: &ViewDescriptor,
        owners: &Ownership,
    ) -> OperationResult<ProvisionResult> {
        let live = self
            .ctx
            .resources
            .create_or_update_view(&ViewRequest::from(view))
            .await?;
        let identities = resolve_all(self.ctx.resolver.as_ref(), &owners.subjects())?;
        self.ctx
            .access
            .grant(std::slice::from_ref(&self.read_role), &identities, &live.address)
            .await?;
        tracing::info!(resource = %live.address, "view provisioned");
        Ok(self.ctx.describe(&live.address, "view", "View"))
    }

    /// Revokes the read role, then deletes the view if `remove_data` is set.
    ///
    /// # Errors
    ///
    /// Returns the failure of the revoke or the delete.
    pub async fn unprovision(
        &self,
        view: &ViewDescriptor,
        remove_data: bool,
    ) -> OperationResult<ProvisionResult> {
        let address = view.address();
        self.ctx
            .access
            .revoke(std::slice::from_ref(&self.read_role), &address)
            .await?;
        if remove_data {
            self.ctx.resources.delete_table(&address).await?;
        }
        tracing::info!(resource = %address, remove_data, "view unprovisioned");
        Ok(ProvisionResult::empty())
    }

    /// Replaces the readers of the view with the given subjects.
    ///
    /// The read role is revoked entirely before the new subjects are
    /// resolved and granted, so a resolution failure leaves the view with
    /// no readers.
    ///
    /// # Errors
    ///
    /// Returns the failure of the revoke, the resolution or the grant.
    pub async fn update_access(
        &self,
        view: &ViewDescriptor,
        subjects: &BTreeSet<Subject>,
    ) -> OperationResult<ProvisionResult> {
        let address = view.address();
        let roles = std::slice::from_ref(&self.read_role);
        self.ctx.access.revoke(roles, &address).await?;
        let identities = resolve_all(self.ctx.resolver.as_ref(), subjects)?;
        self.ctx.access.grant(roles, &identities, &address).await?;
        tracing::info!(resource = %address, readers = identities.len(), "view access updated");
        Ok(ProvisionResult::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::client::TableResource;
    use sluice_core::identity::Identity;
    use sluice_core::memory::MemoryResourceClient;
    use sluice_core::operation::FailureKind;
    use sluice_core::schema::{ColumnSpec, SchemaSnapshot};

    use crate::identity::DirectoryIdentityResolver;

    const BASE: &str = "https://console.cloud.google.com/bigquery";

    fn context(client: &MemoryResourceClient) -> PipelineContext {
        let shared = Arc::new(client.clone());
        PipelineContext::new(
            ResourceManager::new(shared.clone()),
            AccessControlManager::new(shared),
            Arc::new(DirectoryIdentityResolver::new("@acme.com")),
            BASE,
        )
    }

    fn owners() -> Ownership {
        Ownership {
            data_product_owner: Subject::new("user:jane_acme.com"),
            dev_group: Subject::new("group:dev"),
        }
    }

    fn table() -> TableDescriptor {
        TableDescriptor {
            id: "storage".into(),
            project: "acme".into(),
            dataset: "sales".into(),
            table_name: "orders".into(),
            owner_roles: vec!["roles/bigquery.dataOwner".into()],
            schema: vec![ColumnSpec::new("id", "INT64")],
        }
    }

    fn view() -> ViewDescriptor {
        ViewDescriptor {
            id: "output".into(),
            project: "acme".into(),
            dataset: "sales".into(),
            table_name: "orders".into(),
            view_name: "orders_v".into(),
            description: Some("orders".into()),
            schema: vec![],
        }
    }

    #[test]
    fn console_url_points_at_resource() {
        let address = ResourceAddress::new("p", "d", "t");
        assert_eq!(
            console_url(BASE, &address),
            "https://console.cloud.google.com/bigquery?project=p&ws=!1m5!1m4!4m3!1sp!2sd!3st"
        );
    }

    #[tokio::test]
    async fn table_provision_grants_owner_roles() {
        let client = MemoryResourceClient::new();
        let provisioner = TableProvisioner::new(context(&client));

        let result = provisioner.provision(&table(), &owners()).await.unwrap();

        assert_eq!(result.get("table").unwrap().value, "orders");
        assert_eq!(result.get("url").unwrap().value, CONSOLE_LINK_TEXT);
        let policy = client.policy(&table().address()).unwrap();
        let role = Role::new("roles/bigquery.dataOwner");
        assert!(policy.has_binding(&role, &Identity::user("jane@acme.com")));
        assert!(policy.has_binding(&role, &Identity::group("dev@acme.com")));
    }

    #[tokio::test]
    async fn unresolvable_owner_aborts_before_grant() {
        let client = MemoryResourceClient::new();
        let provisioner = TableProvisioner::new(context(&client));
        let owners = Ownership {
            data_product_owner: Subject::new("user:broken"),
            dev_group: Subject::new("group:dev"),
        };

        let failure = provisioner.provision(&table(), &owners).await.unwrap_err();

        assert_eq!(failure.kind, FailureKind::IdentityResolution);
        assert!(client.table(&table().address()).is_some());
        assert!(client.policy(&table().address()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn table_unprovision_keeps_data_by_default() {
        let client = MemoryResourceClient::new();
        let provisioner = TableProvisioner::new(context(&client));
        provisioner.provision(&table(), &owners()).await.unwrap();

        let result = provisioner.unprovision(&table(), false).await.unwrap();
        assert_eq!(result, ProvisionResult::empty());
        assert!(client.table(&table().address()).is_some());
        assert!(client.policy(&table().address()).unwrap().is_empty());

        provisioner.unprovision(&table(), true).await.unwrap();
        assert!(client.table(&table().address()).is_none());
    }

    #[tokio::test]
    async fn view_provision_grants_read_role() {
        let client = MemoryResourceClient::new();
        client
            .put_table(TableResource::table(
                view().source_address(),
                SchemaSnapshot::default(),
            ))
            .unwrap();
        let reader = Role::new("roles/bigquery.dataViewer");
        let provisioner = ViewProvisioner::new(context(&client), reader.clone());

        let result = provisioner.provision(&view(), &owners()).await.unwrap();

        assert_eq!(result.get("view").unwrap().value, "orders_v");
        let policy = client.policy(&view().address()).unwrap();
        assert_eq!(policy.members(&reader).map(BTreeSet::len), Some(2));
    }

    #[tokio::test]
    async fn update_access_replaces_readers() {
        let client = MemoryResourceClient::new();
        client
            .put_table(TableResource::table(
                view().source_address(),
                SchemaSnapshot::default(),
            ))
            .unwrap();
        let reader = Role::new("roles/bigquery.dataViewer");
        let provisioner = ViewProvisioner::new(context(&client), reader.clone());
        provisioner.provision(&view(), &owners()).await.unwrap();

        let subjects: BTreeSet<Subject> = [Subject::new("group:analysts")].into_iter().collect();
        provisioner.update_access(&view(), &subjects).await.unwrap();

        let policy = client.policy(&view().address()).unwrap();
        let members: Vec<_> = policy.members(&reader).unwrap().iter().cloned().collect();
        assert_eq!(members, vec![Identity::group("analysts@acme.com")]);
    }
}
