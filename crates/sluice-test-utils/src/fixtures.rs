//! Pre-built test fixtures for common test scenarios.
//!
//! Provides factory functions to create descriptors with sensible defaults.

use std::sync::Arc;

use sluice_core::address::ResourceAddress;
use sluice_core::client::TableResource;
use sluice_core::config::ProvisionerConfig;
use sluice_core::descriptor::{Component, Ownership, TableDescriptor, ViewDescriptor};
use sluice_core::identity::Subject;
use sluice_core::schema::{ColumnSpec, SchemaSnapshot};
use sluice_provision::Provisioner;

use crate::client::RecordingResourceClient;

/// Group mail domain used by test provisioners.
pub const TEST_GROUP_MAIL_DOMAIN: &str = "@example.com";

/// Owner role granted on test storage tables.
pub const TEST_OWNER_ROLE: &str = "roles/bigquery.dataEditor";

/// Test context with a pre-configured warehouse and a unique project.
pub struct TestContext {
    /// Shared warehouse client.
    pub client: Arc<RecordingResourceClient>,
    /// Registered project identifier.
    pub project: String,
    /// Dataset used by the factories.
    pub dataset: String,
}

impl TestContext {
    /// Creates a new test context with a unique, registered project.
    pub fn new() -> Self {
        let client = Arc::new(RecordingResourceClient::new());
        let project = format!("test-project-{}", uuid::Uuid::new_v4().as_simple());
        client
            .inner()
            .add_project(project.clone())
            .expect("register project");
        Self {
            client,
            project,
            dataset: "sales".to_string(),
        }
    }

    /// Builds a provisioner over this context's warehouse.
    pub fn provisioner(&self) -> Provisioner {
        self.provisioner_with(ProvisionerConfig::new(TEST_GROUP_MAIL_DOMAIN))
    }

    /// Builds a provisioner with a custom configuration.
    pub fn provisioner_with(&self, config: ProvisionerConfig) -> Provisioner {
        Provisioner::new(self.client.clone(), self.client.clone(), config)
            .expect("valid provisioner config")
    }

    /// Address of `name` in this context's dataset.
    pub fn address(&self, name: &str) -> ResourceAddress {
        ResourceAddress::new(&self.project, &self.dataset, name)
    }

    /// Stores a physical table directly, without recording any call.
    pub fn seed_table(&self, name: &str, columns: &[(&str, &str)]) {
        let schema =
            SchemaSnapshot::from_columns(&DescriptorFactory::columns(columns)).expect("valid schema");
        self.client
            .inner()
            .put_table(TableResource::table(self.address(name), schema))
            .expect("seed table");
    }

    /// Storage table component in this context's dataset.
    pub fn table(&self, name: &str, columns: &[(&str, &str)]) -> Component {
        Component::StorageTable(DescriptorFactory::table(
            &self.project,
            &self.dataset,
            name,
            columns,
        ))
    }

    /// Output view component over `source` in this context's dataset.
    pub fn view(&self, source: &str, view_name: &str, columns: &[(&str, &str)]) -> Component {
        Component::OutputView(DescriptorFactory::view(
            &self.project,
            &self.dataset,
            source,
            view_name,
            columns,
        ))
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Factory for creating test descriptors.
pub struct DescriptorFactory;

impl DescriptorFactory {
    /// Columns from `(name, type)` pairs.
    pub fn columns(columns: &[(&str, &str)]) -> Vec<ColumnSpec> {
        columns
            .iter()
            .map(|(name, data_type)| ColumnSpec::new(*name, *data_type))
            .collect()
    }

    /// Storage table owned by [`TEST_OWNER_ROLE`].
    pub fn table(
        project: &str,
        dataset: &str,
        table_name: &str,
        columns: &[(&str, &str)],
    ) -> TableDescriptor {
        TableDescriptor {
            id: format!("urn:dmb:cmp:{dataset}:{table_name}:storage"),
            project: project.to_string(),
            dataset: dataset.to_string(),
            table_name: table_name.to_string(),
            owner_roles: vec![TEST_OWNER_ROLE.to_string()],
            schema: Self::columns(columns),
        }
    }

    /// Output view over `table_name`.
    pub fn view(
        project: &str,
        dataset: &str,
        table_name: &str,
        view_name: &str,
        columns: &[(&str, &str)],
    ) -> ViewDescriptor {
        ViewDescriptor {
            id: format!("urn:dmb:cmp:{dataset}:{view_name}:output"),
            project: project.to_string(),
            dataset: dataset.to_string(),
            table_name: table_name.to_string(),
            view_name: view_name.to_string(),
            description: Some(format!("Output port over {table_name}")),
            schema: Self::columns(columns),
        }
    }

    /// Default owners: a user and a development group.
    pub fn ownership() -> Ownership {
        Ownership {
            data_product_owner: Subject::new("user:jane.doe_example.com"),
            dev_group: Subject::new("group:data-team"),
        }
    }
}
