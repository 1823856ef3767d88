//! In-memory warehouse for tests and local runs.
//!
//! Thread-safe via `RwLock`. Not suitable for production. Follows the
//! backend's observable semantics closely enough for the pipelines to be
//! exercised end to end: creates conflict on existing resources, tables
//! need their dataset, IAM calls on missing resources are not-found, and
//! unknown projects answer permission-denied.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::address::{DatasetAddress, ResourceAddress};
use crate::client::{
    ClientError, ClientResult, Dataset, Project, ProjectRegistry, ResourceClient, TableResource,
};
use crate::policy::AccessPolicy;

#[derive(Debug, Default)]
struct State {
    projects: BTreeSet<String>,
    datasets: BTreeMap<DatasetAddress, Dataset>,
    tables: BTreeMap<ResourceAddress, TableResource>,
    policies: BTreeMap<ResourceAddress, AccessPolicy>,
}

/// In-memory [`ResourceClient`] and [`ProjectRegistry`].
#[derive(Debug, Clone, Default)]
pub struct MemoryResourceClient {
    state: Arc<RwLock<State>>,
}

impl MemoryResourceClient {
    /// Creates an empty warehouse with no projects.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the state lock is poisoned.
    pub fn add_project(&self, project_id: impl Into<String>) -> ClientResult<()> {
        self.write()?.projects.insert(project_id.into());
        Ok(())
    }

    /// Stores a table or view directly, bypassing create semantics.
    ///
    /// The dataset is registered as a side effect.
    ///
    /// # Errors
    ///
    /// Returns an error if the state lock is poisoned.
    pub fn put_table(&self, table: TableResource) -> ClientResult<()> {
        let mut state = self.write()?;
        let dataset = table.address.dataset_address();
        state
            .datasets
            .entry(dataset.clone())
            .or_insert_with(|| Dataset::new(dataset));
        state
            .policies
            .entry(table.address.clone())
            .or_default();
        state.tables.insert(table.address.clone(), table);
        Ok(())
    }

    /// Returns a stored table or view.
    #[must_use]
    pub fn table(&self, address: &ResourceAddress) -> Option<TableResource> {
        self.read().ok()?.tables.get(address).cloned()
    }

    /// Returns the stored policy of a table or view.
    #[must_use]
    pub fn policy(&self, address: &ResourceAddress) -> Option<AccessPolicy> {
        self.read().ok()?.policies.get(address).cloned()
    }

    /// Returns true if the dataset exists.
    #[must_use]
    pub fn has_dataset(&self, address: &DatasetAddress) -> bool {
        self.read()
            .map(|state| state.datasets.contains_key(address))
            .unwrap_or(false)
    }

    fn read(&self) -> ClientResult<RwLockReadGuard<'_, State>> {
        self.state.read().map_err(|_| ClientError::Internal {
            message: "lock poisoned".into(),
        })
    }

    fn write(&self) -> ClientResult<RwLockWriteGuard<'_, State>> {
        self.state.write().map_err(|_| ClientError::Internal {
            message: "lock poisoned".into(),
        })
    }
}

#[async_trait]
impl ResourceClient for MemoryResourceClient {
    async fn get_dataset(&self, address: &DatasetAddress) -> ClientResult<Option<Dataset>> {
        Ok(self.read()?.datasets.get(address).cloned())
    }

    async fn create_dataset(&self, address: &DatasetAddress) -> ClientResult<Dataset> {
        let mut state = self.write()?;
        if state.datasets.contains_key(address) {
            return Err(ClientError::conflict(format!(
                "Already Exists: Dataset {address}"
            )));
        }
        let dataset = Dataset {
            address: address.clone(),
            location: Some("US".to_string()),
            created_at: Some(Utc::now()),
        };
        state.datasets.insert(address.clone(), dataset.clone());
        drop(state);
        Ok(dataset)
    }

    async fn get_table(&self, address: &ResourceAddress) -> ClientResult<Option<TableResource>> {
        Ok(self.read()?.tables.get(address).cloned())
    }

    async fn create_table(&self, mut table: TableResource) -> ClientResult<TableResource> {
        let mut state = self.write()?;
        let dataset = table.address.dataset_address();
        if !state.datasets.contains_key(&dataset) {
            return Err(ClientError::not_found(format!("Dataset {dataset}")));
        }
        if state.tables.contains_key(&table.address) {
            return Err(ClientError::conflict(format!(
                "Already Exists: Table {}",
                table.address
            )));
        }
        table.last_modified = Some(Utc::now());
        state
            .policies
            .insert(table.address.clone(), AccessPolicy::new());
        state.tables.insert(table.address.clone(), table.clone());
        drop(state);
        Ok(table)
    }

    async fn update_table(&self, mut table: TableResource) -> ClientResult<TableResource> {
        let mut state = self.write()?;
        let Some(existing) = state.tables.get_mut(&table.address) else {
            return Err(ClientError::not_found(format!("Table {}", table.address)));
        };
        table.last_modified = Some(Utc::now());
        *existing = table.clone();
        drop(state);
        Ok(table)
    }

    async fn delete_table(&self, address: &ResourceAddress) -> ClientResult<bool> {
        let mut state = self.write()?;
        state.policies.remove(address);
        Ok(state.tables.remove(address).is_some())
    }

    async fn get_iam_policy(&self, address: &ResourceAddress) -> ClientResult<AccessPolicy> {
        let state = self.read()?;
        if !state.tables.contains_key(address) {
            return Err(ClientError::not_found(format!("Table {address}")));
        }
        Ok(state.policies.get(address).cloned().unwrap_or_default())
    }

    async fn set_iam_policy(
        &self,
        address: &ResourceAddress,
        policy: AccessPolicy,
    ) -> ClientResult<AccessPolicy> {
        let mut state = self.write()?;
        if !state.tables.contains_key(address) {
            return Err(ClientError::not_found(format!("Table {address}")));
        }
        state.policies.insert(address.clone(), policy.clone());
        drop(state);
        Ok(policy)
    }
}

#[async_trait]
impl ProjectRegistry for MemoryResourceClient {
    async fn get_project(&self, project_id: &str) -> ClientResult<Project> {
        if self.read()?.projects.contains(project_id) {
            Ok(Project {
                project_id: project_id.to_string(),
                display_name: None,
            })
        } else {
            Err(ClientError::PermissionDenied {
                message: format!("Permission denied on resource project {project_id}"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use crate::policy::Role;
    use crate::schema::SchemaSnapshot;

    fn orders() -> ResourceAddress {
        ResourceAddress::new("p", "d", "orders")
    }

    #[tokio::test]
    async fn create_table_requires_dataset() {
        let client = MemoryResourceClient::new();
        let err = client
            .create_table(TableResource::table(orders(), SchemaSnapshot::default()))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn create_conflicts_on_existing_resources() {
        let client = MemoryResourceClient::new();
        let dataset = orders().dataset_address();
        client.create_dataset(&dataset).await.unwrap();
        assert!(matches!(
            client.create_dataset(&dataset).await,
            Err(ClientError::Conflict { .. })
        ));

        let table = TableResource::table(orders(), SchemaSnapshot::default());
        client.create_table(table.clone()).await.unwrap();
        assert!(matches!(
            client.create_table(table).await,
            Err(ClientError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn iam_calls_on_missing_resources_are_not_found() {
        let client = MemoryResourceClient::new();
        assert!(client.get_iam_policy(&orders()).await.unwrap_err().is_not_found());
        assert!(
            client
                .set_iam_policy(&orders(), AccessPolicy::new())
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn delete_drops_table_and_policy() {
        let client = MemoryResourceClient::new();
        client
            .put_table(TableResource::table(orders(), SchemaSnapshot::default()))
            .unwrap();
        let mut policy = AccessPolicy::new();
        policy.add(Role::new("roles/x"), Identity::user("a@x.com"));
        client.set_iam_policy(&orders(), policy).await.unwrap();

        assert!(client.delete_table(&orders()).await.unwrap());
        assert!(client.policy(&orders()).is_none());
        assert!(!client.delete_table(&orders()).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_projects_answer_permission_denied() {
        let client = MemoryResourceClient::new();
        client.add_project("known").unwrap();
        assert!(client.get_project("known").await.is_ok());
        assert!(matches!(
            client.get_project("unknown").await,
            Err(ClientError::PermissionDenied { .. })
        ));
    }
}
