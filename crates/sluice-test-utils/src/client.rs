//! Test warehouse client with call recording.
//!
//! Wraps [`MemoryResourceClient`] and records every call for test assertions.
//! Failures can be injected per call kind to exercise error paths.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use sluice_core::address::{DatasetAddress, ResourceAddress};
use sluice_core::client::{
    ClientError, ClientResult, Dataset, Project, ProjectRegistry, ResourceClient, TableResource,
};
use sluice_core::memory::MemoryResourceClient;
use sluice_core::policy::AccessPolicy;

/// Kind of a recorded client call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// `get_dataset`.
    GetDataset,
    /// `create_dataset`.
    CreateDataset,
    /// `get_table`.
    GetTable,
    /// `create_table`.
    CreateTable,
    /// `update_table`.
    UpdateTable,
    /// `delete_table`.
    DeleteTable,
    /// `get_iam_policy`.
    GetIamPolicy,
    /// `set_iam_policy`.
    SetIamPolicy,
    /// `get_project`.
    GetProject,
}

/// Record of a client call for test assertions.
#[derive(Debug, Clone)]
pub enum ClientCall {
    /// Dataset read.
    GetDataset {
        /// Dataset that was read.
        dataset: DatasetAddress,
    },
    /// Dataset creation.
    CreateDataset {
        /// Dataset that was created.
        dataset: DatasetAddress,
    },
    /// Table or view read.
    GetTable {
        /// Resource that was read.
        address: ResourceAddress,
    },
    /// Table or view creation.
    CreateTable {
        /// Resource as sent.
        table: TableResource,
    },
    /// Table or view update.
    UpdateTable {
        /// Resource as sent.
        table: TableResource,
    },
    /// Table or view deletion.
    DeleteTable {
        /// Resource that was deleted.
        address: ResourceAddress,
    },
    /// IAM policy read.
    GetIamPolicy {
        /// Resource whose policy was read.
        address: ResourceAddress,
    },
    /// IAM policy write.
    SetIamPolicy {
        /// Resource whose policy was written.
        address: ResourceAddress,
        /// Policy as sent.
        policy: AccessPolicy,
    },
    /// Project read.
    GetProject {
        /// Project that was read.
        project_id: String,
    },
}

impl ClientCall {
    /// Kind of this call.
    pub const fn kind(&self) -> CallKind {
        match self {
            Self::GetDataset { .. } => CallKind::GetDataset,
            Self::CreateDataset { .. } => CallKind::CreateDataset,
            Self::GetTable { .. } => CallKind::GetTable,
            Self::CreateTable { .. } => CallKind::CreateTable,
            Self::UpdateTable { .. } => CallKind::UpdateTable,
            Self::DeleteTable { .. } => CallKind::DeleteTable,
            Self::GetIamPolicy { .. } => CallKind::GetIamPolicy,
            Self::SetIamPolicy { .. } => CallKind::SetIamPolicy,
            Self::GetProject { .. } => CallKind::GetProject,
        }
    }
}

/// Error an injected failure produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    /// Answers [`ClientError::NotFound`].
    NotFound,
    /// Answers [`ClientError::PermissionDenied`].
    PermissionDenied,
    /// Answers [`ClientError::Api`] with status 503.
    Unavailable,
}

impl InjectedFailure {
    fn to_error(self, call: CallKind) -> ClientError {
        let message = format!("Injected failure for call: {call:?}");
        match self {
            Self::NotFound => ClientError::NotFound { message },
            Self::PermissionDenied => ClientError::PermissionDenied { message },
            Self::Unavailable => ClientError::Api {
                status: 503,
                message,
            },
        }
    }
}

/// In-memory warehouse client with call tracing.
///
/// Records all calls, including the ones that fail, for later assertion.
#[derive(Debug, Clone, Default)]
pub struct RecordingResourceClient {
    inner: MemoryResourceClient,
    operations: Arc<Mutex<Vec<ClientCall>>>,
    failures: Arc<Mutex<HashMap<CallKind, InjectedFailure>>>,
}

impl RecordingResourceClient {
    /// Creates an empty warehouse with no projects.
    pub fn new() -> Self {
        Self::default()
    }

    /// The wrapped in-memory warehouse, for seeding and inspecting state.
    pub const fn inner(&self) -> &MemoryResourceClient {
        &self.inner
    }

    /// Returns all recorded calls.
    pub fn operations(&self) -> Vec<ClientCall> {
        self.operations.lock().expect("lock").clone()
    }

    /// Returns the kinds of all recorded calls, in order.
    pub fn call_kinds(&self) -> Vec<CallKind> {
        self.operations().iter().map(ClientCall::kind).collect()
    }

    /// Clears recorded calls.
    pub fn clear_operations(&self) {
        self.operations.lock().expect("lock").clear();
    }

    /// Makes every call of `kind` fail with `failure` until cleared.
    pub fn inject_failure(&self, kind: CallKind, failure: InjectedFailure) {
        self.failures.lock().expect("lock").insert(kind, failure);
    }

    /// Clears all injected failures.
    pub fn clear_failures(&self) {
        self.failures.lock().expect("lock").clear();
    }

    fn record(&self, call: ClientCall) -> ClientResult<()> {
        let kind = call.kind();
        self.operations.lock().expect("lock").push(call);
        self.check_failure(kind)
    }

    fn check_failure(&self, kind: CallKind) -> ClientResult<()> {
        let failures = self.failures.lock().expect("lock");
        match failures.get(&kind) {
            Some(failure) => Err(failure.to_error(kind)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ResourceClient for RecordingResourceClient {
    async fn get_dataset(&self, address: &DatasetAddress) -> ClientResult<Option<Dataset>> {
        self.record(ClientCall::GetDataset {
            dataset: address.clone(),
        })?;
        self.inner.get_dataset(address).await
    }

    async fn create_dataset(&self, address: &DatasetAddress) -> ClientResult<Dataset> {
        self.record(ClientCall::CreateDataset {
            dataset: address.clone(),
        })?;
        self.inner.create_dataset(address).await
    }

    async fn get_table(&self, address: &ResourceAddress) -> ClientResult<Option<TableResource>> {
        self.record(ClientCall::GetTable {
            address: address.clone(),
        })?;
        self.inner.get_table(address).await
    }

    async fn create_table(&self, table: TableResource) -> ClientResult<TableResource> {
        self.record(ClientCall::CreateTable {
            table: table.clone(),
        })?;
        self.inner.create_table(table).await
    }

    async fn update_table(&self, table: TableResource) -> ClientResult<TableResource> {
        self.record(ClientCall::UpdateTable {
            table: table.clone(),
        })?;
        self.inner.update_table(table).await
    }

    async fn delete_table(&self, address: &ResourceAddress) -> ClientResult<bool> {
        self.record(ClientCall::DeleteTable {
            address: address.clone(),
        })?;
        self.inner.delete_table(address).await
    }

    async fn get_iam_policy(&self, address: &ResourceAddress) -> ClientResult<AccessPolicy> {
        self.record(ClientCall::GetIamPolicy {
            address: address.clone(),
        })?;
        self.inner.get_iam_policy(address).await
    }

    async fn set_iam_policy(
        &self,
        address: &ResourceAddress,
        policy: AccessPolicy,
    ) -> ClientResult<AccessPolicy> {
        self.record(ClientCall::SetIamPolicy {
            address: address.clone(),
            policy: policy.clone(),
        })?;
        self.inner.set_iam_policy(address, policy).await
    }
}

#[async_trait]
impl ProjectRegistry for RecordingResourceClient {
    async fn get_project(&self, project_id: &str) -> ClientResult<Project> {
        self.record(ClientCall::GetProject {
            project_id: project_id.to_string(),
        })?;
        self.inner.get_project(project_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_calls_in_order() {
        let client = RecordingResourceClient::new();
        let dataset = DatasetAddress::new("acme", "sales");

        client.create_dataset(&dataset).await.unwrap();
        client.get_dataset(&dataset).await.unwrap();

        assert_eq!(
            client.call_kinds(),
            vec![CallKind::CreateDataset, CallKind::GetDataset]
        );
        client.clear_operations();
        assert!(client.operations().is_empty());
    }

    #[tokio::test]
    async fn injected_failures_are_recorded_and_clearable() {
        let client = RecordingResourceClient::new();
        let address = ResourceAddress::new("acme", "sales", "orders");
        client.inject_failure(CallKind::GetTable, InjectedFailure::Unavailable);

        let err = client.get_table(&address).await.unwrap_err();
        assert!(matches!(err, ClientError::Api { status: 503, .. }));
        assert_eq!(client.call_kinds(), vec![CallKind::GetTable]);

        client.clear_failures();
        assert!(client.get_table(&address).await.unwrap().is_none());
    }
}
