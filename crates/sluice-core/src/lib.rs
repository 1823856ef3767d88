//! # sluice-core
//!
//! Shared primitives for the Sluice warehouse provisioner.
//!
//! This crate provides the types and contracts every other Sluice crate builds on:
//!
//! - **Addresses**: `(project, dataset, name)` identification of live resources
//! - **Schemas**: declared columns and live schema snapshots
//! - **Identities**: platform subjects and resolved cloud principals
//! - **Access Policies**: role to identity bindings
//! - **Outcomes**: `OperationResult`, `FailedOperation` and `ProvisionResult`
//! - **Client Traits**: the warehouse and project-registry APIs, plus an in-memory client
//!
//! ## Crate Boundary
//!
//! `sluice-core` owns no pipeline logic. Validation and provisioning live in
//! `sluice-provision`; cloud clients are injected through the
//! [`ResourceClient`](client::ResourceClient) and
//! [`ProjectRegistry`](client::ProjectRegistry) traits.
//!
//! ## Example
//!
//! ```rust
//! use sluice_core::prelude::*;
//!
//! let address = ResourceAddress::new("acme", "sales", "orders");
//! let failure = FailedOperation::validation(format!(
//!     "The specified source table {address} doesn't exist"
//! ));
//! assert_eq!(failure.message, VALIDATION_ERROR_MESSAGE);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod address;
pub mod client;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod identity;
pub mod memory;
pub mod observability;
pub mod operation;
pub mod outcome;
pub mod policy;
pub mod schema;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use sluice_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::address::{DatasetAddress, ResourceAddress};
    pub use crate::client::{
        ClientError, ClientResult, Dataset, Project, ProjectRegistry, ResourceClient,
        TableDefinition, TableResource,
    };
    pub use crate::config::ProvisionerConfig;
    pub use crate::descriptor::{Component, Ownership, ResourceKind, TableDescriptor, ViewDescriptor};
    pub use crate::error::{Error, Result};
    pub use crate::identity::{Identity, Subject};
    pub use crate::memory::MemoryResourceClient;
    pub use crate::observability::LogFormat;
    pub use crate::operation::{
        FailedOperation, FailureKind, OperationResult, Problem, Remediation,
        UNEXPECTED_ERROR_MESSAGE, VALIDATION_ERROR_MESSAGE,
    };
    pub use crate::outcome::{InfoField, ProvisionResult};
    pub use crate::policy::{AccessPolicy, Role};
    pub use crate::schema::{ColumnMode, ColumnSpec, SchemaSnapshot, StandardSqlType, TableField};
}

pub use error::{Error, Result};
