//! # sluice-provision
//!
//! Validation and provisioning pipelines for warehouse datasets, tables and views.
//!
//! This crate composes fallible cloud calls into short-circuiting pipelines:
//!
//! - **Schema Compatibility**: name-level checks between declared and live schemas
//! - **Resource Manager**: dataset, table and view lifecycle
//! - **Access Control**: read-modify-write reconciliation of role bindings
//! - **Identity Resolution**: platform subjects to cloud identities
//! - **Validation**: read-only preconditions per resource kind
//! - **Provisioning**: create/update, grant, revoke and teardown per resource kind
//!
//! The [`Provisioner`] facade exposes the four external operations:
//! `validate`, `provision`, `unprovision` and `update_access`.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use sluice_core::prelude::*;
//! use sluice_provision::Provisioner;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let warehouse = Arc::new(MemoryResourceClient::new());
//! warehouse.add_project("acme").unwrap();
//! let provisioner = Provisioner::new(
//!     warehouse.clone(),
//!     warehouse,
//!     ProvisionerConfig::new("@acme.com"),
//! )
//! .unwrap();
//!
//! let table = Component::StorageTable(TableDescriptor {
//!     id: "urn:dp:sales:orders".into(),
//!     project: "acme".into(),
//!     dataset: "sales".into(),
//!     table_name: "orders".into(),
//!     owner_roles: vec!["roles/bigquery.dataEditor".into()],
//!     schema: vec![ColumnSpec::new("id", "INT64")],
//! });
//! let owners = Ownership {
//!     data_product_owner: Subject::new("user:jane_acme.com"),
//!     dev_group: Subject::new("group:sales-dev"),
//! };
//!
//! provisioner.validate(&table).await.unwrap();
//! let result = provisioner.provision(&table, &owners).await.unwrap();
//! assert_eq!(result.get("table").unwrap().value, "orders");
//! # }
//! ```
//!
//! ## Features
//!
//! - `gcp`: [`bigquery::BigQueryRestClient`], a REST client for BigQuery and
//!   Resource Manager authenticated with `gcp_auth`

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod access;
pub mod bigquery;
pub mod identity;
pub mod metrics;
pub mod projects;
pub mod provision;
pub mod resource_manager;
pub mod schema_compat;
pub mod service;
pub mod validation;

pub use access::AccessControlManager;
pub use identity::{DirectoryIdentityResolver, IdentityResolver};
pub use projects::ProjectLookup;
pub use provision::{TableProvisioner, ViewProvisioner};
pub use resource_manager::{ResourceManager, ViewRequest};
pub use service::Provisioner;
pub use validation::{TableValidator, ViewValidator};
