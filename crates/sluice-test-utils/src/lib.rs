//! Shared test utilities for Sluice integration tests.
//!
//! This crate provides:
//! - [`RecordingResourceClient`]: In-memory warehouse with call recording and failure injection
//! - [`TestContext`]: Pre-configured warehouse, project and provisioner
//! - Factory functions for descriptors and owners
//! - Custom assertion helpers
//!
//! # Example
//!
//! ```rust,ignore
//! use sluice_test_utils::{TestContext, DescriptorFactory, assert_validation_failure};
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let ctx = TestContext::new();
//!     let table = DescriptorFactory::table(&ctx.project, "sales", "orders", &[("id", "INT64")]);
//!     // ... run test ...
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
// Test utilities use expect/unwrap for cleaner test code - panics are acceptable in tests
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod assertions;
pub mod client;
pub mod fixtures;

pub use assertions::*;
pub use client::*;
pub use fixtures::*;

/// Initialize test logging (call once per test module).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("sluice_provision=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}
