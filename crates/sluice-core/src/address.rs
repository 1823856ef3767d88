//! Addresses of live warehouse resources.
//!
//! A table or view is identified by its `(project, dataset, name)` triple.
//! Equality is structural: two addresses naming the same triple refer to the
//! same live resource.
//!
//! # Example
//!
//! ```rust
//! use sluice_core::address::ResourceAddress;
//!
//! let address = ResourceAddress::new("acme-analytics", "sales", "orders");
//! assert_eq!(address.to_string(), "acme-analytics.sales.orders");
//! assert_eq!(address.dataset_address().to_string(), "acme-analytics.sales");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Address of a dataset: `(project, dataset)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DatasetAddress {
    /// Owning project ID.
    pub project: String,
    /// Dataset name within the project.
    pub dataset: String,
}

impl DatasetAddress {
    /// Creates a new dataset address.
    #[must_use]
    pub fn new(project: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
        }
    }
}

impl fmt::Display for DatasetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.project, self.dataset)
    }
}

/// Address of a table or view: `(project, dataset, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceAddress {
    /// Owning project ID.
    pub project: String,
    /// Dataset containing the resource.
    pub dataset: String,
    /// Table or view name.
    pub name: String,
}

impl ResourceAddress {
    /// Creates a new resource address.
    #[must_use]
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
            name: name.into(),
        }
    }

    /// Returns the address of the dataset holding this resource.
    #[must_use]
    pub fn dataset_address(&self) -> DatasetAddress {
        DatasetAddress::new(self.project.clone(), self.dataset.clone())
    }

    /// Returns the identifier quoted for use in a standard-SQL `FROM` clause.
    #[must_use]
    pub fn sql_identifier(&self) -> String {
        format!("`{self}`")
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.name)
    }
}
