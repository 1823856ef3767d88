//! Typed resource descriptors.
//!
//! Descriptors are produced by an external parser from the caller's
//! declarative specification. This module only defines their shape and a
//! structural sanity check.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::address::ResourceAddress;
use crate::identity::Subject;
use crate::operation::{FailedOperation, OperationResult, Problem};
use crate::policy::Role;
use crate::schema::ColumnSpec;

/// Kind of resource a descriptor provisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A physical table (storage area).
    StorageTable,
    /// A view over a storage table (output port).
    OutputView,
}

impl ResourceKind {
    /// Returns the kind as a static label for logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::StorageTable => "storage_table",
            Self::OutputView => "output_view",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owners of the data product a component belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ownership {
    /// Data product owner, usually a `user:` subject.
    pub data_product_owner: Subject,
    /// Development group, usually a `group:` subject.
    pub dev_group: Subject,
}

impl Ownership {
    /// Returns the owner subject set.
    #[must_use]
    pub fn subjects(&self) -> BTreeSet<Subject> {
        [self.data_product_owner.clone(), self.dev_group.clone()]
            .into_iter()
            .collect()
    }
}

/// Specification of a storage table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDescriptor {
    /// Component identifier in the caller's model.
    pub id: String,
    /// Project hosting the table.
    pub project: String,
    /// Dataset hosting the table.
    pub dataset: String,
    /// Table name.
    pub table_name: String,
    /// Roles granted to the owners on provision and revoked on unprovision.
    pub owner_roles: Vec<String>,
    /// Declared table schema.
    pub schema: Vec<ColumnSpec>,
}

impl TableDescriptor {
    /// Address of the table.
    #[must_use]
    pub fn address(&self) -> ResourceAddress {
        ResourceAddress::new(&self.project, &self.dataset, &self.table_name)
    }

    /// Owner roles as typed roles.
    #[must_use]
    pub fn roles(&self) -> Vec<Role> {
        self.owner_roles.iter().cloned().map(Role::from).collect()
    }

    /// Checks required fields and column-name uniqueness.
    ///
    /// # Errors
    ///
    /// Returns an invalid-request failure listing every problem found.
    pub fn validate_shape(&self) -> OperationResult<()> {
        let mut problems = Vec::new();
        require_non_blank(&mut problems, "project", &self.project);
        require_non_blank(&mut problems, "dataset", &self.dataset);
        require_non_blank(&mut problems, "tableName", &self.table_name);
        require_unique_columns(&mut problems, &self.schema);
        finish(&self.id, problems)
    }
}

/// Specification of a view exposed over a storage table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewDescriptor {
    /// Component identifier in the caller's model.
    pub id: String,
    /// Project hosting both the source table and the view.
    pub project: String,
    /// Dataset hosting both the source table and the view.
    pub dataset: String,
    /// Source table name.
    pub table_name: String,
    /// View name.
    pub view_name: String,
    /// View description.
    #[serde(default)]
    pub description: Option<String>,
    /// Declared view columns. Empty means every source column.
    #[serde(default)]
    pub schema: Vec<ColumnSpec>,
}

impl ViewDescriptor {
    /// Address of the view.
    #[must_use]
    pub fn address(&self) -> ResourceAddress {
        ResourceAddress::new(&self.project, &self.dataset, &self.view_name)
    }

    /// Address of the source table.
    #[must_use]
    pub fn source_address(&self) -> ResourceAddress {
        ResourceAddress::new(&self.project, &self.dataset, &self.table_name)
    }

    /// Checks required fields and column-name uniqueness.
    ///
    /// # Errors
    ///
    /// Returns an invalid-request failure listing every problem found.
    pub fn validate_shape(&self) -> OperationResult<()> {
        let mut problems = Vec::new();
        require_non_blank(&mut problems, "project", &self.project);
        require_non_blank(&mut problems, "dataset", &self.dataset);
        require_non_blank(&mut problems, "tableName", &self.table_name);
        require_non_blank(&mut problems, "viewName", &self.view_name);
        require_unique_columns(&mut problems, &self.schema);
        finish(&self.id, problems)
    }
}

/// A component to operate on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Component {
    /// A storage table.
    StorageTable(TableDescriptor),
    /// An output view.
    OutputView(ViewDescriptor),
}

impl Component {
    /// Kind of this component.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        match self {
            Self::StorageTable(_) => ResourceKind::StorageTable,
            Self::OutputView(_) => ResourceKind::OutputView,
        }
    }

    /// Address of the resource this component provisions.
    #[must_use]
    pub fn address(&self) -> ResourceAddress {
        match self {
            Self::StorageTable(table) => table.address(),
            Self::OutputView(view) => view.address(),
        }
    }

    /// Component identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::StorageTable(table) => &table.id,
            Self::OutputView(view) => &view.id,
        }
    }

    /// Structural check of the descriptor.
    ///
    /// # Errors
    ///
    /// Returns an invalid-request failure listing every problem found.
    pub fn validate_shape(&self) -> OperationResult<()> {
        match self {
            Self::StorageTable(table) => table.validate_shape(),
            Self::OutputView(view) => view.validate_shape(),
        }
    }
}

fn require_non_blank(problems: &mut Vec<Problem>, field: &str, value: &str) {
    if value.trim().is_empty() {
        problems.push(Problem::new(format!("Field '{field}' must not be blank")));
    }
}

fn require_unique_columns(problems: &mut Vec<Problem>, columns: &[ColumnSpec]) {
    let mut seen = BTreeSet::new();
    for column in columns {
        if column.name.trim().is_empty() {
            problems.push(Problem::new("Column names must not be blank"));
        } else if !seen.insert(column.name.as_str()) {
            problems.push(Problem::new(format!(
                "Column '{}' is declared more than once",
                column.name
            )));
        }
    }
}

fn finish(id: &str, problems: Vec<Problem>) -> OperationResult<()> {
    if problems.is_empty() {
        Ok(())
    } else {
        Err(FailedOperation::invalid_request(
            format!("Invalid descriptor for component {id}"),
            problems,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::FailureKind;

    fn table() -> TableDescriptor {
        TableDescriptor {
            id: "urn:dp:orders:storage".into(),
            project: "acme".into(),
            dataset: "sales".into(),
            table_name: "orders".into(),
            owner_roles: vec!["roles/bigquery.dataOwner".into()],
            schema: vec![ColumnSpec::new("id", "INT64")],
        }
    }

    #[test]
    fn well_formed_table_passes() {
        assert!(table().validate_shape().is_ok());
    }

    #[test]
    fn reports_every_shape_problem() {
        let mut bad = table();
        bad.project = " ".into();
        bad.schema.push(ColumnSpec::new("id", "STRING"));
        let failure = bad.validate_shape().unwrap_err();
        assert_eq!(failure.kind, FailureKind::InvalidRequest);
        assert_eq!(
            failure.descriptions(),
            vec![
                "Field 'project' must not be blank",
                "Column 'id' is declared more than once"
            ]
        );
    }

    #[test]
    fn view_addresses_point_at_source_and_view() {
        let view = ViewDescriptor {
            id: "op".into(),
            project: "p".into(),
            dataset: "d".into(),
            table_name: "t".into(),
            view_name: "v".into(),
            description: None,
            schema: vec![],
        };
        assert_eq!(view.address().to_string(), "p.d.v");
        assert_eq!(view.source_address().to_string(), "p.d.t");
    }

    #[test]
    fn component_deserializes_tagged() {
        let component: Component = serde_json::from_str(
            r#"{"kind":"output_view","id":"op","project":"p","dataset":"d","tableName":"t","viewName":"v"}"#,
        )
        .unwrap();
        assert_eq!(component.kind(), ResourceKind::OutputView);
        assert_eq!(component.address().to_string(), "p.d.v");
    }

    #[test]
    fn ownership_subjects_deduplicate() {
        let ownership = Ownership {
            data_product_owner: Subject::new("group:team"),
            dev_group: Subject::new("group:team"),
        };
        assert_eq!(ownership.subjects().len(), 1);
    }
}
