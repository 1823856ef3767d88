//! Column-name compatibility checks between declared and live schemas.
//!
//! Only names are compared. Type mismatches surface later, when the
//! warehouse rejects the view or table definition.

use std::collections::BTreeSet;

use sluice_core::schema::{ColumnSpec, SchemaSnapshot};

/// Returns true iff every declared view column exists in the source schema.
///
/// An empty declaration means "select all" and is handled by the caller
/// before this check; on its own it is trivially compatible.
#[must_use]
pub fn view_compatible(source: &SchemaSnapshot, view_columns: &[ColumnSpec]) -> bool {
    let available = source.column_names();
    declared_names(view_columns).is_subset(&available)
}

/// Returns true iff every column of the live table is among the declared columns.
///
/// The live schema must not carry columns beyond the declaration. Declared
/// columns missing from the live table are allowed and get added on the next
/// full schema replace.
#[must_use]
pub fn table_compatible(actual: &SchemaSnapshot, required: &[ColumnSpec]) -> bool {
    let declared = declared_names(required);
    actual.column_names().is_subset(&declared)
}

fn declared_names(columns: &[ColumnSpec]) -> BTreeSet<&str> {
    columns.iter().map(|c| c.name.as_str()).collect()
}
