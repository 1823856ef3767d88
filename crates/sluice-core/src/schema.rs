//! Column declarations and live table schemas.
//!
//! [`ColumnSpec`] is the declarative form read from a resource descriptor.
//! [`SchemaSnapshot`] is the schema observed on (or written to) a live table
//! or view. Compatibility checks compare the two by column name only.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Declared column of a table or view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    /// Column name, unique within a schema.
    pub name: String,
    /// Standard-SQL type name (e.g. `STRING`, `INT64`).
    pub data_type: String,
    /// Optional column description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Maximum length for `STRING`/`BYTES` columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_length: Option<u32>,
    /// Scale for `NUMERIC`/`BIGNUMERIC` columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    /// Precision for `NUMERIC`/`BIGNUMERIC` columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    /// Column mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<ColumnMode>,
}

impl ColumnSpec {
    /// Creates a column with only a name and a type.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            description: None,
            data_length: None,
            scale: None,
            precision: None,
            constraint: None,
        }
    }

    /// Sets the column description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the column mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: ColumnMode) -> Self {
        self.constraint = Some(mode);
        self
    }
}

/// Column mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnMode {
    /// Column may hold nulls.
    Nullable,
    /// Column must hold a value.
    Required,
    /// Column holds an array.
    Repeated,
}

impl ColumnMode {
    /// Returns the wire name of this mode.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Nullable => "NULLABLE",
            Self::Required => "REQUIRED",
            Self::Repeated => "REPEATED",
        }
    }
}

/// Standard-SQL column types understood by the warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StandardSqlType {
    /// 64-bit signed integer.
    Int64,
    /// 64-bit float.
    Float64,
    /// Fixed-precision decimal.
    Numeric,
    /// Wide fixed-precision decimal.
    Bignumeric,
    /// Boolean.
    Bool,
    /// Unicode string.
    String,
    /// Byte string.
    Bytes,
    /// Calendar date.
    Date,
    /// Civil date and time.
    Datetime,
    /// Time of day.
    Time,
    /// Absolute point in time.
    Timestamp,
    /// Geography value.
    Geography,
    /// JSON document.
    Json,
    /// Time interval.
    Interval,
    /// Nested record.
    Struct,
    /// Ordered list.
    Array,
    /// Range of values.
    Range,
}

impl StandardSqlType {
    /// Returns the canonical type name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Int64 => "INT64",
            Self::Float64 => "FLOAT64",
            Self::Numeric => "NUMERIC",
            Self::Bignumeric => "BIGNUMERIC",
            Self::Bool => "BOOL",
            Self::String => "STRING",
            Self::Bytes => "BYTES",
            Self::Date => "DATE",
            Self::Datetime => "DATETIME",
            Self::Time => "TIME",
            Self::Timestamp => "TIMESTAMP",
            Self::Geography => "GEOGRAPHY",
            Self::Json => "JSON",
            Self::Interval => "INTERVAL",
            Self::Struct => "STRUCT",
            Self::Array => "ARRAY",
            Self::Range => "RANGE",
        }
    }
}

impl fmt::Display for StandardSqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StandardSqlType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = match s {
            "INT64" => Self::Int64,
            "FLOAT64" => Self::Float64,
            "NUMERIC" => Self::Numeric,
            "BIGNUMERIC" => Self::Bignumeric,
            "BOOL" => Self::Bool,
            "STRING" => Self::String,
            "BYTES" => Self::Bytes,
            "DATE" => Self::Date,
            "DATETIME" => Self::Datetime,
            "TIME" => Self::Time,
            "TIMESTAMP" => Self::Timestamp,
            "GEOGRAPHY" => Self::Geography,
            "JSON" => Self::Json,
            "INTERVAL" => Self::Interval,
            "STRUCT" => Self::Struct,
            "ARRAY" => Self::Array,
            "RANGE" => Self::Range,
            other => {
                return Err(SchemaError::UnknownType {
                    data_type: other.to_string(),
                });
            }
        };
        Ok(parsed)
    }
}

/// Errors raised while turning declared columns into a live schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The declared type is not a standard-SQL type name.
    #[error("unknown data type '{data_type}'")]
    UnknownType {
        /// The rejected type name.
        data_type: String,
    },

    /// A column declaration is invalid.
    #[error("column '{column}': {source}")]
    InvalidColumn {
        /// The offending column.
        column: String,
        /// What was wrong with it.
        #[source]
        source: Box<SchemaError>,
    },
}

/// A column of a live schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableField {
    /// Column name.
    pub name: String,
    /// Column type.
    pub field_type: StandardSqlType,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Maximum length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    /// Scale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    /// Precision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    /// Mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ColumnMode>,
}

impl TableField {
    /// Creates a field with only a name and a type.
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: StandardSqlType) -> Self {
        Self {
            name: name.into(),
            field_type,
            description: None,
            max_length: None,
            scale: None,
            precision: None,
            mode: None,
        }
    }

    /// Converts a declared column into a live field.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidColumn`] if the declared type is unknown.
    pub fn from_column(column: &ColumnSpec) -> Result<Self, SchemaError> {
        let field_type =
            column
                .data_type
                .parse::<StandardSqlType>()
                .map_err(|e| SchemaError::InvalidColumn {
                    column: column.name.clone(),
                    source: Box::new(e),
                })?;
        Ok(Self {
            name: column.name.clone(),
            field_type,
            description: column.description.clone(),
            max_length: column.data_length,
            scale: column.scale,
            precision: column.precision,
            mode: column.constraint,
        })
    }
}

/// Ordered set of columns observed on, or written to, a live resource.
///
/// Order is preserved for display and writes; compatibility checks use
/// [`column_names`](Self::column_names) and ignore order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    /// Fields in declaration order.
    pub fields: Vec<TableField>,
}

impl SchemaSnapshot {
    /// Creates a snapshot from live fields.
    #[must_use]
    pub const fn new(fields: Vec<TableField>) -> Self {
        Self { fields }
    }

    /// Builds the schema that a set of declared columns describes.
    ///
    /// # Errors
    ///
    /// Returns the first column whose type cannot be mapped.
    pub fn from_columns(columns: &[ColumnSpec]) -> Result<Self, SchemaError> {
        columns
            .iter()
            .map(TableField::from_column)
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }

    /// Returns the set of column names.
    #[must_use]
    pub fn column_names(&self) -> BTreeSet<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Returns true if the schema has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_standard_sql_type_names() {
        assert_eq!("STRING".parse::<StandardSqlType>(), Ok(StandardSqlType::String));
        assert_eq!("INT64".parse::<StandardSqlType>(), Ok(StandardSqlType::Int64));
        assert_eq!(StandardSqlType::Bignumeric.to_string(), "BIGNUMERIC");
    }

    #[test]
    fn type_names_are_case_sensitive() {
        assert!("string".parse::<StandardSqlType>().is_err());
        assert!("VARCHAR".parse::<StandardSqlType>().is_err());
    }

    #[test]
    fn from_column_copies_declared_attributes() {
        let mut column = ColumnSpec::new("amount", "NUMERIC")
            .with_description("order total")
            .with_mode(ColumnMode::Required);
        column.precision = Some(10);
        column.scale = Some(2);

        let field = TableField::from_column(&column).unwrap();
        assert_eq!(field.field_type, StandardSqlType::Numeric);
        assert_eq!(field.description.as_deref(), Some("order total"));
        assert_eq!(field.precision, Some(10));
        assert_eq!(field.scale, Some(2));
        assert_eq!(field.mode, Some(ColumnMode::Required));
    }

    #[test]
    fn from_columns_reports_offending_column() {
        let columns = vec![ColumnSpec::new("id", "INT64"), ColumnSpec::new("x", "BLOB")];
        let err = SchemaSnapshot::from_columns(&columns).unwrap_err();
        assert_eq!(err.to_string(), "column 'x': unknown data type 'BLOB'");
    }

    #[test]
    fn column_names_ignore_order() {
        let a = SchemaSnapshot::new(vec![
            TableField::new("b", StandardSqlType::String),
            TableField::new("a", StandardSqlType::Bool),
        ]);
        let b = SchemaSnapshot::new(vec![
            TableField::new("a", StandardSqlType::Bool),
            TableField::new("b", StandardSqlType::String),
        ]);
        assert_eq!(a.column_names(), b.column_names());
    }

    #[test]
    fn column_spec_deserializes_camel_case() {
        let column: ColumnSpec = serde_json::from_str(
            r#"{"name":"id","dataType":"INT64","dataLength":12,"constraint":"REQUIRED"}"#,
        )
        .unwrap();
        assert_eq!(column.data_type, "INT64");
        assert_eq!(column.data_length, Some(12));
        assert_eq!(column.constraint, Some(ColumnMode::Required));
    }
}
