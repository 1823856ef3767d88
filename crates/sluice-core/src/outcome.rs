//! Display-only description of a provisioned resource.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One public attribute of a provisioned resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoField {
    /// Attribute type; always `string` today.
    #[serde(rename = "type")]
    pub field_type: String,
    /// Human-readable label.
    pub label: String,
    /// Displayed value.
    pub value: String,
    /// Link target, for link attributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

impl InfoField {
    /// Creates a plain string attribute.
    #[must_use]
    pub fn string(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field_type: "string".to_string(),
            label: label.into(),
            value: value.into(),
            href: None,
        }
    }

    /// Creates a link attribute.
    #[must_use]
    pub fn link(label: impl Into<String>, value: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            href: Some(href.into()),
            ..Self::string(label, value)
        }
    }
}

/// Result of a successful provisioning call.
///
/// Used for display only; nothing reconciles against it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionResult {
    /// Public attributes keyed by attribute name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub public_info: BTreeMap<String, InfoField>,
}

impl ProvisionResult {
    /// A result with no attributes.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, field: InfoField) -> Self {
        self.public_info.insert(key.into(), field);
        self
    }

    /// Returns an attribute by name.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&InfoField> {
        self.public_info.get(key)
    }
}
