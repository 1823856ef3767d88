//! Provisioner configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::observability::LogFormat;

/// Default role granted on views to readers.
pub const DEFAULT_VIEW_READ_ROLE: &str = "roles/bigquery.dataViewer";

/// Default console base URL used for resource links.
pub const DEFAULT_CONSOLE_BASE_URL: &str = "https://console.cloud.google.com/bigquery";

/// Configuration for the provisioner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionerConfig {
    /// Suffix appended to group names to build group addresses, e.g. `@acme.com`.
    pub group_mail_domain: String,

    /// Role granted to readers of output views.
    #[serde(default = "default_view_read_role")]
    pub view_read_role: String,

    /// Console base URL for resource links.
    #[serde(default = "default_console_base_url")]
    pub console_base_url: String,

    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_view_read_role() -> String {
    DEFAULT_VIEW_READ_ROLE.to_string()
}

fn default_console_base_url() -> String {
    DEFAULT_CONSOLE_BASE_URL.to_string()
}

impl ProvisionerConfig {
    /// Creates a configuration with defaults and the given group mail domain.
    #[must_use]
    pub fn new(group_mail_domain: impl Into<String>) -> Self {
        Self {
            group_mail_domain: group_mail_domain.into(),
            view_read_role: default_view_read_role(),
            console_base_url: default_console_base_url(),
            log_format: LogFormat::default(),
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SLUICE_GROUP_MAIL_DOMAIN` (required, e.g. `@acme.com`)
    /// - `SLUICE_VIEW_READ_ROLE` (default: `roles/bigquery.dataViewer`)
    /// - `SLUICE_CONSOLE_BASE_URL` (default: `https://console.cloud.google.com/bigquery`)
    /// - `SLUICE_LOG_FORMAT` (`json` or `pretty`, default: `pretty`)
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value is invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value is invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| {
            lookup(name).and_then(|v| {
                let trimmed = v.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
        };

        let group_mail_domain = var("SLUICE_GROUP_MAIL_DOMAIN").ok_or_else(|| {
            Error::configuration("SLUICE_GROUP_MAIL_DOMAIN is required (e.g. @acme.com)")
        })?;
        let mut config = Self::new(group_mail_domain);

        if let Some(role) = var("SLUICE_VIEW_READ_ROLE") {
            config.view_read_role = role;
        }
        if let Some(url) = var("SLUICE_CONSOLE_BASE_URL") {
            config.console_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(format) = var("SLUICE_LOG_FORMAT") {
            config.log_format = format.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates field values.
    ///
    /// # Errors
    ///
    /// Returns an error if the mail domain or the read role is malformed.
    pub fn validate(&self) -> Result<()> {
        if self.group_mail_domain.len() < 2 || !self.group_mail_domain.starts_with('@') {
            return Err(Error::configuration(format!(
                "SLUICE_GROUP_MAIL_DOMAIN must start with '@' and name a domain (got '{}')",
                self.group_mail_domain
            )));
        }
        if !self.view_read_role.starts_with("roles/") {
            return Err(Error::configuration(format!(
                "SLUICE_VIEW_READ_ROLE must start with 'roles/' (got '{}')",
                self.view_read_role
            )));
        }
        Ok(())
    }
}
