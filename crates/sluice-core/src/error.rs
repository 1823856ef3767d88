//! Error types and result aliases for Sluice infrastructure.
//!
//! These errors cover configuration and input problems raised while wiring the
//! provisioner together. Outcomes of provisioning operations themselves are
//! reported as [`FailedOperation`](crate::operation::FailedOperation) values.

/// The result type used for Sluice infrastructure code.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or wiring Sluice components.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration was missing or malformed.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },
}

impl Error {
    /// Creates a new configuration error with the given message.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_renders_message() {
        let err = Error::configuration("SLUICE_GROUP_MAIL_DOMAIN is required");
        assert_eq!(
            err.to_string(),
            "configuration error: SLUICE_GROUP_MAIL_DOMAIN is required"
        );
    }

    #[test]
    fn invalid_input_renders_message() {
        let err = Error::InvalidInput("bad".into());
        assert_eq!(err.to_string(), "invalid input: bad");
    }
}
