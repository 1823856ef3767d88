//! Platform subjects and resolved cloud identities.
//!
//! A [`Subject`] is the opaque reference a caller supplies (`user:jane_acme.com`,
//! `group:analysts`). Resolving it yields an [`Identity`] usable in an access
//! policy binding.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unresolved, platform-level reference to a user or group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subject(String);

impl Subject {
    /// Prefix of user subjects.
    pub const USER_PREFIX: &'static str = "user:";
    /// Prefix of group subjects.
    pub const GROUP_PREFIX: &'static str = "group:";

    /// Wraps a subject string.
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self(subject.into())
    }

    /// Returns the subject as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Subject {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Subject {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Cloud-native principal that can appear in an access policy binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Identity {
    /// A user, identified by email address.
    User(String),
    /// A group, identified by group email address.
    Group(String),
    /// Any other member kind found on a live policy (service accounts,
    /// domains, special groups). Kept verbatim so read-modify-write cycles
    /// do not drop it.
    Other(String),
}

impl Identity {
    /// Creates a user identity.
    #[must_use]
    pub fn user(email: impl Into<String>) -> Self {
        Self::User(email.into())
    }

    /// Creates a group identity.
    #[must_use]
    pub fn group(email: impl Into<String>) -> Self {
        Self::Group(email.into())
    }

    /// Parses a policy member string such as `user:jane@acme.com`.
    #[must_use]
    pub fn from_member(member: &str) -> Self {
        if let Some(email) = member.strip_prefix("user:") {
            Self::User(email.to_string())
        } else if let Some(email) = member.strip_prefix("group:") {
            Self::Group(email.to_string())
        } else {
            Self::Other(member.to_string())
        }
    }

    /// Returns the policy member string for this identity.
    #[must_use]
    pub fn member(&self) -> String {
        match self {
            Self::User(email) => format!("user:{email}"),
            Self::Group(email) => format!("group:{email}"),
            Self::Other(member) => member.clone(),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.member())
    }
}

impl From<Identity> for String {
    fn from(value: Identity) -> Self {
        value.member()
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Self::from_member(&value)
    }
}
