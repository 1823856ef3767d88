//! Access policies: role to identity bindings on a single resource.
//!
//! A policy is always read live from the warehouse, modified in memory and
//! written back whole. Nothing here is cached across calls.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::identity::Identity;

/// Role identifier, e.g. `roles/bigquery.dataViewer`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    /// Wraps a role identifier.
    #[must_use]
    pub fn new(role: impl Into<String>) -> Self {
        Self(role.into())
    }

    /// Returns the role as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Live IAM state of one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    bindings: BTreeMap<Role, BTreeSet<Identity>>,
}

impl AccessPolicy {
    /// Creates an empty policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a policy from existing bindings.
    #[must_use]
    pub fn from_bindings(bindings: BTreeMap<Role, BTreeSet<Identity>>) -> Self {
        let mut policy = Self { bindings };
        policy.bindings.retain(|_, members| !members.is_empty());
        policy
    }

    /// Adds `identity` under `role`. Returns false if the binding already existed.
    pub fn add(&mut self, role: Role, identity: Identity) -> bool {
        self.bindings.entry(role).or_default().insert(identity)
    }

    /// Drops every identity bound to `role`.
    ///
    /// Returns the identities that were removed, if the role was bound.
    pub fn remove_role(&mut self, role: &Role) -> Option<BTreeSet<Identity>> {
        self.bindings.remove(role)
    }

    /// Returns the identities bound to `role`.
    #[must_use]
    pub fn members(&self, role: &Role) -> Option<&BTreeSet<Identity>> {
        self.bindings.get(role)
    }

    /// Returns true if `identity` is bound to `role`.
    #[must_use]
    pub fn has_binding(&self, role: &Role, identity: &Identity) -> bool {
        self.bindings
            .get(role)
            .is_some_and(|members| members.contains(identity))
    }

    /// Returns all bindings.
    #[must_use]
    pub const fn bindings(&self) -> &BTreeMap<Role, BTreeSet<Identity>> {
        &self.bindings
    }

    /// Returns true if the policy has no bindings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_idempotent() {
        let mut policy = AccessPolicy::new();
        let role = Role::new("roles/bigquery.dataViewer");
        assert!(policy.add(role.clone(), Identity::user("a@x.com")));
        assert!(!policy.add(role.clone(), Identity::user("a@x.com")));
        assert_eq!(policy.members(&role).map(BTreeSet::len), Some(1));
    }

    #[test]
    fn remove_role_drops_all_members() {
        let mut policy = AccessPolicy::new();
        let viewer = Role::new("roles/bigquery.dataViewer");
        let owner = Role::new("roles/bigquery.dataOwner");
        policy.add(viewer.clone(), Identity::user("a@x.com"));
        policy.add(viewer.clone(), Identity::group("g@x.com"));
        policy.add(owner.clone(), Identity::user("a@x.com"));

        let removed = policy.remove_role(&viewer).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(policy.members(&viewer).is_none());
        assert!(policy.has_binding(&owner, &Identity::user("a@x.com")));
    }

    #[test]
    fn from_bindings_drops_empty_roles() {
        let mut bindings = BTreeMap::new();
        bindings.insert(Role::new("roles/empty"), BTreeSet::new());
        let policy = AccessPolicy::from_bindings(bindings);
        assert!(policy.is_empty());
    }
}
