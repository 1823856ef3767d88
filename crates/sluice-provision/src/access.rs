//! Access-policy reconciliation on tables and views.
//!
//! Both operations are read-modify-write over the live policy with no
//! concurrency token. Concurrent writers on the same resource can overwrite
//! each other; callers that need stronger guarantees must serialize per
//! resource.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use sluice_core::address::ResourceAddress;
use sluice_core::client::ResourceClient;
use sluice_core::identity::Identity;
use sluice_core::operation::OperationResult;
use sluice_core::policy::Role;

use crate::resource_manager::call_failed;

/// Grants and revokes role bindings.
#[derive(Clone)]
pub struct AccessControlManager {
    client: Arc<dyn ResourceClient>,
}

impl fmt::Debug for AccessControlManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessControlManager")
            .field("client", &"<ResourceClient>")
            .finish()
    }
}

impl AccessControlManager {
    /// Creates a manager over the given client.
    #[must_use]
    pub fn new(client: Arc<dyn ResourceClient>) -> Self {
        Self { client }
    }

    /// Binds every identity to every role on `resource`.
    ///
    /// Existing bindings are kept; re-granting a binding is a no-op. The
    /// policy is written back in a single call.
    ///
    /// # Errors
    ///
    /// Returns an operation failure if reading or writing the policy fails.
    pub async fn grant(
        &self,
        roles: &[Role],
        identities: &BTreeSet<Identity>,
        resource: &ResourceAddress,
    ) -> OperationResult<()> {
        const ACTION: &str = "set up access for";

        tracing::info!(
            resource = %resource,
            roles = ?roles,
            identities = ?identities,
            "granting roles"
        );
        let mut policy = self
            .client
            .get_iam_policy(resource)
            .await
            .map_err(|e| call_failed("tables.getIamPolicy", ACTION, resource, &e))?;

        let mut added = 0_usize;
        for role in roles {
            for identity in identities {
                if policy.add(role.clone(), identity.clone()) {
                    added += 1;
                }
            }
        }

        self.client
            .set_iam_policy(resource, policy)
            .await
            .map_err(|e| call_failed("tables.setIamPolicy", ACTION, resource, &e))?;
        tracing::info!(resource = %resource, added, "roles granted");
        Ok(())
    }

    /// Removes every binding of the given roles from `resource`.
    ///
    /// All identities under a revoked role are dropped. A resource that does
    /// not exist has nothing to revoke, so not-found is success.
    ///
    /// # Errors
    ///
    /// Returns an operation failure for any other policy read or write error.
    pub async fn revoke(&self, roles: &[Role], resource: &ResourceAddress) -> OperationResult<()> {
        const ACTION: &str = "revoke roles for";

        tracing::info!(resource = %resource, roles = ?roles, "revoking roles");
        let mut policy = match self.client.get_iam_policy(resource).await {
            Ok(policy) => policy,
            Err(e) if e.is_not_found() => {
                tracing::info!(resource = %resource, "resource absent, nothing to revoke");
                return Ok(());
            }
            Err(e) => return Err(call_failed("tables.getIamPolicy", ACTION, resource, &e)),
        };

        for role in roles {
            policy.remove_role(role);
        }

        match self.client.set_iam_policy(resource, policy).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                tracing::info!(resource = %resource, "resource removed concurrently, nothing to revoke");
                Ok(())
            }
            Err(e) => Err(call_failed("tables.setIamPolicy", ACTION, resource, &e)),
        }
    }
}
