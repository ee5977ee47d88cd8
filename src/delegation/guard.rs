//! Authorization guard consulted by protected listing operations

use uuid::Uuid;

use super::capability::Capability;
use super::registry::DelegationRegistry;
use crate::error::{AppError, Result};
use crate::store::Store;

/// How an actor reached (or failed to reach) a capability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Owner,
    /// Granted through this active delegation
    Delegate(Uuid),
    Denied,
}

impl Access {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Access::Denied)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Access::Owner => "owner",
            Access::Delegate(_) => "delegate",
            Access::Denied => "none",
        }
    }
}

#[derive(Clone)]
pub struct AuthorizationGuard {
    store: Store,
    registry: DelegationRegistry,
}

impl AuthorizationGuard {
    pub fn new(store: Store, registry: DelegationRegistry) -> Self {
        Self { store, registry }
    }

    /// Resolve access from the current store contents. Unknown listings deny.
    pub async fn access(
        &self,
        actor_id: &str,
        listing_id: &str,
        capability: Capability,
    ) -> Result<Access> {
        let owner_id = match self.store.listing_owner(listing_id).await {
            Ok(owner_id) => owner_id,
            Err(AppError::NotFound(_)) => return Ok(Access::Denied),
            Err(e) => return Err(e),
        };
        if owner_id == actor_id {
            return Ok(Access::Owner);
        }

        let access = match self.store.active_delegation(listing_id, actor_id).await? {
            Some(d) if d.grants(capability) => Access::Delegate(d.id),
            _ => Access::Denied,
        };
        Ok(access)
    }

    pub async fn can(&self, actor_id: &str, listing_id: &str, capability: Capability) -> Result<bool> {
        Ok(self.access(actor_id, listing_id, capability).await?.is_allowed())
    }

    /// `access` for a protected operation; a delegated grant also records activity
    pub async fn check(
        &self,
        actor_id: &str,
        listing_id: &str,
        capability: Capability,
    ) -> Result<Access> {
        let access = self.access(actor_id, listing_id, capability).await?;

        match access {
            Access::Delegate(delegation_id) => {
                let registry = self.registry.clone();
                tokio::spawn(async move { registry.touch_activity(delegation_id).await });
            }
            Access::Denied => tracing::debug!(
                actor_id,
                listing_id,
                capability = capability.as_str(),
                "capability denied"
            ),
            Access::Owner => {}
        }

        Ok(access)
    }
}
