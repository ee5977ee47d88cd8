//! Delegation registry
//!
//! Owner-side lifecycle of materialized delegations. Nothing is cached: every
//! call reads the store, so a suspension or removal is visible to the very next
//! authorization check.

use std::sync::Arc;
use uuid::Uuid;

use super::assignment::{Delegation, DelegationAction, DelegationStatus, Transition};
use super::capability::CapabilitySet;
use crate::clock::Clock;
use crate::error::{AppError, Result};
use crate::store::Store;

#[derive(Clone)]
pub struct DelegationRegistry {
    store: Store,
    clock: Arc<dyn Clock>,
}

impl DelegationRegistry {
    pub fn new(store: Store, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn suspend(&self, id: Uuid, requester_id: &str) -> Result<Transition<Delegation>> {
        self.apply(id, requester_id, DelegationAction::Suspend).await
    }

    pub async fn reinstate(&self, id: Uuid, requester_id: &str) -> Result<Transition<Delegation>> {
        self.apply(id, requester_id, DelegationAction::Reinstate).await
    }

    /// Terminal. The co-host can be invited again afterwards.
    pub async fn remove(&self, id: Uuid, requester_id: &str) -> Result<Transition<Delegation>> {
        self.apply(id, requester_id, DelegationAction::Remove).await
    }

    /// Replace the capability set of a live delegation
    pub async fn update_permissions<S: AsRef<str>>(
        &self,
        id: Uuid,
        requester_id: &str,
        permissions: &[S],
    ) -> Result<Delegation> {
        let permissions = CapabilitySet::validate(permissions)?;
        let delegation = self.owned(id, requester_id).await?;

        if delegation.status == DelegationStatus::Removed
            || !self
                .store
                .update_delegation_permissions(id, &permissions)
                .await?
        {
            return Err(AppError::InvalidTransition(
                "cannot change permissions of a removed delegation".to_string(),
            ));
        }

        tracing::info!(
            delegation_id = %id,
            permissions = ?permissions.to_vec(),
            "co-host permissions updated"
        );
        self.store.get_delegation(id).await
    }

    /// Record `owner_id` as the owner of a listing. The first claim wins:
    /// repeating it is a no-op and a claim by anyone else is refused.
    pub async fn register_listing(&self, listing_id: &str, owner_id: &str) -> Result<bool> {
        if listing_id.trim().is_empty() {
            return Err(AppError::BadRequest("listing id must not be blank".to_string()));
        }

        if self.store.register_listing(listing_id, owner_id).await? {
            tracing::info!(listing_id, owner_id, "listing registered");
            return Ok(true);
        }

        if self.store.listing_owner(listing_id).await? != owner_id {
            return Err(AppError::Forbidden(format!(
                "listing {} belongs to another owner",
                listing_id
            )));
        }
        Ok(false)
    }

    /// Delegations on a listing, newest first
    pub async fn list_for_listing(
        &self,
        listing_id: &str,
        requester_id: &str,
    ) -> Result<Vec<Delegation>> {
        let owner_id = self.store.listing_owner(listing_id).await?;
        if owner_id != requester_id {
            return Err(AppError::Forbidden(
                "only the listing owner can view co-hosts".to_string(),
            ));
        }

        self.store.list_delegations(listing_id).await
    }

    /// Record that the co-host just used their delegation. Best effort.
    pub async fn touch_activity(&self, id: Uuid) {
        match self.store.touch_delegation(id, self.clock.now()).await {
            Ok(true) => {}
            Ok(false) => tracing::debug!(delegation_id = %id, "activity on inactive delegation"),
            Err(e) => tracing::warn!(delegation_id = %id, "Failed to record activity: {}", e),
        }
    }

    async fn apply(
        &self,
        id: Uuid,
        requester_id: &str,
        action: DelegationAction,
    ) -> Result<Transition<Delegation>> {
        let delegation = self.owned(id, requester_id).await?;

        let Some(to) = action.plan(delegation.status)? else {
            return Ok(Transition::Unchanged(delegation));
        };

        let now = self.clock.now();
        if !self
            .store
            .transition_delegation(id, delegation.status, to, now)
            .await?
        {
            // Lost a race; judge the action against what is stored now
            let current = self.store.get_delegation(id).await?;
            return match action.plan(current.status)? {
                None => Ok(Transition::Unchanged(current)),
                Some(_) => Err(AppError::InvalidTransition(format!(
                    "delegation {} changed concurrently",
                    id
                ))),
            };
        }

        tracing::info!(
            delegation_id = %id,
            listing_id = %delegation.listing_id,
            from = delegation.status.as_str(),
            to = to.as_str(),
            "co-host delegation {}",
            action.as_str()
        );

        Ok(Transition::Applied(self.store.get_delegation(id).await?))
    }

    async fn owned(&self, id: Uuid, requester_id: &str) -> Result<Delegation> {
        let delegation = self.store.get_delegation(id).await?;
        let owner_id = self.store.listing_owner(&delegation.listing_id).await?;

        if owner_id != requester_id {
            return Err(AppError::Forbidden(
                "only the listing owner can manage co-hosts".to_string(),
            ));
        }

        Ok(delegation)
    }
}
