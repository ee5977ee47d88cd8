//! Token redemption
//!
//! Turns a pending invitation into a delegation, or declines it. Both paths are
//! single conditional writes against `pending`, so a token can be redeemed at
//! most once no matter how many requests race on it.

use std::sync::Arc;

use super::assignment::{Delegation, Transition};
use super::invitation::{non_blank, Invitation, InvitationStatus};
use super::ledger::InvitationLedger;
use crate::clock::Clock;
use crate::error::{AppError, Result};
use crate::store::Store;

/// Maximum length of a decline reason
pub const MAX_REASON_LEN: usize = 500;

#[derive(Clone)]
pub struct AcceptanceProtocol {
    ledger: InvitationLedger,
    store: Store,
    clock: Arc<dyn Clock>,
}

impl AcceptanceProtocol {
    pub fn new(ledger: InvitationLedger, store: Store, clock: Arc<dyn Clock>) -> Self {
        Self {
            ledger,
            store,
            clock,
        }
    }

    /// Redeem `token` on behalf of `actor_id`.
    ///
    /// Returns `Unchanged` with the existing delegation when the same actor
    /// redeems an invitation they already accepted.
    pub async fn accept(&self, token: &str, actor_id: &str) -> Result<Transition<Delegation>> {
        let invitation = self.ledger.lookup_by_token(token).await?;
        let now = self.clock.now();

        if invitation.status != InvitationStatus::Pending {
            return self.settled(invitation, actor_id).await.map(Transition::Unchanged);
        }

        // The deadline may have passed since the lookup
        if invitation.is_overdue(now) {
            return Err(AppError::InvitationExpired);
        }

        let owner_id = self.store.listing_owner(&invitation.listing_id).await?;
        if owner_id == actor_id {
            return Err(AppError::Forbidden(
                "the listing owner cannot co-host their own listing".to_string(),
            ));
        }

        let delegation = Delegation::from_invitation(&invitation, actor_id, now);
        if !self.store.accept_invitation(invitation.id, &delegation).await? {
            // Someone else resolved it first
            let current = self.store.get_invitation(invitation.id).await?;
            return match current.status {
                InvitationStatus::Pending => Err(current.resolution_error(now)),
                _ => self.settled(current, actor_id).await.map(Transition::Unchanged),
            };
        }

        tracing::info!(
            invitation_id = %invitation.id,
            delegation_id = %delegation.id,
            listing_id = %delegation.listing_id,
            co_host = actor_id,
            "co-host invitation accepted"
        );

        Ok(Transition::Applied(delegation))
    }

    /// Decline a pending invitation. No delegation is created.
    pub async fn decline(&self, token: &str, reason: Option<String>) -> Result<Invitation> {
        let invitation = self.ledger.lookup_by_token(token).await?;
        let now = self.clock.now();
        let reason = non_blank(reason);

        if reason
            .as_ref()
            .is_some_and(|r| r.chars().count() > MAX_REASON_LEN)
        {
            return Err(AppError::BadRequest(format!(
                "decline reason is limited to {} characters",
                MAX_REASON_LEN
            )));
        }

        invitation.ensure_open(now)?;

        if !self
            .store
            .resolve_invitation(
                invitation.id,
                InvitationStatus::Declined,
                now,
                reason.as_deref(),
            )
            .await?
        {
            let current = self.store.get_invitation(invitation.id).await?;
            return Err(current.resolution_error(now));
        }

        tracing::info!(invitation_id = %invitation.id, "co-host invitation declined");
        self.store.get_invitation(invitation.id).await
    }

    /// Outcome for an invitation that has already left `pending`
    async fn settled(&self, invitation: Invitation, actor_id: &str) -> Result<Delegation> {
        match (invitation.status, invitation.delegation_id) {
            (InvitationStatus::Accepted, Some(delegation_id))
                if invitation.accepted_by.as_deref() == Some(actor_id) =>
            {
                tracing::debug!(invitation_id = %invitation.id, "repeated acceptance");
                self.store.get_delegation(delegation_id).await
            }
            (InvitationStatus::Expired, _) => Err(AppError::InvitationExpired),
            (status, _) => Err(AppError::InvitationAlreadyResolved { status }),
        }
    }
}
