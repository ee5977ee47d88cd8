//! Invitation ledger
//!
//! Issues invitations, hands their tokens to the notifier, and performs the
//! owner-side transitions (cancel, resend). Expiry is applied lazily on every
//! read and persisted whenever an overdue row is touched.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::capability::{CapabilitySet, Role};
use super::invitation::{
    accept_url, non_blank, normalize_email, Invitation, InvitationPreview, InvitationStatus,
    DEFAULT_TTL_DAYS,
};
use crate::clock::Clock;
use crate::error::{AppError, Result};
use crate::models::CreateInvitationRequest;
use crate::notifier::{self, Notifier, INVITATION_TEMPLATE};
use crate::store::Store;

/// Maximum length of the free-text message shown to the invitee
pub const MAX_MESSAGE_LEN: usize = 2000;

/// Maximum length of the display title
pub const MAX_TITLE_LEN: usize = 100;

#[derive(Debug, Clone)]
pub struct LedgerSettings {
    /// How long an invitation stays acceptable
    pub ttl: Duration,
    /// Origin the acceptance URL is built on
    pub public_origin: String,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::days(DEFAULT_TTL_DAYS),
            public_origin: "http://localhost:5173".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct InvitationLedger {
    store: Store,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    settings: LedgerSettings,
}

impl InvitationLedger {
    pub fn new(
        store: Store,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        settings: LedgerSettings,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    /// Acceptance link for an invitation
    pub fn accept_url(&self, invitation: &Invitation) -> String {
        accept_url(&self.settings.public_origin, &invitation.token)
    }

    /// Invite a co-host to a listing.
    ///
    /// Everything is validated before the first write. The notification is sent
    /// after the invitation is stored and its failure is only logged.
    pub async fn create(
        &self,
        listing_id: &str,
        inviter_id: &str,
        request: CreateInvitationRequest,
    ) -> Result<Invitation> {
        let email = normalize_email(&request.email)?;
        let role: Role = request.role.parse().map_err(AppError::BadRequest)?;
        let permissions = CapabilitySet::validate(&request.permissions)?;
        let title = non_blank(request.title);
        let message = non_blank(request.message);

        if title.as_ref().is_some_and(|t| t.chars().count() > MAX_TITLE_LEN) {
            return Err(AppError::BadRequest(format!(
                "title is limited to {} characters",
                MAX_TITLE_LEN
            )));
        }
        if message
            .as_ref()
            .is_some_and(|m| m.chars().count() > MAX_MESSAGE_LEN)
        {
            return Err(AppError::BadRequest(format!(
                "message is limited to {} characters",
                MAX_MESSAGE_LEN
            )));
        }

        let owner_id = self.store.listing_owner(listing_id).await?;
        if owner_id != inviter_id {
            return Err(AppError::Forbidden(
                "only the listing owner can invite co-hosts".to_string(),
            ));
        }

        let now = self.clock.now();

        // An overdue invitation must not block a fresh one
        for stale in self.store.pending_invitations_for(listing_id, &email).await? {
            if stale.needs_expiry(now) {
                self.expire(&stale, now).await?;
            }
        }

        let invitation = Invitation::new(
            listing_id,
            inviter_id,
            email,
            role,
            permissions,
            title,
            message,
            now,
            self.settings.ttl,
        );
        self.store.insert_invitation(&invitation).await?;

        tracing::info!(
            invitation_id = %invitation.id,
            listing_id,
            role = invitation.role.as_str(),
            expires_at = %invitation.expires_at,
            "co-host invitation created"
        );

        self.notify(&invitation);
        Ok(invitation)
    }

    /// Withdraw a pending invitation. Only its inviter or the listing owner may.
    pub async fn cancel(&self, invitation_id: Uuid, requester_id: &str) -> Result<Invitation> {
        let invitation = self.managed(invitation_id, requester_id).await?;
        let now = self.clock.now();

        if invitation.needs_expiry(now) {
            self.expire(&invitation, now).await?;
        }
        invitation.ensure_open(now)?;

        if !self
            .store
            .resolve_invitation(invitation_id, InvitationStatus::Cancelled, now, None)
            .await?
        {
            let current = self.store.get_invitation(invitation_id).await?;
            return Err(current.resolution_error(now));
        }

        tracing::info!(%invitation_id, requester_id, "co-host invitation cancelled");
        self.store.get_invitation(invitation_id).await
    }

    /// Send the same token again. Duplicate notifications are acceptable.
    pub async fn resend(&self, invitation_id: Uuid, requester_id: &str) -> Result<Invitation> {
        let invitation = self.managed(invitation_id, requester_id).await?;
        let now = self.clock.now();

        if invitation.needs_expiry(now) {
            self.expire(&invitation, now).await?;
        }
        invitation.ensure_open(now)?;

        tracing::info!(%invitation_id, "co-host invitation resent");
        self.notify(&invitation);
        Ok(invitation)
    }

    /// Resolve a token. An overdue pending invitation is recorded as expired
    /// before it is returned.
    pub async fn lookup_by_token(&self, token: &str) -> Result<Invitation> {
        let invitation = self
            .store
            .find_invitation_by_token(token)
            .await?
            .ok_or(AppError::InvitationNotFound)?;

        let now = self.clock.now();
        if invitation.needs_expiry(now) {
            self.expire(&invitation, now).await?;
            return self.store.get_invitation(invitation.id).await;
        }
        Ok(invitation)
    }

    /// What the invitee sees on the accept page
    pub async fn preview(&self, token: &str) -> Result<InvitationPreview> {
        let invitation = self.lookup_by_token(token).await?;
        Ok(InvitationPreview::new(&invitation, self.clock.now()))
    }

    /// Invitations for a listing, newest first. Overdue rows are persisted as
    /// expired before the status filter is applied.
    pub async fn list_for_listing(
        &self,
        listing_id: &str,
        requester_id: &str,
        status: Option<InvitationStatus>,
    ) -> Result<Vec<Invitation>> {
        let owner_id = self.store.listing_owner(listing_id).await?;
        if owner_id != requester_id {
            return Err(AppError::Forbidden(
                "only the listing owner can view invitations".to_string(),
            ));
        }

        let now = self.clock.now();
        let pending = self
            .store
            .list_invitations(listing_id, Some(InvitationStatus::Pending))
            .await?;
        for invitation in pending.iter().filter(|i| i.needs_expiry(now)) {
            self.expire(invitation, now).await?;
        }

        let invitations = self.store.list_invitations(listing_id, status).await?;
        Ok(invitations
            .into_iter()
            .map(|i| i.observed_at(now))
            .collect())
    }

    async fn managed(&self, invitation_id: Uuid, requester_id: &str) -> Result<Invitation> {
        let invitation = self.store.get_invitation(invitation_id).await?;
        let owner_id = self.store.listing_owner(&invitation.listing_id).await?;

        if !invitation.is_managed_by(requester_id, &owner_id) {
            return Err(AppError::Forbidden(
                "only the inviter or listing owner can manage this invitation".to_string(),
            ));
        }

        Ok(invitation)
    }

    async fn expire(&self, invitation: &Invitation, now: DateTime<Utc>) -> Result<()> {
        if self
            .store
            .resolve_invitation(invitation.id, InvitationStatus::Expired, now, None)
            .await?
        {
            tracing::debug!(invitation_id = %invitation.id, "co-host invitation expired");
        }
        Ok(())
    }

    fn notify(&self, invitation: &Invitation) -> JoinHandle<()> {
        let payload = json!({
            "listing_id": invitation.listing_id,
            "inviter_id": invitation.inviter_id,
            "role": invitation.role,
            "title": invitation.title,
            "permissions": invitation.permissions,
            "message": invitation.message,
            "expires_at": invitation.expires_at,
            "accept_url": self.accept_url(invitation),
        });

        notifier::dispatch(
            self.notifier.clone(),
            invitation.email.clone(),
            INVITATION_TEMPLATE,
            payload,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegation::fixtures::{
        harness, harness_with, invite_request, RecordingNotifier, LISTING, OWNER,
    };
    use crate::delegation::Capability;

    #[tokio::test]
    async fn test_create_invitation() {
        let h = harness().await;
        let inv = h.invite(" Bob@X.com", &["manage_bookings", "access_messages"]).await;

        assert_eq!(inv.email, "bob@x.com");
        assert_eq!(inv.listing_id, LISTING);
        assert_eq!(inv.inviter_id, OWNER);
        assert_eq!(inv.status, InvitationStatus::Pending);
        assert_eq!(inv.sent_at, h.clock.now());
        assert_eq!(inv.expires_at, h.clock.now() + Duration::days(7));
        assert!(inv.permissions.has(Capability::ManageBookings));
        assert!(inv.permissions.has(Capability::AccessMessages));
        assert_eq!(inv.permissions.len(), 2);
    }

    #[tokio::test]
    async fn test_create_notifies_with_accept_url() {
        let h = harness().await;
        let inv = h.invite("bob@x.com", &["edit_listing"]).await;

        let sent = h.notifier.wait_for(1).await;
        assert_eq!(sent[0].email, "bob@x.com");
        assert_eq!(sent[0].template_id, INVITATION_TEMPLATE);
        assert_eq!(
            sent[0].payload["accept_url"],
            format!("http://localhost:5173/co-host/accept/{}", inv.token)
        );
    }

    #[tokio::test]
    async fn test_notifier_failure_does_not_roll_back() {
        let h = harness_with(RecordingNotifier::failing()).await;
        let inv = h.invite("bob@x.com", &["edit_listing"]).await;

        h.notifier.wait_for(1).await;
        let stored = h.store.get_invitation(inv.id).await.unwrap();
        assert_eq!(stored.status, InvitationStatus::Pending);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_permissions() {
        let h = harness().await;

        let empty = h
            .manager
            .ledger
            .create(LISTING, OWNER, invite_request("bob@x.com", &[]))
            .await;
        assert!(matches!(empty, Err(AppError::InvalidPermissionSet(_))));

        let unknown = h
            .manager
            .ledger
            .create(
                LISTING,
                OWNER,
                invite_request("bob@x.com", &["manage_bookings", "transfer_ownership"]),
            )
            .await;
        assert!(matches!(unknown, Err(AppError::InvalidPermissionSet(_))));

        let listed = h
            .manager
            .ledger
            .list_for_listing(LISTING, OWNER, None)
            .await
            .unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn test_create_rejects_bad_email_and_role() {
        let h = harness().await;

        let result = h
            .manager
            .ledger
            .create(LISTING, OWNER, invite_request("not-an-email", &["edit_listing"]))
            .await;
        assert!(matches!(result, Err(AppError::InvalidEmail(_))));

        let mut req = invite_request("bob@x.com", &["edit_listing"]);
        req.role = "owner".to_string();
        let result = h.manager.ledger.create(LISTING, OWNER, req).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_long_message() {
        let h = harness().await;
        let mut req = invite_request("bob@x.com", &["edit_listing"]);
        req.message = Some("x".repeat(MAX_MESSAGE_LEN + 1));

        let result = h.manager.ledger.create(LISTING, OWNER, req).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_only_owner_can_invite() {
        let h = harness().await;
        let result = h
            .manager
            .ledger
            .create(LISTING, "someone-else", invite_request("bob@x.com", &["edit_listing"]))
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_create_for_unknown_listing() {
        let h = harness().await;
        let result = h
            .manager
            .ledger
            .create("missing", OWNER, invite_request("bob@x.com", &["edit_listing"]))
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_duplicate_pending_invitation() {
        let h = harness().await;
        h.invite("bob@x.com", &["edit_listing"]).await;

        let result = h
            .manager
            .ledger
            .create(LISTING, OWNER, invite_request("BOB@x.com", &["view_earnings"]))
            .await;
        assert!(matches!(
            result,
            Err(AppError::DuplicateActiveInvitation { .. })
        ));
    }

    #[tokio::test]
    async fn test_reinvite_after_expiry() {
        let h = harness().await;
        let first = h.invite("bob@x.com", &["edit_listing"]).await;

        h.clock.advance(Duration::days(8));
        let second = h.invite("bob@x.com", &["edit_listing"]).await;

        assert_ne!(first.token, second.token);
        let first = h.store.get_invitation(first.id).await.unwrap();
        assert_eq!(first.status, InvitationStatus::Expired);
        assert!(first.responded_at.is_some());
    }

    #[tokio::test]
    async fn test_reinvite_after_cancel() {
        let h = harness().await;
        let first = h.invite("bob@x.com", &["edit_listing"]).await;
        h.manager.ledger.cancel(first.id, OWNER).await.unwrap();

        let second = h.invite("bob@x.com", &["edit_listing"]).await;
        assert_eq!(second.status, InvitationStatus::Pending);
    }

    #[tokio::test]
    async fn test_cancel_pending() {
        let h = harness().await;
        let inv = h.invite("bob@x.com", &["edit_listing"]).await;

        let cancelled = h.manager.ledger.cancel(inv.id, OWNER).await.unwrap();
        assert_eq!(cancelled.status, InvitationStatus::Cancelled);
        assert!(cancelled.responded_at.is_some());

        let again = h.manager.ledger.cancel(inv.id, OWNER).await;
        assert!(matches!(
            again,
            Err(AppError::InvitationAlreadyResolved {
                status: InvitationStatus::Cancelled
            })
        ));
    }

    #[tokio::test]
    async fn test_cancel_requires_inviter_or_owner() {
        let h = harness().await;
        let inv = h.invite("bob@x.com", &["edit_listing"]).await;

        let result = h.manager.ledger.cancel(inv.id, "bob").await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_cancel_expired_invitation() {
        let h = harness().await;
        let inv = h.invite("bob@x.com", &["edit_listing"]).await;
        h.clock.advance(Duration::days(7) + Duration::seconds(1));

        let result = h.manager.ledger.cancel(inv.id, OWNER).await;
        assert!(matches!(result, Err(AppError::InvitationExpired)));

        let stored = h.store.get_invitation(inv.id).await.unwrap();
        assert_eq!(stored.status, InvitationStatus::Expired);
    }

    #[tokio::test]
    async fn test_resend_sends_same_token() {
        let h = harness().await;
        let inv = h.invite("bob@x.com", &["edit_listing"]).await;
        h.notifier.wait_for(1).await;

        h.manager.ledger.resend(inv.id, OWNER).await.unwrap();
        let sent = h.notifier.wait_for(2).await;
        assert_eq!(sent[0].payload["accept_url"], sent[1].payload["accept_url"]);
    }

    #[tokio::test]
    async fn test_resend_rejected_after_cancel() {
        let h = harness().await;
        let inv = h.invite("bob@x.com", &["edit_listing"]).await;
        h.manager.ledger.cancel(inv.id, OWNER).await.unwrap();

        let result = h.manager.ledger.resend(inv.id, OWNER).await;
        assert!(matches!(
            result,
            Err(AppError::InvitationAlreadyResolved { .. })
        ));
    }

    #[tokio::test]
    async fn test_lookup_by_token_persists_expiry() {
        let h = harness().await;
        let inv = h.invite("bob@x.com", &["edit_listing"]).await;

        let found = h.manager.ledger.lookup_by_token(&inv.token).await.unwrap();
        assert_eq!(found.status, InvitationStatus::Pending);

        h.clock.advance(Duration::days(30));
        let found = h.manager.ledger.lookup_by_token(&inv.token).await.unwrap();
        assert_eq!(found.status, InvitationStatus::Expired);
        assert_eq!(found.responded_at, Some(h.clock.now()));

        let stored = h.store.get_invitation(inv.id).await.unwrap();
        assert_eq!(stored.status, InvitationStatus::Expired);
    }

    #[tokio::test]
    async fn test_preview_records_expiry() {
        let h = harness().await;
        let inv = h.invite("bob@x.com", &["edit_listing"]).await;
        h.clock.advance(Duration::days(8));

        let preview = h.manager.ledger.preview(&inv.token).await.unwrap();
        assert_eq!(preview.status, InvitationStatus::Expired);

        let result = h.manager.acceptance.accept(&inv.token, "bob").await;
        assert!(matches!(result, Err(AppError::InvitationExpired)));
        let stored = h.store.get_invitation(inv.id).await.unwrap();
        assert_eq!(stored.responded_at, Some(h.clock.now()));
    }

    #[tokio::test]
    async fn test_lookup_unknown_token() {
        let h = harness().await;
        let result = h.manager.ledger.lookup_by_token("no-such-token").await;
        assert!(matches!(result, Err(AppError::InvitationNotFound)));
    }

    #[tokio::test]
    async fn test_preview() {
        let h = harness().await;
        let mut req = invite_request("bob@x.com", &["manage_calendar"]);
        req.message = Some("  Welcome aboard ".to_string());
        req.title = Some("Weekend host".to_string());
        let inv = h.manager.ledger.create(LISTING, OWNER, req).await.unwrap();

        let preview = h.manager.ledger.preview(&inv.token).await.unwrap();
        assert_eq!(preview.listing_id, LISTING);
        assert_eq!(preview.message.as_deref(), Some("Welcome aboard"));
        assert_eq!(preview.title.as_deref(), Some("Weekend host"));
        assert_eq!(preview.status, InvitationStatus::Pending);
    }

    #[tokio::test]
    async fn test_list_sweeps_and_filters() {
        let h = harness().await;
        let old = h.invite("old@x.com", &["edit_listing"]).await;
        h.clock.advance(Duration::days(6));
        let fresh = h.invite("fresh@x.com", &["edit_listing"]).await;
        h.clock.advance(Duration::days(2));

        let all = h
            .manager
            .ledger
            .list_for_listing(LISTING, OWNER, None)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let expired = h
            .manager
            .ledger
            .list_for_listing(LISTING, OWNER, Some(InvitationStatus::Expired))
            .await
            .unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, old.id);

        let pending = h
            .manager
            .ledger
            .list_for_listing(LISTING, OWNER, Some(InvitationStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, fresh.id);

        // Restartable: a second listing sees the same thing
        let again = h
            .manager
            .ledger
            .list_for_listing(LISTING, OWNER, None)
            .await
            .unwrap();
        assert_eq!(again.len(), 2);
    }

    #[tokio::test]
    async fn test_list_requires_owner() {
        let h = harness().await;
        let result = h
            .manager
            .ledger
            .list_for_listing(LISTING, "bob", None)
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }
}
