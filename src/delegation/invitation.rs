//! Co-host invitations
//!
//! An invitation is an owner's offer of delegation bound to a single-use token.
//! Expiry is lazy: a pending invitation past `expires_at` reads as expired even
//! before the store has been updated.

use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::ValidateEmail;

use super::capability::{CapabilitySet, Role};
use crate::error::{AppError, Result};

/// Length of an invitation token. 43 alphanumeric characters carry ~256 bits.
pub const TOKEN_LEN: usize = 43;

/// Default time an invitation stays acceptable
pub const DEFAULT_TTL_DAYS: i64 = 7;

/// Status of an invitation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    /// Sent and awaiting a response
    Pending,
    /// Accepted; a delegation was materialized
    Accepted,
    /// Declined by the invitee
    Declined,
    /// Not answered before `expires_at`
    Expired,
    /// Withdrawn by the inviter or owner
    Cancelled,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Declined => "declined",
            InvitationStatus::Expired => "expired",
            InvitationStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, InvitationStatus::Pending)
    }
}

impl std::str::FromStr for InvitationStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InvitationStatus::Pending),
            "accepted" => Ok(InvitationStatus::Accepted),
            "declined" => Ok(InvitationStatus::Declined),
            "expired" => Ok(InvitationStatus::Expired),
            "cancelled" => Ok(InvitationStatus::Cancelled),
            _ => Err(format!("Invalid invitation status: {}", s)),
        }
    }
}

/// An owner's offer of delegation on one listing
#[derive(Debug, Clone, Serialize)]
pub struct Invitation {
    pub id: Uuid,
    pub listing_id: String,
    pub inviter_id: String,
    /// Invitee address, trimmed and lower-cased
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub permissions: CapabilitySet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Bearer credential. Only ever handed out inside the acceptance URL.
    #[serde(skip_serializing)]
    pub token: String,
    pub status: InvitationStatus,
    pub sent_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decline_reason: Option<String>,
    /// Actor that accepted, set only on the accepted transition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegation_id: Option<Uuid>,
}

impl Invitation {
    /// Create a pending invitation with a fresh token
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        listing_id: impl Into<String>,
        inviter_id: impl Into<String>,
        email: impl Into<String>,
        role: Role,
        permissions: CapabilitySet,
        title: Option<String>,
        message: Option<String>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            listing_id: listing_id.into(),
            inviter_id: inviter_id.into(),
            email: email.into(),
            role,
            title,
            permissions,
            message,
            token: generate_token(),
            status: InvitationStatus::Pending,
            sent_at: now,
            expires_at: now + ttl,
            responded_at: None,
            decline_reason: None,
            accepted_by: None,
            delegation_id: None,
        }
    }

    /// Whether the acceptance window has closed
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Status as observed at `now`, applying lazy expiry
    pub fn effective_status(&self, now: DateTime<Utc>) -> InvitationStatus {
        if self.status == InvitationStatus::Pending && self.is_overdue(now) {
            InvitationStatus::Expired
        } else {
            self.status
        }
    }

    /// Pending in storage but past its deadline
    pub fn needs_expiry(&self, now: DateTime<Utc>) -> bool {
        self.status == InvitationStatus::Pending && self.is_overdue(now)
    }

    /// Replace the stored status with the effective one
    pub fn observed_at(mut self, now: DateTime<Utc>) -> Self {
        if self.needs_expiry(now) {
            self.status = InvitationStatus::Expired;
        }
        self
    }

    /// Guard shared by decline, cancel and resend: pending and within the window
    pub fn ensure_open(&self, now: DateTime<Utc>) -> Result<()> {
        match self.effective_status(now) {
            InvitationStatus::Pending => Ok(()),
            InvitationStatus::Expired => Err(AppError::InvitationExpired),
            status => Err(AppError::InvitationAlreadyResolved { status }),
        }
    }

    /// Whether `actor_id` may cancel or resend this invitation
    pub fn is_managed_by(&self, actor_id: &str, owner_id: &str) -> bool {
        self.inviter_id == actor_id || owner_id == actor_id
    }

    /// Why a conditional write against this (freshly read) invitation did not apply
    pub fn resolution_error(&self, now: DateTime<Utc>) -> AppError {
        match self.ensure_open(now) {
            Err(e) => e,
            Ok(()) => AppError::Internal(format!("invitation {} is still pending", self.id)),
        }
    }
}

/// Trim optional free text, dropping it when blank
pub(crate) fn non_blank(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

/// Public view shown on the accept page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationPreview {
    pub listing_id: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub permissions: CapabilitySet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub status: InvitationStatus,
    pub expires_at: DateTime<Utc>,
}

impl InvitationPreview {
    pub fn new(invitation: &Invitation, now: DateTime<Utc>) -> Self {
        Self {
            listing_id: invitation.listing_id.clone(),
            role: invitation.role,
            title: invitation.title.clone(),
            permissions: invitation.permissions.clone(),
            message: invitation.message.clone(),
            status: invitation.effective_status(now),
            expires_at: invitation.expires_at,
        }
    }
}

/// Generate an invitation token from the operating system's CSPRNG
pub fn generate_token() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Acceptance link embedded in the invitation email
pub fn accept_url(origin: &str, token: &str) -> String {
    format!("{}/co-host/accept/{}", origin.trim_end_matches('/'), token)
}

/// Trim and lower-case an invitee address, rejecting anything that is not a
/// deliverable mailbox
pub fn normalize_email(raw: &str) -> Result<String> {
    let email = raw.trim().to_lowercase();

    // Single-label hosts are valid syntax but never reachable from outside
    let dotted = email
        .rsplit_once('@')
        .is_some_and(|(_, domain)| domain.contains('.'));
    if !dotted || !email.validate_email() {
        return Err(AppError::InvalidEmail(raw.trim().to_string()));
    }

    Ok(email)
}
