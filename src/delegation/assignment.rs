//! Active co-host assignments
//!
//! A delegation is created exactly once per accepted invitation and from then on
//! moves only through `active ⇄ suspended` and `active|suspended → removed`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::capability::{Capability, CapabilitySet, Role};
use super::invitation::Invitation;
use crate::error::{AppError, Result};

/// Status of a delegation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelegationStatus {
    Active,
    Suspended,
    /// Terminal. The pair may be re-invited, which creates a new delegation.
    Removed,
}

impl DelegationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DelegationStatus::Active => "active",
            DelegationStatus::Suspended => "suspended",
            DelegationStatus::Removed => "removed",
        }
    }
}

impl std::str::FromStr for DelegationStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(DelegationStatus::Active),
            "suspended" => Ok(DelegationStatus::Suspended),
            "removed" => Ok(DelegationStatus::Removed),
            _ => Err(format!("Invalid delegation status: {}", s)),
        }
    }
}

/// Owner-initiated lifecycle actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelegationAction {
    Suspend,
    Reinstate,
    Remove,
}

impl DelegationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DelegationAction::Suspend => "suspend",
            DelegationAction::Reinstate => "reinstate",
            DelegationAction::Remove => "remove",
        }
    }

    /// Resolve the next status from `from`.
    ///
    /// `Ok(None)` means the delegation is already in the target state.
    pub fn plan(&self, from: DelegationStatus) -> Result<Option<DelegationStatus>> {
        use DelegationStatus::*;

        match (self, from) {
            (DelegationAction::Suspend, Active) => Ok(Some(Suspended)),
            (DelegationAction::Suspend, Suspended) => Ok(None),
            (DelegationAction::Reinstate, Suspended) => Ok(Some(Active)),
            (DelegationAction::Reinstate, Active) => Ok(None),
            (DelegationAction::Remove, Active | Suspended) => Ok(Some(Removed)),
            (DelegationAction::Remove, Removed) => Ok(None),
            (action, Removed) => Err(AppError::InvalidTransition(format!(
                "cannot {} a removed delegation",
                action.as_str()
            ))),
        }
    }
}

/// Outcome of a lifecycle action. `Unchanged` is the tolerated no-op case.
#[derive(Debug, Clone)]
pub enum Transition<T> {
    Applied(T),
    Unchanged(T),
}

impl<T> Transition<T> {
    pub fn changed(&self) -> bool {
        matches!(self, Transition::Applied(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Transition::Applied(v) | Transition::Unchanged(v) => v,
        }
    }
}

/// A materialized grant of capabilities on one listing
#[derive(Debug, Clone, Serialize)]
pub struct Delegation {
    pub id: Uuid,
    pub listing_id: String,
    pub co_host_user_id: String,
    /// Invitation this grant was materialized from
    pub invitation_id: Uuid,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub permissions: CapabilitySet,
    pub status: DelegationStatus,
    pub accepted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_active_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed_at: Option<DateTime<Utc>>,
}

impl Delegation {
    /// Materialize a delegation from an invitation, copying its grant verbatim
    pub fn from_invitation(
        invitation: &Invitation,
        co_host_user_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            listing_id: invitation.listing_id.clone(),
            co_host_user_id: co_host_user_id.into(),
            invitation_id: invitation.id,
            role: invitation.role,
            title: invitation.title.clone(),
            permissions: invitation.permissions.clone(),
            status: DelegationStatus::Active,
            accepted_at: now,
            last_active_at: None,
            suspended_at: None,
            removed_at: None,
        }
    }

    /// Whether this delegation currently grants `cap`
    pub fn grants(&self, cap: Capability) -> bool {
        self.status == DelegationStatus::Active && self.permissions.has(cap)
    }
}
