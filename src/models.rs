//! Request and response bodies for the HTTP API

use serde::{Deserialize, Serialize};

use crate::delegation::{Capability, CapabilitySet, Delegation, Invitation, Role, Transition};

/// Request to invite a co-host to a listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInvitationRequest {
    pub email: String,
    /// One of `co_host`, `manager`, `assistant`
    pub role: String,
    pub permissions: Vec<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Returned to the owner after creating an invitation
#[derive(Debug, Serialize)]
pub struct CreatedInvitation {
    #[serde(flatten)]
    pub invitation: Invitation,
    pub accept_url: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListInvitationsQuery {
    pub status: Option<String>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct DeclineRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePermissionsRequest {
    pub permissions: Vec<String>,
}

/// Result of registering a listing's owner
#[derive(Debug, Serialize, Deserialize)]
pub struct ListingOwnership {
    pub listing_id: String,
    pub owner_id: String,
    /// False when the caller had already registered it
    pub created: bool,
}

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    pub capability: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthorizeResponse {
    pub allowed: bool,
    /// `owner`, `delegate` or `none`
    pub via: String,
}

/// A delegation plus whether the requested action changed it
#[derive(Debug, Serialize)]
pub struct DelegationChange {
    pub delegation: Delegation,
    pub changed: bool,
}

impl From<Transition<Delegation>> for DelegationChange {
    fn from(transition: Transition<Delegation>) -> Self {
        let changed = transition.changed();
        Self {
            delegation: transition.into_inner(),
            changed,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RolePreset {
    pub role: Role,
    pub suggested_permissions: CapabilitySet,
}

/// The permission catalog as shown to the invitation form
#[derive(Debug, Serialize)]
pub struct Catalog {
    pub capabilities: Vec<Capability>,
    pub roles: Vec<RolePreset>,
}

impl Catalog {
    pub fn current() -> Self {
        Self {
            capabilities: Capability::ALL.to_vec(),
            roles: Role::ALL
                .iter()
                .map(|role| RolePreset {
                    role: *role,
                    suggested_permissions: role.suggested_permissions(),
                })
                .collect(),
        }
    }
}
