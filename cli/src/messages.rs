//! Wire types for the co-host HTTP API
//!
//! These mirror the server's JSON bodies. Statuses, roles and capabilities are
//! kept as strings so the CLI keeps working when the server adds variants. Some
//! fields are not printed but are part of the response bodies.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct CreateInvitationRequest {
    pub email: String,
    pub role: String,
    pub permissions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeclineRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdatePermissionsRequest {
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Invitation {
    pub id: Uuid,
    pub listing_id: String,
    pub email: String,
    pub role: String,
    #[serde(default)]
    pub title: Option<String>,
    pub permissions: Vec<String>,
    pub status: String,
    pub sent_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub decline_reason: Option<String>,
}

/// Creation response; the only place the acceptance link is returned
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedInvitation {
    #[serde(flatten)]
    pub invitation: Invitation,
    pub accept_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvitationPreview {
    pub listing_id: String,
    pub role: String,
    #[serde(default)]
    pub title: Option<String>,
    pub permissions: Vec<String>,
    #[serde(default)]
    pub message: Option<String>,
    pub status: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Delegation {
    pub id: Uuid,
    pub listing_id: String,
    pub co_host_user_id: String,
    pub role: String,
    #[serde(default)]
    pub title: Option<String>,
    pub permissions: Vec<String>,
    pub status: String,
    pub accepted_at: DateTime<Utc>,
    #[serde(default)]
    pub last_active_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DelegationChange {
    pub delegation: Delegation,
    pub changed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListingOwnership {
    pub listing_id: String,
    pub owner_id: String,
    pub created: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizeResponse {
    pub allowed: bool,
    pub via: String,
}

/// Error body returned by the server
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub message: String,
}
