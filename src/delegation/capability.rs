//! Permission catalog for co-hosts
//!
//! Defines the closed set of capabilities a listing owner can delegate, and the
//! role labels whose presets suggest (but never grant) a subset of them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{AppError, Result};

/// Capabilities that can be delegated on a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Can accept, decline and modify reservations
    ManageBookings,
    /// Can change the listing description, photos and pricing
    EditListing,
    /// Can view listing performance analytics
    ViewAnalytics,
    /// Can block and open calendar dates
    ManageCalendar,
    /// Can respond to guest reviews
    HandleReviews,
    /// Can read and reply to guest messages
    AccessMessages,
    /// Can view payouts and earnings
    ViewEarnings,
}

impl Capability {
    pub const ALL: [Capability; 7] = [
        Capability::ManageBookings,
        Capability::EditListing,
        Capability::ViewAnalytics,
        Capability::ManageCalendar,
        Capability::HandleReviews,
        Capability::AccessMessages,
        Capability::ViewEarnings,
    ];

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ManageBookings => "manage_bookings",
            Capability::EditListing => "edit_listing",
            Capability::ViewAnalytics => "view_analytics",
            Capability::ManageCalendar => "manage_calendar",
            Capability::HandleReviews => "handle_reviews",
            Capability::AccessMessages => "access_messages",
            Capability::ViewEarnings => "view_earnings",
        }
    }

    /// Get all capabilities
    pub fn all() -> CapabilitySet {
        Self::ALL.into_iter().collect()
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "manage_bookings" => Ok(Capability::ManageBookings),
            "edit_listing" => Ok(Capability::EditListing),
            "view_analytics" => Ok(Capability::ViewAnalytics),
            "manage_calendar" => Ok(Capability::ManageCalendar),
            "handle_reviews" => Ok(Capability::HandleReviews),
            "access_messages" => Ok(Capability::AccessMessages),
            "view_earnings" => Ok(Capability::ViewEarnings),
            _ => Err(format!("Invalid capability: {}", s)),
        }
    }
}

/// Organizational label for a co-host. Carries no automatic grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    CoHost,
    Manager,
    Assistant,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::CoHost, Role::Manager, Role::Assistant];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::CoHost => "co_host",
            Role::Manager => "manager",
            Role::Assistant => "assistant",
        }
    }

    /// Capabilities the UI pre-selects for this role
    pub fn suggested_permissions(&self) -> CapabilitySet {
        match self {
            Role::CoHost => Capability::all(),
            Role::Manager => [
                Capability::ManageBookings,
                Capability::EditListing,
                Capability::ViewAnalytics,
                Capability::ManageCalendar,
                Capability::HandleReviews,
                Capability::AccessMessages,
            ]
            .into_iter()
            .collect(),
            Role::Assistant => [
                Capability::ManageBookings,
                Capability::ManageCalendar,
                Capability::AccessMessages,
            ]
            .into_iter()
            .collect(),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "co_host" => Ok(Role::CoHost),
            "manager" => Ok(Role::Manager),
            "assistant" => Ok(Role::Assistant),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// A set of capabilities with helper methods
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet {
    capabilities: BTreeSet<Capability>,
}

impl CapabilitySet {
    /// Create a new empty capability set
    pub fn new() -> Self {
        Self {
            capabilities: BTreeSet::new(),
        }
    }

    /// Parse and validate a proposed grant.
    ///
    /// Every name must belong to the catalog and at least one must be present.
    /// Duplicates collapse.
    pub fn validate<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        if names.is_empty() {
            return Err(AppError::InvalidPermissionSet(
                "at least one permission is required".to_string(),
            ));
        }

        let capabilities = names
            .iter()
            .map(|name| name.as_ref().parse::<Capability>())
            .collect::<std::result::Result<BTreeSet<_>, _>>()
            .map_err(AppError::InvalidPermissionSet)?;

        Ok(Self { capabilities })
    }

    pub fn has(&self, cap: Capability) -> bool {
        self.capabilities.contains(&cap)
    }

    pub fn add(&mut self, cap: Capability) {
        self.capabilities.insert(cap);
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.capabilities.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<Capability> {
        self.iter().collect()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self {
            capabilities: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<Capability>> for CapabilitySet {
    fn from(capabilities: Vec<Capability>) -> Self {
        capabilities.into_iter().collect()
    }
}
