//! Co-host delegation for listings
//!
//! A listing owner invites a co-host by email. The invitee accepts through a
//! single-use token, which materializes a delegation carrying a fixed subset of
//! the permission catalog. The owner can later suspend, reinstate or remove it,
//! and every protected listing operation consults the authorization guard.

pub mod acceptance;
pub mod assignment;
pub mod capability;
pub mod guard;
pub mod invitation;
pub mod ledger;
pub mod manager;
pub mod registry;

#[cfg(test)]
pub(crate) mod fixtures;

pub use acceptance::AcceptanceProtocol;
pub use assignment::{Delegation, DelegationAction, DelegationStatus, Transition};
pub use capability::{Capability, CapabilitySet, Role};
pub use guard::{Access, AuthorizationGuard};
pub use invitation::{Invitation, InvitationPreview, InvitationStatus};
pub use ledger::{InvitationLedger, LedgerSettings};
pub use manager::DelegationManager;
pub use registry::DelegationRegistry;
