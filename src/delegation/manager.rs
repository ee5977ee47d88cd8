//! Delegation manager wiring the co-host components together
//!
//! The manager owns one of each component, all sharing the same store handle,
//! notifier and clock:
//! - the invitation ledger (owner side of invitations)
//! - the acceptance protocol (invitee side)
//! - the delegation registry (lifecycle of accepted grants)
//! - the authorization guard (capability checks)

use std::sync::Arc;

use super::acceptance::AcceptanceProtocol;
use super::guard::AuthorizationGuard;
use super::ledger::{InvitationLedger, LedgerSettings};
use super::registry::DelegationRegistry;
use crate::clock::Clock;
use crate::notifier::Notifier;
use crate::store::Store;

#[derive(Clone)]
pub struct DelegationManager {
    pub ledger: InvitationLedger,
    pub acceptance: AcceptanceProtocol,
    pub registry: DelegationRegistry,
    pub guard: AuthorizationGuard,
}

impl DelegationManager {
    pub fn new(
        store: Store,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        settings: LedgerSettings,
    ) -> Self {
        let registry = DelegationRegistry::new(store.clone(), clock.clone());
        let ledger = InvitationLedger::new(store.clone(), notifier, clock.clone(), settings);

        Self {
            acceptance: AcceptanceProtocol::new(ledger.clone(), store.clone(), clock),
            ledger,
            guard: AuthorizationGuard::new(store, registry.clone()),
            registry,
        }
    }
}
