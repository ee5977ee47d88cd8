//! Shared setup for delegation unit tests

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{DelegationManager, Invitation, LedgerSettings};
use crate::clock::ManualClock;
use crate::error::{AppError, Result};
use crate::models::CreateInvitationRequest;
use crate::notifier::Notifier;
use crate::store::Store;

pub(crate) const LISTING: &str = "listing-1";
pub(crate) const OWNER: &str = "owner-1";

#[derive(Debug, Clone)]
pub(crate) struct Sent {
    pub email: String,
    pub template_id: String,
    pub payload: serde_json::Value,
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    sent: Mutex<Vec<Sent>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Wait until at least `count` notifications were attempted
    pub async fn wait_for(&self, count: usize) -> Vec<Sent> {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                {
                    let sent = self.sent.lock().unwrap();
                    if sent.len() >= count {
                        return sent.clone();
                    }
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("notification was not delivered")
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, email: &str, template_id: &str, payload: serde_json::Value) -> Result<()> {
        self.sent.lock().unwrap().push(Sent {
            email: email.to_string(),
            template_id: template_id.to_string(),
            payload,
        });
        if self.fail {
            return Err(AppError::Notifier("mailbox unavailable".to_string()));
        }
        Ok(())
    }
}

pub(crate) struct Harness {
    pub store: Store,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub manager: DelegationManager,
}

pub(crate) async fn harness() -> Harness {
    harness_with(RecordingNotifier::default()).await
}

pub(crate) async fn harness_with(notifier: RecordingNotifier) -> Harness {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");

    let store = Store::new(pool);
    store.migrate().await.expect("Failed to run migrations");
    store
        .register_listing(LISTING, OWNER)
        .await
        .expect("Failed to seed listing");

    let clock = Arc::new(ManualClock::new(Utc::now()));
    let notifier = Arc::new(notifier);
    let manager = DelegationManager::new(
        store.clone(),
        notifier.clone(),
        clock.clone(),
        LedgerSettings::default(),
    );

    Harness {
        store,
        clock,
        notifier,
        manager,
    }
}

pub(crate) fn invite_request(email: &str, permissions: &[&str]) -> CreateInvitationRequest {
    CreateInvitationRequest {
        email: email.to_string(),
        role: "co_host".to_string(),
        permissions: permissions.iter().map(|p| p.to_string()).collect(),
        title: None,
        message: None,
    }
}

impl Harness {
    /// Owner invites `email` with the given permissions
    pub async fn invite(&self, email: &str, permissions: &[&str]) -> Invitation {
        self.manager
            .ledger
            .create(LISTING, OWNER, invite_request(email, permissions))
            .await
            .expect("Failed to create invitation")
    }
}
