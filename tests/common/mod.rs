//! Shared setup for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::Router;
use chrono::Utc;
use cohost::clock::ManualClock;
use cohost::delegation::{DelegationManager, LedgerSettings};
use cohost::error::Result;
use cohost::notifier::Notifier;
use cohost::store::Store;
use cohost::AppState;
use hyper::{Request, StatusCode};
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

pub const LISTING: &str = "listing-1";
pub const OWNER: &str = "owner-1";

/// Keeps every notification so tests can pull the acceptance link out of it
#[derive(Default)]
pub struct Outbox {
    sent: Mutex<Vec<(String, Value)>>,
}

impl Outbox {
    pub async fn wait_for(&self, count: usize) -> Vec<(String, Value)> {
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
impl Notifier for Outbox {
    async fn send(&self, email: &str, _template_id: &str, payload: Value) -> Result<()> {
        self.sent.lock().unwrap().push((email.to_string(), payload));
        Ok(())
    }
}

pub struct TestApp {
    pub app: Router,
    pub manager: DelegationManager,
    pub store: Store,
    pub clock: Arc<ManualClock>,
    pub outbox: Arc<Outbox>,
}

pub async fn setup_app() -> TestApp {
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
    let outbox = Arc::new(Outbox::default());
    let state = AppState::new(
        store.clone(),
        outbox.clone(),
        clock.clone(),
        LedgerSettings::default(),
    );

    TestApp {
        manager: state.manager.clone(),
        app: cohost::api::router(state),
        store,
        clock,
        outbox,
    }
}

impl TestApp {
    /// Send a request and decode the JSON response body (Null when empty or not JSON)
    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        actor: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(actor) = actor {
            builder = builder.header("x-actor-id", actor);
        }

        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        (status, json)
    }

    /// Owner invites `email`; returns the invitation body and its token
    pub async fn invite(&self, email: &str, permissions: &[&str]) -> (Value, String) {
        let (status, body) = self
            .call(
                "POST",
                &format!("/listings/{}/invitations", LISTING),
                Some(OWNER),
                Some(serde_json::json!({
                    "email": email,
                    "role": "co_host",
                    "permissions": permissions,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "invite failed: {}", body);

        let token = body["accept_url"]
            .as_str()
            .and_then(|url| url.rsplit('/').next())
            .expect("accept_url missing")
            .to_string();
        (body, token)
    }
}
