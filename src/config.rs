//! Server configuration, read from flags or the environment

use chrono::Duration;
use clap::Parser;
use std::sync::Arc;

use crate::delegation::LedgerSettings;
use crate::notifier::{LogNotifier, Notifier, WebhookNotifier};

#[derive(Debug, Clone, Parser)]
#[command(name = "cohost")]
#[command(about = "Co-host delegation service for listings")]
#[command(version)]
pub struct Config {
    /// SQLite connection string
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:cohost.db")]
    pub database_url: String,

    /// Address the HTTP server binds to
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:3000")]
    pub bind_addr: String,

    /// Origin used to build invitation acceptance links
    #[arg(long, env = "PUBLIC_ORIGIN", default_value = "http://localhost:5173")]
    pub public_origin: String,

    /// Base URL of the notification service. Notifications are only logged when unset.
    #[arg(long, env = "NOTIFIER_URL")]
    pub notifier_url: Option<String>,

    /// Days an invitation stays acceptable
    #[arg(
        long,
        env = "INVITATION_TTL_DAYS",
        default_value_t = 7,
        value_parser = clap::value_parser!(i64).range(1..=365)
    )]
    pub invitation_ttl_days: i64,

    /// Database pool size
    #[arg(long, env = "MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,
}

impl Config {
    pub fn ledger_settings(&self) -> LedgerSettings {
        LedgerSettings {
            ttl: Duration::days(self.invitation_ttl_days),
            public_origin: self.public_origin.trim_end_matches('/').to_string(),
        }
    }

    pub fn notifier(&self) -> Arc<dyn Notifier> {
        match &self.notifier_url {
            Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
            None => Arc::new(LogNotifier),
        }
    }
}
