use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::broadcast;

use crate::error::EngineError;

// lets a host tell an address-local hiccup apart from a fatal per-format one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorScope {
    Address(String),
    Format(crate::model::AddressFormat),
}

#[derive(Debug, Clone)]
pub enum EngineEvent {
    AddressesChecked(f64),
    BalanceChanged {
        currency_code: String,
        balance: Decimal,
    },
    TxidsChanged(HashMap<String, Option<DateTime<Utc>>>),
    SyncError {
        scope: ErrorScope,
        error: EngineError,
    },
}

#[async_trait]
pub trait EventEmitter: Send + Sync {
    async fn addresses_checked(&self, ratio: f64);
    async fn balance_changed(&self, currency_code: &str, balance: Decimal);
    async fn txids_changed(&self, changed: HashMap<String, Option<DateTime<Utc>>>);
    async fn sync_error(&self, scope: ErrorScope, error: EngineError);
}

// forwards every event onto a broadcast channel so a host can subscribe
// instead of implementing EventEmitter itself
pub struct ChannelEmitter {
    sender: broadcast::Sender<EngineEvent>,
}

impl ChannelEmitter {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl EventEmitter for ChannelEmitter {
    async fn addresses_checked(&self, ratio: f64) {
        let _ = self.sender.send(EngineEvent::AddressesChecked(ratio));
    }

    async fn balance_changed(&self, currency_code: &str, balance: Decimal) {
        let _ = self.sender.send(EngineEvent::BalanceChanged {
            currency_code: currency_code.to_string(),
            balance,
        });
    }

    async fn txids_changed(&self, changed: HashMap<String, Option<DateTime<Utc>>>) {
        let _ = self.sender.send(EngineEvent::TxidsChanged(changed));
    }

    async fn sync_error(&self, scope: ErrorScope, error: EngineError) {
        let _ = self.sender.send(EngineEvent::SyncError { scope, error });
    }
}
