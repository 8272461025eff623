use std::collections::HashMap;

use tokio::sync::{Mutex, MutexGuard};

use crate::model::AddressFormat;

// serializes the read-compute-write sequence in set_lookahead; process_address
// never takes this lock itself
#[derive(Debug, Default)]
pub struct FrontierLock(Mutex<()>);

impl FrontierLock {
    pub fn new() -> Self {
        Self(Mutex::new(()))
    }

    pub async fn acquire(&self) -> MutexGuard<'_, ()> {
        self.0.lock().await
    }
}

// addresses with an active indexer push subscription, tagged with the format
// they were watched under so a later push can be routed back to a Job
#[derive(Debug, Default)]
pub struct WatchSet(Mutex<HashMap<String, AddressFormat>>);

impl WatchSet {
    pub fn new() -> Self {
        Self(Mutex::new(HashMap::new()))
    }

    // returns a full snapshot of watched addresses (including the new one) if
    // `address` was newly inserted, None if it was already being watched
    pub async fn insert_and_snapshot_if_new(
        &self,
        address: &str,
        format: AddressFormat,
    ) -> Option<Vec<String>> {
        let mut set = self.0.lock().await;
        if set.contains_key(address) {
            return None;
        }
        set.insert(address.to_string(), format);
        Some(set.keys().cloned().collect())
    }

    pub async fn format_of(&self, address: &str) -> Option<AddressFormat> {
        self.0.lock().await.get(address).copied()
    }

    pub async fn contains(&self, address: &str) -> bool {
        self.0.lock().await.contains_key(address)
    }

    pub async fn len(&self) -> usize {
        self.0.lock().await.len()
    }
}
