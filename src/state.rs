use crate::config::ServerConfig;
use crate::model::{Receipt, ReceiptId};
use crate::shutdown::{ShutdownConfig, ShutdownCoordinator};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("no receipt stored under id '{0}'")]
    NotFound(String),
}

/// Write-once, read-many receipt storage keyed by random identifiers.
#[derive(Debug, Default)]
pub struct ReceiptStore {
    receipts: RwLock<HashMap<ReceiptId, Arc<Receipt>>>,
    lookups: AtomicU64,
    misses: AtomicU64,
}

impl ReceiptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// File `receipt` under a freshly generated identifier.
    pub fn insert(&self, receipt: Receipt) -> ReceiptId {
        let receipt = Arc::new(receipt);
        let mut receipts = self.receipts.write();
        let id = loop {
            let candidate = ReceiptId::generate();
            if !receipts.contains_key(&candidate) {
                break candidate;
            }
        };
        receipts.insert(id, receipt);
        debug!(receipt_id = %id, stored = receipts.len(), "receipt stored");
        id
    }

    pub fn get(&self, id: &ReceiptId) -> Option<Arc<Receipt>> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let found = self.receipts.read().get(id).cloned();
        if found.is_none() {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Look up by the textual identifier taken from a request path.
    ///
    /// Text that is not a well-formed identifier cannot name a stored receipt
    /// and is reported as not found.
    pub fn lookup(&self, raw_id: &str) -> Result<Arc<Receipt>, StoreError> {
        let found = match raw_id.parse::<ReceiptId>() {
            Ok(id) => self.get(&id),
            Err(_) => {
                self.lookups.fetch_add(1, Ordering::Relaxed);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        };
        found.ok_or_else(|| StoreError::NotFound(raw_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.receipts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.receipts.read().is_empty()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            receipts: self.len(),
            lookups: self.lookups.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub receipts: usize,
    pub lookups: u64,
    pub misses: u64,
}

/// Shared state handed to every request handler.
pub struct AppState {
    config: Arc<ServerConfig>,
    store: ReceiptStore,
    shutdown: Arc<ShutdownCoordinator>,
}

impl AppState {
    pub fn new(config: Arc<ServerConfig>) -> Self {
        let shutdown_config =
            ShutdownConfig::default().with_total_timeout(config.graceful_shutdown_timeout_secs);
        Self {
            config,
            store: ReceiptStore::new(),
            shutdown: Arc::new(ShutdownCoordinator::new(shutdown_config)),
        }
    }

    pub fn shutdown(&self) -> Arc<ShutdownCoordinator> {
        self.shutdown.clone()
    }

    pub fn config(&self) -> Arc<ServerConfig> {
        self.config.clone()
    }

    pub fn store(&self) -> &ReceiptStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Item;
    use std::collections::HashSet;
    use std::thread;

    fn sample() -> Receipt {
        Receipt {
            retailer: "Target".to_string(),
            purchase_date: "2022-01-01".to_string(),
            purchase_time: "13:01".to_string(),
            total: "1.25".to_string(),
            items: vec![Item {
                short_description: "Pepsi".to_string(),
                price: "1.25".to_string(),
            }],
        }
    }

    #[test]
    fn insert_then_lookup() {
        let store = ReceiptStore::new();
        let id = store.insert(sample());
        assert_eq!(store.len(), 1);
        let found = store.lookup(&id.to_string()).expect("stored receipt");
        assert_eq!(*found, sample());
    }

    #[test]
    fn lookup_unknown_and_malformed_ids() {
        let store = ReceiptStore::new();
        store.insert(sample());

        let unknown = ReceiptId::generate().to_string();
        assert_eq!(
            store.lookup(&unknown),
            Err(StoreError::NotFound(unknown.clone()))
        );
        assert_eq!(
            store.lookup("not-an-id"),
            Err(StoreError::NotFound("not-an-id".to_string()))
        );

        let stats = store.stats();
        assert_eq!(stats.receipts, 1);
        assert_eq!(stats.lookups, 2);
        assert_eq!(stats.misses, 2);
    }

    #[test]
    fn concurrent_inserts_get_unique_ids() {
        let store = Arc::new(ReceiptStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || (0..50).map(|_| store.insert(sample())).collect::<Vec<_>>())
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            for id in handle.join().expect("insert thread") {
                assert!(ids.insert(id));
            }
        }
        assert_eq!(ids.len(), 400);
        assert_eq!(store.len(), 400);
    }

    #[test]
    fn app_state_bounds_shutdown_by_config() {
        let config = ServerConfig {
            graceful_shutdown_timeout_secs: 3,
            ..ServerConfig::default()
        };
        let state = AppState::new(Arc::new(config));
        assert!(state.store().is_empty());
        assert_eq!(
            state.shutdown().config().total_timeout,
            std::time::Duration::from_secs(3)
        );
    }
}
