use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::concurrency::{FrontierLock, WatchSet};
use crate::config::EngineConfig;
use crate::dispatcher::Job;
use crate::error::EngineResult;
use crate::events::EventEmitter;
use crate::path::supported_branches;
use crate::traits::{AddressChanged, BlockbookClient, KeyManager, Processor};

#[derive(Debug, Default)]
pub struct Progress {
    processed: AtomicU64,
}

impl Progress {
    fn bump(&self) -> u64 {
        self.processed.fetch_add(1, Ordering::SeqCst) + 1
    }
}

pub struct EngineContext {
    pub processor: Arc<dyn Processor>,
    pub blockbook: Arc<dyn BlockbookClient>,
    pub keymanager: Arc<dyn KeyManager>,
    pub emitter: Arc<dyn EventEmitter>,
    pub config: EngineConfig,
    pub frontier_lock: FrontierLock,
    pub watch_set: WatchSet,
    pub dispatcher: mpsc::UnboundedSender<Job>,
    // every watch_addresses subscription is given this sink; pushes land here
    // and get re-routed to the dispatcher by engine::spawn_watch_forwarder
    pub watch_sink: mpsc::UnboundedSender<AddressChanged>,
    pub progress: Progress,
    pub cancellation: CancellationToken,
}

impl EngineContext {
    pub fn gap_limit(&self) -> u32 {
        self.config.currency_info.gap_limit
    }

    pub fn currency_code(&self) -> &str {
        &self.config.currency_info.currency_code
    }

    // recomputed on every tick so it rises along with lookahead extension
    // instead of being fixed at start()
    async fn total_count(&self) -> EngineResult<u64> {
        let gap_limit = self.gap_limit() as u64;
        let mut total = 0u64;
        for format in &self.config.wallet_info.formats {
            for branch in supported_branches(*format) {
                let count = self.processor.fetch_address_count(*format, *branch).await? as u64;
                total += count.max(gap_limit);
            }
        }
        Ok(total)
    }

    pub async fn record_checked(&self) -> EngineResult<()> {
        let processed = self.progress.bump();
        let total = self.total_count().await?.max(1);
        let ratio = (processed as f64 / total as f64).min(1.0);
        self.emitter.addresses_checked(ratio).await;
        Ok(())
    }
}
