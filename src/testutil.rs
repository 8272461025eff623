use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::concurrency::{FrontierLock, WatchSet};
use crate::config::{CurrencyInfo, EngineConfig, WalletInfo};
use crate::context::{EngineContext, Progress};
use crate::dispatcher::Job;
use crate::error::{EngineError, EngineResult};
use crate::events::{ChannelEmitter, EventEmitter};
use crate::model::{
    AddressFormat, AddressPatch, AddressPath, AddressRecord, Branch, ScriptPubkey, TransactionRecord,
    UtxoRecord,
};
use crate::traits::{
    AddressChanged, AddressDetails, BlockbookClient, DerivedScript, FetchAddressOpts, IndexerUtxo,
    KeyManager, Processor, RawTx,
};

pub fn fake_script_pubkey(format: AddressFormat, branch: Branch, index: u32) -> ScriptPubkey {
    ScriptPubkey::new(format!("sp-{format:?}-{branch:?}-{index}"))
}

#[derive(Default)]
struct FakeProcessorInner {
    addresses: HashMap<String, AddressRecord>,
    by_path: HashMap<(AddressFormat, Branch, u32), String>,
    counts: HashMap<(AddressFormat, Branch), u32>,
    transactions: HashMap<String, TransactionRecord>,
    utxos: HashMap<String, UtxoRecord>,
}

// index-addressable so fresh-index and lookahead tests can seed arbitrary
// branch states directly
pub struct FakeProcessor {
    inner: Mutex<FakeProcessorInner>,
}

impl FakeProcessor {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(FakeProcessorInner::default()),
        }
    }

    pub async fn seed_unused_range(&self, format: AddressFormat, branch: Branch, start: u32, end: u32) {
        let mut inner = self.inner.lock().await;
        for index in start..end {
            let sp = fake_script_pubkey(format, branch, index);
            let path = AddressPath::new(format, branch, index);
            inner
                .by_path
                .insert((format, branch, index), sp.0.clone());
            inner
                .addresses
                .insert(sp.0.clone(), AddressRecord::new_unused(sp, Some(path)));
        }
        let count = inner.counts.entry((format, branch)).or_insert(0);
        *count = (*count).max(end);
    }

    pub async fn mark_used(&self, format: AddressFormat, branch: Branch, index: u32) {
        let mut inner = self.inner.lock().await;
        let sp = inner
            .by_path
            .get(&(format, branch, index))
            .cloned()
            .expect("index must be seeded first");
        inner.addresses.get_mut(&sp).unwrap().used = true;
    }

    pub async fn address_count(&self, format: AddressFormat, branch: Branch) -> u32 {
        self.inner
            .lock()
            .await
            .counts
            .get(&(format, branch))
            .copied()
            .unwrap_or(0)
    }

    pub async fn record_at(&self, format: AddressFormat, branch: Branch, index: u32) -> Option<AddressRecord> {
        let inner = self.inner.lock().await;
        let sp = inner.by_path.get(&(format, branch, index))?;
        inner.addresses.get(sp).cloned()
    }
}

#[async_trait]
impl Processor for FakeProcessor {
    async fn fetch_address_by_script_pubkey(
        &self,
        script_pubkey: &ScriptPubkey,
    ) -> EngineResult<Option<AddressRecord>> {
        Ok(self.inner.lock().await.addresses.get(&script_pubkey.0).cloned())
    }

    async fn fetch_address_count(&self, format: AddressFormat, branch: Branch) -> EngineResult<u32> {
        Ok(self.address_count(format, branch).await)
    }

    async fn fetch_script_pubkey_by_path(&self, path: AddressPath) -> EngineResult<Option<ScriptPubkey>> {
        Ok(self
            .inner
            .lock()
            .await
            .by_path
            .get(&(path.format, path.branch, path.address_index))
            .cloned()
            .map(ScriptPubkey::new))
    }

    async fn save_address(&self, record: AddressRecord) -> EngineResult<()> {
        let mut inner = self.inner.lock().await;
        if let Some(path) = record.path {
            inner
                .by_path
                .insert((path.format, path.branch, path.address_index), record.script_pubkey.0.clone());
            let count = inner.counts.entry((path.format, path.branch)).or_insert(0);
            *count = (*count).max(path.address_index + 1);
        }
        inner.addresses.entry(record.script_pubkey.0.clone()).or_insert(record);
        Ok(())
    }

    async fn update_address(&self, script_pubkey: &ScriptPubkey, patch: AddressPatch) -> EngineResult<()> {
        let mut inner = self.inner.lock().await;
        if let Some(path) = patch.path {
            inner
                .by_path
                .insert((path.format, path.branch, path.address_index), script_pubkey.0.clone());
            let count = inner.counts.entry((path.format, path.branch)).or_insert(0);
            *count = (*count).max(path.address_index + 1);
        }
        let record = inner.addresses.get_mut(&script_pubkey.0).ok_or_else(|| {
            EngineError::InconsistentStoreState(format!("no address record for {script_pubkey}"))
        })?;
        if let Some(path) = patch.path {
            record.path = Some(path);
        }
        if let Some(used) = patch.used {
            record.used = used;
        }
        if let Some(balance) = patch.balance {
            record.balance = balance;
        }
        if let Some(network_query_val) = patch.network_query_val {
            record.network_query_val = network_query_val;
        }
        if let Some(last_query) = patch.last_query {
            record.last_query = Some(last_query);
        }
        if let Some(last_touched) = patch.last_touched {
            record.last_touched = Some(last_touched);
        }
        Ok(())
    }

    async fn fetch_transaction(&self, txid: &str) -> EngineResult<Option<TransactionRecord>> {
        Ok(self.inner.lock().await.transactions.get(txid).cloned())
    }

    async fn save_transaction(&self, transaction: TransactionRecord) -> EngineResult<()> {
        self.inner
            .lock()
            .await
            .transactions
            .insert(transaction.txid.clone(), transaction);
        Ok(())
    }

    async fn fetch_utxos_by_script_pubkey(&self, script_pubkey: &ScriptPubkey) -> EngineResult<Vec<UtxoRecord>> {
        Ok(self
            .inner
            .lock()
            .await
            .utxos
            .values()
            .filter(|utxo| utxo.script_pubkey == *script_pubkey)
            .cloned()
            .collect())
    }

    async fn save_utxo(&self, utxo: UtxoRecord) -> EngineResult<()> {
        self.inner.lock().await.utxos.insert(utxo.id.clone(), utxo);
        Ok(())
    }

    async fn remove_utxo(&self, id: &str) -> EngineResult<()> {
        self.inner.lock().await.utxos.remove(id);
        Ok(())
    }
}

#[derive(Default)]
struct FakeBlockbookInner {
    addresses: HashMap<String, AddressDetails>,
    utxos: HashMap<String, Vec<IndexerUtxo>>,
    transactions: HashMap<String, RawTx>,
    last_watch: Option<mpsc::UnboundedSender<AddressChanged>>,
}

// canned per-address responses, plus trigger_change to simulate a push event
// on the most recent subscription
pub struct FakeBlockbookClient {
    inner: StdMutex<FakeBlockbookInner>,
}

impl FakeBlockbookClient {
    pub fn new() -> Self {
        Self {
            inner: StdMutex::new(FakeBlockbookInner::default()),
        }
    }

    pub fn set_address_details(&self, address: &str, details: AddressDetails) {
        self.inner
            .lock()
            .unwrap()
            .addresses
            .insert(address.to_string(), details);
    }

    pub fn set_utxos(&self, address: &str, utxos: Vec<IndexerUtxo>) {
        self.inner.lock().unwrap().utxos.insert(address.to_string(), utxos);
    }

    pub fn set_transaction(&self, raw: RawTx) {
        self.inner.lock().unwrap().transactions.insert(raw.txid.clone(), raw);
    }

    pub async fn trigger_change(&self, address: &str) {
        let sender = self.inner.lock().unwrap().last_watch.clone();
        if let Some(sender) = sender {
            let _ = sender.send(AddressChanged {
                address: address.to_string(),
            });
        }
    }
}

#[async_trait]
impl BlockbookClient for FakeBlockbookClient {
    async fn fetch_address(&self, address: &str, _opts: FetchAddressOpts) -> EngineResult<AddressDetails> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .addresses
            .get(address)
            .cloned()
            .unwrap_or(AddressDetails {
                balance: Decimal::ZERO,
                unconfirmed_balance: Decimal::ZERO,
                txs: 0,
                unconfirmed_txs: 0,
                transactions: vec![],
                total_pages: Some(1),
            }))
    }

    async fn fetch_address_utxos(&self, address: &str) -> EngineResult<Vec<IndexerUtxo>> {
        Ok(self.inner.lock().unwrap().utxos.get(address).cloned().unwrap_or_default())
    }

    async fn fetch_transaction(&self, txid: &str) -> EngineResult<RawTx> {
        self.inner
            .lock()
            .unwrap()
            .transactions
            .get(txid)
            .cloned()
            .ok_or_else(|| EngineError::MalformedIndexerData(format!("unknown txid {txid}")))
    }

    async fn watch_addresses(
        &self,
        _addresses: Vec<String>,
        sink: mpsc::UnboundedSender<AddressChanged>,
    ) -> EngineResult<()> {
        self.inner.lock().unwrap().last_watch = Some(sink);
        Ok(())
    }
}

// deterministic string mapping, no real cryptography
pub struct FakeKeyManager;

impl FakeKeyManager {
    pub fn new() -> Self {
        Self
    }
}

impl KeyManager for FakeKeyManager {
    fn address_to_script_pubkey(&self, address: &str) -> EngineResult<ScriptPubkey> {
        Ok(ScriptPubkey::new(format!("sp-for-{address}")))
    }

    fn script_pubkey_to_address(&self, script_pubkey: &ScriptPubkey, _format: AddressFormat) -> EngineResult<String> {
        Ok(format!("addr-for-{}", script_pubkey.0))
    }

    fn get_script_pubkey(&self, path: AddressPath) -> EngineResult<DerivedScript> {
        let script_pubkey = fake_script_pubkey(path.format, path.branch, path.address_index);
        let redeem_script = match path.format.script_type() {
            crate::model::ScriptType::P2wpkhP2sh => Some(format!("redeem-{}", script_pubkey.0)),
            _ => None,
        };
        Ok(DerivedScript {
            script_pubkey,
            redeem_script,
        })
    }

    fn valid_script_pubkey_from_address(&self, address: &str) -> EngineResult<ScriptPubkey> {
        self.address_to_script_pubkey(address)
    }
}

pub fn build_context(
    gap_limit: u32,
    formats: Vec<AddressFormat>,
) -> (
    Arc<EngineContext>,
    mpsc::UnboundedReceiver<Job>,
    Arc<FakeProcessor>,
    Arc<FakeBlockbookClient>,
) {
    let processor = Arc::new(FakeProcessor::new());
    let blockbook = Arc::new(FakeBlockbookClient::new());
    let keymanager: Arc<dyn KeyManager> = Arc::new(FakeKeyManager::new());
    let emitter: Arc<dyn EventEmitter> = Arc::new(ChannelEmitter::new(64));
    let (sender, receiver) = mpsc::unbounded_channel();
    let (watch_sink, _watch_rx) = mpsc::unbounded_channel();

    let config = EngineConfig {
        currency_info: CurrencyInfo {
            gap_limit,
            network: "testnet".to_string(),
            currency_code: "BTC".to_string(),
        },
        wallet_info: WalletInfo { formats },
    };

    let ctx = Arc::new(EngineContext {
        processor: processor.clone() as Arc<dyn Processor>,
        blockbook: blockbook.clone() as Arc<dyn BlockbookClient>,
        keymanager,
        emitter,
        config,
        frontier_lock: FrontierLock::new(),
        watch_set: WatchSet::new(),
        dispatcher: sender,
        watch_sink,
        progress: Progress::default(),
        cancellation: CancellationToken::new(),
    });

    (ctx, receiver, processor, blockbook)
}
