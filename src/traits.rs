// consumed as trait objects; concrete implementations (HTTP/WebSocket
// indexer client, on-disk store, secp256k1 script derivation) are out of
// scope for this crate.

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::mpsc;

use crate::error::EngineResult;
use crate::model::{AddressFormat, AddressPatch, AddressPath, AddressRecord, ScriptPubkey, TransactionRecord, UtxoRecord};

#[async_trait]
pub trait Processor: Send + Sync {
    async fn fetch_address_by_script_pubkey(
        &self,
        script_pubkey: &ScriptPubkey,
    ) -> EngineResult<Option<AddressRecord>>;

    async fn fetch_address_count(&self, format: AddressFormat, branch: crate::model::Branch) -> EngineResult<u32>;

    async fn fetch_script_pubkey_by_path(&self, path: AddressPath) -> EngineResult<Option<ScriptPubkey>>;

    async fn save_address(&self, record: AddressRecord) -> EngineResult<()>;

    async fn update_address(&self, script_pubkey: &ScriptPubkey, patch: AddressPatch) -> EngineResult<()>;

    async fn fetch_transaction(&self, txid: &str) -> EngineResult<Option<TransactionRecord>>;

    async fn save_transaction(&self, transaction: TransactionRecord) -> EngineResult<()>;

    async fn fetch_utxos_by_script_pubkey(&self, script_pubkey: &ScriptPubkey) -> EngineResult<Vec<UtxoRecord>>;

    async fn save_utxo(&self, utxo: UtxoRecord) -> EngineResult<()>;

    async fn remove_utxo(&self, id: &str) -> EngineResult<()>;
}

#[derive(Debug, Clone, Default)]
pub struct FetchAddressOpts {
    pub details: Option<String>,
    pub from: Option<u64>,
    pub per_page: Option<u32>,
    pub page: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct IndexerTx {
    pub txid: String,
    pub block_height: u32,
    pub block_time: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct AddressDetails {
    pub balance: Decimal,
    pub unconfirmed_balance: Decimal,
    pub txs: u32,
    pub unconfirmed_txs: u32,
    pub transactions: Vec<IndexerTx>,
    pub total_pages: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct IndexerUtxo {
    pub txid: String,
    pub vout: u32,
    pub value: u64,
    pub height: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct IndexerVin {
    pub txid: String,
    pub vout: u32,
    // absent for some backends; the tx normalizer synthesizes it
    pub script_pubkey: Option<String>,
    pub addresses: Vec<String>,
    pub amount: u64,
}

#[derive(Debug, Clone)]
pub struct IndexerVout {
    pub index: u32,
    pub script_pubkey: String,
    pub amount: u64,
}

#[derive(Debug, Clone)]
pub struct RawTx {
    pub txid: String,
    pub hex: String,
    pub block_height: u32,
    pub block_time: Option<i64>,
    pub fees: Option<u64>,
    pub vin: Vec<IndexerVin>,
    pub vout: Vec<IndexerVout>,
}

#[derive(Debug, Clone)]
pub struct AddressChanged {
    pub address: String,
}

#[async_trait]
pub trait BlockbookClient: Send + Sync {
    async fn fetch_address(&self, address: &str, opts: FetchAddressOpts) -> EngineResult<AddressDetails>;

    async fn fetch_address_utxos(&self, address: &str) -> EngineResult<Vec<IndexerUtxo>>;

    async fn fetch_transaction(&self, txid: &str) -> EngineResult<RawTx>;

    // pushes arrive on `sink`; re-issuing this subscribes with the full
    // current watch-set snapshot
    async fn watch_addresses(
        &self,
        addresses: Vec<String>,
        sink: mpsc::UnboundedSender<AddressChanged>,
    ) -> EngineResult<()>;
}

pub struct DerivedScript {
    pub script_pubkey: ScriptPubkey,
    pub redeem_script: Option<String>,
}

pub trait KeyManager: Send + Sync {
    fn address_to_script_pubkey(&self, address: &str) -> EngineResult<ScriptPubkey>;

    fn script_pubkey_to_address(&self, script_pubkey: &ScriptPubkey, format: AddressFormat) -> EngineResult<String>;

    fn get_script_pubkey(&self, path: AddressPath) -> EngineResult<DerivedScript>;

    fn valid_script_pubkey_from_address(&self, address: &str) -> EngineResult<ScriptPubkey>;
}
