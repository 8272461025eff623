pub mod concurrency;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod events;
pub mod fresh_index;
pub mod log;
pub mod lookahead;
pub mod model;
pub mod normalize;
pub mod address_processor;
pub mod path;
pub mod scan_driver;
pub mod traits;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::{CurrencyInfo, EngineConfig, WalletInfo};
pub use engine::{Engine, FreshAddress};
pub use error::{EngineError, EngineResult, ResultExt};
pub use events::{ChannelEmitter, EngineEvent, ErrorScope, EventEmitter};
pub use log::init_log;
pub use model::{
    AddressFormat, AddressPatch, AddressPath, AddressRecord, Branch, PurposeType, ScriptPubkey,
    ScriptType, TransactionRecord, TxInput, TxOutput, UtxoRecord,
};
pub use traits::{
    AddressChanged, AddressDetails, BlockbookClient, DerivedScript, FetchAddressOpts, IndexerTx,
    IndexerUtxo, IndexerVin, IndexerVout, KeyManager, Processor, RawTx,
};
