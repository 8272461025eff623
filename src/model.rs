use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// a wallet may declare more than one of these; the engine syncs all of them
// in parallel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressFormat {
    Bip32Legacy,
    Bip44Airbitz,
    Bip49WrappedSegwit,
    Bip84Segwit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PurposeType {
    Legacy,
    Airbitz,
    WrappedSegwit,
    Segwit,
}

impl AddressFormat {
    pub fn purpose_type(self) -> PurposeType {
        match self {
            AddressFormat::Bip32Legacy => PurposeType::Legacy,
            AddressFormat::Bip44Airbitz => PurposeType::Airbitz,
            AddressFormat::Bip49WrappedSegwit => PurposeType::WrappedSegwit,
            AddressFormat::Bip84Segwit => PurposeType::Segwit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Branch {
    Receive = 0,
    Change = 1,
}

impl Branch {
    pub fn index(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Branch::Receive => write!(f, "receive"),
            Branch::Change => write!(f, "change"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressPath {
    pub format: AddressFormat,
    pub branch: Branch,
    pub address_index: u32,
}

impl AddressPath {
    pub fn new(format: AddressFormat, branch: Branch, address_index: u32) -> Self {
        Self {
            format,
            branch,
            address_index,
        }
    }
}

// hex serialization of an output-locking script, the canonical
// address-record key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScriptPubkey(pub String);

impl ScriptPubkey {
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScriptPubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressRecord {
    pub script_pubkey: ScriptPubkey,
    pub path: Option<AddressPath>,
    pub used: bool,
    pub balance: Decimal,
    pub network_query_val: u64,
    pub last_query: Option<DateTime<Utc>>,
    pub last_touched: Option<DateTime<Utc>>,
}

impl AddressRecord {
    pub fn new_unused(script_pubkey: ScriptPubkey, path: Option<AddressPath>) -> Self {
        Self {
            script_pubkey,
            path,
            used: false,
            balance: Decimal::ZERO,
            network_query_val: 0,
            last_query: None,
            last_touched: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AddressPatch {
    pub path: Option<AddressPath>,
    pub used: Option<bool>,
    pub balance: Option<Decimal>,
    pub network_query_val: Option<u64>,
    pub last_query: Option<DateTime<Utc>>,
    pub last_touched: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxInput {
    pub txid: String,
    pub vout: u32,
    pub script_pubkey: ScriptPubkey,
    pub amount: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxOutput {
    pub index: u32,
    pub script_pubkey: ScriptPubkey,
    pub amount: u64,
}

// our_ins/our_outs/our_amount are annotation slots left empty by the
// normalizer; a downstream component populates them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub txid: String,
    pub raw_hex: String,
    pub block_height: u32,
    pub block_time: Option<DateTime<Utc>>,
    pub fees: Option<u64>,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub our_ins: Vec<u32>,
    pub our_outs: Vec<u32>,
    pub our_amount: Decimal,
}

impl TransactionRecord {
    pub fn is_confirmed(&self) -> bool {
        self.block_height > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptType {
    P2pkh,
    P2wpkhP2sh,
    P2wpkh,
}

impl AddressFormat {
    pub fn script_type(self) -> ScriptType {
        match self.purpose_type() {
            PurposeType::Legacy | PurposeType::Airbitz => ScriptType::P2pkh,
            PurposeType::WrappedSegwit => ScriptType::P2wpkhP2sh,
            PurposeType::Segwit => ScriptType::P2wpkh,
        }
    }
}

// id = txid + '_' + vout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtxoRecord {
    pub id: String,
    pub txid: String,
    pub vout: u32,
    pub value: u64,
    pub script_pubkey: ScriptPubkey,
    pub script: String,
    pub redeem_script: Option<String>,
    pub script_type: ScriptType,
    pub block_height: u32,
}

impl UtxoRecord {
    pub fn make_id(txid: &str, vout: u32) -> String {
        format!("{txid}_{vout}")
    }
}
