use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::{EngineError, EngineResult};
use crate::model::{
    AddressFormat, ScriptPubkey, ScriptType, TransactionRecord, TxInput, TxOutput, UtxoRecord,
};
use crate::traits::{BlockbookClient, KeyManager, Processor, RawTx};

fn unix_to_utc(seconds: Option<i64>) -> Option<DateTime<Utc>> {
    seconds.and_then(|s| DateTime::from_timestamp(s, 0))
}

// an input that arrives without a scriptPubkey has one synthesized from its
// first declared address via the keymanager. ourIns/ourOuts/ourAmount are
// left empty; a downstream component annotates them.
pub fn normalize_transaction(raw: RawTx, keymanager: &dyn KeyManager) -> EngineResult<TransactionRecord> {
    let mut inputs = Vec::with_capacity(raw.vin.len());
    for vin in raw.vin {
        let script_pubkey = match vin.script_pubkey {
            Some(hex) => ScriptPubkey::new(hex),
            None => {
                let address = vin.addresses.first().ok_or_else(|| {
                    EngineError::MalformedIndexerData(format!(
                        "input {}:{} has neither scriptPubkey nor a declared address",
                        vin.txid, vin.vout
                    ))
                })?;
                keymanager.address_to_script_pubkey(address)?
            }
        };
        inputs.push(TxInput {
            txid: vin.txid,
            vout: vin.vout,
            script_pubkey,
            amount: vin.amount,
        });
    }

    let outputs = raw
        .vout
        .into_iter()
        .map(|vout| TxOutput {
            index: vout.index,
            script_pubkey: ScriptPubkey::new(vout.script_pubkey),
            amount: vout.amount,
        })
        .collect();

    Ok(TransactionRecord {
        txid: raw.txid,
        raw_hex: raw.hex,
        block_height: raw.block_height,
        block_time: unix_to_utc(raw.block_time),
        fees: raw.fees,
        inputs,
        outputs,
        our_ins: Vec::new(),
        our_outs: Vec::new(),
        our_amount: Decimal::ZERO,
    })
}

// prefers the store's cache, persisting a fetch from the indexer so later
// lookups hit the cache too
async fn resolve_raw_tx_hex(
    processor: &dyn Processor,
    blockbook: &dyn BlockbookClient,
    keymanager: &dyn KeyManager,
    txid: &str,
) -> EngineResult<String> {
    if let Some(existing) = processor.fetch_transaction(txid).await? {
        return Ok(existing.raw_hex);
    }
    let raw = blockbook.fetch_transaction(txid).await?;
    let normalized = normalize_transaction(raw, keymanager)?;
    let hex = normalized.raw_hex.clone();
    processor.save_transaction(normalized).await?;
    Ok(hex)
}

pub struct UtxoDiff {
    pub to_save: Vec<UtxoRecord>,
    pub to_remove: Vec<String>,
}

pub async fn reconcile_utxos(
    script_pubkey: &ScriptPubkey,
    format: AddressFormat,
    existing: Vec<UtxoRecord>,
    indexer_utxos: Vec<crate::traits::IndexerUtxo>,
    processor: &dyn Processor,
    blockbook: &dyn BlockbookClient,
    keymanager: &dyn KeyManager,
) -> EngineResult<UtxoDiff> {
    let mut stored: HashMap<String, UtxoRecord> = existing
        .into_iter()
        .map(|utxo| (utxo.id.clone(), utxo))
        .collect();

    let mut to_save = Vec::new();
    for indexer_utxo in indexer_utxos {
        let id = UtxoRecord::make_id(&indexer_utxo.txid, indexer_utxo.vout);
        if stored.remove(&id).is_some() {
            // Present both locally and on-chain: nothing to do.
            continue;
        }

        let (script, redeem_script) = match format.script_type() {
            ScriptType::P2pkh => {
                let hex = resolve_raw_tx_hex(processor, blockbook, keymanager, &indexer_utxo.txid).await?;
                (hex, None)
            }
            ScriptType::P2wpkhP2sh => {
                let derived = keymanager.get_script_pubkey(
                    // The caller already knows the path for scriptPubkey-addressed
                    // lookups; redeemScript derivation only needs the format's
                    // script shape, so any path sharing this scriptPubkey works.
                    crate::model::AddressPath::new(format, crate::model::Branch::Receive, 0),
                )?;
                (script_pubkey.as_str().to_string(), derived.redeem_script)
            }
            ScriptType::P2wpkh => (script_pubkey.as_str().to_string(), None),
        };

        to_save.push(UtxoRecord {
            id,
            txid: indexer_utxo.txid,
            vout: indexer_utxo.vout,
            value: indexer_utxo.value,
            script_pubkey: script_pubkey.clone(),
            script,
            redeem_script,
            script_type: format.script_type(),
            block_height: indexer_utxo.height.unwrap_or(0),
        });
    }

    let to_remove = stored.into_keys().collect();
    Ok(UtxoDiff { to_save, to_remove })
}
