use crate::error::{EngineError, EngineResult};
use crate::model::{AddressFormat, AddressPath, Branch};
use crate::traits::Processor;

async fn is_used_at(
    processor: &dyn Processor,
    format: AddressFormat,
    branch: Branch,
    index: u32,
) -> EngineResult<bool> {
    let path = AddressPath::new(format, branch, index);
    let script_pubkey = processor
        .fetch_script_pubkey_by_path(path)
        .await?
        .ok_or_else(|| {
            EngineError::InconsistentStoreState(format!(
                "no scriptPubkey persisted for {format:?}/{branch}/{index}, \
                 but it is within the derived address count"
            ))
        })?;
    let record = processor
        .fetch_address_by_script_pubkey(&script_pubkey)
        .await?
        .ok_or_else(|| {
            EngineError::InconsistentStoreState(format!(
                "no AddressRecord for scriptPubkey {script_pubkey} derived at \
                 {format:?}/{branch}/{index}"
            ))
        })?;
    Ok(record.used)
}

// find = false skips the scan and returns the lookahead anchor
// max(0, addressCount - gapLimit) directly, used when the caller only needs a
// horizon, not the true fresh slot (e.g. get_fresh_address on a
// native-segwit wallet)
pub async fn fresh_index(
    processor: &dyn Processor,
    format: AddressFormat,
    branch: Branch,
    gap_limit: u32,
    find: bool,
) -> EngineResult<u32> {
    let address_count = processor.fetch_address_count(format, branch).await?;
    let anchor = address_count.saturating_sub(gap_limit);

    if !find {
        return Ok(anchor);
    }

    let mut i = anchor;
    loop {
        if i >= address_count {
            return Ok(i);
        }

        if is_used_at(processor, format, branch, i).await? {
            i += 1;
            continue;
        }

        if i == 0 {
            return Ok(0);
        }

        if is_used_at(processor, format, branch, i - 1).await? {
            return Ok(i);
        }

        i = i.saturating_sub(2);
    }
}
