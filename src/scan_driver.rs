use log::info;

use crate::address_processor::process_address;
use crate::context::EngineContext;
use crate::error::EngineResult;
use crate::model::{AddressFormat, AddressPath};
use crate::path::supported_branches;

// walks every already-persisted address of `format` across its supported
// branches, dispatching process_address directly (not through the dispatcher
// queue) in waves of gapLimit. once this returns, format is caught up; the
// reactive subscription path keeps it current from here on.
pub async fn scan_format(ctx: &EngineContext, format: AddressFormat) -> EngineResult<()> {
    for &branch in supported_branches(format) {
        scan_branch(ctx, format, branch).await?;
    }
    Ok(())
}

async fn scan_branch(ctx: &EngineContext, format: AddressFormat, branch: crate::model::Branch) -> EngineResult<()> {
    let count = ctx.processor.fetch_address_count(format, branch).await?;
    let wave_size = ctx.gap_limit().max(1) as usize;

    let mut index = 0u32;
    while index < count {
        if ctx.cancellation.is_cancelled() {
            return Ok(());
        }

        let wave_end = (index + wave_size as u32).min(count);
        let mut wave = Vec::with_capacity(wave_size);
        for i in index..wave_end {
            wave.push(scan_one(ctx, format, branch, i));
        }
        for result in futures::future::join_all(wave).await {
            result?;
        }
        index = wave_end;
    }

    info!("scanFormat: {format:?}/{branch} caught up at {count} addresses");
    Ok(())
}

async fn scan_one(
    ctx: &EngineContext,
    format: AddressFormat,
    branch: crate::model::Branch,
    index: u32,
) -> EngineResult<()> {
    let path = AddressPath::new(format, branch, index);
    let script_pubkey = ctx
        .processor
        .fetch_script_pubkey_by_path(path)
        .await?
        .ok_or_else(|| {
            crate::error::EngineError::InconsistentStoreState(format!(
                "no scriptPubkey persisted for {format:?}/{branch}/{index} during scan"
            ))
        })?;
    let address = ctx.keymanager.script_pubkey_to_address(&script_pubkey, format)?;
    process_address(ctx, format, &address).await
}
