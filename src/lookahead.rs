use log::debug;

use crate::context::EngineContext;
use crate::dispatcher::Job;
use crate::error::EngineResult;
use crate::fresh_index::fresh_index;
use crate::model::{AddressFormat, AddressPatch, AddressPath, AddressRecord};
use crate::path::supported_branches;

// holds the frontier lock for the whole call so the read-compute-write
// sequence below is linearizable against concurrent lookahead calls for
// other formats. fresh_index is re-read after every single creation: a
// concurrent process_address marking an address used mid-pass extends the
// horizon within the same call.
pub async fn set_lookahead(
    ctx: &EngineContext,
    format: AddressFormat,
    process_new_addresses: bool,
) -> EngineResult<()> {
    let _guard = ctx.frontier_lock.acquire().await;
    let gap_limit = ctx.gap_limit();

    for &branch in supported_branches(format) {
        loop {
            if ctx.cancellation.is_cancelled() {
                return Ok(());
            }

            let fresh = fresh_index(ctx.processor.as_ref(), format, branch, gap_limit, true).await?;
            let count = ctx.processor.fetch_address_count(format, branch).await?;
            let target = fresh + gap_limit;
            if count >= target {
                break;
            }

            let index = count;
            let path = AddressPath::new(format, branch, index);
            let derived = ctx.keymanager.get_script_pubkey(path)?;
            let script_pubkey = derived.script_pubkey;

            let existing = ctx.processor.fetch_address_by_script_pubkey(&script_pubkey).await?;
            let created = match existing {
                None => {
                    ctx.processor
                        .save_address(AddressRecord::new_unused(script_pubkey.clone(), Some(path)))
                        .await?;
                    true
                }
                Some(record) if record.path.is_none() => {
                    ctx.processor
                        .update_address(
                            &script_pubkey,
                            AddressPatch {
                                path: Some(path),
                                ..Default::default()
                            },
                        )
                        .await?;
                    false
                }
                Some(_) => false,
            };

            if created {
                debug!("setLookAhead: derived {format:?}/{branch}/{index} -> {script_pubkey}");
                if process_new_addresses {
                    let address = ctx.keymanager.script_pubkey_to_address(&script_pubkey, format)?;
                    let _ = ctx.dispatcher.send(Job { format, address });
                }
            }
        }
    }

    Ok(())
}
