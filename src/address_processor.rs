use log::{debug, info};

use crate::context::EngineContext;
use crate::error::{EngineError, EngineResult};
use crate::lookahead::set_lookahead;
use crate::model::{AddressFormat, AddressPatch};
use crate::normalize::reconcile_utxos;
use crate::traits::FetchAddressOpts;

const TX_HISTORY_PAGE_SIZE: u32 = 10;

pub async fn process_address(ctx: &EngineContext, format: AddressFormat, address: &str) -> EngineResult<()> {
    let script_pubkey = ctx.keymanager.valid_script_pubkey_from_address(address)?;
    let record = ctx
        .processor
        .fetch_address_by_script_pubkey(&script_pubkey)
        .await?
        .ok_or_else(|| {
            EngineError::InconsistentStoreState(format!(
                "processAddress invoked for {address} with no persisted AddressRecord"
            ))
        })?;
    let previously_used = record.used;

    // first visit is defined by this watch-set insert, not by last_query
    let snapshot = ctx.watch_set.insert_and_snapshot_if_new(address, format).await;
    let first_visit = snapshot.is_some();
    if let Some(snapshot) = snapshot {
        ctx.blockbook
            .watch_addresses(snapshot, ctx.watch_sink.clone())
            .await?;
    }

    // Step 3-4: balance.
    let details = ctx
        .blockbook
        .fetch_address(address, FetchAddressOpts::default())
        .await?;
    let new_balance = details.balance + details.unconfirmed_balance;
    if new_balance != record.balance {
        ctx.emitter.balance_changed(ctx.currency_code(), new_balance).await;
    }

    // Step 5: used flag.
    let used = details.txs + details.unconfirmed_txs > 0;

    // Step 6: tx-history pagination + UTXO reconciliation + persist, "in parallel".
    let existing_utxos = ctx.processor.fetch_utxos_by_script_pubkey(&script_pubkey).await?;
    let indexer_utxos = ctx.blockbook.fetch_address_utxos(address).await?;
    let (paginate_result, reconcile_result) = tokio::join!(
        paginate_transaction_history(ctx, address, record.network_query_val),
        reconcile_utxos(
            &script_pubkey,
            format,
            existing_utxos,
            indexer_utxos,
            ctx.processor.as_ref(),
            ctx.blockbook.as_ref(),
            ctx.keymanager.as_ref(),
        )
    );
    let next_query_val = paginate_result?;
    let diff = reconcile_result?;

    for utxo in diff.to_save {
        ctx.processor.save_utxo(utxo).await?;
    }
    for id in diff.to_remove {
        ctx.processor.remove_utxo(&id).await?;
    }

    ctx.processor
        .update_address(
            &script_pubkey,
            AddressPatch {
                used: Some(used),
                balance: Some(new_balance),
                network_query_val: Some(next_query_val),
                last_query: Some(chrono::Utc::now()),
                last_touched: if used { Some(chrono::Utc::now()) } else { None },
                ..Default::default()
            },
        )
        .await?;

    // Step 7: progress tick, first visit only.
    if first_visit {
        ctx.record_checked().await?;
    }

    debug!("processAddress: {address} ({format:?}) used={used} balance={new_balance}");

    // Step 8: lookahead extension on first use-flip.
    if !previously_used && used {
        if let Some(path) = record.path {
            info!("processAddress: {address} flipped to used, re-extending lookahead for {format:?}");
            set_lookahead(ctx, path.format, true).await?;
        }
    }

    Ok(())
}

// returns the new networkQueryVal checkpoint
async fn paginate_transaction_history(
    ctx: &EngineContext,
    address: &str,
    network_query_val: u64,
) -> EngineResult<u64> {
    let mut from = network_query_val;
    let mut page = 1u32;

    loop {
        let opts = FetchAddressOpts {
            details: Some("txs".to_string()),
            from: Some(from),
            per_page: Some(TX_HISTORY_PAGE_SIZE),
            page: Some(page),
        };
        let details = ctx.blockbook.fetch_address(address, opts).await?;

        let mut changed = std::collections::HashMap::new();
        for tx in &details.transactions {
            let raw = ctx.blockbook.fetch_transaction(&tx.txid).await?;
            let normalized = crate::normalize::normalize_transaction(raw, ctx.keymanager.as_ref())?;
            let block_time = normalized.block_time;
            ctx.processor.save_transaction(normalized).await?;
            changed.insert(tx.txid.clone(), block_time);
        }

        if !changed.is_empty() {
            ctx.emitter.txids_changed(changed).await;
            from += details.transactions.len() as u64;
        }

        let total_pages = details.total_pages.unwrap_or(1);
        if page >= total_pages {
            break;
        }
        page += 1;
    }

    Ok(from)
}
