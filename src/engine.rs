use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{info, warn};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;

use crate::concurrency::{FrontierLock, WatchSet};
use crate::config::EngineConfig;
use crate::context::{EngineContext, Progress};
use crate::dispatcher::{spawn_dispatcher, Job};
use crate::error::{EngineError, EngineResult};
use crate::events::EventEmitter;
use crate::lookahead::set_lookahead;
use crate::model::{AddressFormat, AddressPatch, AddressRecord, ScriptPubkey};
use crate::path::supported_branches;
use crate::scan_driver::scan_format;
use crate::traits::{AddressChanged, BlockbookClient, KeyManager, Processor};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreshAddress {
    pub public_address: String,
    pub segwit_address: Option<String>,
    pub legacy_address: Option<String>,
}

pub struct Engine {
    ctx: Arc<EngineContext>,
    started: AtomicBool,
    tasks: AsyncMutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl Engine {
    // validates config and wires the collaborators into a shared
    // EngineContext; touches neither the network nor the store
    pub fn new(
        config: EngineConfig,
        processor: Arc<dyn Processor>,
        blockbook: Arc<dyn BlockbookClient>,
        keymanager: Arc<dyn KeyManager>,
        emitter: Arc<dyn EventEmitter>,
    ) -> EngineResult<Self> {
        config.validate()?;

        let (dispatcher_tx, dispatcher_rx) = mpsc::unbounded_channel::<Job>();
        let (watch_tx, watch_rx) = mpsc::unbounded_channel::<AddressChanged>();

        let ctx = Arc::new(EngineContext {
            processor,
            blockbook,
            keymanager,
            emitter,
            config,
            frontier_lock: FrontierLock::new(),
            watch_set: WatchSet::new(),
            dispatcher: dispatcher_tx,
            watch_sink: watch_tx,
            progress: Progress::default(),
            cancellation: CancellationToken::new(),
        });

        let watch_handle = spawn_watch_forwarder(ctx.clone(), dispatcher_rx, watch_rx);

        Ok(Self {
            ctx,
            started: AtomicBool::new(false),
            tasks: AsyncMutex::new(vec![watch_handle]),
        })
    }

    // dispatches the per-format lookahead + scan passes onto the runtime and
    // returns without waiting for them; errors with AlreadyStarted on a
    // second call
    pub async fn start(&self) -> EngineResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(EngineError::AlreadyStarted);
        }

        let mut tasks = self.tasks.lock().await;
        for format in self.ctx.config.wallet_info.formats.clone() {
            let ctx = self.ctx.clone();
            tasks.push(tokio::spawn(async move {
                info!("engine: starting sync for format {format:?}");
                if let Err(err) = set_lookahead(&ctx, format, true).await {
                    warn!("engine: initial setLookAhead failed for {format:?}: {err}");
                    ctx.emitter
                        .sync_error(crate::events::ErrorScope::Format(format), err)
                        .await;
                    return;
                }
                if let Err(err) = scan_format(&ctx, format).await {
                    warn!("engine: scan driver failed for {format:?}: {err}");
                    ctx.emitter
                        .sync_error(crate::events::ErrorScope::Format(format), err)
                        .await;
                }
            }));
        }

        Ok(())
    }

    // signals cancellation to every suspension point; does not forcibly abort
    // in-flight tasks, every store mutation is additive so cooperative
    // cancellation is safe
    pub fn stop(&self) {
        self.ctx.cancellation.cancel();
    }

    pub async fn get_fresh_address(&self, change: bool) -> EngineResult<FreshAddress> {
        let format = self
            .ctx
            .config
            .wallet_info
            .formats
            .first()
            .copied()
            .ok_or_else(|| EngineError::ConfigError("walletInfo declares no formats".to_string()))?;
        self.get_fresh_address_for(format, change).await
    }

    async fn get_fresh_address_for(&self, format: AddressFormat, change: bool) -> EngineResult<FreshAddress> {
        use crate::fresh_index::fresh_index;
        use crate::model::{AddressPath, Branch, PurposeType};

        let branch = if change && format.purpose_type() != PurposeType::Airbitz {
            Branch::Change
        } else {
            Branch::Receive
        };

        if format.purpose_type() == PurposeType::Segwit {
            // same HD index, derived under both the wrapped- and
            // native-segwit formats: the P2SH wrapper and the native witness
            // program differ even though they share a key. neither index is
            // rescanned (find=false).
            let index = fresh_index(self.ctx.processor.as_ref(), format, branch, self.ctx.gap_limit(), false).await?;

            let segwit_derived = self
                .ctx
                .keymanager
                .get_script_pubkey(AddressPath::new(AddressFormat::Bip84Segwit, branch, index))?;
            let segwit_address = self
                .ctx
                .keymanager
                .script_pubkey_to_address(&segwit_derived.script_pubkey, AddressFormat::Bip84Segwit)?;

            let wrapped_derived = self
                .ctx
                .keymanager
                .get_script_pubkey(AddressPath::new(AddressFormat::Bip49WrappedSegwit, branch, index))?;
            let public_address = self
                .ctx
                .keymanager
                .script_pubkey_to_address(&wrapped_derived.script_pubkey, AddressFormat::Bip49WrappedSegwit)?;

            return Ok(FreshAddress {
                public_address,
                segwit_address: Some(segwit_address),
                legacy_address: None,
            });
        }

        let index = fresh_index(self.ctx.processor.as_ref(), format, branch, self.ctx.gap_limit(), false).await?;
        let derived = self.ctx.keymanager.get_script_pubkey(AddressPath::new(format, branch, index))?;
        let public_address = self
            .ctx
            .keymanager
            .script_pubkey_to_address(&derived.script_pubkey, format)?;

        let legacy_derived = self
            .ctx
            .keymanager
            .get_script_pubkey(AddressPath::new(AddressFormat::Bip32Legacy, branch, index))?;
        let legacy_address = self
            .ctx
            .keymanager
            .script_pubkey_to_address(&legacy_derived.script_pubkey, AddressFormat::Bip32Legacy)?;
        let legacy_address = if legacy_address == public_address { None } else { Some(legacy_address) };

        Ok(FreshAddress {
            public_address,
            segwit_address: None,
            legacy_address,
        })
    }

    // never sets a path: the used-flip lookahead trigger in process_address
    // is gated on path being known, so externally-imported addresses do not
    // extend the gap horizon on their own
    pub async fn add_gap_limit_addresses(&self, addresses: Vec<String>) -> EngineResult<()> {
        for address in addresses {
            let script_pubkey: ScriptPubkey = self.ctx.keymanager.valid_script_pubkey_from_address(&address)?;
            if self
                .ctx
                .processor
                .fetch_address_by_script_pubkey(&script_pubkey)
                .await?
                .is_none()
            {
                self.ctx
                    .processor
                    .save_address(AddressRecord::new_unused(script_pubkey, None))
                    .await?;
            }
        }
        Ok(())
    }

    pub async fn mark_address_used(&self, address: &str) -> EngineResult<()> {
        let script_pubkey = self.ctx.keymanager.valid_script_pubkey_from_address(address)?;
        self.ctx
            .processor
            .update_address(
                &script_pubkey,
                AddressPatch {
                    used: Some(true),
                    ..Default::default()
                },
            )
            .await
    }
}

// forwards indexer push events onto the dispatcher queue; also starts the
// dispatcher consumer, kept alive for the engine's lifetime
fn spawn_watch_forwarder(
    ctx: Arc<EngineContext>,
    dispatcher_rx: mpsc::UnboundedReceiver<Job>,
    mut watch_rx: mpsc::UnboundedReceiver<AddressChanged>,
) -> tokio::task::JoinHandle<()> {
    spawn_dispatcher(ctx.clone(), dispatcher_rx);
    tokio::spawn(async move {
        loop {
            let changed = tokio::select! {
                _ = ctx.cancellation.cancelled() => break,
                changed = watch_rx.recv() => changed,
            };
            let Some(changed) = changed else { break };
            match ctx.watch_set.format_of(&changed.address).await {
                Some(format) => {
                    let _ = ctx.dispatcher.send(Job {
                        format,
                        address: changed.address,
                    });
                }
                None => warn!("watch forwarder: push for unwatched address {}", changed.address),
            }
        }
    })
}
