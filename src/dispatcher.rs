// setLookAhead never calls process_address in-stack, it only enqueues a Job;
// the watch-set push path enqueues the same way. A single consumer task
// drains the queue with concurrency capped at gapLimit.

use std::sync::Arc;

use log::{info, warn};
use tokio::sync::{mpsc, Semaphore};

use crate::address_processor::process_address;
use crate::context::EngineContext;
use crate::events::ErrorScope;
use crate::model::AddressFormat;

#[derive(Debug, Clone)]
pub struct Job {
    pub format: AddressFormat,
    pub address: String,
}

pub fn spawn_dispatcher(
    ctx: Arc<EngineContext>,
    mut receiver: mpsc::UnboundedReceiver<Job>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let semaphore = Arc::new(Semaphore::new(ctx.gap_limit().max(1) as usize));
        loop {
            let job = tokio::select! {
                _ = ctx.cancellation.cancelled() => break,
                job = receiver.recv() => job,
            };
            let Some(job) = job else { break };

            let ctx = ctx.clone();
            let permit = semaphore.clone().acquire_owned().await;
            tokio::spawn(async move {
                let _permit = permit;
                if let Err(err) = process_address(&ctx, job.format, &job.address).await {
                    warn!(
                        "dispatcher: processAddress failed for {} ({:?}): {err}",
                        job.address, job.format
                    );
                    ctx.emitter
                        .sync_error(ErrorScope::Address(job.address.clone()), err)
                        .await;
                }
            });
        }
        info!("dispatcher: job queue closed, exiting");
    })
}
