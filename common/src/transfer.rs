//! Running many independent transfers at once

use tracing::Instrument;

use crate::copy::{CopyEngine, Summary};
use crate::error::{Error, ErrorKind};
use crate::preserve;
use crate::progress::ProgressRegistry;

/// One source/destination pair and its bandwidth cap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferRequest {
    pub src: std::path::PathBuf,
    pub dst: std::path::PathBuf,
    /// kilobytes per second, 0 means no limit
    pub bandwidth_kb: u64,
}

impl TransferRequest {
    #[must_use]
    pub fn new(
        src: impl Into<std::path::PathBuf>,
        dst: impl Into<std::path::PathBuf>,
        bandwidth_kb: u64,
    ) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
            bandwidth_kb,
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct Settings {
    /// maximum number of transfers running at once, 0 means no limit
    pub max_concurrent_transfers: usize,
    pub preserve: preserve::Settings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_concurrent_transfers: 10,
            preserve: preserve::preserve_all(),
        }
    }
}

/// Runs every request in its own task and waits for all of them.
///
/// Worker ids are the request indices. A failing transfer never cancels the others; every outcome
/// is logged and the first failure in request order is returned once all workers are done.
pub async fn run_all(
    requests: Vec<TransferRequest>,
    registry: std::sync::Arc<ProgressRegistry>,
    settings: &Settings,
) -> Result<Summary, Error> {
    let slots = throttle::TransferSlots::new(settings.max_concurrent_transfers);
    let mut workers = Vec::with_capacity(requests.len());
    for (worker_id, request) in requests.into_iter().enumerate() {
        let slots = slots.clone();
        let registry = registry.clone();
        let preserve = settings.preserve;
        let src = request.src.clone();
        let dst = request.dst.clone();
        let handle = tokio::spawn(
            async move {
                let _slot = slots.acquire().await;
                let limiter = throttle::RateLimiter::new(request.bandwidth_kb);
                match limiter.capacity() {
                    Some(capacity) => tracing::debug!(
                        "worker {} starting transfer {:?} -> {:?} at {} bytes per second",
                        worker_id,
                        &request.src,
                        &request.dst,
                        capacity
                    ),
                    None => tracing::debug!(
                        "worker {} starting transfer {:?} -> {:?} without a bandwidth limit",
                        worker_id,
                        &request.src,
                        &request.dst
                    ),
                }
                if let Some(free) = slots.available() {
                    tracing::debug!("worker {} holds a slot, {} left", worker_id, free);
                }
                let mut engine = CopyEngine::new(worker_id, limiter, registry, preserve);
                engine.run(&request.src, &request.dst).await
            }
            .in_current_span(),
        );
        workers.push((worker_id, src, dst, handle));
    }
    let mut summary = Summary::default();
    let mut first_error = None;
    for (worker_id, src, dst, handle) in workers {
        let result = match handle.await {
            Ok(result) => result,
            Err(join_error) => Err(Error::with_source(
                &src,
                &dst,
                ErrorKind::Unknown,
                anyhow::anyhow!("worker task failed: {}", join_error),
            )),
        };
        match result {
            Ok(worker_summary) => {
                tracing::info!(
                    "worker {} finished copying {:?} to {:?}",
                    worker_id,
                    &src,
                    &dst
                );
                summary = summary + worker_summary;
            }
            Err(error) => {
                tracing::error!("worker {} failed: {}", worker_id, &error);
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
        }
    }
    registry.finish();
    match first_error {
        Some(error) => Err(error),
        None => Ok(summary),
    }
}
