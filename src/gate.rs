//! Single-permit FIFO gate in front of the upstream connector.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Admission gate for upstream calls.
///
/// At most `permits` callers (one, in the engine's configuration) proceed at
/// a time; the rest suspend in strict FIFO order, since the tokio semaphore
/// hands permits out in request order. Acquisition is non-reentrant and has no
/// timeout at this layer; deadlines belong to the retry envelope and the
/// caller.
#[derive(Debug, Clone)]
pub struct UpstreamGate {
    semaphore: Arc<Semaphore>,
    permits: usize,
}

impl UpstreamGate {
    /// A gate admitting `permits` concurrent callers. Zero is clamped to one.
    pub fn new(permits: usize) -> Self {
        let permits = permits.max(1);
        Self { semaphore: Arc::new(Semaphore::new(permits)), permits }
    }

    /// Suspend until this caller holds a permit.
    ///
    /// The returned guard hands the permit to the longest-waiting caller on
    /// drop, which covers every exit path including cancellation and panic.
    pub async fn acquire(&self) -> GatePermit {
        match self.semaphore.clone().acquire_owned().await {
            Ok(permit) => GatePermit { _permit: permit },
            // The semaphore is owned by this gate and never closed.
            Err(_) => unreachable!("gate semaphore closed"),
        }
    }

    pub fn permits(&self) -> usize {
        self.permits
    }

    /// Permits not currently held. Exposed for tests and diagnostics.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

impl Default for UpstreamGate {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Proof of admission through the gate. Dropping releases.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}
