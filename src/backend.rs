//! Analysis-backend contracts and the process-lifetime connection handle
//!
//! The backend is an opaque fire-and-forget sink: a one-time `connect`
//! yields an observe handle that is reused for the rest of the process.
//! Connect failures are logged and retried lazily on the next
//! observation; they never propagate.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::error;

use crate::errors::BackendError;
use crate::tracer::AnalysisPayload;

/// Established ingestion handle; `observe` has no consumed return value
pub trait ObserveSink: Send + Sync + 'static {
    fn observe(&self, payload: AnalysisPayload);
}

/// Connection factory for the analysis backend
pub trait AnalysisBackend: Send + Sync + 'static {
    /// One-time connection attempt; called again only after a failure
    fn connect(&self) -> Result<Arc<dyn ObserveSink>, BackendError>;
}

/// Lazily-initialized, process-lifetime backend handle.
///
/// Success is cached forever; a failed attempt leaves the cell empty so
/// the next call retries. Reads after establishment take no lock.
pub struct BackendLink {
    backend: Arc<dyn AnalysisBackend>,
    handle: OnceCell<Arc<dyn ObserveSink>>,
}

impl BackendLink {
    pub fn new(backend: Arc<dyn AnalysisBackend>) -> Self {
        Self {
            backend,
            handle: OnceCell::new(),
        }
    }

    /// Ensures the connection is established, connecting on first use.
    ///
    /// Returns `false` (and logs) when the backend is unreachable; the
    /// caller is expected to skip its unit of work, not to fail.
    pub fn connect(&self) -> bool {
        match self.handle.get_or_try_init(|| self.backend.connect()) {
            Ok(_) => true,
            Err(err) => {
                error!(err = %err, "analysis backend connect failed");
                false
            }
        }
    }

    /// The established handle, if any; never triggers a connect
    pub fn established(&self) -> Option<&Arc<dyn ObserveSink>> {
        self.handle.get()
    }
}
