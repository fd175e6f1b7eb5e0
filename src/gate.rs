//! Readiness gate for the sniffing pipeline
//!
//! Called on the hot path before every potentially expensive replay, so
//! every check is O(1) and non-blocking. Three checks compose, all of
//! which must pass:
//! 1. The `SNIFFER_ENABLE` environment switch (read live on every call)
//! 2. Backend connectivity (lazy one-time connect, see [`BackendLink`])
//! 3. Sync proximity with a sticky-once-synced latch
//!
//! All checks fail closed: missing dependencies or unparsable input
//! yield "not ready" rather than an error.

use std::env;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::backend::BackendLink;
use crate::traits::SyncStatus;

/// Minimum closeness (in blocks) between current and highest block for
/// the node to be judged synced
pub const DELTA: u64 = 10;

/// Environment switch controlling the whole pipeline; unset or
/// unparsable values disable it
pub const SNIFFER_ENABLE_ENV: &str = "SNIFFER_ENABLE";

/// Composite readiness gate
pub struct SnifferGate {
    backend: Arc<BackendLink>,
    status: Mutex<Option<Arc<dyn SyncStatus>>>,
    synced: Mutex<bool>,
    delta: u64,
}

impl SnifferGate {
    pub fn new(backend: Arc<BackendLink>) -> Self {
        Self::with_delta(backend, DELTA)
    }

    pub fn with_delta(backend: Arc<BackendLink>, delta: u64) -> Self {
        Self {
            backend,
            status: Mutex::new(None),
            synced: Mutex::new(false),
            delta,
        }
    }

    /// Installs the sync-progress provider; the gate stays closed until
    /// one is present
    pub fn set_status(&self, status: Arc<dyn SyncStatus>) {
        *self.status.lock() = Some(status);
    }

    /// Whether the pipeline is allowed to run right now
    pub fn ready(&self) -> bool {
        self.enabled() && self.backend.connect() && self.check_synced()
    }

    /// Live read of the enable switch
    pub(crate) fn enabled(&self) -> bool {
        let Ok(val) = env::var(SNIFFER_ENABLE_ENV) else {
            return false;
        };
        match val.trim().to_ascii_lowercase().as_str() {
            "1" | "t" | "true" => true,
            "" | "0" | "f" | "false" => false,
            other => {
                warn!(value = other, "unparsable sniffer enable switch");
                false
            }
        }
    }

    /// Sticky-once-synced proximity check.
    ///
    /// An explicit regression (`current < highest`) always clears the
    /// latch before the sticky short-circuit is consulted.
    pub(crate) fn check_synced(&self) -> bool {
        let status = self.status.lock().clone();
        let Some(status) = status else {
            debug!("sync status provider not installed");
            return false;
        };
        let progress = status.progress();

        let mut synced = self.synced.lock();
        if progress.current_block < progress.highest_block {
            *synced = false;
        }
        if *synced {
            return true;
        }

        if progress.current_block > 0 && progress.highest_block > 0 {
            if progress
                .highest_block
                .saturating_sub(progress.current_block)
                <= self.delta
            {
                *synced = true;
            }
            debug!(
                synced = *synced,
                current = progress.current_block,
                highest = progress.highest_block,
                "sniffer sync check"
            );
            return *synced;
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AnalysisBackend, ObserveSink};
    use crate::errors::BackendError;
    use crate::tracer::AnalysisPayload;
    use crate::types::SyncProgress;

    // Env-var tests share process state; serialize them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    struct Progress(SyncProgress);

    impl SyncStatus for Progress {
        fn progress(&self) -> SyncProgress {
            self.0
        }
    }

    struct NullSink;

    impl ObserveSink for NullSink {
        fn observe(&self, _payload: AnalysisPayload) {}
    }

    struct OkBackend;

    impl AnalysisBackend for OkBackend {
        fn connect(&self) -> Result<std::sync::Arc<dyn ObserveSink>, BackendError> {
            Ok(std::sync::Arc::new(NullSink))
        }
    }

    struct ErrBackend;

    impl AnalysisBackend for ErrBackend {
        fn connect(&self) -> Result<std::sync::Arc<dyn ObserveSink>, BackendError> {
            Err(BackendError::Connect("some err".into()))
        }
    }

    fn gate_with_progress(current: u64, highest: u64, delta: u64) -> SnifferGate {
        let gate = SnifferGate::with_delta(Arc::new(BackendLink::new(Arc::new(OkBackend))), delta);
        gate.set_status(Arc::new(Progress(SyncProgress {
            current_block: current,
            highest_block: highest,
        })));
        gate
    }

    #[test]
    fn check_synced_table() {
        let cases = [
            // (current, highest, want)
            (0u64, 0u64, false),
            (1, 10, false),
            (10, 10, true),
            (20, 10, true),
            (5, 10, true), // exactly delta behind
        ];
        for (current, highest, want) in cases {
            let gate = gate_with_progress(current, highest, 5);
            assert_eq!(
                gate.check_synced(),
                want,
                "current={current} highest={highest}"
            );
        }
    }

    #[test]
    fn synced_latch_is_sticky() {
        let gate = gate_with_progress(100, 100, 5);
        assert!(gate.check_synced());

        // Later minor lag within delta keeps the latch set
        gate.set_status(Arc::new(Progress(SyncProgress {
            current_block: 98,
            highest_block: 100,
        })));
        assert!(gate.check_synced());
    }

    #[test]
    fn regression_clears_the_latch() {
        let gate = gate_with_progress(100, 100, 5);
        assert!(gate.check_synced());

        gate.set_status(Arc::new(Progress(SyncProgress {
            current_block: 50,
            highest_block: 100,
        })));
        assert!(!gate.check_synced());
    }

    #[test]
    fn missing_status_fails_closed() {
        let gate = SnifferGate::new(Arc::new(BackendLink::new(Arc::new(OkBackend))));
        assert!(!gate.check_synced());
    }

    #[test]
    fn enable_switch_parsing() {
        let _guard = ENV_LOCK.lock();
        let gate = gate_with_progress(10, 10, 5);

        let cases = [
            ("1", true),
            ("true", true),
            ("TRUE", true),
            ("t", true),
            ("0", false),
            ("false", false),
            ("f", false),
            ("", false),
            ("banana", false),
        ];
        for (val, want) in cases {
            env::set_var(SNIFFER_ENABLE_ENV, val);
            assert_eq!(gate.enabled(), want, "value={val:?}");
        }

        env::remove_var(SNIFFER_ENABLE_ENV);
        assert!(!gate.enabled());
    }

    #[test]
    fn ready_composes_all_checks() {
        let _guard = ENV_LOCK.lock();
        env::set_var(SNIFFER_ENABLE_ENV, "true");

        // All good
        let gate = gate_with_progress(10, 5, 5);
        assert!(gate.ready());

        // Backend down
        let gate = SnifferGate::with_delta(Arc::new(BackendLink::new(Arc::new(ErrBackend))), 5);
        gate.set_status(Arc::new(Progress(SyncProgress {
            current_block: 10,
            highest_block: 5,
        })));
        assert!(!gate.ready());

        // Not synced
        let gate = gate_with_progress(5, 100, 5);
        assert!(!gate.ready());

        // Switch off
        env::set_var(SNIFFER_ENABLE_ENV, "0");
        let gate = gate_with_progress(10, 5, 5);
        assert!(!gate.ready());

        env::remove_var(SNIFFER_ENABLE_ENV);
    }
}
