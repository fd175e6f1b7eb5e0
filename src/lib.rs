//! # chain-sniffer
//!
//! An embedded observation sidecar for EVM-shaped chains. It watches a
//! host node's event feeds, speculatively replays transactions against
//! disposable state snapshots with full call tracing, and ships the
//! normalized results to an external analysis backend.
//!
//! ## Data flow
//!
//! ```text
//!            ┌──────────────┐
//!  txpool ──►│              │──► gate ──► replay ──► feeder ──► tracer ──► backend
//!  heads  ──►│  dispatcher  │
//!  chain  ──►│  (Sniffer)   │──► shared current head
//!  side   ──►│              │
//!            └──────────────┘
//! ```
//!
//! ## Pipeline stages
//!
//! - [`Sniffer`]: the dispatcher loop; one per wiring, spawned once
//! - [`SnifferGate`]: readiness checks (enable switch, backend
//!   connectivity, sync proximity) run before every observation
//! - [`replay_batch`]: re-applies transaction batches on a
//!   [`StateSnapshot`] with a [`CallTracer`] attached
//! - [`Feeder`] / [`EvmFeeder`]: pure mapping into the backend's record
//!   schema
//! - [`Tracer`]: accumulates one observation's records and sends the
//!   finished payload at most once
//! - [`BackendLink`]: lazy process-lifetime connection to the analysis
//!   backend
//!
//! Host integration happens through the traits in [`traits`]: the node
//! provides chain data, state snapshots, sender recovery and sync
//! progress; this crate provides everything downstream of the events.
//!
//! The whole pipeline is gated behind the `SNIFFER_ENABLE` environment
//! variable, read live on every observation.

pub mod backend;
pub mod call_tracer;
pub mod errors;
pub mod feeder;
pub mod gate;
pub mod replay;
pub mod sniffer;
pub mod tracer;
pub mod traits;
pub mod types;

pub use backend::{AnalysisBackend, BackendLink, ObserveSink};
pub use call_tracer::CallTracer;
pub use errors::{ApplyError, BackendError, SenderError, SourceError, TraceError};
pub use feeder::{BlockRecord, CallTraceRecord, EvmFeeder, EventRecord, Feeder, TransactionRecord};
pub use gate::{SnifferGate, DELTA, SNIFFER_ENABLE_ENV};
pub use replay::{replay_batch, GasMode, ReplayOutcome};
pub use sniffer::{Sniffer, SnifferConfig};
pub use tracer::{AnalysisPayload, PayloadSource, Tracer};
pub use traits::{
    ChainBranchEvents, ChainDataSource, SenderRecovery, StateSnapshot, SyncStatus, TxPoolSource,
};
pub use types::{
    Block, CallKind, CallStatus, CallTrace, ChainHead, HeadEvent, LogEntry, NewTxsEvent,
    ObservationKind, PooledTransaction, Receipt, SyncProgress,
};
