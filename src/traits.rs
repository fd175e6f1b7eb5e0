//! Collaborator contracts consumed by the pipeline
//!
//! The pipeline never touches node internals directly; everything it
//! needs from the host is expressed here:
//! - `ChainDataSource`: head/block/receipt/state lookup plus head events
//! - `ChainBranchEvents`: chain and side-branch events (full variant only)
//! - `TxPoolSource`: pending-transaction batches
//! - `StateSnapshot`: disposable copy-on-write state with an opaque
//!   transaction-application entry point
//! - `SenderRecovery`: signature-scheme sender derivation
//! - `SyncStatus`: node sync progress for the readiness gate
//!
//! Event subscriptions are handed out as bounded `mpsc` receivers; a
//! closed channel is the subscription-failure signal that terminates the
//! dispatcher loop.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::call_tracer::CallTracer;
use crate::errors::{ApplyError, SenderError, SourceError};
use crate::types::{
    Address, Block, ChainHead, HeadEvent, NewTxsEvent, PooledTransaction, Receipt, SyncProgress,
    B256,
};

/// Capability interface over chain data, implemented both by the
/// in-process full-state source and the on-demand light source.
#[async_trait]
pub trait ChainDataSource: Send + Sync + 'static {
    /// Snapshot type produced by [`state_at`](Self::state_at)
    type Snapshot: StateSnapshot;

    /// Latest head known to the source at call time
    fn current_head(&self) -> ChainHead;

    /// Full block lookup by hash; remote and fallible for the light variant
    async fn block_by_hash(&self, hash: B256) -> Result<Block, SourceError>;

    /// Canonical receipts for the given block
    async fn block_receipts(&self, hash: B256) -> Result<Vec<Receipt>, SourceError>;

    /// State view anchored at the given header's root
    async fn state_at(&self, head: &ChainHead) -> Result<Self::Snapshot, SourceError>;

    /// Subscription to head-advancement events
    fn subscribe_heads(&self) -> mpsc::Receiver<HeadEvent>;
}

/// Additional event feeds only the full-state source can provide
pub trait ChainBranchEvents {
    /// Subscription to canonical chain-advanced events
    fn subscribe_chain(&self) -> mpsc::Receiver<HeadEvent>;

    /// Subscription to side-branch events
    fn subscribe_side(&self) -> mpsc::Receiver<HeadEvent>;
}

/// Transaction-pool event feed
pub trait TxPoolSource: Send + Sync + 'static {
    /// Subscription to new-pending-transaction batches
    fn subscribe_pending(&self) -> mpsc::Receiver<NewTxsEvent>;
}

/// Disposable copy-on-write view of chain state used exclusively for
/// speculative replay.
///
/// Implementations must guarantee that nothing applied through
/// [`apply`](Self::apply) ever reaches the canonical state store.
pub trait StateSnapshot: Send + 'static {
    /// Fork an isolated copy; each observation replays against its own
    fn duplicate(&self) -> Self
    where
        Self: Sized;

    /// Recorded nonce for the given account
    fn nonce(&self, address: Address) -> u64;

    /// Overrides the recorded nonce; used to accommodate speculative
    /// mempool ordering ahead of canonical state
    fn set_nonce(&mut self, address: Address, nonce: u64);

    /// Applies one transaction with tracing enabled.
    ///
    /// The collector receives enter/exit hooks for every frame the
    /// execution opens. The returned receipt still carries canonical
    /// block fields; the replay engine sanitizes it before it leaves.
    fn apply(
        &mut self,
        head: &ChainHead,
        tx: &PooledTransaction,
        sender: Address,
        gas_allowance: u64,
        tracer: &mut CallTracer,
    ) -> Result<Receipt, ApplyError>;
}

/// Sender derivation under the chain's signature scheme
pub trait SenderRecovery: Send + Sync + 'static {
    fn recover(&self, tx: &PooledTransaction) -> Result<Address, SenderError>;
}

/// Node sync progress, polled by the readiness gate on every check
pub trait SyncStatus: Send + Sync + 'static {
    fn progress(&self) -> SyncProgress;
}
