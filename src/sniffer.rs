//! Subscription dispatcher loop
//!
//! One long-lived task per pipeline instance waits on all of its event
//! feeds at once and fans qualifying events out to fire-and-forget
//! processing tasks:
//!
//! ```text
//! chain events ──► dispatcher ──► gate ──► replay ──► feeder ──► sender
//!                      │
//!                      └─► shared current-head (monotonic, RwLock)
//! ```
//!
//! Two wirings share the loop body:
//! - [`Sniffer::mempool`]: pending-transaction batches are replayed
//!   against the current head; head, chain and side-branch events only
//!   advance the shared head
//! - [`Sniffer::light`]: no transaction feed; every new head becomes one
//!   observation, with blocks, receipts and state fetched on demand
//!
//! The loop exits on the cancellation token or on any closed
//! subscription channel. In-flight processing tasks are not joined; they
//! complete or fail on their own after the loop has gone.
//!
//! Processing tasks read the head reference at spawn time and may
//! observe a slightly stale head while a newer one is being applied.
//! That race is accepted: observations are speculative by nature and a
//! head one event behind is still a valid replay base.

use std::future;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::backend::BackendLink;
use crate::feeder::Feeder;
use crate::gate::{SnifferGate, DELTA};
use crate::replay::{replay_batch, GasMode};
use crate::tracer::Tracer;
use crate::traits::{
    ChainBranchEvents, ChainDataSource, SenderRecovery, StateSnapshot, SyncStatus, TxPoolSource,
};
use crate::types::{ChainHead, HeadEvent, NewTxsEvent, ObservationKind, PooledTransaction};

/// Tunables for one pipeline instance
#[derive(Debug, Clone)]
pub struct SnifferConfig {
    /// Sync-proximity threshold handed to the readiness gate
    pub sync_delta: u64,
}

impl Default for SnifferConfig {
    fn default() -> Self {
        Self { sync_delta: DELTA }
    }
}

/// State shared with spawned processing tasks
struct SnifferInner<C, F, S> {
    chain: Arc<C>,
    feeder: F,
    signer: S,
    gate: SnifferGate,
    backend: Arc<BackendLink>,
    kind: ObservationKind,
}

/// The subscription dispatcher
pub struct Sniffer<C: ChainDataSource, F: Feeder, S: SenderRecovery> {
    inner: Arc<SnifferInner<C, F, S>>,
    head: Arc<RwLock<ChainHead>>,
    cancel: CancellationToken,
    tx_events: Option<mpsc::Receiver<NewTxsEvent>>,
    head_events: mpsc::Receiver<HeadEvent>,
    chain_events: Option<mpsc::Receiver<HeadEvent>>,
    side_events: Option<mpsc::Receiver<HeadEvent>>,
    /// Light wiring: each new head becomes one observation
    observe_heads: bool,
}

impl<C, F, S> Sniffer<C, F, S>
where
    C: ChainDataSource,
    C::Snapshot: StateSnapshot,
    F: Feeder + 'static,
    S: SenderRecovery,
{
    /// Full-state wiring: replays pending-transaction batches against
    /// the current head.
    #[allow(clippy::too_many_arguments)]
    pub fn mempool(
        chain: Arc<C>,
        pool: &dyn TxPoolSource,
        feeder: F,
        signer: S,
        status: Arc<dyn SyncStatus>,
        backend: Arc<BackendLink>,
        cancel: CancellationToken,
        config: SnifferConfig,
    ) -> Self
    where
        C: ChainBranchEvents,
    {
        let gate = SnifferGate::with_delta(backend.clone(), config.sync_delta);
        gate.set_status(status);
        let head = Arc::new(RwLock::new(chain.current_head()));

        Self {
            head,
            cancel,
            tx_events: Some(pool.subscribe_pending()),
            head_events: chain.subscribe_heads(),
            chain_events: Some(chain.subscribe_chain()),
            side_events: Some(chain.subscribe_side()),
            observe_heads: false,
            inner: Arc::new(SnifferInner {
                chain,
                feeder,
                signer,
                gate,
                backend,
                kind: ObservationKind::Txpool,
            }),
        }
    }

    /// Light wiring: observes head advancement only and retrieves
    /// blocks, receipts and state on demand.
    pub fn light(
        chain: Arc<C>,
        feeder: F,
        signer: S,
        status: Arc<dyn SyncStatus>,
        backend: Arc<BackendLink>,
        cancel: CancellationToken,
        config: SnifferConfig,
    ) -> Self {
        let gate = SnifferGate::with_delta(backend.clone(), config.sync_delta);
        gate.set_status(status);
        let head = Arc::new(RwLock::new(chain.current_head()));

        Self {
            head,
            cancel,
            tx_events: None,
            head_events: chain.subscribe_heads(),
            chain_events: None,
            side_events: None,
            observe_heads: true,
            inner: Arc::new(SnifferInner {
                chain,
                feeder,
                signer,
                gate,
                backend,
                kind: ObservationKind::LightTxpool,
            }),
        }
    }

    /// Spawns the dispatcher loop onto the runtime
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Runs the dispatcher loop until cancellation or subscription failure
    pub async fn run(mut self) {
        info!(ctx = %self.inner.kind, "sniffer loop started");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!(ctx = %self.inner.kind, "sniffer loop cancelled");
                    break;
                }
                event = recv_or_pending(&mut self.tx_events) => {
                    let Some(event) = event else {
                        error!(ctx = %self.inner.kind, "transaction subscription closed");
                        break;
                    };
                    let head = self.head.read().await.clone();
                    tokio::spawn(process_batch(
                        self.inner.clone(),
                        head,
                        event.transactions,
                    ));
                }
                event = self.head_events.recv() => {
                    let Some(event) = event else {
                        error!(ctx = %self.inner.kind, "head subscription closed");
                        break;
                    };
                    self.advance_head(&event.head, "chain head event").await;
                    if self.observe_heads {
                        tokio::spawn(process_head(self.inner.clone(), event.head));
                    }
                }
                event = recv_or_pending(&mut self.chain_events) => {
                    let Some(event) = event else {
                        error!(ctx = %self.inner.kind, "chain subscription closed");
                        break;
                    };
                    self.advance_head(&event.head, "chain event").await;
                }
                event = recv_or_pending(&mut self.side_events) => {
                    let Some(event) = event else {
                        error!(ctx = %self.inner.kind, "side chain subscription closed");
                        break;
                    };
                    self.advance_head(&event.head, "side chain event").await;
                }
            }
        }

        info!(ctx = %self.inner.kind, "sniffer loop terminated");
    }

    /// Replaces the shared head, but only ever forward
    async fn advance_head(&self, head: &ChainHead, source: &'static str) {
        let mut current = self.head.write().await;
        if head.number > current.number {
            info!(
                number = head.number,
                source,
                ctx = %self.inner.kind,
                "advancing chain head"
            );
            *current = head.clone();
        }
    }
}

/// Receives from an optional subscription; absent feeds never resolve
async fn recv_or_pending<T>(rx: &mut Option<mpsc::Receiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => future::pending().await,
    }
}

/// One mempool observation: gate, snapshot, replay, feed, send
async fn process_batch<C, F, S>(
    inner: Arc<SnifferInner<C, F, S>>,
    head: ChainHead,
    txs: Vec<PooledTransaction>,
) where
    C: ChainDataSource,
    F: Feeder,
    S: SenderRecovery,
{
    if !inner.gate.ready() {
        return;
    }
    let kind = inner.kind;
    info!(
        txs = txs.len(),
        number = head.number,
        ctx = %kind,
        "mempool observation started"
    );
    let start = Instant::now();

    let tracer = Tracer::new(&inner.feeder, &inner.backend);
    tracer.set_txpool_source();

    let snapshot = match inner.chain.state_at(&head).await {
        Ok(snapshot) => snapshot,
        Err(err) => {
            error!(err = %err, number = head.number, ctx = %kind, "state snapshot unavailable");
            return;
        }
    };
    let mut snapshot = snapshot.duplicate();

    let outcome = replay_batch(
        &mut snapshot,
        &inner.signer,
        &head,
        &txs,
        GasMode::PerTransaction,
        kind,
    );
    for frames in &outcome.traces {
        tracer.feed_call_traces(frames, head.number);
    }
    // Pair the transactions that actually executed, not the raw batch;
    // replay may have skipped some
    tracer.feed_transactions(
        head.number,
        head.timestamp,
        &outcome.transactions,
        &outcome.receipts,
    );
    tracer.feed_events(&outcome.receipts);
    tracer.send(start, head.number, head.hash, kind);
}

/// One light observation: fetch parent for state, fetch the block,
/// replay it in full, pair with canonical receipts, send
async fn process_head<C, F, S>(inner: Arc<SnifferInner<C, F, S>>, head: ChainHead)
where
    C: ChainDataSource,
    F: Feeder,
    S: SenderRecovery,
{
    if !inner.gate.ready() {
        return;
    }
    let kind = inner.kind;
    info!(number = head.number, ctx = %kind, "light observation started");
    let start = Instant::now();

    let tracer = Tracer::new(&inner.feeder, &inner.backend);
    tracer.set_txpool_source();

    let parent = match inner.chain.block_by_hash(head.parent_hash).await {
        Ok(parent) => parent,
        Err(err) => {
            error!(err = %err, number = head.number, ctx = %kind, "parent block unavailable");
            return;
        }
    };
    let snapshot = match inner.chain.state_at(&parent.header).await {
        Ok(snapshot) => snapshot,
        Err(err) => {
            error!(err = %err, number = head.number, ctx = %kind, "state snapshot unavailable");
            return;
        }
    };
    let mut snapshot = snapshot.duplicate();

    let block = match inner.chain.block_by_hash(head.hash).await {
        Ok(block) => block,
        Err(err) => {
            error!(err = %err, number = head.number, ctx = %kind, "current block unavailable");
            return;
        }
    };
    tracer.feed_block(&block);

    let outcome = replay_batch(
        &mut snapshot,
        &inner.signer,
        &block.header,
        &block.transactions,
        GasMode::BlockLimit(block.header.gas_limit),
        kind,
    );
    for frames in &outcome.traces {
        tracer.feed_call_traces(frames, block.header.number);
    }

    let receipts = match inner.chain.block_receipts(block.header.hash).await {
        Ok(receipts) => receipts,
        Err(err) => {
            error!(err = %err, number = head.number, ctx = %kind, "block receipts unavailable");
            return;
        }
    };
    tracer.feed_transactions(
        block.header.number,
        block.header.timestamp,
        &block.transactions,
        &receipts,
    );
    tracer.feed_events(&receipts);
    tracer.send(start, block.header.number, block.header.hash, kind);
}
