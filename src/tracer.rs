//! Per-observation payload assembly and transmission
//!
//! A [`Tracer`] wraps exactly one payload builder. All mutating calls
//! are serialized through one lock so concurrent feeds from multiple
//! replay batches cannot race, and the finalize-and-send step observes a
//! complete accumulation. The builder is taken out of the tracer on
//! send, so a payload is finalized exactly once and sent at most once.

use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use crate::backend::BackendLink;
use crate::feeder::{BlockRecord, CallTraceRecord, EventRecord, Feeder, TransactionRecord};
use crate::types::{Block, CallTrace, ObservationKind, PooledTransaction, Receipt, B256};

/// Whether the payload carries confirmed-block or speculative mempool data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PayloadSource {
    Block,
    Mempool,
}

/// Accumulator for one observation's records
#[derive(Debug)]
pub struct PayloadBuilder {
    source: PayloadSource,
    block: Option<BlockRecord>,
    transactions: Vec<TransactionRecord>,
    events: Vec<EventRecord>,
    call_traces: Vec<CallTraceRecord>,
    block_number: u64,
    block_hash: B256,
}

impl Default for PayloadBuilder {
    fn default() -> Self {
        Self {
            source: PayloadSource::Block,
            block: None,
            transactions: Vec::new(),
            events: Vec::new(),
            call_traces: Vec::new(),
            block_number: 0,
            block_hash: B256::ZERO,
        }
    }
}

impl PayloadBuilder {
    pub fn set_block(&mut self, block: BlockRecord) {
        self.block = Some(block);
    }

    pub fn append_transactions(&mut self, mut records: Vec<TransactionRecord>) {
        self.transactions.append(&mut records);
    }

    pub fn append_events(&mut self, mut records: Vec<EventRecord>) {
        self.events.append(&mut records);
    }

    pub fn append_call_traces(&mut self, mut records: Vec<CallTraceRecord>) {
        self.call_traces.append(&mut records);
    }

    pub fn set_mempool_source(&mut self) {
        self.source = PayloadSource::Mempool;
    }

    pub fn set_block_data(&mut self, block_number: u64, block_hash: B256) {
        self.block_number = block_number;
        self.block_hash = block_hash;
    }

    /// Finalizes the accumulation into an immutable payload
    pub fn finish(self) -> AnalysisPayload {
        AnalysisPayload {
            source: self.source,
            block: self.block,
            transactions: self.transactions,
            events: self.events,
            call_traces: self.call_traces,
            block_number: self.block_number,
            block_hash: self.block_hash,
        }
    }
}

/// Finished observation payload, opaque once handed to the backend
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisPayload {
    pub source: PayloadSource,
    pub block: Option<BlockRecord>,
    pub transactions: Vec<TransactionRecord>,
    pub events: Vec<EventRecord>,
    pub call_traces: Vec<CallTraceRecord>,
    pub block_number: u64,
    pub block_hash: B256,
}

/// Batch builder and sender for one observation
pub struct Tracer<'a, F: Feeder> {
    feeder: &'a F,
    backend: &'a BackendLink,
    builder: Mutex<Option<PayloadBuilder>>,
}

impl<'a, F: Feeder> Tracer<'a, F> {
    pub fn new(feeder: &'a F, backend: &'a BackendLink) -> Self {
        Self {
            feeder,
            backend,
            builder: Mutex::new(Some(PayloadBuilder::default())),
        }
    }

    pub fn feed_block(&self, block: &Block) {
        let record = self.feeder.feed_block(block);
        if let Some(builder) = self.builder.lock().as_mut() {
            builder.set_block(record);
        }
    }

    pub fn feed_transactions(
        &self,
        block_number: u64,
        block_time: u64,
        txs: &[PooledTransaction],
        receipts: &[Receipt],
    ) {
        let records = self
            .feeder
            .feed_transactions(block_number, block_time, txs, receipts);
        if let Some(builder) = self.builder.lock().as_mut() {
            builder.append_transactions(records);
        }
    }

    pub fn feed_events(&self, receipts: &[Receipt]) {
        let records = self.feeder.feed_events(receipts);
        if let Some(builder) = self.builder.lock().as_mut() {
            builder.append_events(records);
        }
    }

    pub fn feed_call_traces(&self, frames: &[CallTrace], block_number: u64) {
        let records = self.feeder.feed_call_traces(frames, block_number);
        if let Some(builder) = self.builder.lock().as_mut() {
            builder.append_call_traces(records);
        }
    }

    /// Marks the observation as speculative/mempool-sourced
    pub fn set_txpool_source(&self) {
        if let Some(builder) = self.builder.lock().as_mut() {
            builder.set_mempool_source();
        }
    }

    /// Finalizes and transmits the payload if the backend connection is
    /// live; logs elapsed time and context whether or not the send
    /// happened. Absence of connectivity is not an error, just a
    /// skipped send. A repeated call finds no builder and only logs a
    /// debug line; the finish line appears exactly once per observation.
    pub fn send(
        &self,
        start: Instant,
        block_number: u64,
        block_hash: B256,
        ctx: ObservationKind,
    ) {
        let Some(mut builder) = self.builder.lock().take() else {
            debug!(
                number = block_number,
                hash = %block_hash,
                ctx = %ctx,
                "observation already sent"
            );
            return;
        };
        if let Some(sink) = self.backend.established() {
            builder.set_block_data(block_number, block_hash);
            sink.observe(builder.finish());
        }
        info!(
            elapsed = ?start.elapsed(),
            number = block_number,
            hash = %block_hash,
            ctx = %ctx,
            "sniffer observation finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AnalysisBackend, ObserveSink};
    use crate::errors::BackendError;
    use crate::feeder::EvmFeeder;
    use crate::types::{Address, Bytes, LogEntry, U256};
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingSink {
        payloads: Mutex<Vec<AnalysisPayload>>,
    }

    impl ObserveSink for RecordingSink {
        fn observe(&self, payload: AnalysisPayload) {
            self.payloads.lock().push(payload);
        }
    }

    struct OkBackend(Arc<RecordingSink>);

    impl AnalysisBackend for OkBackend {
        fn connect(&self) -> Result<Arc<dyn ObserveSink>, BackendError> {
            Ok(self.0.clone())
        }
    }

    fn receipt() -> Receipt {
        Receipt {
            tx_hash: B256::repeat_byte(1),
            status: 1,
            gas_used: 21_000,
            cumulative_gas_used: 21_000,
            contract_address: None,
            block_number: 0,
            block_hash: B256::ZERO,
            logs: vec![LogEntry {
                address: Address::repeat_byte(0xbb),
                topics: Vec::new(),
                data: Bytes::new(),
                tx_hash: B256::repeat_byte(1),
                log_index: 0,
                block_number: 0,
                block_hash: B256::ZERO,
            }],
        }
    }

    fn tx() -> PooledTransaction {
        PooledTransaction {
            hash: B256::repeat_byte(1),
            nonce: 0,
            gas_limit: 50_000,
            gas_price: 1,
            to: Some(Address::repeat_byte(0xaa)),
            value: U256::ZERO,
            input: Bytes::new(),
        }
    }

    #[test]
    fn send_transmits_once_with_block_data() {
        let sink = Arc::new(RecordingSink::default());
        let link = BackendLink::new(Arc::new(OkBackend(sink.clone())));
        assert!(link.connect());

        let feeder = EvmFeeder;
        let tracer = Tracer::new(&feeder, &link);
        tracer.set_txpool_source();
        tracer.feed_transactions(7, 1_700_000_000, &[tx()], &[receipt()]);
        tracer.feed_events(&[receipt()]);

        let hash = B256::repeat_byte(0x42);
        tracer.send(Instant::now(), 7, hash, ObservationKind::Txpool);
        // A second send must be a no-op
        tracer.send(Instant::now(), 7, hash, ObservationKind::Txpool);

        let payloads = sink.payloads.lock();
        assert_eq!(payloads.len(), 1);
        let payload = &payloads[0];
        assert_eq!(payload.source, PayloadSource::Mempool);
        assert_eq!(payload.block_number, 7);
        assert_eq!(payload.block_hash, hash);
        assert_eq!(payload.transactions.len(), 1);
        assert_eq!(payload.events.len(), 1);
    }

    #[test]
    fn payload_serializes_to_the_wire_shape() {
        let mut builder = PayloadBuilder::default();
        builder.set_mempool_source();
        builder.set_block_data(7, B256::repeat_byte(0x42));
        let payload = builder.finish();

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["source"], "Mempool");
        assert_eq!(json["block_number"], 7);
        assert!(json["block"].is_null());
        assert!(json["transactions"].as_array().unwrap().is_empty());
    }

    #[test]
    fn send_without_connection_is_a_silent_skip() {
        struct DownBackend;
        impl AnalysisBackend for DownBackend {
            fn connect(&self) -> Result<Arc<dyn ObserveSink>, BackendError> {
                Err(BackendError::Connect("down".into()))
            }
        }

        let link = BackendLink::new(Arc::new(DownBackend));
        let feeder = EvmFeeder;
        let tracer = Tracer::new(&feeder, &link);
        tracer.feed_events(&[receipt()]);
        // No connection was ever established; send only logs
        tracer.send(
            Instant::now(),
            7,
            B256::repeat_byte(0x42),
            ObservationKind::Txpool,
        );
    }
}
