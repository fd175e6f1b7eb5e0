//! Pure mapping into the analysis backend's normalized schema
//!
//! The feeder is a stateless transformation layer: native chain and
//! trace objects go in, flat analysis records come out. No side effects,
//! safe to call concurrently.

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::Serialize;

use crate::types::{Block, CallTrace, PooledTransaction, Receipt};

/// Normalized block record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockRecord {
    pub number: u64,
    pub hash: B256,
    pub parent_hash: B256,
    pub state_root: B256,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub timestamp: u64,
    pub transaction_count: u64,
}

/// Normalized transaction record, paired positionally with its receipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRecord {
    pub index: u64,
    pub hash: B256,
    pub nonce: u64,
    pub to: Option<Address>,
    pub value: U256,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub status: u64,
    pub block_number: u64,
    pub block_time: u64,
    pub input: Bytes,
}

/// One individually addressable analysis event, flattened from a
/// receipt's log list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRecord {
    pub tx_hash: B256,
    pub log_index: u64,
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: u64,
}

/// One call frame in the backend's flat call-trace schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallTraceRecord {
    pub block_number: u64,
    pub depth: u32,
    pub call_type: &'static str,
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub gas: u64,
    pub gas_used: u64,
    pub input: Bytes,
    pub output: Bytes,
    pub error: Option<String>,
}

/// Stateless mapping contract between native objects and analysis records
pub trait Feeder: Send + Sync {
    fn feed_block(&self, block: &Block) -> BlockRecord;

    /// Pairs transactions and receipts positionally. Lengths may differ
    /// when replay stopped early; only the overlapping prefix is mapped.
    fn feed_transactions(
        &self,
        block_number: u64,
        block_time: u64,
        txs: &[PooledTransaction],
        receipts: &[Receipt],
    ) -> Vec<TransactionRecord>;

    fn feed_events(&self, receipts: &[Receipt]) -> Vec<EventRecord>;

    /// Flattens recursive call frames, attaching the external block
    /// number for correlation
    fn feed_call_traces(&self, frames: &[CallTrace], block_number: u64) -> Vec<CallTraceRecord>;
}

/// Default feeder for EVM-shaped chains
#[derive(Debug, Clone, Copy, Default)]
pub struct EvmFeeder;

impl Feeder for EvmFeeder {
    fn feed_block(&self, block: &Block) -> BlockRecord {
        BlockRecord {
            number: block.header.number,
            hash: block.header.hash,
            parent_hash: block.header.parent_hash,
            state_root: block.header.state_root,
            gas_limit: block.header.gas_limit,
            gas_used: block.header.gas_used,
            timestamp: block.header.timestamp,
            transaction_count: block.transactions.len() as u64,
        }
    }

    fn feed_transactions(
        &self,
        block_number: u64,
        block_time: u64,
        txs: &[PooledTransaction],
        receipts: &[Receipt],
    ) -> Vec<TransactionRecord> {
        txs.iter()
            .zip(receipts.iter())
            .enumerate()
            .map(|(index, (tx, receipt))| TransactionRecord {
                index: index as u64,
                hash: tx.hash,
                nonce: tx.nonce,
                to: tx.to,
                value: tx.value,
                gas_limit: tx.gas_limit,
                gas_used: receipt.gas_used,
                status: receipt.status,
                block_number,
                block_time,
                input: tx.input.clone(),
            })
            .collect()
    }

    fn feed_events(&self, receipts: &[Receipt]) -> Vec<EventRecord> {
        receipts
            .iter()
            .flat_map(|receipt| receipt.logs.iter())
            .map(|log| EventRecord {
                tx_hash: log.tx_hash,
                log_index: log.log_index,
                address: log.address,
                topics: log.topics.clone(),
                data: log.data.clone(),
                block_number: log.block_number,
            })
            .collect()
    }

    fn feed_call_traces(&self, frames: &[CallTrace], block_number: u64) -> Vec<CallTraceRecord> {
        fn walk(frame: &CallTrace, depth: u32, block_number: u64, out: &mut Vec<CallTraceRecord>) {
            out.push(CallTraceRecord {
                block_number,
                depth,
                call_type: frame.kind.as_str(),
                from: frame.from,
                to: frame.to,
                value: frame.value,
                gas: frame.gas,
                gas_used: frame.gas_used,
                input: frame.input.clone(),
                output: frame.output.clone(),
                error: frame.status.error_message(),
            });
            for subtrace in &frame.subtraces {
                walk(subtrace, depth + 1, block_number, out);
            }
        }

        let mut out = Vec::new();
        for frame in frames {
            walk(frame, 0, block_number, &mut out);
        }
        out
    }
}
