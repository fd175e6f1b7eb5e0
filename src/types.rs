//! Core types for the sniffing pipeline
//!
//! This module defines the data structures shared across the pipeline:
//! - Chain heads, blocks and pooled transactions as observed from the host node
//! - Receipts and logs produced by speculative replay
//! - Recursive call traces collected during re-execution
//! - Sync progress and observation context labels

use std::fmt;

pub use alloy::primitives::{Address, Bytes, B256, U256};
use serde::Serialize;

/// The most recently observed block header the pipeline holds a state
/// reference for. Replaced only by strictly higher block numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainHead {
    /// Block number
    pub number: u64,
    /// Block hash
    pub hash: B256,
    /// Parent block hash
    pub parent_hash: B256,
    /// State root the replay snapshot is anchored to
    pub state_root: B256,
    /// Declared block gas limit
    pub gas_limit: u64,
    /// Gas used by the canonical block
    pub gas_used: u64,
    /// Block timestamp (Unix time)
    pub timestamp: u64,
}

/// A block as retrieved from the chain data source
#[derive(Debug, Clone)]
pub struct Block {
    /// Block header
    pub header: ChainHead,
    /// Transactions included in the block, in canonical order
    pub transactions: Vec<PooledTransaction>,
}

/// A pending or included transaction as handed over by the host node
///
/// Signature material stays with the host; sender derivation goes through
/// the [`SenderRecovery`](crate::traits::SenderRecovery) collaborator.
#[derive(Debug, Clone)]
pub struct PooledTransaction {
    /// Transaction hash
    pub hash: B256,
    /// Declared nonce
    pub nonce: u64,
    /// Gas limit declared by the transaction
    pub gas_limit: u64,
    /// Effective gas price in wei
    pub gas_price: u128,
    /// Call target; `None` for contract creation
    pub to: Option<Address>,
    /// Native value transferred
    pub value: U256,
    /// Call data
    pub input: Bytes,
}

/// A log entry carried inside a replayed receipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// Emitting contract
    pub address: Address,
    /// Indexed topics
    pub topics: Vec<B256>,
    /// Unindexed payload
    pub data: Bytes,
    /// Hash of the transaction that emitted the log
    pub tx_hash: B256,
    /// Position of the log within the block
    pub log_index: u64,
    /// Block number; zeroed for speculative observations
    pub block_number: u64,
    /// Block hash; zeroed for speculative observations
    pub block_hash: B256,
}

/// Execution result for one replayed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    /// Hash of the transaction this receipt belongs to
    pub tx_hash: B256,
    /// 1 on success, 0 on failure
    pub status: u64,
    /// Gas used by this transaction
    pub gas_used: u64,
    /// Cumulative gas used up to and including this transaction
    pub cumulative_gas_used: u64,
    /// Address of the created contract, if any
    pub contract_address: Option<Address>,
    /// Block number; zeroed for speculative observations
    pub block_number: u64,
    /// Block hash; zeroed for speculative observations
    pub block_hash: B256,
    /// Logs emitted during execution
    pub logs: Vec<LogEntry>,
}

impl Receipt {
    /// Strips canonical block association from the receipt and its logs.
    ///
    /// Replayed receipts describe speculative, not-yet-canonical execution,
    /// so they must never carry block-identifying fields onward.
    pub fn sanitize(&mut self) {
        self.block_number = 0;
        self.block_hash = B256::ZERO;
        for log in &mut self.logs {
            log.block_number = 0;
            log.block_hash = B256::ZERO;
        }
    }

    /// Check if the transaction executed successfully
    pub fn is_success(&self) -> bool {
        self.status == 1
    }
}

/// Kind of contract interaction recorded in a call frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CallKind {
    Call,
    CallCode,
    DelegateCall,
    StaticCall,
    Create,
    Create2,
}

impl CallKind {
    /// Uppercase wire label used by the analysis schema
    pub fn as_str(&self) -> &'static str {
        match self {
            CallKind::Call => "CALL",
            CallKind::CallCode => "CALLCODE",
            CallKind::DelegateCall => "DELEGATECALL",
            CallKind::StaticCall => "STATICCALL",
            CallKind::Create => "CREATE",
            CallKind::Create2 => "CREATE2",
        }
    }
}

/// Status of one call frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CallStatus {
    /// Call completed successfully
    Success,
    /// Call reverted with reason
    Revert(String),
    /// Call halted due to an EVM error
    Halt(String),
    /// Call is still in progress
    InProgress,
}

impl CallStatus {
    /// Check if the call was successful
    pub fn is_success(&self) -> bool {
        matches!(self, CallStatus::Success)
    }

    /// Error message for failed frames, `None` for successful ones
    pub fn error_message(&self) -> Option<String> {
        match self {
            CallStatus::Success => None,
            CallStatus::Revert(reason) => Some(format!("reverted: {reason}")),
            CallStatus::Halt(reason) => Some(format!("halted: {reason}")),
            CallStatus::InProgress => Some("unfinished call".to_string()),
        }
    }
}

/// One frame of the recursive call trace produced by replaying a
/// transaction with tracing enabled
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallTrace {
    /// Kind of interaction
    pub kind: CallKind,
    /// Caller address
    pub from: Address,
    /// Target address
    pub to: Address,
    /// Native token value
    pub value: U256,
    /// Call input data
    pub input: Bytes,
    /// Gas available to this frame
    pub gas: u64,
    /// Gas used by this frame
    pub gas_used: u64,
    /// Call output data
    pub output: Bytes,
    /// Frame execution status
    pub status: CallStatus,
    /// Whether this frame is the origin of an error
    pub error_origin: bool,
    /// Nested calls made by this frame
    pub subtraces: Vec<CallTrace>,
    /// Position in the call tree
    pub trace_address: Vec<usize>,
}

/// Node sync progress as reported by the host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncProgress {
    /// Block number the node has executed up to
    pub current_block: u64,
    /// Highest block number known to the node
    pub highest_block: u64,
}

/// Origin of an observation, carried on log lines and on the payload.
///
/// The dispatcher wirings produce [`Txpool`](Self::Txpool) and
/// [`LightTxpool`](Self::LightTxpool); the block labels are reserved
/// for the host's block-import paths, which drive the replay engine and
/// tracer directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ObservationKind {
    /// Confirmed block observed with full local state
    Blockchain,
    /// Confirmed block observed through on-demand retrieval
    Lightchain,
    /// Pending transactions replayed against the current head
    Txpool,
    /// New head replayed on demand by the light variant
    LightTxpool,
}

impl ObservationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObservationKind::Blockchain => "blockchain",
            ObservationKind::Lightchain => "lightchain",
            ObservationKind::Txpool => "txpool",
            ObservationKind::LightTxpool => "lighttxpool",
        }
    }
}

impl fmt::Display for ObservationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Batch of newly observed pending transactions
#[derive(Debug, Clone)]
pub struct NewTxsEvent {
    /// Transactions in pool arrival order
    pub transactions: Vec<PooledTransaction>,
}

/// Head advancement notification; also used for chain and side-branch
/// events, which are equally valid head-advancement sources
#[derive(Debug, Clone)]
pub struct HeadEvent {
    /// Header the event announces
    pub head: ChainHead,
}
