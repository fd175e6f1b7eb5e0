//! Error types for the sniffing pipeline
//!
//! One enum per failure domain. Every failure below the dispatcher is
//! handled locally (logged, unit of work skipped); none of these types
//! ever crosses into the host node.

use alloy::primitives::B256;
use thiserror::Error;

/// Failures while retrieving chain data (blocks, receipts, state)
///
/// For the full variant these come from local storage; for the light
/// variant from on-demand remote retrieval.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The requested block is unknown to the data source
    #[error("block {0} not found")]
    BlockNotFound(B256),

    /// No state snapshot is available for the requested root
    #[error("state unavailable for root {0}")]
    StateUnavailable(B256),

    /// On-demand retrieval failed (network, proof, backend)
    #[error("remote retrieval failed: {0}")]
    Remote(String),
}

/// Typed failure returned by the transaction-application entry point
#[derive(Debug, Error)]
pub enum ApplyError {
    /// Declared nonce is below the snapshot's recorded nonce
    #[error("nonce too low: state {state}, tx {tx}")]
    NonceTooLow { state: u64, tx: u64 },

    /// Sender balance cannot cover gas * price + value
    #[error("insufficient funds for gas * price + value")]
    InsufficientFunds,

    /// Gas allowance handed to the application was below the intrinsic cost
    #[error("gas allowance {allowance} below intrinsic gas {intrinsic}")]
    IntrinsicGas { allowance: u64, intrinsic: u64 },

    /// Any other execution failure surfaced by the host EVM
    #[error("execution failed: {0}")]
    Execution(String),
}

/// Failures extracting the collected call frames after execution
#[derive(Debug, Error)]
pub enum TraceError {
    /// Execution ended while call frames were still open
    #[error("{0} call frame(s) left open after execution")]
    UnfinishedCall(usize),
}

/// Failures deriving a transaction sender from its signature
#[derive(Debug, Error)]
pub enum SenderError {
    /// Signature does not verify under the chain's signature scheme
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Transaction type is not supported by the configured signer
    #[error("unsupported transaction type {0}")]
    UnsupportedType(u8),
}

/// Failures establishing the analysis-backend connection
#[derive(Debug, Error)]
pub enum BackendError {
    /// The one-time connect call failed; retried on the next observation
    #[error("backend connect failed: {0}")]
    Connect(String),
}
