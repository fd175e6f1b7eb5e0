//! Transaction replay engine
//!
//! Re-applies an ordered transaction batch against a disposable state
//! snapshot with tracing enabled and collects one receipt and one set of
//! call frames per transaction.
//!
//! Edge policy, in order, per transaction:
//! - sender derivation failure: warn and skip the transaction; a
//!   skipped transaction appears in none of the outcome lists, so the
//!   transaction/receipt pairing stays positionally aligned
//! - declared nonce ahead of the snapshot: force the snapshot nonce up
//! - gas allowance per [`GasMode`]; an exhausted block pool truncates
//! - application failure: log and truncate the batch
//! - receipts are sanitized before leaving this module
//! - trace-extraction failure: log and truncate the batch
//!
//! Truncation never discards what was already collected; partial results
//! are still forwarded to the feeder.

use tracing::{error, info, warn};

use crate::call_tracer::CallTracer;
use crate::traits::{SenderRecovery, StateSnapshot};
use crate::types::{CallTrace, ChainHead, ObservationKind, PooledTransaction, Receipt};

/// Gas allotment policy for a replay run
#[derive(Debug, Clone, Copy)]
pub enum GasMode {
    /// Each transaction is evaluated against its own declared gas limit
    /// (mempool contexts)
    PerTransaction,
    /// All allowances draw from a shared pool capped at the block's
    /// declared gas limit (block-replay contexts)
    BlockLimit(u64),
}

/// Receipts and call frames collected by one replay run.
///
/// `transactions` holds the transactions that were actually applied and
/// is index-aligned with `receipts`; a skipped transaction appears in
/// neither list, so downstream positional pairing stays correct.
/// `traces` is aligned with both except when extraction of the final
/// transaction's frames failed, in which case it is one element shorter.
#[derive(Debug, Default)]
pub struct ReplayOutcome {
    pub transactions: Vec<PooledTransaction>,
    pub receipts: Vec<Receipt>,
    pub traces: Vec<Vec<CallTrace>>,
}

/// Replays `txs` in order against `snapshot`, stopping at the first
/// irrecoverable failure. Never fails itself; returns whatever prefix
/// was produced.
pub fn replay_batch<S: StateSnapshot>(
    snapshot: &mut S,
    signer: &dyn SenderRecovery,
    head: &ChainHead,
    txs: &[PooledTransaction],
    gas_mode: GasMode,
    kind: ObservationKind,
) -> ReplayOutcome {
    let mut pool = match gas_mode {
        GasMode::PerTransaction => None,
        GasMode::BlockLimit(limit) => Some(limit),
    };

    let mut outcome = ReplayOutcome {
        transactions: Vec::with_capacity(txs.len()),
        receipts: Vec::with_capacity(txs.len()),
        traces: Vec::with_capacity(txs.len()),
    };

    for tx in txs {
        let sender = match signer.recover(tx) {
            Ok(sender) => sender,
            Err(err) => {
                warn!(
                    err = %err,
                    tx_hash = %tx.hash,
                    number = head.number,
                    ctx = %kind,
                    "sender derivation failed, skipping transaction"
                );
                continue;
            }
        };

        // Speculative mempool ordering may run ahead of canonical state
        let state_nonce = snapshot.nonce(sender);
        if tx.nonce > state_nonce {
            snapshot.set_nonce(sender, tx.nonce);
        }
        info!(
            tx_hash = %tx.hash,
            tx_nonce = tx.nonce,
            state_nonce,
            number = head.number,
            ctx = %kind,
            "applying transaction"
        );

        let allowance = match pool {
            Some(remaining) => {
                if tx.gas_limit > remaining {
                    error!(
                        tx_hash = %tx.hash,
                        gas_limit = tx.gas_limit,
                        remaining,
                        number = head.number,
                        ctx = %kind,
                        "block gas pool exhausted"
                    );
                    break;
                }
                tx.gas_limit
            }
            None => tx.gas_limit,
        };

        let mut tracer = CallTracer::new(false);
        let mut receipt = match snapshot.apply(head, tx, sender, allowance, &mut tracer) {
            Ok(receipt) => receipt,
            Err(err) => {
                error!(
                    err = %err,
                    tx_hash = %tx.hash,
                    number = head.number,
                    ctx = %kind,
                    "transaction application failed"
                );
                break;
            }
        };
        if let Some(remaining) = pool.as_mut() {
            *remaining -= receipt.gas_used.min(*remaining);
        }

        receipt.sanitize();
        outcome.transactions.push(tx.clone());
        outcome.receipts.push(receipt);

        match tracer.take_frames() {
            Ok(frames) => outcome.traces.push(frames),
            Err(err) => {
                error!(
                    err = %err,
                    tx_hash = %tx.hash,
                    number = head.number,
                    ctx = %kind,
                    "call trace extraction failed"
                );
                break;
            }
        }
    }

    outcome
}
