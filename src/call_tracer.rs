//! Call-frame collector plugged into transaction application
//!
//! The host EVM drives this collector through paired `enter`/`exit`
//! hooks while applying a transaction. The collector reconstructs the
//! complete call hierarchy:
//! - every frame records its position in the tree (`trace_address`)
//! - finished frames fold into their parent's subtraces
//! - failed frames whose children all succeeded are marked as the
//!   error origin
//!
//! Extraction through [`CallTracer::take_frames`] fails when frames are
//! still open, which callers treat the same as an application failure.

use alloy::primitives::{Address, Bytes, U256};

use crate::errors::TraceError;
use crate::types::{CallKind, CallStatus, CallTrace};

/// Collector for the recursive call frames of one transaction
#[derive(Debug, Default)]
pub struct CallTracer {
    /// When set, nested frames are not recorded
    only_top_call: bool,
    /// Frames recorded so far; completed non-root frames are folded into
    /// their parents as execution unwinds
    frames: Vec<CallTrace>,
    /// Indices into `frames` for the currently open frames
    call_stack: Vec<usize>,
    /// Depth of nested frames being skipped in top-call-only mode
    skip_depth: usize,
}

impl CallTracer {
    pub fn new(only_top_call: bool) -> Self {
        Self {
            only_top_call,
            ..Default::default()
        }
    }

    /// Records entry into a new call frame
    pub fn enter(
        &mut self,
        kind: CallKind,
        from: Address,
        to: Address,
        value: U256,
        input: Bytes,
        gas: u64,
    ) {
        if self.only_top_call && !self.call_stack.is_empty() {
            self.skip_depth += 1;
            return;
        }

        let mut trace_address = Vec::new();
        if let Some(&parent_index) = self.call_stack.last() {
            trace_address = self.frames[parent_index].trace_address.clone();
            trace_address.push(self.frames[parent_index].subtraces.len());
        }

        self.frames.push(CallTrace {
            kind,
            from,
            to,
            value,
            input,
            gas,
            gas_used: 0,
            output: Bytes::new(),
            status: CallStatus::InProgress,
            error_origin: false,
            subtraces: Vec::new(),
            trace_address,
        });
        self.call_stack.push(self.frames.len() - 1);
    }

    /// Records completion of the innermost open frame.
    ///
    /// Pops the frame, fills in the results, marks the error origin and
    /// moves the frame into its parent's subtraces if it has one.
    pub fn exit(&mut self, gas_used: u64, output: Bytes, status: CallStatus) {
        if self.skip_depth > 0 {
            self.skip_depth -= 1;
            return;
        }

        let Some(trace_index) = self.call_stack.pop() else {
            return;
        };
        let frame = &mut self.frames[trace_index];
        frame.gas_used = gas_used;
        frame.output = output;
        frame.status = status;

        // Error origin: this frame failed while all its children succeeded
        frame.error_origin = !frame.status.is_success()
            && frame
                .subtraces
                .iter()
                .all(|subtrace| subtrace.status.is_success());

        // The parent was pushed earlier, so its index is unaffected by
        // the removal below
        if let Some(&parent_index) = self.call_stack.last() {
            let frame = self.frames.remove(trace_index);
            self.frames[parent_index].subtraces.push(frame);
        }
    }

    /// Hands out the collected top-level frames, leaving the collector empty
    pub fn take_frames(&mut self) -> Result<Vec<CallTrace>, TraceError> {
        if !self.call_stack.is_empty() {
            return Err(TraceError::UnfinishedCall(self.call_stack.len()));
        }
        Ok(std::mem::take(&mut self.frames))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    fn enter_simple(tracer: &mut CallTracer, from: u8, to: u8) {
        tracer.enter(
            CallKind::Call,
            addr(from),
            addr(to),
            U256::ZERO,
            Bytes::new(),
            100_000,
        );
    }

    #[test]
    fn nested_calls_build_a_tree() {
        let mut tracer = CallTracer::new(false);
        enter_simple(&mut tracer, 1, 2);
        enter_simple(&mut tracer, 2, 3);
        tracer.exit(500, Bytes::new(), CallStatus::Success);
        enter_simple(&mut tracer, 2, 4);
        tracer.exit(700, Bytes::new(), CallStatus::Success);
        tracer.exit(21_000, Bytes::new(), CallStatus::Success);

        let frames = tracer.take_frames().unwrap();
        assert_eq!(frames.len(), 1);
        let root = &frames[0];
        assert_eq!(root.subtraces.len(), 2);
        assert_eq!(root.trace_address, Vec::<usize>::new());
        assert_eq!(root.subtraces[0].trace_address, vec![0]);
        assert_eq!(root.subtraces[1].trace_address, vec![1]);
        assert_eq!(root.subtraces[1].to, addr(4));
        assert_eq!(root.gas_used, 21_000);
    }

    #[test]
    fn failed_leaf_is_the_error_origin() {
        let mut tracer = CallTracer::new(false);
        enter_simple(&mut tracer, 1, 2);
        enter_simple(&mut tracer, 2, 3);
        tracer.exit(
            500,
            Bytes::new(),
            CallStatus::Revert("Insufficient balance".into()),
        );
        tracer.exit(
            21_000,
            Bytes::new(),
            CallStatus::Revert("Insufficient balance".into()),
        );

        let frames = tracer.take_frames().unwrap();
        let root = &frames[0];
        // The propagated failure is not the origin; the leaf is
        assert!(!root.error_origin);
        assert!(root.subtraces[0].error_origin);
    }

    #[test]
    fn unfinished_call_fails_extraction() {
        let mut tracer = CallTracer::new(false);
        enter_simple(&mut tracer, 1, 2);
        enter_simple(&mut tracer, 2, 3);
        tracer.exit(500, Bytes::new(), CallStatus::Success);

        let err = tracer.take_frames().unwrap_err();
        assert!(matches!(err, TraceError::UnfinishedCall(1)));
    }

    #[test]
    fn top_call_only_skips_nested_frames() {
        let mut tracer = CallTracer::new(true);
        enter_simple(&mut tracer, 1, 2);
        enter_simple(&mut tracer, 2, 3);
        enter_simple(&mut tracer, 3, 4);
        tracer.exit(100, Bytes::new(), CallStatus::Success);
        tracer.exit(200, Bytes::new(), CallStatus::Success);
        tracer.exit(21_000, Bytes::new(), CallStatus::Success);

        let frames = tracer.take_frames().unwrap();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].subtraces.is_empty());
        assert_eq!(frames[0].gas_used, 21_000);
    }
}
