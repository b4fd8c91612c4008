//! # Operation Queue
//!
//! Ordered log of work issued while the wrapped store is not ready. Calls and
//! iterator requests share one queue so their relative order survives replay.

use crate::domain::call::DeferredCall;
use crate::error::DeferredError;
use crate::iterator::DeferredIterator;
use std::collections::VecDeque;

/// One entry of the operation queue.
#[derive(Debug)]
pub enum QueuedOperation {
    /// A deferred store call.
    Call(DeferredCall),
    /// Position at which an iterator was requested; bound when reached.
    Iterator(DeferredIterator),
}

impl QueuedOperation {
    /// Name used in logs and errors.
    pub fn method(&self) -> &'static str {
        match self {
            QueuedOperation::Call(call) => call.method(),
            QueuedOperation::Iterator(_) => "iterator",
        }
    }

    /// Resolve the entry with `error` instead of running it.
    pub fn fail(self, error: DeferredError) {
        match self {
            QueuedOperation::Call(call) => call.fail(error),
            QueuedOperation::Iterator(iterator) => iterator.fail(error),
        }
    }
}

/// Bounded FIFO of [`QueuedOperation`]s.
///
/// `max_pending == 0` means unbounded.
#[derive(Debug, Default)]
pub struct OperationQueue {
    entries: VecDeque<QueuedOperation>,
    max_pending: usize,
}

impl OperationQueue {
    pub fn new(max_pending: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_pending,
        }
    }

    /// Append an operation, or hand it back with `QueueFull` when at capacity.
    pub fn push(
        &mut self,
        operation: QueuedOperation,
    ) -> Result<(), (QueuedOperation, DeferredError)> {
        if self.is_full() {
            let error = DeferredError::QueueFull {
                pending: self.entries.len(),
                max: self.max_pending,
            };
            return Err((operation, error));
        }
        self.entries.push_back(operation);
        Ok(())
    }

    pub fn is_full(&self) -> bool {
        self.max_pending != 0 && self.entries.len() >= self.max_pending
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry, in FIFO order, leaving the queue empty.
    pub fn take(&mut self) -> Vec<QueuedOperation> {
        self.entries.drain(..).collect()
    }
}
