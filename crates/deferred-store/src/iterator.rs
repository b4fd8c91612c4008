//! # Deferred Iterator
//!
//! Handle returned by [`DeferredStore::iterator`](crate::DeferredStore::iterator).
//! It can be used immediately, whatever the adapter state.
//!
//! ```text
//! [UNBOUND] ──dispatcher reaches the request──→ [BOUND] (sub-operation worker)
//!     │
//!     └── open failed ──→ [FAILED] (every call rejected)
//! ```
//!
//! While unbound, `seek`/`next`/`end` are recorded in call order. Binding
//! creates the real iterator from the stored range options and spawns a
//! worker that owns it; the recorded calls are sent to the worker first and
//! every later call follows them, so one handle's calls always reach the real
//! iterator in issuance order. Seek targets are kept raw and encoded by the
//! store in the worker, so the store's key encoding applies even though it
//! did not exist at issuance.

use crate::domain::call::{reply_channel, resolved, Pending, Reply};
use crate::domain::lifecycle::Readiness;
use crate::domain::options::{Entry, Key, RangeOptions};
use crate::error::{DeferredError, DeferredResult};
use crate::ports::outbound::{KeyValueStore, StoreIterator};
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error};

/// Sub-operation of a deferred iterator.
enum IteratorOperation {
    Seek { target: Key },
    Next { reply: Reply<Option<Entry>> },
    End { reply: Reply<()> },
}

impl IteratorOperation {
    fn reject(self, error: DeferredError) {
        match self {
            IteratorOperation::Seek { .. } => {}
            IteratorOperation::Next { reply } => {
                let _ = reply.send(Err(error));
            }
            IteratorOperation::End { reply } => {
                let _ = reply.send(Err(error));
            }
        }
    }
}

struct BoundIterator {
    sender: mpsc::UnboundedSender<IteratorOperation>,
    /// Adapter session the iterator was created in.
    session: u64,
}

enum Binding {
    Unbound(Vec<IteratorOperation>),
    Bound(BoundIterator),
    Failed(DeferredError),
}

struct IteratorState {
    binding: Binding,
    /// `end()` has been called (queued or forwarded).
    ended: bool,
}

struct IteratorShared {
    options: RangeOptions,
    max_pending: usize,
    readiness: watch::Receiver<Readiness>,
    state: Mutex<IteratorState>,
}

/// Iteration handle that may or may not be bound to a real iterator yet.
#[derive(Clone)]
pub struct DeferredIterator {
    shared: Arc<IteratorShared>,
}

impl DeferredIterator {
    /// Unbound handle; bound when the dispatcher reaches its request.
    pub(crate) fn unbound(
        options: RangeOptions,
        max_pending: usize,
        readiness: watch::Receiver<Readiness>,
    ) -> Self {
        Self {
            shared: Arc::new(IteratorShared {
                options,
                max_pending,
                readiness,
                state: Mutex::new(IteratorState {
                    binding: Binding::Unbound(Vec::new()),
                    ended: false,
                }),
            }),
        }
    }

    /// Range options the real iterator is (or will be) created with.
    pub fn options(&self) -> &RangeOptions {
        &self.shared.options
    }

    /// Whether a real iterator is attached.
    pub fn is_bound(&self) -> bool {
        matches!(self.shared.state.lock().binding, Binding::Bound(_))
    }

    /// Whether `end()` has been called.
    pub fn is_ended(&self) -> bool {
        self.shared.state.lock().ended
    }

    /// Sub-operations waiting for binding.
    pub fn pending_operations(&self) -> usize {
        match &self.shared.state.lock().binding {
            Binding::Unbound(operations) => operations.len(),
            Binding::Bound(_) | Binding::Failed(_) => 0,
        }
    }

    /// Reposition the iterator at `target`.
    ///
    /// The target is encoded by the wrapped store right before it reaches the
    /// real iterator, which for an unbound handle means after binding.
    pub fn seek(&self, target: impl Into<Key>) -> DeferredResult<()> {
        let target = target.into();
        let mut state = self.shared.state.lock();
        if state.ended {
            return Err(DeferredError::NotOpen);
        }
        self.push(&mut state.binding, IteratorOperation::Seek { target }, true)
            .map_err(|(_, error)| error)
    }

    /// Advance to the next entry; `None` once the range is exhausted.
    pub fn next(&self) -> Pending<Option<Entry>> {
        let mut state = self.shared.state.lock();
        if state.ended {
            return resolved(Err(DeferredError::NotOpen));
        }

        let (reply, pending) = reply_channel("next");
        if let Err((operation, error)) =
            self.push(&mut state.binding, IteratorOperation::Next { reply }, true)
        {
            operation.reject(error);
        }
        pending
    }

    /// End iteration and release the real iterator.
    ///
    /// Every later `seek`/`next`/`end` fails with [`DeferredError::NotOpen`].
    pub fn end(&self) -> Pending<()> {
        let mut state = self.shared.state.lock();
        if state.ended {
            return resolved(Err(DeferredError::NotOpen));
        }
        state.ended = true;

        let (reply, pending) = reply_channel("end");
        // Not capped: releasing must always be possible.
        if let Err((operation, error)) =
            self.push(&mut state.binding, IteratorOperation::End { reply }, false)
        {
            operation.reject(error);
        }
        pending
    }

    /// Consume the handle as a stream of entries.
    ///
    /// The stream stops after the range is exhausted or after the first error.
    /// It does not call `end()`.
    pub fn into_stream(self) -> BoxStream<'static, DeferredResult<Entry>> {
        futures::stream::unfold(Some(self), |iterator| async move {
            let iterator = iterator?;
            match iterator.next().await {
                Ok(Some(entry)) => Some((Ok(entry), Some(iterator))),
                Ok(None) => None,
                Err(error) => Some((Err(error), None)),
            }
        })
        .boxed()
    }

    /// Attach a real iterator created from `store` and start its worker.
    ///
    /// Called once, by the dispatch worker, when this handle's request is
    /// reached. Recorded sub-operations are sent to the worker before the
    /// binding becomes visible, so later calls queue up behind them.
    pub(crate) fn bind(&self, store: Arc<dyn KeyValueStore>, session: u64) {
        let (sender, receiver) = mpsc::unbounded_channel();

        let iterator = {
            let mut state = self.shared.state.lock();
            let operations = match &mut state.binding {
                Binding::Unbound(operations) => std::mem::take(operations),
                Binding::Bound(_) | Binding::Failed(_) => {
                    error!("Deferred iterator bound twice; keeping the first binding");
                    return;
                }
            };

            debug!(
                pending = operations.len(),
                session = session,
                "Binding deferred iterator"
            );
            let iterator = store.iterator(self.shared.options.clone());
            for operation in operations {
                // Receiver is alive until the worker is spawned below.
                let _ = sender.send(operation);
            }
            state.binding = Binding::Bound(BoundIterator { sender, session });
            iterator
        };

        tokio::spawn(drive(store, iterator, receiver));
    }

    /// Reject queued and future sub-operations with `error`.
    pub(crate) fn fail(&self, error: DeferredError) {
        let operations = {
            let mut state = self.shared.state.lock();
            match std::mem::replace(&mut state.binding, Binding::Failed(error.clone())) {
                Binding::Unbound(operations) => operations,
                previous => {
                    state.binding = previous;
                    return;
                }
            }
        };

        for operation in operations {
            operation.reject(error.clone());
        }
    }

    /// Record `operation` while unbound, or send it to the bound worker.
    ///
    /// On failure the operation is handed back with the error to resolve it with.
    fn push(
        &self,
        binding: &mut Binding,
        operation: IteratorOperation,
        capped: bool,
    ) -> Result<(), (IteratorOperation, DeferredError)> {
        match binding {
            Binding::Unbound(operations) => {
                if capped {
                    if let Err(error) = self.check_capacity(operations) {
                        return Err((operation, error));
                    }
                }
                operations.push(operation);
                Ok(())
            }
            Binding::Bound(bound) => {
                if let Err(error) = self.ensure_ready(bound.session) {
                    return Err((operation, error));
                }
                bound
                    .sender
                    .send(operation)
                    .map_err(|rejected| (rejected.0, DeferredError::NotOpen))
            }
            Binding::Failed(error) => Err((operation, error.clone())),
        }
    }

    fn check_capacity(&self, operations: &[IteratorOperation]) -> DeferredResult<()> {
        let max = self.shared.max_pending;
        if max != 0 && operations.len() >= max {
            return Err(DeferredError::QueueFull {
                pending: operations.len(),
                max,
            });
        }
        Ok(())
    }

    fn ensure_ready(&self, session: u64) -> DeferredResult<()> {
        if self.shared.readiness.borrow().is_ready_in(session) {
            Ok(())
        } else {
            Err(DeferredError::NotOpen)
        }
    }
}

/// Run sub-operations against the real iterator until `end` or until every
/// handle is gone.
async fn drive(
    store: Arc<dyn KeyValueStore>,
    mut iterator: Box<dyn StoreIterator>,
    mut operations: mpsc::UnboundedReceiver<IteratorOperation>,
) {
    while let Some(operation) = operations.recv().await {
        match operation {
            IteratorOperation::Seek { target } => iterator.seek(store.encode_key(target)),
            IteratorOperation::Next { reply } => {
                let result = iterator.next().await.map_err(DeferredError::from);
                let _ = reply.send(result);
            }
            IteratorOperation::End { reply } => {
                let result = iterator.end().await.map_err(DeferredError::from);
                let _ = reply.send(result);
                break;
            }
        }
    }
}

impl fmt::Debug for DeferredIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        let binding = match &state.binding {
            Binding::Unbound(operations) => format!("unbound ({} pending)", operations.len()),
            Binding::Bound(bound) => format!("bound (session {})", bound.session),
            Binding::Failed(error) => format!("failed ({})", error),
        };
        f.debug_struct("DeferredIterator")
            .field("options", &self.shared.options)
            .field("binding", &binding)
            .field("ended", &state.ended)
            .finish()
    }
}
