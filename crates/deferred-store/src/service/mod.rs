//! # Deferred Store Service
//!
//! The lifecycle dispatcher. Wraps a [`KeyValueStore`] and decides, per call,
//! whether to forward it to the store or append it to the operation queue.
//!
//! ## Dispatch
//!
//! - `Ready`: calls are handed to the session's [`DispatchWorker`] at issue
//!   time and run whether or not the caller awaits them.
//! - Any other state: calls are appended to the queue and replayed, in
//!   issuance order, when an open succeeds.
//!
//! On a successful open the state flips to `Ready`, the queue is taken and a
//! worker is started with it as backlog, all under one lock. Anything issued
//! afterwards (including work chained off a queued call's completion) goes
//! to the worker's channel and runs after the backlog. It never lands in the
//! queue being drained. Side effects of a store call (an iterating range
//! clear, say) go to the store directly.
//!
//! ## Locking
//!
//! Dispatcher state (lifecycle, session, queue, worker) sits behind one
//! `parking_lot::Mutex`. It is never held across an `.await`.

mod dispatch;

use crate::batch::ChainedBatch;
use crate::config::DeferredConfig;
use crate::domain::call::{reply_channel, DeferredCall, Pending};
use crate::domain::lifecycle::{LifecycleEvent, LifecycleState, Readiness};
use crate::domain::manifest::{merge_capabilities, AdditionalMethod, AdditionalReply, Manifest};
use crate::domain::options::{
    BatchOperation, Key, OpenOptions, RangeOptions, ReadOptions, Value, WriteOptions,
};
use crate::domain::queue::{OperationQueue, QueuedOperation};
use crate::error::{DeferredError, DeferredResult};
use crate::iterator::DeferredIterator;
use crate::metrics::{DeferredStats, StatsSnapshot};
use crate::ports::outbound::KeyValueStore;
use dispatch::DispatchWorker;
use futures::FutureExt;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

/// Value of [`DeferredStore::store_type`].
pub const STORE_TYPE: &str = "deferred";

struct DispatcherState {
    state: LifecycleState,
    /// Incremented on every successful open.
    session: u64,
    queue: OperationQueue,
    /// Present exactly while `Ready`.
    worker: Option<DispatchWorker>,
}

/// Key-value store adapter that accepts operations before the store is open.
///
/// Share it behind an `Arc`; every method takes `&self`. `open` and `close`
/// must run inside a Tokio runtime.
///
/// ```ignore
/// let db = DeferredStore::new(InMemoryStore::new());
/// let write = db.put(b"key", b"value", WriteOptions::default()); // queued
/// db.open(OpenOptions::default()).await?;                         // replayed
/// write.await?;
/// ```
pub struct DeferredStore<S: KeyValueStore> {
    store: Arc<S>,
    manifest: Manifest,
    config: DeferredConfig,
    dispatcher: Mutex<DispatcherState>,
    readiness: watch::Sender<Readiness>,
    stats: Arc<DeferredStats>,
}

impl<S: KeyValueStore> DeferredStore<S> {
    /// Wrap `store` with the default configuration.
    pub fn new(store: S) -> Self {
        Self::with_config(store, DeferredConfig::default())
    }

    /// Wrap `store`. The capability manifest is merged here, once.
    pub fn with_config(store: S, config: DeferredConfig) -> Self {
        let manifest = merge_capabilities(&store);
        let (readiness, _) = watch::channel(Readiness::default());

        debug!(
            additional_methods = ?manifest.supported_methods().collect::<Vec<_>>(),
            max_pending = config.max_pending_operations,
            "Deferred store created"
        );

        Self {
            store: Arc::new(store),
            manifest,
            dispatcher: Mutex::new(DispatcherState {
                state: LifecycleState::NotReady,
                session: 0,
                queue: OperationQueue::new(config.max_pending_operations),
                worker: None,
            }),
            config,
            readiness,
            stats: Arc::new(DeferredStats::default()),
        }
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Open the wrapped store with `options`, then replay the queue.
    ///
    /// Resolves once every queued operation has run. If the store fails to
    /// open, every queued operation fails with
    /// [`DeferredError::ResourceUnavailable`] and the store's error is
    /// returned.
    pub async fn open(&self, options: OpenOptions) -> DeferredResult<()> {
        {
            let mut dispatcher = self.dispatcher.lock();
            self.apply(&mut dispatcher, LifecycleEvent::OpenRequested)?;
        }
        info!("Opening wrapped store");

        match self.store.open(options).await {
            Ok(()) => {
                let (drained, queued, session) = {
                    let mut dispatcher = self.dispatcher.lock();
                    dispatcher.session += 1;
                    self.apply(&mut dispatcher, LifecycleEvent::OpenSucceeded)?;
                    let backlog = dispatcher.queue.take();
                    let queued = backlog.len();
                    (
                        self.start_worker(&mut dispatcher, backlog),
                        queued,
                        dispatcher.session,
                    )
                };
                info!(
                    session = session,
                    queued = queued,
                    "Wrapped store open; replaying deferred operations"
                );
                if drained.await.is_err() {
                    warn!(session = session, "Dispatch worker stopped before replay finished");
                }
                Ok(())
            }
            Err(error) => {
                let operations = {
                    let mut dispatcher = self.dispatcher.lock();
                    self.apply(&mut dispatcher, LifecycleEvent::OpenFailed)?;
                    dispatcher.queue.take()
                };
                warn!(
                    error = %error,
                    queued = operations.len(),
                    "Wrapped store failed to open; failing deferred operations"
                );
                let reason = error.to_string();
                self.fail_all(operations, |operation| DeferredError::ResourceUnavailable {
                    operation,
                    reason: reason.clone(),
                });
                Err(error.into())
            }
        }
    }

    /// Close the wrapped store.
    ///
    /// Everything issued while ready runs before the store is closed.
    /// Operations issued from now on are queued for a future open. A close
    /// before any open is forwarded and leaves the lifecycle untouched. If
    /// the store fails to close, the adapter is ready again and anything
    /// queued meanwhile is replayed.
    pub async fn close(&self) -> DeferredResult<()> {
        let (was_ready, worker) = {
            let mut dispatcher = self.dispatcher.lock();
            let previous = dispatcher.state;
            self.apply(&mut dispatcher, LifecycleEvent::CloseRequested)?;
            (previous == LifecycleState::Ready, dispatcher.worker.take())
        };

        if !was_ready {
            // Never opened: an open may start meanwhile, so no transition follows.
            info!("Closing wrapped store before any open");
            return self.store.close().await.map_err(DeferredError::from);
        }

        info!("Closing wrapped store");
        if let Some(worker) = worker {
            worker.shutdown().await;
        }

        match self.store.close().await {
            Ok(()) => {
                let mut dispatcher = self.dispatcher.lock();
                self.apply(&mut dispatcher, LifecycleEvent::CloseSucceeded)?;
                info!(
                    queued = dispatcher.queue.len(),
                    "Wrapped store closed"
                );
                Ok(())
            }
            Err(error) => {
                let drained = {
                    let mut dispatcher = self.dispatcher.lock();
                    self.apply(&mut dispatcher, LifecycleEvent::CloseFailed)?;
                    let backlog = dispatcher.queue.take();
                    warn!(
                        error = %error,
                        queued = backlog.len(),
                        "Wrapped store failed to close"
                    );
                    self.start_worker(&mut dispatcher, backlog)
                };
                let _ = drained.await;
                Err(error.into())
            }
        }
    }

    // =========================================================================
    // CORE OPERATIONS
    // =========================================================================

    pub fn get(&self, key: impl Into<Key>, options: ReadOptions) -> Pending<Option<Value>> {
        let (reply, pending) = reply_channel("get");
        self.submit(
            DeferredCall::Get {
                key: key.into(),
                options,
                reply,
            },
            pending,
        )
    }

    /// Read several keys; the result has one slot per key, in order.
    pub fn get_many(&self, keys: Vec<Key>, options: ReadOptions) -> Pending<Vec<Option<Value>>> {
        let (reply, pending) = reply_channel("get_many");
        self.submit(
            DeferredCall::GetMany {
                keys,
                options,
                reply,
            },
            pending,
        )
    }

    pub fn put(
        &self,
        key: impl Into<Key>,
        value: impl Into<Value>,
        options: WriteOptions,
    ) -> Pending<()> {
        let (reply, pending) = reply_channel("put");
        self.submit(
            DeferredCall::Put {
                key: key.into(),
                value: value.into(),
                options,
                reply,
            },
            pending,
        )
    }

    pub fn delete(&self, key: impl Into<Key>, options: WriteOptions) -> Pending<()> {
        let (reply, pending) = reply_channel("delete");
        self.submit(
            DeferredCall::Delete {
                key: key.into(),
                options,
                reply,
            },
            pending,
        )
    }

    /// Atomic batch write.
    pub fn batch(&self, operations: Vec<BatchOperation>, options: WriteOptions) -> Pending<()> {
        let (reply, pending) = reply_channel("batch");
        self.submit(
            DeferredCall::Batch {
                operations,
                options,
                reply,
            },
            pending,
        )
    }

    /// Start a batch built step by step and submitted with
    /// [`ChainedBatch::write`] as a single `batch` call.
    pub fn chained_batch(&self) -> ChainedBatch<'_, S> {
        ChainedBatch::new(self)
    }

    /// Delete every key in `range`.
    pub fn clear(&self, range: RangeOptions) -> Pending<()> {
        let (reply, pending) = reply_channel("clear");
        self.submit(DeferredCall::Clear { range, reply }, pending)
    }

    /// Iterate over `options`.
    ///
    /// The handle is usable at once. Its real iterator is created when the
    /// request reaches the store in issuance order (from the queue at drain,
    /// or from the dispatch worker when ready), so it observes exactly the
    /// writes issued before it.
    pub fn iterator(&self, options: RangeOptions) -> DeferredIterator {
        let iterator = DeferredIterator::unbound(
            options,
            self.config.max_pending_iterator_operations,
            self.readiness.subscribe(),
        );
        self.dispatch(QueuedOperation::Iterator(iterator.clone()));
        iterator
    }

    // =========================================================================
    // ADDITIONAL METHODS
    // =========================================================================

    /// Call an optional method on `start..end`.
    ///
    /// Fails immediately with [`DeferredError::NotSupported`] when the
    /// manifest does not list `method`; nothing is queued in that case.
    pub fn additional(
        &self,
        method: AdditionalMethod,
        start: impl Into<Key>,
        end: impl Into<Key>,
    ) -> DeferredResult<Pending<AdditionalReply>> {
        self.ensure_supported(method)?;
        let (reply, pending) = reply_channel(method.name());
        Ok(self.submit(
            DeferredCall::Additional {
                method,
                start: start.into(),
                end: end.into(),
                reply,
            },
            pending,
        ))
    }

    /// Approximate size of `start..end` in the wrapped store.
    pub fn approximate_size(
        &self,
        start: impl Into<Key>,
        end: impl Into<Key>,
    ) -> DeferredResult<Pending<u64>> {
        let method = AdditionalMethod::ApproximateSize;
        let pending = self.additional(method, start, end)?;
        Ok(pending
            .map(move |reply| {
                reply?
                    .into_size()
                    .ok_or(DeferredError::UnexpectedReply {
                        method: method.name(),
                    })
            })
            .boxed())
    }

    /// Compact `start..end` in the wrapped store.
    pub fn compact_range(
        &self,
        start: impl Into<Key>,
        end: impl Into<Key>,
    ) -> DeferredResult<Pending<()>> {
        let method = AdditionalMethod::CompactRange;
        let pending = self.additional(method, start, end)?;
        Ok(pending
            .map(move |reply| match reply? {
                AdditionalReply::Done => Ok(()),
                AdditionalReply::Size(_) => Err(DeferredError::UnexpectedReply {
                    method: method.name(),
                }),
            })
            .boxed())
    }

    // =========================================================================
    // OBSERVATION
    // =========================================================================

    pub fn status(&self) -> LifecycleState {
        self.dispatcher.lock().state
    }

    /// Watch lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<Readiness> {
        self.readiness.subscribe()
    }

    /// Operations currently waiting in the queue.
    pub fn pending_operations(&self) -> usize {
        self.dispatcher.lock().queue.len()
    }

    /// Merged capability manifest.
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn config(&self) -> &DeferredConfig {
        &self.config
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Always `"deferred"`; lets callers detect the wrapper.
    pub fn store_type(&self) -> &'static str {
        STORE_TYPE
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.store
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    /// Apply `event` and publish the new readiness. Caller holds the lock.
    fn apply(&self, dispatcher: &mut DispatcherState, event: LifecycleEvent) -> DeferredResult<()> {
        let next = dispatcher.state.transition(event)?;
        if next != dispatcher.state {
            debug!(from = %dispatcher.state, to = %next, event = ?event, "Lifecycle transition");
        }
        dispatcher.state = next;
        self.readiness.send_replace(Readiness {
            state: next,
            session: dispatcher.session,
        });
        Ok(())
    }

    /// Hand `call` to the dispatcher and return its completion.
    fn submit<T: Send + 'static>(&self, call: DeferredCall, pending: Pending<T>) -> Pending<T> {
        self.dispatch(QueuedOperation::Call(call));
        pending
    }

    /// Send `operation` to the dispatch worker when ready, otherwise queue it.
    fn dispatch(&self, operation: QueuedOperation) {
        let method = operation.method();
        let mut dispatcher = self.dispatcher.lock();

        if let Some(worker) = dispatcher.worker.as_ref() {
            match worker.send(operation) {
                Ok(()) => self.stats.record_forwarded(),
                Err(operation) => {
                    drop(dispatcher);
                    self.stats.record_failed(1);
                    warn!(operation = method, "Dispatch worker gone; operation not run");
                    operation.fail(DeferredError::ResourceUnavailable {
                        operation: method,
                        reason: "dispatch worker stopped".to_string(),
                    });
                }
            }
            return;
        }

        match dispatcher.queue.push(operation) {
            Ok(()) => {
                self.stats.record_queued();
                debug!(
                    operation = method,
                    pending = dispatcher.queue.len(),
                    state = %dispatcher.state,
                    "Queued deferred operation"
                );
            }
            Err((operation, error)) => {
                drop(dispatcher);
                self.stats.record_rejected();
                warn!(operation = method, error = %error, "Rejected deferred operation");
                operation.fail(error);
            }
        }
    }

    /// Start the session's worker with `backlog`. Caller holds the lock.
    fn start_worker(
        &self,
        dispatcher: &mut DispatcherState,
        backlog: Vec<QueuedOperation>,
    ) -> oneshot::Receiver<()> {
        let store: Arc<dyn KeyValueStore> = self.store.clone();
        let (worker, drained) =
            DispatchWorker::start(store, Arc::clone(&self.stats), backlog, dispatcher.session);
        dispatcher.worker = Some(worker);
        drained
    }

    fn fail_all<F>(&self, operations: Vec<QueuedOperation>, error: F)
    where
        F: Fn(&'static str) -> DeferredError,
    {
        self.stats.record_failed(operations.len() as u64);
        for operation in operations {
            let method = operation.method();
            operation.fail(error(method));
        }
    }

    fn ensure_supported(&self, method: AdditionalMethod) -> DeferredResult<()> {
        if self.manifest.supports(method) {
            return Ok(());
        }
        self.stats.record_rejected();
        debug!(operation = method.name(), "Additional method not in manifest");
        Err(DeferredError::NotSupported {
            method: method.name(),
        })
    }
}

impl<S: KeyValueStore> Drop for DeferredStore<S> {
    fn drop(&mut self) {
        let operations = self.dispatcher.get_mut().queue.take();
        if operations.is_empty() {
            return;
        }
        warn!(
            queued = operations.len(),
            "Deferred store dropped with operations still queued"
        );
        self.fail_all(operations, |operation| DeferredError::Dropped { operation });
    }
}
