//! # Dispatch Worker
//!
//! One worker per ready session. It runs, one at a time and in issuance
//! order, first the backlog taken from the operation queue and then every
//! operation sent to it while the adapter stays ready.
//!
//! ```text
//! open ok ──→ spawn(worker: backlog, rx) ──→ backlog replayed ──→ drained signal
//!                                                                     │
//!             put/get/iterator while ready ──tx──→ rx ──→ run in order ┘
//! ```
//!
//! Close drops the sender and waits for the worker, so everything issued
//! before the close reaches the store before the store closes.

use crate::domain::queue::QueuedOperation;
use crate::metrics::DeferredStats;
use crate::ports::outbound::KeyValueStore;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Handle to a running dispatch worker.
pub(crate) struct DispatchWorker {
    sender: mpsc::UnboundedSender<QueuedOperation>,
    handle: JoinHandle<()>,
    session: u64,
}

impl DispatchWorker {
    /// Spawn a worker for `session`.
    ///
    /// The returned receiver resolves once `backlog` has been replayed.
    /// Must be called from within a Tokio runtime.
    pub(crate) fn start(
        store: Arc<dyn KeyValueStore>,
        stats: Arc<DeferredStats>,
        backlog: Vec<QueuedOperation>,
        session: u64,
    ) -> (Self, oneshot::Receiver<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (drained, drained_rx) = oneshot::channel();
        let handle = tokio::spawn(run(store, stats, backlog, receiver, drained, session));
        (
            Self {
                sender,
                handle,
                session,
            },
            drained_rx,
        )
    }

    /// Hand `operation` to the worker, or give it back if the worker is gone.
    pub(crate) fn send(&self, operation: QueuedOperation) -> Result<(), QueuedOperation> {
        self.sender.send(operation).map_err(|error| error.0)
    }

    /// Stop accepting work and wait until everything already sent has run.
    pub(crate) async fn shutdown(self) {
        let Self {
            sender,
            handle,
            session,
        } = self;
        drop(sender);

        if let Err(error) = handle.await {
            warn!(session = session, error = %error, "Dispatch worker stopped abnormally");
        }
    }
}

async fn run(
    store: Arc<dyn KeyValueStore>,
    stats: Arc<DeferredStats>,
    backlog: Vec<QueuedOperation>,
    mut receiver: mpsc::UnboundedReceiver<QueuedOperation>,
    drained: oneshot::Sender<()>,
    session: u64,
) {
    let replayed = backlog.len();
    for operation in backlog {
        execute(&store, &stats, operation, session).await;
        stats.record_replayed();
    }
    if replayed > 0 {
        info!(replayed = replayed, session = session, "Deferred operations replayed");
    }
    // Receiver gone means the opener stopped waiting; keep serving.
    let _ = drained.send(());

    while let Some(operation) = receiver.recv().await {
        execute(&store, &stats, operation, session).await;
    }

    debug!(session = session, "Dispatch worker stopped");
}

async fn execute(
    store: &Arc<dyn KeyValueStore>,
    stats: &DeferredStats,
    operation: QueuedOperation,
    session: u64,
) {
    match operation {
        QueuedOperation::Call(call) => {
            let method = call.method();
            if !call.execute(store.as_ref()).await {
                debug!(operation = method, session = session, "Store reported failure");
            }
        }
        QueuedOperation::Iterator(iterator) => {
            iterator.bind(Arc::clone(store), session);
            stats.record_iterator_bound();
        }
    }
}
