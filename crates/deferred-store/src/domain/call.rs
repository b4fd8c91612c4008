//! # Deferred Calls
//!
//! A captured invocation of one store method: its arguments plus the channel
//! that delivers the outcome to the caller. The same record is sent to the
//! dispatch worker when the adapter is ready, or queued and replayed at drain.

use crate::domain::manifest::{AdditionalMethod, AdditionalReply};
use crate::domain::options::{BatchOperation, Key, RangeOptions, ReadOptions, Value, WriteOptions};
use crate::error::{DeferredError, DeferredResult};
use crate::ports::outbound::KeyValueStore;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::oneshot;

/// Completion of an adapter operation.
///
/// The operation is already queued (or handed to the dispatch worker) when
/// this value is returned; awaiting it only observes the outcome.
pub type Pending<T> = BoxFuture<'static, DeferredResult<T>>;

/// Sending half of a completion.
pub type Reply<T> = oneshot::Sender<DeferredResult<T>>;

/// Create a reply channel and the [`Pending`] that observes it.
///
/// If the sender is dropped without a reply the pending resolves to
/// [`DeferredError::Dropped`].
pub fn reply_channel<T: Send + 'static>(operation: &'static str) -> (Reply<T>, Pending<T>) {
    let (tx, rx) = oneshot::channel();
    let pending = async move {
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(DeferredError::Dropped { operation }),
        }
    }
    .boxed();
    (tx, pending)
}

/// A [`Pending`] that is already resolved.
pub fn resolved<T: Send + 'static>(result: DeferredResult<T>) -> Pending<T> {
    futures::future::ready(result).boxed()
}

/// Captured call to a deferrable store method.
#[derive(Debug)]
pub enum DeferredCall {
    Get {
        key: Key,
        options: ReadOptions,
        reply: Reply<Option<Value>>,
    },
    GetMany {
        keys: Vec<Key>,
        options: ReadOptions,
        reply: Reply<Vec<Option<Value>>>,
    },
    Put {
        key: Key,
        value: Value,
        options: WriteOptions,
        reply: Reply<()>,
    },
    Delete {
        key: Key,
        options: WriteOptions,
        reply: Reply<()>,
    },
    Batch {
        operations: Vec<BatchOperation>,
        options: WriteOptions,
        reply: Reply<()>,
    },
    Clear {
        range: RangeOptions,
        reply: Reply<()>,
    },
    /// Any manifest-gated optional method.
    Additional {
        method: AdditionalMethod,
        start: Key,
        end: Key,
        reply: Reply<AdditionalReply>,
    },
}

impl DeferredCall {
    /// Name of the store method this call targets.
    pub fn method(&self) -> &'static str {
        match self {
            DeferredCall::Get { .. } => "get",
            DeferredCall::GetMany { .. } => "get_many",
            DeferredCall::Put { .. } => "put",
            DeferredCall::Delete { .. } => "delete",
            DeferredCall::Batch { .. } => "batch",
            DeferredCall::Clear { .. } => "clear",
            DeferredCall::Additional { method, .. } => method.name(),
        }
    }

    /// Run the call against `store` and deliver the outcome to its caller.
    ///
    /// Returns whether the store reported success.
    pub async fn execute<S>(self, store: &S) -> bool
    where
        S: KeyValueStore + ?Sized,
    {
        match self {
            DeferredCall::Get {
                key,
                options,
                reply,
            } => deliver(reply, store.get(key, options).await),
            DeferredCall::GetMany {
                keys,
                options,
                reply,
            } => deliver(reply, store.get_many(keys, options).await),
            DeferredCall::Put {
                key,
                value,
                options,
                reply,
            } => deliver(reply, store.put(key, value, options).await),
            DeferredCall::Delete {
                key,
                options,
                reply,
            } => deliver(reply, store.delete(key, options).await),
            DeferredCall::Batch {
                operations,
                options,
                reply,
            } => deliver(reply, store.batch(operations, options).await),
            DeferredCall::Clear { range, reply } => deliver(reply, store.clear(range).await),
            DeferredCall::Additional {
                method,
                start,
                end,
                reply,
            } => deliver(reply, store.call_additional(method, start, end).await),
        }
    }

    /// Resolve the call with `error` without touching the store.
    pub fn fail(self, error: DeferredError) {
        match self {
            DeferredCall::Get { reply, .. } => reject(reply, error),
            DeferredCall::GetMany { reply, .. } => reject(reply, error),
            DeferredCall::Put { reply, .. }
            | DeferredCall::Delete { reply, .. }
            | DeferredCall::Batch { reply, .. }
            | DeferredCall::Clear { reply, .. } => reject(reply, error),
            DeferredCall::Additional { reply, .. } => reject(reply, error),
        }
    }
}

fn deliver<T>(reply: Reply<T>, result: crate::error::StoreResult<T>) -> bool {
    let ok = result.is_ok();
    // Receiver gone means the caller stopped waiting; the store call still ran.
    let _ = reply.send(result.map_err(DeferredError::from));
    ok
}

fn reject<T>(reply: Reply<T>, error: DeferredError) {
    let _ = reply.send(Err(error));
}
