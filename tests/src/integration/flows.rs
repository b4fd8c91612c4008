//! # Integration Test Flows
//!
//! End-to-end scenarios for the deferred adapter against the recording store,
//! which logs every call it receives so ordering can be asserted exactly.
//!
//! ## Flows Tested:
//!
//! 1. **Queue then replay**: operations issued before `open` reach the store
//!    after it opens, in issuance order
//! 2. **Iterator placement**: a deferred iterator is created exactly where it
//!    was requested relative to other queued work
//! 3. **Seek encoding**: deferred seek targets are encoded by the store at
//!    binding time
//! 4. **Capability gating**: optional methods absent from the manifest fail
//!    immediately and never reach the store
//! 5. **Concurrent callers**: many tasks issuing work before `open`, or while
//!    the queue is still draining

#[cfg(test)]
mod tests {
    use crate::init_tracing;
    use deferred_store::test_utils::{RecordingStore, StoreCall};
    use deferred_store::{
        AdditionalMethod, BatchOperation, DeferredError, DeferredStore, LifecycleState, Manifest,
        OpenOptions, RangeOptions, ReadOptions, StoreError, WriteOptions,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Notify;
    use tokio::time::timeout;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn key(value: &str) -> Vec<u8> {
        value.as_bytes().to_vec()
    }

    fn recording_store() -> DeferredStore<RecordingStore> {
        init_tracing();
        DeferredStore::new(RecordingStore::new())
    }

    // =============================================================================
    // FLOW 1: QUEUE THEN REPLAY
    // =============================================================================

    #[tokio::test]
    async fn test_put_before_open_completes_after_open() {
        let db = recording_store();

        let mut put = db.put(key("foo"), key("bar"), WriteOptions::default());

        // Nothing can complete while the store is closed.
        assert!(timeout(Duration::from_millis(20), &mut put).await.is_err());
        assert!(db.inner().calls().is_empty());

        db.open(OpenOptions::default()).await.unwrap();
        put.await.unwrap();

        assert_eq!(
            db.inner().calls()[1],
            StoreCall::Put {
                key: key("foo"),
                value: key("bar"),
                options: WriteOptions::default(),
            }
        );
    }

    #[tokio::test]
    async fn test_heterogeneous_operations_replay_in_order() {
        let db = recording_store();

        let ops = vec![
            db.put(key("a"), key("1"), WriteOptions::default()),
            db.batch(
                vec![
                    BatchOperation::put(key("b"), key("2")),
                    BatchOperation::delete(key("a")),
                ],
                WriteOptions::default(),
            ),
            db.delete(key("b"), WriteOptions::default()),
            db.clear(RangeOptions::all().gte(key("x"))),
        ];
        let iterator = db.iterator(RangeOptions::all());
        let get = db.get(key("a"), ReadOptions::default());

        db.open(OpenOptions::default()).await.unwrap();

        for op in ops {
            op.await.unwrap();
        }
        assert_eq!(get.await.unwrap(), None);
        assert_eq!(
            db.inner().methods(),
            vec!["open", "put", "batch", "delete", "clear", "iterator", "get"]
        );
        iterator.end().await.unwrap();
    }

    #[tokio::test]
    async fn test_failure_is_local_to_its_operation() {
        init_tracing();
        let db = DeferredStore::new(RecordingStore::new().with_failure(
            "delete",
            StoreError::Io {
                message: "read-only".to_string(),
            },
        ));

        let put = db.put(key("a"), key("1"), WriteOptions::default());
        let delete = db.delete(key("a"), WriteOptions::default());
        let get = db.get(key("a"), ReadOptions::default());

        db.open(OpenOptions::default()).await.unwrap();

        put.await.unwrap();
        assert!(matches!(
            delete.await,
            Err(DeferredError::Store(StoreError::Io { .. }))
        ));
        assert_eq!(get.await.unwrap(), Some(key("1")));
        assert_eq!(db.status(), LifecycleState::Ready);
    }

    // =============================================================================
    // FLOW 2: ITERATOR PLACEMENT
    // =============================================================================

    #[tokio::test]
    async fn test_iterator_created_between_puts() {
        let db = recording_store();

        let first = db.put(key("k1"), key("v1"), WriteOptions::default());
        let iterator = db.iterator(RangeOptions::all());
        let second = db.put(key("k2"), key("v2"), WriteOptions::default());

        db.open(OpenOptions::default()).await.unwrap();
        first.await.unwrap();
        second.await.unwrap();

        assert_eq!(db.inner().methods(), vec!["open", "put", "iterator", "put"]);

        // The iterator's view ends at the first put.
        assert_eq!(
            iterator.next().await.unwrap(),
            Some((key("k1"), key("v1")))
        );
        assert_eq!(iterator.next().await.unwrap(), None);
        iterator.end().await.unwrap();
    }

    #[tokio::test]
    async fn test_iterator_handles_keep_their_own_order() {
        let db = DeferredStore::new(
            RecordingStore::new().with_entries([("a", "1"), ("b", "2"), ("c", "3")]),
        );

        let forward = db.iterator(RangeOptions::all());
        let backward = db.iterator(RangeOptions::all().reverse());
        let f1 = forward.next();
        let b1 = backward.next();
        let f2 = forward.next();
        let b2 = backward.next();

        db.open(OpenOptions::default()).await.unwrap();

        assert_eq!(f1.await.unwrap().map(|e| e.0), Some(key("a")));
        assert_eq!(f2.await.unwrap().map(|e| e.0), Some(key("b")));
        assert_eq!(b1.await.unwrap().map(|e| e.0), Some(key("c")));
        assert_eq!(b2.await.unwrap().map(|e| e.0), Some(key("b")));
    }

    // =============================================================================
    // FLOW 3: SEEK ENCODING
    // =============================================================================

    #[tokio::test]
    async fn test_deferred_seek_uses_store_encoding() {
        init_tracing();
        let db = DeferredStore::new(
            RecordingStore::new()
                .with_uppercase_keys()
                .with_entries([("BAR", "0"), ("FOO", "1")]),
        );

        let iterator = db.iterator(RangeOptions::all());
        iterator.seek(key("foo")).unwrap();
        let next = iterator.next();

        db.open(OpenOptions::default()).await.unwrap();

        assert_eq!(next.await.unwrap(), Some((key("FOO"), key("1"))));
        let calls = db.inner().calls();
        assert!(calls.contains(&StoreCall::Seek { target: key("FOO") }));
        assert!(!calls.contains(&StoreCall::Seek { target: key("foo") }));
    }

    // =============================================================================
    // FLOW 4: CAPABILITY GATING
    // =============================================================================

    #[tokio::test]
    async fn test_unsupported_method_never_reaches_store() {
        let db = recording_store();

        let before_open = db.approximate_size(key("a"), key("z")).err();
        db.open(OpenOptions::default()).await.unwrap();
        let after_open = db.approximate_size(key("a"), key("z")).err();
        db.close().await.unwrap();
        let after_close = db.approximate_size(key("a"), key("z")).err();

        let expected = Some(DeferredError::NotSupported {
            method: "approximate_size",
        });
        assert_eq!(before_open, expected);
        assert_eq!(after_open, expected);
        assert_eq!(after_close, expected);
        assert!(!db.inner().methods().contains(&"approximate_size"));
        assert_eq!(db.stats().total_rejected, 3);
    }

    #[tokio::test]
    async fn test_supported_methods_follow_manifest() {
        init_tracing();
        let manifest = Manifest::default().with_additional_method(AdditionalMethod::CompactRange);
        let db = DeferredStore::new(
            RecordingStore::new()
                .with_manifest(manifest)
                .with_detected_method(AdditionalMethod::ApproximateSize),
        );

        let compact = db.compact_range(key("a"), key("m")).unwrap();
        let size = db.approximate_size(key("a"), key("m")).unwrap();
        assert_eq!(db.pending_operations(), 2);

        db.open(OpenOptions::default()).await.unwrap();
        compact.await.unwrap();
        assert_eq!(size.await.unwrap(), 0);
        assert_eq!(
            db.inner().methods(),
            vec!["open", "compact_range", "approximate_size"]
        );
    }

    // =============================================================================
    // FLOW 5: CONCURRENT CALLERS
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_before_open() {
        init_tracing();
        let db = Arc::new(DeferredStore::new(RecordingStore::new()));

        let mut writers = Vec::new();
        for worker in 0..8u8 {
            let db = Arc::clone(&db);
            writers.push(tokio::spawn(async move {
                let pending: Vec<_> = (0..25u8)
                    .map(|i| db.put(vec![worker, i], vec![i], WriteOptions::default()))
                    .collect();
                pending
            }));
        }

        let mut pending = Vec::new();
        for writer in writers {
            pending.extend(writer.await.unwrap());
        }
        assert_eq!(db.pending_operations(), 200);

        db.open(OpenOptions::default()).await.unwrap();
        for put in pending {
            put.await.unwrap();
        }

        assert_eq!(db.inner().entries().len(), 200);
        assert_eq!(db.stats().total_replayed, 200);

        // Each writer's own puts keep their order.
        let puts: Vec<Vec<u8>> = db
            .inner()
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::Put { key, .. } => Some(key),
                _ => None,
            })
            .collect();
        for worker in 0..8u8 {
            let order: Vec<u8> = puts
                .iter()
                .filter(|k| k[0] == worker)
                .map(|k| k[1])
                .collect();
            assert_eq!(order, (0..25u8).collect::<Vec<_>>());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_writers_during_drain_follow_queued_work() {
        init_tracing();
        let gate = Arc::new(Notify::new());
        let db = Arc::new(DeferredStore::new(
            RecordingStore::new().with_gate("batch", Arc::clone(&gate)),
        ));

        let queued = db.batch(
            vec![BatchOperation::put(key("w"), key("queued"))],
            WriteOptions::default(),
        );
        let opening = tokio::spawn({
            let db = Arc::clone(&db);
            async move { db.open(OpenOptions::default()).await }
        });
        while !db.inner().methods().contains(&"batch") {
            tokio::task::yield_now().await;
        }

        // Drain parked in the queued batch; other tasks keep writing.
        let mut writers = Vec::new();
        for worker in 0..4u8 {
            let db = Arc::clone(&db);
            writers.push(tokio::spawn(async move {
                for i in 0..10u8 {
                    db.put(vec![worker, i], vec![i], WriteOptions::default())
                        .await
                        .unwrap();
                }
            }));
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(db.inner().methods(), vec!["open", "batch"]);

        gate.notify_one();
        opening.await.unwrap().unwrap();
        queued.await.unwrap();
        for writer in writers {
            writer.await.unwrap();
        }

        let methods = db.inner().methods();
        assert_eq!(&methods[..2], &["open", "batch"]);
        assert_eq!(methods.len(), 42);
        assert_eq!(db.inner().entries().len(), 41);
    }

    #[tokio::test]
    async fn test_open_from_another_task() {
        init_tracing();
        let db = Arc::new(DeferredStore::new(RecordingStore::new()));
        let put = db.put(key("a"), key("1"), WriteOptions::default());

        let opener = tokio::spawn({
            let db = Arc::clone(&db);
            async move { db.open(OpenOptions::default()).await }
        });

        timeout(Duration::from_secs(1), put)
            .await
            .expect("put should complete once the store opens")
            .unwrap();
        opener.await.unwrap().unwrap();
    }
}
