//! # In-Memory Store Lifecycle
//!
//! The adapter over `InMemoryStore`, which enforces its own open/closed state:
//! write before open, read after open, close, queue again, re-open.

#[cfg(test)]
mod tests {
    use crate::init_tracing;
    use deferred_store::{
        DeferredError, DeferredStore, InMemoryStore, KeyValueStore, LifecycleState, OpenOptions,
        RangeOptions, ReadOptions, StoreError, WriteOptions,
    };
    use futures::TryStreamExt;

    fn key(value: &str) -> Vec<u8> {
        value.as_bytes().to_vec()
    }

    fn memory_store() -> DeferredStore<InMemoryStore> {
        init_tracing();
        DeferredStore::new(InMemoryStore::new())
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let db = memory_store();

        let writes = db
            .chained_batch()
            .put(key("a"), key("1"))
            .put(key("b"), key("2"))
            .put(key("c"), key("3"))
            .write(WriteOptions::default());
        let entries = db.iterator(RangeOptions::all()).into_stream();

        db.open(OpenOptions::default()).await.unwrap();
        writes.await.unwrap();

        let entries: Vec<_> = entries.try_collect().await.unwrap();
        assert_eq!(
            entries,
            vec![(key("a"), key("1")), (key("b"), key("2")), (key("c"), key("3"))]
        );

        db.close().await.unwrap();
        assert!(!db.inner().is_open());

        // Closed again: queued for the next open.
        let get = db.get(key("b"), ReadOptions::default());
        assert_eq!(db.pending_operations(), 1);

        db.open(OpenOptions::default()).await.unwrap();
        assert_eq!(get.await.unwrap(), Some(key("2")));
    }

    #[tokio::test]
    async fn test_range_clear_runs_through_store() {
        let db = memory_store();

        for k in ["a", "b", "c", "d"] {
            let _ = db.put(key(k), key(k), WriteOptions::default());
        }
        let clear = db.clear(RangeOptions::all().gt(key("a")).lt(key("d")));
        let remaining = db.get_many(
            vec![key("a"), key("b"), key("c"), key("d")],
            ReadOptions::default(),
        );

        db.open(OpenOptions::default()).await.unwrap();
        clear.await.unwrap();

        assert_eq!(
            remaining.await.unwrap(),
            vec![Some(key("a")), None, None, Some(key("d"))]
        );
        assert_eq!(db.pending_operations(), 0);
        assert_eq!(db.inner().len(), 2);
    }

    #[tokio::test]
    async fn test_unawaited_write_lands_before_close() {
        let db = memory_store();
        db.open(OpenOptions::default()).await.unwrap();

        // Issued while ready and never awaited before the close.
        let late = db.put(key("a"), key("1"), WriteOptions::default());
        db.close().await.unwrap();

        late.await.unwrap();
        assert_eq!(db.status(), LifecycleState::NotReady);
        assert_eq!(db.inner().len(), 1);
    }

    #[tokio::test]
    async fn test_store_not_open_error_passes_through() {
        let db = memory_store();
        db.open(OpenOptions::default()).await.unwrap();

        // Closed underneath the adapter: the store's own error comes back.
        db.inner().close().await.unwrap();
        assert_eq!(
            db.get(key("a"), ReadOptions::default()).await,
            Err(DeferredError::Store(StoreError::NotOpen))
        );
        assert_eq!(db.status(), LifecycleState::Ready);
    }

    #[tokio::test]
    async fn test_open_error_fails_queued_work() {
        let db = memory_store();
        let put = db.put(key("a"), key("1"), WriteOptions::default());

        let result = db
            .open(OpenOptions {
                create_if_missing: false,
                ..OpenOptions::default()
            })
            .await;

        assert!(matches!(result, Err(DeferredError::Store(StoreError::Io { .. }))));
        assert!(matches!(
            put.await,
            Err(DeferredError::ResourceUnavailable {
                operation: "put",
                ..
            })
        ));

        // A later open succeeds and serves new work.
        let put = db.put(key("a"), key("1"), WriteOptions::default());
        db.open(OpenOptions::default()).await.unwrap();
        put.await.unwrap();
        assert_eq!(db.inner().len(), 1);
    }

    #[tokio::test]
    async fn test_additional_methods_are_deferred() {
        let db = memory_store();

        let put = db.put(key("a"), key("12345"), WriteOptions::default());
        let size = db.approximate_size(key("a"), key("b")).unwrap();
        let compact = db.compact_range(key("a"), key("b")).unwrap();

        db.open(OpenOptions::default()).await.unwrap();
        put.await.unwrap();
        assert_eq!(size.await.unwrap(), 6);
        compact.await.unwrap();
    }

    #[tokio::test]
    async fn test_reverse_range_with_limit() {
        let db = memory_store();
        for k in ["a", "b", "c", "d", "e"] {
            let _ = db.put(key(k), key(k), WriteOptions::default());
        }
        let iterator = db.iterator(RangeOptions::all().lte(key("d")).reverse().limit(2));

        db.open(OpenOptions::default()).await.unwrap();

        let keys: Vec<_> = iterator
            .clone()
            .into_stream()
            .map_ok(|(k, _)| k)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(keys, vec![key("d"), key("c")]);
        iterator.end().await.unwrap();
    }
}
