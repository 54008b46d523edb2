//! SQLite integration tests.
//!
//! Most tests run against a private `sqlite::memory:` database; the
//! persistence tests use a file in a temporary directory.

use record_store::{
    Collection, RecordEnvelope, RecordStore, RecordStoreExt, SchemaVersion, SqliteRecordStore,
    StoreError, WriteBatch,
};

async fn memory_store() -> SqliteRecordStore {
    SqliteRecordStore::open("sqlite::memory:").await.unwrap()
}

fn customer(id: &str, name: &str, balance: f64) -> RecordEnvelope {
    RecordEnvelope::new(
        Collection::Customers,
        id,
        serde_json::json!({"id": id, "name": name, "balance": balance}),
    )
}

fn transaction(id: &str, customer_id: &str, total: f64) -> RecordEnvelope {
    RecordEnvelope::new(
        Collection::Transactions,
        id,
        serde_json::json!({"id": id, "customerId": customer_id, "totalAmount": total}),
    )
}

mod crud {
    use super::*;

    #[tokio::test]
    async fn open_creates_current_schema() {
        let store = memory_store().await;
        assert_eq!(
            store.schema_version().await.unwrap(),
            SchemaVersion::current()
        );
        for collection in Collection::ALL {
            assert!(store.get_all(collection).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn add_get_round_trip_preserves_body() {
        let store = memory_store().await;
        let record = customer("c-1", "Asha Traders", -12.5);
        store.add(record.clone()).await.unwrap();

        let fetched = store.get(Collection::Customers, "c-1").await.unwrap();
        assert_eq!(fetched, Some(record));
        assert!(store.get(Collection::Customers, "c-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn add_on_existing_id_is_duplicate_key() {
        let store = memory_store().await;
        store.add(customer("c-1", "First", 0.0)).await.unwrap();

        let result = store.add(customer("c-1", "Second", 0.0)).await;
        assert!(matches!(
            result,
            Err(StoreError::DuplicateKey {
                collection: Collection::Customers,
                ..
            })
        ));

        let fetched = store.get(Collection::Customers, "c-1").await.unwrap().unwrap();
        assert_eq!(fetched.body["name"], "First");
    }

    #[tokio::test]
    async fn put_upserts() {
        let store = memory_store().await;
        store.put(customer("c-1", "First", 0.0)).await.unwrap();
        store.put(customer("c-1", "Renamed", 10.0)).await.unwrap();

        let all = store.get_all(Collection::Customers).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].body["name"], "Renamed");
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = memory_store().await;
        store.put(customer("c-1", "First", 0.0)).await.unwrap();

        store.delete(Collection::Customers, "c-1").await.unwrap();
        store.delete(Collection::Customers, "c-1").await.unwrap();
        assert!(!store.contains(Collection::Customers, "c-1").await.unwrap());
    }

    #[tokio::test]
    async fn index_lookup_by_customer() {
        let store = memory_store().await;
        store.add(transaction("t-1", "c-1", 10.0)).await.unwrap();
        store.add(transaction("t-2", "c-1", 20.0)).await.unwrap();
        store.add(transaction("t-3", "c-2", 30.0)).await.unwrap();

        let mut ids: Vec<_> = store
            .get_all_by_index(Collection::Transactions, "customerId", "c-1")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["t-1", "t-2"]);

        let unknown = store
            .get_all_by_index(Collection::Transactions, "customerName", "c-1")
            .await;
        assert!(matches!(unknown, Err(StoreError::UnknownIndex { .. })));
    }
}

mod batches {
    use super::*;

    #[tokio::test]
    async fn batch_commits_every_op() {
        let store = memory_store().await;
        store.add(customer("c-1", "Asha", 0.0)).await.unwrap();

        let batch = WriteBatch::new()
            .add(transaction("t-1", "c-1", 100.0))
            .put(customer("c-1", "Asha", 100.0));
        store.commit(batch).await.unwrap();

        assert_eq!(store.count(Collection::Transactions).await.unwrap(), 1);
        let fetched = store.get(Collection::Customers, "c-1").await.unwrap().unwrap();
        assert_eq!(fetched.body["balance"], 100.0);
    }

    #[tokio::test]
    async fn failing_op_rolls_back_whole_batch() {
        let store = memory_store().await;
        store.add(customer("c-1", "Asha", 0.0)).await.unwrap();
        store.add(transaction("t-1", "c-1", 5.0)).await.unwrap();

        let batch = WriteBatch::new()
            .put(customer("c-1", "Asha", 999.0))
            .delete(Collection::Customers, "c-missing")
            .add(transaction("t-1", "c-1", 1.0));
        let result = store.commit(batch).await;
        assert!(matches!(result, Err(StoreError::DuplicateKey { .. })));

        let fetched = store.get(Collection::Customers, "c-1").await.unwrap().unwrap();
        assert_eq!(fetched.body["balance"], 0.0);
        let tx = store.get(Collection::Transactions, "t-1").await.unwrap().unwrap();
        assert_eq!(tx.body["totalAmount"], 5.0);
    }

    #[tokio::test]
    async fn cascade_style_batch() {
        let store = memory_store().await;
        store.add(customer("c-1", "Asha", 0.0)).await.unwrap();
        for i in 0..5 {
            store
                .add(transaction(&format!("t-{i}"), "c-1", 1.0))
                .await
                .unwrap();
        }

        let mut batch = WriteBatch::new().delete(Collection::Customers, "c-1");
        for record in store
            .get_all_by_index(Collection::Transactions, "customerId", "c-1")
            .await
            .unwrap()
        {
            batch = batch.delete(Collection::Transactions, record.id);
        }
        store.commit(batch).await.unwrap();

        assert!(
            store
                .get_all_by_index(Collection::Transactions, "customerId", "c-1")
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(store.count(Collection::Customers).await.unwrap(), 0);
    }
}

mod schema {
    use super::*;

    #[tokio::test]
    async fn upgrade_from_first_version_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("ledger.db").display());

        {
            let pool = sqlx::sqlite::SqlitePoolOptions::new()
                .max_connections(1)
                .connect_with(
                    url.parse::<sqlx::sqlite::SqliteConnectOptions>()
                        .unwrap()
                        .create_if_missing(true),
                )
                .await
                .unwrap();
            let store = SqliteRecordStore::new(pool);
            assert_eq!(
                store.migrate_to(SchemaVersion::new(1)).await.unwrap(),
                SchemaVersion::new(1)
            );

            store.add(customer("c-1", "Asha", 40.0)).await.unwrap();
            store.add(transaction("t-1", "c-1", 40.0)).await.unwrap();

            let products = store.get_all(Collection::Products).await;
            assert!(matches!(
                products,
                Err(StoreError::UnknownCollection(Collection::Products))
            ));
            store.pool().close().await;
        }

        let store = SqliteRecordStore::open(&url).await.unwrap();
        assert_eq!(
            store.schema_version().await.unwrap(),
            SchemaVersion::current()
        );
        assert_eq!(store.count(Collection::Customers).await.unwrap(), 1);
        assert_eq!(
            store
                .get_all_by_index(Collection::Transactions, "customerId", "c-1")
                .await
                .unwrap()
                .len(),
            1
        );
        assert!(store.get_all(Collection::Products).await.unwrap().is_empty());

        // A second upgrade has nothing left to do.
        assert_eq!(store.migrate().await.unwrap(), SchemaVersion::current());
        assert_eq!(store.count(Collection::Customers).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("ledger.db").display());

        {
            let store = SqliteRecordStore::open(&url).await.unwrap();
            store.add(customer("c-1", "Asha", 12.0)).await.unwrap();
            store.pool().close().await;
        }

        let store = SqliteRecordStore::open(&url).await.unwrap();
        let fetched = store.get(Collection::Customers, "c-1").await.unwrap().unwrap();
        assert_eq!(fetched.body["balance"], 12.0);
    }

    #[tokio::test]
    async fn newer_schema_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("ledger.db").display());

        {
            let store = SqliteRecordStore::open(&url).await.unwrap();
            sqlx::query("PRAGMA user_version = 99")
                .execute(store.pool())
                .await
                .unwrap();
            store.pool().close().await;
        }

        let result = SqliteRecordStore::open(&url).await;
        assert!(matches!(result, Err(StoreError::SchemaTooNew { .. })));
    }
}
