use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use record_store::{Collection, InMemoryRecordStore, RecordEnvelope, RecordStore, WriteBatch};

fn transaction(id: usize, customer_id: &str) -> RecordEnvelope {
    RecordEnvelope::new(
        Collection::Transactions,
        format!("t-{id}"),
        serde_json::json!({
            "id": format!("t-{id}"),
            "customerId": customer_id,
            "totalAmount": 100.0,
            "type": "debit",
        }),
    )
}

fn customer(id: &str, balance: f64) -> RecordEnvelope {
    RecordEnvelope::new(
        Collection::Customers,
        id,
        serde_json::json!({"id": id, "balance": balance}),
    )
}

fn bench_commit_pair(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryRecordStore::new();
    rt.block_on(async { store.add(customer("c-1", 0.0)).await.unwrap() });
    let mut next = 0usize;

    c.bench_function("record_store/commit_transaction_and_balance", |b| {
        b.iter(|| {
            next += 1;
            let batch = WriteBatch::new()
                .add(transaction(next, "c-1"))
                .put(customer("c-1", next as f64 * 100.0));
            rt.block_on(async { store.commit(batch).await.unwrap() });
        });
    });
}

fn bench_index_lookup(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("record_store/index_lookup");

    for count in [100usize, 1000, 10000] {
        let store = InMemoryRecordStore::new();
        rt.block_on(async {
            for i in 0..count {
                let owner = if i % 10 == 0 { "c-target" } else { "c-other" };
                store.add(transaction(i, owner)).await.unwrap();
            }
        });

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                rt.block_on(async {
                    store
                        .get_all_by_index(Collection::Transactions, "customerId", "c-target")
                        .await
                        .unwrap()
                })
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_commit_pair, bench_index_lookup);
criterion_main!(benches);
