#![allow(dead_code)]

use bson::{Bson, Document, doc};
use docbench_query::{Filter, FindOptions, Pipeline, Sort, UpdateSpec};
use docbench_store::{DocumentId, StorageAdapter};

pub fn ready<A: StorageAdapter>(mut adapter: A) -> A {
    adapter.init().unwrap();
    adapter.init().unwrap();
    adapter
}

pub fn filter(query: Document) -> Filter {
    Filter::parse(&query).unwrap()
}

pub fn update(spec: Document) -> UpdateSpec {
    UpdateSpec::parse(&spec).unwrap()
}

pub fn seed_ages(adapter: &mut dyn StorageAdapter) -> Vec<DocumentId> {
    adapter
        .bulk_insert(vec![doc! { "age": 20 }, doc! { "age": 30 }, doc! { "age": 40 }])
        .unwrap()
}

fn ages(docs: &[Document]) -> Vec<i32> {
    docs.iter().map(|d| d.get_i32("age").unwrap()).collect()
}

// ── Shared contract checks ──────────────────────────────────────

pub fn assigns_unique_identities(adapter: &mut dyn StorageAdapter) {
    let a = adapter.insert(doc! { "_id": "caller", "n": 1 }).unwrap();
    let b = adapter.insert(doc! { "n": 2 }).unwrap();
    let more = adapter.bulk_insert(vec![doc! { "n": 3 }, doc! { "n": 4 }]).unwrap();
    assert_ne!(a, b);
    assert!(more.iter().all(|id| *id != a && *id != b));
    assert_ne!(more[0], more[1]);

    let stored = adapter.find_by_id(a).unwrap().unwrap();
    assert_eq!(stored.get("_id"), Some(&a.to_bson()));
    assert_eq!(DocumentId::of(&stored), Some(a));

    // Identity survives updates, even explicit attempts to change it.
    adapter
        .update(a, &update(doc! { "$set": { "_id": 99_i64, "n": 10 } }))
        .unwrap();
    let stored = adapter.find_by_id(a).unwrap().unwrap();
    assert_eq!(DocumentId::of(&stored), Some(a));
    assert_eq!(stored.get_i32("n").unwrap(), 10);

    // Not reused after clear.
    adapter.clear().unwrap();
    let c = adapter.insert(doc! { "n": 5 }).unwrap();
    assert!(![a, b, more[0], more[1]].contains(&c));
}

pub fn query_keeps_insertion_order(adapter: &mut dyn StorageAdapter) {
    seed_ages(adapter);
    let found = adapter
        .find(&filter(doc! { "age": { "$gt": 25 } }), &FindOptions::default())
        .unwrap();
    assert_eq!(ages(&found), vec![30, 40]);

    let all = adapter.find(&Filter::all(), &FindOptions::default()).unwrap();
    assert_eq!(all.len(), 3);

    let one = adapter.find_one(&filter(doc! { "age": { "$gte": 30 } })).unwrap().unwrap();
    assert_eq!(one.get_i32("age").unwrap(), 30);
    assert!(adapter.find_one(&filter(doc! { "age": 99 })).unwrap().is_none());
}

pub fn find_options_sort_skip_limit(adapter: &mut dyn StorageAdapter) {
    seed_ages(adapter);
    let options = FindOptions::default().sort(Sort::desc("age")).skip(1).limit(1);
    let found = adapter.find(&Filter::all(), &options).unwrap();
    assert_eq!(ages(&found), vec![30]);
}

pub fn update_many_counts_modified(adapter: &mut dyn StorageAdapter) {
    seed_ages(adapter);
    let result = adapter
        .update_many(
            &filter(doc! { "age": { "$gte": 25 } }),
            &update(doc! { "$set": { "tier": "adult" } }),
        )
        .unwrap();
    assert_eq!(result.matched, 2);
    assert_eq!(result.modified, 2);

    let young = adapter.find_one(&filter(doc! { "age": 20 })).unwrap().unwrap();
    assert!(!young.contains_key("tier"));
    assert_eq!(adapter.count(&filter(doc! { "tier": "adult" })).unwrap(), 2);

    // Re-applying changes nothing.
    let again = adapter
        .update_many(
            &filter(doc! { "age": { "$gte": 25 } }),
            &update(doc! { "$set": { "tier": "adult" } }),
        )
        .unwrap();
    assert_eq!((again.matched, again.modified), (2, 0));
}

pub fn failed_update_leaves_documents_untouched(adapter: &mut dyn StorageAdapter) {
    adapter
        .bulk_insert(vec![doc! { "n": 1 }, doc! { "n": "two" }, doc! { "n": 3 }])
        .unwrap();
    let err = adapter
        .update_many(&Filter::all(), &update(doc! { "$inc": { "n": 1 } }))
        .unwrap_err();
    assert!(matches!(err, docbench_store::AdapterError::Query(_)));

    let values: Vec<Bson> = adapter
        .find(&Filter::all(), &FindOptions::default())
        .unwrap()
        .iter()
        .map(|d| d.get("n").unwrap().clone())
        .collect();
    assert_eq!(values, vec![Bson::Int32(1), Bson::String("two".into()), Bson::Int32(3)]);
}

pub fn update_by_id_reports_counts(adapter: &mut dyn StorageAdapter) {
    let ids = seed_ages(adapter);
    let result = adapter.update(ids[0], &update(doc! { "$inc": { "age": 1 } })).unwrap();
    assert_eq!((result.matched, result.modified), (1, 1));

    let missing = adapter
        .update(DocumentId(10_000), &update(doc! { "$inc": { "age": 1 } }))
        .unwrap();
    assert_eq!((missing.matched, missing.modified), (0, 0));

    let doc = adapter.find_by_id(ids[0]).unwrap().unwrap();
    assert_eq!(doc.get_i32("age").unwrap(), 21);
}

pub fn delete_and_count(adapter: &mut dyn StorageAdapter) {
    let ids = seed_ages(adapter);
    assert_eq!(adapter.count(&Filter::all()).unwrap(), 3);
    assert_eq!(adapter.delete(ids[1]).unwrap(), 1);
    assert_eq!(adapter.delete(ids[1]).unwrap(), 0);
    assert!(adapter.find_by_id(ids[1]).unwrap().is_none());

    assert_eq!(adapter.delete_many(&filter(doc! { "age": { "$lt": 100 } })).unwrap(), 2);
    assert_eq!(adapter.count(&Filter::all()).unwrap(), 0);
}

pub fn clear_is_repeatable(adapter: &mut dyn StorageAdapter) {
    seed_ages(adapter);
    adapter.clear().unwrap();
    adapter.clear().unwrap();
    assert_eq!(adapter.count(&Filter::all()).unwrap(), 0);
    seed_ages(adapter);
    assert_eq!(adapter.count(&Filter::all()).unwrap(), 3);
}

pub fn aggregate_counts_adults(adapter: &mut dyn StorageAdapter) {
    seed_ages(adapter);
    let pipeline = Pipeline::parse(&[
        doc! { "$match": { "age": { "$gte": 25 } } },
        doc! { "$group": { "_id": Bson::Null, "count": { "$sum": 1 } } },
    ])
    .unwrap();
    let out = adapter.aggregate(&pipeline).unwrap();
    assert_eq!(out, vec![doc! { "_id": Bson::Null, "count": 2 }]);

    let plain = adapter
        .aggregate(&Pipeline::parse(&[doc! { "$sort": { "age": -1 } }]).unwrap())
        .unwrap();
    assert_eq!(plain[0], doc! { "age": 40 });
}

pub fn transaction_commit_and_rollback(adapter: &mut dyn StorageAdapter) {
    let ids = seed_ages(adapter);

    let mut txn = adapter.begin_transaction().unwrap();
    let added = txn.insert(doc! { "age": 50 }).unwrap();
    txn.update(ids[0], &update(doc! { "$set": { "age": 21 } })).unwrap();
    assert_eq!(txn.delete(ids[2]).unwrap(), 1);
    assert!(txn.find_by_id(added).unwrap().is_some());
    txn.rollback().unwrap();

    assert!(adapter.find_by_id(added).unwrap().is_none());
    assert_eq!(adapter.find_by_id(ids[0]).unwrap().unwrap().get_i32("age").unwrap(), 20);
    assert!(adapter.find_by_id(ids[2]).unwrap().is_some());

    let mut txn = adapter.begin_transaction().unwrap();
    let committed = txn.insert(doc! { "age": 60 }).unwrap();
    assert_ne!(committed, added);
    txn.update(ids[0], &update(doc! { "$set": { "age": 22 } })).unwrap();
    txn.delete(ids[2]).unwrap();
    txn.commit().unwrap();

    assert!(adapter.find_by_id(committed).unwrap().is_some());
    assert_eq!(adapter.find_by_id(ids[0]).unwrap().unwrap().get_i32("age").unwrap(), 22);
    assert!(adapter.find_by_id(ids[2]).unwrap().is_none());
    assert_eq!(adapter.count(&Filter::all()).unwrap(), 3);
}

pub fn dropped_transaction_rolls_back(adapter: &mut dyn StorageAdapter) {
    seed_ages(adapter);
    {
        let mut txn = adapter.begin_transaction().unwrap();
        txn.insert(doc! { "age": 70 }).unwrap();
    }
    assert_eq!(adapter.count(&Filter::all()).unwrap(), 3);
}
