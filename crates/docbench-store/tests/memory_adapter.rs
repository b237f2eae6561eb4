#![cfg(feature = "memory")]

mod common;
use common::*;

use docbench_query::Filter;
use docbench_store::{Capability, MemoryAdapter, StorageAdapter};

fn adapter() -> MemoryAdapter {
    ready(MemoryAdapter::new())
}

#[test]
fn advertises_every_capability() {
    let caps = adapter().capabilities();
    for cap in [Capability::Transactions, Capability::Indexes, Capability::Aggregation] {
        assert!(caps.supports(cap), "{cap}");
    }
    assert!(!caps.native_query);
}

#[test]
fn assigns_identities() {
    assigns_unique_identities(&mut adapter());
}

#[test]
fn query() {
    query_keeps_insertion_order(&mut adapter());
}

#[test]
fn find_options() {
    find_options_sort_skip_limit(&mut adapter());
}

#[test]
fn update_many() {
    update_many_counts_modified(&mut adapter());
}

#[test]
fn update_many_is_atomic() {
    failed_update_leaves_documents_untouched(&mut adapter());
}

#[test]
fn update_by_id() {
    update_by_id_reports_counts(&mut adapter());
}

#[test]
fn delete() {
    delete_and_count(&mut adapter());
}

#[test]
fn clear() {
    clear_is_repeatable(&mut adapter());
}

#[test]
fn aggregate() {
    aggregate_counts_adults(&mut adapter());
}

#[test]
fn transactions() {
    transaction_commit_and_rollback(&mut adapter());
}

#[test]
fn dropped_transaction() {
    dropped_transaction_rolls_back(&mut adapter());
}

#[test]
fn create_index_records_definition() {
    let mut adapter = adapter();
    assert!(adapter.create_index("by_age", &["age".to_string()]).unwrap());
    assert_eq!(adapter.indexes().get("by_age"), Some(&vec!["age".to_string()]));
}

#[test]
fn len_tracks_documents() {
    let mut adapter = adapter();
    assert!(adapter.is_empty());
    seed_ages(&mut adapter);
    assert_eq!(adapter.len(), 3);
    adapter.delete_many(&Filter::all()).unwrap();
    assert!(adapter.is_empty());
}

#[test]
fn named_adapter() {
    let adapter = MemoryAdapter::named("memory-2");
    assert_eq!(adapter.name(), "memory-2");
}
