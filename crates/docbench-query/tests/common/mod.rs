#![allow(dead_code)]

use bson::{Bson, Document, doc};
use docbench_query::{Filter, Pipeline, UpdateSpec};

/// Three documents keyed by age, the shape used by the end-to-end scenarios.
pub fn ages() -> Vec<Document> {
    vec![
        doc! { "_id": 1_i64, "name": "ann", "age": 20 },
        doc! { "_id": 2_i64, "name": "bob", "age": 30 },
        doc! { "_id": 3_i64, "name": "cy", "age": 40 },
    ]
}

/// A small heterogeneous collection used by the sort and group tests.
pub fn people() -> Vec<Document> {
    vec![
        doc! {
            "_id": 1_i64, "name": "Alice", "dept": "eng", "salary": 120,
            "tags": ["rust", "go"], "address": { "city": "Oslo" },
        },
        doc! {
            "_id": 2_i64, "name": "Bob", "dept": "ops", "salary": 90,
            "tags": ["bash"], "address": { "city": "Bergen" },
        },
        doc! {
            "_id": 3_i64, "name": "Carol", "dept": "eng", "salary": 150.5,
            "tags": [], "address": { "city": "Oslo" },
        },
        doc! { "_id": 4_i64, "name": "Dan", "dept": "sales", "address": { "city": "Tromsø" } },
        doc! { "_id": 5_i64, "name": "Eve", "dept": "ops", "salary": 70, "manager": Bson::Null },
    ]
}

pub fn filter(query: Document) -> Filter {
    Filter::parse(&query).unwrap()
}

pub fn matching(docs: &[Document], query: Document) -> Vec<Document> {
    let filter = filter(query);
    docs.iter().filter(|d| filter.matches(d)).cloned().collect()
}

pub fn names(docs: &[Document]) -> Vec<&str> {
    docs.iter().map(|d| d.get_str("name").unwrap()).collect()
}

pub fn updated(doc: Document, update: Document) -> Document {
    let mut doc = doc;
    UpdateSpec::parse(&update).unwrap().apply(&mut doc).unwrap();
    doc
}

pub fn run(docs: Vec<Document>, stages: Vec<Document>) -> Vec<Document> {
    Pipeline::parse(&stages).unwrap().run(docs)
}
