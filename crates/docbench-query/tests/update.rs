mod common;
use common::*;

use bson::{Bson, doc};
use docbench_query::{QueryError, Strictness, UpdateSpec, apply_update};

// ── $set / $unset ───────────────────────────────────────────────

#[test]
fn set_overwrites_and_adds() {
    let doc = updated(
        doc! { "_id": 1_i64, "name": "Acme", "status": "active" },
        doc! { "$set": { "status": "rejected", "tier": "gold" } },
    );
    assert_eq!(
        doc,
        doc! { "_id": 1_i64, "name": "Acme", "status": "rejected", "tier": "gold" }
    );
}

#[test]
fn set_creates_nested_paths() {
    let doc = updated(doc! { "a": 1 }, doc! { "$set": { "address.city": "Oslo" } });
    assert_eq!(doc, doc! { "a": 1, "address": { "city": "Oslo" } });
}

#[test]
fn set_through_a_scalar_is_a_type_mismatch() {
    let mut doc = doc! { "a": 1 };
    let update = UpdateSpec::parse(&doc! { "$set": { "a.b": 2 } }).unwrap();
    let err = update.apply(&mut doc).unwrap_err();
    assert!(matches!(err, QueryError::TypeMismatch(_)));
}

#[test]
fn unset_removes_fields() {
    let doc = updated(
        doc! { "a": 1, "b": 2, "c": { "d": 3, "e": 4 } },
        doc! { "$unset": { "b": true, "c.d": "", "missing": 1 } },
    );
    assert_eq!(doc, doc! { "a": 1, "c": { "e": 4 } });
}

#[test]
fn unset_of_missing_field_is_not_a_change() {
    let mut doc = doc! { "a": 1 };
    let changed = UpdateSpec::parse(&doc! { "$unset": { "b": true } })
        .unwrap()
        .apply(&mut doc)
        .unwrap();
    assert!(!changed);
}

// ── $inc ────────────────────────────────────────────────────────

#[test]
fn inc_on_missing_field_equals_inc_on_zero() {
    for delta in [Bson::Int32(5), Bson::Int64(-3), Bson::Double(2.5)] {
        let update = doc! { "$inc": { "n": delta.clone() } };
        let from_missing = updated(doc! {}, update.clone());
        let from_zero = updated(doc! { "n": 0 }, update);
        assert_eq!(from_missing, from_zero, "delta {delta}");
    }
}

#[test]
fn inc_numeric_types() {
    let doc = updated(
        doc! { "i": 1, "l": 1_i64, "d": 1.5, "big": i32::MAX },
        doc! { "$inc": { "i": 2, "l": 2, "d": 1, "big": 1 } },
    );
    assert_eq!(doc.get("i"), Some(&Bson::Int32(3)));
    assert_eq!(doc.get("l"), Some(&Bson::Int64(3)));
    assert_eq!(doc.get("d"), Some(&Bson::Double(2.5)));
    assert_eq!(doc.get("big"), Some(&Bson::Int64(i32::MAX as i64 + 1)));

    let doc = updated(doc! { "i": 1 }, doc! { "$inc": { "i": 0.5 } });
    assert_eq!(doc.get("i"), Some(&Bson::Double(1.5)));
}

#[test]
fn inc_on_non_numeric_field_fails() {
    let err = apply_update(&doc! { "n": "ten" }, &doc! { "$inc": { "n": 1 } }).unwrap_err();
    assert!(matches!(err, QueryError::TypeMismatch(_)));
}

#[test]
fn inc_requires_numeric_operand() {
    let err = UpdateSpec::parse(&doc! { "$inc": { "n": "1" } }).unwrap_err();
    assert!(matches!(err, QueryError::InvalidUpdate(_)));
}

// ── Arrays ──────────────────────────────────────────────────────

#[test]
fn push_appends_and_initializes() {
    let doc = updated(
        doc! { "tags": ["a"], "scalar": 1 },
        doc! { "$push": { "tags": "b", "fresh": 1, "scalar": 2 } },
    );
    assert_eq!(doc, doc! { "tags": ["a", "b"], "scalar": [2], "fresh": [1] });
}

#[test]
fn push_each_appends_every_value() {
    let doc = updated(
        doc! { "tags": ["a"] },
        doc! { "$push": { "tags": { "$each": ["b", "c"] } } },
    );
    assert_eq!(doc, doc! { "tags": ["a", "b", "c"] });
}

#[test]
fn pull_removes_every_equal_element() {
    let doc = updated(
        doc! { "xs": [1, 2, 1, 3.0, 1.0], "scalar": 1 },
        doc! { "$pull": { "xs": 1, "scalar": 1, "missing": 1 } },
    );
    assert_eq!(doc, doc! { "xs": [2, 3.0], "scalar": 1 });
}

#[test]
fn add_to_set_twice_keeps_length() {
    let update = doc! { "$addToSet": { "tags": "rust" } };
    let once = updated(doc! { "tags": ["go"] }, update.clone());
    let twice = updated(once.clone(), update);
    assert_eq!(once.get_array("tags").unwrap().len(), 2);
    assert_eq!(once, twice);
}

#[test]
fn add_to_set_each_skips_existing_values() {
    let doc = updated(
        doc! { "xs": [1, 2] },
        doc! { "$addToSet": { "xs": { "$each": [2, 3, 3, 4.0] } } },
    );
    assert_eq!(doc, doc! { "xs": [1, 2, 3, 4.0] });
}

#[test]
fn pop_first_and_last() {
    let doc = updated(
        doc! { "a": [1, 2, 3], "b": [1, 2, 3], "c": [] },
        doc! { "$pop": { "a": 1, "b": -1, "c": 1 } },
    );
    assert_eq!(doc, doc! { "a": [1, 2], "b": [2, 3], "c": [] });
}

#[test]
fn rename_moves_a_field() {
    let doc = updated(
        doc! { "first": "Ann", "age": 3 },
        doc! { "$rename": { "first": "name.given", "nope": "other" } },
    );
    assert_eq!(doc, doc! { "age": 3, "name": { "given": "Ann" } });
}

// ── Ordering and shape ──────────────────────────────────────────

#[test]
fn operators_apply_in_fixed_order() {
    // $set runs before $inc regardless of key order.
    let doc = updated(doc! {}, doc! { "$inc": { "n": 1 }, "$set": { "n": 10 } });
    assert_eq!(doc.get("n"), Some(&Bson::Int32(11)));

    // $unset runs before $inc.
    let doc = updated(doc! { "n": 5 }, doc! { "$inc": { "n": 1 }, "$unset": { "n": 1 } });
    assert_eq!(doc.get("n"), Some(&Bson::Int32(1)));

    // $push runs before $pull.
    let doc = updated(doc! { "xs": [1] }, doc! { "$pull": { "xs": 2 }, "$push": { "xs": 2 } });
    assert_eq!(doc, doc! { "xs": [1] });
}

#[test]
fn compound_set_and_inc_on_different_fields() {
    let doc = updated(
        doc! { "name": "a", "visits": 1 },
        doc! { "$inc": { "visits": 1 }, "$set": { "name": "b" } },
    );
    assert_eq!(doc, doc! { "name": "b", "visits": 2 });
}

#[test]
fn literal_document_is_a_shallow_merge() {
    let doc = updated(
        doc! { "_id": 7_i64, "name": "Acme", "status": "active" },
        doc! { "_id": 99_i64, "status": "rejected", "nested": { "x": 1 } },
    );
    assert_eq!(
        doc,
        doc! { "_id": 7_i64, "name": "Acme", "status": "rejected", "nested": { "x": 1 } }
    );
}

#[test]
fn bare_fields_next_to_operators_are_set() {
    let doc = updated(doc! { "n": 1 }, doc! { "status": "x", "$inc": { "n": 1 } });
    assert_eq!(doc, doc! { "n": 2, "status": "x" });
}

#[test]
fn identity_is_never_altered() {
    let original = doc! { "_id": 1_i64, "tags": [] };
    let doc = updated(
        original.clone(),
        doc! {
            "$set": { "_id": 2_i64, "_id.x": 1 },
            "$unset": { "_id": true },
            "$inc": { "_id": 1 },
            "$push": { "_id": 1 },
            "$rename": { "tags": "_id" },
        },
    );
    assert_eq!(doc, original);
}

#[test]
fn apply_reports_whether_anything_changed() {
    let mut doc = doc! { "status": "active", "n": 1 };
    let same = UpdateSpec::parse(&doc! { "$set": { "status": "active" } }).unwrap();
    assert!(!same.apply(&mut doc).unwrap());

    let different = UpdateSpec::set("status", "rejected");
    assert!(different.apply(&mut doc).unwrap());
    assert_eq!(doc.get_str("status").unwrap(), "rejected");

    let zero = UpdateSpec::parse(&doc! { "$inc": { "n": 0 } }).unwrap();
    assert!(!zero.apply(&mut doc).unwrap());
}

#[test]
fn apply_update_leaves_input_untouched() {
    let doc = doc! { "n": 1 };
    let next = apply_update(&doc, &doc! { "$inc": { "n": 1 } }).unwrap();
    assert_eq!(doc, doc! { "n": 1 });
    assert_eq!(next, doc! { "n": 2 });
}

// ── Parse errors and strictness ─────────────────────────────────

#[test]
fn operator_value_must_be_a_document() {
    let err = UpdateSpec::parse(&doc! { "$set": 1 }).unwrap_err();
    assert!(matches!(err, QueryError::InvalidUpdate(_)));
}

#[test]
fn unknown_update_operator() {
    let permissive = UpdateSpec::parse(&doc! { "$max": { "n": 1 }, "$set": { "a": 1 } }).unwrap();
    assert_eq!(updated(doc! {}, doc! { "$max": { "n": 1 }, "$set": { "a": 1 } }), doc! { "a": 1 });
    assert!(matches!(permissive, UpdateSpec::Operators(ref ops) if ops.len() == 1));

    let err = UpdateSpec::parse_with(&doc! { "$max": { "n": 1 } }, Strictness::Strict).unwrap_err();
    assert_eq!(err, QueryError::UnknownOperator("$max".into()));
}
