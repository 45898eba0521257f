//! End-to-end scenarios through the `jsondb` facade

use jsondb::{
    CollectingEventBus, Filter, GetOptions, InMemoryJsonDb, JsonDb, JsonDbConfig, Op, SortOrder,
    EVENT_DELETED, EVENT_UPDATED,
};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

fn events(db_bus: &CollectingEventBus) -> Vec<(String, String)> {
    db_bus.take()
}

#[test]
fn document_patch_and_delete() {
    let bus = Arc::new(CollectingEventBus::new());
    let db = InMemoryJsonDb::open(JsonDbConfig::default(), bus.clone()).unwrap();

    db.set("/a/", r#"{"b":1,"c":[10,20]}"#.as_bytes()).unwrap();
    db.set("/a/c/0/", "99".as_bytes()).unwrap();
    assert_eq!(
        db.get_as_string("/a/", &GetOptions::new()).unwrap().as_deref(),
        Some(r#"{"b":1,"c":[99,20]}"#)
    );

    db.delete("/a/c/").unwrap();
    assert_eq!(
        db.get_as_string("/a/", &GetOptions::new()).unwrap().as_deref(),
        Some(r#"{"b":1}"#)
    );
    assert!(!db.exists("/a/c/").unwrap());
    assert!(db.exists("/a/b/").unwrap());

    assert_eq!(
        events(&bus),
        vec![
            (EVENT_UPDATED.to_string(), "/a".to_string()),
            (EVENT_UPDATED.to_string(), "/a/c/0".to_string()),
            (EVENT_DELETED.to_string(), "/a/c".to_string()),
        ]
    );
}

#[test]
fn round_trip_preserves_documents() {
    let db = InMemoryJsonDb::new().unwrap();
    let docs = [
        json!(null),
        json!(true),
        json!(0),
        json!(-42),
        json!(3.25),
        json!("text with \"quotes\" and \u{e9}"),
        json!([1, "two", [3], {"four": 4}]),
        json!({"nested": {"deep": {"deeper": [false, null]}}}),
    ];
    for (i, doc) in docs.iter().enumerate() {
        let path = format!("/doc{}", i);
        db.set_value(&path, doc).unwrap();
        assert_eq!(db.get_value(&path, &GetOptions::new()).unwrap().as_ref(), Some(doc));
    }
}

#[test]
fn arrays_keep_numeric_order_past_ten() {
    let db = InMemoryJsonDb::new().unwrap();
    let doc = json!((0..25).collect::<Vec<i32>>());
    db.set_value("/nums", &doc).unwrap();
    assert_eq!(db.get_value("/nums", &GetOptions::new()).unwrap(), Some(doc));
    assert_eq!(
        db.get_as_string("/nums/12", &GetOptions::new()).unwrap().as_deref(),
        Some("12")
    );
}

#[test]
fn shaped_reads() {
    let db = InMemoryJsonDb::new().unwrap();
    db.set(
        "/scores",
        r#"{"amy":{"pts":5},"ben":{"pts":12},"cat":{"pts":8},"dan":{"pts":-1}}"#.as_bytes(),
    )
    .unwrap();

    let high = GetOptions::new().filter(Filter::child("pts", Op::Ge, json!(8)).unwrap());
    assert_eq!(
        db.get_value("/scores", &high).unwrap(),
        Some(json!({"ben": {"pts": 12}, "cat": {"pts": 8}}))
    );

    let last_two = GetOptions::new().order(SortOrder::Desc).limit_to_first(2);
    assert_eq!(
        db.get_as_string("/scores", &last_two).unwrap().as_deref(),
        Some(r#"{"dan":{"pts":-1},"cat":{"pts":8}}"#)
    );

    let middle = GetOptions::new().start_after("amy").end_before("dan").depth(1);
    assert_eq!(
        db.get_as_string("/scores", &middle).unwrap().as_deref(),
        Some(r#"{"ben":true,"cat":true}"#)
    );
}

#[test]
fn global_transaction_is_all_or_nothing() {
    let bus = Arc::new(CollectingEventBus::new());
    let db = InMemoryJsonDb::open(JsonDbConfig::default(), bus.clone()).unwrap();

    let failed = db.with_global_transaction(|tx| {
        tx.set("/a", "1".as_bytes())?;
        tx.set("/b", "not json".as_bytes())
    });
    assert!(failed.is_err());
    assert!(!db.exists("/a").unwrap());
    assert!(bus.is_empty());

    db.with_global_transaction(|tx| {
        tx.set("/a", "1".as_bytes())?;
        tx.set("/b", "2".as_bytes())
    })
    .unwrap();
    assert!(db.exists("/a").unwrap());
    assert!(db.exists("/b").unwrap());
    assert_eq!(bus.len(), 2);
}

#[test]
fn file_store_with_index() {
    let dir = TempDir::new().unwrap();
    let db = JsonDb::builder()
        .path(dir.path().join("store.db"))
        .index("/users", "city")
        .open()
        .unwrap();

    for (id, city) in [("u1", "oslo"), ("u2", "rome"), ("u3", "oslo")] {
        db.set_value(&format!("/users/{}", id), &json!({ "city": city }))
            .unwrap();
    }
    let oslo = db
        .fetch_ids_by_property_value("/users", "city", &json!("oslo"))
        .unwrap();
    assert_eq!(oslo.into_iter().collect::<Vec<_>>(), vec!["u1", "u3"]);

    let key = JsonDb::create_key();
    assert_eq!(key.len(), 20);
}
