//! Integration tests for JsonDb operations
//!
//! These tests verify the complete write/read flow including:
//! - set / update / delete / push and their events
//! - Path normalization and prefix isolation
//! - Read shaping: order, bounds, limit, depth, filters
//! - Property lookup through the index and the full scan

use jsondb_core::{Error, Filter, GetOptions, Op, SortOrder};
use jsondb_engine::{CollectingEventBus, Dialect, InMemoryJsonDb, JsonDbConfig, EVENT_DELETED, EVENT_UPDATED};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;

fn store() -> InMemoryJsonDb {
    InMemoryJsonDb::new().unwrap()
}

fn store_with_events() -> (InMemoryJsonDb, Arc<CollectingEventBus>) {
    let bus = Arc::new(CollectingEventBus::new());
    let db = InMemoryJsonDb::open(JsonDbConfig::default(), bus.clone()).unwrap();
    (db, bus)
}

fn get(db: &InMemoryJsonDb, path: &str) -> Option<String> {
    db.get_as_string(path, &GetOptions::new()).unwrap()
}

fn get_with(db: &InMemoryJsonDb, path: &str, options: &GetOptions) -> Option<String> {
    db.get_as_string(path, options).unwrap()
}

fn ids(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

const USERS: &str = r#"{
    "u1": {"name": "ann", "age": 30},
    "u2": {"name": "bob", "age": 40},
    "u3": {"name": "ann"}
}"#;

// ============================================================================
// Write / read
// ============================================================================

#[test]
fn test_sqlite_dialect_detected() {
    let db = store();
    assert_eq!(db.dialect(), Dialect::SQLite);
}

#[test]
fn test_set_then_get_round_trip() {
    let db = store();
    let doc = r#"{"b":1,"c":[10,20],"d":{"e":"x","f":null,"g":true,"h":false}}"#;
    db.set("/a", doc.as_bytes()).unwrap();
    assert_eq!(get(&db, "/a").as_deref(), Some(doc));
}

#[test]
fn test_patch_array_element_then_delete_array() {
    let db = store();
    db.set("/a/", r#"{"b":1,"c":[10,20]}"#.as_bytes()).unwrap();

    db.set("/a/c/0/", "99".as_bytes()).unwrap();
    assert_eq!(get(&db, "/a").as_deref(), Some(r#"{"b":1,"c":[99,20]}"#));

    assert!(db.delete("/a/c/").unwrap());
    assert_eq!(get(&db, "/a").as_deref(), Some(r#"{"b":1}"#));
}

#[test]
fn test_set_is_idempotent() {
    let db = store();
    let doc = r#"{"k":[1,{"x":"y"}]}"#;
    db.set("/p", doc.as_bytes()).unwrap();
    db.set("/p", doc.as_bytes()).unwrap();
    assert_eq!(get(&db, "/p").as_deref(), Some(doc));
}

#[test]
fn test_digit_field_names_in_objects() {
    let db = store();
    db.set("/a", r#"{"0":1,"x":2}"#.as_bytes()).unwrap();
    assert_eq!(get(&db, "/a/0").as_deref(), Some("1"));
    assert!(db.exists("/a/0").unwrap());

    db.update("/a", r#"{"0":5}"#.as_bytes()).unwrap();
    assert_eq!(get(&db, "/a").as_deref(), Some(r#"{"0":5,"x":2}"#));

    db.set("/a/0", "7".as_bytes()).unwrap();
    assert_eq!(get(&db, "/a").as_deref(), Some(r#"{"0":7,"x":2}"#));

    assert_eq!(
        get_with(&db, "/a", &GetOptions::new().start_after("0")).as_deref(),
        Some(r#"{"x":2}"#)
    );
    assert_eq!(
        get_with(&db, "/a", &GetOptions::new().end_at("0")).as_deref(),
        Some(r#"{"0":7}"#)
    );

    assert!(db.delete("/a/0").unwrap());
    assert_eq!(get(&db, "/a").as_deref(), Some(r#"{"x":2}"#));
}

#[test]
fn test_digit_segments_in_arrays_and_new_paths() {
    let db = store();
    db.set("/c", "[10,20]".as_bytes()).unwrap();
    db.update("/c", r#"{"1":21}"#.as_bytes()).unwrap();
    assert_eq!(get(&db, "/c").as_deref(), Some("[10,21]"));
    assert_eq!(get(&db, "/c/1").as_deref(), Some("21"));

    db.set("/n/0", "1".as_bytes()).unwrap();
    assert_eq!(get(&db, "/n").as_deref(), Some("[1]"));
}

#[test]
fn test_set_replaces_whole_subtree() {
    let db = store();
    db.set("/a", r#"{"x":1,"y":{"z":2}}"#.as_bytes()).unwrap();
    db.set("/a", r#"{"w":3}"#.as_bytes()).unwrap();
    assert_eq!(get(&db, "/a").as_deref(), Some(r#"{"w":3}"#));
}

#[test]
fn test_set_below_scalar_replaces_ancestor() {
    let db = store();
    db.set("/a", "5".as_bytes()).unwrap();
    db.set("/a/b", "1".as_bytes()).unwrap();
    assert_eq!(get(&db, "/a").as_deref(), Some(r#"{"b":1}"#));
}

#[test]
fn test_scalar_at_path() {
    let db = store();
    db.set("/s", r#""h\"i""#.as_bytes()).unwrap();
    db.set("/n", "-1.5".as_bytes()).unwrap();
    assert_eq!(get(&db, "/s").as_deref(), Some(r#""h\"i""#));
    assert_eq!(get(&db, "/n").as_deref(), Some("-1.5"));
}

#[test]
fn test_paths_normalize() {
    let db = store();
    db.set("a/b", "1".as_bytes()).unwrap();
    assert_eq!(get(&db, "/a/b/").as_deref(), Some("1"));
    assert_eq!(get(&db, "//a//b").as_deref(), Some("1"));
}

#[test]
fn test_prefix_isolation() {
    let db = store();
    db.set("/ab", "1".as_bytes()).unwrap();
    db.set("/a", r#"{"x":1}"#.as_bytes()).unwrap();
    assert_eq!(get(&db, "/a").as_deref(), Some(r#"{"x":1}"#));

    db.delete("/a").unwrap();
    assert_eq!(get(&db, "/ab").as_deref(), Some("1"));
    assert!(get(&db, "/a").is_none());
}

#[test]
fn test_keys_with_like_wildcards_match_literally() {
    let db = store();
    db.set("/a_b", "1".as_bytes()).unwrap();
    db.set("/axb", "2".as_bytes()).unwrap();
    assert_eq!(get(&db, "/a_b").as_deref(), Some("1"));
    db.delete("/a_b").unwrap();
    assert_eq!(get(&db, "/axb").as_deref(), Some("2"));
}

#[test]
fn test_missing_path_is_none() {
    let db = store();
    assert!(get(&db, "/nothing").is_none());
    assert!(db.get("/nothing", &GetOptions::new()).unwrap().is_none());
}

#[test]
fn test_empty_containers_are_not_stored() {
    let db = store();
    db.set("/e", "{}".as_bytes()).unwrap();
    assert!(!db.exists("/e").unwrap());
    db.set("/f", r#"{"x":[],"y":1}"#.as_bytes()).unwrap();
    assert_eq!(get(&db, "/f").as_deref(), Some(r#"{"y":1}"#));
}

#[test]
fn test_exists() {
    let db = store();
    db.set("/a", r#"{"b":{"c":1}}"#.as_bytes()).unwrap();
    assert!(db.exists("/a").unwrap());
    assert!(db.exists("/a/b").unwrap());
    assert!(db.exists("/a/b/c").unwrap());
    assert!(!db.exists("/a/z").unwrap());
    assert!(!db.exists("/ab").unwrap());
}

#[test]
fn test_get_value_parses() {
    let db = store();
    db.set_value("/v", &json!({"list": [1, 2], "ok": true})).unwrap();
    let value = db.get_value("/v", &GetOptions::new()).unwrap().unwrap();
    assert_eq!(value, json!({"list": [1, 2], "ok": true}));
}

#[test]
fn test_large_document_flushes_in_batches() {
    let bus = Arc::new(CollectingEventBus::new());
    let config = JsonDbConfig::default().with_batch_flush_bytes(64);
    let db = InMemoryJsonDb::open(config, bus).unwrap();

    let items: Vec<serde_json::Value> = (0..200).map(|i| json!({"i": i, "s": format!("item-{}", i)})).collect();
    let doc = serde_json::Value::Array(items);
    db.set_value("/big", &doc).unwrap();
    assert_eq!(db.get_value("/big", &GetOptions::new()).unwrap(), Some(doc));
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_invalid_key_rejected() {
    let db = store();
    let err = db.set("/a.b", "1".as_bytes()).unwrap_err();
    assert!(matches!(err, Error::InvalidKey(_)));
    assert!(matches!(db.get("/a$", &GetOptions::new()), Err(Error::InvalidKey(_))));
}

#[test]
fn test_oversized_exponent_rejected() {
    let db = store();
    let err = db.set("/n", r#"{"x":1e5000}"#.as_bytes()).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert!(!db.exists("/n").unwrap());
}

#[test]
fn test_invalid_field_name_rejected() {
    let db = store();
    assert!(db.set("/a", r#"{"x.y":1}"#.as_bytes()).is_err());
    assert!(!db.exists("/a").unwrap());
}

#[test]
fn test_malformed_json_rolls_back() {
    let db = store();
    db.set("/a", r#"{"keep":1}"#.as_bytes()).unwrap();
    assert!(db.set("/a", r#"{"x":"#.as_bytes()).is_err());
    assert!(db.set("/a", r#"{"x":1} trailing"#.as_bytes()).is_err());
    assert_eq!(get(&db, "/a").as_deref(), Some(r#"{"keep":1}"#));
}

#[test]
fn test_update_requires_object() {
    let db = store();
    let err = db.update("/a", "[1,2]".as_bytes()).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

// ============================================================================
// update / delete / push
// ============================================================================

#[test]
fn test_update_touches_only_given_fields() {
    let (db, bus) = store_with_events();
    db.set("/a", r#"{"x":1,"y":{"z":2}}"#.as_bytes()).unwrap();
    bus.take();

    db.update("/a", r#"{"y":{"w":3},"n":"new"}"#.as_bytes()).unwrap();
    assert_eq!(
        get(&db, "/a").as_deref(),
        Some(r#"{"n":"new","x":1,"y":{"w":3}}"#)
    );
    assert_eq!(
        bus.take(),
        vec![
            (EVENT_UPDATED.to_string(), "/a/y".to_string()),
            (EVENT_UPDATED.to_string(), "/a/n".to_string()),
        ]
    );
}

#[test]
fn test_set_emits_updated_event() {
    let (db, bus) = store_with_events();
    db.set("/a/c/0", "1".as_bytes()).unwrap();
    assert_eq!(bus.take(), vec![(EVENT_UPDATED.to_string(), "/a/c/0".to_string())]);
}

#[test]
fn test_delete_emits_only_when_removed() {
    let (db, bus) = store_with_events();
    assert!(!db.delete("/missing").unwrap());
    assert!(bus.is_empty());

    db.set("/a", "1".as_bytes()).unwrap();
    bus.take();
    assert!(db.delete("/a").unwrap());
    assert_eq!(bus.take(), vec![(EVENT_DELETED.to_string(), "/a".to_string())]);
}

#[test]
fn test_failed_write_emits_nothing() {
    let (db, bus) = store_with_events();
    assert!(db.set("/a", "{".as_bytes()).is_err());
    assert!(bus.is_empty());
}

#[test]
fn test_push_generates_ordered_keys() {
    let db = store();
    let k1 = db.push("/log", r#"{"m":"first"}"#.as_bytes()).unwrap();
    let k2 = db.push("/log", r#"{"m":"second"}"#.as_bytes()).unwrap();
    assert_eq!(k1.len(), 20);
    assert!(k1 < k2);

    let expected = format!(r#"{{"{}":{{"m":"first"}},"{}":{{"m":"second"}}}}"#, k1, k2);
    assert_eq!(get(&db, "/log").as_deref(), Some(expected.as_str()));
}

// ============================================================================
// Read shaping
// ============================================================================

#[test]
fn test_descending_order() {
    let db = store();
    db.set("/a", r#"{"b":1,"c":[10,20]}"#.as_bytes()).unwrap();
    let options = GetOptions::new().order(SortOrder::Desc);
    assert_eq!(get_with(&db, "/a", &options).as_deref(), Some(r#"{"c":[20,10],"b":1}"#));
}

#[test]
fn test_range_bounds() {
    let db = store();
    db.set("/users", USERS.as_bytes()).unwrap();

    let keys = |options: GetOptions| -> Vec<String> {
        match db.get_value("/users", &options).unwrap() {
            Some(serde_json::Value::Object(map)) => map.keys().cloned().collect(),
            other => panic!("unexpected {:?}", other),
        }
    };

    assert_eq!(keys(GetOptions::new().start_at("u2")), vec!["u2", "u3"]);
    assert_eq!(keys(GetOptions::new().start_after("u1")), vec!["u2", "u3"]);
    assert_eq!(keys(GetOptions::new().end_at("u2")), vec!["u1", "u2"]);
    assert_eq!(keys(GetOptions::new().end_before("u2")), vec!["u1"]);
    assert_eq!(keys(GetOptions::new().start_at("u2").end_at("u2")), vec!["u2"]);
}

#[test]
fn test_bounds_excluding_everything_is_none() {
    let db = store();
    db.set("/users", USERS.as_bytes()).unwrap();
    let options = GetOptions::new().start_after("u3");
    assert!(get_with(&db, "/users", &options).is_none());
}

#[test]
fn test_limit_and_depth() {
    let db = store();
    db.set("/users", USERS.as_bytes()).unwrap();

    assert_eq!(
        get_with(&db, "/users", &GetOptions::new().limit_to_first(1)).as_deref(),
        Some(r#"{"u1":{"age":30,"name":"ann"}}"#)
    );
    assert_eq!(
        get_with(&db, "/users", &GetOptions::new().depth(1)).as_deref(),
        Some(r#"{"u1":true,"u2":true,"u3":true}"#)
    );
}

#[test]
fn test_pretty_and_callback() {
    let db = store();
    db.set("/a", r#"{"b":1}"#.as_bytes()).unwrap();
    assert_eq!(
        get_with(&db, "/a", &GetOptions::new().pretty_print(true)).as_deref(),
        Some("{\n  \"b\": 1\n}")
    );
    assert_eq!(
        get_with(&db, "/a", &GetOptions::new().callback("cb")).as_deref(),
        Some(r#"cb({"b":1})"#)
    );
}

#[test]
fn test_invalid_callback_rejected() {
    let db = store();
    db.set("/a", "1".as_bytes()).unwrap();
    assert!(db.get("/a", &GetOptions::new().callback("not valid")).is_err());
}

#[test]
fn test_stream_writes_to_any_writer() {
    let db = store();
    db.set("/a", r#"{"b":[true]}"#.as_bytes()).unwrap();
    let stream = db.get("/a", &GetOptions::new()).unwrap().unwrap();
    assert_eq!(stream.base_path(), "/a/");
    let out = stream.write_to(Vec::new()).unwrap();
    assert_eq!(out, br#"{"b":[true]}"#);
}

// ============================================================================
// Filters
// ============================================================================

#[test]
fn test_equality_filter() {
    let db = store();
    db.set("/users", USERS.as_bytes()).unwrap();
    let options = GetOptions::new().filter(Filter::equals("name", json!("ann")).unwrap());
    assert_eq!(
        get_with(&db, "/users", &options).as_deref(),
        Some(r#"{"u1":{"age":30,"name":"ann"},"u3":{"name":"ann"}}"#)
    );
}

#[test]
fn test_ordering_filter_only_compares_same_type() {
    let db = store();
    db.set("/users", USERS.as_bytes()).unwrap();
    db.set("/users/u4", r#"{"age":"old"}"#.as_bytes()).unwrap();
    let options = GetOptions::new().filter(Filter::child("age", Op::Gt, json!(35)).unwrap());
    assert_eq!(
        get_with(&db, "/users", &options).as_deref(),
        Some(r#"{"u2":{"age":40,"name":"bob"}}"#)
    );
}

#[test]
fn test_logical_filters() {
    let db = store();
    db.set("/users", USERS.as_bytes()).unwrap();

    let or = Filter::or(vec![
        Filter::equals("name", json!("bob")).unwrap(),
        Filter::child("age", Op::Lt, json!(35)).unwrap(),
    ])
    .unwrap();
    let value = db.get_value("/users", &GetOptions::new().filter(or)).unwrap().unwrap();
    assert_eq!(value, json!({"u1": {"name": "ann", "age": 30}, "u2": {"name": "bob", "age": 40}}));

    let and = Filter::and(vec![
        Filter::equals("name", json!("ann")).unwrap(),
        Filter::child("age", Op::Ge, json!(30)).unwrap(),
    ])
    .unwrap();
    let value = db.get_value("/users", &GetOptions::new().filter(and)).unwrap().unwrap();
    assert_eq!(value, json!({"u1": {"name": "ann", "age": 30}}));
}

#[test]
fn test_filter_ignores_nested_fields() {
    let db = store();
    db.set("/items", r#"{"i1":{"meta":{"tag":"x"}},"i2":{"tag":"x"}}"#.as_bytes())
        .unwrap();
    let options = GetOptions::new().filter(Filter::equals("tag", json!("x")).unwrap());
    assert_eq!(
        get_with(&db, "/items", &options).as_deref(),
        Some(r#"{"i2":{"tag":"x"}}"#)
    );
}

#[test]
fn test_filter_with_no_match_is_none() {
    let db = store();
    db.set("/users", USERS.as_bytes()).unwrap();
    let options = GetOptions::new().filter(Filter::equals("name", json!("zed")).unwrap());
    assert!(get_with(&db, "/users", &options).is_none());
}

// ============================================================================
// Property lookup
// ============================================================================

#[test]
fn test_fetch_ids_by_scan() {
    let db = store();
    db.set("/users", USERS.as_bytes()).unwrap();
    db.set("/users/u9/nested/name", r#""ann""#.as_bytes()).unwrap();
    assert_eq!(
        db.fetch_ids_by_property_value("/users", "name", &json!("ann")).unwrap(),
        ids(&["u1", "u3"])
    );
    assert_eq!(
        db.fetch_ids_by_property_value("/users", "age", &json!(40)).unwrap(),
        ids(&["u2"])
    );
    assert!(db
        .fetch_ids_by_property_value("/users", "name", &json!("zed"))
        .unwrap()
        .is_empty());
}

#[test]
fn test_fetch_ids_index_matches_scan() {
    let config = JsonDbConfig::default().with_index("/users", "name");
    let bus = Arc::new(CollectingEventBus::new());
    let indexed = InMemoryJsonDb::open(config, bus).unwrap();
    let plain = store();

    for db in [&indexed, &plain] {
        db.set("/users", USERS.as_bytes()).unwrap();
        db.set("/users/u4", r#"{"name":"ann","age":1}"#.as_bytes()).unwrap();
        db.delete("/users/u1").unwrap();
    }

    let from_index = indexed.fetch_ids_by_property_value("/users", "name", &json!("ann")).unwrap();
    let from_scan = plain.fetch_ids_by_property_value("/users", "name", &json!("ann")).unwrap();
    assert_eq!(from_index, ids(&["u3", "u4"]));
    assert_eq!(from_index, from_scan);
}

#[test]
fn test_fetch_ids_rejects_bad_field() {
    let db = store();
    assert!(db.fetch_ids_by_property_value("/users", "a.b", &json!(1)).is_err());
}
