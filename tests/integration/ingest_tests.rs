//! Ingestion tests: snapshot loading and normalization of export shapes

use chrono::{TimeZone, Utc};
use refscope::graph::{ObjectKey, ObjectType};
use refscope::ingest::{normalize, JsonSnapshot, RecordSource};
use serde_json::json;
use std::path::PathBuf;

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

#[test]
fn test_fixture_loads() {
    let ingested = JsonSnapshot::from_path(fixtures_path().join("snapshot.json"))
        .load()
        .unwrap();

    // 2 policies, 4 scripts, 2 packages, 5 groups, 2 EAs, 1 search
    assert_eq!(ingested.records.len(), 16);
    assert_eq!(ingested.rejected.len(), 1);
    assert_eq!(ingested.rejected[0].key.object_type, ObjectType::Script);
    assert_eq!(ingested.rejected[0].name, "broken export");

    // the unknown "printers" collection is skipped
    assert!(ingested
        .records
        .iter()
        .all(|r| r.name != "Lobby"));
}

#[test]
fn test_fixture_timestamps() {
    let ingested = JsonSnapshot::from_path(fixtures_path().join("snapshot.json"))
        .load()
        .unwrap();

    let created = |key: ObjectKey| {
        ingested
            .records
            .iter()
            .find(|r| r.key() == key)
            .and_then(|r| r.created_at)
    };

    assert_eq!(
        created(ObjectKey::new(ObjectType::Policy, "1")),
        Some(Utc.with_ymd_and_hms(2023, 1, 10, 9, 0, 0).unwrap())
    );
    assert_eq!(
        created(ObjectKey::new(ObjectType::Package, "20")),
        Some(Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap())
    );
    assert_eq!(
        created(ObjectKey::new(ObjectType::Package, "21")),
        Some(Utc.with_ymd_and_hms(2022, 4, 15, 5, 20, 0).unwrap())
    );
    assert_eq!(created(ObjectKey::new(ObjectType::ExtensionAttribute, "41")), None);
}

#[test]
fn test_same_object_in_different_shapes() {
    let shapes = [
        json!({"id": 5, "name": "Wi-Fi"}),
        json!({"general": {"id": 5, "name": "Wi-Fi"}}),
        json!({"id": "5", "displayName": "Wi-Fi"}),
    ];

    for raw in &shapes {
        let record = normalize(ObjectType::ConfigurationProfile, raw).unwrap();
        assert_eq!(record.key(), ObjectKey::new(ObjectType::ConfigurationProfile, "5"));
        assert_eq!(record.name, "Wi-Fi");
    }
}

#[test]
fn test_snapshot_with_nothing_usable() {
    let ingested = JsonSnapshot::parse(r#"{"policies": [], "printers": [{"id": 1}]}"#).unwrap();
    assert!(ingested.records.is_empty());
    assert!(ingested.rejected.is_empty());
}
