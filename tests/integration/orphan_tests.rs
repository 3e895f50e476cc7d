//! Orphan detection tests
//!
//! Runs the detector against hand-built graphs and against the shared
//! snapshot fixture.

use chrono::{DateTime, Duration, TimeZone, Utc};
use refscope::analysis::{qualifying_incoming, Admission, OrphanDetector, ScanOptions};
use refscope::config::default_rules;
use refscope::graph::{build, GraphBuilder, ObjectKey, ObjectRecord, ObjectType, RelationshipGraph};
use refscope::{Config, JsonSnapshot, RecordSource};
use serde_json::json;
use std::path::PathBuf;

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn as_of() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

fn fixture_graph(config: &Config) -> RelationshipGraph {
    let ingested = JsonSnapshot::from_path(fixtures_path().join("snapshot.json"))
        .load()
        .unwrap();
    let rule_set = config.rule_set().unwrap();
    GraphBuilder::new(&rule_set).build(ingested.records)
}

fn keys(graph: &RelationshipGraph, options: &ScanOptions) -> Vec<String> {
    OrphanDetector::new()
        .scan(graph, options)
        .unwrap()
        .iter()
        .map(|c| c.key().to_string())
        .collect()
}

#[test]
fn test_old_unreferenced_script_is_reported() {
    let graph = build(
        vec![ObjectRecord::new(ObjectType::Script, "S2", "S2")
            .with_created_at(as_of() - Duration::days(90))],
        &default_rules(),
    )
    .unwrap();

    let options = ScanOptions::new(as_of())
        .with_min_age_days(30)
        .with_exclusion("zz*");
    let found = OrphanDetector::new().scan(&graph, &options).unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].record.id, "S2");
    assert_eq!(found[0].incoming, 0);
    assert_eq!(
        found[0].admission,
        Admission::OldEnough {
            age_days: 90,
            min_age_days: 30
        }
    );
}

#[test]
fn test_referenced_script_is_not_reported() {
    let graph = build(
        vec![
            ObjectRecord::new(ObjectType::Policy, "P1", "P1").with_raw(json!({
                "scripts": [{"id": "S1"}]
            })),
            ObjectRecord::new(ObjectType::Script, "S1", "S1"),
        ],
        &default_rules(),
    )
    .unwrap();

    let options = ScanOptions::new(as_of()).with_type(ObjectType::Script);
    assert!(keys(&graph, &options).is_empty());
}

#[test]
fn test_every_candidate_satisfies_the_filters() {
    let config = Config::default();
    let graph = fixture_graph(&config);
    let options = config.scan_options(as_of());

    let found = OrphanDetector::new().scan(&graph, &options).unwrap();
    assert!(!found.is_empty());

    for candidate in &found {
        let key = candidate.key();
        assert_eq!(qualifying_incoming(&graph, &key, &options.relevance), 0);
        if let Some(age) = candidate.admission.age_days() {
            assert!(age >= i64::from(options.min_age_days));
        }
        assert!(!options.root_types.contains(&key.object_type));
    }
}

#[test]
fn test_fixture_orphans() {
    let config = Config::default();
    let graph = fixture_graph(&config);

    let options = config.scan_options(as_of());
    assert_eq!(
        keys(&graph, &options),
        vec!["script:11", "script:12", "package:21", "extension_attribute:41"]
    );

    // script:13 is unreferenced but only a week old
    let everything = options.clone().with_min_age_days(0);
    assert!(keys(&graph, &everything).contains(&"script:13".to_string()));

    let excluded = options.with_exclusion("ZZ-*");
    assert_eq!(
        keys(&graph, &excluded),
        vec!["script:11", "package:21", "extension_attribute:41"]
    );
}

#[test]
fn test_root_types_on_request() {
    let config = Config::default();
    let graph = fixture_graph(&config);

    let options = config
        .scan_options(as_of())
        .with_type(ObjectType::Policy)
        .with_type(ObjectType::AdvancedSearch);

    assert_eq!(
        keys(&graph, &options),
        vec!["policy:1", "policy:2", "advanced_search:50"]
    );
}

#[test]
fn test_scan_does_not_mutate_graph() {
    let config = Config::default();
    let graph = fixture_graph(&config);
    let before: Vec<ObjectKey> = graph.records().map(|r| r.key()).collect();
    let edges_before = graph.edge_count();

    let options = config.scan_options(as_of());
    let first = keys(&graph, &options);
    let second = keys(&graph, &options);

    assert_eq!(first, second);
    assert_eq!(graph.records().map(|r| r.key()).collect::<Vec<_>>(), before);
    assert_eq!(graph.edge_count(), edges_before);
}
