//! Impact analysis tests

use refscope::analysis::{ImpactAnalyzer, RiskLevel, RiskThresholds};
use refscope::config::default_rules;
use refscope::graph::{
    build, GraphBuilder, ObjectKey, ObjectRecord, ObjectType, RelationshipGraph,
};
use refscope::{AnalysisError, Config, JsonSnapshot, RecordSource};
use serde_json::json;
use std::path::PathBuf;

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn group(id: &str, name: &str) -> ObjectRecord {
    ObjectRecord::new(ObjectType::ComputerGroup, id, name)
}

fn nested_group(id: &str, name: &str, member_of: &str) -> ObjectRecord {
    group(id, name).with_raw(json!({
        "criteria": [{"name": "Computer Group", "value": member_of}]
    }))
}

fn policies_scoped_to(group_id: &str, count: usize) -> Vec<ObjectRecord> {
    (1..=count)
        .map(|i| {
            ObjectRecord::new(ObjectType::Policy, format!("P{}", i), format!("Policy {}", i))
                .with_raw(json!({"scope": {"computer_groups": [{"id": group_id}]}}))
        })
        .collect()
}

fn fixture_graph() -> RelationshipGraph {
    let ingested = JsonSnapshot::from_path(fixtures_path().join("snapshot.json"))
        .load()
        .unwrap();
    let rule_set = Config::default().rule_set().unwrap();
    GraphBuilder::new(&rule_set).build(ingested.records)
}

// ============================================================================
// Scenario tests
// ============================================================================

#[test]
fn test_single_scoped_policy_is_low_risk() {
    let mut records = policies_scoped_to("G1", 1);
    records.push(group("G1", "G1"));
    let graph = build(records, &default_rules()).unwrap();

    let report = ImpactAnalyzer::default()
        .assess(&graph, &ObjectKey::new(ObjectType::ComputerGroup, "G1"))
        .unwrap();

    assert_eq!(report.direct_count(), 1);
    assert_eq!(report.total_count, 1);
    assert_eq!(report.risk_level, RiskLevel::Low);
}

#[test]
fn test_widely_scoped_group_is_high_risk() {
    let mut records = policies_scoped_to("G2", 25);
    records.push(group("G2", "G2"));
    let graph = build(records, &default_rules()).unwrap();

    let report = ImpactAnalyzer::default()
        .assess(&graph, &ObjectKey::new(ObjectType::ComputerGroup, "G2"))
        .unwrap();

    assert_eq!(report.total_count, 25);
    assert_eq!(report.risk_level, RiskLevel::High);
}

// ============================================================================
// Invariants
// ============================================================================

#[test]
fn test_cyclic_groups_terminate() {
    // A <- B <- C <- A
    let graph = build(
        vec![
            nested_group("A", "A", "C"),
            nested_group("B", "B", "A"),
            nested_group("C", "C", "B"),
        ],
        &default_rules(),
    )
    .unwrap();

    // (target, direct dependent, transitive dependent)
    for (target, direct, transitive) in [("A", "B", "C"), ("B", "C", "A"), ("C", "A", "B")] {
        let report = ImpactAnalyzer::default()
            .assess(&graph, &ObjectKey::new(ObjectType::ComputerGroup, target))
            .unwrap();

        // everything except the target, each once
        assert_eq!(report.total_count, 2, "assessing {}", target);
        assert!(report.affected().all(|a| a.key.id != target));
        assert_eq!(report.direct_count(), 1);
        assert_eq!(report.direct[0].key.id, direct);
        assert_eq!(report.transitive[0].key.id, transitive);
    }
}

#[test]
fn test_risk_is_monotonic_in_affected_count() {
    let thresholds = RiskThresholds::default();
    let mut previous = RiskLevel::Low;

    for count in 0..40 {
        let mut records = policies_scoped_to("G", count);
        records.push(group("G", "G"));
        let graph = build(records, &default_rules()).unwrap();

        let report = ImpactAnalyzer::new(thresholds)
            .assess(&graph, &ObjectKey::new(ObjectType::ComputerGroup, "G"))
            .unwrap();

        assert_eq!(report.total_count, count);
        assert!(report.risk_level >= previous);
        previous = report.risk_level;
    }

    assert_eq!(previous, RiskLevel::High);
}

#[test]
fn test_custom_thresholds() {
    let mut records = policies_scoped_to("G", 3);
    records.push(group("G", "G"));
    let graph = build(records, &default_rules()).unwrap();
    let target = ObjectKey::new(ObjectType::ComputerGroup, "G");

    let strict = ImpactAnalyzer::new(RiskThresholds::new(0, 2).unwrap());
    assert_eq!(strict.assess(&graph, &target).unwrap().risk_level, RiskLevel::High);

    let relaxed = ImpactAnalyzer::new(RiskThresholds::new(1, 3).unwrap());
    assert_eq!(relaxed.assess(&graph, &target).unwrap().risk_level, RiskLevel::Medium);
}

// ============================================================================
// Fixture tests
// ============================================================================

#[test]
fn test_extension_attribute_blast_radius() {
    let graph = fixture_graph();
    let report = ImpactAnalyzer::default()
        .assess(&graph, &ObjectKey::new(ObjectType::ExtensionAttribute, "40"))
        .unwrap();

    let affected: Vec<(String, usize)> = report
        .affected()
        .map(|a| (a.key.to_string(), a.depth))
        .collect();
    assert_eq!(
        affected,
        vec![
            ("computer_group:32".to_string(), 1),
            ("advanced_search:50".to_string(), 1),
            ("computer_group:30".to_string(), 2),
            ("policy:1".to_string(), 3),
        ]
    );
    assert_eq!(report.by_type()[&ObjectType::ComputerGroup], 2);
}

#[test]
fn test_batch_assessment() {
    let graph = fixture_graph();
    let targets = vec![
        ObjectKey::new(ObjectType::Script, "10"),
        ObjectKey::new(ObjectType::Script, "99"),
        ObjectKey::new(ObjectType::ComputerGroup, "33"),
    ];

    let results = ImpactAnalyzer::default().assess_batch(&graph, &targets);
    assert_eq!(results.len(), 3);

    assert_eq!(results[&targets[0]].as_ref().unwrap().total_count, 1);
    // referenced but never exported: not a node
    assert_eq!(
        results[&targets[1]].as_ref().unwrap_err(),
        &AnalysisError::NotFound(targets[1].clone())
    );
    // loop members affect each other and nothing else
    assert_eq!(results[&targets[2]].as_ref().unwrap().total_count, 1);

    let single = ImpactAnalyzer::default().assess(&graph, &targets[0]).unwrap();
    assert_eq!(results[&targets[0]].as_ref().unwrap(), &single);
}
