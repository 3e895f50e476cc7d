//! Graph construction tests
//!
//! These tests build graphs through the public API and check the invariants
//! every query relies on.

use refscope::config::default_rules;
use refscope::graph::{
    build, ExtractionRuleSet, FieldRule, GraphBuilder, ObjectKey, ObjectRecord, ObjectType,
    Reference, ReferenceEdge, ReferenceKind, RuleConfig,
};
use refscope::{AnalysisError, BuildWarning, ConfigurationError, PartialRecordError};
use serde_json::json;

fn key(object_type: ObjectType, id: &str) -> ObjectKey {
    ObjectKey::new(object_type, id)
}

fn fleet() -> Vec<ObjectRecord> {
    vec![
        ObjectRecord::new(ObjectType::Policy, "1", "P1").with_raw(json!({
            "scripts": [{"id": 1}],
            "scope": {"computer_groups": [{"id": 7}]}
        })),
        ObjectRecord::new(ObjectType::Policy, "2", "P2").with_raw(json!({
            "package_configuration": {"packages": [{"id": 3}]},
            "scope": {"exclusions": {"computer_groups": [{"id": 8}]}}
        })),
        ObjectRecord::new(ObjectType::Script, "1", "S1"),
        ObjectRecord::new(ObjectType::Package, "3", "Tools.pkg"),
        ObjectRecord::new(ObjectType::ComputerGroup, "7", "Laptops").with_raw(json!({
            "criteria": [{"name": "Computer Group", "value": "Staff"}, {"name": "FileVault"}]
        })),
        ObjectRecord::new(ObjectType::ComputerGroup, "8", "Staff"),
        ObjectRecord::new(ObjectType::ExtensionAttribute, "4", "FileVault"),
    ]
}

// ============================================================================
// Scenario tests
// ============================================================================

#[test]
fn test_policy_running_script() {
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

    let edge = ReferenceEdge::new(
        key(ObjectType::Policy, "P1"),
        key(ObjectType::Script, "S1"),
        ReferenceKind::RunsScript,
    );

    let forward: Vec<_> = graph.forward(&key(ObjectType::Policy, "P1")).into_iter().collect();
    let reverse: Vec<_> = graph.reverse(&key(ObjectType::Script, "S1")).into_iter().collect();
    assert_eq!(forward, vec![&edge]);
    assert_eq!(reverse, vec![&edge]);
    assert!(graph.is_referenced(&key(ObjectType::Script, "S1")));
    assert!(!graph.is_referenced(&key(ObjectType::Policy, "P1")));
}

#[test]
fn test_default_rules_cover_fleet() {
    let graph = build(fleet(), &default_rules()).unwrap();

    assert_eq!(graph.node_count(), 7);
    assert_eq!(graph.edge_count(), 6);
    assert!(graph.warnings().is_empty());

    let kinds: Vec<ReferenceKind> = graph
        .forward(&key(ObjectType::ComputerGroup, "7"))
        .iter()
        .map(|edge| edge.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![ReferenceKind::MemberOfGroup, ReferenceKind::UsesExtensionAttribute]
    );
}

// ============================================================================
// Invariants
// ============================================================================

#[test]
fn test_build_is_deterministic() {
    let rule_set = ExtractionRuleSet::from_rules(&default_rules()).unwrap();
    let forward_order = GraphBuilder::new(&rule_set).build(fleet());

    let mut reversed = fleet();
    reversed.reverse();
    let reverse_order = GraphBuilder::new(&rule_set).with_parallel(false).build(reversed);

    assert_eq!(forward_order.edges(), reverse_order.edges());
    assert_eq!(
        forward_order.records().collect::<Vec<_>>(),
        reverse_order.records().collect::<Vec<_>>()
    );
}

#[test]
fn test_duplicate_survivor_is_independent_of_input_order() {
    let runs = |script: u64| {
        ObjectRecord::new(ObjectType::Policy, "1", "P").with_raw(json!({
            "scripts": [{"id": script}]
        }))
    };
    let scripts = || {
        vec![
            ObjectRecord::new(ObjectType::Script, "10", "a.sh"),
            ObjectRecord::new(ObjectType::Script, "20", "b.sh"),
        ]
    };

    let mut first = vec![runs(10), runs(20)];
    first.extend(scripts());
    let mut second = vec![runs(20), runs(10)];
    second.extend(scripts());

    let first = build(first, &default_rules()).unwrap();
    let second = build(second, &default_rules()).unwrap();

    let policy = key(ObjectType::Policy, "1");
    assert_eq!(first.forward(&policy), second.forward(&policy));
    assert_eq!(first.forward(&policy).len(), 1);
    assert_eq!(first.warnings(), second.warnings());
}

#[test]
fn test_forward_and_reverse_are_symmetric() {
    let graph = build(fleet(), &default_rules()).unwrap();

    for record in graph.records() {
        let key = record.key();
        for edge in graph.forward(&key) {
            if edge.unresolved {
                continue;
            }
            assert!(
                graph.reverse(&edge.target).contains(edge),
                "{} missing from reverse of {}",
                edge,
                edge.target
            );
        }
        for edge in graph.reverse(&key) {
            assert!(graph.forward(&edge.source).contains(edge));
        }
    }
}

#[test]
fn test_edges_only_between_known_objects() {
    let mut records = fleet();
    records.push(ObjectRecord::new(ObjectType::Policy, "9", "Dangling").with_raw(json!({
        "scripts": [{"id": 404}]
    })));
    let graph = build(records, &default_rules()).unwrap();

    for edge in graph.edges() {
        assert!(graph.contains(&edge.source));
        assert!(graph.contains(&edge.target));
    }

    // the dangling reference survives, flagged
    let dangling: Vec<&ReferenceEdge> = graph.unresolved_edges().collect();
    assert_eq!(dangling.len(), 1);
    assert!(dangling[0].unresolved);
    assert_eq!(dangling[0].target, key(ObjectType::Script, "404"));
    assert!(graph.forward(&key(ObjectType::Policy, "9")).contains(dangling[0]));
}

#[test]
fn test_malformed_field_becomes_warning() {
    let graph = build(
        vec![
            ObjectRecord::new(ObjectType::Policy, "1", "Broken").with_raw(json!({
                "scripts": {"id": 1}
            })),
            ObjectRecord::new(ObjectType::Script, "1", "S1"),
        ],
        &default_rules(),
    )
    .unwrap();

    // the record stays as a node without edges
    assert!(graph.contains(&key(ObjectType::Policy, "1")));
    assert_eq!(graph.edge_count(), 0);

    match graph.warnings() {
        [BuildWarning::PartialRecord(err)] => {
            assert_eq!(err.key, key(ObjectType::Policy, "1"));
            assert_eq!(err.field, "scripts[].id");
        }
        other => panic!("unexpected warnings: {:?}", other),
    }
}

#[test]
fn test_invalid_rules_are_rejected() {
    let mut rules = RuleConfig::new();
    rules.insert(
        ObjectType::Policy,
        vec![FieldRule::new("scripts[id=", ObjectType::Script, ReferenceKind::RunsScript)],
    );

    let err = build(vec![], &rules).unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::Configuration(ConfigurationError::InvalidFieldPath { .. })
    ));
}

#[test]
fn test_custom_extractor_registration() {
    let mut rule_set = ExtractionRuleSet::new();
    rule_set.register(ObjectType::Policy, |record: &ObjectRecord| {
        let script = record.raw.get("script_id").and_then(|v| v.as_str());
        Ok::<_, PartialRecordError>(
            script
                .map(|id| Reference::by_id(ObjectType::Script, id, ReferenceKind::RunsScript))
                .into_iter()
                .collect::<Vec<_>>(),
        )
    });

    let graph = GraphBuilder::new(&rule_set).build(vec![
        ObjectRecord::new(ObjectType::Policy, "1", "P").with_raw(json!({"script_id": "5"})),
        ObjectRecord::new(ObjectType::Script, "5", "S"),
    ]);

    assert!(graph.is_referenced(&key(ObjectType::Script, "5")));
}
