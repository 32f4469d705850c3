use std::collections::BTreeSet;

use chrono::DateTime;
use gold_harness::annotation::RawAssignment;
use gold_harness::cleaning::{
    self, CleaningConfig, CleaningPipeline, CleaningStage, ContradictionFilter, ExclusionLedger,
    ExclusionReason, ExplanationTypeFilter, PolarityFilter,
};
use gold_harness::corpus::{Argument, ArgumentPair, Corpus, ReasoningUnit, Target, UnitRef, WorkerAssignment};
use gold_harness::labels::{terminal_labels, ContradictionTable, PolarityRule};

fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol
}

fn unit(id: &str, target: Target, gold: Option<&str>, judgements: &[(&str, f64)]) -> ReasoningUnit {
    let at = DateTime::parse_from_rfc3339("2016-04-19T10:00:00Z").unwrap();
    let assignments = judgements
        .iter()
        .enumerate()
        .map(|(i, (label, competence))| RawAssignment {
            worker_id: format!("W{i}"),
            item_id: id.parse().unwrap(),
            hit_id: format!("H{id}"),
            assignment_id: format!("A{id}-{i}"),
            accept_time: at,
            submit_time: at,
            label: label.to_string(),
            competence: Some(*competence),
            rejected: false,
        })
        .collect();
    let mut unit = ReasoningUnit::new(id, format!("unit {id}"), target).with_assignments(assignments);
    unit.estimated_gold_label = gold.map(str::to_string);
    unit
}

fn pair(id: &str, a1: &str, a2: &str, verdict: Target, units: Vec<ReasoningUnit>) -> ArgumentPair {
    ArgumentPair {
        id: id.to_string(),
        arg1: Argument {
            id: a1.to_string(),
            text: format!("text of {a1}"),
        },
        arg2: Argument {
            id: a2.to_string(),
            text: format!("text of {a2}"),
        },
        gold_verdict: verdict,
        assignments: vec![WorkerAssignment {
            worker_id: "original".to_string(),
            hit_id: "H0".to_string(),
            assignment_id: format!("A-{id}"),
            value: Some(verdict),
            reason: String::new(),
            competence: Some(0.8),
            reasoning_units: units,
        }],
    }
}

fn at(pair: usize, unit: usize) -> UnitRef {
    UnitRef {
        file: "gmo_yes".to_string(),
        pair,
        assignment: 0,
        unit,
    }
}

/// p1: arg1 beats arg2; p2: arg3 beats arg1.
fn corpus() -> Corpus {
    let mut pre_excluded = unit("8", Target::First, Some("o8_1"), &[("o8_1", 0.9)]);
    pre_excluded.excluded = true;

    let p1 = pair(
        "arg1_arg2",
        "arg1",
        "arg2",
        Target::First,
        vec![
            unit("1", Target::First, Some("o8_1"), &[("o8_1", 0.9), ("o8_1", 0.8)]),
            unit("2", Target::First, Some("o1_2"), &[("o1_2", 0.7)]),
            unit("3", Target::Second, Some("o8_4"), &[("o8_4", 0.6)]),
            unit("4", Target::Second, Some("o5_1"), &[("o5_1", 0.7)]),
            pre_excluded,
        ],
    );
    let p2 = pair(
        "arg3_arg1",
        "arg3",
        "arg1",
        Target::First,
        vec![
            unit("5", Target::Second, Some("o7_3"), &[("o7_3", 0.3), ("o8_1", 0.9)]),
            unit("6", Target::First, Some("o9_1"), &[("o9_1", 0.8)]),
            unit("7", Target::First, None, &[("o9_2", 0.4)]),
        ],
    );
    let mut corpus = Corpus::new();
    corpus.insert("gmo_yes", vec![p1, p2]);
    corpus
}

fn stages(config: &CleaningConfig) -> Vec<Box<dyn CleaningStage>> {
    vec![
        Box::new(ExplanationTypeFilter::new(config.unusable_labels.clone())),
        Box::new(PolarityFilter::new(config.polarity())),
        Box::new(ContradictionFilter::new(
            config.contradiction_table(),
            config.contradiction_lambda,
        )),
    ]
}

#[test]
fn standard_pipeline_reports_each_stage() {
    let data = corpus();
    let pipeline = CleaningPipeline::standard(&CleaningConfig::default());
    assert_eq!(
        pipeline.stage_names(),
        vec!["explanation_type", "polarity", "contradiction"]
    );

    let outcome = pipeline.run(&data).unwrap();
    let summary: Vec<(&str, usize, usize)> = outcome
        .reports
        .iter()
        .map(|r| (r.stage.as_str(), r.examined, r.excluded))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("explanation_type", 7, 1),
            ("polarity", 5, 1),
            ("contradiction", 4, 1),
        ]
    );
    assert_eq!(
        outcome.reports[2].contradictions.get("[o7_3, o8_1]"),
        Some(&1)
    );

    let excluded = outcome.ledger.units();
    let expected: BTreeSet<UnitRef> = [at(0, 1), at(0, 2), at(0, 4), at(1, 0)].into_iter().collect();
    assert_eq!(excluded, expected);
    assert_eq!(
        outcome.ledger.get(&at(0, 4)).unwrap().reason,
        ExclusionReason::PreExcluded
    );
    match &outcome.ledger.get(&at(1, 0)).unwrap().reason {
        ExclusionReason::Contradiction { against, .. } => assert_eq!(against, &at(0, 0)),
        other => panic!("unexpected reason {other:?}"),
    }

    let cleaned = cleaning::apply(&data, &outcome.ledger).unwrap();
    let flagged: BTreeSet<UnitRef> = cleaned
        .units()
        .filter(|e| e.unit.excluded)
        .map(|e| e.unit_ref())
        .collect();
    assert_eq!(flagged, expected);
    // The input corpus is untouched.
    assert_eq!(data.units().filter(|e| e.unit.excluded).count(), 1);
}

#[test]
fn exclusion_only_grows_from_stage_to_stage() {
    let data = corpus();
    let config = CleaningConfig::default();
    let mut previous = ExclusionLedger::from_corpus(&data).units();
    for k in 1..=3 {
        let prefix: Vec<Box<dyn CleaningStage>> = stages(&config).into_iter().take(k).collect();
        let after = CleaningPipeline::new(prefix).run(&data).unwrap().ledger.units();
        assert!(after.is_superset(&previous), "stage {k} dropped an exclusion");
        previous = after;
    }
    assert_eq!(previous.len(), 4);
}

#[test]
fn polarity_follows_the_pair_verdict() {
    let mut data = Corpus::new();
    data.insert(
        "gmo_yes",
        vec![pair(
            "arg1_arg2",
            "arg1",
            "arg2",
            Target::First,
            vec![
                unit("1", Target::First, Some("o8_1"), &[("o8_1", 0.9)]),
                unit("2", Target::Second, Some("o8_1"), &[("o8_1", 0.9)]),
                unit("3", Target::First, Some("o5_1"), &[("o5_1", 0.9)]),
                unit("4", Target::Second, Some("o7_3"), &[("o7_3", 0.9)]),
                unit("5", Target::First, Some("o7_3"), &[("o7_3", 0.9)]),
            ],
        )],
    );
    let outcome = PolarityFilter::new(PolarityRule::default())
        .evaluate(&data, &ExclusionLedger::new())
        .unwrap();
    assert_eq!(outcome.report.examined, 5);
    let excluded: Vec<&UnitRef> = outcome.exclusions.iter().map(|e| &e.unit).collect();
    // Negative on the less convincing side (unit 4) survives.
    assert_eq!(excluded, vec![&at(0, 1), &at(0, 2), &at(0, 4)]);
    assert_eq!(
        outcome.exclusions[0].reason,
        ExclusionReason::WrongPolarity {
            label: "o8_1".to_string(),
            on_more_convincing: false,
        }
    );
    assert_eq!(
        outcome.exclusions[1].reason,
        ExclusionReason::WrongPolarity {
            label: "o5_1".to_string(),
            on_more_convincing: true,
        }
    );
    assert_eq!(
        outcome.exclusions[2].reason,
        ExclusionReason::WrongPolarity {
            label: "o7_3".to_string(),
            on_more_convincing: true,
        }
    );
}

#[test]
fn weaker_side_of_a_contradiction_is_excluded() {
    // B (listed first) weighs about 0.71, A about 0.42.
    let mut data = Corpus::new();
    data.insert(
        "gmo_yes",
        vec![pair(
            "arg1_arg2",
            "arg1",
            "arg2",
            Target::Second,
            vec![
                unit("21", Target::First, Some("o8_6"), &[("o8_6", 0.98)]),
                unit("20", Target::First, Some("o6_1"), &[("o6_1", 0.641)]),
            ],
        )],
    );
    let outcome = ContradictionFilter::default()
        .evaluate(&data, &ExclusionLedger::new())
        .unwrap();

    assert_eq!(outcome.exclusions.len(), 1);
    let loser = &outcome.exclusions[0];
    assert_eq!(loser.unit, at(0, 1));
    let ExclusionReason::Contradiction {
        key,
        against,
        product,
        opponent_product,
    } = &loser.reason
    else {
        panic!("unexpected reason {:?}", loser.reason);
    };
    assert_eq!(key, "[o6_1, o8_6]");
    assert_eq!(against, &at(0, 0));
    assert!(approx_eq(*product, 0.42, 0.01), "{product}");
    assert!(approx_eq(*opponent_product, 0.71, 0.01), "{opponent_product}");
}

#[test]
fn contradictions_are_found_across_pairs_and_files() {
    let mut data = Corpus::new();
    data.insert(
        "gmo_no",
        vec![pair(
            "arg7_arg8",
            "arg7",
            "arg8",
            Target::First,
            vec![unit("31", Target::First, Some("o9_1"), &[("o9_1", 0.9)])],
        )],
    );
    data.insert(
        "gmo_yes",
        vec![pair(
            "arg9_arg7",
            "arg9",
            "arg7",
            Target::First,
            vec![unit("32", Target::Second, Some("o5_2"), &[("o5_2", 0.2)])],
        )],
    );
    let outcome = ContradictionFilter::default()
        .evaluate(&data, &ExclusionLedger::new())
        .unwrap();
    assert_eq!(outcome.report.examined, 2);
    let losers: Vec<&str> = outcome
        .exclusions
        .iter()
        .map(|e| data.unit(&e.unit).unwrap().id.as_str())
        .collect();
    assert_eq!(losers, vec!["32"]);
}

#[test]
fn equal_weights_exclude_the_lower_unit_id() {
    let mut data = Corpus::new();
    data.insert(
        "gmo_yes",
        vec![pair(
            "arg1_arg2",
            "arg1",
            "arg2",
            Target::Second,
            vec![
                unit("40", Target::First, Some("o6_2"), &[("o6_2", 0.5)]),
                unit("39", Target::First, Some("o8_1"), &[("o8_1", 0.5)]),
            ],
        )],
    );
    let outcome = ContradictionFilter::default()
        .evaluate(&data, &ExclusionLedger::new())
        .unwrap();
    assert_eq!(outcome.exclusions.len(), 1);
    assert_eq!(outcome.exclusions[0].unit, at(0, 1));
}

#[test]
fn injected_table_replaces_the_default() {
    let mut data = Corpus::new();
    data.insert(
        "gmo_yes",
        vec![pair(
            "arg1_arg2",
            "arg1",
            "arg2",
            Target::Second,
            vec![
                unit("50", Target::First, Some("o6_1"), &[("o6_1", 0.9)]),
                unit("51", Target::First, Some("o8_6"), &[("o8_6", 0.1)]),
                unit("52", Target::First, Some("o5_3"), &[("o5_3", 0.1)]),
            ],
        )],
    );
    let table = ContradictionTable::empty().with_pair("o5_3", "o6_1");
    let outcome = ContradictionFilter::new(table, 10.0)
        .evaluate(&data, &ExclusionLedger::new())
        .unwrap();
    let keys: Vec<&String> = outcome.report.contradictions.keys().collect();
    assert_eq!(keys, vec!["[o5_3, o6_1]"]);
    assert_eq!(outcome.exclusions.len(), 1);
    assert_eq!(outcome.exclusions[0].unit, at(0, 2));
}

#[test]
fn contradiction_lookup_is_symmetric() {
    let table = ContradictionTable::default();
    let mut labels: Vec<String> = terminal_labels().into_iter().collect();
    labels.push("o8_2".to_string());
    let mut found = 0;
    for a in &labels {
        for b in &labels {
            assert_eq!(table.contradicts(a, b), table.contradicts(b, a), "{a} {b}");
            assert_eq!(table.contradiction(a, b), table.contradiction(b, a));
            if table.contradicts(a, b) {
                found += 1;
            }
        }
    }
    // Every unordered pair is seen twice.
    assert_eq!(found, 2 * table.len());
}
