use std::collections::BTreeMap;

use chrono::DateTime;
use gold_harness::annotation::RawAssignment;
use gold_harness::corpus::{Argument, ArgumentPair, Corpus, ReasoningUnit, Target, WorkerAssignment};
use gold_harness::labeling::{attach_gold_labels, GoldLabelProvider, MockGoldLabelProvider};
use gold_harness::store::{load_corpus, save_corpus};
use tempfile::tempdir;

/// Fixed labels; one judgement per item.
struct Fixed {
    labels: BTreeMap<u32, &'static str>,
}

impl GoldLabelProvider for Fixed {
    fn gold_label(&self, item_id: u32) -> Option<String> {
        self.labels.get(&item_id).map(|l| l.to_string())
    }

    fn assignments(&self, item_id: u32) -> Vec<RawAssignment> {
        let at = DateTime::parse_from_rfc3339("2016-04-19T10:00:00Z").unwrap();
        vec![RawAssignment {
            worker_id: "W1".to_string(),
            item_id,
            hit_id: "H1".to_string(),
            assignment_id: format!("A{item_id}"),
            accept_time: at,
            submit_time: at,
            label: self.labels.get(&item_id).copied().unwrap_or("o5_1").to_string(),
            competence: Some(0.7),
            rejected: false,
        }]
    }
}

fn unit(id: &str, text: &str) -> ReasoningUnit {
    let mut unit = ReasoningUnit::new(id, text, Target::First);
    unit.text_for_annotation = Some(text.to_lowercase());
    unit
}

fn corpus(units: Vec<ReasoningUnit>) -> Corpus {
    let pair = ArgumentPair {
        id: "a1_a2".to_string(),
        arg1: Argument {
            id: "a1".to_string(),
            text: "one".to_string(),
        },
        arg2: Argument {
            id: "a2".to_string(),
            text: "two".to_string(),
        },
        gold_verdict: Target::First,
        assignments: vec![WorkerAssignment {
            worker_id: "W0".to_string(),
            hit_id: String::new(),
            assignment_id: String::new(),
            value: None,
            reason: String::new(),
            competence: None,
            reasoning_units: units,
        }],
    };
    let mut corpus = Corpus::new();
    corpus.insert("topic_yes", vec![pair]);
    corpus
}

#[test]
fn duplicates_inherit_the_label_of_their_first_occurrence() {
    let mut ignored = unit("ignored", "Too short");
    ignored.ignored = true;
    let mut duplicate = unit("", "It Has Examples");
    duplicate.duplicate = true;

    let mut data = corpus(vec![
        unit("10", "It has examples"),
        unit("11", "Off topic"),
        duplicate,
        ignored,
    ]);
    let provider = Fixed {
        labels: [(10, "o8_1")].into_iter().collect(),
    };
    let report = attach_gold_labels(&mut data, &provider).unwrap();
    assert_eq!(report.queried, 2);
    assert_eq!(report.labelled, 1);
    assert_eq!(report.labelled_with_duplicates, 2);

    let units: Vec<&ReasoningUnit> = data.units().map(|e| e.unit).collect();
    assert_eq!(units[0].estimated_gold_label.as_deref(), Some("o8_1"));
    assert_eq!(units[1].estimated_gold_label, None);
    assert_eq!(units[1].assignments.len(), 1);
    assert_eq!(units[2].estimated_gold_label.as_deref(), Some("o8_1"));
    assert_eq!(units[2].assignments, units[0].assignments);
    assert_eq!(units[3].estimated_gold_label, None);
    assert!(units[3].assignments.is_empty());
}

#[test]
fn non_numeric_unit_id_is_malformed() {
    let mut data = corpus(vec![unit("u-1", "text")]);
    let provider = Fixed {
        labels: BTreeMap::new(),
    };
    let err = attach_gold_labels(&mut data, &provider).unwrap_err();
    assert_eq!(err.code(), "malformed");
}

#[test]
fn mock_labels_survive_a_store_round_trip() {
    let mut data = corpus((1..=20).map(|i| unit(&i.to_string(), &format!("unit {i}"))).collect());
    let report = attach_gold_labels(&mut data, &MockGoldLabelProvider::new(1234)).unwrap();
    assert_eq!(report.queried, 20);
    assert!(data.units().all(|e| e.unit.assignments.len() == 5));

    let dir = tempdir().unwrap();
    save_corpus(&data, dir.path()).unwrap();
    assert!(dir.path().join("topic_yes.json").exists());
    let summary = |c: &Corpus| -> Vec<(String, Option<String>, usize)> {
        c.units()
            .map(|e| {
                (
                    e.unit.id.clone(),
                    e.unit.estimated_gold_label.clone(),
                    e.unit.assignments.len(),
                )
            })
            .collect()
    };
    assert_eq!(summary(&load_corpus(dir.path()).unwrap()), summary(&data));
}
