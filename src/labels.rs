//! Label vocabulary for reasoning-unit annotation.
//!
//! Workers walk a small question tree (q1 "is this an explanation?" down to the
//! aspect questions q5..q9). Only options that end the walk are labels; options
//! that route to another question never reach the estimator.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

// =============================================================================
// Question tree
// =============================================================================

/// One selectable answer in the annotation question tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionOption {
    pub id: &'static str,
    pub question_id: &'static str,
    pub answer: &'static str,
    /// Question this option routes to; `None` marks a terminal option (a label).
    pub next_question: Option<&'static str>,
}

const fn option(
    id: &'static str,
    question_id: &'static str,
    answer: &'static str,
    next_question: Option<&'static str>,
) -> QuestionOption {
    QuestionOption {
        id,
        question_id,
        answer,
        next_question,
    }
}

pub const OPTIONS: &[QuestionOption] = &[
    option("o1_1", "q1", "Yes, it explains why the argument is more/less convincing", Some("q2")),
    option("o1_2", "q1", "No, it is not an explanation", None),
    option("o2_1", "q2", "Yes, it addresses positive properties", Some("q4")),
    option("o2_2", "q2", "No, it addresses negative properties", Some("q3")),
    option("o3_1", "q3", "Related to language / presentation", Some("q5")),
    option("o3_2", "q3", "Related to the content", Some("q6")),
    option("o3_3", "q3", "A general remark", Some("q7")),
    option("o4_1", "q4", "Related to the content", Some("q8")),
    option("o4_2", "q4", "A general remark", Some("q9")),
    option("o5_1", "q5", "Attacking opponent / abusive", None),
    option("o5_2", "q5", "Language issues / bad grammar / humor, jokes, sarcasm", None),
    option("o5_3", "q5", "Unclear, hard to follow", None),
    option("o6_1", "q6", "No facts / not enough support / no credible evidence", None),
    option("o6_2", "q6", "No reasoning / insufficient reasoning", None),
    option("o6_3", "q6", "Irrelevant reasons / irrelevant information", None),
    option("o7_1", "q7", "Not an argument / only opinion / rant", None),
    option("o7_2", "q7", "Non-sense / no logical sense / confusing", None),
    option("o7_3", "q7", "Off topic / doesn't address the issue", None),
    option("o7_4", "q7", "Generally weak / vague", None),
    option("o8_1", "q8", "More details, facts, examples, reasons / goes deeper", None),
    option("o8_4", "q8", "Balanced, objective, discusses several viewpoints", None),
    option("o8_5", "q8", "Better credibility / reliability / confidence", None),
    option("o8_6", "q8", "Highly topic-specific, addresses the content in detail", None),
    option("o9_1", "q9", "Clear, crisp, to the point / well written", None),
    option("o9_2", "q9", "Sticks to the topic", None),
    option("o9_3", "q9", "Provoking question / makes you think", None),
    option("o9_4", "q9", "Well thought of / smart remarks / higher complexity", None),
];

pub fn all_options() -> &'static [QuestionOption] {
    OPTIONS
}

pub fn option_by_id(id: &str) -> Option<&'static QuestionOption> {
    OPTIONS.iter().find(|o| o.id == id)
}

/// Terminal options in lexicographic order. This is the label vocabulary.
pub fn terminal_labels() -> BTreeSet<String> {
    OPTIONS
        .iter()
        .filter(|o| o.next_question.is_none())
        .map(|o| o.id.to_string())
        .collect()
}

pub fn is_terminal(label: &str) -> bool {
    option_by_id(label).is_some_and(|o| o.next_question.is_none())
}

pub fn describe(label: &str) -> Option<&'static str> {
    option_by_id(label).map(|o| o.answer)
}

// =============================================================================
// Polarity
// =============================================================================

pub const DEFAULT_POSITIVE_PREFIXES: &[&str] = &["o8", "o9"];

/// Labels under the positive-aspect questions describe positive properties;
/// everything else is negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolarityRule {
    pub positive_prefixes: Vec<String>,
}

impl Default for PolarityRule {
    fn default() -> Self {
        Self {
            positive_prefixes: DEFAULT_POSITIVE_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl PolarityRule {
    pub fn is_positive(&self, label: &str) -> bool {
        self.positive_prefixes
            .iter()
            .any(|prefix| label.starts_with(prefix.as_str()))
    }
}

// =============================================================================
// Contradictions
// =============================================================================

/// Static map from a label to the labels it contradicts.
///
/// Keys are always the lexicographically smaller label of a pair; lookups sort
/// the two labels first, so `contradiction(a, b) == contradiction(b, a)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, BTreeSet<String>>",
    into = "BTreeMap<String, BTreeSet<String>>"
)]
pub struct ContradictionTable {
    entries: BTreeMap<String, BTreeSet<String>>,
}

/// Entries read from configuration may list a pair under either label.
impl From<BTreeMap<String, BTreeSet<String>>> for ContradictionTable {
    fn from(raw: BTreeMap<String, BTreeSet<String>>) -> Self {
        let mut table = Self::empty();
        for (label, others) in &raw {
            for other in others {
                table.insert(label, other);
            }
        }
        table
    }
}

impl From<ContradictionTable> for BTreeMap<String, BTreeSet<String>> {
    fn from(table: ContradictionTable) -> Self {
        table.entries
    }
}

const DEFAULT_CONTRADICTIONS: &[(&str, &[&str])] = &[
    ("o5_1", &["o8_4"]),
    ("o5_2", &["o9_1"]),
    ("o5_3", &["o9_1"]),
    ("o6_1", &["o8_6"]),
    ("o6_2", &["o8_1"]),
    ("o6_3", &["o8_5", "o8_6"]),
    ("o7_1", &["o8_4", "o8_5", "o8_6", "o9_1", "o9_4"]),
    ("o7_2", &["o8_2", "o8_6", "o9_4"]),
    (
        "o7_3",
        &["o8_1", "o8_4", "o8_5", "o8_6", "o9_1", "o9_2", "o9_4"],
    ),
    ("o7_4", &["o8_6", "o9_1", "o9_3", "o9_4"]),
];

impl Default for ContradictionTable {
    fn default() -> Self {
        let mut table = Self::empty();
        for (label, others) in DEFAULT_CONTRADICTIONS {
            for other in *others {
                table.insert(label, other);
            }
        }
        table
    }
}

impl ContradictionTable {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Declare `a` and `b` contradictory. Order of the arguments does not matter.
    pub fn insert(&mut self, a: &str, b: &str) {
        let (low, high) = sorted_pair(a, b);
        self.entries
            .entry(low.to_string())
            .or_default()
            .insert(high.to_string());
    }

    pub fn with_pair(mut self, a: &str, b: &str) -> Self {
        self.insert(a, b);
        self
    }

    pub fn contradicts(&self, a: &str, b: &str) -> bool {
        self.contradiction(a, b).is_some()
    }

    /// Returns the contradiction key (`"[low, high]"`) when the labels contradict.
    pub fn contradiction(&self, a: &str, b: &str) -> Option<String> {
        let (low, high) = sorted_pair(a, b);
        self.entries
            .get(low)
            .filter(|set| set.contains(high))
            .map(|_| format!("[{low}, {high}]"))
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn sorted_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

// =============================================================================
// TESTS
// =============================================================================
