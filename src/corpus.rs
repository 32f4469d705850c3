//! Argument pairs, worker explanations and the reasoning units cut from them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::annotation::RawAssignment;

// =============================================================================
// Arguments and pairs
// =============================================================================

/// Which argument of a pair a unit talks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Target {
    #[serde(rename = "a1", alias = "first")]
    First,
    #[serde(rename = "a2", alias = "second")]
    Second,
}

impl Target {
    pub fn other(self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => f.write_str("a1"),
            Self::Second => f.write_str("a2"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub id: String,
    pub text: String,
}

/// Two arguments with the same topic and stance, plus the crowd's explanations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentPair {
    pub id: String,
    pub arg1: Argument,
    pub arg2: Argument,
    /// Externally provided verdict: the more convincing argument.
    pub gold_verdict: Target,
    #[serde(default)]
    pub assignments: Vec<WorkerAssignment>,
}

impl ArgumentPair {
    pub fn argument(&self, target: Target) -> &Argument {
        match target {
            Target::First => &self.arg1,
            Target::Second => &self.arg2,
        }
    }

    pub fn more_convincing(&self) -> &Argument {
        self.argument(self.gold_verdict)
    }

    pub fn less_convincing(&self) -> &Argument {
        self.argument(self.gold_verdict.other())
    }

    pub fn units(&self) -> impl Iterator<Item = &ReasoningUnit> {
        self.assignments.iter().flat_map(|a| a.reasoning_units.iter())
    }
}

/// A worker's original judgement of a pair with its free-text justification.
/// Always carries its (possibly empty) list of reasoning units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerAssignment {
    pub worker_id: String,
    #[serde(default)]
    pub hit_id: String,
    #[serde(default)]
    pub assignment_id: String,
    /// Argument the worker picked as more convincing.
    #[serde(default)]
    pub value: Option<Target>,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub competence: Option<f64>,
    #[serde(default)]
    pub reasoning_units: Vec<ReasoningUnit>,
}

// =============================================================================
// Reasoning units
// =============================================================================

/// A short fragment of a justification stating one property of one argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningUnit {
    /// Numeric id assigned after segmentation; matches the annotation item id.
    #[serde(default)]
    pub id: String,
    pub text: String,
    /// Text shown to annotators (argument references normalised).
    #[serde(default)]
    pub text_for_annotation: Option<String>,
    pub target: Target,
    #[serde(default)]
    pub estimated_gold_label: Option<String>,
    #[serde(default)]
    pub assignments: Vec<RawAssignment>,
    /// Set by the cleaning stages; excluded units are kept for audit only.
    #[serde(default)]
    pub excluded: bool,
    /// Too short or otherwise never sent for annotation.
    #[serde(default)]
    pub ignored: bool,
    /// Same annotation text was already seen on another unit.
    #[serde(default)]
    pub duplicate: bool,
}

impl ReasoningUnit {
    pub fn new(id: impl Into<String>, text: impl Into<String>, target: Target) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            text_for_annotation: None,
            target,
            estimated_gold_label: None,
            assignments: Vec::new(),
            excluded: false,
            ignored: false,
            duplicate: false,
        }
    }

    pub fn with_gold_label(mut self, label: impl Into<String>) -> Self {
        self.estimated_gold_label = Some(label.into());
        self
    }

    pub fn with_assignments(mut self, assignments: Vec<RawAssignment>) -> Self {
        self.assignments = assignments;
        self
    }

    /// Annotation text, falling back to the raw text.
    pub fn annotation_text(&self) -> &str {
        self.text_for_annotation.as_deref().unwrap_or(&self.text)
    }

    /// Id of the argument this unit targets within `pair`.
    pub fn target_argument_id<'a>(&self, pair: &'a ArgumentPair) -> &'a str {
        &pair.argument(self.target).id
    }
}

// =============================================================================
// Corpus
// =============================================================================

/// Position of a unit inside a [`Corpus`]. Orders units in corpus order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitRef {
    pub file: String,
    pub pair: usize,
    pub assignment: usize,
    pub unit: usize,
}

impl fmt::Display for UnitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{}/{}/{}",
            self.file, self.pair, self.assignment, self.unit
        )
    }
}

/// A unit together with its position and its pair.
#[derive(Debug, Clone, Copy)]
pub struct UnitEntry<'a> {
    pub at: &'a str,
    pub pair_index: usize,
    pub assignment_index: usize,
    pub unit_index: usize,
    pub pair: &'a ArgumentPair,
    pub unit: &'a ReasoningUnit,
}

impl UnitEntry<'_> {
    pub fn unit_ref(&self) -> UnitRef {
        UnitRef {
            file: self.at.to_string(),
            pair: self.pair_index,
            assignment: self.assignment_index,
            unit: self.unit_index,
        }
    }
}

/// Argument pairs grouped by source file (one file per debate topic and stance).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Corpus {
    pub files: BTreeMap<String, Vec<ArgumentPair>>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file: impl Into<String>, pairs: Vec<ArgumentPair>) {
        self.files.insert(file.into(), pairs);
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, &ArgumentPair)> {
        self.files
            .iter()
            .flat_map(|(file, pairs)| pairs.iter().map(move |p| (file.as_str(), p)))
    }

    pub fn pair_count(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }

    /// Every unit in corpus order (file, pair, assignment, unit).
    pub fn units(&self) -> impl Iterator<Item = UnitEntry<'_>> {
        self.files.iter().flat_map(|(file, pairs)| {
            pairs.iter().enumerate().flat_map(move |(pair_index, pair)| {
                pair.assignments
                    .iter()
                    .enumerate()
                    .flat_map(move |(assignment_index, assignment)| {
                        assignment.reasoning_units.iter().enumerate().map(
                            move |(unit_index, unit)| UnitEntry {
                                at: file.as_str(),
                                pair_index,
                                assignment_index,
                                unit_index,
                                pair,
                                unit,
                            },
                        )
                    })
            })
        })
    }

    pub fn unit(&self, at: &UnitRef) -> Option<&ReasoningUnit> {
        self.files
            .get(&at.file)?
            .get(at.pair)?
            .assignments
            .get(at.assignment)?
            .reasoning_units
            .get(at.unit)
    }

    pub fn unit_mut(&mut self, at: &UnitRef) -> Option<&mut ReasoningUnit> {
        self.files
            .get_mut(&at.file)?
            .get_mut(at.pair)?
            .assignments
            .get_mut(at.assignment)?
            .reasoning_units
            .get_mut(at.unit)
    }

    pub fn units_mut(&mut self) -> impl Iterator<Item = &mut ReasoningUnit> {
        self.files.values_mut().flat_map(|pairs| {
            pairs.iter_mut().flat_map(|pair| {
                pair.assignments
                    .iter_mut()
                    .flat_map(|a| a.reasoning_units.iter_mut())
            })
        })
    }
}
