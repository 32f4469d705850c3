//! Gold-label cleaning: three filters that exclude unusable or inconsistent units.
//!
//! Stages never touch the corpus. Each one reads the corpus plus the current
//! [`ExclusionLedger`] and returns the exclusions it wants to add; the
//! pipeline folds them into the ledger in stage order. The ledger only grows,
//! so a unit excluded by one stage stays excluded for every later stage.
//! [`apply`] writes the final ledger back as `excluded` flags.

pub mod contradiction;
pub mod explanation;
pub mod polarity;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::corpus::{Corpus, UnitRef};
use crate::error::GoldError;
use crate::labels::{ContradictionTable, PolarityRule, DEFAULT_POSITIVE_PREFIXES};
use crate::scoring::CONTRADICTION_LAMBDA;

pub use contradiction::ContradictionFilter;
pub use explanation::ExplanationTypeFilter;
pub use polarity::PolarityFilter;

/// Labels that mark "not an explanation" and "topic-specific detail".
pub const DEFAULT_UNUSABLE_LABELS: &[&str] = &["o1_2", "o8_6"];

/// Label reserved for "more details, examples" on the more convincing side.
pub const DEFAULT_RESERVED_POSITIVE_LABEL: &str = "o8_1";

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    pub unusable_labels: BTreeSet<String>,
    pub positive_prefixes: Vec<String>,
    /// Disagreement penalty for the confidence score in contradiction resolution.
    pub contradiction_lambda: f64,
    /// Label that must never land on the less convincing side of a learning record.
    pub reserved_positive_label: String,
    /// Replaces the built-in contradiction table when set.
    pub contradictions: Option<ContradictionTable>,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            unusable_labels: DEFAULT_UNUSABLE_LABELS
                .iter()
                .map(|l| l.to_string())
                .collect(),
            positive_prefixes: DEFAULT_POSITIVE_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            contradiction_lambda: CONTRADICTION_LAMBDA,
            reserved_positive_label: DEFAULT_RESERVED_POSITIVE_LABEL.to_string(),
            contradictions: None,
        }
    }
}

impl CleaningConfig {
    pub fn polarity(&self) -> PolarityRule {
        PolarityRule {
            positive_prefixes: self.positive_prefixes.clone(),
        }
    }

    pub fn contradiction_table(&self) -> ContradictionTable {
        self.contradictions.clone().unwrap_or_default()
    }
}

// =============================================================================
// Ledger
// =============================================================================

/// Why a unit was excluded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ExclusionReason {
    /// Already flagged in the input corpus.
    PreExcluded,
    UnusableLabel {
        label: String,
    },
    WrongPolarity {
        label: String,
        /// Whether the unit targets the more convincing argument.
        on_more_convincing: bool,
    },
    Contradiction {
        key: String,
        /// Unit it lost against (first such comparison).
        against: UnitRef,
        product: f64,
        opponent_product: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exclusion {
    pub unit: UnitRef,
    pub stage: String,
    #[serde(flatten)]
    pub reason: ExclusionReason,
}

/// Monotone record of excluded units. Entries are never removed or replaced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExclusionLedger {
    entries: BTreeMap<UnitRef, Exclusion>,
}

impl ExclusionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger holding every unit already flagged `excluded` in `corpus`.
    pub fn from_corpus(corpus: &Corpus) -> Self {
        let mut ledger = Self::new();
        for entry in corpus.units().filter(|e| e.unit.excluded) {
            ledger.record(Exclusion {
                unit: entry.unit_ref(),
                stage: "input".to_string(),
                reason: ExclusionReason::PreExcluded,
            });
        }
        ledger
    }

    /// Adds an exclusion. Returns `false` if the unit was already excluded, in
    /// which case the earlier entry is kept.
    pub fn record(&mut self, exclusion: Exclusion) -> bool {
        if self.entries.contains_key(&exclusion.unit) {
            return false;
        }
        self.entries.insert(exclusion.unit.clone(), exclusion);
        true
    }

    pub fn is_excluded(&self, unit: &UnitRef) -> bool {
        self.entries.contains_key(unit)
    }

    pub fn get(&self, unit: &UnitRef) -> Option<&Exclusion> {
        self.entries.get(unit)
    }

    pub fn units(&self) -> BTreeSet<UnitRef> {
        self.entries.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Exclusion> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Stages
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: String,
    /// Units the stage looked at (labelled units; for later stages, not yet excluded).
    pub examined: usize,
    /// Units newly excluded by the stage.
    pub excluded: usize,
    /// Contradiction key -> number of contradicting unit pairs.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub contradictions: BTreeMap<String, usize>,
}

/// Exclusions proposed by one stage plus its counters.
#[derive(Debug, Clone, Default)]
pub struct StageOutcome {
    pub exclusions: Vec<Exclusion>,
    pub report: StageReport,
}

pub trait CleaningStage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Proposes exclusions. Must not depend on anything but its inputs.
    fn evaluate(&self, corpus: &Corpus, ledger: &ExclusionLedger)
        -> Result<StageOutcome, GoldError>;
}

/// Result of a full pipeline run.
#[derive(Debug, Clone, Default)]
pub struct CleaningOutcome {
    pub ledger: ExclusionLedger,
    pub reports: Vec<StageReport>,
}

pub struct CleaningPipeline {
    stages: Vec<Box<dyn CleaningStage>>,
}

impl CleaningPipeline {
    pub fn new(stages: Vec<Box<dyn CleaningStage>>) -> Self {
        Self { stages }
    }

    /// Explanation type, then polarity, then pairwise contradictions.
    pub fn standard(config: &CleaningConfig) -> Self {
        Self::new(vec![
            Box::new(ExplanationTypeFilter::new(config.unusable_labels.clone())),
            Box::new(PolarityFilter::new(config.polarity())),
            Box::new(ContradictionFilter::new(
                config.contradiction_table(),
                config.contradiction_lambda,
            )),
        ])
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Runs every stage in order, starting from the corpus's existing flags.
    pub fn run(&self, corpus: &Corpus) -> Result<CleaningOutcome, GoldError> {
        let mut ledger = ExclusionLedger::from_corpus(corpus);
        let mut reports = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            let outcome = stage.evaluate(corpus, &ledger)?;
            let mut report = outcome.report;
            report.excluded = outcome
                .exclusions
                .into_iter()
                .filter(|e| ledger.record(e.clone()))
                .count();
            info!(
                stage = stage.name(),
                excluded = report.excluded,
                examined = report.examined,
                "Filtered {} labels out of {}",
                report.excluded,
                report.examined
            );
            reports.push(report);
        }
        Ok(CleaningOutcome { ledger, reports })
    }
}

/// Copy of `corpus` with every ledger entry flagged `excluded`.
pub fn apply(corpus: &Corpus, ledger: &ExclusionLedger) -> Result<Corpus, GoldError> {
    let mut cleaned = corpus.clone();
    for exclusion in ledger.iter() {
        let unit = cleaned.unit_mut(&exclusion.unit).ok_or_else(|| {
            GoldError::invalid_state(format!(
                "exclusion refers to unit {} which is not in the corpus",
                exclusion.unit
            ))
        })?;
        unit.excluded = true;
    }
    Ok(cleaned)
}
