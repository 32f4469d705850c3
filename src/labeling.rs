//! Attaching estimated gold labels and annotator judgements onto reasoning units.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::info;

use crate::annotation::{AnnotationMatrix, RawAssignment};
use crate::consensus::ConsensusResult;
use crate::corpus::Corpus;
use crate::error::GoldError;
use crate::labels;

/// Source of gold labels and annotator judgements, keyed by unit (item) id.
pub trait GoldLabelProvider: Send + Sync {
    fn gold_label(&self, item_id: u32) -> Option<String>;

    fn assignments(&self, item_id: u32) -> Vec<RawAssignment>;
}

// =============================================================================
// Estimated labels
// =============================================================================

/// Gold labels from one consensus run, with competences copied onto the matrix.
#[derive(Debug, Clone)]
pub struct EstimatedGoldLabels {
    matrix: AnnotationMatrix,
    result: ConsensusResult,
}

impl EstimatedGoldLabels {
    pub fn new(mut matrix: AnnotationMatrix, result: ConsensusResult) -> Result<Self, GoldError> {
        matrix.apply_competences(result.competences())?;
        Ok(Self { matrix, result })
    }

    pub fn matrix(&self) -> &AnnotationMatrix {
        &self.matrix
    }

    pub fn result(&self) -> &ConsensusResult {
        &self.result
    }
}

impl GoldLabelProvider for EstimatedGoldLabels {
    fn gold_label(&self, item_id: u32) -> Option<String> {
        self.result.gold_label(item_id).map(str::to_string)
    }

    fn assignments(&self, item_id: u32) -> Vec<RawAssignment> {
        self.matrix.assignments_for(item_id)
    }
}

// =============================================================================
// Mock labels
// =============================================================================

/// Random labels for dry runs of the downstream stages.
///
/// Each item draws from its own RNG seeded with `seed ^ item_id`, so answers do
/// not depend on query order.
#[derive(Debug, Clone)]
pub struct MockGoldLabelProvider {
    seed: u64,
    options: Vec<String>,
}

const MOCK_ASSIGNMENTS: usize = 5;
/// 1940-01-01T00:00:00Z, lower bound of the random timestamps.
const MOCK_EPOCH_SECONDS: i64 = -946_771_200;
const MOCK_SPAN_SECONDS: i64 = 70 * 365 * 24 * 60 * 60;

impl MockGoldLabelProvider {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            options: labels::terminal_labels().into_iter().collect(),
        }
    }

    fn rng(&self, item_id: u32, salt: u64) -> StdRng {
        StdRng::seed_from_u64(self.seed ^ u64::from(item_id) ^ (salt << 32))
    }

    fn pick_label(&self, rng: &mut StdRng) -> String {
        self.options[rng.gen_range(0..self.options.len())].clone()
    }
}

fn random_id(rng: &mut StdRng, prefix: char, len: usize) -> String {
    std::iter::once(prefix)
        .chain(rng.sample_iter(&Alphanumeric).take(len).map(char::from))
        .collect()
}

fn random_time(rng: &mut StdRng) -> DateTime<FixedOffset> {
    let secs = MOCK_EPOCH_SECONDS + rng.gen_range(0..MOCK_SPAN_SECONDS);
    DateTime::from_timestamp(secs, 0)
        .unwrap_or_default()
        .fixed_offset()
}

impl GoldLabelProvider for MockGoldLabelProvider {
    fn gold_label(&self, item_id: u32) -> Option<String> {
        let mut rng = self.rng(item_id, 1);
        if rng.gen_bool(0.5) {
            Some(self.pick_label(&mut rng))
        } else {
            None
        }
    }

    fn assignments(&self, item_id: u32) -> Vec<RawAssignment> {
        let mut rng = self.rng(item_id, 2);
        (0..MOCK_ASSIGNMENTS)
            .map(|_| {
                let a = random_time(&mut rng);
                let b = random_time(&mut rng);
                RawAssignment {
                    worker_id: random_id(&mut rng, 'R', 13),
                    item_id,
                    hit_id: random_id(&mut rng, 'H', 29),
                    assignment_id: random_id(&mut rng, 'A', 29),
                    accept_time: a.min(b),
                    submit_time: a.max(b),
                    label: self.pick_label(&mut rng),
                    competence: Some(rng.gen_range(0.0..1.0)),
                    rejected: false,
                }
            })
            .collect()
    }
}

// =============================================================================
// Attachment
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttachmentReport {
    /// Units that received a gold label in the first pass.
    pub labelled: usize,
    /// Labelled units including duplicates resolved in the second pass.
    pub labelled_with_duplicates: usize,
    /// Units the provider was asked about.
    pub queried: usize,
}

/// Sets gold labels and appends annotator judgements on every unit.
///
/// Units that are neither ignored nor duplicates are looked up by their
/// integer id. Duplicates then copy the label and judgements of the unit with
/// the same annotation text. Ignored units are left untouched.
pub fn attach_gold_labels(
    corpus: &mut Corpus,
    provider: &dyn GoldLabelProvider,
) -> Result<AttachmentReport, GoldError> {
    let mut report = AttachmentReport::default();
    let mut by_text: BTreeMap<String, (Option<String>, Vec<RawAssignment>)> = BTreeMap::new();

    for unit in corpus.units_mut() {
        if unit.ignored || unit.duplicate {
            continue;
        }
        let item_id: u32 = unit
            .id
            .trim()
            .parse()
            .map_err(|_| GoldError::malformed("reasoning unit id", unit.id.clone()))?;

        let gold = provider.gold_label(item_id);
        let assignments = provider.assignments(item_id);
        report.queried += 1;
        if gold.is_some() {
            report.labelled += 1;
        }

        unit.estimated_gold_label = gold.clone();
        unit.assignments.extend(assignments.iter().cloned());
        by_text.insert(unit.annotation_text().to_string(), (gold, assignments));
    }

    report.labelled_with_duplicates = report.labelled;
    for unit in corpus.units_mut() {
        if unit.ignored || !unit.duplicate {
            continue;
        }
        match by_text.get(unit.annotation_text()) {
            Some((gold, assignments)) => {
                unit.estimated_gold_label = gold.clone();
                unit.assignments.extend(assignments.iter().cloned());
                if gold.is_some() {
                    report.labelled_with_duplicates += 1;
                }
            }
            None => unit.estimated_gold_label = None,
        }
    }

    info!(
        labelled = report.labelled,
        with_duplicates = report.labelled_with_duplicates,
        "Attached gold labels"
    );
    Ok(report)
}
