//! Unit confidence: how much the annotators' competence backs a unit's gold label.
//!
//! `score = sigmoid(sum_gold - lambda * sum_opposite)` where `sum_gold` is the
//! summed competence of annotators who agree with the gold label and
//! `sum_opposite` that of those who do not.

use statrs::function::logistic::logistic;

use crate::annotation::RawAssignment;
use crate::corpus::ReasoningUnit;
use crate::error::GoldError;

/// Disagreement penalty used when resolving contradictions.
pub const CONTRADICTION_LAMBDA: f64 = 10.0;

/// Keeps scores strictly inside (0, 1) even where `exp` saturates.
const SCORE_EDGE: f64 = 1e-12;

/// Logistic function, clamped to the open unit interval.
pub fn sigmoid(x: f64) -> f64 {
    logistic(x).clamp(SCORE_EDGE, 1.0 - SCORE_EDGE)
}

/// Competence mass agreeing and disagreeing with `gold`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CompetenceSplit {
    pub sum_gold: f64,
    pub sum_opposite: f64,
}

impl CompetenceSplit {
    pub fn raw(&self, lambda: f64) -> f64 {
        self.sum_gold - lambda * self.sum_opposite
    }
}

pub fn competence_split(
    unit_id: &str,
    gold: &str,
    assignments: &[RawAssignment],
) -> Result<CompetenceSplit, GoldError> {
    let mut split = CompetenceSplit::default();
    for assignment in assignments {
        let competence = require_competence(unit_id, assignment)?;
        if assignment.label == gold {
            split.sum_gold += competence;
        } else {
            split.sum_opposite += competence;
        }
    }
    Ok(split)
}

/// Confidence of `unit`'s gold label, strictly in (0, 1).
///
/// Fails with `InvalidState` when the unit has no gold label, no annotator
/// assignments, or an assignment without competence.
pub fn score_unit(unit: &ReasoningUnit, lambda: f64) -> Result<f64, GoldError> {
    let gold = unit.estimated_gold_label.as_deref().ok_or_else(|| {
        GoldError::invalid_state(format!("unit {} has no estimated gold label", unit.id))
    })?;
    if unit.assignments.is_empty() {
        return Err(GoldError::invalid_state(format!(
            "unit {} has no annotator assignments",
            unit.id
        )));
    }
    let split = competence_split(&unit.id, gold, &unit.assignments)?;
    Ok(sigmoid(split.raw(lambda)))
}

/// Mean competence of the unit's own annotators, regardless of agreement.
pub fn average_competence(unit: &ReasoningUnit) -> Result<f64, GoldError> {
    if unit.assignments.is_empty() {
        return Err(GoldError::invalid_state(format!(
            "unit {} has no annotator assignments",
            unit.id
        )));
    }
    let mut total = 0.0;
    for assignment in &unit.assignments {
        total += require_competence(&unit.id, assignment)?;
    }
    Ok(total / unit.assignments.len() as f64)
}

fn require_competence(unit_id: &str, assignment: &RawAssignment) -> Result<f64, GoldError> {
    assignment.competence.ok_or_else(|| {
        GoldError::invalid_state(format!(
            "assignment {} of worker {} on unit {unit_id} has no competence",
            assignment.assignment_id, assignment.worker_id
        ))
    })
}
