//! In-process estimator: plurality vote with agreement-rate competences.
//!
//! Much weaker than a proper item-response model, but it honours the same
//! input/output contract, needs no external binary and is fully deterministic.

use std::collections::BTreeMap;

use super::{ConsensusEstimator, EstimatorInput, EstimatorOutput, EstimatorParams};
use crate::error::GoldError;

#[derive(Debug, Clone, Copy, Default)]
pub struct MajorityVoteEstimator;

impl MajorityVoteEstimator {
    pub fn new() -> Self {
        Self
    }
}

/// Most frequent label of a row and its share of the row's votes.
/// Ties go to the lexicographically smaller label.
fn plurality(row: &[Option<String>]) -> Option<(&str, f64)> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for label in row.iter().flatten() {
        *counts.entry(label.as_str()).or_default() += 1;
    }
    let total: usize = counts.values().sum();
    let mut best: Option<(&str, usize)> = None;
    for (label, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((label, count));
        }
    }
    best.map(|(label, count)| (label, count as f64 / total as f64))
}

fn read_controls(params: &EstimatorParams, n_items: usize) -> Result<Vec<Option<String>>, GoldError> {
    let Some(path) = &params.controls else {
        return Ok(vec![None; n_items]);
    };
    let raw = std::fs::read_to_string(path)?;
    let lines: Vec<Option<String>> = raw
        .lines()
        .map(|l| Some(l.trim().to_string()).filter(|l| !l.is_empty()))
        .collect();
    if lines.len() != n_items {
        return Err(GoldError::inconsistency(format!(
            "controls file {} has {} lines, expected {n_items}",
            path.display(),
            lines.len()
        )));
    }
    Ok(lines)
}

impl ConsensusEstimator for MajorityVoteEstimator {
    fn name(&self) -> &str {
        "majority"
    }

    fn run(
        &self,
        input: &EstimatorInput,
        params: &EstimatorParams,
    ) -> Result<EstimatorOutput, GoldError> {
        let controls = read_controls(params, input.n_items())?;

        let mut agree = vec![0usize; input.n_workers()];
        let mut seen = vec![0usize; input.n_workers()];
        let mut predictions = Vec::with_capacity(input.n_items());

        for (row, control) in input.rows.iter().zip(&controls) {
            let vote = plurality(row);
            let reference = control.as_deref().or(vote.map(|(label, _)| label));

            for (col, cell) in row.iter().enumerate() {
                if let (Some(label), Some(reference)) = (cell, reference) {
                    seen[col] += 1;
                    if label == reference {
                        agree[col] += 1;
                    }
                }
            }

            let prediction = match (control, vote) {
                (Some(known), _) => known.clone(),
                (None, Some((label, share))) if share >= params.threshold => label.to_string(),
                _ => String::new(),
            };
            predictions.push(prediction);
        }

        let competence = agree
            .iter()
            .zip(&seen)
            .map(|(&a, &s)| {
                let value = if s == 0 { 0.0 } else { a as f64 / s as f64 };
                format!("{value:.6}")
            })
            .collect::<Vec<_>>()
            .join("\t");

        let mut predictions = predictions.join("\n");
        predictions.push('\n');
        Ok(EstimatorOutput {
            predictions,
            competence,
        })
    }
}
