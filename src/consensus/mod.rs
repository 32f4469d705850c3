//! Gold-label estimation through a competence-inference estimator.
//!
//! The estimator itself is a port ([`ConsensusEstimator`]). This module owns
//! its contract: the input layout it receives ([`EstimatorInput`]), the raw
//! output it returns ([`EstimatorOutput`]) and the interpretation of that
//! output into a [`ConsensusResult`].
//!
//! Estimation is explicit and runs once: [`estimate`] returns a result object
//! and every later gold-label or competence query is a pure lookup on it.

pub mod mace;
pub mod majority;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::annotation::AnnotationMatrix;
use crate::error::GoldError;

pub use mace::MaceProcess;
pub use majority::MajorityVoteEstimator;

/// Parameters passed through to the estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorParams {
    pub iterations: u32,
    pub restarts: u32,
    /// Items whose posterior confidence falls below this get no gold label.
    pub threshold: f64,
    /// Optional known-answer file, one line per item (blank = unknown).
    pub controls: Option<PathBuf>,
}

impl Default for EstimatorParams {
    fn default() -> Self {
        Self {
            iterations: 500,
            restarts: 50,
            threshold: 0.95,
            controls: None,
        }
    }
}

/// Label matrix in the estimator's positional layout.
///
/// Columns are workers in lexicographic order, rows are items in ascending id
/// order. Both orders are what map the estimator's output back to ids.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimatorInput {
    pub worker_ids: Vec<String>,
    pub item_ids: Vec<u32>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl EstimatorInput {
    pub fn from_matrix(matrix: &AnnotationMatrix) -> Self {
        let worker_ids = matrix.worker_ids();
        let column: BTreeMap<&str, usize> = worker_ids
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.as_str(), idx))
            .collect();

        let mut item_ids = Vec::with_capacity(matrix.item_view().len());
        let mut rows = Vec::with_capacity(matrix.item_view().len());
        for (item_id, workers) in matrix.item_view() {
            let mut row = vec![None; worker_ids.len()];
            for (worker_id, assignment) in workers {
                if let Some(&idx) = column.get(worker_id.as_str()) {
                    row[idx] = Some(assignment.label.clone());
                }
            }
            item_ids.push(*item_id);
            rows.push(row);
        }

        Self {
            worker_ids,
            item_ids,
            rows,
        }
    }

    pub fn n_items(&self) -> usize {
        self.item_ids.len()
    }

    pub fn n_workers(&self) -> usize {
        self.worker_ids.len()
    }

    /// Comma-separated rows, one per item, followed by a trailing blank line.
    pub fn to_csv(&self) -> String {
        let mut lines: Vec<String> = self
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| cell.as_deref().unwrap_or(""))
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .collect();
        lines.push(String::new());
        lines.join("\n")
    }
}

/// Raw text of the estimator's two output files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EstimatorOutput {
    /// One line per input item, blank when the item stayed unresolved.
    pub predictions: String,
    /// Tab-separated competences, one per input worker column.
    pub competence: String,
}

/// Port to a competence-inference estimator.
pub trait ConsensusEstimator: Send + Sync {
    fn name(&self) -> &str;

    /// Runs one estimation over the full matrix. Blocks until done.
    fn run(&self, input: &EstimatorInput, params: &EstimatorParams)
        -> Result<EstimatorOutput, GoldError>;
}

/// Per-item gold labels and per-worker competences from one estimation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub estimator: String,
    pub threshold: f64,
    gold_labels: BTreeMap<u32, String>,
    competences: BTreeMap<String, f64>,
}

impl ConsensusResult {
    pub fn new(
        estimator: impl Into<String>,
        threshold: f64,
        gold_labels: BTreeMap<u32, String>,
        competences: BTreeMap<String, f64>,
    ) -> Self {
        Self {
            estimator: estimator.into(),
            threshold,
            gold_labels,
            competences,
        }
    }

    pub fn gold_label(&self, item_id: u32) -> Option<&str> {
        self.gold_labels.get(&item_id).map(String::as_str)
    }

    pub fn competence(&self, worker_id: &str) -> Option<f64> {
        self.competences.get(worker_id).copied()
    }

    pub fn gold_labels(&self) -> &BTreeMap<u32, String> {
        &self.gold_labels
    }

    pub fn competences(&self) -> &BTreeMap<String, f64> {
        &self.competences
    }

    /// Workers ordered by competence, best first (or worst first).
    pub fn ranked_workers(&self, worst_first: bool) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self
            .competences
            .iter()
            .map(|(w, c)| (w.as_str(), *c))
            .collect();
        ranked.sort_by(|a, b| {
            let ord = b.1.total_cmp(&a.1);
            let ord = if worst_first { ord.reverse() } else { ord };
            ord.then_with(|| a.0.cmp(b.0))
        });
        ranked
    }
}

/// Runs the estimator once over the whole matrix and interprets its output.
pub fn estimate(
    matrix: &AnnotationMatrix,
    estimator: &dyn ConsensusEstimator,
    params: &EstimatorParams,
) -> Result<ConsensusResult, GoldError> {
    let input = EstimatorInput::from_matrix(matrix);
    if input.n_items() == 0 || input.n_workers() == 0 {
        return Err(GoldError::invalid_state(
            "cannot estimate gold labels from an empty annotation matrix",
        ));
    }

    info!(
        estimator = estimator.name(),
        items = input.n_items(),
        workers = input.n_workers(),
        threshold = params.threshold,
        "Running consensus estimation"
    );
    let output = estimator.run(&input, params)?;
    let result = parse_output(&input, &output, estimator.name(), params.threshold)?;
    info!(
        labelled = result.gold_labels.len(),
        unresolved = input.n_items() - result.gold_labels.len(),
        "Consensus estimation finished"
    );
    Ok(result)
}

/// Maps positional estimator output back onto item and worker ids.
///
/// Any count mismatch means the estimator and this contract disagree (for
/// example a version skew) and is reported rather than patched over.
pub fn parse_output(
    input: &EstimatorInput,
    output: &EstimatorOutput,
    estimator: &str,
    threshold: f64,
) -> Result<ConsensusResult, GoldError> {
    let predictions: Vec<&str> = output.predictions.lines().collect();
    if predictions.len() != input.n_items() {
        return Err(GoldError::inconsistency(format!(
            "wrong size of the predictions output; expected {} lines but was {}",
            input.n_items(),
            predictions.len()
        )));
    }

    let competence_line = output.competence.trim_end_matches(['\r', '\n']);
    let raw_competences: Vec<&str> = if competence_line.trim().is_empty() {
        Vec::new()
    } else {
        competence_line.split('\t').collect()
    };
    if raw_competences.len() != input.n_workers() {
        return Err(GoldError::inconsistency(format!(
            "expected {} competence values, got {}",
            input.n_workers(),
            raw_competences.len()
        )));
    }

    let mut competences = BTreeMap::new();
    for (worker_id, raw) in input.worker_ids.iter().zip(&raw_competences) {
        let value: f64 = raw
            .trim()
            .parse()
            .map_err(|_| GoldError::external(format!("unparseable competence {raw:?}")))?;
        if !value.is_finite() {
            return Err(GoldError::external(format!(
                "non-finite competence for worker {worker_id}"
            )));
        }
        competences.insert(worker_id.clone(), value);
    }

    let mut gold_labels = BTreeMap::new();
    for (item_id, line) in input.item_ids.iter().zip(&predictions) {
        let label = line.trim();
        if !label.is_empty() {
            gold_labels.insert(*item_id, label.to_string());
        }
    }

    Ok(ConsensusResult::new(
        estimator,
        threshold,
        gold_labels,
        competences,
    ))
}
