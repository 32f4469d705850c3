//! Worker diagnostics: competence ranking, working-time statistics and
//! rejection sheets for spammers.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use statrs::statistics::Statistics;

use crate::annotation::{AnnotationMatrix, RawAssignment};
use crate::consensus::ConsensusResult;
use crate::error::GoldError;

pub const REJECTION_HEADER: &str = "assignmentIdToReject\tassignmentIdToRejectComment";
pub const REJECTION_COMMENT: &str =
    "\"Dear worker, we appreciate your work, but you provided very low quality answers.\"";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerSummary {
    pub worker_id: String,
    pub competence: f64,
    pub assignments: usize,
    pub hits: usize,
    /// Mean seconds between accept and submit, one sample per HIT.
    pub mean_work_seconds: Option<f64>,
    pub std_work_seconds: Option<f64>,
}

/// Working time per HIT in seconds, sorted ascending.
pub fn work_times(assignments: &[&RawAssignment]) -> Vec<f64> {
    let per_hit: BTreeMap<&str, i64> = assignments
        .iter()
        .map(|a| (a.hit_id.as_str(), a.work_seconds()))
        .collect();
    let mut times: Vec<f64> = per_hit.into_values().map(|s| s as f64).collect();
    times.sort_by(f64::total_cmp);
    times
}

/// The `n` most (or, with `worst`, least) competent workers.
pub fn worker_report(
    matrix: &AnnotationMatrix,
    result: &ConsensusResult,
    n: usize,
    worst: bool,
) -> Vec<WorkerSummary> {
    let by_worker = matrix.derive_worker_view();
    result
        .ranked_workers(worst)
        .into_iter()
        .take(n)
        .map(|(worker_id, competence)| {
            let assignments: Vec<&RawAssignment> = by_worker
                .get(worker_id)
                .map(|items| items.values().copied().collect())
                .unwrap_or_default();
            let times = work_times(&assignments);
            let mean_work_seconds = (!times.is_empty()).then(|| times.iter().mean());
            let std_work_seconds = match times.len() {
                0 => None,
                1 => Some(0.0),
                _ => Some(times.iter().std_dev()),
            };
            WorkerSummary {
                worker_id: worker_id.to_string(),
                competence,
                assignments: assignments.len(),
                hits: times.len(),
                mean_work_seconds,
                std_work_seconds,
            }
        })
        .collect()
}

/// Tab-separated sheet rejecting every assignment of `workers`.
pub fn rejection_sheet(matrix: &AnnotationMatrix, workers: &[String]) -> Result<String, GoldError> {
    let by_worker = matrix.derive_worker_view();
    let mut to_reject = BTreeSet::new();
    for worker in workers {
        let items = by_worker.get(worker.as_str()).ok_or_else(|| {
            GoldError::invalid_state(format!("worker {worker} has no assignments in the matrix"))
        })?;
        to_reject.extend(items.values().map(|a| a.assignment_id.as_str()));
    }

    let mut sheet = String::from(REJECTION_HEADER);
    sheet.push('\n');
    for assignment_id in to_reject {
        sheet.push_str(assignment_id);
        sheet.push('\t');
        sheet.push_str(REJECTION_COMMENT);
        sheet.push('\n');
    }
    Ok(sheet)
}
