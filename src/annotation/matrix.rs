//! Worker x item annotation matrix with item-keyed and worker-keyed views.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::export::{
    extract_option, parse_timestamp, read_export_files, ExportRow, COL_ACCEPT_TIME,
    COL_ASSIGNMENT_ID, COL_FEEDBACK, COL_HIT_ID, COL_SUBMIT_TIME, COL_WORKER_ID,
};
use crate::error::GoldError;

/// One worker's label for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAssignment {
    pub worker_id: String,
    pub item_id: u32,
    pub hit_id: String,
    pub assignment_id: String,
    pub accept_time: DateTime<FixedOffset>,
    pub submit_time: DateTime<FixedOffset>,
    pub label: String,
    /// Filled in from the consensus estimator; `None` until then.
    #[serde(default)]
    pub competence: Option<f64>,
    #[serde(default)]
    pub rejected: bool,
}

impl RawAssignment {
    /// Seconds between accepting and submitting the HIT.
    pub fn work_seconds(&self) -> i64 {
        (self.submit_time - self.accept_time).num_seconds()
    }
}

/// Options controlling which rows and answers are ingested.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Terminal labels; answers outside this set are intermediate tree steps.
    pub allowed_labels: BTreeSet<String>,
    /// Also read rows that are still pending review ("Submitted").
    pub accept_non_final_rows: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            allowed_labels: crate::labels::terminal_labels(),
            accept_non_final_rows: false,
        }
    }
}

/// Item id -> worker id -> assignment.
pub type ItemView = BTreeMap<u32, BTreeMap<String, RawAssignment>>;

/// Worker id -> item id -> assignment, borrowed from the item view.
pub type WorkerView<'a> = BTreeMap<&'a str, BTreeMap<u32, &'a RawAssignment>>;

#[derive(Debug, Clone, Default)]
pub struct AnnotationMatrix {
    items: ItemView,
    feedback: BTreeMap<String, Vec<String>>,
}

impl AnnotationMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads export files and builds the matrix.
    pub fn ingest<P: AsRef<Path>>(paths: &[P], options: &IngestOptions) -> Result<Self, GoldError> {
        let rows = read_export_files(paths)?;
        Self::from_rows(&rows, options)
    }

    /// Builds the matrix from already-parsed export rows.
    ///
    /// A row holding more than one terminal answer for the same item is dropped
    /// when it was rejected and is an error otherwise. Across rows, a worker may
    /// hold one non-rejected assignment per item; a rejected duplicate is dropped.
    pub fn from_rows(rows: &[ExportRow], options: &IngestOptions) -> Result<Self, GoldError> {
        let mut matrix = Self::new();
        let mut inconsistent_rows = Vec::new();
        let mut skipped_pending = 0usize;

        for row in rows {
            let status = row.status()?;
            if !status.is_final() && !options.accept_non_final_rows {
                skipped_pending += 1;
                continue;
            }

            let answers = match row_answers(row, &options.allowed_labels)? {
                RowAnswers::Consistent(answers) => answers,
                RowAnswers::Conflicting(item_id, labels) => {
                    if status.is_rejected() {
                        warn!(
                            source = %row.source.display(),
                            record = row.record,
                            item_id,
                            "Dropping rejected row with conflicting answers"
                        );
                    } else {
                        inconsistent_rows.push(format!(
                            "more than one answer for item {item_id} ({}) in {} record {}; \
                             this assignment should have been rejected",
                            labels.join(" vs. "),
                            row.source.display(),
                            row.record
                        ));
                    }
                    continue;
                }
            };

            if let Some(feedback) = row.get(COL_FEEDBACK).filter(|f| !f.trim().is_empty()) {
                let worker = row.require(COL_WORKER_ID)?;
                matrix
                    .feedback
                    .entry(worker.to_string())
                    .or_default()
                    .push(feedback.to_string());
            }

            for (item_id, label) in answers {
                let assignment = assignment_from_row(row, item_id, label, status.is_rejected())?;
                matrix.merge(assignment)?;
            }
        }

        if !inconsistent_rows.is_empty() {
            return Err(GoldError::inconsistency(inconsistent_rows.join("\n")));
        }

        info!(
            items = matrix.items.len(),
            workers = matrix.worker_ids().len(),
            assignments = matrix.len(),
            skipped_pending,
            "Ingested annotation matrix"
        );
        Ok(matrix)
    }

    /// Builds a matrix from assignments, failing on any duplicate (item, worker).
    pub fn from_assignments(
        assignments: impl IntoIterator<Item = RawAssignment>,
    ) -> Result<Self, GoldError> {
        let mut matrix = Self::new();
        for assignment in assignments {
            matrix.insert(assignment)?;
        }
        Ok(matrix)
    }

    /// Inserts an assignment; a second assignment for the same (item, worker) is an error.
    pub fn insert(&mut self, assignment: RawAssignment) -> Result<(), GoldError> {
        let workers = self.items.entry(assignment.item_id).or_default();
        if let Some(existing) = workers.get(&assignment.worker_id) {
            return Err(duplicate_error(existing, &assignment));
        }
        workers.insert(assignment.worker_id.clone(), assignment);
        Ok(())
    }

    fn merge(&mut self, assignment: RawAssignment) -> Result<(), GoldError> {
        let workers = self.items.entry(assignment.item_id).or_default();
        match workers.get(&assignment.worker_id) {
            None => {}
            Some(existing) if !existing.rejected && !assignment.rejected => {
                return Err(duplicate_error(existing, &assignment));
            }
            Some(existing) if !existing.rejected => {
                debug!(
                    item_id = assignment.item_id,
                    worker_id = %assignment.worker_id,
                    "Dropping rejected duplicate assignment"
                );
                return Ok(());
            }
            Some(_) => {
                debug!(
                    item_id = assignment.item_id,
                    worker_id = %assignment.worker_id,
                    "Replacing rejected assignment"
                );
            }
        }
        workers.insert(assignment.worker_id.clone(), assignment);
        Ok(())
    }

    pub fn item_view(&self) -> &ItemView {
        &self.items
    }

    /// Re-indexes the item view by worker. O(total assignments).
    pub fn derive_worker_view(&self) -> WorkerView<'_> {
        let mut view: WorkerView<'_> = BTreeMap::new();
        for (item_id, workers) in &self.items {
            for (worker_id, assignment) in workers {
                view.entry(worker_id.as_str())
                    .or_default()
                    .insert(*item_id, assignment);
            }
        }
        view
    }

    /// Item ids in ascending order.
    pub fn item_ids(&self) -> Vec<u32> {
        self.items.keys().copied().collect()
    }

    /// Distinct worker ids in lexicographic order.
    pub fn worker_ids(&self) -> Vec<String> {
        let workers: BTreeSet<&String> = self.items.values().flat_map(|w| w.keys()).collect();
        workers.into_iter().cloned().collect()
    }

    pub fn assignments_for(&self, item_id: u32) -> Vec<RawAssignment> {
        self.items
            .get(&item_id)
            .map(|workers| workers.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get(&self, item_id: u32, worker_id: &str) -> Option<&RawAssignment> {
        self.items.get(&item_id)?.get(worker_id)
    }

    /// Total number of assignments.
    pub fn len(&self) -> usize {
        self.items.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Free-text feedback left by each worker, in row order.
    pub fn feedback(&self) -> &BTreeMap<String, Vec<String>> {
        &self.feedback
    }

    /// Copies each worker's competence onto every one of their assignments.
    pub fn apply_competences(
        &mut self,
        competences: &BTreeMap<String, f64>,
    ) -> Result<(), GoldError> {
        for workers in self.items.values_mut() {
            for (worker_id, assignment) in workers.iter_mut() {
                let competence = competences.get(worker_id).ok_or_else(|| {
                    GoldError::invalid_state(format!("no competence estimated for worker {worker_id}"))
                })?;
                assignment.competence = Some(*competence);
            }
        }
        Ok(())
    }

    /// Keeps only the first `n` assignments per item by submit time (or the last
    /// `n` when `reverse` is set). Items left without assignments are dropped.
    pub fn keep_first_n_per_item(&self, n: usize, reverse: bool) -> Self {
        let mut items = ItemView::new();
        for (item_id, workers) in &self.items {
            let mut sorted: Vec<&RawAssignment> = workers.values().collect();
            sorted.sort_by(|a, b| {
                a.submit_time
                    .cmp(&b.submit_time)
                    .then_with(|| a.worker_id.cmp(&b.worker_id))
            });
            if reverse {
                sorted.reverse();
            }
            let kept = sorted
                .into_iter()
                .take(n)
                .map(|a| (a.worker_id.clone(), a.clone()))
                .collect::<BTreeMap<_, _>>();
            if !kept.is_empty() {
                items.insert(*item_id, kept);
            }
        }
        Self {
            items,
            feedback: self.feedback.clone(),
        }
    }
}

enum RowAnswers<'a> {
    Consistent(BTreeMap<u32, &'a str>),
    Conflicting(u32, Vec<String>),
}

fn row_answers<'a>(
    row: &'a ExportRow,
    allowed_labels: &BTreeSet<String>,
) -> Result<RowAnswers<'a>, GoldError> {
    let mut answers: BTreeMap<u32, &'a str> = BTreeMap::new();
    for (item, _question, cell) in row.answers() {
        let Some(label) = extract_option(cell) else {
            continue;
        };
        if !allowed_labels.contains(label) {
            continue;
        }
        let item_id: u32 = item
            .parse()
            .map_err(|_| GoldError::malformed("item id", item))?;
        if let Some(previous) = answers.insert(item_id, label) {
            return Ok(RowAnswers::Conflicting(
                item_id,
                vec![previous.to_string(), label.to_string()],
            ));
        }
    }
    Ok(RowAnswers::Consistent(answers))
}

fn assignment_from_row(
    row: &ExportRow,
    item_id: u32,
    label: &str,
    rejected: bool,
) -> Result<RawAssignment, GoldError> {
    let accept_time = parse_timestamp(row.require(COL_ACCEPT_TIME)?)?;
    let submit_time = parse_timestamp(row.require(COL_SUBMIT_TIME)?)?;
    if submit_time < accept_time {
        return Err(GoldError::inconsistency(format!(
            "assignment {} submitted before it was accepted",
            row.require(COL_ASSIGNMENT_ID)?
        )));
    }

    Ok(RawAssignment {
        worker_id: row.require(COL_WORKER_ID)?.to_string(),
        item_id,
        hit_id: row.require(COL_HIT_ID)?.to_string(),
        assignment_id: row.require(COL_ASSIGNMENT_ID)?.to_string(),
        accept_time,
        submit_time,
        label: label.to_string(),
        competence: None,
        rejected,
    })
}

fn duplicate_error(existing: &RawAssignment, new: &RawAssignment) -> GoldError {
    GoldError::inconsistency(format!(
        "worker {} already has an assignment for item {} ({} in {}, now {} in {})",
        new.worker_id,
        new.item_id,
        existing.label,
        existing.assignment_id,
        new.label,
        new.assignment_id
    ))
}
