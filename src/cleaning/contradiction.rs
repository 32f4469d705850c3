//! Resolves contradicting gold labels on the same argument.
//!
//! All surviving units that target one argument (across every pair the
//! argument appears in) are compared pairwise. When two labels appear in the
//! contradiction table, each unit is weighed by
//! `score(unit, lambda) * average annotator competence` and the lighter one is
//! excluded. On an exact tie the unit with the lexicographically lower id
//! loses, and on equal ids the one earlier in corpus order.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::{CleaningStage, Exclusion, ExclusionLedger, ExclusionReason, StageOutcome, StageReport};
use crate::corpus::{Corpus, ReasoningUnit, UnitRef};
use crate::error::GoldError;
use crate::labels::ContradictionTable;
use crate::scoring::{average_competence, score_unit, CONTRADICTION_LAMBDA};

#[derive(Debug, Clone)]
pub struct ContradictionFilter {
    table: ContradictionTable,
    lambda: f64,
}

impl Default for ContradictionFilter {
    fn default() -> Self {
        Self::new(ContradictionTable::default(), CONTRADICTION_LAMBDA)
    }
}

struct Candidate<'a> {
    at: UnitRef,
    unit: &'a ReasoningUnit,
    label: &'a str,
    weight: Option<f64>,
}

impl Candidate<'_> {
    fn weight(&mut self, lambda: f64) -> Result<f64, GoldError> {
        if let Some(w) = self.weight {
            return Ok(w);
        }
        let w = score_unit(self.unit, lambda)? * average_competence(self.unit)?;
        self.weight = Some(w);
        Ok(w)
    }
}

impl ContradictionFilter {
    pub fn new(table: ContradictionTable, lambda: f64) -> Self {
        Self { table, lambda }
    }

    /// Surviving labelled units grouped by the id of the argument they target,
    /// each group in corpus order.
    fn group_by_argument<'a>(
        corpus: &'a Corpus,
        ledger: &ExclusionLedger,
    ) -> BTreeMap<&'a str, Vec<Candidate<'a>>> {
        let mut groups: BTreeMap<&str, Vec<Candidate<'_>>> = BTreeMap::new();
        for entry in corpus.units() {
            let Some(label) = entry.unit.estimated_gold_label.as_deref() else {
                continue;
            };
            let at = entry.unit_ref();
            if ledger.is_excluded(&at) {
                continue;
            }
            groups
                .entry(entry.unit.target_argument_id(entry.pair))
                .or_default()
                .push(Candidate {
                    at,
                    unit: entry.unit,
                    label,
                    weight: None,
                });
        }
        groups
    }
}

/// Index of the losing unit of `i < j`.
fn loser(i: usize, wi: f64, id_i: &str, j: usize, wj: f64, id_j: &str) -> usize {
    match wi.total_cmp(&wj) {
        Ordering::Greater => j,
        Ordering::Less => i,
        Ordering::Equal => {
            if id_j < id_i {
                j
            } else {
                i
            }
        }
    }
}

impl CleaningStage for ContradictionFilter {
    fn name(&self) -> &'static str {
        "contradiction"
    }

    fn evaluate(
        &self,
        corpus: &Corpus,
        ledger: &ExclusionLedger,
    ) -> Result<StageOutcome, GoldError> {
        let mut outcome = StageOutcome {
            report: StageReport {
                stage: self.name().to_string(),
                ..StageReport::default()
            },
            ..StageOutcome::default()
        };

        for (_argument, mut units) in Self::group_by_argument(corpus, ledger) {
            outcome.report.examined += units.len();
            for i in 0..units.len() {
                for j in (i + 1)..units.len() {
                    let Some(key) = self.table.contradiction(units[i].label, units[j].label)
                    else {
                        continue;
                    };
                    *outcome.report.contradictions.entry(key.clone()).or_default() += 1;

                    let wi = units[i].weight(self.lambda)?;
                    let wj = units[j].weight(self.lambda)?;
                    let lost = loser(i, wi, &units[i].unit.id, j, wj, &units[j].unit.id);
                    let (won, lost_weight, won_weight) = if lost == i {
                        (j, wi, wj)
                    } else {
                        (i, wj, wi)
                    };
                    outcome.exclusions.push(Exclusion {
                        unit: units[lost].at.clone(),
                        stage: self.name().to_string(),
                        reason: ExclusionReason::Contradiction {
                            key,
                            against: units[won].at.clone(),
                            product: lost_weight,
                            opponent_product: won_weight,
                        },
                    });
                }
            }
        }
        Ok(outcome)
    }
}
