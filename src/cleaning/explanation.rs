//! Drops units whose gold label says they are not a usable explanation.

use std::collections::BTreeSet;

use super::{CleaningStage, Exclusion, ExclusionLedger, ExclusionReason, StageOutcome, StageReport};
use crate::corpus::Corpus;
use crate::error::GoldError;

#[derive(Debug, Clone)]
pub struct ExplanationTypeFilter {
    unusable_labels: BTreeSet<String>,
}

impl ExplanationTypeFilter {
    pub fn new(unusable_labels: BTreeSet<String>) -> Self {
        Self { unusable_labels }
    }
}

impl CleaningStage for ExplanationTypeFilter {
    fn name(&self) -> &'static str {
        "explanation_type"
    }

    fn evaluate(
        &self,
        corpus: &Corpus,
        _ledger: &ExclusionLedger,
    ) -> Result<StageOutcome, GoldError> {
        let mut outcome = StageOutcome {
            report: StageReport {
                stage: self.name().to_string(),
                ..StageReport::default()
            },
            ..StageOutcome::default()
        };

        for entry in corpus.units() {
            let Some(label) = entry.unit.estimated_gold_label.as_deref() else {
                continue;
            };
            outcome.report.examined += 1;
            if self.unusable_labels.contains(label) {
                outcome.exclusions.push(Exclusion {
                    unit: entry.unit_ref(),
                    stage: self.name().to_string(),
                    reason: ExclusionReason::UnusableLabel {
                        label: label.to_string(),
                    },
                });
            }
        }
        Ok(outcome)
    }
}
