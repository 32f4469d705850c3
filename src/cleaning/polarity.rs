//! Units on the more convincing argument must name a positive property and
//! units on the less convincing one a negative property.

use tracing::debug;

use super::{CleaningStage, Exclusion, ExclusionLedger, ExclusionReason, StageOutcome, StageReport};
use crate::corpus::Corpus;
use crate::error::GoldError;
use crate::labels::PolarityRule;

#[derive(Debug, Clone, Default)]
pub struct PolarityFilter {
    rule: PolarityRule,
}

impl PolarityFilter {
    pub fn new(rule: PolarityRule) -> Self {
        Self { rule }
    }
}

impl CleaningStage for PolarityFilter {
    fn name(&self) -> &'static str {
        "polarity"
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

        for entry in corpus.units() {
            let Some(label) = entry.unit.estimated_gold_label.as_deref() else {
                continue;
            };
            let at = entry.unit_ref();
            if ledger.is_excluded(&at) {
                continue;
            }
            outcome.report.examined += 1;

            let on_more_convincing = entry.unit.target == entry.pair.gold_verdict;
            let positive = self.rule.is_positive(label);
            debug!(
                unit = %at,
                more_convincing = %entry.pair.gold_verdict,
                target = %entry.unit.target,
                label,
                positive,
                "Polarity check"
            );
            if on_more_convincing != positive {
                outcome.exclusions.push(Exclusion {
                    unit: at,
                    stage: self.name().to_string(),
                    reason: ExclusionReason::WrongPolarity {
                        label: label.to_string(),
                        on_more_convincing,
                    },
                });
            }
        }
        Ok(outcome)
    }
}
