//! Projects cleaned gold labels back onto argument pairs to build the learning set.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::corpus::Corpus;
use crate::error::GoldError;
use crate::store::write_atomic;

/// Inline marker replacing paragraph breaks in argument texts.
pub const PARAGRAPH_MARKER: &str = " <br/> ";

/// One supervised example: which labels explain why one argument beats the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldLabelPair {
    pub id: String,
    pub debate_topic: String,
    pub debate_stance: String,
    pub more_convincing_argument_id: String,
    pub less_convincing_argument_id: String,
    pub more_convincing_argument_text: String,
    pub less_convincing_argument_text: String,
    pub more_convincing_labels: BTreeSet<String>,
    pub less_convincing_labels: BTreeSet<String>,
}

impl GoldLabelPair {
    /// Both sides' labels, more convincing side first.
    pub fn all_labels(&self) -> Vec<&str> {
        self.more_convincing_labels
            .iter()
            .chain(&self.less_convincing_labels)
            .map(String::as_str)
            .collect()
    }
}

/// Learning records per corpus file.
pub type LearningSet = BTreeMap<String, Vec<GoldLabelPair>>;

pub fn paragraphs_to_single_line(text: &str) -> String {
    text.replace('\n', PARAGRAPH_MARKER)
}

/// Topic and stance from a `<topic>_<stance>` file name; dashes become spaces.
pub fn topic_and_stance(file: &str) -> Result<(String, String), GoldError> {
    let mut parts = file.split('_');
    let (Some(topic), Some(stance)) = (parts.next(), parts.next()) else {
        return Err(GoldError::malformed("corpus file name", file));
    };
    let stance = stance
        .trim_end_matches(".json")
        .trim_end_matches(".xml");
    Ok((
        topic.replace('-', " ").trim().to_string(),
        stance.replace('-', " ").trim().to_string(),
    ))
}

/// Collects every surviving labelled unit onto its pair's more or less
/// convincing side.
///
/// Pairs without any surviving label are omitted. Finding
/// `reserved_positive_label` on the less convincing side means the cleaning
/// stages were skipped or are broken, and fails with `InvalidState`.
pub fn assemble(corpus: &Corpus, reserved_positive_label: &str) -> Result<LearningSet, GoldError> {
    let mut set = LearningSet::new();
    let mut total = 0usize;
    let mut with_labels = 0usize;

    for (file, pairs) in &corpus.files {
        let (topic, stance) = topic_and_stance(file)?;
        let records = set.entry(file.clone()).or_default();

        for pair in pairs {
            total += 1;
            let more = pair.more_convincing();
            let less = pair.less_convincing();
            let mut more_labels = BTreeSet::new();
            let mut less_labels = BTreeSet::new();

            for unit in pair.units().filter(|u| !u.excluded) {
                let Some(label) = &unit.estimated_gold_label else {
                    continue;
                };
                let target = unit.target_argument_id(pair);
                if target == more.id {
                    more_labels.insert(label.clone());
                } else if target == less.id {
                    less_labels.insert(label.clone());
                }
            }

            if less_labels.contains(reserved_positive_label) {
                return Err(GoldError::invalid_state(format!(
                    "pair {} in {file} has {reserved_positive_label} on the less convincing argument",
                    pair.id
                )));
            }
            if more_labels.is_empty() && less_labels.is_empty() {
                continue;
            }

            with_labels += 1;
            records.push(GoldLabelPair {
                id: pair.id.clone(),
                debate_topic: topic.clone(),
                debate_stance: stance.clone(),
                more_convincing_argument_id: more.id.clone(),
                less_convincing_argument_id: less.id.clone(),
                more_convincing_argument_text: paragraphs_to_single_line(&more.text),
                less_convincing_argument_text: paragraphs_to_single_line(&less.text),
                more_convincing_labels: more_labels,
                less_convincing_labels: less_labels,
            });
        }
    }

    info!(total, with_labels, "Assembled learning set");
    Ok(set)
}

// =============================================================================
// Statistics and export
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LabelStatistics {
    pub total_pairs: usize,
    /// `m:<more>-L:<less>` combinations, most frequent first.
    pub combinations: Vec<(String, usize)>,
    pub more_convincing: Vec<(String, usize)>,
    pub less_convincing: Vec<(String, usize)>,
}

fn sorted_by_count(counts: BTreeMap<String, usize>) -> Vec<(String, usize)> {
    let mut sorted: Vec<(String, usize)> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted
}

fn join_labels(labels: &BTreeSet<String>) -> String {
    labels.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

pub fn label_statistics(set: &LearningSet) -> LabelStatistics {
    let mut combinations: BTreeMap<String, usize> = BTreeMap::new();
    let mut more: BTreeMap<String, usize> = BTreeMap::new();
    let mut less: BTreeMap<String, usize> = BTreeMap::new();
    let mut total_pairs = 0;

    for record in set.values().flatten() {
        total_pairs += 1;
        let m = join_labels(&record.more_convincing_labels);
        let l = join_labels(&record.less_convincing_labels);
        *combinations.entry(format!("m:{m}-L:{l}")).or_default() += 1;
        *more.entry(m).or_default() += 1;
        *less.entry(l).or_default() += 1;
    }

    LabelStatistics {
        total_pairs,
        combinations: sorted_by_count(combinations),
        more_convincing: sorted_by_count(more),
        less_convincing: sorted_by_count(less),
    }
}

/// Writes one `<debate>.tsv` per debate (both stances merged) with
/// `id, labels, more convincing text, less convincing text` per line.
pub fn export_tsv(set: &LearningSet, dir: &Path) -> Result<Vec<PathBuf>, GoldError> {
    let mut merged: BTreeMap<&str, Vec<&GoldLabelPair>> = BTreeMap::new();
    for (file, records) in set {
        let debate = file.split('_').next().unwrap_or(file.as_str());
        merged.entry(debate).or_default().extend(records);
    }

    let mut written = Vec::with_capacity(merged.len());
    for (debate, records) in merged {
        let mut body = String::new();
        for record in records {
            body.push_str(&format!(
                "{}\t{}\t{}\t{}\n",
                record.id,
                record.all_labels().join(","),
                record.more_convincing_argument_text,
                record.less_convincing_argument_text
            ));
        }
        let path = dir.join(format!("{debate}.tsv"));
        write_atomic(&path, body.as_bytes())?;
        info!(path = %path.display(), "Written learning set export");
        written.push(path);
    }
    Ok(written)
}
