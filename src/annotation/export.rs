//! Reader for raw crowd-sourcing result exports (one CSV row per assignment).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::GoldError;

pub const COL_HIT_ID: &str = "hitid";
pub const COL_WORKER_ID: &str = "workerid";
pub const COL_ASSIGNMENT_ID: &str = "assignmentid";
pub const COL_ACCEPT_TIME: &str = "assignmentaccepttime";
pub const COL_SUBMIT_TIME: &str = "assignmentsubmittime";
pub const COL_STATUS: &str = "assignmentstatus";
pub const COL_FEEDBACK: &str = "Answer.feedback";

const ANSWER_PREFIX: &str = "Answer.";

// "o8_q1_o7_1" -> "o7_1": the option id follows the last question marker.
static QUESTION_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_q\d+_").expect("Invalid question marker regex"));

/// Review status of an assignment as reported by the crowdsourcing platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentStatus {
    Submitted,
    Approved,
    Rejected,
    Other(String),
}

impl AssignmentStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "Submitted" => Self::Submitted,
            "Approved" => Self::Approved,
            "Rejected" => Self::Rejected,
            other => Self::Other(other.to_string()),
        }
    }

    /// Approved and rejected assignments have been reviewed; everything else is pending.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected)
    }
}

/// One row of an export file, keyed by column header.
#[derive(Debug, Clone)]
pub struct ExportRow {
    pub source: PathBuf,
    /// 1-based record number within `source` (header excluded).
    pub record: usize,
    pub fields: BTreeMap<String, String>,
}

impl ExportRow {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    pub fn require(&self, column: &str) -> Result<&str, GoldError> {
        match self.get(column) {
            Some(v) if !v.trim().is_empty() => Ok(v),
            _ => Err(GoldError::inconsistency(format!(
                "missing required field {column:?} in {} record {}",
                self.source.display(),
                self.record
            ))),
        }
    }

    pub fn status(&self) -> Result<AssignmentStatus, GoldError> {
        self.require(COL_STATUS).map(AssignmentStatus::parse)
    }

    /// Iterates `(item_id, question_path, cell_value)` over all answer columns.
    pub fn answers(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.fields.iter().filter_map(|(column, value)| {
            split_answer_column(column).map(|(item, question)| (item, question, value.as_str()))
        })
    }
}

/// Reads every row of every file, in file order then row order.
pub fn read_export_files<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<ExportRow>, GoldError> {
    let mut rows = Vec::new();
    for path in paths {
        rows.extend(read_export_file(path.as_ref())?);
    }
    Ok(rows)
}

pub fn read_export_file(path: &Path) -> Result<Vec<ExportRow>, GoldError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)?;
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        let fields = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), v.to_string()))
            .collect();
        rows.push(ExportRow {
            source: path.to_path_buf(),
            record: idx + 1,
            fields,
        });
    }
    tracing::debug!(path = %path.display(), rows = rows.len(), "Read export file");
    Ok(rows)
}

/// Splits `"Answer.46566_q4_group"` into `("46566", "q4_group")`.
///
/// Returns `None` for non-answer columns and for answer columns without an
/// item prefix (such as `Answer.feedback`).
pub fn split_answer_column(column: &str) -> Option<(&str, &str)> {
    let rest = column.strip_prefix(ANSWER_PREFIX)?;
    rest.split_once('_')
}

/// Extracts the selected option from an answer cell, e.g. `"o8_q1_o7_1"` -> `"o7_1"`.
pub fn extract_option(cell: &str) -> Option<&str> {
    let marker = QUESTION_MARKER.find_iter(cell).last()?;
    let option = &cell[marker.end()..];
    if option.is_empty() {
        None
    } else {
        Some(option)
    }
}

// =============================================================================
// Timestamps
// =============================================================================

/// Zone abbreviations accepted in platform exports (`EEE MMM d HH:mm:ss z yyyy`),
/// as minutes east of UTC. Ambiguous abbreviations such as `IST` are left out;
/// `GMT+hh:mm` style offsets are accepted as well.
const ZONES: &[(&str, i32)] = &[
    ("UTC", 0),
    ("GMT", 0),
    ("Z", 0),
    ("HST", -10 * 60),
    ("HDT", -9 * 60),
    ("AKST", -9 * 60),
    ("AKDT", -8 * 60),
    ("PST", -8 * 60),
    ("PDT", -7 * 60),
    ("MST", -7 * 60),
    ("MDT", -6 * 60),
    ("CST", -6 * 60),
    ("CDT", -5 * 60),
    ("EST", -5 * 60),
    ("EDT", -4 * 60),
    ("AST", -4 * 60),
    ("ADT", -3 * 60),
    ("NST", -(3 * 60 + 30)),
    ("NDT", -(2 * 60 + 30)),
    ("WET", 0),
    ("WEST", 60),
    ("BST", 60),
    ("CET", 60),
    ("CEST", 2 * 60),
    ("EET", 2 * 60),
    ("EEST", 3 * 60),
    ("MSK", 3 * 60),
    ("JST", 9 * 60),
    ("KST", 9 * 60),
    ("ACST", 9 * 60 + 30),
    ("ACDT", 10 * 60 + 30),
    ("AEST", 10 * 60),
    ("AEDT", 11 * 60),
    ("NZST", 12 * 60),
    ("NZDT", 13 * 60),
];

// "GMT+02:00", "UTC-0530"
static OFFSET_ZONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:GMT|UTC)([+-])(\d{1,2}):?(\d{2})?$").expect("Invalid zone offset regex")
});

/// Minutes east of UTC for a zone abbreviation or `GMT+hh:mm` offset.
pub fn zone_offset_minutes(zone: &str) -> Option<i32> {
    if let Some((_, minutes)) = ZONES.iter().find(|(name, _)| *name == zone) {
        return Some(*minutes);
    }
    let caps = OFFSET_ZONE.captures(zone)?;
    let hours: i32 = caps.get(2)?.as_str().parse().ok()?;
    let minutes: i32 = match caps.get(3) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    if hours > 18 || minutes > 59 {
        return None;
    }
    let total = hours * 60 + minutes;
    Some(if &caps[1] == "-" { -total } else { total })
}

/// Parses timestamps such as `"Tue Apr 19 10:12:33 PDT 2016"`.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<FixedOffset>, GoldError> {
    let malformed = || GoldError::malformed("timestamp", raw);

    let parts: Vec<&str> = raw.split_whitespace().collect();
    let [weekday, month, day, time, zone, year] = parts.as_slice() else {
        return Err(malformed());
    };
    if weekday.len() != 3 || !weekday.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(malformed());
    }

    let minutes = zone_offset_minutes(zone).ok_or_else(malformed)?;
    let offset = FixedOffset::east_opt(minutes * 60).ok_or_else(malformed)?;

    let naive = NaiveDateTime::parse_from_str(
        &format!("{month} {day} {time} {year}"),
        "%b %d %H:%M:%S %Y",
    )
    .map_err(|_| malformed())?;

    offset
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(malformed)
}
