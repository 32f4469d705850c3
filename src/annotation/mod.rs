//! Raw annotation ingestion.
//!
//! Crowd-sourcing exports are parsed into an [`AnnotationMatrix`]: every
//! worker's terminal answer for every item, indexed by item and (derived) by
//! worker.

pub mod export;
pub mod matrix;

pub use export::{
    extract_option, parse_timestamp, read_export_file, read_export_files, split_answer_column,
    zone_offset_minutes, AssignmentStatus, ExportRow,
};
pub use matrix::{AnnotationMatrix, IngestOptions, ItemView, RawAssignment, WorkerView};
