#![forbid(unsafe_code)]

//! # gold-harness
//!
//! Consensus gold labels for crowd-sourced explanations of argument convincingness.
//!
//! Crowd workers label short reasoning units ("A1 gives an example", "A2 is
//! off-topic") cut from free-text justifications of which of two arguments is
//! more convincing. Several workers label each unit and many of them are noisy.
//! This crate turns their raw exports into a learning set:
//!
//! 1. [`annotation`] ingests the exports into a worker x item matrix.
//! 2. [`consensus`] runs a competence-inference estimator (MACE or an
//!    in-process stand-in) once over the matrix, yielding a gold label per item
//!    and a competence per worker.
//! 3. [`labeling`] attaches labels and competence-carrying judgements to units.
//! 4. [`cleaning`] excludes unusable labels, labels whose polarity contradicts
//!    the pair's verdict, and the weaker side of contradicting labels on the
//!    same argument, weighing units with [`scoring`].
//! 5. [`learning`] collects what survives per argument pair.

pub mod annotation;
pub mod cleaning;
pub mod config;
pub mod consensus;
pub mod corpus;
pub mod error;
pub mod labeling;
pub mod labels;
pub mod learning;
pub mod scoring;
pub mod store;
pub mod workers;

pub use annotation::{AnnotationMatrix, IngestOptions, RawAssignment};
pub use cleaning::{
    apply as apply_exclusions, CleaningConfig, CleaningOutcome, CleaningPipeline, CleaningStage,
    ExclusionLedger, ExclusionReason, StageReport,
};
pub use config::GoldConfig;
pub use consensus::{
    estimate, ConsensusEstimator, ConsensusResult, EstimatorInput, EstimatorOutput,
    EstimatorParams, MaceProcess, MajorityVoteEstimator,
};
pub use corpus::{Argument, ArgumentPair, Corpus, ReasoningUnit, Target, UnitRef, WorkerAssignment};
pub use error::GoldError;
pub use labeling::{attach_gold_labels, EstimatedGoldLabels, GoldLabelProvider, MockGoldLabelProvider};
pub use labels::{ContradictionTable, PolarityRule};
pub use learning::{assemble, GoldLabelPair, LearningSet};
pub use scoring::{score_unit, sigmoid, CONTRADICTION_LAMBDA};
