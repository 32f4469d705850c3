//! Subprocess adapter for the MACE command-line estimator.

use std::path::Path;
use std::process::Command;

use tracing::debug;

use super::{ConsensusEstimator, EstimatorInput, EstimatorOutput, EstimatorParams};
use crate::error::GoldError;

const INPUT_FILE: &str = "input.csv";
const PREDICTIONS_FILE: &str = "predictions.txt";
const COMPETENCE_FILE: &str = "competence.txt";

/// Launches MACE as an external process.
///
/// Input and output files live in a temporary directory that is removed when
/// the call returns, on success and on error alike. There is no timeout: a
/// hanging estimator blocks the caller.
#[derive(Debug, Clone)]
pub struct MaceProcess {
    program: String,
    base_args: Vec<String>,
}

impl MaceProcess {
    /// `command` is the program followed by fixed leading arguments, e.g.
    /// `["java", "-jar", "MACE.jar"]`.
    pub fn new(command: &[String]) -> Result<Self, GoldError> {
        let (program, base_args) = command
            .split_first()
            .ok_or_else(|| GoldError::external("estimator command is empty"))?;
        Ok(Self {
            program: program.clone(),
            base_args: base_args.to_vec(),
        })
    }

    pub fn command_line(&self, params: &EstimatorParams, work_dir: &Path) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.extend([
            "--iterations".to_string(),
            params.iterations.to_string(),
            "--threshold".to_string(),
            params.threshold.to_string(),
            "--restarts".to_string(),
            params.restarts.to_string(),
            "--outputPredictions".to_string(),
            work_dir.join(PREDICTIONS_FILE).display().to_string(),
            "--outputCompetence".to_string(),
            work_dir.join(COMPETENCE_FILE).display().to_string(),
        ]);
        if let Some(controls) = &params.controls {
            args.push("--controls".to_string());
            args.push(controls.display().to_string());
        }
        args.push(work_dir.join(INPUT_FILE).display().to_string());
        args
    }
}

impl ConsensusEstimator for MaceProcess {
    fn name(&self) -> &str {
        "mace"
    }

    fn run(
        &self,
        input: &EstimatorInput,
        params: &EstimatorParams,
    ) -> Result<EstimatorOutput, GoldError> {
        let work_dir = tempfile::Builder::new().prefix("mace").tempdir()?;
        std::fs::write(work_dir.path().join(INPUT_FILE), input.to_csv())?;

        let args = self.command_line(params, work_dir.path());
        debug!(program = %self.program, ?args, "Launching estimator");

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| GoldError::external(format!("failed to launch {}: {e}", self.program)))?;
        if !output.status.success() {
            return Err(GoldError::external(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let read = |name: &str| {
            std::fs::read_to_string(work_dir.path().join(name)).map_err(|e| {
                GoldError::external(format!("estimator did not produce {name}: {e}"))
            })
        };
        Ok(EstimatorOutput {
            predictions: read(PREDICTIONS_FILE)?,
            competence: read(COMPETENCE_FILE)?,
        })
    }
}
