//! Run configuration: JSON file with every field defaulted, plus environment overrides.
//!
//! Environment:
//! - `GOLD_ESTIMATOR_COMMAND`: estimator program and leading args, whitespace-split
//! - `GOLD_ESTIMATOR_THRESHOLD`: acceptance threshold (float)

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cleaning::CleaningConfig;
use crate::consensus::EstimatorParams;
use crate::error::GoldError;

pub const ENV_ESTIMATOR_COMMAND: &str = "GOLD_ESTIMATOR_COMMAND";
pub const ENV_ESTIMATOR_THRESHOLD: &str = "GOLD_ESTIMATOR_THRESHOLD";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    #[serde(flatten)]
    pub params: EstimatorParams,
    /// Program plus leading arguments for the external estimator,
    /// e.g. `["java", "-jar", "MACE.jar"]`.
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoldConfig {
    pub estimator: EstimatorConfig,
    pub cleaning: CleaningConfig,
}

impl GoldConfig {
    pub fn load(path: &Path) -> Result<Self, GoldError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| GoldError::Serde(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Loads `path` if given (defaults otherwise), then applies the environment.
    pub fn resolve(path: Option<&Path>) -> Result<Self, GoldError> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<(), GoldError> {
        self.apply_overrides(
            std::env::var(ENV_ESTIMATOR_COMMAND).ok().as_deref(),
            std::env::var(ENV_ESTIMATOR_THRESHOLD).ok().as_deref(),
        )
    }

    fn apply_overrides(
        &mut self,
        command: Option<&str>,
        threshold: Option<&str>,
    ) -> Result<(), GoldError> {
        if let Some(command) = command.filter(|c| !c.trim().is_empty()) {
            self.estimator.command = command.split_whitespace().map(str::to_string).collect();
        }
        if let Some(raw) = threshold {
            self.estimator.params.threshold = raw
                .trim()
                .parse()
                .map_err(|_| GoldError::malformed("estimator threshold", raw))?;
        }
        Ok(())
    }
}
