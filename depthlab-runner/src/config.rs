//! Run configuration, loadable from TOML.
//!
//! Every table and field is optional; anything missing takes its default.
//!
//! ```toml
//! [eval]
//! threshold = 0.85
//!
//! [sweep]
//! n = 40
//! target_mean_steps = [1.5, 2.5]
//!
//! [bootstrap]
//! n_resamples = 5000
//! ```

use std::path::{Path, PathBuf};

use depthlab_core::policy::EvalParams;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bootstrap::BootstrapConfig;
use crate::sweep::ThresholdGrid;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub threshold_min: f64,
    pub threshold_max: f64,
    pub n: usize,
    /// Target mean depths to budget-match.
    pub target_mean_steps: Vec<f64>,
    /// Split a single input file into dev/test with this dev share.
    /// Unset means sweep the whole file without a test side.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_frac: Option<f64>,
    pub parallel: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            threshold_min: 0.50,
            threshold_max: 0.99,
            n: 80,
            target_mean_steps: vec![1.0, 2.0, 3.0, 4.0],
            dev_frac: None,
            parallel: true,
        }
    }
}

impl SweepConfig {
    pub fn grid(&self) -> ThresholdGrid {
        ThresholdGrid::linspace(self.threshold_min, self.threshold_max, self.n)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareConfig {
    /// Confidence threshold of the early-stopping system under comparison.
    pub tau: f64,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self { tau: 0.71 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub eval: EvalParams,
    pub sweep: SweepConfig,
    pub compare: CompareConfig,
    pub bootstrap: BootstrapConfig,
}

impl RunConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}
