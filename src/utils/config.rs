use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::genomic::intervals::OverlapParams;
use crate::core::scheduler::executor::SchedulerParams;
use crate::single_cell::ingestion::ReadFilterParams;
use crate::single_cell::normalisation::NormalisationParams;
use crate::single_cell::pca::PcaParams;
use crate::utils::errors::{Result, ScError};

/// All parameters of a preprocessing run
///
/// Every section and every key is optional; missing ones take their
/// defaults.
///
/// ```toml
/// [read_filter]
/// min_genes_per_cell = 100
/// batch_size = 2000
///
/// [pca]
/// n_components = 30
/// solver = { randomised = { seed = 42 } }
///
/// [scheduler]
/// n_workers = 4
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub read_filter: ReadFilterParams,
    pub pca: PcaParams,
    pub normalisation: NormalisationParams,
    pub overlap: OverlapParams,
    pub scheduler: SchedulerParams,
}

impl PipelineConfig {
    /// Parse a config from a TOML string
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| ScError::Config(e.to_string()))
    }

    /// Read and parse a TOML config file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| ScError::Config(format!("{}: {}", path.display(), e)))
    }
}
