use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};

pub mod datasets;

pub use datasets::builder::{generate_ytf_database, BuildParams, BuildSummary, LabelSelection};
pub use datasets::reader::{Batches, YouTubeFacesDB};
pub use datasets::transforms::{OutputType, Targets};
pub use datasets::{DatasetError, Partition};

/// Parameter structs are persisted as RON, anything serde can round trip
/// gets this for free.
pub trait Config: Send + Sync {
    fn config(&self) -> Result<String>;
    fn load_config(&mut self, config: &str) -> Result<()>;
}

impl<T: Serialize + DeserializeOwned + Send + Sync> Config for T {
    fn config(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .context("Failed to serialize config")
    }
    fn load_config(&mut self, config: &str) -> Result<()> {
        *self = ron::from_str(config).context(format!("Failed to load context {}", config))?;
        Ok(())
    }
}

/// Reads a RON config file on top of the default parameters.
pub fn load_config_file<T: Config + Default>(path: &Path) -> Result<T> {
    let serialized = fs::read_to_string(path)
        .with_context(|| format!("No config file {}", path.display()))?;
    let mut param = T::default();
    param.load_config(&serialized)?;
    Ok(param)
}
