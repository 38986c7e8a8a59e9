use crate::{Error, Result};
use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

/// How much effort the builders of a geometry should spend. Forwarded as is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildQuality {
    Low,
    Medium,
    High,
    Refit,
}

impl Default for BuildQuality {
    fn default() -> Self {
        BuildQuality::Medium
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How many children a composite acceleration structure can hold
    pub max_accels: usize,
    /// Build quality given to newly created geometries
    pub build_quality: BuildQuality,
    /// Largest accepted number of time steps per geometry
    pub max_time_steps: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_accels: 16,
            build_quality: BuildQuality::default(),
            max_time_steps: 129,
        }
    }
}

impl Config {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(source).map_err(|e| Error::InvalidArgument(e.to_string()))?;
        config.validate()?;

        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;

        Self::from_toml_str(&source).with_context(|| format!("Failed to parse {:?}", path))
    }

    fn validate(&self) -> Result<()> {
        if self.max_accels == 0 {
            return Err(Error::InvalidArgument("max_accels must be at least 1".into()));
        }
        if self.max_time_steps == 0 {
            return Err(Error::InvalidArgument(
                "max_time_steps must be at least 1".into(),
            ));
        }

        Ok(())
    }
}
