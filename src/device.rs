use crate::Config;
use std::sync::Arc;

/// Shared owner of the configuration every geometry and composite is created under.
#[derive(Debug, Default)]
pub struct Device {
    config: Config,
}

impl Device {
    pub fn new(config: Config) -> Arc<Self> {
        Arc::new(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
