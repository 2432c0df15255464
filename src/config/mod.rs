//! Configuration of the raft log.
//!
//! Settings are layered from lowest to highest priority:
//! 1. Default values (hardcoded)
//! 2. Config file passed to [`Settings::load`]
//! 3. File named by the `CONFIG_PATH` environment variable
//! 4. Environment variables prefixed with `RAFT__`, e.g. `RAFT__LOG__MAX_SEGMENT_SIZE`

mod raft_log;
pub use raft_log::*;


//---
use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// Raft log storage parameters
    #[serde(default)]
    pub log: RaftLogConfig,
}

impl Settings {
    /// Loads and validates the merged configuration.
    ///
    /// # Arguments
    /// * `config_path` - Optional path to a configuration file; must exist when given
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Config::builder();

        if let Some(path) = config_path {
            config = config.add_source(File::with_name(path).required(true));
        }

        if let Ok(path) = env::var("CONFIG_PATH") {
            config = config.add_source(File::with_name(&path).required(true));
        }

        config = config.add_source(
            Environment::with_prefix("RAFT")
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let settings: Settings = config.build()?.try_deserialize()?;
        settings.log.validate()?;
        Ok(settings)
    }
}
