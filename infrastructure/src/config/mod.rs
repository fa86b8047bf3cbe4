//! Configuration file loading for review-council
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `--config <path>` specified file
//! 2. `COUNCIL_*` environment variables
//! 3. Project root: `./council.toml` or `./.council.toml`
//! 4. Global: `$XDG_CONFIG_HOME/review-council/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigWarning, FileAgentEntry, FileConfig, FileCouncilConfig, FileLoggingConfig,
    FileTriggerConfig,
};
pub use loader::ConfigLoader;
