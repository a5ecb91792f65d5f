//! Configuration file loading for conclave
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `CONCLAVE_*` environment variables
//! 2. `--config <path>` specified file
//! 3. Project root: `./conclave.toml` or `./.conclave.toml`
//! 4. Global: `~/.config/conclave/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigValidationError, FileBusConfig, FileConfig, FileEngineConfig, FileExplorationConfig,
    FileLoggingConfig, FileMemoryConfig, FileProviderClientConfig, FileProviderConfig,
    FileToolsConfig, ProviderKind,
};
pub use loader::ConfigLoader;
