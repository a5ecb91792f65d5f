//! Infrastructure layer for conclave
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: provider HTTP clients, workspace tools,
//! file-backed registries, event recorders and configuration loading.

pub mod config;
pub mod exploration;
pub mod live;
pub mod logging;
pub mod memory;
pub mod providers;
pub mod registry;
pub mod tools;

// Re-export commonly used types
pub use config::{
    ConfigLoader, ConfigValidationError, FileBusConfig, FileConfig, FileEngineConfig,
    FileExplorationConfig, FileLoggingConfig, FileMemoryConfig, FileProviderClientConfig,
    FileProviderConfig, FileToolsConfig, ProviderKind,
};
pub use exploration::LocalExplorationBackend;
pub use live::{BroadcastLiveEvents, LiveEvent};
pub use logging::JsonlEventRecorder;
pub use memory::LocalMemorySearch;
pub use providers::{
    AnthropicProvider, OpenAiCompatibleProvider, ProviderBuildError, build_providers,
};
pub use registry::{
    PatternLoadError, RegistryLoadError, TomlAgentRegistry, check_agent_references, load_pattern,
};
pub use tools::{LocalToolExecutor, Workspace};
