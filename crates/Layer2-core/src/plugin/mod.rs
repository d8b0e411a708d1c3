//! # Plugin Runtime
//!
//! 플러그인 발견, 검증, 초기화, 서비스 중개
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Runtime                             │
//! │  PluginDiscovery ─▶ ManifestLoader ─▶ ModuleLoader           │
//! │                                         │                    │
//! │                                         ▼                    │
//! │  PluginRegistry ◀── initializer (simple/configured/          │
//! │  (records)            advanced/hybrid)                       │
//! │                                         │                    │
//! │  ┌──────────────────────────────────────┼─────────────────┐ │
//! │  │            PluginContext (per plugin)                   │ │
//! │  │  - config          - ServiceRegistry (shared)          │ │
//! │  │  - PluginLogger    - EventBus (shared)                 │ │
//! │  └────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 예시
//!
//! ```ignore
//! let importer = Arc::new(StaticModuleImporter::new());
//! importer.register(plugins_dir.join("clock/index.js"), || {
//!     Ok(ImportedModule::with_default(ClockPlugin::default()))
//! }).await;
//!
//! let runtime = Runtime::new(
//!     RuntimeConfig::new(plugins_dir),
//!     importer,
//!     Arc::new(MemorySettings::new()),
//!     Arc::new(EventBus::new()),
//! );
//! let report = runtime.discover().await?;
//! ```

mod context;
mod discovery;
mod initializer;
mod manifest;
mod module;
mod registry;
mod runtime;
mod service;

pub use context::{ContextFactory, PluginContext, PluginLogger};
pub use discovery::PluginDiscovery;
pub use manifest::{
    parse_draft, parse_manifest, validate_manifest_file, ManifestDraft, ManifestLoader,
    PluginManifest, PluginType, PluginVersion, ServiceDefinition, ServiceMethod, MANIFEST_FILE,
};
pub use module::{
    Component, FnService, ImportedModule, ModuleExports, ModuleHandle, ModuleImporter,
    ModuleLoader, PluginModule, ServiceHandler, StaticModuleImporter,
};
pub use registry::{LoadedPlugin, PluginHandles, PluginRegistry, PluginSnapshot, PluginStats, PluginStatus};
pub use runtime::{DiscoveryReport, LoadOutcome, Runtime, RuntimeConfig};
pub use service::{ServiceHandle, ServiceInfo, ServiceKey, ServiceRegistry};
