//! harbor-core: Plugin Runtime for Harbor
//!
//! Layer2 - 플러그인 런타임과 서비스 레지스트리
//!
//! # 주요 모듈
//!
//! - `plugin`: 매니페스트 검증, 라이프사이클 상태 머신, 타입별 초기화, 서비스 레지스트리
//!
//! # 사용 예시
//!
//! ```ignore
//! use harbor_core::{Runtime, RuntimeConfig, PluginStatus};
//!
//! let runtime = Runtime::new(config, importer, settings, event_bus);
//! runtime.discover().await?;
//!
//! for plugin in runtime.get_plugins_by_status(PluginStatus::Error).await {
//!     eprintln!("{}: {}", plugin.id, plugin.error.unwrap_or_default());
//! }
//!
//! // hybrid 플러그인은 호스트가 준비되면 서비스를 연결
//! runtime.initialize_services("dashboard").await?;
//! ```

pub mod plugin;

// Re-exports: Plugin
pub use plugin::{
    // Manifest
    parse_draft,
    parse_manifest,
    validate_manifest_file,
    // Module
    Component,
    // Context
    ContextFactory,
    // Runtime
    DiscoveryReport,
    FnService,
    ImportedModule,
    LoadOutcome,
    LoadedPlugin,
    ManifestDraft,
    ManifestLoader,
    ModuleExports,
    ModuleHandle,
    ModuleImporter,
    ModuleLoader,
    PluginContext,
    PluginDiscovery,
    PluginHandles,
    PluginLogger,
    PluginManifest,
    PluginModule,
    // Registry
    PluginRegistry,
    PluginSnapshot,
    PluginStats,
    PluginStatus,
    PluginType,
    PluginVersion,
    Runtime,
    RuntimeConfig,
    ServiceDefinition,
    // Services
    ServiceHandle,
    ServiceHandler,
    ServiceInfo,
    ServiceKey,
    ServiceMethod,
    ServiceRegistry,
    StaticModuleImporter,
    MANIFEST_FILE,
};

// Layer1 re-exports
pub use harbor_foundation::{Error, Result};

/// Layer2 버전
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_plugin_exports() {
        let manifest = PluginManifest::new("demo", "Demo", PluginType::Simple, "index.js");
        assert_eq!(manifest.version, "1.0.0");
        assert_eq!(PluginStatus::Active.to_string(), "active");
    }
}
