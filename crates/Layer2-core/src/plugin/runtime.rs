//! Plugin Runtime - 플러그인 라이프사이클 관리
//!
//! 상태 전이:
//!
//! ```text
//! (disabled) ──────────────────────────▶ INACTIVE
//! (enabled)  ──▶ LOADING ──┬──▶ ACTIVE ──(unload)──▶ INACTIVE ──▶ 제거
//!                          └──▶ ERROR  ──(unload)──▶ INACTIVE ──▶ 제거
//! ```
//!
//! 권한/버전 결함이 있는 디스크립터도 LOADING 레코드를 거쳐 ERROR로 남는다.
//! 레코드를 만들 수 없는 디스크립터(파일 없음, 파싱 실패, 필수 필드 누락)만
//! 레코드 없이 거부된다.
//!
//! 발견은 순차적이다. 한 플러그인이 완전히 끝나야 다음으로 넘어가며,
//! 한 플러그인의 실패는 로그/이벤트로만 남고 루프를 중단하지 않는다.

use super::context::{ContextFactory, PluginContext};
use super::discovery::PluginDiscovery;
use super::initializer;
use super::manifest::{ManifestDraft, ManifestLoader, PluginManifest, PluginType};
use super::module::{Component, ModuleHandle, ModuleImporter, ModuleLoader};
use super::registry::{LoadedPlugin, PluginRegistry, PluginSnapshot, PluginStats, PluginStatus};
use super::service::ServiceRegistry;
use harbor_foundation::event::{error_event, loaded_event, loading_event, unloaded_event};
use harbor_foundation::{Error, EventBus, HostConfig, PluginEvent, Result, SettingsProvider};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

// ============================================================================
// RuntimeConfig
// ============================================================================

/// 런타임 설정
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// 플러그인 루트 디렉토리
    pub plugins_dir: PathBuf,

    /// import/init 제한 시간 (None이면 무제한)
    pub load_timeout: Option<Duration>,
}

impl RuntimeConfig {
    pub fn new(plugins_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugins_dir: plugins_dir.into(),
            load_timeout: None,
        }
    }

    /// 로드 제한 시간 설정
    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = Some(timeout);
        self
    }

    /// 호스트 설정에서 생성 (상대 경로는 `base_dir` 기준)
    pub fn from_host_config(config: &HostConfig, base_dir: &Path, default_dir: &Path) -> Self {
        let plugins_dir = match &config.plugins_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => base_dir.join(dir),
            None => default_dir.to_path_buf(),
        };

        Self {
            plugins_dir,
            load_timeout: config.load_timeout(),
        }
    }
}

// ============================================================================
// LoadOutcome / DiscoveryReport
// ============================================================================

/// 플러그인 하나의 로드 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "message", rename_all = "camelCase")]
pub enum LoadOutcome {
    /// ACTIVE 도달
    Active,
    /// ERROR 레코드로 남음
    Failed(String),
    /// 레코드를 만들 수 없는 디스크립터 (레코드 없음)
    Rejected(String),
    /// 설정에서 비활성화 (INACTIVE 레코드)
    Disabled,
    /// 이미 레코드가 있어 아무것도 하지 않음
    AlreadyPresent,
}

impl LoadOutcome {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Failed(msg) | Self::Rejected(msg) => Some(msg),
            _ => None,
        }
    }
}

/// 발견 패스 결과 (발견 순서 유지)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryReport {
    pub entries: Vec<(String, LoadOutcome)>,
}

impl DiscoveryReport {
    pub fn outcome(&self, plugin_id: &str) -> Option<&LoadOutcome> {
        self.entries
            .iter()
            .find(|(id, _)| id == plugin_id)
            .map(|(_, outcome)| outcome)
    }

    pub fn active_count(&self) -> usize {
        self.entries.iter().filter(|(_, o)| o.is_active()).count()
    }

    /// 실패/거부된 항목
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter_map(|(id, o)| o.error_message().map(|msg| (id.as_str(), msg)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Runtime
// ============================================================================

/// 플러그인 런타임 (호스트가 소유, 전역 상태 없음)
pub struct Runtime {
    config: RuntimeConfig,
    plugins: PluginRegistry,
    services: Arc<ServiceRegistry>,
    event_bus: Arc<EventBus>,
    settings: Arc<dyn SettingsProvider>,
    manifests: ManifestLoader,
    modules: ModuleLoader,
    contexts: ContextFactory,
    discovery: PluginDiscovery,
}

impl Runtime {
    /// 새 런타임 생성
    pub fn new(
        config: RuntimeConfig,
        importer: Arc<dyn ModuleImporter>,
        settings: Arc<dyn SettingsProvider>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let services = Arc::new(ServiceRegistry::new());

        Self {
            plugins: PluginRegistry::new(),
            contexts: ContextFactory::new(Arc::clone(&event_bus), Arc::clone(&services)),
            manifests: ManifestLoader::new(&config.plugins_dir),
            modules: ModuleLoader::new(importer).with_timeout(config.load_timeout),
            discovery: PluginDiscovery::new(&config.plugins_dir),
            services,
            event_bus,
            settings,
            config,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn services(&self) -> &Arc<ServiceRegistry> {
        &self.services
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    // ========================================================================
    // 발견 / 로드
    // ========================================================================

    /// 플러그인 루트의 모든 후보를 순서대로 로드
    ///
    /// 개별 플러그인 실패는 보고서에만 기록된다. 루트 자체를 읽을 수 없을 때만 에러.
    pub async fn discover(&self) -> Result<DiscoveryReport> {
        let candidates = self.discovery.candidates().await?;
        info!(
            "Discovering {} plugin(s) in {:?}",
            candidates.len(),
            self.config.plugins_dir
        );

        let mut report = DiscoveryReport::default();
        for id in candidates {
            let outcome = self.load_plugin(&id).await;
            report.entries.push((id, outcome));
        }

        info!(
            "Discovery complete: {} active, {} total",
            report.active_count(),
            report.len()
        );
        Ok(report)
    }

    /// 플러그인 하나 로드 (`plugin_id`는 플러그인 디렉토리 이름)
    pub async fn load_plugin(&self, plugin_id: &str) -> LoadOutcome {
        if self.plugins.contains(plugin_id).await {
            debug!("Plugin {} is already present, skipping load", plugin_id);
            return LoadOutcome::AlreadyPresent;
        }

        let draft = self.manifests.load_draft(plugin_id).await;
        let plugin_dir = self.manifests.plugin_dir(plugin_id);

        // 비활성화된 플러그인은 디스크립터 결함과 무관하게 이벤트 없이 건너뛴다
        let enabled = self.settings.is_enabled(plugin_id)
            && draft
                .as_ref()
                .map_or(true, |d| self.settings.is_enabled(&d.manifest.id));
        if !enabled {
            return self.skip_disabled(plugin_id, draft.ok(), plugin_dir).await;
        }

        let ManifestDraft { manifest, defect } = match draft {
            Ok(draft) => draft,
            Err(e) => {
                let message = e.to_string();
                error!("Rejected plugin {}: {}", plugin_id, message);
                self.publish(loading_event(plugin_id)).await;
                self.publish(error_event(plugin_id, &message)).await;
                return LoadOutcome::Rejected(message);
            }
        };

        let id = manifest.id.clone();
        let record = LoadedPlugin::new(manifest.clone(), plugin_dir.clone(), PluginStatus::Loading);
        if !self.plugins.insert(record).await {
            debug!("Plugin {} is already present, skipping load", id);
            return LoadOutcome::AlreadyPresent;
        }
        info!("Loading plugin: {} (v{}, {})", id, manifest.version, manifest.plugin_type);
        self.publish(loading_event(&id)).await;

        if let Some(defect) = defect {
            return self.fail(&id, defect).await;
        }

        self.warn_missing_dependencies(&manifest).await;

        match self.activate(&manifest, &plugin_dir).await {
            Ok((module, component, context)) => {
                self.plugins.mark_active(&id, module, component, context).await;
                info!("Plugin {} loaded successfully", id);
                self.publish(loaded_event(
                    &id,
                    manifest.plugin_type.as_str(),
                    &manifest.version,
                ))
                .await;
                LoadOutcome::Active
            }
            Err(e) => self.fail(&id, e).await,
        }
    }

    /// 비활성화된 플러그인: 디스크립터를 읽을 수 있으면 INACTIVE 레코드만 남긴다
    async fn skip_disabled(
        &self,
        plugin_id: &str,
        draft: Option<ManifestDraft>,
        plugin_dir: PathBuf,
    ) -> LoadOutcome {
        info!("Plugin {} is disabled", plugin_id);
        let Some(draft) = draft else {
            return LoadOutcome::Disabled;
        };

        let record = LoadedPlugin::new(draft.manifest, plugin_dir, PluginStatus::Inactive);
        if self.plugins.insert(record).await {
            LoadOutcome::Disabled
        } else {
            LoadOutcome::AlreadyPresent
        }
    }

    /// LOADING → ERROR
    async fn fail(&self, id: &str, e: Error) -> LoadOutcome {
        let message = e.to_string();
        error!("Plugin {} failed to load: {}", id, message);
        self.plugins.mark_error(id, message.as_str()).await;
        self.publish(error_event(id, &message)).await;
        LoadOutcome::Failed(message)
    }

    /// 임포트 → 컨텍스트 → 타입별 초기화
    async fn activate(
        &self,
        manifest: &PluginManifest,
        plugin_dir: &Path,
    ) -> Result<(ModuleHandle, Option<Component>, Arc<PluginContext>)> {
        let module = self.modules.load(plugin_dir, manifest).await?;

        let user_config = self.settings.plugin_config(&manifest.id).unwrap_or_default();
        let context = Arc::new(self.contexts.build(manifest, plugin_dir, user_config));

        let component =
            initializer::initialize(manifest, module.as_ref(), &context, self.config.load_timeout)
                .await?;

        Ok((module, component, context))
    }

    /// hybrid 플러그인의 서비스 초기화 (호스트가 명시적으로 호출)
    pub async fn initialize_services(&self, plugin_id: &str) -> Result<()> {
        let handles = self
            .plugins
            .handles(plugin_id)
            .await
            .ok_or_else(|| Error::NotFound(format!("plugin '{}'", plugin_id)))?;

        if handles.manifest.plugin_type != PluginType::Hybrid {
            return Err(Error::InvalidState(format!(
                "plugin '{}' is {}, only hybrid plugins initialize services on demand",
                plugin_id, handles.manifest.plugin_type
            )));
        }
        if handles.status != PluginStatus::Active {
            return Err(Error::InvalidState(format!(
                "plugin '{}' is {}, expected active",
                plugin_id, handles.status
            )));
        }
        if handles.services_initialized {
            info!("Services of plugin {} are already initialized", plugin_id);
            return Ok(());
        }

        let (Some(module), Some(context)) = (handles.module, handles.context) else {
            return Err(Error::InvalidState(format!(
                "plugin '{}' has no loaded module",
                plugin_id
            )));
        };

        let result = initializer::initialize_hybrid_services(
            &handles.manifest,
            module.as_ref(),
            &context,
            self.config.load_timeout,
        )
        .await;

        match result {
            Ok(()) => {
                self.plugins.mark_services_initialized(plugin_id).await;
                info!("Initialized services of plugin {}", plugin_id);
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                error!("Plugin {} failed to initialize services: {}", plugin_id, message);
                self.plugins.mark_error(plugin_id, message.as_str()).await;
                self.publish(error_event(plugin_id, &message)).await;
                Err(e)
            }
        }
    }

    // ========================================================================
    // 언로드
    // ========================================================================

    /// 플러그인 언로드 (없으면 no-op)
    ///
    /// stop 훅이 실패하면 레코드와 서비스는 그대로 두고 에러를 돌려준다.
    pub async fn unload(&self, plugin_id: &str) -> Result<()> {
        let Some(handles) = self.plugins.handles(plugin_id).await else {
            debug!("Plugin {} is not loaded, nothing to unload", plugin_id);
            return Ok(());
        };

        info!("Unloading plugin: {}", plugin_id);

        if let (Some(module), Some(context)) = (&handles.module, &handles.context) {
            initializer::shutdown(
                &handles.manifest,
                module.as_ref(),
                context,
                self.config.load_timeout,
            )
            .await
            .map_err(|e| Error::unload(plugin_id, e.to_string()))?;
        }

        let removed = self.services.unregister_provider(plugin_id).await;
        if !removed.is_empty() {
            debug!("Plugin {} released {} service(s)", plugin_id, removed.len());
        }

        self.plugins.set_status(plugin_id, PluginStatus::Inactive).await;
        self.plugins.remove(plugin_id).await;
        self.publish(unloaded_event(plugin_id)).await;

        info!("Plugin {} unloaded", plugin_id);
        Ok(())
    }

    /// 언로드 후 같은 디렉토리에서 다시 로드
    pub async fn reload(&self, plugin_id: &str) -> Result<LoadOutcome> {
        let dir_name = self
            .plugins
            .handles(plugin_id)
            .await
            .and_then(|h| h.plugin_dir.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| plugin_id.to_string());

        self.unload(plugin_id).await?;
        Ok(self.load_plugin(&dir_name).await)
    }

    /// 모든 플러그인을 로드 역순으로 언로드
    ///
    /// 실패한 플러그인은 남겨두고 나머지는 계속 진행한다. 첫 에러를 돌려준다.
    pub async fn shutdown(&self) -> Result<()> {
        let mut first_error = None;

        for id in self.plugins.ids().await.into_iter().rev() {
            if let Err(e) = self.unload(&id).await {
                warn!("{}", e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    // ========================================================================
    // 의존성 진단
    // ========================================================================

    /// ACTIVE가 아닌 선언된 의존성
    pub async fn missing_dependencies(&self, plugin_id: &str) -> Vec<String> {
        match self.plugins.manifest(plugin_id).await {
            Some(manifest) => self.inactive_dependencies(&manifest).await,
            None => Vec::new(),
        }
    }

    async fn inactive_dependencies(&self, manifest: &PluginManifest) -> Vec<String> {
        let mut missing = Vec::new();
        for dep in &manifest.dependencies {
            if self.plugins.status(dep).await != Some(PluginStatus::Active) {
                missing.push(dep.clone());
            }
        }
        missing
    }

    async fn warn_missing_dependencies(&self, manifest: &PluginManifest) {
        let missing = self.inactive_dependencies(manifest).await;
        if !missing.is_empty() {
            warn!(
                "Plugin {} declares dependencies that are not active: {}",
                manifest.id,
                missing.join(", ")
            );
        }
    }

    // ========================================================================
    // 조회 (스냅샷)
    // ========================================================================

    /// 모든 레코드 (로드 순서)
    pub async fn get_loaded_plugins(&self) -> Vec<PluginSnapshot> {
        let mut snapshots = self.plugins.snapshots().await;
        for snapshot in &mut snapshots {
            self.attach_services(snapshot).await;
        }
        snapshots
    }

    pub async fn get_plugin(&self, plugin_id: &str) -> Option<PluginSnapshot> {
        let mut snapshot = self.plugins.snapshot(plugin_id).await?;
        self.attach_services(&mut snapshot).await;
        Some(snapshot)
    }

    pub async fn get_plugins_by_status(&self, status: PluginStatus) -> Vec<PluginSnapshot> {
        self.get_loaded_plugins()
            .await
            .into_iter()
            .filter(|p| p.status == status)
            .collect()
    }

    pub async fn get_plugin_stats(&self) -> PluginStats {
        self.plugins.stats().await
    }

    /// ACTIVE 플러그인의 UI 컴포넌트
    pub async fn component(&self, plugin_id: &str) -> Option<Component> {
        let handles = self.plugins.handles(plugin_id).await?;
        if handles.status != PluginStatus::Active {
            return None;
        }
        handles.component
    }

    /// ACTIVE 플러그인의 작업 설정
    pub async fn plugin_config(&self, plugin_id: &str) -> Option<serde_json::Map<String, serde_json::Value>> {
        let handles = self.plugins.handles(plugin_id).await?;
        if handles.status != PluginStatus::Active {
            return None;
        }
        Some(handles.context?.config().await)
    }

    /// ERROR 플러그인은 서비스를 노출하지 않는다
    async fn attach_services(&self, snapshot: &mut PluginSnapshot) {
        if snapshot.status == PluginStatus::Active {
            snapshot.services = self.services.services_of(&snapshot.id).await;
        }
    }

    async fn publish(&self, event: PluginEvent) {
        self.event_bus.publish(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_config_from_host_config() {
        let base = Path::new("/work");
        let default_dir = Path::new("/home/me/.harbor/plugins");

        let config = RuntimeConfig::from_host_config(&HostConfig::new(), base, default_dir);
        assert_eq!(config.plugins_dir, default_dir);
        assert_eq!(config.load_timeout, None);

        let host = HostConfig {
            plugins_dir: Some(PathBuf::from("plugins")),
            load_timeout_ms: Some(250),
            ..Default::default()
        };
        let config = RuntimeConfig::from_host_config(&host, base, default_dir);
        assert_eq!(config.plugins_dir, PathBuf::from("/work/plugins"));
        assert_eq!(config.load_timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_report_helpers() {
        let report = DiscoveryReport {
            entries: vec![
                ("a".into(), LoadOutcome::Active),
                ("b".into(), LoadOutcome::Failed("boom".into())),
                ("c".into(), LoadOutcome::Disabled),
                ("d".into(), LoadOutcome::Rejected("bad manifest".into())),
            ],
        };

        assert_eq!(report.active_count(), 1);
        assert_eq!(report.outcome("c"), Some(&LoadOutcome::Disabled));
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures, vec![("b", "boom"), ("d", "bad manifest")]);
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(LoadOutcome::Failed("boom".into())).unwrap();
        assert_eq!(json, serde_json::json!({ "outcome": "failed", "message": "boom" }));

        let json = serde_json::to_value(LoadOutcome::Active).unwrap();
        assert_eq!(json, serde_json::json!({ "outcome": "active" }));
    }
}
