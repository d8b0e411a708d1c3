//! PluginContext - 플러그인에 제공되는 호스트 인터페이스
//!
//! 플러그인별로 하나씩 생성되며, 플러그인 코드는 이 컨텍스트를 통해서만
//! 설정, 이벤트, 서비스 레지스트리, 로거에 접근한다.

use super::manifest::{PluginManifest, ServiceDefinition};
use super::module::ServiceHandler;
use super::service::{ServiceHandle, ServiceRegistry};
use harbor_foundation::{EventBus, EventType, Permission, PermissionSet, PluginEvent, Result};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

// ============================================================================
// PluginLogger
// ============================================================================

/// 플러그인 ID가 태깅된 로거
#[derive(Debug, Clone)]
pub struct PluginLogger {
    plugin_id: String,
}

impl PluginLogger {
    pub fn new(plugin_id: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
        }
    }

    pub fn debug(&self, message: &str) {
        debug!(plugin_id = %self.plugin_id, "{}", message);
    }

    pub fn info(&self, message: &str) {
        info!(plugin_id = %self.plugin_id, "{}", message);
    }

    pub fn warn(&self, message: &str) {
        warn!(plugin_id = %self.plugin_id, "{}", message);
    }

    pub fn error(&self, message: &str) {
        error!(plugin_id = %self.plugin_id, "{}", message);
    }
}

// ============================================================================
// PluginContext
// ============================================================================

/// 플러그인 컨텍스트
pub struct PluginContext {
    plugin_id: String,
    plugin_dir: PathBuf,

    /// 작업 설정 (configured 타입은 기본값과 병합됨)
    config: RwLock<Map<String, Value>>,

    /// 매니페스트에서 부여받은 권한 (복사본)
    permissions: PermissionSet,

    event_bus: Arc<EventBus>,
    services: Arc<ServiceRegistry>,
    logger: PluginLogger,
}

impl PluginContext {
    pub fn new(
        manifest: &PluginManifest,
        plugin_dir: impl Into<PathBuf>,
        config: Map<String, Value>,
        event_bus: Arc<EventBus>,
        services: Arc<ServiceRegistry>,
    ) -> Self {
        Self {
            plugin_id: manifest.id.clone(),
            plugin_dir: plugin_dir.into(),
            config: RwLock::new(config),
            permissions: manifest.permissions.clone(),
            event_bus,
            services,
            logger: PluginLogger::new(&manifest.id),
        }
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub fn plugin_dir(&self) -> &Path {
        &self.plugin_dir
    }

    pub fn permissions(&self) -> &PermissionSet {
        &self.permissions
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(permission)
    }

    pub fn logger(&self) -> &PluginLogger {
        &self.logger
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn services(&self) -> &Arc<ServiceRegistry> {
        &self.services
    }

    // ========================================================================
    // 설정
    // ========================================================================

    /// 설정 값 조회
    pub async fn get_config(&self, key: &str) -> Option<Value> {
        self.config.read().await.get(key).cloned()
    }

    /// 전체 설정 스냅샷
    pub async fn config(&self) -> Map<String, Value> {
        self.config.read().await.clone()
    }

    /// 설정 값 변경
    pub async fn set_config(&self, key: impl Into<String>, value: Value) {
        self.config.write().await.insert(key.into(), value);
    }

    /// 작업 설정 교체
    pub async fn load_config(&self, config: Map<String, Value>) {
        *self.config.write().await = config;
    }

    // ========================================================================
    // 서비스
    // ========================================================================

    /// 자신을 제공자로 서비스 등록
    pub async fn register_service(
        &self,
        definition: ServiceDefinition,
        implementation: Arc<dyn ServiceHandler>,
    ) -> Result<()> {
        self.services
            .register(&self.plugin_id, definition, implementation, &self.permissions)
            .await
    }

    /// 자신이 등록한 서비스 해제
    pub async fn unregister_service(&self, name: &str, version: &str) -> bool {
        self.services
            .unregister(&self.plugin_id, name, version)
            .await
    }

    pub async fn resolve_service(&self, name: &str, version: Option<&str>) -> Option<ServiceHandle> {
        self.services.resolve(name, version).await
    }

    /// 자신의 권한으로 다른 서비스 호출
    pub async fn call_service(
        &self,
        name: &str,
        version: Option<&str>,
        method: &str,
        args: Value,
    ) -> Result<Value> {
        self.services
            .invoke(&self.permissions, name, version, method, args)
            .await
    }

    // ========================================================================
    // 이벤트
    // ========================================================================

    /// 커스텀 이벤트 발행
    pub async fn emit(&self, name: &str, data: Value) {
        let event = PluginEvent::new(
            EventType::Custom,
            json!({
                "pluginId": self.plugin_id,
                "name": name,
                "data": data,
            }),
            &self.plugin_id,
        );
        self.event_bus.publish(event).await;
    }
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("plugin_id", &self.plugin_id)
            .field("plugin_dir", &self.plugin_dir)
            .field("permissions", &self.permissions)
            .finish()
    }
}

// ============================================================================
// ContextFactory
// ============================================================================

/// 공유 협력자를 묶어 플러그인별 컨텍스트를 만든다
#[derive(Clone)]
pub struct ContextFactory {
    event_bus: Arc<EventBus>,
    services: Arc<ServiceRegistry>,
}

impl ContextFactory {
    pub fn new(event_bus: Arc<EventBus>, services: Arc<ServiceRegistry>) -> Self {
        Self {
            event_bus,
            services,
        }
    }

    pub fn build(
        &self,
        manifest: &PluginManifest,
        plugin_dir: &Path,
        config: Map<String, Value>,
    ) -> PluginContext {
        PluginContext::new(
            manifest,
            plugin_dir,
            config,
            Arc::clone(&self.event_bus),
            Arc::clone(&self.services),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::manifest::{PluginType, ServiceMethod};
    use crate::plugin::module::FnService;

    fn factory() -> ContextFactory {
        ContextFactory::new(Arc::new(EventBus::new()), Arc::new(ServiceRegistry::new()))
    }

    fn manifest(id: &str, permissions: PermissionSet) -> PluginManifest {
        PluginManifest::new(id, id, PluginType::Advanced, "index.js").with_permissions(permissions)
    }

    #[tokio::test]
    async fn test_config_access() {
        let mut config = Map::new();
        config.insert("theme".into(), json!("dark"));

        let ctx = factory().build(&manifest("demo", PermissionSet::new()), Path::new("/p/demo"), config);
        assert_eq!(ctx.get_config("theme").await, Some(json!("dark")));

        ctx.set_config("size", json!(3)).await;
        assert_eq!(ctx.config().await.len(), 2);

        ctx.load_config(Map::new()).await;
        assert!(ctx.get_config("theme").await.is_none());
        assert_eq!(ctx.plugin_dir(), Path::new("/p/demo"));
    }

    #[tokio::test]
    async fn test_services_use_own_permissions() {
        let factory = factory();
        let provider = factory.build(
            &manifest("runner", PermissionSet::from(Permission::SystemExec)),
            Path::new("/p/runner"),
            Map::new(),
        );
        let consumer = factory.build(&manifest("viewer", PermissionSet::new()), Path::new("/p/viewer"), Map::new());

        let definition = ServiceDefinition::new("shell", "1.0.0")
            .with_method("run", ServiceMethod::new("run").requires(Permission::SystemExec));
        provider
            .register_service(definition, Arc::new(FnService::new(|_, _| Ok(json!("ok")))))
            .await
            .unwrap();

        assert!(consumer.resolve_service("shell", None).await.is_some());
        assert!(consumer
            .call_service("shell", None, "run", Value::Null)
            .await
            .is_err());
        assert_eq!(
            provider.call_service("shell", None, "run", Value::Null).await.unwrap(),
            json!("ok")
        );

        assert!(!consumer.unregister_service("shell", "1.0.0").await);
        assert!(provider.unregister_service("shell", "1.0.0").await);
    }

    #[tokio::test]
    async fn test_emit_custom_event() {
        let factory = factory();
        let ctx = factory.build(&manifest("demo", PermissionSet::new()), Path::new("/p/demo"), Map::new());
        ctx.emit("refreshed", json!({ "count": 1 })).await;

        let history = ctx.event_bus().history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].event_type, EventType::Custom);
        assert_eq!(history[0].plugin_id(), Some("demo"));
        assert_eq!(history[0].data["name"], "refreshed");
    }
}
