//! Service Registry - 플러그인 간 서비스 등록/조회/호출
//!
//! 서비스는 `(name, version)` 키로 식별되며 한 키에는 단 하나의 제공자만 존재한다.
//! 호출 시에는 메서드별 `requiresPermission`을 호출자 권한과 대조한다.
//! 핸들러 호출 중에는 레지스트리 락을 잡지 않는다.

use super::manifest::{PluginVersion, ServiceDefinition};
use super::module::ServiceHandler;
use chrono::{DateTime, Utc};
use harbor_foundation::{Error, PermissionSet, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

// ============================================================================
// ServiceKey
// ============================================================================

/// 서비스 식별 키
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceKey {
    pub name: String,
    pub version: String,
}

impl ServiceKey {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl std::fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

// ============================================================================
// ServiceHandle
// ============================================================================

/// 조회된 서비스
#[derive(Clone)]
pub struct ServiceHandle {
    provider: String,
    definition: ServiceDefinition,
    implementation: Arc<dyn ServiceHandler>,
}

impl ServiceHandle {
    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn definition(&self) -> &ServiceDefinition {
        &self.definition
    }

    pub fn key(&self) -> ServiceKey {
        ServiceKey::new(&self.definition.name, &self.definition.version)
    }

    /// 호출 권한 확인
    pub fn authorize(&self, consumer: &PermissionSet, method: &str) -> Result<()> {
        let spec = self.definition.methods.get(method).ok_or_else(|| {
            Error::NotFound(format!("method '{}' on service {}", method, self.key()))
        })?;

        if let Some(required) = spec.requires_permission {
            if !consumer.contains(required) {
                return Err(Error::permission_denied(
                    format!("calling {}.{}", self.key(), method),
                    required.as_str(),
                ));
            }
        }

        Ok(())
    }

    /// 권한 확인 후 호출
    pub async fn call(&self, consumer: &PermissionSet, method: &str, args: Value) -> Result<Value> {
        self.authorize(consumer, method)?;
        self.implementation.call(method, args).await
    }
}

impl std::fmt::Debug for ServiceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceHandle")
            .field("provider", &self.provider)
            .field("service", &self.key())
            .finish()
    }
}

/// 등록 정보 스냅샷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub provider: String,
    pub description: String,
    pub methods: Vec<String>,
    pub registered_at: DateTime<Utc>,
}

struct ServiceRegistration {
    provider: String,
    definition: ServiceDefinition,
    implementation: Arc<dyn ServiceHandler>,
    registered_at: DateTime<Utc>,
}

impl ServiceRegistration {
    fn handle(&self) -> ServiceHandle {
        ServiceHandle {
            provider: self.provider.clone(),
            definition: self.definition.clone(),
            implementation: Arc::clone(&self.implementation),
        }
    }

    fn info(&self) -> ServiceInfo {
        ServiceInfo {
            name: self.definition.name.clone(),
            version: self.definition.version.clone(),
            provider: self.provider.clone(),
            description: self.definition.description.clone(),
            methods: self.definition.methods.keys().cloned().collect(),
            registered_at: self.registered_at,
        }
    }
}

// ============================================================================
// ServiceRegistry
// ============================================================================

/// 서비스 레지스트리 (런타임 인스턴스당 하나)
#[derive(Default)]
pub struct ServiceRegistry {
    services: RwLock<HashMap<ServiceKey, ServiceRegistration>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 서비스 등록
    ///
    /// `granted`는 제공자가 부여받은 권한이며 정의의 `permissions`를 모두 포함해야 한다.
    /// 같은 키가 이미 등록되어 있으면 제공자와 관계없이 거부된다.
    pub async fn register(
        &self,
        provider: &str,
        definition: ServiceDefinition,
        implementation: Arc<dyn ServiceHandler>,
        granted: &PermissionSet,
    ) -> Result<()> {
        let key = ServiceKey::new(&definition.name, &definition.version);

        if let Some(missing) = granted.missing_from(&definition.permissions).first() {
            return Err(Error::permission_denied(
                format!("registering service {} by '{}'", key, provider),
                missing.as_str(),
            ));
        }

        let mut services = self.services.write().await;
        if let Some(existing) = services.get(&key) {
            return Err(Error::ServiceConflict {
                name: key.name,
                version: key.version,
                provider: existing.provider.clone(),
            });
        }

        info!("Service {} registered by {}", key, provider);
        services.insert(
            key,
            ServiceRegistration {
                provider: provider.to_string(),
                definition,
                implementation,
                registered_at: Utc::now(),
            },
        );
        Ok(())
    }

    /// 서비스 해제 (없거나 다른 제공자 소유면 no-op)
    pub async fn unregister(&self, provider: &str, name: &str, version: &str) -> bool {
        let key = ServiceKey::new(name, version);
        let mut services = self.services.write().await;

        match services.get(&key) {
            Some(reg) if reg.provider == provider => {
                services.remove(&key);
                debug!("Service {} unregistered by {}", key, provider);
                true
            }
            Some(reg) => {
                warn!(
                    "{} tried to unregister {} owned by {}",
                    provider, key, reg.provider
                );
                false
            }
            None => false,
        }
    }

    /// 제공자의 모든 서비스 해제
    pub async fn unregister_provider(&self, provider: &str) -> Vec<ServiceKey> {
        let mut services = self.services.write().await;
        let keys: Vec<ServiceKey> = services
            .iter()
            .filter(|(_, reg)| reg.provider == provider)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &keys {
            services.remove(key);
        }

        if !keys.is_empty() {
            info!("Removed {} service(s) provided by {}", keys.len(), provider);
        }
        keys
    }

    /// 서비스 조회
    ///
    /// 버전을 생략하면 가장 높은 semver 버전을 돌려준다.
    pub async fn resolve(&self, name: &str, version: Option<&str>) -> Option<ServiceHandle> {
        let services = self.services.read().await;

        match version {
            Some(version) => services
                .get(&ServiceKey::new(name, version))
                .map(ServiceRegistration::handle),
            None => services
                .iter()
                .filter(|(key, _)| key.name == name)
                .max_by_key(|(key, _)| PluginVersion::parse(&key.version))
                .map(|(_, reg)| reg.handle()),
        }
    }

    /// 서비스 메서드 호출 (권한 확인 포함)
    pub async fn invoke(
        &self,
        consumer: &PermissionSet,
        name: &str,
        version: Option<&str>,
        method: &str,
        args: Value,
    ) -> Result<Value> {
        let handle = self.resolve(name, version).await.ok_or_else(|| {
            Error::NotFound(format!(
                "service {}@{}",
                name,
                version.unwrap_or("*")
            ))
        })?;

        handle.call(consumer, method, args).await
    }

    /// 제공자가 등록한 서비스 키
    pub async fn services_of(&self, provider: &str) -> Vec<ServiceKey> {
        let mut keys: Vec<ServiceKey> = self
            .services
            .read()
            .await
            .iter()
            .filter(|(_, reg)| reg.provider == provider)
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// 전체 목록 (이름/버전 순)
    pub async fn list(&self) -> Vec<ServiceInfo> {
        let mut infos: Vec<ServiceInfo> = self
            .services
            .read()
            .await
            .values()
            .map(ServiceRegistration::info)
            .collect();
        infos.sort_by(|a, b| (&a.name, &a.version).cmp(&(&b.name, &b.version)));
        infos
    }

    pub async fn contains(&self, name: &str, version: &str) -> bool {
        self.services
            .read()
            .await
            .contains_key(&ServiceKey::new(name, version))
    }

    pub async fn len(&self) -> usize {
        self.services.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.services.read().await.is_empty()
    }
}

// ============================================================================
// 테스트
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::manifest::ServiceMethod;
    use crate::plugin::module::FnService;
    use harbor_foundation::Permission;
    use serde_json::json;

    fn echo() -> Arc<dyn ServiceHandler> {
        Arc::new(FnService::new(|method, args| {
            Ok(json!({ "method": method, "args": args }))
        }))
    }

    fn shell(version: &str) -> ServiceDefinition {
        ServiceDefinition::new("shell", version)
            .with_method("run", ServiceMethod::new("run").requires(Permission::SystemExec))
            .with_method("ping", ServiceMethod::new("ping"))
            .with_permissions(PermissionSet::from(Permission::SystemExec))
    }

    fn exec() -> PermissionSet {
        PermissionSet::from(Permission::SystemExec)
    }

    #[tokio::test]
    async fn test_register_and_resolve() {
        let registry = ServiceRegistry::new();
        registry
            .register("runner", shell("1.0.0"), echo(), &exec())
            .await
            .unwrap();

        let handle = registry.resolve("shell", Some("1.0.0")).await.unwrap();
        assert_eq!(handle.provider(), "runner");
        assert!(registry.resolve("shell", Some("2.0.0")).await.is_none());
        assert!(registry.contains("shell", "1.0.0").await);
    }

    #[tokio::test]
    async fn test_conflict_regardless_of_provider() {
        let registry = ServiceRegistry::new();
        registry
            .register("a", shell("1.0.0"), echo(), &exec())
            .await
            .unwrap();

        let err = registry
            .register("b", shell("1.0.0"), echo(), &exec())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ServiceConflict { ref provider, .. } if provider == "a"));

        let err = registry
            .register("a", shell("1.0.0"), echo(), &exec())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ServiceConflict { .. }));

        // 다른 버전은 공존
        registry
            .register("b", shell("1.1.0"), echo(), &exec())
            .await
            .unwrap();
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_register_requires_declared_permissions() {
        let registry = ServiceRegistry::new();
        let err = registry
            .register("runner", shell("1.0.0"), echo(), &PermissionSet::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::PermissionDenied { ref missing, .. } if missing == "system:exec"));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_resolve_highest_version() {
        let registry = ServiceRegistry::new();
        for (provider, version) in [("a", "1.2.0"), ("b", "1.10.0"), ("c", "1.9.3")] {
            registry
                .register(provider, shell(version), echo(), &exec())
                .await
                .unwrap();
        }

        let handle = registry.resolve("shell", None).await.unwrap();
        assert_eq!(handle.definition().version, "1.10.0");
        assert_eq!(handle.provider(), "b");
    }

    #[tokio::test]
    async fn test_invoke_checks_method_permission() {
        let registry = ServiceRegistry::new();
        registry
            .register("runner", shell("1.0.0"), echo(), &exec())
            .await
            .unwrap();

        let denied = registry
            .invoke(&PermissionSet::new(), "shell", None, "run", json!(["ls"]))
            .await
            .unwrap_err();
        assert!(matches!(denied, Error::PermissionDenied { ref missing, .. } if missing == "system:exec"));

        let out = registry
            .invoke(&exec(), "shell", None, "run", json!(["ls"]))
            .await
            .unwrap();
        assert_eq!(out["method"], "run");

        // 요구 권한이 없는 메서드는 누구나 호출 가능
        let out = registry
            .invoke(&PermissionSet::new(), "shell", Some("1.0.0"), "ping", Value::Null)
            .await
            .unwrap();
        assert_eq!(out["method"], "ping");

        let undeclared = registry
            .invoke(&exec(), "shell", None, "format_disk", Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(undeclared, Error::NotFound(_)));

        let missing = registry
            .invoke(&exec(), "nope", None, "run", Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(missing, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unregister_rules() {
        let registry = ServiceRegistry::new();
        registry
            .register("a", shell("1.0.0"), echo(), &exec())
            .await
            .unwrap();
        registry
            .register("a", shell("2.0.0"), echo(), &exec())
            .await
            .unwrap();

        assert!(!registry.unregister("b", "shell", "1.0.0").await);
        assert!(!registry.unregister("a", "ghost", "1.0.0").await);
        assert!(registry.unregister("a", "shell", "1.0.0").await);

        assert_eq!(registry.services_of("a").await, vec![ServiceKey::new("shell", "2.0.0")]);
        assert_eq!(registry.unregister_provider("a").await.len(), 1);
        assert!(registry.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_list_snapshot() {
        let registry = ServiceRegistry::new();
        registry
            .register("runner", shell("1.0.0"), echo(), &exec())
            .await
            .unwrap();

        let list = registry.list().await;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].provider, "runner");
        assert_eq!(list[0].methods, vec!["ping".to_string(), "run".to_string()]);
    }
}
