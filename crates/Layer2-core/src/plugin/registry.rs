//! Plugin Registry - 로드된 플러그인 레코드 저장소
//!
//! 레코드는 플러그인 ID로 식별되며 런타임 인스턴스당 ID 하나에 최대 하나만 존재한다.
//! 외부에는 [`PluginSnapshot`] 복사본만 노출한다.

use super::context::PluginContext;
use super::manifest::{PluginManifest, PluginType};
use super::module::{Component, ModuleHandle};
use super::service::ServiceKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

// ============================================================================
// PluginStatus
// ============================================================================

/// 플러그인 라이프사이클 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginStatus {
    /// 비활성 (설정에서 꺼짐 / 언로드 직전)
    Inactive,
    /// 임포트/초기화 진행 중
    Loading,
    /// 사용 가능
    Active,
    /// 실패 (원인 메시지 보존)
    Error,
}

impl PluginStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Loading => "loading",
            Self::Active => "active",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// LoadedPlugin
// ============================================================================

/// 플러그인 레코드
pub struct LoadedPlugin {
    pub manifest: PluginManifest,

    /// 정규화된 모듈 (ACTIVE에 도달한 적이 있을 때만)
    pub module: Option<ModuleHandle>,

    /// ACTIVE 진입 시 모듈이 export한 컴포넌트
    pub component: Option<Component>,

    pub status: PluginStatus,

    pub context: Option<Arc<PluginContext>>,

    /// 실패 원인 (ERROR일 때만)
    pub error: Option<String>,

    /// ACTIVE 진입 시각
    pub loaded_at: Option<DateTime<Utc>>,

    pub plugin_dir: PathBuf,

    /// hybrid 서비스 초기화 완료 여부
    pub services_initialized: bool,

    /// 레코드 생성 순서
    pub load_order: usize,
}

impl LoadedPlugin {
    pub fn new(manifest: PluginManifest, plugin_dir: PathBuf, status: PluginStatus) -> Self {
        Self {
            manifest,
            module: None,
            component: None,
            status,
            context: None,
            error: None,
            loaded_at: None,
            plugin_dir,
            services_initialized: false,
            load_order: 0,
        }
    }

    fn snapshot(&self) -> PluginSnapshot {
        PluginSnapshot {
            id: self.manifest.id.clone(),
            name: self.manifest.name.clone(),
            version: self.manifest.version.clone(),
            description: self.manifest.description.clone(),
            plugin_type: self.manifest.plugin_type,
            status: self.status,
            error: self.error.clone(),
            loaded_at: self.loaded_at,
            permissions: self.manifest.permissions.to_strings(),
            dependencies: self.manifest.dependencies.clone(),
            has_component: self.status == PluginStatus::Active && self.component.is_some(),
            services: Vec::new(),
            services_initialized: self.services_initialized,
            plugin_dir: self.plugin_dir.clone(),
        }
    }
}

/// 락 밖에서 훅을 호출하기 위한 레코드 사본
#[derive(Clone)]
pub struct PluginHandles {
    pub manifest: PluginManifest,
    pub status: PluginStatus,
    pub module: Option<ModuleHandle>,
    pub component: Option<Component>,
    pub context: Option<Arc<PluginContext>>,
    pub plugin_dir: PathBuf,
    pub services_initialized: bool,
}

// ============================================================================
// Snapshot / Stats
// ============================================================================

/// 레코드의 읽기 전용 복사본
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSnapshot {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    #[serde(rename = "type")]
    pub plugin_type: PluginType,
    pub status: PluginStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loaded_at: Option<DateTime<Utc>>,
    pub permissions: Vec<String>,
    pub dependencies: Vec<String>,
    pub has_component: bool,
    /// 이 플러그인이 제공 중인 서비스
    pub services: Vec<ServiceKey>,
    pub services_initialized: bool,
    pub plugin_dir: PathBuf,
}

/// 집계 통계
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginStats {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
    pub loading: usize,
    pub error: usize,
    pub by_type: BTreeMap<PluginType, usize>,
}

impl PluginStats {
    fn record(&mut self, status: PluginStatus, plugin_type: PluginType) {
        self.total += 1;
        match status {
            PluginStatus::Active => self.active += 1,
            PluginStatus::Inactive => self.inactive += 1,
            PluginStatus::Loading => self.loading += 1,
            PluginStatus::Error => self.error += 1,
        }
        *self.by_type.entry(plugin_type).or_default() += 1;
    }
}

// ============================================================================
// PluginRegistry
// ============================================================================

/// 플러그인 레지스트리
#[derive(Default)]
pub struct PluginRegistry {
    plugins: RwLock<HashMap<String, LoadedPlugin>>,
    load_counter: AtomicUsize,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 레코드 삽입 (이미 있으면 false)
    pub async fn insert(&self, mut record: LoadedPlugin) -> bool {
        let mut plugins = self.plugins.write().await;
        let id = record.manifest.id.clone();

        if plugins.contains_key(&id) {
            warn!("Plugin {} is already registered", id);
            return false;
        }

        record.load_order = self.load_counter.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Registered plugin record {} ({})", id, record.status);
        plugins.insert(id, record);
        true
    }

    /// 레코드 제거
    pub async fn remove(&self, id: &str) -> Option<LoadedPlugin> {
        let removed = self.plugins.write().await.remove(id);
        if removed.is_some() {
            info!("Removed plugin record: {}", id);
        }
        removed
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.plugins.read().await.contains_key(id)
    }

    pub async fn status(&self, id: &str) -> Option<PluginStatus> {
        self.plugins.read().await.get(id).map(|p| p.status)
    }

    pub async fn set_status(&self, id: &str, status: PluginStatus) -> bool {
        let mut plugins = self.plugins.write().await;
        match plugins.get_mut(id) {
            Some(record) => {
                debug!("Plugin {} status {} -> {}", id, record.status, status);
                record.status = status;
                true
            }
            None => false,
        }
    }

    /// LOADING → ACTIVE
    pub async fn mark_active(
        &self,
        id: &str,
        module: ModuleHandle,
        component: Option<Component>,
        context: Arc<PluginContext>,
    ) -> bool {
        let mut plugins = self.plugins.write().await;
        match plugins.get_mut(id) {
            Some(record) => {
                record.module = Some(module);
                record.component = component;
                record.context = Some(context);
                record.status = PluginStatus::Active;
                record.error = None;
                record.loaded_at = Some(Utc::now());
                true
            }
            None => false,
        }
    }

    /// → ERROR (원인 메시지 그대로 보존)
    pub async fn mark_error(&self, id: &str, message: impl Into<String>) -> bool {
        let mut plugins = self.plugins.write().await;
        match plugins.get_mut(id) {
            Some(record) => {
                record.status = PluginStatus::Error;
                record.error = Some(message.into());
                true
            }
            None => false,
        }
    }

    pub async fn mark_services_initialized(&self, id: &str) -> bool {
        let mut plugins = self.plugins.write().await;
        match plugins.get_mut(id) {
            Some(record) => {
                record.services_initialized = true;
                true
            }
            None => false,
        }
    }

    /// 레코드에서 훅 호출에 필요한 부분만 복사
    pub async fn handles(&self, id: &str) -> Option<PluginHandles> {
        self.plugins.read().await.get(id).map(|r| PluginHandles {
            manifest: r.manifest.clone(),
            status: r.status,
            module: r.module.clone(),
            component: r.component.clone(),
            context: r.context.clone(),
            plugin_dir: r.plugin_dir.clone(),
            services_initialized: r.services_initialized,
        })
    }

    pub async fn manifest(&self, id: &str) -> Option<PluginManifest> {
        self.plugins.read().await.get(id).map(|r| r.manifest.clone())
    }

    pub async fn snapshot(&self, id: &str) -> Option<PluginSnapshot> {
        self.plugins.read().await.get(id).map(LoadedPlugin::snapshot)
    }

    /// 전체 스냅샷 (로드 순서대로)
    pub async fn snapshots(&self) -> Vec<PluginSnapshot> {
        let plugins = self.plugins.read().await;
        let mut records: Vec<&LoadedPlugin> = plugins.values().collect();
        records.sort_by_key(|r| r.load_order);
        records.into_iter().map(LoadedPlugin::snapshot).collect()
    }

    pub async fn stats(&self) -> PluginStats {
        let mut stats = PluginStats::default();
        for record in self.plugins.read().await.values() {
            stats.record(record.status, record.manifest.plugin_type);
        }
        stats
    }

    /// 로드 순서대로 ID 목록
    pub async fn ids(&self) -> Vec<String> {
        let plugins = self.plugins.read().await;
        let mut records: Vec<&LoadedPlugin> = plugins.values().collect();
        records.sort_by_key(|r| r.load_order);
        records.into_iter().map(|r| r.manifest.id.clone()).collect()
    }

    pub async fn len(&self) -> usize {
        self.plugins.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.plugins.read().await.is_empty()
    }
}
