//! Host Config - 호스트 설정 및 플러그인 설정 협력자

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// 설정 파일 이름
pub const SETTINGS_FILE: &str = "settings.json";

/// 로컬(gitignored) 설정 파일 이름
pub const LOCAL_SETTINGS_FILE: &str = "settings.local.json";

// ============================================================================
// SettingsProvider - 외부 설정 협력자
// ============================================================================

/// 플러그인별 활성화 플래그와 저장된 설정을 제공하는 협력자
///
/// 런타임은 읽기만 하며 절대 쓰지 않는다.
pub trait SettingsProvider: Send + Sync {
    /// 플러그인 활성화 여부
    fn is_enabled(&self, plugin_id: &str) -> bool;

    /// 사용자가 저장한 설정 (없으면 None)
    fn plugin_config(&self, plugin_id: &str) -> Option<Map<String, Value>>;
}

// ============================================================================
// PluginSettings
// ============================================================================

/// 플러그인 하나의 저장된 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSettings {
    /// 활성화 여부
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// 사용자 설정 (raw)
    #[serde(default)]
    pub config: Map<String, Value>,
}

fn default_true() -> bool {
    true
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            config: Map::new(),
        }
    }
}

// ============================================================================
// HostConfig
// ============================================================================

/// 호스트 통합 설정 (settings.json)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostConfig {
    /// 플러그인 디렉토리
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugins_dir: Option<PathBuf>,

    /// 플러그인별 import/init 제한 시간 (밀리초, 없으면 무제한)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_timeout_ms: Option<u64>,

    /// 플러그인별 설정
    #[serde(default)]
    pub plugins: HashMap<String, PluginSettings>,
}

impl HostConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 로드 제한 시간
    pub fn load_timeout(&self) -> Option<Duration> {
        self.load_timeout_ms.map(Duration::from_millis)
    }

    /// 플러그인 설정 조회
    pub fn plugin(&self, plugin_id: &str) -> Option<&PluginSettings> {
        self.plugins.get(plugin_id)
    }

    /// 빌더 패턴: 플러그인 설정 추가
    pub fn with_plugin(mut self, plugin_id: impl Into<String>, settings: PluginSettings) -> Self {
        self.plugins.insert(plugin_id.into(), settings);
        self
    }
}

impl SettingsProvider for HostConfig {
    fn is_enabled(&self, plugin_id: &str) -> bool {
        self.plugins.get(plugin_id).map_or(true, |s| s.enabled)
    }

    fn plugin_config(&self, plugin_id: &str) -> Option<Map<String, Value>> {
        self.plugins
            .get(plugin_id)
            .filter(|s| !s.config.is_empty())
            .map(|s| s.config.clone())
    }
}

/// 두 설정 병합 (later가 earlier를 오버라이드)
pub fn merge_configs(earlier: HostConfig, later: HostConfig) -> HostConfig {
    HostConfig {
        plugins_dir: later.plugins_dir.or(earlier.plugins_dir),
        load_timeout_ms: later.load_timeout_ms.or(earlier.load_timeout_ms),
        plugins: {
            let mut merged = earlier.plugins;
            merged.extend(later.plugins);
            merged
        },
    }
}

// ============================================================================
// MemorySettings
// ============================================================================

/// 메모리 기반 설정 (임베딩 호스트/테스트용)
#[derive(Debug, Clone, Default)]
pub struct MemorySettings {
    plugins: HashMap<String, PluginSettings>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// 빌더 패턴: 비활성화
    pub fn disabled(mut self, plugin_id: impl Into<String>) -> Self {
        self.plugins.entry(plugin_id.into()).or_default().enabled = false;
        self
    }

    /// 빌더 패턴: 사용자 설정
    pub fn with_config(mut self, plugin_id: impl Into<String>, config: Value) -> Self {
        if let Value::Object(map) = config {
            self.plugins.entry(plugin_id.into()).or_default().config = map;
        }
        self
    }
}

impl SettingsProvider for MemorySettings {
    fn is_enabled(&self, plugin_id: &str) -> bool {
        self.plugins.get(plugin_id).map_or(true, |s| s.enabled)
    }

    fn plugin_config(&self, plugin_id: &str) -> Option<Map<String, Value>> {
        self.plugins
            .get(plugin_id)
            .filter(|s| !s.config.is_empty())
            .map(|s| s.config.clone())
    }
}
