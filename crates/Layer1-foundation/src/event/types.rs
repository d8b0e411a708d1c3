//! Event Types - 플러그인 라이프사이클 이벤트 정의

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// EventType
// ============================================================================

/// 이벤트 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// 매니페스트 검증 완료, 모듈 import 시작
    #[serde(rename = "plugin:loading")]
    PluginLoading,

    /// 초기화 성공 (ACTIVE)
    #[serde(rename = "plugin:loaded")]
    PluginLoaded,

    /// 로드/초기화 실패 (ERROR)
    #[serde(rename = "plugin:error")]
    PluginError,

    /// 명시적 언로드 완료
    #[serde(rename = "plugin:unloaded")]
    PluginUnloaded,

    /// 플러그인이 컨텍스트를 통해 발행하는 사용자 정의 이벤트
    #[serde(rename = "custom")]
    Custom,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PluginLoading => write!(f, "plugin:loading"),
            Self::PluginLoaded => write!(f, "plugin:loaded"),
            Self::PluginError => write!(f, "plugin:error"),
            Self::PluginUnloaded => write!(f, "plugin:unloaded"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

// ============================================================================
// PluginEvent
// ============================================================================

/// 플러그인 이벤트 (직렬화 가능한 최소 페이로드)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginEvent {
    /// 이벤트 고유 ID
    pub id: String,

    /// 이벤트 타입
    pub event_type: EventType,

    /// 이벤트 데이터
    pub data: Value,

    /// 타임스탬프
    pub timestamp: DateTime<Utc>,

    /// 소스 (이벤트 발생 위치)
    pub source: String,
}

impl PluginEvent {
    /// 새 이벤트 생성
    pub fn new(event_type: EventType, data: Value, source: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_type,
            data,
            timestamp: Utc::now(),
            source: source.into(),
        }
    }

    /// 페이로드의 pluginId
    pub fn plugin_id(&self) -> Option<&str> {
        self.data.get("pluginId").and_then(Value::as_str)
    }
}

// ============================================================================
// 헬퍼 함수
// ============================================================================

const RUNTIME_SOURCE: &str = "plugin_runtime";

/// `plugin:loading` 이벤트
pub fn loading_event(plugin_id: &str) -> PluginEvent {
    PluginEvent::new(
        EventType::PluginLoading,
        serde_json::json!({ "pluginId": plugin_id }),
        RUNTIME_SOURCE,
    )
}

/// `plugin:loaded` 이벤트
pub fn loaded_event(plugin_id: &str, plugin_type: &str, version: &str) -> PluginEvent {
    PluginEvent::new(
        EventType::PluginLoaded,
        serde_json::json!({
            "pluginId": plugin_id,
            "type": plugin_type,
            "version": version,
        }),
        RUNTIME_SOURCE,
    )
}

/// `plugin:error` 이벤트
pub fn error_event(plugin_id: &str, error: &str) -> PluginEvent {
    PluginEvent::new(
        EventType::PluginError,
        serde_json::json!({
            "pluginId": plugin_id,
            "error": error,
        }),
        RUNTIME_SOURCE,
    )
}

/// `plugin:unloaded` 이벤트
pub fn unloaded_event(plugin_id: &str) -> PluginEvent {
    PluginEvent::new(
        EventType::PluginUnloaded,
        serde_json::json!({ "pluginId": plugin_id }),
        RUNTIME_SOURCE,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_wire_names() {
        assert_eq!(EventType::PluginLoading.to_string(), "plugin:loading");
        let json = serde_json::to_string(&EventType::PluginUnloaded).unwrap();
        assert_eq!(json, r#""plugin:unloaded""#);
    }

    #[test]
    fn test_loaded_payload() {
        let event = loaded_event("demo", "simple", "1.0.0");
        assert_eq!(event.plugin_id(), Some("demo"));
        assert_eq!(event.data["type"], "simple");
        assert_eq!(event.data["version"], "1.0.0");
    }
}
