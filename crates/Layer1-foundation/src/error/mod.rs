//! Error types for Harbor
//!
//! 플러그인 런타임의 모든 에러를 중앙에서 관리

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Harbor 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 매니페스트 관련
    // ========================================================================
    #[error("Invalid manifest for '{plugin_id}': {message}")]
    Manifest { plugin_id: String, message: String },

    #[error("Plugin '{plugin_id}' requests unknown permissions: {}", invalid.join(", "))]
    Permission {
        plugin_id: String,
        invalid: Vec<String>,
    },

    // ========================================================================
    // 모듈 로드 / 초기화 관련
    // ========================================================================
    #[error("Failed to load module '{path}': {message}")]
    ModuleLoad { path: String, message: String },

    /// 플러그인 타입 계약 위반 (메시지는 그대로 노출)
    #[error("{0}")]
    Contract(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    // ========================================================================
    // 서비스 관련
    // ========================================================================
    #[error("Service {name}@{version} is already provided by '{provider}'")]
    ServiceConflict {
        name: String,
        version: String,
        provider: String,
    },

    #[error("Permission denied: '{missing}' is required for {target}")]
    PermissionDenied { target: String, missing: String },

    // ========================================================================
    // 라이프사이클 관련
    // ========================================================================
    #[error("Failed to unload plugin '{plugin_id}': {message}")]
    Unload { plugin_id: String, message: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    // ========================================================================
    // 일반
    // ========================================================================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// 매니페스트 에러 생성 헬퍼
    pub fn manifest(plugin_id: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Manifest {
            plugin_id: plugin_id.into(),
            message: message.into(),
        }
    }

    /// 모듈 로드 에러 생성 헬퍼
    pub fn module_load(path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ModuleLoad {
            path: path.into(),
            message: message.into(),
        }
    }

    /// 계약 위반 에러 생성 헬퍼
    pub fn contract(message: impl Into<String>) -> Self {
        Error::Contract(message.into())
    }

    /// 권한 거부 에러 생성 헬퍼
    pub fn permission_denied(target: impl Into<String>, missing: impl Into<String>) -> Self {
        Error::PermissionDenied {
            target: target.into(),
            missing: missing.into(),
        }
    }

    /// 언로드 에러 생성 헬퍼
    pub fn unload(plugin_id: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Unload {
            plugin_id: plugin_id.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// From 구현 (추가 변환)
// ============================================================================

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}
