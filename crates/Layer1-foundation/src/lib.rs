//! # harbor-foundation
//!
//! Foundation layer for Harbor:
//! - Error: 플러그인 런타임 에러 분류 (Manifest, Permission, ModuleLoad, ...)
//! - Permission: 고정 권한 화이트리스트와 권한 집합
//! - Event: 라이프사이클 이벤트 버스
//! - Config: 호스트 설정, 플러그인 설정 협력자
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  harbor-core (Plugin Runtime)                            │
//! │    │            │               │                         │
//! │    ▼            ▼               ▼                         │
//! │  Permission   EventBus     SettingsProvider               │
//! │  (whitelist)  (broadcast)  (HostConfig / MemorySettings)  │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod permission;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{
    ConfigLoader, HostConfig, MemorySettings, PluginSettings, SettingsProvider, CONFIG_DIR_NAME,
};

// ============================================================================
// Event (이벤트)
// ============================================================================
pub use event::{EventBus, EventBusConfig, EventListener, EventType, PluginEvent};

// ============================================================================
// Permission (권한 시스템)
// ============================================================================
pub use permission::{Permission, PermissionSet, PERMISSION_WHITELIST};
