//! Config - 호스트 설정 관리
//!
//! - `host.rs` - HostConfig 통합 설정, SettingsProvider 협력자
//! - `loader.rs` - user / project / local 계층 로더

mod host;
mod loader;

pub use host::{
    merge_configs, HostConfig, MemorySettings, PluginSettings, SettingsProvider,
    LOCAL_SETTINGS_FILE, SETTINGS_FILE,
};
pub use loader::{load_config_from_file, strip_json_comments, ConfigLoader, CONFIG_DIR_NAME};
