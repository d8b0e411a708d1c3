//! Event System - 라이프사이클 이벤트 발행/구독
//!
//! 플러그인 런타임은 주입받은 [`EventBus`]로 `plugin:loading`, `plugin:loaded`,
//! `plugin:error`, `plugin:unloaded`를 발행한다.
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        EventBus                              │
//! │  publish(event) ──┬── history (최근 N개)                      │
//! │                   ├── broadcast::Sender ──▶ receiver()       │
//! │                   └── EventListener 1..N (타입 필터)           │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod bus;
pub mod types;

pub use bus::{EventBus, EventBusConfig, EventListener, ListenerId};
pub use types::{
    error_event, loaded_event, loading_event, unloaded_event, EventType, PluginEvent,
};
