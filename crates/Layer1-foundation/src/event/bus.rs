//! Event Bus - 이벤트 브로드캐스트 시스템
//!
//! 비동기 이벤트 발행/구독 시스템을 제공합니다.
//! 런타임은 버스를 소유하지 않고 `Arc<EventBus>`로 주입받아 발행만 한다.

use super::types::{EventType, PluginEvent};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, trace};

// ============================================================================
// EventListener Trait
// ============================================================================

/// 이벤트 리스너 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// 이벤트 리스너 trait
#[async_trait]
pub trait EventListener: Send + Sync {
    /// 리스너 이름 (디버깅용)
    fn name(&self) -> &str;

    /// 관심 있는 이벤트 타입 (None이면 모든 이벤트)
    fn event_types(&self) -> Option<Vec<EventType>> {
        None
    }

    /// 이벤트 처리
    async fn on_event(&self, event: &PluginEvent);
}

// ============================================================================
// EventBus
// ============================================================================

/// 이벤트 버스 설정
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// 브로드캐스트 채널 용량
    pub channel_capacity: usize,

    /// 이벤트 히스토리 보관 개수
    pub history_size: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            history_size: 256,
        }
    }
}

/// 이벤트 버스 - 이벤트 발행 및 구독 관리
pub struct EventBus {
    /// 설정
    config: EventBusConfig,

    /// 브로드캐스트 채널 송신자
    sender: broadcast::Sender<PluginEvent>,

    /// 등록된 리스너
    listeners: RwLock<HashMap<ListenerId, Arc<dyn EventListener>>>,

    /// 리스너 ID 카운터
    listener_counter: AtomicU64,

    /// 이벤트 히스토리 (최근 N개)
    history: RwLock<Vec<PluginEvent>>,

    /// 발행된 이벤트 수
    event_count: AtomicU64,
}

impl EventBus {
    /// 기본 설정으로 이벤트 버스 생성
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// 커스텀 설정으로 이벤트 버스 생성
    pub fn with_config(config: EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            history: RwLock::new(Vec::with_capacity(config.history_size)),
            config,
            sender,
            listeners: RwLock::new(HashMap::new()),
            listener_counter: AtomicU64::new(0),
            event_count: AtomicU64::new(0),
        }
    }

    /// 리스너 등록
    pub async fn subscribe(&self, listener: Arc<dyn EventListener>) -> ListenerId {
        let id = ListenerId(self.listener_counter.fetch_add(1, Ordering::SeqCst));

        debug!(
            listener_name = listener.name(),
            listener_id = %id,
            "Registering event listener"
        );

        self.listeners.write().await.insert(id, listener);
        id
    }

    /// 리스너 해제
    pub async fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.write().await.remove(&id).is_some()
    }

    /// 이벤트 발행
    pub async fn publish(&self, event: PluginEvent) {
        trace!(event_type = %event.event_type, source = %event.source, "Publishing event");
        self.event_count.fetch_add(1, Ordering::SeqCst);

        {
            let mut history = self.history.write().await;
            if self.config.history_size > 0 {
                if history.len() >= self.config.history_size {
                    history.remove(0);
                }
                history.push(event.clone());
            }
        }

        // 구독자가 없어도 OK
        let _ = self.sender.send(event.clone());

        // 리스너 목록은 복사해 두고 락 없이 호출
        let listeners: Vec<Arc<dyn EventListener>> =
            self.listeners.read().await.values().cloned().collect();

        for listener in listeners {
            let interested = listener
                .event_types()
                .map_or(true, |types| types.contains(&event.event_type));
            if interested {
                listener.on_event(&event).await;
            }
        }
    }

    /// 이벤트 스트림 구독
    pub fn receiver(&self) -> broadcast::Receiver<PluginEvent> {
        self.sender.subscribe()
    }

    /// 이벤트 히스토리 조회
    pub async fn history(&self) -> Vec<PluginEvent> {
        self.history.read().await.clone()
    }

    /// 특정 플러그인의 이벤트 히스토리
    pub async fn history_for(&self, plugin_id: &str) -> Vec<PluginEvent> {
        self.history
            .read()
            .await
            .iter()
            .filter(|e| e.plugin_id() == Some(plugin_id))
            .cloned()
            .collect()
    }

    /// 히스토리 클리어
    pub async fn clear_history(&self) {
        self.history.write().await.clear();
    }

    /// 발행된 이벤트 수
    pub fn event_count(&self) -> u64 {
        self.event_count.load(Ordering::SeqCst)
    }

    /// 등록된 리스너 수
    pub async fn listener_count(&self) -> usize {
        self.listeners.read().await.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
