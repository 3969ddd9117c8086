// ==========================================
// 服装工厂 ERP - 事件通道
// ==========================================
// EventTransport: connect / authenticate / emit / subscribe
// LocalEventHub: 进程内 tokio broadcast 实现，同时作为 ErpEventPublisher
// 重连: 固定间隔、有限次数
// ==========================================

use crate::engine::events::{ErpEvent, ErpEventPublisher};
use crate::realtime::error::{RealtimeError, RealtimeResult};
use async_trait::async_trait;
use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[async_trait]
pub trait EventTransport: Send + Sync {
    async fn connect(&self) -> RealtimeResult<()>;
    async fn authenticate(&self, token: &str) -> RealtimeResult<()>;
    async fn emit(&self, event: &ErpEvent) -> RealtimeResult<()>;
    fn subscribe(&self) -> broadcast::Receiver<ErpEvent>;
    fn is_connected(&self) -> bool;
}

// ==========================================
// 重连策略
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// 首次失败后的最大重试次数
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff: Duration::from_millis(2_000),
        }
    }
}

/// 连接事件通道，失败后按固定间隔重试
///
/// # 返回
/// - Ok(attempts): 成功时的累计尝试次数
/// - Err(ConnectFailed): 超过重试上限
pub async fn connect_with_retry(
    transport: &dyn EventTransport,
    policy: ReconnectPolicy,
) -> RealtimeResult<u32> {
    let mut attempts = 0;
    loop {
        attempts += 1;
        match transport.connect().await {
            Ok(()) => {
                if attempts > 1 {
                    tracing::info!(attempts, "事件通道重连成功");
                }
                return Ok(attempts);
            }
            Err(e) if attempts > policy.max_retries => {
                tracing::error!(attempts, error = %e, "事件通道连接失败，放弃重试");
                return Err(RealtimeError::ConnectFailed {
                    attempts,
                    last_error: e.to_string(),
                });
            }
            Err(e) => {
                tracing::warn!(
                    attempts,
                    backoff_ms = policy.backoff.as_millis() as u64,
                    error = %e,
                    "事件通道连接失败，等待重试"
                );
                tokio::time::sleep(policy.backoff).await;
            }
        }
    }
}

// ==========================================
// LocalEventHub - 进程内事件通道
// ==========================================
pub struct LocalEventHub {
    sender: broadcast::Sender<ErpEvent>,
    connected: AtomicBool,
    expected_token: Option<String>,
    authenticated_as: Mutex<Option<String>>,
}

impl LocalEventHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            sender,
            connected: AtomicBool::new(false),
            expected_token: None,
            authenticated_as: Mutex::new(None),
        }
    }

    /// 已连接状态的通道（进程内默认场景）
    pub fn connected() -> Self {
        let hub = Self::new();
        hub.connected.store(true, Ordering::SeqCst);
        hub
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.expected_token = Some(token.into());
        self
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn broadcast(&self, event: ErpEvent) -> RealtimeResult<()> {
        if !self.is_connected() {
            return Err(RealtimeError::Transport("event hub not connected".to_string()));
        }
        if self.sender.send(event).is_err() {
            tracing::debug!("事件通道无订阅者，事件丢弃");
        }
        Ok(())
    }
}

impl Default for LocalEventHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventTransport for LocalEventHub {
    async fn connect(&self) -> RealtimeResult<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn authenticate(&self, token: &str) -> RealtimeResult<()> {
        if let Some(expected) = &self.expected_token {
            if expected != token {
                return Err(RealtimeError::AuthFailed("token mismatch".to_string()));
            }
        }
        let mut guard = self
            .authenticated_as
            .lock()
            .map_err(|e| RealtimeError::Transport(e.to_string()))?;
        *guard = Some(token.to_string());
        Ok(())
    }

    async fn emit(&self, event: &ErpEvent) -> RealtimeResult<()> {
        self.broadcast(event.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<ErpEvent> {
        self.sender.subscribe()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl ErpEventPublisher for LocalEventHub {
    fn publish(&self, event: ErpEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        let event_type = event.event_type.as_str().to_string();
        self.broadcast(event)?;
        let delivery_id = Uuid::new_v4().to_string();
        tracing::debug!(delivery_id = %delivery_id, event_type = %event_type, "事件已发布");
        Ok(delivery_id)
    }
}
