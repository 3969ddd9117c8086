// ==========================================
// 服装工厂 ERP - 实时库接口与内存实现
// ==========================================
// 路径形如 "operators/OP-1"，值为 JSON
// set/update/remove 均幂等，可安全重放
// ==========================================

use crate::realtime::error::{RealtimeError, RealtimeResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{broadcast, RwLock};

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// 路径变更通知（value 为 None 表示删除）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeChange {
    pub path: String,
    pub value: Option<JsonValue>,
}

impl RealtimeChange {
    /// 是否位于给定前缀之下（"operators" 匹配 "operators/OP-1"）
    pub fn matches(&self, prefix: &str) -> bool {
        let prefix = prefix.trim_matches('/');
        prefix.is_empty()
            || self.path == prefix
            || self
                .path
                .strip_prefix(prefix)
                .map(|rest| rest.starts_with('/'))
                .unwrap_or(false)
    }
}

#[async_trait]
pub trait RealtimeStore: Send + Sync {
    async fn get(&self, path: &str) -> RealtimeResult<Option<JsonValue>>;

    /// 整体覆盖
    async fn set(&self, path: &str, value: JsonValue) -> RealtimeResult<()>;

    /// 字段合并（目标不存在或不是对象时等同 set）
    async fn update(&self, path: &str, fields: JsonValue) -> RealtimeResult<()>;

    async fn remove(&self, path: &str) -> RealtimeResult<()>;

    fn subscribe(&self) -> broadcast::Receiver<RealtimeChange>;
}

fn normalize_path(path: &str) -> RealtimeResult<String> {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() || trimmed.split('/').any(|seg| seg.is_empty()) {
        return Err(RealtimeError::InvalidPath(path.to_string()));
    }
    Ok(trimmed.to_string())
}

// ==========================================
// MemoryRealtimeStore - 进程内实现
// ==========================================
pub struct MemoryRealtimeStore {
    data: RwLock<BTreeMap<String, JsonValue>>,
    changes: broadcast::Sender<RealtimeChange>,
    offline: AtomicBool,
}

impl MemoryRealtimeStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            data: RwLock::new(BTreeMap::new()),
            changes,
            offline: AtomicBool::new(false),
        }
    }

    /// 模拟断线: 离线期间所有读写返回 Unavailable
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    fn ensure_online(&self) -> RealtimeResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RealtimeError::Unavailable("memory store offline".to_string()));
        }
        Ok(())
    }

    fn broadcast(&self, path: String, value: Option<JsonValue>) {
        // 无订阅者时 send 返回 Err，忽略
        let _ = self.changes.send(RealtimeChange { path, value });
    }
}

impl Default for MemoryRealtimeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RealtimeStore for MemoryRealtimeStore {
    async fn get(&self, path: &str) -> RealtimeResult<Option<JsonValue>> {
        self.ensure_online()?;
        let path = normalize_path(path)?;
        Ok(self.data.read().await.get(&path).cloned())
    }

    async fn set(&self, path: &str, value: JsonValue) -> RealtimeResult<()> {
        self.ensure_online()?;
        let path = normalize_path(path)?;
        self.data.write().await.insert(path.clone(), value.clone());
        self.broadcast(path, Some(value));
        Ok(())
    }

    async fn update(&self, path: &str, fields: JsonValue) -> RealtimeResult<()> {
        self.ensure_online()?;
        let path = normalize_path(path)?;
        let merged = {
            let mut data = self.data.write().await;
            let merged = match (data.get(&path), fields) {
                (Some(JsonValue::Object(existing)), JsonValue::Object(fields)) => {
                    let mut existing = existing.clone();
                    existing.extend(fields);
                    JsonValue::Object(existing)
                }
                (_, fields) => fields,
            };
            data.insert(path.clone(), merged.clone());
            merged
        };
        self.broadcast(path, Some(merged));
        Ok(())
    }

    async fn remove(&self, path: &str) -> RealtimeResult<()> {
        self.ensure_online()?;
        let path = normalize_path(path)?;
        let removed = self.data.write().await.remove(&path);
        if removed.is_some() {
            self.broadcast(path, None);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<RealtimeChange> {
        self.changes.subscribe()
    }
}
