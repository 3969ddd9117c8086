// ==========================================
// 服装工厂 ERP - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (scope_id = 'global')
// 解析失败时记录告警并回落默认值
// ==========================================

use crate::db::open_sqlite_connection;
use crate::engine::payment::DEFAULT_EFFICIENCY_THRESHOLD;
use crate::engine::quality::QUALITY_ALERT_THRESHOLD;
use crate::realtime::channel::ReconnectPolicy;
use crate::realtime::relay::DEFAULT_BATCH_SIZE;
use crate::repository::{RepositoryError, RepositoryResult};
use crate::workflow::store::{DEFAULT_SUBSCRIBER_CAPACITY, DEFAULT_WORKFLOW_RETENTION_SECS};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 打开独立连接
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建（再次应用统一 PRAGMA，幂等）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&guard)?;
        }
        Ok(Self { conn })
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 配置（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES ('global', ?1, ?2, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')
            "#,
            params![key, value],
        )?;
        tracing::info!(config_key = key, value = value, "配置已更新");
        Ok(())
    }

    /// 读取并解析；缺失或格式错误时返回默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> RepositoryResult<T>
    where
        T: FromStr,
    {
        let Some(raw) = self.get_global_config_value(key)? else {
            return Ok(default);
        };
        match raw.trim().parse::<T>() {
            Ok(value) => Ok(value),
            Err(_) => {
                tracing::warn!(config_key = key, raw_value = %raw, "配置格式错误，使用默认值");
                Ok(default)
            }
        }
    }

    /// 获取所有配置的快照（JSON 对象，键有序）
    pub fn get_config_snapshot(&self) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }
        Ok(serde_json::to_string(&config_map)?)
    }

    /// 从快照恢复（覆盖同名键，单事务）
    ///
    /// # 返回
    /// - Ok(usize): 恢复的配置项数量
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> RepositoryResult<usize> {
        let config_map: BTreeMap<String, String> = serde_json::from_str(snapshot_json)?;

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let mut count = 0;
        for (key, value) in &config_map {
            count += tx.execute(
                r#"
                INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
                ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')
                "#,
                params![key, value],
            )?;
        }
        tx.commit()?;
        Ok(count)
    }

    // ===== 计件工资 =====

    /// 效率奖励起点（默认 0.9）
    pub fn get_efficiency_bonus_threshold(&self) -> RepositoryResult<f64> {
        self.get_parsed_or_default(
            config_keys::EFFICIENCY_BONUS_THRESHOLD,
            DEFAULT_EFFICIENCY_THRESHOLD,
        )
    }

    // ===== 质量 =====

    /// 质量告警阈值（默认 0.9）
    pub fn get_quality_alert_threshold(&self) -> RepositoryResult<f64> {
        self.get_parsed_or_default(config_keys::QUALITY_ALERT_THRESHOLD, QUALITY_ALERT_THRESHOLD)
    }

    // ===== 流程 =====

    pub fn get_subscriber_channel_capacity(&self) -> RepositoryResult<usize> {
        let capacity = self.get_parsed_or_default(
            config_keys::SUBSCRIBER_CHANNEL_CAPACITY,
            DEFAULT_SUBSCRIBER_CAPACITY,
        )?;
        Ok(capacity.max(1))
    }

    /// 流程超时（秒）；未配置或 0 表示不限
    pub fn get_workflow_timeout(&self) -> RepositoryResult<Option<Duration>> {
        let secs: u64 = self.get_parsed_or_default(config_keys::WORKFLOW_TIMEOUT_SECS, 0)?;
        Ok((secs > 0).then(|| Duration::from_secs(secs)))
    }

    /// 终态流程实例保留期（秒，默认 1 小时）；0 表示不清理
    pub fn get_workflow_retention(&self) -> RepositoryResult<Option<Duration>> {
        let secs: u64 = self.get_parsed_or_default(
            config_keys::WORKFLOW_RETENTION_SECS,
            DEFAULT_WORKFLOW_RETENTION_SECS,
        )?;
        Ok((secs > 0).then(|| Duration::from_secs(secs)))
    }

    // ===== 实时同步 =====

    pub fn get_outbox_batch_size(&self) -> RepositoryResult<usize> {
        let size = self.get_parsed_or_default(config_keys::OUTBOX_BATCH_SIZE, DEFAULT_BATCH_SIZE)?;
        Ok(size.max(1))
    }

    pub fn get_reconnect_policy(&self) -> RepositoryResult<ReconnectPolicy> {
        let default = ReconnectPolicy::default();
        let max_retries =
            self.get_parsed_or_default(config_keys::RECONNECT_MAX_RETRIES, default.max_retries)?;
        let backoff_ms = self.get_parsed_or_default(
            config_keys::RECONNECT_BACKOFF_MS,
            default.backoff.as_millis() as u64,
        )?;
        Ok(ReconnectPolicy {
            max_retries,
            backoff: Duration::from_millis(backoff_ms),
        })
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 计件工资
    pub const EFFICIENCY_BONUS_THRESHOLD: &str = "efficiency_bonus_threshold";

    // 质量
    pub const QUALITY_ALERT_THRESHOLD: &str = "quality_alert_threshold";

    // 流程
    pub const SUBSCRIBER_CHANNEL_CAPACITY: &str = "subscriber_channel_capacity";
    pub const WORKFLOW_TIMEOUT_SECS: &str = "workflow_timeout_secs";
    pub const WORKFLOW_RETENTION_SECS: &str = "workflow_retention_secs";

    // 实时同步
    pub const OUTBOX_BATCH_SIZE: &str = "outbox_batch_size";
    pub const RECONNECT_MAX_RETRIES: &str = "reconnect_max_retries";
    pub const RECONNECT_BACKOFF_MS: &str = "reconnect_backoff_ms";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ensure_schema;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = manager();
        assert_eq!(config.get_efficiency_bonus_threshold().unwrap(), 0.9);
        assert_eq!(config.get_subscriber_channel_capacity().unwrap(), 64);
        assert_eq!(config.get_outbox_batch_size().unwrap(), 100);
        assert_eq!(config.get_workflow_timeout().unwrap(), None);
        assert_eq!(
            config.get_workflow_retention().unwrap(),
            Some(Duration::from_secs(3600))
        );
        assert_eq!(config.get_reconnect_policy().unwrap(), ReconnectPolicy::default());
    }

    #[test]
    fn test_set_and_parse_values() {
        let config = manager();
        config
            .set_global_config_value(config_keys::WORKFLOW_TIMEOUT_SECS, "30")
            .unwrap();
        config
            .set_global_config_value(config_keys::RECONNECT_BACKOFF_MS, "250")
            .unwrap();
        config
            .set_global_config_value(config_keys::SUBSCRIBER_CHANNEL_CAPACITY, "0")
            .unwrap();

        assert_eq!(config.get_workflow_timeout().unwrap(), Some(Duration::from_secs(30)));
        config
            .set_global_config_value(config_keys::WORKFLOW_RETENTION_SECS, "0")
            .unwrap();
        assert_eq!(config.get_workflow_retention().unwrap(), None);
        assert_eq!(
            config.get_reconnect_policy().unwrap().backoff,
            Duration::from_millis(250)
        );
        assert_eq!(config.get_subscriber_channel_capacity().unwrap(), 1);
    }

    #[test]
    fn test_malformed_value_falls_back() {
        let config = manager();
        config
            .set_global_config_value(config_keys::EFFICIENCY_BONUS_THRESHOLD, "abc")
            .unwrap();
        assert_eq!(config.get_efficiency_bonus_threshold().unwrap(), 0.9);
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let source = manager();
        source
            .set_global_config_value(config_keys::OUTBOX_BATCH_SIZE, "25")
            .unwrap();
        let snapshot = source.get_config_snapshot().unwrap();

        let target = manager();
        assert_eq!(target.restore_config_from_snapshot(&snapshot).unwrap(), 1);
        assert_eq!(target.get_outbox_batch_size().unwrap(), 25);
    }
}
