// ==========================================
// 服装工厂 ERP - 配置管理 API
// ==========================================
// 职责: 配置查询、更新、快照管理
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::config::{config_keys, ConfigManager};

/// 可通过 API 修改的配置键
const EDITABLE_KEYS: [&str; 8] = [
    config_keys::EFFICIENCY_BONUS_THRESHOLD,
    config_keys::QUALITY_ALERT_THRESHOLD,
    config_keys::SUBSCRIBER_CHANNEL_CAPACITY,
    config_keys::WORKFLOW_TIMEOUT_SECS,
    config_keys::WORKFLOW_RETENTION_SECS,
    config_keys::OUTBOX_BATCH_SIZE,
    config_keys::RECONNECT_MAX_RETRIES,
    config_keys::RECONNECT_BACKOFF_MS,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigItem {
    pub key: String,
    pub value: Option<String>,
}

pub struct ConfigApi {
    config_manager: Arc<ConfigManager>,
}

impl ConfigApi {
    pub fn new(config_manager: Arc<ConfigManager>) -> Self {
        Self { config_manager }
    }

    /// 列出所有可编辑配置（未设置的 value 为 None）
    pub fn list_configs(&self) -> ApiResult<Vec<ConfigItem>> {
        EDITABLE_KEYS
            .iter()
            .map(|key| -> ApiResult<ConfigItem> {
                Ok(ConfigItem {
                    key: key.to_string(),
                    value: self.config_manager.get_global_config_value(key)?,
                })
            })
            .collect()
    }

    pub fn get_config(&self, key: &str) -> ApiResult<Option<String>> {
        Ok(self.config_manager.get_global_config_value(key)?)
    }

    /// 更新配置
    ///
    /// 只接受已知键，且值必须为非负数
    pub fn update_config(&self, key: &str, value: &str, operator: &str) -> ApiResult<()> {
        if !EDITABLE_KEYS.contains(&key) {
            return Err(ApiError::validation(format!("unknown config key {}", key)));
        }
        match value.trim().parse::<f64>() {
            Ok(v) if v.is_finite() && v >= 0.0 => {}
            _ => {
                return Err(ApiError::validation(format!(
                    "config {} expects a non-negative number, got {}",
                    key, value
                )))
            }
        }

        self.config_manager.set_global_config_value(key, value.trim())?;
        tracing::info!(config_key = key, operator, "配置已由操作人更新");
        Ok(())
    }

    pub fn export_snapshot(&self) -> ApiResult<String> {
        Ok(self.config_manager.get_config_snapshot()?)
    }

    pub fn restore_snapshot(&self, snapshot_json: &str, operator: &str) -> ApiResult<usize> {
        let restored = self.config_manager.restore_config_from_snapshot(snapshot_json)?;
        tracing::info!(restored, operator, "配置快照已恢复");
        Ok(restored)
    }
}
