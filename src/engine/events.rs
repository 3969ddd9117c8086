// ==========================================
// 服装工厂 ERP - 引擎层事件发布
// ==========================================
// 职责: 定义业务事件与发布 trait，实现依赖倒置
// 说明: Engine 层定义 trait，realtime 层实现适配器（事件通道）
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 业务事件类型
// ==========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErpEventType {
    /// 操作员状态变更
    OperatorStatusChanged,
    /// 派工生效
    WorkAssigned,
    /// 派工审批结果
    AssignmentDecided,
    /// 质量告警
    QualityAlert,
    /// 流程状态变更
    WorkflowUpdated,
    /// 自由文本通知
    Notification,
}

impl ErpEventType {
    /// 事件通道上的事件名
    pub fn as_str(&self) -> &str {
        match self {
            ErpEventType::OperatorStatusChanged => "operator_status_changed",
            ErpEventType::WorkAssigned => "work_assigned",
            ErpEventType::AssignmentDecided => "assignment_decided",
            ErpEventType::QualityAlert => "quality_alert",
            ErpEventType::WorkflowUpdated => "workflow_updated",
            ErpEventType::Notification => "notification",
        }
    }
}

/// 业务事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErpEvent {
    pub event_type: ErpEventType,
    /// 事件主体（操作员/工单/流程 ID）
    pub entity_id: String,
    /// 接收人（None 表示广播）
    pub recipient: Option<String>,
    pub message: Option<String>,
    pub payload: JsonValue,
    pub emitted_at: DateTime<Utc>,
}

impl ErpEvent {
    pub fn new(event_type: ErpEventType, entity_id: impl Into<String>, payload: JsonValue) -> Self {
        Self {
            event_type,
            entity_id: entity_id.into(),
            recipient: None,
            message: None,
            payload,
            emitted_at: Utc::now(),
        }
    }

    /// 自由文本通知
    pub fn notification(recipient: impl Into<String>, message: impl Into<String>) -> Self {
        let recipient = recipient.into();
        Self {
            event_type: ErpEventType::Notification,
            entity_id: recipient.clone(),
            recipient: Some(recipient),
            message: Some(message.into()),
            payload: JsonValue::Null,
            emitted_at: Utc::now(),
        }
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 业务事件发布者
///
/// # 返回
/// - `Ok(delivery_id)`: 投递标识（不支持时为空字符串）
/// - `Err`: 发布失败
pub trait ErpEventPublisher: Send + Sync {
    fn publish(&self, event: ErpEvent) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者（单元测试/离线运行）
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl ErpEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: ErpEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpEventPublisher: 跳过事件发布 - entity_id={}, event_type={}",
            event.entity_id,
            event.event_type.as_str()
        );
        Ok(String::new())
    }
}

/// 可选的事件发布者包装
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn ErpEventPublisher>>,
}

impl OptionalEventPublisher {
    pub fn with_publisher(publisher: Arc<dyn ErpEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    pub fn publish(&self, event: ErpEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        match &self.inner {
            Some(publisher) => publisher.publish(event),
            None => {
                tracing::debug!(
                    "OptionalEventPublisher: 未配置发布者，跳过事件 - entity_id={}, event_type={}",
                    event.entity_id,
                    event.event_type.as_str()
                );
                Ok(String::new())
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}
