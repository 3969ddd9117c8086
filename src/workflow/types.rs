// ==========================================
// 服装工厂 ERP - 流程实例类型
// ==========================================

use crate::domain::types::UrgencyLevel;
use crate::workflow::error::{WorkflowError, WorkflowResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

/// 流程上下文（自由 JSON 对象，步骤输出按步骤 ID 合并进来）
pub type WorkflowContext = serde_json::Map<String, JsonValue>;

// ==========================================
// 流程类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowType {
    WorkAssignment,
    QualityControl,
    OperatorOnboarding,
    DamageResolution,
    PaymentProcessing,
}

impl WorkflowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowType::WorkAssignment => "work_assignment",
            WorkflowType::QualityControl => "quality_control",
            WorkflowType::OperatorOnboarding => "operator_onboarding",
            WorkflowType::DamageResolution => "damage_resolution",
            WorkflowType::PaymentProcessing => "payment_processing",
        }
    }
}

impl fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowType {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "work_assignment" => Ok(WorkflowType::WorkAssignment),
            "quality_control" => Ok(WorkflowType::QualityControl),
            "operator_onboarding" => Ok(WorkflowType::OperatorOnboarding),
            "damage_resolution" => Ok(WorkflowType::DamageResolution),
            "payment_processing" => Ok(WorkflowType::PaymentProcessing),
            other => Err(WorkflowError::UnknownWorkflowType(other.to_string())),
        }
    }
}

// ==========================================
// 状态
// ==========================================
// 步骤: pending → in_progress → {completed | failed | skipped}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Failed | StepStatus::Skipped)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Running => "running",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
            WorkflowStatus::Cancelled => "cancelled",
        }
    }
}

// ==========================================
// 步骤 / 通知 / 流转记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: String,
    pub status: StepStatus,
    pub dependencies: Vec<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNotification {
    pub level: NotificationLevel,
    pub step_id: Option<String>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepTransition {
    pub workflow_id: String,
    pub step_id: String,
    pub from: StepStatus,
    pub to: StepStatus,
    pub at: DateTime<Utc>,
}

/// 推送给订阅者的变更
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowUpdate {
    pub workflow_id: String,
    pub workflow_status: WorkflowStatus,
    pub step_id: Option<String>,
    pub step_status: Option<StepStatus>,
    pub at: DateTime<Utc>,
}

/// 步骤处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// 成功；输出合并进上下文（键为步骤 ID）
    Completed(Option<JsonValue>),
    Skipped(String),
    Failed(String),
}

// ==========================================
// WorkflowInstance - 流程实例
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub id: String,
    pub workflow_type: WorkflowType,
    pub priority: UrgencyLevel,
    pub status: WorkflowStatus,
    pub steps: Vec<WorkflowStep>,
    pub current_step: Option<String>,
    pub context: WorkflowContext,
    pub notifications: Vec<WorkflowNotification>,
    pub error: Option<String>,
    pub timed_out: bool,
    pub deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowInstance {
    pub fn step(&self, step_id: &str) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.id == step_id)
    }

    /// 首个可执行步骤（按声明顺序，依赖全部 completed）
    pub fn next_eligible_step(&self) -> Option<usize> {
        self.steps.iter().position(|step| {
            step.status == StepStatus::Pending
                && step.dependencies.iter().all(|dep| {
                    self.step(dep)
                        .map(|d| d.status == StepStatus::Completed)
                        .unwrap_or(false)
                })
        })
    }

    pub fn all_steps_settled(&self) -> bool {
        self.steps
            .iter()
            .all(|s| matches!(s.status, StepStatus::Completed | StepStatus::Skipped))
    }

    pub fn is_terminal(&self) -> bool {
        self.status != WorkflowStatus::Running
    }

    /// 转换为 Result：失败/超时/取消映射为对应错误
    pub fn into_result(self) -> WorkflowResult<WorkflowInstance> {
        match self.status {
            WorkflowStatus::Failed if self.timed_out => Err(WorkflowError::Timeout {
                workflow_id: self.id,
            }),
            WorkflowStatus::Failed => {
                let step_id = self
                    .steps
                    .iter()
                    .find(|s| s.status == StepStatus::Failed)
                    .map(|s| s.id.clone())
                    .unwrap_or_default();
                Err(WorkflowError::Failed {
                    workflow_id: self.id,
                    step_id,
                    reason: self.error.unwrap_or_default(),
                })
            }
            WorkflowStatus::Cancelled => Err(WorkflowError::InvalidState {
                workflow_id: self.id,
                status: WorkflowStatus::Cancelled.as_str().to_string(),
            }),
            _ => Ok(self),
        }
    }
}
