// ==========================================
// 服装工厂 ERP - 流程层错误类型
// ==========================================

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    #[error("流程不存在: workflow_id={0}")]
    NotFound(String),

    #[error("流程失败: workflow_id={workflow_id}, step={step_id}, reason={reason}")]
    Failed {
        workflow_id: String,
        step_id: String,
        reason: String,
    },

    #[error("流程超时: workflow_id={workflow_id}")]
    Timeout { workflow_id: String },

    #[error("流程状态不允许此操作: workflow_id={workflow_id}, status={status}")]
    InvalidState { workflow_id: String, status: String },

    #[error("未知流程类型: {0}")]
    UnknownWorkflowType(String),
}

impl WorkflowError {
    /// 对外错误码
    pub fn code(&self) -> &'static str {
        match self {
            WorkflowError::NotFound(_) => "WORKFLOW_NOT_FOUND",
            WorkflowError::Failed { .. } => "WORKFLOW_FAILED",
            WorkflowError::Timeout { .. } => "WORKFLOW_TIMEOUT",
            WorkflowError::InvalidState { .. } => "INVALID_WORKFLOW_STATE",
            WorkflowError::UnknownWorkflowType(_) => "VALIDATION_FAILED",
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
