// ==========================================
// 服装工厂 ERP - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换下层错误为带稳定错误码的业务错误
// 错误码: VALIDATION_FAILED / NOT_FOUND / ASSIGNMENT_CONFLICT /
//         OPERATOR_CREATE_FAILED / ASSIGNMENT_FAILED / DAMAGE_REPORT_FAILED /
//         PAYMENT_FAILED / STORE_FAILED
// ==========================================

use crate::engine::validation::ValidationFailure;
use crate::realtime::RealtimeError;
use crate::repository::error::RepositoryError;
use crate::workflow::WorkflowError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    /// 校验失败（列出全部原因，未产生任何写入）
    #[error("校验失败: {}", reasons.join("; "))]
    ValidationFailed { reasons: Vec<String> },

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    // ==========================================
    // 并发控制错误
    // ==========================================
    /// 同一工单并发派工，后到者被拒绝
    #[error("派工冲突: {0}")]
    AssignmentConflict(String),

    // ==========================================
    // 操作失败
    // ==========================================
    #[error("创建操作员失败: {0}")]
    OperatorCreateFailed(String),

    #[error("派工失败: {0}")]
    AssignmentFailed(String),

    #[error("损坏上报失败: {0}")]
    DamageReportFailed(String),

    #[error("工资结算失败: {0}")]
    PaymentFailed(String),

    #[error("存储失败: {0}")]
    StoreFailed(String),

    // ==========================================
    // 流程错误
    // ==========================================
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 稳定错误码
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::ValidationFailed { .. } => "VALIDATION_FAILED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            ApiError::AssignmentConflict(_) => "ASSIGNMENT_CONFLICT",
            ApiError::OperatorCreateFailed(_) => "OPERATOR_CREATE_FAILED",
            ApiError::AssignmentFailed(_) => "ASSIGNMENT_FAILED",
            ApiError::DamageReportFailed(_) => "DAMAGE_REPORT_FAILED",
            ApiError::PaymentFailed(_) => "PAYMENT_FAILED",
            ApiError::StoreFailed(_) | ApiError::Other(_) => "STORE_FAILED",
            ApiError::Workflow(e) => e.code(),
        }
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        ApiError::ValidationFailed {
            reasons: vec![reason.into()],
        }
    }

    /// 存储层失败归入具体操作的错误码；业务类错误保持原样
    pub(crate) fn in_operation(self, wrap: fn(String) -> ApiError) -> ApiError {
        match self {
            ApiError::StoreFailed(msg) => wrap(msg),
            other => other,
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::OptimisticLockFailure {
                entity,
                id,
                expected,
                actual,
            } => ApiError::AssignmentConflict(format!(
                "{}(id={})已被其他请求修改（期望revision={}，实际revision={}）",
                entity, id, expected, actual
            )),
            RepositoryError::CapacityExhausted { id, current, max } => {
                ApiError::AssignmentConflict(format!(
                    "操作员 {} 在制工单已满（{}/{}）",
                    id, current, max
                ))
            }
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::InvalidStateTransition { from, to } => {
                ApiError::InvalidStateTransition { from, to }
            }
            RepositoryError::ValidationError(msg) => ApiError::validation(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::validation(format!("{}: {}", field, message))
            }
            RepositoryError::BusinessRuleViolation(msg) => ApiError::validation(msg),
            other => ApiError::StoreFailed(other.to_string()),
        }
    }
}

impl From<ValidationFailure> for ApiError {
    fn from(err: ValidationFailure) -> Self {
        ApiError::ValidationFailed {
            reasons: err.reasons,
        }
    }
}

impl From<RealtimeError> for ApiError {
    fn from(err: RealtimeError) -> Self {
        match err {
            RealtimeError::Repository(inner) => inner.into(),
            other => ApiError::StoreFailed(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::StoreFailed(format!("序列化失败: {}", err))
    }
}

/// API层Result类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimistic_lock_maps_to_assignment_conflict() {
        let err: ApiError = RepositoryError::OptimisticLockFailure {
            entity: "WorkItem".to_string(),
            id: "WI-1".to_string(),
            expected: 0,
            actual: 1,
        }
        .into();
        assert_eq!(err.code(), "ASSIGNMENT_CONFLICT");
        assert!(err.to_string().contains("WI-1"));
    }

    #[test]
    fn test_capacity_exhausted_maps_to_assignment_conflict() {
        let err: ApiError = RepositoryError::CapacityExhausted {
            id: "OP-1".to_string(),
            current: 1,
            max: 1,
        }
        .into();
        let err = err.in_operation(ApiError::AssignmentFailed);
        assert_eq!(err.code(), "ASSIGNMENT_CONFLICT");
        assert!(err.to_string().contains("OP-1"));
    }

    #[test]
    fn test_store_failure_wrapped_by_operation() {
        let err: ApiError = RepositoryError::UniqueConstraintViolation("operators".to_string()).into();
        assert_eq!(err.code(), "STORE_FAILED");
        let err = err.in_operation(ApiError::OperatorCreateFailed);
        assert_eq!(err.code(), "OPERATOR_CREATE_FAILED");

        let not_found: ApiError = RepositoryError::not_found("Operator", "OP-9").into();
        assert_eq!(
            not_found.in_operation(ApiError::OperatorCreateFailed).code(),
            "NOT_FOUND"
        );
    }

    #[test]
    fn test_validation_failure_keeps_all_reasons() {
        let err: ApiError = ValidationFailure {
            reasons: vec!["a".to_string(), "b".to_string()],
        }
        .into();
        assert_eq!(err.code(), "VALIDATION_FAILED");
        assert_eq!(err.to_string(), "校验失败: a; b");
    }

    #[test]
    fn test_workflow_error_code_passthrough() {
        let err: ApiError = WorkflowError::NotFound("wf-1".to_string()).into();
        assert_eq!(err.code(), "WORKFLOW_NOT_FOUND");
    }
}
