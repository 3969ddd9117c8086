// ==========================================
// 服装工厂 ERP - 派工/建档业务校验
// ==========================================
// 红线: 校验失败必须列出全部原因，调用方据此直接返回，不产生副作用
// ==========================================

use crate::domain::operator::{NewOperator, Operator};
use crate::domain::types::WorkStatus;
use crate::domain::work_item::WorkItem;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 校验失败（含全部原因）
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("校验失败: {}", reasons.join("; "))]
pub struct ValidationFailure {
    pub reasons: Vec<String>,
}

impl ValidationFailure {
    fn from_reasons(reasons: Vec<String>) -> Result<(), Self> {
        if reasons.is_empty() {
            Ok(())
        } else {
            Err(Self { reasons })
        }
    }
}

/// 派工校验
///
/// 拒绝条件:
/// 1) 操作员状态不可接单（非 available / working）
/// 2) 操作员不具备工单机型（同组机型不算）
/// 3) 操作员在制工单已满
/// 4) 操作员技能低于工单要求
/// 5) 工单不是待派状态
pub fn validate_work_assignment(operator: &Operator, work_item: &WorkItem) -> Result<(), ValidationFailure> {
    let mut reasons = Vec::new();

    if !operator.status.is_assignable() {
        reasons.push(format!("operator {} is {}", operator.id, operator.status));
    }
    if !operator.operates(&work_item.machine_type) {
        reasons.push(format!(
            "operator {} cannot operate {}",
            operator.id, work_item.machine_type
        ));
    }
    if operator.is_at_capacity() {
        reasons.push(format!(
            "operator {} at capacity ({}/{})",
            operator.id, operator.current_assignments, operator.max_concurrent_work
        ));
    }
    if operator.skill_level < work_item.required_skill_level {
        reasons.push(format!(
            "skill {} below required {}",
            operator.skill_level, work_item.required_skill_level
        ));
    }
    if work_item.status != WorkStatus::Available {
        reasons.push(format!("work item {} is {}", work_item.id, work_item.status));
    }

    ValidationFailure::from_reasons(reasons)
}

/// 建档校验
pub fn validate_operator_profile(new_operator: &NewOperator) -> Result<(), ValidationFailure> {
    let mut reasons = Vec::new();

    if new_operator.id.trim().is_empty() {
        reasons.push("operator id is required".to_string());
    }
    if new_operator.name.trim().is_empty() {
        reasons.push("operator name is required".to_string());
    }
    if new_operator.machine_types.is_empty()
        || new_operator.machine_types.iter().any(|m| m.trim().is_empty())
    {
        reasons.push("at least one valid machine type is required".to_string());
    }
    if !new_operator.average_efficiency.is_finite()
        || !(0.0..=3.0).contains(&new_operator.average_efficiency)
    {
        reasons.push(format!(
            "average efficiency {} out of range [0, 3]",
            new_operator.average_efficiency
        ));
    }
    if !new_operator.quality_score.is_finite() || !(0.0..=1.0).contains(&new_operator.quality_score) {
        reasons.push(format!(
            "quality score {} out of range [0, 1]",
            new_operator.quality_score
        ));
    }
    if new_operator.max_concurrent_work == 0 {
        reasons.push("max concurrent work must be at least 1".to_string());
    }

    ValidationFailure::from_reasons(reasons)
}
