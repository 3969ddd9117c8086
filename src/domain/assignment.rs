// ==========================================
// 服装工厂 ERP - 派工单领域模型
// ==========================================

use crate::domain::types::AssignmentStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// WorkAssignment - 派工单
// ==========================================
// 主管派工直接 Approved；操作员自助申领为 Requested，待主管审批
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkAssignment {
    pub assignment_id: String,
    pub work_item_id: String,
    pub operator_id: String,
    pub status: AssignmentStatus,
    pub requested_by: String,
    pub approved_by: Option<String>,
    pub match_score: u32,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}
