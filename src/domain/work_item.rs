// ==========================================
// 服装工厂 ERP - 工单 (WIP Bundle) 领域模型
// ==========================================

use crate::domain::types::{SkillLevel, UrgencyLevel, WorkStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// WorkItem - 工单
// ==========================================
// revision: 乐观锁版本号，每次状态变更 +1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub bundle_no: String,
    pub machine_type: String,
    pub required_skill_level: SkillLevel,
    pub priority: UrgencyLevel,
    pub estimated_duration: u32, // 分钟
    pub total_pieces: u32,
    pub completed_pieces: u32,
    pub rate_per_piece: f64,
    pub status: WorkStatus,
    pub assigned_operator_id: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkItem {
    pub fn remaining_pieces(&self) -> u32 {
        self.total_pieces.saturating_sub(self.completed_pieces)
    }

    /// 标准工时（分钟/件）
    pub fn standard_minutes_per_piece(&self) -> f64 {
        if self.total_pieces == 0 {
            return 0.0;
        }
        self.estimated_duration as f64 / self.total_pieces as f64
    }
}

// ==========================================
// NewWorkItem - 新建工单请求
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWorkItem {
    pub id: String,
    pub bundle_no: String,
    pub machine_type: String,
    pub required_skill_level: SkillLevel,
    pub priority: UrgencyLevel,
    pub estimated_duration: u32,
    pub total_pieces: u32,
    pub rate_per_piece: f64,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

impl NewWorkItem {
    pub fn into_work_item(self, now: DateTime<Utc>) -> WorkItem {
        WorkItem {
            id: self.id,
            bundle_no: self.bundle_no,
            machine_type: self.machine_type,
            required_skill_level: self.required_skill_level,
            priority: self.priority,
            estimated_duration: self.estimated_duration,
            total_pieces: self.total_pieces,
            completed_pieces: 0,
            rate_per_piece: self.rate_per_piece,
            status: WorkStatus::Available,
            assigned_operator_id: None,
            due_date: self.due_date,
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_work_item_defaults() {
        let item = NewWorkItem {
            id: "WI-1".to_string(),
            bundle_no: "B-100".to_string(),
            machine_type: "overlock".to_string(),
            required_skill_level: SkillLevel::Intermediate,
            priority: UrgencyLevel::High,
            estimated_duration: 120,
            total_pieces: 60,
            rate_per_piece: 2.5,
            due_date: None,
        }
        .into_work_item(Utc::now());

        assert_eq!(item.status, WorkStatus::Available);
        assert_eq!(item.revision, 0);
        assert_eq!(item.remaining_pieces(), 60);
        assert!((item.standard_minutes_per_piece() - 2.0).abs() < 1e-9);
    }
}
