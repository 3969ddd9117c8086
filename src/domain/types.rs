// ==========================================
// 服装工厂 ERP - 领域类型定义
// ==========================================
// 职责: 技能等级、状态、严重程度等枚举
// 序列化格式: snake_case (与存储文档一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 技能等级 (Skill Level)
// ==========================================
// 顺序: Beginner < Intermediate < Advanced < Expert
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillLevel {
    Beginner,     // 新手
    Intermediate, // 熟练
    Advanced,     // 高级
    Expert,       // 专家
}

impl SkillLevel {
    /// 数值等级 (1..=4)，用于计算等级差
    pub fn rank(&self) -> i32 {
        match self {
            SkillLevel::Beginner => 1,
            SkillLevel::Intermediate => 2,
            SkillLevel::Advanced => 3,
            SkillLevel::Expert => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SkillLevel::Beginner => "beginner",
            SkillLevel::Intermediate => "intermediate",
            SkillLevel::Advanced => "advanced",
            SkillLevel::Expert => "expert",
        }
    }
}

impl fmt::Display for SkillLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SkillLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "beginner" => Ok(SkillLevel::Beginner),
            "intermediate" => Ok(SkillLevel::Intermediate),
            "advanced" => Ok(SkillLevel::Advanced),
            "expert" => Ok(SkillLevel::Expert),
            other => Err(format!("未知技能等级: {}", other)),
        }
    }
}

// ==========================================
// 工单状态 (Work Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    Available,  // 待派
    Assigned,   // 已派
    InProgress, // 生产中
    Completed,  // 已完成
}

impl WorkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkStatus::Available => "available",
            WorkStatus::Assigned => "assigned",
            WorkStatus::InProgress => "in_progress",
            WorkStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(WorkStatus::Available),
            "assigned" => Ok(WorkStatus::Assigned),
            "in_progress" => Ok(WorkStatus::InProgress),
            "completed" => Ok(WorkStatus::Completed),
            other => Err(format!("未知工单状态: {}", other)),
        }
    }
}

// ==========================================
// 操作员状态 (Operator Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorStatus {
    Available, // 空闲
    Working,   // 生产中
    OnBreak,   // 休息
    Offline,   // 离线
    OnLeave,   // 请假
}

impl OperatorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatorStatus::Available => "available",
            OperatorStatus::Working => "working",
            OperatorStatus::OnBreak => "on_break",
            OperatorStatus::Offline => "offline",
            OperatorStatus::OnLeave => "on_leave",
        }
    }

    /// 是否可以接收新工单
    pub fn is_assignable(&self) -> bool {
        matches!(self, OperatorStatus::Available | OperatorStatus::Working)
    }
}

impl fmt::Display for OperatorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperatorStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(OperatorStatus::Available),
            "working" => Ok(OperatorStatus::Working),
            "on_break" => Ok(OperatorStatus::OnBreak),
            "offline" => Ok(OperatorStatus::Offline),
            "on_leave" => Ok(OperatorStatus::OnLeave),
            other => Err(format!("未知操作员状态: {}", other)),
        }
    }
}

// ==========================================
// 损坏严重程度 (Damage Severity)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageSeverity {
    Minor,  // 轻微
    Major,  // 严重
    Severe, // 报废级
}

impl DamageSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            DamageSeverity::Minor => "minor",
            DamageSeverity::Major => "major",
            DamageSeverity::Severe => "severe",
        }
    }
}

impl fmt::Display for DamageSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DamageSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minor" => Ok(DamageSeverity::Minor),
            "major" => Ok(DamageSeverity::Major),
            "severe" => Ok(DamageSeverity::Severe),
            other => Err(format!("未知严重程度: {}", other)),
        }
    }
}

// ==========================================
// 紧急程度 (Urgency Level)
// ==========================================
// 用于优先级评分: Low=2, Normal=3, High=4, Urgent=5
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    Low,
    Normal,
    High,
    Urgent,
}

impl UrgencyLevel {
    /// 评分权重 (2..=5)
    pub fn weight(&self) -> u32 {
        match self {
            UrgencyLevel::Low => 2,
            UrgencyLevel::Normal => 3,
            UrgencyLevel::High => 4,
            UrgencyLevel::Urgent => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UrgencyLevel::Low => "low",
            UrgencyLevel::Normal => "normal",
            UrgencyLevel::High => "high",
            UrgencyLevel::Urgent => "urgent",
        }
    }
}

impl fmt::Display for UrgencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UrgencyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(UrgencyLevel::Low),
            "normal" => Ok(UrgencyLevel::Normal),
            "high" => Ok(UrgencyLevel::High),
            "urgent" => Ok(UrgencyLevel::Urgent),
            other => Err(format!("未知紧急程度: {}", other)),
        }
    }
}

// ==========================================
// 派工单状态 (Assignment Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Requested, // 自助申领，待审批
    Approved,  // 已生效
    Rejected,  // 已驳回
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Requested => "requested",
            AssignmentStatus::Approved => "approved",
            AssignmentStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssignmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "requested" => Ok(AssignmentStatus::Requested),
            "approved" => Ok(AssignmentStatus::Approved),
            "rejected" => Ok(AssignmentStatus::Rejected),
            other => Err(format!("未知派工状态: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skill_level_ordering() {
        assert!(SkillLevel::Beginner < SkillLevel::Intermediate);
        assert!(SkillLevel::Advanced < SkillLevel::Expert);
        assert_eq!(SkillLevel::Expert.rank() - SkillLevel::Beginner.rank(), 3);
    }

    #[test]
    fn test_status_string_roundtrip() {
        assert_eq!("in_progress".parse::<WorkStatus>().unwrap(), WorkStatus::InProgress);
        assert_eq!(OperatorStatus::OnLeave.to_string(), "on_leave");
        assert!("sleeping".parse::<OperatorStatus>().is_err());
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&OperatorStatus::OnBreak).unwrap();
        assert_eq!(json, "\"on_break\"");
        let level: SkillLevel = serde_json::from_str("\"advanced\"").unwrap();
        assert_eq!(level, SkillLevel::Advanced);
    }

    #[test]
    fn test_assignable_status() {
        assert!(OperatorStatus::Available.is_assignable());
        assert!(OperatorStatus::Working.is_assignable());
        assert!(!OperatorStatus::OnLeave.is_assignable());
    }
}
