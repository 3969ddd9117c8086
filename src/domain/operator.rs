// ==========================================
// 服装工厂 ERP - 操作员领域模型
// ==========================================
// 两种存储形态:
// - Profile: 持久化档案 (durable store)
// - Live: 实时状态快照 (realtime store, 含 realtime_status 字段)
// 在数据访问边界一次性解析为 OperatorRecord，下游不再做字段探测
// ==========================================

use crate::domain::types::{OperatorStatus, SkillLevel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;

// ==========================================
// Operator - 操作员档案
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operator {
    pub id: String,
    pub name: String,
    pub machine_types: BTreeSet<String>, // 可操作机型
    pub skill_level: SkillLevel,
    pub average_efficiency: f64, // 1.0 = 标准工时
    pub quality_score: f64,      // 0..=1
    pub current_assignments: u32,
    pub max_concurrent_work: u32,
    pub status: OperatorStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Operator {
    /// 是否可操作指定机型
    pub fn operates(&self, machine_type: &str) -> bool {
        self.machine_types.contains(machine_type)
    }

    /// 当前负荷率 (current / max)，max=0 视为满载
    pub fn workload_ratio(&self) -> f64 {
        if self.max_concurrent_work == 0 {
            return 1.0;
        }
        self.current_assignments as f64 / self.max_concurrent_work as f64
    }

    pub fn is_at_capacity(&self) -> bool {
        self.current_assignments >= self.max_concurrent_work
    }
}

// ==========================================
// NewOperator - 新建操作员请求
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOperator {
    pub id: String,
    pub name: String,
    pub machine_types: BTreeSet<String>,
    pub skill_level: SkillLevel,
    #[serde(default = "default_efficiency")]
    pub average_efficiency: f64,
    #[serde(default = "default_quality")]
    pub quality_score: f64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_work: u32,
}

fn default_efficiency() -> f64 {
    1.0
}

fn default_quality() -> f64 {
    1.0
}

fn default_max_concurrent() -> u32 {
    2
}

impl NewOperator {
    /// 生成档案（初始状态 available，无在制工单）
    pub fn into_operator(self, now: DateTime<Utc>) -> Operator {
        Operator {
            id: self.id,
            name: self.name,
            machine_types: self.machine_types,
            skill_level: self.skill_level,
            average_efficiency: self.average_efficiency,
            quality_score: self.quality_score,
            current_assignments: 0,
            max_concurrent_work: self.max_concurrent_work,
            status: OperatorStatus::Available,
            created_at: now,
            updated_at: now,
        }
    }
}

// ==========================================
// LiveOperatorStatus - 实时状态快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveOperatorStatus {
    pub id: String,
    pub realtime_status: OperatorStatus,
    #[serde(default)]
    pub current_work_item_id: Option<String>,
    #[serde(default)]
    pub current_assignments: u32,
    pub last_seen_at: DateTime<Utc>,
}

// ==========================================
// OperatorRecord - 操作员记录（标签联合）
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorRecord {
    Profile(Operator),
    Live(LiveOperatorStatus),
}

impl OperatorRecord {
    /// 从文档解析（仅在数据访问边界调用一次）
    ///
    /// 含 `realtime_status` 字段的文档视为实时快照，否则视为档案
    pub fn from_document(doc: JsonValue) -> Result<Self, serde_json::Error> {
        let is_live = doc
            .as_object()
            .map(|obj| obj.contains_key("realtime_status"))
            .unwrap_or(false);

        if is_live {
            Ok(OperatorRecord::Live(serde_json::from_value(doc)?))
        } else {
            Ok(OperatorRecord::Profile(serde_json::from_value(doc)?))
        }
    }

    pub fn id(&self) -> &str {
        match self {
            OperatorRecord::Profile(op) => &op.id,
            OperatorRecord::Live(live) => &live.id,
        }
    }

    pub fn status(&self) -> OperatorStatus {
        match self {
            OperatorRecord::Profile(op) => op.status,
            OperatorRecord::Live(live) => live.realtime_status,
        }
    }

    /// 以实时快照覆盖档案中的易变字段
    pub fn merge_into(self, mut profile: Operator) -> Operator {
        match self {
            OperatorRecord::Profile(op) => op,
            OperatorRecord::Live(live) => {
                profile.status = live.realtime_status;
                profile.current_assignments = live.current_assignments;
                profile.updated_at = profile.updated_at.max(live.last_seen_at);
                profile
            }
        }
    }
}
