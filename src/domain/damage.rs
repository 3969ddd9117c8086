// ==========================================
// 服装工厂 ERP - 损坏报告领域模型
// ==========================================

use crate::domain::types::DamageSeverity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// DamageReport - 损坏报告
// ==========================================
// damage_type 保留原始字符串: 未知类型也要参与扣款计算(走默认费率)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageReport {
    #[serde(default)]
    pub report_id: String,
    #[serde(default)]
    pub work_item_id: String,
    #[serde(default)]
    pub operator_id: Option<String>,
    pub damage_type: String,
    pub severity: DamageSeverity,
    pub affected_pieces: u32,
    pub operator_fault: bool,
    #[serde(default)]
    pub reported_by: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default = "Utc::now")]
    pub reported_at: DateTime<Utc>,
}

impl DamageReport {
    /// 构造只含计算字段的报告（规则引擎/测试使用）
    pub fn simple(
        damage_type: &str,
        severity: DamageSeverity,
        affected_pieces: u32,
        operator_fault: bool,
    ) -> Self {
        Self {
            report_id: String::new(),
            work_item_id: String::new(),
            operator_id: None,
            damage_type: damage_type.to_string(),
            severity,
            affected_pieces,
            operator_fault,
            reported_by: None,
            note: None,
            reported_at: Utc::now(),
        }
    }
}

// ==========================================
// NewDamageReport - 上报请求
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDamageReport {
    pub work_item_id: String,
    pub operator_id: Option<String>,
    pub damage_type: String,
    pub severity: DamageSeverity,
    pub affected_pieces: u32,
    pub operator_fault: bool,
    pub reported_by: String,
    #[serde(default)]
    pub note: Option<String>,
}
