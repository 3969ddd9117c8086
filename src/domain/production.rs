// ==========================================
// 服装工厂 ERP - 生产记录与计件工资领域模型
// ==========================================

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ProductionRecord - 生产记录（指标计算输入）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionRecord {
    pub operator_id: String,
    pub work_item_id: String,
    pub production_date: NaiveDate,
    pub pieces: u32,
    pub standard_minutes_per_piece: f64,
    pub actual_minutes: f64,
    pub damaged_pieces: u32,
    pub earnings: f64,
}

// ==========================================
// BundleData - 扎包计价信息
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleData {
    pub work_item_id: String,
    pub rate_per_piece: f64,
    pub total_pieces: u32,
}

// ==========================================
// CompletionData - 完工数据
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionData {
    pub operator_id: String,
    pub completed_pieces: u32,
    pub efficiency: f64,
    pub quality_score: f64,
}

// ==========================================
// PaymentRecord - 计件工资记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub payment_id: String,
    pub work_item_id: String,
    pub operator_id: String,
    pub base_payment: f64,
    pub efficiency_bonus: f64,
    pub quality_bonus: f64,
    pub damage_penalty: f64,
    pub final_payment: f64,
    pub breakdown_json: JsonValue,
    pub calculated_at: DateTime<Utc>,
}

// ==========================================
// QualityInspection - 质检记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityInspection {
    pub inspection_id: String,
    pub work_item_id: String,
    pub operator_id: Option<String>,
    pub inspected_pieces: u32,
    pub damaged_pieces: u32,
    pub quality_score: f64,
    pub inspected_at: DateTime<Utc>,
}
