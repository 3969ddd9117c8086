// ==========================================
// 服装工厂 ERP - 质量评分规则
// ==========================================
// 职责: 单工单质量分、质量指标汇总
// ==========================================

use crate::domain::damage::DamageReport;
use crate::domain::production::ProductionRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 质量告警阈值（低于此值通知主管）
pub const QUALITY_ALERT_THRESHOLD: f64 = 0.9;

/// 单工单质量分
///
/// - 无损坏报告 → 1.0
/// - 完工件数为 0 → 1.0（无样本，不惩罚）
/// - 否则 (完工 − 损坏) / 完工，截断到 [0, 1]
pub fn calculate_quality_score(completed_pieces: u32, damage_reports: &[DamageReport]) -> f64 {
    if damage_reports.is_empty() || completed_pieces == 0 {
        return 1.0;
    }

    let damaged: u64 = damage_reports.iter().map(|r| r.affected_pieces as u64).sum();
    let good = completed_pieces as f64 - damaged as f64;
    (good / completed_pieces as f64).clamp(0.0, 1.0)
}

// ==========================================
// QualityMetrics - 质量指标汇总
// ==========================================
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub total_pieces: u64,
    pub defective_pieces: u64,
    pub defect_rate: f64,
    pub first_pass_yield: f64,
    pub quality_score: f64,
    pub damage_by_type: BTreeMap<String, u64>,
    pub damage_by_severity: BTreeMap<String, u64>,
    pub operator_fault_pieces: u64,
}

/// 质量指标汇总
///
/// 损坏件数以生产记录的 damaged_pieces 为准；
/// 损坏报告只用于分类统计（类型/严重程度/责任）
pub fn calculate_quality_metrics(
    records: &[ProductionRecord],
    damage_reports: &[DamageReport],
) -> QualityMetrics {
    let total_pieces: u64 = records.iter().map(|r| r.pieces as u64).sum();
    let defective_pieces: u64 = records.iter().map(|r| r.damaged_pieces as u64).sum();

    let mut damage_by_type = BTreeMap::new();
    let mut damage_by_severity = BTreeMap::new();
    let mut operator_fault_pieces = 0u64;
    for report in damage_reports {
        *damage_by_type.entry(report.damage_type.clone()).or_insert(0) +=
            report.affected_pieces as u64;
        *damage_by_severity
            .entry(report.severity.as_str().to_string())
            .or_insert(0) += report.affected_pieces as u64;
        if report.operator_fault {
            operator_fault_pieces += report.affected_pieces as u64;
        }
    }

    if total_pieces == 0 {
        return QualityMetrics {
            quality_score: 1.0,
            first_pass_yield: 1.0,
            damage_by_type,
            damage_by_severity,
            operator_fault_pieces,
            ..Default::default()
        };
    }

    let defect_rate = (defective_pieces as f64 / total_pieces as f64).min(1.0);
    QualityMetrics {
        total_pieces,
        defective_pieces,
        defect_rate,
        first_pass_yield: 1.0 - defect_rate,
        quality_score: 1.0 - defect_rate,
        damage_by_type,
        damage_by_severity,
        operator_fault_pieces,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::DamageSeverity;
    use chrono::NaiveDate;

    fn record(pieces: u32, damaged: u32) -> ProductionRecord {
        ProductionRecord {
            operator_id: "OP-1".to_string(),
            work_item_id: "WI-1".to_string(),
            production_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            pieces,
            standard_minutes_per_piece: 1.0,
            actual_minutes: pieces as f64,
            damaged_pieces: damaged,
            earnings: 0.0,
        }
    }

    #[test]
    fn test_quality_score_without_damage_is_one() {
        for pieces in [0, 1, 50, 10_000] {
            assert_eq!(calculate_quality_score(pieces, &[]), 1.0);
        }
    }

    #[test]
    fn test_quality_score_with_damage() {
        let reports = vec![
            DamageReport::simple("stain", DamageSeverity::Minor, 3, true),
            DamageReport::simple("fabric_hole", DamageSeverity::Major, 2, false),
        ];
        assert!((calculate_quality_score(100, &reports) - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_quality_score_clamped_at_zero() {
        let reports = vec![DamageReport::simple("stain", DamageSeverity::Severe, 30, true)];
        assert_eq!(calculate_quality_score(10, &reports), 0.0);
    }

    #[test]
    fn test_quality_metrics_aggregation() {
        let records = vec![record(60, 3), record(40, 1)];
        let reports = vec![
            DamageReport::simple("stain", DamageSeverity::Minor, 3, true),
            DamageReport::simple("color_shading", DamageSeverity::Major, 1, false),
        ];
        let metrics = calculate_quality_metrics(&records, &reports);
        assert_eq!(metrics.total_pieces, 100);
        assert_eq!(metrics.defective_pieces, 4);
        assert!((metrics.defect_rate - 0.04).abs() < 1e-9);
        assert!((metrics.first_pass_yield - 0.96).abs() < 1e-9);
        assert_eq!(metrics.damage_by_type.get("stain"), Some(&3));
        assert_eq!(metrics.damage_by_severity.get("major"), Some(&1));
        assert_eq!(metrics.operator_fault_pieces, 3);
    }

    #[test]
    fn test_quality_metrics_empty() {
        let metrics = calculate_quality_metrics(&[], &[]);
        assert_eq!(metrics.total_pieces, 0);
        assert_eq!(metrics.quality_score, 1.0);
    }
}
