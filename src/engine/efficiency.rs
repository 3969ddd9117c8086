// ==========================================
// 服装工厂 ERP - 效率与日报指标
// ==========================================
// 职责: 个人效率、效率汇总、日报、产线效率
// 约定: 空输入返回全零结果，不 panic
// ==========================================

use crate::domain::damage::DamageReport;
use crate::domain::production::ProductionRecord;
use crate::engine::quality::calculate_quality_score;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// 效率 = 标准工时 × 件数 / 实际工时
///
/// 实际工时 ≤ 0 或非有限值时返回 0
pub fn calculate_efficiency(standard_minutes_per_piece: f64, pieces: u32, actual_minutes: f64) -> f64 {
    if !actual_minutes.is_finite() || actual_minutes <= 0.0 {
        return 0.0;
    }
    let earned_minutes = standard_minutes_per_piece * pieces as f64;
    if !earned_minutes.is_finite() || earned_minutes < 0.0 {
        return 0.0;
    }
    earned_minutes / actual_minutes
}

fn record_efficiency(record: &ProductionRecord) -> f64 {
    calculate_efficiency(
        record.standard_minutes_per_piece,
        record.pieces,
        record.actual_minutes,
    )
}

// ==========================================
// EfficiencyMetrics - 效率汇总
// ==========================================
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EfficiencyMetrics {
    pub record_count: usize,
    /// 工时加权效率: Σ标准工时 / Σ实际工时
    pub overall_efficiency: f64,
    pub average_efficiency: f64,
    pub min_efficiency: f64,
    pub max_efficiency: f64,
    pub above_target_count: usize,
}

pub fn calculate_efficiency_metrics(records: &[ProductionRecord], target: f64) -> EfficiencyMetrics {
    if records.is_empty() {
        return EfficiencyMetrics::default();
    }

    let efficiencies: Vec<f64> = records.iter().map(record_efficiency).collect();
    let earned: f64 = records
        .iter()
        .map(|r| r.standard_minutes_per_piece * r.pieces as f64)
        .sum();
    let actual: f64 = records.iter().map(|r| r.actual_minutes.max(0.0)).sum();

    EfficiencyMetrics {
        record_count: records.len(),
        overall_efficiency: if actual > 0.0 { earned / actual } else { 0.0 },
        average_efficiency: efficiencies.iter().sum::<f64>() / efficiencies.len() as f64,
        min_efficiency: efficiencies.iter().cloned().fold(f64::INFINITY, f64::min),
        max_efficiency: efficiencies.iter().cloned().fold(0.0, f64::max),
        above_target_count: efficiencies.iter().filter(|e| **e >= target).count(),
    }
}

// ==========================================
// OperatorPerformance - 操作员画像
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OperatorPerformance {
    pub average_efficiency: f64,
    pub quality_score: f64,
}

/// 画像效率上限，与建档校验范围一致
const MAX_PROFILE_EFFICIENCY: f64 = 3.0;

/// 由累计生产记录与损坏报告刷新画像
///
/// - 无生产记录或实际工时为 0 → 沿用档案值
/// - 效率取工时加权效率
/// - 质量按累计产量计算
pub fn calculate_operator_performance(
    profile: OperatorPerformance,
    records: &[ProductionRecord],
    damage_reports: &[DamageReport],
) -> OperatorPerformance {
    let produced: u64 = records.iter().map(|r| r.pieces as u64).sum();
    if produced == 0 {
        return profile;
    }

    let metrics = calculate_efficiency_metrics(records, 1.0);
    let average_efficiency = if metrics.overall_efficiency > 0.0 {
        metrics.overall_efficiency.min(MAX_PROFILE_EFFICIENCY)
    } else {
        profile.average_efficiency
    };
    let sample = u32::try_from(produced).unwrap_or(u32::MAX);

    OperatorPerformance {
        average_efficiency,
        quality_score: calculate_quality_score(sample, damage_reports),
    }
}

// ==========================================
// DailyMetrics - 日报
// ==========================================
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DailyMetrics {
    pub total_pieces: u64,
    pub damaged_pieces: u64,
    pub total_earnings: f64,
    pub average_efficiency: f64,
    pub quality_rate: f64,
    pub operator_count: usize,
    pub work_item_count: usize,
    pub earnings_by_operator: BTreeMap<String, f64>,
}

/// 日报汇总（调用方负责按日期过滤记录）
pub fn calculate_daily_metrics(records: &[ProductionRecord]) -> DailyMetrics {
    if records.is_empty() {
        return DailyMetrics::default();
    }

    let total_pieces: u64 = records.iter().map(|r| r.pieces as u64).sum();
    let damaged_pieces: u64 = records.iter().map(|r| r.damaged_pieces as u64).sum();
    let total_earnings: f64 = records.iter().map(|r| r.earnings).sum();

    let operators: BTreeSet<&str> = records.iter().map(|r| r.operator_id.as_str()).collect();
    let work_items: BTreeSet<&str> = records.iter().map(|r| r.work_item_id.as_str()).collect();

    let mut earnings_by_operator = BTreeMap::new();
    for r in records {
        *earnings_by_operator.entry(r.operator_id.clone()).or_insert(0.0) += r.earnings;
    }

    let quality_rate = if total_pieces == 0 {
        0.0
    } else {
        1.0 - (damaged_pieces as f64 / total_pieces as f64).min(1.0)
    };

    DailyMetrics {
        total_pieces,
        damaged_pieces,
        total_earnings,
        average_efficiency: records.iter().map(record_efficiency).sum::<f64>()
            / records.len() as f64,
        quality_rate,
        operator_count: operators.len(),
        work_item_count: work_items.len(),
        earnings_by_operator,
    }
}

// ==========================================
// LineEfficiency - 产线效率
// ==========================================
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LineEfficiency {
    pub target_pieces: u64,
    pub actual_pieces: u64,
    pub line_efficiency: f64,
    /// 效率最低的操作员（瓶颈工位）
    pub bottleneck_operator_id: Option<String>,
    pub bottleneck_efficiency: f64,
}

/// 产线效率 = 实际产出 / 目标产出；同时找出瓶颈操作员
pub fn calculate_line_efficiency(records: &[ProductionRecord], target_pieces: u64) -> LineEfficiency {
    let actual_pieces: u64 = records.iter().map(|r| r.pieces as u64).sum();

    let mut per_operator: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for r in records {
        let entry = per_operator.entry(r.operator_id.as_str()).or_insert((0.0, 0.0));
        entry.0 += r.standard_minutes_per_piece * r.pieces as f64;
        entry.1 += r.actual_minutes.max(0.0);
    }

    let bottleneck = per_operator
        .iter()
        .map(|(id, (earned, actual))| {
            let eff = if *actual > 0.0 { earned / actual } else { 0.0 };
            (*id, eff)
        })
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    LineEfficiency {
        target_pieces,
        actual_pieces,
        line_efficiency: if target_pieces == 0 {
            0.0
        } else {
            actual_pieces as f64 / target_pieces as f64
        },
        bottleneck_operator_id: bottleneck.map(|(id, _)| id.to_string()),
        bottleneck_efficiency: bottleneck.map(|(_, eff)| eff).unwrap_or(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::DamageSeverity;
    use chrono::NaiveDate;

    fn record(op: &str, wi: &str, pieces: u32, std_min: f64, actual: f64, earnings: f64) -> ProductionRecord {
        ProductionRecord {
            operator_id: op.to_string(),
            work_item_id: wi.to_string(),
            production_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            pieces,
            standard_minutes_per_piece: std_min,
            actual_minutes: actual,
            damaged_pieces: 0,
            earnings,
        }
    }

    #[test]
    fn test_calculate_efficiency() {
        assert!((calculate_efficiency(2.0, 60, 100.0) - 1.2).abs() < 1e-9);
        assert_eq!(calculate_efficiency(2.0, 60, 0.0), 0.0);
        assert_eq!(calculate_efficiency(2.0, 60, f64::NAN), 0.0);
    }

    #[test]
    fn test_daily_metrics_empty_is_all_zero() {
        let metrics = calculate_daily_metrics(&[]);
        assert_eq!(metrics.total_pieces, 0);
        assert_eq!(metrics.total_earnings, 0.0);
        assert_eq!(metrics.average_efficiency, 0.0);
        assert_eq!(metrics.quality_rate, 0.0);
        assert_eq!(metrics.operator_count, 0);
        assert!(metrics.earnings_by_operator.is_empty());
    }

    #[test]
    fn test_daily_metrics_aggregates() {
        let records = vec![
            record("OP-1", "WI-1", 50, 1.0, 50.0, 100.0),
            record("OP-1", "WI-2", 30, 2.0, 50.0, 60.0),
            record("OP-2", "WI-1", 20, 1.0, 40.0, 40.0),
        ];
        let metrics = calculate_daily_metrics(&records);
        assert_eq!(metrics.total_pieces, 100);
        assert_eq!(metrics.total_earnings, 200.0);
        assert_eq!(metrics.operator_count, 2);
        assert_eq!(metrics.work_item_count, 2);
        assert_eq!(metrics.quality_rate, 1.0);
        // (1.0 + 1.2 + 0.5) / 3
        assert!((metrics.average_efficiency - 0.9).abs() < 1e-9);
        assert_eq!(metrics.earnings_by_operator.get("OP-1"), Some(&160.0));
    }

    #[test]
    fn test_efficiency_metrics() {
        let records = vec![
            record("OP-1", "WI-1", 50, 1.0, 50.0, 0.0),
            record("OP-2", "WI-1", 20, 1.0, 40.0, 0.0),
        ];
        let metrics = calculate_efficiency_metrics(&records, 0.9);
        assert_eq!(metrics.record_count, 2);
        assert!((metrics.overall_efficiency - 70.0 / 90.0).abs() < 1e-9);
        assert_eq!(metrics.min_efficiency, 0.5);
        assert_eq!(metrics.max_efficiency, 1.0);
        assert_eq!(metrics.above_target_count, 1);
    }

    #[test]
    fn test_line_efficiency_finds_bottleneck() {
        let records = vec![
            record("OP-1", "WI-1", 60, 1.0, 50.0, 0.0),
            record("OP-2", "WI-1", 40, 1.0, 80.0, 0.0),
        ];
        let line = calculate_line_efficiency(&records, 120);
        assert_eq!(line.actual_pieces, 100);
        assert!((line.line_efficiency - 100.0 / 120.0).abs() < 1e-9);
        assert_eq!(line.bottleneck_operator_id.as_deref(), Some("OP-2"));
        assert_eq!(line.bottleneck_efficiency, 0.5);
    }

    #[test]
    fn test_operator_performance_from_history() {
        let profile = OperatorPerformance {
            average_efficiency: 0.95,
            quality_score: 0.95,
        };
        assert_eq!(calculate_operator_performance(profile, &[], &[]), profile);

        let records = vec![
            record("OP-1", "WI-1", 60, 1.0, 60.0, 0.0),
            record("OP-1", "WI-2", 40, 1.0, 50.0, 0.0),
        ];
        let damage = vec![DamageReport::simple("broken_stitch", DamageSeverity::Minor, 5, true)];
        let refreshed = calculate_operator_performance(profile, &records, &damage);
        assert!((refreshed.average_efficiency - 100.0 / 110.0).abs() < 1e-9);
        assert!((refreshed.quality_score - 0.95).abs() < 1e-9);

        // 零工时不覆盖档案效率
        let idle = vec![record("OP-1", "WI-1", 10, 1.0, 0.0, 0.0)];
        let refreshed = calculate_operator_performance(profile, &idle, &[]);
        assert_eq!(refreshed.average_efficiency, 0.95);
        assert_eq!(refreshed.quality_score, 1.0);
    }

    #[test]
    fn test_line_efficiency_empty() {
        let line = calculate_line_efficiency(&[], 0);
        assert_eq!(line.line_efficiency, 0.0);
        assert!(line.bottleneck_operator_id.is_none());
    }
}
