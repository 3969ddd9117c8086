// ==========================================
// 服装工厂 ERP - 计件工资规则
// ==========================================
// 职责: 基础工资、效率奖励、质量奖励、损坏扣款、综合结算
// 红线: 纯函数，不做 I/O；所有阈值/比例/封顶均为业务口径，不可随意调整
// ==========================================

use crate::domain::damage::DamageReport;
use crate::domain::production::{BundleData, CompletionData};
use crate::domain::types::DamageSeverity;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// 效率奖励默认起算阈值
pub const DEFAULT_EFFICIENCY_THRESHOLD: f64 = 0.9;

/// 效率奖励封顶比例（效率 ≥ 1.2）
pub const EFFICIENCY_BONUS_CAP: f64 = 0.50;

/// 计入操作员责任的损坏类型
pub const OPERATOR_FAULT_TYPES: [&str; 6] = [
    "stitching_defect",
    "seam_puckering",
    "wrong_measurement",
    "missing_operation",
    "needle_damage",
    "stain",
];

// 损坏扣款费率表: (类型, 轻微, 严重, 报废级)
const DAMAGE_RATE_TABLE: [(&str, f64, f64, f64); 8] = [
    ("stitching_defect", 0.05, 0.15, 0.30),
    ("seam_puckering", 0.05, 0.10, 0.20),
    ("wrong_measurement", 0.10, 0.25, 0.40),
    ("missing_operation", 0.15, 0.30, 0.50),
    ("needle_damage", 0.10, 0.20, 0.35),
    ("stain", 0.05, 0.10, 0.20),
    ("fabric_hole", 0.10, 0.25, 0.45),
    ("color_shading", 0.05, 0.15, 0.25),
];

// ==========================================
// 基础工资
// ==========================================

pub fn calculate_base_payment(rate_per_piece: f64, pieces: u32) -> f64 {
    rate_per_piece * pieces as f64
}

// ==========================================
// 效率奖励
// ==========================================

/// 效率奖励比例（分段线性，升序）
///
/// - efficiency < threshold → 0
/// - [threshold, 0.95) → 0% ~ 10%
/// - [0.95, 1.0) → 10% ~ 20%
/// - [1.0, 1.2) → 20% ~ 50%
/// - ≥ 1.2 → 50%（封顶）
pub fn efficiency_bonus_rate(efficiency: f64, threshold: f64) -> f64 {
    if !efficiency.is_finite() || efficiency < threshold {
        return 0.0;
    }
    if efficiency >= 1.2 {
        return EFFICIENCY_BONUS_CAP;
    }
    if efficiency >= 1.0 {
        return 0.20 + (efficiency - 1.0) / 0.2 * 0.30;
    }
    if efficiency >= 0.95 {
        return 0.10 + (efficiency - 0.95) / 0.05 * 0.10;
    }

    let span = 0.95 - threshold;
    if span <= 0.0 {
        return 0.0;
    }
    (efficiency - threshold) / span * 0.10
}

/// 含效率奖励的工资（base + bonus）
pub fn calculate_with_efficiency_bonus(base: f64, efficiency: f64, threshold: f64) -> f64 {
    base + base * efficiency_bonus_rate(efficiency, threshold)
}

// ==========================================
// 质量奖励
// ==========================================

/// 质量奖励比例: ≥0.98 → 15%, ≥0.95 → 10%, ≥0.90 → 5%
pub fn quality_bonus_rate(quality_score: f64) -> f64 {
    if quality_score >= 0.98 {
        0.15
    } else if quality_score >= 0.95 {
        0.10
    } else if quality_score >= 0.90 {
        0.05
    } else {
        0.0
    }
}

/// 质量奖励金额
pub fn calculate_quality_bonus(base: f64, quality_score: f64) -> f64 {
    base * quality_bonus_rate(quality_score)
}

// ==========================================
// 损坏扣款
// ==========================================

/// 单条损坏报告的扣款结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageDeduction {
    pub damage_type: String,
    pub severity: DamageSeverity,
    pub rate: f64,
    pub affected_ratio: f64,
    pub deduction_amount: f64,
    pub reason: String,
}

/// 查表得到扣款费率；未知类型按严重程度取 5%/15%/25%
pub fn damage_rate(damage_type: &str, severity: DamageSeverity) -> f64 {
    let row = DAMAGE_RATE_TABLE
        .iter()
        .find(|(name, _, _, _)| *name == damage_type);

    match (row, severity) {
        (Some((_, minor, _, _)), DamageSeverity::Minor) => *minor,
        (Some((_, _, major, _)), DamageSeverity::Major) => *major,
        (Some((_, _, _, severe)), DamageSeverity::Severe) => *severe,
        (None, DamageSeverity::Minor) => 0.05,
        (None, DamageSeverity::Major) => 0.15,
        (None, DamageSeverity::Severe) => 0.25,
    }
}

pub fn is_known_damage_type(damage_type: &str) -> bool {
    DAMAGE_RATE_TABLE.iter().any(|(name, _, _, _)| *name == damage_type)
}

pub fn is_operator_fault_type(damage_type: &str) -> bool {
    OPERATOR_FAULT_TYPES.contains(&damage_type)
}

/// 计算损坏扣款
///
/// 扣款 = round(费率 × 受影响件数 / 总件数 × 基础收入)
/// operator_fault = false 时扣款恒为 0
pub fn calculate_damage_deduction(
    damage: &DamageReport,
    base_earnings: f64,
    total_pieces: u32,
) -> DamageDeduction {
    if !damage.operator_fault {
        return DamageDeduction {
            damage_type: damage.damage_type.clone(),
            severity: damage.severity,
            rate: 0.0,
            affected_ratio: 0.0,
            deduction_amount: 0.0,
            reason: "not operator fault".to_string(),
        };
    }

    let rate = damage_rate(&damage.damage_type, damage.severity);
    let affected_ratio = if total_pieces == 0 {
        0.0
    } else {
        damage.affected_pieces as f64 / total_pieces as f64
    };
    let deduction_amount = (rate * affected_ratio * base_earnings).round();

    DamageDeduction {
        damage_type: damage.damage_type.clone(),
        severity: damage.severity,
        rate,
        affected_ratio,
        deduction_amount,
        reason: format!(
            "{} ({}): {:.0}% x {}/{} pieces",
            damage.damage_type,
            damage.severity,
            rate * 100.0,
            damage.affected_pieces,
            total_pieces
        ),
    }
}

// ==========================================
// 综合结算（含损坏）
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageAwarePayment {
    pub base_payment: f64,
    pub efficiency_bonus: f64,
    pub quality_bonus: f64,
    pub total_bonuses: f64,
    pub damage_penalty: f64,
    pub final_payment: f64,
    pub deductions: Vec<DamageDeduction>,
    /// 非操作员责任的损坏（不扣款，仅记录）
    pub non_operator_damage: Vec<DamageReport>,
}

/// 综合结算
///
/// final = max(0, base + 效率奖励 + 质量奖励 − 操作员责任扣款)
pub fn calculate_damage_aware_payment(
    bundle: &BundleData,
    completion: &CompletionData,
    damage_reports: &[DamageReport],
) -> DamageAwarePayment {
    calculate_damage_aware_payment_with_threshold(
        bundle,
        completion,
        damage_reports,
        DEFAULT_EFFICIENCY_THRESHOLD,
    )
}

/// 综合结算（效率奖励起点可配置）
#[instrument(skip_all, fields(work_item_id = %bundle.work_item_id, reports = damage_reports.len()))]
pub fn calculate_damage_aware_payment_with_threshold(
    bundle: &BundleData,
    completion: &CompletionData,
    damage_reports: &[DamageReport],
    efficiency_threshold: f64,
) -> DamageAwarePayment {
    let base_payment = calculate_base_payment(bundle.rate_per_piece, completion.completed_pieces);

    let efficiency_bonus = calculate_with_efficiency_bonus(
        base_payment,
        completion.efficiency,
        efficiency_threshold,
    ) - base_payment;
    let quality_bonus = calculate_quality_bonus(base_payment, completion.quality_score);
    let total_bonuses = efficiency_bonus + quality_bonus;

    let (operator_damage, non_operator_damage): (Vec<&DamageReport>, Vec<&DamageReport>) =
        damage_reports
            .iter()
            .partition(|r| is_operator_fault_type(&r.damage_type));

    let deductions: Vec<DamageDeduction> = operator_damage
        .into_iter()
        .map(|r| calculate_damage_deduction(r, base_payment, bundle.total_pieces))
        .collect();
    let damage_penalty: f64 = deductions.iter().map(|d| d.deduction_amount).sum();

    let final_payment = (base_payment + total_bonuses - damage_penalty).max(0.0);

    tracing::debug!(
        base_payment,
        total_bonuses,
        damage_penalty,
        final_payment,
        "综合结算完成"
    );

    DamageAwarePayment {
        base_payment,
        efficiency_bonus,
        quality_bonus,
        total_bonuses,
        damage_penalty,
        final_payment,
        deductions,
        non_operator_damage: non_operator_damage.into_iter().cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    // ===== 效率奖励 =====

    #[test]
    fn test_efficiency_below_threshold_returns_base() {
        for eff in [0.0, 0.5, 0.8, 0.899, 0.8999999] {
            assert_eq!(calculate_with_efficiency_bonus(100.0, eff, 0.9), 100.0);
        }
    }

    #[test]
    fn test_efficiency_band_boundaries() {
        // 阈值点: 0%
        assert!(approx(calculate_with_efficiency_bonus(100.0, 0.9, 0.9), 100.0));
        // 第一段中点: 5%
        assert!(approx(calculate_with_efficiency_bonus(100.0, 0.925, 0.9), 105.0));
        // 0.95 落在 10%~20% 段起点
        assert!(approx(calculate_with_efficiency_bonus(100.0, 0.95, 0.9), 110.0));
        assert!(approx(calculate_with_efficiency_bonus(100.0, 0.975, 0.9), 115.0));
        assert!(approx(calculate_with_efficiency_bonus(100.0, 1.0, 0.9), 120.0));
        assert!(approx(calculate_with_efficiency_bonus(100.0, 1.1, 0.9), 135.0));
    }

    #[test]
    fn test_efficiency_cap() {
        assert_eq!(calculate_with_efficiency_bonus(100.0, 1.2, 0.9), 150.0);
        assert_eq!(calculate_with_efficiency_bonus(100.0, 1.5, 0.9), 150.0);
        assert_eq!(calculate_with_efficiency_bonus(100.0, 9.0, 0.9), 150.0);
    }

    #[test]
    fn test_efficiency_rate_is_monotonic() {
        let mut prev = 0.0;
        let mut eff = 0.85;
        while eff < 1.4 {
            let rate = efficiency_bonus_rate(eff, DEFAULT_EFFICIENCY_THRESHOLD);
            assert!(rate + 1e-12 >= prev, "rate dropped at efficiency {}", eff);
            prev = rate;
            eff += 0.001;
        }
    }

    #[test]
    fn test_efficiency_nan_gets_no_bonus() {
        assert_eq!(calculate_with_efficiency_bonus(100.0, f64::NAN, 0.9), 100.0);
    }

    // ===== 质量奖励 =====

    #[test]
    fn test_quality_bonus_bands() {
        assert!(approx(calculate_quality_bonus(100.0, 0.98), 15.0));
        assert!(approx(calculate_quality_bonus(100.0, 1.0), 15.0));
        assert!(approx(calculate_quality_bonus(100.0, 0.97), 10.0));
        assert!(approx(calculate_quality_bonus(100.0, 0.95), 10.0));
        assert!(approx(calculate_quality_bonus(100.0, 0.90), 5.0));
        assert_eq!(calculate_quality_bonus(100.0, 0.89), 0.0);
    }

    // ===== 损坏扣款 =====

    #[test]
    fn test_missing_operation_severe_deduction() {
        let damage = DamageReport::simple("missing_operation", DamageSeverity::Severe, 10, true);
        let result = calculate_damage_deduction(&damage, 1000.0, 100);
        assert_eq!(result.deduction_amount, 50.0);
        assert_eq!(result.rate, 0.50);
    }

    #[test]
    fn test_no_operator_fault_means_no_deduction() {
        for damage_type in ["missing_operation", "stain", "unknown_kind"] {
            for severity in [DamageSeverity::Minor, DamageSeverity::Major, DamageSeverity::Severe] {
                let damage = DamageReport::simple(damage_type, severity, 50, false);
                let result = calculate_damage_deduction(&damage, 1000.0, 100);
                assert_eq!(result.deduction_amount, 0.0);
            }
        }
    }

    #[test]
    fn test_unknown_type_uses_default_rates() {
        assert_eq!(damage_rate("zipper_jam", DamageSeverity::Minor), 0.05);
        assert_eq!(damage_rate("zipper_jam", DamageSeverity::Major), 0.15);
        assert_eq!(damage_rate("zipper_jam", DamageSeverity::Severe), 0.25);
        assert!(!is_known_damage_type("zipper_jam"));
    }

    #[test]
    fn test_deduction_rounds_to_currency_unit() {
        // 0.15 × 1/3 × 100 = 5.0
        let damage = DamageReport::simple("stitching_defect", DamageSeverity::Major, 1, true);
        assert_eq!(calculate_damage_deduction(&damage, 100.0, 3).deduction_amount, 5.0);
        // 0.05 × 1/3 × 100 = 1.666… → 2
        let damage = DamageReport::simple("stain", DamageSeverity::Minor, 1, true);
        assert_eq!(calculate_damage_deduction(&damage, 100.0, 3).deduction_amount, 2.0);
    }

    #[test]
    fn test_zero_total_pieces_no_deduction() {
        let damage = DamageReport::simple("needle_damage", DamageSeverity::Severe, 5, true);
        assert_eq!(calculate_damage_deduction(&damage, 500.0, 0).deduction_amount, 0.0);
    }

    // ===== 综合结算 =====

    #[test]
    fn test_damage_aware_payment_partitions_reports() {
        let bundle = BundleData {
            work_item_id: "WI-1".to_string(),
            rate_per_piece: 10.0,
            total_pieces: 100,
        };
        let completion = CompletionData {
            operator_id: "OP-1".to_string(),
            completed_pieces: 100,
            efficiency: 0.85,
            quality_score: 0.92,
        };
        let reports = vec![
            DamageReport::simple("missing_operation", DamageSeverity::Severe, 10, true),
            DamageReport::simple("fabric_hole", DamageSeverity::Severe, 10, true),
        ];

        let result = calculate_damage_aware_payment(&bundle, &completion, &reports);
        assert_eq!(result.base_payment, 1000.0);
        assert_eq!(result.efficiency_bonus, 0.0);
        assert!(approx(result.quality_bonus, 50.0));
        assert_eq!(result.damage_penalty, 50.0);
        assert!(approx(result.final_payment, 1000.0));
        assert_eq!(result.deductions.len(), 1);
        assert_eq!(result.non_operator_damage.len(), 1);
        assert_eq!(result.non_operator_damage[0].damage_type, "fabric_hole");
    }

    #[test]
    fn test_damage_aware_payment_never_negative() {
        let bundle = BundleData {
            work_item_id: "WI-2".to_string(),
            rate_per_piece: 1.0,
            total_pieces: 10,
        };
        let completion = CompletionData {
            operator_id: "OP-1".to_string(),
            completed_pieces: 10,
            efficiency: 0.5,
            quality_score: 0.5,
        };
        let reports: Vec<DamageReport> = (0..5)
            .map(|_| DamageReport::simple("missing_operation", DamageSeverity::Severe, 10, true))
            .collect();

        let result = calculate_damage_aware_payment(&bundle, &completion, &reports);
        assert_eq!(result.damage_penalty, 25.0);
        assert_eq!(result.final_payment, 0.0);
    }
}
