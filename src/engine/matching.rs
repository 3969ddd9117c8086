// ==========================================
// 服装工厂 ERP - 派工匹配评分（规则版）
// ==========================================
// 权重 (满分 100，超出截断):
// - 机型: 完全匹配 50 / 同组机型 25 / 不兼容 0 (提前返回)
// - 技能: 达标 30 + 10 / 每差一级 −10 (最低 0)
// - 负荷: 负荷率 <0.5 → 20, <0.75 → 15, <1.0 → 5, 满载 0
// - 绩效: 效率 >0.8 +8, 质量 >0.9 +7
// ==========================================
// 约束: 固定机型/负荷/绩效时，分数随操作员技能单调不减
// ==========================================

use crate::domain::operator::Operator;
use crate::domain::work_item::WorkItem;
use serde::{Deserialize, Serialize};

/// 同组机型（可互相顶岗）
const RELATED_MACHINE_GROUPS: [&[&str]; 3] = [
    &["single_needle", "double_needle", "lockstitch"],
    &["overlock", "flatlock", "coverstitch"],
    &["bartack", "buttonhole", "button_attach"],
];

pub const MAX_MATCH_SCORE: u32 = 100;

// ==========================================
// MatchScore - 匹配结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchScore {
    pub score: u32,
    pub machine_compatible: bool,
    /// 前 3 条可读原因（按贡献降序）
    pub reasons: Vec<String>,
}

// ==========================================
// MatchScorer - 匹配评分接口
// ==========================================
/// 两套评分口径（规则版 / 推荐版）统一在此接口后面，
/// 调用方显式选择实现，不在业务代码里混用
pub trait MatchScorer: Send + Sync {
    fn name(&self) -> &'static str;

    fn score(&self, work_item: &WorkItem, operator: &Operator) -> MatchScore;
}

/// 机型关系
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineFit {
    Exact,
    Related,
    Incompatible,
}

pub fn machine_fit(operator: &Operator, machine_type: &str) -> MachineFit {
    if operator.operates(machine_type) {
        return MachineFit::Exact;
    }

    let related = RELATED_MACHINE_GROUPS.iter().any(|group| {
        group.contains(&machine_type)
            && operator
                .machine_types
                .iter()
                .any(|m| group.contains(&m.as_str()))
    });

    if related {
        MachineFit::Related
    } else {
        MachineFit::Incompatible
    }
}

/// 规则版匹配评分
pub fn calculate_match_score(work_item: &WorkItem, operator: &Operator) -> MatchScore {
    let mut parts: Vec<(u32, String)> = Vec::with_capacity(5);

    // 1. 机型
    match machine_fit(operator, &work_item.machine_type) {
        MachineFit::Exact => parts.push((50, format!("Operates {}", work_item.machine_type))),
        MachineFit::Related => parts.push((
            25,
            format!("Related machine experience for {}", work_item.machine_type),
        )),
        MachineFit::Incompatible => {
            return MatchScore {
                score: 0,
                machine_compatible: false,
                reasons: vec![format!("Cannot operate {}", work_item.machine_type)],
            };
        }
    }

    // 2. 技能
    let gap = work_item.required_skill_level.rank() - operator.skill_level.rank();
    if gap <= 0 {
        let reason = if gap == 0 {
            format!("Exact skill match ({})", operator.skill_level)
        } else {
            format!("Skill {} exceeds required {}", operator.skill_level, work_item.required_skill_level)
        };
        parts.push((40, reason));
    } else {
        let points = (30 - 10 * gap).max(0) as u32;
        parts.push((
            points,
            format!("Skill {} below required {}", operator.skill_level, work_item.required_skill_level),
        ));
    }

    // 3. 负荷
    let ratio = operator.workload_ratio();
    let (points, reason) = if ratio < 0.5 {
        (20, "Light workload")
    } else if ratio < 0.75 {
        (15, "Moderate workload")
    } else if ratio < 1.0 {
        (5, "Heavy workload")
    } else {
        (0, "At full capacity")
    };
    parts.push((points, reason.to_string()));

    // 4. 绩效
    if operator.average_efficiency > 0.8 {
        parts.push((8, format!("High efficiency ({:.0}%)", operator.average_efficiency * 100.0)));
    }
    if operator.quality_score > 0.9 {
        parts.push((7, format!("High quality ({:.0}%)", operator.quality_score * 100.0)));
    }

    let total: u32 = parts.iter().map(|(p, _)| *p).sum();
    parts.sort_by(|a, b| b.0.cmp(&a.0));

    MatchScore {
        score: total.min(MAX_MATCH_SCORE),
        machine_compatible: true,
        reasons: parts.into_iter().take(3).map(|(_, r)| r).collect(),
    }
}

/// 规则版评分器
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedScorer;

impl MatchScorer for RuleBasedScorer {
    fn name(&self) -> &'static str {
        "rule_based"
    }

    fn score(&self, work_item: &WorkItem, operator: &Operator) -> MatchScore {
        calculate_match_score(work_item, operator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::operator::NewOperator;
    use crate::domain::types::{SkillLevel, UrgencyLevel};
    use crate::domain::work_item::NewWorkItem;
    use chrono::Utc;

    fn work_item(machine: &str, skill: SkillLevel) -> WorkItem {
        NewWorkItem {
            id: "WI-1".to_string(),
            bundle_no: "B-1".to_string(),
            machine_type: machine.to_string(),
            required_skill_level: skill,
            priority: UrgencyLevel::Normal,
            estimated_duration: 60,
            total_pieces: 30,
            rate_per_piece: 1.5,
            due_date: None,
        }
        .into_work_item(Utc::now())
    }

    fn operator(machines: &[&str], skill: SkillLevel, current: u32, max: u32) -> Operator {
        let mut op = NewOperator {
            id: "OP-1".to_string(),
            name: "Ravi".to_string(),
            machine_types: machines.iter().map(|m| m.to_string()).collect(),
            skill_level: skill,
            average_efficiency: 0.85,
            quality_score: 0.95,
            max_concurrent_work: max,
        }
        .into_operator(Utc::now());
        op.current_assignments = current;
        op
    }

    #[test]
    fn test_exact_match_full_score() {
        let wi = work_item("overlock", SkillLevel::Intermediate);
        let op = operator(&["overlock"], SkillLevel::Intermediate, 0, 2);
        let result = calculate_match_score(&wi, &op);
        // 50 + 40 + 20 + 8 + 7 = 125 → 截断 100
        assert_eq!(result.score, 100);
        assert!(result.machine_compatible);
        assert_eq!(result.reasons.len(), 3);
        assert_eq!(result.reasons[0], "Operates overlock");
    }

    #[test]
    fn test_related_machine_scores_half() {
        let wi = work_item("flatlock", SkillLevel::Beginner);
        let mut op = operator(&["overlock"], SkillLevel::Beginner, 2, 2);
        op.average_efficiency = 0.5;
        op.quality_score = 0.5;
        let result = calculate_match_score(&wi, &op);
        // 25 + 40 + 0
        assert_eq!(result.score, 65);
        assert_eq!(machine_fit(&op, "flatlock"), MachineFit::Related);
    }

    #[test]
    fn test_incompatible_machine_returns_early() {
        let wi = work_item("bartack", SkillLevel::Beginner);
        let op = operator(&["overlock"], SkillLevel::Expert, 0, 2);
        let result = calculate_match_score(&wi, &op);
        assert_eq!(result.score, 0);
        assert!(!result.machine_compatible);
        assert_eq!(result.reasons, vec!["Cannot operate bartack".to_string()]);
    }

    #[test]
    fn test_skill_gap_degrades_score() {
        let wi = work_item("overlock", SkillLevel::Expert);
        let mut op = operator(&["overlock"], SkillLevel::Beginner, 2, 2);
        op.average_efficiency = 0.5;
        op.quality_score = 0.5;
        // gap 3 → 0
        assert_eq!(calculate_match_score(&wi, &op).score, 50);
        op.skill_level = SkillLevel::Intermediate;
        // gap 2 → 10
        assert_eq!(calculate_match_score(&wi, &op).score, 60);
        op.skill_level = SkillLevel::Advanced;
        // gap 1 → 20
        assert_eq!(calculate_match_score(&wi, &op).score, 70);
    }

    #[test]
    fn test_workload_bands() {
        let wi = work_item("overlock", SkillLevel::Beginner);
        let cases = [(0, 4, 20), (2, 4, 15), (3, 4, 5), (4, 4, 0), (1, 0, 0)];
        for (current, max, expected) in cases {
            let mut op = operator(&["overlock"], SkillLevel::Beginner, current, max);
            op.average_efficiency = 0.0;
            op.quality_score = 0.0;
            assert_eq!(
                calculate_match_score(&wi, &op).score,
                90 + expected,
                "current={} max={}",
                current,
                max
            );
        }
    }

    #[test]
    fn test_score_monotonic_in_skill() {
        let levels = [
            SkillLevel::Beginner,
            SkillLevel::Intermediate,
            SkillLevel::Advanced,
            SkillLevel::Expert,
        ];
        for required in levels {
            for machines in [&["overlock"][..], &["flatlock"][..]] {
                let wi = work_item("overlock", required);
                let mut prev = 0;
                for level in levels {
                    let mut op = operator(machines, level, 3, 4);
                    op.average_efficiency = 0.7;
                    op.quality_score = 0.95;
                    let score = calculate_match_score(&wi, &op).score;
                    assert!(score >= prev, "required={:?} level={:?}", required, level);
                    prev = score;
                }
            }
        }
    }

    #[test]
    fn test_rule_based_scorer_delegates() {
        let wi = work_item("overlock", SkillLevel::Beginner);
        let op = operator(&["overlock"], SkillLevel::Beginner, 0, 2);
        let scorer = RuleBasedScorer;
        assert_eq!(scorer.name(), "rule_based");
        assert_eq!(scorer.score(&wi, &op), calculate_match_score(&wi, &op));
    }
}
