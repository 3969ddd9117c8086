// ==========================================
// 服装工厂 ERP - 派工推荐引擎
// ==========================================
// 推荐版权重 (满分 100，与规则版独立调参):
// - 机型: 完全匹配 40 / 同组 20 / 不兼容 → 直接返回 10，不再计算其余项
// - 技能: 达标 25 / 每差一级 −8 (最低 0)
// - 效率: min(效率, 1.0) × 20
// - 质量: min(质量, 1.0) × 15
// 置信度: ≥75 high, ≥50 medium, 其他 low
// ==========================================
// 说明: 规则版 (matching) 与推荐版对同一输入分数不同，
// 两者都通过 MatchScorer 暴露，由调用方选择
// ==========================================

use crate::domain::operator::Operator;
use crate::domain::work_item::WorkItem;
use crate::engine::matching::{machine_fit, MachineFit, MatchScore, MatchScorer};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// 机型不兼容时的分数上限
pub const MACHINE_MISMATCH_CAP: u32 = 10;

// ==========================================
// WeightedScorer - 推荐版评分器
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedScorer;

impl MatchScorer for WeightedScorer {
    fn name(&self) -> &'static str {
        "weighted"
    }

    fn score(&self, work_item: &WorkItem, operator: &Operator) -> MatchScore {
        let fit = machine_fit(operator, &work_item.machine_type);
        if fit == MachineFit::Incompatible {
            return MatchScore {
                score: MACHINE_MISMATCH_CAP,
                machine_compatible: false,
                reasons: vec![format!("Cannot operate {}", work_item.machine_type)],
            };
        }

        let mut parts: Vec<(f64, String)> = Vec::with_capacity(4);
        if fit == MachineFit::Exact {
            parts.push((40.0, "Machine type match".to_string()));
        } else {
            parts.push((20.0, "Related machine group".to_string()));
        }

        // 技能
        let gap = work_item.required_skill_level.rank() - operator.skill_level.rank();
        let skill_points = if gap <= 0 {
            25.0
        } else {
            (25.0 - 8.0 * gap as f64).max(0.0)
        };
        parts.push((
            skill_points,
            if gap <= 0 {
                "Meets skill requirement".to_string()
            } else {
                format!("Skill gap of {} level(s)", gap)
            },
        ));

        let efficiency_points = operator.average_efficiency.clamp(0.0, 1.0) * 20.0;
        parts.push((
            efficiency_points,
            format!("Efficiency {:.0}%", operator.average_efficiency * 100.0),
        ));

        let quality_points = operator.quality_score.clamp(0.0, 1.0) * 15.0;
        parts.push((
            quality_points,
            format!("Quality {:.0}%", operator.quality_score * 100.0),
        ));

        let score: f64 = parts.iter().map(|(points, _)| points).sum();
        parts.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        MatchScore {
            score: (score.round() as u32).min(100),
            machine_compatible: true,
            reasons: parts.into_iter().take(3).map(|(_, r)| r).collect(),
        }
    }
}

// ==========================================
// Recommendation - 推荐结果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn from_score(score: u32) -> Self {
        if score >= 75 {
            Confidence::High
        } else if score >= 50 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub operator_id: String,
    pub work_item_id: String,
    pub score: u32,
    pub confidence: Confidence,
    pub scorer: String,
    pub reasons: Vec<String>,
    pub warnings: Vec<String>,
}

// ==========================================
// RecommendationEngine - 推荐引擎
// ==========================================
pub struct RecommendationEngine<S: MatchScorer = WeightedScorer> {
    scorer: S,
}

impl RecommendationEngine<WeightedScorer> {
    pub fn new() -> Self {
        Self {
            scorer: WeightedScorer,
        }
    }
}

impl Default for RecommendationEngine<WeightedScorer> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: MatchScorer> RecommendationEngine<S> {
    /// 使用指定评分器
    pub fn with_scorer(scorer: S) -> Self {
        Self { scorer }
    }

    pub fn scorer_name(&self) -> &'static str {
        self.scorer.name()
    }

    /// 单个操作员 × 单个工单的推荐评估
    pub fn evaluate(&self, work_item: &WorkItem, operator: &Operator) -> Recommendation {
        let result = self.scorer.score(work_item, operator);

        let mut warnings = Vec::new();
        if !operator.status.is_assignable() {
            warnings.push(format!("Operator is {}", operator.status));
        }
        if operator.is_at_capacity() {
            warnings.push("Operator at full capacity".to_string());
        }
        if operator.skill_level < work_item.required_skill_level {
            warnings.push(format!(
                "Requires {} skill",
                work_item.required_skill_level
            ));
        }

        Recommendation {
            operator_id: operator.id.clone(),
            work_item_id: work_item.id.clone(),
            score: result.score,
            confidence: Confidence::from_score(result.score),
            scorer: self.scorer.name().to_string(),
            reasons: result.reasons,
            warnings,
        }
    }

    /// 为工单生成候选操作员推荐（分数降序，同分按操作员 ID）
    #[instrument(skip_all, fields(work_item_id = %work_item.id, candidates = operators.len()))]
    pub fn generate_recommendations(
        &self,
        work_item: &WorkItem,
        operators: &[Operator],
    ) -> Vec<Recommendation> {
        let mut recs: Vec<Recommendation> = operators
            .iter()
            .map(|op| self.evaluate(work_item, op))
            .collect();
        recs.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.operator_id.cmp(&b.operator_id))
        });
        tracing::debug!(
            top = recs.first().map(|r| r.score).unwrap_or(0),
            "推荐生成完成"
        );
        recs
    }

    /// 为操作员挑选合适工单（只保留机型兼容的）
    pub fn recommend_work_for_operator(
        &self,
        operator: &Operator,
        work_items: &[WorkItem],
        limit: usize,
    ) -> Vec<Recommendation> {
        let mut recs: Vec<Recommendation> = work_items
            .iter()
            .filter(|wi| machine_fit(operator, &wi.machine_type) != MachineFit::Incompatible)
            .map(|wi| self.evaluate(wi, operator))
            .collect();
        recs.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.work_item_id.cmp(&b.work_item_id))
        });
        recs.truncate(limit);
        recs
    }
}
