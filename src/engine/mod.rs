// ==========================================
// 服装工厂 ERP - 引擎层（业务规则库）
// ==========================================
// 职责: 计件工资、质量、效率、优先级、匹配评分、推荐、校验
// 红线: Engine 不拼 SQL, 不做 I/O, 所有评分必须输出 reason
// ==========================================

pub mod efficiency;
pub mod events;
pub mod matching;
pub mod payment;
pub mod priority;
pub mod quality;
pub mod recommendation;
pub mod validation;

pub use efficiency::{
    calculate_daily_metrics, calculate_efficiency, calculate_efficiency_metrics,
    calculate_line_efficiency, calculate_operator_performance, DailyMetrics, EfficiencyMetrics,
    LineEfficiency, OperatorPerformance,
};
pub use events::{
    ErpEvent, ErpEventPublisher, ErpEventType, NoOpEventPublisher, OptionalEventPublisher,
};
pub use matching::{calculate_match_score, MatchScore, MatchScorer, RuleBasedScorer};
pub use payment::{
    calculate_base_payment, calculate_damage_aware_payment,
    calculate_damage_aware_payment_with_threshold, calculate_damage_deduction,
    calculate_quality_bonus, calculate_with_efficiency_bonus, DamageAwarePayment,
    DamageDeduction, DEFAULT_EFFICIENCY_THRESHOLD,
};
pub use priority::{calculate_priority_score, sort_by_priority, PriorityInput, PriorityScore};
pub use quality::{calculate_quality_metrics, calculate_quality_score, QualityMetrics};
pub use recommendation::{Confidence, Recommendation, RecommendationEngine, WeightedScorer};
pub use validation::{validate_operator_profile, validate_work_assignment, ValidationFailure};
