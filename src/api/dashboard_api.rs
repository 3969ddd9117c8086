// ==========================================
// 服装工厂 ERP - 看板 API
// ==========================================
// 职责: 日产指标、产线效率、派工推荐、待派工单排序
// 只读: 不产生任何写入
// ==========================================

use std::sync::Arc;

use chrono::NaiveDate;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::types::WorkStatus;
use crate::domain::work_item::WorkItem;
use crate::engine::efficiency::{
    calculate_daily_metrics, calculate_line_efficiency, DailyMetrics, LineEfficiency,
};
use crate::engine::priority::{sort_by_priority, PriorityScore};
use crate::engine::quality::{calculate_quality_metrics, QualityMetrics};
use crate::engine::recommendation::{Recommendation, RecommendationEngine};
use crate::repository::{
    DamageReportRepository, OperatorRepository, ProductionRepository, WorkItemRepository,
};

pub struct DashboardApi {
    operator_repo: Arc<OperatorRepository>,
    work_item_repo: Arc<WorkItemRepository>,
    damage_repo: Arc<DamageReportRepository>,
    production_repo: Arc<ProductionRepository>,
    engine: RecommendationEngine,
}

impl DashboardApi {
    pub fn new(
        operator_repo: Arc<OperatorRepository>,
        work_item_repo: Arc<WorkItemRepository>,
        damage_repo: Arc<DamageReportRepository>,
        production_repo: Arc<ProductionRepository>,
    ) -> Self {
        Self {
            operator_repo,
            work_item_repo,
            damage_repo,
            production_repo,
            engine: RecommendationEngine::new(),
        }
    }

    /// 单日生产指标（无记录时全为 0）
    pub fn daily_metrics(&self, date: NaiveDate) -> ApiResult<DailyMetrics> {
        let records = self.production_repo.list_by_date(date)?;
        Ok(calculate_daily_metrics(&records))
    }

    pub fn line_efficiency(&self, date: NaiveDate, target_pieces: u64) -> ApiResult<LineEfficiency> {
        let records = self.production_repo.list_by_date(date)?;
        Ok(calculate_line_efficiency(&records, target_pieces))
    }

    /// 操作员质量指标（生产记录 + 损坏报告）
    pub fn operator_quality(&self, operator_id: &str) -> ApiResult<QualityMetrics> {
        let records = self.production_repo.list_by_operator(operator_id)?;
        let reports = self.damage_repo.list_by_operator(operator_id)?;
        Ok(calculate_quality_metrics(&records, &reports))
    }

    /// 为工单推荐操作员（仅可接单的操作员）
    pub fn recommend_operators(&self, work_item_id: &str, limit: usize) -> ApiResult<Vec<Recommendation>> {
        let work_item = self
            .work_item_repo
            .find_by_id(work_item_id)?
            .ok_or_else(|| ApiError::NotFound(format!("工单(id={})不存在", work_item_id)))?;

        let candidates: Vec<_> = self
            .operator_repo
            .list(None)?
            .into_iter()
            .filter(|op| op.status.is_assignable())
            .collect();

        let mut recs = self.engine.generate_recommendations(&work_item, &candidates);
        recs.truncate(limit);
        Ok(recs)
    }

    /// 为操作员推荐待派工单
    pub fn recommend_work(&self, operator_id: &str, limit: usize) -> ApiResult<Vec<Recommendation>> {
        let operator = self
            .operator_repo
            .find_by_id(operator_id)?
            .ok_or_else(|| ApiError::NotFound(format!("操作员(id={})不存在", operator_id)))?;
        let available = self.work_item_repo.list_by_status(WorkStatus::Available)?;
        Ok(self.engine.recommend_work_for_operator(&operator, &available, limit))
    }

    /// 待派工单按优先级排序
    pub fn prioritized_work(&self, today: NaiveDate) -> ApiResult<Vec<(WorkItem, PriorityScore)>> {
        let available = self.work_item_repo.list_by_status(WorkStatus::Available)?;
        Ok(sort_by_priority(available, today))
    }
}
