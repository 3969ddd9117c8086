// ==========================================
// 服装工厂 ERP - 操作员 API
// ==========================================
// 职责: 操作员建档、查询、状态变更、实时状态合并视图
// 写入: 档案与 outbox 镜像在同一事务内落库
// ==========================================

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Transaction};
use serde_json::json;

use crate::api::error::{ApiError, ApiResult};
use crate::api::paths;
use crate::domain::operator::{LiveOperatorStatus, NewOperator, Operator, OperatorRecord};
use crate::domain::types::OperatorStatus;
use crate::engine::events::{ErpEvent, ErpEventType, OptionalEventPublisher};
use crate::engine::efficiency::{calculate_operator_performance, OperatorPerformance};
use crate::engine::validation::validate_operator_profile;
use crate::realtime::RealtimeStore;
use crate::repository::{
    with_transaction, DamageReportRepository, OperatorRepository, OutboxOperation,
    OutboxRepository, ProductionRepository, RepositoryError, RepositoryResult,
};

// ==========================================
// 事务内辅助: 供派工/损坏上报复用
// ==========================================

/// 操作员镜像按事务内最新值写入 outbox
pub(crate) fn enqueue_operator_merge(tx: &Transaction, operator: &Operator) -> RepositoryResult<()> {
    OutboxRepository::enqueue(
        tx,
        &paths::operator(&operator.id),
        OutboxOperation::Merge,
        &json!({
            "status": operator.status.as_str(),
            "current_assignments": operator.current_assignments,
            "average_efficiency": operator.average_efficiency,
            "quality_score": operator.quality_score,
            "updated_at": operator.updated_at,
        }),
    )?;
    Ok(())
}

/// 按累计生产记录与损坏报告刷新画像，返回写回后的档案
pub(crate) fn refresh_operator_performance(
    tx: &Transaction,
    operator_id: &str,
    now: DateTime<Utc>,
) -> RepositoryResult<Operator> {
    let operator = OperatorRepository::find_by_id_with(tx, operator_id)?
        .ok_or_else(|| RepositoryError::not_found("Operator", operator_id))?;
    let records = ProductionRepository::list_by_operator_with(tx, operator_id)?;
    let damage_reports = DamageReportRepository::list_by_operator_with(tx, operator_id)?;

    let refreshed = calculate_operator_performance(
        OperatorPerformance {
            average_efficiency: operator.average_efficiency,
            quality_score: operator.quality_score,
        },
        &records,
        &damage_reports,
    );
    OperatorRepository::update_performance(
        tx,
        operator_id,
        refreshed.average_efficiency,
        refreshed.quality_score,
        now,
    )?;

    Ok(Operator {
        average_efficiency: refreshed.average_efficiency,
        quality_score: refreshed.quality_score,
        updated_at: now,
        ..operator
    })
}

pub struct OperatorApi {
    conn: Arc<Mutex<Connection>>,
    operator_repo: Arc<OperatorRepository>,
    realtime: Arc<dyn RealtimeStore>,
    events: Arc<OptionalEventPublisher>,
}

impl OperatorApi {
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        operator_repo: Arc<OperatorRepository>,
        realtime: Arc<dyn RealtimeStore>,
        events: Arc<OptionalEventPublisher>,
    ) -> Self {
        Self {
            conn,
            operator_repo,
            realtime,
            events,
        }
    }

    /// 新建操作员
    ///
    /// 校验失败直接返回，不写入任何数据
    pub fn create_operator(&self, new_operator: NewOperator) -> ApiResult<Operator> {
        validate_operator_profile(&new_operator)?;

        let operator = new_operator.into_operator(Utc::now());
        let doc = serde_json::to_value(&operator)?;

        with_transaction(&self.conn, |tx| {
            OperatorRepository::insert(tx, &operator)?;
            OutboxRepository::enqueue(
                tx,
                &paths::operator(&operator.id),
                OutboxOperation::Set,
                &doc,
            )?;
            Ok(())
        })
        .map_err(|e| ApiError::from(e).in_operation(ApiError::OperatorCreateFailed))?;

        tracing::info!(operator_id = %operator.id, skill = %operator.skill_level, "操作员已建档");
        Ok(operator)
    }

    pub fn find_operator(&self, operator_id: &str) -> ApiResult<Option<Operator>> {
        Ok(self.operator_repo.find_by_id(operator_id)?)
    }

    pub fn get_operator(&self, operator_id: &str) -> ApiResult<Operator> {
        self.find_operator(operator_id)?
            .ok_or_else(|| ApiError::NotFound(format!("操作员(id={})不存在", operator_id)))
    }

    pub fn list_operators(&self, status: Option<OperatorStatus>) -> ApiResult<Vec<Operator>> {
        Ok(self.operator_repo.list(status)?)
    }

    /// 更新操作员状态（休息/离线/请假等）
    pub fn update_status(&self, operator_id: &str, status: OperatorStatus) -> ApiResult<Operator> {
        let now = Utc::now();
        with_transaction(&self.conn, |tx| {
            OperatorRepository::update_status(tx, operator_id, status, now)?;
            OutboxRepository::enqueue(
                tx,
                &paths::operator(operator_id),
                OutboxOperation::Merge,
                &json!({ "status": status.as_str(), "updated_at": now }),
            )?;
            Ok(())
        })?;

        let event = ErpEvent::new(
            ErpEventType::OperatorStatusChanged,
            operator_id,
            json!({ "status": status.as_str() }),
        );
        if let Err(e) = self.events.publish(event) {
            tracing::warn!(operator_id, error = %e, "状态变更事件发布失败");
        }

        self.get_operator(operator_id)
    }

    /// 车间终端上报实时状态（只写实时库）
    pub async fn report_live_status(&self, live: &LiveOperatorStatus) -> ApiResult<()> {
        let doc = serde_json::to_value(live)?;
        self.realtime
            .set(&paths::live_status(&live.id), doc)
            .await?;
        Ok(())
    }

    /// 合并视图: 持久化档案 + 实时状态
    ///
    /// 实时库不可用或文档无法解析时退回档案本身
    pub async fn resolve_operator(&self, operator_id: &str) -> ApiResult<Operator> {
        let profile = self.get_operator(operator_id)?;

        let doc = match self.realtime.get(&paths::live_status(operator_id)).await {
            Ok(Some(doc)) => doc,
            Ok(None) => return Ok(profile),
            Err(e) => {
                tracing::warn!(operator_id, error = %e, "实时库不可用，返回持久化档案");
                return Ok(profile);
            }
        };

        match OperatorRecord::from_document(doc) {
            Ok(record) => Ok(record.merge_into(profile)),
            Err(e) => {
                tracing::warn!(operator_id, error = %e, "实时状态文档格式错误，忽略");
                Ok(profile)
            }
        }
    }
}
