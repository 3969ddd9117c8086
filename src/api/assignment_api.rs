// ==========================================
// 服装工厂 ERP - 派工 API
// ==========================================
// 职责:
// - 工单建档与查询
// - 主管派工（直接生效）/ 操作员自助申领（待审批）/ 审批
// - 生产进度登记
// 并发: 同一工单并发派工先到先得；操作员名额在事务内判断
//       两类冲突均返回 ASSIGNMENT_CONFLICT
// ==========================================

use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::api::operator_api::{enqueue_operator_merge, refresh_operator_performance};
use crate::api::paths;
use crate::domain::assignment::WorkAssignment;
use crate::domain::operator::Operator;
use crate::domain::production::ProductionRecord;
use crate::domain::types::{AssignmentStatus, WorkStatus};
use crate::domain::work_item::{NewWorkItem, WorkItem};
use crate::engine::events::{ErpEvent, ErpEventType, OptionalEventPublisher};
use crate::engine::matching::calculate_match_score;
use crate::engine::payment::calculate_base_payment;
use crate::engine::validation::validate_work_assignment;
use crate::repository::{
    with_transaction, AssignmentRepository, OperatorRepository, OutboxOperation,
    OutboxRepository, ProductionRepository, RepositoryError, WorkItemRepository,
};

/// 进度登记请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub operator_id: String,
    pub pieces: u32,
    pub actual_minutes: f64,
    #[serde(default)]
    pub damaged_pieces: u32,
    pub production_date: NaiveDate,
}

pub struct AssignmentApi {
    conn: Arc<Mutex<Connection>>,
    operator_repo: Arc<OperatorRepository>,
    work_item_repo: Arc<WorkItemRepository>,
    assignment_repo: Arc<AssignmentRepository>,
    events: Arc<OptionalEventPublisher>,
}

impl AssignmentApi {
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        operator_repo: Arc<OperatorRepository>,
        work_item_repo: Arc<WorkItemRepository>,
        assignment_repo: Arc<AssignmentRepository>,
        events: Arc<OptionalEventPublisher>,
    ) -> Self {
        Self {
            conn,
            operator_repo,
            work_item_repo,
            assignment_repo,
            events,
        }
    }

    // ==========================================
    // 工单
    // ==========================================

    pub fn create_work_item(&self, new_item: NewWorkItem) -> ApiResult<WorkItem> {
        let mut reasons = Vec::new();
        if new_item.id.trim().is_empty() {
            reasons.push("work item id is required".to_string());
        }
        if new_item.machine_type.trim().is_empty() {
            reasons.push("machine type is required".to_string());
        }
        if new_item.total_pieces == 0 {
            reasons.push("total pieces must be at least 1".to_string());
        }
        if !new_item.rate_per_piece.is_finite() || new_item.rate_per_piece < 0.0 {
            reasons.push(format!("rate per piece {} is invalid", new_item.rate_per_piece));
        }
        if !reasons.is_empty() {
            return Err(ApiError::ValidationFailed { reasons });
        }

        let item = new_item.into_work_item(Utc::now());
        let doc = serde_json::to_value(&item)?;
        with_transaction(&self.conn, |tx| {
            WorkItemRepository::insert(tx, &item)?;
            OutboxRepository::enqueue(tx, &paths::work_item(&item.id), OutboxOperation::Set, &doc)?;
            Ok(())
        })?;

        tracing::info!(work_item_id = %item.id, bundle_no = %item.bundle_no, "工单已创建");
        Ok(item)
    }

    pub fn find_work_item(&self, work_item_id: &str) -> ApiResult<Option<WorkItem>> {
        Ok(self.work_item_repo.find_by_id(work_item_id)?)
    }

    pub fn get_work_item(&self, work_item_id: &str) -> ApiResult<WorkItem> {
        self.find_work_item(work_item_id)?
            .ok_or_else(|| ApiError::NotFound(format!("工单(id={})不存在", work_item_id)))
    }

    pub fn list_work_items(&self, status: WorkStatus) -> ApiResult<Vec<WorkItem>> {
        Ok(self.work_item_repo.list_by_status(status)?)
    }

    pub fn get_assignment(&self, assignment_id: &str) -> ApiResult<WorkAssignment> {
        self.assignment_repo
            .find_by_id(assignment_id)?
            .ok_or_else(|| ApiError::NotFound(format!("派工单(id={})不存在", assignment_id)))
    }

    pub fn list_pending_requests(&self) -> ApiResult<Vec<WorkAssignment>> {
        Ok(self.assignment_repo.list_pending()?)
    }

    // ==========================================
    // 派工
    // ==========================================

    fn load_pair(&self, operator_id: &str, work_item_id: &str) -> ApiResult<(Operator, WorkItem)> {
        let operator = self
            .operator_repo
            .find_by_id(operator_id)?
            .ok_or_else(|| ApiError::NotFound(format!("操作员(id={})不存在", operator_id)))?;
        let work_item = self.get_work_item(work_item_id)?;
        Ok((operator, work_item))
    }

    /// 已被他人占用的工单视为冲突，先于业务校验判断
    fn ensure_available(work_item: &WorkItem) -> ApiResult<()> {
        if work_item.status != WorkStatus::Available {
            return Err(ApiError::AssignmentConflict(format!(
                "工单 {} 当前状态为 {}",
                work_item.id, work_item.status
            )));
        }
        Ok(())
    }

    /// 派工生效: 工单加锁 + 操作员占用名额 + outbox，同一事务
    ///
    /// decide_pending 为 Some(审批人) 时更新已有申领单，否则插入新派工单；
    /// 同一工单其余待审批申领一并驳回，返回被驳回的申领
    fn commit_assignment(
        &self,
        work_item: &WorkItem,
        assignment: &WorkAssignment,
        decide_pending: Option<&str>,
    ) -> ApiResult<Vec<WorkAssignment>> {
        let now = Utc::now();
        let assignment_doc = serde_json::to_value(assignment)?;
        let decided_by = decide_pending.unwrap_or(assignment.requested_by.as_str());

        with_transaction(&self.conn, |tx| {
            if let Some(approver) = decide_pending {
                AssignmentRepository::decide(
                    tx,
                    &assignment.assignment_id,
                    AssignmentStatus::Approved,
                    approver,
                    now,
                )?;
            } else {
                AssignmentRepository::insert(tx, assignment)?;
            }

            let revision = WorkItemRepository::assign(
                tx,
                &work_item.id,
                &assignment.operator_id,
                work_item.revision,
                now,
            )?;
            let operator = OperatorRepository::occupy_slot(tx, &assignment.operator_id, now)?;
            let superseded = AssignmentRepository::reject_open_requests(
                tx,
                &work_item.id,
                &assignment.assignment_id,
                decided_by,
                now,
            )?;

            OutboxRepository::enqueue(
                tx,
                &paths::work_item(&work_item.id),
                OutboxOperation::Merge,
                &json!({
                    "status": WorkStatus::Assigned.as_str(),
                    "assigned_operator_id": assignment.operator_id,
                    "revision": revision,
                    "updated_at": now,
                }),
            )?;
            enqueue_operator_merge(tx, &operator)?;
            OutboxRepository::enqueue(
                tx,
                &paths::assignment(&assignment.assignment_id),
                OutboxOperation::Set,
                &assignment_doc,
            )?;
            for rejected in &superseded {
                OutboxRepository::enqueue(
                    tx,
                    &paths::assignment(&rejected.assignment_id),
                    OutboxOperation::Merge,
                    &json!({
                        "status": AssignmentStatus::Rejected.as_str(),
                        "approved_by": decided_by,
                        "decided_at": now,
                    }),
                )?;
            }
            Ok(superseded)
        })
        .map_err(|e| ApiError::from(e).in_operation(ApiError::AssignmentFailed))
    }

    /// 被连带驳回的申领逐一通知申领人
    fn notify_superseded(&self, superseded: Vec<WorkAssignment>) {
        for rejected in superseded {
            let mut event = ErpEvent::new(
                ErpEventType::AssignmentDecided,
                &rejected.work_item_id,
                json!({
                    "assignment_id": rejected.assignment_id,
                    "status": rejected.status.as_str(),
                    "reason": "work item assigned",
                }),
            );
            event.recipient = Some(rejected.operator_id.clone());
            self.publish(event);
        }
    }

    fn publish(&self, event: ErpEvent) {
        let entity_id = event.entity_id.clone();
        if let Err(e) = self.events.publish(event) {
            tracing::warn!(entity_id = %entity_id, error = %e, "派工事件发布失败");
        }
    }

    /// 主管派工（直接生效）
    pub fn assign_work(
        &self,
        operator_id: &str,
        work_item_id: &str,
        assigned_by: &str,
    ) -> ApiResult<WorkAssignment> {
        let (operator, work_item) = self.load_pair(operator_id, work_item_id)?;
        Self::ensure_available(&work_item)?;
        validate_work_assignment(&operator, &work_item)?;

        let now = Utc::now();
        let match_score = calculate_match_score(&work_item, &operator);
        let assignment = WorkAssignment {
            assignment_id: Uuid::new_v4().to_string(),
            work_item_id: work_item.id.clone(),
            operator_id: operator.id.clone(),
            status: AssignmentStatus::Approved,
            requested_by: assigned_by.to_string(),
            approved_by: Some(assigned_by.to_string()),
            match_score: match_score.score,
            created_at: now,
            decided_at: Some(now),
        };

        let superseded = self.commit_assignment(&work_item, &assignment, None)?;

        tracing::info!(
            assignment_id = %assignment.assignment_id,
            operator_id,
            work_item_id,
            match_score = match_score.score,
            superseded = superseded.len(),
            "派工已生效"
        );

        let mut event = ErpEvent::new(
            ErpEventType::WorkAssigned,
            work_item_id,
            json!({ "assignment_id": assignment.assignment_id, "operator_id": operator_id }),
        );
        event.recipient = Some(operator_id.to_string());
        self.publish(event);
        self.notify_superseded(superseded);

        Ok(assignment)
    }

    /// 操作员自助申领（待审批，不锁定工单）
    pub fn request_self_assignment(
        &self,
        operator_id: &str,
        work_item_id: &str,
    ) -> ApiResult<WorkAssignment> {
        let (operator, work_item) = self.load_pair(operator_id, work_item_id)?;
        Self::ensure_available(&work_item)?;
        validate_work_assignment(&operator, &work_item)?;

        let match_score = calculate_match_score(&work_item, &operator);
        let assignment = WorkAssignment {
            assignment_id: Uuid::new_v4().to_string(),
            work_item_id: work_item.id.clone(),
            operator_id: operator.id.clone(),
            status: AssignmentStatus::Requested,
            requested_by: operator.id.clone(),
            approved_by: None,
            match_score: match_score.score,
            created_at: Utc::now(),
            decided_at: None,
        };
        let doc = serde_json::to_value(&assignment)?;

        with_transaction(&self.conn, |tx| {
            AssignmentRepository::insert(tx, &assignment)?;
            OutboxRepository::enqueue(
                tx,
                &paths::assignment(&assignment.assignment_id),
                OutboxOperation::Set,
                &doc,
            )?;
            Ok(())
        })
        .map_err(|e| ApiError::from(e).in_operation(ApiError::AssignmentFailed))?;

        tracing::info!(assignment_id = %assignment.assignment_id, operator_id, work_item_id, "自助申领已提交");
        Ok(assignment)
    }

    /// 审批通过: 重新校验后走与主管派工相同的生效路径
    pub fn approve_assignment(
        &self,
        assignment_id: &str,
        approved_by: &str,
    ) -> ApiResult<WorkAssignment> {
        let pending = self.get_assignment(assignment_id)?;
        if pending.status != AssignmentStatus::Requested {
            return Err(ApiError::InvalidStateTransition {
                from: pending.status.as_str().to_string(),
                to: AssignmentStatus::Approved.as_str().to_string(),
            });
        }

        let (operator, work_item) = self.load_pair(&pending.operator_id, &pending.work_item_id)?;
        Self::ensure_available(&work_item)?;
        validate_work_assignment(&operator, &work_item)?;

        let approved = WorkAssignment {
            status: AssignmentStatus::Approved,
            approved_by: Some(approved_by.to_string()),
            decided_at: Some(Utc::now()),
            ..pending
        };
        let superseded = self.commit_assignment(&work_item, &approved, Some(approved_by))?;
        tracing::info!(
            assignment_id,
            approved_by,
            superseded = superseded.len(),
            "自助申领已审批通过"
        );

        let mut event = ErpEvent::new(
            ErpEventType::AssignmentDecided,
            &approved.work_item_id,
            json!({ "assignment_id": assignment_id, "status": approved.status.as_str() }),
        );
        event.recipient = Some(approved.operator_id.clone());
        self.publish(event);
        self.notify_superseded(superseded);

        Ok(approved)
    }

    pub fn reject_assignment(
        &self,
        assignment_id: &str,
        rejected_by: &str,
        reason: Option<&str>,
    ) -> ApiResult<WorkAssignment> {
        let now = Utc::now();
        with_transaction(&self.conn, |tx| {
            AssignmentRepository::decide(tx, assignment_id, AssignmentStatus::Rejected, rejected_by, now)?;
            OutboxRepository::enqueue(
                tx,
                &paths::assignment(assignment_id),
                OutboxOperation::Merge,
                &json!({
                    "status": AssignmentStatus::Rejected.as_str(),
                    "approved_by": rejected_by,
                    "decided_at": now,
                }),
            )?;
            Ok(())
        })?;

        let rejected = self.get_assignment(assignment_id)?;
        let mut event = ErpEvent::new(
            ErpEventType::AssignmentDecided,
            &rejected.work_item_id,
            json!({
                "assignment_id": assignment_id,
                "status": rejected.status.as_str(),
                "reason": reason,
            }),
        );
        event.recipient = Some(rejected.operator_id.clone());
        self.publish(event);

        Ok(rejected)
    }

    // ==========================================
    // 生产进度
    // ==========================================

    /// 登记完工件数；全部完工时释放操作员在制数
    pub fn record_progress(&self, work_item_id: &str, update: &ProgressUpdate) -> ApiResult<WorkItem> {
        let work_item = self.get_work_item(work_item_id)?;

        let mut reasons = Vec::new();
        if update.pieces == 0 {
            reasons.push("pieces must be at least 1".to_string());
        }
        if !update.actual_minutes.is_finite() || update.actual_minutes < 0.0 {
            reasons.push(format!("actual minutes {} is invalid", update.actual_minutes));
        }
        if update.damaged_pieces > update.pieces {
            reasons.push("damaged pieces exceed produced pieces".to_string());
        }
        if !matches!(work_item.status, WorkStatus::Assigned | WorkStatus::InProgress) {
            reasons.push(format!("work item {} is {}", work_item.id, work_item.status));
        }
        if work_item.assigned_operator_id.as_deref() != Some(update.operator_id.as_str()) {
            reasons.push(format!(
                "work item {} is not assigned to {}",
                work_item.id, update.operator_id
            ));
        }
        if update.pieces > work_item.remaining_pieces() {
            reasons.push(format!(
                "pieces {} exceed remaining {}",
                update.pieces,
                work_item.remaining_pieces()
            ));
        }
        if !reasons.is_empty() {
            return Err(ApiError::ValidationFailed { reasons });
        }

        let completed = work_item.completed_pieces + update.pieces;
        let status = if completed >= work_item.total_pieces {
            WorkStatus::Completed
        } else {
            WorkStatus::InProgress
        };
        let record = ProductionRecord {
            operator_id: update.operator_id.clone(),
            work_item_id: work_item.id.clone(),
            production_date: update.production_date,
            pieces: update.pieces,
            standard_minutes_per_piece: work_item.standard_minutes_per_piece(),
            actual_minutes: update.actual_minutes,
            damaged_pieces: update.damaged_pieces,
            earnings: calculate_base_payment(work_item.rate_per_piece, update.pieces),
        };
        let now = Utc::now();

        with_transaction(&self.conn, |tx| {
            ProductionRepository::insert_record(tx, &record)?;
            let revision = WorkItemRepository::update_progress(
                tx,
                &work_item.id,
                completed,
                status,
                work_item.revision,
                now,
            )?;
            refresh_operator_performance(tx, &update.operator_id, now)?;
            let operator = if status == WorkStatus::Completed {
                OperatorRepository::release_slot(tx, &update.operator_id, now)?
            } else {
                OperatorRepository::find_by_id_with(tx, &update.operator_id)?.ok_or_else(|| {
                    RepositoryError::not_found("Operator", &update.operator_id)
                })?
            };
            enqueue_operator_merge(tx, &operator)?;
            OutboxRepository::enqueue(
                tx,
                &paths::work_item(&work_item.id),
                OutboxOperation::Merge,
                &json!({
                    "completed_pieces": completed,
                    "status": status.as_str(),
                    "revision": revision,
                    "updated_at": now,
                }),
            )?;
            Ok(())
        })?;

        tracing::info!(
            work_item_id,
            operator_id = %update.operator_id,
            pieces = update.pieces,
            completed,
            status = %status,
            "生产进度已登记"
        );
        self.get_work_item(work_item_id)
    }
}
