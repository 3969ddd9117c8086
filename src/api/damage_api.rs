// ==========================================
// 服装工厂 ERP - 损坏上报 / 质检 API
// ==========================================
// 职责: 损坏上报（含质量告警 outbox、操作员画像刷新）、质检记录
// ==========================================

use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::api::operator_api::{enqueue_operator_merge, refresh_operator_performance};
use crate::api::paths;
use crate::domain::damage::{DamageReport, NewDamageReport};
use crate::domain::production::QualityInspection;
use crate::engine::events::{ErpEvent, ErpEventType, OptionalEventPublisher};
use crate::engine::quality::calculate_quality_score;
use crate::repository::{
    with_transaction, DamageReportRepository, OutboxOperation, OutboxRepository,
    ProductionRepository, WorkItemRepository,
};

pub struct DamageApi {
    conn: Arc<Mutex<Connection>>,
    work_item_repo: Arc<WorkItemRepository>,
    damage_repo: Arc<DamageReportRepository>,
    production_repo: Arc<ProductionRepository>,
    events: Arc<OptionalEventPublisher>,
}

impl DamageApi {
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        work_item_repo: Arc<WorkItemRepository>,
        damage_repo: Arc<DamageReportRepository>,
        production_repo: Arc<ProductionRepository>,
        events: Arc<OptionalEventPublisher>,
    ) -> Self {
        Self {
            conn,
            work_item_repo,
            damage_repo,
            production_repo,
            events,
        }
    }

    /// 上报损坏
    ///
    /// 报告、报告镜像、质量告警与责任操作员画像在同一事务入库；告警事件在提交后发布
    pub fn report_damage(&self, new_report: NewDamageReport) -> ApiResult<DamageReport> {
        let work_item = self
            .work_item_repo
            .find_by_id(&new_report.work_item_id)?
            .ok_or_else(|| {
                ApiError::NotFound(format!("工单(id={})不存在", new_report.work_item_id))
            })?;

        let mut reasons = Vec::new();
        if new_report.damage_type.trim().is_empty() {
            reasons.push("damage type is required".to_string());
        }
        if new_report.reported_by.trim().is_empty() {
            reasons.push("reporter is required".to_string());
        }
        if new_report.affected_pieces == 0 {
            reasons.push("affected pieces must be at least 1".to_string());
        }
        if new_report.affected_pieces > work_item.total_pieces {
            reasons.push(format!(
                "affected pieces {} exceed bundle size {}",
                new_report.affected_pieces, work_item.total_pieces
            ));
        }
        if !reasons.is_empty() {
            return Err(ApiError::ValidationFailed { reasons });
        }

        let report = DamageReport {
            report_id: Uuid::new_v4().to_string(),
            work_item_id: new_report.work_item_id,
            operator_id: new_report
                .operator_id
                .or_else(|| work_item.assigned_operator_id.clone()),
            damage_type: new_report.damage_type,
            severity: new_report.severity,
            affected_pieces: new_report.affected_pieces,
            operator_fault: new_report.operator_fault,
            reported_by: Some(new_report.reported_by),
            note: new_report.note,
            reported_at: Utc::now(),
        };

        let mut all_reports = self.damage_repo.list_by_work_item(&work_item.id)?;
        all_reports.push(report.clone());
        let sample = work_item.completed_pieces.max(work_item.total_pieces);
        let quality_score = calculate_quality_score(sample, &all_reports);

        let report_doc = serde_json::to_value(&report)?;
        let alert = json!({
            "report_id": report.report_id,
            "work_item_id": report.work_item_id,
            "operator_id": report.operator_id,
            "damage_type": report.damage_type,
            "severity": report.severity.as_str(),
            "affected_pieces": report.affected_pieces,
            "quality_score": quality_score,
            "raised_at": report.reported_at,
        });

        with_transaction(&self.conn, |tx| {
            DamageReportRepository::insert(tx, &report)?;
            OutboxRepository::enqueue(
                tx,
                &paths::damage_report(&report.work_item_id, &report.report_id),
                OutboxOperation::Set,
                &report_doc,
            )?;
            OutboxRepository::enqueue(
                tx,
                &paths::quality_alert(&report.report_id),
                OutboxOperation::Set,
                &alert,
            )?;
            if let Some(operator_id) = report.operator_id.as_deref() {
                let operator = refresh_operator_performance(tx, operator_id, report.reported_at)?;
                enqueue_operator_merge(tx, &operator)?;
            }
            Ok(())
        })
        .map_err(|e| ApiError::from(e).in_operation(ApiError::DamageReportFailed))?;

        tracing::info!(
            report_id = %report.report_id,
            work_item_id = %report.work_item_id,
            damage_type = %report.damage_type,
            severity = %report.severity,
            quality_score,
            "损坏已上报"
        );

        if let Err(e) = self.events.publish(ErpEvent::new(
            ErpEventType::QualityAlert,
            &report.work_item_id,
            alert,
        )) {
            tracing::warn!(report_id = %report.report_id, error = %e, "质量告警事件发布失败");
        }

        Ok(report)
    }

    pub fn list_damage_reports(&self, work_item_id: &str) -> ApiResult<Vec<DamageReport>> {
        Ok(self.damage_repo.list_by_work_item(work_item_id)?)
    }

    pub fn list_operator_damage(&self, operator_id: &str) -> ApiResult<Vec<DamageReport>> {
        Ok(self.damage_repo.list_by_operator(operator_id)?)
    }

    /// 记录质检结果
    pub fn record_inspection(&self, inspection: &QualityInspection) -> ApiResult<()> {
        if inspection.damaged_pieces > inspection.inspected_pieces {
            return Err(ApiError::validation(format!(
                "damaged pieces {} exceed inspected {}",
                inspection.damaged_pieces, inspection.inspected_pieces
            )));
        }

        let doc = serde_json::to_value(inspection)?;
        with_transaction(&self.conn, |tx| {
            ProductionRepository::insert_inspection(tx, inspection)?;
            OutboxRepository::enqueue(
                tx,
                &paths::inspection(&inspection.work_item_id, &inspection.inspection_id),
                OutboxOperation::Set,
                &doc,
            )?;
            Ok(())
        })?;

        tracing::info!(
            inspection_id = %inspection.inspection_id,
            work_item_id = %inspection.work_item_id,
            quality_score = inspection.quality_score,
            "质检已记录"
        );
        Ok(())
    }

    pub fn list_inspections(&self, work_item_id: &str) -> ApiResult<Vec<QualityInspection>> {
        Ok(self.production_repo.list_inspections(work_item_id)?)
    }
}
