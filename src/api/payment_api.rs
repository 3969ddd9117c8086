// ==========================================
// 服装工厂 ERP - 计件工资 API
// ==========================================
// 职责: 按工单结算操作员计件工资（含效率/质量奖励与损坏扣款）并落库
// 效率: 优先取该操作员在本工单的生产记录，无记录时取档案平均效率
// ==========================================

use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::api::paths;
use crate::config::ConfigManager;
use crate::domain::production::{BundleData, CompletionData, PaymentRecord, ProductionRecord};
use crate::engine::efficiency::calculate_efficiency_metrics;
use crate::engine::payment::calculate_damage_aware_payment_with_threshold;
use crate::engine::quality::calculate_quality_score;
use crate::repository::{
    with_transaction, DamageReportRepository, OperatorRepository, OutboxOperation,
    OutboxRepository, PaymentRepository, ProductionRepository, WorkItemRepository,
};

pub struct PaymentApi {
    conn: Arc<Mutex<Connection>>,
    operator_repo: Arc<OperatorRepository>,
    work_item_repo: Arc<WorkItemRepository>,
    damage_repo: Arc<DamageReportRepository>,
    production_repo: Arc<ProductionRepository>,
    payment_repo: Arc<PaymentRepository>,
    config_manager: Arc<ConfigManager>,
}

impl PaymentApi {
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        operator_repo: Arc<OperatorRepository>,
        work_item_repo: Arc<WorkItemRepository>,
        damage_repo: Arc<DamageReportRepository>,
        production_repo: Arc<ProductionRepository>,
        payment_repo: Arc<PaymentRepository>,
        config_manager: Arc<ConfigManager>,
    ) -> Self {
        Self {
            conn,
            operator_repo,
            work_item_repo,
            damage_repo,
            production_repo,
            payment_repo,
            config_manager,
        }
    }

    /// 结算并落库
    pub fn calculate_payment(&self, work_item_id: &str, operator_id: &str) -> ApiResult<PaymentRecord> {
        let work_item = self
            .work_item_repo
            .find_by_id(work_item_id)?
            .ok_or_else(|| ApiError::NotFound(format!("工单(id={})不存在", work_item_id)))?;
        let operator = self
            .operator_repo
            .find_by_id(operator_id)?
            .ok_or_else(|| ApiError::NotFound(format!("操作员(id={})不存在", operator_id)))?;

        if work_item.assigned_operator_id.as_deref() != Some(operator_id) {
            return Err(ApiError::validation(format!(
                "work item {} is not assigned to {}",
                work_item_id, operator_id
            )));
        }

        let records: Vec<ProductionRecord> = self
            .production_repo
            .list_by_operator(operator_id)?
            .into_iter()
            .filter(|r| r.work_item_id == work_item_id)
            .collect();
        let efficiency = if records.is_empty() {
            operator.average_efficiency
        } else {
            calculate_efficiency_metrics(&records, 1.0).overall_efficiency
        };

        let reports = self.damage_repo.list_by_work_item(work_item_id)?;
        let quality_score = calculate_quality_score(work_item.completed_pieces, &reports);
        let threshold = self.config_manager.get_efficiency_bonus_threshold()?;

        let bundle = BundleData {
            work_item_id: work_item.id.clone(),
            rate_per_piece: work_item.rate_per_piece,
            total_pieces: work_item.total_pieces,
        };
        let completion = CompletionData {
            operator_id: operator.id.clone(),
            completed_pieces: work_item.completed_pieces,
            efficiency,
            quality_score,
        };
        let payment =
            calculate_damage_aware_payment_with_threshold(&bundle, &completion, &reports, threshold);

        let record = PaymentRecord {
            payment_id: Uuid::new_v4().to_string(),
            work_item_id: work_item.id,
            operator_id: operator.id,
            base_payment: payment.base_payment,
            efficiency_bonus: payment.efficiency_bonus,
            quality_bonus: payment.quality_bonus,
            damage_penalty: payment.damage_penalty,
            final_payment: payment.final_payment,
            breakdown_json: serde_json::to_value(&payment)?,
            calculated_at: Utc::now(),
        };
        self.save_payment(&record)?;
        Ok(record)
    }

    /// 工资记录落库（含实时库镜像）
    pub fn save_payment(&self, record: &PaymentRecord) -> ApiResult<String> {
        let doc = serde_json::to_value(record)?;
        with_transaction(&self.conn, |tx| {
            PaymentRepository::insert(tx, record)?;
            OutboxRepository::enqueue(
                tx,
                &paths::payment(&record.operator_id, &record.payment_id),
                OutboxOperation::Set,
                &doc,
            )?;
            Ok(())
        })
        .map_err(|e| ApiError::from(e).in_operation(ApiError::PaymentFailed))?;

        tracing::info!(
            payment_id = %record.payment_id,
            operator_id = %record.operator_id,
            work_item_id = %record.work_item_id,
            final_payment = record.final_payment,
            "工资已结算"
        );
        Ok(record.payment_id.clone())
    }

    pub fn list_operator_payments(&self, operator_id: &str) -> ApiResult<Vec<PaymentRecord>> {
        Ok(self.payment_repo.list_by_operator(operator_id)?)
    }

    pub fn list_work_item_payments(&self, work_item_id: &str) -> ApiResult<Vec<PaymentRecord>> {
        Ok(self.payment_repo.list_by_work_item(work_item_id)?)
    }
}
