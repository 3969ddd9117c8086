// ==========================================
// 服装工厂 ERP - 流程步骤执行器
// ==========================================
// 职责: 按 (流程类型, 步骤 ID) 分派步骤处理逻辑
// 依赖倒置: 数据访问通过 WorkflowGateway，由 API 层实现
// ==========================================

use crate::domain::{
    BundleData, CompletionData, DamageReport, NewOperator, Operator, PaymentRecord,
    QualityInspection, WorkItem,
};
use crate::engine::events::{ErpEvent, ErpEventType};
use crate::engine::matching::calculate_match_score;
use crate::engine::payment::{
    calculate_damage_aware_payment_with_threshold, calculate_damage_deduction,
    DEFAULT_EFFICIENCY_THRESHOLD,
};
use crate::engine::quality::{calculate_quality_score, QUALITY_ALERT_THRESHOLD};
use crate::engine::validation::{validate_operator_profile, validate_work_assignment};
use crate::workflow::types::{StepOutcome, WorkflowContext, WorkflowType};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{json, Value as JsonValue};
use std::fmt::Display;
use std::sync::Arc;
use uuid::Uuid;

// ==========================================
// Trait 定义
// ==========================================

/// 步骤执行器（同步）
pub trait StepExecutor: Send + Sync {
    fn execute_step(
        &self,
        workflow_type: WorkflowType,
        step_id: &str,
        context: &WorkflowContext,
    ) -> StepOutcome;
}

/// 流程对外依赖（持久化/通知）
pub trait WorkflowGateway: Send + Sync {
    fn find_operator(&self, operator_id: &str) -> anyhow::Result<Option<Operator>>;
    fn find_work_item(&self, work_item_id: &str) -> anyhow::Result<Option<WorkItem>>;
    /// 返回派工单 ID
    fn assign_work(
        &self,
        operator_id: &str,
        work_item_id: &str,
        requested_by: &str,
    ) -> anyhow::Result<String>;
    /// 返回操作员 ID
    fn create_operator(&self, new_operator: &NewOperator) -> anyhow::Result<String>;
    fn list_damage_reports(&self, work_item_id: &str) -> anyhow::Result<Vec<DamageReport>>;
    fn record_quality(&self, inspection: &QualityInspection) -> anyhow::Result<()>;
    /// 返回工资记录 ID
    fn save_payment(&self, record: &PaymentRecord) -> anyhow::Result<String>;
    fn notify(&self, event: ErpEvent) -> anyhow::Result<()>;
}

// ==========================================
// 上下文读取
// ==========================================

fn fail(reason: impl Display) -> StepOutcome {
    StepOutcome::Failed(reason.to_string())
}

fn require_str(context: &WorkflowContext, key: &str) -> Result<String, String> {
    context
        .get(key)
        .and_then(JsonValue::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| format!("上下文缺少字段: {}", key))
}

fn optional_str<'a>(context: &'a WorkflowContext, key: &str) -> Option<&'a str> {
    context.get(key).and_then(JsonValue::as_str)
}

fn optional_f64(context: &WorkflowContext, key: &str) -> Option<f64> {
    context.get(key).and_then(JsonValue::as_f64)
}

fn optional_u32(context: &WorkflowContext, key: &str) -> Option<u32> {
    context
        .get(key)
        .and_then(JsonValue::as_u64)
        .and_then(|v| u32::try_from(v).ok())
}

fn optional_value<T: DeserializeOwned>(
    context: &WorkflowContext,
    key: &str,
) -> Result<Option<T>, String> {
    match context.get(key) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| format!("上下文字段 {} 格式错误: {}", key, e)),
    }
}

/// 读取前序步骤输出中的字段
fn step_output<'a>(context: &'a WorkflowContext, step_id: &str, key: &str) -> Option<&'a JsonValue> {
    context.get(step_id).and_then(|output| output.get(key))
}

fn supervisor_of(context: &WorkflowContext) -> String {
    optional_str(context, "supervisor_id")
        .unwrap_or("supervisors")
        .to_string()
}

// ==========================================
// GatewayStepExecutor - 默认步骤实现
// ==========================================

pub struct GatewayStepExecutor<G: WorkflowGateway> {
    gateway: Arc<G>,
    efficiency_threshold: f64,
    quality_alert_threshold: f64,
}

impl<G: WorkflowGateway> GatewayStepExecutor<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            efficiency_threshold: DEFAULT_EFFICIENCY_THRESHOLD,
            quality_alert_threshold: QUALITY_ALERT_THRESHOLD,
        }
    }

    /// 使用配置中的效率奖励门槛与质量告警阈值
    pub fn with_thresholds(mut self, efficiency_threshold: f64, quality_alert_threshold: f64) -> Self {
        self.efficiency_threshold = efficiency_threshold;
        self.quality_alert_threshold = quality_alert_threshold;
        self
    }

    fn load_operator(&self, operator_id: &str) -> Result<Operator, String> {
        self.gateway
            .find_operator(operator_id)
            .map_err(|e| format!("读取操作员失败: {}", e))?
            .ok_or_else(|| format!("操作员不存在: {}", operator_id))
    }

    fn load_work_item(&self, work_item_id: &str) -> Result<WorkItem, String> {
        self.gateway
            .find_work_item(work_item_id)
            .map_err(|e| format!("读取工单失败: {}", e))?
            .ok_or_else(|| format!("工单不存在: {}", work_item_id))
    }

    /// 上下文提供的损坏报告优先，否则从存储读取
    fn load_damage_reports(
        &self,
        context: &WorkflowContext,
        work_item_id: &str,
    ) -> Result<Vec<DamageReport>, String> {
        if let Some(reports) = optional_value::<Vec<DamageReport>>(context, "damage_reports")? {
            return Ok(reports);
        }
        self.gateway
            .list_damage_reports(work_item_id)
            .map_err(|e| format!("读取损坏报告失败: {}", e))
    }

    fn send(&self, event: ErpEvent) -> StepOutcome {
        match self.gateway.notify(event) {
            Ok(()) => StepOutcome::Completed(None),
            Err(e) => fail(format!("通知发送失败: {}", e)),
        }
    }

    // ===== work_assignment =====

    fn validate_assignment(&self, context: &WorkflowContext) -> Result<StepOutcome, String> {
        let operator_id = require_str(context, "operator_id")?;
        let work_item_id = require_str(context, "work_item_id")?;
        let operator = self.load_operator(&operator_id)?;
        let work_item = self.load_work_item(&work_item_id)?;

        if let Err(failure) = validate_work_assignment(&operator, &work_item) {
            return Ok(fail(failure));
        }

        let score = calculate_match_score(&work_item, &operator);
        Ok(StepOutcome::Completed(Some(json!({
            "match_score": score.score,
            "reasons": score.reasons,
        }))))
    }

    fn assign_work(&self, context: &WorkflowContext) -> Result<StepOutcome, String> {
        let operator_id = require_str(context, "operator_id")?;
        let work_item_id = require_str(context, "work_item_id")?;
        let requested_by = optional_str(context, "requested_by").unwrap_or("workflow");

        match self.gateway.assign_work(&operator_id, &work_item_id, requested_by) {
            Ok(assignment_id) => Ok(StepOutcome::Completed(Some(json!({
                "assignment_id": assignment_id,
            })))),
            Err(e) => Ok(fail(format!("派工失败: {}", e))),
        }
    }

    fn notify_assignment(&self, context: &WorkflowContext) -> Result<StepOutcome, String> {
        let operator_id = require_str(context, "operator_id")?;
        let work_item_id = require_str(context, "work_item_id")?;
        Ok(self.send(ErpEvent::notification(
            operator_id,
            format!("已为你分配工单 {}", work_item_id),
        )))
    }

    // ===== quality_control =====

    fn inspect_work(&self, context: &WorkflowContext) -> Result<StepOutcome, String> {
        let work_item_id = require_str(context, "work_item_id")?;
        let inspected_pieces = match optional_u32(context, "inspected_pieces") {
            Some(pieces) => pieces,
            None => self.load_work_item(&work_item_id)?.completed_pieces,
        };
        let reports = self.load_damage_reports(context, &work_item_id)?;
        let damaged_pieces: u32 = reports.iter().map(|r| r.affected_pieces).sum();
        let quality_score = calculate_quality_score(inspected_pieces, &reports);

        Ok(StepOutcome::Completed(Some(json!({
            "inspected_pieces": inspected_pieces,
            "damaged_pieces": damaged_pieces,
            "quality_score": quality_score,
        }))))
    }

    fn record_quality(&self, context: &WorkflowContext) -> Result<StepOutcome, String> {
        let work_item_id = require_str(context, "work_item_id")?;
        let quality_score = step_output(context, "inspect_work", "quality_score")
            .and_then(JsonValue::as_f64)
            .ok_or("缺少质检结果")?;
        let count = |key: &str| {
            step_output(context, "inspect_work", key)
                .and_then(JsonValue::as_u64)
                .unwrap_or(0) as u32
        };

        let inspection = QualityInspection {
            inspection_id: Uuid::new_v4().to_string(),
            work_item_id,
            operator_id: optional_str(context, "operator_id").map(str::to_string),
            inspected_pieces: count("inspected_pieces"),
            damaged_pieces: count("damaged_pieces"),
            quality_score,
            inspected_at: Utc::now(),
        };

        match self.gateway.record_quality(&inspection) {
            Ok(()) => Ok(StepOutcome::Completed(Some(json!({
                "inspection_id": inspection.inspection_id,
            })))),
            Err(e) => Ok(fail(format!("质检记录保存失败: {}", e))),
        }
    }

    fn notify_quality(&self, context: &WorkflowContext) -> Result<StepOutcome, String> {
        let work_item_id = require_str(context, "work_item_id")?;
        let quality_score = step_output(context, "inspect_work", "quality_score")
            .and_then(JsonValue::as_f64)
            .ok_or("缺少质检结果")?;

        if quality_score >= self.quality_alert_threshold {
            return Ok(StepOutcome::Skipped(format!(
                "质量达标 ({:.2})，无需通知主管",
                quality_score
            )));
        }

        let mut event = ErpEvent::new(
            ErpEventType::QualityAlert,
            work_item_id.clone(),
            json!({ "work_item_id": work_item_id, "quality_score": quality_score }),
        );
        event.recipient = Some(supervisor_of(context));
        event.message = Some(format!(
            "工单 {} 质量分 {:.2} 低于阈值",
            work_item_id, quality_score
        ));
        Ok(self.send(event))
    }

    // ===== operator_onboarding =====

    fn parse_new_operator(context: &WorkflowContext) -> Result<NewOperator, String> {
        optional_value::<NewOperator>(context, "operator")?
            .ok_or_else(|| "上下文缺少字段: operator".to_string())
    }

    fn validate_profile(&self, context: &WorkflowContext) -> Result<StepOutcome, String> {
        let new_operator = Self::parse_new_operator(context)?;
        match validate_operator_profile(&new_operator) {
            Ok(()) => Ok(StepOutcome::Completed(None)),
            Err(failure) => Ok(fail(failure)),
        }
    }

    fn create_operator(&self, context: &WorkflowContext) -> Result<StepOutcome, String> {
        let new_operator = Self::parse_new_operator(context)?;
        match self.gateway.create_operator(&new_operator) {
            Ok(operator_id) => Ok(StepOutcome::Completed(Some(json!({
                "operator_id": operator_id,
            })))),
            Err(e) => Ok(fail(format!("创建操作员失败: {}", e))),
        }
    }

    fn notify_onboarded(&self, context: &WorkflowContext) -> Result<StepOutcome, String> {
        let operator_id = step_output(context, "create_operator", "operator_id")
            .and_then(JsonValue::as_str)
            .ok_or("缺少新建操作员 ID")?;
        Ok(self.send(ErpEvent::notification(operator_id, "欢迎加入，账号已开通")))
    }

    // ===== damage_resolution =====

    fn assess_damage(&self, context: &WorkflowContext) -> Result<StepOutcome, String> {
        let work_item_id = require_str(context, "work_item_id")?;
        let work_item = self.load_work_item(&work_item_id)?;
        let reports = self.load_damage_reports(context, &work_item_id)?;
        let base_earnings = optional_f64(context, "base_earnings")
            .unwrap_or(work_item.rate_per_piece * work_item.completed_pieces as f64);

        let deductions: Vec<_> = reports
            .iter()
            .map(|r| calculate_damage_deduction(r, base_earnings, work_item.total_pieces))
            .collect();
        let total_deduction: f64 = deductions.iter().map(|d| d.deduction_amount).sum();
        let affected_pieces: u32 = reports.iter().map(|r| r.affected_pieces).sum();

        Ok(StepOutcome::Completed(Some(json!({
            "report_count": reports.len(),
            "affected_pieces": affected_pieces,
            "total_deduction": total_deduction,
            "deductions": deductions,
        }))))
    }

    fn notify_damage(&self, context: &WorkflowContext) -> Result<StepOutcome, String> {
        let work_item_id = require_str(context, "work_item_id")?;
        let total_deduction = step_output(context, "assess_damage", "total_deduction")
            .and_then(JsonValue::as_f64)
            .unwrap_or(0.0);
        let affected_pieces = step_output(context, "assess_damage", "affected_pieces")
            .and_then(JsonValue::as_u64)
            .unwrap_or(0);
        Ok(self.send(ErpEvent::notification(
            supervisor_of(context),
            format!(
                "工单 {} 损坏评估完成: 影响 {} 件，扣款 {:.2}",
                work_item_id, affected_pieces, total_deduction
            ),
        )))
    }

    // ===== payment_processing =====

    fn calculate_payment(&self, context: &WorkflowContext) -> Result<StepOutcome, String> {
        let operator_id = require_str(context, "operator_id")?;
        let work_item_id = require_str(context, "work_item_id")?;
        let work_item = self.load_work_item(&work_item_id)?;
        let reports = self.load_damage_reports(context, &work_item_id)?;

        let completed_pieces =
            optional_u32(context, "completed_pieces").unwrap_or(work_item.completed_pieces);
        let efficiency = match optional_f64(context, "efficiency") {
            Some(value) => value,
            None => self.load_operator(&operator_id)?.average_efficiency,
        };
        let quality_score = optional_f64(context, "quality_score")
            .unwrap_or_else(|| calculate_quality_score(completed_pieces, &reports));

        let bundle = BundleData {
            work_item_id: work_item.id.clone(),
            rate_per_piece: work_item.rate_per_piece,
            total_pieces: work_item.total_pieces,
        };
        let completion = CompletionData {
            operator_id: operator_id.clone(),
            completed_pieces,
            efficiency,
            quality_score,
        };
        let payment = calculate_damage_aware_payment_with_threshold(
            &bundle,
            &completion,
            &reports,
            self.efficiency_threshold,
        );

        let record = PaymentRecord {
            payment_id: Uuid::new_v4().to_string(),
            work_item_id,
            operator_id,
            base_payment: payment.base_payment,
            efficiency_bonus: payment.efficiency_bonus,
            quality_bonus: payment.quality_bonus,
            damage_penalty: payment.damage_penalty,
            final_payment: payment.final_payment,
            breakdown_json: serde_json::to_value(&payment).map_err(|e| e.to_string())?,
            calculated_at: Utc::now(),
        };

        match self.gateway.save_payment(&record) {
            Ok(payment_id) => Ok(StepOutcome::Completed(Some(json!({
                "payment_id": payment_id,
                "base_payment": record.base_payment,
                "damage_penalty": record.damage_penalty,
                "final_payment": record.final_payment,
            })))),
            Err(e) => Ok(fail(format!("工资记录保存失败: {}", e))),
        }
    }

    fn notify_payment(&self, context: &WorkflowContext) -> Result<StepOutcome, String> {
        let operator_id = require_str(context, "operator_id")?;
        let final_payment = step_output(context, "calculate_payment", "final_payment")
            .and_then(JsonValue::as_f64)
            .ok_or("缺少工资计算结果")?;
        Ok(self.send(ErpEvent::notification(
            operator_id,
            format!("计件工资已结算: {:.2}", final_payment),
        )))
    }
}

impl<G: WorkflowGateway> StepExecutor for GatewayStepExecutor<G> {
    fn execute_step(
        &self,
        workflow_type: WorkflowType,
        step_id: &str,
        context: &WorkflowContext,
    ) -> StepOutcome {
        use WorkflowType::*;

        let result = match (workflow_type, step_id) {
            (WorkAssignment, "validate_assignment") => self.validate_assignment(context),
            (WorkAssignment, "assign_work") => self.assign_work(context),
            (WorkAssignment, "notify_operator") => self.notify_assignment(context),
            (QualityControl, "inspect_work") => self.inspect_work(context),
            (QualityControl, "record_quality") => self.record_quality(context),
            (QualityControl, "notify_supervisor") => self.notify_quality(context),
            (OperatorOnboarding, "validate_profile") => self.validate_profile(context),
            (OperatorOnboarding, "create_operator") => self.create_operator(context),
            (OperatorOnboarding, "notify_operator") => self.notify_onboarded(context),
            (DamageResolution, "assess_damage") => self.assess_damage(context),
            (DamageResolution, "notify_supervisor") => self.notify_damage(context),
            (PaymentProcessing, "calculate_payment") => self.calculate_payment(context),
            (PaymentProcessing, "notify_operator") => self.notify_payment(context),
            _ => Err(format!("未定义的步骤: {}/{}", workflow_type, step_id)),
        };

        result.unwrap_or_else(StepOutcome::Failed)
    }
}
