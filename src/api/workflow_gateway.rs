// ==========================================
// 服装工厂 ERP - 流程网关
// ==========================================
// 职责: 为流程步骤提供数据访问与通知，全部委托给业务 API
// ==========================================

use std::sync::Arc;

use crate::api::assignment_api::AssignmentApi;
use crate::api::damage_api::DamageApi;
use crate::api::operator_api::OperatorApi;
use crate::api::payment_api::PaymentApi;
use crate::domain::{DamageReport, NewOperator, Operator, PaymentRecord, QualityInspection, WorkItem};
use crate::engine::events::{ErpEvent, OptionalEventPublisher};
use crate::workflow::WorkflowGateway;

pub struct ApiWorkflowGateway {
    operator_api: Arc<OperatorApi>,
    assignment_api: Arc<AssignmentApi>,
    damage_api: Arc<DamageApi>,
    payment_api: Arc<PaymentApi>,
    events: Arc<OptionalEventPublisher>,
}

impl ApiWorkflowGateway {
    pub fn new(
        operator_api: Arc<OperatorApi>,
        assignment_api: Arc<AssignmentApi>,
        damage_api: Arc<DamageApi>,
        payment_api: Arc<PaymentApi>,
        events: Arc<OptionalEventPublisher>,
    ) -> Self {
        Self {
            operator_api,
            assignment_api,
            damage_api,
            payment_api,
            events,
        }
    }
}

impl WorkflowGateway for ApiWorkflowGateway {
    fn find_operator(&self, operator_id: &str) -> anyhow::Result<Option<Operator>> {
        Ok(self.operator_api.find_operator(operator_id)?)
    }

    fn find_work_item(&self, work_item_id: &str) -> anyhow::Result<Option<WorkItem>> {
        Ok(self.assignment_api.find_work_item(work_item_id)?)
    }

    fn assign_work(
        &self,
        operator_id: &str,
        work_item_id: &str,
        requested_by: &str,
    ) -> anyhow::Result<String> {
        let assignment = self
            .assignment_api
            .assign_work(operator_id, work_item_id, requested_by)?;
        Ok(assignment.assignment_id)
    }

    fn create_operator(&self, new_operator: &NewOperator) -> anyhow::Result<String> {
        let operator = self.operator_api.create_operator(new_operator.clone())?;
        Ok(operator.id)
    }

    fn list_damage_reports(&self, work_item_id: &str) -> anyhow::Result<Vec<DamageReport>> {
        Ok(self.damage_api.list_damage_reports(work_item_id)?)
    }

    fn record_quality(&self, inspection: &QualityInspection) -> anyhow::Result<()> {
        Ok(self.damage_api.record_inspection(inspection)?)
    }

    fn save_payment(&self, record: &PaymentRecord) -> anyhow::Result<String> {
        Ok(self.payment_api.save_payment(record)?)
    }

    fn notify(&self, event: ErpEvent) -> anyhow::Result<()> {
        self.events
            .publish(event)
            .map(|_| ())
            .map_err(|e| anyhow::anyhow!("事件发布失败: {}", e))
    }
}
