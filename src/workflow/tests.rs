use super::*;
use crate::domain::{
    DamageReport, DamageSeverity, NewOperator, NewWorkItem, Operator, OperatorStatus,
    PaymentRecord, QualityInspection, SkillLevel, UrgencyLevel, WorkItem,
};
use crate::engine::events::{ErpEvent, ErpEventType};
use chrono::Utc;
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ==========================================
// 测试替身
// ==========================================

#[derive(Default)]
struct MockGateway {
    operators: Mutex<HashMap<String, Operator>>,
    work_items: Mutex<HashMap<String, WorkItem>>,
    damage_reports: Mutex<Vec<DamageReport>>,
    assign_calls: Mutex<Vec<(String, String)>>,
    inspections: Mutex<Vec<QualityInspection>>,
    payments: Mutex<Vec<PaymentRecord>>,
    events: Mutex<Vec<ErpEvent>>,
}

impl WorkflowGateway for MockGateway {
    fn find_operator(&self, operator_id: &str) -> anyhow::Result<Option<Operator>> {
        Ok(self.operators.lock().unwrap().get(operator_id).cloned())
    }

    fn find_work_item(&self, work_item_id: &str) -> anyhow::Result<Option<WorkItem>> {
        Ok(self.work_items.lock().unwrap().get(work_item_id).cloned())
    }

    fn assign_work(
        &self,
        operator_id: &str,
        work_item_id: &str,
        _requested_by: &str,
    ) -> anyhow::Result<String> {
        self.assign_calls
            .lock()
            .unwrap()
            .push((operator_id.to_string(), work_item_id.to_string()));
        Ok(format!("ASG-{}", work_item_id))
    }

    fn create_operator(&self, new_operator: &NewOperator) -> anyhow::Result<String> {
        let operator = new_operator.clone().into_operator(Utc::now());
        let id = operator.id.clone();
        self.operators.lock().unwrap().insert(id.clone(), operator);
        Ok(id)
    }

    fn list_damage_reports(&self, work_item_id: &str) -> anyhow::Result<Vec<DamageReport>> {
        Ok(self
            .damage_reports
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.work_item_id == work_item_id)
            .cloned()
            .collect())
    }

    fn record_quality(&self, inspection: &QualityInspection) -> anyhow::Result<()> {
        self.inspections.lock().unwrap().push(inspection.clone());
        Ok(())
    }

    fn save_payment(&self, record: &PaymentRecord) -> anyhow::Result<String> {
        self.payments.lock().unwrap().push(record.clone());
        Ok(record.payment_id.clone())
    }

    fn notify(&self, event: ErpEvent) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

fn operator(id: &str, status: OperatorStatus) -> Operator {
    let mut op = NewOperator {
        id: id.to_string(),
        name: format!("操作员 {}", id),
        machine_types: BTreeSet::from(["single_needle".to_string()]),
        skill_level: SkillLevel::Advanced,
        average_efficiency: 1.0,
        quality_score: 0.95,
        max_concurrent_work: 2,
    }
    .into_operator(Utc::now());
    op.status = status;
    op
}

fn work_item(id: &str, completed: u32) -> WorkItem {
    let mut item = NewWorkItem {
        id: id.to_string(),
        bundle_no: format!("B-{}", id),
        machine_type: "single_needle".to_string(),
        required_skill_level: SkillLevel::Intermediate,
        priority: UrgencyLevel::Normal,
        estimated_duration: 120,
        total_pieces: 100,
        rate_per_piece: 10.0,
        due_date: None,
    }
    .into_work_item(Utc::now());
    item.completed_pieces = completed;
    item
}

fn setup() -> (Arc<MockGateway>, WorkflowRunner) {
    let gateway = Arc::new(MockGateway::default());
    gateway
        .operators
        .lock()
        .unwrap()
        .insert("OP-1".into(), operator("OP-1", OperatorStatus::Available));
    gateway
        .operators
        .lock()
        .unwrap()
        .insert("OP-OFF".into(), operator("OP-OFF", OperatorStatus::Offline));
    gateway
        .work_items
        .lock()
        .unwrap()
        .insert("WI-1".into(), work_item("WI-1", 100));

    let executor = Arc::new(GatewayStepExecutor::new(gateway.clone()));
    let runner = WorkflowRunner::new(WorkflowStore::new(), executor);
    (gateway, runner)
}

fn context(value: serde_json::Value) -> WorkflowContext {
    value.as_object().cloned().unwrap_or_default()
}

// ==========================================
// work_assignment
// ==========================================

#[test]
fn test_work_assignment_completes_all_steps() {
    let (gateway, mut runner) = setup();
    let wf = runner
        .start_workflow(
            WorkflowType::WorkAssignment,
            context(json!({"operator_id": "OP-1", "work_item_id": "WI-1"})),
            UrgencyLevel::High,
        )
        .unwrap();

    assert_eq!(wf.status, WorkflowStatus::Completed);
    assert!(wf.steps.iter().all(|s| s.status == StepStatus::Completed));
    assert_eq!(wf.context["assign_work"]["assignment_id"], "ASG-WI-1");
    assert!(wf.context["validate_assignment"]["match_score"].as_u64().unwrap() > 0);
    assert_eq!(gateway.assign_calls.lock().unwrap().len(), 1);
    assert_eq!(gateway.events.lock().unwrap().len(), 1);
    assert!(wf.into_result().is_ok());
}

#[test]
fn test_invalid_operator_fails_after_single_step() {
    let (gateway, mut runner) = setup();
    let wf = runner
        .start_workflow(
            WorkflowType::WorkAssignment,
            context(json!({"operator_id": "OP-OFF", "work_item_id": "WI-1"})),
            UrgencyLevel::Normal,
        )
        .unwrap();

    assert_eq!(wf.status, WorkflowStatus::Failed);
    assert_eq!(wf.steps[0].status, StepStatus::Failed);
    assert!(wf.steps[0].error.is_some());
    assert_eq!(wf.steps[1].status, StepStatus::Pending);
    assert_eq!(wf.steps[2].status, StepStatus::Pending);
    assert!(gateway.assign_calls.lock().unwrap().is_empty());

    // 仅一个步骤被启动
    let started: Vec<_> = runner
        .transitions(&wf.id)
        .into_iter()
        .filter(|t| t.to == StepStatus::InProgress)
        .map(|t| t.step_id.clone())
        .collect();
    assert_eq!(started, vec!["validate_assignment".to_string()]);

    assert!(wf
        .notifications
        .iter()
        .any(|n| n.level == NotificationLevel::Error));
    let err = wf.into_result().unwrap_err();
    assert_eq!(err.code(), "WORKFLOW_FAILED");
}

#[test]
fn test_missing_context_field_fails_step() {
    let (_gateway, mut runner) = setup();
    let wf = runner
        .start_workflow(
            WorkflowType::WorkAssignment,
            context(json!({"operator_id": "OP-1"})),
            UrgencyLevel::Normal,
        )
        .unwrap();
    assert_eq!(wf.status, WorkflowStatus::Failed);
    assert!(wf.error.unwrap().contains("work_item_id"));
}

// ==========================================
// quality_control
// ==========================================

#[test]
fn test_quality_control_skips_supervisor_when_quality_ok() {
    let (gateway, mut runner) = setup();
    let wf = runner
        .start_workflow(
            WorkflowType::QualityControl,
            context(json!({"work_item_id": "WI-1"})),
            UrgencyLevel::Normal,
        )
        .unwrap();

    assert_eq!(wf.status, WorkflowStatus::Completed);
    assert_eq!(wf.step("notify_supervisor").unwrap().status, StepStatus::Skipped);
    assert_eq!(gateway.inspections.lock().unwrap().len(), 1);
    assert!(gateway.events.lock().unwrap().is_empty());
}

#[test]
fn test_quality_control_alerts_supervisor_on_low_quality() {
    let (gateway, mut runner) = setup();
    gateway
        .damage_reports
        .lock()
        .unwrap()
        .push(DamageReport {
            work_item_id: "WI-1".into(),
            ..DamageReport::simple("stain", DamageSeverity::Major, 20, true)
        });

    let wf = runner
        .start_workflow(
            WorkflowType::QualityControl,
            context(json!({"work_item_id": "WI-1", "supervisor_id": "SUP-1"})),
            UrgencyLevel::Normal,
        )
        .unwrap();

    assert_eq!(wf.status, WorkflowStatus::Completed);
    assert_eq!(wf.step("notify_supervisor").unwrap().status, StepStatus::Completed);
    let score = wf.context["inspect_work"]["quality_score"].as_f64().unwrap();
    assert!((score - 0.8).abs() < 1e-9);

    let events = gateway.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, ErpEventType::QualityAlert);
    assert_eq!(events[0].recipient.as_deref(), Some("SUP-1"));
}

// ==========================================
// operator_onboarding / damage_resolution / payment_processing
// ==========================================

#[test]
fn test_operator_onboarding_creates_operator() {
    let (gateway, mut runner) = setup();
    let wf = runner
        .start_workflow(
            WorkflowType::OperatorOnboarding,
            context(json!({
                "operator": {
                    "id": "OP-NEW",
                    "name": "新员工",
                    "machine_types": ["overlock"],
                    "skill_level": "beginner"
                }
            })),
            UrgencyLevel::Low,
        )
        .unwrap();

    assert_eq!(wf.status, WorkflowStatus::Completed);
    assert!(gateway.operators.lock().unwrap().contains_key("OP-NEW"));
    assert_eq!(wf.context["create_operator"]["operator_id"], "OP-NEW");
}

#[test]
fn test_operator_onboarding_rejects_invalid_profile() {
    let (gateway, mut runner) = setup();
    let wf = runner
        .start_workflow(
            WorkflowType::OperatorOnboarding,
            context(json!({
                "operator": {
                    "id": "OP-BAD",
                    "name": "",
                    "machine_types": [],
                    "skill_level": "beginner"
                }
            })),
            UrgencyLevel::Low,
        )
        .unwrap();

    assert_eq!(wf.status, WorkflowStatus::Failed);
    assert_eq!(wf.step("create_operator").unwrap().status, StepStatus::Pending);
    assert!(!gateway.operators.lock().unwrap().contains_key("OP-BAD"));
}

#[test]
fn test_damage_resolution_assesses_deductions() {
    let (gateway, mut runner) = setup();
    let wf = runner
        .start_workflow(
            WorkflowType::DamageResolution,
            context(json!({
                "work_item_id": "WI-1",
                "base_earnings": 1000.0,
                "damage_reports": [{
                    "damage_type": "missing_operation",
                    "severity": "severe",
                    "affected_pieces": 10,
                    "operator_fault": true
                }]
            })),
            UrgencyLevel::Normal,
        )
        .unwrap();

    assert_eq!(wf.status, WorkflowStatus::Completed);
    let total = wf.context["assess_damage"]["total_deduction"].as_f64().unwrap();
    assert!((total - 50.0).abs() < 1e-9);
    assert_eq!(gateway.events.lock().unwrap().len(), 1);
}

#[test]
fn test_payment_processing_saves_record() {
    let (gateway, mut runner) = setup();
    let wf = runner
        .start_workflow(
            WorkflowType::PaymentProcessing,
            context(json!({
                "operator_id": "OP-1",
                "work_item_id": "WI-1",
                "efficiency": 0.85,
                "quality_score": 0.85
            })),
            UrgencyLevel::Normal,
        )
        .unwrap();

    assert_eq!(wf.status, WorkflowStatus::Completed);
    let payments = gateway.payments.lock().unwrap();
    assert_eq!(payments.len(), 1);
    // 100 件 × 10.0，无奖励无扣款
    assert!((payments[0].final_payment - 1000.0).abs() < 1e-9);
    assert_eq!(wf.context["calculate_payment"]["payment_id"], payments[0].payment_id);
}

// ==========================================
// 运行器行为
// ==========================================

#[test]
fn test_zero_timeout_fails_with_timeout() {
    let (gateway, mut runner) = setup();
    let wf = runner
        .start_workflow_with_timeout(
            WorkflowType::WorkAssignment,
            context(json!({"operator_id": "OP-1", "work_item_id": "WI-1"})),
            UrgencyLevel::Normal,
            Some(Duration::ZERO),
        )
        .unwrap();

    assert_eq!(wf.status, WorkflowStatus::Failed);
    assert!(wf.timed_out);
    assert!(wf.steps.iter().all(|s| s.status == StepStatus::Pending));
    assert!(gateway.assign_calls.lock().unwrap().is_empty());
    assert_eq!(wf.into_result().unwrap_err().code(), "WORKFLOW_TIMEOUT");
}

#[test]
fn test_unknown_workflow_errors() {
    let (_gateway, mut runner) = setup();
    assert_eq!(
        runner.move_to_next_step("missing").unwrap_err().code(),
        "WORKFLOW_NOT_FOUND"
    );
    assert_eq!(
        runner.cancel_workflow("missing").unwrap_err().code(),
        "WORKFLOW_NOT_FOUND"
    );
    assert!(runner.subscribe("missing").is_err());
    assert!(runner.get_workflow("missing").is_none());
}

#[test]
fn test_terminal_workflow_rejects_cancel_and_advance() {
    let (_gateway, mut runner) = setup();
    let wf = runner
        .start_workflow(
            WorkflowType::WorkAssignment,
            context(json!({"operator_id": "OP-1", "work_item_id": "WI-1"})),
            UrgencyLevel::Normal,
        )
        .unwrap();

    assert_eq!(
        runner.cancel_workflow(&wf.id).unwrap_err().code(),
        "INVALID_WORKFLOW_STATE"
    );
    assert_eq!(
        runner.move_to_next_step(&wf.id).unwrap_err().code(),
        "INVALID_WORKFLOW_STATE"
    );
}

/// 只完成首步、之后返回 Skipped 的执行器，用于构造阻塞流程
struct SkipAfterFirst;

impl StepExecutor for SkipAfterFirst {
    fn execute_step(
        &self,
        _workflow_type: WorkflowType,
        step_id: &str,
        _context: &WorkflowContext,
    ) -> StepOutcome {
        if step_id == "validate_assignment" {
            StepOutcome::Skipped("manual".into())
        } else {
            StepOutcome::Completed(None)
        }
    }
}

#[test]
fn test_blocked_workflow_stays_running_and_can_be_cancelled() {
    let mut runner = WorkflowRunner::new(WorkflowStore::new(), Arc::new(SkipAfterFirst));
    let wf = runner
        .start_workflow(WorkflowType::WorkAssignment, WorkflowContext::new(), UrgencyLevel::Low)
        .unwrap();

    // 依赖被跳过，后续步骤无法执行
    assert_eq!(wf.status, WorkflowStatus::Running);
    assert_eq!(runner.move_to_next_step(&wf.id).unwrap(), StepAdvance::Blocked);

    let mut rx = runner.subscribe(&wf.id).unwrap();
    let cancelled = runner.cancel_workflow(&wf.id).unwrap();
    assert_eq!(cancelled.status, WorkflowStatus::Cancelled);
    assert!(cancelled
        .steps
        .iter()
        .skip(1)
        .all(|s| s.status == StepStatus::Skipped));

    let update = rx.try_recv().unwrap();
    assert_eq!(update.workflow_status, WorkflowStatus::Cancelled);
    assert_eq!(runner.list_workflows(Some(WorkflowStatus::Cancelled)).len(), 1);
}

#[test]
fn test_prune_removes_only_expired_terminal_instances() {
    let mut runner = WorkflowRunner::new(WorkflowStore::new(), Arc::new(SkipAfterFirst));
    let blocked = runner
        .start_workflow(WorkflowType::WorkAssignment, WorkflowContext::new(), UrgencyLevel::Low)
        .unwrap();
    let (_gateway, mut finished_runner) = setup();
    let finished = finished_runner
        .start_workflow(
            WorkflowType::WorkAssignment,
            context(json!({"operator_id": "OP-1", "work_item_id": "WI-1"})),
            UrgencyLevel::Normal,
        )
        .unwrap();
    assert_eq!(finished.status, WorkflowStatus::Completed);
    assert!(!finished_runner.transitions(&finished.id).is_empty());
    let _rx = finished_runner.subscribe(&finished.id).unwrap();

    // 保留期内不清理
    assert_eq!(finished_runner.prune_finished(Duration::from_secs(3600)), 0);
    assert!(finished_runner.get_workflow(&finished.id).is_some());

    std::thread::sleep(Duration::from_millis(5));
    assert_eq!(finished_runner.prune_finished(Duration::ZERO), 1);
    assert!(finished_runner.get_workflow(&finished.id).is_none());
    assert!(finished_runner.transitions(&finished.id).is_empty());
    assert!(finished_runner.subscribe(&finished.id).is_err());

    // 运行中的实例不受保留期影响
    std::thread::sleep(Duration::from_millis(5));
    assert_eq!(runner.prune_finished(Duration::ZERO), 0);
    assert!(runner.get_workflow(&blocked.id).is_some());
}

#[test]
fn test_retention_prunes_before_new_workflow_starts() {
    let (_gateway, runner) = setup();
    let mut runner = runner.with_retention(Some(Duration::ZERO));
    let first = runner
        .start_workflow(
            WorkflowType::WorkAssignment,
            context(json!({"operator_id": "OP-1", "work_item_id": "WI-1"})),
            UrgencyLevel::Normal,
        )
        .unwrap();
    std::thread::sleep(Duration::from_millis(5));
    let second = runner
        .start_workflow(
            WorkflowType::WorkAssignment,
            context(json!({"operator_id": "OP-1", "work_item_id": "WI-1"})),
            UrgencyLevel::Normal,
        )
        .unwrap();

    assert!(runner.get_workflow(&first.id).is_none());
    assert!(runner.get_workflow(&second.id).is_some());
    assert_eq!(runner.list_workflows(None).len(), 1);
}

#[test]
fn test_full_subscriber_drops_without_blocking() {
    let mut store = WorkflowStore::with_subscriber_capacity(1);
    let now = Utc::now();
    store.insert(WorkflowInstance {
        id: "WF-1".into(),
        workflow_type: WorkflowType::DamageResolution,
        priority: UrgencyLevel::Normal,
        status: WorkflowStatus::Running,
        steps: definitions::instantiate_steps(WorkflowType::DamageResolution),
        current_step: None,
        context: WorkflowContext::new(),
        notifications: Vec::new(),
        error: None,
        timed_out: false,
        deadline: None,
        created_at: now,
        updated_at: now,
    });
    let mut rx = store.subscribe("WF-1");

    let update = WorkflowUpdate {
        workflow_id: "WF-1".into(),
        workflow_status: WorkflowStatus::Running,
        step_id: None,
        step_status: None,
        at: now,
    };
    store.notify_subscribers(&update);
    store.notify_subscribers(&update);

    assert!(rx.try_recv().is_ok());
    assert!(rx.try_recv().is_err());
    assert_eq!(store.subscriber_count("WF-1"), 1);

    drop(rx);
    store.notify_subscribers(&update);
    assert_eq!(store.subscriber_count("WF-1"), 0);
}

#[test]
fn test_workflow_type_parse() {
    assert_eq!(
        "payment_processing".parse::<WorkflowType>().unwrap(),
        WorkflowType::PaymentProcessing
    );
    assert_eq!(
        "nope".parse::<WorkflowType>().unwrap_err().code(),
        "VALIDATION_FAILED"
    );
}
