// ==========================================
// 服装工厂 ERP - 流程步骤定义表
// ==========================================
// 静态表: (步骤 ID, 依赖步骤 ID 列表)，声明顺序即扫描顺序
// ==========================================

use crate::workflow::types::{StepStatus, WorkflowStep, WorkflowType};

pub type StepDefinition = (&'static str, &'static [&'static str]);

const WORK_ASSIGNMENT_STEPS: &[StepDefinition] = &[
    ("validate_assignment", &[]),
    ("assign_work", &["validate_assignment"]),
    ("notify_operator", &["assign_work"]),
];

const QUALITY_CONTROL_STEPS: &[StepDefinition] = &[
    ("inspect_work", &[]),
    ("record_quality", &["inspect_work"]),
    ("notify_supervisor", &["record_quality"]),
];

const OPERATOR_ONBOARDING_STEPS: &[StepDefinition] = &[
    ("validate_profile", &[]),
    ("create_operator", &["validate_profile"]),
    ("notify_operator", &["create_operator"]),
];

const DAMAGE_RESOLUTION_STEPS: &[StepDefinition] = &[
    ("assess_damage", &[]),
    ("notify_supervisor", &["assess_damage"]),
];

const PAYMENT_PROCESSING_STEPS: &[StepDefinition] = &[
    ("calculate_payment", &[]),
    ("notify_operator", &["calculate_payment"]),
];

pub fn step_definitions(workflow_type: WorkflowType) -> &'static [StepDefinition] {
    match workflow_type {
        WorkflowType::WorkAssignment => WORK_ASSIGNMENT_STEPS,
        WorkflowType::QualityControl => QUALITY_CONTROL_STEPS,
        WorkflowType::OperatorOnboarding => OPERATOR_ONBOARDING_STEPS,
        WorkflowType::DamageResolution => DAMAGE_RESOLUTION_STEPS,
        WorkflowType::PaymentProcessing => PAYMENT_PROCESSING_STEPS,
    }
}

/// 实例化步骤列表（全部 pending）
pub fn instantiate_steps(workflow_type: WorkflowType) -> Vec<WorkflowStep> {
    step_definitions(workflow_type)
        .iter()
        .map(|(id, deps)| WorkflowStep {
            id: id.to_string(),
            status: StepStatus::Pending,
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            started_at: None,
            completed_at: None,
            error: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_TYPES: [WorkflowType; 5] = [
        WorkflowType::WorkAssignment,
        WorkflowType::QualityControl,
        WorkflowType::OperatorOnboarding,
        WorkflowType::DamageResolution,
        WorkflowType::PaymentProcessing,
    ];

    #[test]
    fn test_dependencies_reference_earlier_steps() {
        for workflow_type in ALL_TYPES {
            let defs = step_definitions(workflow_type);
            assert!(!defs.is_empty());
            for (idx, (_, deps)) in defs.iter().enumerate() {
                for dep in deps.iter() {
                    assert!(
                        defs[..idx].iter().any(|(id, _)| id == dep),
                        "{} depends on unknown/later step {}",
                        workflow_type,
                        dep
                    );
                }
            }
        }
    }

    #[test]
    fn test_instantiate_steps_pending() {
        let steps = instantiate_steps(WorkflowType::WorkAssignment);
        assert_eq!(steps.len(), 3);
        assert!(steps.iter().all(|s| s.status == StepStatus::Pending));
        assert_eq!(steps[1].dependencies, vec!["validate_assignment".to_string()]);
    }
}
