// ==========================================
// 服装工厂 ERP - 流程运行器
// ==========================================
// 职责: 按依赖顺序同步推进流程步骤
// 规则:
// - 声明顺序扫描，取第一个依赖全部 completed 的 pending 步骤
// - 步骤失败即流程失败（不重试、不回滚）
// - 取消只打标记，不中断进行中的步骤
// - 截止时间在步骤之间检查
// ==========================================

use crate::domain::types::UrgencyLevel;
use crate::workflow::definitions::instantiate_steps;
use crate::workflow::error::{WorkflowError, WorkflowResult};
use crate::workflow::executor::StepExecutor;
use crate::workflow::store::WorkflowStore;
use crate::workflow::types::{
    NotificationLevel, StepOutcome, StepStatus, StepTransition, WorkflowContext,
    WorkflowInstance, WorkflowNotification, WorkflowStatus, WorkflowType, WorkflowUpdate,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::instrument;
use uuid::Uuid;

/// 单次推进的结果
#[derive(Debug, Clone, PartialEq)]
pub enum StepAdvance {
    /// 执行了一个步骤
    Executed { step_id: String, status: StepStatus },
    /// 仍有 pending 步骤但依赖未满足
    Blocked,
    /// 流程进入终态
    Finished(WorkflowStatus),
}

pub struct WorkflowRunner {
    store: WorkflowStore,
    executor: Arc<dyn StepExecutor>,
    default_timeout: Option<Duration>,
    retention: Option<Duration>,
}

impl WorkflowRunner {
    pub fn new(store: WorkflowStore, executor: Arc<dyn StepExecutor>) -> Self {
        Self {
            store,
            executor,
            default_timeout: None,
            retention: None,
        }
    }

    /// 未显式指定截止时间的流程使用该超时
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// 终态实例保留期；启动新流程前清理过期实例，None 表示不清理
    pub fn with_retention(mut self, retention: Option<Duration>) -> Self {
        self.retention = retention;
        self
    }

    /// 清理结束时间早于 retention 之前的终态实例
    pub fn prune_finished(&mut self, retention: Duration) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(retention)
            .ok()
            .and_then(|r| Utc::now().checked_sub_signed(r))
        else {
            return 0;
        };
        let pruned = self.store.prune_terminal(cutoff);
        if pruned > 0 {
            tracing::debug!(pruned, remaining = self.store.len(), "已清理过期流程实例");
        }
        pruned
    }

    pub fn start_workflow(
        &mut self,
        workflow_type: WorkflowType,
        context: WorkflowContext,
        priority: UrgencyLevel,
    ) -> WorkflowResult<WorkflowInstance> {
        let timeout = self.default_timeout;
        self.start_workflow_with_timeout(workflow_type, context, priority, timeout)
    }

    /// 创建实例并同步推进到无可执行步骤为止
    #[instrument(skip(self, context), fields(workflow_type = %workflow_type))]
    pub fn start_workflow_with_timeout(
        &mut self,
        workflow_type: WorkflowType,
        context: WorkflowContext,
        priority: UrgencyLevel,
        timeout: Option<Duration>,
    ) -> WorkflowResult<WorkflowInstance> {
        if let Some(retention) = self.retention {
            self.prune_finished(retention);
        }

        let now = Utc::now();
        let deadline = timeout
            .and_then(|t| chrono::Duration::from_std(t).ok())
            .and_then(|t| now.checked_add_signed(t));

        let instance = WorkflowInstance {
            id: Uuid::new_v4().to_string(),
            workflow_type,
            priority,
            status: WorkflowStatus::Running,
            steps: instantiate_steps(workflow_type),
            current_step: None,
            context,
            notifications: Vec::new(),
            error: None,
            timed_out: false,
            deadline,
            created_at: now,
            updated_at: now,
        };
        let workflow_id = instance.id.clone();
        tracing::info!(workflow_id = %workflow_id, "流程启动");
        self.store.insert(instance);

        self.drive(&workflow_id)?;

        let instance = self.snapshot(&workflow_id)?;
        tracing::info!(
            workflow_id = %workflow_id,
            status = instance.status.as_str(),
            "流程推进结束"
        );
        Ok(instance)
    }

    /// 连续推进直到阻塞或终态
    fn drive(&mut self, workflow_id: &str) -> WorkflowResult<()> {
        loop {
            let terminal = self
                .store
                .get(workflow_id)
                .map(|wf| wf.is_terminal())
                .unwrap_or(true);
            if terminal {
                return Ok(());
            }
            match self.move_to_next_step(workflow_id)? {
                StepAdvance::Executed { .. } => continue,
                StepAdvance::Blocked | StepAdvance::Finished(_) => return Ok(()),
            }
        }
    }

    /// 推进一步: 检查截止时间、挑选可执行步骤、执行并记录结果
    pub fn move_to_next_step(&mut self, workflow_id: &str) -> WorkflowResult<StepAdvance> {
        let instance = self
            .store
            .get_mut(workflow_id)
            .ok_or_else(|| WorkflowError::NotFound(workflow_id.to_string()))?;

        if instance.is_terminal() {
            return Err(WorkflowError::InvalidState {
                workflow_id: workflow_id.to_string(),
                status: instance.status.as_str().to_string(),
            });
        }

        let now = Utc::now();
        if instance.deadline.map(|d| now >= d).unwrap_or(false) {
            instance.status = WorkflowStatus::Failed;
            instance.timed_out = true;
            instance.current_step = None;
            instance.error = Some("流程超过截止时间".to_string());
            instance.updated_at = now;
            push_notification(instance, NotificationLevel::Error, None, "流程超时，已终止");
            tracing::warn!(workflow_id = %workflow_id, "流程超时");
            self.emit_update(workflow_id, None, None);
            return Ok(StepAdvance::Finished(WorkflowStatus::Failed));
        }

        let Some(idx) = instance.next_eligible_step() else {
            if instance.all_steps_settled() {
                self.finish_completed(workflow_id);
                return Ok(StepAdvance::Finished(WorkflowStatus::Completed));
            }
            return Ok(StepAdvance::Blocked);
        };

        // pending → in_progress
        let step_id = instance.steps[idx].id.clone();
        instance.steps[idx].status = StepStatus::InProgress;
        instance.steps[idx].started_at = Some(now);
        instance.current_step = Some(step_id.clone());
        instance.updated_at = now;
        let workflow_type = instance.workflow_type;
        let context = instance.context.clone();
        self.record(workflow_id, &step_id, StepStatus::Pending, StepStatus::InProgress);

        tracing::debug!(workflow_id = %workflow_id, step_id = %step_id, "执行步骤");
        let outcome = self.executor.execute_step(workflow_type, &step_id, &context);

        let status = self.apply_outcome(workflow_id, idx, outcome)?;
        self.record(workflow_id, &step_id, StepStatus::InProgress, status);

        if status == StepStatus::Failed {
            return Ok(StepAdvance::Executed { step_id, status });
        }

        let settled = self
            .store
            .get(workflow_id)
            .map(|wf| wf.all_steps_settled())
            .unwrap_or(false);
        if settled {
            self.finish_completed(workflow_id);
        }

        Ok(StepAdvance::Executed { step_id, status })
    }

    fn apply_outcome(
        &mut self,
        workflow_id: &str,
        idx: usize,
        outcome: StepOutcome,
    ) -> WorkflowResult<StepStatus> {
        let instance = self
            .store
            .get_mut(workflow_id)
            .ok_or_else(|| WorkflowError::NotFound(workflow_id.to_string()))?;
        let now = Utc::now();
        let step_id = instance.steps[idx].id.clone();
        instance.updated_at = now;

        let status = match outcome {
            StepOutcome::Completed(output) => {
                if let Some(output) = output {
                    instance.context.insert(step_id.clone(), output);
                }
                instance.steps[idx].status = StepStatus::Completed;
                instance.steps[idx].completed_at = Some(now);
                StepStatus::Completed
            }
            StepOutcome::Skipped(reason) => {
                instance.steps[idx].status = StepStatus::Skipped;
                instance.steps[idx].completed_at = Some(now);
                push_notification(instance, NotificationLevel::Info, Some(&step_id), &reason);
                StepStatus::Skipped
            }
            StepOutcome::Failed(reason) => {
                instance.steps[idx].status = StepStatus::Failed;
                instance.steps[idx].completed_at = Some(now);
                instance.steps[idx].error = Some(reason.clone());
                instance.status = WorkflowStatus::Failed;
                instance.error = Some(reason.clone());
                push_notification(
                    instance,
                    NotificationLevel::Error,
                    Some(&step_id),
                    &format!("步骤 {} 失败: {}", step_id, reason),
                );
                tracing::warn!(
                    workflow_id = %workflow_id,
                    step_id = %step_id,
                    reason = %reason,
                    "流程步骤失败"
                );
                StepStatus::Failed
            }
        };

        Ok(status)
    }

    fn finish_completed(&mut self, workflow_id: &str) {
        if let Some(instance) = self.store.get_mut(workflow_id) {
            instance.status = WorkflowStatus::Completed;
            instance.current_step = None;
            instance.updated_at = Utc::now();
        }
        self.emit_update(workflow_id, None, None);
    }

    /// 取消: 标记 cancelled，剩余 pending 步骤 skipped
    pub fn cancel_workflow(&mut self, workflow_id: &str) -> WorkflowResult<WorkflowInstance> {
        let instance = self
            .store
            .get_mut(workflow_id)
            .ok_or_else(|| WorkflowError::NotFound(workflow_id.to_string()))?;

        if instance.is_terminal() {
            return Err(WorkflowError::InvalidState {
                workflow_id: workflow_id.to_string(),
                status: instance.status.as_str().to_string(),
            });
        }

        let now = Utc::now();
        instance.status = WorkflowStatus::Cancelled;
        instance.updated_at = now;
        let skipped: Vec<String> = instance
            .steps
            .iter_mut()
            .filter(|s| s.status == StepStatus::Pending)
            .map(|s| {
                s.status = StepStatus::Skipped;
                s.id.clone()
            })
            .collect();
        push_notification(instance, NotificationLevel::Warning, None, "流程已取消");

        for step_id in &skipped {
            self.store.record_transition(StepTransition {
                workflow_id: workflow_id.to_string(),
                step_id: step_id.clone(),
                from: StepStatus::Pending,
                to: StepStatus::Skipped,
                at: now,
            });
        }
        tracing::info!(workflow_id = %workflow_id, skipped = skipped.len(), "流程取消");
        self.emit_update(workflow_id, None, None);

        self.snapshot(workflow_id)
    }

    /// 订阅流程更新（有界通道）
    pub fn subscribe(&mut self, workflow_id: &str) -> WorkflowResult<mpsc::Receiver<WorkflowUpdate>> {
        if self.store.get(workflow_id).is_none() {
            return Err(WorkflowError::NotFound(workflow_id.to_string()));
        }
        Ok(self.store.subscribe(workflow_id))
    }

    pub fn get_workflow(&self, workflow_id: &str) -> Option<&WorkflowInstance> {
        self.store.get(workflow_id)
    }

    pub fn list_workflows(&self, status: Option<WorkflowStatus>) -> Vec<&WorkflowInstance> {
        self.store.list(status)
    }

    pub fn transitions(&self, workflow_id: &str) -> Vec<&StepTransition> {
        self.store.transitions_for(workflow_id)
    }

    fn snapshot(&self, workflow_id: &str) -> WorkflowResult<WorkflowInstance> {
        self.store
            .get(workflow_id)
            .cloned()
            .ok_or_else(|| WorkflowError::NotFound(workflow_id.to_string()))
    }

    fn record(&mut self, workflow_id: &str, step_id: &str, from: StepStatus, to: StepStatus) {
        self.store.record_transition(StepTransition {
            workflow_id: workflow_id.to_string(),
            step_id: step_id.to_string(),
            from,
            to,
            at: Utc::now(),
        });
        self.emit_update(workflow_id, Some(step_id), Some(to));
    }

    fn emit_update(&mut self, workflow_id: &str, step_id: Option<&str>, step_status: Option<StepStatus>) {
        let Some(workflow_status) = self.store.get(workflow_id).map(|wf| wf.status) else {
            return;
        };
        let update = WorkflowUpdate {
            workflow_id: workflow_id.to_string(),
            workflow_status,
            step_id: step_id.map(str::to_string),
            step_status,
            at: Utc::now(),
        };
        self.store.notify_subscribers(&update);
    }
}

fn push_notification(
    instance: &mut WorkflowInstance,
    level: NotificationLevel,
    step_id: Option<&str>,
    message: &str,
) {
    instance.notifications.push(WorkflowNotification {
        level,
        step_id: step_id.map(str::to_string),
        message: message.to_string(),
        created_at: Utc::now(),
    });
}
