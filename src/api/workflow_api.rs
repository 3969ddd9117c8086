// ==========================================
// 服装工厂 ERP - 流程 API
// ==========================================
// 职责: 启动 / 推进 / 取消 / 查询流程实例，订阅状态变更
// 并发: 运行器由互斥锁独占，步骤串行执行
// ==========================================

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::types::UrgencyLevel;
use crate::workflow::{
    StepAdvance, StepTransition, WorkflowContext, WorkflowError, WorkflowInstance, WorkflowRunner,
    WorkflowStatus, WorkflowType, WorkflowUpdate,
};

pub struct WorkflowApi {
    runner: Mutex<WorkflowRunner>,
}

impl WorkflowApi {
    pub fn new(runner: WorkflowRunner) -> Self {
        Self {
            runner: Mutex::new(runner),
        }
    }

    fn runner(&self) -> ApiResult<MutexGuard<'_, WorkflowRunner>> {
        self.runner
            .lock()
            .map_err(|e| ApiError::StoreFailed(format!("流程运行器锁获取失败: {}", e)))
    }

    /// 启动流程并推进到阻塞或终态
    ///
    /// 返回实例快照；失败/超时的实例同样返回，由调用方查看 status 或调用 into_result
    pub fn start_workflow(
        &self,
        workflow_type: WorkflowType,
        context: WorkflowContext,
        priority: UrgencyLevel,
    ) -> ApiResult<WorkflowInstance> {
        Ok(self.runner()?.start_workflow(workflow_type, context, priority)?)
    }

    /// 按名称启动（外部请求入口）
    pub fn start_workflow_named(
        &self,
        workflow_type: &str,
        context: WorkflowContext,
        priority: UrgencyLevel,
    ) -> ApiResult<WorkflowInstance> {
        let workflow_type: WorkflowType = workflow_type.parse()?;
        self.start_workflow(workflow_type, context, priority)
    }

    pub fn advance(&self, workflow_id: &str) -> ApiResult<StepAdvance> {
        Ok(self.runner()?.move_to_next_step(workflow_id)?)
    }

    pub fn cancel(&self, workflow_id: &str) -> ApiResult<WorkflowInstance> {
        Ok(self.runner()?.cancel_workflow(workflow_id)?)
    }

    pub fn get(&self, workflow_id: &str) -> ApiResult<WorkflowInstance> {
        self.runner()?
            .get_workflow(workflow_id)
            .cloned()
            .ok_or_else(|| WorkflowError::NotFound(workflow_id.to_string()).into())
    }

    pub fn list(&self, status: Option<WorkflowStatus>) -> ApiResult<Vec<WorkflowInstance>> {
        Ok(self
            .runner()?
            .list_workflows(status)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn subscribe(&self, workflow_id: &str) -> ApiResult<mpsc::Receiver<WorkflowUpdate>> {
        Ok(self.runner()?.subscribe(workflow_id)?)
    }

    pub fn transitions(&self, workflow_id: &str) -> ApiResult<Vec<StepTransition>> {
        Ok(self
            .runner()?
            .transitions(workflow_id)
            .into_iter()
            .cloned()
            .collect())
    }

    /// 清理超过保留期的终态实例，返回清理数量
    pub fn prune_finished(&self, retention: Duration) -> ApiResult<usize> {
        Ok(self.runner()?.prune_finished(retention))
    }
}
