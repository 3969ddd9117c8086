// ==========================================
// 服装工厂 ERP - 流程状态存储
// ==========================================
// 持有: 流程实例表、步骤流转日志、订阅者通道
// 由 WorkflowRunner 独占，构造时注入
// 终态实例按保留期清理（prune_terminal），运行中的实例不受影响
// ==========================================

use crate::workflow::types::{StepTransition, WorkflowInstance, WorkflowStatus, WorkflowUpdate};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc::{self, error::TrySendError};

pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 64;
pub const DEFAULT_WORKFLOW_RETENTION_SECS: u64 = 3600;

#[derive(Debug)]
pub struct WorkflowStore {
    workflows: HashMap<String, WorkflowInstance>,
    transitions: Vec<StepTransition>,
    subscribers: HashMap<String, Vec<mpsc::Sender<WorkflowUpdate>>>,
    subscriber_capacity: usize,
}

impl WorkflowStore {
    pub fn new() -> Self {
        Self::with_subscriber_capacity(DEFAULT_SUBSCRIBER_CAPACITY)
    }

    pub fn with_subscriber_capacity(capacity: usize) -> Self {
        Self {
            workflows: HashMap::new(),
            transitions: Vec::new(),
            subscribers: HashMap::new(),
            // mpsc::channel 容量必须 > 0
            subscriber_capacity: capacity.max(1),
        }
    }

    pub fn insert(&mut self, instance: WorkflowInstance) {
        self.workflows.insert(instance.id.clone(), instance);
    }

    pub fn get(&self, workflow_id: &str) -> Option<&WorkflowInstance> {
        self.workflows.get(workflow_id)
    }

    pub fn get_mut(&mut self, workflow_id: &str) -> Option<&mut WorkflowInstance> {
        self.workflows.get_mut(workflow_id)
    }

    /// 按状态过滤（None = 全部），按创建时间升序
    pub fn list(&self, status: Option<WorkflowStatus>) -> Vec<&WorkflowInstance> {
        let mut items: Vec<&WorkflowInstance> = self
            .workflows
            .values()
            .filter(|wf| status.map(|s| wf.status == s).unwrap_or(true))
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        items
    }

    pub fn record_transition(&mut self, transition: StepTransition) {
        self.transitions.push(transition);
    }

    pub fn transitions_for(&self, workflow_id: &str) -> Vec<&StepTransition> {
        self.transitions
            .iter()
            .filter(|t| t.workflow_id == workflow_id)
            .collect()
    }

    /// 清理最后更新早于 older_than 的终态实例及其流转日志、订阅，返回清理数量
    pub fn prune_terminal(&mut self, older_than: DateTime<Utc>) -> usize {
        let expired: HashSet<String> = self
            .workflows
            .values()
            .filter(|wf| wf.is_terminal() && wf.updated_at < older_than)
            .map(|wf| wf.id.clone())
            .collect();
        if expired.is_empty() {
            return 0;
        }

        self.workflows.retain(|id, _| !expired.contains(id));
        self.transitions.retain(|t| !expired.contains(&t.workflow_id));
        self.subscribers.retain(|id, _| !expired.contains(id));
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }

    pub fn subscribe(&mut self, workflow_id: &str) -> mpsc::Receiver<WorkflowUpdate> {
        let (tx, rx) = mpsc::channel(self.subscriber_capacity);
        self.subscribers
            .entry(workflow_id.to_string())
            .or_default()
            .push(tx);
        rx
    }

    pub fn subscriber_count(&self, workflow_id: &str) -> usize {
        self.subscribers.get(workflow_id).map(Vec::len).unwrap_or(0)
    }

    /// 非阻塞推送: 通道满则丢弃本条，接收端关闭则移除订阅
    pub fn notify_subscribers(&mut self, update: &WorkflowUpdate) {
        let Some(senders) = self.subscribers.get_mut(&update.workflow_id) else {
            return;
        };

        senders.retain(|tx| match tx.try_send(update.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    workflow_id = %update.workflow_id,
                    "订阅者通道已满，丢弃流程更新"
                );
                true
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(workflow_id = %update.workflow_id, "订阅者已关闭，移除");
                false
            }
        });

        if senders.is_empty() {
            self.subscribers.remove(&update.workflow_id);
        }
    }
}

impl Default for WorkflowStore {
    fn default() -> Self {
        Self::new()
    }
}
