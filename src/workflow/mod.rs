// ==========================================
// 服装工厂 ERP - 流程层
// ==========================================
// 职责: 依赖有序的流程步骤运行器
// 状态: WorkflowStore 由运行器独占；步骤逻辑经 StepExecutor 注入
// ==========================================

pub mod definitions;
pub mod error;
pub mod executor;
pub mod runner;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

pub use error::{WorkflowError, WorkflowResult};
pub use executor::{GatewayStepExecutor, StepExecutor, WorkflowGateway};
pub use runner::{StepAdvance, WorkflowRunner};
pub use store::{WorkflowStore, DEFAULT_SUBSCRIBER_CAPACITY};
pub use types::{
    NotificationLevel, StepOutcome, StepStatus, StepTransition, WorkflowContext,
    WorkflowInstance, WorkflowNotification, WorkflowStatus, WorkflowStep, WorkflowType,
    WorkflowUpdate,
};
