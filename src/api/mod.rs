// ==========================================
// 服装工厂 ERP - API 层
// ==========================================
// 职责: 集成服务，调用规则库与流程运行器并持久化结果
// 写入: 业务表与 realtime_outbox 同事务，提交后发布事件
// ==========================================

pub mod assignment_api;
pub mod config_api;
pub mod damage_api;
pub mod dashboard_api;
pub mod error;
pub mod operator_api;
pub mod paths;
pub mod payment_api;
pub mod workflow_api;
pub mod workflow_gateway;

// 重导出核心类型
pub use assignment_api::{AssignmentApi, ProgressUpdate};
pub use config_api::{ConfigApi, ConfigItem};
pub use damage_api::DamageApi;
pub use dashboard_api::DashboardApi;
pub use error::{ApiError, ApiResult};
pub use operator_api::OperatorApi;
pub use payment_api::PaymentApi;
pub use workflow_api::WorkflowApi;
pub use workflow_gateway::ApiWorkflowGateway;
