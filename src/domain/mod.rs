// ==========================================
// 服装工厂 ERP - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod assignment;
pub mod damage;
pub mod operator;
pub mod production;
pub mod types;
pub mod work_item;

// 重导出核心类型
pub use assignment::WorkAssignment;
pub use damage::{DamageReport, NewDamageReport};
pub use operator::{LiveOperatorStatus, NewOperator, Operator, OperatorRecord};
pub use production::{
    BundleData, CompletionData, PaymentRecord, ProductionRecord, QualityInspection,
};
pub use types::{
    AssignmentStatus, DamageSeverity, OperatorStatus, SkillLevel, UrgencyLevel, WorkStatus,
};
pub use work_item::{NewWorkItem, WorkItem};
