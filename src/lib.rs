// ==========================================
// 服装工厂 ERP - 核心库
// ==========================================
// 技术栈: Rust + SQLite + tokio
// 系统定位: 派工匹配、计件工资、质量核算与业务流程编排
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则与推荐
pub mod engine;

// 流程层 - 业务流程运行器
pub mod workflow;

// 实时层 - 实时库、outbox 回放、事件通道
pub mod realtime;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 集成服务
pub mod api;

// 应用层 - 组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    AssignmentStatus, DamageSeverity, OperatorStatus, SkillLevel, UrgencyLevel, WorkStatus,
};

// 领域实体
pub use domain::{
    DamageReport, NewDamageReport, NewOperator, NewWorkItem, Operator, OperatorRecord,
    PaymentRecord, ProductionRecord, WorkAssignment, WorkItem,
};

// 引擎
pub use engine::{Recommendation, RecommendationEngine};

// 流程
pub use workflow::{WorkflowInstance, WorkflowRunner, WorkflowType};

// API
pub use api::{ApiError, ApiResult};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "服装工厂 ERP";

// 数据库版本
pub const DB_VERSION: &str = "v0.1";
