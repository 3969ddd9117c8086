// ==========================================
// 服装工厂 ERP - 应用层
// ==========================================
// 职责: 组装仓储、API、实时层与流程运行器
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
