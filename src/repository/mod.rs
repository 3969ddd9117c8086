// ==========================================
// 服装工厂 ERP - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// 事务: 写操作接收 `&Transaction`，多表写入由调用方经 with_transaction 组合
// ==========================================

pub mod assignment_repo;
pub mod damage_repo;
pub mod error;
pub mod operator_repo;
pub mod outbox_repo;
pub mod payment_repo;
pub mod production_repo;
pub mod work_item_repo;


use rusqlite::{Connection, Transaction};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// 重导出核心仓储
pub use assignment_repo::AssignmentRepository;
pub use damage_repo::DamageReportRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use operator_repo::OperatorRepository;
pub use outbox_repo::{OutboxEntry, OutboxOperation, OutboxRepository};
pub use payment_repo::PaymentRepository;
pub use production_repo::ProductionRepository;
pub use work_item_repo::WorkItemRepository;

/// 在单个 SQLite 事务中执行闭包
///
/// 闭包返回 Err 时事务随 Transaction drop 回滚
pub fn with_transaction<T, F>(conn: &Arc<Mutex<Connection>>, f: F) -> RepositoryResult<T>
where
    F: FnOnce(&Transaction) -> RepositoryResult<T>,
{
    let mut guard = conn
        .lock()
        .map_err(|e| RepositoryError::LockError(e.to_string()))?;
    let tx = guard
        .transaction()
        .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

    let value = f(&tx)?;

    tx.commit()
        .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
    Ok(value)
}

/// 文本列解析为枚举（snake_case）
pub(crate) fn parse_column<T>(idx: usize, raw: String) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    raw.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
    })
}
