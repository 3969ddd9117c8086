// ==========================================
// 服装工厂 ERP - 工单仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 并发: 状态变更带 revision 检查（乐观锁），先到先得
// ==========================================

use crate::domain::types::WorkStatus;
use crate::domain::work_item::WorkItem;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::parse_column;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    SELECT work_item_id, bundle_no, machine_type, required_skill_level, priority,
           estimated_duration, total_pieces, completed_pieces, rate_per_piece,
           status, assigned_operator_id, due_date, revision, created_at, updated_at
    FROM work_items
"#;

pub struct WorkItemRepository {
    conn: Arc<Mutex<Connection>>,
}

impl WorkItemRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn find_by_id(&self, work_item_id: &str) -> RepositoryResult<Option<WorkItem>> {
        let conn = self.get_conn()?;
        Self::find_by_id_with(&conn, work_item_id)
    }

    pub fn find_by_id_with(conn: &Connection, work_item_id: &str) -> RepositoryResult<Option<WorkItem>> {
        let sql = format!("{} WHERE work_item_id = ?1", SELECT_COLUMNS);
        let item = conn
            .query_row(&sql, params![work_item_id], map_row)
            .optional()?;
        Ok(item)
    }

    pub fn list_by_status(&self, status: WorkStatus) -> RepositoryResult<Vec<WorkItem>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE status = ?1 ORDER BY created_at, work_item_id", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![status.as_str()], map_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn list_by_operator(&self, operator_id: &str) -> RepositoryResult<Vec<WorkItem>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE assigned_operator_id = ?1 ORDER BY created_at, work_item_id",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![operator_id], map_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn insert(tx: &Transaction, item: &WorkItem) -> RepositoryResult<()> {
        tx.execute(
            r#"
            INSERT INTO work_items (
                work_item_id, bundle_no, machine_type, required_skill_level, priority,
                estimated_duration, total_pieces, completed_pieces, rate_per_piece,
                status, assigned_operator_id, due_date, revision, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
            params![
                item.id,
                item.bundle_no,
                item.machine_type,
                item.required_skill_level.as_str(),
                item.priority.as_str(),
                item.estimated_duration,
                item.total_pieces,
                item.completed_pieces,
                item.rate_per_piece,
                item.status.as_str(),
                item.assigned_operator_id,
                item.due_date,
                item.revision,
                item.created_at,
                item.updated_at,
            ],
        )?;
        Ok(())
    }

    /// 派工: available → assigned，带 revision 检查
    ///
    /// # 返回
    /// - Ok(new_revision)
    /// - Err(OptimisticLockFailure): revision 不匹配（已被他人派工或修改）
    pub fn assign(
        tx: &Transaction,
        work_item_id: &str,
        operator_id: &str,
        expected_revision: i64,
        now: DateTime<Utc>,
    ) -> RepositoryResult<i64> {
        let affected = tx.execute(
            r#"
            UPDATE work_items
               SET status = 'assigned', assigned_operator_id = ?1,
                   revision = revision + 1, updated_at = ?2
             WHERE work_item_id = ?3 AND revision = ?4 AND status = 'available'
            "#,
            params![operator_id, now, work_item_id, expected_revision],
        )?;

        if affected == 0 {
            return Err(Self::conflict_or_not_found(tx, work_item_id, expected_revision));
        }
        Ok(expected_revision + 1)
    }

    /// 进度更新: 写入累计完工件数与状态，带 revision 检查
    pub fn update_progress(
        tx: &Transaction,
        work_item_id: &str,
        completed_pieces: u32,
        status: WorkStatus,
        expected_revision: i64,
        now: DateTime<Utc>,
    ) -> RepositoryResult<i64> {
        let affected = tx.execute(
            r#"
            UPDATE work_items
               SET completed_pieces = ?1, status = ?2,
                   revision = revision + 1, updated_at = ?3
             WHERE work_item_id = ?4 AND revision = ?5
            "#,
            params![completed_pieces, status.as_str(), now, work_item_id, expected_revision],
        )?;

        if affected == 0 {
            return Err(Self::conflict_or_not_found(tx, work_item_id, expected_revision));
        }
        Ok(expected_revision + 1)
    }

    /// 区分记录不存在与 revision 冲突
    fn conflict_or_not_found(conn: &Connection, work_item_id: &str, expected: i64) -> RepositoryError {
        let actual: Result<Option<i64>, _> = conn
            .query_row(
                "SELECT revision FROM work_items WHERE work_item_id = ?1",
                params![work_item_id],
                |row| row.get(0),
            )
            .optional();

        match actual {
            Ok(Some(actual)) => RepositoryError::OptimisticLockFailure {
                entity: "WorkItem".to_string(),
                id: work_item_id.to_string(),
                expected,
                actual,
            },
            Ok(None) => RepositoryError::not_found("WorkItem", work_item_id),
            Err(e) => e.into(),
        }
    }
}

fn map_row(row: &Row) -> rusqlite::Result<WorkItem> {
    Ok(WorkItem {
        id: row.get(0)?,
        bundle_no: row.get(1)?,
        machine_type: row.get(2)?,
        required_skill_level: parse_column(3, row.get(3)?)?,
        priority: parse_column(4, row.get(4)?)?,
        estimated_duration: row.get(5)?,
        total_pieces: row.get(6)?,
        completed_pieces: row.get(7)?,
        rate_per_piece: row.get(8)?,
        status: parse_column(9, row.get(9)?)?,
        assigned_operator_id: row.get(10)?,
        due_date: row.get(11)?,
        revision: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}
