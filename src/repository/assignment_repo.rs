// ==========================================
// 服装工厂 ERP - 派工单仓储
// ==========================================

use crate::domain::assignment::WorkAssignment;
use crate::domain::types::AssignmentStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::parse_column;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    SELECT assignment_id, work_item_id, operator_id, status, requested_by,
           approved_by, match_score, created_at, decided_at
    FROM work_assignments
"#;

pub struct AssignmentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AssignmentRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn find_by_id(&self, assignment_id: &str) -> RepositoryResult<Option<WorkAssignment>> {
        let conn = self.get_conn()?;
        Self::find_by_id_with(&conn, assignment_id)
    }

    pub fn find_by_id_with(
        conn: &Connection,
        assignment_id: &str,
    ) -> RepositoryResult<Option<WorkAssignment>> {
        let sql = format!("{} WHERE assignment_id = ?1", SELECT_COLUMNS);
        Ok(conn
            .query_row(&sql, params![assignment_id], map_row)
            .optional()?)
    }

    pub fn list_by_work_item(&self, work_item_id: &str) -> RepositoryResult<Vec<WorkAssignment>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE work_item_id = ?1 ORDER BY created_at", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![work_item_id], map_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// 待审批的自助申领
    pub fn list_pending(&self) -> RepositoryResult<Vec<WorkAssignment>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE status = 'requested' ORDER BY created_at", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], map_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn insert(tx: &Transaction, assignment: &WorkAssignment) -> RepositoryResult<()> {
        tx.execute(
            r#"
            INSERT INTO work_assignments (
                assignment_id, work_item_id, operator_id, status, requested_by,
                approved_by, match_score, created_at, decided_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                assignment.assignment_id,
                assignment.work_item_id,
                assignment.operator_id,
                assignment.status.as_str(),
                assignment.requested_by,
                assignment.approved_by,
                assignment.match_score,
                assignment.created_at,
                assignment.decided_at,
            ],
        )?;
        Ok(())
    }

    /// 审批: 只允许 requested → approved / rejected
    pub fn decide(
        tx: &Transaction,
        assignment_id: &str,
        status: AssignmentStatus,
        decided_by: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let affected = tx.execute(
            r#"
            UPDATE work_assignments
               SET status = ?1, approved_by = ?2, decided_at = ?3
             WHERE assignment_id = ?4 AND status = 'requested'
            "#,
            params![status.as_str(), decided_by, now, assignment_id],
        )?;

        if affected == 0 {
            return match Self::find_by_id_with(tx, assignment_id)? {
                Some(existing) => Err(RepositoryError::InvalidStateTransition {
                    from: existing.status.as_str().to_string(),
                    to: status.as_str().to_string(),
                }),
                None => Err(RepositoryError::not_found("WorkAssignment", assignment_id)),
            };
        }
        Ok(())
    }

    /// 驳回同一工单下其余待审批申领，返回驳回后的派工单
    pub fn reject_open_requests(
        tx: &Transaction,
        work_item_id: &str,
        except_assignment_id: &str,
        decided_by: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<WorkAssignment>> {
        let open = {
            let sql = format!(
                "{} WHERE work_item_id = ?1 AND status = 'requested' AND assignment_id <> ?2 ORDER BY created_at",
                SELECT_COLUMNS
            );
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt.query_map(params![work_item_id, except_assignment_id], map_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        tx.execute(
            r#"
            UPDATE work_assignments
               SET status = 'rejected', approved_by = ?1, decided_at = ?2
             WHERE work_item_id = ?3 AND status = 'requested' AND assignment_id <> ?4
            "#,
            params![decided_by, now, work_item_id, except_assignment_id],
        )?;

        Ok(open
            .into_iter()
            .map(|assignment| WorkAssignment {
                status: AssignmentStatus::Rejected,
                approved_by: Some(decided_by.to_string()),
                decided_at: Some(now),
                ..assignment
            })
            .collect())
    }
}

fn map_row(row: &Row) -> rusqlite::Result<WorkAssignment> {
    Ok(WorkAssignment {
        assignment_id: row.get(0)?,
        work_item_id: row.get(1)?,
        operator_id: row.get(2)?,
        status: parse_column(3, row.get(3)?)?,
        requested_by: row.get(4)?,
        approved_by: row.get(5)?,
        match_score: row.get(6)?,
        created_at: row.get(7)?,
        decided_at: row.get(8)?,
    })
}
