// ==========================================
// 服装工厂 ERP - 操作员仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 写操作以 `&Transaction` 为参数，由调用方控制事务边界
// ==========================================

use crate::domain::operator::Operator;
use crate::domain::types::OperatorStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::parse_column;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    SELECT operator_id, name, machine_types_json, skill_level,
           average_efficiency, quality_score, current_assignments,
           max_concurrent_work, status, created_at, updated_at
    FROM operators
"#;

pub struct OperatorRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OperatorRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn find_by_id(&self, operator_id: &str) -> RepositoryResult<Option<Operator>> {
        let conn = self.get_conn()?;
        Self::find_by_id_with(&conn, operator_id)
    }

    /// 在给定连接/事务上查询（`Transaction` 可解引用为 `Connection`）
    pub fn find_by_id_with(conn: &Connection, operator_id: &str) -> RepositoryResult<Option<Operator>> {
        let sql = format!("{} WHERE operator_id = ?1", SELECT_COLUMNS);
        let operator = conn
            .query_row(&sql, params![operator_id], map_row)
            .optional()?;
        Ok(operator)
    }

    /// 按状态列出（None = 全部），按 ID 排序
    pub fn list(&self, status: Option<OperatorStatus>) -> RepositoryResult<Vec<Operator>> {
        let conn = self.get_conn()?;
        let operators = match status {
            Some(status) => {
                let sql = format!("{} WHERE status = ?1 ORDER BY operator_id", SELECT_COLUMNS);
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![status.as_str()], map_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let sql = format!("{} ORDER BY operator_id", SELECT_COLUMNS);
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([], map_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };
        Ok(operators)
    }

    pub fn insert(tx: &Transaction, operator: &Operator) -> RepositoryResult<()> {
        tx.execute(
            r#"
            INSERT INTO operators (
                operator_id, name, machine_types_json, skill_level,
                average_efficiency, quality_score, current_assignments,
                max_concurrent_work, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                operator.id,
                operator.name,
                serde_json::to_string(&operator.machine_types)?,
                operator.skill_level.as_str(),
                operator.average_efficiency,
                operator.quality_score,
                operator.current_assignments,
                operator.max_concurrent_work,
                operator.status.as_str(),
                operator.created_at,
                operator.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn update_status(
        tx: &Transaction,
        operator_id: &str,
        status: OperatorStatus,
        now: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let affected = tx.execute(
            "UPDATE operators SET status = ?1, updated_at = ?2 WHERE operator_id = ?3",
            params![status.as_str(), now, operator_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::not_found("Operator", operator_id));
        }
        Ok(())
    }

    /// 占用一个在制名额（→ working），返回事务内最新档案
    ///
    /// 名额判断在 UPDATE 条件内完成，已满返回 CapacityExhausted
    pub fn occupy_slot(
        tx: &Transaction,
        operator_id: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Operator> {
        let affected = tx.execute(
            r#"
            UPDATE operators
               SET current_assignments = current_assignments + 1,
                   status = 'working',
                   updated_at = ?1
             WHERE operator_id = ?2
               AND current_assignments < max_concurrent_work
            "#,
            params![now, operator_id],
        )?;

        let operator = Self::find_by_id_with(tx, operator_id)?
            .ok_or_else(|| RepositoryError::not_found("Operator", operator_id))?;
        if affected == 0 {
            return Err(RepositoryError::CapacityExhausted {
                id: operator.id,
                current: operator.current_assignments,
                max: operator.max_concurrent_work,
            });
        }
        Ok(operator)
    }

    /// 释放一个在制名额（不低于 0），减到 0 且为 working 时 → available
    pub fn release_slot(
        tx: &Transaction,
        operator_id: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Operator> {
        let affected = tx.execute(
            r#"
            UPDATE operators
               SET current_assignments = MAX(0, current_assignments - 1),
                   status = CASE
                       WHEN current_assignments <= 1 AND status = 'working' THEN 'available'
                       ELSE status
                   END,
                   updated_at = ?1
             WHERE operator_id = ?2
            "#,
            params![now, operator_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::not_found("Operator", operator_id));
        }
        Self::find_by_id_with(tx, operator_id)?
            .ok_or_else(|| RepositoryError::not_found("Operator", operator_id))
    }

    pub fn update_performance(
        tx: &Transaction,
        operator_id: &str,
        average_efficiency: f64,
        quality_score: f64,
        now: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let affected = tx.execute(
            r#"
            UPDATE operators
               SET average_efficiency = ?1, quality_score = ?2, updated_at = ?3
             WHERE operator_id = ?4
            "#,
            params![average_efficiency, quality_score, now, operator_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::not_found("Operator", operator_id));
        }
        Ok(())
    }
}

fn map_row(row: &Row) -> rusqlite::Result<Operator> {
    let machine_types_json: String = row.get(2)?;
    let machine_types: BTreeSet<String> =
        serde_json::from_str(&machine_types_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Operator {
        id: row.get(0)?,
        name: row.get(1)?,
        machine_types,
        skill_level: parse_column(3, row.get(3)?)?,
        average_efficiency: row.get(4)?,
        quality_score: row.get(5)?,
        current_assignments: row.get(6)?,
        max_concurrent_work: row.get(7)?,
        status: parse_column(8, row.get(8)?)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}
