// ==========================================
// 服装工厂 ERP - 实时库镜像 outbox 仓储
// ==========================================
// 写入: 与业务数据同一事务 (enqueue)
// 读取/确认: OutboxRelay 回放时使用
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::parse_column;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row, Transaction};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// 实时库写入方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxOperation {
    /// 整体覆盖
    Set,
    /// 字段合并
    Merge,
    Remove,
}

impl OutboxOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxOperation::Set => "set",
            OutboxOperation::Merge => "merge",
            OutboxOperation::Remove => "remove",
        }
    }
}

impl fmt::Display for OutboxOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutboxOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "set" => Ok(OutboxOperation::Set),
            "merge" => Ok(OutboxOperation::Merge),
            "remove" => Ok(OutboxOperation::Remove),
            other => Err(format!("未知 outbox 操作: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub outbox_id: i64,
    pub path: String,
    pub operation: OutboxOperation,
    pub payload: JsonValue,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

pub struct OutboxRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OutboxRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 入队（调用方事务内）
    pub fn enqueue(
        tx: &Transaction,
        path: &str,
        operation: OutboxOperation,
        payload: &JsonValue,
    ) -> RepositoryResult<i64> {
        tx.execute(
            r#"
            INSERT INTO realtime_outbox (path, operation, payload_json, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![path, operation.as_str(), serde_json::to_string(payload)?, Utc::now()],
        )?;
        Ok(tx.last_insert_rowid())
    }

    /// 未投递条目，按入队顺序
    pub fn list_pending(&self, limit: usize) -> RepositoryResult<Vec<OutboxEntry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT outbox_id, path, operation, payload_json, attempts,
                   last_error, created_at, delivered_at
            FROM realtime_outbox
            WHERE delivered_at IS NULL
            ORDER BY outbox_id
            LIMIT ?1
            "#,
        )?;
        let rows = stmt.query_map(params![limit as i64], map_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn count_pending(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM realtime_outbox WHERE delivered_at IS NULL",
            [],
            |row| row.get(0),
        )?)
    }

    pub fn mark_delivered(&self, outbox_id: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            UPDATE realtime_outbox
               SET delivered_at = ?1, attempts = attempts + 1, last_error = NULL
             WHERE outbox_id = ?2
            "#,
            params![Utc::now(), outbox_id],
        )?;
        Ok(())
    }

    pub fn mark_failed(&self, outbox_id: i64, error: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE realtime_outbox SET attempts = attempts + 1, last_error = ?1 WHERE outbox_id = ?2",
            params![error, outbox_id],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, outbox_id: i64) -> RepositoryResult<Option<OutboxEntry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT outbox_id, path, operation, payload_json, attempts,
                   last_error, created_at, delivered_at
            FROM realtime_outbox
            WHERE outbox_id = ?1
            "#,
        )?;
        let mut rows = stmt.query_map(params![outbox_id], map_row)?;
        let entry = rows.next().transpose()?;
        Ok(entry)
    }
}

fn map_row(row: &Row) -> rusqlite::Result<OutboxEntry> {
    let payload: String = row.get(3)?;
    Ok(OutboxEntry {
        outbox_id: row.get(0)?,
        path: row.get(1)?,
        operation: parse_column(2, row.get(2)?)?,
        payload: serde_json::from_str(&payload).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?,
        attempts: row.get(4)?,
        last_error: row.get(5)?,
        created_at: row.get(6)?,
        delivered_at: row.get(7)?,
    })
}
