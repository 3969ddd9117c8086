// ==========================================
// 服装工厂 ERP - 损坏报告仓储
// ==========================================

use crate::domain::damage::DamageReport;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::parse_column;
use rusqlite::{params, Connection, Row, Transaction};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    SELECT report_id, work_item_id, operator_id, damage_type, severity,
           affected_pieces, operator_fault, reported_by, note, reported_at
    FROM damage_reports
"#;

pub struct DamageReportRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DamageReportRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn insert(tx: &Transaction, report: &DamageReport) -> RepositoryResult<()> {
        tx.execute(
            r#"
            INSERT INTO damage_reports (
                report_id, work_item_id, operator_id, damage_type, severity,
                affected_pieces, operator_fault, reported_by, note, reported_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                report.report_id,
                report.work_item_id,
                report.operator_id,
                report.damage_type,
                report.severity.as_str(),
                report.affected_pieces,
                report.operator_fault,
                report.reported_by,
                report.note,
                report.reported_at,
            ],
        )?;
        Ok(())
    }

    pub fn list_by_work_item(&self, work_item_id: &str) -> RepositoryResult<Vec<DamageReport>> {
        let conn = self.get_conn()?;
        Self::list_by_work_item_with(&conn, work_item_id)
    }

    pub fn list_by_work_item_with(
        conn: &Connection,
        work_item_id: &str,
    ) -> RepositoryResult<Vec<DamageReport>> {
        let sql = format!("{} WHERE work_item_id = ?1 ORDER BY reported_at", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![work_item_id], map_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn list_by_operator(&self, operator_id: &str) -> RepositoryResult<Vec<DamageReport>> {
        let conn = self.get_conn()?;
        Self::list_by_operator_with(&conn, operator_id)
    }

    pub fn list_by_operator_with(
        conn: &Connection,
        operator_id: &str,
    ) -> RepositoryResult<Vec<DamageReport>> {
        let sql = format!("{} WHERE operator_id = ?1 ORDER BY reported_at", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![operator_id], map_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn map_row(row: &Row) -> rusqlite::Result<DamageReport> {
    Ok(DamageReport {
        report_id: row.get(0)?,
        work_item_id: row.get(1)?,
        operator_id: row.get(2)?,
        damage_type: row.get(3)?,
        severity: parse_column(4, row.get(4)?)?,
        affected_pieces: row.get(5)?,
        operator_fault: row.get(6)?,
        reported_by: row.get(7)?,
        note: row.get(8)?,
        reported_at: row.get(9)?,
    })
}
