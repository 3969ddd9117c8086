// ==========================================
// 服装工厂 ERP - 生产记录 / 质检记录仓储
// ==========================================

use crate::domain::production::{ProductionRecord, QualityInspection};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row, Transaction};
use std::sync::{Arc, Mutex};

pub struct ProductionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductionRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ===== 生产记录 =====

    pub fn insert_record(tx: &Transaction, record: &ProductionRecord) -> RepositoryResult<i64> {
        tx.execute(
            r#"
            INSERT INTO production_records (
                operator_id, work_item_id, production_date, pieces,
                standard_minutes_per_piece, actual_minutes, damaged_pieces, earnings
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                record.operator_id,
                record.work_item_id,
                record.production_date,
                record.pieces,
                record.standard_minutes_per_piece,
                record.actual_minutes,
                record.damaged_pieces,
                record.earnings,
            ],
        )?;
        Ok(tx.last_insert_rowid())
    }

    pub fn list_by_date(&self, date: NaiveDate) -> RepositoryResult<Vec<ProductionRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT operator_id, work_item_id, production_date, pieces,
                   standard_minutes_per_piece, actual_minutes, damaged_pieces, earnings
            FROM production_records
            WHERE production_date = ?1
            ORDER BY record_id
            "#,
        )?;
        let rows = stmt.query_map(params![date], map_record)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn list_by_operator(&self, operator_id: &str) -> RepositoryResult<Vec<ProductionRecord>> {
        let conn = self.get_conn()?;
        Self::list_by_operator_with(&conn, operator_id)
    }

    pub fn list_by_operator_with(
        conn: &Connection,
        operator_id: &str,
    ) -> RepositoryResult<Vec<ProductionRecord>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT operator_id, work_item_id, production_date, pieces,
                   standard_minutes_per_piece, actual_minutes, damaged_pieces, earnings
            FROM production_records
            WHERE operator_id = ?1
            ORDER BY record_id
            "#,
        )?;
        let rows = stmt.query_map(params![operator_id], map_record)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // ===== 质检记录 =====

    pub fn insert_inspection(tx: &Transaction, inspection: &QualityInspection) -> RepositoryResult<()> {
        tx.execute(
            r#"
            INSERT INTO quality_inspections (
                inspection_id, work_item_id, operator_id, inspected_pieces,
                damaged_pieces, quality_score, inspected_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                inspection.inspection_id,
                inspection.work_item_id,
                inspection.operator_id,
                inspection.inspected_pieces,
                inspection.damaged_pieces,
                inspection.quality_score,
                inspection.inspected_at,
            ],
        )?;
        Ok(())
    }

    pub fn list_inspections(&self, work_item_id: &str) -> RepositoryResult<Vec<QualityInspection>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT inspection_id, work_item_id, operator_id, inspected_pieces,
                   damaged_pieces, quality_score, inspected_at
            FROM quality_inspections
            WHERE work_item_id = ?1
            ORDER BY inspected_at
            "#,
        )?;
        let rows = stmt.query_map(params![work_item_id], |row| {
            Ok(QualityInspection {
                inspection_id: row.get(0)?,
                work_item_id: row.get(1)?,
                operator_id: row.get(2)?,
                inspected_pieces: row.get(3)?,
                damaged_pieces: row.get(4)?,
                quality_score: row.get(5)?,
                inspected_at: row.get(6)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn map_record(row: &Row) -> rusqlite::Result<ProductionRecord> {
    Ok(ProductionRecord {
        operator_id: row.get(0)?,
        work_item_id: row.get(1)?,
        production_date: row.get(2)?,
        pieces: row.get(3)?,
        standard_minutes_per_piece: row.get(4)?,
        actual_minutes: row.get(5)?,
        damaged_pieces: row.get(6)?,
        earnings: row.get(7)?,
    })
}
