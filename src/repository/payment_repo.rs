// ==========================================
// 服装工厂 ERP - 计件工资记录仓储
// ==========================================

use crate::domain::production::PaymentRecord;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Row, Transaction};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    SELECT payment_id, work_item_id, operator_id, base_payment, efficiency_bonus,
           quality_bonus, damage_penalty, final_payment, breakdown_json, calculated_at
    FROM payment_records
"#;

pub struct PaymentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PaymentRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn insert(tx: &Transaction, record: &PaymentRecord) -> RepositoryResult<()> {
        tx.execute(
            r#"
            INSERT INTO payment_records (
                payment_id, work_item_id, operator_id, base_payment, efficiency_bonus,
                quality_bonus, damage_penalty, final_payment, breakdown_json, calculated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                record.payment_id,
                record.work_item_id,
                record.operator_id,
                record.base_payment,
                record.efficiency_bonus,
                record.quality_bonus,
                record.damage_penalty,
                record.final_payment,
                serde_json::to_string(&record.breakdown_json)?,
                record.calculated_at,
            ],
        )?;
        Ok(())
    }

    pub fn list_by_operator(&self, operator_id: &str) -> RepositoryResult<Vec<PaymentRecord>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE operator_id = ?1 ORDER BY calculated_at", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![operator_id], map_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn list_by_work_item(&self, work_item_id: &str) -> RepositoryResult<Vec<PaymentRecord>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE work_item_id = ?1 ORDER BY calculated_at", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![work_item_id], map_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn map_row(row: &Row) -> rusqlite::Result<PaymentRecord> {
    let breakdown: String = row.get(8)?;
    Ok(PaymentRecord {
        payment_id: row.get(0)?,
        work_item_id: row.get(1)?,
        operator_id: row.get(2)?,
        base_payment: row.get(3)?,
        efficiency_bonus: row.get(4)?,
        quality_bonus: row.get(5)?,
        damage_penalty: row.get(6)?,
        final_payment: row.get(7)?,
        breakdown_json: serde_json::from_str(&breakdown).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
        })?,
        calculated_at: row.get(9)?,
    })
}
