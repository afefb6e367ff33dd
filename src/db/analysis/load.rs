use log::debug;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::db::analysis::Analysis;
use crate::engine::JobNumber;
use crate::request::message::AnalysisRequest;

const COLUMNS: &str = "id, manifest, job_number, analysis_status, status_message, updated";

/// Valid analyses that were never sent to a server
pub fn get_submittable(conn: &Connection) -> rusqlite::Result<Vec<Analysis>> {
    query(conn, "WHERE valid = 1 AND analysis_status = 1 AND job_number IS NULL ORDER BY id")
}

/// Submitted analyses still waiting on the remote server
pub fn get_polling(conn: &Connection) -> rusqlite::Result<Vec<Analysis>> {
    query(
        conn,
        "WHERE valid = 1 AND analysis_status IN (1, 2) \
         AND job_number IS NOT NULL AND job_number != '-1' ORDER BY id",
    )
}

/// Every valid analysis, newest first
pub fn get_all(conn: &Connection) -> rusqlite::Result<Vec<Analysis>> {
    query(conn, "WHERE valid = 1 ORDER BY id DESC")
}

pub fn get_analysis(conn: &Connection, id: i64) -> rusqlite::Result<Option<Analysis>> {
    let sql = format!("SELECT {COLUMNS} FROM analysis WHERE valid = 1 AND id = ?1");
    conn.query_row(&sql, [id], from_row).optional()
}

fn query(conn: &Connection, clause: &str) -> rusqlite::Result<Vec<Analysis>> {
    let sql = format!("SELECT {COLUMNS} FROM analysis {clause}");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], from_row)?;
    let analyses = rows.collect::<rusqlite::Result<Vec<Analysis>>>()?;
    debug!("Loaded {} analyses from db", analyses.len());
    Ok(analyses)
}

fn from_row(row: &Row) -> rusqlite::Result<Analysis> {
    let manifest: String = row.get(1)?;
    let request: AnalysisRequest = serde_json::from_str(&manifest)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
    let job_number = row
        .get::<_, Option<String>>(2)?
        .map(|s| s.parse::<JobNumber>())
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    Ok(Analysis {
        id: row.get(0)?,
        request,
        job_number,
        status: row.get(3)?,
        status_message: row.get(4)?,
        updated: row.get(5)?,
    })
}
