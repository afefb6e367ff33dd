use anyhow::Result;
use log::info;
use rusqlite::Connection;

/// Load a request message into the database
///
/// The manifest is stored in a JSON column; the schema extracts the analysis name, server and
/// module from it. Invalid messages are kept (with `valid = 0`) so they can be inspected later,
/// but are never submitted.
pub fn ingest_message(conn: &Connection, manifest: &str, valid: bool) -> Result<i64> {
    conn.execute(
        "INSERT INTO analysis (manifest, valid) VALUES (?1, ?2)",
        (manifest, valid),
    )?;
    let id = conn.last_insert_rowid();
    info!("Added analysis {id} to db (valid: {valid})");
    Ok(id)
}

/// Remove a message that was added but could not be marked as ingested
pub fn forget_message(conn: &Connection, id: i64) -> Result<()> {
    conn.execute("DELETE FROM analysis WHERE id = ?1", [id])?;
    info!("Removed analysis {id} from db");
    Ok(())
}
