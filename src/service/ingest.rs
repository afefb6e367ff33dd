use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};
use rusqlite::Connection;

use crate::db::ingest::{forget_message, ingest_message};
use crate::request::message::{Message, MessageError};
use crate::request::read::get_message_paths;
use crate::request::schema::load_schema;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub valid: usize,
    pub invalid: usize,
    pub skipped: usize,
}

/// Load every request message in `dir` into the database
///
/// Messages that are JSON but fail validation are stored as invalid. Stored messages are
/// renamed with an `.ingested` suffix so they are only picked up once; unreadable or non-JSON
/// files are left alone. With `dry_run` every message stays where it is.
///
/// A message that can't be renamed is removed from the database again and counted as skipped,
/// so it is ingested exactly once on a later run.
pub fn ingest_messages(conn: &Connection, dir: &Path, dry_run: bool) -> Result<IngestSummary> {
    let schema = load_schema()?;
    let paths = get_message_paths(dir)
        .with_context(|| format!("Can't list messages in {}", dir.display()))?;
    info!("Found {} request messages in {}", paths.len(), dir.display());

    let mut summary = IngestSummary::default();
    for path in paths {
        let message = Message { path: path.clone(), compiled_schema: &schema };
        let content = match message.read_file() {
            Ok(content) => content,
            Err(_) => {
                summary.skipped += 1;
                continue;
            }
        };

        let valid = match message.parse(&content) {
            Ok(request) => {
                info!("Analysis request {} for {} on {}", request.name, request.module, request.server);
                true
            }
            Err(MessageError::JSONValidationError) | Err(MessageError::DeserialisationError) => false,
            Err(err) => {
                warn!("Skipping {}: {err:?}", path.display());
                summary.skipped += 1;
                continue;
            }
        };

        let id = ingest_message(conn, &content, valid)?;
        if !dry_run {
            let done = path.with_extension("json.ingested");
            if let Err(err) = fs::rename(&path, &done) {
                warn!("Can't rename {} to {}: {err}", path.display(), done.display());
                forget_message(conn, id)?;
                summary.skipped += 1;
                continue;
            }
        }
        match valid {
            true => summary.valid += 1,
            false => summary.invalid += 1,
        }
    }
    Ok(summary)
}
