//! All analysis state is stored in a SQLite database

/// Connect to a SQLite database
pub mod open;
/// Load, update and track the status of analyses
pub mod analysis;
/// Store validated request messages
pub mod ingest;
