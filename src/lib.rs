//! Submit FlowGate analyses to remote analysis servers and keep track of them
//!
//! An analysis runs a module (a GenePattern task or a Galaxy workflow) over a dataset of FCS
//! files. Requests arrive as JSON messages, are stored in a SQLite database, submitted to the
//! remote server and then polled until the remote job finishes.

use std::path::PathBuf;

/// Servers, modules and their parameter schemas
pub mod config;
/// All analysis state is stored in a SQLite database
pub mod db;
/// Typed clients for GenePattern and Galaxy
pub mod engine;
pub mod error;
pub mod platform;
/// Read and validate analysis request messages
pub mod request;
/// Submission and polling glue
pub mod service;
/// HTTP plumbing shared by the engine clients
pub mod transport;

/// Directory holding the job database and downloaded results
#[derive(Debug, Clone)]
pub struct WorkingDirectory {
    pub path: PathBuf,
}
