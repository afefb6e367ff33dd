use anyhow::Result;
use log::{error, info};
use rusqlite::Connection;

use crate::config::Config;
use crate::db::analysis::load::get_submittable;
use crate::db::analysis::Analysis;
use crate::engine::JobNumber;
use crate::service::connect;
use crate::transport::Transport;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SubmitSummary {
    pub submitted: usize,
    pub failed: usize,
}

/// Submit every valid analysis that has no job number yet
///
/// A failed submission stores the `-1` job number and the error status; the next analysis is
/// still submitted. With `dry_run` nothing is sent to the servers.
pub async fn submit_pending<T: Transport>(
    conn: &Connection,
    config: &Config,
    transport: &T,
    dry_run: bool,
) -> Result<SubmitSummary> {
    let mut summary = SubmitSummary::default();
    for mut analysis in get_submittable(conn)? {
        let request = &analysis.request;
        if dry_run {
            info!("Would submit analysis {} ({}) to {} module {}",
                analysis.id, request.name, request.server, request.module);
            continue;
        }

        match submit_one(config, transport, &analysis).await {
            Ok(job_number) => {
                analysis.set_submitted(conn, job_number)?;
                summary.submitted += 1;
            }
            Err(err) => {
                error!("Submitting analysis {} failed: {err:#}", analysis.id);
                analysis.set_failed(conn, &format!("{err:#}"))?;
                summary.failed += 1;
            }
        }
    }
    Ok(summary)
}

async fn submit_one<T: Transport>(
    config: &Config,
    transport: &T,
    analysis: &Analysis,
) -> Result<JobNumber> {
    let request = &analysis.request;
    info!("Submitting analysis {} ({}) to {}", analysis.id, request.name, request.server);
    let module = config.module(&request.server, &request.module)?;
    let engine = connect(config, transport, &request.server).await?;
    Ok(engine.submit(module, request).await?)
}
