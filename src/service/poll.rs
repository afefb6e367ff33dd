use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use log::{debug, error, info, warn};
use rusqlite::Connection;
use tokio::time::MissedTickBehavior;

use crate::config::Config;
use crate::db::analysis::load::get_polling;
use crate::db::analysis::status::AnalysisStatus;
use crate::db::analysis::Analysis;
use crate::db::open::{begin, release_or_rollback};
use crate::engine::{Engine, JobNumber};
use crate::service::connect;
use crate::service::submit::submit_pending;
use crate::transport::Transport;

/// Seconds between polling passes unless configured otherwise
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Ask the servers about every submitted analysis that hasn't finished
///
/// Each server is connected to at most once per call. Only changed statuses are written.
/// Analyses that can't be polled are logged and left as they are. Returns the number of
/// analyses whose status changed.
pub async fn poll_once<T: Transport>(conn: &Connection, config: &Config, transport: &T) -> Result<usize> {
    let mut engines: HashMap<String, Option<Engine<'_, T>>> = HashMap::new();
    let mut changed = 0;
    for mut analysis in get_polling(conn)? {
        let Some(job_number) = analysis.job_number.clone() else { continue };
        let server = analysis.request.server.clone();
        if !engines.contains_key(&server) {
            let engine = match connect(config, transport, &server).await {
                Ok(engine) => Some(engine),
                Err(err) => {
                    warn!("Can't connect to {server}: {err:#}");
                    None
                }
            };
            engines.insert(server.clone(), engine);
        }
        let Some(Some(engine)) = engines.get(&server) else {
            warn!("Skipping analysis {}, server {server} unavailable", analysis.id);
            continue;
        };

        match poll_one(config, engine, &analysis, &job_number).await {
            Ok(status) if status != analysis.status => {
                info!("Analysis {} ({job_number}) is now {status}", analysis.id);
                analysis.set_status(conn, status, None)?;
                changed += 1;
            }
            Ok(status) => debug!("Analysis {} still {status}", analysis.id),
            Err(err) => warn!("Polling analysis {} failed: {err:#}", analysis.id),
        }
    }
    Ok(changed)
}

async fn poll_one<T: Transport>(
    config: &Config,
    engine: &Engine<'_, T>,
    analysis: &Analysis,
    job_number: &JobNumber,
) -> Result<AnalysisStatus> {
    let request = &analysis.request;
    let module = config.module(&request.server, &request.module)?;
    Ok(engine.status(module, job_number).await?)
}

/// Submit new analyses and poll running ones on a fixed timer until Ctrl-C
///
/// Each pass runs inside its own save point, so `dry_run` discards the pass and real runs
/// commit after every pass.
pub async fn watch<T: Transport>(
    conn: &Connection,
    config: &Config,
    transport: &T,
    every: Duration,
    dry_run: bool,
) -> Result<()> {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!("Polling every {} seconds, Ctrl-C to stop", every.as_secs());

    let stop = tokio::signal::ctrl_c();
    tokio::pin!(stop);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                begin(conn)?;
                let pass = run_pass(conn, config, transport, dry_run).await;
                release_or_rollback(conn, dry_run)?;
                if let Err(err) = pass {
                    error!("Polling pass failed: {err:#}");
                }
            }
            _ = &mut stop => {
                info!("Stopping");
                return Ok(());
            }
        }
    }
}

async fn run_pass<T: Transport>(conn: &Connection, config: &Config, transport: &T, dry_run: bool) -> Result<()> {
    let summary = submit_pending(conn, config, transport, dry_run).await?;
    if summary.submitted + summary.failed > 0 {
        info!("Submitted {} analyses, {} failed", summary.submitted, summary.failed);
    }
    poll_once(conn, config, transport).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::analysis::load::get_analysis;
    use crate::db::ingest::ingest_message;
    use crate::db::open::open_in_memory;
    use crate::service::fixtures::{config, manifest};
    use crate::transport::mock::MockTransport;
    use crate::transport::Method;

    fn submitted(conn: &Connection, server: &str, module: &str, job_number: &str) -> i64 {
        let fcs = std::path::Path::new("/data/a.fcs");
        let id = ingest_message(conn, &manifest(server, module, fcs), true).unwrap();
        conn.execute(
            "UPDATE analysis SET job_number = ?1, analysis_status = 2 WHERE id = ?2",
            (job_number, id),
        )
        .unwrap();
        id
    }

    #[tokio::test]
    async fn test_poll_updates_changed_status() {
        let conn = open_in_memory().unwrap();
        let done = submitted(&conn, "gp", "flock", "7");
        let running = submitted(&conn, "gp", "flock", "8");
        let broken = submitted(&conn, "gp", "flock", "9");

        let transport = MockTransport::new()
            .on(Method::Get, "/gp/rest/v1/jobs/7", 200, r#"{"status": {"isFinished": true},
                "outputFiles": [{"link": {"href": "/gp/jobResults/7/report.html", "name": "report.html"}}]}"#)
            .on(Method::Get, "/gp/rest/v1/jobs/8", 200, r#"{"status": {"isFinished": false}}"#)
            .on(Method::Get, "/gp/rest/v1/jobs/9", 503, "unavailable");

        let changed = poll_once(&conn, &config(), &transport).await.unwrap();
        assert_eq!(changed, 1);
        assert_eq!(get_analysis(&conn, done).unwrap().unwrap().status, AnalysisStatus::Done);
        assert_eq!(get_analysis(&conn, running).unwrap().unwrap().status, AnalysisStatus::Pending);
        assert_eq!(get_analysis(&conn, broken).unwrap().unwrap().status, AnalysisStatus::Pending);

        // finished analyses drop out of the next pass
        let changed = poll_once(&conn, &config(), &transport).await.unwrap();
        assert_eq!(changed, 0);
        assert!(transport.requests_to("/gp/rest/v1/jobs/7").len() == 1);
    }

    #[tokio::test]
    async fn test_poll_fanned_out_galaxy_analysis() {
        let conn = open_in_memory().unwrap();
        let id = submitted(&conn, "galaxy", "gating", "inv1,inv2");

        let transport = MockTransport::new()
            .on(Method::Get, "/api/authenticate/baseauth", 200, r#"{"api_key": "KEY"}"#)
            .on(Method::Get, "/api/invocations/inv1", 200, r#"{"id": "inv1", "state": "scheduled"}"#)
            .on(Method::Get, "/api/invocations/inv2", 200, r#"{"id": "inv2", "state": "failed"}"#);

        poll_once(&conn, &config(), &transport).await.unwrap();
        let analysis = get_analysis(&conn, id).unwrap().unwrap();
        assert_eq!(analysis.status, AnalysisStatus::Error);
        assert_eq!(analysis.job_number.unwrap().to_string(), "inv1,inv2");
    }

    #[tokio::test]
    async fn test_poll_connects_once_per_server() {
        let conn = open_in_memory().unwrap();
        let first = submitted(&conn, "galaxy", "gating", "inv1");
        let second = submitted(&conn, "galaxy", "gating", "inv2");

        let transport = MockTransport::new()
            .on(Method::Get, "/api/authenticate/baseauth", 200, r#"{"api_key": "KEY"}"#)
            .on(Method::Get, "/api/invocations/inv1", 200, r#"{"id": "inv1", "state": "failed"}"#)
            .on(Method::Get, "/api/invocations/inv2", 200, r#"{"id": "inv2", "state": "cancelled"}"#);

        assert_eq!(poll_once(&conn, &config(), &transport).await.unwrap(), 2);
        assert_eq!(transport.requests_to("/api/authenticate/baseauth").len(), 1);
        assert_eq!(get_analysis(&conn, first).unwrap().unwrap().status, AnalysisStatus::Error);
        assert_eq!(get_analysis(&conn, second).unwrap().unwrap().status, AnalysisStatus::Error);
    }

    #[tokio::test]
    async fn test_unreachable_server_leaves_analyses_alone() {
        let conn = open_in_memory().unwrap();
        let galaxy = submitted(&conn, "galaxy", "gating", "inv1");
        let gp = submitted(&conn, "gp", "flock", "7");

        let transport = MockTransport::new()
            .on(Method::Get, "/api/authenticate/baseauth", 503, "down")
            .on(Method::Get, "/gp/rest/v1/jobs/7", 200, r#"{"status": {"isFinished": true, "hasError": true}}"#);

        assert_eq!(poll_once(&conn, &config(), &transport).await.unwrap(), 1);
        assert_eq!(get_analysis(&conn, galaxy).unwrap().unwrap().status, AnalysisStatus::Pending);
        assert_eq!(get_analysis(&conn, gp).unwrap().unwrap().status, AnalysisStatus::Error);
    }
}
