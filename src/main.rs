use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use rusqlite::Connection;

use flowgate::config::Config;
use flowgate::db::analysis::load::get_all;
use flowgate::db::open::{begin, open_db, release_or_rollback};
use flowgate::service::describe::describe;
use flowgate::service::ingest::ingest_messages;
use flowgate::service::poll::{poll_once, watch, DEFAULT_POLL_INTERVAL_SECS};
use flowgate::service::results::fetch_results;
use flowgate::service::submit::submit_pending;
use flowgate::transport::http::ReqwestTransport;
use flowgate::WorkingDirectory;

/// Submit FlowGate analyses to GenePattern and Galaxy and track their status
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the job database and downloaded results
    #[arg(short, long)]
    work_dir: PathBuf,

    /// JSON file describing analysis servers and modules
    #[arg(short, long)]
    config: PathBuf,

    /// Don't submit anything and roll back database changes
    #[arg(long)]
    dry_run: bool,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = 60)]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load analysis request messages from a directory
    Ingest {
        #[arg(short, long)]
        message_dir: PathBuf,
    },
    /// Submit analyses that have no job number yet
    Submit,
    /// Refresh the status of submitted analyses once
    Poll,
    /// Submit and poll on a fixed timer until interrupted
    Watch {
        /// Seconds between passes
        #[arg(short, long, default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
        interval: u64,
    },
    /// List analyses and their status
    List,
    /// Show the remote parameter schema of a module
    Describe {
        #[arg(long)]
        server: String,
        #[arg(long)]
        module: String,
    },
    /// Download the outputs of a finished analysis
    Results {
        #[arg(long)]
        id: i64,
        /// Defaults to <work_dir>/results
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    info!("flowgate starting up");

    let args = Args::parse();
    let wd = WorkingDirectory { path: args.work_dir.clone() };
    fs::create_dir_all(&wd.path)
        .with_context(|| format!("Can't create working directory {}", wd.path.display()))?;

    let conn = open_db(&wd)?;
    let config = Config::load(&args.config)?;
    let transport = ReqwestTransport::with_timeout(Duration::from_secs(args.timeout))?;

    if let Command::Watch { interval } = args.command {
        return watch(&conn, &config, &transport, Duration::from_secs(interval), args.dry_run).await;
    }

    begin(&conn)?;
    let outcome = run(&args, &wd, &conn, &config, &transport).await;
    release_or_rollback(&conn, args.dry_run)?;
    outcome
}

async fn run(
    args: &Args,
    wd: &WorkingDirectory,
    conn: &Connection,
    config: &Config,
    transport: &ReqwestTransport,
) -> Result<()> {
    match &args.command {
        Command::Ingest { message_dir } => {
            let summary = ingest_messages(conn, message_dir, args.dry_run)?;
            println!("ingested {} valid, {} invalid, skipped {}", summary.valid, summary.invalid, summary.skipped);
        }
        Command::Submit => {
            let summary = submit_pending(conn, config, transport, args.dry_run).await?;
            println!("submitted {}, failed {}", summary.submitted, summary.failed);
        }
        Command::Poll => {
            let changed = poll_once(conn, config, transport).await?;
            println!("{changed} analyses changed status");
        }
        Command::List => {
            for analysis in get_all(conn)? {
                let request = &analysis.request;
                let job_number = analysis.job_number.map(|j| j.to_string()).unwrap_or_else(|| "-".to_string());
                println!(
                    "{}\t{}\t{}\t{}/{}\t{}",
                    analysis.id, analysis.status, job_number, request.server, request.module, request.name
                );
            }
        }
        Command::Describe { server, module } => {
            print!("{}", describe(config, transport, server, module).await?);
        }
        Command::Results { id, out_dir } => {
            let out_dir = out_dir.clone().unwrap_or_else(|| wd.path.join("results"));
            for path in fetch_results(conn, config, transport, *id, &out_dir).await? {
                println!("{}", path.display());
            }
        }
        Command::Watch { .. } => unreachable!("watch runs its own passes"),
    }
    Ok(())
}
