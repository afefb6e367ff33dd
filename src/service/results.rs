use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use log::info;
use rusqlite::Connection;

use crate::config::Config;
use crate::db::analysis::load::get_analysis;
use crate::service::connect;
use crate::transport::Transport;

/// Download every output of a finished analysis into `out_dir/<analysis id>/`
pub async fn fetch_results<T: Transport>(
    conn: &Connection,
    config: &Config,
    transport: &T,
    id: i64,
    out_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let analysis = get_analysis(conn, id)?.ok_or_else(|| anyhow!("No analysis with id {id}"))?;
    if !analysis.status.is_done() {
        bail!("Analysis {id} is {}, results are only available once it is done", analysis.status);
    }
    let job_number = analysis
        .job_number
        .ok_or_else(|| anyhow!("Analysis {id} was never submitted"))?;

    let engine = connect(config, transport, &analysis.request.server).await?;
    let outputs = engine.outputs(&job_number).await?;
    info!("Analysis {id} has {} output files", outputs.len());

    let dir = out_dir.join(id.to_string());
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("Can't create {}", dir.display()))?;

    let mut paths = Vec::new();
    for output in outputs {
        let data = engine.download(&output).await?;
        let path = dir.join(output.name.replace(['/', '\\'], "_"));
        info!("Writing {} ({} bytes)", path.display(), data.len());
        tokio::fs::write(&path, data)
            .await
            .with_context(|| format!("Can't write {}", path.display()))?;
        paths.push(path);
    }
    Ok(paths)
}
