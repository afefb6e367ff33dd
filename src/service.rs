//! Submission and status polling glue
//!
//! Everything here is sequential and best effort: a failing analysis is logged and the rest
//! carry on. There is no retry; the next polling pass simply asks again.

use anyhow::Result;

use crate::config::Config;
use crate::engine::Engine;
use crate::transport::Transport;

pub mod describe;
pub mod ingest;
pub mod poll;
pub mod results;
pub mod submit;

/// Connect to a configured server with its credentials from the environment
pub async fn connect<'a, T: Transport>(
    config: &Config,
    transport: &'a T,
    server: &str,
) -> Result<Engine<'a, T>> {
    let server = config.server(server)?;
    let credentials = server.credentials()?;
    Ok(Engine::connect(transport, server, credentials).await?)
}
