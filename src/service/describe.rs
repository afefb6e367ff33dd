use std::fmt::Write as _;

use anyhow::Result;

use crate::config::Config;
use crate::engine::Engine;
use crate::service::connect;
use crate::transport::Transport;

/// Describe the remote parameter schema of a configured module
///
/// For GenePattern this is the task's parameter list, for Galaxy the workflow's input steps.
pub async fn describe<T: Transport>(
    config: &Config,
    transport: &T,
    server: &str,
    module: &str,
) -> Result<String> {
    let module = config.module(server, module)?;
    let engine = connect(config, transport, server).await?;
    let mut out = String::new();

    let remote: Vec<String> = match &engine {
        Engine::GenePattern(client) => {
            let task = client.task(&module.invocation).await?;
            writeln!(out, "{} ({})", task.name, task.lsid)?;
            if !task.description.is_empty() {
                writeln!(out, "{}", task.description)?;
            }
            for param in &task.params {
                let kind = if param.is_file { "file" } else { "value" };
                let required = if param.is_required() { "required" } else { "optional" };
                write!(out, "  {} [{kind}, {required}]", param.name)?;
                if let Some(default) = &param.default_value {
                    write!(out, " default={default}")?;
                }
                writeln!(out)?;
            }
            task.params.into_iter().map(|p| p.name).collect()
        }
        Engine::Galaxy(client) => {
            let workflow = client.workflow(&module.invocation).await?;
            writeln!(out, "{} ({})", workflow.name, workflow.id)?;
            for (index, input) in &workflow.inputs {
                writeln!(out, "  step {index}: {}", input.label.as_deref().unwrap_or("(unlabelled)"))?;
            }
            workflow.inputs.into_values().filter_map(|input| input.label).collect()
        }
    };

    // step parameters (`step|name`) aren't workflow inputs
    for param in module.params.iter().filter(|p| !p.name.contains('|')) {
        if !remote.contains(&param.name) {
            writeln!(out, "  module parameter {} has no remote counterpart", param.name)?;
        }
    }
    Ok(out)
}
