//! Galaxy REST client
//!
//! Credentials are exchanged for an API key once; every later call sends the key in the
//! `x-api-key` header. Analyses run as workflow invocations, one history and one invocation
//! per FCS file.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use url::Url;

use crate::config::{Credentials, ModuleConfig, ModuleParam, ParamKind};
use crate::db::analysis::status::AnalysisStatus;
use crate::engine::{read_input, OutputFile};
use crate::error::{ClientError, Result};
use crate::request::message::{AnalysisRequest, ExpFile};
use crate::request::metadata::render_annotation;
use crate::transport::{endpoint, Body, HttpRequest, HttpResponse, Transport, Upload};

const API_KEY_HEADER: &str = "x-api-key";

pub struct GalaxyClient<'a, T> {
    transport: &'a T,
    base: Url,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct ApiKey {
    api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct History {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct ToolOutputs {
    outputs: Vec<Dataset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Dataset {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    /// Input steps keyed by step index
    #[serde(default)]
    pub inputs: BTreeMap<String, WorkflowInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowInput {
    #[serde(default)]
    pub label: Option<String>,
}

impl Workflow {
    /// Step index of the input with the given label
    pub fn input_index(&self, label: &str) -> Option<&str> {
        self.inputs
            .iter()
            .find(|(_, input)| input.label.as_deref() == Some(label))
            .map(|(index, _)| index.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Invocation {
    pub id: String,
    pub state: String,
    #[serde(default)]
    pub steps: Vec<InvocationStep>,
    /// Workflow outputs keyed by label
    #[serde(default)]
    pub outputs: BTreeMap<String, OutputRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvocationStep {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputRef {
    pub id: String,
    #[serde(default)]
    pub src: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    pub id: String,
    pub state: String,
}

impl<'a, T: Transport> GalaxyClient<'a, T> {
    /// Exchange basic auth credentials for the user's API key
    pub async fn authenticate(
        transport: &'a T,
        base: Url,
        credentials: &Credentials,
    ) -> Result<GalaxyClient<'a, T>> {
        let url = endpoint(&base, "api/authenticate/baseauth")?;
        let request = HttpRequest::get(url).basic_auth(credentials);
        let response = transport.send(request).await?;
        if response.status == 401 || response.status == 403 {
            return Err(ClientError::NotAuthenticated(base.to_string()));
        }
        let key: ApiKey = response.error_for_status()?.json()?;
        info!("Authenticated with Galaxy at {base} as {}", credentials.username);
        Ok(GalaxyClient { transport, base, api_key: key.api_key })
    }

    fn url(&self, path: &str) -> Result<Url> {
        endpoint(&self.base, path)
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let request = request.header(API_KEY_HEADER, &self.api_key);
        self.transport.send(request).await?.error_for_status()
    }

    pub async fn create_history(&self, name: &str) -> Result<History> {
        let request = HttpRequest::post(self.url("api/histories")?, Body::Json(json!({ "name": name })));
        let history: History = self.send(request).await?.json()?;
        debug!("Created history {} ({})", history.name, history.id);
        Ok(history)
    }

    /// Upload a file into a history with the `upload1` tool, returning the new dataset id
    pub async fn upload(&self, history_id: &str, file_name: &str, data: Vec<u8>) -> Result<String> {
        info!("Uploading {file_name} ({} bytes) to history {history_id}", data.len());
        let inputs = json!({
            "files_0|NAME": file_name,
            "files_0|type": "upload_dataset",
            "file_type": "auto",
            "dbkey": "?",
        });
        let upload = Upload {
            fields: vec![
                ("tool_id".to_string(), "upload1".to_string()),
                ("history_id".to_string(), history_id.to_string()),
                ("inputs".to_string(), inputs.to_string()),
            ],
            file_field: "files_0|file_data".to_string(),
            file_name: file_name.to_string(),
            data,
        };
        let url = self.url("api/tools")?;
        let request = HttpRequest::post(url.clone(), Body::Upload(upload));
        let outputs: ToolOutputs = self.send(request).await?.json()?;
        outputs
            .outputs
            .into_iter()
            .next()
            .map(|dataset| dataset.id)
            .ok_or_else(|| ClientError::InvalidResponse {
                url: url.to_string(),
                reason: "upload produced no dataset".to_string(),
            })
    }

    pub async fn workflow(&self, id: &str) -> Result<Workflow> {
        let request = HttpRequest::get(self.url(&format!("api/workflows/{id}"))?);
        self.send(request).await?.json()
    }

    pub async fn invoke(&self, workflow_id: &str, payload: Value) -> Result<Invocation> {
        let url = self.url(&format!("api/workflows/{workflow_id}/invocations"))?;
        let invocation: Invocation = self.send(HttpRequest::post(url, Body::Json(payload))).await?.json()?;
        info!("Invoked workflow {workflow_id}: invocation {}", invocation.id);
        Ok(invocation)
    }

    pub async fn invocation(&self, id: &str) -> Result<Invocation> {
        let request = HttpRequest::get(self.url(&format!("api/invocations/{id}"))?);
        self.send(request).await?.json()
    }

    pub async fn job(&self, id: &str) -> Result<Job> {
        let request = HttpRequest::get(self.url(&format!("api/jobs/{id}"))?);
        self.send(request).await?.json()
    }

    /// Status of one invocation, looking at the jobs behind each step
    pub async fn invocation_status(&self, id: &str, report_label: &str) -> Result<AnalysisStatus> {
        let invocation = self.invocation(id).await?;
        if matches!(invocation.state.as_str(), "failed" | "cancelled" | "cancelling") {
            return Ok(AnalysisStatus::Error);
        }

        let mut finished = true;
        for job_id in invocation.steps.iter().filter_map(|s| s.job_id.as_deref()) {
            let job = self.job(job_id).await?;
            debug!("Invocation {id}: job {} is {}", job.id, job.state);
            match job.state.as_str() {
                "error" | "failed" | "deleted" | "deleting" => return Ok(AnalysisStatus::Error),
                "ok" | "skipped" => {}
                _ => finished = false,
            }
        }

        if invocation.state != "scheduled" || !finished {
            Ok(AnalysisStatus::Pending)
        } else if invocation.outputs.contains_key(report_label) {
            Ok(AnalysisStatus::Done)
        } else {
            Ok(AnalysisStatus::DoneNoReport)
        }
    }

    pub async fn outputs(&self, invocation_id: &str) -> Result<Vec<OutputFile>> {
        let invocation = self.invocation(invocation_id).await?;
        invocation
            .outputs
            .into_iter()
            .map(|(label, output)| -> Result<OutputFile> {
                let url = self.url(&format!("api/datasets/{}/display", output.id))?;
                Ok(OutputFile { name: label, url })
            })
            .collect()
    }

    pub async fn download(&self, url: &Url) -> Result<Vec<u8>> {
        Ok(self.send(HttpRequest::get(url.clone())).await?.body)
    }

    /// Run the module's workflow once per dataset file
    ///
    /// Returns the invocation ids in dataset order. Parameters are checked against the workflow
    /// inputs before any history is created.
    pub async fn submit_analysis(
        &self,
        module: &ModuleConfig,
        request: &AnalysisRequest,
    ) -> Result<Vec<String>> {
        let workflow = self.workflow(&module.invocation).await?;
        info!("Submitting {} to Galaxy workflow {} ({})", request.name, workflow.name, workflow.id);

        let bindings = bind_params(&workflow, module, request)?;
        let annotation = match bindings.iter().any(|b| b.param.kind == ParamKind::Meta) {
            true => Some(
                render_annotation(&request.dataset).map_err(|e| ClientError::Annotation(e.to_string()))?,
            ),
            false => None,
        };

        let mut ids: Vec<String> = Vec::new();
        for file in &request.dataset.files {
            match self.submit_file(&workflow, file, &bindings, request, annotation.as_deref()).await {
                Ok(id) => ids.push(id),
                Err(err) if ids.is_empty() => return Err(err),
                Err(err) => {
                    let started = ids.join(",");
                    warn!("Invocations {started} of {} keep running on Galaxy but won't be polled", request.name);
                    return Err(ClientError::PartialSubmission { started, cause: Box::new(err) });
                }
            }
        }
        Ok(ids)
    }

    async fn submit_file(
        &self,
        workflow: &Workflow,
        file: &ExpFile,
        bindings: &[Binding<'_>],
        request: &AnalysisRequest,
        annotation: Option<&str>,
    ) -> Result<String> {
        let history = self.create_history(&format!("{} - {}", request.name, file.file_name)).await?;
        let payload = self.invocation_payload(&history, file, bindings, request, annotation).await?;
        Ok(self.invoke(&workflow.id, payload).await?.id)
    }

    async fn invocation_payload(
        &self,
        history: &History,
        file: &ExpFile,
        bindings: &[Binding<'_>],
        request: &AnalysisRequest,
        annotation: Option<&str>,
    ) -> Result<Value> {
        let mut inputs = Map::new();
        let mut parameters: BTreeMap<&str, BTreeMap<&str, &str>> = BTreeMap::new();

        for binding in bindings {
            match (&binding.target, binding.param.kind) {
                (Target::Input(index), ParamKind::Dataset) => {
                    let data = read_input(&file.path).await?;
                    let id = self.upload(&history.id, &file.file_name, data).await?;
                    inputs.insert(index.to_string(), json!({ "src": "hda", "id": id }));
                }
                (Target::Input(index), ParamKind::Meta) => {
                    let table = annotation.unwrap_or_default().as_bytes().to_vec();
                    let id = self.upload(&history.id, "annotation.txt", table).await?;
                    inputs.insert(index.to_string(), json!({ "src": "hda", "id": id }));
                }
                (Target::Input(index), ParamKind::File) => {
                    if let Some(path) = request.params.get(&binding.param.name) {
                        let path = std::path::Path::new(path);
                        let name = path
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_else(|| binding.param.name.clone());
                        let id = self.upload(&history.id, &name, read_input(path).await?).await?;
                        inputs.insert(index.to_string(), json!({ "src": "hda", "id": id }));
                    }
                }
                (Target::Input(index), ParamKind::Value) => {
                    if let Some(value) = binding.value {
                        inputs.insert(index.to_string(), json!(value));
                    }
                }
                (Target::StepParameter(step, name), _) => {
                    if let Some(value) = binding.value {
                        parameters.entry(*step).or_default().insert(*name, value);
                    }
                }
            }
        }

        Ok(json!({
            "history_id": history.id,
            "inputs": inputs,
            "inputs_by": "step_index",
            "parameters": parameters,
        }))
    }
}

/// Where a module parameter goes in the invocation payload
#[derive(Debug, PartialEq, Eq)]
enum Target<'a> {
    /// Workflow input step, by index
    Input(&'a str),
    /// Tool parameter of a step, from a `step|name` parameter name
    StepParameter(&'a str, &'a str),
}

#[derive(Debug)]
struct Binding<'a> {
    param: &'a ModuleParam,
    target: Target<'a>,
    value: Option<&'a str>,
}

fn bind_params<'a>(
    workflow: &'a Workflow,
    module: &'a ModuleConfig,
    request: &'a AnalysisRequest,
) -> Result<Vec<Binding<'a>>> {
    let mut bindings = Vec::new();
    for param in &module.params {
        let value = match param.kind {
            ParamKind::Value => request
                .params
                .get(&param.name)
                .or(param.default.as_ref())
                .map(String::as_str),
            _ => None,
        };
        let missing_value = match param.kind {
            ParamKind::Value => value.is_none(),
            ParamKind::File => !request.params.contains_key(&param.name),
            ParamKind::Dataset | ParamKind::Meta => false,
        };
        if missing_value {
            if param.optional {
                continue;
            }
            return Err(ClientError::MissingParameter {
                module: module.name.clone(),
                param: param.name.clone(),
            });
        }

        let target = match (param.kind, param.name.split_once('|')) {
            (ParamKind::Value, Some((step, name))) => Target::StepParameter(step, name),
            _ => match workflow.input_index(&param.name) {
                Some(index) => Target::Input(index),
                None => {
                    return Err(ClientError::UnknownInput {
                        workflow: workflow.id.clone(),
                        label: param.name.clone(),
                    })
                }
            },
        };
        bindings.push(Binding { param, target, value });
    }
    Ok(bindings)
}
