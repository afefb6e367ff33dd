//! GenePattern REST client
//!
//! Uses the `/gp/rest/v1` API: task lookup, job input upload, job submission and job status.
//! Every request carries basic auth.

use std::collections::{BTreeMap, HashSet};

use log::{debug, info, warn};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use url::Url;

use crate::config::{Credentials, ModuleConfig, ParamKind};
use crate::db::analysis::status::AnalysisStatus;
use crate::engine::{read_input, OutputFile};
use crate::error::{ClientError, Result};
use crate::request::message::AnalysisRequest;
use crate::request::metadata::render_annotation;
use crate::transport::{endpoint, Body, HttpRequest, Transport};

const TASKS: &str = "gp/rest/v1/tasks/";
const JOBS: &str = "gp/rest/v1/jobs";
const UPLOAD: &str = "gp/rest/v1/data/upload/job_input";

pub struct GenePatternClient<'a, T> {
    transport: &'a T,
    base: Url,
    credentials: Credentials,
}

/// A GenePattern module and its parameter schema
#[derive(Debug, Clone, Deserialize)]
pub struct TaskInfo {
    pub lsid: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "task_params")]
    pub params: Vec<TaskParam>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskParam {
    pub name: String,
    pub description: String,
    pub optional: bool,
    pub default_value: Option<String>,
    pub is_file: bool,
}

impl TaskInfo {
    pub fn param(&self, name: &str) -> Option<&TaskParam> {
        self.params.iter().find(|p| p.name == name)
    }
}

impl TaskParam {
    pub fn is_required(&self) -> bool {
        !self.optional && self.default_value.is_none()
    }
}

// params arrive as a list of single-key objects: [{"input.file": {"attributes": {..}, ..}}]
#[derive(Deserialize)]
struct RawTaskParam {
    #[serde(default)]
    attributes: BTreeMap<String, Value>,
    #[serde(default)]
    description: String,
}

fn task_params<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<TaskParam>, D::Error> {
    let raw: Vec<BTreeMap<String, RawTaskParam>> = Vec::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .flatten()
        .map(|(name, param)| {
            let attribute = |key: &str| param.attributes.get(key).and_then(Value::as_str).unwrap_or("");
            let default_value = attribute("default_value");
            TaskParam {
                optional: attribute("optional") == "on",
                default_value: (!default_value.is_empty()).then(|| default_value.to_string()),
                is_file: attribute("TYPE") == "FILE" || attribute("type") == "java.io.File",
                description: param.description,
                name,
            }
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobParam {
    pub name: String,
    pub values: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct JobCreated {
    #[serde(rename = "jobId", deserialize_with = "string_or_number")]
    job_id: String,
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("unexpected job id {other}"))),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub output_files: Vec<JobOutput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobStatus {
    pub is_finished: bool,
    pub has_error: bool,
    pub is_pending: bool,
    pub status_message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobOutput {
    pub link: Link,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Link {
    pub href: String,
    pub name: String,
}

impl JobInfo {
    /// Finished jobs are done when one of their outputs looks like a report
    pub fn analysis_status(&self, report_marker: &str) -> AnalysisStatus {
        if self.status.has_error {
            AnalysisStatus::Error
        } else if !self.status.is_finished {
            AnalysisStatus::Pending
        } else if self.output_files.iter().any(|f| f.link.name.contains(report_marker)) {
            AnalysisStatus::Done
        } else {
            AnalysisStatus::DoneNoReport
        }
    }
}

impl<'a, T: Transport> GenePatternClient<'a, T> {
    pub fn new(transport: &'a T, base: Url, credentials: Credentials) -> Self {
        GenePatternClient { transport, base, credentials }
    }

    pub async fn task(&self, name: &str) -> Result<TaskInfo> {
        let url = endpoint(&self.base, &format!("{TASKS}{name}"))?;
        let request = HttpRequest::get(url).basic_auth(&self.credentials);
        self.transport.send(request).await?.error_for_status()?.json()
    }

    /// Upload a job input file, returning the URL GenePattern stored it under
    pub async fn upload(&self, file_name: &str, data: Vec<u8>) -> Result<String> {
        let mut url = endpoint(&self.base, UPLOAD)?;
        url.query_pairs_mut().append_pair("name", file_name);
        info!("Uploading {file_name} ({} bytes) to {}", data.len(), self.base);

        let request = HttpRequest::post(url.clone(), Body::Bytes(data)).basic_auth(&self.credentials);
        let response = self.transport.send(request).await?.error_for_status()?;
        response
            .header("Location")
            .map(str::to_string)
            .ok_or_else(|| ClientError::MissingLocation(url.to_string()))
    }

    pub async fn submit(&self, lsid: &str, params: &[JobParam]) -> Result<String> {
        let url = endpoint(&self.base, JOBS)?;
        let body = json!({ "lsid": lsid, "params": params });
        let request = HttpRequest::post(url, Body::Json(body)).basic_auth(&self.credentials);
        let created: JobCreated = self.transport.send(request).await?.error_for_status()?.json()?;
        info!("GenePattern job {} submitted", created.job_id);
        Ok(created.job_id)
    }

    pub async fn job(&self, id: &str) -> Result<JobInfo> {
        let url = endpoint(&self.base, &format!("{JOBS}/{id}"))?;
        let request = HttpRequest::get(url).basic_auth(&self.credentials);
        self.transport.send(request).await?.error_for_status()?.json()
    }

    pub async fn job_status(&self, id: &str, report_marker: &str) -> Result<AnalysisStatus> {
        let job = self.job(id).await?;
        if let Some(message) = &job.status.status_message {
            debug!("GenePattern job {id}: {message}");
        }
        Ok(job.analysis_status(report_marker))
    }

    pub async fn outputs(&self, id: &str) -> Result<Vec<OutputFile>> {
        let job = self.job(id).await?;
        job.output_files
            .into_iter()
            .map(|file| -> Result<OutputFile> {
                let url = self.base.join(&file.link.href)?;
                Ok(OutputFile { name: file.link.name, url })
            })
            .collect()
    }

    pub async fn download(&self, url: &Url) -> Result<Vec<u8>> {
        let request = HttpRequest::get(url.clone()).basic_auth(&self.credentials);
        Ok(self.transport.send(request).await?.error_for_status()?.body)
    }

    /// Map a module's parameters onto the remote task and submit one job for the analysis
    ///
    /// Dataset parameters receive every file of the dataset. Required task parameters that would
    /// be left empty fail the submission before anything is uploaded.
    pub async fn submit_analysis(
        &self,
        module: &ModuleConfig,
        request: &AnalysisRequest,
    ) -> Result<String> {
        let task = self.task(&module.invocation).await?;
        info!("Submitting {} to GenePattern task {} ({})", request.name, task.name, task.lsid);

        let mut provided = HashSet::new();
        for param in &module.params {
            if task.param(&param.name).is_none() {
                warn!("Task {} has no parameter {}, skipping", task.name, param.name);
                continue;
            }
            let has_value = match param.kind {
                ParamKind::Value => {
                    request.params.contains_key(&param.name) || param.default.is_some()
                }
                ParamKind::Dataset | ParamKind::Meta => true,
                ParamKind::File => request.params.contains_key(&param.name),
            };
            if has_value {
                provided.insert(param.name.as_str());
            } else if !param.optional {
                return Err(missing(module, &param.name));
            }
        }
        if let Some(param) = task.params.iter().find(|p| p.is_required() && !provided.contains(p.name.as_str())) {
            return Err(missing(module, &param.name));
        }

        let mut params = Vec::new();
        for param in module.params.iter().filter(|p| provided.contains(p.name.as_str())) {
            let values = match param.kind {
                ParamKind::Value => request
                    .params
                    .get(&param.name)
                    .or(param.default.as_ref())
                    .cloned()
                    .into_iter()
                    .collect(),
                ParamKind::Dataset => {
                    let mut urls = Vec::new();
                    for file in &request.dataset.files {
                        let data = read_input(&file.path).await?;
                        urls.push(self.upload(&file.file_name, data).await?);
                    }
                    urls
                }
                ParamKind::Meta => {
                    let table = render_annotation(&request.dataset)
                        .map_err(|e| ClientError::Annotation(e.to_string()))?;
                    let name = format!("{}_annotation.txt", request.dataset.name.replace(' ', "_"));
                    vec![self.upload(&name, table.into_bytes()).await?]
                }
                ParamKind::File => {
                    let mut urls = Vec::new();
                    if let Some(path) = request.params.get(&param.name) {
                        let path = std::path::Path::new(path);
                        let name = path
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_else(|| param.name.clone());
                        urls.push(self.upload(&name, read_input(path).await?).await?);
                    }
                    urls
                }
            };
            params.push(JobParam { name: param.name.clone(), values });
        }

        self.submit(&task.lsid, &params).await
    }
}

fn missing(module: &ModuleConfig, param: &str) -> ClientError {
    ClientError::MissingParameter { module: module.name.clone(), param: param.to_string() }
}
