//! A uniform interface over the remote analysis engines
//!
//! Each engine submits an analysis, reports its status as an [`AnalysisStatus`] and lists and
//! downloads its outputs. The external job identifier is kept as a [`JobNumber`].

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use log::info;
use url::Url;

use crate::config::{Credentials, ModuleConfig, ServerConfig};
use crate::db::analysis::status::AnalysisStatus;
use crate::error::{ClientError, Result};
use crate::platform::Platform;
use crate::request::message::AnalysisRequest;
use crate::transport::Transport;

pub mod galaxy;
pub mod genepattern;

use galaxy::GalaxyClient;
use genepattern::GenePatternClient;

/// External job identifier(s) of an analysis
///
/// Stored as text: a single id, a comma-joined list of ids when the dataset fans out to one
/// remote job per file, or `-1` when submission failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobNumber {
    Failed,
    Ids(Vec<String>),
}

impl JobNumber {
    pub fn single(id: impl Into<String>) -> JobNumber {
        JobNumber::Ids(vec![id.into()])
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, JobNumber::Failed)
    }

    pub fn ids(&self) -> &[String] {
        match self {
            JobNumber::Failed => &[],
            JobNumber::Ids(ids) => ids,
        }
    }
}

impl fmt::Display for JobNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JobNumber::Failed => write!(f, "-1"),
            JobNumber::Ids(ids) => write!(f, "{}", ids.join(",")),
        }
    }
}

impl FromStr for JobNumber {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<JobNumber> {
        let s = s.trim();
        if s == "-1" {
            return Ok(JobNumber::Failed);
        }
        let ids: Vec<String> = s.split(',').map(|id| id.trim().to_string()).collect();
        if ids.iter().any(|id| id.is_empty()) {
            return Err(ClientError::JobNumber(s.to_string()));
        }
        Ok(JobNumber::Ids(ids))
    }
}

/// A result file of a finished job
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputFile {
    pub name: String,
    pub url: Url,
}

/// A connected client for one analysis server
pub enum Engine<'a, T: Transport> {
    GenePattern(GenePatternClient<'a, T>),
    Galaxy(GalaxyClient<'a, T>),
}

impl<'a, T: Transport> Engine<'a, T> {
    /// Connect to a server
    ///
    /// GenePattern sends basic auth with every request. Galaxy exchanges the credentials for an
    /// API key once.
    pub async fn connect(
        transport: &'a T,
        server: &ServerConfig,
        credentials: Credentials,
    ) -> Result<Engine<'a, T>> {
        info!("Connecting to {} server {} at {}", server.platform, server.name, server.url);
        match server.platform {
            Platform::GenePattern => Ok(Engine::GenePattern(GenePatternClient::new(
                transport,
                server.url.clone(),
                credentials,
            ))),
            Platform::Galaxy => Ok(Engine::Galaxy(
                GalaxyClient::authenticate(transport, server.url.clone(), &credentials).await?,
            )),
        }
    }

    pub fn platform(&self) -> Platform {
        match self {
            Engine::GenePattern(_) => Platform::GenePattern,
            Engine::Galaxy(_) => Platform::Galaxy,
        }
    }

    pub async fn submit(
        &self,
        module: &ModuleConfig,
        request: &AnalysisRequest,
    ) -> Result<JobNumber> {
        match self {
            Engine::GenePattern(client) => {
                let id = client.submit_analysis(module, request).await?;
                Ok(JobNumber::single(id))
            }
            Engine::Galaxy(client) => {
                let ids = client.submit_analysis(module, request).await?;
                Ok(JobNumber::Ids(ids))
            }
        }
    }

    pub async fn status(&self, module: &ModuleConfig, job: &JobNumber) -> Result<AnalysisStatus> {
        if job.is_failed() {
            return Ok(AnalysisStatus::Error);
        }
        let marker = module.report_marker(self.platform());
        let mut statuses = Vec::new();
        for id in job.ids() {
            let status = match self {
                Engine::GenePattern(client) => client.job_status(id, marker).await?,
                Engine::Galaxy(client) => client.invocation_status(id, marker).await?,
            };
            statuses.push(status);
        }
        Ok(combine(&statuses))
    }

    pub async fn outputs(&self, job: &JobNumber) -> Result<Vec<OutputFile>> {
        let ids = job.ids();
        let mut outputs = Vec::new();
        for (n, id) in ids.iter().enumerate() {
            let files = match self {
                Engine::GenePattern(client) => client.outputs(id).await?,
                Engine::Galaxy(client) => client.outputs(id).await?,
            };
            for mut file in files {
                if ids.len() > 1 {
                    file.name = format!("{}-{}", n + 1, file.name);
                }
                outputs.push(file);
            }
        }
        Ok(outputs)
    }

    pub async fn download(&self, output: &OutputFile) -> Result<Vec<u8>> {
        match self {
            Engine::GenePattern(client) => client.download(&output.url).await,
            Engine::Galaxy(client) => client.download(&output.url).await,
        }
    }
}

/// Status of a fanned-out analysis from the status of each remote job
///
/// Any error wins, then anything still running. The analysis is only done once every job is,
/// and lacks a report if any job does.
pub fn combine(statuses: &[AnalysisStatus]) -> AnalysisStatus {
    if statuses.is_empty() {
        return AnalysisStatus::Pending;
    }
    if statuses.contains(&AnalysisStatus::Error) {
        AnalysisStatus::Error
    } else if statuses.iter().any(|s| !s.is_done()) {
        AnalysisStatus::Pending
    } else if statuses.contains(&AnalysisStatus::DoneNoReport) {
        AnalysisStatus::DoneNoReport
    } else {
        AnalysisStatus::Done
    }
}

pub(crate) async fn read_input(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path).await.map_err(|source| ClientError::Io {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use crate::transport::Method;

    #[test]
    fn test_job_number_text_form() {
        assert_eq!("-1".parse::<JobNumber>().unwrap(), JobNumber::Failed);
        assert_eq!("123".parse::<JobNumber>().unwrap(), JobNumber::single("123"));
        let fanned: JobNumber = "a1, b2".parse().unwrap();
        assert_eq!(fanned.ids(), ["a1", "b2"]);
        assert_eq!(fanned.to_string(), "a1,b2");
        assert!("a1,,b2".parse::<JobNumber>().is_err());
        assert!("".parse::<JobNumber>().is_err());
    }

    #[test]
    fn test_combine() {
        use AnalysisStatus::*;
        assert_eq!(combine(&[Done, Done]), Done);
        assert_eq!(combine(&[Done, DoneNoReport]), DoneNoReport);
        assert_eq!(combine(&[Done, Pending]), Pending);
        assert_eq!(combine(&[Pending, Error]), Error);
        assert_eq!(combine(&[]), Pending);
    }

    #[tokio::test]
    async fn test_fanned_out_galaxy_analysis() {
        let transport = MockTransport::new()
            .on(Method::Get, "/api/authenticate/baseauth", 200, r#"{"api_key": "KEY"}"#)
            .on(Method::Get, "/api/invocations/inv1", 200, r#"{"id": "inv1", "state": "scheduled",
                "outputs": {"report": {"id": "o1"}, "table": {"id": "o2"}}}"#)
            .on(Method::Get, "/api/invocations/inv2", 200, r#"{"id": "inv2", "state": "scheduled",
                "outputs": {"table": {"id": "o3"}}}"#);
        let base = Url::parse("https://galaxy.example.org/").unwrap();
        let credentials = Credentials { username: "flowgate".to_string(), password: "pw".to_string() };
        let engine = Engine::Galaxy(GalaxyClient::authenticate(&transport, base, &credentials).await.unwrap());
        let module = ModuleConfig {
            name: "gating".to_string(),
            server: "galaxy".to_string(),
            invocation: "wf1".to_string(),
            report: None,
            params: Vec::new(),
        };
        let job: JobNumber = "inv1,inv2".parse().unwrap();

        // the second file produced no report
        assert_eq!(engine.status(&module, &job).await.unwrap(), AnalysisStatus::DoneNoReport);

        let outputs = engine.outputs(&job).await.unwrap();
        let names: Vec<&str> = outputs.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["1-report", "1-table", "2-table"]);
        assert_eq!(outputs[2].url.as_str(), "https://galaxy.example.org/api/datasets/o3/display");

        let single = engine.outputs(&JobNumber::single("inv2")).await.unwrap();
        assert_eq!(single[0].name, "table");
    }
}
