//! Analysis loading, updating and status tracking
//!
//! Takes care of deserialising stored request manifests into an [`Analysis`], and of recording
//! the external job number and status code once an analysis is submitted or polled.

use crate::db::analysis::status::AnalysisStatus;
use crate::engine::JobNumber;
use crate::request::message::AnalysisRequest;

pub mod load;
pub mod status;
pub mod update;

/// A stored analysis request and what the remote server last said about it
#[derive(Debug, Clone)]
pub struct Analysis {
    pub id: i64,
    pub request: AnalysisRequest,
    pub job_number: Option<JobNumber>,
    pub status: AnalysisStatus,
    pub status_message: Option<String>,
    pub updated: Option<String>,
}
