use chrono::Utc;
use log::info;
use rusqlite::Connection;

use crate::db::analysis::status::AnalysisStatus;
use crate::db::analysis::Analysis;
use crate::engine::JobNumber;

impl Analysis {
    /// Record the remote job number of a freshly submitted analysis
    pub fn set_submitted(&mut self, conn: &Connection, job_number: JobNumber) -> rusqlite::Result<()> {
        info!("Updating analysis {} with job number {job_number}", self.id);
        self.write(conn, Some(&job_number), AnalysisStatus::Pending, None)?;
        self.job_number = Some(job_number);
        self.status = AnalysisStatus::Pending;
        Ok(())
    }

    /// Submission failed, the analysis gets the `-1` job number sentinel
    pub fn set_failed(&mut self, conn: &Connection, message: &str) -> rusqlite::Result<()> {
        info!("Marking analysis {} as failed: {message}", self.id);
        self.write(conn, Some(&JobNumber::Failed), AnalysisStatus::Error, Some(message))?;
        self.job_number = Some(JobNumber::Failed);
        self.status = AnalysisStatus::Error;
        self.status_message = Some(message.to_string());
        Ok(())
    }

    pub fn set_status(
        &mut self,
        conn: &Connection,
        status: AnalysisStatus,
        message: Option<&str>,
    ) -> rusqlite::Result<()> {
        info!("Updating analysis {} with status {status}", self.id);
        let job_number = self.job_number.clone();
        self.write(conn, job_number.as_ref(), status, message)?;
        self.status = status;
        self.status_message = message.map(str::to_string);
        Ok(())
    }

    fn write(
        &mut self,
        conn: &Connection,
        job_number: Option<&JobNumber>,
        status: AnalysisStatus,
        message: Option<&str>,
    ) -> rusqlite::Result<()> {
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE analysis SET job_number = ?1, analysis_status = ?2, status_message = ?3, updated = ?4 \
             WHERE id = ?5",
            (job_number.map(|j| j.to_string()), status, message, &now, self.id),
        )?;
        self.updated = Some(now);
        Ok(())
    }
}
