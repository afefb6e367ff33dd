use std::fmt;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

/// Status of an analysis, stored as an integer code
///
/// | code | status         |
/// | ---- | -------------- |
/// | 1    | init           |
/// | 2    | pending        |
/// | 3    | done           |
/// | 4    | done-no-report |
/// | -1   | error          |
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AnalysisStatus {
    Init,
    Pending,
    Done,
    DoneNoReport,
    Error,
}

impl AnalysisStatus {
    pub fn code(&self) -> i64 {
        match self {
            AnalysisStatus::Init => 1,
            AnalysisStatus::Pending => 2,
            AnalysisStatus::Done => 3,
            AnalysisStatus::DoneNoReport => 4,
            AnalysisStatus::Error => -1,
        }
    }

    pub fn from_code(code: i64) -> Option<AnalysisStatus> {
        match code {
            1 => Some(AnalysisStatus::Init),
            2 => Some(AnalysisStatus::Pending),
            3 => Some(AnalysisStatus::Done),
            4 => Some(AnalysisStatus::DoneNoReport),
            -1 => Some(AnalysisStatus::Error),
            _ => None,
        }
    }

    /// Finished analyses are never polled again
    pub fn is_finished(&self) -> bool {
        matches!(self, AnalysisStatus::Done | AnalysisStatus::DoneNoReport | AnalysisStatus::Error)
    }

    pub fn is_done(&self) -> bool {
        matches!(self, AnalysisStatus::Done | AnalysisStatus::DoneNoReport)
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AnalysisStatus::Init => write!(f, "init"),
            AnalysisStatus::Pending => write!(f, "pending"),
            AnalysisStatus::Done => write!(f, "done"),
            AnalysisStatus::DoneNoReport => write!(f, "done-no-report"),
            AnalysisStatus::Error => write!(f, "error"),
        }
    }
}

impl ToSql for AnalysisStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for AnalysisStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let code = value.as_i64()?;
        AnalysisStatus::from_code(code).ok_or(FromSqlError::OutOfRange(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        for status in [
            AnalysisStatus::Init,
            AnalysisStatus::Pending,
            AnalysisStatus::Done,
            AnalysisStatus::DoneNoReport,
            AnalysisStatus::Error,
        ] {
            assert_eq!(AnalysisStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(AnalysisStatus::from_code(0), None);
        assert_eq!(AnalysisStatus::Error.code(), -1);
    }

    #[test]
    fn test_finished() {
        assert!(!AnalysisStatus::Pending.is_finished());
        assert!(AnalysisStatus::DoneNoReport.is_finished());
        assert!(AnalysisStatus::Error.is_finished());
        assert!(!AnalysisStatus::Error.is_done());
    }
}
