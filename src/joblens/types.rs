//! Core data model for the log-view pipeline
//!
//! Everything here is transient: each value is built for a single job-log
//! lookup and dropped with the response. Nothing is cached or mutated in the
//! background.

use serde::{Deserialize, Serialize};

/// Scheduler-side status of a job run.
///
/// Codes follow the scheduler's wire values; anything we do not model keeps
/// its raw code in `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Unsubmitted,
    Running,
    Finished,
    Canceling,
    Canceled,
    Failed,
    Submitting,
    Restarting,
    Killed,
    Other(i32),
}

impl JobStatus {
    pub fn as_code(&self) -> i32 {
        match self {
            Self::Unsubmitted => 0,
            Self::Running => 4,
            Self::Finished => 5,
            Self::Canceling => 6,
            Self::Canceled => 7,
            Self::Failed => 8,
            Self::Submitting => 10,
            Self::Restarting => 11,
            Self::Killed => 13,
            Self::Other(code) => *code,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Unsubmitted,
            4 => Self::Running,
            5 => Self::Finished,
            6 => Self::Canceling,
            7 => Self::Canceled,
            8 => Self::Failed,
            10 => Self::Submitting,
            11 => Self::Restarting,
            13 => Self::Killed,
            other => Self::Other(other),
        }
    }
}

/// Declared type of a task, grouped the way the merge pipeline branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobType {
    SparkSql,
    LibraSql,
    OracleSql,
    TidbSql,
    ImpalaSql,
    DataSync,
    Virtual,
    Workflow,
    AlgorithmLab,
    Other(i32),
}

impl JobType {
    pub fn as_code(&self) -> i32 {
        match self {
            Self::Virtual => -1,
            Self::SparkSql => 0,
            Self::DataSync => 3,
            Self::Workflow => 10,
            Self::AlgorithmLab => 12,
            Self::LibraSql => 13,
            Self::TidbSql => 24,
            Self::OracleSql => 25,
            Self::ImpalaSql => 29,
            Self::Other(code) => *code,
        }
    }

    /// SQL-family tasks get their rendered SQL attached to the record.
    pub fn is_sql_family(&self) -> bool {
        matches!(
            self,
            Self::SparkSql | Self::LibraSql | Self::OracleSql | Self::TidbSql | Self::ImpalaSql
        )
    }

    /// Task types whose logs are never served as a download link.
    pub fn download_excluded(&self) -> bool {
        matches!(
            self,
            Self::DataSync | Self::Virtual | Self::Workflow | Self::AlgorithmLab
        )
    }
}

/// Batch vs stream compute, as declared by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComputeType {
    Stream,
    Batch,
}

impl ComputeType {
    pub fn as_code(&self) -> i32 {
        match self {
            Self::Stream => 0,
            Self::Batch => 1,
        }
    }
}

/// How a run was scheduled. Backfill runs carry no increment marker because
/// their watermarks do not advance the sync position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleKind {
    Normal,
    Backfill,
}

/// One run of a job as seen by the scheduler.
#[derive(Debug, Clone)]
pub struct JobRun {
    pub job_id: String,
    pub task_id: i64,
    pub tenant_id: i64,
    pub status: JobStatus,
    pub schedule_kind: ScheduleKind,
    /// Version of the task definition pinned at submit time, if any.
    pub version_id: Option<i64>,
    /// Cycle time token handed to parameter substitution.
    pub cycle_time: Option<String>,
    /// Execution window in epoch millis; absent until the engine reports it.
    pub exec_start_ms: Option<i64>,
    pub exec_end_ms: Option<i64>,
}

/// Task definition metadata needed to interpret a run's logs.
#[derive(Debug, Clone)]
pub struct TaskMetadata {
    pub task_id: i64,
    pub name: String,
    pub task_type: JobType,
    pub compute_type: ComputeType,
    /// SQL text, or the (possibly base64-wrapped) sync job config JSON.
    pub sql_text: String,
}

/// SQL text of a pinned task version.
#[derive(Debug, Clone, Default)]
pub struct VersionedSql {
    pub origin_sql: Option<String>,
    pub sql_text: Option<String>,
}

impl VersionedSql {
    /// The text that replaces the live task SQL: the original source when
    /// present, otherwise the stored (compiled) text, otherwise `{}`.
    pub fn effective_sql(&self) -> String {
        if let Some(origin) = &self.origin_sql {
            if !origin.is_empty() {
                return origin.clone();
            }
        }
        if let Some(text) = &self.sql_text {
            if !text.is_empty() {
                return text.clone();
            }
        }
        "{}".to_string()
    }
}

/// Raw log pair returned by the engine for one job.
#[derive(Debug, Clone, Default)]
pub struct ActionLog {
    /// Structured status log, normally JSON.
    pub log_info: Option<String>,
    /// Engine stdout/stderr dump, normally JSON but may be free text.
    pub engine_log: Option<String>,
}

/// One retry attempt, ordered by attempt number (1-based).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryAttempt {
    pub attempt: u32,
    pub log_info: String,
    pub engine_log: String,
    pub retry_task_params: String,
}

/// Half-open time window `[start, end)` in epoch milliseconds.
///
/// Invariant: `end_ms >= start_ms`; a caller-supplied inverted window is
/// treated as zero-span by consumers rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl TimeWindow {
    pub fn new(start_ms: i64, end_ms: i64) -> Self {
        Self { start_ms, end_ms }
    }

    pub fn span_ms(&self) -> i64 {
        (self.end_ms - self.start_ms).max(0)
    }
}

/// The final normalized record handed back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct JobLogRecord {
    pub name: String,
    pub task_type: JobType,
    pub compute_type: ComputeType,
    pub status: JobStatus,
    /// Normalized log body, rendered as a JSON key/value block.
    pub log_info: String,
    /// Total retry attempt count, when the job has retries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<usize>,
    /// Download link, only for terminal non-excluded task types.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    /// Parsed read/write summary, only for data-sync jobs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_exec: Option<SyncExecSummary>,
}

/// Read/write/dirty summary parsed back out of a readable perf block.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncExecSummary {
    pub read_num: i64,
    pub write_num: i64,
    pub dirty_percent: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exec_time_secs: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_round_trip() {
        for code in [0, 4, 5, 6, 7, 8, 10, 11, 13, 42] {
            assert_eq!(JobStatus::from_code(code).as_code(), code);
        }
    }

    #[test]
    fn test_sql_family() {
        assert!(JobType::SparkSql.is_sql_family());
        assert!(JobType::ImpalaSql.is_sql_family());
        assert!(!JobType::DataSync.is_sql_family());
        assert!(!JobType::Virtual.is_sql_family());
    }

    #[test]
    fn test_download_exclusions() {
        assert!(JobType::DataSync.download_excluded());
        assert!(JobType::Workflow.download_excluded());
        assert!(JobType::AlgorithmLab.download_excluded());
        assert!(!JobType::SparkSql.download_excluded());
    }

    #[test]
    fn test_versioned_sql_preference() {
        let v = VersionedSql {
            origin_sql: Some("select 1".into()),
            sql_text: Some("compiled".into()),
        };
        assert_eq!(v.effective_sql(), "select 1");

        let v = VersionedSql {
            origin_sql: Some(String::new()),
            sql_text: Some("compiled".into()),
        };
        assert_eq!(v.effective_sql(), "compiled");

        let v = VersionedSql::default();
        assert_eq!(v.effective_sql(), "{}");
    }

    #[test]
    fn test_window_span_never_negative() {
        assert_eq!(TimeWindow::new(100, 50).span_ms(), 0);
        assert_eq!(TimeWindow::new(50, 100).span_ms(), 50);
    }
}
