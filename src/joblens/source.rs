//! Collaborator abstraction traits
//!
//! The log-view pipeline is a pure read/format layer: everything it consumes
//! (scheduler state, engine logs, retry history, metric samples, parameter
//! templating) comes through these narrow traits. Implementations live with
//! the HTTP/persistence layers and are expected to bound their own calls
//! with their own timeouts; this layer adds no retries and no timeout of
//! its own.

use async_trait::async_trait;
use std::error::Error;

use super::metrics::MetricName;
use super::types::{ActionLog, JobRun, RetryAttempt, TaskMetadata, TimeWindow, VersionedSql};

/// Result type for collaborator calls.
pub type SourceResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// Scheduler-side lookups: runs, task definitions, pinned versions.
#[async_trait]
pub trait SchedulerStore: Send + Sync {
    /// Fetch one run by job id; `None` when the scheduler has no such job.
    async fn fetch_job(&self, job_id: &str) -> SourceResult<Option<JobRun>>;

    /// Fetch the task definition a run points at.
    async fn fetch_task_metadata(&self, task_id: i64) -> SourceResult<Option<TaskMetadata>>;

    /// Fetch the SQL text pinned by a task version.
    async fn fetch_versioned_sql(&self, version_id: i64) -> SourceResult<Option<VersionedSql>>;
}

/// Engine-side log access.
#[async_trait]
pub trait EngineLogSource: Send + Sync {
    /// Raw status/engine log pair for one job.
    async fn fetch_log(&self, job_id: &str) -> SourceResult<ActionLog>;

    /// The engine's own series id for the job (used as the metric series),
    /// `None` when the engine never registered the job.
    async fn fetch_engine_series_id(&self, job_id: &str) -> SourceResult<Option<String>>;

    /// Retry history, ordered by attempt number; empty when never retried.
    async fn fetch_retry_attempts(&self, job_id: &str) -> SourceResult<Vec<RetryAttempt>>;
}

/// Time-series metric backend (Prometheus or compatible) behind a narrow
/// query interface. The backend owns endpoint discovery per tenant.
#[async_trait]
pub trait MetricBackend: Send + Sync {
    /// Query one metric over a window; `None` when the series has no sample.
    async fn query(
        &self,
        metric: MetricName,
        series_id: &str,
        window: TimeWindow,
        tenant_id: i64,
    ) -> SourceResult<Option<f64>>;

    /// Whether the backend is configured for this tenant at all. When false,
    /// metric-driven sections degrade to an explicit unavailable marker.
    async fn is_configured(&self, tenant_id: i64) -> bool;
}

/// Parameter templating: replaces `${...}` style tokens against the run's
/// cycle time. Comment handling is the caller's job; the substituter only
/// ever sees non-comment text.
pub trait ParamSubstituter: Send + Sync {
    fn substitute(&self, text: &str, cycle_time: Option<&str>) -> String;
}

/// No-op substituter for deployments without parameter templating.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentitySubstituter;

impl ParamSubstituter for IdentitySubstituter {
    fn substitute(&self, text: &str, _cycle_time: Option<&str>) -> String {
        text.to_string()
    }
}
