//! # joblens
//!
//! Log normalization and timestamp-resolution engine for batch job execution
//! logs. Merges the heterogeneous fragments an external scheduling/execution
//! engine produces for one job — scheduler status, engine stdout/stderr,
//! retry history, performance counters — into a single coherent,
//! human-readable record for a console UI and downstream diagnostics.
//!
//! ## What lives here
//!
//! - **Timestamp resolution**: incremental-sync watermarks arrive as bare
//!   integers of unknown precision (seconds / millis / micros / nanos);
//!   digit count disambiguates and every resolved value renders as a fixed
//!   29-character canonical timestamp.
//! - **Perf counter formatting**: raw tab-separated counter blocks rewritten
//!   with byte-size units and thousands separators.
//! - **Retry transcripts**: multi-attempt retry history framed with the
//!   exact border tokens the console UI scrapes.
//! - **Record merging**: job-type aware assembly of the final record, with
//!   explicit degradation policies for malformed payloads and an
//!   unavailable metrics backend.
//!
//! Persistence, HTTP, authentication and the metrics backend itself stay
//! behind the narrow collaborator traits in [`joblens::source`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use joblens::{AttemptSelector, LogViewBuilder, LogViewConfig};
//! use std::sync::Arc;
//!
//! let builder = LogViewBuilder::new(
//!     scheduler,          // Arc<dyn SchedulerStore>
//!     engine,             // Arc<dyn EngineLogSource>
//!     metrics,            // Arc<dyn MetricBackend>
//!     params,             // Arc<dyn ParamSubstituter>
//!     Arc::new(LogViewConfig::from_env()),
//! );
//!
//! let record = builder
//!     .build_job_log_view("job-20210101-0001", AttemptSelector::Latest)
//!     .await?;
//! println!("{}", record.log_info);
//! ```

pub mod joblens;

// Re-export the main API at the crate root for easy access
pub use joblens::config::LogViewConfig;
pub use joblens::error::{LogViewError, LogViewResult};
pub use joblens::merge::LogViewBuilder;
pub use joblens::metrics::{
    DirtyDataCounts, METRICS_UNAVAILABLE_MARKER, MetricName, MetricSample, MetricSampleCollector,
    PerfSummary,
};
pub use joblens::retry::{AttemptSelector, RetryTranscript};
pub use joblens::source::{
    EngineLogSource, IdentitySubstituter, MetricBackend, ParamSubstituter, SchedulerStore,
    SourceResult,
};
pub use joblens::sync_info::{SyncInfo, SyncJobConfig};
pub use joblens::timestamp::{CANONICAL_WIDTH, ResolvedWatermark, format_watermark, resolve};
pub use joblens::types::{
    ActionLog, ComputeType, JobLogRecord, JobRun, JobStatus, JobType, RetryAttempt, ScheduleKind,
    SyncExecSummary, TaskMetadata, TimeWindow, VersionedSql,
};
