//! Log-view configuration
//!
//! A single immutable `LogViewConfig` is constructed once at startup and
//! passed by reference into the components that need it. It replaces the
//! scattered lookup tables of earlier revisions (finish-status set, perf
//! byte-line indexes, metric window bounds) with one explicit value.
//!
//! Supports layered configuration:
//! 1. Defaults (matching the console UI's framing expectations)
//! 2. Builder pattern (runtime customization)
//! 3. Environment variables (deployment)
//!
//! # Environment Variables
//! - `JOBLENS_SYNC_LOG_PROMETHEUS`: re-derive sync perf from the metric
//!   backend instead of the engine dump, true/false (default: false)
//! - `JOBLENS_MAX_QUERY_SPAN_SECS`: window span above which metric queries
//!   are shrunk (default: 28800 = 8h)
//! - `JOBLENS_SHRUNK_QUERY_SPAN_SECS`: shrunk query span (default: 3600 = 1h)

use std::env;
use std::time::Duration;

use super::types::JobStatus;

/// Process-wide configuration for the log-view pipeline.
#[derive(Debug, Clone)]
pub struct LogViewConfig {
    /// Statuses considered terminal; only terminal jobs expose a download link.
    pub finish_statuses: Vec<JobStatus>,

    /// Zero-based perf-block line indexes rendered as byte sizes.
    ///
    /// Positional detection is a compatibility contract with the engine's
    /// perf dump (line 2 = bytes read, line 5 = bytes written); deployments
    /// with a different dump layout re-point these.
    pub byte_counter_lines: Vec<usize>,

    /// Metric query windows at or above this span are shrunk before hitting
    /// the backend, which caps its per-series point resolution.
    pub max_query_span: Duration,

    /// Span of the shrunk query window, anchored at the original end.
    pub shrunk_query_span: Duration,

    /// Number of `==` marker lines separating retry transcripts.
    pub retry_separator_lines: usize,

    /// When true, sync-job perf is queried live from the metric backend
    /// (exec window permitting) instead of taken from the engine dump.
    pub sync_log_prometheus: bool,

    /// Download link template; `{job_id}` and `{task_type}` are substituted.
    pub download_log_template: String,
}

impl LogViewConfig {
    /// Load configuration from environment variables with fallback to defaults.
    pub fn from_env() -> Self {
        let sync_log_prometheus = env::var("JOBLENS_SYNC_LOG_PROMETHEUS")
            .ok()
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false);

        let max_span_secs = env::var("JOBLENS_MAX_QUERY_SPAN_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8 * 3600);

        let shrunk_span_secs = env::var("JOBLENS_SHRUNK_QUERY_SPAN_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3600);

        Self::default()
            .with_sync_log_prometheus(sync_log_prometheus)
            .with_query_spans(
                Duration::from_secs(max_span_secs),
                Duration::from_secs(shrunk_span_secs),
            )
    }

    /// Toggle live perf derivation for sync jobs.
    pub fn with_sync_log_prometheus(mut self, enabled: bool) -> Self {
        self.sync_log_prometheus = enabled;
        self
    }

    /// Set the window-shrink bounds for metric queries.
    pub fn with_query_spans(mut self, max: Duration, shrunk: Duration) -> Self {
        self.max_query_span = max;
        self.shrunk_query_span = shrunk;
        self
    }

    /// Re-point the byte-size perf lines.
    pub fn with_byte_counter_lines(mut self, lines: Vec<usize>) -> Self {
        self.byte_counter_lines = lines;
        self
    }

    /// Override the download link template.
    pub fn with_download_template(mut self, template: impl Into<String>) -> Self {
        self.download_log_template = template.into();
        self
    }

    /// True when the status counts as terminal.
    pub fn is_finished(&self, status: JobStatus) -> bool {
        self.finish_statuses.contains(&status)
    }

    /// Get a summary of the configuration for logging.
    pub fn summary(&self) -> String {
        format!(
            "LogView configuration: byte_lines={:?}, max_span={}s, shrunk_span={}s, separator_lines={}, sync_log_prometheus={}",
            self.byte_counter_lines,
            self.max_query_span.as_secs(),
            self.shrunk_query_span.as_secs(),
            self.retry_separator_lines,
            self.sync_log_prometheus,
        )
    }
}

impl Default for LogViewConfig {
    fn default() -> Self {
        Self {
            finish_statuses: vec![JobStatus::Finished, JobStatus::Failed],
            byte_counter_lines: vec![2, 5],
            max_query_span: Duration::from_secs(8 * 3600),
            shrunk_query_span: Duration::from_secs(3600),
            retry_separator_lines: 10,
            sync_log_prometheus: false,
            download_log_template:
                "/api/download/batch/downloadJobLog?jobId={job_id}&taskType={task_type}"
                    .to_string(),
        }
    }
}
