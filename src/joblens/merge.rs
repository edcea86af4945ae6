//! Log record merging — the pipeline orchestrator
//!
//! `LogViewBuilder` owns the collaborator handles and the process-wide
//! config, and assembles one [`JobLogRecord`] per request: scheduler status,
//! engine log, retry transcript, incremental-sync positions and metric
//! samples all merged into a single normalized view. Requests share nothing;
//! every record is built from scratch and dropped with the response.

use log::{error, info, warn};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;

use super::config::LogViewConfig;
use super::error::{LogViewError, LogViewResult};
use super::metrics::{
    DirtyDataCounts, METRICS_UNAVAILABLE_MARKER, MetricName, MetricSampleCollector, PerfSummary,
};
use super::perf::{format_perf_block, parse_exec_summary};
use super::retry::{AttemptSelector, RetryTranscript, render_transcript};
use super::source::{EngineLogSource, MetricBackend, ParamSubstituter, SchedulerStore};
use super::sync_info::{SyncInfo, SyncJobConfig, build_sync_info, decode_sync_config, mask_passwords};
use super::types::{
    JobLogRecord, JobRun, JobStatus, JobType, ScheduleKind, SyncExecSummary, TaskMetadata,
    TimeWindow,
};

/// Internal accounting field the scheduler reads from the engine dump; it
/// must never reach the UI.
const COUNT_INFO_FIELD: &str = "countInfo";

/// Typed shape of the normalized sync-job log body.
#[derive(Debug, Default, Serialize)]
struct SyncLogInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    jobid: Option<Value>,
    msg_info: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    truncated: Option<Value>,
    #[serde(rename = "ruleLogList", skip_serializing_if = "Option::is_none")]
    rule_logs: Option<Value>,
    perf: String,
    #[serde(rename = "increInfo", skip_serializing_if = "Option::is_none")]
    incre_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sql: Option<Value>,
    #[serde(rename = "all-exceptions")]
    all_exceptions: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<Value>,
}

/// Assembles normalized job log views from the collaborator set.
#[derive(Clone)]
pub struct LogViewBuilder {
    scheduler: Arc<dyn SchedulerStore>,
    engine: Arc<dyn EngineLogSource>,
    metrics: Arc<dyn MetricBackend>,
    params: Arc<dyn ParamSubstituter>,
    config: Arc<LogViewConfig>,
}

impl LogViewBuilder {
    pub fn new(
        scheduler: Arc<dyn SchedulerStore>,
        engine: Arc<dyn EngineLogSource>,
        metrics: Arc<dyn MetricBackend>,
        params: Arc<dyn ParamSubstituter>,
        config: Arc<LogViewConfig>,
    ) -> Self {
        Self {
            scheduler,
            engine,
            metrics,
            params,
            config,
        }
    }

    /// Primary entry point: the unified log view for one job.
    pub async fn build_job_log_view(
        &self,
        job_id: &str,
        selector: AttemptSelector,
    ) -> LogViewResult<JobLogRecord> {
        let job = self
            .scheduler
            .fetch_job(job_id)
            .await
            .map_err(|e| LogViewError::collaborator("job lookup", e))?
            .ok_or_else(|| {
                info!("can not find job by id: {}", job_id);
                LogViewError::JobNotFound {
                    job_id: job_id.to_string(),
                }
            })?;

        let task = self
            .scheduler
            .fetch_task_metadata(job.task_id)
            .await
            .map_err(|e| LogViewError::collaborator("task lookup", e))?
            .ok_or_else(|| {
                info!("can not find task metadata for job: {}", job_id);
                LogViewError::TaskNotFound {
                    job_id: job_id.to_string(),
                    task_id: job.task_id,
                }
            })?;

        // Independent fetches run concurrently; results merge deterministically.
        let versioned_sql = async {
            match job.version_id {
                Some(version_id) => self.scheduler.fetch_versioned_sql(version_id).await,
                None => Ok(None),
            }
        };
        let (action_log, attempts, versioned) = tokio::join!(
            self.engine.fetch_log(job_id),
            self.engine.fetch_retry_attempts(job_id),
            versioned_sql,
        );
        let action_log = action_log.map_err(|e| LogViewError::collaborator("engine log", e))?;
        let attempts = attempts.map_err(|e| LogViewError::collaborator("retry history", e))?;
        let versioned = versioned.unwrap_or_else(|e| {
            warn!("versioned sql lookup failed for job {}: {}", job_id, e);
            None
        });

        let mut log_body = decode_log_info(job_id, action_log.log_info.as_deref());
        log_body.insert("status".to_string(), json!(job.status.as_code()));

        let sql_text = versioned
            .map(|v| v.effective_sql())
            .unwrap_or_else(|| task.sql_text.clone());

        // Job-type branch: SQL family gets rendered SQL, data sync gets the
        // substituted job config plus the incremental position summary.
        let mut sync_sql_subset = None;
        if task.task_type.is_sql_family() {
            let rendered =
                self.substitute_outside_comments(&sql_text, job.cycle_time.as_deref());
            log_body.insert("sql".to_string(), Value::String(rendered));
        } else if task.task_type == JobType::DataSync {
            sync_sql_subset = self
                .attach_sync_config(job_id, &job, &sql_text, &mut log_body)
                .await;
        }

        self.merge_engine_log(job_id, action_log.engine_log.as_deref(), &mut log_body);

        let transcript =
            render_transcript(job_id, &attempts, selector, self.config.retry_separator_lines)?;
        let page_size = (!attempts.is_empty()).then_some(attempts.len());

        let (log_info, sync_exec) = if task.task_type == JobType::DataSync {
            self.assemble_sync_log(&job, log_body, sync_sql_subset, &transcript)
                .await
        } else {
            (finalize_plain_log(log_body, &transcript), None)
        };

        let download_url = (!task.task_type.download_excluded()
            && self.config.is_finished(job.status))
        .then(|| {
            self.config
                .download_log_template
                .replace("{job_id}", job_id)
                .replace("{task_type}", &task.task_type.as_code().to_string())
        });

        Ok(JobLogRecord {
            name: task.name.clone(),
            task_type: task.task_type,
            compute_type: task.compute_type,
            status: job.status,
            log_info,
            page_size,
            download_url,
            sync_exec,
        })
    }

    /// Readable perf counter text for one sync run.
    pub async fn build_perf_summary(
        &self,
        job_id: &str,
        task_id: i64,
        window: TimeWindow,
        tenant_id: i64,
    ) -> LogViewResult<String> {
        self.require_task(job_id, task_id).await?;
        let Some(series_id) = self
            .engine
            .fetch_engine_series_id(job_id)
            .await
            .map_err(|e| LogViewError::collaborator("engine series id", e))?
        else {
            return Ok(METRICS_UNAVAILABLE_MARKER.to_string());
        };

        let collector = MetricSampleCollector::new(self.metrics.as_ref(), &self.config);
        match collector
            .collect(&MetricName::PERF, &series_id, window, tenant_id)
            .await
        {
            Ok(samples) => Ok(PerfSummary::from_samples(&samples).readable_block(&self.config)),
            Err(LogViewError::UpstreamUnavailable { reason }) => {
                info!("perf summary degraded for job {}: {}", job_id, reason);
                Ok(METRICS_UNAVAILABLE_MARKER.to_string())
            }
            Err(e) => Err(e),
        }
    }

    /// Dirty-data error breakdown for one sync run.
    pub async fn build_dirty_data_counts(
        &self,
        job_id: &str,
        task_id: i64,
        window: TimeWindow,
        tenant_id: i64,
    ) -> LogViewResult<DirtyDataCounts> {
        self.require_task(job_id, task_id).await?;
        let Some(series_id) = self
            .engine
            .fetch_engine_series_id(job_id)
            .await
            .map_err(|e| LogViewError::collaborator("engine series id", e))?
        else {
            return Ok(DirtyDataCounts::default());
        };

        let collector = MetricSampleCollector::new(self.metrics.as_ref(), &self.config);
        match collector
            .collect(&MetricName::DIRTY, &series_id, window, tenant_id)
            .await
        {
            Ok(samples) => Ok(DirtyDataCounts::from_samples(&samples)),
            Err(LogViewError::UpstreamUnavailable { reason }) => {
                info!("dirty-data counts degraded for job {}: {}", job_id, reason);
                Ok(DirtyDataCounts::default())
            }
            Err(e) => Err(e),
        }
    }

    async fn require_task(&self, job_id: &str, task_id: i64) -> LogViewResult<TaskMetadata> {
        self.scheduler
            .fetch_task_metadata(task_id)
            .await
            .map_err(|e| LogViewError::collaborator("task lookup", e))?
            .ok_or_else(|| LogViewError::TaskNotFound {
                job_id: job_id.to_string(),
                task_id,
            })
    }

    /// Decode, mask and substitute the sync job config; attach it as `sql`
    /// and, exec window permitting, the incremental position summary as
    /// `increInfo`. Returns the sql subset used by the sync log shape.
    async fn attach_sync_config(
        &self,
        job_id: &str,
        job: &JobRun,
        sql_text: &str,
        log_body: &mut Map<String, Value>,
    ) -> Option<Value> {
        let config = match decode_sync_config(sql_text) {
            Ok(config) => config,
            Err(e) => {
                // Shape mismatch degrades to an opaque passthrough.
                warn!("sync config for job {} not decodable: {}", job_id, e);
                log_body.insert("sql".to_string(), Value::String(sql_text.to_string()));
                return None;
            }
        };

        let mut masked = match serde_json::to_value(&config) {
            Ok(value) => value,
            Err(e) => {
                warn!("sync config for job {} not serializable: {}", job_id, e);
                return None;
            }
        };
        mask_passwords(&mut masked);

        let substituted = self
            .params
            .substitute(&masked.to_string(), job.cycle_time.as_deref());
        let (rendered, effective) = match serde_json::from_str::<Value>(&substituted) {
            Ok(value) => {
                let pretty =
                    serde_json::to_string_pretty(&value).unwrap_or_else(|_| substituted.clone());
                let effective = serde_json::from_value::<SyncJobConfig>(value.clone()).ok();
                (pretty, effective)
            }
            Err(e) => {
                warn!(
                    "substituted sync config for job {} is no longer JSON: {}",
                    job_id, e
                );
                (substituted, None)
            }
        };
        let effective = effective.unwrap_or(config);

        log_body.insert("sql".to_string(), Value::String(rendered));
        let subset = serde_json::to_value(&effective).ok();

        if let (Some(start_ms), Some(end_ms)) = (job.exec_start_ms, job.exec_end_ms) {
            self.attach_incre_info(
                job_id,
                job,
                &effective,
                TimeWindow::new(start_ms, end_ms),
                log_body,
            )
            .await;
        }

        subset
    }

    /// Query start/end location watermarks and fold the sync-info summary in.
    /// Never fails the parent request.
    async fn attach_incre_info(
        &self,
        job_id: &str,
        job: &JobRun,
        config: &SyncJobConfig,
        window: TimeWindow,
        log_body: &mut Map<String, Value>,
    ) {
        // Backfill runs carry no increment marker.
        if job.schedule_kind != ScheduleKind::Normal {
            return;
        }

        let series_id = match self.engine.fetch_engine_series_id(job_id).await {
            Ok(Some(series_id)) if !series_id.is_empty() => series_id,
            Ok(_) => return,
            Err(e) => {
                warn!("engine series id lookup failed for job {}: {}", job_id, e);
                return;
            }
        };

        let collector = MetricSampleCollector::new(self.metrics.as_ref(), &self.config);
        let start = collector
            .query_location(MetricName::StartLocation, &series_id, window, job.tenant_id)
            .await;
        let end = collector
            .query_location(MetricName::EndLocation, &series_id, window, job.tenant_id)
            .await;
        let (start, end) = match (start, end) {
            (Ok(start), Ok(end)) => (start, end),
            (Err(e), _) | (_, Err(e)) => {
                warn!("location metrics unavailable for job {}: {}", job_id, e);
                return;
            }
        };

        match build_sync_info(config, start.as_deref(), end.as_deref()) {
            SyncInfo::Summary(summary) => {
                log_body.insert("increInfo".to_string(), Value::String(summary));
            }
            SyncInfo::Unavailable { reason } => {
                warn!("incremental info unavailable for job {}: {}", job_id, reason);
            }
        }
    }

    /// Fold the engine's raw structured log into the body: perf gets
    /// rewritten human-readable, the accounting-only `countInfo` field is
    /// stripped, and non-JSON dumps pass through as `msg_info`.
    fn merge_engine_log(
        &self,
        job_id: &str,
        engine_log: Option<&str>,
        log_body: &mut Map<String, Value>,
    ) {
        let Some(engine_log) = engine_log.filter(|l| !l.is_empty()) else {
            return;
        };
        match serde_json::from_str::<Map<String, Value>>(engine_log) {
            Ok(mut fields) => {
                let formatted = fields
                    .get("perf")
                    .and_then(Value::as_str)
                    .map(|perf| format_perf_block(perf, &self.config.byte_counter_lines));
                if let Some(formatted) = formatted {
                    fields.insert("perf".to_string(), Value::String(formatted));
                }
                log_body.append(&mut fields);
                log_body.remove(COUNT_INFO_FIELD);
            }
            Err(e) => {
                error!("engine log for job {} is not JSON: {}", job_id, e);
                log_body.insert(
                    "msg_info".to_string(),
                    Value::String(engine_log.to_string()),
                );
            }
        }
    }

    /// Re-assemble the merged body as the typed sync log shape. Any problem
    /// degrades to the merged body as-is.
    async fn assemble_sync_log(
        &self,
        job: &JobRun,
        log_body: Map<String, Value>,
        sql_subset: Option<Value>,
        transcript: &RetryTranscript,
    ) -> (String, Option<SyncExecSummary>) {
        let msg_info = log_body
            .get("msg_info")
            .and_then(Value::as_str)
            .unwrap_or("");

        let perf = self.sync_perf_text(job, &log_body).await;

        let mut all_exceptions = log_body
            .get("root-exception")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        if !all_exceptions.is_empty() && !transcript.text.is_empty() {
            all_exceptions.push_str(&transcript.text);
        }
        if all_exceptions.trim().is_empty() {
            // The engine only sets engineLogErr when it failed to fetch logs;
            // surface it on anything but a clean finish.
            if let Some(engine_err) = log_body.get("engineLogErr").and_then(Value::as_str) {
                if job.status != JobStatus::Finished {
                    all_exceptions = engine_err.to_string();
                }
            }
        }

        let shape = SyncLogInfo {
            jobid: log_body.get("jobid").cloned(),
            msg_info: format!("{}\n{}", msg_info, transcript.text),
            truncated: log_body.get("truncated").cloned(),
            rule_logs: log_body.get("ruleLogList").cloned(),
            perf: perf.clone(),
            incre_info: log_body
                .get("increInfo")
                .and_then(Value::as_str)
                .map(str::to_string),
            sql: sql_subset,
            all_exceptions,
            status: log_body.get("status").cloned(),
        };

        let exec_secs = match (job.exec_start_ms, job.exec_end_ms) {
            (Some(start), Some(end)) if end >= start => Some((end - start) / 1000),
            _ => None,
        };
        let sync_exec = parse_exec_summary(&perf, exec_secs);

        match serde_json::to_string(&shape) {
            Ok(text) => (text, Some(sync_exec)),
            Err(e) => {
                error!("sync log assembly failed for job {}: {}", job.job_id, e);
                (
                    Value::Object(log_body).to_string(),
                    Some(sync_exec),
                )
            }
        }
    }

    /// The perf text of a sync record: re-derived live from the metric
    /// backend when enabled and the exec window is known, otherwise taken
    /// from the (already formatted) engine dump.
    async fn sync_perf_text(&self, job: &JobRun, log_body: &Map<String, Value>) -> String {
        let from_dump = log_body
            .get("perf")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        if !self.config.sync_log_prometheus {
            return from_dump;
        }
        let (Some(start_ms), Some(end_ms)) = (job.exec_start_ms, job.exec_end_ms) else {
            return from_dump;
        };

        let series_id = match self.engine.fetch_engine_series_id(&job.job_id).await {
            Ok(Some(series_id)) if !series_id.is_empty() => series_id,
            Ok(_) => return from_dump,
            Err(e) => {
                warn!(
                    "engine series id lookup failed for job {}: {}",
                    job.job_id, e
                );
                return from_dump;
            }
        };

        let collector = MetricSampleCollector::new(self.metrics.as_ref(), &self.config);
        match collector
            .collect(
                &MetricName::PERF,
                &series_id,
                TimeWindow::new(start_ms, end_ms),
                job.tenant_id,
            )
            .await
        {
            Ok(samples) => PerfSummary::from_samples(&samples).readable_block(&self.config),
            Err(LogViewError::UpstreamUnavailable { reason }) => {
                info!("live perf degraded for job {}: {}", job.job_id, reason);
                METRICS_UNAVAILABLE_MARKER.to_string()
            }
            Err(e) => {
                warn!("live perf query failed for job {}: {}", job.job_id, e);
                from_dump
            }
        }
    }

    /// Substitute parameters in SQL text while leaving `--` line comments and
    /// `/* */` block comments byte-for-byte untouched. Quoted strings are
    /// substituted like code but shield comment markers inside them.
    fn substitute_outside_comments(&self, sql: &str, cycle_time: Option<&str>) -> String {
        #[derive(Clone, Copy, PartialEq)]
        enum Mode {
            Code,
            SingleQuote,
            DoubleQuote,
            LineComment,
            BlockComment,
        }

        let mut out = String::with_capacity(sql.len());
        let mut segment = String::new();
        let mut mode = Mode::Code;
        let mut block_start = 0;
        let mut chars = sql.chars().peekable();

        while let Some(ch) = chars.next() {
            match mode {
                Mode::Code | Mode::SingleQuote | Mode::DoubleQuote => {
                    if mode == Mode::Code && ch == '-' && chars.peek() == Some(&'-') {
                        out.push_str(&self.params.substitute(&segment, cycle_time));
                        segment.clear();
                        out.push(ch);
                        mode = Mode::LineComment;
                    } else if mode == Mode::Code && ch == '/' && chars.peek() == Some(&'*') {
                        out.push_str(&self.params.substitute(&segment, cycle_time));
                        segment.clear();
                        out.push(ch);
                        block_start = out.len();
                        mode = Mode::BlockComment;
                    } else {
                        segment.push(ch);
                        mode = match (mode, ch) {
                            (Mode::Code, '\'') => Mode::SingleQuote,
                            (Mode::Code, '"') => Mode::DoubleQuote,
                            (Mode::SingleQuote, '\'') => Mode::Code,
                            (Mode::DoubleQuote, '"') => Mode::Code,
                            (m, _) => m,
                        };
                    }
                }
                Mode::LineComment => {
                    out.push(ch);
                    if ch == '\n' {
                        mode = Mode::Code;
                    }
                }
                Mode::BlockComment => {
                    out.push(ch);
                    // The opener's `*` sits at `block_start`; a close needs a
                    // `*` consumed after it, so `/*/` stays inside the comment.
                    if ch == '/' && out.ends_with("*/") && out.len() >= block_start + 3 {
                        mode = Mode::Code;
                    }
                }
            }
        }
        if !segment.is_empty() {
            out.push_str(&self.params.substitute(&segment, cycle_time));
        }
        out
    }
}

/// Parse the engine's structured status log; non-JSON text degrades to a
/// `msg_info` passthrough.
fn decode_log_info(job_id: &str, log_info: Option<&str>) -> Map<String, Value> {
    let Some(raw) = log_info.filter(|l| !l.is_empty()) else {
        return Map::new();
    };
    match serde_json::from_str::<Map<String, Value>>(raw) {
        Ok(map) => map,
        Err(e) => {
            error!("log info for job {} is not JSON: {}", job_id, e);
            let mut map = Map::new();
            map.insert("msg_info".to_string(), Value::String(raw.to_string()));
            map
        }
    }
}

/// Finalize a non-sync record: append the retry transcript to the message
/// field (the engine's fetch-failure note wins when present) and render the
/// body as JSON text.
fn finalize_plain_log(mut log_body: Map<String, Value>, transcript: &RetryTranscript) -> String {
    if let Some(engine_err) = log_body.get("engineLogErr").and_then(Value::as_str) {
        let engine_err = engine_err.to_string();
        log_body.insert("msg_info".to_string(), Value::String(engine_err));
    } else {
        let existing = log_body
            .get("msg_info")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        log_body.insert(
            "msg_info".to_string(),
            Value::String(format!("{}\n{}", existing, transcript.text)),
        );
    }
    Value::Object(log_body).to_string()
}
