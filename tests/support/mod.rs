//! Mock collaborators and fixtures shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use joblens::{
    ActionLog, ComputeType, EngineLogSource, JobRun, JobStatus, JobType, LogViewBuilder,
    LogViewConfig, MetricBackend, MetricName, ParamSubstituter, RetryAttempt, ScheduleKind,
    SchedulerStore, SourceResult, TaskMetadata, TimeWindow, VersionedSql,
};

#[derive(Default)]
pub struct MockScheduler {
    pub jobs: HashMap<String, JobRun>,
    pub tasks: HashMap<i64, TaskMetadata>,
    pub versions: HashMap<i64, VersionedSql>,
}

#[async_trait]
impl SchedulerStore for MockScheduler {
    async fn fetch_job(&self, job_id: &str) -> SourceResult<Option<JobRun>> {
        Ok(self.jobs.get(job_id).cloned())
    }

    async fn fetch_task_metadata(&self, task_id: i64) -> SourceResult<Option<TaskMetadata>> {
        Ok(self.tasks.get(&task_id).cloned())
    }

    async fn fetch_versioned_sql(&self, version_id: i64) -> SourceResult<Option<VersionedSql>> {
        Ok(self.versions.get(&version_id).cloned())
    }
}

#[derive(Default)]
pub struct MockEngine {
    pub log: ActionLog,
    pub series_id: Option<String>,
    pub attempts: Vec<RetryAttempt>,
}

#[async_trait]
impl EngineLogSource for MockEngine {
    async fn fetch_log(&self, _job_id: &str) -> SourceResult<ActionLog> {
        Ok(self.log.clone())
    }

    async fn fetch_engine_series_id(&self, _job_id: &str) -> SourceResult<Option<String>> {
        Ok(self.series_id.clone())
    }

    async fn fetch_retry_attempts(&self, _job_id: &str) -> SourceResult<Vec<RetryAttempt>> {
        Ok(self.attempts.clone())
    }
}

#[derive(Default)]
pub struct MockMetrics {
    pub configured: bool,
    pub values: HashMap<&'static str, f64>,
}

#[async_trait]
impl MetricBackend for MockMetrics {
    async fn query(
        &self,
        metric: MetricName,
        _series_id: &str,
        _window: TimeWindow,
        _tenant_id: i64,
    ) -> SourceResult<Option<f64>> {
        Ok(self.values.get(metric.as_str()).copied())
    }

    async fn is_configured(&self, _tenant_id: i64) -> bool {
        self.configured
    }
}

/// Replaces `${date}` with the run's cycle time.
pub struct DateSubstituter;

impl ParamSubstituter for DateSubstituter {
    fn substitute(&self, text: &str, cycle_time: Option<&str>) -> String {
        text.replace("${date}", cycle_time.unwrap_or("20210101"))
    }
}

pub fn job_run(job_id: &str, task_id: i64, status: JobStatus) -> JobRun {
    JobRun {
        job_id: job_id.to_string(),
        task_id,
        tenant_id: 7,
        status,
        schedule_kind: ScheduleKind::Normal,
        version_id: None,
        cycle_time: Some("20210101000000".to_string()),
        exec_start_ms: None,
        exec_end_ms: None,
    }
}

pub fn task(task_id: i64, name: &str, task_type: JobType, sql_text: &str) -> TaskMetadata {
    TaskMetadata {
        task_id,
        name: name.to_string(),
        task_type,
        compute_type: ComputeType::Batch,
        sql_text: sql_text.to_string(),
    }
}

pub fn retry_attempt(n: u32, log_info: &str) -> RetryAttempt {
    RetryAttempt {
        attempt: n,
        log_info: log_info.to_string(),
        engine_log: String::new(),
        retry_task_params: String::new(),
    }
}

/// A sync job config with a timestamp-typed increment column.
pub const SYNC_CONFIG: &str = r#"{
    "job": {
        "content": [{
            "reader": {
                "name": "mysqlreader",
                "parameter": {
                    "increColumn": "update_time",
                    "password": "secret",
                    "connection": [{"table": ["orders"]}],
                    "column": [
                        {"name": "id", "type": "bigint"},
                        {"name": "update_time", "type": "timestamp"}
                    ]
                }
            }
        }]
    }
}"#;

pub fn builder(
    scheduler: MockScheduler,
    engine: MockEngine,
    metrics: MockMetrics,
    config: LogViewConfig,
) -> LogViewBuilder {
    let _ = env_logger::builder().is_test(true).try_init();
    LogViewBuilder::new(
        Arc::new(scheduler),
        Arc::new(engine),
        Arc::new(metrics),
        Arc::new(DateSubstituter),
        Arc::new(config),
    )
}
