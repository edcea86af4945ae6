//! Metric sample collection for sync jobs
//!
//! Queries a fixed, enumerated set of counters from the metric backend over
//! a job's execution window. Two policies live here:
//!
//! - **Window shrink**: the backend caps point resolution per series, so a
//!   query window at or above the configured maximum span is narrowed to the
//!   shrunk span ending at the original end. The *reported* window on every
//!   sample stays the caller's original request.
//! - **Total coverage**: a missing or unavailable sample resolves to value 0,
//!   never to a missing key, so callers can always read every metric name.

use log::warn;
use std::collections::HashMap;

use super::config::LogViewConfig;
use super::error::{LogViewError, LogViewResult};
use super::perf::PERF_LABELS;
use super::source::MetricBackend;
use super::types::TimeWindow;

/// Marker text substituted for metric-driven sections when the backend is
/// unavailable for the tenant.
pub const METRICS_UNAVAILABLE_MARKER: &str = "metrics backend unavailable";

/// The fixed metric vocabulary of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    NumRead,
    ByteRead,
    ReadDuration,
    NumWrite,
    ByteWrite,
    WriteDuration,
    NumErrors,
    NullErrors,
    DuplicateErrors,
    ConversionErrors,
    OtherErrors,
    StartLocation,
    EndLocation,
}

impl MetricName {
    /// Series name as registered by the engine.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NumRead => "numRead",
            Self::ByteRead => "byteRead",
            Self::ReadDuration => "readDuration",
            Self::NumWrite => "numWrite",
            Self::ByteWrite => "byteWrite",
            Self::WriteDuration => "writeDuration",
            Self::NumErrors => "nErrors",
            Self::NullErrors => "nullErrors",
            Self::DuplicateErrors => "duplicateErrors",
            Self::ConversionErrors => "conversionErrors",
            Self::OtherErrors => "otherErrors",
            Self::StartLocation => "startLocation",
            Self::EndLocation => "endLocation",
        }
    }

    /// The seven read/write/error counters of the perf summary, in readable
    /// block order (byte counters at indexes 2 and 5).
    pub const PERF: [MetricName; 7] = [
        Self::NumRead,
        Self::ReadDuration,
        Self::ByteRead,
        Self::NumWrite,
        Self::WriteDuration,
        Self::ByteWrite,
        Self::NumErrors,
    ];

    /// The dirty-data breakdown counters.
    pub const DIRTY: [MetricName; 5] = [
        Self::NullErrors,
        Self::DuplicateErrors,
        Self::ConversionErrors,
        Self::OtherErrors,
        Self::NumErrors,
    ];
}

/// One collected sample. `value` is `None` when the backend had no data for
/// the series; consumers read it as 0. `window` is the caller's original
/// request window, not the (possibly shrunk) one sent to the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub name: MetricName,
    pub value: Option<f64>,
    pub window: TimeWindow,
}

/// Collects named samples from the backend, applying the window-shrink
/// policy. Borrowed per request; holds no state of its own.
pub struct MetricSampleCollector<'a> {
    backend: &'a dyn MetricBackend,
    config: &'a LogViewConfig,
}

impl<'a> MetricSampleCollector<'a> {
    pub fn new(backend: &'a dyn MetricBackend, config: &'a LogViewConfig) -> Self {
        Self { backend, config }
    }

    /// The window actually sent to the backend for a caller-requested one.
    pub fn query_window(&self, window: TimeWindow) -> TimeWindow {
        let max_span = self.config.max_query_span.as_millis() as i64;
        if window.span_ms() >= max_span {
            let shrunk = self.config.shrunk_query_span.as_millis() as i64;
            TimeWindow::new(window.end_ms - shrunk, window.end_ms)
        } else {
            window
        }
    }

    /// Collect every named metric for the series over the window.
    ///
    /// Fails with `UpstreamUnavailable` when the backend is not configured
    /// for the tenant; callers degrade that to an explicit marker. A failed
    /// or empty individual query resolves to 0.
    pub async fn collect(
        &self,
        names: &[MetricName],
        series_id: &str,
        window: TimeWindow,
        tenant_id: i64,
    ) -> LogViewResult<HashMap<MetricName, MetricSample>> {
        if !self.backend.is_configured(tenant_id).await {
            return Err(LogViewError::UpstreamUnavailable {
                reason: format!("no metric endpoint configured for tenant {tenant_id}"),
            });
        }

        let bound = self.query_window(window);
        let mut samples = HashMap::with_capacity(names.len());
        for &name in names {
            let value = match self.backend.query(name, series_id, bound, tenant_id).await {
                Ok(value) => value,
                Err(e) => {
                    warn!(
                        "metric query {} for series '{}' failed: {}",
                        name.as_str(),
                        series_id,
                        e
                    );
                    None
                }
            };
            samples.insert(
                name,
                MetricSample {
                    name,
                    value,
                    // Reported window is the caller's, not the shrunk one.
                    window,
                },
            );
        }
        Ok(samples)
    }

    /// Query one watermark-style metric and render its value as text, `None`
    /// when the series has no sample.
    pub async fn query_location(
        &self,
        name: MetricName,
        series_id: &str,
        window: TimeWindow,
        tenant_id: i64,
    ) -> LogViewResult<Option<String>> {
        if !self.backend.is_configured(tenant_id).await {
            return Err(LogViewError::UpstreamUnavailable {
                reason: format!("no metric endpoint configured for tenant {tenant_id}"),
            });
        }
        let bound = self.query_window(window);
        let value = self
            .backend
            .query(name, series_id, bound, tenant_id)
            .await
            .map_err(|e| LogViewError::collaborator(format!("metric {}", name.as_str()), e))?;
        Ok(value.map(format_metric_value))
    }
}

/// Render a backend value the way a watermark expects it: integral samples
/// keep their integer text, anything else keeps the float form.
pub fn format_metric_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 9.2e18 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// The seven perf counters resolved to values, rendered as the readable
/// tab-separated block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerfSummary {
    pub num_read: i64,
    pub read_duration: i64,
    pub byte_read: i64,
    pub num_write: i64,
    pub write_duration: i64,
    pub byte_write: i64,
    pub num_errors: i64,
}

impl PerfSummary {
    /// Build from a collected sample map; missing names count as 0.
    pub fn from_samples(samples: &HashMap<MetricName, MetricSample>) -> Self {
        let get = |name: MetricName| -> i64 {
            samples
                .get(&name)
                .and_then(|s| s.value)
                .map(|v| v as i64)
                .unwrap_or(0)
        };
        Self {
            num_read: get(MetricName::NumRead),
            read_duration: get(MetricName::ReadDuration),
            byte_read: get(MetricName::ByteRead),
            num_write: get(MetricName::NumWrite),
            write_duration: get(MetricName::WriteDuration),
            byte_write: get(MetricName::ByteWrite),
            num_errors: get(MetricName::NumErrors),
        }
    }

    /// Raw tab-separated block in [`PERF_LABELS`] order, ready for
    /// [`crate::joblens::perf::format_perf_block`].
    pub fn raw_block(&self) -> String {
        let values = [
            self.num_read,
            self.read_duration,
            self.byte_read,
            self.num_write,
            self.write_duration,
            self.byte_write,
            self.num_errors,
        ];
        let mut out = String::new();
        for (label, value) in PERF_LABELS.iter().zip(values) {
            out.push_str(&format!("{label}\t{value}\n"));
        }
        out
    }

    /// Human-readable block with byte units and thousands separators.
    pub fn readable_block(&self, config: &LogViewConfig) -> String {
        super::perf::format_perf_block(&self.raw_block(), &config.byte_counter_lines)
    }
}

/// Dirty-data error breakdown for one sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct DirtyDataCounts {
    pub null_errors: i64,
    pub duplicate_errors: i64,
    pub conversion_errors: i64,
    pub other_errors: i64,
    pub total_errors: i64,
}

impl DirtyDataCounts {
    pub fn from_samples(samples: &HashMap<MetricName, MetricSample>) -> Self {
        let get = |name: MetricName| -> i64 {
            samples
                .get(&name)
                .and_then(|s| s.value)
                .map(|v| v as i64)
                .unwrap_or(0)
        };
        Self {
            null_errors: get(MetricName::NullErrors),
            duplicate_errors: get(MetricName::DuplicateErrors),
            conversion_errors: get(MetricName::ConversionErrors),
            other_errors: get(MetricName::OtherErrors),
            total_errors: get(MetricName::NumErrors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joblens::source::SourceResult;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingBackend {
        configured: bool,
        value: Option<f64>,
        seen_windows: Mutex<Vec<TimeWindow>>,
    }

    impl RecordingBackend {
        fn new(configured: bool, value: Option<f64>) -> Self {
            Self {
                configured,
                value,
                seen_windows: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MetricBackend for RecordingBackend {
        async fn query(
            &self,
            _metric: MetricName,
            _series_id: &str,
            window: TimeWindow,
            _tenant_id: i64,
        ) -> SourceResult<Option<f64>> {
            self.seen_windows.lock().unwrap().push(window);
            Ok(self.value)
        }

        async fn is_configured(&self, _tenant_id: i64) -> bool {
            self.configured
        }
    }

    const HOUR_MS: i64 = 3600 * 1000;

    #[tokio::test]
    async fn test_window_shrink_at_eight_hours() {
        let backend = RecordingBackend::new(true, Some(1.0));
        let config = LogViewConfig::default();
        let collector = MetricSampleCollector::new(&backend, &config);

        let window = TimeWindow::new(0, 8 * HOUR_MS);
        let samples = collector
            .collect(&MetricName::PERF, "series-1", window, 7)
            .await
            .unwrap();

        // Backend saw the shrunk 1h window anchored at the original end.
        for seen in backend.seen_windows.lock().unwrap().iter() {
            assert_eq!(seen.end_ms, 8 * HOUR_MS);
            assert_eq!(seen.span_ms(), HOUR_MS);
        }
        // Reported window is untouched.
        for sample in samples.values() {
            assert_eq!(sample.window, window);
        }
    }

    #[tokio::test]
    async fn test_short_window_not_shrunk() {
        let backend = RecordingBackend::new(true, Some(1.0));
        let config = LogViewConfig::default();
        let collector = MetricSampleCollector::new(&backend, &config);

        let window = TimeWindow::new(0, 2 * HOUR_MS);
        collector
            .collect(&[MetricName::NumRead], "series-1", window, 7)
            .await
            .unwrap();
        assert_eq!(backend.seen_windows.lock().unwrap()[0], window);
    }

    #[tokio::test]
    async fn test_missing_samples_resolve_to_zero_for_every_name() {
        let backend = RecordingBackend::new(true, None);
        let config = LogViewConfig::default();
        let collector = MetricSampleCollector::new(&backend, &config);

        let samples = collector
            .collect(&MetricName::PERF, "s", TimeWindow::new(0, 1000), 7)
            .await
            .unwrap();
        assert_eq!(samples.len(), MetricName::PERF.len());
        let summary = PerfSummary::from_samples(&samples);
        assert_eq!(summary, PerfSummary::default());
    }

    #[tokio::test]
    async fn test_unconfigured_backend_is_upstream_unavailable() {
        let backend = RecordingBackend::new(false, None);
        let config = LogViewConfig::default();
        let collector = MetricSampleCollector::new(&backend, &config);

        let err = collector
            .collect(&MetricName::DIRTY, "s", TimeWindow::new(0, 1000), 7)
            .await
            .unwrap_err();
        assert!(matches!(err, LogViewError::UpstreamUnavailable { .. }));
    }

    #[test]
    fn test_perf_summary_block_layout() {
        let summary = PerfSummary {
            num_read: 1_234_567,
            read_duration: 42,
            byte_read: 1_048_576,
            num_write: 1_234_000,
            write_duration: 57,
            byte_write: 2_097_152,
            num_errors: 3,
        };
        let block = summary.readable_block(&LogViewConfig::default());
        let lines: Vec<&str> = block.lines().collect();
        assert_eq!(lines[0], "读取记录数:\t1,234,567");
        assert_eq!(lines[2], "读取数据量:\t1.00MB");
        assert_eq!(lines[5], "写入数据量:\t2.00MB");
        assert_eq!(lines[6], "错误记录数:\t3");
    }

    #[test]
    fn test_format_metric_value() {
        assert_eq!(format_metric_value(1609459200000.0), "1609459200000");
        assert_eq!(format_metric_value(0.0), "0");
        assert_eq!(format_metric_value(1.5), "1.5");
    }
}
