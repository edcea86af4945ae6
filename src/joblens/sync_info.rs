//! Incremental-sync position summaries
//!
//! Data-sync jobs carry their pipeline definition as a JSON config (sometimes
//! base64-wrapped at rest). This module decodes the config into explicit
//! typed structures — no generic object-tree probing — and derives the
//! human-readable start/end position summary for incremental runs, using the
//! increment column's declared type to decide whether a watermark is a
//! date or a raw ordinal.
//!
//! The summary never fails the parent log lookup: derivation problems come
//! back as [`SyncInfo::Unavailable`] for the caller to log and drop.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{LogViewError, LogViewResult};
use super::timestamp::format_watermark;

/// Marker emitted when the start watermark is empty: the run read the whole
/// table rather than a delta.
pub const FULL_SYNC_MARKER: &str = "全量同步";

/// Marker emitted when the end watermark signals an empty delta.
pub const ZERO_ROWS_MARKER: &str = "同步数据条数为0";

/// Top level of a sync job config: the pipeline body plus passthrough
/// sections the UI echoes back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncJobConfig {
    pub job: SyncJobBody,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parser: Option<Value>,
    #[serde(
        default,
        rename = "createModel",
        skip_serializing_if = "Option::is_none"
    )]
    pub create_model: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncJobBody {
    #[serde(default)]
    pub content: Vec<SyncContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setting: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reader: Option<SyncEndpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub writer: Option<SyncEndpoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncEndpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<SyncParameter>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncParameter {
    #[serde(
        default,
        rename = "increColumn",
        skip_serializing_if = "Option::is_none"
    )]
    pub incre_column: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connection: Vec<SyncConnection>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub column: Vec<ColumnSpec>,
    /// Everything else in the endpoint parameter (credentials, urls, vendor
    /// options) is carried opaquely so re-serialization loses nothing.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConnection {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub table: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// A column entry: either a full spec or the bare-string shorthand some
/// sources use.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnSpec {
    Spec {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
        col_type: Option<String>,
        #[serde(flatten)]
        extra: serde_json::Map<String, Value>,
    },
    Shorthand(Value),
}

impl SyncJobConfig {
    /// Reader parameter of the first pipeline stage, where the increment
    /// marker lives.
    pub fn reader_parameter(&self) -> Option<&SyncParameter> {
        self.job
            .content
            .first()
            .and_then(|c| c.reader.as_ref())
            .and_then(|r| r.parameter.as_ref())
    }

    /// Source table of the first reader connection.
    pub fn table(&self) -> Option<&str> {
        self.reader_parameter()
            .and_then(|p| p.connection.first())
            .and_then(|c| c.table.first())
            .map(String::as_str)
    }

    /// Declared increment column name.
    pub fn increment_column(&self) -> Option<&str> {
        self.reader_parameter()
            .and_then(|p| p.incre_column.as_deref())
    }

    /// True when the increment column's declared type is in the
    /// date/time/timestamp family.
    pub fn increment_column_is_date(&self) -> bool {
        let Some(incre) = self.increment_column() else {
            return false;
        };
        let Some(param) = self.reader_parameter() else {
            return false;
        };
        param.column.iter().any(|col| match col {
            ColumnSpec::Spec {
                name: Some(name),
                col_type: Some(col_type),
                ..
            } => name == incre && is_date_type(col_type),
            _ => false,
        })
    }
}

/// Case-insensitive match against the date/time family: exactly `date`,
/// `datetime` or `time`, or any type name containing `timestamp`.
pub fn is_date_type(col_type: &str) -> bool {
    let lower = col_type.to_lowercase();
    matches!(lower.as_str(), "date" | "datetime" | "time") || lower.contains("timestamp")
}

/// Decode a sync job config from its stored text, which is either plain JSON
/// or a base64 wrapping of it.
pub fn decode_sync_config(raw: &str) -> LogViewResult<SyncJobConfig> {
    let text = match BASE64.decode(raw.trim()) {
        Ok(bytes) => String::from_utf8(bytes).unwrap_or_else(|_| raw.to_string()),
        Err(_) => raw.to_string(),
    };
    serde_json::from_str(&text).map_err(|e| LogViewError::malformed("sync job config", e))
}

/// Recursively blank every `password` value so credentials never reach the
/// rendered record.
pub fn mask_passwords(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                if key.eq_ignore_ascii_case("password") {
                    *v = Value::String("******".to_string());
                } else {
                    mask_passwords(v);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                mask_passwords(item);
            }
        }
        _ => {}
    }
}

/// Outcome of the sync-info derivation. `Unavailable` is a degraded
/// placeholder, not an error: the parent request always proceeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncInfo {
    Summary(String),
    Unavailable { reason: String },
}

impl SyncInfo {
    pub fn summary(&self) -> Option<&str> {
        match self {
            Self::Summary(text) => Some(text),
            Self::Unavailable { .. } => None,
        }
    }
}

/// Derive the start/end position summary for one incremental run.
///
/// `start` / `end` are the raw watermark metric values, `None` when the
/// backend had no sample.
pub fn build_sync_info(
    config: &SyncJobConfig,
    start: Option<&str>,
    end: Option<&str>,
) -> SyncInfo {
    let Some(table) = config.table() else {
        return SyncInfo::Unavailable {
            reason: "sync config has no reader table".to_string(),
        };
    };
    let Some(incre_column) = config.increment_column() else {
        return SyncInfo::Unavailable {
            reason: "sync config has no increment column".to_string(),
        };
    };

    let mut out = String::new();
    out.push_str(&format!("数据表:  \t{table}\n"));
    out.push_str(&format!("增量标识:\t{incre_column}\n"));

    // Empty or lexically negative end watermark is the canonical empty-delta
    // signal from the engine.
    let end = end.unwrap_or("");
    if end.is_empty() || end.starts_with('-') {
        out.push_str(&format!("开始位置:\t{ZERO_ROWS_MARKER}\n"));
        return SyncInfo::Summary(out);
    }

    let is_date = config.increment_column_is_date();

    let start_text = match start {
        None | Some("") => FULL_SYNC_MARKER.to_string(),
        Some(raw) if is_date => format_watermark(raw),
        Some(raw) => raw.to_string(),
    };
    let end_text = if is_date {
        format_watermark(end)
    } else {
        end.to_string()
    };

    out.push_str(&format!("开始位置:\t{start_text}\n"));
    out.push_str(&format!("结束位置:\t{end_text}\n"));
    SyncInfo::Summary(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sync_config(col_type: &str) -> SyncJobConfig {
        let json = format!(
            r#"{{
                "job": {{
                    "content": [{{
                        "reader": {{
                            "name": "mysqlreader",
                            "parameter": {{
                                "increColumn": "update_time",
                                "password": "secret",
                                "connection": [{{"table": ["orders"], "jdbcUrl": ["jdbc:mysql://db/x"]}}],
                                "column": [
                                    {{"name": "id", "type": "bigint"}},
                                    {{"name": "update_time", "type": "{col_type}"}}
                                ]
                            }}
                        }}
                    }}]
                }}
            }}"#
        );
        decode_sync_config(&json).unwrap()
    }

    #[test]
    fn test_decode_plain_and_base64() {
        let plain = r#"{"job":{"content":[]}}"#;
        assert!(decode_sync_config(plain).is_ok());
        let wrapped = BASE64.encode(plain);
        assert!(decode_sync_config(&wrapped).is_ok());
        assert!(decode_sync_config("not json at all").is_err());
    }

    #[test]
    fn test_typed_accessors() {
        let config = sync_config("timestamp");
        assert_eq!(config.table(), Some("orders"));
        assert_eq!(config.increment_column(), Some("update_time"));
        assert!(config.increment_column_is_date());
    }

    #[test]
    fn test_date_type_family() {
        assert!(is_date_type("date"));
        assert!(is_date_type("DATETIME"));
        assert!(is_date_type("time"));
        assert!(is_date_type("TIMESTAMP(3)"));
        assert!(is_date_type("timestamptz"));
        assert!(!is_date_type("bigint"));
        assert!(!is_date_type("timeuuid_not")); // contains "time" but is not the exact token
    }

    #[test]
    fn test_zero_rows_signal_wins() {
        let config = sync_config("timestamp");
        for end in [None, Some(""), Some("-1"), Some("-42")] {
            let info = build_sync_info(&config, Some("1609459200"), end);
            let summary = info.summary().expect("zero-delta is still a summary");
            assert!(summary.contains(ZERO_ROWS_MARKER), "end={end:?}");
            assert!(!summary.contains("结束位置"));
        }
    }

    #[test]
    fn test_date_column_watermarks_are_canonical() {
        let config = sync_config("timestamp");
        let info = build_sync_info(&config, Some("1609459200"), Some("1609462800000"));
        let summary = info.summary().unwrap();
        assert!(summary.contains("开始位置:\t2021-01-01 00:00:00.000000000\n"));
        assert!(summary.contains("结束位置:\t2021-01-01 01:00:00.000000000\n"));
    }

    #[test]
    fn test_ordinal_column_watermarks_stay_raw() {
        let config = sync_config("bigint");
        let info = build_sync_info(&config, Some("1048576"), Some("2097152"));
        let summary = info.summary().unwrap();
        assert!(summary.contains("开始位置:\t1048576\n"));
        assert!(summary.contains("结束位置:\t2097152\n"));
    }

    #[test]
    fn test_empty_start_means_full_sync() {
        let config = sync_config("timestamp");
        let info = build_sync_info(&config, None, Some("1609462800000"));
        let summary = info.summary().unwrap();
        assert!(summary.contains(&format!("开始位置:\t{FULL_SYNC_MARKER}\n")));
    }

    #[test]
    fn test_missing_table_degrades() {
        let config = decode_sync_config(r#"{"job":{"content":[]}}"#).unwrap();
        let info = build_sync_info(&config, None, Some("1"));
        assert!(matches!(info, SyncInfo::Unavailable { .. }));
    }

    #[test]
    fn test_mask_passwords() {
        let mut value: Value = serde_json::json!({
            "reader": {"parameter": {"password": "secret", "username": "svc"}},
            "writers": [{"Password": "secret2"}]
        });
        mask_passwords(&mut value);
        assert_eq!(value["reader"]["parameter"]["password"], "******");
        assert_eq!(value["reader"]["parameter"]["username"], "svc");
        assert_eq!(value["writers"][0]["Password"], "******");
    }
}
