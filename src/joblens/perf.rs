//! Performance-counter block formatting
//!
//! The engine dumps sync job counters as a tab-separated block, one
//! `label \t integer` pair per line. For the console UI the byte counters
//! (by contract the 3rd and 6th lines: bytes read and bytes written) are
//! rewritten as binary-multiple byte sizes and every other counter gets
//! thousands separators. A line that fails to parse is passed through
//! unformatted; nothing in here aborts the block.

use log::debug;

use super::types::SyncExecSummary;

/// Counter labels of the readable perf block, in dump order. Byte counters
/// sit at indexes 2 and 5, matching the default `byte_counter_lines`.
pub const PERF_LABELS: [&str; 7] = [
    "读取记录数:",
    "读取耗时(s):",
    "读取数据量:",
    "写入记录数:",
    "写入耗时(s):",
    "写入数据量:",
    "错误记录数:",
];

/// Rewrite a raw perf block into its human-readable form.
///
/// `byte_lines` are the zero-based line indexes rendered as byte sizes;
/// everything else parseable gets thousands separators.
pub fn format_perf_block(block: &str, byte_lines: &[usize]) -> String {
    let mut out = String::with_capacity(block.len() + 16);
    for (idx, line) in block.lines().enumerate() {
        match split_counter_line(line) {
            Some((label, value)) => {
                let rendered = if byte_lines.contains(&idx) {
                    human_readable_bytes(value)
                } else {
                    thousands(value)
                };
                out.push_str(label);
                out.push('\t');
                out.push_str(&rendered);
            }
            None => {
                // Malformed line: keep it verbatim rather than drop the block.
                debug!("perf line {} left unformatted: {:?}", idx, line);
                out.push_str(line);
            }
        }
        out.push('\n');
    }
    out
}

fn split_counter_line(line: &str) -> Option<(&str, i64)> {
    let (label, value) = line.split_once('\t')?;
    let value: i64 = value.parse().ok()?;
    Some((label, value))
}

/// Render a byte count with binary-multiple units, two decimals above 1 KB.
pub fn human_readable_bytes(bytes: i64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{}B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2}{}", value, UNITS[unit])
}

/// Render an integer with thousands separators: `1234567` → `1,234,567`.
pub fn thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    let lead = digits.len() % 3;
    for (idx, ch) in digits.chars().enumerate() {
        if idx != 0 && (idx + 3 - lead) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Parse the read/write/dirty summary back out of a readable perf block.
///
/// Only the record-count lines matter here; byte lines keep their unit
/// suffixes and are ignored. Thousands separators are stripped before
/// parsing. An absent or unparseable counter counts as zero.
pub fn parse_exec_summary(perf: &str, exec_time_secs: Option<i64>) -> SyncExecSummary {
    let mut read_num = 0;
    let mut write_num = 0;
    let mut error_num = 0;

    for line in perf.lines() {
        if line.contains("读取记录数:") {
            read_num = counter_value(line);
        } else if line.contains("错误记录数:") {
            error_num = counter_value(line);
        } else if line.contains("写入记录数:") {
            write_num = counter_value(line);
        }
    }

    let dirty_percent = if read_num == 0 {
        0.0
    } else {
        error_num as f32 / read_num as f32 * 100.0
    };

    SyncExecSummary {
        read_num,
        write_num,
        dirty_percent,
        exec_time_secs,
    }
}

fn counter_value(line: &str) -> i64 {
    line.split('\t')
        .nth(1)
        .map(|v| v.trim().replace(',', ""))
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}
