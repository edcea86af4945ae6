//! Watermark time-precision resolution
//!
//! Incremental-sync watermarks arrive as bare decimal strings whose precision
//! is unknown: the same column can carry epoch seconds, millis, micros or
//! nanos depending on the source database. Digit count disambiguates:
//!
//! | digits | precision | example              |
//! |--------|-----------|----------------------|
//! | 10     | seconds   | `1609459200`         |
//! | 13     | millis    | `1609459200000`      |
//! | 16     | micros    | `1609459200000000`   |
//! | 19     | nanos     | `1609459200000000000`|
//!
//! Any other digit count fails with `UnknownPrecision`, fatal to that single
//! conversion only. Resolved values render as a fixed 29-character canonical
//! timestamp so all watermarks are textually comparable and sortable.

use chrono::{DateTime, Utc};
use log::debug;

use super::error::{LogViewError, LogViewResult};

const SECOND_DIGITS: usize = 10;
const MILLIS_DIGITS: usize = 13;
const MICROS_DIGITS: usize = 16;
const NANOS_DIGITS: usize = 19;

/// Width of the canonical render: `YYYY-MM-DD HH:MM:SS.fffffffff`.
pub const CANONICAL_WIDTH: usize = 29;

/// A watermark resolved to canonical precision.
///
/// `nanos` is the full sub-second fraction and always agrees with the
/// millisecond part: `nanos / 1_000_000 == millis % 1000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedWatermark {
    millis: i64,
    nanos: u32,
}

impl ResolvedWatermark {
    pub fn millis(&self) -> i64 {
        self.millis
    }

    pub fn nanos(&self) -> u32 {
        self.nanos
    }

    /// Canonical render, UTC, exactly [`CANONICAL_WIDTH`] characters.
    pub fn render(&self) -> String {
        let secs = self.millis.div_euclid(1000);
        match DateTime::<Utc>::from_timestamp(secs, self.nanos) {
            Some(dt) => dt.format("%Y-%m-%d %H:%M:%S%.9f").to_string(),
            // Unreachable for any classified precision family; kept so render
            // never panics on a hand-built value.
            None => format!("{}.{:09}", secs, self.nanos),
        }
    }
}

/// Classify a decimal watermark by digit count and resolve it to a
/// (millisecond, nanosecond-fraction) pair.
pub fn resolve(raw: &str) -> LogViewResult<ResolvedWatermark> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(LogViewError::malformed(
            "watermark",
            format!("'{raw}' is not a non-negative decimal integer"),
        ));
    }

    let value: u64 = raw
        .parse()
        .map_err(|e| LogViewError::malformed("watermark", e))?;

    let (millis, nanos) = match raw.len() {
        SECOND_DIGITS => (value as i64 * 1000, 0),
        MILLIS_DIGITS => (value as i64, (value % 1000) as u32 * 1_000_000),
        MICROS_DIGITS => ((value / 1000) as i64, (value % 1_000_000) as u32 * 1000),
        NANOS_DIGITS => {
            // The 9-digit suffix is taken from the decimal text rather than
            // recomputed by division so values past the f64/i53 safe range
            // keep their exact fraction.
            let suffix: u32 = raw[SECOND_DIGITS..NANOS_DIGITS]
                .parse()
                .map_err(|e| LogViewError::malformed("watermark", e))?;
            ((value / 1_000_000) as i64, suffix)
        }
        digits => {
            return Err(LogViewError::UnknownPrecision {
                raw: raw.to_string(),
                digits,
            });
        }
    };

    Ok(ResolvedWatermark { millis, nanos })
}

/// Watermark-level formatting with the fallback policy callers rely on:
/// empty and `"0"` collapse to empty, non-numeric text passes through
/// unchanged, and an unclassifiable digit count falls back to the raw text
/// instead of failing the caller.
pub fn format_watermark(raw: &str) -> String {
    if raw.is_empty() || raw == "0" {
        return String::new();
    }
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return raw.to_string();
    }
    match resolve(raw) {
        Ok(resolved) => resolved.render(),
        Err(e) => {
            debug!("watermark '{}' left unresolved: {}", raw, e);
            raw.to_string()
        }
    }
}
