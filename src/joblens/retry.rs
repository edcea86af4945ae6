//! Retry transcript assembly
//!
//! Renders the per-attempt retry history as a framed, human-readable
//! transcript. The border tokens, their exact `=` counts and the ten-line
//! `==` separator are a compatibility contract with the console UI that
//! scrapes this text; do not touch them without coordinating a UI change.

use super::error::{LogViewError, LogViewResult};
use super::types::RetryAttempt;

/// Which retry attempt(s) to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptSelector {
    /// The most recent attempt (wire value 0).
    Latest,
    /// One specific 1-based attempt.
    Attempt(u32),
    /// Every attempt in order (wire value -1).
    All,
}

impl AttemptSelector {
    /// Decode the wire form used by callers: `0` latest, `-1` all,
    /// any positive value a specific attempt.
    pub fn from_wire(value: i32) -> Self {
        match value {
            0 => Self::Latest,
            -1 => Self::All,
            n => Self::Attempt(n as u32),
        }
    }
}

/// A rendered transcript plus the total attempt count (the page size
/// reported on the final record).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryTranscript {
    pub text: String,
    pub attempt_count: usize,
}

/// Render the transcript for the selected attempt(s).
///
/// No attempts is an empty transcript, not an error. A specific selector
/// beyond the attempt count is `InvalidSelector`, fatal to the request.
pub fn render_transcript(
    job_id: &str,
    attempts: &[RetryAttempt],
    selector: AttemptSelector,
    separator_lines: usize,
) -> LogViewResult<RetryTranscript> {
    if attempts.is_empty() {
        return Ok(RetryTranscript::default());
    }

    let mut text = String::new();
    match selector {
        AttemptSelector::All => {
            for attempt in attempts {
                render_attempt(attempt, separator_lines, &mut text);
            }
        }
        AttemptSelector::Latest => {
            // Attempts are ordered; the last element is the newest.
            if let Some(attempt) = attempts.last() {
                render_attempt(attempt, separator_lines, &mut text);
            }
        }
        AttemptSelector::Attempt(n) => {
            let idx = n as usize;
            if idx == 0 || idx > attempts.len() {
                return Err(LogViewError::InvalidSelector {
                    job_id: job_id.to_string(),
                    requested: n,
                    available: attempts.len(),
                });
            }
            render_attempt(&attempts[idx - 1], separator_lines, &mut text);
        }
    }

    Ok(RetryTranscript {
        text,
        attempt_count: attempts.len(),
    })
}

fn render_attempt(attempt: &RetryAttempt, separator_lines: usize, out: &mut String) {
    let n = attempt.attempt;
    out.push_str(&format!("====================第 {n}次重试====================\n"));

    if !attempt.log_info.is_empty() {
        out.push_str("====================LogInfo start====================\n");
        out.push_str(&attempt.log_info);
        out.push('\n');
        out.push_str("=====================LogInfo end=====================\n");
    }
    if !attempt.engine_log.is_empty() {
        out.push_str("==================EngineInfo  start==================\n");
        out.push_str(&attempt.engine_log);
        out.push('\n');
        out.push_str("===================EngineInfo  end===================\n");
    }
    if !attempt.retry_task_params.is_empty() {
        out.push_str("==================RetryTaskParams  start==================\n");
        out.push_str(&attempt.retry_task_params);
        out.push('\n');
        out.push_str("===================RetryTaskParams  end===================\n");
    }

    out.push_str(&format!("==================第{n}次重试结束==================\n"));
    for _ in 0..separator_lines {
        out.push_str("==\n");
    }
}
