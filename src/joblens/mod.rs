pub mod config;
pub mod error;
pub mod merge;
pub mod metrics;
pub mod perf;
pub mod retry;
pub mod source;
pub mod sync_info;
pub mod timestamp;
pub mod types;
