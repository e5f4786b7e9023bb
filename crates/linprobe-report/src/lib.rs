//! Linprobe Report - Run and failure reports.
//!
//! A [`RunReport`] captures the outcome of one run together with its
//! configuration and the time it was produced. Two renderings exist:
//!
//! - [`json`]: Machine-readable JSON, pretty or compact
//! - [`markdown`]: A human-readable document with the failing scenario,
//!   its history and the longest linearizable prefix

pub mod json;
pub mod markdown;
pub mod types;

pub use json::{JsonFormat, JsonReportGenerator};
pub use markdown::MarkdownReportGenerator;
pub use types::{ReportError, ReportOutcome, RunReport};
