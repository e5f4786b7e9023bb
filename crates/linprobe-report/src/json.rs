//! JSON report generation.

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use serde_json::ser::{CompactFormatter, PrettyFormatter, Serializer};
use tracing::instrument;

use crate::types::{ReportError, RunReport};

/// JSON report format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JsonFormat {
    /// Compact JSON (single line, minimal whitespace).
    Compact,
    /// Pretty-printed JSON with indentation.
    #[default]
    Pretty,
}

/// JSON report generator.
#[derive(Debug, Clone, Default)]
pub struct JsonReportGenerator {
    format: JsonFormat,
}

impl JsonReportGenerator {
    /// Create a generator producing pretty-printed JSON.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(format: JsonFormat) -> Self {
        Self { format }
    }

    /// Generate the JSON report as a string.
    #[instrument(skip(self, report), fields(target_name = %report.target))]
    pub fn generate(&self, report: &RunReport) -> Result<String, ReportError> {
        let json = match self.format {
            JsonFormat::Compact => serde_json::to_string(report)?,
            JsonFormat::Pretty => serde_json::to_string_pretty(report)?,
        };
        Ok(json)
    }

    /// Generate the JSON report and write it to a file.
    #[instrument(skip(self, report), fields(target_name = %report.target, path = %path.as_ref().display()))]
    pub fn generate_to_file(
        &self,
        report: &RunReport,
        path: impl AsRef<Path>,
    ) -> Result<(), ReportError> {
        let json = self.generate(report)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Generate the JSON report into a writer.
    #[instrument(skip(self, report, writer), fields(target_name = %report.target))]
    pub fn generate_to_writer<W: Write>(
        &self,
        report: &RunReport,
        mut writer: W,
    ) -> Result<(), ReportError> {
        match self.format {
            JsonFormat::Compact => {
                let mut serializer = Serializer::with_formatter(&mut writer, CompactFormatter);
                report.serialize(&mut serializer)?;
            }
            JsonFormat::Pretty => {
                let mut serializer = Serializer::with_formatter(&mut writer, PrettyFormatter::new());
                report.serialize(&mut serializer)?;
            }
        }
        Ok(())
    }

    /// Read a report previously written by [`generate`](Self::generate).
    pub fn parse(json: &str) -> Result<RunReport, ReportError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{fixtures, ReportOutcome};
    use linprobe_core::CheckConfig;
    use linprobe_runner::CheckError;

    fn failed_report() -> RunReport {
        let result = Err(CheckError::Violation(Box::new(fixtures::failure())));
        RunReport::from_result("racy-set", &CheckConfig::default(), &result)
    }

    #[test]
    fn test_json_generation() {
        let json = JsonReportGenerator::new().generate(&failed_report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["target"], "racy-set");
        assert_eq!(value["outcome"]["status"], "failed");
        assert_eq!(value["outcome"]["failure"]["kind"]["kind"], "violation");
        assert_eq!(value["outcome"]["failure"]["seed"], 7);
        assert!(json.contains('\n'));
    }

    #[test]
    fn test_compact_is_single_line() {
        let report = RunReport::from_result(
            "locked-set",
            &CheckConfig::default(),
            &Ok(fixtures::summary()),
        );
        let json = JsonReportGenerator::with_format(JsonFormat::Compact)
            .generate(&report)
            .unwrap();
        assert!(!json.contains('\n'));
        assert!(json.contains("\"status\":\"passed\""));
    }

    #[test]
    fn test_report_round_trips_through_file() {
        let report = failed_report();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        JsonReportGenerator::new()
            .generate_to_file(&report, &path)
            .unwrap();
        let parsed = JsonReportGenerator::parse(&std::fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(parsed, report);
        assert!(matches!(parsed.outcome, ReportOutcome::Failed { .. }));
    }

    #[test]
    fn test_writer_matches_string() {
        let report = failed_report();
        let generator = JsonReportGenerator::with_format(JsonFormat::Compact);
        let mut buffer = Vec::new();
        generator.generate_to_writer(&report, &mut buffer).unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap(), generator.generate(&report).unwrap());
    }
}
