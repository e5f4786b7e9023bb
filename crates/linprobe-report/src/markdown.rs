//! Markdown report generation.
//!
//! Failures render as a reproduction document: the seed, the scenario in
//! per-thread columns, the recorded history and either the longest
//! linearizable prefix or the unexpected exception.

use std::io::Write;
use std::path::Path;

use tracing::instrument;

use linprobe_core::CheckConfig;
use linprobe_runner::{Failure, FailureKind, RunSummary};

use crate::types::{ReportError, ReportOutcome, RunReport};

/// Markdown report generator.
#[derive(Debug, Clone, Default)]
pub struct MarkdownReportGenerator {
    heading_offset: usize,
}

impl MarkdownReportGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shift every heading down by `offset` levels, for embedding the report
    /// in a larger document.
    pub fn with_heading_offset(mut self, offset: usize) -> Self {
        self.heading_offset = offset;
        self
    }

    /// Generate the Markdown report as a string.
    #[instrument(skip(self, report), fields(target_name = %report.target))]
    pub fn generate(&self, report: &RunReport) -> Result<String, ReportError> {
        let mut md = String::with_capacity(4096);

        let status = match &report.outcome {
            ReportOutcome::Passed { .. } => "PASSED",
            ReportOutcome::Failed { .. } => "FAILED",
            ReportOutcome::Error { .. } => "ERROR",
        };
        md.push_str(&format!(
            "{} linprobe: {} ({})\n\n",
            self.heading(1),
            escape_markdown(&report.target),
            status
        ));

        match &report.outcome {
            ReportOutcome::Passed { summary } => self.write_summary(&mut md, summary),
            ReportOutcome::Failed { failure } => self.write_failure(&mut md, failure),
            ReportOutcome::Error { message, exit_code } => {
                md.push_str(&format!("{} Error\n\n", self.heading(2)));
                md.push_str(&format!(
                    "The run stopped before checking completed (exit code {exit_code}):\n\n"
                ));
                md.push_str(&format!("> {}\n\n", escape_markdown(message)));
            }
        }

        self.write_configuration(&mut md, &report.config);

        md.push_str("---\n\n");
        md.push_str(&format!(
            "*Generated by linprobe-report v{} on {}*\n",
            env!("CARGO_PKG_VERSION"),
            report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        if let Some(run_id) = report.run_id() {
            md.push_str(&format!("\n*Run ID: `{run_id}`*\n"));
        }

        Ok(md)
    }

    /// Generate the Markdown report and write it to a file.
    #[instrument(skip(self, report), fields(target_name = %report.target, path = %path.as_ref().display()))]
    pub fn generate_to_file(
        &self,
        report: &RunReport,
        path: impl AsRef<Path>,
    ) -> Result<(), ReportError> {
        let md = self.generate(report)?;
        std::fs::write(path, md)?;
        Ok(())
    }

    /// Generate the Markdown report into a writer.
    #[instrument(skip(self, report, writer), fields(target_name = %report.target))]
    pub fn generate_to_writer<W: Write>(
        &self,
        report: &RunReport,
        mut writer: W,
    ) -> Result<(), ReportError> {
        let md = self.generate(report)?;
        writer.write_all(md.as_bytes())?;
        Ok(())
    }

    fn heading(&self, level: usize) -> String {
        "#".repeat(level + self.heading_offset)
    }

    fn write_summary(&self, md: &mut String, summary: &RunSummary) {
        md.push_str(&format!("{} Summary\n\n", self.heading(2)));
        md.push_str("| Metric | Value |\n");
        md.push_str("|--------|-------|\n");
        md.push_str(&format!("| **Model** | {} |\n", escape_markdown(&summary.model)));
        md.push_str(&format!("| **Seed** | {} |\n", summary.seed));
        md.push_str(&format!("| **Iterations** | {} |\n", summary.iterations));
        md.push_str(&format!("| **Executions** | {} |\n", summary.executions));
        md.push_str(&format!("| **Inconclusive** | {} |\n", summary.inconclusive));
        md.push_str(&format!("| **Timeouts** | {} |\n", summary.timeouts));
        md.push_str(&format!(
            "| **States explored** | {} |\n",
            summary.search.states_explored
        ));
        md.push_str(&format!("| **Memo hits** | {} |\n", summary.search.memo_hits));
        md.push_str(&format!("| **Duration** | {}ms |\n\n", summary.elapsed_ms));
    }

    fn write_failure(&self, md: &mut String, failure: &Failure) {
        md.push_str(&format!("{} {}\n\n", self.heading(2), failure.kind.title()));
        md.push_str(&format!(
            "Model `{}` failed in iteration {}. Replay with `seed = {}`.\n\n",
            failure.model, failure.iteration, failure.seed
        ));
        if let Some(stats) = &failure.minimization {
            md.push_str(&format!(
                "The scenario was minimized from {} to {} invocations in {} checks.\n\n",
                stats.original_size, stats.final_size, stats.checks_performed
            ));
        }

        md.push_str(&format!("{} Scenario\n\n", self.heading(3)));
        md.push_str("```text\n");
        md.push_str(&failure.scenario.to_string());
        md.push_str("```\n\n");

        md.push_str(&format!("{} History\n\n", self.heading(3)));
        md.push_str("```text\n");
        md.push_str(&failure.history.render_table());
        md.push_str("```\n\n");

        match &failure.kind {
            FailureKind::Violation {
                longest_prefix,
                stats,
            } => {
                md.push_str(&format!(
                    "{} Longest linearizable prefix\n\n",
                    self.heading(3)
                ));
                if longest_prefix.is_empty() {
                    md.push_str("No operation could be linearized first.\n\n");
                } else {
                    md.push_str("```text\n");
                    md.push_str(&longest_prefix.render(&failure.history));
                    md.push_str("```\n\n");
                }
                md.push_str(&format!(
                    "The search explored {} states ({} memo hits, {} mismatches).\n\n",
                    stats.states_explored, stats.memo_hits, stats.mismatches
                ));
            }
            FailureKind::UnexpectedException {
                actor,
                invocation,
                exception,
                message,
                ..
            } => {
                md.push_str(&format!("{} Exception\n\n", self.heading(3)));
                md.push_str(&format!(
                    "`{actor}: {invocation}` raised `{exception}`, which the operation does not declare.\n\n"
                ));
                if let Some(message) = message {
                    md.push_str(&format!("> {}\n\n", escape_markdown(message)));
                }
            }
        }
    }

    fn write_configuration(&self, md: &mut String, config: &CheckConfig) {
        md.push_str(&format!("{} Configuration\n\n", self.heading(2)));
        md.push_str("| Setting | Value |\n");
        md.push_str("|---------|-------|\n");
        md.push_str(&format!("| iterations | {} |\n", config.iterations));
        md.push_str(&format!(
            "| invocations_per_iteration | {} |\n",
            config.invocations_per_iteration
        ));
        md.push_str(&format!(
            "| actors_per_thread | {} |\n",
            escape_markdown(&config.actors_per_thread.join(", "))
        ));
        md.push_str(&format!("| actors_before | {} |\n", config.actors_before));
        md.push_str(&format!("| actors_after | {} |\n", config.actors_after));
        md.push_str(&format!("| timeout_ms | {} |\n", config.timeout_ms));
        if let Some(seed) = config.seed {
            md.push_str(&format!("| seed | {seed} |\n"));
        }
        md.push_str(&format!("| minimize | {} |\n", config.minimize));
        if let Some(max_states) = config.max_states {
            md.push_str(&format!("| max_states | {max_states} |\n"));
        }
        for (param, spec) in &config.params {
            md.push_str(&format!(
                "| params.{} | {} {} |\n",
                escape_markdown(param),
                escape_markdown(&spec.generator),
                escape_markdown(&spec.config)
            ));
        }
        md.push('\n');
    }
}

fn escape_markdown(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('`', "\\`")
        .replace('*', "\\*")
        .replace('_', "\\_")
        .replace('[', "\\[")
        .replace(']', "\\]")
        .replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures;
    use linprobe_core::{ActorId, ConfigError, ExceptionKind, Invocation};
    use linprobe_runner::CheckError;

    fn report(result: Result<RunSummary, CheckError>) -> RunReport {
        RunReport::from_result("racy-set", &CheckConfig::default(), &result)
    }

    #[test]
    fn test_violation_report() {
        let md = MarkdownReportGenerator::new()
            .generate(&report(Err(CheckError::Violation(Box::new(fixtures::failure())))))
            .unwrap();

        assert!(md.starts_with("# linprobe: racy-set (FAILED)\n"));
        assert!(md.contains("## Linearizability violation"));
        assert!(md.contains("Replay with `seed = 7`"));
        assert!(md.contains("| T0     | T1     |"));
        assert!(md.contains("### Longest linearizable prefix\n\n```text\nT0: add(1): true\n```"));
        assert!(md.contains("| seed | 7 |"));
        assert!(md.contains("*Run ID: `"));
    }

    #[test]
    fn test_unexpected_exception_report() {
        let mut failure = fixtures::failure();
        failure.kind = FailureKind::UnexpectedException {
            actor: ActorId(1),
            index: 0,
            invocation: Invocation::nullary("poll"),
            exception: ExceptionKind::new("panic"),
            message: Some("index out of bounds".into()),
        };
        let md = MarkdownReportGenerator::new()
            .generate(&report(Err(CheckError::UnexpectedException(Box::new(failure)))))
            .unwrap();

        assert!(md.contains("## Unexpected exception"));
        assert!(md.contains("`T1: poll()` raised `panic`"));
        assert!(md.contains("> index out of bounds"));
        assert!(!md.contains("Longest linearizable prefix"));
    }

    #[test]
    fn test_passed_and_error_reports() {
        let generator = MarkdownReportGenerator::new();
        let passed = generator.generate(&report(Ok(fixtures::summary()))).unwrap();
        assert!(passed.contains("(PASSED)"));
        assert!(passed.contains("| **Iterations** | 10 |"));

        let error = generator
            .generate(&report(Err(CheckError::from(ConfigError::NoThreads))))
            .unwrap();
        assert!(error.contains("(ERROR)"));
        assert!(error.contains("exit code 2"));
        assert!(!error.contains("Run ID"));
    }

    #[test]
    fn test_heading_offset() {
        let md = MarkdownReportGenerator::new()
            .with_heading_offset(1)
            .generate(&report(Ok(fixtures::summary())))
            .unwrap();
        assert!(md.starts_with("## linprobe"));
        assert!(md.contains("\n### Summary\n"));
    }

    #[test]
    fn test_markdown_escaping() {
        assert_eq!(escape_markdown("*bold*"), "\\*bold\\*");
        assert_eq!(escape_markdown("a|b"), "a\\|b");
        assert_eq!(escape_markdown("1:3"), "1:3");
    }
}
