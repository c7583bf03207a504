//! Report generation with multiple output formats
//!
//! Architecture: Anti-Corruption Layer - Formatters translate domain objects to external formats
//! - ConformanceReport (domain) is converted to various external representations
//! - Each formatter encapsulates the rules for its specific output format
//! - Violations keep report order in every format

use crate::domain::violations::{ConformanceError, ConformanceReport, ConformanceResult, Severity, Violation};
use serde_json::Value as JsonValue;
use std::io::Write;

/// Supported output formats for conformance reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable format with optional colors
    Human,
    /// JSON format for programmatic consumption
    Json,
    /// JUnit XML format for CI/CD integration
    Junit,
    /// SARIF format for code scanning tools
    Sarif,
    /// GitHub Actions format for workflow integration
    GitHub,
}

impl OutputFormat {
    /// Parse format from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "human" => Some(Self::Human),
            "json" => Some(Self::Json),
            "junit" => Some(Self::Junit),
            "sarif" => Some(Self::Sarif),
            "github" => Some(Self::GitHub),
            _ => None,
        }
    }

    /// Get all available format names
    pub fn all_formats() -> &'static [&'static str] {
        &["human", "json", "junit", "sarif", "github"]
    }
}

/// Options for customizing report output
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Whether to use colored output (for human format)
    pub use_colors: bool,
    /// Whether to show violation suggestions
    pub show_suggestions: bool,
    /// Maximum number of violations to include
    pub max_violations: Option<usize>,
    /// Minimum severity level to include
    pub min_severity: Option<Severity>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            use_colors: true,
            show_suggestions: true,
            max_violations: None,
            min_severity: None,
        }
    }
}

/// Terminal styling for the human format
#[derive(Debug, Clone, Copy)]
enum Style {
    Bold,
    Dim,
    Red,
    Yellow,
    Green,
    Cyan,
}

/// Main report formatter that dispatches to specific formatters
#[derive(Debug, Clone, Default)]
pub struct ReportFormatter {
    options: ReportOptions,
}

impl ReportFormatter {
    /// Create a new report formatter with options
    pub fn new(options: ReportOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ReportOptions {
        &self.options
    }

    /// Format a conformance report in the specified format
    pub fn format_report(&self, report: &ConformanceReport, format: OutputFormat) -> ConformanceResult<String> {
        let filtered_violations = self.filter_violations(&report.violations);

        match format {
            OutputFormat::Human => Ok(self.format_human(report, &filtered_violations)),
            OutputFormat::Json => self.format_json(report, &filtered_violations),
            OutputFormat::Junit => Ok(self.format_junit(report, &filtered_violations)),
            OutputFormat::Sarif => self.format_sarif(&filtered_violations),
            OutputFormat::GitHub => Ok(self.format_github(&filtered_violations)),
        }
    }

    /// Write a formatted report to a writer, newline-terminated
    pub fn write_report<W: Write>(
        &self,
        report: &ConformanceReport,
        format: OutputFormat,
        mut writer: W,
    ) -> ConformanceResult<()> {
        let formatted = self.format_report(report, format)?;
        writeln!(writer, "{formatted}")?;
        writer.flush()?;
        Ok(())
    }

    fn filter_violations<'a>(&self, violations: &'a [Violation]) -> Vec<&'a Violation> {
        let mut filtered: Vec<&Violation> = violations
            .iter()
            .filter(|v| self.options.min_severity.map_or(true, |min| v.severity >= min))
            .collect();

        if let Some(max) = self.options.max_violations {
            filtered.truncate(max);
        }

        filtered
    }

    fn paint(&self, text: &str, style: Style) -> String {
        if !self.options.use_colors {
            return text.to_string();
        }
        style_text(text, style)
    }

    fn format_human(&self, report: &ConformanceReport, violations: &[&Violation]) -> String {
        let mut output = String::new();

        if violations.is_empty() {
            output.push_str(&self.paint("No conformance violations found", Style::Green));
            output.push('\n');
        } else {
            let header_style = if report.summary.violations_by_severity.error > 0 {
                Style::Red
            } else {
                Style::Yellow
            };
            output.push_str(&self.paint("Binding Conformance Violations Found", header_style));
            output.push_str("\n\n");

            // Consecutive violations on one class share a heading; report order is kept.
            let mut current_class: Option<&str> = None;
            for violation in violations {
                if current_class != Some(violation.class_name.as_str()) {
                    if current_class.is_some() {
                        output.push('\n');
                    }
                    output.push_str(&self.paint(&violation.class_name, Style::Bold));
                    if let Some(source) = &violation.source {
                        output.push_str(&self.paint(&format!(" ({})", source.display()), Style::Dim));
                    }
                    output.push('\n');
                    current_class = Some(violation.class_name.as_str());
                }

                let severity_style = match violation.severity {
                    Severity::Error => Style::Red,
                    Severity::Warning => Style::Yellow,
                    Severity::Info => Style::Cyan,
                };
                output.push_str(&format!(
                    "  {} [{}] {}\n",
                    self.paint(&violation.rule_id, Style::Dim),
                    self.paint(violation.severity.as_str(), severity_style),
                    violation.message
                ));

                if self.options.show_suggestions {
                    if let Some(suggestion) = &violation.suggested_fix {
                        output.push_str(&format!("    {}\n", self.paint(&format!("fix: {suggestion}"), Style::Green)));
                    }
                }
            }
            output.push('\n');
        }

        output.push_str(&self.format_summary(report, violations.len()));
        output
    }

    fn format_json(&self, report: &ConformanceReport, violations: &[&Violation]) -> ConformanceResult<String> {
        let json_violations: Vec<JsonValue> = violations
            .iter()
            .map(|v| {
                serde_json::json!({
                    "rule_id": v.rule_id,
                    "severity": v.severity.as_str(),
                    "class": v.class_name,
                    "method": v.method,
                    "message": v.message,
                    "suggested_fix": v.suggested_fix,
                    "source": v.source.as_ref().map(|p| p.display().to_string()),
                })
            })
            .collect();

        let json_report = serde_json::json!({
            "passed": report.is_passing(),
            "violations": json_violations,
            "summary": {
                "classes_checked": report.summary.classes_checked,
                "methods_checked": report.summary.methods_checked,
                "violations_by_severity": {
                    "error": report.summary.violations_by_severity.error,
                    "warning": report.summary.violations_by_severity.warning,
                    "info": report.summary.violations_by_severity.info
                },
                "execution_time_ms": report.summary.execution_time_ms,
                "checked_at": report.summary.checked_at.to_rfc3339()
            },
            "config_fingerprint": report.config_fingerprint
        });

        serde_json::to_string_pretty(&json_report)
            .map_err(|e| ConformanceError::config(format!("JSON serialization failed: {e}")))
    }

    fn format_junit(&self, report: &ConformanceReport, violations: &[&Violation]) -> String {
        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");

        let failures = violations.iter().filter(|v| v.severity == Severity::Error).count();
        let execution_time = (report.summary.execution_time_ms as f64) / 1000.0;

        xml.push_str(&format!(
            "<testsuite name=\"binding-conformance\" tests=\"{}\" failures=\"{}\" errors=\"0\" time=\"{:.3}\">\n",
            violations.len(),
            failures,
            execution_time
        ));

        for violation in violations {
            xml.push_str(&format!(
                "  <testcase classname=\"{}\" name=\"{}\">\n",
                escape_xml(&violation.class_name),
                escape_xml(&format!("{}: {}", violation.rule_id, violation.location()))
            ));

            if violation.severity == Severity::Error {
                xml.push_str(&format!("    <failure message=\"{}\">\n", escape_xml(&violation.message)));
                if let Some(source) = &violation.source {
                    xml.push_str(&format!("      Source: {}\n", escape_xml(&source.display().to_string())));
                }
                if let Some(suggestion) = &violation.suggested_fix {
                    xml.push_str(&format!("      Fix: {}\n", escape_xml(suggestion)));
                }
                xml.push_str("    </failure>\n");
            }

            xml.push_str("  </testcase>\n");
        }

        xml.push_str("</testsuite>\n");
        xml
    }

    fn format_sarif(&self, violations: &[&Violation]) -> ConformanceResult<String> {
        let sarif_results: Vec<JsonValue> = violations
            .iter()
            .map(|v| {
                let level = match v.severity {
                    Severity::Error => "error",
                    Severity::Warning => "warning",
                    Severity::Info => "note",
                };

                let kind = if v.method.is_some() { "function" } else { "type" };
                let mut result = serde_json::json!({
                    "ruleId": v.rule_id,
                    "level": level,
                    "message": { "text": v.message },
                    "locations": [{
                        "logicalLocations": [{
                            "fullyQualifiedName": v.location(),
                            "kind": kind
                        }]
                    }]
                });
                if let Some(source) = &v.source {
                    result["locations"][0]["physicalLocation"] = serde_json::json!({
                        "artifactLocation": { "uri": source.display().to_string() }
                    });
                }
                result
            })
            .collect();

        let sarif_report = serde_json::json!({
            "version": "2.1.0",
            "$schema": "https://json.schemastore.org/sarif-2.1.0.json",
            "runs": [{
                "tool": {
                    "driver": {
                        "name": "binding-conformance",
                        "version": env!("CARGO_PKG_VERSION")
                    }
                },
                "results": sarif_results
            }]
        });

        serde_json::to_string_pretty(&sarif_report)
            .map_err(|e| ConformanceError::config(format!("SARIF serialization failed: {e}")))
    }

    fn format_github(&self, violations: &[&Violation]) -> String {
        let mut output = String::new();

        for violation in violations {
            let level = match violation.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
                Severity::Info => "notice",
            };

            let file_part = violation
                .source
                .as_ref()
                .map(|p| format!("file={},", p.display()))
                .unwrap_or_default();

            output.push_str(&format!(
                "::{} {}title={}::{}\n",
                level, file_part, violation.rule_id, violation.message
            ));
        }

        output
    }

    fn format_summary(&self, report: &ConformanceReport, shown: usize) -> String {
        let counts = &report.summary.violations_by_severity;
        let execution_time = (report.summary.execution_time_ms as f64) / 1000.0;
        let mut summary = self.paint("Summary:", Style::Bold);
        summary.push(' ');

        if counts.total() == 0 {
            summary.push_str(&self.paint("0 violations", Style::Green));
        } else {
            let mut parts = Vec::new();
            if counts.error > 0 {
                let text = format!("{} error{}", counts.error, if counts.error == 1 { "" } else { "s" });
                parts.push(self.paint(&text, Style::Red));
            }
            if counts.warning > 0 {
                let text = format!("{} warning{}", counts.warning, if counts.warning == 1 { "" } else { "s" });
                parts.push(self.paint(&text, Style::Yellow));
            }
            if counts.info > 0 {
                parts.push(self.paint(&format!("{} info", counts.info), Style::Cyan));
            }
            summary.push_str(&parts.join(", "));
        }

        summary.push_str(&format!(
            " across {} classes, {} methods ({:.1}s)\n",
            report.summary.classes_checked, report.summary.methods_checked, execution_time
        ));
        if shown < counts.total() {
            summary.push_str(&format!("({} of {} violations shown)\n", shown, counts.total()));
        }
        summary
    }
}

#[cfg(feature = "colors")]
fn style_text(text: &str, style: Style) -> String {
    use colored::Colorize;

    match style {
        Style::Bold => text.bold().to_string(),
        Style::Dim => text.dimmed().to_string(),
        Style::Red => text.red().to_string(),
        Style::Yellow => text.yellow().to_string(),
        Style::Green => text.green().to_string(),
        Style::Cyan => text.cyan().to_string(),
    }
}

#[cfg(not(feature = "colors"))]
fn style_text(text: &str, _style: Style) -> String {
    text.to_string()
}

/// Escape XML special characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
