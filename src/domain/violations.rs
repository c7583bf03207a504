//! Core domain models for conformance violations and check results
//!
//! Architecture: Rich Domain Models - Violations are entities with behavior, not just data
//! - Violations know which class and method they point at and can describe themselves
//! - ConformanceReport acts as an aggregate root managing the ordered violation list
//! - Run-level failures (load, introspection) are errors, never violations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Severity levels for conformance violations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational messages and suggestions
    Info,
    /// Warnings that should be addressed
    Warning,
    /// Errors that fail the build
    Error,
}

impl Severity {
    /// Convert to string for display
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// A conformance violation found on a binding class or method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Identifier of the rule that produced this violation
    pub rule_id: String,
    /// Severity level of this violation
    pub severity: Severity,
    /// Qualified name of the offending class
    pub class_name: String,
    /// Rendered signature of the offending method, if the rule is method-level
    pub method: Option<String>,
    /// Human-readable description, self-sufficient for locating the fix
    pub message: String,
    /// Suggested fix for the violation
    pub suggested_fix: Option<String>,
    /// Inventory file the class was loaded from
    pub source: Option<PathBuf>,
}

impl Violation {
    /// Create a new class-level violation
    pub fn new(
        rule_id: impl Into<String>,
        severity: Severity,
        class_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            severity,
            class_name: class_name.into(),
            method: None,
            message: message.into(),
            suggested_fix: None,
            source: None,
        }
    }

    /// Attach the offending method signature
    pub fn with_method(mut self, signature: impl Into<String>) -> Self {
        self.method = Some(signature.into());
        self
    }

    /// Add a suggested fix
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggested_fix = Some(suggestion.into());
        self
    }

    /// Record the inventory file the class came from
    pub fn with_source(mut self, source: Option<PathBuf>) -> Self {
        self.source = source;
        self
    }

    /// `Class` or `Class#method(..)` location string
    pub fn location(&self) -> String {
        match &self.method {
            Some(method) => format!("{}#{}", self.class_name, method),
            None => self.class_name.clone(),
        }
    }

    /// Format violation for display
    pub fn format_display(&self) -> String {
        format!(
            "{} [{}] {}: {}",
            self.location(),
            self.severity.as_str(),
            self.rule_id,
            self.message
        )
    }
}

/// Summary statistics for a conformance report
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckSummary {
    /// Number of classes visited across all checks
    pub classes_checked: usize,
    /// Number of methods that reached rule evaluation
    pub methods_checked: usize,
    /// Number of violations by severity level
    pub violations_by_severity: ViolationCounts,
    /// Total execution time in milliseconds
    pub execution_time_ms: u64,
    /// Timestamp when the check was performed
    pub checked_at: DateTime<Utc>,
}

/// Count of violations by severity level
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViolationCounts {
    pub error: usize,
    pub warning: usize,
    pub info: usize,
}

impl ViolationCounts {
    /// Total number of violations across all severities
    pub fn total(&self) -> usize {
        self.error + self.warning + self.info
    }

    /// Add a violation to the counts
    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Error => self.error += 1,
            Severity::Warning => self.warning += 1,
            Severity::Info => self.info += 1,
        }
    }
}

/// Ordered result of one conformance run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConformanceReport {
    /// Violations in check order, then class order, then method declaration order
    pub violations: Vec<Violation>,
    /// Summary statistics
    pub summary: CheckSummary,
    /// Fingerprint of the configuration used for this run
    pub config_fingerprint: Option<String>,
}

impl ConformanceReport {
    /// Create a new empty report
    pub fn new() -> Self {
        Self {
            violations: Vec::new(),
            summary: CheckSummary {
                checked_at: Utc::now(),
                ..Default::default()
            },
            config_fingerprint: None,
        }
    }

    /// Add a violation to the report
    pub fn add_violation(&mut self, violation: Violation) {
        self.summary.violations_by_severity.add(violation.severity);
        self.violations.push(violation);
    }

    /// Whether the report contains any violations
    pub fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }

    /// A run passes only when no violation of any severity was recorded
    pub fn is_passing(&self) -> bool {
        self.violations.is_empty()
    }

    /// Get violations of a specific severity
    pub fn violations_by_severity(&self, severity: Severity) -> impl Iterator<Item = &Violation> {
        self.violations
            .iter()
            .filter(move |v| v.severity == severity)
    }

    /// Get violations produced by one rule
    pub fn violations_for_rule<'a>(&'a self, rule_id: &'a str) -> impl Iterator<Item = &'a Violation> {
        self.violations.iter().filter(move |v| v.rule_id == rule_id)
    }

    /// Add to the number of classes visited
    pub fn record_classes(&mut self, count: usize) {
        self.summary.classes_checked += count;
    }

    /// Add to the number of methods evaluated
    pub fn record_methods(&mut self, count: usize) {
        self.summary.methods_checked += count;
    }

    /// Set the execution time
    pub fn set_execution_time(&mut self, duration_ms: u64) {
        self.summary.execution_time_ms = duration_ms;
    }

    /// Set the configuration fingerprint
    pub fn set_config_fingerprint(&mut self, fingerprint: impl Into<String>) {
        self.config_fingerprint = Some(fingerprint.into());
    }

    /// Merge another report into this one, keeping its violations after ours
    pub fn merge(&mut self, other: ConformanceReport) {
        for violation in other.violations {
            self.add_violation(violation);
        }
        self.summary.classes_checked += other.summary.classes_checked;
        self.summary.methods_checked += other.summary.methods_checked;
    }

    /// Render only the violation list, one line each
    ///
    /// Contains no timestamps, so repeated runs over the same inventory
    /// produce identical text.
    pub fn violation_listing(&self) -> String {
        self.violations
            .iter()
            .map(|v| format!("{}\n", v.format_display()))
            .collect()
    }
}

impl Default for ConformanceReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Error types that abort a conformance run
#[derive(Debug, thiserror::Error)]
pub enum ConformanceError {
    /// Configuration file could not be loaded or parsed
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// File could not be read or accessed
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Inventory entry could not be loaded into the binding library
    #[error("Load error in {path}: {message}")]
    Load { path: String, message: String },

    /// The checker's own assumptions about the library were broken
    #[error("Introspection error on {class}: {message}")]
    Introspection { class: String, message: String },

    /// A pipeline gate rejected the report
    #[error("Validation error: {message}")]
    Validation { message: String },
}

impl ConformanceError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a load error
    pub fn load(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Load {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an introspection error
    pub fn introspection(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Introspection {
            class: class.into(),
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Whether this error came from the environment rather than the checker config
    pub fn is_load_failure(&self) -> bool {
        matches!(self, Self::Load { .. } | Self::Io { .. })
    }
}

/// Result type for conformance operations
pub type ConformanceResult<T> = Result<T, ConformanceError>;
