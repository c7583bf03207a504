//! Binding Conformance - structural checks for generated API client bindings
//!
//! Architecture: Clean Architecture - Library interface serves as the application layer
//! - Inventory loading turns binding sources into a read-only class library
//! - Rules run as pure traversals over that library and collect violations
//! - Pipeline API turns a failing report into a hard failure for build gates

pub mod config;
pub mod domain;
pub mod inventory;
pub mod report;
pub mod rules;

// Re-export main types for convenient access
pub use domain::inventory::{
    BindingLibrary, ClassDescriptor, ClassKind, ExternalType, MethodSignature, Modifiers, Parameter,
    Visibility,
};
pub use domain::violations::{
    CheckSummary, ConformanceError, ConformanceReport, ConformanceResult, Severity, Violation,
};

pub use config::{ConfigBuilder, ConformanceConfig, NamespaceScope};

pub use inventory::InventoryLoader;

pub use report::{OutputFormat, ReportFormatter, ReportOptions};

pub use rules::{Capability, Check, RuleEngine, Selection, SkipReason};

use std::path::Path;

/// Main checker providing high-level conformance operations
pub struct ConformanceChecker {
    engine: RuleEngine,
    report_formatter: ReportFormatter,
}

/// Options for a check over inventory paths
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// Which checks to run
    pub check: Check,
    /// Exclude patterns added to the configured ones
    pub exclude_patterns: Vec<String>,
}

impl ConformanceChecker {
    /// Create a new checker with the given configuration
    pub fn new_with_config(config: ConformanceConfig) -> ConformanceResult<Self> {
        config.validate()?;
        Ok(Self {
            engine: RuleEngine::new(config),
            report_formatter: ReportFormatter::default(),
        })
    }

    /// Create a checker with default configuration
    pub fn new() -> ConformanceResult<Self> {
        Self::new_with_config(ConformanceConfig::default())
    }

    /// Create a checker loading configuration from file
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> ConformanceResult<Self> {
        let config = ConformanceConfig::load_from_file(path)?;
        Self::new_with_config(config)
    }

    /// Set custom report formatter
    pub fn with_report_formatter(mut self, formatter: ReportFormatter) -> Self {
        self.report_formatter = formatter;
        self
    }

    pub fn config(&self) -> &ConformanceConfig {
        self.engine.config()
    }

    /// Load the inventory under `paths`, failing on the first unloadable file
    pub fn load_inventory<P: AsRef<Path>>(
        &self,
        paths: &[P],
        extra_excludes: &[String],
    ) -> ConformanceResult<BindingLibrary> {
        InventoryLoader::new(&self.config().inventory)?
            .with_excludes(extra_excludes)?
            .load_paths(paths)
    }

    /// Run checks over an already-loaded library
    pub fn check_library(&self, library: &BindingLibrary, check: Check) -> ConformanceResult<ConformanceReport> {
        self.engine.run(library, check)
    }

    /// Load the inventory under `paths` and run checks over it
    pub fn check_paths<P: AsRef<Path>>(
        &self,
        paths: &[P],
        options: &CheckOptions,
    ) -> ConformanceResult<ConformanceReport> {
        let start_time = std::time::Instant::now();
        let library = self.load_inventory(paths, &options.exclude_patterns)?;
        let mut report = self.check_library(&library, options.check)?;
        report.set_execution_time(start_time.elapsed().as_millis() as u64);
        Ok(report)
    }

    /// Descendants of a base capability within its configured namespace
    pub fn enumerate<'a>(
        &self,
        library: &'a BindingLibrary,
        capability: Capability,
    ) -> ConformanceResult<Vec<&'a ClassDescriptor>> {
        self.engine.enumerate(library, capability)
    }

    /// Format a report for output
    pub fn format_report(&self, report: &ConformanceReport, format: OutputFormat) -> ConformanceResult<String> {
        self.report_formatter.format_report(report, format)
    }

    /// Write a formatted report to `writer`
    pub fn write_report<W: std::io::Write>(
        &self,
        report: &ConformanceReport,
        format: OutputFormat,
        writer: W,
    ) -> ConformanceResult<()> {
        self.report_formatter.write_report(report, format, writer)
    }
}

/// Create a checker with default configuration
pub fn create_checker() -> ConformanceResult<ConformanceChecker> {
    ConformanceChecker::new()
}

/// Run every check over the inventory under `paths` with default configuration
pub fn check_paths<P: AsRef<Path>>(paths: &[P]) -> ConformanceResult<ConformanceReport> {
    create_checker()?.check_paths(paths, &CheckOptions::default())
}

/// Build-pipeline entry points
pub mod pipeline {
    use super::*;

    /// Gate over `paths` using the discovered configuration
    ///
    /// Fails with a validation error listing every violation when the run
    /// does not pass; load and introspection errors propagate unchanged.
    pub fn gate<P: AsRef<Path>>(paths: &[P]) -> ConformanceResult<ConformanceReport> {
        let config = ConformanceConfig::discover(None)?;
        gate_with_config(config, paths)
    }

    /// Gate over `paths` with an explicit configuration
    pub fn gate_with_config<P: AsRef<Path>>(
        config: ConformanceConfig,
        paths: &[P],
    ) -> ConformanceResult<ConformanceReport> {
        let checker = ConformanceChecker::new_with_config(config)?;
        let report = checker.check_paths(paths, &CheckOptions::default())?;

        if !report.is_passing() {
            return Err(ConformanceError::validation(format!(
                "{} conformance violation(s):\n{}",
                report.violations.len(),
                report.violation_listing()
            )));
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"
classes:
  - name: com.stripe.model.StripeObject
    kind: interface
  - name: com.stripe.net.APIResource
    modifiers: { abstract: true }
    implements: [com.stripe.model.StripeObject]
  - name: com.stripe.net.RequestOptions
    modifiers: { final: true }
  - name: com.stripe.net.Charge
    extends: com.stripe.net.APIResource
    modifiers: { final: true }
    methods:
      - name: create
        static: true
        return_type: com.stripe.net.Charge
        parameters:
          - { type: "java.util.Map<String, Object>" }
      - name: capture
        return_type: com.stripe.net.Charge
        parameters:
          - { name: id, type: java.lang.String }
      - name: getCardById
        parameters:
          - { type: java.lang.String }
  - name: com.stripe.model.Card
    implements: [com.stripe.model.StripeObject]
external:
  - name: java.util.Map
"#;

    fn write_manifest(dir: &TempDir) {
        fs::write(dir.path().join("sdk.inventory.yaml"), MANIFEST).unwrap();
    }

    #[test]
    fn test_checker_creation() {
        let checker = ConformanceChecker::new().unwrap();
        assert_eq!(checker.config().version, "1.0");
    }

    #[test]
    fn test_check_manifest_inventory() {
        let dir = TempDir::new().unwrap();
        write_manifest(&dir);

        let report = check_paths(&[dir.path()]).unwrap();
        let messages: Vec<&str> = report.violations.iter().map(|v| v.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Methods on APIResources like Charge.capture(java.lang.String) should take a final parameter as a RequestOptions parameter.",
                "Class com.stripe.model.Card should be either abstract or final, but isn't.",
            ]
        );
        assert!(report.violations[0]
            .source
            .as_ref()
            .is_some_and(|p| p.ends_with("sdk.inventory.yaml")));
    }

    #[test]
    fn test_checks_can_run_individually() {
        let dir = TempDir::new().unwrap();
        write_manifest(&dir);
        let checker = ConformanceChecker::new().unwrap();
        let library = checker.load_inventory(&[dir.path()], &[]).unwrap();

        let options = checker.check_library(&library, Check::TrailingOptions).unwrap();
        assert_eq!(options.violations.len(), 1);
        let sealing = checker.check_library(&library, Check::SealedModels).unwrap();
        assert_eq!(sealing.violations.len(), 1);

        let resources = checker.enumerate(&library, Capability::Resource).unwrap();
        assert_eq!(resources.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(), vec!["com.stripe.net.Charge"]);
    }

    #[test]
    fn test_repeated_runs_are_identical() {
        let dir = TempDir::new().unwrap();
        write_manifest(&dir);
        let checker = ConformanceChecker::new().unwrap();

        let first = checker.check_paths(&[dir.path()], &CheckOptions::default()).unwrap();
        let second = checker.check_paths(&[dir.path()], &CheckOptions::default()).unwrap();
        assert_eq!(first.violation_listing(), second.violation_listing());
    }

    #[test]
    fn test_broken_inventory_aborts_without_report() {
        let dir = TempDir::new().unwrap();
        write_manifest(&dir);
        fs::write(dir.path().join("broken.inventory.json"), "{ not json").unwrap();

        let err = check_paths(&[dir.path()]).unwrap_err();
        assert!(err.is_load_failure());
    }

    #[test]
    fn test_extra_excludes_skip_files() {
        let dir = TempDir::new().unwrap();
        write_manifest(&dir);
        fs::write(dir.path().join("broken.inventory.json"), "{ not json").unwrap();

        let checker = ConformanceChecker::new().unwrap();
        let options = CheckOptions {
            exclude_patterns: vec!["broken.inventory.json".to_string()],
            ..Default::default()
        };
        assert!(checker.check_paths(&[dir.path()], &options).is_ok());
    }

    #[test]
    fn test_rust_sources() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("net")).unwrap();
        fs::create_dir_all(src.join("model")).unwrap();
        fs::write(
            src.join("net/mod.rs"),
            "pub trait ApiResource {}\npub struct RequestOptions;\n",
        )
        .unwrap();
        fs::write(
            src.join("net/charge.rs"),
            r#"
use std::collections::HashMap;
use super::{ApiResource, RequestOptions};

pub struct Charge;

impl ApiResource for Charge {}

impl Charge {
    pub fn create(params: &HashMap<String, String>, options: Option<&RequestOptions>) -> Charge { Charge }
    pub fn list(params: &HashMap<String, String>) -> Vec<Charge> { Vec::new() }
    pub fn capture(&self, amount: u64) -> Charge { Charge }
    pub fn get_amount(&self, currency: &str) -> u64 { 0 }
}
"#,
        )
        .unwrap();
        fs::write(src.join("model/mod.rs"), "pub trait Model {}\n").unwrap();
        fs::write(
            src.join("model/card.rs"),
            "use super::Model;\npub struct Card;\nimpl Model for Card {}\n",
        )
        .unwrap();

        let config = ConfigBuilder::new()
            .capabilities("crate::net::ApiResource", "crate::model::Model")
            .options_type("crate::net::RequestOptions")
            .string_type("str")
            .map_types(vec!["std::collections::HashMap".to_string()])
            .accessor_prefixes(vec!["get_".to_string(), "set_".to_string()])
            .include_nested(true)
            .build()
            .unwrap();
        let checker = ConformanceChecker::new_with_config(config).unwrap();
        let report = checker.check_paths(&[dir.path()], &CheckOptions::default()).unwrap();

        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].class_name, "crate::net::charge::Charge");
        assert_eq!(
            report.violations[0].message,
            "Methods on ApiResources like Charge.capture(u64) should take a final parameter as a RequestOptions parameter."
        );
    }

    #[test]
    fn test_pipeline_gate() {
        let dir = TempDir::new().unwrap();
        write_manifest(&dir);

        let err = pipeline::gate_with_config(ConformanceConfig::default(), &[dir.path()]).unwrap_err();
        assert!(matches!(err, ConformanceError::Validation { .. }));
        assert!(err.to_string().contains("com.stripe.model.Card"));

        let mut config = ConformanceConfig::default();
        config.rules.trailing_options.exemptions.push(config::MethodExemption {
            method: "capture".to_string(),
            parameter: None,
            reason: None,
        });
        config.rules.sealed_models.enabled = false;
        assert!(pipeline::gate_with_config(config, &[dir.path()]).unwrap().is_passing());
    }

    #[test]
    fn test_report_formatting() {
        let dir = TempDir::new().unwrap();
        write_manifest(&dir);
        let checker = ConformanceChecker::new().unwrap().with_report_formatter(ReportFormatter::new(
            ReportOptions {
                use_colors: false,
                ..Default::default()
            },
        ));
        let report = checker.check_paths(&[dir.path()], &CheckOptions::default()).unwrap();

        let human = checker.format_report(&report, OutputFormat::Human).unwrap();
        assert!(human.contains("Binding Conformance Violations Found"));
        let json = checker.format_report(&report, OutputFormat::Json).unwrap();
        assert!(json.contains("\"passed\": false"));
    }
}
