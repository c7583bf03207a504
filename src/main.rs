//! Binding Conformance CLI - command-line interface for binding conformance checks
//!
//! Architecture: Application Layer - CLI coordinates user interactions with domain services
//! - Translates user commands to checker operations
//! - Handles external concerns like process exit codes and terminal output
//! - Run-level errors exit with a different code than conformance failures

use binding_conformance::config::{
    ConformanceConfig, DEFAULT_CONFIG_FILES, SEALED_MODELS_RULE, TRAILING_OPTIONS_RULE,
};
use binding_conformance::inventory::manifest::MANIFEST_SUFFIXES;
use binding_conformance::{
    Capability, Check, CheckOptions, ConformanceChecker, ConformanceError, ConformanceResult,
    OutputFormat, ReportFormatter, ReportOptions, Severity,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

/// Exit code of a passing run
const EXIT_PASS: i32 = 0;
/// Exit code of a run that found violations
const EXIT_VIOLATIONS: i32 = 1;
/// Exit code of a run that could not complete
const EXIT_ERROR: i32 = 2;

/// Binding Conformance - structural checks for generated API client bindings
#[derive(Parser)]
#[command(name = "binding-conformance")]
#[command(version)]
#[command(about = "Structural conformance checks for generated API client bindings")]
#[command(long_about = "Binding Conformance loads a binding library's class inventory and checks that API resource methods take a trailing options parameter and that domain objects are abstract or final. Designed for build and CI pipelines.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a binding inventory for conformance violations
    Check {
        /// Inventory paths (files or directories)
        paths: Vec<PathBuf>,

        /// Run only one of the checks
        #[arg(long, value_enum)]
        only: Option<CheckArg>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormatArg,

        /// Minimum severity level to report
        #[arg(short, long, value_enum)]
        severity: Option<SeverityArg>,

        /// Maximum number of violations to report
        #[arg(long)]
        max_violations: Option<usize>,

        /// Additional exclude patterns
        #[arg(long, action = clap::ArgAction::Append)]
        exclude: Vec<String>,
    },

    /// List the classes a check would visit
    Enumerate {
        /// Inventory paths (files or directories)
        paths: Vec<PathBuf>,

        /// Base capability to enumerate descendants of
        #[arg(long, value_enum)]
        capability: CapabilityArg,

        /// Namespace to enumerate instead of the configured one
        #[arg(long)]
        namespace: Option<String>,
    },

    /// Watch inventory files and re-run checks on change
    Watch {
        /// Path to watch (defaults to current directory)
        path: Option<PathBuf>,

        /// Debounce delay in milliseconds
        #[arg(long, default_value = "500")]
        delay: u64,
    },

    /// Validate configuration file
    ValidateConfig {
        /// Configuration file to validate
        config_file: Option<PathBuf>,
    },

    /// Explain what a specific rule does
    Explain {
        /// Rule ID to explain
        rule_id: String,
    },

    /// List rules and their configured state
    Rules,
}

#[derive(Copy, Clone, ValueEnum, PartialEq, Eq, Debug)]
enum CheckArg {
    Options,
    Sealing,
}

impl From<CheckArg> for Check {
    fn from(arg: CheckArg) -> Self {
        match arg {
            CheckArg::Options => Check::TrailingOptions,
            CheckArg::Sealing => Check::SealedModels,
        }
    }
}

#[derive(Copy, Clone, ValueEnum, PartialEq, Eq, Debug)]
enum CapabilityArg {
    Resource,
    Domain,
}

impl From<CapabilityArg> for Capability {
    fn from(arg: CapabilityArg) -> Self {
        match arg {
            CapabilityArg::Resource => Capability::Resource,
            CapabilityArg::Domain => Capability::Domain,
        }
    }
}

#[derive(Copy, Clone, ValueEnum, PartialEq, Eq, Debug)]
enum OutputFormatArg {
    Human,
    Json,
    Junit,
    Sarif,
    Github,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Human => OutputFormat::Human,
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::Junit => OutputFormat::Junit,
            OutputFormatArg::Sarif => OutputFormat::Sarif,
            OutputFormatArg::Github => OutputFormat::GitHub,
        }
    }
}

#[derive(Copy, Clone, ValueEnum, Debug)]
enum SeverityArg {
    Info,
    Warning,
    Error,
}

impl From<SeverityArg> for Severity {
    fn from(arg: SeverityArg) -> Self {
        match arg {
            SeverityArg::Info => Severity::Info,
            SeverityArg::Warning => Severity::Warning,
            SeverityArg::Error => Severity::Error,
        }
    }
}

/// Settings of one `check` invocation
struct CheckRequest {
    paths: Vec<PathBuf>,
    check: Check,
    format: OutputFormat,
    severity: Option<Severity>,
    max_violations: Option<usize>,
    exclude: Vec<String>,
    use_colors: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match run_command(cli).await {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(EXIT_ERROR);
        }
    }
}

async fn run_command(cli: Cli) -> ConformanceResult<i32> {
    let use_colors = !cli.no_color;
    match cli.command {
        Commands::Check {
            paths,
            only,
            format,
            severity,
            max_violations,
            exclude,
        } => {
            let config = ConformanceConfig::discover(cli.config.as_deref())?;
            let request = CheckRequest {
                paths,
                check: only.map(Check::from).unwrap_or_default(),
                format: format.into(),
                severity: severity.map(Severity::from),
                max_violations,
                exclude,
                use_colors,
            };
            run_check(config, &request, io::stdout().lock())
        }
        Commands::Enumerate {
            paths,
            capability,
            namespace,
        } => {
            let config = ConformanceConfig::discover(cli.config.as_deref())?;
            run_enumerate(config, paths, capability.into(), namespace)
        }
        Commands::Watch { path, delay } => run_watch(cli.config, path, delay, use_colors).await,
        Commands::ValidateConfig { config_file } => run_validate_config(config_file.or(cli.config)),
        Commands::Explain { rule_id } => run_explain(&rule_id),
        Commands::Rules => {
            let config = ConformanceConfig::discover(cli.config.as_deref())?;
            run_list_rules(&config)
        }
    }
}

fn default_paths(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    if paths.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        paths
    }
}

fn run_check<W: Write>(config: ConformanceConfig, request: &CheckRequest, out: W) -> ConformanceResult<i32> {
    let formatter = ReportFormatter::new(ReportOptions {
        use_colors: request.use_colors,
        max_violations: request.max_violations,
        min_severity: request.severity,
        ..Default::default()
    });
    let checker = ConformanceChecker::new_with_config(config)?.with_report_formatter(formatter);

    let options = CheckOptions {
        check: request.check,
        exclude_patterns: request.exclude.clone(),
    };
    let paths = default_paths(request.paths.clone());
    let report = checker.check_paths(&paths, &options)?;

    checker.write_report(&report, request.format, out)?;

    // Any violation fails the run, including ones filtered out of the output.
    if report.is_passing() {
        Ok(EXIT_PASS)
    } else {
        Ok(EXIT_VIOLATIONS)
    }
}

fn run_enumerate(
    mut config: ConformanceConfig,
    paths: Vec<PathBuf>,
    capability: Capability,
    namespace: Option<String>,
) -> ConformanceResult<i32> {
    if let Some(namespace) = namespace {
        match capability {
            Capability::Resource => config.rules.trailing_options.namespace = Some(namespace),
            Capability::Domain => config.rules.sealed_models.namespace = Some(namespace),
        }
    }

    let checker = ConformanceChecker::new_with_config(config)?;
    let library = checker.load_inventory(&default_paths(paths), &[])?;
    let classes = checker.enumerate(&library, capability)?;

    for class in &classes {
        println!("{}", class.name);
    }
    eprintln!("{} {} classes", classes.len(), capability);
    Ok(EXIT_PASS)
}

async fn run_watch(
    config_path: Option<PathBuf>,
    path: Option<PathBuf>,
    delay_ms: u64,
    use_colors: bool,
) -> ConformanceResult<i32> {
    use notify::{Event, RecursiveMode, Result as NotifyResult, Watcher};
    use tokio::sync::mpsc;

    let watch_path = path.unwrap_or_else(|| PathBuf::from("."));

    println!("Starting binding conformance watch mode...");
    println!("Watching: {}", watch_path.display());
    println!("Debounce delay: {delay_ms}ms");
    println!("Press Ctrl+C to stop watching\n");

    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut watcher = notify::recommended_watcher(move |res: NotifyResult<Event>| match res {
        Ok(event) => {
            if tx.send(event).is_err() {
                tracing::debug!("Watch channel closed");
            }
        }
        Err(e) => tracing::warn!("Watch error: {}", e),
    })
    .map_err(|e| ConformanceError::config(format!("Failed to create file watcher: {e}")))?;

    watcher
        .watch(&watch_path, RecursiveMode::Recursive)
        .map_err(|e| {
            ConformanceError::config(format!("Failed to watch path '{}': {}", watch_path.display(), e))
        })?;

    let debounce = Duration::from_millis(delay_ms);
    run_watch_check(config_path.as_deref(), &watch_path, use_colors);

    while let Some(event) = rx.recv().await {
        if !should_trigger_check(&event) {
            continue;
        }

        // Collapse a burst of events into one run.
        tokio::time::sleep(debounce).await;
        while rx.try_recv().is_ok() {}

        println!("Changes detected, re-running checks...");
        run_watch_check(config_path.as_deref(), &watch_path, use_colors);
    }

    Ok(EXIT_PASS)
}

/// Whether an event touches an inventory or configuration file
fn should_trigger_check(event: &notify::Event) -> bool {
    use notify::EventKind;

    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {}
        _ => return false,
    }

    event.paths.iter().any(|path| is_watched_file(path))
}

fn is_watched_file(path: &Path) -> bool {
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if DEFAULT_CONFIG_FILES.contains(&file_name) {
        return true;
    }
    let lower = file_name.to_lowercase();
    lower.ends_with(".rs")
        || MANIFEST_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix))
}

/// One full, independent check run for watch mode; failures are printed, never fatal
fn run_watch_check(config_path: Option<&Path>, watch_path: &Path, use_colors: bool) {
    let config = match ConformanceConfig::discover(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return;
        }
    };

    let request = CheckRequest {
        paths: vec![watch_path.to_path_buf()],
        check: Check::All,
        format: OutputFormat::Human,
        severity: None,
        max_violations: None,
        exclude: Vec::new(),
        use_colors,
    };
    if let Err(e) = run_check(config, &request, io::stdout().lock()) {
        eprintln!("Check could not complete: {e}");
    }
    println!("Watching for changes... (Press Ctrl+C to stop)\n");
}

fn run_validate_config(config_path: Option<PathBuf>) -> ConformanceResult<i32> {
    let config_path = config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILES[0]));

    println!("Validating configuration: {}", config_path.display());

    match ConformanceConfig::load_from_file(&config_path) {
        Ok(config) => {
            println!("Configuration is valid");
            println!("Configuration summary:");
            println!("  Resource capability: {} in {}", config.capabilities.resource, config.resource_scope());
            println!("  Domain capability: {} in {}", config.capabilities.domain, config.domain_scope());
            println!("  Options type: {}", config.capabilities.options);
            println!(
                "  Exemptions: {}",
                config.rules.trailing_options.exemptions.len()
            );
            println!("  Exclude patterns: {}", config.inventory.exclude.len());
            println!("  Fingerprint: {}", config.fingerprint());
            Ok(EXIT_PASS)
        }
        Err(e) => {
            eprintln!("Configuration validation failed: {e}");
            Ok(EXIT_VIOLATIONS)
        }
    }
}

fn run_explain(rule_id: &str) -> ConformanceResult<i32> {
    let config = ConformanceConfig::default();

    match rule_id {
        TRAILING_OPTIONS_RULE => {
            let rule = &config.rules.trailing_options;
            println!("Rule: {TRAILING_OPTIONS_RULE}");
            println!("Default severity: {}", rule.severity.as_str());
            println!();
            println!("Every method declared on an API resource class must take the options type");
            println!("as its final parameter. Methods are considered in this order and the first");
            println!("matching exclusion wins:");
            println!("  1. declared on an ancestor (checked on that ancestor instead)");
            println!("  2. name starts with an accessor prefix ({})", rule.accessor_prefixes.join(", "));
            println!("  3. a same-signature declaration with a more specific return type exists");
            println!("  4. private");
            println!("  5. deprecated");
            println!("  6. no parameters");
            println!("  7. a single key-value map parameter");
            println!("  8. a documented single-string exemption:");
            for exemption in &rule.exemptions {
                println!(
                    "       {}({}){}",
                    exemption.method,
                    exemption.parameter.as_deref().unwrap_or(&config.capabilities.string),
                    exemption
                        .reason
                        .as_ref()
                        .map(|r| format!(" - {r}"))
                        .unwrap_or_default()
                );
            }
            Ok(EXIT_PASS)
        }
        SEALED_MODELS_RULE => {
            let rule = &config.rules.sealed_models;
            println!("Rule: {SEALED_MODELS_RULE}");
            println!("Default severity: {}", rule.severity.as_str());
            println!();
            println!("Every domain object class must be declared abstract or final.");
            Ok(EXIT_PASS)
        }
        other => {
            eprintln!("Rule '{other}' not found");
            println!();
            println!("Available rules:");
            println!("  - {TRAILING_OPTIONS_RULE}");
            println!("  - {SEALED_MODELS_RULE}");
            Ok(EXIT_VIOLATIONS)
        }
    }
}

fn run_list_rules(config: &ConformanceConfig) -> ConformanceResult<i32> {
    println!("Available Rules\n");

    let trailing = &config.rules.trailing_options;
    println!(
        "{} {} [{}] - methods of {} descendants in {} end with {}",
        if trailing.enabled { "enabled " } else { "disabled" },
        TRAILING_OPTIONS_RULE,
        trailing.severity.as_str(),
        config.capabilities.resource,
        config.resource_scope(),
        config.capabilities.options
    );

    let sealed = &config.rules.sealed_models;
    println!(
        "{} {} [{}] - {} descendants in {} are abstract or final",
        if sealed.enabled { "enabled " } else { "disabled" },
        SEALED_MODELS_RULE,
        sealed.severity.as_str(),
        config.capabilities.domain,
        config.domain_scope()
    );

    Ok(EXIT_PASS)
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
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
  - name: com.stripe.net.RequestOptions
  - name: com.stripe.net.Charge
    extends: com.stripe.net.APIResource
    methods:
      - name: capture
        parameters:
          - { type: java.lang.String }
  - name: com.stripe.model.Card
    implements: [com.stripe.model.StripeObject]
    modifiers: { final: true }
"#;

    fn request(paths: Vec<PathBuf>, check: Check) -> CheckRequest {
        CheckRequest {
            paths,
            check,
            format: OutputFormat::Json,
            severity: None,
            max_violations: None,
            exclude: Vec::new(),
            use_colors: false,
        }
    }

    #[test]
    fn test_check_command() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("sdk.inventory.yaml"), MANIFEST).unwrap();
        let paths = vec![temp_dir.path().to_path_buf()];

        let mut out = Vec::new();
        let result = run_check(ConformanceConfig::default(), &request(paths.clone(), Check::All), &mut out);
        assert_eq!(result.unwrap(), EXIT_VIOLATIONS);
        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json["passed"], false);
        assert_eq!(json["violations"][0]["class"], "com.stripe.net.Charge");

        let mut out = Vec::new();
        let result = run_check(ConformanceConfig::default(), &request(paths, Check::SealedModels), &mut out);
        assert_eq!(result.unwrap(), EXIT_PASS);
        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json["passed"], true);
    }

    #[tokio::test]
    async fn test_run_command_dispatches_subcommands() {
        let cli = Cli::try_parse_from(["binding-conformance", "explain", SEALED_MODELS_RULE]).unwrap();
        assert_eq!(run_command(cli).await.unwrap(), EXIT_PASS);

        let cli = Cli::try_parse_from(["binding-conformance", "explain", "nonexistent_rule"]).unwrap();
        assert_eq!(run_command(cli).await.unwrap(), EXIT_VIOLATIONS);

        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("binding_conformance.yaml");
        fs::write(&config_file, "version: \"9.9\"").unwrap();
        let cli = Cli::try_parse_from([
            "binding-conformance",
            "--config",
            config_file.to_str().unwrap(),
            "rules",
        ])
        .unwrap();
        assert!(run_command(cli).await.is_err());
    }

    #[test]
    fn test_check_load_error_is_run_error() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("bad.inventory.json"), "{").unwrap();

        let result = run_check(
            ConformanceConfig::default(),
            &request(vec![temp_dir.path().to_path_buf()], Check::All),
            io::sink(),
        );
        assert!(result.unwrap_err().is_load_failure());
    }

    #[test]
    fn test_enumerate_command() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("sdk.inventory.yaml"), MANIFEST).unwrap();

        let result = run_enumerate(
            ConformanceConfig::default(),
            vec![temp_dir.path().to_path_buf()],
            Capability::Resource,
            None,
        );
        assert_eq!(result.unwrap(), EXIT_PASS);
    }

    #[test]
    fn test_validate_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("binding_conformance.yaml");

        let yaml = serde_yaml::to_string(&ConformanceConfig::default()).unwrap();
        fs::write(&config_file, yaml).unwrap();
        assert_eq!(run_validate_config(Some(config_file.clone())).unwrap(), EXIT_PASS);

        fs::write(&config_file, "version: \"9.9\"").unwrap();
        assert_eq!(run_validate_config(Some(config_file)).unwrap(), EXIT_VIOLATIONS);
    }

    #[test]
    fn test_explain_rule() {
        assert_eq!(run_explain(TRAILING_OPTIONS_RULE).unwrap(), EXIT_PASS);
        assert_eq!(run_explain(SEALED_MODELS_RULE).unwrap(), EXIT_PASS);
        assert_eq!(run_explain("nonexistent_rule").unwrap(), EXIT_VIOLATIONS);
    }

    #[test]
    fn test_list_rules() {
        assert_eq!(run_list_rules(&ConformanceConfig::default()).unwrap(), EXIT_PASS);
    }

    #[test]
    fn test_watched_files() {
        assert!(is_watched_file(Path::new("src/net/charge.rs")));
        assert!(is_watched_file(Path::new("gen/net.inventory.json")));
        assert!(is_watched_file(Path::new("binding_conformance.yaml")));
        assert!(!is_watched_file(Path::new("README.md")));
    }

    #[test]
    fn test_cli_parses_check_flags() {
        let cli = Cli::try_parse_from([
            "binding-conformance",
            "check",
            "gen",
            "--only",
            "sealing",
            "--format",
            "sarif",
            "--exclude",
            "**/legacy/**",
        ])
        .unwrap();

        match cli.command {
            Commands::Check { paths, only, format, exclude, .. } => {
                assert_eq!(paths, vec![PathBuf::from("gen")]);
                assert_eq!(only, Some(CheckArg::Sealing));
                assert_eq!(format, OutputFormatArg::Sarif);
                assert_eq!(exclude, vec!["**/legacy/**"]);
            }
            _ => panic!("expected check command"),
        }
    }
}
