//! Rule engine running the conformance checks over a loaded library
//!
//! Architecture: Service Layer - the engine orchestrates enumeration and rule evaluation
//! - Each check enumerates its capability's descendants, then visits them in name order
//! - Violations are collected into one report; load and introspection failures abort the run
//! - Checks are pure over the library, so repeated runs yield the same violation list

pub mod enumerate;
pub mod sealing;
pub mod trailing_options;

use crate::config::{ConformanceConfig, NamespaceScope, SEALED_MODELS_RULE, TRAILING_OPTIONS_RULE};
use crate::domain::inventory::{BindingLibrary, ClassDescriptor};
use crate::domain::violations::{ConformanceReport, ConformanceResult};
use std::fmt;
use std::str::FromStr;

pub use enumerate::descendants;
pub use sealing::SealedModelsCheck;
pub use trailing_options::{Selection, SkipReason, TrailingOptionsCheck};

/// Which checks a run performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Check {
    /// Trailing options parameter on API resource methods
    TrailingOptions,
    /// Abstract-or-final domain objects
    SealedModels,
    /// Both checks, trailing options first
    #[default]
    All,
}

impl Check {
    fn includes_trailing_options(self) -> bool {
        matches!(self, Self::TrailingOptions | Self::All)
    }

    fn includes_sealed_models(self) -> bool {
        matches!(self, Self::SealedModels | Self::All)
    }
}

impl FromStr for Check {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "options" | "trailing_options" => Ok(Self::TrailingOptions),
            "sealing" | "sealed_models" => Ok(Self::SealedModels),
            "all" => Ok(Self::All),
            other => Err(format!("Unknown check: {other}")),
        }
    }
}

/// The two base capabilities classes are enumerated by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Resource,
    Domain,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resource => f.write_str("resource"),
            Self::Domain => f.write_str("domain"),
        }
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "resource" => Ok(Self::Resource),
            "domain" => Ok(Self::Domain),
            other => Err(format!("Unknown capability: {other}")),
        }
    }
}

/// Runs configured checks against a binding library
#[derive(Debug, Clone)]
pub struct RuleEngine {
    config: ConformanceConfig,
}

impl RuleEngine {
    pub fn new(config: ConformanceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConformanceConfig {
        &self.config
    }

    /// Qualified capability name and namespace scope of a capability
    pub fn target(&self, capability: Capability) -> (&str, NamespaceScope) {
        match capability {
            Capability::Resource => (self.config.capabilities.resource.as_str(), self.config.resource_scope()),
            Capability::Domain => (self.config.capabilities.domain.as_str(), self.config.domain_scope()),
        }
    }

    /// Descendants of a capability within its configured scope
    pub fn enumerate<'a>(
        &self,
        library: &'a BindingLibrary,
        capability: Capability,
    ) -> ConformanceResult<Vec<&'a ClassDescriptor>> {
        let (name, scope) = self.target(capability);
        descendants(library, name, &scope)
    }

    /// Run `check` and collect every violation into one report
    pub fn run(&self, library: &BindingLibrary, check: Check) -> ConformanceResult<ConformanceReport> {
        let start_time = std::time::Instant::now();
        let mut report = ConformanceReport::new();
        report.set_config_fingerprint(self.config.fingerprint());

        if check.includes_trailing_options() {
            if self.config.rules.trailing_options.enabled {
                report.merge(self.run_trailing_options(library)?);
            } else {
                tracing::warn!("Rule {} is disabled; skipping", TRAILING_OPTIONS_RULE);
            }
        }

        if check.includes_sealed_models() {
            if self.config.rules.sealed_models.enabled {
                report.merge(self.run_sealed_models(library)?);
            } else {
                tracing::warn!("Rule {} is disabled; skipping", SEALED_MODELS_RULE);
            }
        }

        report.set_execution_time(start_time.elapsed().as_millis() as u64);
        Ok(report)
    }

    fn run_trailing_options(&self, library: &BindingLibrary) -> ConformanceResult<ConformanceReport> {
        let mut report = ConformanceReport::new();
        let classes = self.enumerate(library, Capability::Resource)?;
        let check = TrailingOptionsCheck::new(
            library,
            &self.config.capabilities,
            &self.config.rules.trailing_options,
        );

        for class in &classes {
            let (violations, subject) = check.check_class(class)?;
            report.record_methods(subject);
            for violation in violations {
                report.add_violation(violation);
            }
        }
        report.record_classes(classes.len());

        tracing::info!(
            "{}: {} resource classes, {} methods checked, {} violations",
            TRAILING_OPTIONS_RULE,
            classes.len(),
            report.summary.methods_checked,
            report.violations.len()
        );
        Ok(report)
    }

    fn run_sealed_models(&self, library: &BindingLibrary) -> ConformanceResult<ConformanceReport> {
        let mut report = ConformanceReport::new();
        let classes = self.enumerate(library, Capability::Domain)?;
        let check = SealedModelsCheck::new(&self.config.rules.sealed_models);

        for violation in check.check_classes(classes.iter().copied()) {
            report.add_violation(violation);
        }
        report.record_classes(classes.len());

        tracing::info!(
            "{}: {} domain classes, {} violations",
            SEALED_MODELS_RULE,
            classes.len(),
            report.violations.len()
        );
        Ok(report)
    }
}
