//! Configuration loading and management for binding conformance
//!
//! Architecture: Anti-Corruption Layer - Configuration translates external YAML formats
//! - Raw YAML structures are converted to clean domain objects
//! - Default configuration mirrors the SDK conventions the checks were written for
//! - Configuration acts as the repository for capability names and rule settings

use crate::domain::inventory::namespace_of;
use crate::domain::violations::{ConformanceError, ConformanceResult, Severity};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// Rule identifier of the trailing-options check
pub const TRAILING_OPTIONS_RULE: &str = "trailing_options";
/// Rule identifier of the sealed-models check
pub const SEALED_MODELS_RULE: &str = "sealed_models";

/// File names probed in the working directory when no config is given
pub const DEFAULT_CONFIG_FILES: [&str; 3] = [
    "binding_conformance.yaml",
    "binding_conformance.yml",
    ".binding_conformance.yaml",
];

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConformanceConfig {
    /// Configuration format version
    pub version: String,
    /// Which inventory files are read
    #[serde(default)]
    pub inventory: InventoryConfig,
    /// Base capabilities and well-known types
    pub capabilities: CapabilityConfig,
    /// Rule settings
    pub rules: RulesConfig,
}

/// Inventory discovery configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// Exclude patterns (glob); a leading `!` re-includes
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Read `.json`/`.yaml`/`.yml` class manifests
    #[serde(default = "default_true")]
    pub manifests: bool,
    /// Extract classes from `.rs` binding sources
    #[serde(default = "default_true")]
    pub rust_sources: bool,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            exclude: vec![
                "**/target/**".to_string(),
                "**/.git/**".to_string(),
                "**/node_modules/**".to_string(),
            ],
            manifests: true,
            rust_sources: true,
        }
    }
}

/// Names of the base capabilities and types the rules refer to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityConfig {
    /// Base capability of remotely-managed API resources
    pub resource: String,
    /// Base capability of domain objects
    pub domain: String,
    /// Type every trailing options parameter must be assignable to
    pub options: String,
    /// String type used by the single-string exemptions
    pub string: String,
    /// Generic key-value mapping types
    pub maps: Vec<String>,
}

/// Per-rule configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesConfig {
    pub trailing_options: TrailingOptionsRule,
    pub sealed_models: SealedModelsRule,
}

/// Settings of the trailing-options rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailingOptionsRule {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_severity")]
    pub severity: Severity,
    /// Namespace to enumerate; defaults to the resource capability's namespace
    #[serde(default)]
    pub namespace: Option<String>,
    /// Also enumerate namespaces nested below `namespace`
    #[serde(default)]
    pub include_nested: bool,
    /// Method-name prefixes treated as property accessors
    pub accessor_prefixes: Vec<String>,
    /// Named single-string helpers exempt from the rule
    #[serde(default)]
    pub exemptions: Vec<MethodExemption>,
}

/// A single-parameter helper method that is allowed to skip the options parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodExemption {
    pub method: String,
    /// Raw type of the sole parameter; the configured string type when omitted
    #[serde(default)]
    pub parameter: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Settings of the sealed-models rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SealedModelsRule {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_severity")]
    pub severity: Severity,
    /// Namespace to enumerate; defaults to the domain capability's namespace
    #[serde(default)]
    pub namespace: Option<String>,
    /// Also enumerate namespaces nested below `namespace`
    #[serde(default)]
    pub include_nested: bool,
}

/// A namespace plus whether nested namespaces count as inside it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceScope {
    pub namespace: String,
    pub include_nested: bool,
}

impl NamespaceScope {
    pub fn exact(namespace: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), include_nested: false }
    }

    pub fn nested(namespace: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), include_nested: true }
    }

    /// Whether a class namespace falls inside this scope
    pub fn contains(&self, namespace: &str) -> bool {
        if namespace == self.namespace {
            return true;
        }
        self.include_nested
            && namespace
                .strip_prefix(self.namespace.as_str())
                .map(|rest| rest.starts_with("::") || rest.starts_with('.'))
                .unwrap_or(false)
    }
}

impl std::fmt::Display for NamespaceScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.include_nested {
            write!(f, "{} (and nested)", self.namespace)
        } else {
            f.write_str(&self.namespace)
        }
    }
}

impl ConformanceConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ConformanceResult<Self> {
        let contents = fs::read_to_string(&path).map_err(|e| {
            ConformanceError::config(format!(
                "Failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: Self = serde_yaml::from_str(&contents).map_err(|e| {
            ConformanceError::config(format!(
                "Failed to parse config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from string content
    pub fn load_from_str(content: &str) -> ConformanceResult<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| ConformanceError::config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Explicit path, else the first default file present in the working directory, else defaults
    pub fn discover(explicit: Option<&Path>) -> ConformanceResult<Self> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }
        for name in DEFAULT_CONFIG_FILES {
            if Path::new(name).exists() {
                tracing::debug!("Using configuration file {}", name);
                return Self::load_from_file(name);
            }
        }
        Ok(Self::default())
    }

    /// Default configuration
    pub fn with_defaults() -> Self {
        Self {
            version: "1.0".to_string(),
            inventory: InventoryConfig::default(),
            capabilities: CapabilityConfig {
                resource: "com.stripe.net.APIResource".to_string(),
                domain: "com.stripe.model.StripeObject".to_string(),
                options: "com.stripe.net.RequestOptions".to_string(),
                string: "java.lang.String".to_string(),
                maps: vec!["java.util.Map".to_string()],
            },
            rules: RulesConfig {
                trailing_options: TrailingOptionsRule {
                    enabled: true,
                    severity: Severity::Error,
                    namespace: None,
                    include_nested: false,
                    accessor_prefixes: vec!["set".to_string(), "get".to_string()],
                    exemptions: vec![
                        MethodExemption {
                            method: "retrieve".to_string(),
                            parameter: None,
                            reason: Some("static retrieve(id) helper".to_string()),
                        },
                        MethodExemption {
                            method: "createCard".to_string(),
                            parameter: None,
                            reason: Some("createCard(token) helper on Customer".to_string()),
                        },
                    ],
                },
                sealed_models: SealedModelsRule {
                    enabled: true,
                    severity: Severity::Error,
                    namespace: None,
                    include_nested: false,
                },
            },
        }
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> ConformanceResult<()> {
        if !["1.0"].contains(&self.version.as_str()) {
            return Err(ConformanceError::config(format!(
                "Unsupported configuration version: {}. Supported versions: 1.0",
                self.version
            )));
        }

        let capabilities = &self.capabilities;
        for (field, value) in [
            ("capabilities.resource", &capabilities.resource),
            ("capabilities.domain", &capabilities.domain),
            ("capabilities.options", &capabilities.options),
            ("capabilities.string", &capabilities.string),
        ] {
            if value.trim().is_empty() {
                return Err(ConformanceError::config(format!("{field} must not be empty")));
            }
        }
        if capabilities.maps.iter().any(|m| m.trim().is_empty()) {
            return Err(ConformanceError::config("capabilities.maps contains an empty type name"));
        }

        let trailing = &self.rules.trailing_options;
        if trailing.accessor_prefixes.iter().any(|p| p.is_empty()) {
            return Err(ConformanceError::config(
                "rules.trailing_options.accessor_prefixes contains an empty prefix",
            ));
        }
        for exemption in &trailing.exemptions {
            let duplicates = trailing
                .exemptions
                .iter()
                .filter(|e| e.method == exemption.method && e.parameter == exemption.parameter)
                .count();
            if duplicates > 1 {
                return Err(ConformanceError::config(format!(
                    "Duplicate exemption for method '{}'",
                    exemption.method
                )));
            }
        }

        for pattern in &self.inventory.exclude {
            let pattern = pattern.strip_prefix('!').unwrap_or(pattern);
            glob::Pattern::new(pattern).map_err(|e| {
                ConformanceError::config(format!("Invalid exclude pattern '{pattern}': {e}"))
            })?;
        }

        Ok(())
    }

    /// Namespace scope the trailing-options rule enumerates
    pub fn resource_scope(&self) -> NamespaceScope {
        let rule = &self.rules.trailing_options;
        NamespaceScope {
            namespace: rule
                .namespace
                .clone()
                .unwrap_or_else(|| namespace_of(&self.capabilities.resource).to_string()),
            include_nested: rule.include_nested,
        }
    }

    /// Namespace scope the sealed-models rule enumerates
    pub fn domain_scope(&self) -> NamespaceScope {
        let rule = &self.rules.sealed_models;
        NamespaceScope {
            namespace: rule
                .namespace
                .clone()
                .unwrap_or_else(|| namespace_of(&self.capabilities.domain).to_string()),
            include_nested: rule.include_nested,
        }
    }

    /// Convert to JSON for serialization
    pub fn to_json(&self) -> ConformanceResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ConformanceError::config(format!("Failed to serialize config: {e}")))
    }

    /// SHA-256 over the canonical JSON rendering
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        let digest = Sha256::digest(&canonical);
        digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
    }
}

impl Default for ConformanceConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn default_true() -> bool {
    true
}

fn default_severity() -> Severity {
    Severity::Error
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: ConformanceConfig,
}

impl ConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self { config: ConformanceConfig::default() }
    }

    /// Set the resource and domain base capabilities
    pub fn capabilities(mut self, resource: impl Into<String>, domain: impl Into<String>) -> Self {
        self.config.capabilities.resource = resource.into();
        self.config.capabilities.domain = domain.into();
        self
    }

    /// Set the options type
    pub fn options_type(mut self, options: impl Into<String>) -> Self {
        self.config.capabilities.options = options.into();
        self
    }

    /// Set the string type used by exemptions
    pub fn string_type(mut self, string: impl Into<String>) -> Self {
        self.config.capabilities.string = string.into();
        self
    }

    /// Replace the key-value mapping types
    pub fn map_types(mut self, maps: Vec<String>) -> Self {
        self.config.capabilities.maps = maps;
        self
    }

    /// Replace the accessor name prefixes
    pub fn accessor_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.config.rules.trailing_options.accessor_prefixes = prefixes;
        self
    }

    /// Override the namespace of the trailing-options rule
    pub fn resource_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.rules.trailing_options.namespace = Some(namespace.into());
        self
    }

    /// Override the namespace of the sealed-models rule
    pub fn domain_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.rules.sealed_models.namespace = Some(namespace.into());
        self
    }

    /// Let both rules enumerate nested namespaces
    pub fn include_nested(mut self, include: bool) -> Self {
        self.config.rules.trailing_options.include_nested = include;
        self.config.rules.sealed_models.include_nested = include;
        self
    }

    /// Add an inventory exclude pattern
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.config.inventory.exclude.push(pattern.into());
        self
    }

    /// Add a single-string exemption
    pub fn exempt(mut self, method: impl Into<String>) -> Self {
        self.config.rules.trailing_options.exemptions.push(MethodExemption {
            method: method.into(),
            parameter: None,
            reason: None,
        });
        self
    }

    /// Build the final configuration
    pub fn build(self) -> ConformanceResult<ConformanceConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
