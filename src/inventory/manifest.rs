//! Class manifests emitted by the binding generator
//!
//! A manifest lists classes with their modifiers, supertypes and declared
//! methods, plus the external types those classes reference. JSON and YAML
//! carry the same shape:
//!
//! ```yaml
//! classes:
//!   - name: com.stripe.net.Charge
//!     extends: com.stripe.net.APIResource
//!     modifiers: { final: true }
//!     methods:
//!       - name: create
//!         static: true
//!         return_type: com.stripe.net.Charge
//!         parameters:
//!           - { name: params, type: "java.util.Map<String, Object>" }
//!           - { name: options, type: com.stripe.net.RequestOptions }
//! external:
//!   - name: java.util.HashMap
//!     implements: [java.util.Map]
//! ```

use crate::domain::inventory::{ClassDescriptor, ClassKind, ExternalType};
use crate::domain::violations::{ConformanceError, ConformanceResult};
use crate::inventory::{InventorySource, LoadedUnit};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File-name suffixes recognised as manifests
pub const MANIFEST_SUFFIXES: [&str; 3] = [".inventory.json", ".inventory.yaml", ".inventory.yml"];

/// On-disk manifest shape
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventoryManifest {
    #[serde(default)]
    pub classes: Vec<ClassDescriptor>,
    #[serde(default)]
    pub external: Vec<ExternalType>,
}

/// Reads `*.inventory.{json,yaml,yml}` manifests
#[derive(Debug, Default)]
pub struct ManifestSource;

impl ManifestSource {
    pub fn new() -> Self {
        Self
    }

    fn parse(path: &Path, content: &str) -> ConformanceResult<InventoryManifest> {
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            serde_json::from_str(content).map_err(|e| {
                ConformanceError::load(path.display().to_string(), format!("Invalid JSON manifest: {e}"))
            })
        } else {
            serde_yaml::from_str(content).map_err(|e| {
                ConformanceError::load(path.display().to_string(), format!("Invalid YAML manifest: {e}"))
            })
        }
    }
}

impl InventorySource for ManifestSource {
    fn name(&self) -> &'static str {
        "manifest"
    }

    fn handles_file(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .map(|name| {
                let name = name.to_ascii_lowercase();
                MANIFEST_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
            })
            .unwrap_or(false)
    }

    fn load(&self, path: &Path, _relative: &Path, content: &str) -> ConformanceResult<LoadedUnit> {
        let mut manifest = Self::parse(path, content)?;
        if manifest.classes.is_empty() {
            tracing::warn!("Manifest {} declares no classes", path.display());
        }

        for class in &mut manifest.classes {
            if class.name.trim().is_empty() {
                return Err(ConformanceError::load(
                    path.display().to_string(),
                    "class entry without a name",
                ));
            }
            if class.kind == ClassKind::Interface {
                class.modifiers.is_abstract = true;
            }
        }

        Ok(LoadedUnit {
            classes: manifest.classes,
            external: manifest.external,
            impls: Vec::new(),
        })
    }
}
