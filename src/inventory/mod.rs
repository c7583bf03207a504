//! Inventory loading: turns files on disk into a BindingLibrary
//!
//! CDD Principle: Infrastructure Layer - Sources translate external formats into domain classes
//! - Each InventorySource owns one file format (generator manifests, Rust sources)
//! - Loading is fail-fast: any unreadable or unparseable file aborts the run
//! - The resulting library is immutable for the rest of the run

pub mod manifest;
pub mod path_filter;
pub mod rust;

use crate::config::{InventoryConfig, DEFAULT_CONFIG_FILES};
use crate::domain::inventory::{BindingLibrary, ClassDescriptor, ExternalType, MethodSignature};
use crate::domain::violations::{ConformanceError, ConformanceResult};
use manifest::ManifestSource;
use path_filter::PathFilter;
use rust::RustSource;
use std::fs;
use std::path::{Path, PathBuf};

/// Methods and capabilities attached to a type outside its own definition
#[derive(Debug, Clone)]
pub struct ImplBlock {
    /// Type the block attaches to, as referenced at the block
    pub target: String,
    /// Namespace of the file that holds the block
    pub namespace: String,
    /// Capability implemented by the block, if any
    pub capability: Option<String>,
    pub methods: Vec<MethodSignature>,
    pub source: PathBuf,
}

/// Everything one inventory file contributed
#[derive(Debug, Clone, Default)]
pub struct LoadedUnit {
    pub classes: Vec<ClassDescriptor>,
    pub external: Vec<ExternalType>,
    pub impls: Vec<ImplBlock>,
}

/// Trait for inventory file formats
pub trait InventorySource {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Check if this source reads the given file
    fn handles_file(&self, path: &Path) -> bool;

    /// Parse one file; `relative` is the path below the inventory root
    fn load(&self, path: &Path, relative: &Path, content: &str) -> ConformanceResult<LoadedUnit>;

    /// Resolve cross-file references once every file of this source is parsed
    fn finish(&self, _units: &mut Vec<LoadedUnit>) -> ConformanceResult<()> {
        Ok(())
    }
}

/// Discovers inventory files and loads them into a BindingLibrary
pub struct InventoryLoader {
    filter: PathFilter,
    sources: Vec<Box<dyn InventorySource + Send + Sync>>,
}

impl InventoryLoader {
    /// Create a loader for the configured inventory formats
    pub fn new(config: &InventoryConfig) -> ConformanceResult<Self> {
        let mut sources: Vec<Box<dyn InventorySource + Send + Sync>> = Vec::new();
        if config.manifests {
            sources.push(Box::new(ManifestSource::new()));
        }
        if config.rust_sources {
            sources.push(Box::new(RustSource::new()));
        }
        if sources.is_empty() {
            return Err(ConformanceError::config(
                "inventory: at least one of manifests or rust_sources must be enabled",
            ));
        }

        Ok(Self {
            filter: PathFilter::new(config.exclude.clone())?,
            sources,
        })
    }

    /// Add exclude patterns on top of the configured ones
    pub fn with_excludes(mut self, patterns: &[String]) -> ConformanceResult<Self> {
        for pattern in patterns {
            self.filter.add_pattern(pattern.clone())?;
        }
        Ok(self)
    }

    /// Inventory files under the given paths as `(file, path relative to its root)`
    ///
    /// A path that does not exist is a load error; explicitly named files are
    /// taken as-is when some source reads them.
    pub fn discover<P: AsRef<Path>>(&self, paths: &[P]) -> ConformanceResult<Vec<(PathBuf, PathBuf)>> {
        let mut files = Vec::new();

        for path in paths {
            let path = path.as_ref();
            if path.is_file() {
                if self.source_for(path).is_some() {
                    let name = path.file_name().map(PathBuf::from).unwrap_or_default();
                    files.push((path.to_path_buf(), name));
                }
            } else if path.is_dir() {
                for file in self.filter.find_files(path)? {
                    if is_config_file(&file) || self.source_for(&file).is_none() {
                        continue;
                    }
                    let relative = file.strip_prefix(path).unwrap_or(&file).to_path_buf();
                    files.push((file, relative));
                }
            } else {
                return Err(ConformanceError::load(
                    path.display().to_string(),
                    "inventory path does not exist",
                ));
            }
        }

        Ok(files)
    }

    /// Load every inventory file under `paths` into a fresh library
    pub fn load_paths<P: AsRef<Path>>(&self, paths: &[P]) -> ConformanceResult<BindingLibrary> {
        let files = self.discover(paths)?;
        let mut units_by_source: Vec<Vec<LoadedUnit>> = self.sources.iter().map(|_| Vec::new()).collect();

        for (file, relative) in &files {
            let Some(index) = self.source_index(file) else {
                continue;
            };
            let source = &self.sources[index];
            let content = fs::read_to_string(file).map_err(|e| {
                ConformanceError::load(file.display().to_string(), format!("Failed to read file: {e}"))
            })?;

            let mut unit = source.load(file, relative, &content)?;
            for class in &mut unit.classes {
                class.source = Some(file.clone());
            }
            tracing::debug!(
                "Loaded {} classes from {} ({})",
                unit.classes.len(),
                file.display(),
                source.name()
            );
            units_by_source[index].push(unit);
        }

        let mut library = BindingLibrary::new();
        for (source, mut units) in self.sources.iter().zip(units_by_source) {
            source.finish(&mut units)?;
            for unit in units {
                for external in unit.external {
                    library.declare_external(external)?;
                }
                for class in unit.classes {
                    library.insert_class(class)?;
                }
            }
        }

        tracing::info!("Loaded {} classes from {} inventory files", library.len(), files.len());
        Ok(library)
    }

    fn source_index(&self, path: &Path) -> Option<usize> {
        self.sources.iter().position(|source| source.handles_file(path))
    }

    fn source_for(&self, path: &Path) -> Option<&(dyn InventorySource + Send + Sync)> {
        self.source_index(path).map(|index| self.sources[index].as_ref())
    }
}

fn is_config_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| DEFAULT_CONFIG_FILES.contains(&name))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const NET_MANIFEST: &str = r#"{
        "classes": [
            {"name": "com.stripe.net.APIResource", "modifiers": {"abstract": true}},
            {"name": "com.stripe.net.Charge", "extends": "com.stripe.net.APIResource"}
        ]
    }"#;

    #[test]
    fn test_load_directory_of_manifests() -> ConformanceResult<()> {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("gen"))?;
        fs::write(root.join("gen/net.inventory.json"), NET_MANIFEST)?;
        fs::write(root.join("gen/notes.txt"), "ignored")?;

        let loader = InventoryLoader::new(&InventoryConfig::default())?;
        let library = loader.load_paths(&[root])?;

        assert_eq!(library.len(), 2);
        let charge = library.class("com.stripe.net.Charge").unwrap();
        assert_eq!(charge.source.as_deref(), Some(root.join("gen/net.inventory.json").as_path()));
        Ok(())
    }

    #[test]
    fn test_unparseable_file_aborts_load() -> ConformanceResult<()> {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("a.inventory.json"), NET_MANIFEST)?;
        fs::write(root.join("b.inventory.yaml"), "classes: [ {name: ")?;

        let loader = InventoryLoader::new(&InventoryConfig::default())?;
        let err = loader.load_paths(&[root]).unwrap_err();
        assert!(err.is_load_failure());
        Ok(())
    }

    #[test]
    fn test_duplicate_class_across_files_aborts_load() -> ConformanceResult<()> {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("a.inventory.json"), NET_MANIFEST)?;
        fs::write(root.join("b.inventory.json"), NET_MANIFEST)?;

        let loader = InventoryLoader::new(&InventoryConfig::default())?;
        assert!(loader.load_paths(&[root]).is_err());
        Ok(())
    }

    #[test]
    fn test_missing_path_is_load_error() -> ConformanceResult<()> {
        let loader = InventoryLoader::new(&InventoryConfig::default())?;
        let err = loader.load_paths(&[Path::new("/definitely/not/here")]).unwrap_err();
        assert!(err.is_load_failure());
        Ok(())
    }

    #[test]
    fn test_excludes_and_config_files_are_skipped() -> ConformanceResult<()> {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("legacy"))?;
        fs::write(root.join("binding_conformance.yaml"), "version: '1.0'")?;
        fs::write(root.join("net.inventory.json"), NET_MANIFEST)?;
        fs::write(root.join("legacy/old.inventory.json"), "{ broken")?;

        let loader = InventoryLoader::new(&InventoryConfig::default())?
            .with_excludes(&["legacy/**".to_string()])?;
        let files = loader.discover(&[root])?;

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].1, PathBuf::from("net.inventory.json"));
        Ok(())
    }

    #[test]
    fn test_no_sources_is_config_error() {
        let config = InventoryConfig {
            manifests: false,
            rust_sources: false,
            ..Default::default()
        };
        assert!(InventoryLoader::new(&config).is_err());
    }
}
