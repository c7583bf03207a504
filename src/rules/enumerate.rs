//! Class enumeration: descendants of a capability inside one namespace

use crate::config::NamespaceScope;
use crate::domain::inventory::{BindingLibrary, ClassDescriptor};
use crate::domain::violations::{ConformanceError, ConformanceResult};

/// Top-level classes in `scope` that extend or implement `capability`
///
/// The capability's own class is excluded. Classes are returned in
/// qualified-name order. Fails with a load error when the capability is
/// unknown to the library or when a class inside the scope names a
/// supertype the library cannot resolve, since either leaves the inventory
/// too incomplete to trust a passing result.
pub fn descendants<'a>(
    library: &'a BindingLibrary,
    capability: &str,
    scope: &NamespaceScope,
) -> ConformanceResult<Vec<&'a ClassDescriptor>> {
    if !library.is_known(capability) {
        return Err(ConformanceError::load(
            capability,
            "base capability is not present in the loaded inventory",
        ));
    }

    let mut found = Vec::new();
    for class in library.classes() {
        if !class.is_top_level() || !scope.contains(class.namespace()) {
            continue;
        }

        let unresolved = library.unresolved_supertypes(class);
        if !unresolved.is_empty() {
            let location = class
                .source
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| class.name.clone());
            return Err(ConformanceError::load(
                location,
                format!(
                    "class {} references unknown supertype(s): {}",
                    class.name,
                    unresolved.join(", ")
                ),
            ));
        }

        if class.name == capability {
            continue;
        }
        if library.is_assignable(&class.name, capability) {
            found.push(class);
        }
    }

    tracing::debug!(
        "Enumerated {} descendants of {} in {}",
        found.len(),
        capability,
        scope
    );
    Ok(found)
}
