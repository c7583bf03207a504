//! Sealed-models rule: domain objects are either abstract or final

use crate::config::{SealedModelsRule, SEALED_MODELS_RULE};
use crate::domain::inventory::ClassDescriptor;
use crate::domain::violations::Violation;

/// Applies the sealed-models rule to domain object classes
pub struct SealedModelsCheck<'a> {
    rule: &'a SealedModelsRule,
}

impl<'a> SealedModelsCheck<'a> {
    pub fn new(rule: &'a SealedModelsRule) -> Self {
        Self { rule }
    }

    /// At most one violation per class
    pub fn check_class(&self, class: &ClassDescriptor) -> Option<Violation> {
        if class.is_sealed() {
            return None;
        }

        Some(
            Violation::new(
                SEALED_MODELS_RULE,
                self.rule.severity,
                &class.name,
                format!("Class {} should be either abstract or final, but isn't.", class.name),
            )
            .with_suggestion(format!(
                "Mark {} final if nothing extends it, or abstract if it only serves as a base",
                class.simple_name()
            ))
            .with_source(class.source.clone()),
        )
    }

    /// Violations for `classes`, in the order given
    pub fn check_classes<'c>(&self, classes: impl IntoIterator<Item = &'c ClassDescriptor>) -> Vec<Violation> {
        classes
            .into_iter()
            .filter_map(|class| self.check_class(class))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConformanceConfig;
    use crate::domain::inventory::{ClassKind, Modifiers};
    use crate::domain::violations::Severity;
    use rstest::rstest;

    #[rstest]
    #[case::abstract_only(Modifiers::new(true, false), 0)]
    #[case::final_only(Modifiers::new(false, true), 0)]
    #[case::neither(Modifiers::new(false, false), 1)]
    fn test_sealing(#[case] modifiers: Modifiers, #[case] expected: usize) {
        let config = ConformanceConfig::default();
        let check = SealedModelsCheck::new(&config.rules.sealed_models);
        let class = ClassDescriptor::new("com.stripe.model.Card").with_modifiers(modifiers);

        assert_eq!(check.check_classes([&class]).len(), expected);
    }

    #[test]
    fn test_interface_kind_counts_as_abstract() {
        let config = ConformanceConfig::default();
        let check = SealedModelsCheck::new(&config.rules.sealed_models);
        let mut class = ClassDescriptor::new("com.stripe.model.HasMetadata");
        class.kind = ClassKind::Interface;

        assert!(!class.modifiers.is_abstract);
        assert!(check.check_class(&class).is_none());
    }

    #[test]
    fn test_violation_names_qualified_class() {
        let mut config = ConformanceConfig::default();
        config.rules.sealed_models.severity = Severity::Warning;
        let check = SealedModelsCheck::new(&config.rules.sealed_models);
        let class = ClassDescriptor::new("com.stripe.model.Card").with_modifiers(Modifiers::new(false, false));

        let violation = check.check_class(&class).unwrap();
        assert_eq!(
            violation.message,
            "Class com.stripe.model.Card should be either abstract or final, but isn't."
        );
        assert_eq!(violation.severity, Severity::Warning);
        assert_eq!(violation.rule_id, SEALED_MODELS_RULE);
        assert!(violation.method.is_none());
    }

    #[test]
    fn test_order_follows_input() {
        let config = ConformanceConfig::default();
        let check = SealedModelsCheck::new(&config.rules.sealed_models);
        let open = Modifiers::new(false, false);
        let classes = [
            ClassDescriptor::new("com.stripe.model.Card").with_modifiers(open),
            ClassDescriptor::new("com.stripe.model.Account").with_modifiers(Modifiers::new(false, true)),
            ClassDescriptor::new("com.stripe.model.Balance").with_modifiers(open),
        ];

        let names: Vec<String> = check
            .check_classes(classes.iter())
            .into_iter()
            .map(|v| v.class_name)
            .collect();
        assert_eq!(names, vec!["com.stripe.model.Card", "com.stripe.model.Balance"]);
    }
}
