//! Trailing-options rule: API methods must end with an options parameter
//!
//! Architecture: Domain Service - method selection is an ordered chain of exclusions
//! - The first matching exclusion decides, later steps are not consulted
//! - Methods surviving every exclusion must take the options type last
//! - Accessors are recognised by name prefix only, never by shape

use crate::config::{CapabilityConfig, TrailingOptionsRule, TRAILING_OPTIONS_RULE};
use crate::domain::inventory::{simple_name_of, BindingLibrary, ClassDescriptor, VisibleMethod, Visibility};
use crate::domain::violations::{ConformanceError, ConformanceResult, Violation};
use std::fmt;

/// Why a method was left out of the rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Declared on an ancestor; checked when that ancestor is visited
    Inherited { declaring: String },
    /// Name starts with an accessor prefix
    Accessor { prefix: String },
    /// A same-signature declaration with a more specific return type exists
    NotMostSpecific,
    Private,
    Deprecated,
    NoParameters,
    /// Sole parameter is a key-value mapping
    SoleMapParameter,
    /// Listed as a documented exemption
    Exempt { method: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inherited { declaring } => write!(f, "inherited from {declaring}"),
            Self::Accessor { prefix } => write!(f, "accessor ('{prefix}' prefix)"),
            Self::NotMostSpecific => f.write_str("superseded by a more specific overload"),
            Self::Private => f.write_str("private"),
            Self::Deprecated => f.write_str("deprecated"),
            Self::NoParameters => f.write_str("no parameters"),
            Self::SoleMapParameter => f.write_str("single map parameter"),
            Self::Exempt { method } => write!(f, "documented exemption for {method}"),
        }
    }
}

/// Outcome of method selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// The method must take the options type last
    Subject,
    Skipped(SkipReason),
}

/// Applies the trailing-options rule to resource classes
pub struct TrailingOptionsCheck<'a> {
    library: &'a BindingLibrary,
    capabilities: &'a CapabilityConfig,
    rule: &'a TrailingOptionsRule,
}

impl<'a> TrailingOptionsCheck<'a> {
    pub fn new(
        library: &'a BindingLibrary,
        capabilities: &'a CapabilityConfig,
        rule: &'a TrailingOptionsRule,
    ) -> Self {
        Self { library, capabilities, rule }
    }

    /// Decide whether a method reachable on `class` is subject to the rule
    pub fn select(&self, class: &ClassDescriptor, visible: &VisibleMethod<'_>) -> ConformanceResult<Selection> {
        let method = visible.method;

        if visible.declaring.name != class.name {
            return Ok(Selection::Skipped(SkipReason::Inherited {
                declaring: visible.declaring.name.clone(),
            }));
        }

        if let Some(prefix) = self
            .rule
            .accessor_prefixes
            .iter()
            .find(|prefix| method.name.starts_with(prefix.as_str()))
        {
            return Ok(Selection::Skipped(SkipReason::Accessor { prefix: prefix.clone() }));
        }

        let raw_params = method.raw_parameter_types();
        let most_specific = self
            .library
            .most_specific_declared(class, &method.name, &raw_params)
            .ok_or_else(|| {
                ConformanceError::introspection(
                    &class.name,
                    format!(
                        "no declared method matches {} although it was listed on the class",
                        method.display_signature()
                    ),
                )
            })?;
        if most_specific != visible.index {
            return Ok(Selection::Skipped(SkipReason::NotMostSpecific));
        }

        if method.visibility == Visibility::Private {
            return Ok(Selection::Skipped(SkipReason::Private));
        }

        if method.deprecated {
            return Ok(Selection::Skipped(SkipReason::Deprecated));
        }

        let Some(last) = method.last_parameter() else {
            return Ok(Selection::Skipped(SkipReason::NoParameters));
        };
        let last_raw = last.raw_type();
        let sole = method.parameters.len() == 1;

        if sole && self.capabilities.maps.iter().any(|map| map == last_raw) {
            return Ok(Selection::Skipped(SkipReason::SoleMapParameter));
        }

        if sole {
            let exempt = self.rule.exemptions.iter().any(|exemption| {
                let parameter = exemption
                    .parameter
                    .as_deref()
                    .unwrap_or(self.capabilities.string.as_str());
                exemption.method == method.name && parameter == last_raw
            });
            if exempt {
                return Ok(Selection::Skipped(SkipReason::Exempt {
                    method: method.name.clone(),
                }));
            }
        }

        Ok(Selection::Subject)
    }

    /// Whether a method's final parameter is the options type or a subtype of it
    pub fn takes_options(&self, visible: &VisibleMethod<'_>) -> bool {
        visible
            .method
            .last_parameter()
            .map(|last| self.library.is_assignable(last.raw_type(), &self.capabilities.options))
            .unwrap_or(false)
    }

    /// Violations of one class, in method declaration order, plus how many methods were subject
    pub fn check_class(&self, class: &ClassDescriptor) -> ConformanceResult<(Vec<Violation>, usize)> {
        let mut violations = Vec::new();
        let mut subject = 0;

        for visible in self.library.visible_methods(class) {
            match self.select(class, &visible)? {
                Selection::Skipped(reason) => {
                    tracing::debug!(
                        "{}.{}: skipped ({})",
                        class.simple_name(),
                        visible.method.display_signature(),
                        reason
                    );
                }
                Selection::Subject => {
                    subject += 1;
                    if !self.takes_options(&visible) {
                        violations.push(self.violation(class, &visible));
                    }
                }
            }
        }

        Ok((violations, subject))
    }

    fn violation(&self, class: &ClassDescriptor, visible: &VisibleMethod<'_>) -> Violation {
        let signature = visible.method.display_signature();
        let resource = simple_name_of(&self.capabilities.resource);
        let options = simple_name_of(&self.capabilities.options);

        Violation::new(
            TRAILING_OPTIONS_RULE,
            self.rule.severity,
            &class.name,
            format!(
                "Methods on {resource}s like {}.{signature} should take a final parameter as a {options} parameter.",
                class.simple_name()
            ),
        )
        .with_method(signature)
        .with_suggestion(format!(
            "Add a trailing `{}` parameter to {}.{}, or mark the method deprecated if it must keep its shape",
            self.capabilities.options,
            class.simple_name(),
            visible.method.name
        ))
        .with_source(class.source.clone())
    }
}
