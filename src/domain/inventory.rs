//! Binding inventory: the class registry every check walks over
//!
//! Architecture: Repository Pattern - BindingLibrary is a read-only registry of class metadata
//! - Populated once per run by an inventory source, never mutated by the checks
//! - Answers the type-system questions reflection would answer at runtime:
//!   assignability, inherited method surfaces, and overload specificity

use crate::domain::violations::{ConformanceError, ConformanceResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::PathBuf;

/// Visibility of a declared method
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Package,
    Private,
}

/// Whether a type is a concrete/abstract class or a pure capability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ClassKind {
    #[default]
    Class,
    Interface,
}

/// Extension modifiers of a class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Modifiers {
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default, rename = "final")]
    pub is_final: bool,
}

impl Modifiers {
    pub fn new(is_abstract: bool, is_final: bool) -> Self {
        Self { is_abstract, is_final }
    }
}

/// A declared method parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    #[serde(default)]
    pub name: Option<String>,
    /// Declared type as written, generic arguments included
    #[serde(rename = "type")]
    pub ty: String,
}

impl Parameter {
    pub fn new(ty: impl Into<String>) -> Self {
        Self { name: None, ty: ty.into() }
    }

    pub fn named(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self { name: Some(name.into()), ty: ty.into() }
    }

    pub fn raw_type(&self) -> &str {
        raw_type(&self.ty)
    }
}

/// A method declared on one class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSignature {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default = "default_return_type")]
    pub return_type: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default, rename = "static")]
    pub is_static: bool,
}

fn default_return_type() -> String {
    "void".to_string()
}

impl MethodSignature {
    /// Public, non-deprecated method returning `void` with no parameters
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            return_type: default_return_type(),
            visibility: Visibility::Public,
            deprecated: false,
            is_static: false,
        }
    }

    pub fn param(mut self, ty: impl Into<String>) -> Self {
        self.parameters.push(Parameter::new(ty));
        self
    }

    pub fn returns(mut self, ty: impl Into<String>) -> Self {
        self.return_type = ty.into();
        self
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    pub fn static_method(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Raw (erased) parameter types, in order
    pub fn raw_parameter_types(&self) -> Vec<&str> {
        self.parameters.iter().map(Parameter::raw_type).collect()
    }

    pub fn last_parameter(&self) -> Option<&Parameter> {
        self.parameters.last()
    }

    /// `name(Type1, Type2)` using declared parameter types
    pub fn display_signature(&self) -> String {
        let params: Vec<&str> = self.parameters.iter().map(|p| p.ty.as_str()).collect();
        format!("{}({})", self.name, params.join(", "))
    }

    fn same_signature(&self, name: &str, raw_params: &[&str]) -> bool {
        self.name == name && self.raw_parameter_types() == raw_params
    }
}

/// Metadata for one class of the binding library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDescriptor {
    /// Fully qualified name
    pub name: String,
    #[serde(default)]
    pub kind: ClassKind,
    #[serde(default)]
    pub modifiers: Modifiers,
    /// Enclosing class for nested types; top-level classes have none
    #[serde(default)]
    pub enclosing: Option<String>,
    #[serde(default, rename = "extends")]
    pub superclass: Option<String>,
    #[serde(default, rename = "implements")]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub methods: Vec<MethodSignature>,
    /// Inventory file this class was loaded from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl ClassDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ClassKind::Class,
            modifiers: Modifiers::default(),
            enclosing: None,
            superclass: None,
            interfaces: Vec::new(),
            methods: Vec::new(),
            source: None,
        }
    }

    pub fn interface(name: impl Into<String>) -> Self {
        let mut class = Self::new(name);
        class.kind = ClassKind::Interface;
        class.modifiers.is_abstract = true;
        class
    }

    pub fn extends(mut self, superclass: impl Into<String>) -> Self {
        self.superclass = Some(superclass.into());
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn nested_in(mut self, enclosing: impl Into<String>) -> Self {
        self.enclosing = Some(enclosing.into());
        self
    }

    pub fn with_method(mut self, method: MethodSignature) -> Self {
        self.methods.push(method);
        self
    }

    pub fn namespace(&self) -> &str {
        namespace_of(&self.name)
    }

    pub fn simple_name(&self) -> &str {
        simple_name_of(&self.name)
    }

    /// Interfaces are abstract whatever their declared modifiers say
    pub fn is_abstract(&self) -> bool {
        self.kind == ClassKind::Interface || self.modifiers.is_abstract
    }

    /// Abstract or final
    pub fn is_sealed(&self) -> bool {
        self.is_abstract() || self.modifiers.is_final
    }

    pub fn is_top_level(&self) -> bool {
        self.enclosing.is_none()
    }

    /// Superclass first, then interfaces in declaration order
    pub fn supertypes(&self) -> impl Iterator<Item = &str> {
        self.superclass
            .iter()
            .chain(self.interfaces.iter())
            .map(String::as_str)
    }
}

/// A type referenced by the binding but defined outside it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalType {
    pub name: String,
    #[serde(default, rename = "extends")]
    pub superclass: Option<String>,
    #[serde(default, rename = "implements")]
    pub interfaces: Vec<String>,
}

impl ExternalType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            superclass: None,
            interfaces: Vec::new(),
        }
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    fn supertypes(&self) -> impl Iterator<Item = &str> {
        self.superclass
            .iter()
            .chain(self.interfaces.iter())
            .map(String::as_str)
    }
}

/// A method reachable on a class together with the class that declares it
#[derive(Debug, Clone, Copy)]
pub struct VisibleMethod<'a> {
    pub declaring: &'a ClassDescriptor,
    /// Index into `declaring.methods`
    pub index: usize,
    pub method: &'a MethodSignature,
}

/// Read-only registry of every class in the loaded binding inventory
#[derive(Debug, Clone, Default)]
pub struct BindingLibrary {
    classes: BTreeMap<String, ClassDescriptor>,
    external: BTreeMap<String, ExternalType>,
}

impl BindingLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class; a second definition of the same name is a load error
    pub fn insert_class(&mut self, class: ClassDescriptor) -> ConformanceResult<()> {
        if let Some(existing) = self.classes.get(&class.name) {
            return Err(ConformanceError::load(
                source_label(&class.source),
                format!(
                    "class {} is already defined in {}",
                    class.name,
                    source_label(&existing.source)
                ),
            ));
        }
        self.classes.insert(class.name.clone(), class);
        Ok(())
    }

    /// Register an external type; identical redeclarations are accepted
    pub fn declare_external(&mut self, external: ExternalType) -> ConformanceResult<()> {
        match self.external.get(&external.name) {
            Some(existing) if *existing == external => Ok(()),
            Some(_) => Err(ConformanceError::load(
                external.name.clone(),
                "external type declared twice with different supertypes",
            )),
            None => {
                self.external.insert(external.name.clone(), external);
                Ok(())
            }
        }
    }

    /// Chainable form of `insert_class` for building libraries in code
    pub fn with_class(mut self, class: ClassDescriptor) -> ConformanceResult<Self> {
        self.insert_class(class)?;
        Ok(self)
    }

    /// Chainable form of `declare_external`
    pub fn with_external(mut self, external: ExternalType) -> ConformanceResult<Self> {
        self.declare_external(external)?;
        Ok(self)
    }

    pub fn class(&self, name: &str) -> Option<&ClassDescriptor> {
        self.classes.get(name)
    }

    /// All classes in qualified-name order
    pub fn classes(&self) -> impl Iterator<Item = &ClassDescriptor> {
        self.classes.values()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Whether the name resolves to a library class or a declared external type
    pub fn is_known(&self, name: &str) -> bool {
        self.classes.contains_key(name) || self.external.contains_key(name)
    }

    /// Direct supertypes of a type; unknown names have none
    pub fn supertypes(&self, name: &str) -> Vec<&str> {
        if let Some(class) = self.classes.get(name) {
            class.supertypes().collect()
        } else if let Some(external) = self.external.get(name) {
            external.supertypes().collect()
        } else {
            Vec::new()
        }
    }

    /// Supertypes named by `class` that resolve to nothing in the library
    pub fn unresolved_supertypes<'a>(&self, class: &'a ClassDescriptor) -> Vec<&'a str> {
        class.supertypes().filter(|s| !self.is_known(s)).collect()
    }

    /// Reflexive, transitive subtype test over raw type names
    pub fn is_assignable(&self, sub: &str, sup: &str) -> bool {
        let sub = raw_type(sub);
        let sup = raw_type(sup);
        if sub == sup {
            return true;
        }

        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([sub]);
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            for parent in self.supertypes(current) {
                let parent = raw_type(parent);
                if parent == sup {
                    return true;
                }
                queue.push_back(parent);
            }
        }
        false
    }

    /// Library classes above `name`, nearest first, each listed once
    pub fn ancestors(&self, name: &str) -> Vec<&ClassDescriptor> {
        let mut visited = HashSet::from([name]);
        let mut queue: VecDeque<&str> = self.supertypes(name).into_iter().collect();
        let mut ancestors = Vec::new();

        while let Some(current) = queue.pop_front() {
            let current = raw_type(current);
            if !visited.insert(current) {
                continue;
            }
            if let Some(class) = self.classes.get(current) {
                ancestors.push(class);
            }
            queue.extend(self.supertypes(current));
        }
        ancestors
    }

    /// Public methods reachable on `class`, own declarations first
    ///
    /// An ancestor's method is hidden when a nearer class declares a method
    /// with the same name and raw parameter types.
    pub fn visible_methods<'a>(&'a self, class: &'a ClassDescriptor) -> Vec<VisibleMethod<'a>> {
        let mut visible = Vec::new();
        let mut seen: HashSet<(String, Vec<String>)> = HashSet::new();

        for declaring in std::iter::once(class).chain(self.ancestors(&class.name)) {
            let mut declared_here = Vec::new();
            for (index, method) in declaring.methods.iter().enumerate() {
                if method.visibility != Visibility::Public {
                    continue;
                }
                let key = signature_key(method);
                if seen.contains(&key) {
                    continue;
                }
                declared_here.push(key);
                visible.push(VisibleMethod { declaring, index, method });
            }
            seen.extend(declared_here);
        }
        visible
    }

    /// Index of the most specific declared method for a name and raw parameter list
    ///
    /// Among same-signature declarations the one whose return type is
    /// assignable to every other candidate's wins; otherwise the first
    /// declared candidate. `None` when the class declares no such method.
    pub fn most_specific_declared(
        &self,
        class: &ClassDescriptor,
        name: &str,
        raw_params: &[&str],
    ) -> Option<usize> {
        let candidates: Vec<usize> = class
            .methods
            .iter()
            .enumerate()
            .filter(|(_, m)| m.same_signature(name, raw_params))
            .map(|(index, _)| index)
            .collect();

        let first = *candidates.first()?;
        let most_specific = candidates.iter().copied().find(|&candidate| {
            let ret = &class.methods[candidate].return_type;
            candidates
                .iter()
                .all(|&other| self.is_assignable(ret, &class.methods[other].return_type))
        });
        Some(most_specific.unwrap_or(first))
    }
}

fn signature_key(method: &MethodSignature) -> (String, Vec<String>) {
    (
        method.name.clone(),
        method
            .raw_parameter_types()
            .into_iter()
            .map(str::to_string)
            .collect(),
    )
}

fn source_label(source: &Option<PathBuf>) -> String {
    source
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<memory>".to_string())
}

/// Namespace part of a qualified name (`a.b.C` → `a.b`, `a::b::C` → `a::b`)
pub fn namespace_of(name: &str) -> &str {
    if let Some((namespace, _)) = name.rsplit_once("::") {
        namespace
    } else if let Some((namespace, _)) = name.rsplit_once('.') {
        namespace
    } else {
        ""
    }
}

/// Last segment of a qualified name
pub fn simple_name_of(name: &str) -> &str {
    if let Some((_, simple)) = name.rsplit_once("::") {
        simple
    } else if let Some((_, simple)) = name.rsplit_once('.') {
        simple
    } else {
        name
    }
}

/// Erase references, `mut`, lifetimes and generic arguments from a declared type
pub fn raw_type(ty: &str) -> &str {
    let mut t = ty.trim();
    loop {
        if let Some(rest) = t.strip_prefix('&') {
            t = rest.trim_start();
        } else if t.starts_with('\'') {
            t = t
                .split_once(char::is_whitespace)
                .map(|(_, rest)| rest.trim_start())
                .unwrap_or("");
        } else if let Some(rest) = t.strip_prefix("mut ") {
            t = rest.trim_start();
        } else {
            break;
        }
    }
    match t.find('<') {
        Some(index) => t[..index].trim_end(),
        None => t,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn library() -> BindingLibrary {
        BindingLibrary::new()
            .with_class(ClassDescriptor::new("net.ApiResource").with_modifiers(Modifiers::new(true, false)))
            .and_then(|l| l.with_class(ClassDescriptor::new("net.RequestOptions")))
            .and_then(|l| {
                l.with_class(ClassDescriptor::new("net.TelemetryOptions").extends("net.RequestOptions"))
            })
            .and_then(|l| {
                l.with_class(
                    ClassDescriptor::new("net.Charge")
                        .extends("net.ApiResource")
                        .with_method(MethodSignature::new("close").param("net.RequestOptions")),
                )
            })
            .and_then(|l| {
                l.with_class(
                    ClassDescriptor::new("net.Refund")
                        .extends("net.Charge")
                        .with_method(MethodSignature::new("close").param("net.RequestOptions"))
                        .with_method(MethodSignature::new("hidden").visibility(Visibility::Private)),
                )
            })
            .and_then(|l| l.with_external(ExternalType::new("java.util.HashMap").implements("java.util.Map")))
            .unwrap()
    }

    #[rstest]
    #[case("java.util.Map<String, Object>", "java.util.Map")]
    #[case("&RequestOptions", "RequestOptions")]
    #[case("& 'a mut RequestOptions", "RequestOptions")]
    #[case("Vec < String >", "Vec")]
    #[case("java.lang.String", "java.lang.String")]
    fn test_raw_type(#[case] declared: &str, #[case] expected: &str) {
        assert_eq!(raw_type(declared), expected);
    }

    #[test]
    fn test_namespace_and_simple_name() {
        assert_eq!(namespace_of("com.stripe.model.Card"), "com.stripe.model");
        assert_eq!(namespace_of("sdk::model::Card"), "sdk::model");
        assert_eq!(namespace_of("Card"), "");
        assert_eq!(simple_name_of("com.stripe.model.Card"), "Card");
        assert_eq!(simple_name_of("sdk::model::Card"), "Card");
    }

    #[test]
    fn test_assignability() {
        let lib = library();
        assert!(lib.is_assignable("net.Refund", "net.ApiResource"));
        assert!(lib.is_assignable("net.TelemetryOptions", "net.RequestOptions"));
        assert!(lib.is_assignable("java.util.HashMap<String, String>", "java.util.Map"));
        assert!(lib.is_assignable("net.Charge", "net.Charge"));
        assert!(!lib.is_assignable("net.ApiResource", "net.Charge"));
        assert!(!lib.is_assignable("java.lang.String", "net.RequestOptions"));
    }

    #[test]
    fn test_duplicate_class_is_load_error() {
        let err = library()
            .with_class(ClassDescriptor::new("net.Charge"))
            .unwrap_err();
        assert!(err.is_load_failure());
    }

    #[test]
    fn test_visible_methods_hide_overridden_and_private() {
        let lib = library();
        let refund = lib.class("net.Refund").unwrap();
        let visible = lib.visible_methods(refund);

        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].declaring.name, "net.Refund");
        assert_eq!(visible[0].method.name, "close");
    }

    #[test]
    fn test_visible_methods_include_inherited() {
        let lib = library()
            .with_class(ClassDescriptor::new("net.Payout").extends("net.Charge"))
            .unwrap();
        let payout = lib.class("net.Payout").unwrap();
        let visible = lib.visible_methods(payout);

        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].declaring.name, "net.Charge");
    }

    #[test]
    fn test_most_specific_prefers_covariant_return() {
        let lib = library();
        let class = ClassDescriptor::new("net.Box")
            .with_method(MethodSignature::new("open").param("net.RequestOptions").returns("net.ApiResource"))
            .with_method(MethodSignature::new("open").param("net.RequestOptions").returns("net.Charge"));

        let index = lib.most_specific_declared(&class, "open", &["net.RequestOptions"]);
        assert_eq!(index, Some(1));
        assert_eq!(lib.most_specific_declared(&class, "open", &[]), None);
    }

    #[test]
    fn test_unresolved_supertypes() {
        let lib = library();
        let orphan = ClassDescriptor::new("net.Orphan").extends("net.Missing").implements("java.util.HashMap");
        assert_eq!(lib.unresolved_supertypes(&orphan), vec!["net.Missing"]);
    }
}
