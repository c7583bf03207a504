//! Rust binding sources as an inventory, extracted with syn
//!
//! Code Quality Principle: Specialized Analysis Services - the Rust source reads symbols, not text
//! - Structs and enums become final classes; traits become abstract capabilities
//! - `impl Trait for Type` adds the trait to the type's capabilities
//! - Methods of every `impl` block are declared on the implementing type
//!
//! Qualified names use real module paths rooted at `crate` (`src/net/charge.rs`
//! holds `crate::net::charge`). Bare and `crate::` references are linked to
//! extracted types by name once every file is parsed; other paths are
//! external types.

use crate::domain::inventory::{
    namespace_of, raw_type, simple_name_of, ClassDescriptor, ExternalType, MethodSignature,
    Modifiers, Parameter, Visibility,
};
use crate::domain::violations::{ConformanceError, ConformanceResult};
use crate::inventory::{ImplBlock, InventorySource, LoadedUnit};
use quote::ToTokens;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use syn::visit::Visit;

/// Reads `.rs` files
#[derive(Debug, Default)]
pub struct RustSource;

impl RustSource {
    pub fn new() -> Self {
        Self
    }
}

impl InventorySource for RustSource {
    fn name(&self) -> &'static str {
        "rust"
    }

    fn handles_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext == "rs")
            .unwrap_or(false)
    }

    fn load(&self, path: &Path, relative: &Path, content: &str) -> ConformanceResult<LoadedUnit> {
        let syntax_tree = syn::parse_file(content).map_err(|e| {
            let start = e.span().start();
            ConformanceError::load(
                path.display().to_string(),
                format!("Failed to parse Rust source at {}:{}: {e}", start.line, start.column + 1),
            )
        })?;

        let module = module_path(relative);

        let mut imports = UseCollector {
            module: module.clone(),
            imports: HashMap::new(),
        };
        imports.visit_file(&syntax_tree);

        let mut collector = ItemCollector {
            module,
            imports: imports.imports,
            unit: LoadedUnit::default(),
            file: path,
        };
        collector.visit_file(&syntax_tree);
        Ok(collector.unit)
    }

    fn finish(&self, units: &mut Vec<LoadedUnit>) -> ConformanceResult<()> {
        let linker = Linker::new(units.as_slice());

        let impls: Vec<ImplBlock> = units
            .iter_mut()
            .flat_map(|u| std::mem::take(&mut u.impls))
            .collect();
        for block in impls {
            let target = linker.link(&block.target, &block.namespace);
            let Some(class) = units
                .iter_mut()
                .flat_map(|u| u.classes.iter_mut())
                .find(|c| c.name == target)
            else {
                tracing::debug!(
                    "Skipping impl block for {} in {}: not a binding type",
                    block.target,
                    block.source.display()
                );
                continue;
            };
            if let Some(capability) = block.capability {
                if !class.interfaces.contains(&capability) {
                    class.interfaces.push(capability);
                }
            }
            class.methods.extend(block.methods);
        }

        let mut external = BTreeSet::new();
        for class in units.iter_mut().flat_map(|u| u.classes.iter_mut()) {
            let namespace = class.namespace().to_string();
            if let Some(superclass) = class.superclass.as_mut() {
                *superclass = linker.link(superclass, &namespace);
            }
            for interface in &mut class.interfaces {
                *interface = linker.link(interface, &namespace);
            }
            for method in &mut class.methods {
                for parameter in &mut method.parameters {
                    parameter.ty = linker.link(&parameter.ty, &namespace);
                }
                method.return_type = linker.link(&method.return_type, &namespace);
            }
            for supertype in class.supertypes() {
                if !linker.is_class(supertype) && !supertype.starts_with("crate::") {
                    external.insert(supertype.to_string());
                }
            }
        }

        if !external.is_empty() {
            units.push(LoadedUnit {
                external: external.into_iter().map(ExternalType::new).collect(),
                ..Default::default()
            });
        }
        Ok(())
    }
}

/// Resolves crate-local references to qualified class names
struct Linker {
    by_simple_name: HashMap<String, Vec<String>>,
    classes: HashSet<String>,
}

impl Linker {
    fn new(units: &[LoadedUnit]) -> Self {
        let mut by_simple_name: HashMap<String, Vec<String>> = HashMap::new();
        let mut classes = HashSet::new();
        for class in units.iter().flat_map(|u| u.classes.iter()) {
            by_simple_name
                .entry(class.simple_name().to_string())
                .or_default()
                .push(class.name.clone());
            classes.insert(class.name.clone());
        }
        Self { by_simple_name, classes }
    }

    fn is_class(&self, name: &str) -> bool {
        self.classes.contains(name)
    }

    fn link(&self, reference: &str, namespace: &str) -> String {
        let head = raw_type(reference);
        if self.classes.contains(head) {
            return reference.to_string();
        }
        let is_local = head.starts_with("crate::") || !head.contains("::");
        if !is_local {
            return reference.to_string();
        }

        let resolved = match self.by_simple_name.get(simple_name_of(head)) {
            Some(candidates) if candidates.len() == 1 => Some(&candidates[0]),
            Some(candidates) => candidates.iter().find(|c| namespace_of(c) == namespace),
            None => None,
        };

        match resolved {
            Some(name) => {
                let suffix = reference
                    .find(head)
                    .map(|start| &reference[start + head.len()..])
                    .unwrap_or("");
                format!("{name}{suffix}")
            }
            None => reference.to_string(),
        }
    }
}

/// `crate` followed by the module path of a file below its root
fn module_path(relative: &Path) -> Vec<String> {
    let mut module = vec!["crate".to_string()];
    let components: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    let Some((file, dirs)) = components.split_last() else {
        return module;
    };
    let dirs = match dirs.first() {
        Some(first) if first == "src" => &dirs[1..],
        _ => dirs,
    };
    module.extend(dirs.iter().cloned());

    let stem = file.strip_suffix(".rs").unwrap_or(file);
    if !matches!(stem, "lib" | "main" | "mod") {
        module.push(stem.to_string());
    }
    module
}

fn is_test_module(attrs: &[syn::Attribute]) -> bool {
    attrs.iter().any(|attr| match &attr.meta {
        syn::Meta::List(list) => list.path.is_ident("cfg") && list.tokens.to_string() == "test",
        _ => false,
    })
}

fn is_deprecated(attrs: &[syn::Attribute]) -> bool {
    attrs.iter().any(|attr| attr.path().is_ident("deprecated"))
}

fn visibility_of(vis: &syn::Visibility) -> Visibility {
    match vis {
        syn::Visibility::Public(_) => Visibility::Public,
        syn::Visibility::Restricted(_) => Visibility::Package,
        syn::Visibility::Inherited => Visibility::Private,
    }
}

/// Absolute path of `segments` as seen from `module`
fn absolutize(segments: &[String], module: &[String]) -> Vec<String> {
    match segments.first().map(String::as_str) {
        Some("self") => module.iter().chain(&segments[1..]).cloned().collect(),
        Some("super") => {
            let supers = segments.iter().take_while(|s| *s == "super").count();
            let keep = module.len().saturating_sub(supers).max(1);
            module[..keep].iter().chain(&segments[supers..]).cloned().collect()
        }
        _ => segments.to_vec(),
    }
}

/// Collects `use` imports as `alias -> absolute path`
struct UseCollector {
    module: Vec<String>,
    imports: HashMap<String, String>,
}

impl UseCollector {
    fn flatten(&mut self, tree: &syn::UseTree, prefix: Vec<String>) {
        match tree {
            syn::UseTree::Path(path) => {
                let mut prefix = prefix;
                prefix.push(path.ident.to_string());
                self.flatten(&path.tree, prefix);
            }
            syn::UseTree::Name(name) => {
                let ident = name.ident.to_string();
                if ident == "self" {
                    if let Some(alias) = prefix.last().cloned() {
                        self.record(alias, &prefix);
                    }
                } else {
                    let mut path = prefix;
                    path.push(ident.clone());
                    self.record(ident, &path);
                }
            }
            syn::UseTree::Rename(rename) => {
                let mut path = prefix;
                path.push(rename.ident.to_string());
                self.record(rename.rename.to_string(), &path);
            }
            syn::UseTree::Group(group) => {
                for item in &group.items {
                    self.flatten(item, prefix.clone());
                }
            }
            syn::UseTree::Glob(_) => {}
        }
    }

    fn record(&mut self, alias: String, path: &[String]) {
        let absolute = absolutize(path, &self.module);
        self.imports.insert(alias, absolute.join("::"));
    }
}

impl Visit<'_> for UseCollector {
    fn visit_item_use(&mut self, item: &syn::ItemUse) {
        self.flatten(&item.tree, Vec::new());
    }

    fn visit_item_mod(&mut self, item: &syn::ItemMod) {
        if is_test_module(&item.attrs) {
            return;
        }
        self.module.push(item.ident.to_string());
        syn::visit::visit_item_mod(self, item);
        self.module.pop();
    }

    fn visit_item_fn(&mut self, _item: &syn::ItemFn) {}

    fn visit_item_impl(&mut self, _item: &syn::ItemImpl) {}
}

/// Collects type definitions and impl blocks
struct ItemCollector<'a> {
    module: Vec<String>,
    imports: HashMap<String, String>,
    unit: LoadedUnit,
    file: &'a Path,
}

impl ItemCollector<'_> {
    fn namespace(&self) -> String {
        self.module.join("::")
    }

    fn qualify(&self, ident: &syn::Ident) -> String {
        format!("{}::{}", self.namespace(), ident)
    }

    /// Resolve a path against imports and the current module, generic arguments dropped
    fn resolve_path(&self, path: &syn::Path) -> String {
        let segments: Vec<String> = path.segments.iter().map(|s| s.ident.to_string()).collect();
        let Some(first) = segments.first() else {
            return String::new();
        };

        match first.as_str() {
            "crate" | "Self" => segments.join("::"),
            "self" | "super" => absolutize(&segments, &self.module).join("::"),
            _ => match self.imports.get(first) {
                Some(imported) => std::iter::once(imported.clone())
                    .chain(segments[1..].iter().cloned())
                    .collect::<Vec<_>>()
                    .join("::"),
                None => segments.join("::"),
            },
        }
    }

    /// Declared type text; `peel` drops references and `Option` wrappers
    fn type_text(&self, ty: &syn::Type, peel: bool) -> String {
        let ty = if peel { peel_type(ty) } else { ty };
        match ty {
            syn::Type::Path(type_path) if type_path.qself.is_none() => {
                let head = self.resolve_path(&type_path.path);
                let arguments = type_path
                    .path
                    .segments
                    .last()
                    .map(|s| normalize_tokens(&s.arguments.to_token_stream().to_string()))
                    .unwrap_or_default();
                format!("{head}{arguments}")
            }
            other => normalize_tokens(&other.to_token_stream().to_string()),
        }
    }

    fn method(&self, sig: &syn::Signature, visibility: Visibility, attrs: &[syn::Attribute]) -> MethodSignature {
        let parameters = sig
            .inputs
            .iter()
            .filter_map(|input| match input {
                syn::FnArg::Typed(typed) => {
                    let ty = self.type_text(&typed.ty, true);
                    Some(match typed.pat.as_ref() {
                        syn::Pat::Ident(ident) => Parameter::named(ident.ident.to_string(), ty),
                        _ => Parameter::new(ty),
                    })
                }
                syn::FnArg::Receiver(_) => None,
            })
            .collect();

        let return_type = match &sig.output {
            syn::ReturnType::Default => "()".to_string(),
            syn::ReturnType::Type(_, ty) => self.type_text(ty, false),
        };

        MethodSignature {
            name: sig.ident.to_string(),
            parameters,
            return_type,
            visibility,
            deprecated: is_deprecated(attrs),
            is_static: sig.receiver().is_none(),
        }
    }

    fn push_type(&mut self, ident: &syn::Ident) {
        let class = ClassDescriptor::new(self.qualify(ident)).with_modifiers(Modifiers::new(false, true));
        self.unit.classes.push(class);
    }
}

impl Visit<'_> for ItemCollector<'_> {
    fn visit_item_mod(&mut self, item: &syn::ItemMod) {
        if is_test_module(&item.attrs) {
            return;
        }
        self.module.push(item.ident.to_string());
        syn::visit::visit_item_mod(self, item);
        self.module.pop();
    }

    fn visit_item_fn(&mut self, _item: &syn::ItemFn) {}

    fn visit_item_struct(&mut self, item: &syn::ItemStruct) {
        self.push_type(&item.ident);
    }

    fn visit_item_enum(&mut self, item: &syn::ItemEnum) {
        self.push_type(&item.ident);
    }

    fn visit_item_trait(&mut self, item: &syn::ItemTrait) {
        let mut class = ClassDescriptor::interface(self.qualify(&item.ident));
        for bound in &item.supertraits {
            if let syn::TypeParamBound::Trait(trait_bound) = bound {
                class.interfaces.push(self.resolve_path(&trait_bound.path));
            }
        }
        for trait_item in &item.items {
            if let syn::TraitItem::Fn(function) = trait_item {
                class
                    .methods
                    .push(self.method(&function.sig, Visibility::Public, &function.attrs));
            }
        }
        self.unit.classes.push(class);
    }

    fn visit_item_impl(&mut self, item: &syn::ItemImpl) {
        let syn::Type::Path(self_ty) = item.self_ty.as_ref() else {
            return;
        };
        let capability = item
            .trait_
            .as_ref()
            .filter(|(negative, _, _)| negative.is_none())
            .map(|(_, path, _)| self.resolve_path(path));

        let methods = item
            .items
            .iter()
            .filter_map(|impl_item| match impl_item {
                syn::ImplItem::Fn(function) => {
                    let visibility = if capability.is_some() {
                        Visibility::Public
                    } else {
                        visibility_of(&function.vis)
                    };
                    Some(self.method(&function.sig, visibility, &function.attrs))
                }
                _ => None,
            })
            .collect();

        self.unit.impls.push(ImplBlock {
            target: self.resolve_path(&self_ty.path),
            namespace: self.namespace(),
            capability,
            methods,
            source: self.file.to_path_buf(),
        });
    }
}

/// Strip references, parentheses and `Option<..>` around a parameter type
fn peel_type(ty: &syn::Type) -> &syn::Type {
    match ty {
        syn::Type::Reference(reference) => peel_type(&reference.elem),
        syn::Type::Paren(paren) => peel_type(&paren.elem),
        syn::Type::Group(group) => peel_type(&group.elem),
        syn::Type::Path(type_path) if type_path.qself.is_none() => {
            let Some(last) = type_path.path.segments.last() else {
                return ty;
            };
            if last.ident != "Option" {
                return ty;
            }
            match &last.arguments {
                syn::PathArguments::AngleBracketed(args) if args.args.len() == 1 => {
                    match args.args.first() {
                        Some(syn::GenericArgument::Type(inner)) => peel_type(inner),
                        _ => ty,
                    }
                }
                _ => ty,
            }
        }
        _ => ty,
    }
}

/// Collapse the token spacing `quote` produces (`HashMap < String , Value >`)
fn normalize_tokens(tokens: &str) -> String {
    tokens
        .replace(" :: ", "::")
        .replace(":: ", "::")
        .replace(" <", "<")
        .replace("< ", "<")
        .replace(" >", ">")
        .replace(" ,", ",")
        .replace("& ", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn load_all(files: &[(&str, &str)]) -> ConformanceResult<Vec<LoadedUnit>> {
        let source = RustSource::new();
        let mut units = Vec::new();
        for (relative, content) in files {
            let path = PathBuf::from("/sdk").join(relative);
            units.push(source.load(&path, Path::new(relative), content)?);
        }
        source.finish(&mut units)?;
        Ok(units)
    }

    fn class<'a>(units: &'a [LoadedUnit], name: &str) -> &'a ClassDescriptor {
        units
            .iter()
            .flat_map(|u| u.classes.iter())
            .find(|c| c.name == name)
            .unwrap_or_else(|| panic!("class {name} not extracted"))
    }

    const NET: &str = r#"
pub trait ApiResource {
    fn object_name(&self) -> &str;
}

pub struct RequestOptions {
    pub api_key: Option<String>,
}
"#;

    const CHARGE: &str = r#"
use std::collections::HashMap;
use crate::net::{ApiResource, RequestOptions};

pub struct Charge {
    id: String,
}

impl ApiResource for Charge {
    fn object_name(&self) -> &str { "charge" }
}

impl Charge {
    pub fn create(params: &HashMap<String, String>, options: Option<&RequestOptions>) -> Charge {
        todo!()
    }

    pub fn capture(&self, amount: u64) -> Charge { todo!() }

    #[deprecated]
    pub fn refund(&self) {}

    fn internal(&self, value: u8) {}

    pub(crate) fn crate_only(&self, value: u8) {}
}

#[cfg(test)]
mod tests {
    pub struct NotABinding;
}
"#;

    #[test]
    fn test_module_path() {
        assert_eq!(module_path(Path::new("src/lib.rs")), vec!["crate"]);
        assert_eq!(module_path(Path::new("src/net/mod.rs")), vec!["crate", "net"]);
        assert_eq!(module_path(Path::new("src/net/charge.rs")), vec!["crate", "net", "charge"]);
        assert_eq!(module_path(Path::new("model.rs")), vec!["crate", "model"]);
    }

    #[test]
    fn test_extracts_types_and_capabilities() -> ConformanceResult<()> {
        let units = load_all(&[("src/net/mod.rs", NET), ("src/net/charge.rs", CHARGE)])?;

        let resource = class(&units, "crate::net::ApiResource");
        assert!(resource.modifiers.is_abstract);
        assert_eq!(resource.methods.len(), 1);

        let charge = class(&units, "crate::net::charge::Charge");
        assert!(charge.modifiers.is_final);
        assert_eq!(charge.interfaces, vec!["crate::net::ApiResource"]);
        assert!(units.iter().flat_map(|u| u.classes.iter()).all(|c| !c.name.contains("NotABinding")));
        Ok(())
    }

    #[test]
    fn test_method_shapes() -> ConformanceResult<()> {
        let units = load_all(&[("src/net/mod.rs", NET), ("src/net/charge.rs", CHARGE)])?;
        let charge = class(&units, "crate::net::charge::Charge");
        let by_name = |name: &str| charge.methods.iter().find(|m| m.name == name).unwrap();

        let create = by_name("create");
        assert!(create.is_static);
        assert_eq!(create.parameters[0].ty, "std::collections::HashMap<String, String>");
        assert_eq!(create.parameters[1].ty, "crate::net::RequestOptions");
        assert_eq!(create.parameters[1].name.as_deref(), Some("options"));
        assert_eq!(create.return_type, "crate::net::charge::Charge");

        let capture = by_name("capture");
        assert!(!capture.is_static);
        assert_eq!(capture.raw_parameter_types(), vec!["u64"]);

        assert!(by_name("refund").deprecated);
        assert_eq!(by_name("internal").visibility, Visibility::Private);
        assert_eq!(by_name("crate_only").visibility, Visibility::Package);
        assert_eq!(by_name("object_name").visibility, Visibility::Public);
        Ok(())
    }

    #[test]
    fn test_external_capabilities_are_declared() -> ConformanceResult<()> {
        let source = r#"
use serde::Serialize;
pub struct Card;
impl Serialize for Card {}
impl Default for Card { fn default() -> Self { Card } }
"#;
        let units = load_all(&[("src/model/card.rs", source)])?;
        let card = class(&units, "crate::model::card::Card");
        assert_eq!(card.interfaces, vec!["serde::Serialize", "Default"]);

        let external: Vec<_> = units.iter().flat_map(|u| u.external.iter()).map(|e| e.name.as_str()).collect();
        assert_eq!(external, vec!["Default", "serde::Serialize"]);
        Ok(())
    }

    #[test]
    fn test_unknown_crate_capability_stays_unresolved() -> ConformanceResult<()> {
        let source = r#"
pub struct Card;
impl crate::model::Missing for Card {}
"#;
        let units = load_all(&[("src/model/card.rs", source)])?;
        let card = class(&units, "crate::model::card::Card");
        assert_eq!(card.interfaces, vec!["crate::model::Missing"]);
        assert!(units.iter().all(|u| u.external.is_empty()));
        Ok(())
    }

    #[test]
    fn test_super_and_inline_modules() -> ConformanceResult<()> {
        let source = r#"
pub trait Model {}
pub mod cards {
    use super::Model;
    pub struct Card;
    impl Model for Card {}
}
"#;
        let units = load_all(&[("src/model/mod.rs", source)])?;
        let card = class(&units, "crate::model::cards::Card");
        assert_eq!(card.interfaces, vec!["crate::model::Model"]);
        Ok(())
    }

    #[test]
    fn test_syntax_error_is_load_error() {
        let err = RustSource::new()
            .load(Path::new("/sdk/src/lib.rs"), Path::new("src/lib.rs"), "pub struct {")
            .unwrap_err();
        assert!(err.is_load_failure());
        assert!(err.to_string().contains("Failed to parse Rust source"));
    }
}
