//! # Source Module
//!
//! Recognizes the restricted subset of Rust the generator cares about:
//!
//! - `trait` declarations, with the doc comments of the trait and of each
//!   method, and each method's receiver, parameters and return type;
//! - `enum` declarations (variant names), used to check `errors` directives;
//! - `struct` declarations with named fields, used for response envelopes and
//!   document schemas.
//!
//! Everything else in a file is ignored. Files are discovered in sorted order
//! so that two runs over the same tree see the same declarations in the same
//! order.

mod index;

pub use index::*;

use anyhow::Context;
use quote::ToTokens;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use syn::{FnArg, GenericArgument, Item, Pat, PathArguments, ReturnType, TraitItem, Type};
use walkdir::{DirEntry, WalkDir};

/// How a trait method takes `self`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receiver {
    /// `&self`
    Ref,
    /// `&mut self`
    RefMut,
    /// `self`, `self: Box<Self>`, ...
    Value,
    /// No receiver (associated function)
    None,
}

/// One method parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDecl {
    pub name: String,
    pub ty: String,
}

/// One trait method as declared
#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub name: String,
    pub docs: Vec<String>,
    pub receiver: Receiver,
    pub params: Vec<ParamDecl>,
    /// Text of the first parameter pattern that is not a plain identifier
    pub unsupported_param: Option<String>,
    /// Whether the method declares its own generic parameters
    pub is_generic: bool,
    pub is_async: bool,
    /// The trait supplies a default body
    pub has_default: bool,
    /// Full return type, `()` when omitted
    pub return_type: String,
    /// Success type; `None` for `()`
    pub ok_type: Option<String>,
    /// Error type of a `Result<T, E>` return
    pub err_type: Option<String>,
    pub returns_result: bool,
    /// Single-segment type names mentioned in the signature
    pub referenced_types: BTreeSet<String>,
}

/// A trait declaration together with where it lives
#[derive(Debug, Clone)]
pub struct InterfaceDecl {
    pub name: String,
    pub docs: Vec<String>,
    pub methods: Vec<MethodDecl>,
    /// Module path of the declaring module, e.g. `crate::service`
    pub module_path: String,
    pub source_path: PathBuf,
    pub is_generic: bool,
}

impl InterfaceDecl {
    /// Path to import the trait from generated code
    pub fn import_path(&self) -> String {
        format!("{}::{}", self.module_path, self.name)
    }
}

/// Everything recognized in one file
#[derive(Debug, Clone, Default)]
pub struct ParsedSource {
    pub interfaces: Vec<InterfaceDecl>,
    pub types: Vec<TypeDecl>,
}

/// Parse one source file
///
/// # Errors
///
/// Returns the `syn` error when the file is not valid Rust.
pub fn parse_source(path: &Path, text: &str, module_path: &str) -> syn::Result<ParsedSource> {
    let file = syn::parse_file(text)?;
    let mut parsed = ParsedSource::default();
    collect_items(path, &file.items, module_path, &mut parsed);
    Ok(parsed)
}

fn collect_items(path: &Path, items: &[Item], module_path: &str, out: &mut ParsedSource) {
    for item in items {
        match item {
            Item::Trait(t) => out.interfaces.push(InterfaceDecl {
                name: t.ident.to_string(),
                docs: doc_lines(&t.attrs),
                methods: t
                    .items
                    .iter()
                    .filter_map(|i| match i {
                        TraitItem::Fn(f) => Some(method_decl(f)),
                        _ => None,
                    })
                    .collect(),
                module_path: module_path.to_string(),
                source_path: path.to_path_buf(),
                is_generic: !t.generics.params.is_empty(),
            }),
            Item::Enum(e) => out.types.push(TypeDecl {
                name: e.ident.to_string(),
                module_path: module_path.to_string(),
                shape: TypeShape::Enum(
                    e.variants
                        .iter()
                        .map(|v| VariantDecl {
                            name: v.ident.to_string(),
                            unit: matches!(v.fields, syn::Fields::Unit),
                        })
                        .collect(),
                ),
            }),
            Item::Struct(s) => out.types.push(TypeDecl {
                name: s.ident.to_string(),
                module_path: module_path.to_string(),
                shape: match &s.fields {
                    syn::Fields::Named(named) => TypeShape::Struct(
                        named
                            .named
                            .iter()
                            .filter_map(|f| {
                                f.ident.as_ref().map(|ident| {
                                    let mut referenced_types = BTreeSet::new();
                                    collect_type_names(&f.ty, &mut referenced_types);
                                    FieldDecl {
                                        name: ident.to_string(),
                                        ty: type_to_string(&f.ty),
                                        referenced_types,
                                    }
                                })
                            })
                            .collect(),
                    ),
                    _ => TypeShape::Opaque,
                },
            }),
            Item::Type(t) => out.types.push(TypeDecl {
                name: t.ident.to_string(),
                module_path: module_path.to_string(),
                shape: TypeShape::Opaque,
            }),
            Item::Mod(m) => {
                if let Some((_, inner)) = &m.content {
                    let nested = format!("{module_path}::{}", m.ident);
                    collect_items(path, inner, &nested, out);
                }
            }
            _ => {}
        }
    }
}

fn method_decl(f: &syn::TraitItemFn) -> MethodDecl {
    let sig = &f.sig;
    let receiver = match sig.receiver() {
        Some(r) if r.reference.is_some() && r.mutability.is_some() => Receiver::RefMut,
        Some(r) if r.reference.is_some() => Receiver::Ref,
        Some(_) => Receiver::Value,
        None => Receiver::None,
    };

    let mut params = Vec::new();
    let mut unsupported_param = None;
    let mut referenced_types = BTreeSet::new();
    for input in &sig.inputs {
        let FnArg::Typed(pt) = input else { continue };
        collect_type_names(&pt.ty, &mut referenced_types);
        match pt.pat.as_ref() {
            Pat::Ident(pi) => params.push(ParamDecl {
                name: pi.ident.to_string(),
                ty: type_to_string(&pt.ty),
            }),
            other => {
                unsupported_param.get_or_insert_with(|| tokens_to_string(other));
            }
        }
    }

    let (return_type, ok_type, err_type, returns_result) = match &sig.output {
        ReturnType::Default => ("()".to_string(), None, None, false),
        ReturnType::Type(_, ty) => {
            collect_type_names(ty, &mut referenced_types);
            match split_result(ty) {
                Some((ok, err)) => (
                    type_to_string(ty),
                    non_unit(ok),
                    err.map(type_to_string),
                    true,
                ),
                None => (type_to_string(ty), non_unit(ty), None, false),
            }
        }
    };

    MethodDecl {
        name: sig.ident.to_string(),
        docs: doc_lines(&f.attrs),
        receiver,
        params,
        unsupported_param,
        is_generic: !sig.generics.params.is_empty(),
        is_async: sig.asyncness.is_some(),
        has_default: f.default.is_some(),
        return_type,
        ok_type,
        err_type,
        returns_result,
        referenced_types,
    }
}

fn non_unit(ty: &Type) -> Option<String> {
    match ty {
        Type::Tuple(t) if t.elems.is_empty() => None,
        _ => Some(type_to_string(ty)),
    }
}

/// `Result<T, E>` (or a one-argument `Result<T>` alias) split into its parts
fn split_result(ty: &Type) -> Option<(&Type, Option<&Type>)> {
    let Type::Path(p) = ty else { return None };
    let last = p.path.segments.last()?;
    if last.ident != "Result" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &last.arguments else {
        return None;
    };
    let mut types = args.args.iter().filter_map(|a| match a {
        GenericArgument::Type(t) => Some(t),
        _ => None,
    });
    let ok = types.next()?;
    Some((ok, types.next()))
}

/// Doc comment lines of an item, in order
pub fn doc_lines(attrs: &[syn::Attribute]) -> Vec<String> {
    attrs
        .iter()
        .filter(|a| a.path().is_ident("doc"))
        .filter_map(|a| match &a.meta {
            syn::Meta::NameValue(nv) => match &nv.value {
                syn::Expr::Lit(syn::ExprLit {
                    lit: syn::Lit::Str(s),
                    ..
                }) => Some(s.value()),
                _ => None,
            },
            _ => None,
        })
        .flat_map(|doc| doc.lines().map(str::to_string).collect::<Vec<_>>())
        .collect()
}

fn collect_type_names(ty: &Type, out: &mut BTreeSet<String>) {
    match ty {
        Type::Path(p) => {
            if p.qself.is_none() && p.path.segments.len() == 1 {
                out.insert(p.path.segments[0].ident.to_string());
            }
            for seg in &p.path.segments {
                if let PathArguments::AngleBracketed(args) = &seg.arguments {
                    for arg in &args.args {
                        if let GenericArgument::Type(t) = arg {
                            collect_type_names(t, out);
                        }
                    }
                }
            }
        }
        Type::Reference(r) => collect_type_names(&r.elem, out),
        Type::Slice(s) => collect_type_names(&s.elem, out),
        Type::Array(a) => collect_type_names(&a.elem, out),
        Type::Paren(p) => collect_type_names(&p.elem, out),
        Type::Group(g) => collect_type_names(&g.elem, out),
        Type::Tuple(t) => t.elems.iter().for_each(|e| collect_type_names(e, out)),
        _ => {}
    }
}

/// Render a type the way it would be written by hand
pub fn type_to_string(ty: &Type) -> String {
    tokens_to_string(ty)
}

fn tokens_to_string<T: ToTokens>(tokens: &T) -> String {
    tokens
        .to_token_stream()
        .to_string()
        .replace(" :: ", "::")
        .replace(":: ", "::")
        .replace(" <", "<")
        .replace("< ", "<")
        .replace(" >", ">")
        .replace(" ,", ",")
        .replace("& ", "&")
        .replace("( ", "(")
        .replace(" )", ")")
        .replace("[ ", "[")
        .replace(" ]", "]")
        .replace(" ;", ";")
}

/// Module path of a source file
///
/// Relative to the `src/` directory of the nearest enclosing crate
/// (`Cargo.toml`), or to `fallback_root` when there is none: `lib.rs`,
/// `main.rs` and `mod.rs` name their directory, any other file adds its stem.
pub fn resolve_module_path(file: &Path, fallback_root: &Path) -> String {
    let src_root = file
        .ancestors()
        .skip(1)
        .find(|dir| dir.join("Cargo.toml").is_file())
        .map(|root| root.join("src"))
        .filter(|src| file.starts_with(src))
        .unwrap_or_else(|| fallback_root.to_path_buf());
    let relative = file.strip_prefix(&src_root).unwrap_or(file);

    let mut segments = vec!["crate".to_string()];
    let components: Vec<_> = relative
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect();
    for (i, part) in components.iter().enumerate() {
        if i + 1 == components.len() {
            let stem = part.strip_suffix(".rs").unwrap_or(part);
            if !matches!(stem, "lib" | "main" | "mod") {
                segments.push(stem.to_string());
            }
        } else {
            segments.push(part.to_string());
        }
    }
    segments.join("::")
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|n| n.starts_with('.') || n == "target")
            .unwrap_or(false)
}

/// All `.rs` files under `root`, sorted by path components
///
/// # Errors
///
/// Returns an error if a directory cannot be read.
pub fn discover_sources(root: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e))
    {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if entry.file_type().is_file()
            && entry.path().extension().map(|e| e == "rs").unwrap_or(false)
        {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
