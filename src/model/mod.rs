//! # Service Model
//!
//! Validated, immutable description of one annotated trait. A [`ServiceSpec`]
//! is what every processor consumes; nothing downstream looks at doc comments
//! again. [`ServiceBuilder`] turns an [`InterfaceDecl`](crate::source::InterfaceDecl)
//! into a spec or explains why it cannot.

mod build;
mod names;

pub use build::*;
pub use names::*;

use crate::directive::{route_shape, DocumentDirectives, ResponseBody, ResponseHeaderDirective};
use crate::source::FieldDecl;
use http::Method;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Content type assumed when a method does not declare one
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Status returned on success when a method does not declare one
pub const DEFAULT_STATUS: u16 = 200;

/// Where a parameter travels on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ParamSource {
    Path,
    Query,
    Header,
    Body,
}

impl fmt::Display for ParamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParamSource::Path => "path",
            ParamSource::Query => "query",
            ParamSource::Header => "header",
            ParamSource::Body => "body",
        };
        f.write_str(s)
    }
}

/// One method parameter and its wire location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterBinding {
    pub name: String,
    pub source: ParamSource,
    /// Declared Rust type, e.g. `Option<u32>`
    pub type_hint: String,
    /// Query key, header name or JSON field name
    pub key: String,
}

impl ParameterBinding {
    /// Inner type for `Option<T>` parameters
    pub fn optional_inner(&self) -> Option<&str> {
        option_inner(&self.type_hint)
    }
}

/// Request and response shape shared by every binding of one method
///
/// Server and client code are rendered from this value only, so the two
/// sides cannot disagree on verb, path, content types or body kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireContract {
    pub verb: Method,
    pub path: String,
    pub request_content_type: String,
    pub response_content_type: Option<String>,
    pub response_body: ResponseBody,
    pub response_status: u16,
}

impl WireContract {
    /// `VERB /path`, the route registration string
    pub fn route(&self) -> String {
        format!("{} {}", self.verb, self.path)
    }

    /// `VERB /shape`, equal for routes that match the same requests
    pub fn route_key(&self) -> String {
        format!("{} {}", self.verb, route_shape(&self.path))
    }
}

/// Summary and description attached to one operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationDoc {
    pub summary: Option<String>,
    pub description: Option<String>,
}

/// Complete, validated wire contract of one service method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSpec {
    pub name: String,
    pub verb: Method,
    pub uri_template: String,
    /// `{var}` names of `uri_template`, in order
    pub path_variables: Vec<String>,
    /// Parameters in declaration order
    pub params: Vec<ParameterBinding>,
    pub request_content_type: String,
    /// Explicit response content type
    pub response_content_type: Option<String>,
    pub response_content_encoding: Option<String>,
    pub response_status: u16,
    pub response_body: ResponseBody,
    pub response_headers: Vec<ResponseHeaderDirective>,
    /// Field name to JSON name for the success value
    pub response_json_tags: BTreeMap<String, String>,
    /// Error variant to status
    pub error_status: BTreeMap<String, u16>,
    pub doc: OperationDoc,
    pub is_async: bool,
    pub ok_type: Option<String>,
    pub err_type: Option<String>,
    pub returns_result: bool,
    /// Fields of the success type, when it is an indexed struct
    pub response_fields: Option<Vec<FieldDecl>>,
}

impl MethodSpec {
    pub fn wire_contract(&self) -> WireContract {
        WireContract {
            verb: self.verb.clone(),
            path: self.uri_template.clone(),
            request_content_type: self.request_content_type.clone(),
            response_content_type: self.effective_response_content_type(),
            response_body: self.response_body.clone(),
            response_status: self.response_status,
        }
    }

    pub fn route(&self) -> String {
        format!("{} {}", self.verb, self.uri_template)
    }

    pub fn route_key(&self) -> String {
        format!("{} {}", self.verb, route_shape(&self.uri_template))
    }

    /// Content type written on success, if the response has a body
    pub fn effective_response_content_type(&self) -> Option<String> {
        if let Some(ct) = &self.response_content_type {
            return Some(ct.clone());
        }
        match &self.response_body {
            ResponseBody::Json | ResponseBody::Field(_) => Some(DEFAULT_CONTENT_TYPE.to_string()),
            ResponseBody::Raw => Some(
                match self.ok_type.as_deref() {
                    Some(t) if is_text_type(t) => "text/plain; charset=utf-8",
                    _ => "application/octet-stream",
                }
                .to_string(),
            ),
            ResponseBody::Empty => None,
        }
    }

    pub fn params_from(&self, source: ParamSource) -> impl Iterator<Item = &ParameterBinding> {
        self.params.iter().filter(move |p| p.source == source)
    }

    pub fn has_json_body(&self) -> bool {
        is_json(&self.request_content_type)
    }

    /// Return type as written in the trait
    pub fn return_type(&self) -> String {
        match (&self.ok_type, &self.err_type, self.returns_result) {
            (Some(ok), Some(err), true) => format!("Result<{ok}, {err}>"),
            (None, Some(err), true) => format!("Result<(), {err}>"),
            (Some(ok), None, false) => ok.clone(),
            _ => "()".to_string(),
        }
    }

    /// `fn name(&self, a: A) -> R`, with `async` when declared so
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| format!(", {}: {}", p.name, p.type_hint))
            .collect();
        let ret = self.return_type();
        let arrow = if ret == "()" {
            String::new()
        } else {
            format!(" -> {ret}")
        };
        format!(
            "{}fn {}(&self{}){}",
            if self.is_async { "async " } else { "" },
            self.name,
            params.concat(),
            arrow
        )
    }
}

/// Artifact kinds a service can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProcessorKind {
    HttpServer,
    HttpClient,
    HttpsClient,
    HttpErrors,
    Metrics,
    Log,
    Mock,
    Swagger,
}

impl ProcessorKind {
    pub const ALL: [ProcessorKind; 8] = [
        ProcessorKind::HttpServer,
        ProcessorKind::HttpClient,
        ProcessorKind::HttpsClient,
        ProcessorKind::HttpErrors,
        ProcessorKind::Metrics,
        ProcessorKind::Log,
        ProcessorKind::Mock,
        ProcessorKind::Swagger,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessorKind::HttpServer => "http-server",
            ProcessorKind::HttpClient => "http-client",
            ProcessorKind::HttpsClient => "https-client",
            ProcessorKind::HttpErrors => "http-errors",
            ProcessorKind::Metrics => "metrics",
            ProcessorKind::Log => "log",
            ProcessorKind::Mock => "mock",
            ProcessorKind::Swagger => "swagger",
        }
    }

    pub fn is_client(&self) -> bool {
        matches!(self, ProcessorKind::HttpClient | ProcessorKind::HttpsClient)
    }
}

impl fmt::Display for ProcessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProcessorKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown processor `{s}`"))
    }
}

/// Processors selected for one service
pub type ProcessorSet = BTreeSet<ProcessorKind>;

/// Selection used when a trait names no processors
pub fn default_processors() -> ProcessorSet {
    ProcessorKind::ALL
        .into_iter()
        .filter(|k| *k != ProcessorKind::HttpsClient)
        .collect()
}

/// Validated description of one annotated trait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    pub interface_name: String,
    /// Marked methods, in declaration order; never empty
    pub methods: Vec<MethodSpec>,
    /// `crate::a::b::Trait`
    pub import_path: String,
    /// Module declaring the trait
    pub module_path: String,
    pub source_path: PathBuf,
    pub processors: ProcessorSet,
    /// Error type shared by every `Result` method
    pub error_type: Option<String>,
    /// Variants of `error_type`, when it is an indexed enum
    pub error_variants: Option<Vec<crate::source::VariantDecl>>,
    /// `use` paths for types named in method signatures
    pub imports: Vec<String>,
    /// Document-scoped directives from the trait and its methods
    pub document: DocumentDirectives,
}

impl ServiceSpec {
    /// Directory and module name of the generated code
    pub fn snake_name(&self) -> String {
        to_snake_case(&self.interface_name)
    }

    pub fn has(&self, kind: ProcessorKind) -> bool {
        self.processors.contains(&kind)
    }

    /// Output directory, where `mod <service_snake>;` in the declaring file
    /// resolves: `src/items.rs` gives `src/items/item_service`, while
    /// `mod.rs`, `lib.rs` and `main.rs` give a direct child directory
    pub fn output_dir(&self) -> PathBuf {
        let parent = self
            .source_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let stem = self
            .source_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let base = match stem {
            "" | "mod" | "lib" | "main" => parent,
            _ => parent.join(stem),
        };
        base.join(self.snake_name())
    }

    /// Every error identifier mapped by any method, with its status
    pub fn error_statuses(&self) -> BTreeMap<String, u16> {
        self.methods
            .iter()
            .flat_map(|m| m.error_status.iter())
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }
}

/// JSON media types: `application/json` and any `+json` suffix
pub fn is_json(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}

pub fn is_text_type(ty: &str) -> bool {
    matches!(ty, "String" | "&str" | "str")
}

pub fn is_bytes_type(ty: &str) -> bool {
    matches!(ty, "Vec<u8>" | "&[u8]" | "[u8]")
}

/// `T` for `Option<T>`
pub fn option_inner(ty: &str) -> Option<&str> {
    ty.strip_prefix("Option<")
        .and_then(|t| t.strip_suffix('>'))
        .map(str::trim)
}

/// Referenced type for `&T`, `&'a T` or `&mut T`
pub fn reference_inner(ty: &str) -> Option<&str> {
    let rest = ty.strip_prefix('&')?;
    let rest = match rest.strip_prefix('\'') {
        Some(lifetimed) => lifetimed.split_once(' ').map(|(_, t)| t).unwrap_or(lifetimed),
        None => rest,
    };
    Some(rest.strip_prefix("mut ").unwrap_or(rest).trim())
}
