//! # API Document
//!
//! Aggregates the HTTP contracts of every service that selected the `swagger`
//! processor into one OpenAPI 3.1 document.
//!
//! Operations are keyed by path template and lower-case verb. Two services (or
//! two methods) claiming the same `VERB /path` is an
//! [`GenError::AggregationConflict`]; the rest of the run is unaffected.
//!
//! Document metadata starts from [`DocumentInfo`] (CLI flags and the config
//! file) and is overridden by document-scoped directives in processing
//! order, so the last service to set a title wins.

mod schema;

pub use schema::*;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::directive::{push_server, DocumentDirectives, ResponseBody, Server};
use crate::error::GenError;
use crate::model::{
    is_bytes_type, is_text_type, option_inner, MethodSpec, ParamSource, ProcessorKind, ServiceSpec,
};
use crate::source::TypeIndex;

/// OpenAPI version written into every document
pub const OPENAPI_VERSION: &str = "3.1.0";

/// Base name of the document file
pub const DOCUMENT_FILE_STEM: &str = "swagger";

/// Metadata supplied outside the source tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentInfo {
    pub title: String,
    pub version: String,
    pub description: String,
    pub servers: Vec<Server>,
}

impl DocumentInfo {
    /// Apply document-scoped directives on top of this info
    pub fn overlay(&mut self, directives: &DocumentDirectives) {
        if let Some(title) = &directives.title {
            self.title.clone_from(title);
        }
        if let Some(version) = &directives.version {
            self.version.clone_from(version);
        }
        if let Some(description) = &directives.description {
            self.description.clone_from(description);
        }
        for server in &directives.servers {
            push_server(&mut self.servers, server.clone());
        }
    }
}

/// Output encoding of the document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocFormat {
    Json,
    #[default]
    Yaml,
}

impl DocFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            DocFormat::Json => "json",
            DocFormat::Yaml => "yaml",
        }
    }

    /// `swagger.yaml` or `swagger.json`
    pub fn file_name(&self) -> String {
        format!("{DOCUMENT_FILE_STEM}.{}", self.extension())
    }
}

impl fmt::Display for DocFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for DocFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(DocFormat::Json),
            "yaml" | "yml" => Ok(DocFormat::Yaml),
            other => Err(format!("unknown document format `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Info {
    pub title: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: String,
    pub required: bool,
    pub schema: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaType {
    pub schema: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    pub required: bool,
    pub content: BTreeMap<String, MediaType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderObject {
    pub schema: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseObject {
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, HeaderObject>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub content: BTreeMap<String, MediaType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub operation_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    pub responses: BTreeMap<String, ResponseObject>,
}

/// Aggregated API document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub openapi: String,
    pub info: Info,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Server>,
    /// Path template -> lower-case verb -> operation
    pub paths: BTreeMap<String, BTreeMap<String, Operation>>,
}

impl Document {
    /// Number of operations across every path
    pub fn operation_count(&self) -> usize {
        self.paths.values().map(BTreeMap::len).sum()
    }

    pub fn operation(&self, verb: &str, path: &str) -> Option<&Operation> {
        self.paths.get(path)?.get(&verb.to_ascii_lowercase())
    }
}

/// Aggregate services without a type index
///
/// Struct types are then described as plain objects.
pub fn aggregate(services: &[&ServiceSpec], info: &DocumentInfo) -> Result<Document, GenError> {
    aggregate_with_types(services, info, &TypeIndex::new())
}

/// Aggregate every given service into one document
///
/// Services that did not select `swagger` are skipped. Fails on the first
/// route claimed twice.
pub fn aggregate_with_types(
    services: &[&ServiceSpec],
    info: &DocumentInfo,
    types: &TypeIndex,
) -> Result<Document, GenError> {
    let mut meta = info.clone();
    let mut summary = None;
    let mut owners: BTreeMap<String, String> = BTreeMap::new();
    let mut paths: BTreeMap<String, BTreeMap<String, Operation>> = BTreeMap::new();

    for service in services
        .iter()
        .filter(|s| s.has(ProcessorKind::Swagger))
    {
        meta.overlay(&service.document);
        if service.document.summary.is_some() {
            summary.clone_from(&service.document.summary);
        }
        for m in &service.methods {
            let contract = m.wire_contract();
            let owner = format!("{}.{}", service.interface_name, m.name);
            if let Some(first) = owners.get(&contract.route_key()) {
                return Err(GenError::AggregationConflict {
                    route: contract.route(),
                    first: first.clone(),
                    second: owner,
                });
            }
            owners.insert(contract.route_key(), owner);
            paths
                .entry(contract.path.clone())
                .or_default()
                .insert(contract.verb.as_str().to_ascii_lowercase(), operation(service, m, types));
        }
    }

    tracing::debug!(
        paths = paths.len(),
        operations = owners.len(),
        "aggregated API document"
    );
    Ok(Document {
        openapi: OPENAPI_VERSION.to_string(),
        info: Info {
            title: meta.title,
            version: meta.version,
            summary,
            description: meta.description,
        },
        servers: meta.servers,
        paths,
    })
}

/// Encode the document
pub fn serialize(doc: &Document, format: DocFormat) -> Result<Vec<u8>, GenError> {
    let render_error = |message: String| GenError::Render {
        path: format.file_name(),
        message,
    };
    match format {
        DocFormat::Json => serde_json::to_vec_pretty(doc)
            .map(|mut bytes| {
                bytes.push(b'\n');
                bytes
            })
            .map_err(|e| render_error(e.to_string())),
        DocFormat::Yaml => serde_yaml::to_string(doc)
            .map(String::into_bytes)
            .map_err(|e| render_error(e.to_string())),
    }
}

fn operation(service: &ServiceSpec, m: &MethodSpec, types: &TypeIndex) -> Operation {
    let parameters = m
        .params
        .iter()
        .filter_map(|p| {
            let location = match p.source {
                ParamSource::Path => "path",
                ParamSource::Query => "query",
                ParamSource::Header => "header",
                ParamSource::Body => return None,
            };
            Some(Parameter {
                name: p.key.clone(),
                location: location.to_string(),
                required: p.source == ParamSource::Path || p.optional_inner().is_none(),
                schema: rust_type_schema(&p.type_hint, types),
            })
        })
        .collect();

    let mut responses = BTreeMap::new();
    responses.insert(m.response_status.to_string(), success_response(m, types));
    for status in m.error_status.values() {
        responses
            .entry(status.to_string())
            .or_insert_with(|| error_response(*status));
    }

    Operation {
        operation_id: format!("{}_{}", service.interface_name, m.name),
        tags: vec![service.interface_name.clone()],
        summary: m.doc.summary.clone(),
        description: m.doc.description.clone(),
        parameters,
        request_body: request_body(m, types),
        responses,
    }
}

fn request_body(m: &MethodSpec, types: &TypeIndex) -> Option<RequestBody> {
    let body: Vec<_> = m.params_from(ParamSource::Body).collect();
    if body.is_empty() {
        return None;
    }
    let schema = if m.has_json_body() {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for p in &body {
            properties.insert(p.key.clone(), rust_type_schema(&p.type_hint, types));
            if p.optional_inner().is_none() {
                required.push(Value::String(p.key.clone()));
            }
        }
        let mut schema = json!({ "type": "object", "properties": properties });
        if !required.is_empty() {
            schema["required"] = Value::Array(required);
        }
        schema
    } else {
        raw_schema(&body[0].type_hint)
    };
    Some(RequestBody {
        required: true,
        content: BTreeMap::from([(m.request_content_type.clone(), MediaType { schema })]),
    })
}

fn success_response(m: &MethodSpec, types: &TypeIndex) -> ResponseObject {
    let ok_ty = m.ok_type.clone().unwrap_or_else(|| "()".to_string());
    let schema = match &m.response_body {
        ResponseBody::Empty => None,
        ResponseBody::Raw => Some(raw_schema(&ok_ty)),
        ResponseBody::Field(field) => Some(
            m.response_fields
                .iter()
                .flatten()
                .find(|f| &f.name == field)
                .map(|f| rust_type_schema(&f.ty, types))
                .unwrap_or_else(|| json!({})),
        ),
        ResponseBody::Json if !m.response_json_tags.is_empty() => {
            let mut schema = rust_type_schema(&ok_ty, types);
            rename_properties(&mut schema, &m.response_json_tags);
            Some(schema)
        }
        ResponseBody::Json => Some(rust_type_schema(&ok_ty, types)),
    };
    let content = match (schema, m.effective_response_content_type()) {
        (Some(schema), Some(content_type)) => {
            BTreeMap::from([(content_type, MediaType { schema })])
        }
        _ => BTreeMap::new(),
    };
    ResponseObject {
        description: reason(m.response_status).to_string(),
        headers: m
            .response_headers
            .iter()
            .map(|h| {
                (
                    h.name.clone(),
                    HeaderObject {
                        schema: json!({ "type": "string" }),
                    },
                )
            })
            .collect(),
        content,
    }
}

fn error_response(status: u16) -> ResponseObject {
    let schema = json!({
        "type": "object",
        "properties": { "error": { "type": "string" } },
        "required": ["error"],
    });
    ResponseObject {
        description: reason(status).to_string(),
        headers: BTreeMap::new(),
        content: BTreeMap::from([("application/json".to_string(), MediaType { schema })]),
    }
}

/// Schema of a raw (non-JSON) body
fn raw_schema(ty: &str) -> Value {
    let ty = option_inner(ty).unwrap_or(ty);
    if is_text_type(ty) {
        json!({ "type": "string" })
    } else if is_bytes_type(ty) {
        json!({ "type": "string", "format": "binary" })
    } else {
        json!({})
    }
}

/// Rename top-level object properties after `response-json-tag` directives
fn rename_properties(schema: &mut Value, tags: &BTreeMap<String, String>) {
    let Some(properties) = schema.get_mut("properties").and_then(Value::as_object_mut) else {
        return;
    };
    let renamed: serde_json::Map<String, Value> = std::mem::take(properties)
        .into_iter()
        .map(|(name, s)| (tags.get(&name).cloned().unwrap_or(name), s))
        .collect();
    *properties = renamed;
    if let Some(required) = schema.get_mut("required").and_then(Value::as_array_mut) {
        for name in required.iter_mut() {
            if let Some(tag) = name.as_str().and_then(|n| tags.get(n)) {
                *name = Value::String(tag.clone());
            }
        }
    }
}

fn reason(status: u16) -> &'static str {
    http::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Response")
}
