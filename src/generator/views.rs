//! Per-method values the templates interpolate
//!
//! Everything a template prints is computed here, from one [`MethodSpec`],
//! so the server, client, decorator and mock renderings share a single
//! source of truth for names, types and wire locations.

use crate::directive::{HeaderValue, ResponseBody};
use crate::model::{
    is_text_type, option_inner, reference_inner, to_pascal_case, MethodSpec, ParamSource,
    ParameterBinding, ServiceSpec,
};

/// A string as a Rust literal
pub(crate) fn lit(s: &str) -> String {
    format!("{s:?}")
}

/// One parameter as seen by the rendered code
#[derive(Debug, Clone)]
pub struct ParamView {
    pub name: String,
    /// Declared type
    pub ty: String,
    /// Type decoded from the wire: `&str` becomes `String`
    pub owned_ty: String,
    /// `T` of `Option<T>`, else `owned_ty`
    pub inner_ty: String,
    pub optional: bool,
    /// Query key, header name or JSON field, as a literal
    pub key_lit: String,
    /// `#[serde(rename = ..)]` when the JSON name differs, else empty
    pub serde_attr: String,
    /// Field type in a borrowing request body
    pub borrowed_ty: String,
    /// Expression borrowing the parameter for that body
    pub borrow_expr: String,
    /// Raw body decoded as UTF-8 text
    pub text: bool,
}

impl ParamView {
    fn new(p: &ParameterBinding) -> Self {
        let inner = reference_inner(&p.type_hint);
        let owned_ty = match inner {
            Some("str") => "String".to_string(),
            Some("[u8]") => "Vec<u8>".to_string(),
            Some(t) => t.to_string(),
            None => p.type_hint.clone(),
        };
        let (borrowed_ty, borrow_expr) = match inner {
            Some(t) => (format!("&'a {t}"), p.name.clone()),
            None => (format!("&'a {}", p.type_hint), format!("&{}", p.name)),
        };
        ParamView {
            name: p.name.clone(),
            ty: p.type_hint.clone(),
            text: is_text_type(&owned_ty),
            inner_ty: option_inner(&owned_ty).unwrap_or(&owned_ty).to_string(),
            owned_ty,
            optional: option_inner(&p.type_hint).is_some(),
            key_lit: lit(&p.key),
            serde_attr: if p.key != p.name {
                format!("#[serde(rename = {})]", lit(&p.key))
            } else {
                String::new()
            },
            borrowed_ty,
            borrow_expr,
        }
    }

    /// Argument passed to the service once decoded
    fn call_arg(&self) -> String {
        if self.ty.starts_with('&') {
            format!("&{}", self.name)
        } else {
            self.name.clone()
        }
    }

    /// Owned copy recorded by the mock
    fn recorded(&self) -> String {
        if self.ty.starts_with('&') {
            format!("ToOwned::to_owned({})", self.name)
        } else {
            self.name.clone()
        }
    }
}

/// A response header and how each side produces it
#[derive(Debug, Clone)]
pub struct HeaderView {
    pub name_lit: String,
    /// Server expression for the header value
    pub server_expr: String,
    /// Field the client writes the header back into, empty for literals
    pub field: String,
}

/// One field of a renamed response body
#[derive(Debug, Clone)]
pub struct WireField {
    pub name: String,
    pub ty: String,
    pub serde_attr: String,
}

/// Everything the templates need about one method
#[derive(Debug, Clone)]
pub struct MethodView {
    pub name: String,
    pub pascal: String,
    pub signature: String,
    pub verb: String,
    pub path_lit: String,
    pub route_lit: String,
    pub status: u16,
    pub asyncness: String,
    pub await_suffix: String,
    pub returns_result: bool,
    pub ok_ty: String,
    pub return_ty: String,

    pub path_params: Vec<ParamView>,
    pub query_params: Vec<ParamView>,
    pub header_params: Vec<ParamView>,
    /// JSON body fields
    pub body_params: Vec<ParamView>,
    /// Zero or one raw body parameter
    pub raw_params: Vec<ParamView>,
    pub request_content_type_lit: String,
    /// Client statements appending the encoded path to `url`
    pub url_lines: Vec<String>,

    /// Arguments for the service call after decoding (`id, &name`)
    pub call_args: String,
    /// Arguments passed through unchanged (`id, name`)
    pub forward_args: String,
    /// `forward_args` after a leading argument (`, id, name`)
    pub forward_call: String,
    /// `, id: String, name: &str`
    pub typed_params: String,
    /// `, id = ?id` for tracing
    pub log_fields: String,

    pub response_headers: Vec<HeaderView>,
    pub response_content_type_lit: String,
    pub response_content_encoding_lit: String,
    pub wire_fields: Vec<WireField>,
    /// Server expression producing `Result<Vec<u8>, String>` from `value`
    pub server_body_expr: String,
    /// Client statements binding `value` from `resp`
    pub client_value_lines: Vec<String>,

    /// Instrumenting success test on `result`
    pub success_expr: String,
    /// Mock argument tuple type and value
    pub args_ty: String,
    pub args_expr: String,
    /// Mock result when no responder is set
    pub default_expr: String,
}

impl MethodView {
    pub fn new(m: &MethodSpec, service: &ServiceSpec) -> Self {
        let contract = m.wire_contract();
        let pascal = to_pascal_case(&m.name);
        let params: Vec<ParamView> = m.params.iter().map(ParamView::new).collect();
        let from = |source: ParamSource| -> Vec<ParamView> {
            m.params
                .iter()
                .zip(&params)
                .filter(|(b, _)| b.source == source)
                .map(|(_, v)| v.clone())
                .collect()
        };
        let json_body = m.has_json_body();
        let body = from(ParamSource::Body);

        let ok_ty = m.ok_type.clone().unwrap_or_else(|| "()".to_string());
        let error_ty = service.error_type.clone().unwrap_or_default();

        let wire_fields: Vec<WireField> = if m.response_json_tags.is_empty() {
            Vec::new()
        } else {
            m.response_fields
                .iter()
                .flatten()
                .map(|f| WireField {
                    name: f.name.clone(),
                    ty: f.ty.clone(),
                    serde_attr: m
                        .response_json_tags
                        .get(&f.name)
                        .map(|tag| format!("#[serde(rename = {})]", lit(tag)))
                        .unwrap_or_default(),
                })
                .collect()
        };

        let response_headers: Vec<HeaderView> = m
            .response_headers
            .iter()
            .map(|h| match &h.value {
                HeaderValue::Literal(v) => HeaderView {
                    name_lit: lit(&h.name),
                    server_expr: lit(v),
                    field: String::new(),
                },
                HeaderValue::Field(f) => HeaderView {
                    name_lit: lit(&h.name),
                    server_expr: format!("value.{f}.to_string()"),
                    field: f.clone(),
                },
            })
            .collect();

        let server_body_expr = match &contract.response_body {
            ResponseBody::Json if !wire_fields.is_empty() => {
                let inits: Vec<String> = wire_fields
                    .iter()
                    .map(|f| format!("{0}: value.{0}", f.name))
                    .collect();
                format!(
                    "serde_json::to_vec(&{pascal}Response {{ {} }}).map_err(|e| e.to_string())",
                    inits.join(", ")
                )
            }
            ResponseBody::Json => "serde_json::to_vec(&value).map_err(|e| e.to_string())".to_string(),
            ResponseBody::Field(f) => {
                format!("serde_json::to_vec(&value.{f}).map_err(|e| e.to_string())")
            }
            ResponseBody::Raw => {
                "Ok::<Vec<u8>, String>(AsRef::<[u8]>::as_ref(&value).to_vec())".to_string()
            }
            ResponseBody::Empty => {
                "{ let _ = value; Ok::<Vec<u8>, String>(Vec::new()) }".to_string()
            }
        };

        let header_fields: Vec<&HeaderView> =
            response_headers.iter().filter(|h| !h.field.is_empty()).collect();
        let client_value_lines = client_value_lines(
            &contract.response_body,
            &ok_ty,
            &error_ty,
            &pascal,
            &wire_fields,
            &header_fields,
        );

        let names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
        MethodView {
            name: m.name.clone(),
            signature: m.signature(),
            verb: contract.verb.to_string(),
            path_lit: lit(&contract.path),
            route_lit: lit(&contract.route()),
            status: contract.response_status,
            asyncness: if m.is_async { "async " } else { "" }.to_string(),
            await_suffix: if m.is_async { ".await" } else { "" }.to_string(),
            returns_result: m.returns_result,
            return_ty: m.return_type(),
            path_params: from(ParamSource::Path),
            query_params: from(ParamSource::Query),
            header_params: from(ParamSource::Header),
            body_params: if json_body { body.clone() } else { Vec::new() },
            raw_params: if json_body { Vec::new() } else { body },
            request_content_type_lit: lit(&contract.request_content_type),
            call_args: params
                .iter()
                .map(ParamView::call_arg)
                .collect::<Vec<_>>()
                .join(", "),
            forward_args: names.join(", "),
            forward_call: names.iter().map(|n| format!(", {n}")).collect(),
            url_lines: url_lines(&contract.path),
            typed_params: params
                .iter()
                .map(|p| format!(", {}: {}", p.name, p.ty))
                .collect(),
            log_fields: names.iter().map(|n| format!(", {n} = ?{n}")).collect(),
            response_content_type_lit: contract
                .response_content_type
                .as_deref()
                .map(lit)
                .unwrap_or_default(),
            response_content_encoding_lit: m
                .response_content_encoding
                .as_deref()
                .map(lit)
                .unwrap_or_default(),
            server_body_expr,
            client_value_lines,
            wire_fields,
            response_headers,
            success_expr: if m.returns_result {
                "result.is_ok()"
            } else {
                "true"
            }
            .to_string(),
            args_ty: tuple(params.iter().map(|p| p.owned_ty.clone()).collect()),
            args_expr: tuple(params.iter().map(ParamView::recorded).collect()),
            default_expr: if m.returns_result {
                "Ok(Default::default())"
            } else {
                "Default::default()"
            }
            .to_string(),
            pascal,
            ok_ty,
        }
    }
}

/// Statements building a request path from its template
fn url_lines(template: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut literal = String::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        literal.push_str(&rest[..start]);
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        let var = &rest[start + 1..start + len];
        if !literal.is_empty() {
            lines.push(format!("url.push_str({});", lit(&literal)));
            literal.clear();
        }
        lines.push(format!("url.push_str(&percent_encode(&{var}.to_string()));"));
        rest = &rest[start + len + 1..];
    }
    literal.push_str(rest);
    if !literal.is_empty() {
        lines.push(format!("url.push_str({});", lit(&literal)));
    }
    lines
}

/// `()`, `(a,)` or `(a, b)`
fn tuple(items: Vec<String>) -> String {
    match items.len() {
        0 => "()".to_string(),
        1 => format!("({},)", items[0]),
        _ => format!("({})", items.join(", ")),
    }
}

fn client_value_lines(
    body: &ResponseBody,
    ok_ty: &str,
    error_ty: &str,
    pascal: &str,
    wire_fields: &[WireField],
    header_fields: &[&HeaderView],
) -> Vec<String> {
    let decode_err = format!("map_err(|e| {error_ty}::from(ClientError::Decode(e.to_string())))");
    let binding = if header_fields.is_empty() && !matches!(body, ResponseBody::Field(_)) {
        "let value"
    } else {
        "let mut value"
    };
    let mut lines = match body {
        ResponseBody::Json if !wire_fields.is_empty() => {
            let inits: Vec<String> = wire_fields
                .iter()
                .map(|f| format!("{0}: wire.{0}", f.name))
                .collect();
            vec![
                format!(
                    "let wire: {pascal}Response = serde_json::from_slice(resp.body()).{decode_err}?;"
                ),
                format!("{binding} = {ok_ty} {{ {} }};", inits.join(", ")),
            ]
        }
        ResponseBody::Json => vec![format!(
            "{binding}: {ok_ty} = serde_json::from_slice(resp.body()).{decode_err}?;"
        )],
        ResponseBody::Field(f) => vec![
            format!("{binding}: {ok_ty} = Default::default();"),
            format!("value.{f} = serde_json::from_slice(resp.body()).{decode_err}?;"),
        ],
        ResponseBody::Raw if is_text_type(ok_ty) => vec![format!(
            "{binding} = String::from_utf8(resp.body().clone()).{decode_err}?;"
        )],
        ResponseBody::Raw => vec![format!("{binding} = resp.body().clone();")],
        ResponseBody::Empty => vec![format!("{binding}: {ok_ty} = Default::default();")],
    };
    for h in header_fields {
        lines.push(format!(
            "if let Some(parsed) = resp.headers().get({}).and_then(|v| v.to_str().ok()).and_then(|v| v.parse().ok()) {{ value.{} = parsed; }}",
            h.name_lit, h.field
        ));
    }
    lines
}

/// Views for every method of a service, in declaration order
pub fn method_views(service: &ServiceSpec) -> Vec<MethodView> {
    service
        .methods
        .iter()
        .map(|m| MethodView::new(m, service))
        .collect()
}
