use super::*;
use http::{HeaderName, Method};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[allow(clippy::expect_used)]
static IDENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));
static PATH_VAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[^{}]*\}").expect("valid path variable regex"));

/// Verbs accepted by the `method` directive
const VERBS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS", "TRACE"];

/// A malformed argument for a recognized keyword
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveError {
    /// The doc line holding the directive
    pub line: String,
    /// What was wrong with the argument
    pub message: String,
}

impl DirectiveError {
    fn new(d: &Directive, message: impl Into<String>) -> Self {
        DirectiveError {
            line: d.line.clone(),
            message: message.into(),
        }
    }
}

/// One API server entry (`url = description`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Document-scoped directives (title, version, servers, ...)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentDirectives {
    pub title: Option<String>,
    pub version: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub servers: Vec<Server>,
}

impl DocumentDirectives {
    /// Overlay `other` on `self`: set fields win, servers accumulate by URL
    pub fn merge(&mut self, other: &DocumentDirectives) {
        if other.title.is_some() {
            self.title.clone_from(&other.title);
        }
        if other.version.is_some() {
            self.version.clone_from(&other.version);
        }
        if other.summary.is_some() {
            self.summary.clone_from(&other.summary);
        }
        if other.description.is_some() {
            self.description.clone_from(&other.description);
        }
        for server in &other.servers {
            push_server(&mut self.servers, server.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == DocumentDirectives::default()
    }
}

/// Append a server unless its URL is already listed (later description wins)
pub fn push_server(servers: &mut Vec<Server>, server: Server) {
    match servers.iter_mut().find(|s| s.url == server.url) {
        Some(existing) => existing.description = server.description,
        None => servers.push(server),
    }
}

/// `query name` or `query name=key`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDirective {
    pub param: String,
    pub key: String,
}

/// `header X-Name: param`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderDirective {
    pub name: String,
    pub param: String,
}

/// Value of a response header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    /// Fixed text
    Literal(String),
    /// Taken from a field of the response value (`{field}`)
    Field(String),
}

/// `response-header X-Name: value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHeaderDirective {
    pub name: String,
    pub value: HeaderValue,
}

/// How the success value travels in the response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    /// The whole value, JSON encoded
    Json,
    /// One field of the value, JSON encoded
    Field(String),
    /// The value itself (string or bytes), unencoded
    Raw,
    /// No body
    Empty,
}

/// Everything the method chain collected from one doc comment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodDirectives {
    pub verb: Option<Method>,
    pub uri_path: Option<String>,
    pub api_path: Option<String>,
    pub queries: Vec<QueryDirective>,
    pub headers: Vec<HeaderDirective>,
    pub content_type: Option<String>,
    pub json_tags: BTreeMap<String, String>,
    pub errors: BTreeMap<String, u16>,
    pub response_status: Option<u16>,
    pub response_headers: Vec<ResponseHeaderDirective>,
    pub response_content_type: Option<String>,
    pub response_content_encoding: Option<String>,
    pub response_json_tags: BTreeMap<String, String>,
    pub response_body: Option<ResponseBody>,
    pub summary: Option<String>,
    pub description: Option<String>,
    /// Title, version and servers declared on the method
    pub document: DocumentDirectives,
}

/// Accumulators that can take document-scoped directives
pub trait DocumentScoped {
    fn document_mut(&mut self) -> &mut DocumentDirectives;
    fn set_summary(&mut self, summary: String);
    fn set_description(&mut self, description: String);
}

impl DocumentScoped for MethodDirectives {
    fn document_mut(&mut self) -> &mut DocumentDirectives {
        &mut self.document
    }
    fn set_summary(&mut self, summary: String) {
        self.summary = Some(summary);
    }
    fn set_description(&mut self, description: String) {
        self.description = Some(description);
    }
}

impl DocumentScoped for DocumentDirectives {
    fn document_mut(&mut self) -> &mut DocumentDirectives {
        self
    }
    fn set_summary(&mut self, summary: String) {
        self.summary = Some(summary);
    }
    fn set_description(&mut self, description: String) {
        self.description = Some(description);
    }
}

/// A chain link: consumes the directive (`Ok(true)`) or passes it on
pub type Recognizer<A> = fn(&Directive, &mut A) -> Result<bool, DirectiveError>;

/// Ordered sequence of recognizers, walked link by link for every directive
///
/// The chain is built once and holds no state of its own; everything it
/// learns goes into the accumulator passed to [`DirectiveChain::parse`].
pub struct DirectiveChain<A> {
    links: Vec<Recognizer<A>>,
}

impl<A: Default> DirectiveChain<A> {
    pub fn new(links: Vec<Recognizer<A>>) -> Self {
        DirectiveChain { links }
    }

    /// Feed one directive through the chain
    ///
    /// Returns whether some link consumed it.
    pub fn feed(&self, directive: &Directive, acc: &mut A) -> Result<bool, DirectiveError> {
        for link in &self.links {
            if link(directive, acc)? {
                return Ok(true);
            }
        }
        tracing::debug!(keyword = %directive.keyword, "dropping unrecognized directive");
        Ok(false)
    }

    /// Parse every marked line of a doc comment into a fresh accumulator
    pub fn parse<S: AsRef<str>>(&self, lines: &[S], marker: &str) -> Result<A, DirectiveError> {
        let mut acc = A::default();
        for line in lines {
            if let Some(directive) = Directive::parse(line.as_ref(), marker) {
                self.feed(&directive, &mut acc)?;
            }
        }
        Ok(acc)
    }
}

impl DirectiveChain<MethodDirectives> {
    /// The method-level chain, response recognizers first
    pub fn method_chain() -> Self {
        let links: Vec<Recognizer<MethodDirectives>> = vec![
            response_status,
            response_header,
            response_content_type,
            response_content_encoding,
            response_json_tag,
            response_body,
            errors,
            uri_path,
            query,
            method,
            header,
            content_type,
            json_tag,
            api_path,
            version::<MethodDirectives>,
            title::<MethodDirectives>,
            summary::<MethodDirectives>,
            servers::<MethodDirectives>,
            description::<MethodDirectives>,
        ];
        DirectiveChain::new(links)
    }

    /// Run the method chain over one method's doc comment
    pub fn parse_method<S: AsRef<str>>(
        lines: &[S],
        marker: &str,
    ) -> Result<MethodDirectives, DirectiveError> {
        Self::method_chain().parse(lines, marker)
    }
}

impl DirectiveChain<DocumentDirectives> {
    /// Run the document chain over an interface doc comment
    pub fn parse_document<S: AsRef<str>>(
        lines: &[S],
        marker: &str,
    ) -> Result<DocumentDirectives, DirectiveError> {
        Self::document_chain().parse(lines, marker)
    }

    /// The interface-level chain, document recognizers only
    pub fn document_chain() -> Self {
        let links: Vec<Recognizer<DocumentDirectives>> = vec![
            version::<DocumentDirectives>,
            title::<DocumentDirectives>,
            summary::<DocumentDirectives>,
            servers::<DocumentDirectives>,
            description::<DocumentDirectives>,
        ];
        DirectiveChain::new(links)
    }
}

fn required<'a>(d: &'a Directive) -> Result<&'a str, DirectiveError> {
    if d.argument.is_empty() {
        Err(DirectiveError::new(
            d,
            format!("`{}` expects an argument", d.keyword),
        ))
    } else {
        Ok(&d.argument)
    }
}

fn ident<'a>(d: &Directive, name: &'a str, what: &str) -> Result<&'a str, DirectiveError> {
    if IDENT.is_match(name) {
        Ok(name)
    } else {
        Err(DirectiveError::new(
            d,
            format!("`{name}` is not a valid {what} name"),
        ))
    }
}

fn status_code(d: &Directive, raw: &str) -> Result<u16, DirectiveError> {
    raw.trim()
        .parse::<u16>()
        .ok()
        .filter(|c| (100..=599).contains(c))
        .ok_or_else(|| {
            DirectiveError::new(d, format!("`{}` is not an HTTP status code", raw.trim()))
        })
}

/// Items separated by commas and/or whitespace
fn list_items(arg: &str) -> impl Iterator<Item = &str> {
    arg.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
}

/// `a=b`, `a b` or `a: b` into a pair
fn pair<'a>(d: &Directive, arg: &'a str, sep: &[char]) -> Result<(&'a str, &'a str), DirectiveError> {
    arg.split_once(sep)
        .map(|(a, b)| (a.trim(), b.trim()))
        .filter(|(a, b)| !a.is_empty() && !b.is_empty())
        .ok_or_else(|| DirectiveError::new(d, format!("`{}` expects two values", d.keyword)))
}

/// Extract `{variable}` names from a URI template, in order of appearance
///
/// The template must start with `/`; braces must balance and enclose an
/// identifier.
pub fn path_variables(template: &str) -> Result<Vec<String>, String> {
    if !template.starts_with('/') {
        return Err(format!("path `{template}` must start with `/`"));
    }
    let mut vars = Vec::new();
    let mut open: Option<usize> = None;
    for (i, c) in template.char_indices() {
        match (c, open) {
            ('{', None) => open = Some(i + 1),
            ('{', Some(_)) => return Err(format!("nested `{{` in path `{template}`")),
            ('}', Some(start)) => {
                let name = &template[start..i];
                if !IDENT.is_match(name) {
                    return Err(format!("invalid path variable `{{{name}}}` in `{template}`"));
                }
                vars.push(name.to_string());
                open = None;
            }
            ('}', None) => return Err(format!("unbalanced `}}` in path `{template}`")),
            _ => {}
        }
    }
    if open.is_some() {
        return Err(format!("unterminated `{{` in path `{template}`"));
    }
    Ok(vars)
}

/// URI template with every variable name erased
///
/// `/items/{id}` and `/items/{key}` share the shape `/items/{}` and match the
/// same requests.
pub fn route_shape(template: &str) -> String {
    PATH_VAR.replace_all(template, "{}").into_owned()
}

fn method(d: &Directive, acc: &mut MethodDirectives) -> Result<bool, DirectiveError> {
    if d.keyword != METHOD {
        return Ok(false);
    }
    let verb = required(d)?.to_ascii_uppercase();
    if !VERBS.contains(&verb.as_str()) {
        return Err(DirectiveError::new(d, format!("unknown HTTP method `{verb}`")));
    }
    let verb = Method::from_bytes(verb.as_bytes())
        .map_err(|e| DirectiveError::new(d, e.to_string()))?;
    acc.verb = Some(verb);
    Ok(true)
}

fn uri_path(d: &Directive, acc: &mut MethodDirectives) -> Result<bool, DirectiveError> {
    if d.keyword != URI_PATH {
        return Ok(false);
    }
    let path = required(d)?;
    path_variables(path).map_err(|m| DirectiveError::new(d, m))?;
    acc.uri_path = Some(path.to_string());
    Ok(true)
}

fn api_path(d: &Directive, acc: &mut MethodDirectives) -> Result<bool, DirectiveError> {
    if d.keyword != API_PATH {
        return Ok(false);
    }
    let prefix = required(d)?;
    path_variables(prefix).map_err(|m| DirectiveError::new(d, m))?;
    acc.api_path = Some(prefix.trim_end_matches('/').to_string());
    Ok(true)
}

fn query(d: &Directive, acc: &mut MethodDirectives) -> Result<bool, DirectiveError> {
    if d.keyword != QUERY {
        return Ok(false);
    }
    for item in list_items(required(d)?) {
        let (param, key) = match item.split_once('=') {
            Some((p, k)) => (p.trim(), k.trim()),
            None => (item, item),
        };
        if key.is_empty() {
            return Err(DirectiveError::new(d, format!("empty query key for `{param}`")));
        }
        let param = ident(d, param, "parameter")?;
        acc.queries.push(QueryDirective {
            param: param.to_string(),
            key: key.to_string(),
        });
    }
    Ok(true)
}

fn header_name(d: &Directive, name: &str) -> Result<String, DirectiveError> {
    HeaderName::from_bytes(name.as_bytes())
        .map(|_| name.to_string())
        .map_err(|_| DirectiveError::new(d, format!("`{name}` is not a valid header name")))
}

fn header(d: &Directive, acc: &mut MethodDirectives) -> Result<bool, DirectiveError> {
    if d.keyword != HEADER {
        return Ok(false);
    }
    let (name, value) = pair(d, required(d)?, &[':'])?;
    let param = value
        .strip_prefix('{')
        .and_then(|v| v.strip_suffix('}'))
        .unwrap_or(value);
    let param = ident(d, param, "parameter")?;
    acc.headers.push(HeaderDirective {
        name: header_name(d, name)?,
        param: param.to_string(),
    });
    Ok(true)
}

fn mime(d: &Directive) -> Result<String, DirectiveError> {
    let value = required(d)?;
    if value.contains('/') && !value.contains(char::is_whitespace) {
        Ok(value.to_string())
    } else {
        Err(DirectiveError::new(d, format!("`{value}` is not a media type")))
    }
}

fn content_type(d: &Directive, acc: &mut MethodDirectives) -> Result<bool, DirectiveError> {
    if d.keyword != CONTENT_TYPE {
        return Ok(false);
    }
    acc.content_type = Some(mime(d)?);
    Ok(true)
}

fn json_tag_pair(d: &Directive) -> Result<(String, String), DirectiveError> {
    let arg = required(d)?;
    let (field, tag) = if arg.contains('=') {
        pair(d, arg, &['='])?
    } else {
        pair(d, arg, &[' ', '\t'])?
    };
    let field = ident(d, field, "field")?;
    Ok((field.to_string(), tag.to_string()))
}

fn json_tag(d: &Directive, acc: &mut MethodDirectives) -> Result<bool, DirectiveError> {
    if d.keyword != JSON_TAG {
        return Ok(false);
    }
    let (field, tag) = json_tag_pair(d)?;
    acc.json_tags.insert(field, tag);
    Ok(true)
}

fn errors(d: &Directive, acc: &mut MethodDirectives) -> Result<bool, DirectiveError> {
    if d.keyword != ERRORS {
        return Ok(false);
    }
    for item in list_items(required(d)?) {
        let (name, code) = item
            .split_once('=')
            .ok_or_else(|| DirectiveError::new(d, format!("`{item}` is not `Error=status`")))?;
        let variant = name.rsplit("::").next().unwrap_or(name);
        ident(d, variant, "error")?;
        acc.errors.insert(name.to_string(), status_code(d, code)?);
    }
    Ok(true)
}

fn response_status(d: &Directive, acc: &mut MethodDirectives) -> Result<bool, DirectiveError> {
    if d.keyword != RESPONSE_STATUS {
        return Ok(false);
    }
    acc.response_status = Some(status_code(d, required(d)?)?);
    Ok(true)
}

fn response_header(d: &Directive, acc: &mut MethodDirectives) -> Result<bool, DirectiveError> {
    if d.keyword != RESPONSE_HEADER {
        return Ok(false);
    }
    let (name, value) = pair(d, required(d)?, &[':'])?;
    let value = match value.strip_prefix('{').and_then(|v| v.strip_suffix('}')) {
        Some(field) => HeaderValue::Field(ident(d, field, "field")?.to_string()),
        None => HeaderValue::Literal(value.to_string()),
    };
    acc.response_headers.push(ResponseHeaderDirective {
        name: header_name(d, name)?,
        value,
    });
    Ok(true)
}

fn response_content_type(d: &Directive, acc: &mut MethodDirectives) -> Result<bool, DirectiveError> {
    if d.keyword != RESPONSE_CONTENT_TYPE {
        return Ok(false);
    }
    acc.response_content_type = Some(mime(d)?);
    Ok(true)
}

fn response_content_encoding(
    d: &Directive,
    acc: &mut MethodDirectives,
) -> Result<bool, DirectiveError> {
    if d.keyword != RESPONSE_CONTENT_ENCODING {
        return Ok(false);
    }
    let encoding = required(d)?;
    if encoding.contains(char::is_whitespace) {
        return Err(DirectiveError::new(d, format!("`{encoding}` is not a content coding")));
    }
    acc.response_content_encoding = Some(encoding.to_ascii_lowercase());
    Ok(true)
}

fn response_json_tag(d: &Directive, acc: &mut MethodDirectives) -> Result<bool, DirectiveError> {
    if d.keyword != RESPONSE_JSON_TAG {
        return Ok(false);
    }
    let (field, tag) = json_tag_pair(d)?;
    acc.response_json_tags.insert(field, tag);
    Ok(true)
}

fn response_body(d: &Directive, acc: &mut MethodDirectives) -> Result<bool, DirectiveError> {
    if d.keyword != RESPONSE_BODY {
        return Ok(false);
    }
    let body = match required(d)? {
        "json" => ResponseBody::Json,
        "raw" => ResponseBody::Raw,
        "empty" => ResponseBody::Empty,
        field => ResponseBody::Field(ident(d, field, "field")?.to_string()),
    };
    acc.response_body = Some(body);
    Ok(true)
}

fn title<A: DocumentScoped>(d: &Directive, acc: &mut A) -> Result<bool, DirectiveError> {
    if d.keyword != TITLE {
        return Ok(false);
    }
    acc.document_mut().title = Some(required(d)?.to_string());
    Ok(true)
}

fn version<A: DocumentScoped>(d: &Directive, acc: &mut A) -> Result<bool, DirectiveError> {
    if d.keyword != VERSION {
        return Ok(false);
    }
    acc.document_mut().version = Some(required(d)?.to_string());
    Ok(true)
}

fn summary<A: DocumentScoped>(d: &Directive, acc: &mut A) -> Result<bool, DirectiveError> {
    if d.keyword != SUMMARY {
        return Ok(false);
    }
    acc.set_summary(required(d)?.to_string());
    Ok(true)
}

fn description<A: DocumentScoped>(d: &Directive, acc: &mut A) -> Result<bool, DirectiveError> {
    if d.keyword != DESCRIPTION {
        return Ok(false);
    }
    acc.set_description(required(d)?.to_string());
    Ok(true)
}

fn servers<A: DocumentScoped>(d: &Directive, acc: &mut A) -> Result<bool, DirectiveError> {
    if d.keyword != SERVERS {
        return Ok(false);
    }
    let server = parse_server(required(d)?).map_err(|m| DirectiveError::new(d, m))?;
    push_server(&mut acc.document_mut().servers, server);
    Ok(true)
}

/// Parse one `url = description` entry
///
/// The separator is ` = ` with its spaces, so a bare `=` stays part of the
/// URL (`https://h/v1?tenant=a = production`).
pub fn parse_server(entry: &str) -> Result<Server, String> {
    let (url, description) = match entry.split_once(" = ") {
        Some((u, d)) => (u.trim(), d.trim()),
        None => (entry.trim(), ""),
    };
    if url.is_empty() || url.contains(char::is_whitespace) {
        return Err(format!("`{entry}` is not `url = description`"));
    }
    Ok(Server {
        url: url.to_string(),
        description: description.to_string(),
    })
}
