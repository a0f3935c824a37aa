use super::*;
use crate::directive::{
    is_marked, marked_words, path_variables, DirectiveChain, DirectiveError, HeaderValue,
    MethodDirectives, MARKER,
};
use crate::error::GenError;
use crate::source::{InterfaceDecl, MethodDecl, Receiver, TypeIndex};

/// Names that never need a `use`
const PRELUDE_TYPES: &[&str] = &[
    "Self", "String", "Vec", "Option", "Result", "Box", "bool", "char", "str", "u8", "u16", "u32",
    "u64", "u128", "usize", "i8", "i16", "i32", "i64", "i128", "isize", "f32", "f64",
];

/// Standard library types commonly named without a path
const STD_TYPES: &[(&str, &str)] = &[
    ("HashMap", "std::collections::HashMap"),
    ("HashSet", "std::collections::HashSet"),
    ("BTreeMap", "std::collections::BTreeMap"),
    ("BTreeSet", "std::collections::BTreeSet"),
    ("VecDeque", "std::collections::VecDeque"),
    ("Duration", "std::time::Duration"),
    ("SystemTime", "std::time::SystemTime"),
    ("Arc", "std::sync::Arc"),
    ("Rc", "std::rc::Rc"),
    ("Cow", "std::borrow::Cow"),
    ("PathBuf", "std::path::PathBuf"),
];

fn syntax(service: &str, method: Option<&str>, err: DirectiveError) -> GenError {
    GenError::DirectiveSyntax {
        service: service.to_string(),
        method: method.map(str::to_string),
        line: err.line,
        message: err.message,
    }
}

/// `a::b::Item` -> `Item`
fn last_segment(ty: &str) -> &str {
    ty.rsplit("::").next().unwrap_or(ty)
}

/// Assembles and validates a [`ServiceSpec`] from a trait declaration
pub struct ServiceBuilder<'a> {
    index: &'a TypeIndex,
    marker: String,
}

impl<'a> ServiceBuilder<'a> {
    pub fn new(index: &'a TypeIndex) -> Self {
        ServiceBuilder {
            index,
            marker: MARKER.to_string(),
        }
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    /// Build the service for `decl`
    ///
    /// Returns `Ok(None)` when no method carries the marker. Any directive or
    /// validation failure aborts the whole service.
    pub fn build(&self, decl: &InterfaceDecl) -> Result<Option<ServiceSpec>, GenError> {
        let service = decl.name.as_str();
        let marked: Vec<&MethodDecl> = decl
            .methods
            .iter()
            .filter(|m| is_marked(&m.docs, &self.marker))
            .collect();
        if marked.is_empty() {
            tracing::debug!(service, "no marked methods, skipping trait");
            return Ok(None);
        }
        if decl.is_generic {
            return Err(GenError::semantic(
                service,
                None,
                "generic service traits are not supported",
            ));
        }
        if let Some(m) = decl
            .methods
            .iter()
            .find(|m| !m.has_default && !is_marked(&m.docs, &self.marker))
        {
            return Err(GenError::semantic(
                service,
                Some(&m.name),
                "method carries no directives; mark it or give it a default body so generated types can implement the trait",
            ));
        }

        let processors = self.select_processors(decl)?;
        let mut document = DirectiveChain::parse_document(&decl.docs, &self.marker)
            .map_err(|e| syntax(service, None, e))?;

        let mut methods = Vec::with_capacity(marked.len());
        for m in marked {
            let directives = DirectiveChain::parse_method(&m.docs, &self.marker)
                .map_err(|e| syntax(service, Some(&m.name), e))?;
            document.merge(&directives.document);
            methods.push(self.build_method(decl, m, directives)?);
        }

        let error_type = check_service(service, &methods, &processors)?;
        let error_variants = error_type
            .as_deref()
            .and_then(|t| self.index.enum_variants(last_segment(t)))
            .map(<[_]>::to_vec);
        let imports = self.imports(decl, &methods);

        tracing::debug!(
            service,
            methods = methods.len(),
            processors = ?processors,
            "built service"
        );
        Ok(Some(ServiceSpec {
            interface_name: decl.name.clone(),
            methods,
            import_path: decl.import_path(),
            module_path: decl.module_path.clone(),
            source_path: decl.source_path.clone(),
            processors,
            error_type,
            error_variants,
            imports,
            document,
        }))
    }

    /// Processor kinds named on the trait's marked lines
    ///
    /// A marked line whose first word is a processor kind is a selection line;
    /// other marked lines are document directives.
    fn select_processors(&self, decl: &InterfaceDecl) -> Result<ProcessorSet, GenError> {
        let service = decl.name.as_str();
        let mut selected = ProcessorSet::new();
        for line in &decl.docs {
            let Some(words) = marked_words(line, &self.marker) else {
                continue;
            };
            match words.first() {
                Some(first) if first.parse::<ProcessorKind>().is_ok() => {}
                _ => continue,
            }
            for word in words {
                let kind = word
                    .parse::<ProcessorKind>()
                    .map_err(|msg| GenError::semantic(service, None, msg))?;
                selected.insert(kind);
            }
        }
        if selected.is_empty() {
            selected = default_processors();
        }
        if selected.contains(&ProcessorKind::HttpClient)
            && selected.contains(&ProcessorKind::HttpsClient)
        {
            return Err(GenError::semantic(
                service,
                None,
                "`http-client` and `https-client` write the same files; select one",
            ));
        }
        if selected
            .iter()
            .any(|k| *k == ProcessorKind::HttpServer || k.is_client())
        {
            selected.insert(ProcessorKind::HttpErrors);
        }
        Ok(selected)
    }

    fn build_method(
        &self,
        decl: &InterfaceDecl,
        m: &MethodDecl,
        d: MethodDirectives,
    ) -> Result<MethodSpec, GenError> {
        let fail = |msg: String| GenError::semantic(&decl.name, Some(&m.name), msg);

        if m.receiver != Receiver::Ref {
            return Err(fail("service methods must take `&self`".to_string()));
        }
        if m.is_generic {
            return Err(fail("generic methods are not supported".to_string()));
        }
        if let Some(pattern) = &m.unsupported_param {
            return Err(fail(format!(
                "parameter pattern `{pattern}` must be a plain identifier"
            )));
        }
        if let Some(p) = m.params.iter().find(|p| p.ty.starts_with("&mut")) {
            return Err(fail(format!(
                "parameter `{}` is a mutable reference, which cannot cross the wire",
                p.name
            )));
        }
        if let Some(ok) = m.ok_type.as_deref().filter(|t| t.starts_with('&')) {
            return Err(fail(format!(
                "return type `{ok}` borrows from the service; return an owned value"
            )));
        }
        if m.returns_result && m.err_type.is_none() {
            return Err(fail(
                "`Result` aliases are not supported; spell out `Result<T, E>`".to_string(),
            ));
        }

        let verb = d.verb.clone().unwrap_or(Method::POST);
        let base = d
            .uri_path
            .clone()
            .unwrap_or_else(|| format!("/{}/{}", decl.name, m.name));
        let uri_template = match &d.api_path {
            Some(prefix) => format!("{prefix}{base}"),
            None => base,
        };
        let path_vars = path_variables(&uri_template).map_err(fail)?;
        let mut seen = BTreeSet::new();
        if let Some(dup) = path_vars.iter().find(|v| !seen.insert(v.as_str())) {
            return Err(fail(format!("path variable `{{{dup}}}` appears more than once")));
        }

        let params = bind_params(m, &d, &path_vars).map_err(fail)?;

        let request_content_type = d
            .content_type
            .clone()
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        if !is_json(&request_content_type) {
            let body: Vec<&ParameterBinding> = params
                .iter()
                .filter(|p| p.source == ParamSource::Body)
                .collect();
            if body.len() > 1 {
                return Err(fail(format!(
                    "content type `{request_content_type}` carries a raw body, but {} parameters are body-bound",
                    body.len()
                )));
            }
            if let Some(b) = body.first() {
                if !is_text_type(&b.type_hint) && !is_bytes_type(&b.type_hint) {
                    return Err(fail(format!(
                        "raw body parameter `{}` must be a string or byte type, found `{}`",
                        b.name, b.type_hint
                    )));
                }
            }
            if !d.json_tags.is_empty() {
                return Err(fail(format!(
                    "json-tag has no effect with content type `{request_content_type}`"
                )));
            }
        }

        let response_fields = m
            .ok_type
            .as_deref()
            .and_then(|t| self.struct_fields(t))
            .map(<[_]>::to_vec);
        let response_body = match d.response_body.clone() {
            Some(body) => body,
            None if m.ok_type.is_none() => ResponseBody::Empty,
            None => ResponseBody::Json,
        };
        check_response(m, &d, &response_body, response_fields.as_deref()).map_err(fail)?;

        let error_status = self.error_status(decl, m, &d).map_err(fail)?;

        Ok(MethodSpec {
            name: m.name.clone(),
            verb,
            uri_template,
            path_variables: path_vars,
            params,
            request_content_type,
            response_content_type: d.response_content_type,
            response_content_encoding: d.response_content_encoding,
            response_status: d.response_status.unwrap_or(DEFAULT_STATUS),
            response_body,
            response_headers: d.response_headers,
            response_json_tags: d.response_json_tags,
            error_status,
            doc: OperationDoc {
                summary: d.summary,
                description: d.description,
            },
            is_async: m.is_async,
            ok_type: m.ok_type.clone(),
            err_type: m.err_type.clone(),
            returns_result: m.returns_result,
            response_fields,
        })
    }

    fn struct_fields(&self, ty: &str) -> Option<&[crate::source::FieldDecl]> {
        if ty.contains('<') || ty.starts_with('&') {
            return None;
        }
        self.index.struct_fields(last_segment(ty))
    }

    /// Normalized `errors` mapping: variant name to status
    fn error_status(
        &self,
        decl: &InterfaceDecl,
        m: &MethodDecl,
        d: &MethodDirectives,
    ) -> Result<BTreeMap<String, u16>, String> {
        let mut mapped = BTreeMap::new();
        if d.errors.is_empty() {
            return Ok(mapped);
        }
        let err_type = match (&m.err_type, m.returns_result) {
            (Some(e), true) => e.as_str(),
            _ => {
                return Err(
                    "errors directive requires a `Result<T, E>` return with an explicit error type"
                        .to_string(),
                )
            }
        };
        let err_name = last_segment(err_type);
        let variants = self.index.enum_variants(err_name);
        if variants.is_none() {
            tracing::warn!(
                service = %decl.name,
                method = %m.name,
                error_type = err_type,
                "error type not found in scanned sources; errors mapping is not checked"
            );
        }
        for (ident, status) in &d.errors {
            let variant = match ident.rsplit_once("::") {
                Some((owner, variant)) => {
                    if last_segment(owner) != err_name {
                        return Err(format!("`{ident}` does not belong to `{err_type}`"));
                    }
                    variant
                }
                None => ident.as_str(),
            };
            if *status < 400 {
                return Err(format!(
                    "error `{ident}` maps to {status}; error statuses must be 4xx or 5xx"
                ));
            }
            if let Some(vs) = variants {
                if !vs.iter().any(|v| v.name == variant) {
                    return Err(format!("`{err_type}` has no variant `{variant}`"));
                }
            }
            if let Some(prev) = mapped.insert(variant.to_string(), *status) {
                if prev != *status {
                    return Err(format!("`{variant}` is mapped to both {prev} and {status}"));
                }
            }
        }
        Ok(mapped)
    }

    /// `use` paths for the trait and every type its marked methods name
    fn imports(&self, decl: &InterfaceDecl, methods: &[MethodSpec]) -> Vec<String> {
        let mut names = BTreeSet::new();
        for m in decl
            .methods
            .iter()
            .filter(|m| methods.iter().any(|s| s.name == m.name))
        {
            names.extend(m.referenced_types.iter().cloned());
        }
        for m in methods.iter().filter(|m| !m.response_json_tags.is_empty()) {
            for field in m.response_fields.iter().flatten() {
                names.extend(field.referenced_types.iter().cloned());
            }
        }
        let mut imports = vec![decl.import_path()];
        for name in names {
            if PRELUDE_TYPES.contains(&name.as_str()) {
                continue;
            }
            let path = if let Some(t) = self.index.get(&name) {
                t.import_path()
            } else if let Some((_, std_path)) = STD_TYPES.iter().find(|(n, _)| *n == name) {
                std_path.to_string()
            } else {
                tracing::debug!(
                    service = %decl.name,
                    name = %name,
                    "type not indexed, importing from the trait's module"
                );
                format!("{}::{}", decl.module_path, name)
            };
            if !imports.contains(&path) {
                imports.push(path);
            }
        }
        imports
    }
}

fn bind_params(
    m: &MethodDecl,
    d: &MethodDirectives,
    path_vars: &[String],
) -> Result<Vec<ParameterBinding>, String> {
    let declared = |name: &str| m.params.iter().any(|p| p.name == name);
    if let Some(v) = path_vars.iter().find(|v| !declared(v)) {
        return Err(format!("path variable `{{{v}}}` has no matching parameter"));
    }
    if let Some(q) = d.queries.iter().find(|q| !declared(&q.param)) {
        return Err(format!("query directive names unknown parameter `{}`", q.param));
    }
    if let Some(h) = d.headers.iter().find(|h| !declared(&h.param)) {
        return Err(format!("header directive names unknown parameter `{}`", h.param));
    }

    let mut bindings = Vec::with_capacity(m.params.len());
    for p in &m.params {
        let in_path = path_vars.contains(&p.name);
        let query = d.queries.iter().rev().find(|q| q.param == p.name);
        let header = d.headers.iter().rev().find(|h| h.param == p.name);
        let sources = [in_path, query.is_some(), header.is_some()]
            .iter()
            .filter(|b| **b)
            .count();
        if sources > 1 {
            return Err(format!(
                "parameter `{}` is bound to more than one of path, query and header",
                p.name
            ));
        }
        let (source, key) = if in_path {
            (ParamSource::Path, p.name.clone())
        } else if let Some(q) = query {
            (ParamSource::Query, q.key.clone())
        } else if let Some(h) = header {
            (ParamSource::Header, h.name.clone())
        } else {
            let key = d.json_tags.get(&p.name).cloned().unwrap_or_else(|| p.name.clone());
            (ParamSource::Body, key)
        };
        if option_inner(&p.ty).map(|t| t.starts_with('&')).unwrap_or(false) {
            return Err(format!(
                "parameter `{}` is an optional reference; use an owned type",
                p.name
            ));
        }
        if source == ParamSource::Path && option_inner(&p.ty).is_some() {
            return Err(format!("path parameter `{}` cannot be optional", p.name));
        }
        bindings.push(ParameterBinding {
            name: p.name.clone(),
            source,
            type_hint: p.ty.clone(),
            key,
        });
    }

    if let Some(field) = d
        .json_tags
        .keys()
        .find(|f| !bindings.iter().any(|b| &b.name == *f && b.source == ParamSource::Body))
    {
        return Err(format!("json-tag names `{field}`, which is not a body parameter"));
    }
    Ok(bindings)
}

fn check_response(
    m: &MethodDecl,
    d: &MethodDirectives,
    body: &ResponseBody,
    fields: Option<&[crate::source::FieldDecl]>,
) -> Result<(), String> {
    let has_field = |name: &str| fields.map(|fs| fs.iter().any(|f| f.name == name));
    let ok = m.ok_type.as_deref();

    match body {
        ResponseBody::Raw => match ok {
            Some(t) if is_text_type(t) || is_bytes_type(t) => {}
            Some(t) => {
                return Err(format!(
                    "response-body raw requires a string or byte success type, found `{t}`"
                ))
            }
            None => return Err("response-body raw requires a success value".to_string()),
        },
        ResponseBody::Field(field) => {
            let Some(t) = ok else {
                return Err(format!("response-body `{field}` requires a success value"));
            };
            if has_field(field) == Some(false) {
                return Err(format!("`{t}` has no field `{field}`"));
            }
        }
        ResponseBody::Json | ResponseBody::Empty => {}
    }

    for h in &d.response_headers {
        if let HeaderValue::Field(field) = &h.value {
            let Some(t) = ok else {
                return Err(format!(
                    "response header `{}` reads `{{{field}}}` but the method returns no value",
                    h.name
                ));
            };
            if has_field(field) == Some(false) {
                return Err(format!("`{t}` has no field `{field}`"));
            }
        }
    }

    if !d.response_json_tags.is_empty() {
        let t = ok.unwrap_or("()");
        let Some(fields) = fields else {
            return Err(format!(
                "response-json-tag requires `{t}` to be a struct declared in the scanned sources"
            ));
        };
        if let Some(missing) = d
            .response_json_tags
            .keys()
            .find(|k| !fields.iter().any(|f| &f.name == *k))
        {
            return Err(format!("`{t}` has no field `{missing}`"));
        }
        if *body != ResponseBody::Json {
            return Err("response-json-tag only applies to a JSON response body".to_string());
        }
    }
    Ok(())
}

/// Cross-method checks; returns the shared error type
fn check_service(
    service: &str,
    methods: &[MethodSpec],
    processors: &ProcessorSet,
) -> Result<Option<String>, GenError> {
    let mut error_type: Option<&str> = None;
    for m in methods {
        let Some(e) = m.err_type.as_deref() else {
            continue;
        };
        match error_type {
            None => error_type = Some(e),
            Some(prev) if prev != e => {
                return Err(GenError::semantic(
                    service,
                    Some(&m.name),
                    format!("returns `{e}` but other methods return `{prev}`; a service has one error type"),
                ))
            }
            Some(_) => {}
        }
    }

    let mut statuses: BTreeMap<&str, (u16, &str)> = BTreeMap::new();
    for m in methods {
        for (ident, status) in &m.error_status {
            match statuses.get(ident.as_str()) {
                Some((prev, owner)) if prev != status => {
                    return Err(GenError::semantic(
                        service,
                        Some(&m.name),
                        format!("`{ident}` maps to {status} here but to {prev} in `{owner}`"),
                    ))
                }
                Some(_) => {}
                None => {
                    statuses.insert(ident.as_str(), (*status, m.name.as_str()));
                }
            }
        }
    }

    let mut routes: BTreeMap<String, &MethodSpec> = BTreeMap::new();
    for m in methods {
        if let Some(prev) = routes.get(&m.route_key()) {
            return Err(GenError::semantic(
                service,
                Some(&m.name),
                format!(
                    "route `{}` matches the same requests as `{}` declared by `{}`",
                    m.route(),
                    prev.route(),
                    prev.name
                ),
            ));
        }
        routes.insert(m.route_key(), m);
    }

    if processors.iter().any(ProcessorKind::is_client) {
        if let Some(m) = methods.iter().find(|m| !m.returns_result) {
            return Err(GenError::semantic(
                service,
                Some(&m.name),
                "client bindings need every method to return `Result<T, E>`",
            ));
        }
    }

    Ok(error_type.map(str::to_string))
}
