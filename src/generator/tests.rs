#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use super::*;
use crate::model::ServiceBuilder;
use crate::source::{parse_source, TypeIndex};
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir() -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("gtg_test_{}_{}", std::process::id(), nanos));
    fs::create_dir_all(&dir).unwrap();
    dir
}

const ITEMS: &str = r#"
/// Items service.
pub trait ItemService {
    /// @gtg method GET
    /// @gtg uri-path /items/{id}
    /// @gtg errors NotFound=404
    fn get_item(&self, id: String) -> Result<Item, ItemError>;

    /// @gtg method POST
    /// @gtg uri-path /items
    /// @gtg response-status 201
    /// @gtg errors Conflict=409
    fn create_item(&self, name: String, total: u64) -> Result<Item, ItemError>;
}

#[derive(Debug, Default)]
pub struct Item { pub id: String, pub total: u64 }

#[derive(Debug)]
pub enum ItemError { NotFound, Conflict, Internal(String) }
"#;

fn spec_from(src: &str) -> ServiceSpec {
    let parsed = parse_source(Path::new("/work/demo/src/items.rs"), src, "crate::items").unwrap();
    let mut index = TypeIndex::new();
    index.extend(parsed.types);
    ServiceBuilder::new(&index)
        .build(&parsed.interfaces[0])
        .unwrap()
        .unwrap()
}

fn file<'a>(files: &'a [GeneratedFile], path: &str) -> &'a str {
    files
        .iter()
        .find(|f| f.display_path() == path)
        .unwrap_or_else(|| panic!("{path} not generated"))
        .text()
}

fn routes(text: &str) -> BTreeSet<String> {
    let start = text.find("pub const ROUTES").unwrap();
    let end = start + text[start..].find("];").unwrap();
    text[start..end]
        .lines()
        .skip(1)
        .map(|l| l.trim().trim_end_matches(',').to_string())
        .collect()
}

#[test]
fn test_import_set_dedups_in_order() {
    let mut imports = ImportSet::new();
    imports.add("crate::a::B");
    imports.extend(["http::Method", "crate::a::B", "std::time::Instant"]);
    assert_eq!(
        imports.iter().collect::<Vec<_>>(),
        vec!["crate::a::B", "http::Method", "std::time::Instant"]
    );
    assert_eq!(imports.len(), 3);
}

#[test]
fn test_assemble_header_layout() {
    let spec = spec_from(ITEMS);
    let mut imports = ImportSet::new();
    imports.add("http::Method");
    let out = assemble(&spec, "Routing", &imports, "\n\nfn f() {}\n\n");
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], GENERATED_MARKER);
    assert_eq!(lines[1], "// source: crate::items::ItemService");
    assert_eq!(lines[2], "// DO NOT EDIT.");
    assert_eq!(lines[3], "");
    assert!(lines[4].starts_with("#![allow("));
    assert_eq!(lines[5], "//! Routing");
    assert!(out.contains("\nuse http::Method;\n\nfn f() {}\n"));
    assert!(out.ends_with("}\n"));
}

#[test]
fn test_render_service_emits_selected_files() {
    let spec = spec_from(ITEMS);
    let files = render_service(&spec).unwrap();
    let paths: BTreeSet<String> = files.iter().map(GeneratedFile::display_path).collect();
    let expected: BTreeSet<String> = [
        "mod.rs",
        "httpserver/mod.rs",
        "httpserver/server.rs",
        "httpserver/transport.rs",
        "httpclient/mod.rs",
        "httpclient/client.rs",
        "httpclient/transport.rs",
        "httperrors/mod.rs",
        "httperrors/ui.rs",
        "httperrors/client.rs",
        "logging.rs",
        "instrumenting.rs",
        "mock.rs",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    assert_eq!(paths, expected);
    for f in &files {
        assert!(f.generated_marker, "{} lacks the marker", f.display_path());
        assert!(f.text().starts_with(GENERATED_MARKER));
    }

    let root = file(&files, "mod.rs");
    for module in ["httpclient", "httperrors", "httpserver", "instrumenting", "logging", "mock"] {
        assert!(root.contains(&format!("pub mod {module};")), "{root}");
    }
}

#[test]
fn test_selection_limits_output() {
    let spec = spec_from(&ITEMS.replace(
        "/// Items service.",
        "/// Items service.\n/// @gtg http-server log",
    ));
    let files = render_service(&spec).unwrap();
    let paths: BTreeSet<String> = files.iter().map(GeneratedFile::display_path).collect();
    assert!(paths.contains("httpserver/server.rs"));
    assert!(paths.contains("httperrors/ui.rs"));
    assert!(paths.contains("logging.rs"));
    assert!(!paths.contains("httpclient/client.rs"));
    assert!(!paths.contains("mock.rs"));
    let root = file(&files, "mod.rs");
    assert!(!root.contains("httpclient"));
}

#[test]
fn test_server_and_client_share_routes() {
    let spec = spec_from(ITEMS);
    let files = render_service(&spec).unwrap();
    let server = routes(file(&files, "httpserver/server.rs"));
    let client = routes(file(&files, "httpclient/client.rs"));
    assert_eq!(server, client);
    assert!(server.contains("\"GET /items/{id}\""));
    assert!(server.contains("\"POST /items\""));
}

#[test]
fn test_server_transport_decodes_each_location() {
    let spec = spec_from(ITEMS);
    let files = render_service(&spec).unwrap();
    let server = file(&files, "httpserver/server.rs");
    assert!(server.contains("use crate::items::ItemService;"));
    assert!(server.contains("pub struct ItemServiceServer<S>"));
    assert!(server.contains("match_route(\"/items/{id}\", &path)"));

    let transport = file(&files, "httpserver/transport.rs");
    assert!(transport.contains("pub(super) fn get_item<S: ItemService>("));
    assert!(transport.contains("match path_var(vars, \"id\").parse::<String>()"));
    assert!(transport.contains("struct CreateItemBody {"));
    assert!(transport.contains("Response::builder().status(201u16)"));
    assert!(transport.contains("Err(err) => error_response(&err),"));
    assert!(transport.contains("fn error_response(err: &ItemError)"));
}

#[test]
fn test_client_transport_encodes_path_and_body() {
    let spec = spec_from(ITEMS);
    let files = render_service(&spec).unwrap();
    let transport = file(&files, "httpclient/transport.rs");
    assert!(transport.contains("url.push_str(\"/items/\");"));
    assert!(transport.contains("url.push_str(&percent_encode(&id.to_string()));"));
    assert!(transport.contains("struct CreateItemBody<'a> {"));
    assert!(transport.contains("name: &'a String,"));
    assert!(transport.contains("fn decode_get_item_response(resp: Response<Vec<u8>>) -> Result<Item, ItemError>"));

    let mod_rs = file(&files, "httpclient/mod.rs");
    assert!(mod_rs.contains("pub use client::{ItemServiceClient, ROUTES};"));
    assert!(mod_rs.contains("pub use transport::HttpTransport;"));
}

#[test]
fn test_secure_client_differs_only_in_scheme() {
    let spec = spec_from(ITEMS);
    let plain = ClientProcessor { secure: false }.process(&spec).unwrap();
    let secure = ClientProcessor { secure: true }.process(&spec).unwrap();
    assert_eq!(plain.len(), secure.len());
    for (p, s) in plain.iter().zip(&secure) {
        assert_eq!(p.relative_path, s.relative_path);
        let swapped = s.text().replace(
            "const SCHEME: &str = \"https\";",
            "const SCHEME: &str = \"http\";",
        );
        assert_eq!(p.text(), swapped);
    }
    assert!(file(&secure, "httpclient/client.rs").contains("const SCHEME: &str = \"https\";"));
}

#[test]
fn test_error_mappings() {
    let spec = spec_from(ITEMS);
    let files = ErrorsProcessor.process(&spec).unwrap();
    let ui = file(&files, "httperrors/ui.rs");
    assert!(ui.contains("ItemError::NotFound { .. } => (404, \"Not Found\"),"));
    assert!(ui.contains("ItemError::Conflict { .. } => (409, \"Conflict\"),"));
    assert!(ui.contains("_ => UNMAPPED,"));
    assert!(!ui.contains("ItemError::Internal"));

    let client = file(&files, "httperrors/client.rs");
    assert!(client.contains("pub enum ClientError"));
    assert!(client.contains("404 => Ok(ItemError::NotFound),"));
    assert!(client.contains("409 => Ok(ItemError::Conflict),"));
}

#[test]
fn test_client_mapping_skips_variants_with_fields() {
    let spec = spec_from(&ITEMS.replace("NotFound=404", "Internal=500"));
    let files = ErrorsProcessor.process(&spec).unwrap();
    let ui = file(&files, "httperrors/ui.rs");
    assert!(ui.contains("ItemError::Internal { .. } => (500, \"Internal Server Error\"),"));
    let client = file(&files, "httperrors/client.rs");
    assert!(!client.contains("ItemError::Internal"));
    assert!(client.contains("409 => Ok(ItemError::Conflict),"));
}

#[test]
fn test_decorators_and_mock() {
    let spec = spec_from(ITEMS);
    let files = render_service(&spec).unwrap();

    let logging = file(&files, "logging.rs");
    assert!(logging.contains("impl<S: ItemService> ItemService for ItemServiceLogging<S>"));
    assert!(logging.contains("tracing::debug!(method = \"get_item\", id = ?id, \"calling\");"));
    assert!(logging.contains("let result = self.next.create_item(name, total);"));
    assert!(logging.contains("use std::time::Instant;"));

    let metrics = file(&files, "instrumenting.rs");
    assert!(metrics.contains("pub trait ItemServiceMetrics"));
    assert!(metrics.contains("pub get_item: MethodCounters,"));
    assert!(metrics.contains("self.metrics.observe(\"get_item\", started.elapsed(), result.is_ok());"));

    let mock = file(&files, "mock.rs");
    assert!(mock.contains("pub type GetItemArgs = (String,);"));
    assert!(mock.contains("pub type CreateItemArgs = (String, u64);"));
    assert!(mock.contains("pub fn on_get_item("));
    assert!(mock.contains("None => Ok(Default::default()),"));
}

#[test]
fn test_document_processor_renders_nothing() {
    let spec = spec_from(ITEMS);
    assert!(DocumentProcessor.process(&spec).unwrap().is_empty());
    assert_eq!(DocumentProcessor.kind(), ProcessorKind::Swagger);
    for kind in ProcessorKind::ALL {
        assert_eq!(processor_for(kind).kind(), kind);
    }
}

#[test]
fn test_classify_and_decide() {
    assert_eq!(classify(None), FileState::Absent);
    assert_eq!(
        classify(Some(b"// CODE GENERATED AUTOMATICALLY\nfn a() {}")),
        FileState::PresentGenerated
    );
    assert_eq!(
        classify(Some(b"\xEF\xBB\xBF// CODE GENERATED AUTOMATICALLY\r\n")),
        FileState::PresentGenerated
    );
    assert_eq!(
        classify(Some(b"fn a() {}\n// CODE GENERATED AUTOMATICALLY\n")),
        FileState::PresentHandwritten
    );
    assert_eq!(classify(Some(b"")), FileState::PresentHandwritten);

    let new = b"new".as_slice();
    assert_eq!(decide(FileState::Absent, None, new), WriteAction::Create);
    assert_eq!(
        decide(FileState::PresentGenerated, Some(b"new"), new),
        WriteAction::Unchanged
    );
    assert_eq!(
        decide(FileState::PresentGenerated, Some(b"old"), new),
        WriteAction::Overwrite
    );
    assert_eq!(
        decide(FileState::PresentHandwritten, Some(b"mine"), new),
        WriteAction::Skip
    );
}

#[test]
fn test_apply_through_memory_sink() {
    let mut sink = MemorySink::new();
    let path = Path::new("/out/a.rs");
    let v1 = format!("{GENERATED_MARKER}\nfn v1() {{}}\n");
    let v2 = format!("{GENERATED_MARKER}\nfn v2() {{}}\n");

    assert_eq!(apply(&mut sink, path, v1.as_bytes()).unwrap(), WriteAction::Create);
    assert_eq!(apply(&mut sink, path, v1.as_bytes()).unwrap(), WriteAction::Unchanged);
    assert_eq!(sink.writes(), 1);
    assert_eq!(apply(&mut sink, path, v2.as_bytes()).unwrap(), WriteAction::Overwrite);
    assert_eq!(sink.get(path), Some(v2.as_bytes()));

    let mine = Path::new("/out/mine.rs");
    sink.insert(mine, "fn handwritten() {}\n");
    assert_eq!(apply(&mut sink, mine, v1.as_bytes()).unwrap(), WriteAction::Skip);
    assert_eq!(sink.get(mine), Some(b"fn handwritten() {}\n".as_slice()));
}

#[test]
fn test_disk_sink_replaces_whole_file() {
    let dir = temp_dir();
    let path = dir.join("nested").join("out.rs");
    let mut sink = DiskSink::new();
    assert_eq!(sink.read(&path).unwrap(), None);
    sink.write(&path, b"one").unwrap();
    sink.write(&path, b"two").unwrap();
    assert_eq!(sink.read(&path).unwrap().as_deref(), Some(b"two".as_slice()));
    let leftovers: Vec<_> = fs::read_dir(dir.join("nested"))
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(leftovers.len(), 1);

    let mut dry = DiskSink::dry_run();
    let other = dir.join("dry.rs");
    dry.write(&other, b"x").unwrap();
    assert!(!other.exists());
    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_generator_run_is_idempotent() {
    let dir = temp_dir();
    fs::write(dir.join("items.rs"), ITEMS).unwrap();
    let generator = Generator::new(GeneratorOptions::new(&dir));
    let mut sink = MemorySink::new();

    let first = generator.run(&mut sink).unwrap();
    assert!(first.is_success(), "{:?}", first.failures);
    assert_eq!(first.services, vec!["ItemService".to_string()]);
    assert_eq!(first.count(WriteAction::Create), 13);
    let document = first.document.clone().unwrap();
    assert_eq!(document.path, dir.join("swagger.yaml"));
    assert_eq!(document.action, WriteAction::Create);
    assert!(sink
        .get(&dir.join("items").join("item_service").join("httpserver").join("server.rs"))
        .is_some());
    let writes = sink.writes();

    let second = generator.run(&mut sink).unwrap();
    assert_eq!(second.count(WriteAction::Unchanged), 13);
    assert_eq!(second.document.unwrap().action, WriteAction::Unchanged);
    assert_eq!(sink.writes(), writes);
    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_generator_keeps_going_after_a_bad_service() {
    let dir = temp_dir();
    fs::write(dir.join("items.rs"), ITEMS).unwrap();
    fs::write(
        dir.join("broken.rs"),
        r#"
        pub trait Broken {
            /// @gtg uri-path /broken/{missing}
            fn broken(&self) -> Result<(), String>;
        }
        "#,
    )
    .unwrap();
    fs::write(dir.join("garbage.rs"), "pub trait {").unwrap();

    let mut sink = MemorySink::new();
    let report = Generator::new(GeneratorOptions::new(&dir)).run(&mut sink).unwrap();
    assert!(!report.is_success());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].service(), Some("Broken"));
    assert_eq!(report.services, vec!["ItemService".to_string()]);
    assert!(report.document.is_some());
    fs::remove_dir_all(&dir).unwrap();
}

const CATALOG: &str = r#"
pub trait Catalog {
    /// @gtg method PUT
    /// @gtg uri-path /shops/{shop}/items/{item_id}
    /// @gtg query dry_run=dryRun, note
    /// @gtg header X-Request-Id: {request_id}
    /// @gtg json-tag display_name=displayName
    /// @gtg response-json-tag total_count=totalCount
    /// @gtg response-header X-Total: {total_count}
    fn update(
        &self,
        shop: String,
        item_id: u64,
        dry_run: bool,
        note: Option<String>,
        request_id: String,
        display_name: String,
        price: u32,
    ) -> Result<Summary, CatalogError>;

    /// @gtg method POST
    /// @gtg uri-path /blobs
    /// @gtg content-type application/octet-stream
    fn upload(&self, data: Vec<u8>) -> Result<String, CatalogError>;
}

#[derive(Debug, Default)]
pub struct Summary { pub total_count: u64, pub name: String }

#[derive(Debug)]
pub enum CatalogError { NotFound }
"#;

/// Text from `start` up to, not including, the next `end`
fn between<'a>(text: &'a str, start: &str, end: &str) -> &'a str {
    let from = text.find(start).unwrap_or_else(|| panic!("`{start}` not found"));
    let rest = &text[from..];
    let to = rest[start.len()..]
        .find(end)
        .map(|i| i + start.len())
        .unwrap_or_else(|| panic!("`{end}` not found after `{start}`"));
    &rest[..to]
}

/// Every capture group 1 of `pattern` in `text`, in order
fn captures(text: &str, pattern: &str) -> Vec<String> {
    regex::Regex::new(pattern)
        .unwrap()
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

/// Field names and serde attributes of a generated struct, types dropped
fn struct_shape(text: &str, name: &str) -> Vec<String> {
    between(text, &format!("struct {name}"), "\n}")
        .lines()
        .skip(1)
        .map(str::trim)
        .map(|l| match l.strip_prefix("#[serde") {
            Some(_) => l.to_string(),
            None => l.split(':').next().unwrap_or_default().to_string(),
        })
        .collect()
}

/// Path rebuilt from the client's url statements, variables as `{name}`
fn client_path(section: &str) -> String {
    regex::Regex::new(r#"url\.push_str\((?:"([^"]*)"|&percent_encode\(&(\w+)\.to_string\(\)\))\);"#)
        .unwrap()
        .captures_iter(section)
        .map(|c| match (c.get(1), c.get(2)) {
            (Some(lit), _) => lit.as_str().to_string(),
            (_, Some(var)) => format!("{{{}}}", var.as_str()),
            _ => unreachable!(),
        })
        .collect()
}

#[test]
fn test_client_encoding_matches_server_decoding() {
    let spec = spec_from(CATALOG);
    let files = render_service(&spec).unwrap();
    let server = file(&files, "httpserver/server.rs");
    let server_tx = file(&files, "httpserver/transport.rs");
    let client_tx = file(&files, "httpclient/transport.rs");

    for view in method_views(&spec) {
        let name = view.name.as_str();
        let encode = between(client_tx, &format!("fn encode_{name}_request("), "\n}\n");
        let decode = between(client_tx, &format!("fn decode_{name}_response("), "\n}\n");
        let handler = between(server_tx, &format!("fn {name}<S: Catalog>("), "\n}\n");
        let respond = between(server_tx, &format!("fn encode_{name}_response("), "\n}\n");

        // verb and path template
        let dispatch = regex::Regex::new(&format!(
            r#"Method::(\w+) \{{\s*if let Some\(vars\) = match_route\("([^"]*)", &path\) \{{\s*return super::transport::{name}\("#
        ))
        .unwrap();
        let routed = dispatch.captures(server).unwrap_or_else(|| panic!("{name} not routed"));
        assert_eq!(captures(encode, r"\.method\(Method::(\w+)\)"), vec![routed[1].to_string()]);
        assert_eq!(client_path(encode), routed[2].to_string(), "{name} path");
        assert_eq!(
            captures(&routed[2], r"\{(\w+)\}"),
            captures(handler, r#"path_var\(vars, "([^"]*)"\)"#),
            "{name} path variables"
        );

        assert_eq!(
            captures(encode, r#"query\.push\(\("([^"]*)""#),
            captures(handler, r#"query_value\(req, "([^"]*)"\)"#),
            "{name} query keys"
        );
        assert_eq!(
            captures(encode, r#"builder\.header\("([^"]*)""#),
            captures(handler, r#"header_value\(req, "([^"]*)"\)"#),
            "{name} headers"
        );

        let body = format!("{}Body", view.pascal);
        let json_out = encode.contains("serde_json::to_vec(&body)");
        assert_eq!(json_out, handler.contains(&format!("let body: {body} = match serde_json::from_slice")));
        if json_out {
            assert_eq!(struct_shape(client_tx, &body), struct_shape(server_tx, &body), "{name} body");
        }
        let raw_out = encode.contains("AsRef::<[u8]>::as_ref(&");
        assert_eq!(raw_out, handler.contains("req.body().clone()"), "{name} raw body");
        assert_eq!(
            captures(encode, r#"header::CONTENT_TYPE, "([^"]*)""#),
            if json_out || raw_out {
                vec![view.request_content_type_lit.trim_matches('"').to_string()]
            } else {
                Vec::new()
            },
            "{name} content type"
        );

        let wire = format!("{}Response", view.pascal);
        let wired = respond.contains(&format!("&{wire} {{"));
        assert_eq!(wired, decode.contains(&format!("let wire: {wire} =")), "{name} response");
        if wired {
            assert_eq!(struct_shape(client_tx, &wire), struct_shape(server_tx, &wire));
        }
        assert_eq!(
            captures(respond, r#"builder\.header\("([^"]*)", value\."#),
            captures(decode, r#"resp\.headers\(\)\.get\("([^"]*)"\)"#),
            "{name} response headers"
        );
    }

    let update = between(client_tx, "fn encode_update_request(", "\n}\n");
    assert_eq!(client_path(update), "/shops/{shop}/items/{item_id}");
    assert_eq!(captures(update, r#"query\.push\(\("([^"]*)""#), vec!["dryRun", "note"]);
    assert_eq!(
        struct_shape(server_tx, "UpdateBody"),
        vec!["#[serde(rename = \"displayName\")]", "display_name", "price"]
    );
    assert_eq!(
        struct_shape(server_tx, "UpdateResponse"),
        vec!["#[serde(rename = \"totalCount\")]", "total_count", "name"]
    );
    let upload = between(client_tx, "fn encode_upload_request(", "\n}\n");
    assert!(upload.contains("header::CONTENT_TYPE, \"application/octet-stream\""));
}
