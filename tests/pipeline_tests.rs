#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use gtg::generator::{
    DiskSink, FileSink, Generator, GeneratorOptions, MemorySink, WriteAction, GENERATED_MARKER,
};
use gtg::GenError;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const ITEMS: &str = r#"
/// @gtg http-server http-client http-errors log metrics mock swagger
pub trait ItemService {
    /// @gtg method GET
    /// @gtg uri-path /items/{id}
    /// @gtg errors NotFound=404
    fn get_item(&self, id: String) -> Result<Item, ItemError>;

    /// @gtg method GET
    /// @gtg uri-path /items
    /// @gtg query limit
    fn list_items(&self, limit: Option<u32>) -> Result<Vec<Item>, ItemError>;
}

#[derive(Debug, Default)]
pub struct Item { pub id: String }

#[derive(Debug)]
pub enum ItemError { NotFound }
"#;

const BROKEN: &str = r#"
pub trait Broken {
    /// @gtg method GET
    /// @gtg uri-path /broken/{missing}
    fn broken(&self) -> Result<(), String>;
}
"#;

const ORDERS: &str = r#"
/// @gtg http-server swagger
pub trait OrderService {
    /// @gtg method GET
    /// @gtg uri-path /orders
    fn list_orders(&self) -> Result<Vec<String>, String>;
}
"#;

/// Memory sink refusing every write below a directory named `refused`
struct RefusingSink {
    inner: MemorySink,
    refused: &'static str,
    attempts: Vec<PathBuf>,
}

impl FileSink for RefusingSink {
    fn read(&self, path: &Path) -> Result<Option<Vec<u8>>, GenError> {
        self.inner.read(path)
    }

    fn write(&mut self, path: &Path, bytes: &[u8]) -> Result<(), GenError> {
        self.attempts.push(path.to_path_buf());
        if path.components().any(|c| c.as_os_str() == self.refused) {
            return Err(GenError::Io {
                path: path.to_path_buf(),
                message: "permission denied".to_string(),
            });
        }
        self.inner.write(path, bytes)
    }
}

fn project(files: &[(&str, &str)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, text) in files {
        let path = dir.path().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }
    dir
}

fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    WalkDir::new(root)
        .into_iter()
        .map(Result::unwrap)
        .filter(|e| e.file_type().is_file())
        .map(|e| (e.path().to_path_buf(), fs::read(e.path()).unwrap()))
        .collect()
}

fn run(root: &Path) -> gtg::RunReport {
    Generator::new(GeneratorOptions::new(root))
        .run(&mut DiskSink::new())
        .unwrap()
}

#[test]
fn test_second_run_changes_nothing() {
    let dir = project(&[("items.rs", ITEMS)]);
    let first = run(dir.path());
    assert!(first.is_success(), "{:?}", first.failures);
    assert_eq!(first.count(WriteAction::Create), 13);
    let service_dir = dir.path().join("items").join("item_service");
    assert!(service_dir.join("httpserver").join("server.rs").is_file());
    assert!(dir.path().join("swagger.yaml").is_file());
    let before = snapshot(dir.path());

    let second = run(dir.path());
    assert_eq!(second.services, vec!["ItemService".to_string()]);
    assert_eq!(second.count(WriteAction::Unchanged), 13);
    assert_eq!(second.count(WriteAction::Create), 0);
    assert_eq!(second.count(WriteAction::Overwrite), 0);
    assert_eq!(second.document.unwrap().action, WriteAction::Unchanged);
    assert_eq!(snapshot(dir.path()), before);
}

#[test]
fn test_every_generated_file_carries_marker() {
    let dir = project(&[("items.rs", ITEMS)]);
    run(dir.path());
    let service_dir = dir.path().join("items").join("item_service");
    for (path, bytes) in snapshot(&service_dir) {
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with(GENERATED_MARKER), "{}", path.display());
        assert!(text.contains("// source: crate::items::ItemService"), "{}", path.display());
    }
}

#[test]
fn test_hand_written_file_is_never_replaced() {
    let dir = project(&[
        ("items.rs", ITEMS),
        ("items/item_service/mock.rs", "// my own mock\npub struct Mine;\n"),
    ]);
    let report = run(dir.path());
    assert!(report.is_success());
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].service, "ItemService");
    assert_eq!(report.count(WriteAction::Create), 12);
    let mock = dir.path().join("items").join("item_service").join("mock.rs");
    assert_eq!(fs::read_to_string(mock).unwrap(), "// my own mock\npub struct Mine;\n");
}

#[test]
fn test_edited_generated_file_is_restored() {
    let dir = project(&[("items.rs", ITEMS)]);
    run(dir.path());
    let logging = dir.path().join("items").join("item_service").join("logging.rs");
    let original = fs::read_to_string(&logging).unwrap();
    fs::write(&logging, format!("{GENERATED_MARKER}\n// stale\n")).unwrap();

    let report = run(dir.path());
    assert_eq!(report.count(WriteAction::Overwrite), 1);
    assert_eq!(fs::read_to_string(&logging).unwrap(), original);
}

#[test]
fn test_failing_service_does_not_block_siblings() {
    let dir = project(&[("items.rs", ITEMS), ("broken.rs", BROKEN)]);
    let report = run(dir.path());
    assert!(!report.is_success());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].service(), Some("Broken"));
    assert_eq!(report.services, vec!["ItemService".to_string()]);
    assert!(dir.path().join("items").join("item_service").join("mod.rs").is_file());
    assert!(!dir.path().join("broken").exists());
}

#[test]
fn test_dry_run_writes_nothing() {
    let dir = project(&[("items.rs", ITEMS)]);
    let before = snapshot(dir.path());
    let report = Generator::new(GeneratorOptions::new(dir.path()))
        .run(&mut DiskSink::dry_run())
        .unwrap();
    assert_eq!(report.count(WriteAction::Create), 13);
    assert_eq!(report.document.unwrap().action, WriteAction::Create);
    assert_eq!(snapshot(dir.path()), before);
}

#[test]
fn test_server_and_client_routes_agree() {
    let dir = project(&[("items.rs", ITEMS)]);
    run(dir.path());
    let service_dir = dir.path().join("items").join("item_service");
    let routes = |file: PathBuf| -> Vec<String> {
        let text = fs::read_to_string(file).unwrap();
        let start = text.find("pub const ROUTES").unwrap();
        let end = start + text[start..].find("];").unwrap();
        text[start..end]
            .lines()
            .skip(1)
            .map(|l| l.trim().to_string())
            .collect()
    };
    let server = routes(service_dir.join("httpserver").join("server.rs"));
    let client = routes(service_dir.join("httpclient").join("client.rs"));
    assert_eq!(server, client);
    assert_eq!(server, vec!["\"GET /items/{id}\",", "\"GET /items\","]);
}

#[test]
fn test_trait_in_lib_rs_generates_beside_it() {
    let dir = project(&[("lib.rs", ITEMS)]);
    let report = run(dir.path());
    assert!(report.is_success());
    assert!(dir.path().join("item_service").join("mod.rs").is_file());
}

#[test]
fn test_unmarked_traits_are_ignored() {
    let dir = project(&[("plain.rs", "pub trait Plain { fn go(&self); }\n")]);
    let report = run(dir.path());
    assert!(report.is_success());
    assert!(report.services.is_empty());
    assert!(report.document.is_none());
    assert!(!dir.path().join("swagger.yaml").exists());
}

#[test]
fn test_write_failure_aborts_the_run() {
    // items.rs is generated before orders.rs
    let dir = project(&[("items.rs", ITEMS), ("orders.rs", ORDERS)]);
    let mut sink = RefusingSink {
        inner: MemorySink::new(),
        refused: "item_service",
        attempts: Vec::new(),
    };
    let err = Generator::new(GeneratorOptions::new(dir.path()))
        .run(&mut sink)
        .unwrap_err();

    match err.downcast_ref::<GenError>() {
        Some(GenError::Io { path, .. }) => assert!(path.starts_with(dir.path().join("items"))),
        other => panic!("expected an I/O error, got {other:?}"),
    }
    assert_eq!(sink.attempts.len(), 1);
    assert_eq!(sink.inner.writes(), 0);
    assert!(sink.attempts.iter().all(|p| !p.starts_with(dir.path().join("orders"))));
    assert!(sink.inner.get(&dir.path().join("swagger.yaml")).is_none());
}

#[test]
fn test_document_write_failure_aborts_the_run() {
    let dir = project(&[("orders.rs", ORDERS)]);
    let docs = dir.path().join("refused_docs");
    let mut options = GeneratorOptions::new(dir.path());
    options.document_dir = Some(docs.clone());
    let mut sink = RefusingSink {
        inner: MemorySink::new(),
        refused: "refused_docs",
        attempts: Vec::new(),
    };
    let err = Generator::new(options).run(&mut sink).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<GenError>(),
        Some(GenError::Io { path, .. }) if path.starts_with(&docs)
    ));
    assert!(sink.inner.paths().all(|p| !p.starts_with(&docs)));
}
