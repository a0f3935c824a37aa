//! `gtg.toml` configuration
//!
//! Supplies API document metadata that has no natural home in the source
//! tree. Every value can be overridden on the command line.
//!
//! ```toml
//! [document]
//! title = "Items API"
//! version = "1.2.0"
//! description = "Inventory of items"
//! servers = ["https://api.example.com = production", "http://localhost:8080"]
//! format = "json"
//! output = "docs"
//! ```

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::directive::{parse_server, push_server, Server};
use crate::document::{DocFormat, DocumentInfo};

/// File name looked up when `--config` is not given
pub const CONFIG_FILE_NAME: &str = "gtg.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenConfig {
    #[serde(default)]
    pub document: DocumentConfig,
}

/// `[document]` table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocumentConfig {
    pub title: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    /// `url = description` entries
    #[serde(default)]
    pub servers: Vec<String>,
    /// `json` or `yaml`
    pub format: Option<String>,
    /// Directory receiving the document, relative to the config file
    pub output: Option<PathBuf>,
}

impl DocumentConfig {
    /// Metadata with servers validated
    pub fn info(&self) -> anyhow::Result<DocumentInfo> {
        let mut servers = Vec::new();
        for entry in &self.servers {
            let server = parse_server(entry).map_err(anyhow::Error::msg)?;
            push_server(&mut servers, server);
        }
        Ok(DocumentInfo {
            title: self.title.clone().unwrap_or_default(),
            version: self.version.clone().unwrap_or_default(),
            description: self.description.clone().unwrap_or_default(),
            servers,
        })
    }

    pub fn doc_format(&self) -> anyhow::Result<Option<DocFormat>> {
        self.format
            .as_deref()
            .map(|f| f.parse::<DocFormat>().map_err(anyhow::Error::msg))
            .transpose()
    }
}

/// Load a configuration file
///
/// Relative `output` paths are resolved against the file's directory.
pub fn load_config(path: &Path) -> anyhow::Result<GenConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    let mut config: GenConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config: {}", path.display()))?;
    if let (Some(output), Some(dir)) = (&config.document.output, path.parent()) {
        if output.is_relative() {
            config.document.output = Some(dir.join(output));
        }
    }
    config
        .document
        .info()
        .with_context(|| format!("Invalid servers in {}", path.display()))?;
    config
        .document
        .doc_format()
        .with_context(|| format!("Invalid format in {}", path.display()))?;
    Ok(config)
}

/// `gtg.toml` in `input` or in the nearest ancestor holding a `Cargo.toml`
pub fn auto_detect_config_path(input: &Path) -> Option<PathBuf> {
    for dir in input.ancestors() {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        if dir.join("Cargo.toml").is_file() {
            break;
        }
    }
    None
}

/// Resolve and load the configuration
///
/// Priority:
/// 1. Explicitly provided path, which must exist
/// 2. Auto-detected from the input directory
/// 3. Defaults
pub fn resolve_config(explicit: Option<&Path>, input: &Path) -> anyhow::Result<GenConfig> {
    match explicit {
        Some(path) => load_config(path),
        None => match auto_detect_config_path(input) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "using detected config");
                load_config(&path)
            }
            None => Ok(GenConfig::default()),
        },
    }
}

/// Parse a `--servers` value: `url = description` entries separated by
/// newlines, or by a literal `\n` when the shell could not pass one
pub fn parse_servers(raw: &str) -> anyhow::Result<Vec<Server>> {
    let normalized = raw.replace("\\r\\n", "\n").replace("\\n", "\n");
    let mut servers = Vec::new();
    for entry in normalized.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let server = parse_server(entry).map_err(anyhow::Error::msg)?;
        push_server(&mut servers, server);
    }
    Ok(servers)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config: GenConfig = toml::from_str(
            r#"
            [document]
            title = "Items API"
            version = "1.2.0"
            servers = ["https://api.example.com = production", "http://localhost:8080"]
            format = "yml"
            "#,
        )
        .unwrap();
        let info = config.document.info().unwrap();
        assert_eq!(info.title, "Items API");
        assert_eq!(info.version, "1.2.0");
        assert_eq!(info.description, "");
        assert_eq!(info.servers.len(), 2);
        assert_eq!(info.servers[0].description, "production");
        assert_eq!(info.servers[1].url, "http://localhost:8080");
        assert_eq!(config.document.doc_format().unwrap(), Some(DocFormat::Yaml));
    }

    #[test]
    fn test_empty_config_is_default() {
        let config: GenConfig = toml::from_str("").unwrap();
        assert_eq!(config, GenConfig::default());
        assert_eq!(config.document.doc_format().unwrap(), None);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(toml::from_str::<GenConfig>("[document]\ntitel = \"x\"\n").is_err());
    }

    #[test]
    fn test_load_resolves_output_against_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[document]\noutput = \"docs\"\nformat = \"json\"\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.document.output, Some(dir.path().join("docs")));
        assert_eq!(config.document.doc_format().unwrap(), Some(DocFormat::Json));
    }

    #[test]
    fn test_load_rejects_bad_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[document]\nformat = \"xml\"\n").unwrap();
        assert!(load_config(&path).is_err());
        std::fs::write(&path, "[document]\nservers = [\"not a url = x\"]\n").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_auto_detect_stops_at_crate_root() {
        let dir = tempfile::tempdir().unwrap();
        let krate = dir.path().join("krate");
        let src = krate.join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(krate.join("Cargo.toml"), "[package]\n").unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "").unwrap();
        assert_eq!(auto_detect_config_path(&src), None);

        std::fs::write(krate.join(CONFIG_FILE_NAME), "").unwrap();
        assert_eq!(auto_detect_config_path(&src), Some(krate.join(CONFIG_FILE_NAME)));
        assert_eq!(resolve_config(None, &src).unwrap(), GenConfig::default());
    }

    #[test]
    fn test_parse_servers_accepts_escaped_newlines() {
        let servers =
            parse_servers("https://a.example = A\\nhttps://b.example = B\n\nhttps://a.example = again")
                .unwrap();
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0].url, "https://a.example");
        assert_eq!(servers[0].description, "again");
        assert_eq!(servers[1].description, "B");
        assert!(parse_servers("no spaces allowed = x").is_err());
    }
}
