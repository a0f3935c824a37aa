//! # Directive Module
//!
//! Lexical layer over documentation comments. A directive is one doc line of
//! the form
//!
//! ```text
//! /// @gtg <keyword> <argument>
//! ```
//!
//! The keyword may carry the legacy family prefix (`http-server-method`,
//! `swagger-title`); it is stripped so both spellings reach the same
//! recognizer. Unknown keywords are not rejected here: they travel through the
//! [`DirectiveChain`] and are dropped at its end, which keeps older generators
//! working on sources annotated for newer ones.

mod chain;
#[cfg(test)]
mod tests;

pub use chain::*;

use std::fmt;

/// Marker token identifying a doc line as a directive
pub const MARKER: &str = "@gtg";

/// Legacy keyword families, removed before matching
const FAMILY_PREFIXES: &[&str] = &["http-server-", "swagger-"];

pub const METHOD: &str = "method";
pub const URI_PATH: &str = "uri-path";
pub const API_PATH: &str = "api-path";
pub const QUERY: &str = "query";
pub const HEADER: &str = "header";
pub const CONTENT_TYPE: &str = "content-type";
pub const JSON_TAG: &str = "json-tag";
pub const ERRORS: &str = "errors";
pub const RESPONSE_STATUS: &str = "response-status";
pub const RESPONSE_HEADER: &str = "response-header";
pub const RESPONSE_CONTENT_TYPE: &str = "response-content-type";
pub const RESPONSE_CONTENT_ENCODING: &str = "response-content-encoding";
pub const RESPONSE_JSON_TAG: &str = "response-json-tag";
pub const RESPONSE_BODY: &str = "response-body";
pub const TITLE: &str = "title";
pub const VERSION: &str = "version";
pub const SUMMARY: &str = "summary";
pub const DESCRIPTION: &str = "description";
pub const SERVERS: &str = "servers";

const DOCUMENT_KEYWORDS: &[&str] = &[TITLE, VERSION, SUMMARY, DESCRIPTION, SERVERS];

/// What part of the contract a directive describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Request,
    Response,
    Document,
}

impl Scope {
    fn for_keyword(keyword: &str) -> Self {
        if DOCUMENT_KEYWORDS.contains(&keyword) {
            Scope::Document
        } else if keyword.starts_with("response-") {
            Scope::Response
        } else {
            Scope::Request
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Request => write!(f, "request"),
            Scope::Response => write!(f, "response"),
            Scope::Document => write!(f, "document"),
        }
    }
}

/// One `keyword + argument` pair taken from a marked doc line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// Keyword with any family prefix removed
    pub keyword: String,
    /// Remainder of the line, trimmed
    pub argument: String,
    /// Association derived from the keyword
    pub scope: Scope,
    /// The doc line the directive came from, kept for error context
    pub line: String,
}

impl Directive {
    /// Split a doc line into a directive
    ///
    /// Returns `None` when the line does not start with `marker` (leading
    /// whitespace ignored) or when nothing follows the marker.
    pub fn parse(line: &str, marker: &str) -> Option<Directive> {
        let rest = line.trim_start().strip_prefix(marker)?;
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            // `@gtgfoo` is not our marker
            return None;
        }
        let rest = rest.trim();
        if rest.is_empty() {
            return None;
        }
        let (keyword, argument) = match rest.split_once(char::is_whitespace) {
            Some((k, a)) => (k, a.trim()),
            None => (rest, ""),
        };
        let keyword = strip_family(keyword).to_ascii_lowercase();
        Some(Directive {
            scope: Scope::for_keyword(&keyword),
            keyword,
            argument: argument.to_string(),
            line: line.to_string(),
        })
    }
}

fn strip_family(keyword: &str) -> &str {
    FAMILY_PREFIXES
        .iter()
        .find_map(|p| keyword.strip_prefix(p))
        .filter(|k| !k.is_empty())
        .unwrap_or(keyword)
}

/// Words following the marker on a line, if the line is marked
///
/// Used for interface-level lines such as `@gtg http-server log mock`.
pub fn marked_words<'a>(line: &'a str, marker: &str) -> Option<Vec<&'a str>> {
    let rest = line.trim_start().strip_prefix(marker)?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(rest.split_whitespace().collect())
}

/// True when the leading line of a doc comment carries the marker
///
/// Blank lines before it are ignored. A marker further down, after prose,
/// does not make the method eligible.
pub fn is_marked(lines: &[String], marker: &str) -> bool {
    lines
        .iter()
        .find(|l| !l.trim().is_empty())
        .is_some_and(|l| marked_words(l, marker).is_some())
}
