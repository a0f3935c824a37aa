use askama::Template;

use super::views::MethodView;

/// One `mod` line of a generated `mod.rs`
#[derive(Debug, Clone)]
pub struct ModDecl {
    pub name: String,
    pub public: bool,
}

/// Template data for any generated `mod.rs`
#[derive(Template)]
#[template(path = "mod.rs.txt", escape = "none")]
pub struct ModRsTemplateData {
    pub modules: Vec<ModDecl>,
    /// `pub use` paths
    pub reexports: Vec<String>,
}

/// Template data for `httpserver/server.rs` (routing)
#[derive(Template)]
#[template(path = "httpserver/server.rs.txt", escape = "none")]
pub struct ServerTemplateData {
    pub interface: String,
    pub methods: Vec<MethodView>,
    /// `async ` when any method is async
    pub asyncness: String,
}

/// Template data for `httpserver/transport.rs` (request decoding, response encoding)
#[derive(Template)]
#[template(path = "httpserver/transport.rs.txt", escape = "none")]
pub struct ServerTransportTemplateData {
    pub interface: String,
    pub methods: Vec<MethodView>,
    /// Shared error type, empty when no method returns `Result`
    pub error_type: String,
}

/// Template data for `httpclient/client.rs`
#[derive(Template)]
#[template(path = "httpclient/client.rs.txt", escape = "none")]
pub struct ClientTemplateData {
    pub interface: String,
    pub methods: Vec<MethodView>,
    pub error_type: String,
    /// `http` or `https`
    pub scheme: String,
}

/// Template data for `httpclient/transport.rs`
#[derive(Template)]
#[template(path = "httpclient/transport.rs.txt", escape = "none")]
pub struct ClientTransportTemplateData {
    pub methods: Vec<MethodView>,
    pub error_type: String,
}

/// Error variant with its status
#[derive(Debug, Clone)]
pub struct ErrorMapping {
    pub variant: String,
    pub status: u16,
    /// User-safe message literal
    pub message_lit: String,
}

/// Template data for `httperrors/ui.rs`
#[derive(Template)]
#[template(path = "httperrors/ui.rs.txt", escape = "none")]
pub struct ErrorsUiTemplateData {
    pub error_type: String,
    pub mappings: Vec<ErrorMapping>,
}

/// Template data for `httperrors/client.rs`
#[derive(Template)]
#[template(path = "httperrors/client.rs.txt", escape = "none")]
pub struct ErrorsClientTemplateData {
    pub error_type: String,
    /// Status to fieldless variant, one entry per status
    pub mappings: Vec<ErrorMapping>,
}

/// Template data for `logging.rs`
#[derive(Template)]
#[template(path = "logging.rs.txt", escape = "none")]
pub struct LoggingTemplateData {
    pub interface: String,
    pub methods: Vec<MethodView>,
}

/// Template data for `instrumenting.rs`
#[derive(Template)]
#[template(path = "instrumenting.rs.txt", escape = "none")]
pub struct InstrumentingTemplateData {
    pub interface: String,
    pub methods: Vec<MethodView>,
}

/// Template data for `mock.rs`
#[derive(Template)]
#[template(path = "mock.rs.txt", escape = "none")]
pub struct MockTemplateData {
    pub interface: String,
    pub methods: Vec<MethodView>,
}
