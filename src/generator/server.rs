use super::*;

/// Server imports beyond the service's own
const SERVER_IMPORTS: &[&str] = &[
    "http::header",
    "http::Method",
    "http::Request",
    "http::Response",
    "http::StatusCode",
    "super::super::httperrors::ui",
];

/// `httpserver/`: routing over `http::Request` and per-method decoders
pub struct ServerProcessor;

impl Processor for ServerProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::HttpServer
    }

    fn process(&self, spec: &ServiceSpec) -> Result<Vec<GeneratedFile>, GenError> {
        let methods = method_views(spec);
        let mut imports = service_imports(spec);
        imports.extend(SERVER_IMPORTS.iter().copied());

        let any_async = spec.methods.iter().any(|m| m.is_async);
        let server = render(
            &ServerTemplateData {
                interface: spec.interface_name.clone(),
                methods: methods.clone(),
                asyncness: if any_async { "async " } else { "" }.to_string(),
            },
            "httpserver/server.rs",
        )?;
        let transport = render(
            &ServerTransportTemplateData {
                interface: spec.interface_name.clone(),
                methods,
                error_type: error_type(spec),
            },
            "httpserver/transport.rs",
        )?;

        let server_name = format!("{}Server", spec.interface_name);
        Ok(vec![
            mod_rs(
                spec,
                &["httpserver", "mod.rs"],
                &format!("HTTP server binding for `{}`", spec.interface_name),
                vec![
                    ModDecl {
                        name: "server".into(),
                        public: false,
                    },
                    ModDecl {
                        name: "transport".into(),
                        public: false,
                    },
                ],
                vec![format!("server::{{{server_name}, ROUTES}}")],
            )?,
            GeneratedFile::new(
                &["httpserver", "server.rs"],
                assemble(spec, "Request routing", &imports, &server),
            ),
            GeneratedFile::new(
                &["httpserver", "transport.rs"],
                assemble(spec, "Request decoding and response encoding", &imports, &transport),
            ),
        ])
    }
}
