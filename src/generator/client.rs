use super::*;

const CLIENT_IMPORTS: &[&str] = &[
    "http::header",
    "http::Method",
    "http::Request",
    "http::Response",
    "super::super::httperrors::client::ClientError",
    "super::super::httperrors::client as errors",
];

/// `httpclient/`: an implementation of the service trait over HTTP
///
/// The secure and plaintext flavours share every template; only the scheme
/// the client prefixes its base URL with differs.
pub struct ClientProcessor {
    pub secure: bool,
}

impl ClientProcessor {
    pub fn scheme(&self) -> &'static str {
        if self.secure {
            "https"
        } else {
            "http"
        }
    }
}

impl Processor for ClientProcessor {
    fn kind(&self) -> ProcessorKind {
        if self.secure {
            ProcessorKind::HttpsClient
        } else {
            ProcessorKind::HttpClient
        }
    }

    fn process(&self, spec: &ServiceSpec) -> Result<Vec<GeneratedFile>, GenError> {
        let methods = method_views(spec);
        let mut imports = service_imports(spec);
        imports.extend(CLIENT_IMPORTS.iter().copied());

        let client = render(
            &ClientTemplateData {
                interface: spec.interface_name.clone(),
                methods: methods.clone(),
                error_type: error_type(spec),
                scheme: self.scheme().to_string(),
            },
            "httpclient/client.rs",
        )?;
        let transport = render(
            &ClientTransportTemplateData {
                methods,
                error_type: error_type(spec),
            },
            "httpclient/transport.rs",
        )?;

        let client_name = format!("{}Client", spec.interface_name);
        Ok(vec![
            mod_rs(
                spec,
                &["httpclient", "mod.rs"],
                &format!("HTTP client for `{}`", spec.interface_name),
                vec![
                    ModDecl {
                        name: "client".into(),
                        public: false,
                    },
                    ModDecl {
                        name: "transport".into(),
                        public: false,
                    },
                ],
                vec![
                    format!("client::{{{client_name}, ROUTES}}"),
                    "transport::HttpTransport".to_string(),
                ],
            )?,
            GeneratedFile::new(
                &["httpclient", "client.rs"],
                assemble(spec, "", &imports, &client),
            ),
            GeneratedFile::new(
                &["httpclient", "transport.rs"],
                assemble(spec, "Request encoding and response decoding", &imports, &transport),
            ),
        ])
    }
}
