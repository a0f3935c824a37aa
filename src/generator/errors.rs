use super::views::lit;
use super::*;

/// `httperrors/`: error to status mapping for both bindings
pub struct ErrorsProcessor;

impl Processor for ErrorsProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::HttpErrors
    }

    fn process(&self, spec: &ServiceSpec) -> Result<Vec<GeneratedFile>, GenError> {
        let imports = service_imports(spec);
        let ui = render(
            &ErrorsUiTemplateData {
                error_type: error_type(spec),
                mappings: ui_mappings(spec),
            },
            "httperrors/ui.rs",
        )?;
        let client = render(
            &ErrorsClientTemplateData {
                error_type: error_type(spec),
                mappings: client_mappings(spec),
            },
            "httperrors/client.rs",
        )?;

        Ok(vec![
            mod_rs(
                spec,
                &["httperrors", "mod.rs"],
                &format!("HTTP error mapping for `{}`", spec.interface_name),
                vec![
                    ModDecl {
                        name: "client".into(),
                        public: true,
                    },
                    ModDecl {
                        name: "ui".into(),
                        public: true,
                    },
                ],
                vec!["client::ClientError".to_string()],
            )?,
            GeneratedFile::new(
                &["httperrors", "ui.rs"],
                assemble(spec, "Errors as seen by HTTP callers", &imports, &ui),
            ),
            GeneratedFile::new(
                &["httperrors", "client.rs"],
                assemble(spec, "Errors decoded from HTTP responses", &imports, &client),
            ),
        ])
    }
}

fn mapping(variant: &str, status: u16) -> ErrorMapping {
    let message = http::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Error");
    ErrorMapping {
        variant: variant.to_string(),
        status,
        message_lit: lit(message),
    }
}

/// Every mapped identifier, in variant order when the enum is indexed
fn ui_mappings(spec: &ServiceSpec) -> Vec<ErrorMapping> {
    let statuses = spec.error_statuses();
    match &spec.error_variants {
        Some(variants) => variants
            .iter()
            .filter_map(|v| statuses.get(&v.name).map(|s| mapping(&v.name, *s)))
            .collect(),
        None => statuses.iter().map(|(v, s)| mapping(v, *s)).collect(),
    }
}

/// Statuses that decode back to a fieldless variant, first variant per status
///
/// Without an indexed enum the variant shapes are unknown and nothing is
/// decoded to a typed error.
fn client_mappings(spec: &ServiceSpec) -> Vec<ErrorMapping> {
    let statuses = spec.error_statuses();
    let Some(variants) = &spec.error_variants else {
        return Vec::new();
    };
    let mut seen = Vec::new();
    variants
        .iter()
        .filter(|v| v.unit)
        .filter_map(|v| statuses.get(&v.name).map(|s| (v, *s)))
        .filter(|(_, status)| {
            if seen.contains(status) {
                false
            } else {
                seen.push(*status);
                true
            }
        })
        .map(|(v, status)| mapping(&v.name, status))
        .collect()
}
