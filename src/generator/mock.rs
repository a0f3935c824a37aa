use super::*;

/// `mock.rs`: a recording test double implementing the service trait
pub struct MockProcessor;

impl Processor for MockProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Mock
    }

    fn process(&self, spec: &ServiceSpec) -> Result<Vec<GeneratedFile>, GenError> {
        let mut imports = service_imports(spec);
        imports.extend(["std::sync::Mutex", "std::sync::MutexGuard"]);
        let body = render(
            &MockTemplateData {
                interface: spec.interface_name.clone(),
                methods: method_views(spec),
            },
            "mock.rs",
        )?;
        Ok(vec![GeneratedFile::new(
            &["mock.rs"],
            assemble(spec, "Recording mock", &imports, &body),
        )])
    }
}
