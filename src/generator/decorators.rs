use super::*;

/// `logging.rs`: a service decorator tracing every call
pub struct LoggingProcessor;

impl Processor for LoggingProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Log
    }

    fn process(&self, spec: &ServiceSpec) -> Result<Vec<GeneratedFile>, GenError> {
        let mut imports = service_imports(spec);
        imports.add("std::time::Instant");
        let body = render(
            &LoggingTemplateData {
                interface: spec.interface_name.clone(),
                methods: method_views(spec),
            },
            "logging.rs",
        )?;
        Ok(vec![GeneratedFile::new(
            &["logging.rs"],
            assemble(spec, "Call logging decorator", &imports, &body),
        )])
    }
}

/// `instrumenting.rs`: a service decorator counting calls and latency
pub struct InstrumentingProcessor;

impl Processor for InstrumentingProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Metrics
    }

    fn process(&self, spec: &ServiceSpec) -> Result<Vec<GeneratedFile>, GenError> {
        let mut imports = service_imports(spec);
        imports.extend([
            "std::sync::atomic::AtomicU64",
            "std::sync::atomic::Ordering",
            "std::sync::Arc",
            "std::time::Duration",
            "std::time::Instant",
        ]);
        let body = render(
            &InstrumentingTemplateData {
                interface: spec.interface_name.clone(),
                methods: method_views(spec),
            },
            "instrumenting.rs",
        )?;
        Ok(vec![GeneratedFile::new(
            &["instrumenting.rs"],
            assemble(spec, "Call metrics decorator", &imports, &body),
        )])
    }
}
