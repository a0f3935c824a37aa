use std::fmt;
use std::path::PathBuf;

/// Generation error
///
/// Every variant carries enough context (service, method, offending line or
/// route) for the operator to locate the problem in the annotated source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenError {
    /// A recognized directive carried a malformed argument
    ///
    /// Aborts generation for the owning service.
    DirectiveSyntax {
        /// Trait the method belongs to
        service: String,
        /// Method whose doc comment holds the directive, `None` for the trait's own
        method: Option<String>,
        /// The offending doc line, verbatim
        line: String,
        /// What was wrong with it
        message: String,
    },
    /// The directives of a service do not form a consistent contract
    ///
    /// Aborts generation for the owning service; siblings are unaffected.
    SemanticValidation {
        /// Trait being built
        service: String,
        /// Method at fault, when the problem is local to one method
        method: Option<String>,
        /// What was wrong
        message: String,
    },
    /// Two operations claim the same verb and path in the API document
    ///
    /// Aborts the document step only.
    AggregationConflict {
        /// The contested `VERB /path`
        route: String,
        /// `Service.method` that claimed the route first
        first: String,
        /// `Service.method` that claimed it second
        second: String,
    },
    /// A template failed to render or the document failed to serialize
    Render {
        /// Artifact being produced
        path: String,
        /// Underlying error text
        message: String,
    },
    /// Reading or writing an artifact failed
    Io {
        /// File being accessed
        path: PathBuf,
        /// Underlying error text
        message: String,
    },
}

impl GenError {
    /// Build a semantic validation error scoped to one method
    pub fn semantic(
        service: impl Into<String>,
        method: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        GenError::SemanticValidation {
            service: service.into(),
            method: method.map(str::to_string),
            message: message.into(),
        }
    }

    /// Name of the service the error belongs to, if any
    pub fn service(&self) -> Option<&str> {
        match self {
            GenError::DirectiveSyntax { service, .. }
            | GenError::SemanticValidation { service, .. } => Some(service),
            _ => None,
        }
    }

    /// Short machine-readable kind, used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            GenError::DirectiveSyntax { .. } => "directive_syntax",
            GenError::SemanticValidation { .. } => "semantic_validation",
            GenError::AggregationConflict { .. } => "aggregation_conflict",
            GenError::Render { .. } => "render",
            GenError::Io { .. } => "io",
        }
    }
}

impl fmt::Display for GenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenError::DirectiveSyntax {
                service,
                method: Some(method),
                line,
                message,
            } => write!(f, "{service}.{method}: {message} (in `{}`)", line.trim()),
            GenError::DirectiveSyntax {
                service,
                method: None,
                line,
                message,
            } => write!(f, "{service}: {message} (in `{}`)", line.trim()),
            GenError::SemanticValidation {
                service,
                method: Some(method),
                message,
            } => write!(f, "{service}.{method}: {message}"),
            GenError::SemanticValidation {
                service,
                method: None,
                message,
            } => write!(f, "{service}: {message}"),
            GenError::AggregationConflict {
                route,
                first,
                second,
            } => write!(
                f,
                "document conflict: `{route}` is declared by both {first} and {second}"
            ),
            GenError::Render { path, message } => {
                write!(f, "failed to render {path}: {message}")
            }
            GenError::Io { path, message } => {
                write!(f, "I/O error on {}: {message}", path.display())
            }
        }
    }
}

impl std::error::Error for GenError {}
