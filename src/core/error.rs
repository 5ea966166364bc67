use thiserror::Error;

/// Errors surfaced by the engine
#[derive(Debug, Error)]
pub enum Error {
    /// Entity or relation referenced does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Attempt to create an entity whose name already exists
    #[error("duplicate entity: {0}")]
    Duplicate(String),

    /// Malformed input (query too long, importance out of range, unknown strategy, ...)
    #[error("validation failed: {0}")]
    Validation(String),

    /// Boolean query syntax error
    #[error("parse error: {0}")]
    Parse(String),

    /// Parent assignment that would create a cycle
    #[error("hierarchy cycle: {0}")]
    Cycle(String),

    /// Cooperative cancellation observed
    #[error("operation cancelled")]
    Cancelled,

    /// Propagated failure from a GraphStore or Embedder port
    #[error("backend failure in {port}: {source}")]
    Backend {
        port: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Query or batch exceeds configured complexity or size limits
    #[error("capacity exceeded: {0}")]
    Capacity(String),
}

impl Error {
    /// Wrap a port failure, keeping the originating port name
    pub fn backend<E>(port: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Backend {
            port,
            source: Box::new(source),
        }
    }

    /// Errors the caller sees unchanged from retrievers
    pub fn is_caller_fault(&self) -> bool {
        matches!(
            self,
            Error::Parse(_) | Error::Validation(_) | Error::Capacity(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_non_empty() {
        let errors = vec![
            Error::NotFound("alice".into()),
            Error::Duplicate("alice".into()),
            Error::Validation("importance 12 out of range".into()),
            Error::Parse("unbalanced parenthesis".into()),
            Error::Cycle("alice -> bob -> alice".into()),
            Error::Cancelled,
            Error::backend("embedder", std::io::Error::other("connection reset")),
            Error::Capacity("too many terms".into()),
        ];
        for err in &errors {
            assert!(!err.to_string().is_empty());
        }
    }

    #[test]
    fn caller_fault_classification() {
        assert!(Error::Parse("x".into()).is_caller_fault());
        assert!(Error::Validation("x".into()).is_caller_fault());
        assert!(Error::Capacity("x".into()).is_caller_fault());
        assert!(!Error::NotFound("x".into()).is_caller_fault());
        assert!(!Error::Cancelled.is_caller_fault());
    }

    #[test]
    fn backend_preserves_source() {
        let err = Error::backend("store", std::io::Error::other("disk full"));
        assert!(err.to_string().contains("store"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
