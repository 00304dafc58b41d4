use crate::repositories::StoreError;

/// Failure taxonomy shared by every workflow operation. Email transport
/// failures are not part of it: they are absorbed by the dispatcher.
#[derive(Debug, thiserror::Error)]
pub(crate) enum WorkflowError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{context}: {source}")]
    Persistence {
        context: &'static str,
        #[source]
        source: StoreError,
    },
}

impl WorkflowError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub(crate) fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub(crate) fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::Conflict(_) => "conflict",
            Self::Persistence { .. } => "persistence_error",
        }
    }
}

/// Attaches a short description of the failed storage call.
pub(crate) trait StoreResultExt<T> {
    fn persistence(self, context: &'static str) -> Result<T, WorkflowError>;
}

impl<T> StoreResultExt<T> for Result<T, StoreError> {
    fn persistence(self, context: &'static str) -> Result<T, WorkflowError> {
        self.map_err(|source| WorkflowError::Persistence { context, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(WorkflowError::validation("x").kind(), "validation_error");
        assert_eq!(WorkflowError::not_found("x").kind(), "not_found");
        assert_eq!(WorkflowError::forbidden("x").kind(), "forbidden");
        assert_eq!(WorkflowError::conflict("x").kind(), "conflict");

        let err: Result<(), _> =
            Err(StoreError::Unavailable("down".to_string())).persistence("Failed to load user");
        let err = err.unwrap_err();
        assert_eq!(err.kind(), "persistence_error");
        assert_eq!(err.to_string(), "Failed to load user: store unavailable: down");
    }
}
