use thiserror::Error;

/// Errors raised by collaborators.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Optimistic concurrency conflict: the version supplied on save no
    /// longer matches the stored one. Safe to retry after a fresh fetch.
    #[error("Concurrency conflict: expected version {expected}, found {actual}")]
    Conflict { expected: String, actual: String },

    /// The state handed to `save` names no instance to store it under.
    #[error("Missing identity: {0}")]
    MissingIdentity(String),

    /// The backing store could not be reached or refused the operation.
    #[error("Repository unavailable: {0}")]
    Unavailable(String),

    /// The collaborator panicked mid-call.
    #[error("Collaborator panicked: {0}")]
    Panicked(String),

    /// Any other collaborator failure.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl RepositoryError {
    /// Builds a conflict error from the expected and actual versions.
    pub fn conflict(
        expected: Option<&impl std::fmt::Display>,
        actual: Option<&impl std::fmt::Display>,
    ) -> Self {
        let render = |version: Option<String>| version.unwrap_or_else(|| "none".to_string());
        RepositoryError::Conflict {
            expected: render(expected.map(ToString::to_string)),
            actual: render(actual.map(ToString::to_string)),
        }
    }

    /// Returns true for the optimistic-locking conflict case.
    pub fn is_conflict(&self) -> bool {
        matches!(self, RepositoryError::Conflict { .. })
    }
}

/// Result type for collaborator operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;
