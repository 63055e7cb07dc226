/// Convenience result type used across recompose.
pub type RecomposeResult<T> = Result<T, RecomposeError>;

/// Top-level error taxonomy used by the pipeline stages.
///
/// Partial losses (unmatched layers, orphaned files, discarded variants) are never errors;
/// they are reported as [`crate::DiscrepancyRecord`] values instead.
#[derive(thiserror::Error, Debug)]
pub enum RecomposeError {
    /// A catalog entry violates its expected shape, or a reference names nothing.
    #[error("malformed input: {0}")]
    Malformed(String),

    /// The input admits more than one reading and none is chosen silently.
    #[error("ambiguous input: {0}")]
    Ambiguous(String),

    /// An external extraction or rendering call failed or returned unusable output.
    #[error("collaborator failure: {0}")]
    Collaborator(String),

    /// The resolved model is structurally inconsistent (a bug upstream of the failing stage).
    #[error("inconsistent model: {0}")]
    Inconsistent(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RecomposeError {
    /// Build a [`RecomposeError::Malformed`] value.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    /// Build the [`RecomposeError::Malformed`] value for a reference that names nothing.
    pub fn unresolved_reference(from: &str, target: &str) -> Self {
        Self::Malformed(format!(
            "unresolvable reference: '{from}' refers to unknown color or gradient '{target}'"
        ))
    }

    /// Build a [`RecomposeError::Ambiguous`] value.
    pub fn ambiguous(msg: impl Into<String>) -> Self {
        Self::Ambiguous(msg.into())
    }

    /// Build a [`RecomposeError::Collaborator`] value.
    pub fn collaborator(msg: impl Into<String>) -> Self {
        Self::Collaborator(msg.into())
    }

    /// Build a [`RecomposeError::Inconsistent`] value.
    pub fn inconsistent(msg: impl Into<String>) -> Self {
        Self::Inconsistent(msg.into())
    }

    /// Build a [`RecomposeError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

impl From<serde_json::Error> for RecomposeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
