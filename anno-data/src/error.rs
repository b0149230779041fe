use thiserror::Error;

/// Failures of the annotated container
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnnError {
    /// A named entry (layer, attribute, graph, ...) does not exist
    #[error("no {kind} named `{key}`")]
    MissingKey { kind: &'static str, key: String },

    /// Arguments that cannot be satisfied together
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An assignment whose length or shape does not line up with the
    /// container
    #[error("{what}: expected {expected}, found {found}")]
    ShapeMismatch {
        what: String,
        expected: String,
        found: String,
    },
}

impl AnnError {
    pub fn missing(kind: &'static str, key: &str) -> Self {
        AnnError::MissingKey {
            kind,
            key: key.to_string(),
        }
    }

    pub fn shape(what: &str, expected: impl ToString, found: impl ToString) -> Self {
        AnnError::ShapeMismatch {
            what: what.to_string(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}
