//! Model error type.

/// Error raised by a failed node refresh.
///
/// The node state machine does not distinguish failure causes beyond the
/// message; both variants flip the node to the error load state and leave
/// previously loaded data untouched. Cloneable so every caller joined on a
/// single in-flight refresh receives the same outcome.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    /// Transport or server-side failure fetching remote data.
    #[error("fetch failed: {0}")]
    Fetch(String),
    /// The remote payload did not have the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),
}
