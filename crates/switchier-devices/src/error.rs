//! Circuit construction and validation errors.

/// Errors raised while building or validating a circuit.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CircuitError {
    /// Two elements share the same id.
    #[error("duplicate element id '{0}'")]
    DuplicateElement(String),

    /// A component value that must be strictly positive is not.
    #[error("element '{id}': {param} must be positive, got {value}")]
    NonPositiveValue {
        id: String,
        param: &'static str,
        value: f64,
    },

    /// A node has no conductive path to the ground reference.
    #[error("node '{0}' has no path to ground")]
    FloatingNode(String),

    /// No element references the ground node.
    #[error("circuit has no connection to ground")]
    NoGround,
}

pub type Result<T> = std::result::Result<T, CircuitError>;
