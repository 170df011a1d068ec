//! Solver error taxonomy.
//!
//! The assembler and kernel surface errors upward without touching
//! committed history; the integrator decides whether to retry (step
//! rejection) or fail, and failures propagate to the controller.

/// Solver errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A pivot magnitude fell below the underflow threshold during LU.
    /// Usually a missing path to ground or a shorted voltage-source loop.
    #[error("matrix is singular (pivot underflow)")]
    SingularMatrix,

    /// Matrix/vector shapes disagree.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The MCP kernel exhausted its mode-flip budget within one step.
    #[error("MCP kernel did not converge at t = {at_time:.6e} s ({flips} mode flips)")]
    McpNotConverged { flips: usize, at_time: f64 },

    /// The step-size floor was reached without an accepted step, or the
    /// solution magnitude blew up.
    #[error("solver diverged at t = {at_time:.6e} s: {reason}")]
    Diverged { reason: String, at_time: f64 },

    /// The caller's cancel token was set.
    #[error("simulation cancelled at t = {at_time:.6e} s")]
    Cancelled { at_time: f64 },

    /// The circuit failed structural validation.
    #[error(transparent)]
    Circuit(#[from] switchier_devices::CircuitError),
}

pub type Result<T> = std::result::Result<T, Error>;
