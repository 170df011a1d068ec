//! Parser errors.

use switchier_devices::CircuitError;

/// Netlist parsing errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A line could not be parsed.
    #[error("parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    /// A recognized SPICE card this simulator does not support.
    #[error("unsupported element at line {line}: {card}")]
    UnsupportedElement { line: usize, card: String },

    /// The netlist has no `.TRAN` directive.
    #[error("netlist has no .TRAN directive")]
    MissingAnalysis,

    /// The lowered circuit failed construction or validation.
    #[error(transparent)]
    Circuit(#[from] CircuitError),
}

pub type Result<T> = std::result::Result<T, Error>;
