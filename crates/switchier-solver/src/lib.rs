//! Transient solver for Switchier.
//!
//! The solver pipeline for switched-mode power circuits:
//!
//! - [`linear`] - dense/sparse LU, residual norms, condition estimate
//! - [`mcp`] - the Mixed Complementarity Problem switch kernel
//! - [`integrator`] - BE-bootstrapped BDF2 time stepping with history
//!   rotation and step rejection
//! - [`controller`] - the public `run()` driving a transient from t = 0 to
//!   t_end with event-aligned steps
//! - [`record`] - the waveform record with interpolation and decimation
//!
//! Each step assembles the MNA system from companion models, solves the
//! switch complementarity by mode pivoting, and commits the solution into
//! element history only when the step is accepted.

pub mod controller;
pub mod diagnostics;
pub mod error;
pub mod integrator;
pub mod linear;
pub mod mcp;
pub mod record;

pub use controller::{
    run_transient, CancelToken, FailureKind, RunOutcome, SolverFailure, TransientController,
    TransientParams,
};
pub use diagnostics::Diagnostic;
pub use error::{Error, Result};
pub use integrator::{IntegratorConfig, IntegratorState, StepResult, TimeIntegrator};
pub use mcp::McpConfig;
pub use record::WaveformRecord;
