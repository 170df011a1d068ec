//! Structured numerical diagnostics.
//!
//! Non-fatal numerical conditions are reported through a callback on the
//! controller (and mirrored to `log::warn!`) instead of being printed.

use switchier_devices::StampDiagnostic;

/// A non-fatal numerical warning raised during a transient run.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// A companion equivalent source grew suspiciously large relative to
    /// the step size.
    LargeEquivalentSource {
        element: String,
        magnitude: f64,
        at_time: f64,
    },
    /// The MCP kernel engaged (or escalated) damping across a cycling
    /// switch. Costs O(conductance) accuracy for the rest of the step.
    DampingEngaged {
        element: String,
        conductance: f64,
        at_time: f64,
    },
    /// A solved step was vetoed and will be retried with half the step.
    StepRejected {
        element: String,
        reason: String,
        at_time: f64,
        next_h: f64,
    },
}

impl Diagnostic {
    pub(crate) fn from_stamp(diag: StampDiagnostic, at_time: f64) -> Self {
        match diag {
            StampDiagnostic::LargeEquivalentSource { element, magnitude } => {
                Diagnostic::LargeEquivalentSource {
                    element,
                    magnitude,
                    at_time,
                }
            }
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::LargeEquivalentSource {
                element,
                magnitude,
                at_time,
            } => write!(
                f,
                "large equivalent source {:.3e} on '{}' at t = {:.6e} s",
                magnitude, element, at_time
            ),
            Diagnostic::DampingEngaged {
                element,
                conductance,
                at_time,
            } => write!(
                f,
                "damping {:.3e} S engaged on '{}' at t = {:.6e} s",
                conductance, element, at_time
            ),
            Diagnostic::StepRejected {
                element,
                reason,
                at_time,
                next_h,
            } => write!(
                f,
                "step at t = {:.6e} s rejected by '{}' ({}), retrying with h = {:.3e} s",
                at_time, element, reason, next_h
            ),
        }
    }
}
