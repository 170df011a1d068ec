//! Transient controller: schedules steps from t = 0 to t_end, aligns them
//! with source breakpoints, records samples and returns a structured
//! outcome.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use switchier_devices::Circuit;

use crate::diagnostics::Diagnostic;
use crate::error::Error;
use crate::integrator::{IntegratorConfig, StepResult, TimeIntegrator};
use crate::record::WaveformRecord;

/// Cooperative cancellation handle, checked once per step.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::Relaxed)
    }
}

/// Failure classification mirrored into the result record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    MalformedCircuit,
    SingularMatrix,
    McpNotConverged,
    Diverged,
    Cancelled,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::MalformedCircuit => "MalformedCircuit",
            FailureKind::SingularMatrix => "SingularMatrix",
            FailureKind::McpNotConverged => "MCPDidNotConverge",
            FailureKind::Diverged => "Diverged",
            FailureKind::Cancelled => "Cancelled",
        }
    }
}

/// A failed run's classification, message and time.
#[derive(Debug, Clone)]
pub struct SolverFailure {
    pub kind: FailureKind,
    pub message: String,
    pub at_time: f64,
}

impl SolverFailure {
    fn from_error(error: &Error, fallback_time: f64) -> Self {
        let (kind, at_time) = match error {
            Error::SingularMatrix => (FailureKind::SingularMatrix, fallback_time),
            Error::DimensionMismatch { .. } => (FailureKind::Diverged, fallback_time),
            Error::McpNotConverged { at_time, .. } => (FailureKind::McpNotConverged, *at_time),
            Error::Diverged { at_time, .. } => (FailureKind::Diverged, *at_time),
            Error::Cancelled { at_time } => (FailureKind::Cancelled, *at_time),
            Error::Circuit(_) => (FailureKind::MalformedCircuit, fallback_time),
        };
        Self {
            kind,
            message: error.to_string(),
            at_time,
        }
    }
}

/// Result of a transient run: the record plus success/error status.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub success: bool,
    pub record: WaveformRecord,
    pub error: Option<SolverFailure>,
}

/// Transient run parameters.
#[derive(Debug, Clone)]
pub struct TransientParams {
    /// Nominal step size (s); steps shrink only for event alignment,
    /// the final step, or rejection retries.
    pub h_nominal: f64,
    /// End of the simulated interval (s).
    pub t_end: f64,
    pub integrator: IntegratorConfig,
    /// Record size bound before decimation engages.
    pub max_samples: usize,
    pub cancel: Option<CancelToken>,
}

impl TransientParams {
    pub fn new(h_nominal: f64, t_end: f64) -> Self {
        Self {
            h_nominal,
            t_end,
            integrator: IntegratorConfig::default(),
            max_samples: 1_000_000,
            cancel: None,
        }
    }
}

/// Owns one transient run: integrator, record and diagnostic fan-out.
///
/// Diagnostics go to the configured sink (and `log::warn!`); nothing is
/// printed.
pub struct TransientController<'a> {
    params: TransientParams,
    on_diagnostic: Option<Box<dyn FnMut(&Diagnostic) + 'a>>,
}

impl<'a> TransientController<'a> {
    pub fn new(params: TransientParams) -> Self {
        Self {
            params,
            on_diagnostic: None,
        }
    }

    /// Attach a structured-diagnostic callback.
    pub fn with_diagnostic_sink(mut self, sink: impl FnMut(&Diagnostic) + 'a) -> Self {
        self.on_diagnostic = Some(Box::new(sink));
        self
    }

    fn emit(&mut self, diagnostics: &mut Vec<Diagnostic>) {
        for diagnostic in diagnostics.drain(..) {
            log::warn!("{}", diagnostic);
            if let Some(sink) = self.on_diagnostic.as_mut() {
                sink(&diagnostic);
            }
        }
    }

    /// Run the transient from t = 0 to t_end.
    pub fn run(&mut self, circuit: &mut Circuit) -> RunOutcome {
        let mut record = WaveformRecord::new(circuit.signal_names(), self.params.max_samples);

        if let Err(e) = circuit.validate() {
            let error = Error::from(e);
            return RunOutcome {
                success: false,
                record,
                error: Some(SolverFailure::from_error(&error, 0.0)),
            };
        }

        let mut integrator = TimeIntegrator::new(self.params.integrator);
        let mut diagnostics: Vec<Diagnostic> = Vec::new();

        let x0 = match integrator.initialize(circuit, &mut diagnostics) {
            Ok(x0) => x0,
            Err(e) => {
                self.emit(&mut diagnostics);
                return RunOutcome {
                    success: false,
                    record,
                    error: Some(SolverFailure::from_error(&e, 0.0)),
                };
            }
        };
        self.emit(&mut diagnostics);
        record.push(0.0, circuit.snapshot_init(&x0));

        let t_end = self.params.t_end;
        let h_nominal = self.params.h_nominal;
        let t_eps = h_nominal * 1e-9;

        if t_end <= 0.0 {
            integrator.mark_done();
            return RunOutcome {
                success: true,
                record,
                error: None,
            };
        }

        while integrator.t() < t_end - t_eps {
            if let Some(token) = &self.params.cancel {
                if token.is_cancelled() {
                    let error = Error::Cancelled {
                        at_time: integrator.t(),
                    };
                    return RunOutcome {
                        success: false,
                        record,
                        error: Some(SolverFailure::from_error(&error, integrator.t())),
                    };
                }
            }

            let t = integrator.t();
            let mut h = h_nominal.min(t_end - t);
            // Shorten (or nudge) the step to land exactly on the next
            // source breakpoint.
            if let Some(edge) = circuit.next_event_after(t) {
                if edge > t + t_eps && edge <= t + h + t_eps && edge < t_end - t_eps {
                    h = edge - t;
                }
            }

            loop {
                match integrator.step(circuit, h, &mut diagnostics) {
                    Ok(StepResult::Accepted(x)) => {
                        record.push(integrator.t(), circuit.snapshot_step(&x));
                        self.emit(&mut diagnostics);
                        break;
                    }
                    Ok(StepResult::Rejected { element, reason }) => {
                        h *= 0.5;
                        diagnostics.push(Diagnostic::StepRejected {
                            element,
                            reason,
                            at_time: t,
                            next_h: h,
                        });
                        self.emit(&mut diagnostics);
                    }
                    Err(e) => {
                        self.emit(&mut diagnostics);
                        return RunOutcome {
                            success: false,
                            record,
                            error: Some(SolverFailure::from_error(&e, t)),
                        };
                    }
                }
            }
        }

        integrator.mark_done();
        RunOutcome {
            success: true,
            record,
            error: None,
        }
    }
}

/// Convenience wrapper: run a transient with no diagnostic sink.
pub fn run_transient(circuit: &mut Circuit, params: TransientParams) -> RunOutcome {
    TransientController::new(params).run(circuit)
}
