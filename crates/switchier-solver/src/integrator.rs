//! Time integration: BE bootstrap, BDF2 stepping, history rotation and
//! step rejection.

use nalgebra::DVector;
use switchier_devices::{Circuit, IntegrationMethod, StepLimits};

use crate::diagnostics::Diagnostic;
use crate::error::{Error, Result};
use crate::mcp::{self, McpConfig};

/// Integrator life-cycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegratorState {
    Uninitialized,
    Running,
    StepRejected,
    Diverged,
    Done,
}

/// Integrator tuning.
#[derive(Debug, Clone, Copy)]
pub struct IntegratorConfig {
    pub limits: StepLimits,
    pub mcp: McpConfig,
    /// Solution magnitude above which the run is declared diverged.
    pub max_solution_norm: f64,
    /// Consecutive halvings tolerated before declaring divergence.
    pub max_halvings: u32,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            limits: StepLimits::default(),
            mcp: McpConfig::default(),
            max_solution_norm: 1e12,
            max_halvings: 3,
        }
    }
}

/// Outcome of one attempted step.
#[derive(Debug, Clone)]
pub enum StepResult {
    /// The step was accepted and committed into element history.
    Accepted(DVector<f64>),
    /// An element vetoed the step; history is untouched. The controller
    /// halves h and retries.
    Rejected { element: String, reason: String },
}

/// Drives the step loop.
///
/// The first step after initialization uses Backward Euler (no n-2 history
/// exists). Later steps use BDF2 while h stays constant; whenever h
/// changes (event alignment or rejection) one BE step re-spaces the two
/// newest history slots before BDF2 resumes.
#[derive(Debug)]
pub struct TimeIntegrator {
    config: IntegratorConfig,
    state: IntegratorState,
    t: f64,
    last_accepted_h: Option<f64>,
    consecutive_rejections: u32,
}

impl TimeIntegrator {
    pub fn new(config: IntegratorConfig) -> Self {
        Self {
            config,
            state: IntegratorState::Uninitialized,
            t: 0.0,
            last_accepted_h: None,
            consecutive_rejections: 0,
        }
    }

    pub fn state(&self) -> IntegratorState {
        self.state
    }

    /// Current simulated time (end of the last accepted step).
    pub fn t(&self) -> f64 {
        self.t
    }

    pub fn mark_done(&mut self) {
        self.state = IntegratorState::Done;
    }

    /// Solve the consistent t = 0 operating point and seed every element's
    /// history from it.
    pub fn initialize(
        &mut self,
        circuit: &mut Circuit,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<DVector<f64>> {
        let x0 = mcp::solve_initial(circuit, &self.config.mcp, diagnostics)?;
        circuit.initialize(&x0);
        self.state = IntegratorState::Running;
        self.t = 0.0;
        self.last_accepted_h = None;
        self.consecutive_rejections = 0;
        Ok(x0)
    }

    /// Attempt one step of size `h` from the current time.
    ///
    /// On acceptance, history is rotated and the committed solution
    /// returned. On rejection, history is untouched and the caller is
    /// expected to retry with h/2; too many consecutive rejections turn
    /// into [`Error::Diverged`].
    pub fn step(
        &mut self,
        circuit: &mut Circuit,
        h: f64,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<StepResult> {
        debug_assert!(self.state == IntegratorState::Running
            || self.state == IntegratorState::StepRejected);

        let method = if self.last_accepted_h == Some(h) {
            IntegrationMethod::Bdf2
        } else {
            IntegrationMethod::BackwardEuler
        };
        let t_next = self.t + h;

        let report = match mcp::solve_step(circuit, method, h, t_next, &self.config.mcp, diagnostics)
        {
            Ok(report) => report,
            Err(e) => {
                self.state = IntegratorState::Diverged;
                return Err(e);
            }
        };
        let x = report.solution;

        if !x.iter().all(|v| v.is_finite()) || x.amax() > self.config.max_solution_norm {
            self.state = IntegratorState::Diverged;
            return Err(Error::Diverged {
                reason: format!("solution magnitude exceeded {:.1e}", self.config.max_solution_norm),
                at_time: t_next,
            });
        }

        if let Some(rejection) = circuit.check_step(&x, h, &self.config.limits) {
            self.consecutive_rejections += 1;
            if self.consecutive_rejections > self.config.max_halvings {
                self.state = IntegratorState::Diverged;
                return Err(Error::Diverged {
                    reason: format!(
                        "no progress after {} halvings ('{}': {})",
                        self.config.max_halvings, rejection.element, rejection.reason
                    ),
                    at_time: t_next,
                });
            }
            self.state = IntegratorState::StepRejected;
            return Ok(StepResult::Rejected {
                element: rejection.element,
                reason: rejection.reason,
            });
        }

        circuit.update_history(&x);
        self.t = t_next;
        self.last_accepted_h = Some(h);
        self.consecutive_rejections = 0;
        self.state = IntegratorState::Running;
        Ok(StepResult::Accepted(x))
    }
}
