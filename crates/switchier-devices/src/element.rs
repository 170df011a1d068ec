//! The tagged element variant and per-step dispatch surface.

use nalgebra::DVector;
use switchier_core::{MnaSystem, NodeId};

use crate::passive::{Capacitor, Inductor, Resistor};
use crate::sources::{CurrentSource, VoltageSource};
use crate::switch::{IdealDiode, Mosfet};

/// Companion-source magnitude above which a structured warning is emitted.
pub const LARGE_EQUIVALENT_SOURCE: f64 = 1e6;

/// Integration scheme selected for a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationMethod {
    /// First order, A-stable. Used for the bootstrap step and whenever the
    /// step size changed.
    BackwardEuler,
    /// Second order, A-stable, uniform-step coefficients (α = 1.5).
    Bdf2,
}

/// Structured diagnostic raised while stamping.
#[derive(Debug, Clone, PartialEq)]
pub enum StampDiagnostic {
    /// A companion equivalent source grew suspiciously large, which usually
    /// signals stiffness relative to the current step size.
    LargeEquivalentSource { element: String, magnitude: f64 },
}

/// Per-step stamping context handed to every element.
#[derive(Debug)]
pub struct StampContext<'a> {
    pub method: IntegrationMethod,
    /// Step size (s).
    pub h: f64,
    /// End-of-step time; implicit schemes evaluate sources here.
    pub t: f64,
    /// Diagnostic sink, present only on the first assembly of a step.
    pub diagnostics: Option<&'a mut Vec<StampDiagnostic>>,
}

impl StampContext<'_> {
    pub fn warn(&mut self, diagnostic: StampDiagnostic) {
        if let Some(sink) = self.diagnostics.as_deref_mut() {
            sink.push(diagnostic);
        }
    }
}

/// Plausibility limits applied to solved steps.
#[derive(Debug, Clone, Copy)]
pub struct StepLimits {
    /// Hard bound on any branch current magnitude (A).
    pub current_limit: f64,
    /// Safety factor on the per-step inductor current change.
    pub di_safety: f64,
}

impl Default for StepLimits {
    fn default() -> Self {
        Self {
            current_limit: 1e6,
            di_safety: 10.0,
        }
    }
}

/// An element's veto of a solved step.
#[derive(Debug, Clone)]
pub struct StepRejection {
    pub element: String,
    pub reason: String,
}

/// A circuit element.
///
/// Dispatch is a tagged variant with a `match` per operation rather than a
/// trait object, so the MCP kernel can reach switch state directly.
#[derive(Debug, Clone)]
pub enum Element {
    Resistor(Resistor),
    Capacitor(Capacitor),
    Inductor(Inductor),
    VoltageSource(VoltageSource),
    CurrentSource(CurrentSource),
    Mosfet(Mosfet),
    Diode(IdealDiode),
}

impl Element {
    pub fn id(&self) -> &str {
        match self {
            Element::Resistor(e) => &e.id,
            Element::Capacitor(e) => &e.id,
            Element::Inductor(e) => &e.id,
            Element::VoltageSource(e) => &e.id,
            Element::CurrentSource(e) => &e.id,
            Element::Mosfet(e) => &e.id,
            Element::Diode(e) => &e.id,
        }
    }

    pub fn nodes(&self) -> Vec<NodeId> {
        match self {
            Element::Resistor(e) => vec![e.pos, e.neg],
            Element::Capacitor(e) => vec![e.pos, e.neg],
            Element::Inductor(e) => vec![e.pos, e.neg],
            Element::VoltageSource(e) => vec![e.pos, e.neg],
            Element::CurrentSource(e) => vec![e.pos, e.neg],
            Element::Mosfet(e) => vec![e.drain, e.gate, e.source],
            Element::Diode(e) => vec![e.anode, e.cathode],
        }
    }

    /// Branch-current unknown index during transient steps, if this element
    /// owns one.
    pub fn step_branch(&self) -> Option<usize> {
        match self {
            Element::Inductor(e) => Some(e.branch),
            Element::VoltageSource(e) => Some(e.branch),
            Element::Mosfet(e) => Some(e.branch),
            Element::Diode(e) => Some(e.branch),
            _ => None,
        }
    }

    /// Stamp this element into a transient-step system.
    pub fn stamp(&self, mna: &mut MnaSystem, ctx: &mut StampContext) {
        match self {
            Element::Resistor(e) => e.stamp(mna),
            Element::Capacitor(e) => e.stamp(mna, ctx),
            Element::Inductor(e) => e.stamp(mna, ctx),
            Element::VoltageSource(e) => e.stamp(mna, ctx),
            Element::CurrentSource(e) => e.stamp(mna, ctx),
            Element::Mosfet(e) => e.stamp(mna),
            Element::Diode(e) => e.stamp(mna),
        }
    }

    /// Stamp this element into the t = 0 init system.
    pub fn stamp_initial(&self, mna: &mut MnaSystem) {
        match self {
            Element::Resistor(e) => e.stamp(mna),
            Element::Capacitor(e) => e.stamp_initial(mna),
            Element::Inductor(e) => e.stamp_initial(mna),
            Element::VoltageSource(e) => e.stamp_initial(mna),
            Element::CurrentSource(e) => e.stamp_initial(mna),
            Element::Mosfet(e) => e.stamp_initial(mna),
            Element::Diode(e) => e.stamp_initial(mna),
        }
    }

    /// Seed history from the init solution and element initial conditions.
    pub fn initialize(&mut self, x: &DVector<f64>) {
        match self {
            Element::Capacitor(e) => e.initialize(x),
            Element::Inductor(e) => e.initialize(),
            Element::Mosfet(e) => e.update_history(x),
            _ => {}
        }
    }

    /// Commit the solved step into history: (n-2) ← (n-1), (n-1) ← (n).
    pub fn update_history(&mut self, num_nodes: usize, x: &DVector<f64>) {
        match self {
            Element::Capacitor(e) => e.update_history(x),
            Element::Inductor(e) => e.update_history(num_nodes, x),
            Element::Mosfet(e) => e.update_history(x),
            _ => {}
        }
    }

    /// Element veto on a solved step, before commit.
    pub fn check_step(
        &self,
        num_nodes: usize,
        x: &DVector<f64>,
        h: f64,
        limits: &StepLimits,
    ) -> Option<StepRejection> {
        match self {
            Element::Inductor(e) => e.check_step(num_nodes, x, h, limits),
            _ => None,
        }
    }

    /// Next source breakpoint strictly after `t`, if this element has one.
    pub fn next_event_after(&self, t: f64) -> Option<f64> {
        match self {
            Element::VoltageSource(e) => e.next_event_after(t),
            Element::CurrentSource(e) => e.next_event_after(t),
            _ => None,
        }
    }
}
