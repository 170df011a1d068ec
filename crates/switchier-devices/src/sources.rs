//! Independent voltage and current sources.

use nalgebra::DVector;
use switchier_core::{MnaSystem, NodeId};

use crate::element::StampContext;
use crate::waveforms::Waveform;

/// Independent voltage source with a branch-current unknown.
///
/// The branch current flows from `pos` through the source to `neg`.
#[derive(Debug, Clone)]
pub struct VoltageSource {
    pub id: String,
    pub pos: NodeId,
    pub neg: NodeId,
    pub waveform: Waveform,
    /// Branch index during transient steps.
    pub branch: usize,
    /// Branch index during the t = 0 init solve.
    pub init_branch: usize,
}

impl VoltageSource {
    pub fn stamp(&self, mna: &mut MnaSystem, ctx: &StampContext) {
        mna.stamp_voltage_branch(
            self.branch,
            self.pos.mna_index(),
            self.neg.mna_index(),
            self.waveform.value_at(ctx.t),
        );
    }

    pub fn stamp_initial(&self, mna: &mut MnaSystem) {
        mna.stamp_voltage_branch(
            self.init_branch,
            self.pos.mna_index(),
            self.neg.mna_index(),
            self.waveform.value_at(0.0),
        );
    }

    pub fn current_from(&self, num_nodes: usize, x: &DVector<f64>) -> f64 {
        x[num_nodes + self.branch]
    }

    pub fn next_event_after(&self, t: f64) -> Option<f64> {
        self.waveform.next_breakpoint_after(t)
    }
}

/// Independent current source.
///
/// Drives its current from `pos` through the source into `neg`, matching
/// the SPICE convention for `I` cards.
#[derive(Debug, Clone)]
pub struct CurrentSource {
    pub id: String,
    pub pos: NodeId,
    pub neg: NodeId,
    pub waveform: Waveform,
}

impl CurrentSource {
    pub fn stamp(&self, mna: &mut MnaSystem, ctx: &StampContext) {
        mna.stamp_current_source(
            self.pos.mna_index(),
            self.neg.mna_index(),
            self.waveform.value_at(ctx.t),
        );
    }

    pub fn stamp_initial(&self, mna: &mut MnaSystem) {
        mna.stamp_current_source(
            self.pos.mna_index(),
            self.neg.mna_index(),
            self.waveform.value_at(0.0),
        );
    }

    pub fn next_event_after(&self, t: f64) -> Option<f64> {
        self.waveform.next_breakpoint_after(t)
    }
}
