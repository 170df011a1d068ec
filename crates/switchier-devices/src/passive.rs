//! Passive elements: resistor, capacitor, inductor.
//!
//! The reactive elements own their two history slots (n-1 and n-2) and are
//! replaced each step by a companion equivalent whose conductance depends on
//! the integration scheme and the step size. History rotates only on step
//! commit; a rejected step leaves it untouched.

use nalgebra::DVector;
use switchier_core::{MnaSystem, NodeId};

use crate::element::{
    IntegrationMethod, StampContext, StampDiagnostic, StepLimits, StepRejection,
    LARGE_EQUIVALENT_SOURCE,
};

fn voltage_across(x: &DVector<f64>, pos: NodeId, neg: NodeId) -> f64 {
    let vp = pos.mna_index().map(|i| x[i]).unwrap_or(0.0);
    let vn = neg.mna_index().map(|i| x[i]).unwrap_or(0.0);
    vp - vn
}

/// Linear resistor.
#[derive(Debug, Clone)]
pub struct Resistor {
    pub id: String,
    pub pos: NodeId,
    pub neg: NodeId,
    /// Resistance (Ω), strictly positive.
    pub resistance: f64,
}

impl Resistor {
    pub fn stamp(&self, mna: &mut MnaSystem) {
        mna.stamp_conductance(self.pos.mna_index(), self.neg.mna_index(), 1.0 / self.resistance);
    }
}

/// Capacitor with node-voltage companion model.
#[derive(Debug, Clone)]
pub struct Capacitor {
    pub id: String,
    pub pos: NodeId,
    pub neg: NodeId,
    /// Capacitance (F), strictly positive.
    pub capacitance: f64,
    /// Initial voltage (V).
    pub ic: f64,
    /// Voltage at the previous accepted step.
    pub v_prev: f64,
    /// Voltage two accepted steps ago.
    pub v_prev2: f64,
    /// Branch index used only by the t = 0 init solve, where the capacitor
    /// is pinned to its initial voltage.
    pub init_branch: usize,
}

impl Capacitor {
    /// Norton companion stamp.
    ///
    /// BE:   G = C/h,    I_eq = (C/h)·v[n-1]
    /// BDF2: G = 1.5C/h, I_eq = (C/h)·(2·v[n-1] − 0.5·v[n-2])
    pub fn stamp(&self, mna: &mut MnaSystem, ctx: &mut StampContext) {
        let c_h = self.capacitance / ctx.h;
        let (geq, ieq) = match ctx.method {
            IntegrationMethod::BackwardEuler => (c_h, c_h * self.v_prev),
            IntegrationMethod::Bdf2 => (1.5 * c_h, c_h * (2.0 * self.v_prev - 0.5 * self.v_prev2)),
        };
        if ieq.abs() > LARGE_EQUIVALENT_SOURCE {
            ctx.warn(StampDiagnostic::LargeEquivalentSource {
                element: self.id.clone(),
                magnitude: ieq,
            });
        }
        mna.stamp_conductance(self.pos.mna_index(), self.neg.mna_index(), geq);
        // I_eq charges the positive node.
        mna.stamp_current_source(self.neg.mna_index(), self.pos.mna_index(), ieq);
    }

    /// Init-solve stamp: the capacitor holds its initial voltage exactly.
    pub fn stamp_initial(&self, mna: &mut MnaSystem) {
        mna.stamp_voltage_branch(
            self.init_branch,
            self.pos.mna_index(),
            self.neg.mna_index(),
            self.ic,
        );
    }

    pub fn voltage_from(&self, x: &DVector<f64>) -> f64 {
        voltage_across(x, self.pos, self.neg)
    }

    /// Seed both history slots from the init solution.
    pub fn initialize(&mut self, x: &DVector<f64>) {
        let v = self.voltage_from(x);
        self.v_prev = v;
        self.v_prev2 = v;
    }

    /// Rotate history: (n-2) ← (n-1), (n-1) ← (n).
    pub fn update_history(&mut self, x: &DVector<f64>) {
        self.v_prev2 = self.v_prev;
        self.v_prev = self.voltage_from(x);
    }
}

/// Inductor with a branch-current unknown.
#[derive(Debug, Clone)]
pub struct Inductor {
    pub id: String,
    pub pos: NodeId,
    pub neg: NodeId,
    /// Inductance (H), strictly positive.
    pub inductance: f64,
    /// Initial current (A), flowing pos → neg.
    pub ic: f64,
    /// Current at the previous accepted step.
    pub i_prev: f64,
    /// Current two accepted steps ago.
    pub i_prev2: f64,
    /// Branch-current unknown index (transient steps).
    pub branch: usize,
}

impl Inductor {
    /// Branch-equation companion stamp.
    ///
    /// BE:   −v_L + (L/h)·i[n]    = (L/h)·i[n-1]
    /// BDF2: −v_L + (1.5L/h)·i[n] = (L/h)·(2·i[n-1] − 0.5·i[n-2])
    pub fn stamp(&self, mna: &mut MnaSystem, ctx: &mut StampContext) {
        let l_h = self.inductance / ctx.h;
        let (alpha, rhs) = match ctx.method {
            IntegrationMethod::BackwardEuler => (1.0, l_h * self.i_prev),
            IntegrationMethod::Bdf2 => (1.5, l_h * (2.0 * self.i_prev - 0.5 * self.i_prev2)),
        };
        if rhs.abs() > LARGE_EQUIVALENT_SOURCE {
            ctx.warn(StampDiagnostic::LargeEquivalentSource {
                element: self.id.clone(),
                magnitude: rhs,
            });
        }
        let br = mna.branch_row(self.branch);
        // KCL: the branch current leaves pos and enters neg.
        if let Some(p) = self.pos.mna_index() {
            mna.add_matrix(p, br, 1.0);
            mna.add_matrix(br, p, -1.0);
        }
        if let Some(n) = self.neg.mna_index() {
            mna.add_matrix(n, br, -1.0);
            mna.add_matrix(br, n, 1.0);
        }
        mna.add_matrix(br, br, alpha * l_h);
        mna.add_rhs(br, rhs);
    }

    /// Init-solve stamp: the inductor is a fixed current source at its
    /// initial current.
    pub fn stamp_initial(&self, mna: &mut MnaSystem) {
        mna.stamp_current_source(self.pos.mna_index(), self.neg.mna_index(), self.ic);
    }

    pub fn voltage_from(&self, x: &DVector<f64>) -> f64 {
        voltage_across(x, self.pos, self.neg)
    }

    pub fn current_from(&self, mna_nodes: usize, x: &DVector<f64>) -> f64 {
        x[mna_nodes + self.branch]
    }

    /// Seed both history slots from the initial current.
    pub fn initialize(&mut self) {
        self.i_prev = self.ic;
        self.i_prev2 = self.ic;
    }

    pub fn update_history(&mut self, num_nodes: usize, x: &DVector<f64>) {
        self.i_prev2 = self.i_prev;
        self.i_prev = self.current_from(num_nodes, x);
    }

    /// Plausibility check on the solved step.
    ///
    /// Rejects non-finite currents, currents beyond the configured limit,
    /// and step-to-step changes inconsistent with v_L·h/L (within the
    /// safety factor; the n-1/n-2 history difference covers the BDF2 term).
    pub fn check_step(
        &self,
        num_nodes: usize,
        x: &DVector<f64>,
        h: f64,
        limits: &StepLimits,
    ) -> Option<StepRejection> {
        let i_new = self.current_from(num_nodes, x);
        if !i_new.is_finite() {
            return Some(StepRejection {
                element: self.id.clone(),
                reason: "non-finite inductor current".to_string(),
            });
        }
        if i_new.abs() > limits.current_limit {
            return Some(StepRejection {
                element: self.id.clone(),
                reason: format!("inductor current {:.3e} A beyond limit", i_new),
            });
        }
        let v_l = self.voltage_from(x);
        let di = (i_new - self.i_prev).abs();
        let bound = limits.di_safety
            * (v_l.abs() * h / self.inductance + (self.i_prev - self.i_prev2).abs() + 1e-12);
        if di > bound {
            return Some(StepRejection {
                element: self.id.clone(),
                reason: format!("inductor current changed by {:.3e} A in one step", di),
            });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::StampContext;

    fn ctx(method: IntegrationMethod, h: f64) -> StampContext<'static> {
        StampContext {
            method,
            h,
            t: 0.0,
            diagnostics: None,
        }
    }

    #[test]
    fn test_capacitor_companion_be() {
        let cap = Capacitor {
            id: "C1".to_string(),
            pos: NodeId::new(1),
            neg: NodeId::GROUND,
            capacitance: 1e-6,
            ic: 0.0,
            v_prev: 2.5,
            v_prev2: 0.0,
            init_branch: 0,
        };
        let mut mna = MnaSystem::new(1, 0);
        cap.stamp(&mut mna, &mut ctx(IntegrationMethod::BackwardEuler, 1e-6));
        let m = mna.to_dense_matrix();
        // Geq = C/h = 1.0, Ieq = Geq * v_prev = 2.5
        assert!((m[(0, 0)] - 1.0).abs() < 1e-12, "Geq = {}", m[(0, 0)]);
        assert!((mna.rhs()[0] - 2.5).abs() < 1e-12, "Ieq = {}", mna.rhs()[0]);
    }

    #[test]
    fn test_capacitor_companion_bdf2() {
        let cap = Capacitor {
            id: "C1".to_string(),
            pos: NodeId::new(1),
            neg: NodeId::GROUND,
            capacitance: 2e-6,
            ic: 0.0,
            v_prev: 1.0,
            v_prev2: 0.5,
            init_branch: 0,
        };
        let mut mna = MnaSystem::new(1, 0);
        cap.stamp(&mut mna, &mut ctx(IntegrationMethod::Bdf2, 1e-6));
        let m = mna.to_dense_matrix();
        // Geq = 1.5*C/h = 3.0, Ieq = C/h * (2*1.0 - 0.5*0.5) = 2.0 * 1.75
        assert!((m[(0, 0)] - 3.0).abs() < 1e-12);
        assert!((mna.rhs()[0] - 3.5).abs() < 1e-12);
    }

    #[test]
    fn test_inductor_branch_row_be() {
        let ind = Inductor {
            id: "L1".to_string(),
            pos: NodeId::new(1),
            neg: NodeId::GROUND,
            inductance: 150e-6,
            ic: 0.0,
            i_prev: 2.0,
            i_prev2: 0.0,
            branch: 0,
        };
        let mut mna = MnaSystem::new(1, 1);
        ind.stamp(&mut mna, &mut ctx(IntegrationMethod::BackwardEuler, 1e-6));
        let m = mna.to_dense_matrix();
        let l_h = 150.0;
        assert!((m[(1, 1)] - l_h).abs() < 1e-9);
        assert_eq!(m[(0, 1)], 1.0);
        assert_eq!(m[(1, 0)], -1.0);
        assert!((mna.rhs()[1] - l_h * 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_inductor_check_rejects_blowup() {
        let ind = Inductor {
            id: "L1".to_string(),
            pos: NodeId::new(1),
            neg: NodeId::GROUND,
            inductance: 1e-3,
            ic: 0.0,
            i_prev: 0.0,
            i_prev2: 0.0,
            branch: 0,
        };
        // Solution claims 5 A after one step while v_L is only 1 V:
        // di bound = 10 * (1 * 1e-6 / 1e-3) = 1e-2 A.
        let x = DVector::from_vec(vec![1.0, 5.0]);
        let rejection = ind.check_step(1, &x, 1e-6, &StepLimits::default());
        assert!(rejection.is_some());

        // A consistent BE update passes: di = v*h/L.
        let x = DVector::from_vec(vec![1.0, 1e-3]);
        assert!(ind.check_step(1, &x, 1e-6, &StepLimits::default()).is_none());
    }

    #[test]
    fn test_history_rotation() {
        let mut cap = Capacitor {
            id: "C1".to_string(),
            pos: NodeId::new(1),
            neg: NodeId::GROUND,
            capacitance: 1e-6,
            ic: 0.0,
            v_prev: 1.0,
            v_prev2: 0.5,
            init_branch: 0,
        };
        let x = DVector::from_vec(vec![2.0]);
        cap.update_history(&x);
        assert_eq!(cap.v_prev, 2.0);
        assert_eq!(cap.v_prev2, 1.0);
    }
}
