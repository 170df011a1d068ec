//! Switching devices: the MCP MOSFET (ideal and smoothed variants) and the
//! ideal diode.
//!
//! Both switch kinds carry an auxiliary branch-current unknown. The branch
//! constitutive row depends on the conducting/blocking mode; the MCP kernel
//! owns mode selection, flip counting and damping escalation, while the
//! element owns its mode as warm-start state across steps.

use nalgebra::DVector;
use switchier_core::{MnaSystem, NodeId};

/// Initial damping conductance across a cycling switch (S).
pub const DAMPING_SEED: f64 = 1e-6;

/// Leakage conductance across switch channels during the t = 0 init solve
/// only. Without it a node bounded by blocking switches and an inductor
/// (a current source at init) has no defined potential. Transient steps
/// carry no leakage, so a blocking branch is exactly zero current.
pub const GMIN_INIT: f64 = 1e-9;

/// Conduction state of a switch branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchMode {
    /// Zero voltage drop (up to Ron), any current.
    Conducting,
    /// Zero current, any blocking voltage.
    Blocking,
}

impl SwitchMode {
    pub fn flipped(self) -> Self {
        match self {
            SwitchMode::Conducting => SwitchMode::Blocking,
            SwitchMode::Blocking => SwitchMode::Conducting,
        }
    }
}

/// MOSFET channel model selection.
///
/// Which variant applies is an explicit per-element configuration, never
/// inferred from parameter names.
#[derive(Debug, Clone, Copy)]
pub enum MosfetModel {
    /// Ideal switch: complementarity branch with gate-threshold pinning.
    Ideal { vth: f64, ron: f64 },
    /// Smoothed square-law channel `i = β·(v_gs − Vt)²`, Newton-linearized.
    Smoothed { beta: f64, vt: f64 },
}

/// Power MOSFET with drain/gate/source terminals.
#[derive(Debug, Clone)]
pub struct Mosfet {
    pub id: String,
    pub drain: NodeId,
    pub gate: NodeId,
    pub source: NodeId,
    pub model: MosfetModel,
    /// Gate hysteresis band width as a fraction of Vth.
    pub hysteresis: f64,
    /// Branch-current unknown index (transient steps).
    pub branch: usize,
    /// Branch index during the t = 0 init solve.
    pub init_branch: usize,
    /// Current mode; survives steps as the warm-start hint.
    pub mode: SwitchMode,
    /// Mode forced by the gate drive for the current step, if any.
    pub pinned: Option<SwitchMode>,
    /// Mode flips within the current step.
    pub flip_count: u32,
    /// Damping conductance across drain-source, 0 when disengaged.
    pub g_damp: f64,
    /// Gate-source voltage from the last committed solution.
    pub v_gs_prev: f64,
    /// Linearization point for the smoothed variant.
    pub op_v_gs: f64,
    pub op_v_ds: f64,
}

impl Mosfet {
    /// Mode the stamp will use: gate pinning wins over the kernel's choice.
    pub fn effective_mode(&self) -> SwitchMode {
        self.pinned.unwrap_or(self.mode)
    }

    /// Whether the MCP kernel may flip this switch.
    pub fn is_free(&self) -> bool {
        matches!(self.model, MosfetModel::Ideal { .. }) && self.pinned.is_none()
    }

    /// Start-of-step bookkeeping: reset flip/damping state and derive the
    /// gate pin from the previously committed v_gs.
    pub fn begin_step(&mut self) {
        self.flip_count = 0;
        self.g_damp = 0.0;
        self.refresh_pin(self.v_gs_prev);
    }

    /// Recompute the gate pin from a gate-source voltage.
    ///
    /// Below Vth the device is forced blocking; above Vth·(1 + hysteresis)
    /// it is forced conducting; inside the band the MCP kernel selects.
    pub fn refresh_pin(&mut self, v_gs: f64) {
        self.pinned = match self.model {
            MosfetModel::Ideal { vth, .. } => {
                if v_gs < vth {
                    Some(SwitchMode::Blocking)
                } else if v_gs > vth * (1.0 + self.hysteresis) {
                    Some(SwitchMode::Conducting)
                } else {
                    None
                }
            }
            MosfetModel::Smoothed { .. } => None,
        };
        if let Some(mode) = self.pinned {
            self.mode = mode;
        }
    }

    pub fn stamp(&self, mna: &mut MnaSystem) {
        self.stamp_branch(mna, self.branch);
    }

    pub fn stamp_initial(&self, mna: &mut MnaSystem) {
        self.stamp_branch(mna, self.init_branch);
        mna.stamp_conductance(self.drain.mna_index(), self.source.mna_index(), GMIN_INIT);
    }

    fn stamp_branch(&self, mna: &mut MnaSystem, branch: usize) {
        let br = mna.branch_row(branch);
        let d = self.drain.mna_index();
        let s = self.source.mna_index();
        let g = self.gate.mna_index();

        // KCL: i_ds leaves the drain and enters the source.
        if let Some(d) = d {
            mna.add_matrix(d, br, 1.0);
        }
        if let Some(s) = s {
            mna.add_matrix(s, br, -1.0);
        }

        match self.model {
            MosfetModel::Ideal { ron, .. } => match self.effective_mode() {
                SwitchMode::Conducting => {
                    // v_ds − Ron·i_ds = 0
                    if let Some(d) = d {
                        mna.add_matrix(br, d, 1.0);
                    }
                    if let Some(s) = s {
                        mna.add_matrix(br, s, -1.0);
                    }
                    mna.add_matrix(br, br, -ron);
                }
                SwitchMode::Blocking => {
                    // i_ds = 0
                    mna.add_matrix(br, br, 1.0);
                }
            },
            MosfetModel::Smoothed { beta, vt } => {
                // Linearized square law around the stored operating point:
                // i_ds − gm·v_gs = i0 − gm·v_gs0. Reverse-biased or cutoff
                // operating points collapse to i_ds = 0.
                let overdrive = self.op_v_gs - vt;
                if overdrive > 0.0 && self.op_v_ds >= 0.0 {
                    let i0 = beta * overdrive * overdrive;
                    let gm = 2.0 * beta * overdrive;
                    mna.add_matrix(br, br, 1.0);
                    if let Some(g) = g {
                        mna.add_matrix(br, g, -gm);
                    }
                    if let Some(s) = s {
                        mna.add_matrix(br, s, gm);
                    }
                    mna.add_rhs(br, i0 - gm * self.op_v_gs);
                } else {
                    mna.add_matrix(br, br, 1.0);
                }
            }
        }

        if self.g_damp > 0.0 {
            mna.stamp_conductance(d, s, self.g_damp);
        }
    }

    pub fn v_ds_from(&self, x: &DVector<f64>) -> f64 {
        let vd = self.drain.mna_index().map(|i| x[i]).unwrap_or(0.0);
        let vs = self.source.mna_index().map(|i| x[i]).unwrap_or(0.0);
        vd - vs
    }

    pub fn v_gs_from(&self, x: &DVector<f64>) -> f64 {
        let vg = self.gate.mna_index().map(|i| x[i]).unwrap_or(0.0);
        let vs = self.source.mna_index().map(|i| x[i]).unwrap_or(0.0);
        vg - vs
    }

    pub fn current_from(&self, num_nodes: usize, x: &DVector<f64>) -> f64 {
        x[num_nodes + self.branch]
    }

    /// Complementarity feasibility of the solved point under the current
    /// mode. Only meaningful for free (in-band ideal) switches.
    pub fn is_feasible(&self, num_nodes: usize, x: &DVector<f64>, eps_i: f64, eps_v: f64) -> bool {
        match self.mode {
            SwitchMode::Conducting => self.current_from(num_nodes, x) >= -eps_i,
            SwitchMode::Blocking => self.v_ds_from(x) <= eps_v,
        }
    }

    pub fn flip(&mut self) {
        self.mode = self.mode.flipped();
        self.flip_count += 1;
    }

    /// Engage or escalate drain-source damping.
    pub fn engage_damping(&mut self) -> f64 {
        self.g_damp = if self.g_damp == 0.0 {
            DAMPING_SEED
        } else {
            self.g_damp * 2.0
        };
        self.g_damp
    }

    /// Update the smoothed linearization point; returns true when the point
    /// moved by more than `tol` (another Newton pass is needed).
    pub fn relinearize(&mut self, x: &DVector<f64>, tol: f64) -> bool {
        if !matches!(self.model, MosfetModel::Smoothed { .. }) {
            return false;
        }
        let v_gs = self.v_gs_from(x);
        let v_ds = self.v_ds_from(x);
        let moved = (v_gs - self.op_v_gs).abs() > tol || (v_ds >= 0.0) != (self.op_v_ds >= 0.0);
        self.op_v_gs = v_gs;
        self.op_v_ds = v_ds;
        moved
    }

    pub fn update_history(&mut self, x: &DVector<f64>) {
        self.v_gs_prev = self.v_gs_from(x);
        self.op_v_gs = self.v_gs_from(x);
        self.op_v_ds = self.v_ds_from(x);
    }
}

/// Ideal diode: the bare complementarity branch.
///
/// Conducts anode → cathode with zero drop; blocks with zero current for
/// any negative anode-cathode voltage. Mode selection is entirely the MCP
/// kernel's.
#[derive(Debug, Clone)]
pub struct IdealDiode {
    pub id: String,
    pub anode: NodeId,
    pub cathode: NodeId,
    pub branch: usize,
    pub init_branch: usize,
    pub mode: SwitchMode,
    pub flip_count: u32,
    pub g_damp: f64,
}

impl IdealDiode {
    pub fn begin_step(&mut self) {
        self.flip_count = 0;
        self.g_damp = 0.0;
    }

    pub fn stamp(&self, mna: &mut MnaSystem) {
        self.stamp_branch(mna, self.branch);
    }

    pub fn stamp_initial(&self, mna: &mut MnaSystem) {
        self.stamp_branch(mna, self.init_branch);
        mna.stamp_conductance(self.anode.mna_index(), self.cathode.mna_index(), GMIN_INIT);
    }

    fn stamp_branch(&self, mna: &mut MnaSystem, branch: usize) {
        let br = mna.branch_row(branch);
        let a = self.anode.mna_index();
        let k = self.cathode.mna_index();

        if let Some(a) = a {
            mna.add_matrix(a, br, 1.0);
        }
        if let Some(k) = k {
            mna.add_matrix(k, br, -1.0);
        }

        match self.mode {
            SwitchMode::Conducting => {
                // v_ak = 0
                if let Some(a) = a {
                    mna.add_matrix(br, a, 1.0);
                }
                if let Some(k) = k {
                    mna.add_matrix(br, k, -1.0);
                }
            }
            SwitchMode::Blocking => {
                // i = 0
                mna.add_matrix(br, br, 1.0);
            }
        }

        if self.g_damp > 0.0 {
            mna.stamp_conductance(a, k, self.g_damp);
        }
    }

    pub fn voltage_from(&self, x: &DVector<f64>) -> f64 {
        let va = self.anode.mna_index().map(|i| x[i]).unwrap_or(0.0);
        let vk = self.cathode.mna_index().map(|i| x[i]).unwrap_or(0.0);
        va - vk
    }

    pub fn current_from(&self, num_nodes: usize, x: &DVector<f64>) -> f64 {
        x[num_nodes + self.branch]
    }

    pub fn is_feasible(&self, num_nodes: usize, x: &DVector<f64>, eps_i: f64, eps_v: f64) -> bool {
        match self.mode {
            SwitchMode::Conducting => self.current_from(num_nodes, x) >= -eps_i,
            SwitchMode::Blocking => self.voltage_from(x) <= eps_v,
        }
    }

    pub fn flip(&mut self) {
        self.mode = self.mode.flipped();
        self.flip_count += 1;
    }

    pub fn engage_damping(&mut self) -> f64 {
        self.g_damp = if self.g_damp == 0.0 {
            DAMPING_SEED
        } else {
            self.g_damp * 2.0
        };
        self.g_damp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mosfet(model: MosfetModel) -> Mosfet {
        Mosfet {
            id: "M1".to_string(),
            drain: NodeId::new(1),
            gate: NodeId::new(2),
            source: NodeId::GROUND,
            model,
            hysteresis: 0.05,
            branch: 0,
            init_branch: 0,
            mode: SwitchMode::Blocking,
            pinned: None,
            flip_count: 0,
            g_damp: 0.0,
            v_gs_prev: 0.0,
            op_v_gs: 0.0,
            op_v_ds: 0.0,
        }
    }

    #[test]
    fn test_gate_pinning_hysteresis() {
        let mut m = mosfet(MosfetModel::Ideal { vth: 2.0, ron: 0.01 });

        m.refresh_pin(0.0);
        assert_eq!(m.pinned, Some(SwitchMode::Blocking));

        m.refresh_pin(15.0);
        assert_eq!(m.pinned, Some(SwitchMode::Conducting));

        // Inside the band [Vth, Vth*1.05] the kernel decides.
        m.refresh_pin(2.05);
        assert_eq!(m.pinned, None);
        assert!(m.is_free());
    }

    #[test]
    fn test_conducting_stamp_row() {
        let mut m = mosfet(MosfetModel::Ideal { vth: 2.0, ron: 0.5 });
        m.mode = SwitchMode::Conducting;
        let mut mna = MnaSystem::new(2, 1);
        m.stamp(&mut mna);
        let a = mna.to_dense_matrix();
        // Branch row: v_d - Ron*i = 0 (source is ground)
        assert_eq!(a[(2, 0)], 1.0);
        assert_eq!(a[(2, 2)], -0.5);
        // KCL at drain
        assert_eq!(a[(0, 2)], 1.0);
    }

    #[test]
    fn test_blocking_stamp_row() {
        let m = mosfet(MosfetModel::Ideal { vth: 2.0, ron: 0.5 });
        let mut mna = MnaSystem::new(2, 1);
        m.stamp(&mut mna);
        let a = mna.to_dense_matrix();
        assert_eq!(a[(2, 2)], 1.0);
        assert_eq!(a[(2, 0)], 0.0);
    }

    #[test]
    fn test_damping_escalates_by_doubling() {
        let mut m = mosfet(MosfetModel::Ideal { vth: 2.0, ron: 0.5 });
        assert_eq!(m.engage_damping(), DAMPING_SEED);
        assert_eq!(m.engage_damping(), 2.0 * DAMPING_SEED);
        assert_eq!(m.engage_damping(), 4.0 * DAMPING_SEED);
        m.begin_step();
        assert_eq!(m.g_damp, 0.0);
    }

    #[test]
    fn test_smoothed_linearization_stamp() {
        let mut m = mosfet(MosfetModel::Smoothed { beta: 0.5, vt: 1.0 });
        m.op_v_gs = 3.0;
        m.op_v_ds = 1.0;
        let mut mna = MnaSystem::new(2, 1);
        m.stamp(&mut mna);
        let a = mna.to_dense_matrix();
        // gm = 2*0.5*(3-1) = 2.0, i0 = 0.5*4 = 2.0
        assert_eq!(a[(2, 2)], 1.0);
        assert_eq!(a[(2, 1)], -2.0);
        // rhs = i0 - gm*v_gs0 = 2 - 6 = -4
        assert_eq!(mna.rhs()[2], -4.0);
    }

    #[test]
    fn test_diode_feasibility() {
        let d = IdealDiode {
            id: "D1".to_string(),
            anode: NodeId::GROUND,
            cathode: NodeId::new(1),
            branch: 0,
            init_branch: 0,
            mode: SwitchMode::Blocking,
            flip_count: 0,
            g_damp: 0.0,
        };
        // Cathode above ground: v_ak = -5, blocking is feasible.
        let x = DVector::from_vec(vec![5.0, 0.0]);
        assert!(d.is_feasible(1, &x, 1e-9, 1e-9));
        // Cathode below ground: v_ak = +5, blocking violated.
        let x = DVector::from_vec(vec![-5.0, 0.0]);
        assert!(!d.is_feasible(1, &x, 1e-9, 1e-9));
    }
}
