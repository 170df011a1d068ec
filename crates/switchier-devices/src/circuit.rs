//! Circuit container: node interning, element table, branch allocation and
//! structural validation.

use std::collections::{HashMap, HashSet, VecDeque};

use nalgebra::DVector;
use switchier_core::{MnaSystem, NodeId, NodeMap};

use crate::element::{Element, StampContext, StepLimits, StepRejection};
use crate::error::{CircuitError, Result};
use crate::passive::{Capacitor, Inductor, Resistor};
use crate::sources::{CurrentSource, VoltageSource};
use crate::switch::{IdealDiode, Mosfet, MosfetModel, SwitchMode};
use crate::waveforms::Waveform;

/// Default gate hysteresis band width as a fraction of Vth.
pub const DEFAULT_HYSTERESIS: f64 = 0.05;

/// A circuit under construction or simulation.
///
/// Elements are created once and live until the circuit is dropped. Branch
/// unknowns are allocated in element-insertion order: one per voltage
/// source, inductor and switch for transient steps, and a separate set for
/// the t = 0 init solve (where capacitors are pinned and inductors are
/// current sources).
#[derive(Debug, Clone, Default)]
pub struct Circuit {
    nodes: NodeMap,
    elements: Vec<Element>,
    ids: HashSet<String>,
    num_step_branches: usize,
    num_init_branches: usize,
}

impl Circuit {
    pub fn new() -> Self {
        Self::default()
    }

    fn claim_id(&mut self, id: &str) -> Result<String> {
        if !self.ids.insert(id.to_string()) {
            return Err(CircuitError::DuplicateElement(id.to_string()));
        }
        Ok(id.to_string())
    }

    fn require_positive(id: &str, param: &'static str, value: f64) -> Result<()> {
        if value > 0.0 && value.is_finite() {
            Ok(())
        } else {
            Err(CircuitError::NonPositiveValue {
                id: id.to_string(),
                param,
                value,
            })
        }
    }

    /// Add a resistor. `r` must be strictly positive.
    pub fn add_resistor(&mut self, id: &str, pos: &str, neg: &str, r: f64) -> Result<()> {
        Self::require_positive(id, "R", r)?;
        let id = self.claim_id(id)?;
        let pos = self.nodes.intern(pos);
        let neg = self.nodes.intern(neg);
        self.elements.push(Element::Resistor(Resistor {
            id,
            pos,
            neg,
            resistance: r,
        }));
        Ok(())
    }

    /// Add an inductor with optional initial current (A).
    pub fn add_inductor(&mut self, id: &str, pos: &str, neg: &str, l: f64, ic: Option<f64>) -> Result<()> {
        Self::require_positive(id, "L", l)?;
        let id = self.claim_id(id)?;
        let pos = self.nodes.intern(pos);
        let neg = self.nodes.intern(neg);
        let branch = self.num_step_branches;
        self.num_step_branches += 1;
        let ic = ic.unwrap_or(0.0);
        self.elements.push(Element::Inductor(Inductor {
            id,
            pos,
            neg,
            inductance: l,
            ic,
            i_prev: ic,
            i_prev2: ic,
            branch,
        }));
        Ok(())
    }

    /// Add a capacitor with optional initial voltage (V).
    pub fn add_capacitor(&mut self, id: &str, pos: &str, neg: &str, c: f64, ic: Option<f64>) -> Result<()> {
        Self::require_positive(id, "C", c)?;
        let id = self.claim_id(id)?;
        let pos = self.nodes.intern(pos);
        let neg = self.nodes.intern(neg);
        let init_branch = self.num_init_branches;
        self.num_init_branches += 1;
        let ic = ic.unwrap_or(0.0);
        self.elements.push(Element::Capacitor(Capacitor {
            id,
            pos,
            neg,
            capacitance: c,
            ic,
            v_prev: ic,
            v_prev2: ic,
            init_branch,
        }));
        Ok(())
    }

    /// Add an independent voltage source.
    pub fn add_voltage_source(&mut self, id: &str, pos: &str, neg: &str, waveform: Waveform) -> Result<()> {
        let id = self.claim_id(id)?;
        let pos = self.nodes.intern(pos);
        let neg = self.nodes.intern(neg);
        let branch = self.num_step_branches;
        self.num_step_branches += 1;
        let init_branch = self.num_init_branches;
        self.num_init_branches += 1;
        self.elements.push(Element::VoltageSource(VoltageSource {
            id,
            pos,
            neg,
            waveform,
            branch,
            init_branch,
        }));
        Ok(())
    }

    /// Add an independent current source.
    pub fn add_current_source(&mut self, id: &str, pos: &str, neg: &str, waveform: Waveform) -> Result<()> {
        let id = self.claim_id(id)?;
        let pos = self.nodes.intern(pos);
        let neg = self.nodes.intern(neg);
        self.elements.push(Element::CurrentSource(CurrentSource {
            id,
            pos,
            neg,
            waveform,
        }));
        Ok(())
    }

    /// Add a MOSFET with the given channel model.
    pub fn add_mosfet(
        &mut self,
        id: &str,
        drain: &str,
        gate: &str,
        source: &str,
        model: MosfetModel,
    ) -> Result<()> {
        match model {
            MosfetModel::Ideal { ron, .. } => {
                if ron < 0.0 || !ron.is_finite() {
                    return Err(CircuitError::NonPositiveValue {
                        id: id.to_string(),
                        param: "Ron",
                        value: ron,
                    });
                }
            }
            MosfetModel::Smoothed { beta, .. } => Self::require_positive(id, "beta", beta)?,
        }
        let id = self.claim_id(id)?;
        let drain = self.nodes.intern(drain);
        let gate = self.nodes.intern(gate);
        let source = self.nodes.intern(source);
        let branch = self.num_step_branches;
        self.num_step_branches += 1;
        let init_branch = self.num_init_branches;
        self.num_init_branches += 1;
        self.elements.push(Element::Mosfet(Mosfet {
            id,
            drain,
            gate,
            source,
            model,
            hysteresis: DEFAULT_HYSTERESIS,
            branch,
            init_branch,
            mode: SwitchMode::Blocking,
            pinned: None,
            flip_count: 0,
            g_damp: 0.0,
            v_gs_prev: 0.0,
            op_v_gs: 0.0,
            op_v_ds: 0.0,
        }));
        Ok(())
    }

    /// Add an ideal diode (anode, cathode).
    pub fn add_diode(&mut self, id: &str, anode: &str, cathode: &str) -> Result<()> {
        let id = self.claim_id(id)?;
        let anode = self.nodes.intern(anode);
        let cathode = self.nodes.intern(cathode);
        let branch = self.num_step_branches;
        self.num_step_branches += 1;
        let init_branch = self.num_init_branches;
        self.num_init_branches += 1;
        self.elements.push(Element::Diode(IdealDiode {
            id,
            anode,
            cathode,
            branch,
            init_branch,
            mode: SwitchMode::Blocking,
            flip_count: 0,
            g_damp: 0.0,
        }));
        Ok(())
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.num_nodes()
    }

    /// Unknown count for transient steps.
    pub fn num_unknowns(&self) -> usize {
        self.num_nodes() + self.num_step_branches
    }

    /// Unknown count for the t = 0 init solve.
    pub fn num_init_unknowns(&self) -> usize {
        self.num_nodes() + self.num_init_branches
    }

    pub fn num_step_branches(&self) -> usize {
        self.num_step_branches
    }

    pub fn num_init_branches(&self) -> usize {
        self.num_init_branches
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn elements_mut(&mut self) -> &mut [Element] {
        &mut self.elements
    }

    pub fn node_names(&self) -> Vec<String> {
        self.nodes.names().map(str::to_string).collect()
    }

    pub fn node_map(&self) -> &NodeMap {
        &self.nodes
    }

    /// Structural validation: ground must be referenced and every node must
    /// have a conductive path to it.
    ///
    /// Switch channels count as edges (their blocking state is a runtime
    /// matter); gates do not, so a gate wired to nothing else is caught
    /// here rather than as a singular matrix later.
    pub fn validate(&self) -> Result<()> {
        let mut touches_ground = false;
        let mut adjacency: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for element in &self.elements {
            let conductive: Vec<NodeId> = match element {
                Element::Mosfet(m) => vec![m.drain, m.source],
                other => other.nodes(),
            };
            touches_ground |= element.nodes().iter().any(|n| n.is_ground());
            for (i, &a) in conductive.iter().enumerate() {
                for &b in conductive.iter().skip(i + 1) {
                    adjacency.entry(a).or_default().push(b);
                    adjacency.entry(b).or_default().push(a);
                }
            }
        }
        if !touches_ground {
            return Err(CircuitError::NoGround);
        }

        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut queue = VecDeque::from([NodeId::GROUND]);
        seen.insert(NodeId::GROUND);
        while let Some(node) = queue.pop_front() {
            if let Some(neighbors) = adjacency.get(&node) {
                for &next in neighbors {
                    if seen.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
        }
        for name in self.nodes.names() {
            let id = self.nodes.get(name).unwrap_or(NodeId::GROUND);
            if !seen.contains(&id) {
                return Err(CircuitError::FloatingNode(name.to_string()));
            }
        }
        Ok(())
    }

    /// Stamp every element into a transient-step system.
    pub fn stamp_all(&self, mna: &mut MnaSystem, ctx: &mut StampContext) {
        for element in &self.elements {
            element.stamp(mna, ctx);
        }
    }

    /// Stamp every element into the init system.
    pub fn stamp_all_initial(&self, mna: &mut MnaSystem) {
        for element in &self.elements {
            element.stamp_initial(mna);
        }
    }

    /// Seed element histories from the init solution.
    pub fn initialize(&mut self, x: &DVector<f64>) {
        for element in &mut self.elements {
            element.initialize(x);
        }
    }

    /// Commit a solved step into every element's history.
    pub fn update_history(&mut self, x: &DVector<f64>) {
        let n = self.num_nodes();
        for element in &mut self.elements {
            element.update_history(n, x);
        }
    }

    /// First element veto of a solved step, if any.
    pub fn check_step(&self, x: &DVector<f64>, h: f64, limits: &StepLimits) -> Option<StepRejection> {
        let n = self.num_nodes();
        self.elements
            .iter()
            .find_map(|e| e.check_step(n, x, h, limits))
    }

    /// Earliest source breakpoint strictly after `t`.
    pub fn next_event_after(&self, t: f64) -> Option<f64> {
        self.elements
            .iter()
            .filter_map(|e| e.next_event_after(t))
            .min_by(|a, b| a.total_cmp(b))
    }

    /// Signal names in record order: node voltages, then branch currents.
    pub fn signal_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .nodes
            .names()
            .map(|n| format!("V({})", n))
            .collect();
        for element in &self.elements {
            if element.step_branch().is_some() {
                names.push(format!("I({})", element.id()));
            }
        }
        names
    }

    /// Snapshot of all signals from a transient-step solution.
    pub fn snapshot_step(&self, x: &DVector<f64>) -> Vec<f64> {
        let n = self.num_nodes();
        let mut row: Vec<f64> = (0..n).map(|i| x[i]).collect();
        for element in &self.elements {
            if let Some(branch) = element.step_branch() {
                row.push(x[n + branch]);
            }
        }
        row
    }

    /// Snapshot of all signals from the init solution, whose unknown layout
    /// differs (capacitor branches exist, inductor branches do not).
    pub fn snapshot_init(&self, x: &DVector<f64>) -> Vec<f64> {
        let n = self.num_nodes();
        let mut row: Vec<f64> = (0..n).map(|i| x[i]).collect();
        for element in &self.elements {
            match element {
                Element::Inductor(l) => row.push(l.ic),
                Element::VoltageSource(v) => row.push(x[n + v.init_branch]),
                Element::Mosfet(m) => row.push(x[n + m.init_branch]),
                Element::Diode(d) => row.push(x[n + d.init_branch]),
                _ => {}
            }
        }
        row
    }
}
