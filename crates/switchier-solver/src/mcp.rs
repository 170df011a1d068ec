//! The Mixed Complementarity Problem switch kernel.
//!
//! Solves, at each step, the linear network together with the
//! complementarity predicate on every free switch: either conducting with
//! non-negative current and zero drop, or blocking with non-positive
//! voltage and zero current. Modes are selected by pivoting - assemble and
//! solve under the current mode vector, flip every infeasible switch, and
//! repeat - warm-started from the previous step's modes so switching events
//! cost one or two extra solves rather than a combinatorial search.
//!
//! Smoothed (square-law) MOSFETs ride the same loop as Newton iterations:
//! their linearization point is refreshed from the latest solve until it
//! stops moving.

use nalgebra::DVector;
use switchier_core::MnaSystem;
use switchier_devices::{Circuit, Element, IntegrationMethod, StampContext, StampDiagnostic};

use crate::diagnostics::Diagnostic;
use crate::error::{Error, Result};
use crate::linear::{solve_dense, solve_sparse, SPARSE_THRESHOLD};

/// MCP kernel tuning.
#[derive(Debug, Clone, Copy)]
pub struct McpConfig {
    /// Feasibility slack on conducting-branch current (A).
    pub eps_current: f64,
    /// Feasibility slack on blocking-branch voltage (V).
    pub eps_voltage: f64,
    /// Per-switch flip count at which damping engages.
    pub flip_limit: u32,
    /// Total flips across all switches allowed in one step.
    pub max_mode_iterations: usize,
    /// Smoothed-device linearization movement below which Newton stops (V).
    pub newton_tol: f64,
    /// Newton pass budget per step for smoothed devices.
    pub max_newton_iterations: usize,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            eps_current: 1e-9,
            eps_voltage: 1e-9,
            flip_limit: 8,
            max_mode_iterations: 64,
            newton_tol: 1e-9,
            max_newton_iterations: 50,
        }
    }
}

/// Converged kernel output for one step.
#[derive(Debug, Clone)]
pub struct McpReport {
    pub solution: DVector<f64>,
    /// Linear solves spent (1 when the warm start was already feasible).
    pub solves: usize,
}

fn solve_system(mna: &MnaSystem) -> Result<DVector<f64>> {
    if mna.size() >= SPARSE_THRESHOLD {
        solve_sparse(mna.size(), mna.triplets(), mna.rhs())
    } else {
        solve_dense(&mna.to_dense_matrix(), mna.rhs())
    }
}

/// Flip every infeasible free switch; returns the number of flips and
/// pushes a diagnostic when damping engages.
fn sweep_switches(
    circuit: &mut Circuit,
    x: &DVector<f64>,
    t: f64,
    config: &McpConfig,
    diagnostics: &mut Vec<Diagnostic>,
) -> usize {
    let n = circuit.num_nodes();
    let mut flips = 0;
    for element in circuit.elements_mut() {
        match element {
            Element::Mosfet(m) if m.is_free() => {
                if !m.is_feasible(n, x, config.eps_current, config.eps_voltage) {
                    m.flip();
                    flips += 1;
                    if m.flip_count >= config.flip_limit {
                        let g = m.engage_damping();
                        log::warn!("switch '{}' cycling at t = {:.6e} s, damping {:.3e} S", m.id, t, g);
                        diagnostics.push(Diagnostic::DampingEngaged {
                            element: m.id.clone(),
                            conductance: g,
                            at_time: t,
                        });
                    }
                }
            }
            Element::Diode(d) => {
                if !d.is_feasible(n, x, config.eps_current, config.eps_voltage) {
                    d.flip();
                    flips += 1;
                    if d.flip_count >= config.flip_limit {
                        let g = d.engage_damping();
                        log::warn!("diode '{}' cycling at t = {:.6e} s, damping {:.3e} S", d.id, t, g);
                        diagnostics.push(Diagnostic::DampingEngaged {
                            element: d.id.clone(),
                            conductance: g,
                            at_time: t,
                        });
                    }
                }
            }
            _ => {}
        }
    }
    flips
}

/// Refresh smoothed-device linearization points; returns how many moved.
fn relinearize_smoothed(circuit: &mut Circuit, x: &DVector<f64>, tol: f64) -> usize {
    let mut moved = 0;
    for element in circuit.elements_mut() {
        if let Element::Mosfet(m) = element {
            if m.relinearize(x, tol) {
                moved += 1;
            }
        }
    }
    moved
}

/// Solve one transient step under the given scheme and step size.
///
/// On entry every switch's per-step state (flip count, damping, gate pin)
/// is reset; the mode vector itself carries over from the previous step as
/// the warm start. The first assembly collects stamp diagnostics.
pub fn solve_step(
    circuit: &mut Circuit,
    method: IntegrationMethod,
    h: f64,
    t: f64,
    config: &McpConfig,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<McpReport> {
    for element in circuit.elements_mut() {
        match element {
            Element::Mosfet(m) => m.begin_step(),
            Element::Diode(d) => d.begin_step(),
            _ => {}
        }
    }

    let mut stamp_diags: Vec<StampDiagnostic> = Vec::new();
    let mut total_flips = 0usize;
    let mut newton_passes = 0usize;
    let mut solves = 0usize;

    loop {
        let mut mna = MnaSystem::new(circuit.num_nodes(), circuit.num_step_branches());
        let mut ctx = StampContext {
            method,
            h,
            t,
            diagnostics: if solves == 0 { Some(&mut stamp_diags) } else { None },
        };
        circuit.stamp_all(&mut mna, &mut ctx);
        let x = solve_system(&mna)?;
        solves += 1;

        let flips = sweep_switches(circuit, &x, t, config, diagnostics);
        total_flips += flips;
        let moved = relinearize_smoothed(circuit, &x, config.newton_tol);
        if flips == 0 && moved > 0 {
            newton_passes += 1;
        }

        if flips == 0 && moved == 0 {
            diagnostics.extend(
                stamp_diags
                    .drain(..)
                    .map(|d| Diagnostic::from_stamp(d, t)),
            );
            return Ok(McpReport { solution: x, solves });
        }

        if total_flips > config.max_mode_iterations || newton_passes > config.max_newton_iterations
        {
            return Err(Error::McpNotConverged {
                flips: total_flips,
                at_time: t,
            });
        }
    }
}

/// Solve the consistent t = 0 operating point.
///
/// Capacitors are pinned at their initial voltage, inductors act as fixed
/// current sources, and every switch starts blocking, so the first iterate
/// is the network with all switches off and mode seeds come from its
/// voltage signs. Gate pins are re-derived from each iterate since no
/// committed solution exists yet.
pub fn solve_initial(
    circuit: &mut Circuit,
    config: &McpConfig,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<DVector<f64>> {
    use switchier_devices::SwitchMode;

    for element in circuit.elements_mut() {
        match element {
            Element::Mosfet(m) => {
                m.begin_step();
                m.pinned = None;
                m.mode = SwitchMode::Blocking;
                m.op_v_gs = 0.0;
                m.op_v_ds = 0.0;
            }
            Element::Diode(d) => {
                d.begin_step();
                d.mode = SwitchMode::Blocking;
            }
            _ => {}
        }
    }

    let mut total_flips = 0usize;
    let mut iterations = 0usize;
    loop {
        let mut mna = MnaSystem::new(circuit.num_nodes(), circuit.num_init_branches());
        circuit.stamp_all_initial(&mut mna);
        let x = solve_system(&mna)?;
        iterations += 1;

        let n = circuit.num_nodes();
        let mut changed = 0usize;
        for element in circuit.elements_mut() {
            match element {
                Element::Mosfet(m) => {
                    let was = m.effective_mode();
                    m.refresh_pin(m.v_gs_from(&x));
                    if m.relinearize(&x, config.newton_tol) {
                        changed += 1;
                    }
                    if m.is_free() {
                        let feasible = match m.mode {
                            SwitchMode::Conducting => {
                                x[n + m.init_branch] >= -config.eps_current
                            }
                            SwitchMode::Blocking => m.v_ds_from(&x) <= config.eps_voltage,
                        };
                        if !feasible {
                            m.flip();
                            total_flips += 1;
                            changed += 1;
                        }
                    }
                    if m.effective_mode() != was {
                        changed += 1;
                    }
                }
                Element::Diode(d) => {
                    let feasible = match d.mode {
                        SwitchMode::Conducting => x[n + d.init_branch] >= -config.eps_current,
                        SwitchMode::Blocking => d.voltage_from(&x) <= config.eps_voltage,
                    };
                    if !feasible {
                        d.flip();
                        total_flips += 1;
                        changed += 1;
                    }
                }
                _ => {}
            }
        }

        if changed == 0 {
            return Ok(x);
        }
        if total_flips > config.max_mode_iterations
            || iterations > config.max_mode_iterations + config.max_newton_iterations
        {
            return Err(Error::McpNotConverged {
                flips: total_flips,
                at_time: 0.0,
            });
        }
    }
}
