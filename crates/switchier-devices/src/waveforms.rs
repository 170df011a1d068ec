//! Time-varying source waveforms.

/// Fraction of the period used for a pulse edge when no rise/fall time is
/// given. Edges are always finite ramps so both ramp endpoints exist as
/// breakpoints and sample times stay strictly increasing across an edge.
const DEFAULT_EDGE_FRACTION: f64 = 1e-3;

/// Parameters for a PWM source.
#[derive(Debug, Clone, Copy)]
pub struct PwmParams {
    /// Peak-to-offset amplitude (V or A).
    pub amplitude: f64,
    /// Switching frequency (Hz).
    pub frequency: f64,
    /// On fraction of the period, in (0, 1).
    pub duty_cycle: f64,
    /// Low-level value.
    pub offset: f64,
    /// Rise time (s); defaults to period/1000 when `None` or zero.
    pub rise_time: Option<f64>,
    /// Fall time (s); defaults to period/1000 when `None` or zero.
    pub fall_time: Option<f64>,
}

/// A source waveform: deterministic value as a function of time.
#[derive(Debug, Clone)]
pub enum Waveform {
    /// Constant value.
    Dc(f64),
    /// SPICE-style periodic pulse.
    ///
    /// `v0` until `td`, ramp to `v1` over `tr`, hold for `pw`, ramp back
    /// over `tf`, repeat every `per`. A non-positive period means a single
    /// (aperiodic) pulse.
    Pulse {
        v0: f64,
        v1: f64,
        td: f64,
        tr: f64,
        tf: f64,
        pw: f64,
        per: f64,
    },
}

impl Waveform {
    /// A constant source.
    pub fn dc(value: f64) -> Self {
        Waveform::Dc(value)
    }

    /// A pulse waveform with SPICE parameter order.
    ///
    /// Zero rise/fall times are widened to `per/1000` so that every edge
    /// has two distinct breakpoints.
    pub fn pulse(v0: f64, v1: f64, td: f64, tr: f64, tf: f64, pw: f64, per: f64) -> Self {
        let min_edge = if per > 0.0 { per * DEFAULT_EDGE_FRACTION } else { 1e-9 };
        Waveform::Pulse {
            v0,
            v1,
            td,
            tr: if tr > 0.0 { tr } else { min_edge },
            tf: if tf > 0.0 { tf } else { min_edge },
            pw: pw.max(0.0),
            per,
        }
    }

    /// A PWM waveform expressed as a pulse.
    pub fn pwm(params: PwmParams) -> Self {
        let per = 1.0 / params.frequency;
        let min_edge = per * DEFAULT_EDGE_FRACTION;
        let tr = params.rise_time.filter(|&t| t > 0.0).unwrap_or(min_edge);
        let tf = params.fall_time.filter(|&t| t > 0.0).unwrap_or(min_edge);
        // The on-time is measured from ramp start, so the flat top is the
        // duty fraction minus the rise ramp.
        let pw = (params.duty_cycle * per - tr).max(0.0);
        Waveform::Pulse {
            v0: params.offset,
            v1: params.offset + params.amplitude,
            td: 0.0,
            tr,
            tf,
            pw,
            per,
        }
    }

    /// Value at time `t`.
    pub fn value_at(&self, t: f64) -> f64 {
        match *self {
            Waveform::Dc(v) => v,
            Waveform::Pulse {
                v0,
                v1,
                td,
                tr,
                tf,
                pw,
                per,
            } => {
                if t < td {
                    return v0;
                }
                let mut tau = t - td;
                if per > 0.0 {
                    tau %= per;
                }
                if tau < tr {
                    v0 + (v1 - v0) * tau / tr
                } else if tau < tr + pw {
                    v1
                } else if tau < tr + pw + tf {
                    v1 + (v0 - v1) * (tau - tr - pw) / tf
                } else {
                    v0
                }
            }
        }
    }

    /// The next breakpoint strictly after `t`, if any.
    ///
    /// Breakpoints are the corners of the piecewise-linear pulse (ramp
    /// starts and ends). The integrator shortens steps to land on them.
    pub fn next_breakpoint_after(&self, t: f64) -> Option<f64> {
        match *self {
            Waveform::Dc(_) => None,
            Waveform::Pulse {
                td,
                tr,
                tf,
                pw,
                per,
                ..
            } => {
                let offsets = [0.0, tr, tr + pw, tr + pw + tf];
                let eps = if per > 0.0 { per * 1e-9 } else { 1e-15 };
                let first_period = if per > 0.0 && t > td {
                    ((t - td) / per).floor()
                } else {
                    0.0
                };
                // Check the containing period and the next one.
                for k in 0..2 {
                    let base = td + (first_period + k as f64) * per.max(0.0);
                    for &off in &offsets {
                        let cand = base + off;
                        if cand > t + eps {
                            return Some(cand);
                        }
                    }
                    if per <= 0.0 {
                        break;
                    }
                }
                None
            }
        }
    }
}
