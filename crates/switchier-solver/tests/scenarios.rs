//! End-to-end transient scenarios with analytic references.

use switchier_devices::{Circuit, MosfetModel, PwmParams, Waveform};
use switchier_solver::{run_transient, RunOutcome, TransientParams};

fn rl_circuit() -> Circuit {
    let mut c = Circuit::new();
    c.add_voltage_source("V1", "in", "0", Waveform::dc(24.0)).unwrap();
    c.add_resistor("R1", "in", "mid", 2.0).unwrap();
    c.add_inductor("L1", "mid", "0", 150e-6, Some(0.0)).unwrap();
    c
}

fn rc_circuit() -> Circuit {
    let mut c = Circuit::new();
    c.add_voltage_source("V1", "in", "0", Waveform::dc(12.0)).unwrap();
    c.add_resistor("R1", "in", "out", 1e3).unwrap();
    c.add_capacitor("C1", "out", "0", 100e-6, Some(0.0)).unwrap();
    c
}

fn run_ok(circuit: &mut Circuit, h: f64, t_end: f64) -> RunOutcome {
    let outcome = run_transient(circuit, TransientParams::new(h, t_end));
    assert!(
        outcome.success,
        "run failed: {:?}",
        outcome.error.as_ref().map(|e| &e.message)
    );
    outcome
}

/// RL charging: V = 24 V, L = 150 uH, R = 2 Ohm, i(0) = 0.
/// i(t) = 12 * (1 - e^(-t/tau)), tau = L/R = 75 us.
#[test]
fn test_rl_charging_matches_analytic() {
    let mut c = rl_circuit();
    let outcome = run_ok(&mut c, 1e-6, 500e-6);

    let tau = 150e-6 / 2.0;
    let i_at = |t: f64| 12.0 * (1.0 - (-t / tau).exp());

    let i_75 = outcome.record.value_at("I(L1)", 75e-6).unwrap();
    assert!(
        (i_75 - i_at(75e-6)).abs() < 1e-3,
        "i(75us) = {} (expected {})",
        i_75,
        i_at(75e-6)
    );

    let i_end = outcome.record.value_at("I(L1)", 500e-6).unwrap();
    assert!(
        (i_end - i_at(500e-6)).abs() < 2e-3,
        "i(500us) = {} (expected {})",
        i_end,
        i_at(500e-6)
    );
}

/// KCL at the R-L node: the resistor current equals the inductor branch
/// current at every accepted sample.
#[test]
fn test_rl_kcl_holds_at_every_sample() {
    let mut c = rl_circuit();
    let outcome = run_ok(&mut c, 1e-6, 500e-6);

    let v_in = outcome.record.series("V(in)").unwrap();
    let v_mid = outcome.record.series("V(mid)").unwrap();
    let i_l = outcome.record.series("I(L1)").unwrap();
    for k in 0..v_in.len() {
        let i_r = (v_in[k].1 - v_mid[k].1) / 2.0;
        assert!(
            (i_r - i_l[k].1).abs() < 1e-8 * 12.0,
            "KCL violated at t = {}: i_R = {}, i_L = {}",
            v_in[k].0,
            i_r,
            i_l[k].1
        );
    }
}

/// Voltage-source branches hold their prescribed value exactly.
#[test]
fn test_source_branch_voltage_is_exact() {
    let mut c = rl_circuit();
    let outcome = run_ok(&mut c, 1e-6, 100e-6);
    for (t, v) in outcome.record.series("V(in)").unwrap() {
        assert!((v - 24.0).abs() < 1e-9, "V(in) = {} at t = {}", v, t);
    }
}

/// Halving h at least halves the max error against the analytic solution
/// (the scheme is second order, so the observed factor is closer to 4).
#[test]
fn test_rl_error_drops_with_step_size() {
    let tau = 150e-6 / 2.0;
    let i_at = |t: f64| 12.0 * (1.0 - (-t / tau).exp());

    let max_err = |h: f64| {
        let mut c = rl_circuit();
        let outcome = run_ok(&mut c, h, 300e-6);
        outcome
            .record
            .series("I(L1)")
            .unwrap()
            .iter()
            .map(|&(t, i)| (i - i_at(t)).abs())
            .fold(0.0_f64, f64::max)
    };

    let err_full = max_err(1e-6);
    let err_half = max_err(0.5e-6);
    assert!(err_full > 1e-7, "full-step error suspiciously small");
    assert!(
        err_half < 0.6 * err_full,
        "halving h: error {} -> {}",
        err_full,
        err_half
    );
}

/// RC charging: V = 12 V, R = 1 kOhm, C = 100 uF, tau = 100 ms.
#[test]
fn test_rc_charging_matches_analytic() {
    let tau: f64 = 1e3 * 100e-6;
    let v_at = |t: f64| 12.0 * (1.0 - (-t / tau).exp());

    // Short run per the nominal parameters.
    let mut c = rc_circuit();
    let outcome = run_ok(&mut c, 0.1e-3, 10e-3);
    let v_10ms = outcome.record.value_at("V(out)", 10e-3).unwrap();
    assert!(
        (v_10ms - v_at(10e-3)).abs() < 1e-3,
        "v(10ms) = {} (expected {})",
        v_10ms,
        v_at(10e-3)
    );

    // Extended run out to one time constant.
    let mut c = rc_circuit();
    let outcome = run_ok(&mut c, 0.1e-3, 100e-3);
    let v_tau = outcome.record.value_at("V(out)", 100e-3).unwrap();
    assert!(
        (v_tau - v_at(100e-3)).abs() < 1e-3,
        "v(tau) = {} (expected {})",
        v_tau,
        v_at(100e-3)
    );
}

/// Re-running an identical transient yields bit-identical samples.
#[test]
fn test_rc_rerun_is_bit_identical() {
    let run = || {
        let mut c = rc_circuit();
        run_ok(&mut c, 0.1e-3, 10e-3)
    };
    let a = run();
    let b = run();
    assert_eq!(a.record.times(), b.record.times());
    assert_eq!(a.record.rows(), b.record.rows());
}

/// Ideal series LC excited by a 5 V step: v_C swings 0..10 V with
/// period 2*pi*sqrt(LC) ~= 1.987 ms.
#[test]
fn test_lc_oscillation_period_and_amplitude() {
    let (l, cap) = (1e-3, 100e-6);
    let lc: f64 = l * cap;
    let period = 2.0 * std::f64::consts::PI * lc.sqrt();
    let h = period / 200.0;

    let mut c = Circuit::new();
    c.add_voltage_source("V1", "in", "0", Waveform::dc(5.0)).unwrap();
    c.add_inductor("L1", "in", "mid", l, Some(0.0)).unwrap();
    c.add_capacitor("C1", "mid", "0", cap, Some(0.0)).unwrap();
    let outcome = run_ok(&mut c, h, 2.0 * period);

    let v_c = outcome.record.series("V(mid)").unwrap();

    // Peak amplitude: 2 * Vstep, allowing for sampling off-peak and the
    // small BDF2 dissipation.
    let v_max = v_c.iter().map(|&(_, v)| v).fold(f64::MIN, f64::max);
    let v_min = v_c.iter().map(|&(_, v)| v).fold(f64::MAX, f64::min);
    assert!(v_max > 9.4 && v_max < 10.3, "v_C peak = {}", v_max);
    assert!(v_min > -0.3 && v_min < 0.6, "v_C trough = {}", v_min);

    // Period from consecutive downward crossings of the 5 V midline.
    let mut crossings = Vec::new();
    for w in v_c.windows(2) {
        let (t0, a) = w[0];
        let (t1, b) = w[1];
        if a > 5.0 && b <= 5.0 {
            crossings.push(t0 + (a - 5.0) * (t1 - t0) / (a - b));
        }
    }
    assert!(crossings.len() >= 2, "only {} crossings", crossings.len());
    let measured = crossings[1] - crossings[0];
    assert!(
        (measured - period).abs() / period < 0.02,
        "period = {} (expected {})",
        measured,
        period
    );
}

/// An always-on MOSFET (gate well above threshold) charging an RC load
/// behaves as Ron in series for the whole run.
#[test]
fn test_always_on_mosfet_rc_charge() {
    let ron = 0.01;
    let mut c = Circuit::new();
    c.add_voltage_source("V1", "in", "0", Waveform::dc(12.0)).unwrap();
    c.add_voltage_source("Vg", "g", "0", Waveform::dc(15.0)).unwrap();
    c.add_mosfet("M1", "in", "g", "sw", MosfetModel::Ideal { vth: 2.0, ron })
        .unwrap();
    c.add_resistor("R1", "sw", "out", 10.0).unwrap();
    c.add_capacitor("C1", "out", "0", 10e-6, Some(0.0)).unwrap();
    let outcome = run_ok(&mut c, 1e-6, 500e-6);

    let tau = (10.0 + ron) * 10e-6;
    let v_end = outcome.record.value_at("V(out)", 500e-6).unwrap();
    let expected = 12.0 * (1.0 - (-500e-6 / tau).exp());
    assert!(
        (v_end - expected).abs() < 0.02,
        "v(out) = {} (expected {})",
        v_end,
        expected
    );

    // The switch stays conducting: drain-source drop is only Ron * i.
    for (t, v_sw) in outcome.record.series("V(sw)").unwrap() {
        assert!(v_sw > 11.9, "switch dropped out at t = {}: v(sw) = {}", t, v_sw);
    }
    for (t, i_ds) in outcome.record.series("I(M1)").unwrap() {
        assert!(i_ds > -1e-9, "i_ds = {} at t = {}", i_ds, t);
    }
}

/// Same circuit with the gate grounded: the switch blocks for the whole
/// run and the capacitor never charges.
#[test]
fn test_always_off_mosfet_blocks() {
    let mut c = Circuit::new();
    c.add_voltage_source("V1", "in", "0", Waveform::dc(12.0)).unwrap();
    c.add_voltage_source("Vg", "g", "0", Waveform::dc(0.0)).unwrap();
    c.add_mosfet("M1", "in", "g", "sw", MosfetModel::Ideal { vth: 2.0, ron: 0.01 })
        .unwrap();
    c.add_resistor("R1", "sw", "out", 10.0).unwrap();
    c.add_capacitor("C1", "out", "0", 10e-6, Some(0.0)).unwrap();
    let outcome = run_ok(&mut c, 1e-6, 500e-6);

    for (t, v_out) in outcome.record.series("V(out)").unwrap() {
        assert!(v_out.abs() < 1e-9, "v(out) = {} at t = {}", v_out, t);
    }
    for (t, i_ds) in outcome.record.series("I(M1)").unwrap() {
        assert!(i_ds.abs() < 1e-9, "i_ds = {} at t = {}", i_ds, t);
    }
}

fn buck_circuit() -> Circuit {
    let mut c = Circuit::new();
    c.add_voltage_source("Vin", "in", "0", Waveform::dc(24.0)).unwrap();
    c.add_mosfet("M1", "in", "g1", "sw", MosfetModel::Ideal { vth: 2.0, ron: 0.01 })
        .unwrap();
    // Gate drive referenced to the switch node (bootstrap-style), so
    // v_gs follows the PWM value directly.
    c.add_voltage_source(
        "Vg",
        "g1",
        "sw",
        Waveform::pwm(PwmParams {
            amplitude: 15.0,
            frequency: 50e3,
            duty_cycle: 0.5,
            offset: 0.0,
            rise_time: None,
            fall_time: None,
        }),
    )
    .unwrap();
    c.add_diode("D1", "0", "sw").unwrap();
    c.add_inductor("L1", "sw", "out", 150e-6, Some(0.0)).unwrap();
    c.add_capacitor("C1", "out", "0", 100e-6, Some(0.0)).unwrap();
    c.add_resistor("Rload", "out", "0", 2.0).unwrap();
    c
}

/// Open-loop buck: Vin = 24 V, 50 kHz, D = 0.5, L = 150 uH, C = 100 uF,
/// R = 2 Ohm. Steady state: V_out ~= 12 V, ripple <= 200 mV pk-pk,
/// inductor current ripple ~= Vin*D*(1-D)/(f*L) = 0.8 A.
#[test]
fn test_buck_converter_open_loop() {
    let mut c = buck_circuit();
    let outcome = run_ok(&mut c, 1e-6, 5e-3);

    let window = |series: Vec<(f64, f64)>, from: f64| -> Vec<(f64, f64)> {
        series.into_iter().filter(|&(t, _)| t >= from).collect()
    };

    // Average output over the last ten switching cycles.
    let v_out = window(outcome.record.series("V(out)").unwrap(), 4.8e-3);
    assert!(v_out.len() > 100, "window has only {} samples", v_out.len());
    let avg: f64 = v_out.iter().map(|&(_, v)| v).sum::<f64>() / v_out.len() as f64;
    assert!((avg - 12.0).abs() < 0.3, "steady-state V(out) = {}", avg);

    // Output ripple bound.
    let v_max = v_out.iter().map(|&(_, v)| v).fold(f64::MIN, f64::max);
    let v_min = v_out.iter().map(|&(_, v)| v).fold(f64::MAX, f64::min);
    assert!(v_max - v_min <= 0.2, "output ripple = {}", v_max - v_min);

    // Inductor current ripple over the same window.
    let i_l = window(outcome.record.series("I(L1)").unwrap(), 4.8e-3);
    let i_max = i_l.iter().map(|&(_, i)| i).fold(f64::MIN, f64::max);
    let i_min = i_l.iter().map(|&(_, i)| i).fold(f64::MAX, f64::min);
    let ripple = i_max - i_min;
    assert!(
        (ripple - 0.8).abs() < 0.15,
        "inductor ripple = {} (expected ~0.8)",
        ripple
    );
    // Continuous conduction around the 6 A average.
    assert!(i_min > 4.0 && i_max < 8.0, "i_L in [{}, {}]", i_min, i_max);
}

/// Diode complementarity holds at every accepted sample of the buck run:
/// i >= 0, v_ak <= 0, and their product vanishes.
#[test]
fn test_buck_diode_complementarity() {
    let mut c = buck_circuit();
    let outcome = run_ok(&mut c, 1e-6, 2e-3);

    let v_sw = outcome.record.series("V(sw)").unwrap();
    let i_d = outcome.record.series("I(D1)").unwrap();
    for k in 0..v_sw.len() {
        let (t, v_sw_k) = v_sw[k];
        let v_ak = -v_sw_k;
        let i = i_d[k].1;
        assert!(i >= -1e-9, "i_D = {} at t = {}", i, t);
        assert!(v_ak <= 1e-9, "v_ak = {} at t = {}", v_ak, t);
        assert!(
            (i * v_ak).abs() < 1e-6,
            "complementarity product {} at t = {}",
            i * v_ak,
            t
        );
    }
}

/// A PWM edge produces samples at both ramp endpoints: the pre-edge value
/// and the post-edge value, at strictly increasing times.
#[test]
fn test_pwm_edge_is_sampled_on_both_sides() {
    let mut c = Circuit::new();
    c.add_voltage_source(
        "V1",
        "in",
        "0",
        Waveform::pwm(PwmParams {
            amplitude: 10.0,
            frequency: 50e3,
            duty_cycle: 0.5,
            offset: 0.0,
            rise_time: None,
            fall_time: None,
        }),
    )
    .unwrap();
    c.add_resistor("R1", "in", "0", 1e3).unwrap();
    let outcome = run_ok(&mut c, 1e-6, 30e-6);

    let times = outcome.record.times();
    for w in times.windows(2) {
        assert!(w[0] < w[1]);
    }

    // Falling edge: flat top ends at 10 us, ramp bottom 20 ns later.
    let edge = 10e-6;
    let ramp = 20e-6 / 1000.0;
    let find = |t: f64| times.iter().find(|&&s| (s - t).abs() < 1e-12).copied();
    let t_pre = find(edge).expect("no sample at the pre-edge breakpoint");
    let t_post = find(edge + ramp).expect("no sample at the post-edge breakpoint");
    assert!(
        (outcome.record.value_at("V(in)", t_pre).unwrap() - 10.0).abs() < 1e-9
    );
    assert!(outcome.record.value_at("V(in)", t_post).unwrap().abs() < 1e-9);
}
