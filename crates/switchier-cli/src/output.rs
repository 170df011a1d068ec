//! Table and JSON rendering of a run outcome.

use serde_json::json;
use switchier_solver::RunOutcome;

/// Fixed-width tabular output, one column per recorded signal.
pub fn print_table(title: &str, outcome: &RunOutcome) {
    println!("{}", title);
    println!("==========================================");
    println!();

    let signals = outcome.record.signals();
    print!("{:>14}", "Time");
    for name in signals {
        print!("{:>14}", name);
    }
    println!();
    println!("{}", "-".repeat(14 * (1 + signals.len())));

    for (k, &t) in outcome.record.times().iter().enumerate() {
        print!("{:>14.6e}", t);
        for v in &outcome.record.rows()[k] {
            print!("{:>14.6}", v);
        }
        println!();
    }

    println!();
    match &outcome.error {
        None => println!(
            "Transient analysis complete ({} points).",
            outcome.record.len()
        ),
        Some(failure) => println!(
            "Transient analysis FAILED: {} ({} at t = {:.6e} s)",
            failure.message,
            failure.kind.as_str(),
            failure.at_time
        ),
    }
}

/// The consumer result contract as JSON:
/// `{success, timeVector, data, error?}`.
pub fn print_json(outcome: &RunOutcome) {
    let signals = outcome.record.signals();
    let data: Vec<serde_json::Value> = outcome
        .record
        .rows()
        .iter()
        .map(|row| {
            let map: serde_json::Map<String, serde_json::Value> = signals
                .iter()
                .zip(row.iter())
                .map(|(name, &v)| (name.clone(), json!(v)))
                .collect();
            serde_json::Value::Object(map)
        })
        .collect();

    let mut result = json!({
        "success": outcome.success,
        "timeVector": outcome.record.times(),
        "data": data,
    });
    if let Some(failure) = &outcome.error {
        result["error"] = json!({
            "kind": failure.kind.as_str(),
            "message": failure.message,
            "atTime": failure.at_time,
        });
    }
    println!("{}", result);
}
