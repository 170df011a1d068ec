//! `switchier` - transient simulation of switched-mode power circuits.
//!
//! Exit codes: 0 success, 2 solver failure, 3 malformed circuit,
//! 4 unsupported element.

mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use switchier_parser::{parse_netlist, Error as ParseError};
use switchier_solver::{FailureKind, TransientController, TransientParams};

const EXIT_SOLVER_FAILED: u8 = 2;
const EXIT_MALFORMED: u8 = 3;
const EXIT_UNSUPPORTED: u8 = 4;

#[derive(Debug, Parser)]
#[command(
    name = "switchier",
    about = "Transient simulator for switched-mode power circuits",
    version
)]
struct Args {
    /// Netlist file to simulate.
    netlist: PathBuf,

    /// Emit the result record as JSON instead of a table.
    #[arg(long)]
    json: bool,

    /// Step size override (s); defaults to the netlist's .TRAN step.
    #[arg(long)]
    tstep: Option<f64>,

    /// Stop time override (s); defaults to the netlist's .TRAN stop time.
    #[arg(long)]
    tstop: Option<f64>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> anyhow::Result<ExitCode> {
    let text = std::fs::read_to_string(&args.netlist)
        .with_context(|| format!("reading {}", args.netlist.display()))?;

    let deck = match parse_netlist(&text) {
        Ok(deck) => deck,
        Err(e @ ParseError::UnsupportedElement { .. }) => {
            eprintln!("error: {}", e);
            return Ok(ExitCode::from(EXIT_UNSUPPORTED));
        }
        // MissingAnalysis, ParseError and Circuit errors are all a
        // malformed input as far as exit codes go.
        Err(e) => {
            eprintln!("error: {}", e);
            return Ok(ExitCode::from(EXIT_MALFORMED));
        }
    };

    let tstep = args.tstep.unwrap_or(deck.tran.tstep);
    let tstop = args.tstop.unwrap_or(deck.tran.tstop);

    let mut circuit = deck.circuit;
    let outcome = TransientController::new(TransientParams::new(tstep, tstop))
        .with_diagnostic_sink(|d| eprintln!("warning: {}", d))
        .run(&mut circuit);

    if args.json {
        output::print_json(&outcome);
    } else {
        output::print_table(&deck.title, &outcome);
    }

    Ok(match &outcome.error {
        None => ExitCode::SUCCESS,
        Some(failure) if failure.kind == FailureKind::MalformedCircuit => {
            ExitCode::from(EXIT_MALFORMED)
        }
        Some(_) => ExitCode::from(EXIT_SOLVER_FAILED),
    })
}
