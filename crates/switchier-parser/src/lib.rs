//! Minimal SPICE-like netlist frontend.
//!
//! Lowers a small SPICE subset onto the typed [`Circuit`] API:
//!
//! - Title line (first line, always skipped), `*` comments
//! - `.TRAN <tstep> <tstop>`, `.END`
//! - Element cards `R`, `L`, `C` (with `IC=`), `V`, `I` (`DC` or
//!   `PULSE(v0 v1 td tr tf pw per)`), `M` (explicit `IDEAL`/`SMOOTHED`
//!   model kind), `D`
//! - Engineering value suffixes (`150u`, `2meg`, `10k`)
//!
//! Anything else with a recognized SPICE prefix letter is reported as an
//! unsupported element.

pub mod error;
pub mod value;

use switchier_devices::{Circuit, MosfetModel, Waveform};

pub use error::{Error, Result};
pub use value::parse_value;

/// `.TRAN` directive contents.
#[derive(Debug, Clone, Copy)]
pub struct TranSpec {
    pub tstep: f64,
    pub tstop: f64,
}

/// A parsed netlist: title, lowered circuit and analysis directive.
///
/// Every deck carries a `.TRAN` directive; a netlist without one is
/// rejected with [`Error::MissingAnalysis`].
#[derive(Debug)]
pub struct Deck {
    pub title: String,
    pub circuit: Circuit,
    pub tran: TranSpec,
}

fn expect_value(token: Option<&str>, line: usize, what: &str) -> Result<f64> {
    let token = token.ok_or_else(|| Error::ParseError {
        line,
        message: format!("missing {}", what),
    })?;
    parse_value(token).ok_or_else(|| Error::ParseError {
        line,
        message: format!("bad {} '{}'", what, token),
    })
}

/// Parse `key=value` parameter tokens (case-insensitive keys).
fn param_value(tokens: &[&str], key: &str, line: usize) -> Result<Option<f64>> {
    for token in tokens {
        let upper = token.to_ascii_uppercase();
        if let Some(rest) = upper.strip_prefix(&format!("{}=", key)) {
            let v = parse_value(rest).ok_or_else(|| Error::ParseError {
                line,
                message: format!("bad {} value '{}'", key, token),
            })?;
            return Ok(Some(v));
        }
    }
    Ok(None)
}

/// Parse the source value part of a `V`/`I` card: `DC v`, a bare value,
/// or `PULSE(v0 v1 td tr tf pw per)`.
fn parse_source(rest: &[&str], line: usize) -> Result<Waveform> {
    if rest.is_empty() {
        return Err(Error::ParseError {
            line,
            message: "missing source value".to_string(),
        });
    }
    let joined = rest.join(" ");
    let upper = joined.to_ascii_uppercase();
    if upper.starts_with("PULSE") {
        let open = joined.find('(').ok_or_else(|| Error::ParseError {
            line,
            message: "expected '(' after PULSE".to_string(),
        })?;
        let close = joined.rfind(')').ok_or_else(|| Error::ParseError {
            line,
            message: "expected ')' after PULSE parameters".to_string(),
        })?;
        let inner = joined[open + 1..close].replace(',', " ");
        let mut values = Vec::new();
        for token in inner.split_whitespace() {
            values.push(parse_value(token).ok_or_else(|| Error::ParseError {
                line,
                message: format!("bad PULSE parameter '{}'", token),
            })?);
        }
        if values.len() < 2 {
            return Err(Error::ParseError {
                line,
                message: "PULSE requires at least v0 and v1".to_string(),
            });
        }
        let get = |i: usize| values.get(i).copied().unwrap_or(0.0);
        return Ok(Waveform::pulse(
            get(0),
            get(1),
            get(2),
            get(3),
            get(4),
            get(5),
            get(6),
        ));
    }
    if upper.starts_with("DC") {
        return Ok(Waveform::dc(expect_value(rest.get(1).copied(), line, "DC value")?));
    }
    Ok(Waveform::dc(expect_value(Some(rest[0]), line, "source value")?))
}

/// Parse a netlist into a [`Deck`].
pub fn parse_netlist(text: &str) -> Result<Deck> {
    let mut circuit = Circuit::new();
    let mut tran = None;
    let mut title = String::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if idx == 0 {
            title = line.to_string();
            continue;
        }
        if line.is_empty() || line.starts_with('*') {
            continue;
        }

        if line.starts_with('.') {
            let mut tokens = line.split_whitespace();
            let directive = tokens.next().unwrap_or_default().to_ascii_uppercase();
            match directive.as_str() {
                ".TRAN" => {
                    let tstep = expect_value(tokens.next(), line_no, ".TRAN step")?;
                    let tstop = expect_value(tokens.next(), line_no, ".TRAN stop time")?;
                    tran = Some(TranSpec { tstep, tstop });
                }
                ".END" => break,
                other => {
                    return Err(Error::ParseError {
                        line: line_no,
                        message: format!("unknown directive '{}'", other),
                    });
                }
            }
            continue;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        let name = tokens[0];
        let kind = name.chars().next().unwrap_or(' ').to_ascii_uppercase();
        match kind {
            'R' => {
                let (n1, n2) = card_nodes(&tokens, line_no)?;
                let r = expect_value(tokens.get(3).copied(), line_no, "resistance")?;
                circuit.add_resistor(name, n1, n2, r)?;
            }
            'L' => {
                let (n1, n2) = card_nodes(&tokens, line_no)?;
                let l = expect_value(tokens.get(3).copied(), line_no, "inductance")?;
                let ic = param_value(&tokens[4..], "IC", line_no)?;
                circuit.add_inductor(name, n1, n2, l, ic)?;
            }
            'C' => {
                let (n1, n2) = card_nodes(&tokens, line_no)?;
                let c = expect_value(tokens.get(3).copied(), line_no, "capacitance")?;
                let ic = param_value(&tokens[4..], "IC", line_no)?;
                circuit.add_capacitor(name, n1, n2, c, ic)?;
            }
            'V' => {
                let (n1, n2) = card_nodes(&tokens, line_no)?;
                let waveform = parse_source(&tokens[3..], line_no)?;
                circuit.add_voltage_source(name, n1, n2, waveform)?;
            }
            'I' => {
                let (n1, n2) = card_nodes(&tokens, line_no)?;
                let waveform = parse_source(&tokens[3..], line_no)?;
                circuit.add_current_source(name, n1, n2, waveform)?;
            }
            'M' => {
                if tokens.len() < 5 {
                    return Err(Error::ParseError {
                        line: line_no,
                        message: "MOSFET needs drain, gate, source and a model kind".to_string(),
                    });
                }
                let (d, g, s) = (tokens[1], tokens[2], tokens[3]);
                let model_kind = tokens[4].to_ascii_uppercase();
                let params = &tokens[5..];
                let model = match model_kind.as_str() {
                    "IDEAL" => {
                        let vth =
                            param_value(params, "VTH", line_no)?.ok_or_else(|| Error::ParseError {
                                line: line_no,
                                message: "IDEAL model requires VTH=".to_string(),
                            })?;
                        let ron = param_value(params, "RON", line_no)?.unwrap_or(0.0);
                        MosfetModel::Ideal { vth, ron }
                    }
                    "SMOOTHED" => {
                        let beta =
                            param_value(params, "BETA", line_no)?.ok_or_else(|| Error::ParseError {
                                line: line_no,
                                message: "SMOOTHED model requires BETA=".to_string(),
                            })?;
                        let vt =
                            param_value(params, "VT", line_no)?.ok_or_else(|| Error::ParseError {
                                line: line_no,
                                message: "SMOOTHED model requires VT=".to_string(),
                            })?;
                        MosfetModel::Smoothed { beta, vt }
                    }
                    other => {
                        return Err(Error::ParseError {
                            line: line_no,
                            message: format!(
                                "MOSFET model must be IDEAL or SMOOTHED, got '{}'",
                                other
                            ),
                        });
                    }
                };
                circuit.add_mosfet(name, d, g, s, model)?;
            }
            'D' => {
                let (a, k) = card_nodes(&tokens, line_no)?;
                circuit.add_diode(name, a, k)?;
            }
            _ => {
                return Err(Error::UnsupportedElement {
                    line: line_no,
                    card: name.to_string(),
                });
            }
        }
    }

    let tran = tran.ok_or(Error::MissingAnalysis)?;
    Ok(Deck {
        title,
        circuit,
        tran,
    })
}

fn card_nodes<'a>(tokens: &[&'a str], line: usize) -> Result<(&'a str, &'a str)> {
    match (tokens.get(1), tokens.get(2)) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(Error::ParseError {
            line,
            message: "element card needs two nodes".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchier_devices::Element;

    #[test]
    fn test_parse_rl_netlist() {
        let deck = parse_netlist(
            "RL charge test\n\
             V1 in 0 DC 24\n\
             R1 in mid 2\n\
             L1 mid 0 150u IC=0\n\
             .TRAN 1u 500u\n\
             .END\n",
        )
        .unwrap();
        assert_eq!(deck.title, "RL charge test");
        assert_eq!(deck.circuit.num_nodes(), 2);
        assert_eq!(deck.circuit.elements().len(), 3);
        assert_eq!(deck.tran.tstep, 1e-6);
        assert_eq!(deck.tran.tstop, 500e-6);
        deck.circuit.validate().unwrap();
    }

    #[test]
    fn test_parse_pulse_source() {
        let deck = parse_netlist(
            "pulse\n\
             V1 in 0 PULSE(0 15 0 20n 20n 10u 20u)\n\
             R1 in 0 1k\n\
             .TRAN 1u 100u\n\
             .END\n",
        )
        .unwrap();
        let Element::VoltageSource(v) = &deck.circuit.elements()[0] else {
            panic!("expected voltage source");
        };
        let Waveform::Pulse { v1, tr, pw, per, .. } = &v.waveform else {
            panic!("expected pulse waveform");
        };
        assert_eq!(*v1, 15.0);
        assert_eq!(*tr, 20e-9);
        assert_eq!(*pw, 10e-6);
        assert_eq!(*per, 20e-6);
    }

    #[test]
    fn test_parse_mosfet_models() {
        let deck = parse_netlist(
            "switches\n\
             V1 in 0 12\n\
             M1 in g1 sw IDEAL VTH=2 RON=0.01\n\
             M2 sw g2 0 SMOOTHED BETA=0.5 VT=1\n\
             V2 g1 0 15\n\
             V3 g2 0 0\n\
             .TRAN 1u 1m\n\
             .END\n",
        )
        .unwrap();
        let models: Vec<_> = deck
            .circuit
            .elements()
            .iter()
            .filter_map(|e| match e {
                Element::Mosfet(m) => Some(m.model),
                _ => None,
            })
            .collect();
        assert!(matches!(models[0], MosfetModel::Ideal { vth, ron } if vth == 2.0 && ron == 0.01));
        assert!(matches!(models[1], MosfetModel::Smoothed { beta, vt } if beta == 0.5 && vt == 1.0));
    }

    #[test]
    fn test_model_kind_is_explicit() {
        let err = parse_netlist("t\nM1 a b c VTH=2\n.END\n").unwrap_err();
        assert!(matches!(err, Error::ParseError { line: 2, .. }));
    }

    #[test]
    fn test_unsupported_element() {
        let err = parse_netlist("t\nQ1 a b c model\n.END\n").unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedElement { line: 2, ref card } if card == "Q1"
        ));
    }

    #[test]
    fn test_bad_value_is_a_parse_error() {
        let err = parse_netlist("t\nR1 a 0 banana\n.END\n").unwrap_err();
        assert!(matches!(err, Error::ParseError { line: 2, .. }));
    }

    #[test]
    fn test_duplicate_id_surfaces_circuit_error() {
        let err = parse_netlist("t\nR1 a 0 1k\nR1 a 0 2k\n.END\n").unwrap_err();
        assert!(matches!(err, Error::Circuit(_)));
    }

    #[test]
    fn test_comments_and_blank_lines_skipped() {
        let deck = parse_netlist(
            "title\n\
             * a comment\n\
             \n\
             R1 a 0 1k\n\
             .TRAN 1u 1m\n\
             .END\n",
        )
        .unwrap();
        assert_eq!(deck.circuit.elements().len(), 1);
    }

    #[test]
    fn test_missing_tran_is_an_error() {
        let err = parse_netlist("title\nR1 a 0 1k\n.END\n").unwrap_err();
        assert!(matches!(err, Error::MissingAnalysis));
    }
}
