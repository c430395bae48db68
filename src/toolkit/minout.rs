//! Minimization log parsing
//!
//! sander prints one block per `ntpr` cycles:
//!
//! ```text
//!    NSTEP       ENERGY          RMS            GMAX         NAME    NUMBER
//!       5      -2.0587E+03     1.6127E+01     1.4139E+02     C        1165
//!
//!  BOND    =      508.0958  ANGLE   =      289.4327  DIHED      =     1373.5808
//!  1-4 VDW =      506.6578  1-4 EEL =     6591.3416  RESTRAINT  =        0.0000
//! ```
//!
//! The FINAL RESULTS section repeats the last block and is merged by step.

use crate::core::params::EnergyTerm;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::OnceLock;

const STEP_HEADER: [&str; 6] = ["NSTEP", "ENERGY", "RMS", "GMAX", "NAME", "NUMBER"];

fn term_regex() -> &'static Regex {
    static TERM: OnceLock<Regex> = OnceLock::new();
    TERM.get_or_init(|| {
        Regex::new(
            r"(1-4 VDW|1-4 EEL|[A-Z][A-Z0-9]*)\s*=\s*([-+]?(?:\d+\.?\d*|\.\d+)(?:[Ee][-+]?\d+)?)",
        )
        .unwrap_or_else(|e| unreachable!("invalid term pattern: {}", e))
    })
}

/// Energy values per minimization step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnergySeries {
    pub records: BTreeMap<u32, BTreeMap<EnergyTerm, f64>>,
}

impl EnergySeries {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn value(&self, step: u32, term: EnergyTerm) -> Option<f64> {
        self.records.get(&step).and_then(|terms| terms.get(&term)).copied()
    }

    /// Last recorded step
    pub fn last_step(&self) -> Option<u32> {
        self.records.keys().next_back().copied()
    }

    /// Render the `.dat` series for `terms`
    ///
    /// Steps missing a term print `NaN` in that column.
    pub fn to_dat(&self, terms: &[EnergyTerm]) -> String {
        let mut out = String::from("# step");
        for term in terms {
            out.push(' ');
            out.push_str(term.label());
        }
        out.push('\n');

        for (step, values) in &self.records {
            let _ = write!(out, "{:>8}", step);
            for term in terms {
                match values.get(term) {
                    Some(value) => {
                        let _ = write!(out, " {:>16.4}", value);
                    }
                    None => {
                        let _ = write!(out, " {:>16}", "NaN");
                    }
                }
            }
            out.push('\n');
        }
        out
    }
}

enum State {
    Scanning,
    ExpectStep,
    Terms(u32),
}

fn is_step_header(line: &str) -> bool {
    line.split_whitespace().eq(STEP_HEADER.iter().copied())
}

fn parse_value(raw: &str) -> Option<f64> {
    // Overflowed fields print as asterisks
    if raw.contains('*') {
        return None;
    }
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse every energy block of a sander minimization log
pub fn parse_minout(log: &str) -> EnergySeries {
    let mut series = EnergySeries::default();
    let mut state = State::Scanning;

    for line in log.lines() {
        let trimmed = line.trim();
        state = match state {
            State::Scanning => {
                if is_step_header(trimmed) {
                    State::ExpectStep
                } else {
                    State::Scanning
                }
            }
            State::ExpectStep => {
                if trimmed.is_empty() {
                    State::ExpectStep
                } else {
                    let fields: Vec<&str> = trimmed.split_whitespace().collect();
                    match fields.first().and_then(|s| s.parse::<u32>().ok()) {
                        Some(step) => {
                            let record = series.records.entry(step).or_default();
                            let columns = [EnergyTerm::Energy, EnergyTerm::Rms, EnergyTerm::Gmax];
                            for (term, raw) in columns.iter().zip(fields.iter().skip(1)) {
                                if let Some(value) = parse_value(raw) {
                                    record.insert(*term, value);
                                }
                            }
                            State::Terms(step)
                        }
                        None => State::Scanning,
                    }
                }
            }
            State::Terms(step) => {
                if trimmed.is_empty() {
                    State::Terms(step)
                } else if is_step_header(trimmed) {
                    State::ExpectStep
                } else {
                    let mut matched = false;
                    for caps in term_regex().captures_iter(trimmed) {
                        matched = true;
                        let Some(term) = EnergyTerm::from_log_label(&caps[1]) else {
                            continue;
                        };
                        if let Some(value) = parse_value(&caps[2]) {
                            series.records.entry(step).or_default().insert(term, value);
                        }
                    }
                    if matched {
                        State::Terms(step)
                    } else {
                        State::Scanning
                    }
                }
            }
        };
    }

    series
}
