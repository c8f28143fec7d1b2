//! Line-oriented tokenizer for `container.txt` (spec.md §6).
//!
//! No parser-combinator crate: this is a hand-rolled scanner in the same
//! spirit as the rest of the corpus's bespoke line formats. Comments (`#...`)
//! are stripped, but blank lines are real data lines where a value is
//! expected (spec.md §6 preamble).
use crate::buffer::PerKind;
use crate::config::model::{ContainerConfig, FmuIo, SlaveSpec, TypeWiring, WireEntry};
use crate::error::Error;
use crate::router::{PortEntry, PortTables};
use crate::VarKind;
use std::str::FromStr;

struct Scanner<'a> {
    lines: std::str::Lines<'a>,
    line_no: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Scanner {
            lines: text.lines(),
            line_no: 0,
        }
    }

    /// Return the next data line, skipping comment lines. A blank line is a
    /// valid data line and is returned as `""`.
    fn next_line(&mut self) -> Result<&'a str, Error> {
        loop {
            let line = self.lines.next().ok_or_else(|| Error::Config {
                line: self.line_no + 1,
                message: "unexpected end of file".to_owned(),
            })?;
            self.line_no += 1;
            let trimmed = line.trim_end_matches(['\r', '\n']);
            if trimmed.trim_start().starts_with('#') {
                continue;
            }
            return Ok(trimmed);
        }
    }

    fn next_value<T: FromStr>(&mut self) -> Result<T, Error> {
        let line = self.next_line()?;
        line.trim().parse::<T>().map_err(|_| Error::Config {
            line: self.line_no,
            message: format!("expected a value, got {line:?}"),
        })
    }

    fn next_pair<T: FromStr, U: FromStr>(&mut self) -> Result<(T, U), Error> {
        let line_no = self.line_no + 1;
        let line = self.next_line()?;
        let mut parts = line.split_whitespace();
        let a = parts
            .next()
            .ok_or_else(|| Error::Config {
                line: line_no,
                message: "expected two fields".to_owned(),
            })?
            .parse::<T>()
            .map_err(|_| Error::Config {
                line: line_no,
                message: "could not parse first field".to_owned(),
            })?;
        let b = parts
            .next()
            .ok_or_else(|| Error::Config {
                line: line_no,
                message: "expected two fields".to_owned(),
            })?
            .parse::<U>()
            .map_err(|_| Error::Config {
                line: line_no,
                message: "could not parse second field".to_owned(),
            })?;
        Ok((a, b))
    }

    fn next_triple<T: FromStr, U: FromStr, V: FromStr>(&mut self) -> Result<(T, U, V), Error> {
        let line_no = self.line_no + 1;
        let line = self.next_line()?;
        let mut parts = line.split_whitespace();
        let mut field = || -> Result<&str, Error> {
            parts.next().ok_or_else(|| Error::Config {
                line: line_no,
                message: "expected three fields".to_owned(),
            })
        };
        let a = field()?.parse::<T>().map_err(|_| Error::Config {
            line: line_no,
            message: "could not parse first field".to_owned(),
        })?;
        let b = field()?.parse::<U>().map_err(|_| Error::Config {
            line: line_no,
            message: "could not parse second field".to_owned(),
        })?;
        let c = field()?.parse::<V>().map_err(|_| Error::Config {
            line: line_no,
            message: "could not parse third field".to_owned(),
        })?;
        Ok((a, b, c))
    }

    /// `slave_vr value` where `value` may itself contain whitespace (the
    /// string start-list case); everything after the first token is the
    /// value, trimmed.
    fn next_vr_and_rest(&mut self) -> Result<(u32, String), Error> {
        let line_no = self.line_no + 1;
        let line = self.next_line()?;
        let mut parts = line.splitn(2, char::is_whitespace);
        let vr = parts
            .next()
            .ok_or_else(|| Error::Config {
                line: line_no,
                message: "expected a value reference".to_owned(),
            })?
            .parse::<u32>()
            .map_err(|_| Error::Config {
                line: line_no,
                message: "could not parse value reference".to_owned(),
            })?;
        let rest = parts.next().unwrap_or("").trim().to_owned();
        Ok((vr, rest))
    }
}

fn parse_bool_flag(value: u32, line: usize) -> Result<bool, Error> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(Error::Config {
            line,
            message: format!("expected 0 or 1, got {other}"),
        }),
    }
}

fn parse_wire_list(scanner: &mut Scanner) -> Result<Vec<WireEntry>, Error> {
    let n: usize = scanner.next_value()?;
    (0..n)
        .map(|_| {
            let (container_vr, slave_vr) = scanner.next_pair::<u32, u32>()?;
            Ok(WireEntry {
                container_vr,
                slave_vr,
            })
        })
        .collect()
}

fn parse_start_list<V: FromStr>(scanner: &mut Scanner) -> Result<Vec<(u32, V)>, Error> {
    let n: usize = scanner.next_value()?;
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        let (vr, rest) = scanner.next_vr_and_rest()?;
        let line_no = scanner.line_no;
        let value = rest.parse::<V>().map_err(|_| Error::Config {
            line: line_no,
            message: format!("could not parse start value {rest:?}"),
        })?;
        out.push((vr, value));
    }
    Ok(out)
}

fn parse_fmu_io(scanner: &mut Scanner) -> Result<FmuIo, Error> {
    // In-block: Real, Integer, Boolean, String
    let in_real = parse_wire_list(scanner)?;
    let in_integer = parse_wire_list(scanner)?;
    let in_boolean = parse_wire_list(scanner)?;
    let in_string = parse_wire_list(scanner)?;

    // Start-block: Real, Integer, Boolean, String
    let start_real = parse_start_list::<f64>(scanner)?;
    let start_integer = parse_start_list::<i32>(scanner)?;
    let start_boolean_raw = parse_start_list::<u32>(scanner)?;
    let start_boolean = start_boolean_raw
        .into_iter()
        .map(|(vr, v)| (vr, v != 0))
        .collect();
    let start_string = parse_start_list::<String>(scanner)?;

    // Out-block: Real, Integer, Boolean, String
    let out_real = parse_wire_list(scanner)?;
    let out_integer = parse_wire_list(scanner)?;
    let out_boolean = parse_wire_list(scanner)?;
    let out_string = parse_wire_list(scanner)?;

    Ok(FmuIo {
        real: TypeWiring {
            input: in_real,
            start: start_real,
            output: out_real,
        },
        integer: TypeWiring {
            input: in_integer,
            start: start_integer,
            output: out_integer,
        },
        boolean: TypeWiring {
            input: in_boolean,
            start: start_boolean,
            output: out_boolean,
        },
        string: TypeWiring {
            input: in_string,
            start: start_string,
            output: out_string,
        },
    })
}

fn parse_port_table(scanner: &mut Scanner, kind: VarKind) -> Result<Vec<PortEntry>, Error> {
    let p: usize = scanner.next_value()?;
    (0..p)
        .map(|vr| {
            let line_no = scanner.line_no + 1;
            let (vr_read, slave_index, slave_vr): (usize, isize, u32) = scanner.next_triple()?;
            if vr_read != vr {
                return Err(Error::Config {
                    line: line_no,
                    message: format!(
                        "{kind:?} port table entries must be listed in order (expected vr {vr}, got {vr_read})"
                    ),
                });
            }
            Ok(PortEntry {
                slave_index,
                slave_vr,
            })
        })
        .collect()
}

pub fn parse_str(text: &str) -> Result<ContainerConfig, Error> {
    let mut scanner = Scanner::new(text);

    let mt = parse_bool_flag(scanner.next_value()?, scanner.line_no)?;
    let profiling = parse_bool_flag(scanner.next_value()?, scanner.line_no)?;
    let time_step: f64 = scanner.next_value()?;

    let n_slaves: usize = scanner.next_value()?;
    let mut slaves = Vec::with_capacity(n_slaves);
    for _ in 0..n_slaves {
        let directory = scanner.next_line()?.trim().to_owned();
        let identifier = scanner.next_line()?.trim().to_owned();
        let guid = scanner.next_line()?.trim().to_owned();
        slaves.push(SlaveSpec {
            directory,
            identifier,
            guid,
        });
    }

    let (n_reals, n_integers, n_booleans, n_strings): (usize, usize, usize, usize) = {
        let line_no = scanner.line_no + 1;
        let line = scanner.next_line()?;
        let mut parts = line.split_whitespace();
        let mut next = || -> Result<usize, Error> {
            parts
                .next()
                .ok_or_else(|| Error::Config {
                    line: line_no,
                    message: "expected four local-variable counts".to_owned(),
                })?
                .parse::<usize>()
                .map_err(|_| Error::Config {
                    line: line_no,
                    message: "could not parse a local-variable count".to_owned(),
                })
        };
        (next()?, next()?, next()?, next()?)
    };
    let n_local = PerKind {
        real: n_reals,
        integer: n_integers,
        boolean: n_booleans,
        string: n_strings,
    };

    let port_tables = PortTables {
        tables: PerKind {
            real: parse_port_table(&mut scanner, VarKind::Real)?,
            integer: parse_port_table(&mut scanner, VarKind::Integer)?,
            boolean: parse_port_table(&mut scanner, VarKind::Boolean)?,
            string: parse_port_table(&mut scanner, VarKind::String)?,
        },
    };

    let mut wiring = Vec::with_capacity(n_slaves);
    for _ in 0..n_slaves {
        wiring.push(parse_fmu_io(&mut scanner)?);
    }

    Ok(ContainerConfig {
        mt,
        profiling,
        time_step,
        slaves,
        n_local,
        port_tables,
        wiring,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> String {
        // 2 slaves, wired real VR 0: slave0 out -> slave1 in, no local vars,
        // one real port (VR 0) backed by slave 0's output, start-list empty.
        "\
0
0
1.0e-1
2
slave0
Slave0
guid-0
slave1
Slave1
guid-1
0 0 0 0
1
0 0 0
0
0
0
0
0
0
0
0
0
0
0
1
0 0
0
0
0
1
0 0
0
0
0
0
0
0
0
0
0
0
0
0
"
        .to_owned()
    }

    #[test]
    fn parses_header_and_slave_list() {
        let cfg = parse_str(&sample()).expect("parses");
        assert!(!cfg.mt);
        assert!(!cfg.profiling);
        assert_eq!(cfg.time_step, 0.1);
        assert_eq!(cfg.slaves.len(), 2);
        assert_eq!(cfg.slaves[0].identifier, "Slave0");
        assert_eq!(cfg.slaves[1].guid, "guid-1");
    }

    #[test]
    fn parses_port_table_and_wiring() {
        let cfg = parse_str(&sample()).expect("parses");
        assert_eq!(cfg.port_tables.tables.real.len(), 1);
        assert_eq!(cfg.port_tables.tables.real[0].slave_index, 0);
        assert_eq!(cfg.wiring[1].real.input.len(), 1);
        assert_eq!(cfg.wiring[1].real.input[0].container_vr, 0);
    }

    #[test]
    fn comments_and_blank_significant_lines() {
        let text = "\
# this is a leading comment
1
# mid-file comment
1
2.0e-2
0
0 0 0 0
0
0
0
0
";
        let cfg = parse_str(text).expect("parses");
        assert!(cfg.mt);
        assert!(cfg.profiling);
        assert_eq!(cfg.time_step, 0.02);
        assert!(cfg.slaves.is_empty());
    }

    #[test]
    fn rejects_out_of_order_port_entries() {
        let text = "\
0
0
1.0
0
0 0 0 0
1
1 0 0
0
0
0
";
        let err = parse_str(text).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
