//! Solution tables, one per variable family, indexed by resource and route over time.

use std::{fmt, fs::File, io::BufWriter, path::Path};

use chrono::Utc;
use itertools::iproduct;
use serde::Serialize;

use crate::models::rail::model::RailOutcome;
use crate::problem::{ContainerIndex, CustomerIndex, LocoIndex, NodeIndex, Problem, WagonIndex};
use crate::solver::Status;

/// One row of a table, the value of a variable in every period
#[derive(Debug, Clone, Serialize)]
pub struct ResultRow {
    pub label: String,
    pub values: Vec<f64>,
}

impl ResultRow {
    pub fn is_active(&self) -> bool {
        self.values.iter().any(|v| v.abs() > 1e-9)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultTable {
    pub variable: String,
    pub rows: Vec<ResultRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub instance: String,
    /// When the report was generated, RFC 3339
    pub generated: String,
    pub status: Status,
    pub objective: Option<f64>,
    pub periods: usize,
    pub violations: Vec<String>,
    pub tables: Vec<ResultTable>,
}

impl Report {
    pub fn new(problem: &Problem, outcome: &RailOutcome) -> Report {
        let sets = &outcome.sets;
        let node = |i: NodeIndex| problem.nodes()[*i].as_str();
        let loco = |l: LocoIndex| problem.loco_types()[*l].as_str();
        let wagon = |w: WagonIndex| problem.wagon_types()[*w].as_str();
        let commodity = |(c, g, d): (ContainerIndex, CustomerIndex, NodeIndex)| {
            format!(
                "{} {} to {}",
                problem.container_types()[*c],
                problem.customers()[*g],
                node(d)
            )
        };

        let mut tables = Vec::new();
        if let Some(results) = &outcome.results {
            let legs = sets.network.legs();
            let row = |label: String, value: &dyn Fn(usize) -> f64| ResultRow {
                label,
                values: sets.T.iter().map(|t| value(*t)).collect(),
            };

            tables.push(ResultTable {
                variable: "Depart".to_string(),
                rows: iproduct!(&sets.L, legs)
                    .map(|(l, leg)| {
                        row(
                            format!("{} {}->{}", loco(*l), node(leg.from), node(leg.to)),
                            &|t| results.depart(*l, leg.from, leg.to, t),
                        )
                    })
                    .collect(),
            });
            tables.push(ResultTable {
                variable: "LocoStock".to_string(),
                rows: iproduct!(&sets.L, &sets.N)
                    .map(|(l, i)| {
                        row(
                            format!("{} @ {}", loco(*l), node(*i)),
                            &|t| results.loco_stock(*l, *i, t),
                        )
                    })
                    .collect(),
            });
            tables.push(ResultTable {
                variable: "WagonMove".to_string(),
                rows: iproduct!(&sets.W, legs)
                    .map(|(w, leg)| {
                        row(
                            format!("{} {}->{}", wagon(*w), node(leg.from), node(leg.to)),
                            &|t| results.wagon_move(*w, leg.from, leg.to, t),
                        )
                    })
                    .collect(),
            });
            tables.push(ResultTable {
                variable: "WagonStock".to_string(),
                rows: iproduct!(&sets.W, &sets.N)
                    .map(|(w, i)| {
                        row(
                            format!("{} @ {}", wagon(*w), node(*i)),
                            &|t| results.wagon_stock(*w, *i, t),
                        )
                    })
                    .collect(),
            });
            tables.push(ResultTable {
                variable: "ContainerMove".to_string(),
                rows: iproduct!(&sets.C, &sets.G, &sets.D, legs)
                    .map(|(c, g, d, leg)| {
                        let key = (*c, *g, *d);
                        row(
                            format!("{} {}->{}", commodity(key), node(leg.from), node(leg.to)),
                            &|t| results.container_move(key, leg.from, leg.to, t),
                        )
                    })
                    .collect(),
            });
            tables.push(ResultTable {
                variable: "ContainerStock".to_string(),
                rows: iproduct!(&sets.C, &sets.G, &sets.D, &sets.N)
                    .map(|(c, g, d, i)| {
                        let key = (*c, *g, *d);
                        row(
                            format!("{} @ {}", commodity(key), node(*i)),
                            &|t| results.container_stock(key, *i, t),
                        )
                    })
                    .collect(),
            });
        }

        Report {
            instance: problem.name().to_string(),
            generated: Utc::now().to_rfc3339(),
            status: outcome.status,
            objective: outcome.objective,
            periods: sets.T.len(),
            violations: outcome.violations.iter().map(|v| v.to_string()).collect(),
            tables,
        }
    }

    /// True if the solve ended without a plan
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// The table of the given variable family
    pub fn table(&self, variable: &str) -> Option<&ResultTable> {
        self.tables.iter().find(|table| table.variable == variable)
    }

    /// Plain text rendering, `[n]` marks a non-zero cell and `.` a zero one
    pub fn render(&self) -> String {
        self.to_string()
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<(), crate::Error> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }
}

fn cell(value: f64) -> String {
    if value.abs() > 1e-9 {
        format!("[{}]", value)
    } else {
        ".".to_string()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.instance, self.status)?;
        if let Some(objective) = self.objective {
            write!(f, ", objective {}", objective)?;
        }
        writeln!(f)?;
        for violation in &self.violations {
            writeln!(f, "! {}", violation)?;
        }

        for table in &self.tables {
            let width = table.rows.iter().map(|r| r.label.len()).max().unwrap_or(0);
            writeln!(f)?;
            write!(f, "{:width$} ", table.variable, width = width)?;
            for t in 0..self.periods {
                write!(f, " {:>5}", t)?;
            }
            writeln!(f)?;
            for row in &table.rows {
                write!(f, "{:width$} ", row.label, width = width)?;
                for value in &row.values {
                    write!(f, " {:>5}", cell(*value))?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Formulation, SolverConfig};
    use crate::models::rail::fixtures::chain;
    use crate::models::rail::model::RailSolver;
    use crate::solver::GoodLpSolver;
    use serde_json::json;

    fn report(formulation: Formulation) -> Report {
        let problem = chain(json!({}));
        let outcome = RailSolver::solve(
            &problem,
            &formulation,
            &GoodLpSolver::default(),
            &SolverConfig::default(),
        )
        .unwrap();
        Report::new(&problem, &outcome)
    }

    fn open_chain() -> Formulation {
        Formulation {
            cyclic_closure: false,
            delivery_deadlines: true,
            ..Formulation::cost_variant()
        }
    }

    #[test]
    fn active_cells_are_highlighted() {
        let report = report(open_chain());
        let departs = report.table("Depart").unwrap();

        // one row per feasible leg
        assert_eq!(departs.rows.len(), 3);
        assert!(departs.rows.iter().all(|row| row.is_active()));
        assert_eq!(departs.rows[0].label, "Diesel A->B");
        assert_eq!(departs.rows[0].values, vec![1.0, 0.0, 0.0, 0.0, 0.0]);

        let text = report.render();
        assert!(text.starts_with("four-node-chain: optimal, objective 330"));
        assert!(text.contains("Diesel A->B    [1]     .     .     .     ."));
        assert!(text.contains("ContainerStock"));
    }

    #[test]
    fn infeasible_solves_have_no_tables() {
        let report = report(Formulation::cost_variant());
        assert_eq!(report.status, Status::Infeasible);
        assert!(report.is_empty());
        assert!(report.objective.is_none());
        assert_eq!(report.render().trim_end(), "four-node-chain: infeasible");
    }

    #[test]
    fn json_carries_status_and_tables() {
        let report = report(open_chain());
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["status"], "optimal");
        assert_eq!(value["periods"], 5);
        assert_eq!(value["tables"][0]["variable"], "Depart");
        assert!(value["generated"].as_str().unwrap().contains('T'));
    }
}
