//! Backends that solve a [`Model`](crate::models::milp::Model).
//!
//! Every backend reports a [`Status`]. Infeasible, unbounded and interrupted
//! solves are statuses, not errors. [`SolveError`] is reserved for a backend
//! that could not run at all.

mod goodlp;
#[cfg(feature = "gurobi")]
mod gurobi;

use std::str::FromStr;

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::config::SolverConfig;
use crate::models::milp::{Model, Var};

pub use goodlp::GoodLpSolver;
#[cfg(feature = "gurobi")]
pub use gurobi::GurobiSolver;

pub trait MilpSolver {
    fn solve(&self, model: &Model, config: &SolverConfig) -> Result<Solution, SolveError>;

    /// Name of the backend, for logging
    fn name(&self) -> &'static str;
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[display(fmt = "optimal")]
    Optimal,
    /// A solution was found, but not proven optimal
    #[display(fmt = "feasible")]
    Feasible,
    #[display(fmt = "infeasible")]
    Infeasible,
    #[display(fmt = "unbounded")]
    Unbounded,
    #[display(fmt = "infeasible or unbounded")]
    InfeasibleOrUnbounded,
    /// Stopped at the time limit, possibly with a solution
    #[display(fmt = "time limit reached")]
    TimeLimit,
    #[display(fmt = "other")]
    Other,
}

#[derive(Debug, Clone)]
pub struct Solution {
    pub status: Status,
    /// Objective value of the returned solution, if there is one
    pub objective: Option<f64>,
    values: Vec<f64>,
}

impl Solution {
    /// A solve that ended without a solution
    pub fn new(status: Status) -> Solution {
        Solution {
            status,
            objective: None,
            values: Vec::new(),
        }
    }

    /// A solve that ended with the given values, one per model variable
    pub fn with_values(status: Status, objective: f64, values: Vec<f64>) -> Solution {
        Solution {
            status,
            objective: Some(objective),
            values,
        }
    }

    pub fn is_feasible(&self) -> bool {
        !self.values.is_empty()
    }

    /// The values of the solution if it has any
    pub fn values(&self) -> Option<&[f64]> {
        if self.is_feasible() {
            Some(&self.values)
        } else {
            None
        }
    }

    pub fn value(&self, var: Var) -> Option<f64> {
        self.values.get(var.index()).copied()
    }
}

#[derive(Debug, Display)]
pub enum SolveError {
    #[display(fmt = "solver backend failed: {}", _0)]
    Backend(String),
    #[display(fmt = "solver backend not available: {}", _0)]
    Unsupported(String),
}

impl std::error::Error for SolveError {}

/// The backends that can be chosen at run time
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    #[display(fmt = "good-lp")]
    GoodLp,
    #[display(fmt = "gurobi")]
    Gurobi,
}

impl Default for Backend {
    fn default() -> Self {
        Backend::GoodLp
    }
}

impl FromStr for Backend {
    type Err = SolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "good-lp" | "good_lp" => Ok(Backend::GoodLp),
            "gurobi" => Ok(Backend::Gurobi),
            _ => Err(SolveError::Unsupported(s.to_string())),
        }
    }
}

impl Backend {
    pub fn create(self) -> Result<Box<dyn MilpSolver>, SolveError> {
        match self {
            Backend::GoodLp => Ok(Box::new(GoodLpSolver::default())),
            #[cfg(feature = "gurobi")]
            Backend::Gurobi => Ok(Box::new(GurobiSolver::default())),
            #[cfg(not(feature = "gurobi"))]
            Backend::Gurobi => Err(SolveError::Unsupported(
                "rso was built without the `gurobi` feature".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solutions_without_values_are_not_feasible() {
        let infeasible = Solution::new(Status::Infeasible);
        assert!(!infeasible.is_feasible());
        assert!(infeasible.values().is_none());
        assert!(infeasible.objective.is_none());

        let feasible = Solution::with_values(Status::TimeLimit, 4.0, vec![1.0, 3.0]);
        assert!(feasible.is_feasible());
        assert_eq!(feasible.values(), Some(&[1.0, 3.0][..]));
    }

    #[test]
    fn backends_parse_from_their_names() {
        assert_eq!("good-lp".parse::<Backend>().unwrap(), Backend::GoodLp);
        assert_eq!("gurobi".parse::<Backend>().unwrap(), Backend::Gurobi);
        assert!("cplex".parse::<Backend>().is_err());
        assert_eq!(Backend::default().to_string(), "good-lp");
    }

    #[cfg(not(feature = "gurobi"))]
    #[test]
    fn gurobi_needs_its_feature() {
        assert!(matches!(
            Backend::Gurobi.create(),
            Err(SolveError::Unsupported(_))
        ));
    }
}
