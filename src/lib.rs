pub mod config;
pub mod models;
pub mod parse;
pub mod problem;
pub mod report;
pub mod solver;

use derive_more::{Display, From};

pub use config::{Formulation, SolverConfig};
pub use models::rail::{RailOutcome, RailResults, RailSolver};
pub use parse::{read_problem, InputError};
pub use problem::Problem;
pub use report::Report;
pub use solver::{Backend, MilpSolver, SolveError, Status};

#[derive(Debug, Display, From)]
pub enum Error {
    #[display(fmt = "{}", _0)]
    Input(InputError),
    #[display(fmt = "{}", _0)]
    Solve(SolveError),
    #[display(fmt = "io error: {}", _0)]
    Io(std::io::Error),
    #[display(fmt = "json error: {}", _0)]
    Json(serde_json::Error),
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_convert_with_the_question_mark() {
        fn missing() -> Result<Formulation, Error> {
            Formulation::read("does/not/exist.json")
        }
        assert!(matches!(missing(), Err(Error::Io(_))));

        let err: Error = SolveError::Unsupported("gurobi".to_string()).into();
        assert_eq!(err.to_string(), "solver backend not available: gurobi");
    }
}
