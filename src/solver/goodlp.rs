use good_lp::{
    default_solver, variable, variables, Expression, ResolutionError, Solution as _, SolverModel,
    Variable,
};
use log::{debug, warn};

use super::{MilpSolver, SolveError, Solution, Status};
use crate::config::SolverConfig;
use crate::models::milp::{LinExpr, Model, ModelSense, Sense, VarType};

/// Integer values closer than this to a whole number are rounded to it
const INTEGRALITY: f64 = 1e-6;

/// Solves with the solver `good_lp` was built with, the pure Rust `microlp`
/// unless the `cbc` feature selects COIN-OR CBC.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoodLpSolver;

impl MilpSolver for GoodLpSolver {
    fn solve(&self, model: &Model, config: &SolverConfig) -> Result<Solution, SolveError> {
        if config.time_limit.is_some() || config.mip_gap.is_some() {
            warn!("The good_lp backend ignores the time limit and MIP gap");
        }

        let mut vars = variables!();
        let columns: Vec<Variable> = model
            .vars()
            .iter()
            .map(|def| {
                let mut definition = match def.vtype {
                    VarType::Continuous => variable(),
                    VarType::Integer | VarType::Binary => variable().integer(),
                };
                if def.lb.is_finite() {
                    definition = definition.min(def.lb);
                }
                if def.ub.is_finite() {
                    definition = definition.max(def.ub);
                }
                vars.add(definition)
            })
            .collect();

        let expression = |expr: &LinExpr| -> Expression {
            let mut e: Expression = expr.get_constant().into();
            for (var, coeff) in expr.terms() {
                e += *coeff * columns[var.index()];
            }
            e
        };

        let objective = expression(model.objective());
        let unsolved = match model.sense() {
            ModelSense::Minimize => vars.minimise(objective),
            ModelSense::Maximize => vars.maximise(objective),
        };
        let mut problem = unsolved.using(default_solver);

        for constr in model.constrs() {
            let lhs = expression(&constr.lhs);
            problem = match constr.sense {
                Sense::Less => problem.with(lhs.leq(constr.rhs)),
                Sense::Equal => problem.with(lhs.eq(constr.rhs)),
                Sense::Greater => problem.with(lhs.geq(constr.rhs)),
            };
        }
        debug!(
            "Handed {} variables and {} constraints to good_lp",
            columns.len(),
            model.num_constrs()
        );

        match problem.solve() {
            Ok(solution) => {
                let values: Vec<f64> = columns
                    .iter()
                    .zip(model.vars())
                    .map(|(column, def)| snap(def.vtype, solution.value(*column)))
                    .collect();
                let objective = model.objective().evaluate(&values);
                Ok(Solution::with_values(Status::Optimal, objective, values))
            }
            Err(ResolutionError::Infeasible) => Ok(Solution::new(Status::Infeasible)),
            Err(ResolutionError::Unbounded) => Ok(Solution::new(Status::Unbounded)),
            Err(e) => Err(SolveError::Backend(e.to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "good_lp"
    }
}

/// Rounds integer variables that are within tolerance of a whole number, without leaving a `-0`
fn snap(vtype: VarType, value: f64) -> f64 {
    match vtype {
        VarType::Continuous => value,
        _ if (value - value.round()).abs() < INTEGRALITY => value.round() + 0.0,
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_integer_program() {
        // max x + 2y  s.t.  x + y <= 3.5, y <= 2, x, y integer
        let mut model = Model::new("small");
        let x = model.add_var("x", VarType::Integer, 0.0, f64::INFINITY);
        let y = model.add_var("y", VarType::Integer, 0.0, 2.0);
        model.add_constr("cap", (LinExpr::from(x) + y).leq(3.5));
        model.set_objective(LinExpr::from(x) + 2.0 * y, ModelSense::Maximize);

        let solution = GoodLpSolver.solve(&model, &SolverConfig::default()).unwrap();
        assert_eq!(solution.status, Status::Optimal);
        assert_eq!(solution.value(x), Some(1.0));
        assert_eq!(solution.value(y), Some(2.0));
        assert!((solution.objective.unwrap() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn infeasibility_is_a_status() {
        let mut model = Model::new("infeasible");
        let x = model.add_var("x", VarType::Binary, 0.0, 1.0);
        model.add_constr("low", LinExpr::from(x).geq(2.0));
        model.set_objective(LinExpr::from(x), ModelSense::Minimize);

        let solution = GoodLpSolver.solve(&model, &SolverConfig::default()).unwrap();
        assert_eq!(solution.status, Status::Infeasible);
        assert!(solution.values().is_none());
    }

    #[test]
    fn snapped_zeros_are_positive() {
        let zero = snap(VarType::Integer, -1e-9);
        assert_eq!(zero, 0.0);
        assert!(zero.is_sign_positive());
        assert_eq!(serde_json::to_string(&zero).unwrap(), "0.0");

        assert_eq!(snap(VarType::Binary, 0.9999999), 1.0);
        assert_eq!(snap(VarType::Integer, 0.5), 0.5);
        assert_eq!(snap(VarType::Continuous, -1e-9), -1e-9);
    }
}
