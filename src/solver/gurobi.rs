use grb::{attr, c, param, Status as GrbStatus};
use log::{debug, info};

use super::{MilpSolver, SolveError, Solution, Status};
use crate::config::SolverConfig;
use crate::models::milp::{LinExpr, Model, ModelSense, Sense, VarType};

/// Solves with Gurobi through `grb`
#[derive(Debug, Clone, Copy, Default)]
pub struct GurobiSolver;

impl From<grb::Error> for SolveError {
    fn from(e: grb::Error) -> Self {
        SolveError::Backend(e.to_string())
    }
}

fn status(status: GrbStatus) -> Status {
    match status {
        GrbStatus::Optimal => Status::Optimal,
        GrbStatus::SubOptimal | GrbStatus::SolutionLimit => Status::Feasible,
        GrbStatus::Infeasible => Status::Infeasible,
        GrbStatus::Unbounded => Status::Unbounded,
        GrbStatus::InfOrUnbd => Status::InfeasibleOrUnbounded,
        GrbStatus::TimeLimit => Status::TimeLimit,
        _ => Status::Other,
    }
}

impl MilpSolver for GurobiSolver {
    fn solve(&self, model: &Model, config: &SolverConfig) -> Result<Solution, SolveError> {
        let mut gurobi = grb::Model::new(model.name())?;
        if !config.verbose {
            gurobi.set_param(param::OutputFlag, 0)?;
        }
        if let Some(limit) = config.time_limit {
            gurobi.set_param(param::TimeLimit, limit)?;
        }
        if let Some(gap) = config.mip_gap {
            gurobi.set_param(param::MIPGap, gap)?;
        }

        let columns = model
            .vars()
            .iter()
            .map(|def| {
                let vtype = match def.vtype {
                    VarType::Binary => grb::VarType::Binary,
                    VarType::Integer => grb::VarType::Integer,
                    VarType::Continuous => grb::VarType::Continuous,
                };
                gurobi.add_var(&def.name, vtype, 0.0, def.lb, def.ub, std::iter::empty())
            })
            .collect::<grb::Result<Vec<grb::Var>>>()?;

        let expression = |expr: &LinExpr| {
            let mut e = grb::expr::LinExpr::new();
            for (var, coeff) in expr.terms() {
                e.add_term(*coeff, columns[var.index()]);
            }
            e.add_constant(expr.get_constant());
            e
        };

        for constr in model.constrs() {
            let lhs = expression(&constr.lhs);
            let rhs = constr.rhs;
            let ineq = match constr.sense {
                Sense::Less => c!(lhs <= rhs),
                Sense::Equal => c!(lhs == rhs),
                Sense::Greater => c!(lhs >= rhs),
            };
            gurobi.add_constr(&constr.name, ineq)?;
        }

        let sense = match model.sense() {
            ModelSense::Minimize => grb::ModelSense::Minimize,
            ModelSense::Maximize => grb::ModelSense::Maximize,
        };
        gurobi.set_objective(expression(model.objective()), sense)?;
        gurobi.update()?;
        debug!(
            "Handed {} variables and {} constraints to Gurobi",
            columns.len(),
            model.num_constrs()
        );

        gurobi.optimize()?;
        let status = status(gurobi.status()?);
        info!("Gurobi finished with status {}", status);

        if gurobi.get_attr(attr::SolCount)? == 0 {
            return Ok(Solution::new(status));
        }
        let values = gurobi.get_obj_attr_batch(attr::X, columns)?;
        let objective = gurobi.get_attr(attr::ObjVal)?;
        Ok(Solution::with_values(status, objective, values))
    }

    fn name(&self) -> &'static str {
        "gurobi"
    }
}
