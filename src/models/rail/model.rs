use std::{collections::HashMap, path::Path};

use itertools::iproduct;
use log::{info, warn};

use crate::config::{Formulation, SolverConfig};
use crate::models::milp::{Model, Var, VarType};
use crate::models::utils::{sparse_vars, AddVars, ConvertVars};
use crate::problem::{
    ContainerIndex, CustomerIndex, LocoIndex, NodeIndex, Problem, Quantity, TimeIndex, WagonIndex,
};
use crate::solver::{MilpSolver, SolveError, Status};

use super::check::{self, Violation};
use super::constraints;
use super::sets_and_parameters::{Parameters, Sets};

pub type LegKey<K> = (K, NodeIndex, NodeIndex, TimeIndex);
pub type ContainerKey = (ContainerIndex, CustomerIndex, NodeIndex);

pub struct RailSolver {}

#[allow(non_snake_case)]
impl RailSolver {
    pub fn build(
        sets: &Sets,
        parameters: &Parameters,
        formulation: &Formulation,
    ) -> (Model, Variables) {
        info!("Building rail service model.");

        let mut model = Model::new("rail_service");

        //*****************CREATE VARIABLES*****************//
        let locos = sets.L.len();
        let wagons = sets.W.len();
        let nodes = sets.N.len();
        let timesteps = sets.T.len();
        let legs = sets.network.legs();

        // 1 if a service of locomotive type l leaves i for j in period t
        let x = sparse_vars(
            iproduct!(&sets.L, legs, &sets.T).map(|(l, leg, t)| (*l, leg.from, leg.to, *t)),
            &mut model,
            VarType::Binary,
            &(0.0..1.0),
            "x",
        );
        // Locomotives of type l stationed at node i at the end of period t
        let m = (locos, nodes, timesteps).integer(&mut model, "m");
        // Wagons of type w leaving i for j in period t
        let wm = sparse_vars(
            iproduct!(&sets.W, legs, &sets.T).map(|(w, leg, t)| (*w, leg.from, leg.to, *t)),
            &mut model,
            VarType::Integer,
            &(0.0..f64::INFINITY),
            "wm",
        );
        // Wagons of type w stationed at node i at the end of period t
        let ws = (wagons, nodes, timesteps).integer(&mut model, "ws");
        // Containers of type c for customer g and destination d leaving i for j in period t
        let cm = sparse_vars(
            iproduct!(&sets.C, &sets.G, &sets.D, legs, &sets.T)
                .map(|(c, g, d, leg, t)| (*c, *g, *d, leg.from, leg.to, *t)),
            &mut model,
            VarType::Integer,
            &(0.0..f64::INFINITY),
            "cm",
        );
        // Containers of type c for customer g and destination d held at i at the end of period t
        let cs = sparse_vars(
            iproduct!(&sets.C, &sets.G, &sets.D, &sets.N, &sets.T)
                .map(|(c, g, d, i, t)| (*c, *g, *d, *i, *t)),
            &mut model,
            VarType::Integer,
            &(0.0..f64::INFINITY),
            "cs",
        );

        let variables = Variables {
            x,
            m,
            wm,
            ws,
            cm,
            cs,
        };

        info!(
            "Created {} variables, {} of them integer",
            model.num_vars(),
            model.num_integer_vars()
        );

        //*****************ADD CONSTRAINTS*****************//
        constraints::add_constraints(&mut model, sets, parameters, formulation, &variables);
        constraints::set_objective(&mut model, sets, parameters, formulation, &variables);

        info!(
            "Successfully built rail service model with {} constraints",
            model.num_constrs()
        );

        (model, variables)
    }

    pub fn solve(
        problem: &Problem,
        formulation: &Formulation,
        solver: &dyn MilpSolver,
        config: &SolverConfig,
    ) -> Result<RailOutcome, SolveError> {
        let sets = Sets::new(problem, formulation);
        let parameters = Parameters::new(problem, &sets);
        let (model, variables) = RailSolver::build(&sets, &parameters, formulation);

        info!("Solving {} with {}", problem.name(), solver.name());
        let solution = solver.solve(&model, config)?;
        info!("Solver finished with status {}", solution.status);

        let (results, violations) = match solution.values() {
            Some(values) => {
                let results = RailResults::new(&variables, values);
                let mut violations = check::model_violations(&model, values);
                violations.extend(check::audit(&sets, &parameters, formulation, &results));
                for violation in &violations {
                    warn!("{}", violation);
                }
                (Some(results), violations)
            }
            None => (None, Vec::new()),
        };

        Ok(RailOutcome {
            sets,
            parameters,
            status: solution.status,
            objective: solution.objective,
            results,
            violations,
        })
    }

    pub fn build_and_write<P: AsRef<Path>>(
        problem: &Problem,
        formulation: &Formulation,
        path: P,
    ) -> std::io::Result<()> {
        let sets = Sets::new(problem, formulation);
        info!("Timesteps: {} Nodes: {}", sets.T.len(), sets.N.len());
        let parameters = Parameters::new(problem, &sets);
        let (model, _) = RailSolver::build(&sets, &parameters, formulation);
        model.write(path)
    }
}

/// Everything a solve produced, together with the sets and parameters it was built from
pub struct RailOutcome {
    pub sets: Sets,
    pub parameters: Parameters,
    pub status: Status,
    pub objective: Option<f64>,
    /// `None` unless the solver returned a solution
    pub results: Option<RailResults>,
    /// Invariants the returned solution breaks, if any
    pub violations: Vec<Violation>,
}

pub struct Variables {
    pub x: HashMap<LegKey<LocoIndex>, Var>,
    pub m: Vec<Vec<Vec<Var>>>,
    pub wm: HashMap<LegKey<WagonIndex>, Var>,
    pub ws: Vec<Vec<Vec<Var>>>,
    pub cm: HashMap<(ContainerIndex, CustomerIndex, NodeIndex, NodeIndex, NodeIndex, TimeIndex), Var>,
    pub cs: HashMap<(ContainerIndex, CustomerIndex, NodeIndex, NodeIndex, TimeIndex), Var>,
}

impl Variables {
    pub fn depart(&self, l: LocoIndex, i: NodeIndex, j: NodeIndex, t: TimeIndex) -> Option<Var> {
        self.x.get(&(l, i, j, t)).copied()
    }

    pub fn loco_stock(&self, l: LocoIndex, i: NodeIndex, t: TimeIndex) -> Var {
        self.m[*l][*i][t]
    }

    pub fn wagon_move(&self, w: WagonIndex, i: NodeIndex, j: NodeIndex, t: TimeIndex) -> Option<Var> {
        self.wm.get(&(w, i, j, t)).copied()
    }

    pub fn wagon_stock(&self, w: WagonIndex, i: NodeIndex, t: TimeIndex) -> Var {
        self.ws[*w][*i][t]
    }

    pub fn container_move(
        &self,
        (c, g, d): ContainerKey,
        i: NodeIndex,
        j: NodeIndex,
        t: TimeIndex,
    ) -> Option<Var> {
        self.cm.get(&(c, g, d, i, j, t)).copied()
    }

    pub fn container_stock(&self, (c, g, d): ContainerKey, i: NodeIndex, t: TimeIndex) -> Option<Var> {
        self.cs.get(&(c, g, d, i, t)).copied()
    }
}

/// Variable values of a solved model. Values of variables that were never
/// created (infeasible legs, non-destinations) read as 0.
#[derive(Debug, Clone)]
pub struct RailResults {
    x: HashMap<LegKey<LocoIndex>, f64>,
    m: Vec<Vec<Vec<f64>>>,
    wm: HashMap<LegKey<WagonIndex>, f64>,
    ws: Vec<Vec<Vec<f64>>>,
    cm: HashMap<(ContainerIndex, CustomerIndex, NodeIndex, NodeIndex, NodeIndex, TimeIndex), f64>,
    cs: HashMap<(ContainerIndex, CustomerIndex, NodeIndex, NodeIndex, TimeIndex), f64>,
}

impl RailResults {
    pub fn new(variables: &Variables, values: &[f64]) -> RailResults {
        RailResults {
            x: variables.x.convert(values),
            m: variables.m.convert(values),
            wm: variables.wm.convert(values),
            ws: variables.ws.convert(values),
            cm: variables.cm.convert(values),
            cs: variables.cs.convert(values),
        }
    }

    pub fn depart(&self, l: LocoIndex, i: NodeIndex, j: NodeIndex, t: TimeIndex) -> f64 {
        self.x.get(&(l, i, j, t)).copied().unwrap_or(0.0)
    }

    pub fn loco_stock(&self, l: LocoIndex, i: NodeIndex, t: TimeIndex) -> Quantity {
        self.m[*l][*i][t]
    }

    pub fn wagon_move(&self, w: WagonIndex, i: NodeIndex, j: NodeIndex, t: TimeIndex) -> Quantity {
        self.wm.get(&(w, i, j, t)).copied().unwrap_or(0.0)
    }

    pub fn wagon_stock(&self, w: WagonIndex, i: NodeIndex, t: TimeIndex) -> Quantity {
        self.ws[*w][*i][t]
    }

    pub fn container_move(
        &self,
        (c, g, d): ContainerKey,
        i: NodeIndex,
        j: NodeIndex,
        t: TimeIndex,
    ) -> Quantity {
        self.cm.get(&(c, g, d, i, j, t)).copied().unwrap_or(0.0)
    }

    pub fn container_stock(&self, (c, g, d): ContainerKey, i: NodeIndex, t: TimeIndex) -> Quantity {
        self.cs.get(&(c, g, d, i, t)).copied().unwrap_or(0.0)
    }

    /// Overwrite a locomotive stock value
    pub fn set_loco_stock(&mut self, l: LocoIndex, i: NodeIndex, t: TimeIndex, value: Quantity) {
        self.m[*l][*i][t] = value;
    }

    /// Overwrite a wagon movement value
    pub fn set_wagon_move(
        &mut self,
        w: WagonIndex,
        i: NodeIndex,
        j: NodeIndex,
        t: TimeIndex,
        value: Quantity,
    ) {
        self.wm.insert((w, i, j, t), value);
    }

    /// Overwrite a container stock value
    pub fn set_container_stock(
        &mut self,
        (c, g, d): ContainerKey,
        i: NodeIndex,
        t: TimeIndex,
        value: Quantity,
    ) {
        self.cs.insert((c, g, d, i, t), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DemandRule, FleetBalance};
    use crate::models::rail::fixtures::chain;
    use crate::solver::GoodLpSolver;
    use serde_json::json;

    fn open_chain() -> Formulation {
        Formulation {
            cyclic_closure: false,
            delivery_deadlines: true,
            ..Formulation::cost_variant()
        }
    }

    fn solve(problem: &Problem, formulation: &Formulation) -> RailOutcome {
        RailSolver::solve(
            problem,
            formulation,
            &GoodLpSolver::default(),
            &SolverConfig::default(),
        )
        .unwrap()
    }

    fn node(problem: &Problem, label: &str) -> NodeIndex {
        problem.node(label).unwrap()
    }

    #[test]
    fn variables_exist_only_on_feasible_legs() {
        let problem = chain(json!({}));
        let formulation = open_chain();
        let sets = Sets::new(&problem, &formulation);
        let parameters = Parameters::new(&problem, &sets);
        let (model, variables) = RailSolver::build(&sets, &parameters, &formulation);

        let (a, b, d) = (node(&problem, "A"), node(&problem, "B"), node(&problem, "D"));
        let l = LocoIndex::from(0);

        // 3 legs, 5 periods
        assert_eq!(variables.x.len(), 15);
        assert!(variables.depart(l, a, b, 0).is_some());
        assert!(variables.depart(l, b, a, 0).is_none());
        assert!(variables.depart(l, a, d, 0).is_none());
        // containers are only tracked towards the destination D
        assert_eq!(variables.cs.len(), 4 * 5);
        assert!(model.constrs().iter().all(|c| !c.name.starts_with("closure")));
    }

    #[test]
    fn chain_is_served_on_time_at_minimum_cost() {
        let problem = chain(json!({}));
        let outcome = solve(&problem, &open_chain());

        assert_eq!(outcome.status, Status::Optimal);
        // three services at 100 and three wagon moves at 10
        assert!((outcome.objective.unwrap() - 330.0).abs() < 1e-6);

        let results = outcome.results.unwrap();
        let n = |label| node(&problem, label);
        let l = LocoIndex::from(0);
        assert_eq!(results.depart(l, n("A"), n("B"), 0).round(), 1.0);
        assert_eq!(results.depart(l, n("B"), n("C"), 1).round(), 1.0);
        assert_eq!(results.depart(l, n("C"), n("D"), 2).round(), 1.0);

        let key = (ContainerIndex::from(0), CustomerIndex::from(0), n("D"));
        assert_eq!(results.container_stock(key, n("D"), 3).round(), 1.0);
        assert!(outcome.violations.is_empty());
    }

    #[test]
    fn one_way_chain_cannot_close_the_cycle() {
        let problem = chain(json!({}));
        let formulation = Formulation {
            cyclic_closure: true,
            ..open_chain()
        };
        let outcome = solve(&problem, &formulation);

        assert_eq!(outcome.status, Status::Infeasible);
        assert!(outcome.results.is_none());
        assert!(outcome.objective.is_none());
    }

    #[test]
    fn exact_fleet_balance_rejects_more_locos_than_owned() {
        let problem = chain(json!({
            "owned_locos": [ { "key": ["Diesel"], "value": 0 } ]
        }));
        let outcome = solve(&problem, &open_chain());
        assert_eq!(outcome.status, Status::Infeasible);
    }

    #[test]
    fn revenue_variant_tolerates_spare_fleet() {
        let problem = chain(json!({
            "owned_locos": [ { "key": ["Diesel"], "value": 3 } ]
        }));
        let formulation = Formulation {
            objective: crate::config::ObjectiveKind::MaximizeRevenue,
            fleet_balance: FleetBalance::AtMost,
            demand: DemandRule::AtLeast,
            ..open_chain()
        };
        let outcome = solve(&problem, &formulation);

        assert_eq!(outcome.status, Status::Optimal);
        // revenue of the delivered container less the cost of moving it
        assert!((outcome.objective.unwrap() - 670.0).abs() < 1e-6);
    }

    #[test]
    fn destination_storage_must_hold_the_delivery() {
        let capacity = |d: u32| {
            json!({
                "container_capacity": [
                    { "key": ["A"], "value": 2 }, { "key": ["B"], "value": 2 },
                    { "key": ["C"], "value": 2 }, { "key": ["D"], "value": d }
                ]
            })
        };

        let tight = solve(&chain(capacity(1)), &open_chain());
        assert_eq!(tight.status, Status::Optimal);
        assert!(tight.violations.is_empty());

        // a full terminal at D leaves nowhere to put the delivered container
        let full = solve(&chain(capacity(0)), &open_chain());
        assert_eq!(full.status, Status::Infeasible);
        assert!(full.results.is_none());
    }

    #[test]
    fn written_model_names_every_family() {
        let problem = chain(json!({}));
        let path = std::env::temp_dir().join("rso_chain_model.lp");
        RailSolver::build_and_write(&problem, &Formulation::cost_variant(), &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        for family in ["loco_balance_", "closure_loco_", "fleet_loco_", "wagon_mix_1_", "demand_"] {
            assert!(text.contains(family), "missing {}", family);
        }
        std::fs::remove_file(path).unwrap();
    }
}
