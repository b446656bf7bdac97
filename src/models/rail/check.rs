//! Independent audit of a solution.
//!
//! The invariants of the model are re-derived from the extracted values, without
//! looking at the constraints that were handed to the solver.

use std::fmt;

use itertools::iproduct;
use log::debug;

use crate::config::{DemandRule, FleetBalance, Formulation};
use crate::models::milp::Model;
use crate::problem::{ContainerIndex, NodeIndex, Quantity, TimeIndex, WagonIndex};

use super::model::RailResults;
use super::sets_and_parameters::{Parameters, Sets};

/// Largest deviation that is still read as satisfied
pub const TOLERANCE: f64 = 1e-5;

#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// The rule that is broken
    pub rule: &'static str,
    /// Where it is broken
    pub detail: String,
    /// By how much
    pub amount: f64,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} violated at {} by {}", self.rule, self.detail, self.amount)
    }
}

struct Audit {
    violations: Vec<Violation>,
}

impl Audit {
    fn equal(&mut self, rule: &'static str, detail: impl FnOnce() -> String, lhs: f64, rhs: f64) {
        let amount = (lhs - rhs).abs();
        if amount > TOLERANCE {
            self.push(rule, detail(), amount);
        }
    }

    fn at_most(&mut self, rule: &'static str, detail: impl FnOnce() -> String, lhs: f64, rhs: f64) {
        if lhs - rhs > TOLERANCE {
            self.push(rule, detail(), lhs - rhs);
        }
    }

    fn push(&mut self, rule: &'static str, detail: String, amount: f64) {
        debug!("{} violated at {} by {}", rule, detail, amount);
        self.violations.push(Violation {
            rule,
            detail,
            amount,
        });
    }
}

/// Every invariant `results` break, empty for a valid plan
pub fn audit(
    sets: &Sets,
    parameters: &Parameters,
    formulation: &Formulation,
    results: &RailResults,
) -> Vec<Violation> {
    let mut audit = Audit {
        violations: Vec::new(),
    };

    conservation(&mut audit, sets, parameters, results);
    if formulation.cyclic_closure {
        closure(&mut audit, sets, parameters, results);
    }
    fleet(&mut audit, sets, parameters, formulation, results);
    storage(&mut audit, sets, parameters, results);
    if formulation.wagon_mix.is_some() {
        wagon_mix(&mut audit, sets, results);
    }
    demand(&mut audit, sets, parameters, formulation, results);

    audit.violations
}

/// Net inflow over the legs into `i` at `t`, given the movement on each leg and departure
fn net_inflow<F>(sets: &Sets, i: NodeIndex, t: TimeIndex, moved: F) -> Quantity
where
    F: Fn(NodeIndex, NodeIndex, TimeIndex) -> Quantity,
{
    let arrivals: Quantity = sets
        .network
        .incoming(i)
        .filter_map(|leg| leg.departure_for_arrival(t).map(|s| moved(leg.from, i, s)))
        .sum();
    let departures: Quantity = sets
        .network
        .outgoing(i)
        .map(|leg| moved(i, leg.to, t))
        .sum();
    arrivals - departures
}

/// Constraints of `model` that `values` break, and the worst integrality gap
pub fn model_violations(model: &Model, values: &[f64]) -> Vec<Violation> {
    let mut audit = Audit {
        violations: Vec::new(),
    };

    for constr in model.violated(values, TOLERANCE) {
        audit.push("model constraint", constr.name.clone(), constr.violation(values));
    }
    let integrality = model.max_integrality_violation(values);
    if integrality > TOLERANCE {
        audit.push("integrality", model.name().to_string(), integrality);
    }
    debug!(
        "Largest constraint violation of the solution is {}",
        model.max_violation(values)
    );

    audit.violations
}

fn conservation(audit: &mut Audit, sets: &Sets, parameters: &Parameters, results: &RailResults) {
    for (l, i, t) in iproduct!(&sets.L, &sets.N, &sets.T) {
        let (l, i, t) = (*l, *i, *t);
        let previous = match t {
            0 => parameters.initial_locos[l][i],
            _ => results.loco_stock(l, i, t - 1),
        };
        let inflow = net_inflow(sets, i, t, |a, b, s| results.depart(l, a, b, s));
        audit.equal(
            "loco conservation",
            || format!("loco type {} at node {} in period {}", l, i, t),
            results.loco_stock(l, i, t),
            previous + inflow,
        );
    }

    for (w, i, t) in iproduct!(&sets.W, &sets.N, &sets.T) {
        let (w, i, t) = (*w, *i, *t);
        let previous = match t {
            0 => parameters.initial_wagons[w][i],
            _ => results.wagon_stock(w, i, t - 1),
        };
        let inflow = net_inflow(sets, i, t, |a, b, s| results.wagon_move(w, a, b, s));
        audit.equal(
            "wagon conservation",
            || format!("wagon type {} at node {} in period {}", w, i, t),
            results.wagon_stock(w, i, t),
            previous + inflow,
        );
    }

    for (c, g, d, i, t) in iproduct!(&sets.C, &sets.G, &sets.D, &sets.N, &sets.T) {
        let (key, i, t) = ((*c, *g, *d), *i, *t);
        let previous = match t {
            0 => 0.0,
            _ => results.container_stock(key, i, t - 1),
        };
        let supply = parameters.supply.get(&(*c, *g, i, *d, t));
        let inflow = net_inflow(sets, i, t, |a, b, s| results.container_move(key, a, b, s));
        audit.equal(
            "container conservation",
            || format!("container {:?} at node {} in period {}", key, i, t),
            results.container_stock(key, i, t),
            previous + supply + inflow,
        );
    }
}

fn closure(audit: &mut Audit, sets: &Sets, parameters: &Parameters, results: &RailResults) {
    let last = sets.last_period();
    for (l, i) in iproduct!(&sets.L, &sets.N) {
        audit.equal(
            "cyclic closure",
            || format!("loco type {} at node {}", l, i),
            results.loco_stock(*l, *i, last),
            parameters.initial_locos[*l][*i],
        );
    }
    for (w, i) in iproduct!(&sets.W, &sets.N) {
        audit.equal(
            "cyclic closure",
            || format!("wagon type {} at node {}", w, i),
            results.wagon_stock(*w, *i, last),
            parameters.initial_wagons[*w][*i],
        );
    }
}

fn fleet(
    audit: &mut Audit,
    sets: &Sets,
    parameters: &Parameters,
    formulation: &Formulation,
    results: &RailResults,
) {
    let legs = sets.network.legs();
    let mut check = |detail: String, fleet: f64, owned: f64| match formulation.fleet_balance {
        FleetBalance::Exact => audit.equal("fleet size", || detail, fleet, owned),
        FleetBalance::AtMost => audit.at_most("fleet size", || detail, fleet, owned),
    };

    for (l, t) in iproduct!(&sets.L, &sets.T) {
        let (l, t) = (*l, *t);
        let in_transit: Quantity = legs
            .iter()
            .flat_map(|leg| leg.in_transit(t).map(move |s| (leg, s)))
            .map(|(leg, s)| results.depart(l, leg.from, leg.to, s))
            .sum();
        let stationed: Quantity = sets.N.iter().map(|i| results.loco_stock(l, *i, t)).sum();
        check(
            format!("loco type {} in period {}", l, t),
            in_transit + stationed,
            parameters.owned_locos[l],
        );
    }

    for (w, t) in iproduct!(&sets.W, &sets.T) {
        let (w, t) = (*w, *t);
        let in_transit: Quantity = legs
            .iter()
            .flat_map(|leg| leg.in_transit(t).map(move |s| (leg, s)))
            .map(|(leg, s)| results.wagon_move(w, leg.from, leg.to, s))
            .sum();
        let stationed: Quantity = sets.N.iter().map(|i| results.wagon_stock(w, *i, t)).sum();
        check(
            format!("wagon type {} in period {}", w, t),
            in_transit + stationed,
            parameters.owned_wagons[w],
        );
    }
}

fn storage(audit: &mut Audit, sets: &Sets, parameters: &Parameters, results: &RailResults) {
    for (i, t) in iproduct!(&sets.N, &sets.T) {
        let (i, t) = (*i, *t);
        let containers: Quantity = iproduct!(&sets.C, &sets.G, &sets.D)
            .map(|(c, g, d)| results.container_stock((*c, *g, *d), i, t))
            .sum();
        let locos: Quantity = sets.L.iter().map(|l| results.loco_stock(*l, i, t)).sum();
        let wagons: Quantity = sets.W.iter().map(|w| results.wagon_stock(*w, i, t)).sum();

        let detail = || format!("node {} in period {}", i, t);
        audit.at_most("container storage", detail, containers, parameters.container_capacity[i]);
        audit.at_most("loco storage", detail, locos, parameters.loco_capacity[i]);
        audit.at_most("wagon storage", detail, wagons, parameters.wagon_capacity[i]);
    }
}

fn wagon_mix(audit: &mut Audit, sets: &Sets, results: &RailResults) {
    let mix = match sets.mix {
        Some(mix) => mix,
        None => return,
    };

    for (leg, t) in iproduct!(sets.network.legs(), &sets.T) {
        let (i, j, t) = (leg.from, leg.to, *t);
        let wagons = |w: Option<WagonIndex>| w.map(|w| results.wagon_move(w, i, j, t)).unwrap_or(0.0);
        let containers = |c: Option<ContainerIndex>| match c {
            Some(c) => iproduct!(&sets.G, &sets.D)
                .map(|(g, d)| results.container_move((c, *g, *d), i, j, t))
                .sum::<Quantity>(),
            None => 0.0,
        };

        let long_wagons = wagons(mix.long_wagon);
        let short_wagons = wagons(mix.short_wagon);
        let long_containers = containers(mix.long_container);
        let short_containers = containers(mix.short_container);

        let detail = || format!("leg {} -> {} in period {}", i, j, t);
        audit.at_most(
            "wagon mix",
            detail,
            long_containers,
            long_wagons + short_wagons,
        );
        audit.at_most(
            "wagon mix",
            detail,
            2.0 * long_containers + short_containers,
            3.0 * long_wagons + 2.0 * short_wagons,
        );
    }
}

fn demand(
    audit: &mut Audit,
    sets: &Sets,
    parameters: &Parameters,
    formulation: &Formulation,
    results: &RailResults,
) {
    let last = sets.last_period();
    for (c, g, d) in iproduct!(&sets.C, &sets.G, &sets.D) {
        let key = (*c, *g, *d);
        let delivered = results.container_stock(key, *d, last);
        let supplied = parameters.total_supply(sets, *c, *g, *d);
        let detail = || format!("container {:?}", key);

        match formulation.demand {
            DemandRule::Exact => audit.equal("demand", detail, delivered, supplied),
            DemandRule::AtLeast => audit.at_most("demand", detail, supplied, delivered),
        }

        if formulation.delivery_deadlines {
            for t in &sets.T {
                audit.at_most(
                    "delivery deadline",
                    || format!("container {:?} in period {}", key, t),
                    parameters.due_by(sets, *c, *g, *d, *t),
                    results.container_stock(key, *d, *t),
                );
            }
        }
    }
}
