//! Constraint families and the objective of the rail service model.
//!
//! Every family loops over the feasible legs of the [`Network`](super::network::Network),
//! so a sum never mentions a node pair that has no variables.

use itertools::iproduct;
use log::{debug, trace};

use crate::config::{DemandRule, FleetBalance, Formulation, ObjectiveKind};
use crate::models::milp::{LinExpr, LinSum, Model, ModelSense};
use crate::problem::{ContainerIndex, NodeIndex, TimeIndex, WagonIndex};

use super::model::Variables;
use super::sets_and_parameters::{Parameters, Sets};

type Family = fn(&mut Model, &Sets, &Parameters, &Formulation, &Variables);

const FAMILIES: &[(&str, Family)] = &[
    ("loco balance", loco_balance),
    ("wagon balance", wagon_balance),
    ("container balance", container_balance),
    ("cyclic closure", cyclic_closure),
    ("storage", storage_limits),
    ("fleet", fleet_limits),
    ("service", service_limit),
    ("preparation time", prep_time),
    ("train length", train_length),
    ("wagon mix", wagon_mix),
    ("demand", demand),
    ("delivery deadline", delivery_deadlines),
];

pub fn add_constraints(
    model: &mut Model,
    sets: &Sets,
    parameters: &Parameters,
    formulation: &Formulation,
    variables: &Variables,
) {
    for &(name, family) in FAMILIES {
        let before = model.num_constrs();
        family(model, sets, parameters, formulation, variables);
        debug!("Added {} {} constraints", model.num_constrs() - before, name);
    }
}

/// Locomotive stock follows departures and arrivals
fn loco_balance(
    model: &mut Model,
    sets: &Sets,
    parameters: &Parameters,
    _: &Formulation,
    variables: &Variables,
) {
    for (l, i, t) in iproduct!(&sets.L, &sets.N, &sets.T) {
        let (l, i, t) = (*l, *i, *t);
        let mut rhs = match t {
            0 => LinExpr::constant(parameters.initial_locos[l][i]),
            _ => variables.loco_stock(l, i, t - 1).into(),
        };
        for leg in sets.network.incoming(i) {
            // arrivals in t left in t - lag, if that is inside the horizon
            if let Some(x) = leg
                .departure_for_arrival(t)
                .and_then(|s| variables.depart(l, leg.from, i, s))
            {
                rhs += x;
            }
        }
        for leg in sets.network.outgoing(i) {
            if let Some(x) = variables.depart(l, i, leg.to, t) {
                rhs -= x;
            }
        }

        let stock = LinExpr::from(variables.loco_stock(l, i, t));
        model.add_constr(&format!("loco_balance_{l}_{i}_{t}"), stock.eq(rhs));
    }
}

/// Wagon stock follows wagon movements
fn wagon_balance(
    model: &mut Model,
    sets: &Sets,
    parameters: &Parameters,
    _: &Formulation,
    variables: &Variables,
) {
    for (w, i, t) in iproduct!(&sets.W, &sets.N, &sets.T) {
        let (w, i, t) = (*w, *i, *t);
        let mut rhs = match t {
            0 => LinExpr::constant(parameters.initial_wagons[w][i]),
            _ => variables.wagon_stock(w, i, t - 1).into(),
        };
        for leg in sets.network.incoming(i) {
            if let Some(wm) = leg
                .departure_for_arrival(t)
                .and_then(|s| variables.wagon_move(w, leg.from, i, s))
            {
                rhs += wm;
            }
        }
        for leg in sets.network.outgoing(i) {
            if let Some(wm) = variables.wagon_move(w, i, leg.to, t) {
                rhs -= wm;
            }
        }

        let stock = LinExpr::from(variables.wagon_stock(w, i, t));
        model.add_constr(&format!("wagon_balance_{w}_{i}_{t}"), stock.eq(rhs));
    }
}

/// Container stock per commodity follows supply and container movements
fn container_balance(
    model: &mut Model,
    sets: &Sets,
    parameters: &Parameters,
    _: &Formulation,
    variables: &Variables,
) {
    for (c, g, d, i, t) in iproduct!(&sets.C, &sets.G, &sets.D, &sets.N, &sets.T) {
        let (key, i, t) = ((*c, *g, *d), *i, *t);
        let stock = match variables.container_stock(key, i, t) {
            Some(stock) => stock,
            None => continue,
        };

        // containers start out empty
        let mut rhs = match t.checked_sub(1).and_then(|s| variables.container_stock(key, i, s)) {
            Some(previous) => LinExpr::from(previous),
            None => LinExpr::new(),
        };
        rhs += parameters.supply.get(&(*c, *g, i, *d, t));
        for leg in sets.network.incoming(i) {
            if let Some(cm) = leg
                .departure_for_arrival(t)
                .and_then(|s| variables.container_move(key, leg.from, i, s))
            {
                rhs += cm;
            }
        }
        for leg in sets.network.outgoing(i) {
            if let Some(cm) = variables.container_move(key, i, leg.to, t) {
                rhs -= cm;
            }
        }

        model.add_constr(
            &format!("container_balance_{c}_{g}_{d}_{i}_{t}"),
            LinExpr::from(stock).eq(rhs),
        );
    }
}

/// The fleet ends the horizon where it started
fn cyclic_closure(
    model: &mut Model,
    sets: &Sets,
    parameters: &Parameters,
    formulation: &Formulation,
    variables: &Variables,
) {
    if !formulation.cyclic_closure || sets.T.is_empty() {
        return;
    }
    let last = sets.last_period();

    for (l, i) in iproduct!(&sets.L, &sets.N) {
        model.add_constr(
            &format!("closure_loco_{l}_{i}"),
            LinExpr::from(variables.loco_stock(*l, *i, last)).eq(parameters.initial_locos[*l][*i]),
        );
    }
    for (w, i) in iproduct!(&sets.W, &sets.N) {
        model.add_constr(
            &format!("closure_wagon_{w}_{i}"),
            LinExpr::from(variables.wagon_stock(*w, *i, last))
                .eq(parameters.initial_wagons[*w][*i]),
        );
    }
}

/// What is stationed at a node fits its storage
fn storage_limits(
    model: &mut Model,
    sets: &Sets,
    parameters: &Parameters,
    _: &Formulation,
    variables: &Variables,
) {
    for (i, t) in iproduct!(&sets.N, &sets.T) {
        let (i, t) = (*i, *t);

        let containers = iproduct!(&sets.C, &sets.G, &sets.D)
            .filter_map(|(c, g, d)| variables.container_stock((*c, *g, *d), i, t))
            .lin_sum();
        model.add_constr(
            &format!("container_storage_{i}_{t}"),
            containers.leq(parameters.container_capacity[i]),
        );

        let locos = sets.L.iter().map(|l| variables.loco_stock(*l, i, t)).lin_sum();
        model.add_constr(
            &format!("loco_storage_{i}_{t}"),
            locos.leq(parameters.loco_capacity[i]),
        );

        let wagons = sets.W.iter().map(|w| variables.wagon_stock(*w, i, t)).lin_sum();
        model.add_constr(
            &format!("wagon_storage_{i}_{t}"),
            wagons.leq(parameters.wagon_capacity[i]),
        );
    }
}

/// Units in transit plus units stationed account for the owned fleet
fn fleet_limits(
    model: &mut Model,
    sets: &Sets,
    parameters: &Parameters,
    formulation: &Formulation,
    variables: &Variables,
) {
    let legs = sets.network.legs();

    for (l, t) in iproduct!(&sets.L, &sets.T) {
        let (l, t) = (*l, *t);
        let in_transit = legs
            .iter()
            .flat_map(|leg| leg.in_transit(t).map(move |s| (leg, s)))
            .filter_map(|(leg, s)| variables.depart(l, leg.from, leg.to, s))
            .lin_sum();
        let stationed = sets.N.iter().map(|i| variables.loco_stock(l, *i, t)).lin_sum();
        let fleet = in_transit + stationed;

        let owned = parameters.owned_locos[l];
        let constr = match formulation.fleet_balance {
            FleetBalance::Exact => fleet.eq(owned),
            FleetBalance::AtMost => fleet.leq(owned),
        };
        model.add_constr(&format!("fleet_loco_{l}_{t}"), constr);
    }

    for (w, t) in iproduct!(&sets.W, &sets.T) {
        let (w, t) = (*w, *t);
        let in_transit = legs
            .iter()
            .flat_map(|leg| leg.in_transit(t).map(move |s| (leg, s)))
            .filter_map(|(leg, s)| variables.wagon_move(w, leg.from, leg.to, s))
            .lin_sum();
        let stationed = sets.N.iter().map(|i| variables.wagon_stock(w, *i, t)).lin_sum();
        let fleet = in_transit + stationed;

        let owned = parameters.owned_wagons[w];
        let constr = match formulation.fleet_balance {
            FleetBalance::Exact => fleet.eq(owned),
            FleetBalance::AtMost => fleet.leq(owned),
        };
        model.add_constr(&format!("fleet_wagon_{w}_{t}"), constr);
    }
}

/// Departures of any locomotive type from node i in the periods `window`
fn departures(
    sets: &Sets,
    variables: &Variables,
    i: NodeIndex,
    window: std::ops::Range<TimeIndex>,
) -> LinExpr {
    let mut lhs = LinExpr::new();
    for leg in sets.network.outgoing(i) {
        for (l, s) in iproduct!(&sets.L, window.clone()) {
            if let Some(x) = variables.depart(*l, i, leg.to, s) {
                lhs += x;
            }
        }
    }
    lhs
}

/// At most one service leaves a node per period
fn service_limit(
    model: &mut Model,
    sets: &Sets,
    _: &Parameters,
    _: &Formulation,
    variables: &Variables,
) {
    for (i, t) in iproduct!(&sets.N, &sets.T) {
        let lhs = departures(sets, variables, *i, *t..*t + 1);
        if lhs.is_empty() {
            continue;
        }
        model.add_constr(&format!("service_{i}_{t}"), lhs.leq(1.0));
    }
}

/// Consecutive departures from a node are at least `prep_time` periods apart
fn prep_time(
    model: &mut Model,
    sets: &Sets,
    parameters: &Parameters,
    formulation: &Formulation,
    variables: &Variables,
) {
    if !formulation.prep_time {
        return;
    }

    for (i, t) in iproduct!(&sets.N, &sets.T) {
        let (i, t) = (*i, *t);
        let p = parameters.prep_time[i];
        if p < 2 {
            continue;
        }
        let window = (t + 1).saturating_sub(p)..t + 1;
        trace!("prep time window for node {} at {}: {:?}", i, t, window);

        let lhs = departures(sets, variables, i, window);
        if lhs.is_empty() {
            continue;
        }
        model.add_constr(&format!("prep_time_{i}_{t}"), lhs.leq(1.0));
    }
}

/// A service pulls at most `wagon_max` wagons, and wagons only move with a service
fn train_length(
    model: &mut Model,
    sets: &Sets,
    parameters: &Parameters,
    _: &Formulation,
    variables: &Variables,
) {
    for (leg, t) in iproduct!(sets.network.legs(), &sets.T) {
        let (i, j, t) = (leg.from, leg.to, *t);
        let services = sets
            .L
            .iter()
            .filter_map(|l| variables.depart(*l, i, j, t))
            .lin_sum();
        let wagons = sets
            .W
            .iter()
            .filter_map(|w| variables.wagon_move(*w, i, j, t))
            .lin_sum();

        model.add_constr(
            &format!("train_length_{i}_{j}_{t}"),
            (parameters.wagon_max * services).geq(wagons),
        );
    }
}

/// The wagons on a leg can carry the containers on it
fn wagon_mix(
    model: &mut Model,
    sets: &Sets,
    _: &Parameters,
    formulation: &Formulation,
    variables: &Variables,
) {
    let mix = match (&formulation.wagon_mix, sets.mix) {
        (Some(_), Some(mix)) => mix,
        _ => return,
    };

    for (leg, t) in iproduct!(sets.network.legs(), &sets.T) {
        let (i, j, t) = (leg.from, leg.to, *t);

        let wagons = |w: Option<WagonIndex>| {
            w.and_then(|w| variables.wagon_move(w, i, j, t))
                .map(LinExpr::from)
                .unwrap_or_default()
        };
        let containers = |c: Option<ContainerIndex>| match c {
            Some(c) => iproduct!(&sets.G, &sets.D)
                .filter_map(|(g, d)| variables.container_move((c, *g, *d), i, j, t))
                .lin_sum(),
            None => LinExpr::new(),
        };

        let long_wagons = wagons(mix.long_wagon);
        let short_wagons = wagons(mix.short_wagon);
        let long_containers = containers(mix.long_container);
        let short_containers = containers(mix.short_container);

        // each long container takes a wagon of its own
        if mix.long_container.is_some() {
            model.add_constr(
                &format!("wagon_mix_1_{i}_{j}_{t}"),
                (long_wagons.clone() + short_wagons.clone()).geq(long_containers.clone()),
            );
        }

        // a long wagon has three short slots, a short wagon two, a long container takes two
        if mix.long_container.is_some() || mix.short_container.is_some() {
            let slots = 3.0 * long_wagons + 2.0 * short_wagons - 2.0 * long_containers;
            model.add_constr(
                &format!("wagon_mix_2_{i}_{j}_{t}"),
                slots.geq(short_containers),
            );
        }
    }
}

/// Everything addressed to a destination has arrived by the end of the horizon
fn demand(
    model: &mut Model,
    sets: &Sets,
    parameters: &Parameters,
    formulation: &Formulation,
    variables: &Variables,
) {
    let last = sets.last_period();

    for (c, g, d) in iproduct!(&sets.C, &sets.G, &sets.D) {
        let key = (*c, *g, *d);
        let delivered = match variables.container_stock(key, *d, last) {
            Some(stock) => LinExpr::from(stock),
            None => continue,
        };
        let supplied = parameters.total_supply(sets, *c, *g, *d);

        let constr = match formulation.demand {
            DemandRule::Exact => delivered.eq(supplied),
            DemandRule::AtLeast => delivered.geq(supplied),
        };
        model.add_constr(&format!("demand_{c}_{g}_{d}"), constr);
    }
}

/// Containers reach their destination within the customer's delivery time
fn delivery_deadlines(
    model: &mut Model,
    sets: &Sets,
    parameters: &Parameters,
    formulation: &Formulation,
    variables: &Variables,
) {
    if !formulation.delivery_deadlines {
        return;
    }

    for (c, g, d, t) in iproduct!(&sets.C, &sets.G, &sets.D, &sets.T) {
        let due = parameters.due_by(sets, *c, *g, *d, *t);
        if due <= 0.0 {
            continue;
        }
        if let Some(stock) = variables.container_stock((*c, *g, *d), *d, *t) {
            model.add_constr(
                &format!("deadline_{c}_{g}_{d}_{t}"),
                LinExpr::from(stock).geq(due),
            );
        }
    }
}

/// Service and wagon movement cost, and revenue when the objective asks for it
pub fn set_objective(
    model: &mut Model,
    sets: &Sets,
    parameters: &Parameters,
    formulation: &Formulation,
    variables: &Variables,
) {
    let mut cost = LinExpr::new();
    for (leg, t) in iproduct!(sets.network.legs(), &sets.T) {
        let (i, j, t) = (leg.from, leg.to, *t);
        for l in &sets.L {
            if let Some(x) = variables.depart(*l, i, j, t) {
                cost.add_term(parameters.fixed_cost.get(&(*l, i, j)), x);
            }
        }
        for w in &sets.W {
            if let Some(wm) = variables.wagon_move(*w, i, j, t) {
                cost.add_term(parameters.variable_cost.get(&(*w, i, j)), wm);
            }
        }
    }

    match formulation.objective {
        ObjectiveKind::MinimizeCost => model.set_objective(cost, ModelSense::Minimize),
        ObjectiveKind::MaximizeRevenue => {
            let last = sets.last_period();
            let mut revenue = LinExpr::new();
            for (c, g, d) in iproduct!(&sets.C, &sets.G, &sets.D) {
                if let Some(stock) = variables.container_stock((*c, *g, *d), *d, last) {
                    revenue.add_term(parameters.revenue.get(&(*c, *g, *d)), stock);
                }
            }
            model.set_objective(revenue - cost, ModelSense::Maximize);
        }
    }
}
