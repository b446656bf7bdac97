//! Formulation switches and solver settings.
//!
//! The source business rules exist in two variants that disagree on a few
//! constraints. Both are available as presets, and every switch can also be
//! set on its own, from a JSON file or the command line.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// What the objective measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveKind {
    /// Minimise service and wagon movement cost
    MinimizeCost,
    /// Maximise delivered revenue net of movement cost
    MaximizeRevenue,
}

/// How units in transit plus units stationed relate to the owned fleet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FleetBalance {
    /// The whole fleet is always accounted for
    Exact,
    /// The fleet in the network never exceeds what is owned
    AtMost,
}

/// How the horizon-end stock at a destination relates to the supply addressed to it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandRule {
    /// Everything supplied is delivered, nothing more
    Exact,
    /// Everything supplied is delivered, over-delivery is tolerated
    AtLeast,
}

/// Names of the wagon and container types the loading rules talk about.
///
/// A long wagon carries three short containers or one long plus one short, a
/// short wagon carries two short containers or one long.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WagonMix {
    pub long_wagon: String,
    pub short_wagon: String,
    pub long_container: String,
    pub short_container: String,
}

impl Default for WagonMix {
    fn default() -> Self {
        WagonMix {
            long_wagon: "60ft".to_string(),
            short_wagon: "40ft".to_string(),
            long_container: "40ft".to_string(),
            short_container: "20ft".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Formulation {
    pub objective: ObjectiveKind,
    pub fleet_balance: FleetBalance,
    pub demand: DemandRule,
    /// Enforce `prep_time` spacing between departures from a node
    pub prep_time: bool,
    /// Require the horizon to end with the initial fleet distribution
    pub cyclic_closure: bool,
    /// Add loading time at the origin and unloading time at the destination to every leg
    pub handling_time: bool,
    /// Enforce `max_delivery_time` for every container handed over at an origin
    pub delivery_deadlines: bool,
    /// Loading rules per service, `None` to let containers move without wagon checks
    pub wagon_mix: Option<WagonMix>,
}

impl Default for Formulation {
    fn default() -> Self {
        Formulation::cost_variant()
    }
}

impl Formulation {
    /// Cost minimisation with an exact fleet balance and service spacing
    pub fn cost_variant() -> Self {
        Formulation {
            objective: ObjectiveKind::MinimizeCost,
            fleet_balance: FleetBalance::Exact,
            demand: DemandRule::Exact,
            prep_time: true,
            cyclic_closure: true,
            handling_time: false,
            delivery_deadlines: false,
            wagon_mix: Some(WagonMix::default()),
        }
    }

    /// Revenue maximisation with the looser fleet and demand rules, no service spacing
    pub fn revenue_variant() -> Self {
        Formulation {
            objective: ObjectiveKind::MaximizeRevenue,
            fleet_balance: FleetBalance::AtMost,
            demand: DemandRule::AtLeast,
            prep_time: false,
            ..Formulation::cost_variant()
        }
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Formulation, crate::Error> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }
}

/// Settings passed through to the solver backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Wall clock limit in seconds
    pub time_limit: Option<f64>,
    /// Relative MIP gap at which to stop
    pub mip_gap: Option<f64>,
    /// Let the backend print its own log
    pub verbose: bool,
}
