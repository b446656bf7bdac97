use log::debug;
use typed_index_collections::TiVec;

use super::network::Network;
use crate::config::{Formulation, WagonMix};
use crate::problem::{
    ContainerIndex, CustomerIndex, LocoIndex, NodeIndex, Problem, Quantity, Table,
    TimeIndex, WagonIndex,
};

/// Index sets of the rail service model
#[derive(Debug, Clone)]
#[allow(non_snake_case)]
pub struct Sets {
    /// Set of nodes
    pub N: Vec<NodeIndex>,
    /// Set of time periods
    pub T: Vec<TimeIndex>,
    /// Set of locomotive types
    pub L: Vec<LocoIndex>,
    /// Set of wagon types
    pub W: Vec<WagonIndex>,
    /// Set of container types
    pub C: Vec<ContainerIndex>,
    /// Set of customers
    pub G: Vec<CustomerIndex>,
    /// Set of origin nodes
    pub O: Vec<NodeIndex>,
    /// Set of destination nodes
    pub D: Vec<NodeIndex>,
    /// Feasible legs between the nodes
    pub network: Network,
    /// The wagon and container types named by the loading rules, if any
    pub mix: Option<MixTypes>,
}

/// The loading rules resolved against the types of an instance.
/// Types that the instance does not have are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MixTypes {
    pub long_wagon: Option<WagonIndex>,
    pub short_wagon: Option<WagonIndex>,
    pub long_container: Option<ContainerIndex>,
    pub short_container: Option<ContainerIndex>,
}

impl MixTypes {
    fn new(problem: &Problem, mix: &WagonMix) -> MixTypes {
        MixTypes {
            long_wagon: problem.wagon_type(&mix.long_wagon),
            short_wagon: problem.wagon_type(&mix.short_wagon),
            long_container: problem.container_type(&mix.long_container),
            short_container: problem.container_type(&mix.short_container),
        }
    }
}

#[allow(non_snake_case)]
impl Sets {
    pub fn new(problem: &Problem, formulation: &Formulation) -> Sets {
        let N: Vec<NodeIndex> = (0..problem.nodes().len()).map(NodeIndex::from).collect();
        let T = (0..problem.timesteps()).collect();
        let L = (0..problem.loco_types().len()).map(LocoIndex::from).collect();
        let W = (0..problem.wagon_types().len()).map(WagonIndex::from).collect();
        let C = (0..problem.container_types().len())
            .map(ContainerIndex::from)
            .collect();
        let G = (0..problem.customers().len())
            .map(CustomerIndex::from)
            .collect();

        let handling = formulation.handling_time;
        let network = Network::new(
            N.len(),
            |i, j| problem.is_feasible_route(i, j),
            |i, j| {
                let mut lag = problem.travel_time.get(&(i, j));
                if handling {
                    lag += problem.loading_time.get(&i) + problem.unloading_time.get(&j);
                }
                periods(lag)
            },
        );
        debug!(
            "Network with {} nodes and {} feasible legs",
            N.len(),
            network.legs().len()
        );

        Sets {
            N,
            T,
            L,
            W,
            C,
            G,
            O: problem.origins().to_vec(),
            D: problem.destinations().to_vec(),
            network,
            mix: formulation
                .wagon_mix
                .as_ref()
                .map(|mix| MixTypes::new(problem, mix)),
        }
    }

    /// The final period of the horizon
    pub fn last_period(&self) -> TimeIndex {
        self.T.len().saturating_sub(1)
    }
}

/// Parameters of the rail service model. Absent entries of the input are 0.
#[allow(non_snake_case)]
pub struct Parameters {
    /// Maximum number of wagons per service
    pub wagon_max: Quantity,
    /// Cost of running a service of locomotive type l from node i to node j
    pub fixed_cost: Table<(LocoIndex, NodeIndex, NodeIndex)>,
    /// Cost of moving one wagon of type w from node i to node j
    pub variable_cost: Table<(WagonIndex, NodeIndex, NodeIndex)>,
    /// Locomotives owned per type
    pub owned_locos: TiVec<LocoIndex, Quantity>,
    /// Wagons owned per type
    pub owned_wagons: TiVec<WagonIndex, Quantity>,
    /// Container storage capacity of each node
    pub container_capacity: TiVec<NodeIndex, Quantity>,
    /// Locomotive storage capacity of each node
    pub loco_capacity: TiVec<NodeIndex, Quantity>,
    /// Wagon storage capacity of each node
    pub wagon_capacity: TiVec<NodeIndex, Quantity>,
    /// Locomotives of type l at node i at the start of the cycle
    pub initial_locos: TiVec<LocoIndex, TiVec<NodeIndex, Quantity>>,
    /// Wagons of type w at node i at the start of the cycle
    pub initial_wagons: TiVec<WagonIndex, TiVec<NodeIndex, Quantity>>,
    /// Containers of type c handed over by customer g at node i for destination d in period t
    pub supply: Table<(ContainerIndex, CustomerIndex, NodeIndex, NodeIndex, TimeIndex)>,
    /// Minimum number of periods between consecutive departures from a node
    pub prep_time: TiVec<NodeIndex, usize>,
    /// Periods allowed between hand-over at o and delivery at d for customer g
    pub max_delivery_time: Table<(CustomerIndex, NodeIndex, NodeIndex)>,
    /// Revenue per container of type c for customer g delivered at d
    pub revenue: Table<(ContainerIndex, CustomerIndex, NodeIndex)>,
}

impl Parameters {
    pub fn new(problem: &Problem, sets: &Sets) -> Parameters {
        let per_node = |table: &Table<NodeIndex>| -> TiVec<NodeIndex, Quantity> {
            sets.N.iter().map(|i| table.get(i)).collect()
        };

        let initial_locos: TiVec<LocoIndex, TiVec<NodeIndex, Quantity>> = sets
            .L
            .iter()
            .map(|l| sets.N.iter().map(|i| problem.initial_locos.get(&(*l, *i))).collect())
            .collect();
        let initial_wagons: TiVec<WagonIndex, TiVec<NodeIndex, Quantity>> = sets
            .W
            .iter()
            .map(|w| sets.N.iter().map(|i| problem.initial_wagons.get(&(*w, *i))).collect())
            .collect();

        Parameters {
            wagon_max: problem.wagon_max(),
            fixed_cost: problem.fixed_cost.clone(),
            variable_cost: problem.variable_cost.clone(),
            owned_locos: sets.L.iter().map(|l| problem.owned_locos.get(l)).collect(),
            owned_wagons: sets.W.iter().map(|w| problem.owned_wagons.get(w)).collect(),
            container_capacity: per_node(&problem.container_capacity),
            loco_capacity: per_node(&problem.loco_capacity),
            wagon_capacity: per_node(&problem.wagon_capacity),
            initial_locos,
            initial_wagons,
            supply: problem.supply.clone(),
            prep_time: sets
                .N
                .iter()
                .map(|i| periods(problem.prep_time.get(i)))
                .collect(),
            max_delivery_time: problem.max_delivery_time.clone(),
            revenue: problem.revenue.clone(),
        }
    }

    /// Total number of containers of type c that customer g addresses to d over the horizon
    pub fn total_supply(
        &self,
        sets: &Sets,
        c: ContainerIndex,
        g: CustomerIndex,
        d: NodeIndex,
    ) -> Quantity {
        sets.N
            .iter()
            .flat_map(|i| sets.T.iter().map(move |t| (*i, *t)))
            .map(|(i, t)| self.supply.get(&(c, g, i, d, t)))
            .sum()
    }

    /// Containers of type c for customer g and destination d that must have
    /// arrived by period t
    pub fn due_by(
        &self,
        sets: &Sets,
        c: ContainerIndex,
        g: CustomerIndex,
        d: NodeIndex,
        t: TimeIndex,
    ) -> Quantity {
        let mut due = 0.0;
        for o in &sets.O {
            // no deadline without an entry
            if !self.max_delivery_time.contains(&(g, *o, d)) {
                continue;
            }
            let deadline = periods(self.max_delivery_time.get(&(g, *o, d)));
            // handed over in s, due in s + deadline
            if let Some(latest) = t.checked_sub(deadline) {
                due += (0..=latest)
                    .map(|s| self.supply.get(&(c, g, *o, d, s)))
                    .sum::<f64>();
            }
        }
        due
    }
}

/// Round a duration given in periods to a whole, non-negative number of periods
fn periods(value: f64) -> usize {
    if value.is_finite() && value > 0.0 {
        value.round() as usize
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::problem_from_value;
    use serde_json::json;

    fn problem() -> Problem {
        problem_from_value(json!({
            "sets": {
                "nodes": ["A", "B", "C"],
                "periods": 6,
                "loco_types": ["Diesel"],
                "wagon_types": ["40ft"],
                "container_types": ["40ft"],
                "customers": ["Maersk"],
                "origins": ["A"],
                "destinations": ["C"]
            },
            "scalars": { "wagon_max": 20 },
            "tables": {
                "travel_time": [
                    { "key": ["A", "B"], "value": 2 },
                    { "key": ["B", "C"], "value": 1.4 }
                ],
                "loading_time": [ { "key": ["A"], "value": 1 } ],
                "unloading_time": [ { "key": ["B"], "value": 1 } ],
                "initial_locos": [ { "key": ["Diesel", "B"], "value": 3 } ],
                "supply": [
                    { "key": ["40ft", "Maersk", "A", "C", 0], "value": 2 },
                    { "key": ["40ft", "Maersk", "A", "C", 3], "value": 1 }
                ],
                "max_delivery_time": [ { "key": ["Maersk", "A", "C"], "value": 2 } ]
            }
        }))
        .unwrap()
    }

    #[test]
    fn lags_are_whole_periods() {
        let problem = problem();
        let sets = Sets::new(&problem, &Formulation::default());
        let (a, b, c) = (NodeIndex::from(0), NodeIndex::from(1), NodeIndex::from(2));

        assert_eq!(sets.network.leg(a, b).unwrap().lag, 2);
        assert_eq!(sets.network.leg(b, c).unwrap().lag, 1);
        assert!(sets.network.leg(a, c).is_none());
        assert_eq!(sets.last_period(), 5);
    }

    #[test]
    fn handling_time_extends_lags() {
        let problem = problem();
        let formulation = Formulation {
            handling_time: true,
            ..Formulation::default()
        };
        let sets = Sets::new(&problem, &formulation);
        let (a, b) = (NodeIndex::from(0), NodeIndex::from(1));

        // loading at A, travel, unloading at B
        assert_eq!(sets.network.leg(a, b).unwrap().lag, 4);
    }

    #[test]
    fn dense_parameters_default_to_zero() {
        let problem = problem();
        let sets = Sets::new(&problem, &Formulation::default());
        let parameters = Parameters::new(&problem, &sets);
        let (l, a, b) = (LocoIndex::from(0), NodeIndex::from(0), NodeIndex::from(1));

        assert_eq!(parameters.initial_locos[l][b], 3.0);
        assert_eq!(parameters.initial_locos[l][a], 0.0);
        assert_eq!(parameters.loco_capacity[a], 0.0);
        assert_eq!(parameters.prep_time[a], 0);
        assert_eq!(parameters.wagon_max, 20.0);
    }

    #[test]
    fn supply_totals_and_deadlines() {
        let problem = problem();
        let sets = Sets::new(&problem, &Formulation::default());
        let parameters = Parameters::new(&problem, &sets);
        let (c, g, d) = (
            ContainerIndex::from(0),
            CustomerIndex::from(0),
            NodeIndex::from(2),
        );

        assert_eq!(parameters.total_supply(&sets, c, g, d), 3.0);
        assert_eq!(parameters.due_by(&sets, c, g, d, 1), 0.0);
        assert_eq!(parameters.due_by(&sets, c, g, d, 2), 2.0);
        assert_eq!(parameters.due_by(&sets, c, g, d, 5), 3.0);
    }

    #[test]
    fn loading_rules_resolve_known_types_only() {
        let problem = problem();
        let sets = Sets::new(&problem, &Formulation::default());
        let mix = sets.mix.unwrap();

        assert_eq!(mix.short_wagon, Some(WagonIndex::from(0)));
        assert_eq!(mix.long_wagon, None);
        assert_eq!(mix.long_container, Some(ContainerIndex::from(0)));
        assert_eq!(mix.short_container, None);
    }
}
