use std::{collections::HashMap, hash::Hash};

use derive_more::{Deref, Display, From, Into};
use serde::{Deserialize, Serialize};

/// The type used for fleet and container quantities
pub type Quantity = f64;
/// Time periods are plain offsets from the start of the horizon
pub type TimeIndex = usize;

#[derive(
    Deref, Debug, Display, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash, Serialize, Deserialize,
)]
pub struct NodeIndex(usize);

#[derive(
    Deref, Debug, Display, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash, Serialize, Deserialize,
)]
pub struct LocoIndex(usize);

#[derive(
    Deref, Debug, Display, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash, Serialize, Deserialize,
)]
pub struct WagonIndex(usize);

#[derive(
    Deref, Debug, Display, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash, Serialize, Deserialize,
)]
pub struct ContainerIndex(usize);

#[derive(
    Deref, Debug, Display, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash, Serialize, Deserialize,
)]
pub struct CustomerIndex(usize);

/// A parameter keyed by a composite index. Keys that are absent read as zero.
#[derive(Debug, Clone)]
pub struct Table<K: Eq + Hash> {
    entries: HashMap<K, f64>,
}

impl<K: Eq + Hash> Default for Table<K> {
    fn default() -> Self {
        Table {
            entries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash> Table<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later entries for the same key replace earlier ones.
    pub fn insert(&mut self, key: K, value: f64) {
        self.entries.insert(key, value);
    }

    /// The value stored for `key`, or 0 if there is none
    pub fn get(&self, key: &K) -> f64 {
        self.entries.get(key).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, f64)> {
        self.entries.iter().map(|(k, v)| (k, *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Eq + Hash> FromIterator<(K, f64)> for Table<K> {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Table {
            entries: iter.into_iter().collect(),
        }
    }
}

/// A validated rail service planning instance.
///
/// Every label has been resolved to its index, so the tables below can be read
/// without further checks. Constructed by [`crate::parse`].
#[derive(Debug, Clone)]
pub struct Problem {
    pub(crate) name: String,
    /// Node labels, position is the node index
    pub(crate) nodes: Vec<String>,
    /// The number of time periods in the planning horizon
    pub(crate) timesteps: usize,
    pub(crate) loco_types: Vec<String>,
    pub(crate) wagon_types: Vec<String>,
    pub(crate) container_types: Vec<String>,
    pub(crate) customers: Vec<String>,
    /// Nodes where customers hand over containers
    pub(crate) origins: Vec<NodeIndex>,
    /// Nodes containers are addressed to
    pub(crate) destinations: Vec<NodeIndex>,
    /// Maximum number of wagons on a single service
    pub(crate) wagon_max: Quantity,
    /// 1 if a service may run from i to j. `None` if the instance does not gate
    /// routes explicitly, in which case every leg with a travel time is feasible.
    pub(crate) feasible_route: Option<Table<(NodeIndex, NodeIndex)>>,
    pub(crate) travel_time: Table<(NodeIndex, NodeIndex)>,
    pub(crate) loading_time: Table<NodeIndex>,
    pub(crate) unloading_time: Table<NodeIndex>,
    /// Cost of running a service with locomotive type l from i to j
    pub(crate) fixed_cost: Table<(LocoIndex, NodeIndex, NodeIndex)>,
    /// Cost of moving one extra wagon of type w from i to j
    pub(crate) variable_cost: Table<(WagonIndex, NodeIndex, NodeIndex)>,
    pub(crate) owned_locos: Table<LocoIndex>,
    pub(crate) owned_wagons: Table<WagonIndex>,
    pub(crate) container_capacity: Table<NodeIndex>,
    pub(crate) loco_capacity: Table<NodeIndex>,
    pub(crate) wagon_capacity: Table<NodeIndex>,
    pub(crate) initial_locos: Table<(LocoIndex, NodeIndex)>,
    pub(crate) initial_wagons: Table<(WagonIndex, NodeIndex)>,
    /// Containers of type c handed over by customer g at node i for destination d at time t
    pub(crate) supply: Table<(ContainerIndex, CustomerIndex, NodeIndex, NodeIndex, TimeIndex)>,
    /// Minimum number of periods between two departures from a node
    pub(crate) prep_time: Table<NodeIndex>,
    /// Deadline, in periods after hand-over, for containers of customer g from o to d
    pub(crate) max_delivery_time: Table<(CustomerIndex, NodeIndex, NodeIndex)>,
    /// Revenue per container of type c delivered to d for customer g
    pub(crate) revenue: Table<(ContainerIndex, CustomerIndex, NodeIndex)>,
}

impl Problem {
    /// The name of the instance
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Node labels, ordered by index
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// The number of time periods in the planning horizon
    pub fn timesteps(&self) -> usize {
        self.timesteps
    }

    pub fn loco_types(&self) -> &[String] {
        &self.loco_types
    }

    pub fn wagon_types(&self) -> &[String] {
        &self.wagon_types
    }

    pub fn container_types(&self) -> &[String] {
        &self.container_types
    }

    pub fn customers(&self) -> &[String] {
        &self.customers
    }

    pub fn origins(&self) -> &[NodeIndex] {
        &self.origins
    }

    pub fn destinations(&self) -> &[NodeIndex] {
        &self.destinations
    }

    pub fn wagon_max(&self) -> Quantity {
        self.wagon_max
    }

    /// Look up a node by its label
    pub fn node(&self, label: &str) -> Option<NodeIndex> {
        position(&self.nodes, label).map(NodeIndex::from)
    }

    pub fn wagon_type(&self, label: &str) -> Option<WagonIndex> {
        position(&self.wagon_types, label).map(WagonIndex::from)
    }

    pub fn container_type(&self, label: &str) -> Option<ContainerIndex> {
        position(&self.container_types, label).map(ContainerIndex::from)
    }

    pub fn customer(&self, label: &str) -> Option<CustomerIndex> {
        position(&self.customers, label).map(CustomerIndex::from)
    }

    /// Whether a service may run from `from` to `to`
    pub fn is_feasible_route(&self, from: NodeIndex, to: NodeIndex) -> bool {
        if from == to {
            return false;
        }
        match &self.feasible_route {
            Some(routes) => routes.get(&(from, to)) != 0.0,
            None => self.travel_time.contains(&(from, to)),
        }
    }
}

fn position(labels: &[String], label: &str) -> Option<usize> {
    labels.iter().position(|l| l == label)
}
