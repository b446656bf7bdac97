use std::{collections::HashMap, ops::Range};

use typed_index_collections::TiVec;

use crate::problem::{NodeIndex, TimeIndex};

/// A directed node pair a service may run over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Leg {
    pub from: NodeIndex,
    pub to: NodeIndex,
    /// Number of periods between leaving `from` and being available at `to`
    pub lag: usize,
}

impl Leg {
    /// The departure period of a movement that becomes available at `to` in period `t`.
    /// `None` if that departure would lie before the start of the horizon.
    pub fn departure_for_arrival(&self, t: TimeIndex) -> Option<TimeIndex> {
        t.checked_sub(self.lag)
    }

    /// Departure periods of movements that are still on this leg in period `t`.
    /// Empty for legs without lag.
    pub fn in_transit(&self, t: TimeIndex) -> Range<TimeIndex> {
        (t + 1).saturating_sub(self.lag)..(t + 1)
    }
}

/// The legs of the rail network, indexed by the node they leave and the node they enter.
#[derive(Debug, Clone)]
pub struct Network {
    legs: Vec<Leg>,
    outgoing: TiVec<NodeIndex, Vec<usize>>,
    incoming: TiVec<NodeIndex, Vec<usize>>,
    lookup: HashMap<(NodeIndex, NodeIndex), usize>,
}

impl Network {
    /// Builds the network over `nodes` nodes. A pair (i, j), i != j, becomes a leg when
    /// `is_feasible(i, j)` holds, with the lag given by `lag(i, j)`.
    pub fn new<F, L>(nodes: usize, is_feasible: F, lag: L) -> Network
    where
        F: Fn(NodeIndex, NodeIndex) -> bool,
        L: Fn(NodeIndex, NodeIndex) -> usize,
    {
        let mut legs = Vec::new();
        let mut outgoing: TiVec<NodeIndex, Vec<usize>> = vec![Vec::new(); nodes].into();
        let mut incoming: TiVec<NodeIndex, Vec<usize>> = vec![Vec::new(); nodes].into();
        let mut lookup = HashMap::new();

        for from in (0..nodes).map(NodeIndex::from) {
            for to in (0..nodes).map(NodeIndex::from) {
                if from == to || !is_feasible(from, to) {
                    continue;
                }
                let index = legs.len();
                legs.push(Leg {
                    from,
                    to,
                    lag: lag(from, to),
                });
                outgoing[from].push(index);
                incoming[to].push(index);
                lookup.insert((from, to), index);
            }
        }

        Network {
            legs,
            outgoing,
            incoming,
            lookup,
        }
    }

    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    pub fn leg(&self, from: NodeIndex, to: NodeIndex) -> Option<&Leg> {
        self.lookup.get(&(from, to)).map(|i| &self.legs[*i])
    }

    /// Legs leaving `node`
    pub fn outgoing(&self, node: NodeIndex) -> impl Iterator<Item = &Leg> + '_ {
        self.outgoing[node].iter().map(move |i| &self.legs[*i])
    }

    /// Legs entering `node`
    pub fn incoming(&self, node: NodeIndex) -> impl Iterator<Item = &Leg> + '_ {
        self.incoming[node].iter().map(move |i| &self.legs[*i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(i: usize) -> NodeIndex {
        NodeIndex::from(i)
    }

    #[test]
    fn only_feasible_pairs_become_legs() {
        // a chain 0 -> 1 -> 2, node 3 is isolated
        let network = Network::new(4, |i, j| *j == *i + 1 && *j < 3, |_, _| 1);

        assert_eq!(network.legs().len(), 2);
        assert!(network.leg(n(0), n(1)).is_some());
        assert!(network.leg(n(1), n(0)).is_none());
        assert!(network.leg(n(2), n(3)).is_none());
        assert_eq!(network.outgoing(n(3)).count() + network.incoming(n(3)).count(), 0);
        assert_eq!(network.outgoing(n(1)).map(|l| l.to).collect::<Vec<_>>(), vec![n(2)]);
        assert_eq!(network.incoming(n(1)).map(|l| l.from).collect::<Vec<_>>(), vec![n(0)]);
    }

    #[test]
    fn self_loops_are_never_legs() {
        let network = Network::new(3, |_, _| true, |_, _| 1);
        assert_eq!(network.legs().len(), 6);
        assert!(network.leg(n(1), n(1)).is_none());
    }

    #[test]
    fn arrivals_before_the_horizon_have_no_departure() {
        let leg = Leg {
            from: n(0),
            to: n(1),
            lag: 2,
        };
        assert_eq!(leg.departure_for_arrival(0), None);
        assert_eq!(leg.departure_for_arrival(1), None);
        assert_eq!(leg.departure_for_arrival(2), Some(0));
        assert_eq!(leg.departure_for_arrival(5), Some(3));
    }

    #[test]
    fn in_transit_window_covers_the_lag() {
        let leg = Leg {
            from: n(0),
            to: n(1),
            lag: 3,
        };
        assert_eq!(leg.in_transit(0), 0..1);
        assert_eq!(leg.in_transit(4), 2..5);

        let instant = Leg { lag: 0, ..leg };
        assert!(instant.in_transit(4).is_empty());
    }
}
