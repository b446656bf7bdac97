pub mod check;
pub mod constraints;
pub mod model;
pub mod network;
pub mod sets_and_parameters;

pub use model::{RailOutcome, RailResults, RailSolver};

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::parse::problem_from_value;
    use crate::problem::Problem;
    use serde_json::{json, Value};

    /// A one-way chain A -> B -> C -> D with one container handed over at A in
    /// period 0 and due at D by period 3
    pub(crate) fn chain(tables: Value) -> Problem {
        let mut base = json!({
            "travel_time": [
                { "key": ["A", "B"], "value": 1 },
                { "key": ["B", "C"], "value": 1 },
                { "key": ["C", "D"], "value": 1 }
            ],
            "fixed_cost": [
                { "key": ["Diesel", "A", "B"], "value": 100 },
                { "key": ["Diesel", "B", "C"], "value": 100 },
                { "key": ["Diesel", "C", "D"], "value": 100 }
            ],
            "variable_cost": [
                { "key": ["40ft", "A", "B"], "value": 10 },
                { "key": ["40ft", "B", "C"], "value": 10 },
                { "key": ["40ft", "C", "D"], "value": 10 }
            ],
            "owned_locos": [ { "key": ["Diesel"], "value": 1 } ],
            "owned_wagons": [ { "key": ["40ft"], "value": 1 } ],
            "initial_locos": [ { "key": ["Diesel", "A"], "value": 1 } ],
            "initial_wagons": [ { "key": ["40ft", "A"], "value": 1 } ],
            "container_capacity": [
                { "key": ["A"], "value": 2 }, { "key": ["B"], "value": 2 },
                { "key": ["C"], "value": 2 }, { "key": ["D"], "value": 2 }
            ],
            "loco_capacity": [
                { "key": ["A"], "value": 10 }, { "key": ["B"], "value": 10 },
                { "key": ["C"], "value": 10 }, { "key": ["D"], "value": 10 }
            ],
            "wagon_capacity": [
                { "key": ["A"], "value": 2 }, { "key": ["B"], "value": 2 },
                { "key": ["C"], "value": 2 }, { "key": ["D"], "value": 2 }
            ],
            "supply": [ { "key": ["40ft", "Maersk", "A", "D", 0], "value": 1 } ],
            "max_delivery_time": [ { "key": ["Maersk", "A", "D"], "value": 3 } ],
            "revenue": [ { "key": ["40ft", "Maersk", "D"], "value": 1000 } ]
        });
        if let (Some(base), Value::Object(overrides)) = (base.as_object_mut(), tables) {
            base.extend(overrides);
        }

        problem_from_value(json!({
            "name": "four-node-chain",
            "sets": {
                "nodes": ["A", "B", "C", "D"],
                "periods": 5,
                "loco_types": ["Diesel"],
                "wagon_types": ["40ft"],
                "container_types": ["40ft"],
                "customers": ["Maersk"],
                "origins": ["A"],
                "destinations": ["D"]
            },
            "scalars": { "wagon_max": 30 },
            "tables": base
        }))
        .unwrap()
    }
}
