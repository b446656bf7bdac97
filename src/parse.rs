//! Reads a planning instance from a JSON document of named ranges.
//!
//! The document lists the index sets by name, a few scalars, and one table per
//! parameter. Each table row is an index tuple plus a value. A missing or `null`
//! value reads as 0, the same as a key that is never listed.

use std::{collections::HashMap, fmt, path::Path};

use derive_more::Display;
use log::{debug, info};
use serde::Deserialize;

use crate::problem::{
    ContainerIndex, CustomerIndex, LocoIndex, NodeIndex, Problem, Table, TimeIndex, WagonIndex,
};

#[derive(Debug, Display)]
pub enum InputError {
    #[display(fmt = "could not read input: {}", _0)]
    Io(std::io::Error),
    #[display(fmt = "malformed input document: {}", _0)]
    Json(serde_json::Error),
    /// A table or scalar that the model does not know about
    #[display(fmt = "unrecognized table `{}`", _0)]
    UnrecognizedTable(String),
    /// The key of a row does not have the shape declared for its table
    #[display(fmt = "malformed index in `{}` row {}: {}", table, row, reason)]
    MalformedIndex {
        table: String,
        row: usize,
        reason: String,
    },
    /// A label that is not a member of the set it indexes
    #[display(fmt = "`{}` is not a member of {} (table `{}`, row {})", label, domain, table, row)]
    UnknownLabel {
        table: String,
        row: usize,
        domain: Domain,
        label: String,
    },
    #[display(fmt = "period {} in `{}` row {} is outside the horizon 0..{}", period, table, row, horizon)]
    PeriodOutOfRange {
        table: String,
        row: usize,
        period: usize,
        horizon: usize,
    },
    #[display(fmt = "missing required parameter `{}`", _0)]
    MissingParameter(String),
    #[display(fmt = "set `{}` must not be empty", _0)]
    EmptySet(String),
}

impl std::error::Error for InputError {}

/// The set a key component is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Domain {
    #[display(fmt = "nodes")]
    Node,
    #[display(fmt = "loco_types")]
    Loco,
    #[display(fmt = "wagon_types")]
    Wagon,
    #[display(fmt = "container_types")]
    Container,
    #[display(fmt = "customers")]
    Customer,
    #[display(fmt = "origins")]
    Origin,
    #[display(fmt = "destinations")]
    Destination,
    #[display(fmt = "periods")]
    Period,
}

use Domain::*;

/// Every table the model reads, with the sets its key is drawn from
const SCHEMA: &[(&str, &[Domain])] = &[
    ("feasible_route", &[Node, Node]),
    ("travel_time", &[Node, Node]),
    ("loading_time", &[Node]),
    ("unloading_time", &[Node]),
    ("fixed_cost", &[Loco, Node, Node]),
    ("variable_cost", &[Wagon, Node, Node]),
    ("owned_locos", &[Loco]),
    ("owned_wagons", &[Wagon]),
    ("container_capacity", &[Node]),
    ("loco_capacity", &[Node]),
    ("wagon_capacity", &[Node]),
    ("initial_locos", &[Loco, Node]),
    ("initial_wagons", &[Wagon, Node]),
    ("supply", &[Container, Customer, Node, Destination, Period]),
    ("prep_time", &[Node]),
    ("max_delivery_time", &[Customer, Origin, Destination]),
    ("revenue", &[Container, Customer, Destination]),
];

const SCALARS: &[&str] = &["wagon_max"];

/// The raw document, before any label is resolved
#[derive(Debug, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub name: String,
    pub sets: SetRanges,
    #[serde(default)]
    pub scalars: HashMap<String, Option<Cell>>,
    #[serde(default)]
    pub tables: HashMap<String, Vec<Row>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetRanges {
    pub nodes: Vec<String>,
    /// Number of periods in the horizon
    pub periods: usize,
    #[serde(default)]
    pub loco_types: Vec<String>,
    #[serde(default)]
    pub wagon_types: Vec<String>,
    #[serde(default)]
    pub container_types: Vec<String>,
    #[serde(default)]
    pub customers: Vec<String>,
    /// Defaults to every node
    #[serde(default)]
    pub origins: Option<Vec<String>>,
    /// Defaults to every node
    #[serde(default)]
    pub destinations: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Row {
    pub key: Vec<Label>,
    #[serde(default)]
    pub value: Option<Cell>,
}

/// One component of a row key. Periods are usually written as numbers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Index(u64),
    Name(String),
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Index(i) => write!(f, "{}", i),
            Label::Name(s) => write!(f, "{}", s),
        }
    }
}

/// A value cell. Route flags may be written as booleans.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Flag(bool),
}

impl Cell {
    fn value(cell: Option<Cell>) -> f64 {
        match cell {
            None => 0.0,
            Some(Cell::Number(x)) => x,
            Some(Cell::Flag(true)) => 1.0,
            Some(Cell::Flag(false)) => 0.0,
        }
    }
}

/// Read and validate an instance from a JSON file
pub fn read_problem<P: AsRef<Path>>(path: P) -> Result<Problem, InputError> {
    let file = std::fs::File::open(path.as_ref()).map_err(InputError::Io)?;
    let reader = std::io::BufReader::new(file);
    let document: Document = serde_json::from_reader(reader).map_err(InputError::Json)?;
    info!("Read instance from {}", path.as_ref().display());
    Problem::try_from(document)
}

/// Validate an instance given as an already parsed JSON value
pub fn problem_from_value(value: serde_json::Value) -> Result<Problem, InputError> {
    let document: Document = serde_json::from_value(value).map_err(InputError::Json)?;
    Problem::try_from(document)
}

impl TryFrom<Document> for Problem {
    type Error = InputError;

    fn try_from(document: Document) -> Result<Problem, InputError> {
        for name in document.tables.keys() {
            if !SCHEMA.iter().any(|(table, _)| table == name) {
                return Err(InputError::UnrecognizedTable(name.clone()));
            }
        }
        for name in document.scalars.keys() {
            if !SCALARS.contains(&name.as_str()) {
                return Err(InputError::UnrecognizedTable(name.clone()));
            }
        }

        let sets = &document.sets;
        if sets.nodes.is_empty() {
            return Err(InputError::EmptySet("nodes".to_string()));
        }
        if sets.periods == 0 {
            return Err(InputError::EmptySet("periods".to_string()));
        }

        let resolver = Resolver::new(sets)?;

        let wagon_max = match document.scalars.get("wagon_max") {
            Some(cell) => Cell::value(*cell),
            None => return Err(InputError::MissingParameter("wagon_max".to_string())),
        };

        let n = |k: usize| NodeIndex::from(k);
        let feasible_route = if document.tables.contains_key("feasible_route") {
            Some(resolver.table(&document, "feasible_route", |k| (n(k[0]), n(k[1])))?)
        } else {
            None
        };

        let problem = Problem {
            name: document.name.clone(),
            nodes: sets.nodes.clone(),
            timesteps: sets.periods,
            loco_types: sets.loco_types.clone(),
            wagon_types: sets.wagon_types.clone(),
            container_types: sets.container_types.clone(),
            customers: sets.customers.clone(),
            origins: resolver.origins.iter().map(|i| n(*i)).collect(),
            destinations: resolver.destinations.iter().map(|i| n(*i)).collect(),
            wagon_max,
            feasible_route,
            travel_time: resolver.table(&document, "travel_time", |k| (n(k[0]), n(k[1])))?,
            loading_time: resolver.table(&document, "loading_time", |k| n(k[0]))?,
            unloading_time: resolver.table(&document, "unloading_time", |k| n(k[0]))?,
            fixed_cost: resolver.table(&document, "fixed_cost", |k| {
                (LocoIndex::from(k[0]), n(k[1]), n(k[2]))
            })?,
            variable_cost: resolver.table(&document, "variable_cost", |k| {
                (WagonIndex::from(k[0]), n(k[1]), n(k[2]))
            })?,
            owned_locos: resolver.table(&document, "owned_locos", |k| LocoIndex::from(k[0]))?,
            owned_wagons: resolver.table(&document, "owned_wagons", |k| WagonIndex::from(k[0]))?,
            container_capacity: resolver.table(&document, "container_capacity", |k| n(k[0]))?,
            loco_capacity: resolver.table(&document, "loco_capacity", |k| n(k[0]))?,
            wagon_capacity: resolver.table(&document, "wagon_capacity", |k| n(k[0]))?,
            initial_locos: resolver.table(&document, "initial_locos", |k| {
                (LocoIndex::from(k[0]), n(k[1]))
            })?,
            initial_wagons: resolver.table(&document, "initial_wagons", |k| {
                (WagonIndex::from(k[0]), n(k[1]))
            })?,
            supply: resolver.table(&document, "supply", |k| {
                (
                    ContainerIndex::from(k[0]),
                    CustomerIndex::from(k[1]),
                    n(k[2]),
                    n(k[3]),
                    k[4] as TimeIndex,
                )
            })?,
            prep_time: resolver.table(&document, "prep_time", |k| n(k[0]))?,
            max_delivery_time: resolver.table(&document, "max_delivery_time", |k| {
                (CustomerIndex::from(k[0]), n(k[1]), n(k[2]))
            })?,
            revenue: resolver.table(&document, "revenue", |k| {
                (ContainerIndex::from(k[0]), CustomerIndex::from(k[1]), n(k[2]))
            })?,
        };

        info!(
            "Instance `{}`: {} nodes, {} periods, {} loco types, {} wagon types, {} container types, {} customers",
            problem.name,
            problem.nodes.len(),
            problem.timesteps,
            problem.loco_types.len(),
            problem.wagon_types.len(),
            problem.container_types.len(),
            problem.customers.len()
        );

        Ok(problem)
    }
}

/// Maps labels to indices for each domain of the document
struct Resolver<'a> {
    sets: &'a SetRanges,
    origins: Vec<usize>,
    destinations: Vec<usize>,
}

impl<'a> Resolver<'a> {
    fn new(sets: &'a SetRanges) -> Result<Resolver<'a>, InputError> {
        let subset = |labels: &Option<Vec<String>>, name: &str| -> Result<Vec<usize>, InputError> {
            match labels {
                None => Ok((0..sets.nodes.len()).collect()),
                Some(labels) => labels
                    .iter()
                    .map(|label| {
                        sets.nodes.iter().position(|n| n == label).ok_or_else(|| {
                            InputError::UnknownLabel {
                                table: format!("sets.{}", name),
                                row: 0,
                                domain: Node,
                                label: label.clone(),
                            }
                        })
                    })
                    .collect(),
            }
        };

        Ok(Resolver {
            sets,
            origins: subset(&sets.origins, "origins")?,
            destinations: subset(&sets.destinations, "destinations")?,
        })
    }

    fn labels(&self, domain: Domain) -> &[String] {
        match domain {
            Node | Origin | Destination => &self.sets.nodes,
            Loco => &self.sets.loco_types,
            Wagon => &self.sets.wagon_types,
            Container => &self.sets.container_types,
            Customer => &self.sets.customers,
            Period => &[],
        }
    }

    /// Resolve a single key component of row `row` in `table`
    fn resolve(
        &self,
        table: &str,
        row: usize,
        domain: Domain,
        label: &Label,
    ) -> Result<usize, InputError> {
        if domain == Period {
            let period = match label {
                Label::Index(i) => Some(*i as usize),
                Label::Name(s) => s.trim().parse::<usize>().ok(),
            };
            return match period {
                Some(p) if p < self.sets.periods => Ok(p),
                Some(p) => Err(InputError::PeriodOutOfRange {
                    table: table.to_string(),
                    row,
                    period: p,
                    horizon: self.sets.periods,
                }),
                None => Err(InputError::MalformedIndex {
                    table: table.to_string(),
                    row,
                    reason: format!("`{}` is not a period", label),
                }),
            };
        }

        let text = label.to_string();
        let index = self
            .labels(domain)
            .iter()
            .position(|l| *l == text)
            .ok_or_else(|| InputError::UnknownLabel {
                table: table.to_string(),
                row,
                domain,
                label: text.clone(),
            })?;

        let member = match domain {
            Origin => self.origins.contains(&index),
            Destination => self.destinations.contains(&index),
            _ => true,
        };
        if !member {
            return Err(InputError::UnknownLabel {
                table: table.to_string(),
                row,
                domain,
                label: text,
            });
        }

        Ok(index)
    }

    /// Resolve all rows of `name` and collect them into a table keyed by `key`.
    /// A table that is not in the document is empty.
    fn table<K, F>(&self, document: &Document, name: &str, key: F) -> Result<Table<K>, InputError>
    where
        K: Eq + std::hash::Hash,
        F: Fn(&[usize]) -> K,
    {
        let domains = SCHEMA
            .iter()
            .find(|(table, _)| *table == name)
            .map(|(_, domains)| *domains)
            .ok_or_else(|| InputError::UnrecognizedTable(name.to_string()))?;

        let rows = match document.tables.get(name) {
            Some(rows) => rows,
            None => return Ok(Table::new()),
        };

        let mut table = Table::new();
        let mut resolved = Vec::with_capacity(domains.len());
        for (r, row) in rows.iter().enumerate() {
            if row.key.len() != domains.len() {
                return Err(InputError::MalformedIndex {
                    table: name.to_string(),
                    row: r,
                    reason: format!(
                        "expected {} key components, found {}",
                        domains.len(),
                        row.key.len()
                    ),
                });
            }
            resolved.clear();
            for (domain, label) in domains.iter().zip(&row.key) {
                resolved.push(self.resolve(name, r, *domain, label)?);
            }
            table.insert(key(&resolved), Cell::value(row.value));
        }

        debug!("Table `{}`: {} entries", name, table.len());
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(tables: serde_json::Value) -> serde_json::Value {
        json!({
            "name": "parse-test",
            "sets": {
                "nodes": ["A", "B", "C"],
                "periods": 4,
                "loco_types": ["Diesel"],
                "wagon_types": ["40ft"],
                "container_types": ["20ft", "40ft"],
                "customers": ["Maersk"],
                "origins": ["A"],
                "destinations": ["C"]
            },
            "scalars": { "wagon_max": 30 },
            "tables": tables
        })
    }

    #[test]
    fn empty_cells_read_as_zero() {
        let problem = problem_from_value(document(json!({
            "travel_time": [
                { "key": ["A", "B"], "value": 2 },
                { "key": ["B", "C"], "value": null },
                { "key": ["C", "A"] }
            ]
        })))
        .unwrap();

        let (a, b, c) = (
            problem.node("A").unwrap(),
            problem.node("B").unwrap(),
            problem.node("C").unwrap(),
        );
        assert_eq!(problem.travel_time.get(&(a, b)), 2.0);
        assert_eq!(problem.travel_time.get(&(b, c)), 0.0);
        assert_eq!(problem.travel_time.get(&(c, a)), 0.0);
        assert_eq!(problem.travel_time.get(&(a, c)), 0.0);
        // listed legs are feasible even with an empty travel time
        assert!(problem.is_feasible_route(b, c));
        assert!(!problem.is_feasible_route(a, c));
    }

    #[test]
    fn route_flags_gate_legs_when_present() {
        let problem = problem_from_value(document(json!({
            "feasible_route": [
                { "key": ["A", "B"], "value": true },
                { "key": ["B", "C"], "value": 0 }
            ],
            "travel_time": [
                { "key": ["A", "B"], "value": 1 },
                { "key": ["B", "C"], "value": 1 }
            ]
        })))
        .unwrap();

        let (a, b, c) = (
            problem.node("A").unwrap(),
            problem.node("B").unwrap(),
            problem.node("C").unwrap(),
        );
        assert!(problem.is_feasible_route(a, b));
        assert!(!problem.is_feasible_route(b, c));
    }

    #[test]
    fn supply_keys_resolve_every_component() {
        let problem = problem_from_value(document(json!({
            "supply": [ { "key": ["40ft", "Maersk", "A", "C", 2], "value": 5 } ]
        })))
        .unwrap();

        let key = (
            problem.container_type("40ft").unwrap(),
            problem.customer("Maersk").unwrap(),
            problem.node("A").unwrap(),
            problem.node("C").unwrap(),
            2,
        );
        assert_eq!(problem.supply.get(&key), 5.0);
    }

    #[test]
    fn unknown_table_is_rejected() {
        let err = problem_from_value(document(json!({ "sheet1": [] }))).unwrap_err();
        assert!(matches!(err, InputError::UnrecognizedTable(name) if name == "sheet1"));
    }

    #[test]
    fn wrong_key_arity_is_rejected() {
        let err = problem_from_value(document(json!({
            "travel_time": [ { "key": ["A"], "value": 1 } ]
        })))
        .unwrap_err();
        assert!(matches!(err, InputError::MalformedIndex { row: 0, .. }));
    }

    #[test]
    fn labels_outside_their_set_are_rejected() {
        let err = problem_from_value(document(json!({
            "initial_locos": [ { "key": ["Steam", "A"], "value": 1 } ]
        })))
        .unwrap_err();
        assert!(matches!(err, InputError::UnknownLabel { domain: Domain::Loco, .. }));

        // B is a node, but not a destination
        let err = problem_from_value(document(json!({
            "revenue": [ { "key": ["40ft", "Maersk", "B"], "value": 1 } ]
        })))
        .unwrap_err();
        assert!(matches!(
            err,
            InputError::UnknownLabel {
                domain: Domain::Destination,
                ..
            }
        ));
    }

    #[test]
    fn periods_must_lie_in_the_horizon() {
        let err = problem_from_value(document(json!({
            "supply": [ { "key": ["40ft", "Maersk", "A", "C", 4], "value": 1 } ]
        })))
        .unwrap_err();
        assert!(matches!(
            err,
            InputError::PeriodOutOfRange {
                period: 4,
                horizon: 4,
                ..
            }
        ));
    }

    #[test]
    fn wagon_max_is_required() {
        let mut value = document(json!({}));
        value["scalars"] = json!({});
        let err = problem_from_value(value).unwrap_err();
        assert!(matches!(err, InputError::MissingParameter(name) if name == "wagon_max"));
    }

    #[test]
    fn origins_and_destinations_default_to_all_nodes() {
        let problem = problem_from_value(json!({
            "sets": { "nodes": ["A", "B"], "periods": 2 },
            "scalars": { "wagon_max": 10 }
        }))
        .unwrap();
        assert_eq!(problem.origins().len(), 2);
        assert_eq!(problem.destinations().len(), 2);
    }
}
