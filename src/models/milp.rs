//! A solver independent mixed integer linear program.
//!
//! Models are built once, then handed to one of the backends in
//! [`crate::solver`] or written out in LP format.

use std::{
    fmt,
    io::{self, Write},
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
    path::Path,
};

use float_ord::FloatOrd;
use log::warn;
use serde::{Deserialize, Serialize};

/// Handle to a variable of a [`Model`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(usize);

impl Var {
    /// Position of the variable in [`Model::vars`] and in solution vectors
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarType {
    Binary,
    Integer,
    Continuous,
}

#[derive(Debug, Clone)]
pub struct VarDef {
    pub name: String,
    pub vtype: VarType,
    pub lb: f64,
    pub ub: f64,
}

/// A linear expression `sum(coeff * var) + constant`
#[derive(Debug, Clone, Default)]
pub struct LinExpr {
    terms: Vec<(Var, f64)>,
    constant: f64,
}

impl LinExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constant(value: f64) -> Self {
        LinExpr {
            terms: Vec::new(),
            constant: value,
        }
    }

    /// Adds `coeff * var`. Zero coefficients are dropped.
    pub fn add_term(&mut self, coeff: f64, var: Var) -> &mut Self {
        if coeff != 0.0 {
            self.terms.push((var, coeff));
        }
        self
    }

    pub fn add_constant(&mut self, value: f64) -> &mut Self {
        self.constant += value;
        self
    }

    pub fn terms(&self) -> &[(Var, f64)] {
        &self.terms
    }

    pub fn get_constant(&self) -> f64 {
        self.constant
    }

    /// The total coefficient of `var` in this expression
    pub fn coefficient(&self, var: Var) -> f64 {
        self.terms
            .iter()
            .filter(|(v, _)| *v == var)
            .map(|(_, c)| c)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.constant
            + self
                .terms
                .iter()
                .map(|(v, c)| c * values[v.index()])
                .sum::<f64>()
    }

    /// Merge repeated variables and drop terms that cancel out
    pub fn compact(mut self) -> Self {
        self.terms.sort_by_key(|(v, _)| *v);
        let mut merged: Vec<(Var, f64)> = Vec::with_capacity(self.terms.len());
        for (var, coeff) in self.terms {
            match merged.last_mut() {
                Some((last, c)) if *last == var => *c += coeff,
                _ => merged.push((var, coeff)),
            }
        }
        merged.retain(|(_, c)| *c != 0.0);
        self.terms = merged;
        self
    }

    pub fn leq(self, rhs: impl Into<LinExpr>) -> IneqExpr {
        IneqExpr::new(self, Sense::Less, rhs.into())
    }

    pub fn eq(self, rhs: impl Into<LinExpr>) -> IneqExpr {
        IneqExpr::new(self, Sense::Equal, rhs.into())
    }

    pub fn geq(self, rhs: impl Into<LinExpr>) -> IneqExpr {
        IneqExpr::new(self, Sense::Greater, rhs.into())
    }
}

impl From<Var> for LinExpr {
    fn from(var: Var) -> Self {
        LinExpr {
            terms: vec![(var, 1.0)],
            constant: 0.0,
        }
    }
}

impl From<&Var> for LinExpr {
    fn from(var: &Var) -> Self {
        LinExpr::from(*var)
    }
}

impl From<f64> for LinExpr {
    fn from(value: f64) -> Self {
        LinExpr::constant(value)
    }
}

impl<T: Into<LinExpr>> AddAssign<T> for LinExpr {
    fn add_assign(&mut self, rhs: T) {
        let rhs = rhs.into();
        self.terms.extend(rhs.terms);
        self.constant += rhs.constant;
    }
}

impl<T: Into<LinExpr>> SubAssign<T> for LinExpr {
    fn sub_assign(&mut self, rhs: T) {
        *self += -rhs.into();
    }
}

impl<T: Into<LinExpr>> Add<T> for LinExpr {
    type Output = LinExpr;

    fn add(mut self, rhs: T) -> LinExpr {
        self += rhs;
        self
    }
}

impl<T: Into<LinExpr>> Sub<T> for LinExpr {
    type Output = LinExpr;

    fn sub(mut self, rhs: T) -> LinExpr {
        self -= rhs;
        self
    }
}

impl Neg for LinExpr {
    type Output = LinExpr;

    fn neg(mut self) -> LinExpr {
        self.terms.iter_mut().for_each(|(_, c)| *c = -*c);
        self.constant = -self.constant;
        self
    }
}

impl Mul<Var> for f64 {
    type Output = LinExpr;

    fn mul(self, var: Var) -> LinExpr {
        let mut expr = LinExpr::new();
        expr.add_term(self, var);
        expr
    }
}

impl Mul<LinExpr> for f64 {
    type Output = LinExpr;

    fn mul(self, mut expr: LinExpr) -> LinExpr {
        expr.terms.iter_mut().for_each(|(_, c)| *c *= self);
        expr.terms.retain(|(_, c)| *c != 0.0);
        expr.constant *= self;
        expr
    }
}

/// Sums an iterator of variables or expressions into one expression
pub trait LinSum {
    fn lin_sum(self) -> LinExpr;
}

impl<I, T> LinSum for I
where
    I: Iterator<Item = T>,
    T: Into<LinExpr>,
{
    fn lin_sum(self) -> LinExpr {
        let mut expr = LinExpr::new();
        for item in self {
            expr += item;
        }
        expr
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sense {
    Less,
    Equal,
    Greater,
}

impl fmt::Display for Sense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sense::Less => write!(f, "<="),
            Sense::Equal => write!(f, "="),
            Sense::Greater => write!(f, ">="),
        }
    }
}

/// `lhs sense rhs`, with every variable moved to the left and every constant to the right
#[derive(Debug, Clone)]
pub struct IneqExpr {
    lhs: LinExpr,
    sense: Sense,
    rhs: f64,
}

impl IneqExpr {
    fn new(lhs: LinExpr, sense: Sense, rhs: LinExpr) -> Self {
        let lhs = (lhs - rhs).compact();
        let rhs = -lhs.constant;
        IneqExpr {
            lhs: LinExpr {
                terms: lhs.terms,
                constant: 0.0,
            },
            sense,
            rhs,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Constr {
    pub name: String,
    pub lhs: LinExpr,
    pub sense: Sense,
    pub rhs: f64,
}

impl Constr {
    /// How far `values` are from satisfying the constraint, 0 if satisfied
    pub fn violation(&self, values: &[f64]) -> f64 {
        let lhs = self.lhs.evaluate(values);
        match self.sense {
            Sense::Less => (lhs - self.rhs).max(0.0),
            Sense::Greater => (self.rhs - lhs).max(0.0),
            Sense::Equal => (lhs - self.rhs).abs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelSense {
    Minimize,
    Maximize,
}

#[derive(Debug, Clone)]
pub struct Model {
    name: String,
    vars: Vec<VarDef>,
    constrs: Vec<Constr>,
    objective: LinExpr,
    sense: ModelSense,
}

impl Model {
    pub fn new(name: &str) -> Model {
        Model {
            name: name.to_string(),
            vars: Vec::new(),
            constrs: Vec::new(),
            objective: LinExpr::new(),
            sense: ModelSense::Minimize,
        }
    }

    pub fn add_var(&mut self, name: &str, vtype: VarType, lb: f64, ub: f64) -> Var {
        let (lb, ub) = match vtype {
            VarType::Binary => (lb.max(0.0), ub.min(1.0)),
            _ => (lb, ub),
        };
        self.vars.push(VarDef {
            name: name.to_string(),
            vtype,
            lb,
            ub,
        });
        Var(self.vars.len() - 1)
    }

    pub fn add_constr(&mut self, name: &str, constr: IneqExpr) -> &Constr {
        self.constrs.push(Constr {
            name: name.to_string(),
            lhs: constr.lhs,
            sense: constr.sense,
            rhs: constr.rhs,
        });
        &self.constrs[self.constrs.len() - 1]
    }

    pub fn set_objective(&mut self, expr: impl Into<LinExpr>, sense: ModelSense) {
        self.objective = expr.into().compact();
        self.sense = sense;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vars(&self) -> &[VarDef] {
        &self.vars
    }

    pub fn var(&self, var: Var) -> &VarDef {
        &self.vars[var.index()]
    }

    pub fn constrs(&self) -> &[Constr] {
        &self.constrs
    }

    /// Find a constraint by name
    pub fn constr(&self, name: &str) -> Option<&Constr> {
        self.constrs.iter().find(|c| c.name == name)
    }

    /// Constraints whose name starts with `prefix`
    pub fn constrs_named<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a Constr> + 'a {
        self.constrs.iter().filter(move |c| c.name.starts_with(prefix))
    }

    pub fn objective(&self) -> &LinExpr {
        &self.objective
    }

    pub fn sense(&self) -> ModelSense {
        self.sense
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    pub fn num_constrs(&self) -> usize {
        self.constrs.len()
    }

    pub fn num_integer_vars(&self) -> usize {
        self.vars
            .iter()
            .filter(|v| v.vtype != VarType::Continuous)
            .count()
    }

    /// The largest constraint violation of `values`
    pub fn max_violation(&self, values: &[f64]) -> f64 {
        self.constrs
            .iter()
            .map(|c| FloatOrd(c.violation(values)))
            .max()
            .map(|v| v.0)
            .unwrap_or(0.0)
    }

    /// The largest distance of an integer variable from the nearest integer, or from its bounds
    pub fn max_integrality_violation(&self, values: &[f64]) -> f64 {
        self.vars
            .iter()
            .zip(values)
            .map(|(def, x)| {
                let bound = (def.lb - x).max(x - def.ub).max(0.0);
                let integrality = match def.vtype {
                    VarType::Continuous => 0.0,
                    _ => (x - x.round()).abs(),
                };
                FloatOrd(bound.max(integrality))
            })
            .max()
            .map(|v| v.0)
            .unwrap_or(0.0)
    }

    /// Constraints violated by more than `tolerance`
    pub fn violated<'a>(&'a self, values: &'a [f64], tolerance: f64) -> Vec<&'a Constr> {
        self.constrs
            .iter()
            .filter(|c| c.violation(values) > tolerance)
            .collect()
    }

    /// Write the model in CPLEX LP format
    pub fn write_lp<W: Write>(&self, mut out: W) -> io::Result<()> {
        writeln!(out, "\\ {}", self.name)?;
        match self.sense {
            ModelSense::Minimize => writeln!(out, "Minimize")?,
            ModelSense::Maximize => writeln!(out, "Maximize")?,
        }
        write!(out, " obj:")?;
        self.write_terms(&mut out, &self.objective)?;
        if self.objective.constant != 0.0 {
            write!(out, " {:+}", self.objective.constant)?;
        }
        writeln!(out)?;

        writeln!(out, "Subject To")?;
        for constr in &self.constrs {
            // LP rows need at least one variable, constant rows are kept as comments
            if constr.lhs.is_empty() {
                if constr.violation(&[]) > 0.0 {
                    warn!("Constraint {} has no variables and can not hold", constr.name);
                }
                writeln!(out, "\\ {}: 0 {} {}", constr.name, constr.sense, constr.rhs)?;
                continue;
            }
            write!(out, " {}:", constr.name)?;
            self.write_terms(&mut out, &constr.lhs)?;
            writeln!(out, " {} {}", constr.sense, constr.rhs)?;
        }

        writeln!(out, "Bounds")?;
        for def in &self.vars {
            if def.ub.is_finite() {
                writeln!(out, " {} <= {} <= {}", def.lb, def.name, def.ub)?;
            } else if def.lb != 0.0 {
                writeln!(out, " {} >= {}", def.name, def.lb)?;
            }
        }

        let names = |vtype: VarType| {
            self.vars
                .iter()
                .filter(move |v| v.vtype == vtype)
                .map(|v| v.name.as_str())
        };
        writeln!(out, "General")?;
        for name in names(VarType::Integer) {
            writeln!(out, " {}", name)?;
        }
        writeln!(out, "Binary")?;
        for name in names(VarType::Binary) {
            writeln!(out, " {}", name)?;
        }
        writeln!(out, "End")?;
        out.flush()
    }

    /// Write the model in LP format to `path`
    pub fn write<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_lp(io::BufWriter::new(file))
    }

    fn write_terms<W: Write>(&self, out: &mut W, expr: &LinExpr) -> io::Result<()> {
        for (var, coeff) in expr.terms() {
            write!(out, " {:+} {}", coeff, self.vars[var.index()].name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> (Model, Var, Var, Var) {
        let mut model = Model::new("test");
        let x = model.add_var("x", VarType::Binary, 0.0, 1.0);
        let y = model.add_var("y", VarType::Integer, 0.0, f64::INFINITY);
        let z = model.add_var("z", VarType::Continuous, 0.0, 10.0);
        (model, x, y, z)
    }

    #[test]
    fn constants_move_to_the_right_hand_side() {
        let (mut model, x, y, _) = model();
        // x + 2 <= 3y + 5  ==>  x - 3y <= 3
        let c = model.add_constr("c", (LinExpr::from(x) + 2.0).leq(3.0 * y + 5.0));
        assert_eq!(c.sense, Sense::Less);
        assert_eq!(c.rhs, 3.0);
        assert_eq!(c.lhs.coefficient(x), 1.0);
        assert_eq!(c.lhs.coefficient(y), -3.0);
        assert_eq!(c.lhs.get_constant(), 0.0);
    }

    #[test]
    fn repeated_terms_are_merged() {
        let (_, x, y, _) = model();
        let expr = (LinExpr::from(x) + y + 2.0 * x - y).compact();
        assert_eq!(expr.terms(), &[(x, 3.0)]);
    }

    #[test]
    fn sums_of_variables() {
        let (_, x, y, z) = model();
        let expr = [x, y, z].iter().lin_sum();
        assert_eq!(expr.terms().len(), 3);
        assert_eq!(expr.evaluate(&[1.0, 2.0, 3.0]), 6.0);
        assert!(std::iter::empty::<Var>().lin_sum().is_empty());
    }

    #[test]
    fn violations_depend_on_the_sense() {
        let (mut model, x, y, _) = model();
        model.add_constr("le", LinExpr::from(x).leq(LinExpr::from(y)));
        model.add_constr("eq", LinExpr::from(y).eq(2.0));

        let values = [1.0, 0.5, 0.0];
        assert_eq!(model.constr("le").unwrap().violation(&values), 0.5);
        assert_eq!(model.constr("eq").unwrap().violation(&values), 1.5);
        assert_eq!(model.max_violation(&values), 1.5);
        assert_eq!(model.violated(&values, 1e-6).len(), 2);
        assert_eq!(model.max_integrality_violation(&values), 0.5);
    }

    #[test]
    fn lp_output_has_every_section() {
        let (mut model, x, y, z) = model();
        model.add_constr("cap", (LinExpr::from(x) + y + z).leq(4.0));
        model.set_objective(2.0 * x + 3.0 * y, ModelSense::Minimize);

        let mut buffer = Vec::new();
        model.write_lp(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.contains("Minimize\n obj: +2 x +3 y"));
        assert!(text.contains(" cap: +1 x +1 y +1 z <= 4"));
        assert!(text.contains("General\n y\n"));
        assert!(text.contains("Binary\n x\n"));
        assert!(text.trim_end().ends_with("End"));
    }

    #[test]
    fn rows_without_variables_are_comments() {
        let mut model = Model::new("constant");
        model.add_constr("trivial", LinExpr::from(1.0).leq(3.0));

        let mut buffer = Vec::new();
        model.write_lp(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.contains("Subject To\n\\ trivial: 0 <= 2\n"));
        assert!(!text.contains(" trivial:"));
        assert!(!text.contains(" 0 0"));
    }
}
