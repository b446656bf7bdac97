use std::{collections::HashMap, fmt::Display, hash::Hash, ops::Range};

use crate::models::milp::{Model, Var, VarType};

pub trait AddVars {
    type Out;

    /// Create a variable for any type
    fn vars(&self, model: &mut Model, base_name: &str, vtype: VarType, bounds: &Range<f64>)
        -> Self::Out;

    /// Non-negative integer variables
    fn integer(&self, model: &mut Model, base_name: &str) -> Self::Out {
        self.vars(model, base_name, VarType::Integer, &(0.0..f64::INFINITY))
    }
}

impl AddVars for usize {
    type Out = Vec<Var>;

    fn vars(
        &self,
        model: &mut Model,
        base_name: &str,
        vtype: VarType,
        bounds: &Range<f64>,
    ) -> Self::Out {
        (0..*self)
            .map(|i| {
                model.add_var(
                    &format!("{}_{}", base_name, i),
                    vtype,
                    bounds.start,
                    bounds.end,
                )
            })
            .collect()
    }
}

impl AddVars for (usize, usize) {
    type Out = Vec<<usize as AddVars>::Out>;

    fn vars(
        &self,
        model: &mut Model,
        base_name: &str,
        vtype: VarType,
        bounds: &Range<f64>,
    ) -> Self::Out {
        (0..self.0)
            .map(|i| {
                self.1
                    .vars(model, &format!("{}_{}", base_name, i), vtype, bounds)
            })
            .collect()
    }
}

impl AddVars for (usize, usize, usize) {
    type Out = Vec<<(usize, usize) as AddVars>::Out>;

    fn vars(
        &self,
        model: &mut Model,
        base_name: &str,
        vtype: VarType,
        bounds: &Range<f64>,
    ) -> Self::Out {
        (0..self.0)
            .map(|i| {
                (self.1, self.2).vars(model, &format!("{}_{}", base_name, i), vtype, bounds)
            })
            .collect()
    }
}

/// Renders an index tuple as `a_b_c`, for use in variable and constraint names
pub trait IndexName {
    fn index_name(&self) -> String;
}

macro_rules! index_name {
    ($($t:ident : $i:tt),+) => {
        impl<$($t: Display),+> IndexName for ($($t,)+) {
            fn index_name(&self) -> String {
                [$(self.$i.to_string()),+].join("_")
            }
        }
    };
}

index_name!(A: 0, B: 1);
index_name!(A: 0, B: 1, C: 2);
index_name!(A: 0, B: 1, C: 2, D: 3);
index_name!(A: 0, B: 1, C: 2, D: 3, E: 4);
index_name!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);

/// One variable per key in `indices`, for index sets that are too sparse to store densely
pub fn sparse_vars<K, I>(
    indices: I,
    model: &mut Model,
    vtype: VarType,
    bounds: &Range<f64>,
    base_name: &str,
) -> HashMap<K, Var>
where
    K: Eq + Hash + IndexName,
    I: IntoIterator<Item = K>,
{
    indices
        .into_iter()
        .map(|key| {
            let name = format!("{}_{}", base_name, key.index_name());
            let var = model.add_var(&name, vtype, bounds.start, bounds.end);
            (key, var)
        })
        .collect()
}

/// Trait that reads the values of variables out of a solution vector
pub trait ConvertVars {
    type Out;
    fn convert(&self, values: &[f64]) -> Self::Out;
}

impl<T: ConvertVars> ConvertVars for Vec<T> {
    type Out = Vec<T::Out>;

    fn convert(&self, values: &[f64]) -> Self::Out {
        self.iter().map(|e| e.convert(values)).collect()
    }
}

impl<K: Eq + Hash + Clone> ConvertVars for HashMap<K, Var> {
    type Out = HashMap<K, f64>;

    fn convert(&self, values: &[f64]) -> Self::Out {
        self.iter()
            .map(|(k, v)| (k.clone(), v.convert(values)))
            .collect()
    }
}

impl ConvertVars for Var {
    type Out = f64;

    fn convert(&self, values: &[f64]) -> Self::Out {
        values[self.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_vars_are_named_by_position() {
        let mut model = Model::new("vars");
        let m = (2, 3, 4).integer(&mut model, "m");

        assert_eq!(model.num_vars(), 24);
        assert_eq!(m.len(), 2);
        assert_eq!(m[1].len(), 3);
        assert_eq!(model.var(m[1][2][3]).name, "m_1_2_3");
        assert_eq!(model.var(m[1][2][3]).vtype, VarType::Integer);
    }

    #[test]
    fn sparse_vars_only_exist_for_listed_keys() {
        let mut model = Model::new("vars");
        let x = sparse_vars(
            vec![(0usize, 1usize), (2, 0)],
            &mut model,
            VarType::Binary,
            &(0.0..1.0),
            "x",
        );

        assert_eq!(x.len(), 2);
        assert!(x.get(&(0, 2)).is_none());
        assert_eq!(model.var(x[&(2, 0)]).name, "x_2_0");
    }

    #[test]
    fn converted_values_keep_their_shape() {
        let mut model = Model::new("vars");
        let m = (2, 2).integer(&mut model, "m");
        let values = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(m.convert(&values), vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    }
}
