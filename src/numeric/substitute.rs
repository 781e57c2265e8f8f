use std::marker::PhantomData;

use na::{DMatrix, DVector};
use tracing::debug;

use super::{Evaluation, Evaluator};
use crate::{
    dynamics::gaussian_solve,
    error::Result,
    expr::{DoubleDouble, ExprGraph, ExprId, Scalar},
    kane::EquationsOfMotion,
    substitution::SubstitutionMap,
    types::Float,
};

/// Evaluates M and F by walking the expression graph in scalar type `S`,
/// then solves M u' = F in the same type.
#[derive(Clone, Debug)]
pub struct SubstitutionEvaluator<S> {
    label: String,
    _scalar: PhantomData<S>,
}

/// Double-double arithmetic, roughly 32 significant digits.
pub type ExactSubstitution = SubstitutionEvaluator<DoubleDouble>;

/// Plain `f64` arithmetic.
pub type DirectSubstitution = SubstitutionEvaluator<f64>;

impl<S: Scalar> SubstitutionEvaluator<S> {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            _scalar: PhantomData,
        }
    }
}

impl ExactSubstitution {
    pub fn exact() -> Self {
        Self::new("exact substitution")
    }
}

impl DirectSubstitution {
    pub fn direct() -> Self {
        Self::new("direct substitution")
    }
}

impl<S: Scalar> Evaluator for SubstitutionEvaluator<S> {
    fn label(&self) -> &str {
        &self.label
    }

    fn evaluate(
        &self,
        graph: &ExprGraph,
        eom: &EquationsOfMotion,
        values: &SubstitutionMap,
    ) -> Result<Evaluation> {
        let n = eom.speeds.len();
        let roots = eom.roots();
        let dense = values.dense::<S>(graph);
        let results = graph.evaluate(&roots, &dense)?;
        debug!(label = %self.label, nodes = graph.reachable(&roots).len(), "evaluated");

        let rows: Vec<Vec<S>> = results[..n * n].chunks(n).map(|r| r.to_vec()).collect();
        let forcing = results[n * n..].to_vec();
        let solution = gaussian_solve(rows, forcing.clone())?;

        Ok(Evaluation {
            label: self.label.clone(),
            mass_matrix: DMatrix::from_row_iterator(n, n, results[..n * n].iter().map(|v| v.to_f64())),
            forcing: DVector::from_iterator(n, forcing.iter().map(|v| v.to_f64())),
            speed_derivatives: DVector::from_iterator(
                n,
                solution.iter().map(|v| v.to_f64()),
            ),
        })
    }
}

/// Convenience for evaluating a single expression list in `f64`.
pub fn evaluate_f64(
    graph: &ExprGraph,
    roots: &[ExprId],
    values: &SubstitutionMap,
) -> Result<Vec<Float>> {
    graph.evaluate(roots, &values.dense::<f64>(graph))
}

#[cfg(test)]
mod substitute_tests {
    use super::*;
    use crate::{assert_close, error::Error};

    /// A cart of mass m pushed by force f: m x'' = f, q' = u.
    fn cart(graph: &mut ExprGraph) -> (EquationsOfMotion, SubstitutionMap) {
        let m = graph.constant("m").unwrap();
        let f = graph.dynamic("f").unwrap();
        let q = graph.dynamic("q").unwrap();
        let u = graph.dynamic("u").unwrap();
        let eom = EquationsOfMotion {
            coordinates: vec![graph.as_symbol(q).unwrap()],
            speeds: vec![graph.as_symbol(u).unwrap()],
            n_independent: 1,
            mass_matrix: DMatrix::from_element(1, 1, m),
            forcing: DVector::from_element(1, f),
            kinematic_rhs: DVector::from_element(1, u),
        };
        let mut values = SubstitutionMap::new();
        values.insert(graph.as_symbol(m).unwrap(), 3.0);
        values.insert(graph.as_symbol(f).unwrap(), 1.0);
        (eom, values)
    }

    #[test]
    fn exact_and_direct_agree() {
        // Arrange
        let mut graph = ExprGraph::new();
        let (eom, values) = cart(&mut graph);

        // Act
        let exact = ExactSubstitution::exact().evaluate(&graph, &eom, &values).unwrap();
        let direct = DirectSubstitution::direct().evaluate(&graph, &eom, &values).unwrap();

        // Assert
        assert_close!(exact.speed_derivatives[0], 1.0 / 3.0, 1e-16);
        assert_close!(direct.speed_derivatives[0], 1.0 / 3.0, 1e-16);
        assert_eq!(exact.mass_matrix[(0, 0)], 3.0);
        assert_eq!(exact.label, "exact substitution");
    }

    #[test]
    fn missing_value_is_reported() {
        // Arrange
        let mut graph = ExprGraph::new();
        let (eom, _) = cart(&mut graph);
        let mut values = SubstitutionMap::new();
        values.insert(graph.find_symbol("m").unwrap(), 3.0);

        // Act
        let result = DirectSubstitution::direct().evaluate(&graph, &eom, &values);

        // Assert
        assert!(matches!(result, Err(Error::MissingValue(name)) if name == "f"));
    }
}
