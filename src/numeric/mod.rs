//! Numerical evaluation of the symbolic equations of motion.
//!
//! Three strategies share one trait: exact substitution in double-double
//! arithmetic, direct substitution in `f64`, and a compiled instruction
//! tape standing in for generated code.

use na::{DMatrix, DVector};

use crate::{
    error::Result,
    expr::{ExprGraph, SymbolId},
    kane::EquationsOfMotion,
    substitution::SubstitutionMap,
    types::Float,
};

pub mod codegen;
pub mod substitute;

pub use codegen::{GeneratedFunction, Instr, OdeFunction, Tape};
pub use substitute::{DirectSubstitution, ExactSubstitution, SubstitutionEvaluator};

/// M, F and the solved speed derivatives at one point.
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    pub label: String,
    pub mass_matrix: DMatrix<Float>,
    pub forcing: DVector<Float>,
    /// u' in the speed order of the equations of motion.
    pub speed_derivatives: DVector<Float>,
}

impl Evaluation {
    /// Looks up the derivative of `speed`.
    pub fn speed_derivative(&self, eom: &EquationsOfMotion, speed: SymbolId) -> Option<Float> {
        eom.speeds
            .iter()
            .position(|u| *u == speed)
            .map(|i| self.speed_derivatives[i])
    }
}

pub trait Evaluator {
    fn label(&self) -> &str;

    fn evaluate(
        &self,
        graph: &ExprGraph,
        eom: &EquationsOfMotion,
        values: &SubstitutionMap,
    ) -> Result<Evaluation>;
}
