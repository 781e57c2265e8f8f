use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::info;

use crate::{
    error::{Error, Result},
    expr::{ExprId, Replacement, SymbolKind},
    mechanism::Mechanism,
    types::Float,
};

/// Outcome of the holonomic derivative spot check.
#[derive(Clone, Debug, PartialEq)]
pub struct IdentityCheck {
    pub samples: usize,
    /// Largest |d/dt(holonomic) - nonholonomic| over all samples.
    pub max_residual: Float,
}

/// Checks that the time derivative of a configuration constraint, with the
/// kinematic equations substituted, equals the matching velocity constraint.
///
/// Both sides are evaluated at `samples` random points: constants drawn from
/// [1, 3), time-varying symbols from [-1, 1). A residual larger than
/// `tolerance * max(1, |lhs|)` is a modeling inconsistency.
pub fn check_holonomic_derivative(
    mech: &mut Mechanism,
    holonomic: ExprId,
    nonholonomic: ExprId,
    kinematics: &mut Replacement,
    samples: usize,
    seed: u64,
    tolerance: Float,
) -> Result<IdentityCheck> {
    let rate = mech.graph.dt(holonomic, &mut mech.cache)?;
    let rate = mech.graph.xreplace(rate, kinematics);
    let symbols = mech.graph.free_symbols(&[rate, nonholonomic]);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut max_residual: Float = 0.0;
    for sample in 0..samples {
        let mut values = vec![None; mech.graph.symbol_count()];
        for s in &symbols {
            values[s.index()] = Some(match mech.graph.symbol_info(*s).kind {
                SymbolKind::Constant => rng.random_range(1.0..3.0),
                SymbolKind::Dynamic => rng.random_range(-1.0..1.0),
            });
        }
        let result = mech.graph.evaluate::<Float>(&[rate, nonholonomic], &values)?;
        let (derivative, constraint) = (result[0], result[1]);
        let residual = (derivative - constraint).abs();
        if residual > tolerance * derivative.abs().max(1.0) {
            return Err(Error::ModelInconsistent {
                sample,
                derivative,
                constraint,
            });
        }
        max_residual = max_residual.max(residual);
    }
    info!(samples, max_residual, "holonomic constraint derivative matches");
    Ok(IdentityCheck {
        samples,
        max_residual,
    })
}
