use na::{DMatrix, DVector};

use crate::{
    error::{Error, Result},
    expr::Scalar,
    types::Float,
};

/// Solves the equations of motion
///     M(q) u' = F(q, u, T)
/// for the speed derivatives u'.
pub fn dynamics_solve(mass_matrix: &DMatrix<Float>, forcing: &DVector<Float>) -> Result<DVector<Float>> {
    mass_matrix.clone().lu().solve(forcing).ok_or_else(|| {
        Error::SingularSystem(format!(
            r#"M(q) u' = F
        where M = {},
              F = {}"#,
            mass_matrix, forcing
        ))
    })
}

/// Gaussian elimination with partial pivoting in any scalar type, for
/// solving in extended precision.
pub fn gaussian_solve<S: Scalar>(mut a: Vec<Vec<S>>, mut b: Vec<S>) -> Result<Vec<S>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|i, j| {
                a[*i][col]
                    .to_f64()
                    .abs()
                    .total_cmp(&a[*j][col].to_f64().abs())
            })
            .unwrap_or(col);
        if a[pivot][col].to_f64() == 0.0 {
            return Err(Error::SingularSystem(format!("column {} has no pivot", col)));
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                let delta = factor * a[col][k];
                a[row][k] = a[row][k] - delta;
            }
            b[row] = b[row] - factor * b[col];
        }
    }
    let mut x = b.clone();
    for row in (0..n).rev() {
        let mut acc = b[row];
        for k in (row + 1)..n {
            acc = acc - a[row][k] * x[k];
        }
        x[row] = acc / a[row][row];
    }
    Ok(x)
}
