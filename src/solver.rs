use log::debug;
use nalgebra::{DMatrix, DVector};

/// Returns `None` if no finite solution could be found.
pub fn solve_ridge(x: &DMatrix<f64>, y: &DVector<f64>, penalties: &[f64]) -> Option<DVector<f64>> {
    if x.ncols() != penalties.len() || x.nrows() != y.len() {
        return None;
    }

    let xt = x.transpose();
    let mut gram = &xt * x;
    for (j, penalty) in penalties.iter().enumerate() {
        gram[(j, j)] += penalty;
    }
    let rhs = &xt * y;

    if let Some(chol) = gram.clone().cholesky() {
        let beta = chol.solve(&rhs);
        if beta.iter().all(|v| v.is_finite()) {
            return Some(beta);
        }
    }

    debug!("Cholesky solve failed, retrying with SVD");
    let svd = gram.svd(true, true);
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(&rhs, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpenalised_solve_recovers_line() {
        // y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_ridge(&x, &y, &[0.0, 0.0]).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_penalty_shrinks_towards_zero() {
        let x = DMatrix::from_row_slice(3, 1, &[1.0, 1.0, 1.0]);
        let y = DVector::from_row_slice(&[3.0, 3.0, 3.0]);

        let free = solve_ridge(&x, &y, &[0.0]).unwrap();
        let shrunk = solve_ridge(&x, &y, &[3.0]).unwrap();
        assert!((free[0] - 3.0).abs() < 1e-10);
        assert!((shrunk[0] - 1.5).abs() < 1e-10);
    }

    #[test]
    fn test_small_penalty_regularises_collinear_columns() {
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 1.0, 2.0, 2.0, 3.0, 3.0]);
        let y = DVector::from_row_slice(&[1.0, 2.0, 3.0]);
        let beta = solve_ridge(&x, &y, &[1e-6, 1e-6]).unwrap();
        assert!((beta[0] - beta[1]).abs() < 1e-6);
        assert!((beta[0] + beta[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_shape_mismatch_is_rejected() {
        let x = DMatrix::from_row_slice(2, 1, &[1.0, 1.0]);
        let y = DVector::from_row_slice(&[1.0, 2.0, 3.0]);
        assert!(solve_ridge(&x, &y, &[0.0]).is_none());
    }
}
