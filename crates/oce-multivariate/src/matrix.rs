// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Small dense-matrix helpers for the Mahalanobis detector. Dimensions here
//! are variable counts (a handful), so plain Gauss-Jordan is plenty.

use oce_core::OceError;

const PIVOT_TOLERANCE: f64 = 1.0e-12;

/// Column-wise mean of a row-major matrix.
pub fn mean_vector(rows: &[Vec<f64>]) -> Result<Vec<f64>, OceError> {
    let n = rows.len();
    if n == 0 {
        return Err(OceError::invalid_input("mean_vector requires at least 1 row"));
    }
    let d = rows[0].len();
    let mut mean = vec![0.0; d];
    for row in rows {
        if row.len() != d {
            return Err(OceError::invalid_input("ragged matrix"));
        }
        for (m, v) in mean.iter_mut().zip(row) {
            *m += v;
        }
    }
    for m in &mut mean {
        *m /= n as f64;
    }
    Ok(mean)
}

/// Sample covariance matrix (n - 1 denominator).
pub fn covariance_matrix(rows: &[Vec<f64>], mean: &[f64]) -> Result<Vec<Vec<f64>>, OceError> {
    let n = rows.len();
    if n < 2 {
        return Err(OceError::invalid_input(
            "covariance requires at least 2 rows",
        ));
    }
    let d = mean.len();
    let mut cov = vec![vec![0.0; d]; d];
    for row in rows {
        for i in 0..d {
            let di = row[i] - mean[i];
            for j in i..d {
                cov[i][j] += di * (row[j] - mean[j]);
            }
        }
    }
    let denom = (n - 1) as f64;
    for i in 0..d {
        for j in i..d {
            cov[i][j] /= denom;
            cov[j][i] = cov[i][j];
        }
    }
    Ok(cov)
}

/// Matrix inverse via Gauss-Jordan elimination with partial pivoting.
///
/// A pivot below the relative tolerance reports the matrix as singular.
pub fn invert(matrix: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, OceError> {
    let d = matrix.len();
    if d == 0 || matrix.iter().any(|row| row.len() != d) {
        return Err(OceError::invalid_input("invert requires a square matrix"));
    }

    // Augmented [A | I].
    let mut work: Vec<Vec<f64>> = matrix
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut augmented = row.clone();
            augmented.extend((0..d).map(|j| if i == j { 1.0 } else { 0.0 }));
            augmented
        })
        .collect();

    let scale = matrix
        .iter()
        .flat_map(|row| row.iter().map(|v| v.abs()))
        .fold(0.0_f64, f64::max)
        .max(1.0);

    for col in 0..d {
        let pivot_row = (col..d)
            .max_by(|&a, &b| work[a][col].abs().total_cmp(&work[b][col].abs()))
            .unwrap_or(col);
        let pivot = work[pivot_row][col];
        if pivot.abs() < PIVOT_TOLERANCE * scale {
            return Err(OceError::numerical_issue(format!(
                "matrix is singular or near-singular (pivot {pivot:e} at column {col})"
            )));
        }
        work.swap(col, pivot_row);

        let inv_pivot = 1.0 / work[col][col];
        for v in &mut work[col] {
            *v *= inv_pivot;
        }
        for row in 0..d {
            if row == col {
                continue;
            }
            let factor = work[row][col];
            if factor == 0.0 {
                continue;
            }
            for k in 0..2 * d {
                work[row][k] -= factor * work[col][k];
            }
        }
    }

    Ok(work.into_iter().map(|row| row[d..].to_vec()).collect())
}

/// Quadratic form `vᵀ M v`.
pub fn quadratic_form(v: &[f64], m: &[Vec<f64>]) -> f64 {
    let mut acc = 0.0;
    for (i, vi) in v.iter().enumerate() {
        for (j, vj) in v.iter().enumerate() {
            acc += vi * m[i][j] * vj;
        }
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::{covariance_matrix, invert, mean_vector, quadratic_form};

    fn assert_close(got: f64, want: f64, tol: f64) {
        assert!(
            (got - want).abs() <= tol,
            "got {got}, want {want} (tol {tol})"
        );
    }

    #[test]
    fn mean_and_covariance_of_a_small_matrix() {
        let rows = vec![
            vec![1.0, 2.0],
            vec![3.0, 6.0],
            vec![5.0, 4.0],
        ];
        let mean = mean_vector(&rows).expect("mean");
        assert_eq!(mean, vec![3.0, 4.0]);

        let cov = covariance_matrix(&rows, &mean).expect("covariance");
        assert_close(cov[0][0], 4.0, 1e-12);
        assert_close(cov[1][1], 4.0, 1e-12);
        assert_close(cov[0][1], 2.0, 1e-12);
        assert_close(cov[1][0], 2.0, 1e-12);
    }

    #[test]
    fn invert_recovers_known_inverse() {
        let m = vec![vec![4.0, 7.0], vec![2.0, 6.0]];
        let inv = invert(&m).expect("inverse");
        assert_close(inv[0][0], 0.6, 1e-12);
        assert_close(inv[0][1], -0.7, 1e-12);
        assert_close(inv[1][0], -0.2, 1e-12);
        assert_close(inv[1][1], 0.4, 1e-12);
    }

    #[test]
    fn invert_times_original_is_identity() {
        let m = vec![
            vec![2.0, 0.5, 0.1],
            vec![0.5, 1.0, 0.2],
            vec![0.1, 0.2, 3.0],
        ];
        let inv = invert(&m).expect("inverse");
        for i in 0..3 {
            for j in 0..3 {
                let mut cell = 0.0;
                for (k, inv_row) in inv.iter().enumerate() {
                    cell += m[i][k] * inv_row[j];
                }
                let want = if i == j { 1.0 } else { 0.0 };
                assert_close(cell, want, 1e-10);
            }
        }
    }

    #[test]
    fn invert_reports_singular_matrices() {
        // Second row is 2x the first: rank 1.
        let m = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        let err = invert(&m).expect_err("singular must fail");
        assert!(err.to_string().contains("singular"));
    }

    #[test]
    fn quadratic_form_matches_hand_computation() {
        let m = vec![vec![2.0, 1.0], vec![1.0, 3.0]];
        // [1, 2]ᵀ M [1, 2] = 2 + 2 + 2 + 12 = 18.
        assert_close(quadratic_form(&[1.0, 2.0], &m), 18.0, 1e-12);
    }
}
