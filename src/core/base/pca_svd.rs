use faer::{Mat, MatRef};
use rand::prelude::*;
use rand_distr::Normal;

use crate::utils::errors::{Result, ScError};

////////////////
// Structures //
////////////////

/// Structure for SVD results
///
/// ### Fields
///
/// * `u` - Matrix u of the SVD decomposition
/// * `v` - Matrix v of the SVD decomposition
/// * `s` - Singular values of the SVD decomposition
#[derive(Clone, Debug)]
pub struct SvdResults {
    pub u: Mat<f64>,
    pub v: Mat<f64>,
    pub s: Vec<f64>,
}

///////////////
// Functions //
///////////////

/// Exact thin SVD
///
/// ### Params
///
/// * `x` - The matrix to decompose
///
/// ### Returns
///
/// The `SvdResults` with singular values in descending order.
pub fn exact_svd(x: MatRef<f64>) -> Result<SvdResults> {
    let svd = x
        .thin_svd()
        .map_err(|e| ScError::Linalg(format!("Thin SVD failed: {:?}", e)))?;

    Ok(SvdResults {
        u: svd.U().to_owned(),
        v: svd.V().to_owned(),
        s: svd.S().column_vector().iter().copied().collect(),
    })
}

/// Randomised SVD
///
/// ### Params
///
/// * `x` - The matrix on which to apply the randomised SVD.
/// * `rank` - The target rank of the approximation (number of singular values,
///   vectors to compute).
/// * `seed` - Random seed for reproducible results.
/// * `oversampling` - Additional samples beyond the target rank to improve
///   accuracy. Defaults to 10 if not specified.
/// * `n_power_iter` - Number of power iterations to perform for better
///   approximation quality. Defaults to 2 if not specified.
///
/// ### Returns
///
/// The randomised SVD results in form of `SvdResults`.
///
/// ### Algorithm Details
///
/// 1. Generate a random Gaussian matrix Ω of size n × (rank + oversampling)
/// 2. Compute Y = X * Ω to capture the range of X
/// 3. Orthogonalize Y using QR decomposition to get Q
/// 4. Apply power iterations: for each iteration, compute Z = X^T * Q, then Q = QR(X * Z)
/// 5. Form B = Q^T * X and compute its SVD
/// 6. Reconstruct the final SVD: U = Q * U_B, V = V_B, S = S_B
pub fn randomised_svd(
    x: MatRef<f64>,
    rank: usize,
    seed: u64,
    oversampling: Option<usize>,
    n_power_iter: Option<usize>,
) -> Result<SvdResults> {
    let ncol = x.ncols();
    let nrow = x.nrows();

    let os = oversampling.unwrap_or(10);
    let sample_size = (rank + os).min(ncol.min(nrow));
    let n_iter = n_power_iter.unwrap_or(2);

    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, 1.0).map_err(|e| ScError::Linalg(e.to_string()))?;
    let omega = Mat::from_fn(ncol, sample_size, |_, _| normal.sample(&mut rng));

    let y = x * omega;

    let mut q = y.qr().compute_thin_Q();
    for _ in 0..n_iter {
        let z = x.transpose() * &q;
        q = (x * z).qr().compute_thin_Q();
    }

    let b = q.transpose() * x;
    let svd = b
        .thin_svd()
        .map_err(|e| ScError::Linalg(format!("Randomised SVD failed: {:?}", e)))?;

    Ok(SvdResults {
        u: &q * svd.U(),
        v: svd.V().to_owned(),
        s: svd.S().column_vector().iter().copied().collect(),
    })
}
