use faer::Mat;
use log::info;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::time::Instant;

use crate::core::base::pca_svd::*;
use crate::core::data::annotated::AnnotatedMatrix;
use crate::core::data::sparse_structures::CompressedSparseData;
use crate::ensure_input;
use crate::utils::errors::Result;

////////////
// Params //
////////////

/// Which SVD to fit the PCA with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PcaSolver {
    /// Thin SVD of the full training matrix
    #[default]
    Exact,
    /// Randomised SVD with the given seed
    Randomised { seed: u64 },
}

/// Parameters for the batched PCA
///
/// ### Fields
///
/// * `n_components` - Number of principal components to keep.
/// * `train_ratio` - Fraction of the (leading) cells used for fitting.
/// * `n_batches` - Number of batches for the transform.
/// * `solver` - The `PcaSolver` to use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PcaParams {
    pub n_components: usize,
    pub train_ratio: f64,
    pub n_batches: usize,
    pub solver: PcaSolver,
}

impl Default for PcaParams {
    fn default() -> Self {
        Self {
            n_components: 50,
            train_ratio: 0.35,
            n_batches: 50,
            solver: PcaSolver::Exact,
        }
    }
}

///////////
// Model //
///////////

/// A fitted PCA
///
/// ### Fields
///
/// * `components` - Loadings, features x components.
/// * `means` - Feature means of the training rows.
/// * `n_train` - Number of rows the model was fitted on.
#[derive(Debug, Clone)]
pub struct PcaModel {
    pub components: Mat<f64>,
    pub means: Vec<f64>,
    pub n_train: usize,
}

impl PcaModel {
    pub fn n_components(&self) -> usize {
        self.components.ncols()
    }

    /// Project a range of rows onto the components
    ///
    /// ### Params
    ///
    /// * `x` - CSR matrix with the same features the model was fitted on
    /// * `rows` - The rows to project
    ///
    /// ### Returns
    ///
    /// The scores, `rows.len()` x `n_components`.
    pub fn transform(&self, x: &CompressedSparseData<f32>, rows: Range<usize>) -> Result<Mat<f64>> {
        ensure_input!(
            x.shape.1 == self.means.len(),
            "Matrix has {} features, model was fitted on {}",
            x.shape.1,
            self.means.len()
        );
        let centred = centred_rows(x, rows, &self.means)?;
        Ok(&centred * &self.components)
    }
}

/////////////
// Helpers //
/////////////

/// Number of leading rows used for training
///
/// `ceil(n_rows * train_ratio)`, clamped to `[1, n_rows]`.
pub fn train_size(n_rows: usize, train_ratio: f64) -> usize {
    let n = (n_rows as f64 * train_ratio).ceil() as usize;
    n.clamp(1, n_rows.max(1))
}

/// Row ranges of the transform batches
///
/// All batches have width `n_rows / n_batches`, the last one extends to
/// `n_rows`. `n_batches` is clamped to `[1, n_rows]` so that no batch is
/// empty.
///
/// ### Params
///
/// * `n_rows` - Number of rows to cover
/// * `n_batches` - Requested number of batches
///
/// ### Returns
///
/// Contiguous ranges covering `0..n_rows`
pub fn batch_bounds(n_rows: usize, n_batches: usize) -> Vec<Range<usize>> {
    if n_rows == 0 {
        return Vec::new();
    }
    let n_batches = n_batches.clamp(1, n_rows);
    let width = n_rows / n_batches;

    (0..n_batches)
        .map(|b| {
            let start = b * width;
            let end = if b == n_batches - 1 { n_rows } else { start + width };
            start..end
        })
        .collect()
}

/// Densify rows and subtract the feature means
fn centred_rows(
    x: &CompressedSparseData<f32>,
    rows: Range<usize>,
    means: &[f64],
) -> Result<Mat<f64>> {
    let dense = x.to_dense_rows(rows)?;
    Ok(Mat::from_fn(dense.nrows(), dense.ncols(), |i, j| {
        dense[(i, j)] as f64 - means[j]
    }))
}

/// Make the largest absolute loading of every component positive
fn flip_signs(components: &mut Mat<f64>) {
    for j in 0..components.ncols() {
        let mut max_val = 0.0_f64;
        for i in 0..components.nrows() {
            if components[(i, j)].abs() > max_val.abs() {
                max_val = components[(i, j)];
            }
        }
        if max_val < 0.0 {
            for i in 0..components.nrows() {
                components[(i, j)] = -components[(i, j)];
            }
        }
    }
}

/////////
// PCA //
/////////

/// Fit a PCA on the leading rows of a matrix
///
/// The training rows are centred by their column means and decomposed with
/// the chosen solver.
///
/// ### Params
///
/// * `x` - CSR matrix (cells x features)
/// * `params` - The `PcaParams`
///
/// ### Returns
///
/// The fitted `PcaModel`
pub fn fit_pca(x: &CompressedSparseData<f32>, params: &PcaParams) -> Result<PcaModel> {
    let (n_rows, n_cols) = x.shape;
    ensure_input!(n_rows > 0 && n_cols > 0, "Cannot run PCA on an empty matrix");
    ensure_input!(
        params.train_ratio > 0.0 && params.train_ratio <= 1.0,
        "train_ratio needs to be in (0, 1], got {}",
        params.train_ratio
    );
    let n_train = train_size(n_rows, params.train_ratio);
    ensure_input!(
        params.n_components >= 1 && params.n_components <= n_train.min(n_cols),
        "n_components needs to be in [1, {}], got {}",
        n_train.min(n_cols),
        params.n_components
    );

    let train = x.to_dense_rows(0..n_train)?;
    let means: Vec<f64> = (0..n_cols)
        .map(|j| (0..n_train).map(|i| train[(i, j)] as f64).sum::<f64>() / n_train as f64)
        .collect();
    let centred = Mat::from_fn(n_train, n_cols, |i, j| train[(i, j)] as f64 - means[j]);

    let svd = match params.solver {
        PcaSolver::Exact => exact_svd(centred.as_ref())?,
        PcaSolver::Randomised { seed } => {
            randomised_svd(centred.as_ref(), params.n_components, seed, None, None)?
        }
    };
    let mut components = svd
        .v
        .as_ref()
        .submatrix(0, 0, n_cols, params.n_components)
        .to_owned();
    flip_signs(&mut components);

    Ok(PcaModel {
        components,
        means,
        n_train,
    })
}

/// Batched PCA
///
/// Fits on the first `ceil(n_rows * train_ratio)` rows and transforms all
/// rows in `n_batches` batches. The scores are stored as `obsm["X_pca"]`.
///
/// ### Params
///
/// * `adata` - The annotated matrix
/// * `params` - The `PcaParams`
///
/// ### Returns
///
/// The same annotated matrix with the embedding attached
pub fn pca<'a>(
    adata: &'a mut AnnotatedMatrix,
    params: &PcaParams,
) -> Result<&'a mut AnnotatedMatrix> {
    let start_fit = Instant::now();
    let model = fit_pca(adata.x(), params)?;
    info!(
        "Fitted PCA with {} components on {} cells in {:.2?}",
        model.n_components(),
        model.n_train,
        start_fit.elapsed()
    );

    let start_transform = Instant::now();
    let n_rows = adata.n_obs();
    let x = adata.x();
    let bounds = batch_bounds(n_rows, params.n_batches);
    let scores = bounds
        .par_iter()
        .map(|rows| model.transform(x, rows.clone()))
        .collect::<Result<Vec<Mat<f64>>>>()?;

    let mut embedding = Mat::<f32>::zeros(n_rows, model.n_components());
    for (rows, batch) in bounds.iter().zip(&scores) {
        for (i, row) in rows.clone().enumerate() {
            for j in 0..batch.ncols() {
                embedding[(row, j)] = batch[(i, j)] as f32;
            }
        }
    }
    info!(
        "Transformed {} cells in {} batches in {:.2?}",
        n_rows,
        bounds.len(),
        start_transform.elapsed()
    );

    adata.insert_obsm("X_pca", embedding)?;
    Ok(adata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use proptest::prelude::*;

    // rows (i, 2i, 0): all variance along (1, 2, 0)
    fn line_data(n: usize) -> AnnotatedMatrix {
        let dense = Mat::from_fn(n, 3, |i, j| [1.0f32, 2.0, 0.0][j] * i as f32);
        AnnotatedMatrix::from_dense(
            dense.as_ref(),
            (0..n).map(|i| format!("c{}", i)).collect(),
            vec!["a".into(), "b".into(), "c".into()],
        )
        .unwrap()
    }

    fn params(n_components: usize, train_ratio: f64, n_batches: usize) -> PcaParams {
        PcaParams {
            n_components,
            train_ratio,
            n_batches,
            solver: PcaSolver::Exact,
        }
    }

    #[test]
    fn test_batch_bounds() {
        assert_eq!(batch_bounds(10, 3), vec![0..3, 3..6, 6..10]);
        assert_eq!(batch_bounds(3, 50), vec![0..1, 1..2, 2..3]);
        assert_eq!(batch_bounds(5, 0), vec![0..5]);
        assert!(batch_bounds(0, 4).is_empty());
    }

    #[test]
    fn test_train_size() {
        assert_eq!(train_size(100, 0.25), 25);
        assert_eq!(train_size(10, 0.35), 4);
        assert_eq!(train_size(10, 0.0001), 1);
        assert_eq!(train_size(10, 1.0), 10);
    }

    #[test]
    fn test_pca_recovers_line() {
        let mut adata = line_data(6);
        pca(&mut adata, &params(1, 1.0, 4)).unwrap();

        let emb = adata.obsm("X_pca").unwrap();
        assert_eq!((emb.nrows(), emb.ncols()), (6, 1));
        for i in 0..6 {
            let expected = (i as f32 - 2.5) * 5.0_f32.sqrt();
            assert_approx_eq!(emb[(i, 0)], expected, 1e-4);
        }
    }

    #[test]
    fn test_batching_does_not_change_scores() {
        let mut one = line_data(9);
        let mut many = line_data(9);
        pca(&mut one, &params(1, 0.5, 1)).unwrap();
        pca(&mut many, &params(1, 0.5, 4)).unwrap();

        let (a, b) = (one.obsm("X_pca").unwrap(), many.obsm("X_pca").unwrap());
        for i in 0..9 {
            assert_approx_eq!(a[(i, 0)], b[(i, 0)], 1e-5);
        }
    }

    #[test]
    fn test_fit_uses_leading_rows() {
        let adata = line_data(6);
        let model = fit_pca(adata.x(), &params(1, 0.5, 2)).unwrap();

        // rows 0, 1, 2
        assert_eq!(model.n_train, 3);
        assert_approx_eq!(model.means[0], 1.0, 1e-12);
        assert_approx_eq!(model.means[1], 2.0, 1e-12);
    }

    #[test]
    fn test_randomised_solver_agrees() {
        let adata = line_data(8);
        let exact = fit_pca(adata.x(), &params(1, 1.0, 2)).unwrap();
        let random = fit_pca(
            adata.x(),
            &PcaParams {
                solver: PcaSolver::Randomised { seed: 123 },
                ..params(1, 1.0, 2)
            },
        )
        .unwrap();

        for i in 0..3 {
            assert_approx_eq!(exact.components[(i, 0)], random.components[(i, 0)], 1e-8);
        }
    }

    #[test]
    fn test_invalid_params() {
        let mut adata = line_data(6);
        assert!(pca(&mut adata, &params(0, 0.5, 2)).is_err());
        assert!(pca(&mut adata, &params(4, 1.0, 2)).is_err());
        // 2 training rows allow at most 2 components
        assert!(pca(&mut adata, &params(3, 0.3, 2)).is_err());
        assert!(pca(&mut adata, &params(1, 0.0, 2)).is_err());
        assert!(pca(&mut adata, &params(1, 1.5, 2)).is_err());
        assert!(adata.obsm("X_pca").is_none());
    }

    proptest! {
        #[test]
        fn prop_batches_cover_all_rows(n_rows in 1usize..2_000, n_batches in 0usize..200) {
            let bounds = batch_bounds(n_rows, n_batches);

            prop_assert!(!bounds.is_empty());
            prop_assert_eq!(bounds[0].start, 0);
            prop_assert_eq!(bounds[bounds.len() - 1].end, n_rows);
            for w in bounds.windows(2) {
                prop_assert_eq!(w[0].end, w[1].start);
            }
            prop_assert!(bounds.iter().all(|r| !r.is_empty()));
            prop_assert_eq!(bounds.iter().map(|r| r.len()).sum::<usize>(), n_rows);
        }
    }
}
