use log::warn;
use serde::{Deserialize, Serialize};

use crate::core::data::sparse_structures::*;
use crate::ensure_input;
use crate::utils::errors::Result;

////////////
// Params //
////////////

/// Parameters for the log TF-IDF
///
/// ### Fields
///
/// * `pseudocount` - Numerator of the row factor. Should be of the same order
///   of magnitude as the mean number of reads per cell. Defaults to 1e5.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalisationParams {
    pub pseudocount: f32,
}

impl Default for NormalisationParams {
    fn default() -> Self {
        Self { pseudocount: 1e5 }
    }
}

/////////////
// Helpers //
/////////////

/// Number of rows summing to zero and of columns without a positive entry
fn count_empty(row_sums: &[f64], col_counts: &[f64]) -> (usize, usize) {
    (
        row_sums.iter().filter(|&&s| s == 0.0).count(),
        col_counts.iter().filter(|&&c| c == 0.0).count(),
    )
}

/// Row sums and the inverse document frequency of every column
///
/// The idf of column j is `ln(1 + n_rows / n_j)` with `n_j` the number of
/// strictly positive entries in the column.
fn row_sums_and_idf(x: &CompressedSparseData<f32>) -> Result<(Vec<f64>, Vec<f64>)> {
    ensure_input!(x.is_csr(), "TF-IDF requires CSR data");

    let row_sums = x.reduce_axis(Axis::Cols, Reduction::Sum)?;
    let col_counts = x.reduce_axis(Axis::Rows, Reduction::CountNonZero)?;

    let (empty_rows, empty_cols) = count_empty(&row_sums, &col_counts);
    if empty_rows > 0 {
        warn!("{} rows sum to zero; their entries become inf/NaN", empty_rows);
    }
    if empty_cols > 0 {
        warn!(
            "{} columns have no positive entry; their entries become inf/NaN",
            empty_cols
        );
    }

    let n_rows = x.shape.0 as f64;
    let idf = col_counts.iter().map(|&c| (n_rows / c).ln_1p()).collect();

    Ok((row_sums, idf))
}

/// Scale every stored value by a row factor and its column idf
fn scale_entries(
    x: &CompressedSparseData<f32>,
    row_factor: &[f64],
    idf: &[f64],
) -> CompressedSparseData<f32> {
    let mut data = Vec::with_capacity(x.data.len());
    for (row, w) in x.indptr.windows(2).enumerate() {
        for k in w[0]..w[1] {
            let value = x.data[k] as f64 * row_factor[row] * idf[x.indices[k]];
            data.push(value as f32);
        }
    }

    CompressedSparseData::new_csr(data, x.indices.clone(), x.indptr.clone(), x.shape)
}

///////////////
// Functions //
///////////////

/// TF-IDF normalisation
///
/// `X'[i, j] = X[i, j] * (1 / sum_i) * ln(1 + n_rows / n_j)`, with `sum_i`
/// the row sum and `n_j` the number of cells with a positive entry in
/// column j. The sparsity structure is kept.
///
/// ### Params
///
/// * `x` - CSR matrix (cells x peaks)
///
/// ### Returns
///
/// The normalised CSR matrix
pub fn tf_idf(x: &CompressedSparseData<f32>) -> Result<CompressedSparseData<f32>> {
    let (row_sums, idf) = row_sums_and_idf(x)?;
    let inv_sums: Vec<f64> = row_sums.iter().map(|&s| 1.0 / s).collect();

    Ok(scale_entries(x, &inv_sums, &idf))
}

/// Log TF-IDF normalisation
///
/// `X'[i, j] = X[i, j] * ln(1 + pseudocount / sum_i) * ln(1 + n_rows / n_j)`.
///
/// ### Params
///
/// * `x` - CSR matrix (cells x peaks)
/// * `pseudocount` - Numerator of the row factor
///
/// ### Returns
///
/// The normalised CSR matrix
pub fn logtf_idf(
    x: &CompressedSparseData<f32>,
    pseudocount: f32,
) -> Result<CompressedSparseData<f32>> {
    let (row_sums, idf) = row_sums_and_idf(x)?;
    let pseudocount = pseudocount as f64;
    let log_inv_sums: Vec<f64> = row_sums
        .iter()
        .map(|&s| (pseudocount / s).ln_1p())
        .collect();

    Ok(scale_entries(x, &log_inv_sums, &idf))
}
