use log::debug;

use crate::core::data::annotated::AnnotatedMatrix;
use crate::core::data::sparse_structures::*;
use crate::utils::errors::Result;
use crate::utils::general::argsort_stable;

/// Fraction of cells with a positive entry, per column
///
/// ### Params
///
/// * `x` - CSR matrix (cells x peaks)
///
/// ### Returns
///
/// One frequency in `[0, 1]` per column. Empty matrices give zeros.
pub fn peak_frequencies(x: &CompressedSparseData<f32>) -> Result<Vec<f64>> {
    let counts = x.reduce_axis(Axis::Rows, Reduction::CountNonZero)?;
    let n_rows = x.shape.0;
    if n_rows == 0 {
        return Ok(counts);
    }

    Ok(counts.iter().map(|&c| c / n_rows as f64).collect())
}

/// Keep the most frequent peaks
///
/// Columns are ordered by ascending frequency (ties keep their original
/// order) and the last `n_top_peaks` of that order are kept, in that order.
///
/// ### Params
///
/// * `adata` - The annotated matrix (cells x peaks)
/// * `n_top_peaks` - Number of peaks to keep. Values at or above the number
///   of columns keep all of them.
///
/// ### Returns
///
/// A new `AnnotatedMatrix` with the selected columns
pub fn filter_peaks(adata: &AnnotatedMatrix, n_top_peaks: usize) -> Result<AnnotatedMatrix> {
    let freq = peak_frequencies(adata.x())?;
    let order = argsort_stable(&freq);
    let keep = &order[order.len().saturating_sub(n_top_peaks)..];

    debug!("Keeping {} of {} peaks", keep.len(), freq.len());

    adata.select_vars(keep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::Mat;

    // 5 cells with column frequencies [0.2, 0.8, 0.4, 0.6]
    fn peaks() -> AnnotatedMatrix {
        let nnz_per_col = [1, 4, 2, 3];
        let dense = Mat::from_fn(5, 4, |i, j| if i < nnz_per_col[j] { 1.0f32 } else { 0.0 });
        AnnotatedMatrix::from_dense(
            dense.as_ref(),
            (0..5).map(|i| format!("cell{}", i)).collect(),
            (0..4).map(|i| format!("peak{}", i)).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_peak_frequencies() {
        assert_eq!(
            peak_frequencies(peaks().x()).unwrap(),
            vec![0.2, 0.8, 0.4, 0.6]
        );
    }

    #[test]
    fn test_filter_keeps_most_frequent() {
        let res = filter_peaks(&peaks(), 2).unwrap();
        assert_eq!(res.var_names(), &["peak3", "peak1"]);
        assert_eq!(res.n_obs(), 5);
    }

    #[test]
    fn test_filter_edge_sizes() {
        let all = filter_peaks(&peaks(), 10).unwrap();
        assert_eq!(all.var_names(), &["peak0", "peak2", "peak3", "peak1"]);

        let none = filter_peaks(&peaks(), 0).unwrap();
        assert_eq!(none.n_vars(), 0);
        assert_eq!(none.n_obs(), 5);
    }
}
