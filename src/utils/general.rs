use faer::{Mat, MatRef};

use crate::ensure_input;
use crate::utils::errors::Result;

//////////////////
// VECTOR STUFF //
//////////////////

/// Stable ascending argsort
///
/// Ties keep their original index order. NaNs are sorted to the end.
///
/// ### Params
///
/// * `x` - The values to sort
///
/// ### Returns
///
/// The index positions that would sort `x` in ascending order.
pub fn argsort_stable(x: &[f64]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..x.len()).collect();
    // sort_by is stable
    idx.sort_by(|&a, &b| x[a].total_cmp(&x[b]));
    idx
}

/// Indices of the `true` positions of a boolean mask
pub fn mask_to_indices(mask: &[bool]) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter_map(|(i, &keep)| if keep { Some(i) } else { None })
        .collect()
}

//////////////////
// MATRIX STUFF //
//////////////////

/// Column sums of a faer matrix
///
/// ### Params
///
/// * `x` - The matrix
///
/// ### Returns
///
/// Vector with one sum per column
pub fn col_sums(x: MatRef<f64>) -> Vec<f64> {
    (0..x.ncols())
        .map(|j| (0..x.nrows()).map(|i| x[(i, j)]).sum())
        .collect()
}

/// Rowbind a slice of faer Matrices
///
/// ### Params
///
/// * `matrices` - Slice of faer matrices to row bind
///
/// ### Returns
///
/// One row bound matrix from the initial matrices. Errors if the number of
/// columns differs or the slice is empty.
pub fn rowbind_matrices(matrices: &[&Mat<f64>]) -> Result<Mat<f64>> {
    ensure_input!(!matrices.is_empty(), "No matrices to row bind");
    let ncols = matrices[0].ncols();
    ensure_input!(
        matrices.iter().all(|m| m.ncols() == ncols),
        "All matrices must have the same number of columns"
    );

    let total_row = matrices.iter().map(|m| m.nrows()).sum();
    let mut result: Mat<f64> = Mat::zeros(total_row, ncols);
    let mut row_offset = 0;
    for matrix in matrices {
        let nrows = matrix.nrows();
        for i in 0..nrows {
            for j in 0..ncols {
                result[(row_offset + i, j)] = matrix[(i, j)]
            }
        }
        row_offset += nrows;
    }

    Ok(result)
}

/// Colbind a slice of faer Matrices
///
/// ### Params
///
/// * `matrices` - Slice of faer matrices to column bind
///
/// ### Returns
///
/// One column bound matrix from the initial matrices. Errors if the number of
/// rows differs or the slice is empty.
pub fn colbind_matrices(matrices: &[&Mat<f64>]) -> Result<Mat<f64>> {
    ensure_input!(!matrices.is_empty(), "No matrices to column bind");
    let nrows = matrices[0].nrows();
    ensure_input!(
        matrices.iter().all(|m| m.nrows() == nrows),
        "All matrices must have the same number of rows"
    );

    let total_col = matrices.iter().map(|m| m.ncols()).sum();
    let mut result: Mat<f64> = Mat::zeros(nrows, total_col);
    let mut col_offset = 0;
    for matrix in matrices {
        let ncols = matrix.ncols();
        for i in 0..nrows {
            for j in 0..ncols {
                result[(i, col_offset + j)] = matrix[(i, j)]
            }
        }
        col_offset += ncols;
    }

    Ok(result)
}
