use log::warn;
use serde::{Deserialize, Serialize};

use crate::utils::general::mask_to_indices;

////////////
// Params //
////////////

/// Inclusive bounds on the number of expressed genes per cell
///
/// ### Fields
///
/// * `min_genes` - Minimum number of non-zero entries in a row.
/// * `max_genes` - Maximum number of non-zero entries in a row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellFilter {
    pub min_genes: usize,
    pub max_genes: usize,
}

impl CellFilter {
    /// Generate a new cell filter
    ///
    /// If `min_genes > max_genes` no cell can pass.
    pub fn new(min_genes: usize, max_genes: usize) -> Self {
        if min_genes > max_genes {
            warn!(
                "min_genes ({}) larger than max_genes ({}); no cell will pass",
                min_genes, max_genes
            );
        }
        Self {
            min_genes,
            max_genes,
        }
    }

    /// Does a cell with `n_genes` expressed genes pass
    #[inline]
    pub fn passes(&self, n_genes: usize) -> bool {
        n_genes >= self.min_genes && n_genes <= self.max_genes
    }
}

/// Structure to store QC information on cells
///
/// ### Fields
///
/// * `to_keep` - Boolean vector indicating if the cells passes thresholds
/// * `no_genes` - Number of genes of the cells
#[derive(Clone, Debug)]
pub struct CellQuality {
    pub to_keep: Vec<bool>,
    pub no_genes: Vec<usize>,
}

impl CellQuality {
    /// Number of cells passing
    pub fn n_kept(&self) -> usize {
        self.to_keep.iter().filter(|&&k| k).count()
    }
}

/////////////
// Helpers //
/////////////

/// Apply the cell filter to the row pointers of a CSR matrix
///
/// ### Params
///
/// * `indptr` - Row pointers of the CSR matrix
/// * `filter` - The `CellFilter` to apply
///
/// ### Returns
///
/// Tuple of the indices of the rows that pass and the `CellQuality` with the
/// per-row number of genes.
pub fn filter_by_nnz(indptr: &[usize], filter: &CellFilter) -> (Vec<usize>, CellQuality) {
    let no_genes: Vec<usize> = indptr.windows(2).map(|w| w[1] - w[0]).collect();
    let to_keep: Vec<bool> = no_genes.iter().map(|&n| filter.passes(n)).collect();
    let keep = mask_to_indices(&to_keep);

    (keep, CellQuality { to_keep, no_genes })
}

/// Mask of the genes expressed in at least `min_cells` cells
///
/// ### Params
///
/// * `cell_counts` - Number of cells expressing each gene
/// * `min_cells` - The threshold
///
/// ### Returns
///
/// Boolean mask, one entry per gene
pub fn genes_passing_min_cells(cell_counts: &[f64], min_cells: usize) -> Vec<bool> {
    cell_counts
        .iter()
        .map(|&c| c >= min_cells as f64)
        .collect()
}
