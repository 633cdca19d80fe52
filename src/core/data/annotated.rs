use faer::{Mat, MatRef};
use rustc_hash::FxHashMap;

use crate::core::data::sparse_structures::*;
use crate::ensure_input;
use crate::utils::errors::Result;

/// Observation x feature matrix with names and derived embeddings
///
/// The count matrix is always held as CSR (cells x features). CSC input is
/// converted on construction.
///
/// ### Fields
///
/// * `x` - The counts, cells x features.
/// * `obs_names` - One name (barcode) per row.
/// * `var_names` - One name (gene/peak) per column.
/// * `obsm` - Row-aligned embeddings, e.g. `"X_pca"`.
#[derive(Debug, Clone)]
pub struct AnnotatedMatrix {
    x: CompressedSparseData<f32>,
    obs_names: Vec<String>,
    var_names: Vec<String>,
    obsm: FxHashMap<String, Mat<f32>>,
}

impl AnnotatedMatrix {
    /// Generate a new annotated matrix
    ///
    /// ### Params
    ///
    /// * `x` - The count matrix (CSR or CSC).
    /// * `obs_names` - Row names; need to match the number of rows.
    /// * `var_names` - Column names; need to match the number of columns.
    ///
    /// ### Returns
    ///
    /// The validated `AnnotatedMatrix`
    pub fn new(
        x: CompressedSparseData<f32>,
        obs_names: Vec<String>,
        var_names: Vec<String>,
    ) -> Result<Self> {
        x.validate()?;
        let x = if x.is_csr() { x } else { x.transform() };
        let (nrow, ncol) = x.shape();

        ensure_input!(
            obs_names.len() == nrow,
            "{} obs names for {} rows",
            obs_names.len(),
            nrow
        );
        ensure_input!(
            var_names.len() == ncol,
            "{} var names for {} columns",
            var_names.len(),
            ncol
        );

        Ok(Self {
            x,
            obs_names,
            var_names,
            obsm: FxHashMap::default(),
        })
    }

    /// Generate an annotated matrix from dense data
    pub fn from_dense(
        dense: MatRef<f32>,
        obs_names: Vec<String>,
        var_names: Vec<String>,
    ) -> Result<Self> {
        Self::new(
            CompressedSparseData::from_dense_matrix(dense),
            obs_names,
            var_names,
        )
    }

    /// Generate an annotated matrix with index-based names ("0", "1", ...)
    pub fn with_default_names(x: CompressedSparseData<f32>) -> Result<Self> {
        let (nrow, ncol) = x.shape();
        let obs_names = (0..nrow).map(|i| i.to_string()).collect();
        let var_names = (0..ncol).map(|i| i.to_string()).collect();
        Self::new(x, obs_names, var_names)
    }

    pub fn x(&self) -> &CompressedSparseData<f32> {
        &self.x
    }

    pub fn obs_names(&self) -> &[String] {
        &self.obs_names
    }

    pub fn var_names(&self) -> &[String] {
        &self.var_names
    }

    pub fn n_obs(&self) -> usize {
        self.x.shape.0
    }

    pub fn n_vars(&self) -> usize {
        self.x.shape.1
    }

    /// Get an embedding by key
    pub fn obsm(&self, key: &str) -> Option<&Mat<f32>> {
        self.obsm.get(key)
    }

    /// Attach an embedding under `key`, replacing any previous one
    ///
    /// The embedding needs one row per observation.
    pub fn insert_obsm(&mut self, key: &str, embedding: Mat<f32>) -> Result<()> {
        ensure_input!(
            embedding.nrows() == self.n_obs(),
            "Embedding has {} rows, matrix has {} observations",
            embedding.nrows(),
            self.n_obs()
        );
        self.obsm.insert(key.to_string(), embedding);
        Ok(())
    }

    /// Column slice of the matrix
    ///
    /// Rows, observation names and embeddings are kept. Column `cols[k]`
    /// becomes column `k`.
    ///
    /// ### Params
    ///
    /// * `cols` - The columns to keep, in output order.
    ///
    /// ### Returns
    ///
    /// A new `AnnotatedMatrix` with the selected columns.
    pub fn select_vars(&self, cols: &[usize]) -> Result<Self> {
        let x = self.x.select_columns(cols)?;
        let var_names = cols.iter().map(|&c| self.var_names[c].clone()).collect();

        Ok(Self {
            x,
            obs_names: self.obs_names.clone(),
            var_names,
            obsm: self.obsm.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::mat;

    fn names(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{}{}", prefix, i)).collect()
    }

    #[test]
    fn test_dimension_checks() {
        let dense = mat![[1.0f32, 0.0], [0.0, 2.0], [3.0, 0.0]];

        assert!(AnnotatedMatrix::from_dense(dense.as_ref(), names("c", 3), names("g", 2)).is_ok());
        assert!(AnnotatedMatrix::from_dense(dense.as_ref(), names("c", 2), names("g", 2)).is_err());
        assert!(AnnotatedMatrix::from_dense(dense.as_ref(), names("c", 3), names("g", 3)).is_err());
    }

    #[test]
    fn test_csc_input_is_converted() {
        let csc = CompressedSparseData::new_csc(
            vec![1.0, 4.0, 3.0, 2.0, 5.0],
            vec![0, 2, 1, 0, 2],
            vec![0, 2, 3, 5],
            (3, 3),
        );
        let adata = AnnotatedMatrix::with_default_names(csc).unwrap();

        assert!(adata.x().is_csr());
        assert_eq!(adata.x().data, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(adata.var_names(), &["0", "1", "2"]);
    }

    #[test]
    fn test_obsm_and_var_selection() {
        let dense = mat![[1.0f32, 0.0, 7.0], [0.0, 2.0, 0.0]];
        let mut adata =
            AnnotatedMatrix::from_dense(dense.as_ref(), names("c", 2), names("g", 3)).unwrap();

        assert!(adata.insert_obsm("X_pca", Mat::zeros(3, 2)).is_err());
        adata.insert_obsm("X_pca", Mat::zeros(2, 2)).unwrap();

        let sub = adata.select_vars(&[2, 0]).unwrap();
        assert_eq!(sub.var_names(), &["g2", "g0"]);
        assert_eq!(sub.obs_names(), adata.obs_names());
        assert!(sub.obsm("X_pca").is_some());
        assert_eq!(
            sub.x().to_dense_matrix().unwrap(),
            mat![[7.0f32, 1.0], [0.0, 0.0]]
        );
    }
}
