use faer::{Mat, MatRef};
use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::ensure_input;
use crate::utils::errors::{Result, ScError};
use crate::utils::general::mask_to_indices;

///////////
// Enums //
///////////

/// Type to describe the CompressedSparseFormat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressedSparseFormat {
    /// CSC-formatted data
    Csc,
    /// CSR-formatted data
    Csr,
}

/// Axis along which a reduction or concatenation happens
///
/// Follows the numpy convention: `Rows` (axis 0) collapses the rows and
/// yields one value per column, `Cols` (axis 1) collapses the columns and
/// yields one value per row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    /// Axis 0
    Rows,
    /// Axis 1
    Cols,
}

/// Which reduction to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reduction {
    /// Sum of the stored values
    Sum,
    /// Number of strictly positive stored values
    CountNonZero,
}

////////////////
// Structures //
////////////////

/// Compressed sparse matrix (CSR or CSC)
///
/// ### Fields
///
/// * `data` - The non-zero values.
/// * `indices` - Minor axis index of each value (column indices for CSR).
/// * `indptr` - Major axis pointers (row pointers for CSR).
/// * `cs_type` - Whether the data is stored as CSR or CSC.
/// * `shape` - `(nrow, ncol)` of the matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedSparseData<T>
where
    T: Clone + Default,
{
    pub data: Vec<T>,
    pub indices: Vec<usize>,
    pub indptr: Vec<usize>,
    pub cs_type: CompressedSparseFormat,
    pub shape: (usize, usize),
}

impl<T> CompressedSparseData<T>
where
    T: Clone + Default,
{
    /// Generate a new CSC version of the matrix
    ///
    /// ### Params
    ///
    /// * `data` - The underlying data
    /// * `indices` - The row indices of the data
    /// * `indptr` - The column pointers
    /// * `shape` - `(nrow, ncol)`
    pub fn new_csc(
        data: Vec<T>,
        indices: Vec<usize>,
        indptr: Vec<usize>,
        shape: (usize, usize),
    ) -> Self {
        Self {
            data,
            indices,
            indptr,
            cs_type: CompressedSparseFormat::Csc,
            shape,
        }
    }

    /// Generate a new CSR version of the matrix
    ///
    /// ### Params
    ///
    /// * `data` - The underlying data
    /// * `indices` - The column indices of the data
    /// * `indptr` - The row pointers
    /// * `shape` - `(nrow, ncol)`
    pub fn new_csr(
        data: Vec<T>,
        indices: Vec<usize>,
        indptr: Vec<usize>,
        shape: (usize, usize),
    ) -> Self {
        Self {
            data,
            indices,
            indptr,
            cs_type: CompressedSparseFormat::Csr,
            shape,
        }
    }

    /// An empty CSR matrix with `nrow` rows without any stored value
    pub fn empty_csr(shape: (usize, usize)) -> Self {
        Self::new_csr(Vec::new(), Vec::new(), vec![0; shape.0 + 1], shape)
    }

    /// Transform from CSC to CSR or vice versa
    ///
    /// ### Returns
    ///
    /// The transformed/transposed version
    pub fn transform(self) -> Self {
        match self.cs_type {
            CompressedSparseFormat::Csc => csc_to_csr(self),
            CompressedSparseFormat::Csr => csr_to_csc(self),
        }
    }

    /// Returns the shape of the matrix
    ///
    /// ### Returns
    ///
    /// A tuple of `(nrow, ncol)`
    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    /// Returns the NNZ
    ///
    /// ### Returns
    ///
    /// The number of NNZ
    pub fn get_nnz(&self) -> usize {
        self.data.len()
    }

    /// Is the matrix stored in CSR format
    pub fn is_csr(&self) -> bool {
        self.cs_type == CompressedSparseFormat::Csr
    }

    /// Length of the major and minor axis given the storage format
    fn major_minor(&self) -> (usize, usize) {
        match self.cs_type {
            CompressedSparseFormat::Csr => (self.shape.0, self.shape.1),
            CompressedSparseFormat::Csc => (self.shape.1, self.shape.0),
        }
    }

    /// Check the structural invariants of the compressed format
    ///
    /// The pointer array needs `major + 1` entries starting at zero, must be
    /// non-decreasing and end at the NNZ, and every minor index needs to be in
    /// range.
    pub fn validate(&self) -> Result<()> {
        let (major, minor) = self.major_minor();

        ensure_input!(
            self.indptr.len() == major + 1,
            "Pointer array has length {}, expected {}",
            self.indptr.len(),
            major + 1
        );
        ensure_input!(
            self.indptr[0] == 0,
            "Pointer array starts at {} instead of 0",
            self.indptr[0]
        );
        ensure_input!(
            self.indptr.windows(2).all(|w| w[0] <= w[1]),
            "Pointer array is not non-decreasing"
        );
        ensure_input!(
            self.data.len() == self.indices.len(),
            "Data ({}) and indices ({}) differ in length",
            self.data.len(),
            self.indices.len()
        );
        ensure_input!(
            self.indptr[major] == self.data.len(),
            "Last pointer ({}) does not match the NNZ ({})",
            self.indptr[major],
            self.data.len()
        );
        if let Some(&bad) = self.indices.iter().find(|&&i| i >= minor) {
            return Err(ScError::InvalidInput(format!(
                "Index {} out of bounds for axis of length {}",
                bad, minor
            )));
        }

        Ok(())
    }

    /// Number of stored values per major axis element
    ///
    /// For CSR data this is the degree of every row, i.e., the number of genes
    /// detected per cell.
    pub fn major_degrees(&self) -> Vec<usize> {
        self.indptr.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Select rows of a CSR matrix
    ///
    /// ### Params
    ///
    /// * `rows` - Index positions of the rows to keep, in output order
    ///
    /// ### Returns
    ///
    /// The row-sliced matrix
    pub fn select_rows(&self, rows: &[usize]) -> Result<Self> {
        ensure_input!(self.is_csr(), "Row selection requires CSR data");
        let nrow = self.shape.0;
        ensure_input!(
            rows.iter().all(|&r| r < nrow),
            "Row index out of bounds for {} rows",
            nrow
        );

        let nnz: usize = rows
            .iter()
            .map(|&r| self.indptr[r + 1] - self.indptr[r])
            .sum();
        let mut data = Vec::with_capacity(nnz);
        let mut indices = Vec::with_capacity(nnz);
        let mut indptr = Vec::with_capacity(rows.len() + 1);
        indptr.push(0);

        for &r in rows {
            let range = self.indptr[r]..self.indptr[r + 1];
            data.extend_from_slice(&self.data[range.clone()]);
            indices.extend_from_slice(&self.indices[range]);
            indptr.push(data.len());
        }

        Ok(Self::new_csr(
            data,
            indices,
            indptr,
            (rows.len(), self.shape.1),
        ))
    }

    /// Select (and reorder) columns of a CSR matrix
    ///
    /// Column `cols[k]` of the input becomes column `k` of the output. Within
    /// each row the output is sorted by the new column index.
    ///
    /// ### Params
    ///
    /// * `cols` - Index positions of the columns to keep, in output order
    ///
    /// ### Returns
    ///
    /// The column-sliced matrix
    pub fn select_columns(&self, cols: &[usize]) -> Result<Self> {
        ensure_input!(self.is_csr(), "Column selection requires CSR data");
        let ncol = self.shape.1;

        let mut old_to_new: Vec<Option<usize>> = vec![None; ncol];
        for (new_idx, &old_idx) in cols.iter().enumerate() {
            ensure_input!(
                old_idx < ncol,
                "Column index {} out of bounds for {} columns",
                old_idx,
                ncol
            );
            ensure_input!(
                old_to_new[old_idx].is_none(),
                "Column index {} selected twice",
                old_idx
            );
            old_to_new[old_idx] = Some(new_idx);
        }

        let mut data = Vec::new();
        let mut indices = Vec::new();
        let mut indptr = Vec::with_capacity(self.shape.0 + 1);
        indptr.push(0);

        let mut row_buffer: Vec<(usize, T)> = Vec::new();
        for row in 0..self.shape.0 {
            row_buffer.clear();
            for idx in self.indptr[row]..self.indptr[row + 1] {
                if let Some(new_col) = old_to_new[self.indices[idx]] {
                    row_buffer.push((new_col, self.data[idx].clone()));
                }
            }
            row_buffer.sort_by_key(|(col, _)| *col);
            for (col, val) in row_buffer.drain(..) {
                indices.push(col);
                data.push(val);
            }
            indptr.push(data.len());
        }

        Ok(Self::new_csr(
            data,
            indices,
            indptr,
            (self.shape.0, cols.len()),
        ))
    }

    /// Select columns of a CSR matrix with a boolean mask
    pub fn select_columns_mask(&self, mask: &[bool]) -> Result<Self> {
        ensure_input!(
            mask.len() == self.shape.1,
            "Mask length {} does not match {} columns",
            mask.len(),
            self.shape.1
        );
        self.select_columns(&mask_to_indices(mask))
    }

    /// Stack CSR matrices on top of each other
    ///
    /// ### Params
    ///
    /// * `parts` - The matrices to stack. All need the same number of columns.
    ///
    /// ### Returns
    ///
    /// One CSR matrix with all rows in order.
    pub fn vstack(parts: &[&Self]) -> Result<Self> {
        ensure_input!(!parts.is_empty(), "Nothing to stack");
        let ncol = parts[0].shape.1;
        ensure_input!(
            parts.iter().all(|p| p.is_csr() && p.shape.1 == ncol),
            "All parts need to be CSR with {} columns",
            ncol
        );

        let nrow: usize = parts.iter().map(|p| p.shape.0).sum();
        let nnz: usize = parts.iter().map(|p| p.get_nnz()).sum();
        let mut data = Vec::with_capacity(nnz);
        let mut indices = Vec::with_capacity(nnz);
        let mut indptr = Vec::with_capacity(nrow + 1);
        indptr.push(0);

        for part in parts {
            let offset = data.len();
            data.extend_from_slice(&part.data);
            indices.extend_from_slice(&part.indices);
            indptr.extend(part.indptr[1..].iter().map(|p| p + offset));
        }

        Ok(Self::new_csr(data, indices, indptr, (nrow, ncol)))
    }

    /// Put CSR matrices next to each other
    ///
    /// ### Params
    ///
    /// * `parts` - The matrices to bind. All need the same number of rows.
    ///
    /// ### Returns
    ///
    /// One CSR matrix with the columns of all parts in order.
    pub fn hstack(parts: &[&Self]) -> Result<Self> {
        ensure_input!(!parts.is_empty(), "Nothing to stack");
        let nrow = parts[0].shape.0;
        ensure_input!(
            parts.iter().all(|p| p.is_csr() && p.shape.0 == nrow),
            "All parts need to be CSR with {} rows",
            nrow
        );

        let col_offsets: Vec<usize> = parts
            .iter()
            .scan(0, |acc, p| {
                let offset = *acc;
                *acc += p.shape.1;
                Some(offset)
            })
            .collect();
        let ncol: usize = parts.iter().map(|p| p.shape.1).sum();

        let mut data = Vec::new();
        let mut indices = Vec::new();
        let mut indptr = Vec::with_capacity(nrow + 1);
        indptr.push(0);

        for row in 0..nrow {
            for (part, &offset) in parts.iter().zip(&col_offsets) {
                let range = part.indptr[row]..part.indptr[row + 1];
                data.extend_from_slice(&part.data[range.clone()]);
                indices.extend(part.indices[range].iter().map(|c| c + offset));
            }
            indptr.push(data.len());
        }

        Ok(Self::new_csr(data, indices, indptr, (nrow, ncol)))
    }
}

impl<T> CompressedSparseData<T>
where
    T: Copy + Default + Into<f64>,
{
    /// Reduce a CSR matrix along an axis
    ///
    /// ### Params
    ///
    /// * `axis` - `Rows` gives one value per column, `Cols` one per row
    /// * `reduction` - Sum the values or count the strictly positive ones
    ///
    /// ### Returns
    ///
    /// The reduced vector
    pub fn reduce_axis(&self, axis: Axis, reduction: Reduction) -> Result<Vec<f64>> {
        ensure_input!(self.is_csr(), "Axis reductions require CSR data");

        let value = |x: T| -> f64 {
            let x: f64 = x.into();
            match reduction {
                Reduction::Sum => x,
                Reduction::CountNonZero => (x > 0.0) as u8 as f64,
            }
        };

        let res = match axis {
            Axis::Rows => {
                let mut res = vec![0.0; self.shape.1];
                for (&col, &x) in self.indices.iter().zip(&self.data) {
                    res[col] += value(x);
                }
                res
            }
            Axis::Cols => self
                .indptr
                .windows(2)
                .map(|w| self.data[w[0]..w[1]].iter().map(|&x| value(x)).sum::<f64>())
                .collect(),
        };

        Ok(res)
    }
}

impl CompressedSparseData<f32> {
    /// Convert a faer dense matrix to CSR format
    ///
    /// ### Params
    ///
    /// * `dense` - The original dense matrix.
    pub fn from_dense_matrix(dense: MatRef<f32>) -> Self {
        let (nrow, ncol) = (dense.nrows(), dense.ncols());

        let mut data = Vec::new();
        let mut indices = Vec::new();
        let mut indptr = Vec::with_capacity(nrow + 1);
        indptr.push(0);

        for row in 0..nrow {
            for col in 0..ncol {
                let value = dense[(row, col)];
                if value != 0.0 {
                    data.push(value);
                    indices.push(col);
                }
            }
            indptr.push(data.len());
        }

        Self::new_csr(data, indices, indptr, (nrow, ncol))
    }

    /// Densify a range of rows of a CSR matrix
    ///
    /// ### Params
    ///
    /// * `rows` - The row range to densify
    ///
    /// ### Returns
    ///
    /// Dense faer matrix of shape `(rows.len(), ncol)`
    pub fn to_dense_rows(&self, rows: Range<usize>) -> Result<Mat<f32>> {
        ensure_input!(self.is_csr(), "Densifying rows requires CSR data");
        ensure_input!(
            rows.start <= rows.end && rows.end <= self.shape.0,
            "Row range {:?} out of bounds for {} rows",
            rows,
            self.shape.0
        );

        let mut dense = Mat::<f32>::zeros(rows.len(), self.shape.1);
        for (out_row, row) in rows.enumerate() {
            for idx in self.indptr[row]..self.indptr[row + 1] {
                *dense.get_mut(out_row, self.indices[idx]) = self.data[idx];
            }
        }

        Ok(dense)
    }

    /// To a dense faer matrix
    pub fn to_dense_matrix(&self) -> Result<Mat<f32>> {
        self.to_dense_rows(0..self.shape.0)
    }
}

/// A contiguous row range of a larger CSR matrix
///
/// ### Fields
///
/// * `matrix` - CSR data of the retained rows. Pointers start at zero.
/// * `row_ids` - Original row index of every retained row.
#[derive(Debug, Clone, PartialEq)]
pub struct SparsePartition {
    pub matrix: CompressedSparseData<f32>,
    pub row_ids: Vec<usize>,
}

impl SparsePartition {
    /// Number of rows in the partition
    pub fn nrows(&self) -> usize {
        self.matrix.shape.0
    }

    /// Concatenate partitions along an axis
    ///
    /// Along `Rows` the partitions are stacked and their row ids appended.
    /// Along `Cols` the partitions need the same row ids.
    pub fn concatenate(parts: &[&Self], axis: Axis) -> Result<Self> {
        ensure_input!(!parts.is_empty(), "No partitions to concatenate");
        let matrices: Vec<&CompressedSparseData<f32>> = parts.iter().map(|p| &p.matrix).collect();

        match axis {
            Axis::Rows => {
                let matrix = CompressedSparseData::vstack(&matrices)?;
                let row_ids = parts.iter().flat_map(|p| p.row_ids.iter().copied()).collect();
                Ok(Self { matrix, row_ids })
            }
            Axis::Cols => {
                ensure_input!(
                    parts.iter().all(|p| p.row_ids == parts[0].row_ids),
                    "Column-wise concatenation needs identical rows in all partitions"
                );
                let matrix = CompressedSparseData::hstack(&matrices)?;
                Ok(Self {
                    matrix,
                    row_ids: parts[0].row_ids.clone(),
                })
            }
        }
    }
}

//////////////////////////////
// Sparse format conversion //
//////////////////////////////

/// Transforms a CompressedSparseData that is CSC to CSR
///
/// ### Params
///
/// * `sparse_data` - The CompressedSparseData you want to transform
pub fn csc_to_csr<T>(sparse_data: CompressedSparseData<T>) -> CompressedSparseData<T>
where
    T: Clone + Default,
{
    let (nrow, _) = sparse_data.shape();
    let nnz = sparse_data.get_nnz();
    let mut row_ptr = vec![0; nrow + 1];

    for &r in &sparse_data.indices {
        row_ptr[r + 1] += 1;
    }

    for i in 0..nrow {
        row_ptr[i + 1] += row_ptr[i];
    }

    let mut csr_data = vec![T::default(); nnz];
    let mut csr_col_ind = vec![0; nnz];
    let mut next = row_ptr[..nrow].to_vec();

    for col in 0..(sparse_data.indptr.len() - 1) {
        for idx in sparse_data.indptr[col]..sparse_data.indptr[col + 1] {
            let row = sparse_data.indices[idx];
            let pos = next[row];

            csr_data[pos] = sparse_data.data[idx].clone();
            csr_col_ind[pos] = col;

            next[row] += 1;
        }
    }

    CompressedSparseData::new_csr(csr_data, csr_col_ind, row_ptr, sparse_data.shape())
}

/// Transform CSR stored data into CSC stored data
///
/// This version does a full memory copy of the data.
///
/// ### Params
///
/// * `sparse_data` - The data stored in CSR format.
///
/// ### Returns
///
/// The data in CSC format
pub fn csr_to_csc<T>(sparse_data: CompressedSparseData<T>) -> CompressedSparseData<T>
where
    T: Clone + Default,
{
    let nnz = sparse_data.get_nnz();
    let (_, ncol) = sparse_data.shape();
    let mut col_ptr = vec![0; ncol + 1];

    // count occurrences per column
    for &c in &sparse_data.indices {
        col_ptr[c + 1] += 1;
    }

    for i in 0..ncol {
        col_ptr[i + 1] += col_ptr[i];
    }

    let mut csc_data = vec![T::default(); nnz];
    let mut csc_row_ind = vec![0; nnz];
    let mut next = col_ptr[..ncol].to_vec();

    for row in 0..(sparse_data.indptr.len() - 1) {
        for idx in sparse_data.indptr[row]..sparse_data.indptr[row + 1] {
            let col = sparse_data.indices[idx];
            let pos = next[col];

            csc_data[pos] = sparse_data.data[idx].clone();
            csc_row_ind[pos] = row;

            next[col] += 1;
        }
    }

    CompressedSparseData::new_csc(csc_data, csc_row_ind, col_ptr, sparse_data.shape())
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use super::*;
    use faer::mat;

    // Test matrix:
    // [1 0 2]
    // [0 3 0]
    // [4 0 5]
    fn test_csr() -> CompressedSparseData<f32> {
        CompressedSparseData::new_csr(
            vec![1.0, 2.0, 3.0, 4.0, 5.0],
            vec![0, 2, 1, 0, 2],
            vec![0, 2, 3, 5],
            (3, 3),
        )
    }

    #[test]
    fn test_csc_to_csr_conversion() {
        let csc_matrix = CompressedSparseData::new_csc(
            vec![1, 4, 3, 2, 5],
            vec![0, 2, 1, 0, 2],
            vec![0, 2, 3, 5],
            (3, 3),
        );

        let csr_matrix = csc_to_csr(csc_matrix);

        assert_eq!(csr_matrix.data, vec![1, 2, 3, 4, 5]);
        assert_eq!(csr_matrix.indices, vec![0, 2, 1, 0, 2]);
        assert_eq!(csr_matrix.indptr, vec![0, 2, 3, 5]);
        assert_eq!(csr_matrix.shape, (3, 3));
        assert!(csr_matrix.is_csr());
    }

    #[test]
    fn test_csr_to_csc_conversion() {
        let csc_matrix = test_csr().transform();

        assert_eq!(csc_matrix.data, vec![1.0, 4.0, 3.0, 2.0, 5.0]);
        assert_eq!(csc_matrix.indices, vec![0, 2, 1, 0, 2]);
        assert_eq!(csc_matrix.indptr, vec![0, 2, 3, 5]);
        assert_eq!(csc_matrix.cs_type, CompressedSparseFormat::Csc);
    }

    #[test]
    fn test_validate_catches_broken_pointers() {
        assert!(test_csr().validate().is_ok());

        let mut bad = test_csr();
        bad.indptr = vec![0, 2, 1, 5];
        assert!(bad.validate().is_err());

        let mut bad = test_csr();
        bad.indices[0] = 3;
        assert!(bad.validate().is_err());

        let mut bad = test_csr();
        bad.indptr = vec![1, 2, 3, 5];
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_degrees_and_row_selection() {
        let csr = test_csr();
        assert_eq!(csr.major_degrees(), vec![2, 1, 2]);

        let rows = csr.select_rows(&[2, 0]).unwrap();
        assert_eq!(rows.shape, (2, 3));
        assert_eq!(rows.data, vec![4.0, 5.0, 1.0, 2.0]);
        assert_eq!(rows.indptr, vec![0, 2, 4]);
        assert!(rows.validate().is_ok());

        assert!(csr.select_rows(&[3]).is_err());
    }

    #[test]
    fn test_column_selection_reorders() {
        let csr = test_csr();
        let cols = csr.select_columns(&[2, 0]).unwrap();

        let dense = cols.to_dense_matrix().unwrap();
        assert_eq!(dense, mat![[2.0, 1.0], [0.0, 0.0], [5.0, 4.0]]);
        assert!(cols.validate().is_ok());

        let masked = csr.select_columns_mask(&[false, true, false]).unwrap();
        assert_eq!(masked.to_dense_matrix().unwrap(), mat![[0.0], [3.0], [0.0]]);

        assert!(csr.select_columns(&[0, 0]).is_err());
        assert!(csr.select_columns_mask(&[true]).is_err());
    }

    #[test]
    fn test_axis_reductions() {
        let csr = test_csr();

        assert_eq!(
            csr.reduce_axis(Axis::Rows, Reduction::Sum).unwrap(),
            vec![5.0, 3.0, 7.0]
        );
        assert_eq!(
            csr.reduce_axis(Axis::Cols, Reduction::Sum).unwrap(),
            vec![3.0, 3.0, 9.0]
        );
        assert_eq!(
            csr.reduce_axis(Axis::Rows, Reduction::CountNonZero).unwrap(),
            vec![2.0, 1.0, 2.0]
        );
    }

    #[test]
    fn test_stacking() {
        let csr = test_csr();
        let top = csr.select_rows(&[0]).unwrap();
        let bottom = csr.select_rows(&[1, 2]).unwrap();

        let stacked = CompressedSparseData::vstack(&[&top, &bottom]).unwrap();
        assert_eq!(stacked, csr);

        let wide = CompressedSparseData::hstack(&[&csr, &csr]).unwrap();
        assert_eq!(wide.shape, (3, 6));
        assert_eq!(
            wide.to_dense_matrix().unwrap(),
            mat![
                [1.0, 0.0, 2.0, 1.0, 0.0, 2.0],
                [0.0, 3.0, 0.0, 0.0, 3.0, 0.0],
                [4.0, 0.0, 5.0, 4.0, 0.0, 5.0]
            ]
        );

        let narrow = csr.select_columns(&[0]).unwrap();
        assert!(CompressedSparseData::vstack(&[&csr, &narrow]).is_err());
    }

    #[test]
    fn test_dense_round_trip() {
        let dense = mat![[1.0f32, 0.0, 3.0], [0.0, 2.0, 0.0], [4.0, 0.0, 5.0]];
        let sparse = CompressedSparseData::from_dense_matrix(dense.as_ref());

        assert_eq!(sparse.get_nnz(), 5);
        assert_eq!(sparse.to_dense_matrix().unwrap(), dense);
        assert_eq!(
            sparse.to_dense_rows(1..3).unwrap(),
            mat![[0.0f32, 2.0, 0.0], [4.0, 0.0, 5.0]]
        );
    }

    #[test]
    fn test_partition_concatenation() {
        let csr = test_csr();
        let a = SparsePartition {
            matrix: csr.select_rows(&[0, 1]).unwrap(),
            row_ids: vec![0, 1],
        };
        let b = SparsePartition {
            matrix: csr.select_rows(&[2]).unwrap(),
            row_ids: vec![7],
        };

        let rows = SparsePartition::concatenate(&[&a, &b], Axis::Rows).unwrap();
        assert_eq!(rows.matrix, csr);
        assert_eq!(rows.row_ids, vec![0, 1, 7]);

        assert!(SparsePartition::concatenate(&[&a, &b], Axis::Cols).is_err());
        let cols = SparsePartition::concatenate(&[&a, &a], Axis::Cols).unwrap();
        assert_eq!(cols.matrix.shape, (2, 6));
    }
}
