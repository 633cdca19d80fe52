use hdf5::types::{VarLenAscii, VarLenUnicode};
use hdf5::File;
use log::debug;
use std::path::{Path, PathBuf};

use crate::core::data::sparse_structures::*;
use crate::ensure_input;
use crate::single_cell::processing::*;
use crate::utils::errors::{Result, ScError};

///////////////
// Constants //
///////////////

/// Values of the CSR matrix
pub const X_DATA: &str = "X/data";
/// Column indices of the CSR matrix
pub const X_INDICES: &str = "X/indices";
/// Row pointers of the CSR matrix
pub const X_INDPTR: &str = "X/indptr";
/// Gene (column) labels
pub const VAR_INDEX: &str = "var/_index";
/// Cell barcode (row) labels
pub const OBS_INDEX: &str = "obs/_index";

////////////////
// Structures //
////////////////

/// Header information of an h5ad file
///
/// Obtained by a short read of the index arrays; the file handle is closed
/// again before this is returned.
///
/// ### Fields
///
/// * `n_rows` - Number of cells (length of the row pointers - 1).
/// * `n_cols` - Number of genes (length of the gene labels).
/// * `genes` - The gene labels.
/// * `barcodes` - The cell barcodes.
#[derive(Debug, Clone)]
pub struct H5adHeader {
    pub n_rows: usize,
    pub n_cols: usize,
    pub genes: Vec<String>,
    pub barcodes: Vec<String>,
}

impl H5adHeader {
    /// Read the header of an h5ad file
    ///
    /// ### Params
    ///
    /// * `path` - Path to the h5ad file
    ///
    /// ### Returns
    ///
    /// The `H5adHeader`
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;

        let n_rows = file.dataset(X_INDPTR)?.size().saturating_sub(1);
        let genes = read_string_dataset(&file, VAR_INDEX)?;
        let barcodes = read_string_dataset(&file, OBS_INDEX)?;

        ensure_input!(
            barcodes.len() == n_rows,
            "{} has {} entries but the matrix has {} rows",
            OBS_INDEX,
            barcodes.len(),
            n_rows
        );

        Ok(Self {
            n_rows,
            n_cols: genes.len(),
            genes,
            barcodes,
        })
    }
}

/// Description of one partition read
///
/// ### Fields
///
/// * `path` - Path to the h5ad file.
/// * `total_cols` - Number of columns of the full matrix.
/// * `batch_start` - First row of the partition.
/// * `batch_end` - One past the last row of the partition.
/// * `cell_filter` - Degree filter applied to every row.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionRead {
    pub path: PathBuf,
    pub total_cols: usize,
    pub batch_start: usize,
    pub batch_end: usize,
    pub cell_filter: CellFilter,
}

////////////
// Reader //
////////////

/// Read one row partition from an h5ad file and apply the cell filter
///
/// Only the row pointers of `[batch_start, batch_end]` and the matching slice
/// of the data and indices arrays are read. Pointers are rebased to start at
/// zero. The file is opened read-only and closed before filtering, so the
/// function can be re-run safely.
///
/// ### Params
///
/// * `request` - The `PartitionRead` describing the partition
///
/// ### Returns
///
/// The `SparsePartition` with the rows passing the filter.
pub fn read_partition(request: &PartitionRead) -> Result<SparsePartition> {
    ensure_input!(
        request.batch_start <= request.batch_end,
        "Batch start {} after batch end {}",
        request.batch_start,
        request.batch_end
    );

    let (data, indices, indptr) = {
        let file = File::open(&request.path)?;
        let indptr_ds = file.dataset(X_INDPTR)?;
        let n_rows = indptr_ds.size().saturating_sub(1);
        ensure_input!(
            request.batch_end <= n_rows,
            "Batch end {} beyond the {} rows in the file",
            request.batch_end,
            n_rows
        );

        let raw_ptr: Vec<u64> = indptr_ds
            .read_slice_1d::<u64, _>(request.batch_start..request.batch_end + 1)?
            .to_vec();
        ensure_input!(
            raw_ptr.windows(2).all(|w| w[0] <= w[1]),
            "Row pointers of rows {}..{} are decreasing",
            request.batch_start,
            request.batch_end
        );
        let first_ptr = raw_ptr.first().copied().unwrap_or(0);
        let start_ptr = first_ptr as usize;
        let end_ptr = raw_ptr.last().copied().unwrap_or(first_ptr) as usize;

        let (data, indices) = if start_ptr == end_ptr {
            (Vec::new(), Vec::new())
        } else {
            let data: Vec<f32> = file
                .dataset(X_DATA)?
                .read_slice_1d::<f32, _>(start_ptr..end_ptr)?
                .to_vec();
            let indices: Vec<usize> = file
                .dataset(X_INDICES)?
                .read_slice_1d::<u64, _>(start_ptr..end_ptr)?
                .iter()
                .map(|&i| i as usize)
                .collect();
            (data, indices)
        };

        let indptr: Vec<usize> = raw_ptr
            .iter()
            .map(|&p| (p - first_ptr) as usize)
            .collect();

        (data, indices, indptr)
    };

    let matrix = CompressedSparseData::new_csr(
        data,
        indices,
        indptr,
        (request.batch_end - request.batch_start, request.total_cols),
    );
    matrix.validate()?;

    let (keep, qc) = filter_by_nnz(&matrix.indptr, &request.cell_filter);
    let matrix = matrix.select_rows(&keep)?;
    let row_ids: Vec<usize> = keep.iter().map(|&i| request.batch_start + i).collect();

    debug!(
        "Partition {}..{}: {} of {} cells pass the gene filter",
        request.batch_start,
        request.batch_end,
        qc.n_kept(),
        qc.no_genes.len()
    );

    Ok(SparsePartition { matrix, row_ids })
}

/// Helper function that reads in the full CSR data from an h5ad file
///
/// ### Params
///
/// * `file_path` - Path to the h5ad file
///
/// ### Returns
///
/// The full count matrix as `CompressedSparseData<f32>` in CSR format
pub fn read_h5ad_x_data<P: AsRef<Path>>(file_path: P) -> Result<CompressedSparseData<f32>> {
    let file = File::open(file_path)?;

    let data: Vec<f32> = file.dataset(X_DATA)?.read_raw::<f32>()?;
    let indices: Vec<usize> = file
        .dataset(X_INDICES)?
        .read_raw::<u64>()?
        .into_iter()
        .map(|i| i as usize)
        .collect();
    let indptr: Vec<usize> = file
        .dataset(X_INDPTR)?
        .read_raw::<u64>()?
        .into_iter()
        .map(|i| i as usize)
        .collect();
    let n_cols = file.dataset(VAR_INDEX)?.size();
    ensure_input!(!indptr.is_empty(), "{} is empty", X_INDPTR);

    let n_rows = indptr.len() - 1;
    let matrix = CompressedSparseData::new_csr(data, indices, indptr, (n_rows, n_cols));
    matrix.validate()?;

    Ok(matrix)
}

/////////////
// Writers //
/////////////

/// Write a CSR matrix with its labels in the h5ad layout read by this module
///
/// Writes `X/data`, `X/indices`, `X/indptr`, `obs/_index` and `var/_index`.
///
/// ### Params
///
/// * `path` - Where to write the file. Existing files are truncated.
/// * `matrix` - The CSR matrix (cells x genes).
/// * `barcodes` - One label per row.
/// * `genes` - One label per column.
pub fn write_h5ad_csr<P: AsRef<Path>>(
    path: P,
    matrix: &CompressedSparseData<f32>,
    barcodes: &[String],
    genes: &[String],
) -> Result<()> {
    ensure_input!(matrix.is_csr(), "Only CSR data can be written");
    matrix.validate()?;
    ensure_input!(
        barcodes.len() == matrix.shape.0 && genes.len() == matrix.shape.1,
        "Labels ({} x {}) do not match the matrix shape {:?}",
        barcodes.len(),
        genes.len(),
        matrix.shape
    );

    let file = File::create(path)?;

    let x = file.create_group("X")?;
    let indices: Vec<i64> = matrix.indices.iter().map(|&i| i as i64).collect();
    let indptr: Vec<i64> = matrix.indptr.iter().map(|&p| p as i64).collect();
    x.new_dataset_builder()
        .with_data(matrix.data.as_slice())
        .create("data")?;
    x.new_dataset_builder()
        .with_data(indices.as_slice())
        .create("indices")?;
    x.new_dataset_builder()
        .with_data(indptr.as_slice())
        .create("indptr")?;

    let obs = file.create_group("obs")?;
    obs.new_dataset_builder()
        .with_data(to_h5_strings(barcodes)?.as_slice())
        .create("_index")?;

    let var = file.create_group("var")?;
    var.new_dataset_builder()
        .with_data(to_h5_strings(genes)?.as_slice())
        .create("_index")?;

    Ok(())
}

/////////////
// Helpers //
/////////////

/// Read a 1D string dataset, accepting UTF-8 and ASCII variable length strings
fn read_string_dataset(file: &File, name: &str) -> Result<Vec<String>> {
    let ds = file.dataset(name)?;

    if let Ok(values) = ds.read_raw::<VarLenUnicode>() {
        return Ok(values.iter().map(|v| v.as_str().to_string()).collect());
    }

    let values = ds.read_raw::<VarLenAscii>()?;
    Ok(values.iter().map(|v| v.as_str().to_string()).collect())
}

/// Convert labels into HDF5 variable length strings
fn to_h5_strings(labels: &[String]) -> Result<Vec<VarLenUnicode>> {
    labels
        .iter()
        .map(|s| {
            s.parse::<VarLenUnicode>()
                .map_err(|e| ScError::InvalidInput(format!("Label '{}': {}", s, e)))
        })
        .collect()
}
