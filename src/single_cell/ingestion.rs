use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::core::data::annotated::AnnotatedMatrix;
use crate::core::data::sparse_io_h5::*;
use crate::core::data::sparse_structures::*;
use crate::core::scheduler::executor::ExecutionContext;
use crate::core::scheduler::graph::*;
use crate::ensure_input;
use crate::single_cell::processing::*;
use crate::utils::errors::Result;
use crate::utils::general::col_sums;

////////////
// Params //
////////////

/// Parameters for reading an h5ad file with cell and gene filters
///
/// ### Fields
///
/// * `min_genes_per_cell` - Minimum number of expressed genes per cell.
/// * `max_genes_per_cell` - Maximum number of expressed genes per cell.
/// * `min_cells` - Minimum number of cells (after the cell filter) that need
///   to express a gene.
/// * `num_cells` - Only read the first `num_cells` cells. Reads all if
///   `None`.
/// * `batch_size` - Number of cells per partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadFilterParams {
    pub min_genes_per_cell: usize,
    pub max_genes_per_cell: usize,
    pub min_cells: usize,
    pub num_cells: Option<usize>,
    pub batch_size: usize,
}

impl Default for ReadFilterParams {
    fn default() -> Self {
        Self {
            min_genes_per_cell: 200,
            max_genes_per_cell: 6000,
            min_cells: 1,
            num_cells: None,
            batch_size: 5000,
        }
    }
}

impl ReadFilterParams {
    pub fn cell_filter(&self) -> CellFilter {
        CellFilter::new(self.min_genes_per_cell, self.max_genes_per_cell)
    }
}

//////////
// Plan //
//////////

/// Row ranges of the partitions
///
/// ### Params
///
/// * `max_cells` - Number of leading rows to cover
/// * `batch_size` - Rows per partition; the last one may be shorter
///
/// ### Returns
///
/// `[s, s + min(batch_size, max_cells - s))` for every `s` in
/// `(0..max_cells).step_by(batch_size)`
pub fn partition_bounds(max_cells: usize, batch_size: usize) -> Result<Vec<Range<usize>>> {
    ensure_input!(batch_size > 0, "batch_size needs to be positive");
    Ok((0..max_cells)
        .step_by(batch_size)
        .map(|s| s..s + batch_size.min(max_cells - s))
        .collect())
}

/// Task graph reading an h5ad file in partitions
///
/// Building the plan only reads the header. Nothing else is read until a
/// partition is forced by an `ExecutionContext`.
///
/// ### Fields
///
/// * `graph` - The graph with one `ReadPartition` node per batch.
/// * `partitions` - The partition nodes, in row order.
/// * `header` - The file header.
/// * `n_cells` - Number of leading rows covered by the partitions.
#[derive(Debug)]
pub struct IngestionPlan {
    pub graph: TaskGraph,
    pub partitions: Vec<TaskId>,
    pub header: H5adHeader,
    pub n_cells: usize,
}

impl IngestionPlan {
    /// Build the partition graph for a file
    ///
    /// ### Params
    ///
    /// * `path` - Path to the h5ad file
    /// * `params` - The `ReadFilterParams`
    ///
    /// ### Returns
    ///
    /// The `IngestionPlan`
    pub fn build<P: AsRef<Path>>(path: P, params: &ReadFilterParams) -> Result<Self> {
        let path = path.as_ref();
        ensure_input!(params.batch_size > 0, "batch_size needs to be positive");
        let cell_filter = params.cell_filter();
        let header = H5adHeader::read(path)?;

        let n_cells = match params.num_cells {
            Some(n) if n > header.n_rows => {
                warn!(
                    "Requested {} cells but the file only has {}; reading all",
                    n, header.n_rows
                );
                header.n_rows
            }
            Some(n) => n,
            None => header.n_rows,
        };

        let mut graph = TaskGraph::new();
        let partitions = partition_bounds(n_cells, params.batch_size)?
            .into_iter()
            .map(|rows| {
                graph.read_partition(PartitionRead {
                    path: path.to_path_buf(),
                    total_cols: header.n_cols,
                    batch_start: rows.start,
                    batch_end: rows.end,
                    cell_filter,
                })
            })
            .collect::<Vec<TaskId>>();

        debug!(
            "Planned {} partitions over {} of {} cells",
            partitions.len(),
            n_cells,
            header.n_rows
        );

        Ok(Self {
            graph,
            partitions,
            header,
            n_cells,
        })
    }
}

/////////////
// Reducer //
/////////////

/// Reduce partitioned CSR data along an axis on the workers holding it
///
/// The partitions are materialised first. Every partial reduction is pinned
/// to the worker that holds its partition, so the map phase moves no data.
/// The partial results are stacked in partition order.
///
/// ### Params
///
/// * `ctx` - The execution context
/// * `graph` - The graph holding the partitions
/// * `partitions` - The partition nodes
/// * `axis` - `Rows` gives one row of per-column values for every partition,
///   `Cols` one value per retained row
/// * `reduction` - The `Reduction` to apply
///
/// ### Returns
///
/// The (deferred) node concatenating the partial results
pub fn reduce_csr_matrix(
    ctx: &ExecutionContext,
    graph: &mut TaskGraph,
    partitions: &[TaskId],
    axis: Axis,
    reduction: Reduction,
) -> Result<TaskId> {
    ensure_input!(!partitions.is_empty(), "No partitions to reduce");

    let placed = ctx.persist(graph, partitions)?;
    let mut partials = Vec::with_capacity(placed.len());
    for (worker, part) in placed {
        let reduced = graph.reduce(part, axis, reduction)?;
        graph.pin(reduced, worker)?;
        partials.push(reduced);
    }

    graph.concatenate(&partials, Axis::Rows)
}

/// Sum partitioned CSR data along an axis
///
/// See `reduce_csr_matrix()`.
pub fn sum_csr_matrix(
    ctx: &ExecutionContext,
    graph: &mut TaskGraph,
    partitions: &[TaskId],
    axis: Axis,
) -> Result<TaskId> {
    reduce_csr_matrix(ctx, graph, partitions, axis, Reduction::Sum)
}

//////////////
// Pipeline //
//////////////

/// Result of the filtered read before it is shaped for the caller
struct FilteredRead {
    cells: SparsePartition,
    genes: Vec<String>,
    barcodes: Vec<String>,
}

/// Run the graph of the plan: count, mask, concatenate, select
fn run_plan(
    ctx: &ExecutionContext,
    plan: &mut IngestionPlan,
    params: &ReadFilterParams,
) -> Result<FilteredRead> {
    let n_genes = plan.header.n_cols;

    if plan.partitions.is_empty() {
        let mask = genes_passing_min_cells(&vec![0.0; n_genes], params.min_cells);
        let genes = select_labels(&plan.header.genes, &mask);
        return Ok(FilteredRead {
            cells: SparsePartition {
                matrix: CompressedSparseData::empty_csr((0, genes.len())),
                row_ids: Vec::new(),
            },
            genes,
            barcodes: Vec::new(),
        });
    }

    let start_count = Instant::now();
    let counts = reduce_csr_matrix(
        ctx,
        &mut plan.graph,
        &plan.partitions,
        Axis::Rows,
        Reduction::CountNonZero,
    )?;

    let mut n_cells_kept = 0;
    for &part in &plan.partitions {
        n_cells_kept += ctx.fetch(&plan.graph, part)?.as_sparse()?.nrows();
    }
    info!(
        "{} of {} cells left after cell filter",
        n_cells_kept, plan.n_cells
    );

    let cell_counts = col_sums(ctx.execute(&plan.graph, counts)?.as_dense()?.as_ref());
    let mask = genes_passing_min_cells(&cell_counts, params.min_cells);
    let genes = select_labels(&plan.header.genes, &mask);
    info!(
        "{} of {} genes left after gene filter ({:.2?})",
        genes.len(),
        n_genes,
        start_count.elapsed()
    );

    let start_collect = Instant::now();
    let all_cells = plan.graph.concatenate(&plan.partitions, Axis::Rows)?;
    let selected = plan.graph.select_columns(all_cells, Arc::new(mask))?;
    let cells = ctx.execute(&plan.graph, selected)?.as_sparse()?.clone();
    debug!(
        "Collected a {} x {} matrix in {:.2?}",
        cells.matrix.shape.0,
        cells.matrix.shape.1,
        start_collect.elapsed()
    );

    let barcodes = cells
        .row_ids
        .iter()
        .map(|&r| plan.header.barcodes[r].clone())
        .collect();

    Ok(FilteredRead {
        cells,
        genes,
        barcodes,
    })
}

fn filtered_read<P: AsRef<Path>>(
    ctx: &ExecutionContext,
    path: P,
    params: &ReadFilterParams,
) -> Result<FilteredRead> {
    let start = Instant::now();
    let mut plan = IngestionPlan::build(path, params)?;

    let res = run_plan(ctx, &mut plan, params);
    let read = after_release(res, ctx.release(&plan.graph))?;

    info!("Finished filtered read in {:.2?}", start.elapsed());
    Ok(read)
}

/// The run result, unless only the release of the graph failed
///
/// A failed run takes precedence; a release failure on top of it is logged.
fn after_release<T>(res: Result<T>, released: Result<usize>) -> Result<T> {
    match (res, released) {
        (Ok(value), Ok(_)) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(_)) => Err(e),
        (Err(e), Err(release_err)) => {
            warn!("Releasing the graph failed as well: {}", release_err);
            Err(e)
        }
    }
}

fn select_labels(labels: &[String], mask: &[bool]) -> Vec<String> {
    labels
        .iter()
        .zip(mask)
        .filter_map(|(l, &keep)| if keep { Some(l.clone()) } else { None })
        .collect()
}

/// Read an h5ad file in partitions and apply the cell and gene filters
///
/// Cells are kept if their number of expressed genes lies within
/// `[min_genes_per_cell, max_genes_per_cell]`. Genes are kept if at least
/// `min_cells` of the remaining cells express them.
///
/// ### Params
///
/// * `ctx` - The execution context
/// * `path` - Path to the h5ad file
/// * `params` - The `ReadFilterParams`
///
/// ### Returns
///
/// Tuple of the filtered CSR matrix (cells x genes) and the retained gene
/// labels
pub fn read_with_filter<P: AsRef<Path>>(
    ctx: &ExecutionContext,
    path: P,
    params: &ReadFilterParams,
) -> Result<(CompressedSparseData<f32>, Vec<String>)> {
    let res = filtered_read(ctx, path, params)?;
    Ok((res.cells.matrix, res.genes))
}

/// Like `read_with_filter()`, with the retained barcodes as row names
pub fn read_with_filter_annotated<P: AsRef<Path>>(
    ctx: &ExecutionContext,
    path: P,
    params: &ReadFilterParams,
) -> Result<AnnotatedMatrix> {
    let res = filtered_read(ctx, path, params)?;
    AnnotatedMatrix::new(res.cells.matrix, res.barcodes, res.genes)
}
