use faer::Mat;
use log::debug;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::data::sparse_io_h5::read_partition;
use crate::core::data::sparse_structures::*;
use crate::core::scheduler::graph::*;
use crate::utils::errors::{Result, ScError};
use crate::utils::general::{colbind_matrices, rowbind_matrices};

////////////
// Params //
////////////

/// Size of the execution context
///
/// ### Fields
///
/// * `n_workers` - Number of workers. Each worker owns its own thread pool
///   and value store.
/// * `threads_per_worker` - Threads in each worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerParams {
    pub n_workers: usize,
    pub threads_per_worker: usize,
}

impl Default for SchedulerParams {
    fn default() -> Self {
        Self {
            n_workers: 2,
            threads_per_worker: 2,
        }
    }
}

////////////
// Values //
////////////

/// Value produced by a task
#[derive(Debug, Clone)]
pub enum TaskValue {
    Sparse(SparsePartition),
    Dense(Mat<f64>),
}

impl TaskValue {
    pub fn as_sparse(&self) -> Result<&SparsePartition> {
        match self {
            TaskValue::Sparse(p) => Ok(p),
            TaskValue::Dense(_) => Err(ScError::Scheduler(
                "Expected a sparse value, got a dense one".to_string(),
            )),
        }
    }

    pub fn as_dense(&self) -> Result<&Mat<f64>> {
        match self {
            TaskValue::Dense(m) => Ok(m),
            TaskValue::Sparse(_) => Err(ScError::Scheduler(
                "Expected a dense value, got a sparse one".to_string(),
            )),
        }
    }

    pub fn into_sparse(self) -> Result<SparsePartition> {
        match self {
            TaskValue::Sparse(p) => Ok(p),
            TaskValue::Dense(_) => Err(ScError::Scheduler(
                "Expected a sparse value, got a dense one".to_string(),
            )),
        }
    }
}

type StoreKey = (u64, TaskId);

/// One worker: a dedicated thread pool and the values computed on it
struct Worker {
    id: WorkerId,
    pool: rayon::ThreadPool,
    store: Mutex<FxHashMap<StoreKey, Arc<TaskValue>>>,
}

impl Worker {
    fn store(&self) -> Result<MutexGuard<'_, FxHashMap<StoreKey, Arc<TaskValue>>>> {
        self.store
            .lock()
            .map_err(|_| ScError::Scheduler(format!("Store of worker {} poisoned", self.id.0)))
    }
}

/////////////
// Context //
/////////////

/// Executes task graphs on a fixed set of workers
///
/// Values stay on the worker that computed them until the graph is
/// released. Handing a value to a task placed on a different worker counts
/// as one transfer.
pub struct ExecutionContext {
    workers: Vec<Worker>,
    transfers: AtomicUsize,
}

impl ExecutionContext {
    /// Generate a new context
    ///
    /// ### Params
    ///
    /// * `n_workers` - Number of workers, at least 1.
    /// * `threads_per_worker` - Threads per worker pool, at least 1.
    ///
    /// ### Returns
    ///
    /// The `ExecutionContext`
    pub fn new(n_workers: usize, threads_per_worker: usize) -> Result<Self> {
        if n_workers == 0 || threads_per_worker == 0 {
            return Err(ScError::Scheduler(format!(
                "Need at least one worker with one thread, got {} x {}",
                n_workers, threads_per_worker
            )));
        }

        let workers = (0..n_workers)
            .map(|w| {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads_per_worker)
                    .thread_name(move |i| format!("scutils-worker-{}-{}", w, i))
                    .build()
                    .map_err(|e| ScError::Scheduler(e.to_string()))?;
                Ok(Worker {
                    id: WorkerId(w),
                    pool,
                    store: Mutex::new(FxHashMap::default()),
                })
            })
            .collect::<Result<Vec<Worker>>>()?;

        Ok(Self {
            workers,
            transfers: AtomicUsize::new(0),
        })
    }

    /// Generate a new context from the parameters
    pub fn from_params(params: &SchedulerParams) -> Result<Self> {
        Self::new(params.n_workers, params.threads_per_worker)
    }

    pub fn n_workers(&self) -> usize {
        self.workers.len()
    }

    /// Number of cross-worker value hand-overs since creation
    pub fn transfer_count(&self) -> usize {
        self.transfers.load(Ordering::SeqCst)
    }

    /// The worker holding the value of `task`, if it was computed
    pub fn locate(&self, graph: &TaskGraph, task: TaskId) -> Result<Option<WorkerId>> {
        for worker in &self.workers {
            if worker.store()?.contains_key(&(graph.id(), task)) {
                return Ok(Some(worker.id));
            }
        }
        Ok(None)
    }

    /// Get the computed value of `task`
    pub fn fetch(&self, graph: &TaskGraph, task: TaskId) -> Result<Arc<TaskValue>> {
        self.lookup(graph, task)?
            .map(|(_, value)| value)
            .ok_or_else(|| ScError::Scheduler(format!("{} has not been computed", task)))
    }

    /// Compute `target` and everything it depends on
    ///
    /// Values already held by a worker are reused.
    ///
    /// ### Params
    ///
    /// * `graph` - The task graph
    /// * `target` - The node to force
    ///
    /// ### Returns
    ///
    /// The value of `target`. Failures are reported as
    /// `ScError::TaskFailed` naming the failing node.
    pub fn execute(&self, graph: &TaskGraph, target: TaskId) -> Result<Arc<TaskValue>> {
        let order = graph.ancestors(&[target])?;
        self.run(graph, &order)?;
        self.fetch(graph, target)
    }

    /// Materialise `targets` on the workers without returning them
    ///
    /// ### Params
    ///
    /// * `graph` - The task graph
    /// * `targets` - The nodes to compute
    ///
    /// ### Returns
    ///
    /// For each target, the worker holding its value.
    pub fn persist(
        &self,
        graph: &TaskGraph,
        targets: &[TaskId],
    ) -> Result<Vec<(WorkerId, TaskId)>> {
        let order = graph.ancestors(targets)?;
        self.run(graph, &order)?;

        targets
            .iter()
            .map(|&t| {
                self.locate(graph, t)?
                    .map(|w| (w, t))
                    .ok_or_else(|| ScError::Scheduler(format!("{} missing after persist", t)))
            })
            .collect()
    }

    /// Drop every stored value of `graph`
    ///
    /// ### Returns
    ///
    /// The number of values dropped.
    pub fn release(&self, graph: &TaskGraph) -> Result<usize> {
        let mut dropped = 0;
        for worker in &self.workers {
            let mut store = worker.store()?;
            let before = store.len();
            store.retain(|(graph_id, _), _| *graph_id != graph.id());
            dropped += before - store.len();
        }
        debug!("Released {} values of graph {}", dropped, graph.id());
        Ok(dropped)
    }

    /////////////
    // Helpers //
    /////////////

    fn lookup(
        &self,
        graph: &TaskGraph,
        task: TaskId,
    ) -> Result<Option<(WorkerId, Arc<TaskValue>)>> {
        for worker in &self.workers {
            if let Some(value) = worker.store()?.get(&(graph.id(), task)) {
                return Ok(Some((worker.id, Arc::clone(value))));
            }
        }
        Ok(None)
    }

    /// Run the missing nodes of `order` in waves of independent nodes
    fn run(&self, graph: &TaskGraph, order: &[TaskId]) -> Result<()> {
        let mut pending = Vec::with_capacity(order.len());
        for &t in order {
            if self.locate(graph, t)?.is_none() {
                pending.push(t);
            }
        }

        // wave of a node = 1 + latest wave of its pending dependencies
        let mut wave: FxHashMap<TaskId, usize> = FxHashMap::default();
        let mut waves: Vec<Vec<TaskId>> = Vec::new();
        for &t in &pending {
            let w = graph
                .node(t)?
                .deps
                .iter()
                .filter_map(|d| wave.get(d).map(|&w| w + 1))
                .max()
                .unwrap_or(0);
            wave.insert(t, w);
            if waves.len() <= w {
                waves.resize_with(w + 1, Vec::new);
            }
            waves[w].push(t);
        }

        for tasks in waves {
            tasks
                .par_iter()
                .map(|&t| self.run_node(graph, t))
                .collect::<Result<Vec<()>>>()?;
        }

        Ok(())
    }

    fn placement(&self, graph: &TaskGraph, node: &TaskNode) -> Result<WorkerId> {
        if let Some(worker) = node.worker {
            if worker.0 >= self.workers.len() {
                return Err(ScError::Scheduler(format!(
                    "{} pinned to worker {} but only {} workers exist",
                    node,
                    worker.0,
                    self.workers.len()
                )));
            }
            return Ok(worker);
        }
        if let Some(&first) = node.deps.first() {
            if let Some(worker) = self.locate(graph, first)? {
                return Ok(worker);
            }
        }
        Ok(WorkerId(node.id.0 % self.workers.len()))
    }

    fn run_node(&self, graph: &TaskGraph, task: TaskId) -> Result<()> {
        let node = graph.node(task)?;
        let placed = self.placement(graph, node)?;

        let inputs = node
            .deps
            .iter()
            .map(|&d| {
                let (holder, value) = self.lookup(graph, d)?.ok_or_else(|| {
                    ScError::Scheduler(format!("{} needs {} which is not computed", node, d))
                })?;
                if holder != placed {
                    self.transfers.fetch_add(1, Ordering::SeqCst);
                    debug!("{}: moving {} from worker {} to {}", node, d, holder.0, placed.0);
                }
                Ok(value)
            })
            .collect::<Result<Vec<Arc<TaskValue>>>>()?;

        let worker = &self.workers[placed.0];
        let value = worker
            .pool
            .install(|| run_task(&node.kind, &inputs))
            .map_err(|e| ScError::TaskFailed {
                task: task.0,
                source: Box::new(e),
            })?;
        debug!("{} done on worker {}", node, placed.0);

        worker.store()?.insert((graph.id(), task), Arc::new(value));
        Ok(())
    }
}

/// Compute the value of one node from its inputs
fn run_task(kind: &TaskKind, inputs: &[Arc<TaskValue>]) -> Result<TaskValue> {
    match kind {
        TaskKind::ReadPartition(request) => Ok(TaskValue::Sparse(read_partition(request)?)),
        TaskKind::Reduce { axis, reduction } => {
            let part = single_input(inputs)?.as_sparse()?;
            let reduced = part.matrix.reduce_axis(*axis, *reduction)?;
            let dense = match axis {
                Axis::Rows => Mat::from_fn(1, reduced.len(), |_, j| reduced[j]),
                Axis::Cols => Mat::from_fn(reduced.len(), 1, |i, _| reduced[i]),
            };
            Ok(TaskValue::Dense(dense))
        }
        TaskKind::Concatenate(axis) => {
            if inputs.iter().all(|v| matches!(**v, TaskValue::Sparse(_))) {
                let parts = inputs
                    .iter()
                    .map(|v| v.as_sparse())
                    .collect::<Result<Vec<&SparsePartition>>>()?;
                Ok(TaskValue::Sparse(SparsePartition::concatenate(&parts, *axis)?))
            } else {
                let mats = inputs
                    .iter()
                    .map(|v| v.as_dense())
                    .collect::<Result<Vec<&Mat<f64>>>>()?;
                let joined = match axis {
                    Axis::Rows => rowbind_matrices(&mats)?,
                    Axis::Cols => colbind_matrices(&mats)?,
                };
                Ok(TaskValue::Dense(joined))
            }
        }
        TaskKind::SelectColumns(mask) => {
            let part = single_input(inputs)?.as_sparse()?;
            Ok(TaskValue::Sparse(SparsePartition {
                matrix: part.matrix.select_columns_mask(mask)?,
                row_ids: part.row_ids.clone(),
            }))
        }
    }
}

fn single_input(inputs: &[Arc<TaskValue>]) -> Result<&TaskValue> {
    match inputs {
        [value] => Ok(value.as_ref()),
        _ => Err(ScError::Scheduler(format!(
            "Expected one input, got {}",
            inputs.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::data::sparse_io_h5::{write_h5ad_csr, PartitionRead};
    use crate::single_cell::processing::CellFilter;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    // 6 cells x 3 genes, row i has value i + 1 in column i % 3
    fn write_fixture(dir: &TempDir) -> PathBuf {
        let matrix = CompressedSparseData::new_csr(
            (1..=6).map(|v| v as f32).collect(),
            (0..6).map(|i| i % 3).collect(),
            (0..=6).collect(),
            (6, 3),
        );
        let barcodes: Vec<String> = (0..6).map(|i| format!("c{}", i)).collect();
        let genes: Vec<String> = (0..3).map(|i| format!("g{}", i)).collect();
        let path = dir.path().join("sched.h5ad");
        write_h5ad_csr(&path, &matrix, &barcodes, &genes).unwrap();
        path
    }

    fn read(path: &Path, start: usize, end: usize) -> PartitionRead {
        PartitionRead {
            path: path.to_path_buf(),
            total_cols: 3,
            batch_start: start,
            batch_end: end,
            cell_filter: CellFilter::new(0, 3),
        }
    }

    #[test]
    fn test_context_needs_workers() {
        assert!(ExecutionContext::new(0, 1).is_err());
        assert!(ExecutionContext::new(1, 0).is_err());
        let ctx = ExecutionContext::from_params(&SchedulerParams::default()).unwrap();
        assert_eq!(ctx.n_workers(), 2);
    }

    #[test]
    fn test_execute_reduction() {
        let dir = TempDir::new().unwrap();
        let path = write_fixture(&dir);
        let ctx = ExecutionContext::new(2, 1).unwrap();

        let mut graph = TaskGraph::new();
        let p0 = graph.read_partition(read(&path, 0, 3));
        let p1 = graph.read_partition(read(&path, 3, 6));
        let r0 = graph.reduce(p0, Axis::Rows, Reduction::Sum).unwrap();
        let r1 = graph.reduce(p1, Axis::Rows, Reduction::Sum).unwrap();
        let cat = graph.concatenate(&[r0, r1], Axis::Rows).unwrap();

        let value = ctx.execute(&graph, cat).unwrap();
        let sums = value.as_dense().unwrap();
        assert_eq!(sums.nrows(), 2);
        assert_eq!(
            (0..3).map(|j| sums[(0, j)]).collect::<Vec<_>>(),
            vec![1.0, 2.0, 3.0]
        );
        assert_eq!(
            (0..3).map(|j| sums[(1, j)]).collect::<Vec<_>>(),
            vec![4.0, 5.0, 6.0]
        );
    }

    #[test]
    fn test_persist_and_release() {
        let dir = TempDir::new().unwrap();
        let path = write_fixture(&dir);
        let ctx = ExecutionContext::new(2, 1).unwrap();

        let mut graph = TaskGraph::new();
        let p0 = graph.read_partition(read(&path, 0, 2));
        let p1 = graph.read_partition(read(&path, 2, 6));

        let placed = ctx.persist(&graph, &[p0, p1]).unwrap();
        assert_eq!(placed, vec![(WorkerId(0), p0), (WorkerId(1), p1)]);
        assert_eq!(ctx.fetch(&graph, p1).unwrap().as_sparse().unwrap().row_ids, vec![2, 3, 4, 5]);

        // dependants follow their first input
        let sel = graph.select_columns(p1, Arc::new(vec![true, false, true])).unwrap();
        ctx.execute(&graph, sel).unwrap();
        assert_eq!(ctx.locate(&graph, sel).unwrap(), Some(WorkerId(1)));
        assert_eq!(ctx.transfer_count(), 0);

        assert_eq!(ctx.release(&graph).unwrap(), 3);
        assert!(ctx.fetch(&graph, p0).is_err());
    }

    #[test]
    fn test_cross_worker_inputs_are_counted() {
        let dir = TempDir::new().unwrap();
        let path = write_fixture(&dir);
        let ctx = ExecutionContext::new(2, 1).unwrap();

        let mut graph = TaskGraph::new();
        let p0 = graph.read_partition(read(&path, 0, 3));
        let p1 = graph.read_partition(read(&path, 3, 6));
        let cat = graph.concatenate(&[p0, p1], Axis::Rows).unwrap();
        graph.pin(cat, WorkerId(0)).unwrap();

        let all = ctx.execute(&graph, cat).unwrap().as_sparse().unwrap().clone();
        assert_eq!(all.row_ids, (0..6).collect::<Vec<_>>());
        assert_eq!(ctx.transfer_count(), 1);
    }

    #[test]
    fn test_failures_name_the_task() {
        let dir = TempDir::new().unwrap();
        let ctx = ExecutionContext::new(1, 1).unwrap();

        let mut graph = TaskGraph::new();
        let p0 = graph.read_partition(read(&dir.path().join("missing.h5ad"), 0, 1));

        match ctx.execute(&graph, p0) {
            Err(ScError::TaskFailed { task, .. }) => assert_eq!(task, p0.0),
            other => panic!("expected a task failure, got {:?}", other.map(|_| ())),
        }

        graph.pin(p0, WorkerId(4)).unwrap();
        assert!(ctx.execute(&graph, p0).is_err());
    }
}
