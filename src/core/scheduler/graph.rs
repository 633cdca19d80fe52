use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::core::data::sparse_io_h5::PartitionRead;
use crate::core::data::sparse_structures::{Axis, Reduction};
use crate::utils::errors::{Result, ScError};

static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(0);

///////////
// Types //
///////////

/// Position of a node in its `TaskGraph`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub usize);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Index of a worker in an `ExecutionContext`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(pub usize);

/// The work a node performs once its dependencies are available
///
/// ### Variants
///
/// * `ReadPartition` - Read and cell-filter a row range of an h5ad file.
///   No dependencies.
/// * `Reduce` - Reduce one sparse partition along an axis into a dense
///   matrix.
/// * `Concatenate` - Concatenate the values of all dependencies.
/// * `SelectColumns` - Keep the columns of a sparse partition where the mask
///   is `true`.
#[derive(Debug, Clone)]
pub enum TaskKind {
    ReadPartition(PartitionRead),
    Reduce { axis: Axis, reduction: Reduction },
    Concatenate(Axis),
    SelectColumns(Arc<Vec<bool>>),
}

impl TaskKind {
    fn label(&self) -> &'static str {
        match self {
            TaskKind::ReadPartition(_) => "read_partition",
            TaskKind::Reduce { .. } => "reduce",
            TaskKind::Concatenate(_) => "concatenate",
            TaskKind::SelectColumns(_) => "select_columns",
        }
    }
}

/// A node of the task graph
///
/// ### Fields
///
/// * `id` - The position in the graph.
/// * `kind` - What the node computes.
/// * `deps` - The nodes whose values are inputs, in order.
/// * `worker` - Optional worker the node is pinned to.
#[derive(Debug, Clone)]
pub struct TaskNode {
    pub id: TaskId,
    pub kind: TaskKind,
    pub deps: Vec<TaskId>,
    pub worker: Option<WorkerId>,
}

impl fmt::Display for TaskNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.kind.label())
    }
}

///////////
// Graph //
///////////

/// Deferred computation as an append-only DAG
///
/// Nodes can only depend on nodes that already exist, so node ids are a
/// topological order. Building the graph does no work; values are produced
/// by an `ExecutionContext`.
#[derive(Debug)]
pub struct TaskGraph {
    id: u64,
    nodes: Vec<TaskNode>,
}

impl Default for TaskGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskGraph {
    /// Generate a new, empty graph with a process-unique id
    pub fn new() -> Self {
        Self {
            id: NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed),
            nodes: Vec::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get a node
    pub fn node(&self, id: TaskId) -> Result<&TaskNode> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| ScError::Scheduler(format!("{} not in graph {}", id, self.id)))
    }

    /// Iterate over all nodes in topological order
    pub fn nodes(&self) -> impl Iterator<Item = &TaskNode> {
        self.nodes.iter()
    }

    /// Append a node reading one partition
    pub fn read_partition(&mut self, request: PartitionRead) -> TaskId {
        let id = TaskId(self.nodes.len());
        self.nodes.push(TaskNode {
            id,
            kind: TaskKind::ReadPartition(request),
            deps: Vec::new(),
            worker: None,
        });
        id
    }

    /// Append a reduction of a sparse partition
    pub fn reduce(&mut self, input: TaskId, axis: Axis, reduction: Reduction) -> Result<TaskId> {
        self.push(TaskKind::Reduce { axis, reduction }, vec![input])
    }

    /// Append a concatenation of the values of `inputs`
    pub fn concatenate(&mut self, inputs: &[TaskId], axis: Axis) -> Result<TaskId> {
        if inputs.is_empty() {
            return Err(ScError::Scheduler(
                "Concatenation needs at least one input".to_string(),
            ));
        }
        self.push(TaskKind::Concatenate(axis), inputs.to_vec())
    }

    /// Append a column selection on a sparse partition
    pub fn select_columns(&mut self, input: TaskId, mask: Arc<Vec<bool>>) -> Result<TaskId> {
        self.push(TaskKind::SelectColumns(mask), vec![input])
    }

    /// Pin a node to a worker
    pub fn pin(&mut self, task: TaskId, worker: WorkerId) -> Result<()> {
        let graph_id = self.id;
        let node = self
            .nodes
            .get_mut(task.0)
            .ok_or_else(|| ScError::Scheduler(format!("{} not in graph {}", task, graph_id)))?;
        node.worker = Some(worker);
        Ok(())
    }

    /// All nodes needed to compute `targets`, targets included
    ///
    /// ### Params
    ///
    /// * `targets` - The nodes to compute
    ///
    /// ### Returns
    ///
    /// The required node ids, sorted (and thereby in topological order).
    pub fn ancestors(&self, targets: &[TaskId]) -> Result<Vec<TaskId>> {
        let mut needed = vec![false; self.nodes.len()];
        let mut stack: Vec<TaskId> = Vec::with_capacity(targets.len());
        for &t in targets {
            self.node(t)?;
            stack.push(t);
        }

        while let Some(t) = stack.pop() {
            if needed[t.0] {
                continue;
            }
            needed[t.0] = true;
            stack.extend(self.nodes[t.0].deps.iter().copied());
        }

        Ok(needed
            .iter()
            .enumerate()
            .filter_map(|(i, &n)| if n { Some(TaskId(i)) } else { None })
            .collect())
    }

    fn push(&mut self, kind: TaskKind, deps: Vec<TaskId>) -> Result<TaskId> {
        let id = TaskId(self.nodes.len());
        if let Some(bad) = deps.iter().find(|d| d.0 >= id.0) {
            return Err(ScError::Scheduler(format!(
                "{} depends on unknown {}",
                id, bad
            )));
        }
        self.nodes.push(TaskNode {
            id,
            kind,
            deps,
            worker: None,
        });
        Ok(id)
    }
}
