//! Deferred task graphs and the worker pools that execute them. Partitions
//! are read, reduced and concatenated as graph nodes; values stay on the
//! worker that produced them until the graph is released.

pub mod executor;
pub mod graph;
