use thiserror::Error;

/// Error type shared by all operations of the crate
#[derive(Debug, Error)]
pub enum ScError {
    /// Failure in the HDF5 layer (missing dataset, malformed file, etc.)
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    /// I/O error (file not found, permission denied, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be parsed
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid input (bad arguments, out-of-range values, broken invariants)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A decomposition did not converge or got degenerate input
    #[error("linear algebra error: {0}")]
    Linalg(String),

    /// Problems with the task graph or the workers
    #[error("scheduler error: {0}")]
    Scheduler(String),

    /// A deferred task failed when its value was forced
    #[error("task {task} failed: {source}")]
    TaskFailed {
        task: usize,
        #[source]
        source: Box<ScError>,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ScError>;
