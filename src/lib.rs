//! Single cell preprocessing on partitioned sparse data: filtered ingestion of
//! h5ad files on a set of workers, TF-IDF normalisation, peak selection,
//! gene/fragment overlaps and a batched PCA.

pub mod core;
pub mod single_cell;
pub mod utils;

pub use crate::core::data::annotated::AnnotatedMatrix;
pub use crate::core::data::sparse_structures::{
    Axis, CompressedSparseData, CompressedSparseFormat, Reduction, SparsePartition,
};
pub use crate::core::genomic::intervals::{
    genes_overlapping, overlap, Fragment, GeneRecord, OverlapParams, OverlapResult, Strand,
};
pub use crate::core::scheduler::executor::{ExecutionContext, SchedulerParams, TaskValue};
pub use crate::core::scheduler::graph::{TaskGraph, TaskId, WorkerId};
pub use crate::single_cell::ingestion::{
    read_with_filter, read_with_filter_annotated, reduce_csr_matrix, sum_csr_matrix,
    IngestionPlan, ReadFilterParams,
};
pub use crate::single_cell::normalisation::{logtf_idf, tf_idf, NormalisationParams};
pub use crate::single_cell::pca::{fit_pca, pca, PcaModel, PcaParams, PcaSolver};
pub use crate::single_cell::peaks::{filter_peaks, peak_frequencies};
pub use crate::utils::config::PipelineConfig;
pub use crate::utils::errors::{Result, ScError};
