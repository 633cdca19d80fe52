//! Contains the single cell preprocessing: filtered ingestion of h5ad files,
//! TF-IDF normalisation, peak selection and the batched PCA.

pub mod ingestion;
pub mod normalisation;
pub mod pca;
pub mod peaks;
pub mod processing;
