//! Module containing the linear algebra building blocks (SVD flavours) used
//! by the dimensionality reduction.

pub mod pca_svd;
