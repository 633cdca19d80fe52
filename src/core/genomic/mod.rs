//! Genomic coordinates and the gene/fragment overlap checks.

pub mod intervals;
