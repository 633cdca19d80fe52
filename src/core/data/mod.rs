//! Module containing anything and everything related to data and data
//! structures

pub mod annotated;
pub mod sparse_io_h5;
pub mod sparse_structures;
