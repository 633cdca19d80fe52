//! Core data structures, linear algebra, genomic intervals and the task
//! scheduler.

pub mod base;
pub mod data;
pub mod genomic;
pub mod scheduler;
