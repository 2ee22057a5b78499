//! Report generation for aggregate runs.

pub mod generator;

pub use generator::*;
