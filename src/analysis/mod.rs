//! Portfolio-level analysis of assessment batches.

pub mod aggregator;

pub use aggregator::*;
