//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - taxonomy keys (`SourceCode`, `TargetCode`) and crosswalk edges
//! - input rows (`CategoryTotal`, `WeightedRecord`)
//! - derived artifacts (`ProbabilisticEdge`, `ExpandedRecord`, `AggregateResult`)

pub mod types;

pub use types::*;
