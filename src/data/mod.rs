//! Data sources for the pipeline (currently only synthetic demo data).

pub mod sample;

pub use sample::*;
