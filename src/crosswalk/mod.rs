//! Crosswalk relation and empirical weight derivation.

pub mod relation;
pub mod weights;

pub use relation::*;
pub use weights::*;
