//! `xwalk-exposure` library crate.
//!
//! The binary (`xwalk`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - modules are reusable (e.g., future ingestion layers, notebooks, etc.)
//! - code stays easy to navigate as the project grows

pub mod aggregate;
pub mod app;
pub mod cli;
pub mod crosswalk;
pub mod data;
pub mod diagnostics;
pub mod domain;
pub mod error;
pub mod expand;
pub mod io;
pub mod report;
