//! Subcommand handlers

pub mod limits;
pub mod plan;
pub mod simulate;
