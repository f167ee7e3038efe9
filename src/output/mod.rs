//! Run report output
//!
//! Text output for the console and JSON output for machine consumption.

pub mod json;
pub mod text;
