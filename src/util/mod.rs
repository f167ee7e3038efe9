//! Utility functions

pub mod time;
