//! Integration tests for the startup validation harness
//!
//! These tests run real child processes. Shell scripts stand in for the R
//! runtime so the suite does not require an R installation.

pub mod startup_check;
