//! shinycheck: startup validation harness for generated Shiny apps
//!
//! Launches an app's entry file under the R runtime as a child process with a
//! deadline, drains stdout/stderr concurrently into bounded buffers, and
//! classifies the captured output into a structured, machine-actionable
//! result: success, a specific failure category, or timeout.

pub mod capture;
pub mod check;
pub mod classify;
pub mod launch;
pub mod process;
pub mod report;
pub mod runner;

pub use check::check_startup;
pub use launch::CheckOptions;
pub use report::{OutcomeCategory, RunStatus, ValidationResult};
