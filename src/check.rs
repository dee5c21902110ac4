//! Startup check orchestration: launch, run, classify, report

use std::io;

use tracing::debug;

use crate::classify;
use crate::launch::{CheckOptions, LaunchSpec};
use crate::report::{OutcomeCategory, ValidationResult};
use crate::runner::{self, RunOutcome};

/// Validate that the app in `options.app_dir` starts.
///
/// Blocks until the target exits, the deadline (plus a bounded grace window)
/// passes, or the spawn fails. Every failure, including an internal harness
/// fault, comes back as a `ValidationResult` with a specific category; this
/// function never propagates an error to the caller and never retries.
pub fn check_startup(options: &CheckOptions) -> ValidationResult {
    let spec = match LaunchSpec::resolve(options) {
        Ok(spec) => spec,
        Err(result) => return result,
    };

    debug!(app_dir = %spec.app_dir.display(), "starting validation run");

    match runner::run(&spec) {
        Ok(RunOutcome::Exited {
            exit_code,
            success,
            stdout,
            stderr,
        }) => {
            let combined = classify::combined_output(&stdout, &stderr);

            // A clean exit (or a ready marker despite a nonzero exit) is the
            // common case; it short-circuits past the rule table entirely so
            // incidental warning text can never misclassify a good start.
            if success || classify::contains_ready_marker(&combined) {
                return ValidationResult::ok(
                    "App started successfully".to_string(),
                    classify::success_excerpt(&combined),
                );
            }

            debug!(exit_code = ?exit_code, "target failed, classifying output");
            let classification = classify::classify_failure(&combined);
            ValidationResult::error(
                classification.category,
                classification.message,
                classify::excerpt(&combined, classification.matched_line),
            )
        }
        Ok(RunOutcome::DeadlineExpired { stdout, stderr }) => {
            let combined = classify::combined_output(&stdout, &stderr);

            // Shiny apps block in their listen loop, so a healthy app never
            // exits before the deadline. Reaching the marker IS the success.
            if classify::contains_ready_marker(&combined) {
                ValidationResult::ok(
                    "App started successfully (reached listening state)".to_string(),
                    classify::success_excerpt(&combined),
                )
            } else {
                ValidationResult::error(
                    OutcomeCategory::Timeout,
                    format!(
                        "App did not start within {} seconds",
                        spec.deadline.as_secs()
                    ),
                    classify::excerpt(&combined, None),
                )
            }
        }
        Ok(RunOutcome::SpawnFailed { error }) => spawn_failure_result(&spec, &error),
        Err(e) => ValidationResult::error(
            OutcomeCategory::ExecutionError,
            "Internal error while running the app".to_string(),
            format!("{e:#}"),
        ),
    }
}

/// A spawn failure means the runtime itself is unusable; the entry file was
/// already confirmed to exist. An absent runtime gets its own category so
/// callers can tell "install R" apart from "fix the app".
fn spawn_failure_result(spec: &LaunchSpec, error: &io::Error) -> ValidationResult {
    if error.kind() == io::ErrorKind::NotFound || which::which(&spec.runtime).is_err() {
        ValidationResult::error(
            OutcomeCategory::RuntimeNotFound,
            format!("'{}' not found on PATH. Is R installed?", spec.runtime),
            format!(
                "Cannot execute '{}'. Ensure the R runtime is installed and on PATH.",
                spec.runtime
            ),
        )
    } else {
        ValidationResult::error(
            OutcomeCategory::ExecutionError,
            format!("Failed to launch '{}'", spec.runtime),
            error.to_string(),
        )
    }
}
