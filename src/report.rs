//! Result types for startup validation runs

use serde::{Deserialize, Serialize};

/// Overall status of a validation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Ok,
    Error,
}

/// Outcome category for a single validation run.
///
/// Exactly one category is produced per run. `Ok` and the error categories
/// are mutually exclusive; the classifier guarantees a failed run always
/// lands on one of the error variants (`ExecutionError` is the catch-all).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeCategory {
    /// Clean exit or recognized listening marker before the deadline
    Ok,

    /// Output names an R package that could not be loaded
    MissingDependency,

    /// R parse error in the entry file
    SyntaxError,

    /// A referenced object does not exist
    UndefinedReference,

    /// Deadline elapsed with no terminal signal from the process
    Timeout,

    /// The resolved entry file is absent (detected before any spawn)
    EntryNotFound,

    /// The R runtime executable is absent from the search path
    RuntimeNotFound,

    /// Network, socket, or file-handle failure unrelated to code correctness
    ConnectionError,

    /// Non-zero exit with no more specific signature matched
    ExecutionError,
}

impl OutcomeCategory {
    /// Stable string form, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeCategory::Ok => "ok",
            OutcomeCategory::MissingDependency => "missing_dependency",
            OutcomeCategory::SyntaxError => "syntax_error",
            OutcomeCategory::UndefinedReference => "undefined_reference",
            OutcomeCategory::Timeout => "timeout",
            OutcomeCategory::EntryNotFound => "entry_not_found",
            OutcomeCategory::RuntimeNotFound => "runtime_not_found",
            OutcomeCategory::ConnectionError => "connection_error",
            OutcomeCategory::ExecutionError => "execution_error",
        }
    }
}

/// The sole artifact a validation run returns to the caller.
///
/// Immutable once constructed. `category` is `None` on success; `excerpt`
/// holds a bounded slice of the captured output for human diagnosis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub status: RunStatus,
    pub category: Option<OutcomeCategory>,
    pub message: String,
    pub excerpt: String,
}

impl ValidationResult {
    /// Build a successful result.
    pub fn ok(message: String, excerpt: String) -> Self {
        Self {
            status: RunStatus::Ok,
            category: None,
            message,
            excerpt,
        }
    }

    /// Build a failed result with a specific category.
    pub fn error(category: OutcomeCategory, message: String, excerpt: String) -> Self {
        Self {
            status: RunStatus::Error,
            category: Some(category),
            message,
            excerpt,
        }
    }

    /// Structured (machine-readable) projection of the result.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| {
            // Serialization of plain strings and unit enums cannot fail, but
            // the reporter must never panic on the way out.
            format!("{{\"status\": \"error\", \"message\": {:?}}}", self.message)
        })
    }

    /// Narrative (human-readable) projection of the result.
    ///
    /// This is a rendering of the same fields as `to_json`, never separate
    /// logic: category, message, and excerpt always agree between the two.
    pub fn narrative(&self) -> String {
        let mut out = String::new();
        match self.status {
            RunStatus::Ok => {
                out.push_str(&self.message);
                out.push('\n');
            }
            RunStatus::Error => {
                let category = self.category.map(|c| c.as_str()).unwrap_or("error");
                out.push_str(&format!("Startup failed [{category}]: {}\n", self.message));
            }
        }
        if !self.excerpt.is_empty() {
            out.push_str("\n--- captured output ---\n");
            out.push_str(&self.excerpt);
            out.push('\n');
        }
        out
    }
}
