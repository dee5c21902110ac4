//! Launch specification for a single validation run

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::CapturePolicy;
use crate::report::{OutcomeCategory, ValidationResult};

/// Conventional entry filename for generated Shiny apps.
pub const DEFAULT_ENTRY_FILENAME: &str = "app.R";

/// Runtime used to execute the entry file.
pub const DEFAULT_RUNTIME: &str = "Rscript";

/// Minimum allowed deadline, in seconds.
pub const MIN_DEADLINE_SECS: u64 = 1;

/// Maximum allowed deadline, in seconds.
pub const MAX_DEADLINE_SECS: u64 = 120;

/// Deadline applied when the caller does not provide one.
pub const DEFAULT_DEADLINE_SECS: u64 = 15;

/// Caller-facing options for a validation run.
#[derive(Debug, Clone)]
pub struct CheckOptions {
    /// Directory containing the app to validate
    pub app_dir: PathBuf,
    /// Entry filename; defaults to `app.R`
    pub entry_filename: Option<String>,
    /// Deadline in whole seconds, clamped to [1, 120]; defaults to 15
    pub deadline_secs: Option<u64>,
    /// Runtime program; defaults to `Rscript`
    pub runtime: Option<String>,
    /// Drop policy once the per-stream capture cap is reached
    pub capture_policy: CapturePolicy,
}

impl CheckOptions {
    pub fn new(app_dir: impl Into<PathBuf>) -> Self {
        Self {
            app_dir: app_dir.into(),
            entry_filename: None,
            deadline_secs: None,
            runtime: None,
            capture_policy: CapturePolicy::default(),
        }
    }
}

/// Fully resolved invocation handed to the process runner.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub app_dir: PathBuf,
    pub entry_filename: String,
    pub entry_path: PathBuf,
    pub runtime: String,
    pub deadline: Duration,
    pub capture_policy: CapturePolicy,
}

impl LaunchSpec {
    /// Resolve options into a concrete spec, or a terminal result when the
    /// entry file cannot be used.
    ///
    /// The existence check runs before any spawn, so a missing entry file is
    /// always reported as `entry_not_found` and never surfaces downstream as
    /// a spawn failure (which means something different: a missing runtime).
    pub fn resolve(options: &CheckOptions) -> Result<Self, ValidationResult> {
        let entry_filename = options
            .entry_filename
            .clone()
            .unwrap_or_else(|| DEFAULT_ENTRY_FILENAME.to_string());

        if entry_filename.trim().is_empty() || !entry_filename.ends_with(".R") {
            return Err(ValidationResult::error(
                OutcomeCategory::EntryNotFound,
                format!("Invalid entry filename '{entry_filename}': must be an .R file"),
                String::new(),
            ));
        }

        let app_dir = fs::canonicalize(&options.app_dir).unwrap_or_else(|_| options.app_dir.clone());
        if !app_dir.is_dir() {
            return Err(ValidationResult::error(
                OutcomeCategory::EntryNotFound,
                format!("App directory not found: {}", app_dir.display()),
                format!("Expected directory: {}", app_dir.display()),
            ));
        }

        let entry_path = app_dir.join(&entry_filename);
        if !entry_path.is_file() {
            return Err(ValidationResult::error(
                OutcomeCategory::EntryNotFound,
                format!("{entry_filename} not found at {}", entry_path.display()),
                format!(
                    "Expected file: {}\nDirectory contents: {}",
                    entry_path.display(),
                    directory_listing(&app_dir)
                ),
            ));
        }

        let deadline_secs = options
            .deadline_secs
            .unwrap_or(DEFAULT_DEADLINE_SECS)
            .clamp(MIN_DEADLINE_SECS, MAX_DEADLINE_SECS);

        Ok(Self {
            app_dir,
            entry_filename,
            entry_path,
            runtime: options
                .runtime
                .clone()
                .unwrap_or_else(|| DEFAULT_RUNTIME.to_string()),
            deadline: Duration::from_secs(deadline_secs),
            capture_policy: options.capture_policy,
        })
    }
}

fn directory_listing(dir: &Path) -> String {
    match fs::read_dir(dir) {
        Ok(entries) => {
            let mut names: Vec<String> = entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect();
            names.sort();
            if names.is_empty() {
                "(empty)".to_string()
            } else {
                names.join(", ")
            }
        }
        Err(_) => "(unreadable)".to_string(),
    }
}
