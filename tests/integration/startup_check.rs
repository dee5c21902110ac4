//! End-to-end checks of the validation harness against live child processes

use std::time::Duration;

use serial_test::serial;

use shinycheck::{check_startup, CheckOptions, OutcomeCategory, RunStatus};

use super::helpers::{
    app_dir_with_entry, read_pid, stub_options, wait_until_dead, write_stub_runtime,
};

#[test]
#[serial]
fn ok_on_clean_exit_with_ready_marker() {
    let app = app_dir_with_entry("library(shiny)\n");
    let runtime = write_stub_runtime(
        app.path(),
        r#"echo "Loading required package: shiny"
echo "Warning message: package built under R 4.3" >&2
echo "Listening on http://127.0.0.1:3838"
exit 0"#,
    );

    let result = check_startup(&stub_options(app.path(), &runtime, 30));

    assert_eq!(result.status, RunStatus::Ok);
    assert!(result.category.is_none());
    // Incidental warning text on stderr must not flip a clean start to error
    assert!(result.excerpt.contains("Listening on"));
}

#[test]
#[serial]
fn ready_marker_then_hang_is_ok() {
    let app = app_dir_with_entry("library(shiny)\n");
    let runtime = write_stub_runtime(
        app.path(),
        r#"echo "$$" > runner.pid
echo "Listening on http://127.0.0.1:4000"
trap '' TERM
sleep 300"#,
    );

    let result = check_startup(&stub_options(app.path(), &runtime, 1));

    assert_eq!(result.status, RunStatus::Ok);
    assert!(result.message.contains("listening state"));

    // The listening app must still be reclaimed before the call returns
    let pid = read_pid(app.path(), "runner.pid");
    assert!(wait_until_dead(pid, Duration::from_secs(3)));
}

#[test]
#[serial]
fn timeout_kills_the_whole_process_tree() {
    let app = app_dir_with_entry("library(shiny)\n");
    // Ignores SIGTERM and forks a background child, forcing both the
    // SIGKILL escalation and the group-wide kill.
    let runtime = write_stub_runtime(
        app.path(),
        r#"trap '' TERM
echo "$$" > runner.pid
sleep 300 &
echo "$!" > child.pid
echo "still warming up"
wait"#,
    );

    let result = check_startup(&stub_options(app.path(), &runtime, 1));

    assert_eq!(result.status, RunStatus::Error);
    assert_eq!(result.category, Some(OutcomeCategory::Timeout));
    assert!(result.message.contains("1 second"));
    // The tail of output is the excerpt for a hang
    assert!(result.excerpt.contains("still warming up"));

    let runner_pid = read_pid(app.path(), "runner.pid");
    let child_pid = read_pid(app.path(), "child.pid");
    assert!(wait_until_dead(runner_pid, Duration::from_secs(3)));
    assert!(wait_until_dead(child_pid, Duration::from_secs(3)));
}

#[test]
#[serial]
fn missing_dependency_with_noisy_stdout() {
    let app = app_dir_with_entry("library(ggplot2)\n");
    // ~400KB on stdout, far past the pipe buffer, while the diagnostic line
    // goes to stderr: a sequential drain would deadlock here.
    let runtime = write_stub_runtime(
        app.path(),
        r#"i=0
while [ $i -lt 5000 ]; do
  echo "loading module $i ............................................................"
  i=$((i+1))
done
echo "Error in library(ggplot2) : there is no package called 'ggplot2'" >&2
exit 1"#,
    );

    let result = check_startup(&stub_options(app.path(), &runtime, 30));

    assert_eq!(result.status, RunStatus::Error);
    assert_eq!(result.category, Some(OutcomeCategory::MissingDependency));
    assert!(result.message.contains("ggplot2"));
    assert!(result.excerpt.contains("no package called"));
}

#[test]
#[serial]
fn undefined_reference_is_classified() {
    let app = app_dir_with_entry("print(adsl_data)\n");
    let runtime = write_stub_runtime(
        app.path(),
        r#"echo "Error in eval(expr) : object 'adsl_data' not found" >&2
exit 1"#,
    );

    let result = check_startup(&stub_options(app.path(), &runtime, 30));

    assert_eq!(result.category, Some(OutcomeCategory::UndefinedReference));
    assert!(result.message.contains("adsl_data"));
}

#[test]
#[serial]
fn syntax_error_is_classified() {
    let app = app_dir_with_entry("foo bar\n");
    let runtime = write_stub_runtime(
        app.path(),
        r#"echo "Error in parse(\"app.R\") : app.R:1:5: unexpected symbol" >&2
exit 1"#,
    );

    let result = check_startup(&stub_options(app.path(), &runtime, 30));
    assert_eq!(result.category, Some(OutcomeCategory::SyntaxError));
}

#[test]
fn entry_not_found_without_spawning() {
    let app = tempfile::TempDir::new().expect("create app dir");
    // No app.R in the directory; the stub would leave a marker if it ran
    let runtime = write_stub_runtime(app.path(), "touch spawned.marker");

    let result = check_startup(&stub_options(app.path(), &runtime, 30));

    assert_eq!(result.category, Some(OutcomeCategory::EntryNotFound));
    assert!(result.message.contains("app.R"));
    assert!(
        !app.path().join("spawned.marker").exists(),
        "entry check must run before any spawn"
    );
}

#[test]
fn runtime_not_found_is_distinguished_from_entry() {
    let app = app_dir_with_entry("library(shiny)\n");

    let mut options = CheckOptions::new(app.path());
    options.runtime = Some("shinycheck-no-such-runtime".to_string());
    options.deadline_secs = Some(5);

    let result = check_startup(&options);

    assert_eq!(result.category, Some(OutcomeCategory::RuntimeNotFound));
    assert!(result.message.contains("shinycheck-no-such-runtime"));
}

#[test]
#[serial]
fn same_failure_classifies_identically_twice() {
    let app = app_dir_with_entry("library(ggplot2)\n");
    let runtime = write_stub_runtime(
        app.path(),
        r#"echo "Error in library(ggplot2) : there is no package called 'ggplot2'" >&2
exit 1"#,
    );

    let options = stub_options(app.path(), &runtime, 30);
    let first = check_startup(&options);
    let second = check_startup(&options);

    assert_eq!(first.category, second.category);
    assert_eq!(first.message, second.message);
}

#[test]
#[serial]
fn structured_and_narrative_renderings_agree() {
    let app = app_dir_with_entry("library(ggplot2)\n");
    let runtime = write_stub_runtime(
        app.path(),
        r#"echo "Error in library(ggplot2) : there is no package called 'ggplot2'" >&2
exit 1"#,
    );

    let result = check_startup(&stub_options(app.path(), &runtime, 30));

    let json: serde_json::Value = serde_json::from_str(&result.to_json()).expect("valid json");
    let narrative = result.narrative();

    assert_eq!(json["status"], "error");
    assert_eq!(json["category"], "missing_dependency");
    assert!(narrative.contains("missing_dependency"));

    // Both projections draw the excerpt from the same captured text
    assert_eq!(json["excerpt"].as_str().expect("excerpt"), result.excerpt);
    assert!(narrative.contains(&result.excerpt));
}

#[test]
#[serial]
fn timeout_with_no_output_reports_empty_capture() {
    let app = app_dir_with_entry("Sys.sleep(300)\n");
    let runtime = write_stub_runtime(app.path(), "sleep 300");

    let result = check_startup(&stub_options(app.path(), &runtime, 1));

    assert_eq!(result.category, Some(OutcomeCategory::Timeout));
    assert_eq!(result.excerpt, "No output captured");
}
