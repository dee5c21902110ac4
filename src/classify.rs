//! Ordered rule table mapping captured R output to outcome categories
//!
//! Rules are evaluated top to bottom and the first match wins. Order matters:
//! the generic `Error:` signature would otherwise pre-empt more specific ones
//! like `there is no package called`, so the catch-all sits last and the
//! fallthrough for unmatched non-zero exits is explicit in `classify_failure`.

use regex::Regex;
use std::sync::LazyLock;

use crate::report::OutcomeCategory;

/// Lines of context kept on each side of the matched line in an excerpt.
const EXCERPT_CONTEXT_LINES: usize = 10;

/// Maximum excerpt length, in lines, when no specific line matched.
const MAX_EXCERPT_LINES: usize = 30;

/// Shorter excerpt attached to successful starts.
const SUCCESS_EXCERPT_LINES: usize = 20;

/// Markers Shiny prints once the app reaches its listen loop.
static READY_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Listening on|Starting Shiny").expect("valid regex"));

/// One entry in the classification table.
struct Rule {
    category: OutcomeCategory,
    matcher: Regex,
    message: fn(&str) -> String,
}

static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule {
            category: OutcomeCategory::MissingDependency,
            matcher: Regex::new(r"(?i)there is no package called|could not find package")
                .expect("valid regex"),
            message: missing_package_message,
        },
        Rule {
            category: OutcomeCategory::SyntaxError,
            // R parse errors either name the token kind or quote the
            // offending token itself ("unexpected '}'", "unexpected 'else'")
            matcher: Regex::new(r"(?i)unexpected (symbol|input|string constant|numeric constant|end of input|'[^']+')|syntax error")
                .expect("valid regex"),
            message: |_| "R syntax error in the app entry file".to_string(),
        },
        Rule {
            category: OutcomeCategory::UndefinedReference,
            matcher: Regex::new(r"(?i)object .+ not found|Error in .+: object").expect("valid regex"),
            message: object_not_found_message,
        },
        Rule {
            category: OutcomeCategory::ConnectionError,
            matcher: Regex::new(r"(?i)cannot open the connection|could not resolve host")
                .expect("valid regex"),
            message: |_| "Network or file connection error".to_string(),
        },
        Rule {
            category: OutcomeCategory::ExecutionError,
            matcher: Regex::new(r"Error[: ]|error:").expect("valid regex"),
            message: execution_error_message,
        },
    ]
});

fn missing_package_message(combined: &str) -> String {
    static PACKAGE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"package called ['"]([^'"]+)['"]"#).expect("valid regex")
    });
    match PACKAGE.captures(combined).and_then(|c| c.get(1)) {
        Some(package) => format!("Missing R package: {}", package.as_str()),
        None => "Missing R package".to_string(),
    }
}

fn object_not_found_message(combined: &str) -> String {
    static OBJECT: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"object ['"]?([^'" ]+)['"]? not found"#).expect("valid regex")
    });
    match OBJECT.captures(combined).and_then(|c| c.get(1)) {
        Some(object) => format!("Object not found: {}", object.as_str()),
        None => "Object not found".to_string(),
    }
}

fn execution_error_message(combined: &str) -> String {
    static ERROR_LINE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"Error[:\s]+([^\n]+)").expect("valid regex"));
    match ERROR_LINE.captures(combined).and_then(|c| c.get(1)) {
        Some(line) => line.as_str().trim().to_string(),
        None => "R execution error".to_string(),
    }
}

/// Outcome of running the rule table over one run's output.
#[derive(Debug)]
pub struct Classification {
    pub category: OutcomeCategory,
    pub message: String,
    /// Line index (into the combined text) of the first line the winning rule
    /// matched, used to center the excerpt. `None` for the catch-all.
    pub matched_line: Option<usize>,
}

/// Classify the combined output of a failed run.
///
/// Never leaves an error run unclassified: when no rule matches, the
/// `ExecutionError` catch-all applies.
pub fn classify_failure(combined: &str) -> Classification {
    for rule in RULES.iter() {
        if rule.matcher.is_match(combined) {
            let matched_line = combined.lines().position(|line| rule.matcher.is_match(line));
            return Classification {
                category: rule.category,
                message: (rule.message)(combined),
                matched_line,
            };
        }
    }

    Classification {
        category: OutcomeCategory::ExecutionError,
        message: "R execution error".to_string(),
        matched_line: None,
    }
}

/// Whether the output contains a marker showing the app reached its listen
/// loop. The strongest positive signal; checked before any rule matching.
pub fn contains_ready_marker(text: &str) -> bool {
    READY_MARKER.is_match(text)
}

/// Combine the two captured streams into the single text the classifier and
/// excerpt logic operate on. Stderr comes first since R reports errors there.
pub fn combined_output(stdout: &str, stderr: &str) -> String {
    let mut combined = String::new();
    if !stderr.trim().is_empty() {
        combined.push_str("=== STDERR ===\n");
        combined.push_str(stderr.trim());
        combined.push_str("\n\n");
    }
    if !stdout.trim().is_empty() {
        combined.push_str("=== STDOUT ===\n");
        combined.push_str(stdout.trim());
    }
    combined
}

/// Bounded excerpt of the combined text.
///
/// Centered on `center_line` when a rule matched a specific line; otherwise
/// the tail of the output, which for timeouts is where the process last spoke
/// before hanging.
pub fn excerpt(combined: &str, center_line: Option<usize>) -> String {
    if combined.trim().is_empty() {
        return "No output captured".to_string();
    }

    let lines: Vec<&str> = combined.lines().collect();
    match center_line {
        Some(center) => {
            let start = center.saturating_sub(EXCERPT_CONTEXT_LINES);
            let end = (center + EXCERPT_CONTEXT_LINES + 1).min(lines.len());
            let mut out: Vec<&str> = Vec::new();
            if start > 0 {
                out.push("... (output truncated) ...");
            }
            out.extend(&lines[start..end]);
            if end < lines.len() {
                out.push("... (output truncated) ...");
            }
            out.join("\n")
        }
        None => tail_excerpt(&lines, MAX_EXCERPT_LINES),
    }
}

/// Excerpt attached to a successful start: a shorter tail, enough to show
/// the listening marker and any warnings that preceded it.
pub fn success_excerpt(combined: &str) -> String {
    if combined.trim().is_empty() {
        return String::new();
    }
    let lines: Vec<&str> = combined.lines().collect();
    tail_excerpt(&lines, SUCCESS_EXCERPT_LINES)
}

fn tail_excerpt(lines: &[&str], max_lines: usize) -> String {
    if lines.len() > max_lines {
        let mut out = vec!["... (output truncated) ..."];
        out.extend(&lines[lines.len() - max_lines..]);
        out.join("\n")
    } else {
        lines.join("\n")
    }
}
