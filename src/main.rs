use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;

use shinycheck::capture::CapturePolicy;
use shinycheck::launch::{DEFAULT_DEADLINE_SECS, DEFAULT_ENTRY_FILENAME, DEFAULT_RUNTIME};
use shinycheck::{check_startup, CheckOptions, RunStatus};

#[derive(Parser)]
#[command(name = "shinycheck")]
#[command(about = "Validate that a generated Shiny app starts", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the app directory
    #[arg(default_value = ".")]
    app_dir: PathBuf,

    /// Entry filename (must end in .R)
    #[arg(long, default_value = DEFAULT_ENTRY_FILENAME)]
    entry: String,

    /// Seconds to allow the app to reach its listening state (1-120)
    #[arg(long, default_value_t = DEFAULT_DEADLINE_SECS)]
    timeout: u64,

    /// Runtime used to execute the entry file
    #[arg(long, default_value = DEFAULT_RUNTIME)]
    runtime: String,

    /// Keep the earliest captured output instead of the tail once the
    /// capture limit is reached
    #[arg(long)]
    keep_earliest: bool,

    /// Print the structured JSON result instead of the narrative rendering
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut options = CheckOptions::new(cli.app_dir);
    options.entry_filename = Some(cli.entry);
    options.deadline_secs = Some(cli.timeout);
    options.runtime = Some(cli.runtime);
    options.capture_policy = if cli.keep_earliest {
        CapturePolicy::KeepEarliest
    } else {
        CapturePolicy::KeepLatest
    };

    let result = check_startup(&options);

    if cli.json {
        println!("{}", result.to_json());
    } else {
        let symbol = match result.status {
            RunStatus::Ok => "✓".green().bold(),
            RunStatus::Error => "✗".red().bold(),
        };
        print!("{symbol} {}", result.narrative());
    }

    if result.status == RunStatus::Error {
        std::process::exit(1);
    }
    Ok(())
}
